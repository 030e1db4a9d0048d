//! Frame composition: transcript above, input below, status on the last row.
//!
//! Rows are plain strings already fitted to the terminal width by display
//! cells; wide clusters are never split. The transcript is bottom-anchored so
//! the newest message is always visible.

use crate::status::{StatusContext, build_status, truncate_to_width};
use core_model::{Message, MessageStatus, Role, Transcript};
use core_text::{TextSurface, grapheme};

const PROMPT: &str = "> ";
const CONTINUATION: &str = "  ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u16,
    pub rows: Vec<String>,
    pub cursor: (u16, u16),
}

pub struct ChatView<'a> {
    pub transcript: &'a Transcript,
    pub surface: &'a TextSurface,
    pub status: StatusContext,
}

/// One wrapped row of a logical line: its text and the visual column it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WrappedRow {
    pub text: String,
    pub start_col: usize,
}

pub(crate) fn wrap_line(line: &str, avail: usize) -> Vec<WrappedRow> {
    let avail = avail.max(1);
    let mut rows = vec![WrappedRow {
        text: String::new(),
        start_col: 0,
    }];
    let mut used = 0;
    let mut col = 0;
    for g in grapheme::iter(line) {
        let w = grapheme::cluster_width(g);
        if used + w > avail && used > 0 {
            rows.push(WrappedRow {
                text: String::new(),
                start_col: col,
            });
            used = 0;
        }
        if let Some(row) = rows.last_mut() {
            row.text.push_str(g);
        }
        used += w;
        col += w;
    }
    rows
}

fn message_rows(msg: &Message, width: usize, out: &mut Vec<String>) {
    let (first, rest) = match (msg.role, msg.status) {
        (Role::User, _) => ("you: ", "     "),
        (Role::Assistant, MessageStatus::Failed) => ("!  ", "   "),
        (Role::Assistant, _) => ("ai: ", "    "),
    };
    let avail = width.saturating_sub(first.len());
    let mut lead = true;
    for line in msg.text.split('\n') {
        for row in wrap_line(line, avail) {
            let prefix = if lead { first } else { rest };
            lead = false;
            out.push(truncate_to_width(&format!("{prefix}{}", row.text), width));
        }
    }
}

pub fn compose(view: &ChatView<'_>, width: u16, height: u16) -> Frame {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 {
        return Frame {
            width,
            rows: Vec::new(),
            cursor: (0, 0),
        };
    }

    // Input rows, with the cursor located by visual column inside its wrapped row.
    let avail = w.saturating_sub(PROMPT.len()).max(1);
    let (cursor_line, cursor_col) = view.surface.cursor_line_col();
    let mut input_rows = Vec::new();
    let mut cursor = (PROMPT.len(), 0usize);
    for (idx, line) in view.surface.text().split('\n').enumerate() {
        let wrapped = wrap_line(line, avail);
        if idx == cursor_line {
            let pos = wrapped
                .iter()
                .rposition(|r| r.start_col <= cursor_col)
                .unwrap_or(0);
            cursor = (
                PROMPT.len() + cursor_col - wrapped[pos].start_col,
                input_rows.len() + pos,
            );
        }
        for row in wrapped {
            let prefix = if input_rows.is_empty() {
                PROMPT
            } else {
                CONTINUATION
            };
            input_rows.push(format!("{prefix}{}", row.text));
        }
    }

    // Keep the cursor row visible when the input outgrows its share.
    let input_cap = (h.saturating_sub(1) / 2).max(1);
    let input_skip = if input_rows.len() > input_cap {
        (cursor.1 + 1)
            .saturating_sub(input_cap)
            .min(input_rows.len() - input_cap)
    } else {
        0
    };
    let input_rows: Vec<String> = input_rows
        .into_iter()
        .skip(input_skip)
        .take(input_cap)
        .collect();
    cursor.1 -= input_skip;

    let transcript_h = h.saturating_sub(input_rows.len() + 2);
    let mut history = Vec::new();
    for (i, msg) in view.transcript.messages().iter().enumerate() {
        if i > 0 && msg.role == Role::User {
            history.push(String::new());
        }
        message_rows(msg, w, &mut history);
    }
    let skip = history.len().saturating_sub(transcript_h);

    let mut rows: Vec<String> = history.into_iter().skip(skip).collect();
    rows.resize(transcript_h, String::new());
    if h >= 2 {
        rows.push("-".repeat(w));
    }
    let input_top = rows.len();
    rows.extend(input_rows);
    rows.truncate(h.saturating_sub(1));
    rows.push(build_status(&view.status, width));
    rows.truncate(h);

    let cx = cursor.0.min(w.saturating_sub(1));
    let cy = (input_top + cursor.1).min(h.saturating_sub(1));
    Frame {
        width,
        rows,
        cursor: (cx as u16, cy as u16),
    }
}
