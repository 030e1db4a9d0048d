//! Status line composition.
//!
//! Two stages: `compose_status` picks the ordered segments for the current
//! state and `format_status` renders them, truncated to the row width.

use core_behavior::Locale;
use core_text::grapheme;

pub struct StatusContext {
    pub locale: Locale,
    pub request_in_flight: bool,
    pub input_chars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSegment {
    Waiting,
    Hints,
    Count(usize),
}

pub fn compose_status(ctx: &StatusContext) -> Vec<StatusSegment> {
    let mut segs = Vec::with_capacity(3);
    if ctx.request_in_flight {
        segs.push(StatusSegment::Waiting);
    }
    segs.push(StatusSegment::Hints);
    if ctx.input_chars > 0 {
        segs.push(StatusSegment::Count(ctx.input_chars));
    }
    segs
}

pub fn format_status(segs: &[StatusSegment], locale: Locale, width: u16) -> String {
    let parts: Vec<String> = segs
        .iter()
        .map(|s| match (s, locale) {
            (StatusSegment::Waiting, Locale::En) => "[waiting for answer]".to_string(),
            (StatusSegment::Waiting, Locale::Ja) => "[応答待ち]".to_string(),
            (StatusSegment::Hints, Locale::En) => {
                "Enter send | Shift+Enter newline | Ctrl-N new chat | Esc quit".to_string()
            }
            (StatusSegment::Hints, Locale::Ja) => {
                "Enter 送信 | Shift+Enter 改行 | Ctrl-N 新しいチャット | Esc 終了".to_string()
            }
            (StatusSegment::Count(n), _) => format!("{n}"),
        })
        .collect();
    truncate_to_width(&parts.join("  "), width as usize)
}

pub fn build_status(ctx: &StatusContext, width: u16) -> String {
    format_status(&compose_status(ctx), ctx.locale, width)
}

/// Longest prefix of `s` whose display width fits `width` cells.
pub(crate) fn truncate_to_width(s: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for g in grapheme::iter(s) {
        let w = grapheme::cluster_width(g);
        if used + w > width {
            break;
        }
        used += w;
        out.push_str(g);
    }
    out
}
