//! Text primitives for the composer: the editable input surface, the
//! character diff engine used by the edit recorder, and the grapheme helpers
//! both of them lean on.

pub mod diff;
pub mod segment;
pub mod surface;

pub use diff::{CharDiff, DiffEngine, DiffError, DiffPart};
pub use surface::TextSurface;

/// Length of a snapshot in Unicode scalar values. All character counts the
/// analysis reports (final length, added / removed chars) use this unit.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Grapheme and width utilities. Pure helpers over a `&str`.
pub mod grapheme {
    use unicode_segmentation::UnicodeSegmentation;
    use unicode_width::UnicodeWidthStr;

    /// Iterate grapheme clusters.
    pub fn iter(text: &str) -> impl Iterator<Item = &str> {
        text.graphemes(true)
    }

    /// Previous grapheme boundary (returns 0 if already at or below 1st boundary).
    pub fn prev_boundary(text: &str, byte: usize) -> usize {
        if byte == 0 || byte > text.len() {
            return 0;
        }
        let mut last = 0;
        for (idx, _) in text.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            last = idx;
        }
        last
    }

    /// Next grapheme boundary (returns text.len() if at or beyond end).
    pub fn next_boundary(text: &str, byte: usize) -> usize {
        if byte >= text.len() {
            return text.len();
        }
        for (idx, _) in text.grapheme_indices(true) {
            if idx > byte {
                return idx;
            }
        }
        text.len()
    }

    /// Visual column (terminal cells) up to (but not including) byte offset.
    pub fn visual_col(text: &str, byte: usize) -> usize {
        let mut col = 0;
        for (idx, g) in text.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            col += cluster_width(g);
        }
        col
    }

    /// Width in terminal cells of this grapheme cluster. Pictographic clusters
    /// the baseline table measures as 1 are widened to 2.
    pub fn cluster_width(g: &str) -> usize {
        let w = g.width();
        if w == 1 && g.chars().any(|c| c == '\u{FE0F}' || ('\u{1F300}'..='\u{1FAFF}').contains(&c)) {
            2
        } else {
            w
        }
    }
}
