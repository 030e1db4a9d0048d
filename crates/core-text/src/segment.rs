//! Centralized normalization + segmentation adapter.
//!
//! Contract:
//! - Input: &str raw input (may be received from IME, paste, etc.)
//! - Output: (normalized NFC String, Vec<Segment>) where each segment is a grapheme cluster
//!   with absolute byte offsets into the normalized string and a display width (terminal cells).
//! - Guarantees: Clusters are in order, non-overlapping, cover the entire string when concatenated.
//! - Safety: Does not log content; callers should avoid logging raw text.

use crate::grapheme::cluster_width;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub cluster: String,
    pub start: usize, // byte offset in normalized string (inclusive)
    pub end: usize,   // byte offset in normalized string (exclusive)
    pub width: u16,   // terminal cell width
}

/// Normalize to NFC and segment into grapheme clusters with widths and byte ranges.
pub fn normalize_and_segment(input: &str) -> (String, Vec<Segment>) {
    let normalized: String = input.nfc().collect();
    let mut out = Vec::new();
    let mut byte = 0usize;
    for g in normalized.graphemes(true) {
        let len = g.len();
        out.push(Segment {
            cluster: g.to_string(),
            start: byte,
            end: byte + len,
            width: cluster_width(g) as u16,
        });
        byte += len;
    }
    (normalized, out)
}

/// NFC-normalize pasted or committed text. Carriage returns are folded into
/// `\n` so the surface only ever stores one line terminator.
pub fn normalize_input(input: &str) -> String {
    let folded = input.replace("\r\n", "\n").replace('\r', "\n");
    folded.nfc().collect()
}
