//! Character diff engine.
//!
//! Contract (shared by every `DiffEngine`):
//! - Input: the previous and the next snapshot.
//! - Output: ordered parts shaped `{added, removed, value}` where at most one
//!   flag is set. Concatenating unflagged + `removed` parts reproduces `old`;
//!   unflagged + `added` parts reproduces `new`.
//! - Adjacent parts never share the same kind, and inside one change region
//!   removals precede additions.
//!
//! `CharDiff` trims the common prefix and suffix, then runs an LCS over the
//! remaining middle. Inputs whose middle would exceed `max_cells` table cells
//! degrade to a single remove + add pair, which still satisfies the contract.

use thiserror::Error;
use tracing::trace;

/// Default cap on LCS table cells (`old_mid * new_mid`).
pub const DEFAULT_MAX_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPart {
    pub added: bool,
    pub removed: bool,
    pub value: String,
}

impl DiffPart {
    pub fn common(value: impl Into<String>) -> Self {
        Self {
            added: false,
            removed: false,
            value: value.into(),
        }
    }
    pub fn added(value: impl Into<String>) -> Self {
        Self {
            added: true,
            removed: false,
            value: value.into(),
        }
    }
    pub fn removed(value: impl Into<String>) -> Self {
        Self {
            added: false,
            removed: true,
            value: value.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("diff engine unavailable")]
    Unavailable,
    #[error("diff engine produced malformed output: {0}")]
    Malformed(String),
}

/// Pure text differ used by the edit recorder.
pub trait DiffEngine: Send + Sync {
    fn diff(&self, old: &str, new: &str) -> Result<Vec<DiffPart>, DiffError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Common,
    Removed,
    Added,
}

/// LCS-based character differ.
#[derive(Debug, Clone, Copy)]
pub struct CharDiff {
    max_cells: usize,
}

impl Default for CharDiff {
    fn default() -> Self {
        Self::new()
    }
}

impl CharDiff {
    pub fn new() -> Self {
        Self {
            max_cells: DEFAULT_MAX_CELLS,
        }
    }

    pub fn with_max_cells(max_cells: usize) -> Self {
        Self { max_cells }
    }
}

impl DiffEngine for CharDiff {
    fn diff(&self, old: &str, new: &str) -> Result<Vec<DiffPart>, DiffError> {
        let a: Vec<char> = old.chars().collect();
        let b: Vec<char> = new.chars().collect();

        let prefix = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
        let suffix = a[prefix..]
            .iter()
            .rev()
            .zip(b[prefix..].iter().rev())
            .take_while(|(x, y)| x == y)
            .count();
        let a_mid = &a[prefix..a.len() - suffix];
        let b_mid = &b[prefix..b.len() - suffix];

        let mut builder = PartBuilder::default();
        for &c in &a[..prefix] {
            builder.push(Op::Common, c);
        }

        let cells = a_mid.len().saturating_mul(b_mid.len());
        if cells > self.max_cells {
            trace!(target: "diff", cells, max_cells = self.max_cells, "lcs_fallback");
            for &c in a_mid {
                builder.push(Op::Removed, c);
            }
            for &c in b_mid {
                builder.push(Op::Added, c);
            }
        } else {
            lcs_walk(a_mid, b_mid, &mut builder);
        }

        for &c in &a[a.len() - suffix..] {
            builder.push(Op::Common, c);
        }
        Ok(builder.finish())
    }
}

/// Forward walk over a suffix LCS table. Ties prefer removal so removed runs
/// come first within a change region.
fn lcs_walk(a: &[char], b: &[char], builder: &mut PartBuilder) {
    let n = a.len();
    let m = b.len();
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            builder.push(Op::Common, a[i]);
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            builder.push(Op::Removed, a[i]);
            i += 1;
        } else {
            builder.push(Op::Added, b[j]);
            j += 1;
        }
    }
    for &c in &a[i..] {
        builder.push(Op::Removed, c);
    }
    for &c in &b[j..] {
        builder.push(Op::Added, c);
    }
}

/// Coalesces per-character ops into parts. Pending removed/added text is held
/// until the next common character so each change region is emitted as
/// removed-then-added.
#[derive(Default)]
struct PartBuilder {
    parts: Vec<DiffPart>,
    common: String,
    removed: String,
    added: String,
}

impl PartBuilder {
    fn push(&mut self, op: Op, c: char) {
        match op {
            Op::Common => {
                self.flush_changes();
                self.common.push(c);
            }
            Op::Removed => {
                self.flush_common();
                self.removed.push(c);
            }
            Op::Added => {
                self.flush_common();
                self.added.push(c);
            }
        }
    }

    fn flush_common(&mut self) {
        if !self.common.is_empty() {
            self.parts
                .push(DiffPart::common(std::mem::take(&mut self.common)));
        }
    }

    fn flush_changes(&mut self) {
        if !self.removed.is_empty() {
            self.parts
                .push(DiffPart::removed(std::mem::take(&mut self.removed)));
        }
        if !self.added.is_empty() {
            self.parts
                .push(DiffPart::added(std::mem::take(&mut self.added)));
        }
    }

    fn finish(mut self) -> Vec<DiffPart> {
        self.flush_common();
        self.flush_changes();
        self.parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn rebuild(parts: &[DiffPart]) -> (String, String) {
        let mut old = String::new();
        let mut new = String::new();
        for p in parts {
            if !p.added {
                old.push_str(&p.value);
            }
            if !p.removed {
                new.push_str(&p.value);
            }
        }
        (old, new)
    }

    #[test]
    fn identical_inputs_yield_single_common_part() {
        let parts = CharDiff::new().diff("hello", "hello").unwrap();
        assert_eq!(parts, vec![DiffPart::common("hello")]);
    }

    #[test]
    fn empty_to_text_is_pure_addition() {
        let parts = CharDiff::new().diff("", "abc").unwrap();
        assert_eq!(parts, vec![DiffPart::added("abc")]);
        let parts = CharDiff::new().diff("abc", "").unwrap();
        assert_eq!(parts, vec![DiffPart::removed("abc")]);
        assert!(CharDiff::new().diff("", "").unwrap().is_empty());
    }

    #[test]
    fn appended_character() {
        let parts = CharDiff::new().diff("helo", "hello").unwrap();
        let (old, new) = rebuild(&parts);
        assert_eq!(old, "helo");
        assert_eq!(new, "hello");
        let added: usize = parts.iter().filter(|p| p.added).map(|p| p.value.chars().count()).sum();
        assert_eq!(added, 1);
    }

    #[test]
    fn replacement_orders_removed_before_added() {
        let parts = CharDiff::new().diff("cat", "cut").unwrap();
        assert_eq!(
            parts,
            vec![
                DiffPart::common("c"),
                DiffPart::removed("a"),
                DiffPart::added("u"),
                DiffPart::common("t"),
            ]
        );
    }

    #[test]
    fn multibyte_text_diffs_by_character() {
        let parts = CharDiff::new().diff("こんにちは", "こんばんは").unwrap();
        let (old, new) = rebuild(&parts);
        assert_eq!(old, "こんにちは");
        assert_eq!(new, "こんばんは");
        assert_eq!(parts.first(), Some(&DiffPart::common("こん")));
        assert_eq!(parts.last(), Some(&DiffPart::common("は")));
    }

    #[test]
    fn oversized_middle_falls_back_to_remove_add() {
        let parts = CharDiff::with_max_cells(4).diff("xabcy", "xdefy").unwrap();
        assert_eq!(
            parts,
            vec![
                DiffPart::common("x"),
                DiffPart::removed("abc"),
                DiffPart::added("def"),
                DiffPart::common("y"),
            ]
        );
    }

    #[test]
    fn adjacent_parts_never_share_a_kind() {
        let parts = CharDiff::new().diff("the quick fox", "a quick brown fox!").unwrap();
        for pair in parts.windows(2) {
            assert!(
                (pair[0].added, pair[0].removed) != (pair[1].added, pair[1].removed),
                "adjacent parts share a kind: {pair:?}"
            );
        }
    }

    proptest! {
        #[test]
        fn parts_reconstruct_both_snapshots(old in "\\PC{0,24}", new in "\\PC{0,24}") {
            let parts = CharDiff::new().diff(&old, &new).unwrap();
            let (rebuilt_old, rebuilt_new) = rebuild(&parts);
            prop_assert_eq!(rebuilt_old, old);
            prop_assert_eq!(rebuilt_new, new);
            prop_assert!(parts.iter().all(|p| !(p.added && p.removed)));
            prop_assert!(parts.iter().all(|p| !p.value.is_empty()));
        }
    }
}
