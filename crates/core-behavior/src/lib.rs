//! Behavior interpreter.
//!
//! Pure functions turning one session's measurements into a qualitative
//! interpretation plus the machine-usable [`BehaviorSummary`] that the request
//! builder consumes. Nothing here reads the clock or mutates session state, so
//! the same inputs always yield the same summary.

mod interpret;
mod locale;
mod prompt;

pub use interpret::{BehaviorClass, BehaviorInput, classify, interpret};
pub use locale::Locale;
pub use prompt::{rounded_seconds, system_prompt};

use core_state::{EditLog, EditTotals};
use std::time::Duration;

/// Everything derived from a session at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorSummary {
    pub edit_count: usize,
    pub added_chars: usize,
    pub removed_chars: usize,
    pub interpretation: String,
    pub class: BehaviorClass,
    pub duration_ms: u64,
    pub backspace_count: u32,
    pub final_length: usize,
    pub thinking: bool,
}

impl BehaviorSummary {
    /// Aggregate `log` and interpret the session.
    pub fn compute(
        log: &EditLog,
        duration: Duration,
        backspace_count: u32,
        final_length: usize,
        thinking: bool,
        locale: Locale,
    ) -> Self {
        let EditTotals {
            edits,
            added_chars,
            removed_chars,
        } = log.totals();
        let input = BehaviorInput {
            duration,
            edit_count: edits,
            backspace_count,
            final_length,
            thinking,
        };
        Self {
            edit_count: edits,
            added_chars,
            removed_chars,
            interpretation: interpret(&input, locale),
            class: classify(&input),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            backspace_count,
            final_length,
            thinking,
        }
    }

    /// One-line description of the edit history.
    pub fn edit_summary(&self, locale: Locale) -> String {
        if self.edit_count == 0 {
            locale.no_edits().to_string()
        } else {
            locale.edit_counts(self.edit_count, self.added_chars, self.removed_chars)
        }
    }
}
