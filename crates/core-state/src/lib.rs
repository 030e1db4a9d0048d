//! Session state for one input surface.
//!
//! `SessionState` gathers everything the analysis engine tracks between two
//! session boundaries: when the session started, the last recorded snapshot,
//! the time of the last recognized event, the backspace counter, the IME
//! composition gate, the idle detector and the edit log.
//!
//! Ownership:
//! - Exactly one `SessionState` exists per input surface and it is owned by the
//!   session controller (`core-model`). Mutators here are deliberately small so
//!   the controller stays the only place that sequences them.
//! - `reset` is the single session boundary. Focus gain, explicit new chat and
//!   post-submit all funnel through it, and it cancels the idle deadline so no
//!   stale thinking flag can appear after a reset.
//!
//! Timekeeping: every mutator takes `now: Instant` from the caller. Nothing in
//! this crate reads the clock except the recorder's internal validation, which
//! keeps every transition reproducible in tests.

pub mod composition;
pub mod edit;
pub mod thinking;

pub use composition::{CompositionState, CompositionTracker};
pub use edit::{EditLog, EditRecord, EditRecorder, EditSegment, EditTotals, SegmentKind};
pub use thinking::{IdlePoll, ThinkingConfig, ThinkingDetector};

use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    session_start: Option<Instant>,
    last_snapshot: String,
    last_event_time: Option<Instant>,
    backspace_count: u32,
    composition: CompositionTracker,
    thinking: ThinkingDetector,
    edit_log: EditLog,
}

impl SessionState {
    pub fn new(thinking: ThinkingConfig) -> Self {
        Self {
            thinking: ThinkingDetector::new(thinking),
            ..Self::default()
        }
    }

    pub fn session_start(&self) -> Option<Instant> {
        self.session_start
    }

    pub fn last_snapshot(&self) -> &str {
        &self.last_snapshot
    }

    pub fn last_event_time(&self) -> Option<Instant> {
        self.last_event_time
    }

    pub fn backspace_count(&self) -> u32 {
        self.backspace_count
    }

    pub fn is_composing(&self) -> bool {
        self.composition.is_composing()
    }

    pub fn pre_composition_snapshot(&self) -> Option<&str> {
        self.composition.pre_snapshot()
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking.is_thinking()
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        self.thinking.deadline()
    }

    pub fn edit_log(&self) -> &EditLog {
        &self.edit_log
    }

    /// Elapsed time since session start; zero when no session has started.
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.session_start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Session boundary: start a fresh session at `now` over `current_text`.
    pub fn reset(&mut self, now: Instant, current_text: &str) {
        self.session_start = Some(now);
        self.last_event_time = Some(now);
        self.last_snapshot.clear();
        self.last_snapshot.push_str(current_text);
        self.backspace_count = 0;
        self.composition.reset();
        self.thinking.reset();
        self.edit_log.clear();
        trace!(target: "session", snapshot_len = current_text.len(), "session_reset");
    }

    pub fn note_backspace(&mut self) -> u32 {
        self.backspace_count = self.backspace_count.saturating_add(1);
        self.backspace_count
    }

    /// Record `old -> new` through `recorder` into this session's log.
    pub fn record_edit(
        &mut self,
        recorder: &EditRecorder,
        old: &str,
        new: &str,
        now: Instant,
    ) -> bool {
        recorder.record(&mut self.edit_log, old, new, now).is_some()
    }

    /// Accept `text` as the latest snapshot observed at `now`.
    pub fn commit_snapshot(&mut self, text: &str, now: Instant) {
        if self.last_snapshot != text {
            self.last_snapshot.clear();
            self.last_snapshot.push_str(text);
        }
        self.last_event_time = Some(now);
    }

    pub fn composition_mut(&mut self) -> &mut CompositionTracker {
        &mut self.composition
    }

    pub fn thinking_mut(&mut self) -> &mut ThinkingDetector {
        &mut self.thinking
    }

    /// Poll the idle deadline against the current surface text.
    pub fn poll_idle(&mut self, now: Instant, text_empty: bool) -> IdlePoll {
        let last_event = self.last_event_time;
        self.thinking.poll(now, last_event, text_empty)
    }
}
