//! IME composition gate.
//!
//! Two states. Entering `Composing` captures the text as it stood before the
//! IME took over; leaving it hands that snapshot back so exactly one edit can
//! be recorded for the whole composition. Provisional preedit strings seen in
//! between are never recorded.

use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CompositionState {
    #[default]
    Idle,
    Composing {
        pre_snapshot: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionTracker {
    state: CompositionState,
}

impl CompositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_composing(&self) -> bool {
        matches!(self.state, CompositionState::Composing { .. })
    }

    pub fn state(&self) -> &CompositionState {
        &self.state
    }

    /// Snapshot captured at composition start, if composing.
    pub fn pre_snapshot(&self) -> Option<&str> {
        match &self.state {
            CompositionState::Composing { pre_snapshot } => Some(pre_snapshot),
            CompositionState::Idle => None,
        }
    }

    /// `Idle -> Composing`. A repeated start keeps the first snapshot so the
    /// eventual record spans the whole composition. Returns true on transition.
    pub fn start(&mut self, current_text: &str) -> bool {
        if self.is_composing() {
            debug!(target: "session.compose", "composition_start_while_composing");
            return false;
        }
        self.state = CompositionState::Composing {
            pre_snapshot: current_text.to_string(),
        };
        true
    }

    /// `Composing -> Idle`, yielding the pre-composition snapshot. `None` when
    /// no composition was active.
    pub fn end(&mut self) -> Option<String> {
        match std::mem::take(&mut self.state) {
            CompositionState::Composing { pre_snapshot } => Some(pre_snapshot),
            CompositionState::Idle => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = CompositionState::Idle;
    }
}
