//! Session controller.
//!
//! The only component allowed to mutate [`SessionState`]. UI events arrive in
//! arrival order and each operation here runs to completion before the next,
//! so a composition end is always fully recorded before the following input.
//!
//! Session boundaries (`on_focus_gain`, `on_reset`, the tail of `on_submit`)
//! all go through [`SessionState::reset`], which also cancels the pending idle
//! deadline.

use std::time::Instant;

use core_behavior::{BehaviorSummary, Locale, system_prompt};
use core_events::{KeyEventExt, KeyToken, ModMask, NamedKey};
use core_state::{EditRecorder, IdlePoll, SessionState, ThinkingConfig};
use core_text::{CharDiff, DiffEngine, char_len};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerConfig {
    pub thinking: ThinkingConfig,
    pub locale: Locale,
}

/// What the surface should do with a key the controller has observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Enter without Shift outside a composition.
    Submit,
    /// Shift+Enter.
    InsertNewline,
    /// Backspace was counted; the surface still performs the deletion.
    Backspace,
    /// Enter swallowed because the IME is composing.
    Swallowed,
    /// Not interesting to the analysis; the surface handles it normally.
    Pass,
}

#[derive(Debug)]
pub struct SessionController {
    state: SessionState,
    recorder: EditRecorder,
    locale: Locale,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl SessionController {
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_engine(config, Box::new(CharDiff::new()))
    }

    pub fn with_engine(config: ControllerConfig, engine: Box<dyn DiffEngine>) -> Self {
        Self {
            state: SessionState::new(config.thinking),
            recorder: EditRecorder::new(engine),
            locale: config.locale,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn on_focus_gain(&mut self, current_text: &str, now: Instant) {
        debug!(target: "session", text_len = current_text.len(), "focus_gained");
        self.state.reset(now, current_text);
    }

    /// Blur drops the pending idle deadline; the flag and the log survive.
    pub fn on_focus_lost(&mut self) {
        debug!(target: "session", "focus_lost");
        self.state.thinking_mut().cancel();
    }

    /// A raw text mutation. Returns true when an edit record was appended.
    ///
    /// While composing (either the event says so or a composition is open)
    /// nothing is recorded and the idle deadline is left alone.
    pub fn on_mutation(&mut self, new_text: &str, composing: bool, now: Instant) -> bool {
        if composing || self.state.is_composing() {
            trace!(target: "session.compose", text_len = new_text.len(), "mutation_suppressed");
            return false;
        }
        let recorded = self.record_against_snapshot(new_text, now);
        self.state.thinking_mut().rearm(now);
        recorded
    }

    pub fn on_composition_start(&mut self, current_text: &str) {
        if self.state.composition_mut().start(current_text) {
            debug!(target: "session.compose", text_len = current_text.len(), "composition_started");
        }
    }

    /// Close the composition with one record spanning it, then behave like the
    /// input event that follows a confirmed composition.
    pub fn on_composition_end(&mut self, final_text: &str, now: Instant) -> bool {
        let recorded = match self.state.composition_mut().end() {
            Some(pre) => {
                let recorded = self.state.record_edit(&self.recorder, &pre, final_text, now);
                self.state.commit_snapshot(final_text, now);
                recorded
            }
            None => {
                debug!(target: "session.compose", "composition_end_without_start");
                self.record_against_snapshot(final_text, now)
            }
        };
        debug!(target: "session.compose", recorded, "composition_ended");
        self.state.thinking_mut().rearm(now);
        recorded
    }

    pub fn on_backspace_key(&mut self) -> u32 {
        self.state.note_backspace()
    }

    /// Classify a key-down. Backspace counts even inside a composition.
    pub fn on_key_down(&mut self, key: &KeyEventExt) -> KeyOutcome {
        let composing = key.composing || self.state.is_composing();
        match (key.base(), key.mods()) {
            (KeyToken::Named(NamedKey::Backspace), _) => {
                self.on_backspace_key();
                KeyOutcome::Backspace
            }
            (KeyToken::Named(NamedKey::Enter), _) if composing => KeyOutcome::Swallowed,
            (KeyToken::Named(NamedKey::Enter), mods) if mods.contains(ModMask::SHIFT) => {
                KeyOutcome::InsertNewline
            }
            (KeyToken::Named(NamedKey::Enter), mods) if mods.is_empty() => KeyOutcome::Submit,
            _ => KeyOutcome::Pass,
        }
    }

    /// Runtime tick: check the idle deadline against the current text.
    pub fn poll_idle(&mut self, now: Instant, current_text: &str) -> IdlePoll {
        self.state.poll_idle(now, current_text.is_empty())
    }

    /// Whether a submit trigger should go through.
    pub fn can_submit(text: &str, request_in_flight: bool) -> bool {
        !request_in_flight && !text.trim().is_empty()
    }

    /// Summarize the session that produced `final_text`, then start a new
    /// session over the cleared surface.
    pub fn on_submit(&mut self, final_text: &str, now: Instant) -> BehaviorSummary {
        let summary = BehaviorSummary::compute(
            self.state.edit_log(),
            self.state.elapsed(now),
            self.state.backspace_count(),
            char_len(final_text),
            self.state.is_thinking(),
            self.locale,
        );
        info!(
            target: "analysis",
            duration_ms = summary.duration_ms,
            edits = summary.edit_count,
            added = summary.added_chars,
            removed = summary.removed_chars,
            backspaces = summary.backspace_count,
            final_len = summary.final_length,
            thinking = summary.thinking,
            class = %summary.class,
            "behavior_summary"
        );
        self.state.reset(now, "");
        summary
    }

    pub fn on_reset(&mut self, current_text: &str, now: Instant) {
        debug!(target: "session", "explicit_reset");
        self.state.reset(now, current_text);
    }

    pub fn system_prompt(&self, summary: &BehaviorSummary) -> String {
        system_prompt(summary, self.locale)
    }

    fn record_against_snapshot(&mut self, new_text: &str, now: Instant) -> bool {
        if new_text == self.state.last_snapshot() {
            self.state.commit_snapshot(new_text, now);
            return false;
        }
        let old = self.state.last_snapshot().to_string();
        let recorded = self.state.record_edit(&self.recorder, &old, new_text, now);
        self.state.commit_snapshot(new_text, now);
        recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(token: KeyToken) -> KeyEventExt {
        KeyEventExt::new(token)
    }

    #[test]
    fn enter_submits_and_shift_enter_inserts_newline() {
        let mut c = SessionController::default();
        assert_eq!(c.on_key_down(&key(KeyToken::Named(NamedKey::Enter))), KeyOutcome::Submit);
        let shift_enter = KeyToken::Chord {
            base: Box::new(KeyToken::Named(NamedKey::Enter)),
            mods: ModMask::SHIFT,
        };
        assert_eq!(c.on_key_down(&key(shift_enter)), KeyOutcome::InsertNewline);
    }

    #[test]
    fn enter_while_composing_is_swallowed() {
        let mut c = SessionController::default();
        let composing = KeyEventExt::from_parts(
            KeyToken::Named(NamedKey::Enter),
            false,
            true,
            Instant::now(),
        );
        assert_eq!(c.on_key_down(&composing), KeyOutcome::Swallowed);
        c.on_composition_start("");
        assert_eq!(c.on_key_down(&key(KeyToken::Named(NamedKey::Enter))), KeyOutcome::Swallowed);
    }

    #[test]
    fn backspace_counts_even_while_composing() {
        let mut c = SessionController::default();
        c.on_focus_gain("", Instant::now());
        c.on_composition_start("");
        assert_eq!(
            c.on_key_down(&key(KeyToken::Named(NamedKey::Backspace))),
            KeyOutcome::Backspace
        );
        assert_eq!(c.on_backspace_key(), 2);
    }

    #[test]
    fn submit_gate_ignores_blank_and_in_flight() {
        assert!(!SessionController::can_submit("   \n", false));
        assert!(!SessionController::can_submit("hi", true));
        assert!(SessionController::can_submit(" hi ", false));
    }

    #[test]
    fn focus_lost_cancels_deadline_but_keeps_log() {
        let t0 = Instant::now();
        let mut c = SessionController::default();
        c.on_focus_gain("", t0);
        assert!(c.on_mutation("a", false, t0));
        assert!(c.state().idle_deadline().is_some());
        c.on_focus_lost();
        assert_eq!(c.state().idle_deadline(), None);
        assert_eq!(c.state().edit_log().len(), 1);
        assert_eq!(c.poll_idle(t0 + Duration::from_secs(5), "a"), IdlePoll::Disarmed);
    }

    #[test]
    fn unchanged_mutation_rearms_without_recording() {
        let t0 = Instant::now();
        let mut c = SessionController::default();
        c.on_focus_gain("x", t0);
        assert!(!c.on_mutation("x", false, t0 + Duration::from_millis(100)));
        assert_eq!(
            c.state().last_event_time(),
            Some(t0 + Duration::from_millis(100))
        );
        assert_eq!(
            c.state().idle_deadline(),
            Some(t0 + Duration::from_millis(3100))
        );
        assert!(c.state().edit_log().is_empty());
    }
}
