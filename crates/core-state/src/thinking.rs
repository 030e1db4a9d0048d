//! Idle ("thinking") detector.
//!
//! A single-shot debounce expressed as a deadline rather than a spawned timer:
//! arming sets `deadline = now + idle_timeout`, re-arming overwrites it, and
//! the runtime's periodic tick calls [`ThinkingDetector::poll`]. At most one
//! deadline is outstanding. When it expires the flag is raised only if the text
//! is non-empty and at least `idle_threshold` has passed since the last event,
//! both measured at poll time.

use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_millis(2900);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingConfig {
    pub idle_timeout: Duration,
    pub idle_threshold: Duration,
}

impl Default for ThinkingConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}

/// Result of one deadline poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdlePoll {
    /// No deadline armed.
    Disarmed,
    /// Deadline armed but not reached.
    Pending,
    /// Deadline expired and the thinking flag was raised.
    Flagged,
    /// Deadline expired but the flag was not raised (empty text or recent event).
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinkingDetector {
    config: ThinkingConfig,
    deadline: Option<Instant>,
    thinking: bool,
}

impl ThinkingDetector {
    pub fn new(config: ThinkingConfig) -> Self {
        Self {
            config,
            deadline: None,
            thinking: false,
        }
    }

    pub fn config(&self) -> ThinkingConfig {
        self.config
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Clear the flag and (re)arm the deadline from `now`.
    pub fn rearm(&mut self, now: Instant) {
        self.thinking = false;
        self.deadline = Some(now + self.config.idle_timeout);
    }

    /// Drop any pending deadline without touching the flag.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Drop the deadline and clear the flag.
    pub fn reset(&mut self) {
        self.deadline = None;
        self.thinking = false;
    }

    pub fn poll(&mut self, now: Instant, last_event: Option<Instant>, text_empty: bool) -> IdlePoll {
        let Some(deadline) = self.deadline else {
            return IdlePoll::Disarmed;
        };
        if now < deadline {
            return IdlePoll::Pending;
        }
        self.deadline = None;

        let idle_for = last_event
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::MAX);
        if text_empty || idle_for < self.config.idle_threshold {
            debug!(
                target: "session.thinking",
                text_empty,
                idle_ms = idle_for.as_millis() as u64,
                "idle_deadline_skipped"
            );
            return IdlePoll::Skipped;
        }
        self.thinking = true;
        debug!(
            target: "session.thinking",
            idle_ms = idle_for.as_millis() as u64,
            "thinking_flagged"
        );
        IdlePoll::Flagged
    }
}
