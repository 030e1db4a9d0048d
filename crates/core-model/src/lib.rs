//! Application model: the session controller that drives the analysis engine
//! and the transcript of the current chat.
//!
//! The controller owns the single `SessionState` for the input surface. Other
//! layers (terminal input, runtime loop, renderer) observe it read-only and
//! talk to it only through the `on_*` operations.

mod controller;
mod transcript;

pub use controller::{ControllerConfig, KeyOutcome, SessionController};
pub use transcript::{
    Message, MessageStatus, Role, Transcript, error_text, missing_answer_text,
};
