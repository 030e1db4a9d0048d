//! Terminal input service feeding the composer event loop.

mod async_service;
mod key_token;

pub use async_service::AsyncInputShutdown;

use async_service::spawn_async_event_task;

use core_events::Event;
use tokio::task::JoinHandle;

#[inline]
pub(crate) fn log_paste(data: &str) {
    tracing::trace!(target: "input.paste", len = data.len(), "paste_event");
}

/// Spawn the async input service backed by `crossterm::EventStream`.
///
/// Returns the `JoinHandle` for the background task alongside a shutdown handle
/// that can be used to request immediate termination.
pub fn spawn_async_input(
    sender: tokio::sync::mpsc::Sender<Event>,
) -> (JoinHandle<()>, AsyncInputShutdown) {
    spawn_async_event_task(sender)
}
