use crate::key_token::map_key_event;
use crate::log_paste;
use core_events::{
    ASYNC_INPUT_STARTS, ASYNC_INPUT_STOP_CHANNEL, ASYNC_INPUT_STOP_ERROR, ASYNC_INPUT_STOP_SIGNAL,
    ASYNC_INPUT_STOP_STREAM, CHANNEL_SEND_FAILURES, Event, InputEvent, KEYPRESS_REPEAT,
    KEYPRESS_TOTAL, KeyEventExt, KeyToken, PASTE_BYTES, PASTE_EVENTS,
};
use crossterm::event::{
    Event as CEvent, EventStream, KeyCode as CKeyCode, KeyEvent as CKeyEvent,
    KeyEventKind as CKind, KeyModifiers as CMods,
};
use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task;
use tokio_stream::StreamExt;
use tracing::{info, trace, warn};

#[derive(Clone, Debug)]
pub struct AsyncInputShutdown {
    notify: Arc<Notify>,
}

impl AsyncInputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Debug)]
struct ShutdownListener {
    notify: Arc<Notify>,
}

impl ShutdownListener {
    fn new_pair() -> (AsyncInputShutdown, Self) {
        let notify = Arc::new(Notify::new());
        (
            AsyncInputShutdown {
                notify: notify.clone(),
            },
            ShutdownListener { notify },
        )
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Spawn the input task reading `crossterm::EventStream`.
pub(crate) fn spawn_async_event_task(
    sender: Sender<Event>,
) -> (task::JoinHandle<()>, AsyncInputShutdown) {
    let (shutdown, listener) = ShutdownListener::new_pair();
    let handle = task::spawn(async move {
        let span = tracing::debug_span!(target: "input.thread", "input_async_task");
        let _enter = span.enter();

        let stream = EventStream::new();
        AsyncEventStreamTask::new(sender, stream, listener)
            .run()
            .await;
    });

    (handle, shutdown)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    Running,
    ShutdownSignal,
    ChannelClosed,
    StreamEnded,
    StreamError,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Running => "running",
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
            ExitReason::StreamEnded => "stream_ended",
            ExitReason::StreamError => "stream_error",
        }
    }
}

struct AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    sender: Sender<Event>,
    stream: S,
    shutdown: ShutdownListener,
    exit_reason: ExitReason,
    stream_error: Option<io::ErrorKind>,
}

impl<S> AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    fn new(sender: Sender<Event>, stream: S, shutdown: ShutdownListener) -> Self {
        Self {
            sender,
            stream,
            shutdown,
            exit_reason: ExitReason::Running,
            stream_error: None,
        }
    }

    pub async fn run(mut self) {
        info!(target: "input.thread", "async_input_task_started");
        ASYNC_INPUT_STARTS.fetch_add(1, Ordering::Relaxed);
        self.exit_reason = ExitReason::StreamEnded;
        loop {
            let maybe_result = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    self.exit_reason = ExitReason::ShutdownSignal;
                    break;
                }
                result = self.stream.next() => result,
            };

            let Some(result) = maybe_result else {
                break;
            };

            let keep_going = match result {
                Ok(CEvent::Key(key)) => self.handle_key_event(key).await,
                Ok(CEvent::Paste(data)) => self.handle_paste(data).await,
                Ok(CEvent::FocusGained) => {
                    trace!(target: "input.event", kind = "focus_gained");
                    self.send_event(Event::Input(InputEvent::FocusGained)).await
                }
                Ok(CEvent::FocusLost) => {
                    trace!(target: "input.event", kind = "focus_lost");
                    self.send_event(Event::Input(InputEvent::FocusLost)).await
                }
                Ok(CEvent::Resize(w, h)) => {
                    trace!(target: "input.event", w, h, "resize");
                    self.send_event(Event::Input(InputEvent::Resize(w, h))).await
                }
                Ok(CEvent::Mouse(_)) => true,
                Err(err) => {
                    self.exit_reason = ExitReason::StreamError;
                    self.stream_error = Some(err.kind());
                    false
                }
            };
            if !keep_going {
                break;
            }
        }

        let reason = match self.exit_reason {
            ExitReason::Running => ExitReason::StreamEnded,
            other => other,
        };

        match reason {
            ExitReason::ShutdownSignal => {
                ASYNC_INPUT_STOP_SIGNAL.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::ChannelClosed => {
                ASYNC_INPUT_STOP_CHANNEL.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::StreamEnded => {
                ASYNC_INPUT_STOP_STREAM.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::StreamError => {
                ASYNC_INPUT_STOP_ERROR.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::Running => {}
        }

        if matches!(reason, ExitReason::StreamError) {
            if let Some(kind) = self.stream_error {
                warn!(target: "input.thread", error_kind = ?kind, "async_input_task_stream_error");
            } else {
                warn!(target: "input.thread", "async_input_task_stream_error");
            }
        }

        info!(target: "input.thread", reason = reason.as_str(), "async_input_task_stopped");
    }

    async fn handle_key_event(&mut self, key: CKeyEvent) -> bool {
        if !matches!(key.kind, CKind::Press | CKind::Repeat) {
            return true;
        }

        if matches!(key.code, CKeyCode::Char('c')) && key.modifiers.contains(CMods::CONTROL) {
            return self.send_event(Event::Input(InputEvent::CtrlC)).await;
        }

        let Some(parts) = map_key_event(&key) else {
            return true;
        };
        let repeat = parts.repeat;
        let mods = parts.mods;
        let token = parts.into_token();

        trace!(
            target: "input.event",
            kind = "keypress",
            repeat,
            mods = ?mods,
            token_kind = token_kind_label(&token)
        );

        // Terminals deliver committed text only, so a key is never mid-composition here.
        let event = Event::Input(InputEvent::KeyPress(KeyEventExt::from_parts(
            token,
            repeat,
            false,
            Instant::now(),
        )));
        let sent = self.send_event(event).await;
        if sent {
            KEYPRESS_TOTAL.fetch_add(1, Ordering::Relaxed);
            if repeat {
                KEYPRESS_REPEAT.fetch_add(1, Ordering::Relaxed);
            }
        }
        sent
    }

    async fn handle_paste(&mut self, data: String) -> bool {
        log_paste(&data);
        let len = data.len() as u64;
        let sent = self.send_event(Event::Input(InputEvent::Paste(data))).await;
        if sent {
            PASTE_EVENTS.fetch_add(1, Ordering::Relaxed);
            PASTE_BYTES.fetch_add(len, Ordering::Relaxed);
        }
        sent
    }

    async fn send_event(&mut self, event: Event) -> bool {
        match self.sender.send(event).await {
            Ok(_) => true,
            Err(_) => {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                if !matches!(self.exit_reason, ExitReason::ShutdownSignal) {
                    self.exit_reason = ExitReason::ChannelClosed;
                }
                false
            }
        }
    }
}

fn token_kind_label(token: &KeyToken) -> &'static str {
    match token {
        KeyToken::Char(_) => "char",
        KeyToken::Named(_) => "named",
        KeyToken::Chord { .. } => "chord",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{ModMask, NamedKey};
    use std::sync::Mutex;
    use tokio::sync::{Mutex as TokioMutex, mpsc};
    use tokio::time::{Duration, timeout};
    use tokio_stream::wrappers::UnboundedReceiverStream;
    use tracing::{Metadata, Subscriber, subscriber::Interest};

    use tracing::field::{Field, Visit};
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    static LOG_CAPTURE_GUARD: TokioMutex<()> = TokioMutex::const_new(());

    #[derive(Clone, Default)]
    struct LogCapture {
        events: Arc<Mutex<Vec<CapturedLog>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedLog {
        target: String,
        fields: Vec<(String, String)>,
    }

    #[derive(Default)]
    struct LogVisitor {
        fields: Vec<(String, String)>,
    }

    impl Visit for LogVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S> Layer<S> for LogCapture
    where
        S: Subscriber,
    {
        fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
            Interest::always()
        }

        fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
            metadata.target().starts_with("input.")
        }

        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = LogVisitor::default();
            event.record(&mut visitor);
            let meta = event.metadata();
            self.events.lock().unwrap().push(CapturedLog {
                target: meta.target().to_string(),
                fields: visitor.fields,
            });
        }
    }

    fn key(code: CKeyCode, mods: CMods) -> CEvent {
        CEvent::Key(CKeyEvent::new(code, mods))
    }

    #[tokio::test]
    async fn forwards_basic_key_events() {
        let base_total = KEYPRESS_TOTAL.load(Ordering::Relaxed);

        let outputs = run_scenario(vec![key(CKeyCode::Char('a'), CMods::NONE)]).await;

        match outputs.as_slice() {
            [Event::Input(InputEvent::KeyPress(keypress))] => {
                assert!(matches!(keypress.token, KeyToken::Char('a')));
                assert!(!keypress.repeat);
                assert!(!keypress.composing);
            }
            other => panic!("unexpected output sequence: {other:?}"),
        }
        assert!(KEYPRESS_TOTAL.load(Ordering::Relaxed) > base_total);
    }

    #[tokio::test]
    async fn shift_enter_arrives_as_chord() {
        let outputs = run_scenario(vec![key(CKeyCode::Enter, CMods::SHIFT)]).await;
        match outputs.as_slice() {
            [Event::Input(InputEvent::KeyPress(keypress))] => {
                assert!(keypress.token.is_named(NamedKey::Enter));
                assert!(keypress.mods().contains(ModMask::SHIFT));
            }
            other => panic!("unexpected output sequence: {other:?}"),
        }
    }

    #[tokio::test]
    async fn release_events_are_ignored() {
        let mut release = CKeyEvent::new(CKeyCode::Char('x'), CMods::NONE);
        release.kind = CKind::Release;
        let outputs = run_scenario(vec![CEvent::Key(release)]).await;
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn forwards_ctrl_c() {
        let outputs = run_scenario(vec![key(CKeyCode::Char('c'), CMods::CONTROL)]).await;
        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::CtrlC)]
        ));
    }

    #[tokio::test]
    async fn forwards_focus_and_resize() {
        let outputs = run_scenario(vec![
            CEvent::FocusLost,
            CEvent::FocusGained,
            CEvent::Resize(120, 48),
        ])
        .await;
        assert!(matches!(
            outputs.as_slice(),
            [
                Event::Input(InputEvent::FocusLost),
                Event::Input(InputEvent::FocusGained),
                Event::Input(InputEvent::Resize(120, 48)),
            ]
        ));
    }

    #[tokio::test]
    async fn paste_is_forwarded_whole_and_logged_by_length() {
        let _log_guard = LOG_CAPTURE_GUARD.lock().await;
        let capture = LogCapture::default();
        let events_handle = capture.events.clone();
        let subscriber = Registry::default().with(capture.with_filter(LevelFilter::TRACE));
        let dispatch = tracing::Dispatch::new(subscriber);
        let _guard = tracing::dispatcher::set_default(&dispatch);

        let base_events = PASTE_EVENTS.load(Ordering::Relaxed);
        let base_bytes = PASTE_BYTES.load(Ordering::Relaxed);

        let payload = "private question\r\nline two";
        let outputs = run_scenario(vec![CEvent::Paste(payload.to_string())]).await;
        match outputs.as_slice() {
            [Event::Input(InputEvent::Paste(data))] => assert_eq!(data, payload),
            other => panic!("unexpected output sequence: {other:?}"),
        }
        assert!(PASTE_EVENTS.load(Ordering::Relaxed) > base_events);
        assert!(PASTE_BYTES.load(Ordering::Relaxed) - base_bytes >= payload.len() as u64);

        let logs = events_handle.lock().unwrap();
        let paste_log = logs
            .iter()
            .find(|entry| entry.target == "input.paste")
            .unwrap_or_else(|| panic!("missing input.paste log, captured: {logs:?}"));
        assert!(paste_log.fields.iter().any(|(k, _)| k == "len"));
        for entry in logs.iter() {
            for (_, v) in &entry.fields {
                assert!(!v.contains("private question"), "leaked paste: {v}");
            }
        }
    }

    #[tokio::test]
    async fn logs_startup_and_shutdown_reason_on_signal() {
        let _log_guard = LOG_CAPTURE_GUARD.lock().await;
        let capture = LogCapture::default();
        let events_handle = capture.events.clone();
        let subscriber = Registry::default().with(capture.with_filter(LevelFilter::TRACE));
        let dispatch = tracing::Dispatch::new(subscriber);
        let _guard = tracing::dispatcher::set_default(&dispatch);

        let base_signal = ASYNC_INPUT_STOP_SIGNAL.load(Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::unbounded_channel::<io::Result<CEvent>>();
        let stream = UnboundedReceiverStream::new(event_rx);
        let (shutdown, listener) = ShutdownListener::new_pair();

        let notifier = shutdown.clone();
        let signal_task = tokio::spawn(async move {
            tokio::task::yield_now().await;
            notifier.signal();
        });

        let _keep_alive = event_tx;
        AsyncEventStreamTask::new(tx, stream, listener).run().await;
        signal_task.await.unwrap();
        drop(rx);

        let logged = events_handle.lock().unwrap();
        let stop_event = logged
            .iter()
            .find(|entry| {
                entry.target == "input.thread"
                    && entry
                        .fields
                        .iter()
                        .any(|(k, v)| k == "message" && v == "async_input_task_stopped")
            })
            .unwrap_or_else(|| panic!("missing stop log, captured events: {:?}", *logged));
        let reason = stop_event
            .fields
            .iter()
            .find(|(k, _)| k == "reason")
            .map(|(_, v)| v.trim_matches('"'))
            .unwrap_or_default();
        assert_eq!(reason, "shutdown_signal");
        assert!(ASYNC_INPUT_STOP_SIGNAL.load(Ordering::Relaxed) > base_signal);
    }

    #[tokio::test]
    async fn channel_closed_increments_telemetry() {
        let base_channel = ASYNC_INPUT_STOP_CHANNEL.load(Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let stream = tokio_stream::iter(vec![Ok(CEvent::FocusGained)]);
        let (_shutdown, listener) = ShutdownListener::new_pair();

        AsyncEventStreamTask::new(tx, stream, listener).run().await;

        assert!(ASYNC_INPUT_STOP_CHANNEL.load(Ordering::Relaxed) > base_channel);
    }

    #[tokio::test]
    async fn stream_error_stops_task() {
        let base_error = ASYNC_INPUT_STOP_ERROR.load(Ordering::Relaxed);
        let (tx, mut rx) = mpsc::channel(4);
        let stream = tokio_stream::iter(vec![
            Ok(CEvent::FocusGained),
            Err(io::Error::other("tty gone")),
            Ok(CEvent::FocusLost),
        ]);
        let (_shutdown, listener) = ShutdownListener::new_pair();
        AsyncEventStreamTask::new(tx, stream, listener).run().await;

        assert!(matches!(rx.recv().await, Some(Event::Input(InputEvent::FocusGained))));
        assert!(rx.recv().await.is_none());
        assert!(ASYNC_INPUT_STOP_ERROR.load(Ordering::Relaxed) > base_error);
    }

    #[tokio::test]
    async fn shutdown_signal_exits_immediately() {
        let (tx, mut rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::unbounded_channel::<io::Result<CEvent>>();
        let stream = UnboundedReceiverStream::new(event_rx);
        let (shutdown, listener) = ShutdownListener::new_pair();

        let task = tokio::spawn(async move {
            let _keep_alive = event_tx;
            AsyncEventStreamTask::new(tx, stream, listener).run().await;
        });

        shutdown.signal();

        timeout(Duration::from_millis(50), task)
            .await
            .expect("shutdown should resolve promptly")
            .expect("task join failed");

        assert!(rx.recv().await.is_none());
    }

    async fn run_scenario(events: Vec<CEvent>) -> Vec<Event> {
        let (tx, mut rx) = mpsc::channel(64);
        let stream = tokio_stream::iter(events.into_iter().map(Ok));
        let (_shutdown, listener) = ShutdownListener::new_pair();
        AsyncEventStreamTask::new(tx, stream, listener).run().await;

        let mut outputs = Vec::new();
        while let Some(evt) = rx.recv().await {
            outputs.push(evt);
        }
        outputs
    }
}
