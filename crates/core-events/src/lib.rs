//! Core event types and channel helpers for the composer runtime.
//!
//! Every UI signal the analysis engine cares about (keystrokes, IME
//! composition boundaries, focus changes, pastes, timer ticks, answers coming
//! back from the inference server) is normalized into [`Event`] and pushed
//! through one bounded channel. The runtime consumes that channel on a single
//! task so handlers never run concurrently and arrival order is preserved.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::time::Instant;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. Producers (input task, tick source, answer
// tasks) await `send`, so a slow consumer applies backpressure instead of dropping keystrokes.
// Dropping events would break the composition ordering guarantee (a composition end must be seen
// before the next input event of the same key sequence).
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 4096;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static PASTE_EVENTS: AtomicU64 = AtomicU64::new(0);
pub static PASTE_BYTES: AtomicU64 = AtomicU64::new(0);
pub static KEYPRESS_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static KEYPRESS_REPEAT: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STARTS: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_SIGNAL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_CHANNEL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_STREAM: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_ERROR: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Command(CommandEvent),
    /// Outcome of an inference request spawned by the runtime.
    Answer(AnswerEvent),
    /// Periodic monotonic tick used to poll the idle (thinking) deadline.
    Tick,
    Shutdown,
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task. Implementors must stop once
    /// `tx.send(..).await` returns Err (channel closed).
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in monotonic tick source. Emits `Event::Tick` every configured interval.
pub struct TickEventSource {
    interval: std::time::Duration,
}

impl TickEventSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }
    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }
    /// Spawn all registered sources, returning their JoinHandles. Each source receives its own
    /// clone of `tx`; during shutdown the caller drops its final sender before awaiting the
    /// handles so the sources observe the closed channel and exit.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Front-end independent actions. Key bindings resolve to these, and a
/// front-end without a keyboard can send them directly as [`Event::Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEvent {
    /// Submit button equivalent (explicit submit trigger).
    Submit,
    /// Start a new conversation: clears transcript, input and session.
    NewChat,
    Quit,
}

/// Result of one inference round trip, routed back into the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEvent {
    pub request_id: u64,
    pub outcome: AnswerOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Answered(String),
    Failed(String),
}

/// Normalized input events.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Key-down with token, modifiers, timestamp and IME flag.
    KeyPress(KeyEventExt),
    /// Bracketed paste / clipboard payload (never logged verbatim; log lengths only).
    Paste(String),
    /// IME composition began; the surface text at this moment is the pre-composition snapshot.
    CompositionStart,
    /// In-progress preedit candidate. Provisional text; never recorded as an edit.
    CompositionUpdate { preedit: String },
    /// IME composition confirmed with the committed text.
    CompositionEnd { committed: String },
    FocusGained,
    FocusLost,
    Resize(u16, u16),
    /// Synthetic interrupt (Ctrl-C) surfaced distinctly.
    CtrlC,
}

/// Rich key-down metadata emitted by the input task.
///
/// `composing` mirrors the browser's `isComposing`: it is true when the key
/// was consumed by an active IME composition (e.g. the Enter that confirms a
/// candidate), and such keys never trigger a submit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyEventExt {
    pub token: KeyToken,
    pub repeat: bool,
    pub composing: bool,
    pub timestamp: Instant,
}

impl KeyEventExt {
    /// Create a `KeyEventExt` using the current instant, `repeat = false`, `composing = false`.
    pub fn new(token: KeyToken) -> Self {
        Self::from_parts(token, false, false, Instant::now())
    }

    /// Create a `KeyEventExt` using the current instant and explicit repeat bit.
    pub fn with_repeat(token: KeyToken, repeat: bool) -> Self {
        Self::from_parts(token, repeat, false, Instant::now())
    }

    /// Create a `KeyEventExt` with caller supplied timestamp (primarily for tests).
    pub fn from_parts(token: KeyToken, repeat: bool, composing: bool, timestamp: Instant) -> Self {
        Self {
            token,
            repeat,
            composing,
            timestamp,
        }
    }

    /// Base key with any chord wrapper removed.
    pub fn base(&self) -> &KeyToken {
        self.token.base()
    }

    pub fn mods(&self) -> ModMask {
        self.token.mods()
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModMask: u16 { const CTRL=1; const ALT=2; const SHIFT=4; const META=8; const SUPER=16; }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Esc,
    Backspace,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Delete,
}

/// Canonical logical key tokens.
///
/// `KeyToken::Chord` wraps a base token plus modifier mask so consumers can
/// reconstruct combinations such as Shift+Enter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyToken {
    Char(char),
    Named(NamedKey),
    Chord { base: Box<KeyToken>, mods: ModMask },
}

impl KeyToken {
    pub fn base(&self) -> &KeyToken {
        match self {
            KeyToken::Chord { base, .. } => base.base(),
            other => other,
        }
    }

    pub fn mods(&self) -> ModMask {
        match self {
            KeyToken::Chord { base, mods } => *mods | base.mods(),
            _ => ModMask::empty(),
        }
    }

    pub fn is_named(&self, key: NamedKey) -> bool {
        matches!(self.base(), KeyToken::Named(k) if *k == key)
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyToken::Char(_) => f.write_str("char"),
            KeyToken::Named(named) => write!(f, "{named:?}"),
            KeyToken::Chord { base, mods } => write!(f, "{mods:?}+{base}"),
        }
    }
}

/// Helper result type for event plumbing.
pub type EventResult<T> = anyhow::Result<T>;
