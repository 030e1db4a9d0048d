use core_behavior::{BehaviorClass, Locale};
use core_model::{ControllerConfig, SessionController};
use core_state::{IdlePoll, ThinkingConfig};
use pretty_assertions::assert_eq;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::Subscriber;
use tracing::dispatcher::Dispatch;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn typed(c: &mut SessionController, start: Instant, steps: &[(&str, u64)]) {
    for (text, at) in steps {
        c.on_mutation(text, false, start + ms(*at));
    }
}

#[test]
fn submit_resets_session() {
    let t0 = Instant::now();
    let mut c = SessionController::default();
    c.on_focus_gain("", t0);
    typed(&mut c, t0, &[("h", 100), ("he", 200), ("hex", 300), ("he", 400), ("hey", 500)]);
    c.on_backspace_key();
    assert_eq!(c.poll_idle(t0 + ms(3600), "hey"), IdlePoll::Flagged);

    let summary = c.on_submit("hey", t0 + ms(4000));
    assert_eq!(summary.edit_count, 5);
    assert_eq!(summary.backspace_count, 1);
    assert!(summary.thinking);
    assert_eq!(summary.final_length, 3);
    assert_eq!(summary.duration_ms, 4000);

    let s = c.state();
    assert!(s.edit_log().is_empty());
    assert_eq!(s.backspace_count(), 0);
    assert!(!s.is_thinking());
    assert_eq!(s.idle_deadline(), None);
    assert_eq!(s.last_snapshot(), "");
    assert_eq!(s.session_start(), Some(t0 + ms(4000)));
}

#[test]
fn explicit_reset_matches_focus_gain() {
    let t0 = Instant::now();
    let mut c = SessionController::default();
    c.on_focus_gain("", t0);
    typed(&mut c, t0, &[("a", 10), ("ab", 20)]);
    c.on_backspace_key();
    c.on_composition_start("ab");
    c.on_reset("kept", t0 + ms(50));

    let s = c.state();
    assert!(s.edit_log().is_empty());
    assert_eq!(s.backspace_count(), 0);
    assert!(!s.is_thinking());
    assert!(!s.is_composing());
    assert_eq!(s.idle_deadline(), None);
    assert_eq!(s.last_snapshot(), "kept");
}

#[test]
fn composition_produces_exactly_one_record() {
    let t0 = Instant::now();
    let mut c = SessionController::default();
    c.on_focus_gain("", t0);
    typed(&mut c, t0, &[("I ", 100)]);
    assert_eq!(c.state().edit_log().len(), 1);

    c.on_composition_start("I ");
    for (i, preedit) in ["I k", "I か", "I かn", "I かん", "I かんj", "I かんじ"]
        .iter()
        .enumerate()
    {
        assert!(!c.on_mutation(preedit, true, t0 + ms(200 + i as u64 * 50)));
    }
    assert_eq!(c.state().edit_log().len(), 1);

    assert!(c.on_composition_end("I 漢字", t0 + ms(800)));
    let log = c.state().edit_log();
    assert_eq!(log.len(), 2);
    let last = log.last().expect("record");
    assert_eq!(last.old_text(), "I ");
    assert_eq!(last.new_text(), "I 漢字");
    assert_eq!(last.added_chars(), 2);
    assert_eq!(c.state().last_snapshot(), "I 漢字");
    assert_eq!(c.state().last_event_time(), Some(t0 + ms(800)));
    // The confirm behaves like an input event and re-arms the idle deadline.
    assert_eq!(c.state().idle_deadline(), Some(t0 + ms(3800)));
}

#[test]
fn idle_with_text_flags_thinking_and_empty_text_does_not() {
    let t0 = Instant::now();
    let mut c = SessionController::default();
    c.on_focus_gain("", t0);
    c.on_mutation("draft", false, t0);
    assert_eq!(c.poll_idle(t0 + ms(2999), "draft"), IdlePoll::Pending);
    assert_eq!(c.poll_idle(t0 + ms(3000), "draft"), IdlePoll::Flagged);
    assert!(c.state().is_thinking());

    c.on_mutation("", false, t0 + ms(4000));
    assert!(!c.state().is_thinking());
    assert_eq!(c.poll_idle(t0 + ms(9000), ""), IdlePoll::Skipped);
    assert!(!c.state().is_thinking());
}

#[test]
fn custom_idle_config_is_honored() {
    let t0 = Instant::now();
    let config = ControllerConfig {
        thinking: ThinkingConfig {
            idle_timeout: ms(500),
            idle_threshold: ms(400),
        },
        locale: Locale::Ja,
    };
    let mut c = SessionController::new(config);
    c.on_focus_gain("", t0);
    c.on_mutation("x", false, t0);
    assert_eq!(c.poll_idle(t0 + ms(500), "x"), IdlePoll::Flagged);
    let summary = c.on_submit("x", t0 + ms(1500));
    assert_eq!(summary.class, BehaviorClass::Decisive);
    assert!(summary.interpretation.ends_with("また、送信前には一定時間思考していた可能性があります。"));
}

#[test]
fn fast_single_edit_with_many_backspaces_is_decisive() {
    let t0 = Instant::now();
    let mut c = SessionController::default();
    c.on_focus_gain("", t0);
    c.on_mutation("hello", false, t0 + ms(100));
    for _ in 0..20 {
        c.on_backspace_key();
    }
    let summary = c.on_submit("hello", t0 + ms(1500));
    assert_eq!(summary.class, BehaviorClass::Decisive);
    assert_eq!(summary.backspace_count, 20);
}

#[derive(Clone, Default)]
struct Capture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

#[derive(Clone, Debug)]
struct CapturedEvent {
    target: String,
    fields: Vec<(String, String)>,
}

#[derive(Default)]
struct FieldCollector {
    fields: Vec<(String, String)>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.fields
            .push((field.name().to_string(), format!("{:?}", value)));
    }
}

impl<S> Layer<S> for Capture
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        self.events.lock().unwrap().push(CapturedEvent {
            target: event.metadata().target().to_string(),
            fields: collector.fields,
        });
    }
}

#[test]
fn analysis_log_carries_counts_not_text() {
    let capture = Capture::default();
    let events = capture.events.clone();
    let dispatch = Dispatch::new(Registry::default().with(capture));

    tracing::dispatcher::with_default(&dispatch, || {
        let t0 = Instant::now();
        let mut c = SessionController::default();
        c.on_focus_gain("", t0);
        c.on_composition_start("");
        c.on_composition_end("secret question 💣", t0 + ms(300));
        c.on_mutation("secret question 💣!", false, t0 + ms(400));
        c.on_submit("secret question 💣!", t0 + ms(900));
    });

    let events = events.lock().unwrap();
    let summary = events
        .iter()
        .find(|e| e.target == "analysis")
        .expect("missing analysis event");
    for name in ["duration_ms", "edits", "added", "removed", "backspaces", "thinking"] {
        assert!(
            summary.fields.iter().any(|(n, _)| n == name),
            "analysis event lacks {name}"
        );
    }
    for event in events.iter() {
        for (_, value) in &event.fields {
            assert!(!value.contains("secret question"), "leaked text: {value}");
            assert!(!value.contains("💣"), "leaked emoji: {value}");
        }
    }
}
