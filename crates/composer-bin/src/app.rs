//! Event handling for the composer screen.
//!
//! `ComposerApp` owns the input surface, the transcript and the session
//! controller. It performs no I/O: each event produces a `Step` telling the
//! runtime whether to redraw, quit, or dispatch an inference request.

use core_behavior::Locale;
use core_client::{ClientError, InferenceRequest, InferenceResponse};
use core_config::Config;
use core_events::{
    AnswerEvent, AnswerOutcome, CommandEvent, Event, InputEvent, KeyEventExt, KeyToken, ModMask,
    NamedKey,
};
use core_model::{
    ControllerConfig, KeyOutcome, SessionController, Transcript, error_text, missing_answer_text,
};
use core_render::{ChatView, Frame, StatusContext, compose};
use core_state::{IdlePoll, ThinkingConfig};
use core_text::{TextSurface, char_len, segment::normalize_input};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    CtrlC,
    Escape,
    CommandQuit,
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::CtrlC => "ctrl_c",
            ShutdownReason::Escape => "escape",
            ShutdownReason::CommandQuit => "command_quit",
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request the runtime must send on the app's behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub request_id: u64,
    pub request: InferenceRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue {
        redraw: bool,
        dispatch: Option<Dispatch>,
    },
    Quit(ShutdownReason),
}

impl Step {
    fn idle() -> Self {
        Step::Continue {
            redraw: false,
            dispatch: None,
        }
    }

    fn redraw() -> Self {
        Step::Continue {
            redraw: true,
            dispatch: None,
        }
    }
}

/// Model parameters copied into every request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RequestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.file.model.id.clone(),
            temperature: config.file.model.temperature,
            max_tokens: config.file.model.max_tokens,
        }
    }
}

pub fn controller_config(config: &Config) -> ControllerConfig {
    ControllerConfig {
        thinking: ThinkingConfig {
            idle_timeout: config.idle_timeout(),
            idle_threshold: config.idle_threshold(),
        },
        locale: config.file.analysis.locale,
    }
}

/// Map a finished request onto the text shown in place of the placeholder.
pub fn answer_outcome(
    result: Result<InferenceResponse, ClientError>,
    locale: Locale,
) -> AnswerOutcome {
    match result {
        Ok(InferenceResponse {
            answer: Some(answer),
        }) => AnswerOutcome::Answered(answer),
        Ok(InferenceResponse { answer: None }) => {
            AnswerOutcome::Answered(missing_answer_text(locale).to_string())
        }
        Err(err) => AnswerOutcome::Failed(err.to_string()),
    }
}

pub struct ComposerApp {
    controller: SessionController,
    surface: TextSurface,
    transcript: Transcript,
    settings: RequestSettings,
    in_flight: Option<u64>,
}

impl ComposerApp {
    /// The first session starts at `now`; a later focus gain restarts it.
    pub fn new(controller: ControllerConfig, settings: RequestSettings, now: Instant) -> Self {
        let mut controller = SessionController::new(controller);
        controller.on_focus_gain("", now);
        Self {
            controller,
            surface: TextSurface::new(),
            transcript: Transcript::new(),
            settings,
            in_flight: None,
        }
    }

    pub fn from_config(config: &Config, now: Instant) -> Self {
        Self::new(
            controller_config(config),
            RequestSettings::from_config(config),
            now,
        )
    }

    pub fn locale(&self) -> Locale {
        self.controller.locale()
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn surface(&self) -> &TextSurface {
        &self.surface
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn request_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn view(&self, width: u16, height: u16) -> Frame {
        let view = ChatView {
            transcript: &self.transcript,
            surface: &self.surface,
            status: StatusContext {
                locale: self.locale(),
                request_in_flight: self.request_in_flight(),
                input_chars: char_len(self.surface.text()),
            },
        };
        compose(&view, width, height)
    }

    pub fn handle(&mut self, event: &Event, now: Instant) -> Step {
        match event {
            Event::Input(input) => self.handle_input(input, now),
            Event::Command(cmd) => self.handle_command(*cmd, now),
            Event::Answer(answer) => self.handle_answer(answer, now),
            Event::Tick => self.handle_tick(now),
            Event::Shutdown => Step::Quit(ShutdownReason::ShutdownEvent),
        }
    }

    /// The input is read-only until the pending answer lands.
    fn input_locked(&self) -> bool {
        self.in_flight.is_some()
    }

    fn handle_input(&mut self, input: &InputEvent, now: Instant) -> Step {
        match input {
            InputEvent::KeyPress(key) => self.handle_key(key, now),
            InputEvent::Paste(_)
            | InputEvent::CompositionStart
            | InputEvent::CompositionUpdate { .. }
            | InputEvent::CompositionEnd { .. }
                if self.input_locked() =>
            {
                trace!(target: "runtime", "input_locked");
                Step::idle()
            }
            InputEvent::Paste(data) => {
                let text = normalize_input(data);
                let changed = self.surface.insert_str(&text);
                self.after_edit(changed, false, now)
            }
            InputEvent::CompositionStart => {
                self.controller.on_composition_start(self.surface.text());
                Step::idle()
            }
            InputEvent::CompositionUpdate { preedit } => {
                // Provisional text stays out of the surface until confirmed.
                let mut provisional = self.surface.text().to_string();
                provisional.push_str(preedit);
                self.controller.on_mutation(&provisional, true, now);
                Step::idle()
            }
            InputEvent::CompositionEnd { committed } => {
                self.surface.insert_str(&normalize_input(committed));
                self.controller.on_composition_end(self.surface.text(), now);
                Step::redraw()
            }
            InputEvent::FocusGained => {
                self.controller.on_focus_gain(self.surface.text(), now);
                Step::idle()
            }
            InputEvent::FocusLost => {
                self.controller.on_focus_lost();
                Step::idle()
            }
            InputEvent::Resize(_, _) => Step::redraw(),
            InputEvent::CtrlC => Step::Quit(ShutdownReason::CtrlC),
        }
    }

    fn handle_key(&mut self, key: &KeyEventExt, now: Instant) -> Step {
        let mods = key.mods();
        match key.base() {
            KeyToken::Named(NamedKey::Esc) => return Step::Quit(ShutdownReason::Escape),
            KeyToken::Char('n') if mods.contains(ModMask::CTRL) => {
                return self.handle_command(CommandEvent::NewChat, now);
            }
            _ => {}
        }
        if self.input_locked() {
            trace!(target: "runtime", "input_locked");
            return Step::idle();
        }

        match self.controller.on_key_down(key) {
            KeyOutcome::Submit => self.handle_command(CommandEvent::Submit, now),
            KeyOutcome::InsertNewline => {
                let changed = self.surface.insert_char('\n');
                self.after_edit(changed, key.composing, now)
            }
            KeyOutcome::Backspace => {
                let changed = self.surface.backspace();
                self.after_edit(changed, key.composing, now)
            }
            KeyOutcome::Swallowed => Step::idle(),
            KeyOutcome::Pass => self.edit_or_move(key, now),
        }
    }

    fn edit_or_move(&mut self, key: &KeyEventExt, now: Instant) -> Step {
        let mods = key.mods();
        match key.base() {
            KeyToken::Char(c) if !mods.intersects(ModMask::CTRL | ModMask::ALT) => {
                let changed = self.surface.insert_char(*c);
                self.after_edit(changed, key.composing, now)
            }
            KeyToken::Named(NamedKey::Delete) => {
                let changed = self.surface.delete_forward();
                self.after_edit(changed, key.composing, now)
            }
            KeyToken::Named(NamedKey::Left) => {
                self.surface.move_left();
                Step::redraw()
            }
            KeyToken::Named(NamedKey::Right) => {
                self.surface.move_right();
                Step::redraw()
            }
            KeyToken::Named(NamedKey::Home) => {
                self.surface.move_home();
                Step::redraw()
            }
            KeyToken::Named(NamedKey::End) => {
                self.surface.move_end();
                Step::redraw()
            }
            _ => Step::idle(),
        }
    }

    /// Every surface mutation is reported to the controller.
    fn after_edit(&mut self, changed: bool, composing: bool, now: Instant) -> Step {
        if !changed {
            return Step::idle();
        }
        self.controller.on_mutation(self.surface.text(), composing, now);
        Step::redraw()
    }

    fn handle_command(&mut self, cmd: CommandEvent, now: Instant) -> Step {
        match cmd {
            CommandEvent::Submit => self.submit(now),
            CommandEvent::NewChat => self.new_chat(now),
            CommandEvent::Quit => Step::Quit(ShutdownReason::CommandQuit),
        }
    }

    fn submit(&mut self, now: Instant) -> Step {
        let question = self.surface.text().to_string();
        if !SessionController::can_submit(&question, self.request_in_flight()) {
            trace!(
                target: "runtime",
                in_flight = self.request_in_flight(),
                text_len = question.len(),
                "submit_ignored"
            );
            return Step::idle();
        }
        let summary = self.controller.on_submit(&question, now);
        let system_prompt = self.controller.system_prompt(&summary);
        let request_id = self.transcript.push_exchange(&question, self.locale());
        self.surface.clear();
        self.in_flight = Some(request_id);
        debug!(target: "runtime", request_id, question_len = question.len(), "request_dispatched");
        Step::Continue {
            redraw: true,
            dispatch: Some(Dispatch {
                request_id,
                request: InferenceRequest {
                    question,
                    model: self.settings.model.clone(),
                    system_prompt,
                    temperature: self.settings.temperature,
                    max_tokens: self.settings.max_tokens,
                },
            }),
        }
    }

    fn new_chat(&mut self, now: Instant) -> Step {
        info!(target: "runtime", messages = self.transcript.messages().len(), "new_chat");
        self.transcript.clear();
        self.surface.clear();
        self.in_flight = None;
        self.controller.on_reset(self.surface.text(), now);
        Step::redraw()
    }

    fn handle_answer(&mut self, answer: &AnswerEvent, now: Instant) -> Step {
        let (text, failed) = match &answer.outcome {
            AnswerOutcome::Answered(text) => (text.clone(), false),
            AnswerOutcome::Failed(message) => (error_text(self.locale(), message), true),
        };
        if self.in_flight == Some(answer.request_id) {
            self.in_flight = None;
            // Waiting for the answer is not composing time.
            self.controller.on_reset(self.surface.text(), now);
        }
        if self.transcript.resolve(answer.request_id, text, failed) {
            debug!(target: "runtime", request_id = answer.request_id, failed, "answer_applied");
            Step::redraw()
        } else {
            debug!(target: "runtime", request_id = answer.request_id, "stale_answer_dropped");
            Step::idle()
        }
    }

    fn handle_tick(&mut self, now: Instant) -> Step {
        if self.controller.poll_idle(now, self.surface.text()) == IdlePoll::Flagged {
            trace!(target: "runtime", "idle_flag_raised");
        }
        Step::idle()
    }
}
