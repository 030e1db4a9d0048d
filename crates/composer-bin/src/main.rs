//! Composer entrypoint.
use anyhow::Result;
use clap::Parser;
use core_client::{HttpInferenceClient, InferenceClient};
use core_config::{Config, Overrides, load_from};
use core_events::{
    AnswerEvent, EVENT_CHANNEL_CAP, Event, EventSourceRegistry, InputEvent, TickEventSource,
};
use core_render::RenderEngine;
use core_terminal::{CrosstermBackend, TerminalBackend, TerminalFeatures};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod app;

use app::{ComposerApp, Dispatch, ShutdownReason, Step, answer_outcome};

const LOG_FILE: &str = "composer.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "composer", version, about = "Behavior-aware chat composer")]
struct Args {
    /// Configuration file path (overrides discovery of `composer.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Inference server endpoint.
    #[arg(long = "url")]
    pub url: Option<String>,
    /// Model identifier sent with every request.
    #[arg(long = "model")]
    pub model: Option<String>,
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

struct RuntimeContext<'a> {
    config: Config,
    terminal_guard: core_terminal::TerminalGuard<'a>,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(TerminalFeatures::default()),
            log_guard: None,
        }
    }

    fn run<'a>(&'a mut self, args: Args) -> Result<RuntimeContext<'a>> {
        self.configure_logging()?;
        Self::install_panic_hook();

        info!(target: "runtime", "startup");
        let config = Self::load_config(&args)?;
        self.backend.set_title("Composer")?;
        let guard = self.backend.enter_guard()?;

        info!(
            target: "runtime.startup",
            config_override = args.config.is_some(),
            url_override = args.url.is_some(),
            model_override = args.model.is_some(),
            locale = config.file.analysis.locale.as_str(),
            tick_ms = config.file.runtime.tick_ms,
            "bootstrap_complete"
        );

        Ok(RuntimeContext {
            config,
            terminal_guard: guard,
        })
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join(LOG_FILE);
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }

    fn load_config(args: &Args) -> Result<Config> {
        let mut config = load_from(args.config.clone())?;
        config.apply_overrides(Overrides {
            url: args.url.clone(),
            model: args.model.clone(),
        });
        let clamps = config.validate();
        if clamps > 0 {
            warn!(target: "config", clamps, "config_values_clamped");
        }
        Ok(config)
    }
}

/// Send one request and route its outcome back into the event loop.
fn spawn_request(
    client: Arc<dyn InferenceClient>,
    dispatch: Dispatch,
    tx: mpsc::Sender<Event>,
    locale: core_behavior::Locale,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Dispatch {
            request_id,
            request,
        } = dispatch;
        let outcome = answer_outcome(client.ask(&request).await, locale);
        let event = Event::Answer(AnswerEvent {
            request_id,
            outcome,
        });
        if tx.send(event).await.is_err() {
            trace!(target: "runtime", request_id, "answer_dropped_channel_closed");
        }
    })
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

struct ComposerRuntime<'a> {
    app: ComposerApp,
    client: Arc<dyn InferenceClient>,
    render_engine: RenderEngine,
    rx: mpsc::Receiver<Event>,
    tx: Option<mpsc::Sender<Event>>,
    source_handles: Vec<JoinHandle<()>>,
    request_handles: Vec<JoinHandle<()>>,
    input_task: Option<JoinHandle<()>>,
    input_shutdown: Option<core_input::AsyncInputShutdown>,
    _terminal_guard: core_terminal::TerminalGuard<'a>,
}

impl<'a> ComposerRuntime<'a> {
    fn new(
        context: RuntimeContext<'a>,
        client: Arc<dyn InferenceClient>,
        tx: mpsc::Sender<Event>,
        rx: mpsc::Receiver<Event>,
        input_task: JoinHandle<()>,
        input_shutdown: core_input::AsyncInputShutdown,
        source_handles: Vec<JoinHandle<()>>,
    ) -> Self {
        let RuntimeContext {
            config,
            terminal_guard,
        } = context;
        Self {
            app: ComposerApp::from_config(&config, Instant::now()),
            client,
            render_engine: RenderEngine::new(),
            rx,
            tx: Some(tx),
            source_handles,
            request_handles: Vec::new(),
            input_task: Some(input_task),
            input_shutdown: Some(input_shutdown),
            _terminal_guard: terminal_guard,
        }
    }

    async fn run(&mut self) -> Result<()> {
        self.redraw();

        let loop_span = tracing::debug_span!(target: "runtime", "event_loop");
        let _enter_loop = loop_span.enter();

        let mut shutdown_reason = ShutdownReason::ChannelClosed;
        while let Some(event) = self.rx.recv().await {
            if matches!(event, Event::Input(InputEvent::Resize(..))) {
                self.render_engine.invalidate();
            }

            match self.app.handle(&event, Instant::now()) {
                Step::Quit(reason) => {
                    shutdown_reason = reason;
                    break;
                }
                Step::Continue { redraw, dispatch } => {
                    if let Some(dispatch) = dispatch {
                        self.dispatch(dispatch);
                    }
                    if redraw {
                        self.redraw();
                    }
                }
            }
        }

        self.rx.close();
        self.finalize_shutdown(shutdown_reason).await;
        Ok(())
    }

    fn dispatch(&mut self, dispatch: Dispatch) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        self.request_handles.retain(|h| !h.is_finished());
        self.request_handles.push(spawn_request(
            Arc::clone(&self.client),
            dispatch,
            tx.clone(),
            self.app.locale(),
        ));
    }

    fn redraw(&mut self) {
        let (width, height) = match crossterm::terminal::size() {
            Ok(size) => size,
            Err(e) => {
                error!(target: "render", ?e, "terminal_size_failed");
                return;
            }
        };
        let frame = self.app.view(width, height);
        if let Err(e) = self.render_engine.render(frame, &mut stdout()) {
            error!(target: "render", ?e, "render_error");
        }
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        for handle in self.request_handles.drain(..) {
            handle.abort();
        }
        if let Some(tx) = self.tx.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "dropping_runtime_sender"
            );
            drop(tx);
        }

        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }

        if let Some(shutdown) = self.input_shutdown.take() {
            shutdown.signal();
        }
        if let Some(handle) = self.input_task.take() {
            match handle.await {
                Ok(_) => trace!(target: "runtime.shutdown", "input_task_joined"),
                Err(err) if err.is_cancelled() => {
                    trace!(target: "runtime.shutdown", "input_task_cancelled")
                }
                Err(err) => error!(target: "runtime.shutdown", ?err, "input_task_join_failed"),
            }
        }

        log_shutdown_stage(reason, "complete");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    let context = startup.run(args)?;
    let client: Arc<dyn InferenceClient> = Arc::new(HttpInferenceClient::new(
        context.config.file.server.url.clone(),
        context.config.request_timeout(),
    )?);

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let (input_task, input_shutdown) = core_input::spawn_async_input(tx.clone());
    let mut registry = EventSourceRegistry::new();
    registry.register(TickEventSource::new(context.config.tick_interval()));
    let source_handles = registry.spawn_all(&tx);

    let mut runtime = ComposerRuntime::new(
        context,
        client,
        tx,
        rx,
        input_task,
        input_shutdown,
        source_handles,
    );
    runtime.run().await
}
