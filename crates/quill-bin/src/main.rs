//! Quill entrypoint.
use anyhow::Result;
use clap::Parser;
use core_actions::builtin;
use core_actions::{ActionContext, ActionOutcome, ActionRegistry, dispatch};
use core_config::{Config, load_from};
use core_context::ContextModel;
use core_events::{
    CHANNEL_SEND_FAILURES, EVENT_CHANNEL_CAP, Event, EventSourceRegistry, InputEvent,
    KEY_EVENTS_TOTAL, KeyInput, TICKS_EMITTED, TickEventSource,
};
use core_keymap::{BindingWeight, Chord, Keybinding, KeybindingRegistry};
use core_menus::{MenuId, MenuRegistry};
use core_telemetry::{NullSink, TelemetrySink, TracingSink};
use core_terminal::{CrosstermBackend, TerminalBackend};
use core_workbench::{DiffSide, Document, Editor, EditorId, Workbench};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use std::fmt;
use std::io::{Write, stdout};
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

const TICK_INTERVAL: Duration = Duration::from_millis(250);
const EPHEMERAL_TTL: Duration = Duration::from_secs(3);
const FALLBACK_VIEWPORT: (u16, u16) = (80, 24);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Quill editor")] // minimal metadata
struct Args {
    /// Files to open, one standalone editor each. If none are given (and no
    /// --diff), a welcome editor and a small sample diff are opened instead.
    pub files: Vec<PathBuf>,
    /// Open a two-pane diff editor: ORIGINAL on the left, MODIFIED on the right.
    #[arg(long = "diff", num_args = 2, value_names = ["ORIGINAL", "MODIFIED"])]
    pub diff: Option<Vec<PathBuf>>,
    /// Optional configuration file path (overrides discovery of `quill.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

struct RuntimeContext<'a> {
    workbench: Workbench,
    actions: ActionRegistry,
    menus: MenuRegistry,
    keymap: KeybindingRegistry,
    telemetry: Box<dyn TelemetrySink>,
    open_failures: usize,
    terminal_guard: core_terminal::TerminalGuard<'a, CrosstermBackend>,
}

struct RuntimeBootstrap {
    workbench: Workbench,
    config: Config,
    actions: ActionRegistry,
    menus: MenuRegistry,
    keymap: KeybindingRegistry,
    telemetry: Box<dyn TelemetrySink>,
    summary: StartupSummary,
}

#[derive(Debug, Clone, Copy)]
struct StartupSummary {
    editors: usize,
    diffs: usize,
    open_failures: usize,
    config_override: bool,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(),
            log_guard: None,
        }
    }

    fn run<'a>(&'a mut self) -> Result<RuntimeContext<'a>> {
        self.configure_logging()?;
        Self::install_panic_hook();

        info!(target: "runtime", "startup");
        let args = Args::parse();
        let bootstrap = Self::load_runtime(&args)?;

        info!(
            target: "runtime.startup",
            editors = bootstrap.summary.editors,
            diffs = bootstrap.summary.diffs,
            open_failures = bootstrap.summary.open_failures,
            config_override = bootstrap.summary.config_override,
            direction = %bootstrap.config.default_text_direction(),
            telemetry_enabled = bootstrap.config.telemetry_enabled(),
            "bootstrap_complete"
        );

        self.backend.set_title("Quill")?;
        let guard = self.backend.enter_guard()?;

        Ok(RuntimeContext {
            workbench: bootstrap.workbench,
            actions: bootstrap.actions,
            menus: bootstrap.menus,
            keymap: bootstrap.keymap,
            telemetry: bootstrap.telemetry,
            open_failures: bootstrap.summary.open_failures,
            terminal_guard: guard,
        })
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("quill.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "quill.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        let filter = tracing_subscriber::EnvFilter::try_from_env("QUILL_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        match tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
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

    fn load_runtime(args: &Args) -> Result<RuntimeBootstrap> {
        let config = load_from(args.config.clone())?;
        let (workbench, open_failures) = build_workbench(args, &config);

        let mut actions = ActionRegistry::new();
        let mut menus = MenuRegistry::new();
        builtin::register_all(&mut actions, &mut menus);
        let mut keymap = KeybindingRegistry::new();
        actions.install_default_bindings(&mut keymap);
        apply_user_overrides(&config, &actions, &mut keymap);
        let telemetry = select_sink(&config);

        let summary = StartupSummary {
            editors: workbench.editors().len(),
            diffs: workbench.diffs().len(),
            open_failures,
            config_override: args.config.is_some(),
        };

        Ok(RuntimeBootstrap {
            workbench,
            config,
            actions,
            menus,
            keymap,
            telemetry,
            summary,
        })
    }
}

/// Open everything the command line asks for. Unreadable files still open an
/// editor, just one without a document, so the failure stays visible and the
/// direction toggle has something concrete to refuse.
fn build_workbench(args: &Args, config: &Config) -> (Workbench, usize) {
    let mut workbench = Workbench::new(config.default_text_direction());
    let mut open_failures = 0usize;

    for path in &args.files {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let name = document_name(path);
                tracing::debug!(
                    target: "io",
                    file = %path.display(),
                    size_bytes = text.len(),
                    "file_read_ok"
                );
                workbench.open_editor(Some(Document::new(name, text)));
            }
            Err(error) => {
                error!(target: "io", file = %path.display(), %error, "file_open_error");
                open_failures += 1;
                workbench.open_editor(None);
            }
        }
    }

    if let Some(pair) = &args.diff {
        let original = read_diff_pane(&pair[0], &mut open_failures);
        let modified = read_diff_pane(&pair[1], &mut open_failures);
        workbench.open_diff(original, modified);
    }

    if args.files.is_empty() && args.diff.is_none() {
        open_welcome(&mut workbench);
    }

    (workbench, open_failures)
}

fn document_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

/// Diff panes always carry a document so the pair stays navigable; an
/// unreadable side degrades to an empty document instead of a missing one.
fn read_diff_pane(path: &Path, open_failures: &mut usize) -> Document {
    let name = document_name(path);
    match std::fs::read_to_string(path) {
        Ok(text) => {
            tracing::debug!(
                target: "io",
                file = %path.display(),
                size_bytes = text.len(),
                "file_read_ok"
            );
            Document::new(name, text)
        }
        Err(error) => {
            error!(target: "io", file = %path.display(), %error, "file_open_error");
            *open_failures += 1;
            Document::new(name, "")
        }
    }
}

const WELCOME_TEXT: &str = "Welcome to Quill.\n\n\
    Alt+Shift+R toggles text direction, F6 cycles panes, Ctrl+Q quits.\n";

/// Default layout when no files are named: one welcome editor plus a small
/// diff pair, so every editor surface is reachable from a bare `quill`.
fn open_welcome(workbench: &mut Workbench) {
    workbench.open_editor(Some(Document::new("welcome", WELCOME_TEXT)));
    workbench.open_diff(
        Document::new("sample.txt (old)", "one\ntwo\nthree\n"),
        Document::new("sample.txt", "one\n2\nthree\n"),
    );
}

/// Install `[keybindings]` entries from the config at `User` weight. Entries
/// naming an unknown action or an unparsable chord are skipped with a
/// warning; the stock binding stays in place underneath either way.
fn apply_user_overrides(config: &Config, actions: &ActionRegistry, keymap: &mut KeybindingRegistry) {
    for (action, spec) in config.user_keybindings() {
        let Some(descriptor) = actions.get(action) else {
            warn!(
                target: "keymap",
                action = action.as_str(),
                "override_skipped_unknown_action"
            );
            continue;
        };
        match spec.parse::<Chord>() {
            Ok(chord) => {
                keymap.register(Keybinding::new(chord, descriptor.id, BindingWeight::User));
            }
            Err(error) => {
                warn!(
                    target: "keymap",
                    action = action.as_str(),
                    chord = spec.as_str(),
                    %error,
                    "override_skipped_bad_chord"
                );
            }
        }
    }
}

fn select_sink(config: &Config) -> Box<dyn TelemetrySink> {
    if config.telemetry_enabled() {
        Box::new(TracingSink)
    } else {
        info!(target: "telemetry", "telemetry_disabled");
        Box::new(NullSink)
    }
}

/// Short-lived status line message, expired by the tick source.
#[derive(Default)]
struct EphemeralStatus {
    text: Option<String>,
    expires_at: Option<Instant>,
}

impl EphemeralStatus {
    fn set(&mut self, text: impl Into<String>, ttl: Duration) {
        self.text = Some(text.into());
        self.expires_at = Some(Instant::now() + ttl);
    }

    /// Clear an expired message. Returns whether anything was cleared.
    fn tick(&mut self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) if now >= deadline => {
                self.text = None;
                self.expires_at = None;
                true
            }
            _ => false,
        }
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

enum LoopControl {
    Continue { redraw: bool },
    Break { reason: ShutdownReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    Interrupt,
    ActionQuit,
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::Interrupt => "interrupt",
            ShutdownReason::ActionQuit => "action_quit",
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

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

fn log_counter_summary(reason: ShutdownReason) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        key_events = KEY_EVENTS_TOTAL.load(Ordering::Relaxed),
        ticks = TICKS_EMITTED.load(Ordering::Relaxed),
        send_failures = CHANNEL_SEND_FAILURES.load(Ordering::Relaxed),
        "counter_summary"
    );
}

struct EditorRuntime<'a> {
    workbench: Workbench,
    actions: ActionRegistry,
    menus: MenuRegistry,
    keymap: KeybindingRegistry,
    telemetry: Box<dyn TelemetrySink>,
    ephemeral: EphemeralStatus,
    rx: mpsc::Receiver<Event>,
    tx: Option<mpsc::Sender<Event>>,
    source_handles: Vec<(&'static str, tokio::task::JoinHandle<()>)>,
    input_task: Option<tokio::task::JoinHandle<()>>,
    input_shutdown: Option<core_input::InputShutdown>,
    viewport: (u16, u16),
    _terminal_guard: core_terminal::TerminalGuard<'a, CrosstermBackend>,
}

impl<'a> EditorRuntime<'a> {
    fn new(
        context: RuntimeContext<'a>,
        tx: mpsc::Sender<Event>,
        rx: mpsc::Receiver<Event>,
        input_task: tokio::task::JoinHandle<()>,
        input_shutdown: core_input::InputShutdown,
        source_handles: Vec<(&'static str, tokio::task::JoinHandle<()>)>,
    ) -> Self {
        let RuntimeContext {
            workbench,
            actions,
            menus,
            keymap,
            telemetry,
            open_failures,
            terminal_guard,
        } = context;
        let mut ephemeral = EphemeralStatus::default();
        if open_failures > 0 {
            ephemeral.set("Open failed", EPHEMERAL_TTL);
        }
        let viewport = terminal_guard.size().unwrap_or(FALLBACK_VIEWPORT);
        Self {
            workbench,
            actions,
            menus,
            keymap,
            telemetry,
            ephemeral,
            rx,
            tx: Some(tx),
            source_handles,
            input_task: Some(input_task),
            input_shutdown: Some(input_shutdown),
            viewport,
            _terminal_guard: terminal_guard,
        }
    }

    async fn run(&mut self) -> Result<()> {
        self.redraw();

        let loop_span = tracing::debug_span!(target: "runtime", "event_loop");
        let _enter_loop = loop_span.enter();

        let mut shutdown_reason = ShutdownReason::ChannelClosed;
        while let Some(event) = self.rx.recv().await {
            let control = match event {
                Event::Input(input) => self.handle_input_event(&input),
                Event::Tick => self.handle_tick(),
                Event::Shutdown => self.handle_shutdown(),
            };

            match control {
                LoopControl::Break { reason } => {
                    shutdown_reason = reason;
                    break;
                }
                LoopControl::Continue { redraw } => {
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

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        if let Some(tx) = self.tx.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "dropping_runtime_sender"
            );
            drop(tx);
        }

        while let Some((name, handle)) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    source = name,
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    source = name,
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    source = name,
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    source = name,
                    "event_source_task_timeout"
                ),
            }
        }

        if let Some(shutdown) = self.input_shutdown.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "input_task_shutdown_signal"
            );
            shutdown.signal();
        }

        if let Some(handle) = self.input_task.take() {
            match handle.await {
                Ok(_) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "input_task_joined"
                ),
                Err(err) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "input_task_cancelled"
                ),
                Err(err) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "input_task_join_failed"
                ),
            }
        }

        log_counter_summary(reason);
        log_shutdown_stage(reason, "complete");
    }

    fn handle_input_event(&mut self, input: &InputEvent) -> LoopControl {
        match input {
            InputEvent::Key(key) => self.handle_key(*key),
            InputEvent::Resize(cols, rows) => {
                self.viewport = (*cols, *rows);
                LoopControl::Continue { redraw: true }
            }
            InputEvent::Interrupt => self.handle_interrupt(),
        }
    }

    fn handle_interrupt(&mut self) -> LoopControl {
        info!(target: "runtime", "interrupt");
        LoopControl::Break {
            reason: ShutdownReason::Interrupt,
        }
    }

    fn handle_key(&mut self, key: KeyInput) -> LoopControl {
        let Some(focused) = self.workbench.focused() else {
            return LoopControl::Continue { redraw: false };
        };
        let context = self.workbench.context_for(focused);
        let Some(action) = self.keymap.resolve(key, &context) else {
            return LoopControl::Continue { redraw: false };
        };

        let outcome = self.process_action(action, focused, &context);
        if outcome.quit {
            return LoopControl::Break {
                reason: ShutdownReason::ActionQuit,
            };
        }
        LoopControl::Continue {
            redraw: outcome.handled,
        }
    }

    fn handle_tick(&mut self) -> LoopControl {
        let cleared = self.ephemeral.tick(Instant::now());
        LoopControl::Continue { redraw: cleared }
    }

    fn handle_shutdown(&mut self) -> LoopControl {
        LoopControl::Break {
            reason: ShutdownReason::ShutdownEvent,
        }
    }

    fn process_action(
        &mut self,
        action: &'static str,
        target: EditorId,
        context: &ContextModel,
    ) -> ActionOutcome {
        let span = tracing::trace_span!(target: "actions.dispatch", "process_action", action);
        let outcome = span.in_scope(|| {
            let mut ctx = ActionContext {
                workbench: &mut self.workbench,
                target,
                telemetry: self.telemetry.as_ref(),
            };
            dispatch(&self.actions, action, &mut ctx, context)
        });

        if outcome.options_changed
            && let Some(editor) = self.workbench.editor(target)
        {
            self.ephemeral.set(
                format!("Text direction: {}", editor.options().text_direction),
                EPHEMERAL_TTL,
            );
        }
        outcome
    }

    fn redraw(&mut self) {
        if let Err(error) = draw_frame(
            &self.workbench,
            &self.menus,
            &self.keymap,
            self.ephemeral.text(),
            self.viewport,
        ) {
            error!(target: "ui", %error, "redraw_failed");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    let context = startup.run()?;
    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let (input_task, input_shutdown) = core_input::spawn_input_task(tx.clone());
    let mut registry = EventSourceRegistry::new();
    registry.register(TickEventSource::new(TICK_INTERVAL));
    let source_handles = registry.spawn_all(&tx);

    let mut runtime =
        EditorRuntime::new(context, tx, rx, input_task, input_shutdown, source_handles);
    runtime.run().await
}

// -------------------------------------------------------------------------------------------------
// Frame
// -------------------------------------------------------------------------------------------------
// The UI is a plain text frame redrawn in full: one row per pane, the View
// menu, a status line, and an optional ephemeral line. `frame_lines` is pure
// so tests can assert the frame without a terminal.

fn frame_lines(
    workbench: &Workbench,
    menus: &MenuRegistry,
    keymap: &KeybindingRegistry,
    ephemeral: Option<&str>,
) -> Vec<String> {
    let focused = workbench.focused();
    let mut lines = Vec::with_capacity(workbench.editors().len() + 3);
    for editor in workbench.editors() {
        lines.push(pane_line(workbench, editor, focused));
    }

    let context = focused.map_or_else(ContextModel::new, |id| workbench.context_for(id));
    let menu = menus
        .snapshot(MenuId::ViewMenu, &context)
        .iter()
        .map(|item| format!("[{}] {}", if item.checked { 'x' } else { ' ' }, item.title))
        .collect::<Vec<_>>()
        .join("  ");
    lines.push(format!("View: {menu}"));

    lines.push(status_line(workbench, keymap, focused));
    if let Some(text) = ephemeral {
        lines.push(text.to_string());
    }
    lines
}

fn pane_line(workbench: &Workbench, editor: &Editor, focused: Option<EditorId>) -> String {
    let marker = if focused == Some(editor.id()) { '>' } else { ' ' };
    let name = editor
        .document()
        .map(|d| d.name.as_str())
        .unwrap_or("[no document]");
    let direction = editor.options().text_direction.as_str();
    let side = match workbench.enclosing_diff(editor.id()) {
        Some((_, DiffSide::Original)) => "  diff:original",
        Some((_, DiffSide::Modified)) => "  diff:modified",
        None => "",
    };
    format!("{marker} editor {}  {name}  [{direction}]{side}", editor.id().0)
}

fn status_line(
    workbench: &Workbench,
    keymap: &KeybindingRegistry,
    focused: Option<EditorId>,
) -> String {
    let surface = focused
        .map(|id| workbench.surface_of(id).as_str())
        .unwrap_or("none");
    let toggle = keymap
        .binding_for(builtin::TOGGLE_TEXT_DIRECTION)
        .map(|b| b.chord.to_string())
        .unwrap_or_else(|| "unbound".to_string());
    let quit = keymap
        .binding_for(builtin::QUIT)
        .map(|b| b.chord.to_string())
        .unwrap_or_else(|| "unbound".to_string());
    format!("surface: {surface}  toggle: {toggle}  quit: {quit}")
}

/// Drop rows that fall below the viewport and truncate each remaining line
/// to the column count, so a shrunken terminal never wraps or scrolls.
fn clip_frame(lines: Vec<String>, viewport: (u16, u16)) -> Vec<String> {
    let (cols, rows) = viewport;
    lines
        .into_iter()
        .take(rows as usize)
        .map(|line| {
            if line.chars().count() > cols as usize {
                line.chars().take(cols as usize).collect()
            } else {
                line
            }
        })
        .collect()
}

fn draw_frame(
    workbench: &Workbench,
    menus: &MenuRegistry,
    keymap: &KeybindingRegistry,
    ephemeral: Option<&str>,
    viewport: (u16, u16),
) -> Result<()> {
    let mut out = stdout();
    queue!(out, Clear(ClearType::All))?;
    let lines = clip_frame(frame_lines(workbench, menus, keymap, ephemeral), viewport);
    for (row, line) in lines.into_iter().enumerate() {
        queue!(out, MoveTo(0, row as u16), Print(line))?;
    }
    out.flush()?;
    Ok(())
}
