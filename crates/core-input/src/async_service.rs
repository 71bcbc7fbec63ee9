use crate::key_map::map_key_input;
use core_events::{
    CHANNEL_SEND_FAILURES, Event, INPUT_STOP_CHANNEL, INPUT_STOP_ERROR, INPUT_STOP_SIGNAL,
    INPUT_STOP_STREAM, InputEvent, KEY_EVENTS_TOTAL,
};
use crossterm::event::{
    Event as CEvent, EventStream, KeyCode as CKeyCode, KeyEvent as CKeyEvent,
    KeyEventKind as CKind, KeyModifiers as CMods,
};
use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task;
use tokio_stream::StreamExt;
use tracing::{info, trace, warn};

/// Handle held by the runtime to request input task termination.
#[derive(Clone, Debug)]
pub struct InputShutdown {
    notify: Arc<Notify>,
}

impl InputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Debug)]
struct ShutdownListener {
    notify: Arc<Notify>,
}

impl ShutdownListener {
    fn new_pair() -> (InputShutdown, Self) {
        let notify = Arc::new(Notify::new());
        (
            InputShutdown {
                notify: notify.clone(),
            },
            ShutdownListener { notify },
        )
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Spawn the Tokio task that reads `crossterm::EventStream` and feeds the
/// runtime channel.
pub(crate) fn spawn_input_stream_task(
    sender: Sender<Event>,
) -> (task::JoinHandle<()>, InputShutdown) {
    let (shutdown, listener) = ShutdownListener::new_pair();
    let handle = task::spawn(async move {
        let span = tracing::debug_span!(target: "input.service", "input_task");
        let _enter = span.enter();

        let stream = EventStream::new();
        InputStreamTask::new(sender, stream, listener).run().await;
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

struct InputStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    sender: Sender<Event>,
    stream: S,
    shutdown: ShutdownListener,
    exit_reason: ExitReason,
    stream_error: Option<io::ErrorKind>,
}

impl<S> InputStreamTask<S>
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
        info!(target: "input.service", "input_task_started");
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

            match result {
                Ok(CEvent::Key(key)) => {
                    if !self.handle_key_event(key).await {
                        break;
                    }
                }
                Ok(CEvent::Resize(w, h)) => {
                    trace!(target: "input.service", w, h, "resize");
                    if !self
                        .send_event(Event::Input(InputEvent::Resize(w, h)))
                        .await
                    {
                        break;
                    }
                }
                // Focus, mouse, and paste events have no consumer here.
                Ok(_) => {}
                Err(err) => {
                    self.exit_reason = ExitReason::StreamError;
                    self.stream_error = Some(err.kind());
                    break;
                }
            }
        }

        let reason = match self.exit_reason {
            ExitReason::Running => ExitReason::StreamEnded,
            other => other,
        };

        match reason {
            ExitReason::ShutdownSignal => {
                INPUT_STOP_SIGNAL.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::ChannelClosed => {
                INPUT_STOP_CHANNEL.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::StreamEnded => {
                INPUT_STOP_STREAM.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::StreamError => {
                INPUT_STOP_ERROR.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::Running => {}
        }

        if matches!(reason, ExitReason::StreamError) {
            if let Some(kind) = self.stream_error {
                warn!(target: "input.service", error_kind = ?kind, "input_task_stream_error");
            } else {
                warn!(target: "input.service", "input_task_stream_error");
            }
        }

        info!(target: "input.service", reason = reason.as_str(), "input_task_stopped");
    }

    async fn handle_key_event(&mut self, key: CKeyEvent) -> bool {
        // Releases never reach the keymap; repeats do.
        if !matches!(key.kind, CKind::Press | CKind::Repeat) {
            return true;
        }

        if matches!(key.code, CKeyCode::Char('c')) && key.modifiers.contains(CMods::CONTROL) {
            return self.send_event(Event::Input(InputEvent::Interrupt)).await;
        }

        let Some(input) = map_key_input(&key) else {
            return true;
        };

        trace!(
            target: "input.service",
            key = ?input.key,
            mods = ?input.mods,
            repeat = matches!(key.kind, CKind::Repeat),
            "key"
        );

        let sent = self.send_event(Event::Input(InputEvent::Key(input))).await;
        if sent {
            KEY_EVENTS_TOTAL.fetch_add(1, Ordering::Relaxed);
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

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{Key, Mods};
    use std::io;
    use std::sync::{Arc, Mutex};
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
        fn register_callsite(
            &self,
            _metadata: &'static tracing::Metadata<'static>,
        ) -> tracing::subscriber::Interest {
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

    async fn run_scenario(events: Vec<CEvent>) -> Vec<Event> {
        let (tx, mut rx) = mpsc::channel(64);
        let stream = tokio_stream::iter(events.into_iter().map(Ok));
        let (_shutdown, listener) = ShutdownListener::new_pair();
        InputStreamTask::new(tx, stream, listener).run().await;

        let mut outputs = Vec::new();
        while let Some(evt) = rx.recv().await {
            outputs.push(evt);
        }
        outputs
    }

    #[tokio::test]
    async fn forwards_basic_key_events() {
        let base_total = KEY_EVENTS_TOTAL.fetch_add(0, Ordering::Relaxed);

        let outputs = run_scenario(vec![CEvent::Key(CKeyEvent::new(
            CKeyCode::Char('a'),
            CMods::NONE,
        ))])
        .await;

        match outputs.as_slice() {
            [Event::Input(InputEvent::Key(input))] => {
                assert_eq!(input.key, Key::Char('a'));
                assert!(input.mods.is_empty());
            }
            other => panic!("unexpected output sequence: {other:?}"),
        }

        let after_total = KEY_EVENTS_TOTAL.fetch_add(0, Ordering::Relaxed);
        assert!(after_total > base_total, "key counter did not advance");
    }

    #[tokio::test]
    async fn repeat_key_events_are_forwarded() {
        let mut c_event = CKeyEvent::new(CKeyCode::Char('r'), CMods::ALT | CMods::SHIFT);
        c_event.kind = CKind::Repeat;

        let outputs = run_scenario(vec![CEvent::Key(c_event)]).await;

        match outputs.as_slice() {
            [Event::Input(InputEvent::Key(input))] => {
                assert_eq!(input.key, Key::Char('r'));
                assert_eq!(input.mods, Mods::ALT | Mods::SHIFT);
            }
            other => panic!("unexpected output sequence: {other:?}"),
        }
    }

    #[tokio::test]
    async fn release_key_events_are_dropped() {
        let mut c_event = CKeyEvent::new(CKeyCode::Char('a'), CMods::NONE);
        c_event.kind = CKind::Release;

        let outputs = run_scenario(vec![CEvent::Key(c_event)]).await;
        assert!(outputs.is_empty(), "releases must not reach the channel");
    }

    #[tokio::test]
    async fn forwards_ctrl_c_as_interrupt() {
        let outputs = run_scenario(vec![CEvent::Key(CKeyEvent::new(
            CKeyCode::Char('c'),
            CMods::CONTROL,
        ))])
        .await;

        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::Interrupt)]
        ));
    }

    #[tokio::test]
    async fn forwards_resize_event() {
        let outputs = run_scenario(vec![CEvent::Resize(120, 48)]).await;

        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::Resize(120, 48))]
        ));
    }

    #[tokio::test]
    async fn unsupported_keys_are_skipped() {
        let outputs = run_scenario(vec![
            CEvent::Key(CKeyEvent::new(CKeyCode::CapsLock, CMods::NONE)),
            CEvent::Key(CKeyEvent::new(CKeyCode::Char('x'), CMods::NONE)),
        ])
        .await;

        assert_eq!(outputs.len(), 1, "only the mappable key goes through");
    }

    #[tokio::test]
    async fn logs_startup_and_shutdown_reason_on_signal() {
        let _log_guard = LOG_CAPTURE_GUARD.lock().await;
        let capture = LogCapture::default();
        let events_handle = capture.events.clone();
        let subscriber = Registry::default().with(capture.with_filter(LevelFilter::TRACE));
        let dispatch = tracing::Dispatch::new(subscriber);
        let _guard = tracing::dispatcher::set_default(&dispatch);

        let base_signal = INPUT_STOP_SIGNAL.fetch_add(0, Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(1);
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel::<io::Result<CEvent>>();
        let stream = UnboundedReceiverStream::new(event_rx);
        let (shutdown, listener) = ShutdownListener::new_pair();

        let notifier = shutdown.clone();
        let signal_task = tokio::spawn(async move {
            tokio::task::yield_now().await;
            notifier.signal();
        });

        let _keep_alive = event_tx;
        InputStreamTask::new(tx, stream, listener).run().await;
        signal_task.await.unwrap();
        drop(rx);

        let logged = events_handle.lock().unwrap();
        assert!(
            logged.iter().any(|entry| {
                entry.target == "input.service"
                    && entry
                        .fields
                        .iter()
                        .any(|(k, v)| k == "message" && v == "input_task_started")
            }),
            "missing input_task_started log, captured events: {:?}",
            *logged
        );

        let stop_event = logged.iter().find(|entry| {
            entry.target == "input.service"
                && entry
                    .fields
                    .iter()
                    .any(|(k, v)| k == "message" && v == "input_task_stopped")
        });
        let stop_event = stop_event.unwrap_or_else(|| {
            panic!(
                "missing input_task_stopped log, captured events: {:?}",
                *logged
            )
        });
        let reason_field = stop_event
            .fields
            .iter()
            .find(|(k, _)| k == "reason")
            .map(|(_, v)| v.trim_matches('"'))
            .unwrap_or_default();
        assert_eq!(reason_field, "shutdown_signal");

        let after_signal = INPUT_STOP_SIGNAL.fetch_add(0, Ordering::Relaxed);
        assert!(
            after_signal > base_signal,
            "shutdown signal counter did not advance"
        );
    }

    #[tokio::test]
    async fn channel_closed_increments_counters() {
        let base_channel = INPUT_STOP_CHANNEL.fetch_add(0, Ordering::Relaxed);
        let base_failures = CHANNEL_SEND_FAILURES.fetch_add(0, Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let stream = tokio_stream::iter(vec![Ok(CEvent::Resize(10, 10))]);
        let (_shutdown, listener) = ShutdownListener::new_pair();

        InputStreamTask::new(tx, stream, listener).run().await;

        let after_channel = INPUT_STOP_CHANNEL.fetch_add(0, Ordering::Relaxed);
        let after_failures = CHANNEL_SEND_FAILURES.fetch_add(0, Ordering::Relaxed);
        assert!(
            after_channel > base_channel,
            "channel closed counter did not advance"
        );
        assert!(
            after_failures > base_failures,
            "send failure counter did not advance"
        );
    }

    #[tokio::test]
    async fn stream_error_sets_error_exit_reason() {
        let base_error = INPUT_STOP_ERROR.fetch_add(0, Ordering::Relaxed);

        let (tx, mut rx) = mpsc::channel(8);
        let stream = tokio_stream::iter(vec![Err(io::Error::other("tty gone"))]);
        let (_shutdown, listener) = ShutdownListener::new_pair();

        InputStreamTask::new(tx, stream, listener).run().await;

        assert!(rx.recv().await.is_none(), "no events expected");
        let after_error = INPUT_STOP_ERROR.fetch_add(0, Ordering::Relaxed);
        assert!(
            after_error > base_error,
            "stream error counter did not advance"
        );
    }

    #[tokio::test]
    async fn shutdown_signal_exits_immediately() {
        let (tx, mut rx) = mpsc::channel(1);
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel::<io::Result<CEvent>>();
        let stream = UnboundedReceiverStream::new(event_rx);
        let (shutdown, listener) = ShutdownListener::new_pair();

        let task = tokio::spawn(async move {
            let _keep_alive = event_tx;
            InputStreamTask::new(tx, stream, listener).run().await;
        });

        shutdown.signal();

        timeout(Duration::from_millis(50), task)
            .await
            .expect("shutdown should resolve promptly")
            .expect("task join failed");

        assert!(rx.recv().await.is_none());
    }
}
