//! Core event types and channel helpers for Quill.
//! Scope: input + control events consumed by the runtime loop.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// The runtime loop consumes a bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. Producers use
// `send(..).await`; a full channel parks the producer instead of dropping events. With a small set
// of producers (input task, tick source) and a single consumer this keeps latency low without a
// lossy drop strategy. A closed channel counts a send failure and terminates the producer.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Counters
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters, inspectable in unit tests and logged in the shutdown summary. Not a
// metrics pipeline; feature-usage reporting lives in core-telemetry.
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static KEY_EVENTS_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static TICKS_EMITTED: AtomicU64 = AtomicU64::new(0);
// Input task exit accounting, one per `ExitReason` in core-input.
pub static INPUT_STOP_SIGNAL: AtomicU64 = AtomicU64::new(0);
pub static INPUT_STOP_CHANNEL: AtomicU64 = AtomicU64::new(0);
pub static INPUT_STOP_STREAM: AtomicU64 = AtomicU64::new(0);
pub static INPUT_STOP_ERROR: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Input(InputEvent),
    /// Periodic monotonic tick used to expire ephemeral status text without busy polling.
    Tick,
    Shutdown,
}

/// Normalized input events produced by the async input task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A key press or repeat (releases are filtered at the source).
    Key(KeyInput),
    /// Terminal resize (columns, rows).
    Resize(u16, u16),
    /// Ctrl-C, surfaced distinctly so the loop can exit even with a broken keymap.
    Interrupt,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Mods: u8 {
        const CTRL  = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const SHIFT = 0b0000_0100;
        const SUPER = 0b0000_1000;
    }
}

/// Logical keys surfaced to the keymap layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    F(u8),
    Enter,
    Escape,
    Tab,
    Backspace,
    Delete,
    Insert,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}

/// A single key press with its modifier mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyInput {
    pub key: Key,
    pub mods: Mods,
}

impl KeyInput {
    pub fn new(key: Key, mods: Mods) -> Self {
        Self { key, mods }
    }

    /// Case-stable form used for chord equality. Terminals disagree on whether
    /// `shift+r` arrives as `R` (with or without the SHIFT bit); folding ASCII
    /// uppercase to lowercase and setting SHIFT makes both reports equal.
    /// Non-ASCII characters pass through untouched.
    pub fn normalized(self) -> Self {
        match self.key {
            Key::Char(c) if c.is_ascii_uppercase() => Self {
                key: Key::Char(c.to_ascii_lowercase()),
                mods: self.mods | Mods::SHIFT,
            },
            _ => self,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Any async event producer registers here and is spawned at startup. Each source owns its task
// lifecycle and must terminate promptly when the channel closes. The bounded channel supplies the
// only flow control.

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
pub trait AsyncEventSource: Send + 'static {
    /// Stable identifier used for logging and shutdown diagnostics.
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task, returning a JoinHandle. Implementors stop when
    /// `tx.send(..).await` returns Err (channel closed) or on their own internal stop condition,
    /// and avoid busy loops by awaiting timers or external IO futures.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources, spawned together once the runtime channel exists.
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

#[cfg(test)]
mod tests_async_sources {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct MockOnceSource {
        emitted: bool,
    }
    impl MockOnceSource {
        fn new() -> Self {
            Self { emitted: false }
        }
    }
    impl AsyncEventSource for MockOnceSource {
        fn name(&self) -> &'static str {
            "mock_once"
        }
        fn spawn(mut self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            tokio::spawn(async move {
                if !self.emitted {
                    let _ = tx.send(Event::Shutdown).await;
                    self.emitted = true;
                }
            })
        }
    }

    #[tokio::test]
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(MockOnceSource::new());
        reg.register(TickEventSource::new(Duration::from_millis(10)));
        let handles = reg.spawn_all(&tx);
        let mut got_shutdown = false;
        let mut got_tick = false;
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(100) && (!got_shutdown || !got_tick) {
            if let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(5), rx.recv()).await {
                match ev {
                    Event::Shutdown => got_shutdown = true,
                    Event::Tick => got_tick = true,
                    _ => {}
                }
            }
        }
        assert!(got_shutdown, "expected mock source to emit its event");
        assert!(got_tick, "expected tick source to emit tick events");
        assert!(TICKS_EMITTED.load(Ordering::Relaxed) > 0);

        drop(tx);
        drop(rx);
        for (_, handle) in handles {
            let _ = tokio::time::timeout(Duration::from_millis(20), handle).await;
        }
    }

    struct MockCloseSource {
        flag: Arc<AtomicBool>,
    }

    impl MockCloseSource {
        fn new(flag: Arc<AtomicBool>) -> Self {
            Self { flag }
        }
    }

    impl AsyncEventSource for MockCloseSource {
        fn name(&self) -> &'static str {
            "mock_close"
        }

        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            let flag = self.flag;
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn registry_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource::new(flag.clone()));
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for (name, handle) in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source '{name}' did not observe channel closure"),
            }
        }

        assert!(flag.load(Ordering::SeqCst));
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
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                TICKS_EMITTED.fetch_add(1, Ordering::Relaxed);
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
    /// Spawn all registered sources, returning `(name, JoinHandle)` pairs. The supplied `Sender`
    /// reference stays owned by the caller; each source receives its own clone so no additional
    /// strong references linger inside the registry once this call returns.
    ///
    /// Call this after constructing the primary runtime channel and before the event loop begins
    /// consuming. During shutdown the caller drops its final `Sender` clone before awaiting the
    /// returned handles so the sources observe the closed channel and exit cooperatively.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<(&'static str, JoinHandle<()>)> {
        // Take ownership so duplicate spawns are prevented if called twice.
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push((name, src.spawn(tx.clone())));
        }
        out
    }
}
