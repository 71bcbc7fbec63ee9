//! Async terminal input service.
//!
//! One background task owns the `crossterm::EventStream` and normalizes
//! terminal events into [`core_events::InputEvent`]s on the runtime channel:
//! key presses and repeats become `Key`, releases are dropped at the source,
//! resizes become `Resize`, and Ctrl-C becomes `Interrupt` so the loop can
//! exit even with a broken keymap. The task stops on the shutdown signal, a
//! closed channel, or the end of the stream, and logs its exit reason once.

mod async_service;
mod key_map;

pub use async_service::InputShutdown;

use async_service::spawn_input_stream_task;
use core_events::Event;
use tokio::task::JoinHandle;

/// Spawn the async input service backed by `crossterm::EventStream`.
///
/// Returns the `JoinHandle` for the background task alongside a shutdown
/// handle used to request immediate termination.
pub fn spawn_input_task(
    sender: tokio::sync::mpsc::Sender<Event>,
) -> (JoinHandle<()>, InputShutdown) {
    spawn_input_stream_task(sender)
}
