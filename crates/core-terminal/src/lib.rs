//! Terminal session management for the runtime frame.
//!
//! Drawing happens on the alternate screen in raw mode with the cursor
//! hidden. [`TerminalBackend`] abstracts the session transitions so tests can
//! drive them without a tty; [`TerminalGuard`] pins a session open and
//! restores the terminal on drop, including panic unwind, so the user's
//! shell never stays in raw mode.

use anyhow::{Context as _, Result};
use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{
        self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode,
        enable_raw_mode,
    },
};
use std::io::stdout;
use tracing::debug;

pub trait TerminalBackend {
    /// Open the drawing session. Entering twice is a no-op.
    fn enter(&mut self) -> Result<()>;
    /// Restore the terminal. Leaving an unentered session is a no-op.
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
    /// Current viewport as (columns, rows).
    fn size(&self) -> Result<(u16, u16)>;
}

/// Crossterm-backed session: raw mode, alternate screen, hidden cursor.
#[derive(Debug, Default)]
pub struct CrosstermBackend {
    entered: bool,
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }

    /// Enter and return a guard that leaves on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_, Self>> {
        TerminalGuard::hold(self)
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if self.entered {
            return Ok(());
        }
        enable_raw_mode().context("enable raw mode")?;
        execute!(stdout(), EnterAlternateScreen, Hide).context("enter alternate screen")?;
        self.entered = true;
        debug!(target: "terminal", "session_entered");
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if !self.entered {
            return Ok(());
        }
        execute!(stdout(), LeaveAlternateScreen, Show).context("leave alternate screen")?;
        disable_raw_mode().context("disable raw mode")?;
        self.entered = false;
        debug!(target: "terminal", "session_left");
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(stdout(), SetTitle(title)).context("set terminal title")?;
        Ok(())
    }

    fn size(&self) -> Result<(u16, u16)> {
        terminal::size().context("query terminal size")
    }
}

impl Drop for CrosstermBackend {
    // Last line of defense; the guard normally leaves first.
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

/// RAII wrapper around an entered session. Dropping it restores the terminal
/// even on an early return or a panic unwind.
pub struct TerminalGuard<'a, B: TerminalBackend> {
    backend: &'a mut B,
}

impl<'a, B: TerminalBackend> TerminalGuard<'a, B> {
    /// Enter the session and pin it open for the guard's lifetime.
    pub fn hold(backend: &'a mut B) -> Result<Self> {
        backend.enter()?;
        Ok(Self { backend })
    }

    pub fn size(&self) -> Result<(u16, u16)> {
        self.backend.size()
    }
}

impl<B: TerminalBackend> Drop for TerminalGuard<'_, B> {
    fn drop(&mut self) {
        let _ = self.backend.leave();
    }
}
