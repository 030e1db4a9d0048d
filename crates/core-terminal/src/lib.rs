//! Terminal backend abstraction and crossterm implementation.
//!
//! Entering the backend switches to raw mode on the alternate screen and turns
//! on the reporting the input surface relies on: bracketed paste (so a paste
//! arrives as one event) and focus change (which starts a new composing
//! session). Leaving restores everything in reverse order.

use anyhow::Result;
use crossterm::{
    cursor::{SetCursorStyle, Show},
    event::{DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange},
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
    },
};
use std::io::stdout;
use tracing::{debug, warn};

/// Optional terminal reporting modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalFeatures {
    pub bracketed_paste: bool,
    pub focus_change: bool,
}

impl Default for TerminalFeatures {
    fn default() -> Self {
        Self {
            bracketed_paste: true,
            focus_change: true,
        }
    }
}

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
    fn size(&self) -> Result<(u16, u16)>;
}

pub struct CrosstermBackend {
    features: TerminalFeatures,
    entered: bool,
}

/// RAII guard ensuring terminal state restoration even if caller early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new(TerminalFeatures::default())
    }
}

impl CrosstermBackend {
    pub fn new(features: TerminalFeatures) -> Self {
        Self {
            features,
            entered: false,
        }
    }

    pub fn features(&self) -> TerminalFeatures {
        self.features
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard { backend: self })
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if self.entered {
            return Ok(());
        }
        enable_raw_mode()?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen, SetCursorStyle::SteadyBar)?;
        if self.features.bracketed_paste {
            execute!(out, EnableBracketedPaste)?;
        }
        if self.features.focus_change {
            execute!(out, EnableFocusChange)?;
        }
        self.entered = true;
        debug!(
            target: "runtime.startup",
            bracketed_paste = self.features.bracketed_paste,
            focus_change = self.features.focus_change,
            "terminal_entered"
        );
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if !self.entered {
            return Ok(());
        }
        let mut out = stdout();
        if self.features.focus_change {
            execute!(out, DisableFocusChange)?;
        }
        if self.features.bracketed_paste {
            execute!(out, DisableBracketedPaste)?;
        }
        execute!(out, SetCursorStyle::DefaultUserShape, LeaveAlternateScreen, Show)?;
        disable_raw_mode()?;
        self.entered = false;
        debug!(target: "runtime.shutdown", "terminal_left");
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(stdout(), SetTitle(title))?;
        Ok(())
    }

    fn size(&self) -> Result<(u16, u16)> {
        Ok(crossterm::terminal::size()?)
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        if let Err(e) = self.leave() {
            warn!(target: "runtime.shutdown", error = %e, "terminal_restore_failed");
        }
    }
}

impl<'a> Drop for TerminalGuard<'a> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.leave() {
            warn!(target: "runtime.shutdown", error = %e, "terminal_restore_failed");
        }
    }
}
