use std::io::{self, Stdout};

use anyhow::{Context, Result};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

pub(super) type PanelBackend = CrosstermBackend<Stdout>;

/// The panel's terminal. The shell gets its screen back when this is
/// finished or dropped, including on an early `?` return.
pub(super) struct PanelTerminal {
    terminal: Terminal<PanelBackend>,
    restored: bool,
}

impl PanelTerminal {
    pub(super) fn enter() -> Result<Self> {
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
            .context("failed to initialize terminal backend")?;
        let mut panel = Self {
            terminal,
            restored: true,
        };

        enable_raw_mode().context("failed to enable raw mode")?;
        panel.restored = false;
        execute!(panel.terminal.backend_mut(), EnterAlternateScreen)
            .context("failed to enter alternate screen")?;
        panel.terminal.clear().context("failed to clear terminal")?;
        Ok(panel)
    }

    pub(super) fn terminal(&mut self) -> &mut Terminal<PanelBackend> {
        &mut self.terminal
    }

    pub(super) fn finish(mut self) -> Result<()> {
        self.restore().context("failed to restore terminal")
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()
    }
}

impl Drop for PanelTerminal {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}
