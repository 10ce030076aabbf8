use anyhow::Context;
use crossterm::{
    cursor,
    event::{DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture},
    terminal::{self, ClearType},
    ExecutableCommand,
};
use std::io::{stdout, Stdout, Write};

pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // Create the guard immediately so Drop will disable raw mode if
        // any subsequent setup step fails.
        let guard = Self { _private: () };

        let mut out = stdout();
        out.execute(terminal::EnterAlternateScreen)
            .context("enter alternate screen")?;
        out.execute(terminal::Clear(ClearType::All))
            .context("clear screen")?;
        out.execute(cursor::Hide).context("hide cursor")?;
        // Drag events stand in for pointer capture: the terminal keeps reporting
        // motion while a button is held, wherever the pointer goes.
        out.execute(EnableMouseCapture).context("enable mouse capture")?;
        out.execute(EnableFocusChange).context("enable focus reporting")?;

        Ok(guard)
    }

    pub fn stdout() -> Stdout {
        stdout()
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut out = stdout();
        let _ = out.execute(DisableFocusChange);
        let _ = out.execute(DisableMouseCapture);
        // Best-effort: undo modes we may have enabled during rendering (sync output, autowrap, colors).
        let _ = out.write_all(b"\x1b[?2026l\x1b[?7h\x1b[0m");
        let _ = out.flush();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
    }
}
