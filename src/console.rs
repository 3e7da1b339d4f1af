//! Console Interaction
//!
//! Banner output and the final "press any key" pause that keeps a
//! double-clicked console window open long enough to read the output.

use std::io::{self, IsTerminal, Write};

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::{APP_NAME, VERSION};

/// Prompt shown before waiting for acknowledgment.
pub const PAUSE_PROMPT: &str = "Press any key to continue . . . ";

/// Prints the application banner with version information.
pub fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Conda environment provisioning");
    println!();
}

/// Decides whether to pause: only when enabled and a person can answer.
pub fn should_pause(enabled: bool, interactive: bool) -> bool {
    enabled && interactive
}

/// Pulls events until the first key press and returns it.
///
/// Key releases (reported on Windows), resizes, focus and mouse events are
/// ignored.
pub fn wait_for_key<F>(mut next_event: F) -> io::Result<KeyEvent>
where
    F: FnMut() -> io::Result<Event>,
{
    loop {
        if let Event::Key(key) = next_event()? {
            if key.kind == KeyEventKind::Press {
                return Ok(key);
            }
        }
    }
}

/// Raw mode for the lifetime of the guard; restored on drop, including on error.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Waits for a single key press on the real terminal.
///
/// Does nothing when disabled or when stdin is not a terminal, so piped and
/// CI runs never block.
pub fn pause(enabled: bool) -> io::Result<()> {
    if !should_pause(enabled, io::stdin().is_terminal()) {
        return Ok(());
    }

    let mut stdout = io::stdout();
    write!(stdout, "\n{}", PAUSE_PROMPT)?;
    stdout.flush()?;

    {
        let _raw = RawModeGuard::enable()?;
        wait_for_key(event::read)?;
    }

    writeln!(stdout)?;
    Ok(())
}
