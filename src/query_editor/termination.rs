//! Termination signals while a prompt owns the terminal
//!
//! A listener task latches a flag on SIGTERM. While the raw-mode editor is
//! active it polls that flag between key events and cancels the request, so
//! its guard restores cooked mode on the way out. Anywhere else the terminal
//! is restored and the process exits with the conventional status.

use crossterm::terminal;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use tracing::{debug, info, warn};

/// Exit status after a termination signal (128 + SIGTERM)
pub const TERMINATED_EXIT_CODE: i32 = 143;

/// Latched termination request plus whether an editor is listening for it
#[derive(Debug, Default)]
pub struct Termination {
    requested: AtomicBool,
    editing: AtomicBool,
}

impl Termination {
    pub const fn new() -> Self {
        Termination {
            requested: AtomicBool::new(false),
            editing: AtomicBool::new(false),
        }
    }

    /// Records the request. Returns true when an active editor will pick it
    /// up and cancel its prompt.
    pub fn request(&self) -> bool {
        self.requested.store(true, Ordering::SeqCst);
        self.editing.load(Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn set_editing(&self, editing: bool) {
        self.editing.store(editing, Ordering::SeqCst);
    }

    pub fn is_editing(&self) -> bool {
        self.editing.load(Ordering::SeqCst)
    }
}

static PROCESS: Termination = Termination::new();
static LISTENER: Once = Once::new();

/// The process-wide termination state
pub fn process() -> &'static Termination {
    &PROCESS
}

/// Starts the signal listener on the current tokio runtime, once per process.
///
/// Without a runtime the signals keep their default action.
pub fn listen() {
    LISTENER.call_once(|| match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async {
                match wait_for_termination().await {
                    Ok(()) => on_terminate(),
                    Err(e) => warn!("Termination listener unavailable: {}", e),
                }
            });
        }
        Err(_) => debug!("No async runtime, termination signals keep their default action"),
    });
}

#[cfg(unix)]
async fn wait_for_termination() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    terminate.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

fn on_terminate() {
    if PROCESS.request() {
        info!("Termination requested, cancelling the active prompt");
        return;
    }
    info!("Termination requested, exiting");
    if let Err(e) = terminal::disable_raw_mode() {
        debug!("Failed to restore terminal mode: {}", e);
    }
    std::process::exit(TERMINATED_EXIT_CODE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_latched() {
        let termination = Termination::new();
        assert!(!termination.is_requested());
        assert!(!termination.request());
        assert!(termination.is_requested());
        assert!(termination.is_requested());
    }

    #[test]
    fn test_request_reports_active_editor() {
        let termination = Termination::new();
        termination.set_editing(true);
        assert!(termination.request());
        termination.set_editing(false);
        assert!(!termination.is_editing());
    }
}
