//! Query Editor Module
//!
//! Input strategies share the [`QueryInput`] trait so the console never
//! cares how a query was obtained. This module holds the trait and the
//! raw-mode editor with its live suggestion strip; the menu-driven and plain
//! line strategies live in `query_menu`.
//!
//! The editor is split into a pure state machine (`state`) and a renderer
//! plus key decoder (`render`), so all editing behavior can be tested without
//! a terminal. `termination` turns a SIGTERM during editing into a cancelled
//! prompt.

pub mod render;
pub mod state;
pub mod termination;

pub use render::{map_key, render};
pub use state::{EditorKey, EditorState, Transition};

use crate::autocomplete::SuggestionSource;
use crate::core::db::Engine;
use crate::core::{DbcliError, Result};
use crossterm::event::{self, Event};
use crossterm::terminal;
use std::io::{self, Write};
use std::time::Duration;
use termination::Termination;
use tracing::debug;

/// How long the editor waits for a key before rechecking for termination
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything an input strategy may draw on for one request
pub struct InputContext<'a> {
    pub prompt: &'a str,
    pub engine: Engine,
    pub completer: Option<&'a dyn SuggestionSource>,
    /// Distinct recent successful queries, newest first
    pub recent: &'a [String],
}

/// Source of queries for the console loop
pub trait QueryInput {
    /// Reads one query.
    ///
    /// # Errors
    ///
    /// `DbcliError::Cancelled` when the user aborts the request.
    fn read_query(&mut self, ctx: &InputContext<'_>) -> Result<String>;

    /// Asks a yes/no question
    fn confirm(&mut self, message: &str) -> Result<bool>;
}

type Restore = Box<dyn FnMut() -> io::Result<()>>;

/// Marks the editor active and restores cooked mode when dropped, whatever
/// path leaves the editor
struct RawModeGuard<'a> {
    termination: &'a Termination,
    restore: Restore,
}

impl<'a> RawModeGuard<'a> {
    fn enable(termination: &'a Termination) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self::engaged(termination, Box::new(terminal::disable_raw_mode)))
    }

    fn engaged(termination: &'a Termination, restore: Restore) -> Self {
        termination.set_editing(true);
        RawModeGuard { termination, restore }
    }
}

impl Drop for RawModeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = (self.restore)() {
            debug!("Failed to restore terminal mode: {}", e);
        }
        self.termination.set_editing(false);
    }
}

/// Next key from the terminal, `None` when the poll interval passed quietly
fn poll_key() -> io::Result<Option<EditorKey>> {
    if !event::poll(POLL_INTERVAL)? {
        return Ok(None);
    }
    Ok(match event::read()? {
        Event::Key(key) => map_key(key),
        _ => None,
    })
}

/// Feeds keys to a fresh editor state until it submits or cancels,
/// rendering after every change. A termination request cancels.
fn drive<W: Write>(
    out: &mut W,
    ctx: &InputContext<'_>,
    termination: &Termination,
    mut next_key: impl FnMut() -> io::Result<Option<EditorKey>>,
) -> Result<Transition> {
    let mut state = EditorState::new(ctx.completer);
    render(out, ctx.prompt, &state)?;
    out.flush()?;

    loop {
        if termination.is_requested() {
            debug!("Prompt cancelled by termination request");
            return finish(out, Transition::Cancelled);
        }
        let Some(key) = next_key()? else {
            continue;
        };
        match state.handle(key, ctx.completer) {
            Transition::Continue => {
                render(out, ctx.prompt, &state)?;
                out.flush()?;
            }
            done => return finish(out, done),
        }
    }
}

fn finish<W: Write>(out: &mut W, done: Transition) -> Result<Transition> {
    // Drop the suggestion strip before leaving the line
    crossterm::queue!(out, terminal::Clear(terminal::ClearType::FromCursorDown))?;
    out.flush()?;
    Ok(done)
}

/// Raw-mode single-line editor on stdout
#[derive(Debug, Default)]
pub struct EditorInput;

impl EditorInput {
    pub fn new() -> Self {
        EditorInput
    }

    fn edit(&self, ctx: &InputContext<'_>) -> Result<Transition> {
        let termination = termination::process();
        let _guard = RawModeGuard::enable(termination)?;
        drive(&mut io::stdout(), ctx, termination, poll_key)
    }
}

impl QueryInput for EditorInput {
    fn read_query(&mut self, ctx: &InputContext<'_>) -> Result<String> {
        loop {
            let transition = self.edit(ctx)?;
            println!();
            match transition {
                Transition::Submitted(query) if query.is_empty() => continue,
                Transition::Submitted(query) => return Ok(query),
                Transition::Cancelled | Transition::Continue => return Err(DbcliError::Cancelled),
            }
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        crate::query_menu::confirm_line(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn context() -> InputContext<'static> {
        InputContext {
            prompt: "sqlite>",
            engine: Engine::FileBased,
            completer: None,
            recent: &[],
        }
    }

    fn counting(restores: &Arc<AtomicUsize>) -> Restore {
        let restores = restores.clone();
        Box::new(move || {
            restores.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_drive_submits_typed_text() {
        let termination = Termination::new();
        let mut keys = vec![
            EditorKey::Char('S'),
            EditorKey::Char('E'),
            EditorKey::Char('L'),
            EditorKey::Enter,
        ]
        .into_iter();
        let mut out = Vec::new();

        let transition = drive(&mut out, &context(), &termination, || Ok(keys.next())).unwrap();

        assert_eq!(transition, Transition::Submitted("SEL".to_string()));
        assert!(String::from_utf8_lossy(&out).contains("sqlite>"));
    }

    #[test]
    fn test_guard_restores_terminal_after_interrupt() {
        let termination = Termination::new();
        let restores = Arc::new(AtomicUsize::new(0));
        let mut keys = vec![EditorKey::Char('x'), EditorKey::Interrupt].into_iter();

        let transition = {
            let _guard = RawModeGuard::engaged(&termination, counting(&restores));
            assert!(termination.is_editing());
            drive(&mut Vec::new(), &context(), &termination, || Ok(keys.next())).unwrap()
        };

        assert_eq!(transition, Transition::Cancelled);
        assert_eq!(restores.load(Ordering::SeqCst), 1);
        assert!(!termination.is_editing());
    }

    #[test]
    fn test_termination_request_cancels_prompt() {
        let termination = Termination::new();
        let restores = Arc::new(AtomicUsize::new(0));
        let mut polls = 0;

        let transition = {
            let _guard = RawModeGuard::engaged(&termination, counting(&restores));
            drive(&mut Vec::new(), &context(), &termination, || {
                polls += 1;
                if polls == 3 {
                    assert!(termination.request());
                }
                Ok(None)
            })
            .unwrap()
        };

        assert_eq!(transition, Transition::Cancelled);
        assert_eq!(polls, 3);
        assert_eq!(restores.load(Ordering::SeqCst), 1);
        assert!(!termination.is_editing());
    }
}
