use super::state::{EditorKey, EditorState};
use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::queue;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};

/// Suggestions shown in the strip before the "+N more" counter
pub const STRIP_LEN: usize = 6;

/// Decodes a terminal key event. Releases and repeats are ignored.
pub fn map_key(event: KeyEvent) -> Option<EditorKey> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char('c') => Some(EditorKey::Interrupt),
            KeyCode::Char('d') => Some(EditorKey::Delete),
            KeyCode::Char('a') => Some(EditorKey::Home),
            KeyCode::Char('e') => Some(EditorKey::End),
            _ => None,
        };
    }
    match event.code {
        KeyCode::Char(c) if !c.is_control() => Some(EditorKey::Char(c)),
        KeyCode::Backspace => Some(EditorKey::Backspace),
        KeyCode::Delete => Some(EditorKey::Delete),
        KeyCode::Left => Some(EditorKey::Left),
        KeyCode::Right => Some(EditorKey::Right),
        KeyCode::Up => Some(EditorKey::Up),
        KeyCode::Down => Some(EditorKey::Down),
        KeyCode::Home => Some(EditorKey::Home),
        KeyCode::End => Some(EditorKey::End),
        KeyCode::Tab => Some(EditorKey::Tab),
        KeyCode::Enter => Some(EditorKey::Enter),
        KeyCode::Esc => Some(EditorKey::Escape),
        _ => None,
    }
}

/// Redraws the input line and, when open, the suggestion strip below it.
///
/// Leaves the terminal cursor on the input line at the editor cursor. The
/// caller flushes.
pub fn render<W: Write>(out: &mut W, prompt: &str, state: &EditorState) -> io::Result<()> {
    let prompt = format!("{} ", prompt);
    queue!(
        out,
        MoveToColumn(0),
        Clear(ClearType::FromCursorDown),
        Print(prompt.as_str().cyan()),
        Print(state.buffer())
    )?;

    if state.overlay_open() && !state.suggestions().is_empty() {
        queue!(out, Print("\r\n"))?;
        let shown = state.suggestions().len().min(STRIP_LEN);
        if state.selected() == Some(0) {
            queue!(out, Print("Tab: complete, ↑↓: navigate: ".dim()))?;
        }
        for (i, suggestion) in state.suggestions().iter().take(shown).enumerate() {
            let label = format!(" {} ", suggestion);
            if state.selected() == Some(i) {
                queue!(out, Print(label.as_str().black().on_cyan()))?;
            } else {
                queue!(out, Print(label.as_str().dim()))?;
            }
            if i + 1 < shown {
                queue!(out, Print(" "))?;
            }
        }
        let hidden = state.suggestions().len() - shown;
        if hidden > 0 {
            queue!(out, Print(format!(" ... +{} more", hidden).dim()))?;
        }
        queue!(out, MoveUp(1))?;
    }

    let column = prompt.chars().count() + state.cursor();
    queue!(out, MoveToColumn(u16::try_from(column).unwrap_or(u16::MAX)))?;
    Ok(())
}
