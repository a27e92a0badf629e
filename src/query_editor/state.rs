//! Editor state machine
//!
//! Pure transition logic for the single-line editor. Nothing here touches
//! the terminal, so every key sequence can be replayed in tests.

use crate::autocomplete::SuggestionSource;

/// Key events the editor reacts to, already decoded from the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Tab,
    Enter,
    Escape,
    Interrupt,
}

/// Outcome of feeding one key to the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Keep reading keys
    Continue,
    /// Enter with no suggestion selected; carries the trimmed buffer
    Submitted(String),
    /// Interrupt received
    Cancelled,
}

/// Buffer, cursor and suggestion overlay of one input request.
///
/// `cursor` counts characters, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorState {
    buffer: String,
    cursor: usize,
    suggestions: Vec<String>,
    selected: Option<usize>,
    overlay_open: bool,
}

impl EditorState {
    /// Fresh state with suggestions already computed for the empty buffer
    pub fn new(source: Option<&dyn SuggestionSource>) -> Self {
        let mut state = EditorState::default();
        state.refresh(source);
        state
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn overlay_open(&self) -> bool {
        self.overlay_open
    }

    fn char_len(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.buffer.len())
    }

    /// Applies one key event.
    pub fn handle(&mut self, key: EditorKey, source: Option<&dyn SuggestionSource>) -> Transition {
        match key {
            EditorKey::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.buffer.insert(at, c);
                self.cursor += 1;
                self.refresh(source);
            }
            EditorKey::Backspace => {
                if self.cursor > 0 {
                    let at = self.byte_index(self.cursor - 1);
                    self.buffer.remove(at);
                    self.cursor -= 1;
                    self.refresh(source);
                }
            }
            EditorKey::Delete => {
                if self.cursor < self.char_len() {
                    let at = self.byte_index(self.cursor);
                    self.buffer.remove(at);
                    self.refresh(source);
                }
            }
            EditorKey::Left => self.cursor = self.cursor.saturating_sub(1),
            EditorKey::Right => self.cursor = (self.cursor + 1).min(self.char_len()),
            EditorKey::Home => self.cursor = 0,
            EditorKey::End => self.cursor = self.char_len(),
            EditorKey::Up => {
                if !self.suggestions.is_empty() {
                    let last = self.suggestions.len() - 1;
                    self.selected = Some(match self.selected {
                        None | Some(0) => last,
                        Some(i) => i - 1,
                    });
                    self.overlay_open = true;
                }
            }
            EditorKey::Down => {
                if !self.suggestions.is_empty() {
                    let last = self.suggestions.len() - 1;
                    self.selected = Some(match self.selected {
                        Some(i) if i < last => i + 1,
                        _ => 0,
                    });
                    self.overlay_open = true;
                }
            }
            EditorKey::Tab => {
                if !self.suggestions.is_empty() {
                    let index = self.selected.unwrap_or(0);
                    self.accept(index, source);
                }
            }
            EditorKey::Enter => match self.selected {
                Some(index) if index < self.suggestions.len() => self.accept(index, source),
                _ => return Transition::Submitted(self.buffer.trim().to_string()),
            },
            EditorKey::Escape => {
                self.overlay_open = false;
                self.selected = None;
            }
            EditorKey::Interrupt => return Transition::Cancelled,
        }
        Transition::Continue
    }

    /// Recomputes suggestions from the trimmed buffer and preselects the first
    fn refresh(&mut self, source: Option<&dyn SuggestionSource>) {
        let input = self.buffer.trim();
        self.suggestions = match source {
            None => Vec::new(),
            Some(source) if input.is_empty() => source.quick_suggestions(),
            Some(source) => source.suggestions(input),
        };
        if self.suggestions.is_empty() {
            self.selected = None;
            self.overlay_open = false;
        } else {
            self.selected = Some(0);
            self.overlay_open = true;
        }
    }

    /// Completes the word under the cursor with suggestion `index`.
    ///
    /// The partial word is the run of non-whitespace ending at the cursor. It
    /// is replaced when the suggestion extends it (ignoring case); otherwise
    /// the suggestion is inserted at the cursor.
    fn accept(&mut self, index: usize, source: Option<&dyn SuggestionSource>) {
        let Some(suggestion) = self.suggestions.get(index).cloned() else {
            return;
        };
        let cursor_byte = self.byte_index(self.cursor);
        let partial_len = self.buffer[..cursor_byte]
            .chars()
            .rev()
            .take_while(|c| !c.is_whitespace())
            .count();
        let partial_start = self.cursor - partial_len;
        let start_byte = self.byte_index(partial_start);
        let partial = self.buffer[start_byte..cursor_byte].to_lowercase();

        let suggestion_len = suggestion.chars().count();
        if !partial.is_empty() && suggestion.to_lowercase().starts_with(&partial) {
            self.buffer.replace_range(start_byte..cursor_byte, &suggestion);
            self.cursor = partial_start + suggestion_len;
        } else {
            self.buffer.insert_str(cursor_byte, &suggestion);
            self.cursor += suggestion_len;
        }

        if self.cursor == self.char_len() && !self.buffer.ends_with(char::is_whitespace) {
            self.buffer.push(' ');
            self.cursor += 1;
        }

        self.overlay_open = false;
        self.refresh(source);
    }
}
