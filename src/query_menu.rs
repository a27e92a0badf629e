// Menu-driven and plain line input strategies
//
// Both read lines through a `Prompter`. The terminal prompter is backed by
// reedline; tests drive the menu flows with a scripted prompter instead.

use crate::core::db::EngineFamily;
use crate::core::{DbcliError, Result};
use crate::highlight::highlight;
use crate::query_editor::{EditorInput, InputContext, QueryInput};
use crossterm::style::Stylize;
use reedline::{
    EditCommand, FileBackedHistory, Prompt, PromptEditMode, PromptHistorySearch,
    PromptHistorySearchStatus, Reedline, Signal,
};
use std::borrow::Cow;
use tracing::debug;

/// History entries listed in the recall menu
const HISTORY_CHOICES: usize = 15;
const PREVIEW_WIDTH: usize = 70;
/// Multi-line entry previews the buffer after every this many lines
const PREVIEW_EVERY: usize = 3;

/// Line-oriented user interaction
pub trait Prompter {
    /// Reads one line. `initial` pre-fills the line.
    fn line(&mut self, prompt: &str, initial: Option<&str>) -> Result<String>;

    /// Lets the user pick one of `options`, returning its index
    fn select(&mut self, message: &str, options: &[String]) -> Result<usize>;

    /// Displays informational text
    fn show(&mut self, text: &str);
}

struct LinePrompt<'a> {
    text: &'a str,
}

impl Prompt for LinePrompt<'_> {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Owned(self.text.cyan().to_string())
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<str> {
        Cow::Borrowed(" ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(&self, search: PromptHistorySearch) -> Cow<str> {
        let prefix = match search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({}reverse-search: {}) ", prefix, search.term))
    }
}

/// Reedline-backed prompter on the controlling terminal
pub struct TerminalPrompter {
    editor: Reedline,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        TerminalPrompter {
            editor: Reedline::create(),
        }
    }

    /// Prompter whose lines are recalled with the arrow keys for the rest of
    /// the session
    pub fn with_recall(capacity: usize) -> Self {
        let editor = match FileBackedHistory::new(capacity) {
            Ok(history) => Reedline::create().with_history(Box::new(history)),
            Err(e) => {
                debug!("In-session recall unavailable: {}", e);
                Reedline::create()
            }
        };
        TerminalPrompter { editor }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn line(&mut self, prompt: &str, initial: Option<&str>) -> Result<String> {
        if let Some(text) = initial {
            self.editor
                .run_edit_commands(&[EditCommand::Clear, EditCommand::InsertString(text.to_string())]);
        }
        match self.editor.read_line(&LinePrompt { text: prompt })? {
            Signal::Success(line) => Ok(line),
            _ => Err(DbcliError::Cancelled),
        }
    }

    fn select(&mut self, message: &str, options: &[String]) -> Result<usize> {
        println!("{}", message.bold());
        for (i, option) in options.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, option);
        }
        loop {
            let answer = self.line("Choice #", None)?;
            match answer.trim().parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                _ => println!("{}", format!("Enter a number between 1 and {}", options.len()).red()),
            }
        }
    }

    fn show(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Asks a yes/no question on a fresh line prompt
pub fn confirm_line(message: &str) -> Result<bool> {
    let mut prompter = TerminalPrompter::new();
    ask_yes_no(&mut prompter, message)
}

fn ask_yes_no<P: Prompter + ?Sized>(prompter: &mut P, message: &str) -> Result<bool> {
    let answer = prompter.line(&format!("{} [y/N]", message), None)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Collapses whitespace and cuts to `max` characters with a trailing `...`
pub fn truncate_query(query: &str, max: usize) -> String {
    let single = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if single.chars().count() > max {
        let kept: String = single.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        single
    }
}

/// Line, word and character counts shown in the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryStats {
    pub lines: usize,
    pub words: usize,
    pub chars: usize,
}

impl QueryStats {
    pub fn of(query: &str) -> Self {
        QueryStats {
            lines: query.split('\n').count(),
            words: query.split_whitespace().count(),
            chars: query.chars().count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    SingleLine,
    Editor,
    MultiLine,
    Templates,
    History,
    Exit,
}

impl MenuChoice {
    fn label(self) -> &'static str {
        match self {
            MenuChoice::SingleLine => "Write single line query",
            MenuChoice::Editor => "Query with autocomplete",
            MenuChoice::MultiLine => "Write multi-line query",
            MenuChoice::Templates => "Quick query templates",
            MenuChoice::History => "Select from history",
            MenuChoice::Exit => "Exit console",
        }
    }
}

/// What a sub-flow produced
enum Draft {
    /// Goes through the preview before execution
    Review(String),
    /// Back to the main menu
    Back,
}

/// Menu of entry styles: single line, the autocomplete editor, multi-line,
/// templates and history recall, each followed by a preview step.
pub struct MenuInput<P: Prompter = TerminalPrompter> {
    prompter: P,
}

impl MenuInput<TerminalPrompter> {
    pub fn new() -> Self {
        MenuInput {
            prompter: TerminalPrompter::new(),
        }
    }
}

impl Default for MenuInput<TerminalPrompter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Prompter> MenuInput<P> {
    pub fn with_prompter(prompter: P) -> Self {
        MenuInput { prompter }
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    fn choices(ctx: &InputContext<'_>) -> Vec<MenuChoice> {
        let mut choices = vec![MenuChoice::SingleLine];
        if ctx.completer.is_some() {
            choices.push(MenuChoice::Editor);
        }
        choices.push(MenuChoice::MultiLine);
        choices.push(MenuChoice::Templates);
        if !ctx.recent.is_empty() {
            choices.push(MenuChoice::History);
        }
        choices.push(MenuChoice::Exit);
        choices
    }

    fn non_empty(&mut self, query: String) -> Draft {
        let query = query.trim().to_string();
        if query.is_empty() {
            self.prompter.show(&"Query cannot be empty".red().to_string());
            Draft::Back
        } else {
            Draft::Review(query)
        }
    }

    /// Collects lines until `END`; `CANCEL` abandons the entry
    fn multi_line(&mut self, mut lines: Vec<String>) -> Result<Option<String>> {
        self.prompter.show(&"Enter your query line by line. Type END on a new line when finished.".dim().to_string());
        self.prompter.show(&"Type CANCEL to go back to the main menu.".dim().to_string());
        loop {
            let line = self.prompter.line(&format!("{:>2}>", lines.len() + 1), None)?;
            match line.trim().to_uppercase().as_str() {
                "END" => break,
                "CANCEL" => return Ok(None),
                _ => {}
            }
            lines.push(line);
            if lines.len() % PREVIEW_EVERY == 0 {
                self.prompter.show(&"Current query:".dim().to_string());
                self.prompter.show(&lines.join("\n"));
            }
        }
        Ok(Some(lines.join("\n").trim().to_string()))
    }

    fn templates(&mut self, ctx: &InputContext<'_>) -> Result<Draft> {
        let templates = ctx.engine.query_templates();
        let mut options: Vec<String> = templates.iter().map(|t| t.name.to_string()).collect();
        options.push("Back to main menu".to_string());
        let index = self.prompter.select("Select a query template:", &options)?;
        let Some(template) = templates.get(index) else {
            return Ok(Draft::Back);
        };
        let customized = self.prompter.line("Customize query", Some(template.query))?;
        if customized.trim().is_empty() {
            return Ok(Draft::Review(template.query.to_string()));
        }
        Ok(self.non_empty(customized))
    }

    fn history(&mut self, ctx: &InputContext<'_>) -> Result<Draft> {
        let shown = &ctx.recent[..ctx.recent.len().min(HISTORY_CHOICES)];
        let mut options: Vec<String> = shown
            .iter()
            .enumerate()
            .map(|(i, query)| {
                let lines = query.split('\n').count();
                let indicator = if lines > 1 { format!(" ({} lines)", lines) } else { String::new() };
                format!("{:>2}. {}{}", i + 1, truncate_query(query, PREVIEW_WIDTH), indicator)
            })
            .collect();
        options.push("Back to main menu".to_string());

        let index = self.prompter.select("Select a query from history:", &options)?;
        let Some(query) = shown.get(index) else {
            return Ok(Draft::Back);
        };

        self.show_query("Selected query:", query, ctx.engine.family());
        let actions = ["Execute as is", "Edit query", "Back"].map(String::from);
        match self.prompter.select("What would you like to do with this query?", &actions)? {
            0 => Ok(Draft::Review(query.clone())),
            1 => {
                let edited = self.edit(query)?;
                Ok(self.non_empty(edited))
            }
            _ => Ok(Draft::Back),
        }
    }

    /// Edits `original`; cancelling keeps it unchanged
    fn edit(&mut self, original: &str) -> Result<String> {
        let lines: Vec<&str> = original.split('\n').collect();
        if lines.len() == 1 {
            let edited = self.prompter.line("Edit query", Some(original))?;
            return Ok(if edited.trim().is_empty() { original.to_string() } else { edited });
        }

        self.prompter.show(&"Current query:".dim().to_string());
        for (i, line) in lines.iter().enumerate() {
            self.prompter.show(&format!("{:>2}: {}", i + 1, line));
        }
        let modes = ["Edit line by line", "Rewrite completely", "Cancel edit"].map(String::from);
        match self.prompter.select("How would you like to edit?", &modes)? {
            0 => self.edit_lines(&lines),
            1 => Ok(self.multi_line(Vec::new())?.unwrap_or_else(|| original.to_string())),
            _ => Ok(original.to_string()),
        }
    }

    fn edit_lines(&mut self, lines: &[&str]) -> Result<String> {
        self.prompter.show(&"Press Enter to keep a line, type DELETE to remove it.".dim().to_string());
        let mut kept = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            let edited = self.prompter.line(&format!("{:>2}:", i + 1), Some(line))?;
            if edited.trim().eq_ignore_ascii_case("DELETE") {
                continue;
            }
            kept.push(edited);
        }
        if ask_yes_no(&mut self.prompter, "Add more lines?")? {
            if let Some(more) = self.multi_line(kept.clone())? {
                return Ok(more);
            }
        }
        Ok(kept.join("\n").trim().to_string())
    }

    fn show_query(&mut self, title: &str, query: &str, family: EngineFamily) {
        let rule = "─".repeat(60);
        self.prompter.show(&title.dim().to_string());
        self.prompter.show(&rule.as_str().dim().to_string());
        self.prompter.show(&highlight(query, family));
        self.prompter.show(&rule.as_str().dim().to_string());
    }

    /// Preview with stats; `None` means the user backed out
    fn review(&mut self, mut query: String, family: EngineFamily) -> Result<Option<String>> {
        loop {
            self.show_query("Query preview:", &query, family);
            let stats = QueryStats::of(&query);
            self.prompter.show(
                &format!("Stats: {} lines, {} words, {} characters", stats.lines, stats.words, stats.chars)
                    .dim()
                    .to_string(),
            );
            let actions = ["Yes, execute query", "Edit query again", "Cancel and go back"].map(String::from);
            match self.prompter.select("Execute this query?", &actions)? {
                0 => return Ok(Some(query)),
                1 => query = self.edit(&query)?,
                _ => return Ok(None),
            }
        }
    }
}

impl<P: Prompter> QueryInput for MenuInput<P> {
    fn read_query(&mut self, ctx: &InputContext<'_>) -> Result<String> {
        loop {
            let choices = Self::choices(ctx);
            let labels: Vec<String> = choices.iter().map(|c| c.label().to_string()).collect();
            let index = self.prompter.select("How would you like to enter your query?", &labels)?;
            let choice = choices.get(index).copied().unwrap_or(MenuChoice::Exit);

            let draft = match choice {
                MenuChoice::SingleLine => {
                    let line = self.prompter.line(ctx.prompt, None)?;
                    self.non_empty(line)
                }
                MenuChoice::Editor => Draft::Review(EditorInput::new().read_query(ctx)?),
                MenuChoice::MultiLine => match self.multi_line(Vec::new())? {
                    Some(query) => self.non_empty(query),
                    None => Draft::Back,
                },
                MenuChoice::Templates => self.templates(ctx)?,
                MenuChoice::History => self.history(ctx)?,
                MenuChoice::Exit => return Err(DbcliError::Cancelled),
            };

            match draft {
                Draft::Review(query) => {
                    if let Some(query) = self.review(query, ctx.engine.family())? {
                        return Ok(query);
                    }
                }
                Draft::Back => {}
            }
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        ask_yes_no(&mut self.prompter, message)
    }
}

/// Plain prompt; earlier lines are recalled with the arrow keys
pub struct LineInput {
    prompter: TerminalPrompter,
}

impl LineInput {
    pub fn new(recall: usize) -> Self {
        LineInput {
            prompter: TerminalPrompter::with_recall(recall),
        }
    }
}

impl QueryInput for LineInput {
    fn read_query(&mut self, ctx: &InputContext<'_>) -> Result<String> {
        loop {
            let line = self.prompter.line(ctx.prompt, None)?;
            let query = line.trim();
            if !query.is_empty() {
                return Ok(query.to_string());
            }
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        ask_yes_no(&mut self.prompter, message)
    }
}
