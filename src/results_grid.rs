//! Results Grid Module for dbcli
//!
//! Renders a query result as a bordered ASCII table: one column per result
//! column, `NULL` for missing values, long cells cut down, and only the first
//! `max_rows` rows drawn with a notice naming the total.

use crate::core::db::{QueryResult, Value};
use comfy_table::presets::NOTHING;
use comfy_table::{Table, TableComponent};

/// Cells longer than this many characters are cut
pub const MAX_CELL_WIDTH: usize = 40;
/// Default number of rows drawn
pub const DEFAULT_MAX_ROWS: usize = 50;

/// `+---+` box with a rule under the header and none between rows
const BORDERS: [(TableComponent, char); 15] = [
    (TableComponent::LeftBorder, '|'),
    (TableComponent::RightBorder, '|'),
    (TableComponent::VerticalLines, '|'),
    (TableComponent::TopBorder, '-'),
    (TableComponent::BottomBorder, '-'),
    (TableComponent::HeaderLines, '-'),
    (TableComponent::TopLeftCorner, '+'),
    (TableComponent::TopRightCorner, '+'),
    (TableComponent::BottomLeftCorner, '+'),
    (TableComponent::BottomRightCorner, '+'),
    (TableComponent::TopBorderIntersections, '+'),
    (TableComponent::BottomBorderIntersections, '+'),
    (TableComponent::LeftHeaderIntersection, '+'),
    (TableComponent::RightHeaderIntersection, '+'),
    (TableComponent::MiddleHeaderIntersections, '+'),
];

/// Text shown for a single value
pub fn cell_text(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => return "NULL".to_string(),
        Some(value) => value.to_string(),
    };
    if text.chars().count() > MAX_CELL_WIDTH {
        let kept: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
        format!("{}...", kept)
    } else {
        text
    }
}

/// Represents the entire grid structure.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows in the result, including those not drawn
    pub total_rows: usize,
}

impl ResultsGrid {
    /// Builds the grid for `result`, keeping at most `max_rows` rows.
    pub fn from_result(result: &QueryResult, max_rows: usize) -> Self {
        let headers = result.column_names();
        let rows = result
            .rows
            .iter()
            .take(max_rows)
            .map(|row| headers.iter().map(|h| cell_text(row.get(h))).collect())
            .collect();
        ResultsGrid {
            headers,
            rows,
            total_rows: result.rows.len(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.total_rows > self.rows.len()
    }

    /// Renders the grid, followed by the truncation notice when rows were
    /// left out. An empty grid renders as an empty string.
    pub fn render(&self) -> String {
        if self.headers.is_empty() {
            return String::new();
        }
        let mut table = Table::new();
        table.load_preset(NOTHING);
        for (component, character) in BORDERS {
            table.set_style(component, character);
        }
        table.set_header(&self.headers);
        for row in &self.rows {
            table.add_row(row);
        }

        let mut output = format!("{}\n", table);
        if self.is_truncated() {
            output.push_str(&format!(
                "Showing first {} rows of {} total rows\n",
                self.rows.len(),
                self.total_rows
            ));
        }
        output
    }
}
