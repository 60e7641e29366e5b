//! Text tables over schema-free records.
//!
//! A [`TableView`] projects [`Record`]s onto an ordered column list chosen
//! by the caller. Columns a record lacks render as empty cells; keys a
//! record has beyond the chosen columns are ignored.

use std::fmt;

use portfina_core::records::{field_text, Record};

/// Marker printed in front of the selected row.
const SELECTED_MARKER: &str = ">";

/// How a row is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey {
    /// The value of a column that is unique per row.
    Column(String),
    /// `{index}:{first column value}`, for data with no unique column.
    Index,
}

/// An ordered projection of records, ready to render.
#[derive(Debug, Clone)]
pub struct TableView {
    columns: Vec<String>,
    rows: Vec<Record>,
    row_key: RowKey,
    selected: Option<String>,
}

impl TableView {
    pub fn new(columns: &[&str], rows: Vec<Record>, row_key: RowKey) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            row_key,
            selected: None,
        }
    }

    /// Mark the row whose id equals `id`.
    pub fn with_selected(mut self, id: Option<&str>) -> Self {
        self.selected = id.map(str::to_owned);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Stable identifier of the row at `index`.
    pub fn row_id(&self, index: usize) -> Option<String> {
        let row = self.rows.get(index)?;
        Some(match &self.row_key {
            RowKey::Column(column) => field_text(row, column),
            RowKey::Index => {
                let first = self
                    .columns
                    .first()
                    .map(|c| field_text(row, c))
                    .unwrap_or_default();
                format!("{index}:{first}")
            }
        })
    }

    /// Every row as display strings, one per column.
    pub fn cells(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().map(|c| field_text(row, c)).collect())
            .collect()
    }

    /// Render a padded text table with a header and separator line.
    pub fn render(&self) -> String {
        let cells = self.cells();
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let gutter = " ".repeat(SELECTED_MARKER.len() + 1);
        let mut out = String::new();
        out.push_str(&gutter);
        out.push_str(&join_padded(&self.columns, &widths));
        out.push('\n');
        out.push_str(&gutter);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&rule.join("-+-"));
        out.push('\n');

        for (index, row) in cells.iter().enumerate() {
            let is_selected = self.selected.is_some() && self.row_id(index) == self.selected;
            if is_selected {
                out.push_str(SELECTED_MARKER);
                out.push(' ');
            } else {
                out.push_str(&gutter);
            }
            out.push_str(&join_padded(row, &widths));
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for TableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn join_padded(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    padded.join(" | ").trim_end().to_string()
}
