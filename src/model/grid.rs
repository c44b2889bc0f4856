use std::collections::BTreeSet;

use tracing::trace;

use crate::client::Counter;
use crate::model::sort::{ColumnId, SortCriteria};
use crate::model::store::{DataStore, StoreEvent};

pub const ACTIONS_COLUMN_WIDTH: usize = 9;
pub const RESET_AFFORDANCE: &str = "[reset]";
pub const TABLE_HEADER_HEIGHT: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub id: ColumnId,
    pub name: &'static str,
    pub sortable: bool,
    pub default_sort_asc: bool,
    /// Fixed width, `None` means the column shares the remaining width.
    pub width: Option<usize>,
}

impl ColumnDef {
    fn data(id: ColumnId, name: &'static str, default_sort_asc: bool) -> Self {
        Self {
            id,
            name,
            sortable: true,
            default_sort_asc,
            width: None,
        }
    }

    fn actions() -> Self {
        Self {
            id: ColumnId::Actions,
            name: "",
            sortable: false,
            default_sort_asc: true,
            width: Some(ACTIONS_COLUMN_WIDTH),
        }
    }
}

pub fn counter_columns(privileged: bool) -> Vec<ColumnDef> {
    let mut columns = vec![
        ColumnDef::data(ColumnId::Context, "Context", true),
        ColumnDef::data(ColumnId::Name, "Name", true),
        ColumnDef::data(ColumnId::Value, "Value", false),
    ];
    // only flow managers get to reset counters
    if privileged {
        columns.push(ColumnDef::actions());
    }
    columns
}

/// A cell activated by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridClick {
    pub row: usize,
    pub cell: usize,
    pub column: ColumnId,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

/// Rendering side of the counters table.
///
/// Holds the cursor, the scroll window and the set of rows that need to be
/// redrawn. It never owns counters; every projection reads them from the
/// [`DataStore`].
pub struct GridView {
    columns: Vec<ColumnDef>,
    sort_column: Option<(ColumnId, bool)>,
    row_count: usize,
    cursor_row: usize,
    cursor_cell: usize,
    offset_row: usize,
    width: usize,
    height: usize,
    max_column_width: usize,
    invalid_rows: BTreeSet<usize>,
    render_count: usize,
    displayed_label: String,
}

impl GridView {
    pub fn new(columns: Vec<ColumnDef>, max_column_width: usize) -> Self {
        Self {
            columns,
            sort_column: None,
            row_count: 0,
            cursor_row: 0,
            cursor_cell: 0,
            offset_row: 0,
            width: 0,
            height: 0,
            max_column_width,
            invalid_rows: BTreeSet::new(),
            render_count: 0,
            displayed_label: "0".to_string(),
        }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn has_column(&self, id: ColumnId) -> bool {
        self.columns.iter().any(|c| c.id == id)
    }

    pub fn column_index(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn set_sort_column(&mut self, column: ColumnId, ascending: bool) {
        self.sort_column = Some((column, ascending));
    }

    pub fn sort_column(&self) -> Option<(ColumnId, bool)> {
        self.sort_column
    }

    /// Activates a column header. Returns the sort to apply, if the column is sortable.
    pub fn activate_header(&mut self, cell: usize) -> Option<SortCriteria> {
        let column = self.columns.get(cell)?;
        if !column.sortable {
            return None;
        }
        let ascending = match self.sort_column {
            Some((id, asc)) if id == column.id => !asc,
            _ => column.default_sort_asc,
        };
        let criteria = SortCriteria::new(column.id, ascending);
        self.set_sort_column(criteria.column, criteria.ascending);
        Some(criteria)
    }

    pub fn click(&self, row: usize, cell: usize) -> Option<GridClick> {
        if row >= self.row_count {
            return None;
        }
        let column = self.columns.get(cell)?;
        Some(GridClick {
            row,
            cell,
            column: column.id,
        })
    }

    pub fn click_selected(&self) -> Option<GridClick> {
        self.click(self.cursor_row, self.cursor_cell)
    }

    pub fn format_actions_cell(&self) -> &'static str {
        RESET_AFFORDANCE
    }

    pub fn on_store_event(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::RowCountChanged { current, .. } => {
                self.update_row_count(*current);
                self.invalidate();
                self.render();
                self.displayed_label = current.to_string();
            }
            StoreEvent::RowsChanged { rows } => {
                self.invalidate_rows(rows);
                self.render();
            }
        }
    }

    pub fn update_row_count(&mut self, count: usize) {
        self.row_count = count;
        self.clamp_cursor();
    }

    pub fn invalidate_rows(&mut self, rows: &[usize]) {
        self.invalid_rows.extend(rows.iter().copied());
    }

    pub fn invalidate(&mut self) {
        self.invalid_rows.extend(0..self.row_count);
    }

    /// Marks the visible window as drawn. Invalid rows outside the window stay pending.
    pub fn render(&mut self) {
        let window = self.offset_row..self.offset_row + self.body_height();
        self.invalid_rows.retain(|r| !window.contains(r) && *r < self.row_count);
        self.render_count += 1;
        trace!("Grid render #{} ({} rows)", self.render_count, self.row_count);
    }

    pub fn resize_canvas(&mut self, width: usize, height: usize) {
        trace!(
            "Grid resized w:{}->{}, h:{}->{}",
            self.width, width, self.height, height
        );
        self.width = width;
        self.height = height;
        self.clamp_cursor();
        self.invalidate();
        self.render();
    }

    pub fn invalid_rows(&self) -> &BTreeSet<usize> {
        &self.invalid_rows
    }

    pub fn render_count(&self) -> usize {
        self.render_count
    }

    pub fn displayed_label(&self) -> &str {
        &self.displayed_label
    }

    pub fn set_displayed_label(&mut self, label: impl Into<String>) {
        self.displayed_label = label.into();
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn selected(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_cell)
    }

    pub fn selected_column(&self) -> Option<&ColumnDef> {
        self.columns.get(self.cursor_cell)
    }

    /// Cursor row relative to the scroll window.
    pub fn window_cursor(&self) -> usize {
        self.cursor_row.saturating_sub(self.offset_row)
    }

    fn body_height(&self) -> usize {
        self.height.saturating_sub(TABLE_HEADER_HEIGHT).max(1)
    }

    fn clamp_cursor(&mut self) {
        self.cursor_row = self.cursor_row.min(self.row_count.saturating_sub(1));
        self.cursor_cell = self.cursor_cell.min(self.columns.len().saturating_sub(1));
        self.scroll_to_cursor();
    }

    fn scroll_to_cursor(&mut self) {
        let body = self.body_height();
        if self.cursor_row < self.offset_row {
            self.offset_row = self.cursor_row;
        } else if self.cursor_row >= self.offset_row + body {
            self.offset_row = self.cursor_row + 1 - body;
        }
        let max_offset = self.row_count.saturating_sub(body);
        self.offset_row = self.offset_row.min(max_offset);
    }

    pub fn move_up(&mut self, size: usize) {
        self.cursor_row = self.cursor_row.saturating_sub(size);
        self.scroll_to_cursor();
    }

    pub fn move_down(&mut self, size: usize) {
        self.cursor_row = (self.cursor_row + size).min(self.row_count.saturating_sub(1));
        self.scroll_to_cursor();
    }

    pub fn select_row(&mut self, row: usize) {
        self.cursor_row = row.min(self.row_count.saturating_sub(1));
        self.scroll_to_cursor();
    }

    pub fn move_beginning(&mut self) {
        self.cursor_row = 0;
        self.scroll_to_cursor();
    }

    pub fn move_end(&mut self) {
        self.cursor_row = self.row_count.saturating_sub(1);
        self.scroll_to_cursor();
    }

    pub fn move_left(&mut self) {
        self.cursor_cell = self.cursor_cell.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_cell + 1 < self.columns.len() {
            self.cursor_cell += 1;
        }
    }

    pub fn page_size(&self) -> usize {
        self.body_height()
    }

    /// Distributes the canvas width: fixed columns first, the rest share what is left.
    pub fn column_widths(&self) -> Vec<usize> {
        let spacing = self.columns.len().saturating_sub(1);
        let fixed: usize = self.columns.iter().filter_map(|c| c.width).sum();
        let flexible = self.columns.iter().filter(|c| c.width.is_none()).count();
        let remaining = self.width.saturating_sub(fixed + spacing);
        let share = if flexible == 0 { 0 } else { remaining / flexible };
        let share = share.min(self.max_column_width.max(1));
        self.columns
            .iter()
            .map(|c| c.width.unwrap_or(share))
            .collect()
    }

    /// Projects the rows inside the scroll window into one view per column.
    pub fn viewport(&self, store: &DataStore) -> Vec<ColumnView> {
        let rbegin = self.offset_row.min(store.len());
        let rend = std::cmp::min(rbegin + self.body_height(), store.len());
        let widths = self.column_widths();

        self.columns
            .iter()
            .zip(widths)
            .map(|(column, width)| {
                let data = (rbegin..rend)
                    .filter_map(|row| store.item(row))
                    .map(|counter| Self::get_visible_name(self.format_cell(column, counter), width))
                    .collect();
                ColumnView {
                    name: self.header_name(column),
                    width,
                    data,
                }
            })
            .collect()
    }

    fn header_name(&self, column: &ColumnDef) -> String {
        match self.sort_column {
            Some((id, true)) if id == column.id => format!("{} ▲", column.name),
            Some((id, false)) if id == column.id => format!("{} ▼", column.name),
            _ => column.name.to_string(),
        }
    }

    fn format_cell(&self, column: &ColumnDef, counter: &Counter) -> String {
        match column.id {
            ColumnId::Actions => self.format_actions_cell().to_string(),
            id => counter.column_value(id).unwrap_or("").to_string(),
        }
    }

    fn get_visible_name(name: String, width: usize) -> String {
        if width < 3 {
            return "".to_string();
        }
        if name.chars().count() > width {
            let mut reduced_name: String = name.chars().take(width - 3).collect();
            reduced_name.push_str("...");
            return reduced_name;
        }
        name
    }
}
