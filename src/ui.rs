use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState},
};

use crate::domain::HELP_TEXT;
use crate::model::CountersTable;

pub const TITLE_HEIGHT: u16 = 1;
pub const FILTER_BAR_HEIGHT: u16 = 1;
pub const STATUSLINE_HEIGHT: u16 = 1;

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the grid's container for a terminal of the given size.
    pub fn table_area(width: u16, height: u16) -> (usize, usize) {
        let chrome = TITLE_HEIGHT + FILTER_BAR_HEIGHT + STATUSLINE_HEIGHT;
        (width as usize, height.saturating_sub(chrome) as usize)
    }

    pub fn draw(&mut self, model: &CountersTable, frame: &mut Frame) {
        let [title, filter, table, status] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT),
            Constraint::Length(FILTER_BAR_HEIGHT),
            Constraint::Min(1),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(frame.area());

        self.draw_title(model, frame, title);
        self.draw_filter_bar(model, frame, filter);
        self.draw_table(model, frame, table);
        self.draw_statusline(model, frame, status);

        if model.show_help() {
            self.draw_help(frame);
        }
    }

    fn draw_title(&self, model: &CountersTable, frame: &mut Frame, area: Rect) {
        let mut spans = vec![" Counters ".bold()];
        if model.is_loading() {
            spans.push(" loading ...".yellow());
        }
        frame.render_widget(Line::from(spans), area);
    }

    fn draw_filter_bar(&self, model: &CountersTable, frame: &mut Frame, area: Rect) {
        let input = model.filter_input();
        let text_style = if input.shows_placeholder() {
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
        } else {
            Style::default()
        };
        let prefix = " / ";
        let line = Line::from(vec![
            Span::raw(prefix),
            Span::styled(input.display_text().to_string(), text_style),
            Span::raw("  "),
            Span::styled(
                format!("[{}]", model.filter_field()),
                Style::default().fg(Color::Blue),
            ),
        ]);
        frame.render_widget(Paragraph::new(line), area);

        if input.is_focused() {
            let x = area.x + (prefix.len() + input.curser_pos()) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
        }
    }

    fn draw_table(&mut self, model: &CountersTable, frame: &mut Frame, area: Rect) {
        let (Some(grid), Some(store)) = (model.grid(), model.store()) else {
            frame.render_widget(Paragraph::new("Not initialized"), area);
            return;
        };

        let columns = grid.viewport(store);
        let (_, selected_cell) = grid.selected();
        let nrows = columns.first().map(|c| c.data.len()).unwrap_or(0);

        let header = Row::new(columns.iter().enumerate().map(|(idx, c)| {
            let cell = Cell::from(c.name.clone());
            if idx == selected_cell {
                cell.style(Style::default().add_modifier(Modifier::UNDERLINED))
            } else {
                cell
            }
        }))
        .style(Style::default().add_modifier(Modifier::BOLD));

        let rows = (0..nrows).map(|ridx| {
            Row::new(columns.iter().enumerate().map(|(cidx, c)| {
                let cell = Cell::from(c.data[ridx].clone());
                if cidx == selected_cell {
                    cell.style(Style::default().add_modifier(Modifier::REVERSED))
                } else {
                    cell
                }
            }))
        });

        let widths = columns
            .iter()
            .map(|c| Constraint::Length(c.width as u16))
            .collect::<Vec<_>>();

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(Style::default().bg(Color::DarkGray));

        if nrows > 0 {
            self.table_state.select(Some(grid.window_cursor()));
        } else {
            self.table_state.select(None);
        }
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_statusline(&self, model: &CountersTable, frame: &mut Frame, area: Rect) {
        let refreshed = model.last_refreshed().unwrap_or("-");
        let detail = model
            .selected_counter()
            .map(|c| format!("{} ", c.id))
            .unwrap_or_default();
        let line = Line::from(vec![
            format!(
                " {}/{} counters | refreshed {} ",
                model.displayed_label(),
                model.total_label(),
                refreshed
            )
            .blue(),
            Span::raw(detail).dim(),
            Span::raw(model.status_message().to_string()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_help(&self, frame: &mut Frame) {
        let area = frame.area();
        let lines = HELP_TEXT.lines().count() as u16;
        let popup = Rect {
            x: area.width.saturating_sub(54) / 2,
            y: area.height.saturating_sub(lines + 2) / 2,
            width: 54.min(area.width),
            height: (lines + 2).min(area.height),
        };
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> ".blue().bold()).centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(HELP_TEXT).block(block), popup);
    }
}
