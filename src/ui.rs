//! Terminal rendering of a [`BrowserState`].
//!
//! Layout, top to bottom: one header line with key hints, the bordered
//! archive table, and the filter input while filtering. The folder
//! confirmation dialog is drawn centered on top.

use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use crate::browser::{BrowserState, ConfirmChoice, Mode, StatusKind};
use crate::catalog::COLUMN_HEADERS;

const FILTER_LABEL: &str = "Filter: ";
const DIALOG_WIDTH: u16 = 60;
const DIALOG_HEIGHT: u16 = 9;

pub fn render(frame: &mut Frame, state: &mut BrowserState, table_state: &mut TableState) {
    let filtering = state.mode() == Mode::Filtering;
    let footer_height = if filtering { 1 } else { 0 };

    let [header_area, table_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(footer_height),
    ])
    .areas(frame.area());

    render_header(frame, header_area);

    // Borders and the column header row take three lines
    state.set_page_size(table_area.height.saturating_sub(3) as usize);
    render_table(frame, state, table_state, table_area);

    if filtering {
        render_filter(frame, state, footer_area);
    }

    if state.mode() == Mode::ConfirmingFolderExtraction {
        render_confirm(frame, state);
    }
}

fn render_header(frame: &mut Frame, area: Rect) {
    let header = Line::from(vec![
        "zipnav!".bold(),
        " • Up/Down select • Enter extract • f filter • q exit".dark_gray(),
    ]);
    frame.render_widget(header, area);
}

fn render_table(
    frame: &mut Frame,
    state: &BrowserState,
    table_state: &mut TableState,
    area: Rect,
) {
    let header = Row::new(
        COLUMN_HEADERS
            .iter()
            .map(|h| Cell::from(Line::from(*h).centered())),
    )
    .bold();

    let rows: Vec<Row> = state
        .visible_rows()
        .map(|entry| Row::new(entry.columns()))
        .collect();

    let widths = [
        Constraint::Fill(1),
        Constraint::Length(9),
        Constraint::Length(12),
        Constraint::Length(20),
        Constraint::Length(10),
    ];

    let title_style = match state.extraction_status().map(|s| s.kind) {
        Some(StatusKind::Success) => Style::new().fg(Color::Green),
        Some(StatusKind::Error) => Style::new().fg(Color::Red),
        None => Style::new(),
    };
    let block = Block::bordered().title(Line::styled(state.title(), title_style).centered());

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::new().reversed());

    table_state.select(state.selected());
    frame.render_stateful_widget(table, area, table_state);
}

fn render_filter(frame: &mut Frame, state: &BrowserState, area: Rect) {
    let line = Line::from(vec![Span::raw(FILTER_LABEL), Span::raw(state.filter_text())]);
    frame.render_widget(Paragraph::new(line), area);

    let cursor_x = area
        .x
        .saturating_add(FILTER_LABEL.len() as u16)
        .saturating_add(state.filter_text().chars().count() as u16)
        .min(area.right().saturating_sub(1));
    frame.set_cursor_position((cursor_x, area.y));
}

fn render_confirm(frame: &mut Frame, state: &BrowserState) {
    let Some(request) = state.pending_folder() else {
        return;
    };

    let area = centered(frame.area(), DIALOG_WIDTH, DIALOG_HEIGHT);
    frame.render_widget(Clear, area);

    let block = Block::bordered();
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [text_area, buttons_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);

    let text = format!(
        "Extract folder '{}' and all its contents?\n\nThis will extract all files within this folder recursively.",
        request.target
    );
    frame.render_widget(
        Paragraph::new(text).centered().wrap(Wrap { trim: true }),
        text_area,
    );

    let button = |label: &'static str, choice: ConfirmChoice| {
        let span = Span::raw(format!(" {} ", label));
        if state.confirm_choice() == choice {
            span.reversed()
        } else {
            span
        }
    };
    let buttons = Line::from(vec![
        button("Yes", ConfirmChoice::Yes),
        Span::raw("   "),
        button("No", ConfirmChoice::No),
    ])
    .centered();
    frame.render_widget(buttons, buttons_area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    area
}
