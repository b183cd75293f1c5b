use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use roster_core::coordinator::PageStatus;
use roster_core::utils::{avatar_label, truncate_string};

use crate::app::App;
use crate::ui::styles;

/// Widest avatar label shown in the table.
const AVATAR_WIDTH: usize = 24;

/// Rows taken by the table border and header above the first student.
const ROWS_ABOVE_DATA: u16 = 2;

fn list_layout(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(2)])
        .split(area)
}

/// Render the paginated student list with its page links underneath.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = list_layout(area);

    render_table(frame, app, chunks[0]);
    render_page_links(frame, app, chunks[1]);
}

/// Index of the table row under the terminal cell `(column, row)`, if any.
/// `area` is the area the list screen is drawn in.
pub fn row_at(area: Rect, column: u16, row: u16) -> Option<usize> {
    let table = list_layout(area)[0];
    let first = table.y + ROWS_ABOVE_DATA;
    let bottom = table.y + table.height.saturating_sub(1);
    let inside_x = column > table.x && column < table.x + table.width.saturating_sub(1);
    if !inside_x || row < first || row >= bottom {
        return None;
    }
    Some((row - first) as usize)
}

fn status_label(app: &App) -> Option<String> {
    match app.view.status() {
        PageStatus::Loading => Some("Loading...".to_string()),
        PageStatus::Refreshing if app.view.is_placeholder() => {
            Some(format!("Loading page {}...", app.view.page()))
        }
        PageStatus::Refreshing => Some("Refreshing...".to_string()),
        PageStatus::Ready => None,
        PageStatus::Error(_) => Some("Error".to_string()),
    }
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let students = app.view.students();

    if students.is_empty() {
        let message = match app.view.status() {
            PageStatus::Loading => Line::from(Span::styled(" Loading...", styles::muted_style())),
            PageStatus::Error(e) => Line::from(Span::styled(format!(" {}", e), styles::error_style())),
            _ => Line::from(Span::styled(
                " No students. Press [a] to add one.",
                styles::muted_style(),
            )),
        };
        let block = Block::default()
            .title(" Students ")
            .title_style(styles::muted_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(true));
        frame.render_widget(Paragraph::new(message).block(block), area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("ID"),
        Cell::from("Avatar"),
        Cell::from("Last Name"),
        Cell::from("Email"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = students
        .iter()
        .enumerate()
        .map(|(i, student)| {
            let style = if i == app.selection {
                styles::selected_style()
            } else if app.view.is_placeholder() {
                styles::muted_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(format!("{:>4}", student.id)),
                Cell::from(truncate_string(&avatar_label(&student.avatar), AVATAR_WIDTH)),
                Cell::from(student.last_name.clone()),
                Cell::from(student.email.clone()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(5),
        Constraint::Length(AVATAR_WIDTH as u16),
        Constraint::Fill(1),
        Constraint::Fill(2),
    ];

    let total = app.view.total_pages(app.page_size());
    let mut title = format!(" Students - page {} of {} ", app.view.page(), total.max(1));
    if let Some(label) = status_label(app) {
        title.push_str(&format!("({}) ", label));
    }

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.selection));

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_page_links(frame: &mut Frame, app: &App, area: Rect) {
    let page_size = app.page_size();
    let current = app.view.page();

    let mut spans = vec![Span::raw(" ")];
    let previous_style = if current.has_previous() {
        styles::help_key_style()
    } else {
        styles::muted_style()
    };
    spans.push(Span::styled("[←] Prev ", previous_style));

    if let Some(data) = app.view.data() {
        for page in data.page_links(page_size) {
            spans.push(Span::styled(
                format!(" {} ", page),
                styles::page_link_style(page == current),
            ));
        }
    }

    let next_style = if current.has_next(app.view.total_pages(page_size)) {
        styles::help_key_style()
    } else {
        styles::muted_style()
    };
    spans.push(Span::styled(" Next [→]", next_style));

    if let PageStatus::Error(e) = app.view.status() {
        spans.push(Span::styled(format!("   {}", e), styles::error_style()));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
