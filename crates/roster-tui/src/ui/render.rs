use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use roster_core::utils::age_display;
use roster_core::Route;

use crate::app::{App, AppState};

use super::styles;
use super::tabs::{student_form, students};

fn screen_layout(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(area)
}

/// The area the current screen is drawn in, for a terminal of size `area`.
pub fn main_area(area: Rect) -> Rect {
    screen_layout(area)[1]
}

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = screen_layout(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_main_content(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    match &app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::ConfirmingDelete(id) => render_delete_overlay(frame, *id),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Student Roster";
    let route = format!("  {}", app.route);
    let help_hint = "[?] Help";
    let used = title.len() + route.len() + help_hint.len() + 4;

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::styled(route, styles::muted_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match &app.route {
        Route::AddStudent | Route::EditStudent { .. } => student_form::render(frame, app, area),
        Route::NotFound(path) => render_not_found(frame, path, area),
        Route::Home | Route::StudentList { .. } => students::render(frame, app, area),
    }
}

fn render_not_found(frame: &mut Frame, path: &str, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  Nothing lives at {}", path),
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(Span::styled("  [Esc] Go to the student list", styles::muted_style())),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = if app.route.is_form() {
        "[Tab] next field | [Enter] save | [Esc] back"
    } else {
        "[a]dd | [d]elete | [r]efresh | [q]uit"
    };

    let left_text = if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else if let Some(updated_at) = app.view.updated_at() {
        format!(" Updated {} ", age_display(updated_at))
    } else {
        String::new()
    };

    let right_text = format!(" {} ", shortcuts);

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 25, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled("  Student Roster", styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" List", styles::highlight_style())),
        help_line("↑/↓", "Select a student"),
        help_line("←/→", "Previous/next page"),
        help_line("Home/End", "First/last page"),
        help_line("Enter", "Edit selected student"),
        help_line("a", "Add a student"),
        help_line("d", "Delete selected student"),
        help_line("r", "Refetch this page"),
        help_line("c", "Cancel loading"),
        Line::from(""),
        Line::from(Span::styled(" Form", styles::highlight_style())),
        help_line("Tab/↑/↓", "Move between fields"),
        help_line("←/→", "Change gender"),
        help_line("Enter", "Save"),
        help_line("Esc", "Back to list"),
        Line::from(""),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(help_text).block(block);

    frame.render_widget(paragraph, area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn confirm_lines(question: String, action: &'static str) -> Vec<Line<'static>> {
    vec![
        Line::from(""),
        Line::from(Span::styled(format!("   {}", question), styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(format!(" to {}, ", action), styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ]
}

fn render_confirm(frame: &mut Frame, lines: Vec<Line<'static>>) {
    let area = centered_rect_fixed(46, 6, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_delete_overlay(frame: &mut Frame, id: i64) {
    render_confirm(
        frame,
        confirm_lines(format!("Delete student {}?", id), "delete"),
    );
}

fn render_quit_overlay(frame: &mut Frame) {
    render_confirm(
        frame,
        confirm_lines("Are you sure you want to quit?".to_string(), "quit"),
    );
}
