use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use roster_core::coordinator::{EditorPhase, FormEditor};
use roster_core::models::{FormField, Gender};

use crate::app::App;
use crate::ui::styles;

/// Width of the label column.
const LABEL_WIDTH: usize = 15;

/// Render the add/edit form.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(editor) = app.editor.as_ref() else {
        return;
    };

    let block = Block::default()
        .title(format!(" {} ", editor.mode().title()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let lines = if editor.is_missing() {
        missing_lines(editor)
    } else {
        match editor.phase() {
            EditorPhase::Idle | EditorPhase::Loading => vec![
                Line::from(""),
                Line::from(Span::styled("  Loading student...", styles::muted_style())),
            ],
            EditorPhase::LoadFailed(e) => vec![
                Line::from(""),
                Line::from(Span::styled(format!("  {}", e), styles::error_style())),
                Line::from(""),
                Line::from(Span::styled("  [Esc] Back to list", styles::muted_style())),
            ],
            _ => form_lines(app, editor),
        }
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn missing_lines(editor: &FormEditor) -> Vec<Line<'static>> {
    let id = editor.mode().id().unwrap_or_default().to_string();
    vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  No student with id {}", id),
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(Span::styled("  [Esc] Back to list", styles::muted_style())),
    ]
}

fn gender_choices(selected: Gender) -> Vec<Span<'static>> {
    Gender::ALL
        .iter()
        .map(|gender| {
            let marker = if *gender == selected { "(•)" } else { "( )" };
            let style = if *gender == selected {
                styles::list_item_style()
            } else {
                styles::muted_style()
            };
            Span::styled(format!("{} {}  ", marker, gender), style)
        })
        .collect()
}

fn form_lines(app: &App, editor: &FormEditor) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from("")];
    let busy = editor.is_busy();

    for field in FormField::ALL {
        let focused = field == app.focused_field && !busy;
        let label_style = if focused {
            styles::help_key_style()
        } else {
            styles::muted_style()
        };
        let mut spans = vec![Span::styled(
            format!("  {:<width$}", field.label(), width = LABEL_WIDTH),
            label_style,
        )];

        if field == FormField::Gender {
            spans.extend(gender_choices(editor.form().gender));
        } else {
            let style = if focused {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let cursor = if focused { "▌" } else { "" };
            spans.push(Span::styled(
                format!("{}{}", editor.form().value(field), cursor),
                style,
            ));
        }
        lines.push(Line::from(spans));

        if let Some(message) = editor.field_error(field) {
            lines.push(Line::from(Span::styled(
                format!("  {:<width$}{}", "", message, width = LABEL_WIDTH),
                styles::error_style(),
            )));
        }
    }

    lines.push(Line::from(""));

    let submit = if busy {
        Span::styled("  Saving...", styles::muted_style())
    } else {
        Span::styled(
            format!("  [Enter] {}", editor.mode().submit_label()),
            styles::help_key_style(),
        )
    };
    lines.push(Line::from(vec![
        submit,
        Span::styled("    [Esc] Back to list", styles::muted_style()),
    ]));

    if let Some(message) = editor.general_error() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", message),
            styles::error_style(),
        )));
    }
    if *editor.phase() == EditorPhase::Saved {
        if let Some(notice) = app.status_message.as_deref() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("  {}", notice),
                styles::success_style(),
            )));
        }
    }

    lines
}
