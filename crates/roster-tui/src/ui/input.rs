//! Keyboard and mouse input handling for the TUI.
//!
//! This module translates terminal events into application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use roster_core::models::{FormField, Page};
use roster_core::Route;

use crate::app::{App, AppState};
use crate::ui::render::main_area;
use crate::ui::tabs::students;

/// Handle a key press. Returns `true` when the application should exit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state.clone() {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingDelete(id) => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.confirm_delete(id);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    if app.route.is_form() {
        handle_form_input(app, key)
    } else if matches!(app.route, Route::StudentList { .. }) {
        handle_list_input(app, key)
    } else {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => app.navigate(Route::list(Page::FIRST)),
            KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
            KeyCode::Char('?') => app.state = AppState::ShowingHelp,
            _ => {}
        }
        Ok(false)
    }
}

/// Handle a mouse event on a terminal of size `screen`. Pointing at a list
/// row selects it, which prefetches that student; clicking opens it.
pub fn handle_mouse(app: &mut App, mouse: MouseEvent, screen: Rect) {
    if app.state != AppState::Normal || !matches!(app.route, Route::StudentList { .. }) {
        return;
    }
    let Some(row) = students::row_at(main_area(screen), mouse.column, mouse.row)
        .filter(|row| *row < app.view.students().len())
    else {
        return;
    };

    match mouse.kind {
        MouseEventKind::Moved => {
            if row != app.selection {
                app.select(row);
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            app.select(row);
            app.open_selected();
        }
        _ => {}
    }
}

fn handle_list_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Any key dismisses a notice
    app.status_message = None;

    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Left | KeyCode::Char('[') => app.previous_page(),
        KeyCode::Right | KeyCode::Char(']') => app.next_page(),
        KeyCode::Home => app.go_to_page(Page::FIRST),
        KeyCode::End => app.last_page(),
        KeyCode::Enter => app.open_selected(),
        KeyCode::Char('a') => app.open_add_form(),
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('c') | KeyCode::Esc => app.cancel(),
        _ => {}
    }
    Ok(false)
}

fn handle_form_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    let busy = app.editor.as_ref().is_some_and(|e| e.is_busy());

    match key.code {
        KeyCode::Esc => {
            app.status_message = None;
            app.back_to_list();
        }
        _ if busy => {}
        KeyCode::Tab | KeyCode::Down => app.focus_next_field(),
        KeyCode::BackTab | KeyCode::Up => app.focus_previous_field(),
        KeyCode::Enter => app.submit_form(),
        KeyCode::Left if app.focused_field == FormField::Gender => app.cycle_gender(false),
        KeyCode::Right | KeyCode::Char(' ') if app.focused_field == FormField::Gender => {
            app.cycle_gender(true)
        }
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Char(c) => app.type_char(c),
        _ => {}
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use roster_core::models::{StudentSummary, StudentsPage};
    use roster_core::{Config, QueryKey};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app() -> App {
        let config = Config {
            api_base_url: "http://127.0.0.1:9/".to_string(),
            ..Config::default()
        };
        App::new(config).expect("app")
    }

    #[tokio::test]
    async fn test_quit_needs_confirmation() {
        let mut app = test_app();
        assert!(!handle_input(&mut app, key(KeyCode::Char('q'))).await.expect("input"));
        assert_eq!(app.state, AppState::ConfirmingQuit);

        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))).await.expect("input"));
        assert_eq!(app.state, AppState::Normal);

        handle_input(&mut app, key(KeyCode::Char('q'))).await.expect("input");
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))).await.expect("input"));
        assert_eq!(app.state, AppState::Quitting);
    }

    #[tokio::test]
    async fn test_add_key_opens_form_and_esc_returns() {
        let mut app = test_app();
        handle_input(&mut app, key(KeyCode::Char('a'))).await.expect("input");
        assert_eq!(app.route, Route::AddStudent);

        // Letters type into the form instead of acting as shortcuts
        handle_input(&mut app, key(KeyCode::Char('q'))).await.expect("input");
        assert_eq!(app.state, AppState::Normal);
        let email = &app.editor.as_ref().expect("editor").form().email;
        assert_eq!(email, "q");

        handle_input(&mut app, key(KeyCode::Esc)).await.expect("input");
        assert_eq!(app.route, Route::list(Page::FIRST));
        assert!(app.editor.is_none());
    }

    #[tokio::test]
    async fn test_help_overlay_toggles() {
        let mut app = test_app();
        handle_input(&mut app, key(KeyCode::Char('?'))).await.expect("input");
        assert_eq!(app.state, AppState::ShowingHelp);
        handle_input(&mut app, key(KeyCode::Esc)).await.expect("input");
        assert_eq!(app.state, AppState::Normal);
    }

    fn pointer(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    async fn app_with_rows(ids: &[i64]) -> App {
        let mut app = test_app();
        let policy = app.config.list_policy();
        let students = ids
            .iter()
            .map(|id| StudentSummary {
                id: *id,
                email: format!("s{}@example.com", id),
                avatar: String::new(),
                last_name: format!("Last{}", id),
            })
            .collect();
        app.queries().set_query_data(
            &QueryKey::students_page(Page::FIRST),
            StudentsPage {
                students,
                total_count: ids.len() as u64,
            },
            &policy,
        );
        app.check_background_tasks().await;
        app
    }

    #[tokio::test]
    async fn test_pointer_over_row_selects_and_prefetches() {
        let mut app = app_with_rows(&[11, 12, 13]).await;
        let screen = Rect::new(0, 0, 80, 24);
        // Title bar (3) + table border + header puts the first row at y = 5
        handle_mouse(&mut app, pointer(MouseEventKind::Moved, 10, 6), screen);

        assert_eq!(app.selection, 1);
        assert!(app.queries().is_fetching(&QueryKey::student("12")));
    }

    #[tokio::test]
    async fn test_pointer_below_last_row_is_ignored() {
        let mut app = app_with_rows(&[11, 12]).await;
        let screen = Rect::new(0, 0, 80, 24);
        handle_mouse(&mut app, pointer(MouseEventKind::Moved, 10, 9), screen);

        assert_eq!(app.selection, 0);
        assert!(!app.queries().is_fetching(&QueryKey::student("11")));
    }

    #[tokio::test]
    async fn test_click_opens_row() {
        let mut app = app_with_rows(&[11, 12]).await;
        let screen = Rect::new(0, 0, 80, 24);
        handle_mouse(
            &mut app,
            pointer(MouseEventKind::Down(MouseButton::Left), 10, 5),
            screen,
        );
        assert_eq!(app.route, Route::EditStudent { id: "11".to_string() });
    }
}
