//! Application state for the roster TUI.
//!
//! The `App` owns the current route, the list view and the mounted form
//! editor. Network work never runs on the input path: it is spawned onto the
//! runtime and its result comes back over a channel that the main loop drains
//! through [`App::check_background_tasks`]. Changes made to the shared query
//! cache from elsewhere (background refetches, writes after a save) arrive as
//! [`QueryEvent`]s on the same tick.

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use roster_core::coordinator::{Deleted, FormEditor, FormMode, PageView};
use roster_core::models::{FormField, Page, Student, StudentId, StudentSummary, StudentsPage};
use roster_core::query::{QueryEvent, QueryResult};
use roster_core::{
    ApiClient, ApiError, Config, QueryClient, QueryError, QueryKey, Route, StudentFormCoordinator,
    StudentListCoordinator,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Longest value accepted for a single form field.
const MAX_FIELD_LENGTH: usize = 200;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    ConfirmingDelete(StudentId),
    ConfirmingQuit,
    Quitting,
}

/// Results produced by spawned network tasks.
#[derive(Debug)]
pub enum BackgroundResult {
    Page {
        page: Page,
        result: Result<QueryResult<StudentsPage>, QueryError>,
    },
    Deleted {
        page: Page,
        result: Result<Deleted, ApiError>,
    },
    /// Edit-form record fetch, tagged with the form it was started for.
    RecordLoaded {
        generation: u64,
        result: Result<QueryResult<Student>, QueryError>,
    },
    Submitted {
        generation: u64,
        result: Result<Student, ApiError>,
    },
}

/// Check if a character is valid for form field input.
pub fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a character can be appended to a field of the given length.
pub fn can_add_field_char(current_len: usize, c: char) -> bool {
    current_len < MAX_FIELD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    pub state: AppState,
    pub route: Route,
    pub config: Config,

    list: StudentListCoordinator,
    form: StudentFormCoordinator,
    queries: QueryClient,

    // List screen
    pub view: PageView,
    pub selection: usize,
    /// The list page to return to when leaving the form.
    pub last_list_page: Page,

    // Form screen
    pub editor: Option<FormEditor>,
    pub focused_field: FormField,
    form_generation: u64,

    pub status_message: Option<String>,

    result_tx: mpsc::Sender<BackgroundResult>,
    result_rx: mpsc::Receiver<BackgroundResult>,
    events: broadcast::Receiver<QueryEvent>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::from_config(&config)?;
        let queries = QueryClient::new();
        Ok(Self::with_client(config, api, queries))
    }

    pub fn with_client(config: Config, api: ApiClient, queries: QueryClient) -> Self {
        let list = StudentListCoordinator::new(api.clone(), queries.clone(), &config);
        let form = StudentFormCoordinator::new(api, queries.clone(), &config);
        let (result_tx, result_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let events = queries.subscribe();

        Self {
            state: AppState::Normal,
            route: Route::list(Page::FIRST),
            config,
            list,
            form,
            queries,
            view: PageView::new(Page::FIRST),
            selection: 0,
            last_list_page: Page::FIRST,
            editor: None,
            focused_field: FormField::ALL[0],
            form_generation: 0,
            status_message: None,
            result_tx,
            result_rx,
            events,
        }
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    pub fn page_size(&self) -> u32 {
        self.list.page_size()
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Switch to `route`, mounting the screen it names and starting whatever
    /// fetch that screen needs.
    pub fn navigate(&mut self, route: Route) {
        let route = route.resolve();
        debug!(route = %route, "Navigating");

        match &route {
            Route::StudentList { page } => {
                let page = *page;
                self.editor = None;
                self.last_list_page = page;
                if page != self.view.page() {
                    self.selection = 0;
                }
                let cached = self.list.cached_page(page);
                let keep_previous = self.list.list_policy().keep_previous_on_refetch;
                self.view.navigate(page, cached, keep_previous);
                self.spawn_page_fetch(page);
            }
            Route::AddStudent | Route::EditStudent { .. } => {
                if let Some(mode) = FormMode::from_route(&route) {
                    self.mount_form(mode);
                }
            }
            Route::Home | Route::NotFound(_) => {
                self.editor = None;
            }
        }
        self.route = route;
    }

    pub fn go_to_page(&mut self, page: Page) {
        if page != self.view.page() {
            self.navigate(Route::list(page));
        }
    }

    pub fn next_page(&mut self) {
        let total = self.view.total_pages(self.page_size());
        if self.view.page().has_next(total) {
            self.go_to_page(self.view.page().next());
        }
    }

    pub fn previous_page(&mut self) {
        if let Some(page) = self.view.page().previous() {
            self.go_to_page(page);
        }
    }

    pub fn last_page(&mut self) {
        let total = self.view.total_pages(self.page_size());
        if let Some(page) = Page::new(total) {
            self.go_to_page(page);
        }
    }

    pub fn back_to_list(&mut self) {
        self.navigate(Route::list(self.last_list_page));
    }

    fn mount_form(&mut self, mode: FormMode) {
        self.form_generation += 1;
        self.focused_field = FormField::ALL[0];

        let mut editor = FormEditor::new(mode);
        if editor.needs_fetch() {
            if let Some(id) = editor.mode().id().map(str::to_string) {
                editor.begin_load();
                self.spawn_record_fetch(id);
            }
        }
        self.editor = Some(editor);
    }

    // ========================================================================
    // List actions
    // ========================================================================

    pub fn selected_student(&self) -> Option<&StudentSummary> {
        self.view.students().get(self.selection)
    }

    /// Move the row selection. The newly selected record is prefetched so that
    /// opening it is instant.
    pub fn select(&mut self, index: usize) {
        let len = self.view.students().len();
        if len == 0 {
            self.selection = 0;
            return;
        }
        self.selection = index.min(len - 1);
        if let Some(id) = self.selected_student().map(|s| s.id) {
            if self.list.prefetch_student(id) {
                debug!(id, "Prefetching student");
            }
        }
    }

    pub fn select_next(&mut self) {
        self.select(self.selection.saturating_add(1));
    }

    pub fn select_previous(&mut self) {
        self.select(self.selection.saturating_sub(1));
    }

    pub fn open_selected(&mut self) {
        if let Some(id) = self.selected_student().map(|s| s.id) {
            self.navigate(Route::EditStudent { id: id.to_string() });
        }
    }

    pub fn open_add_form(&mut self) {
        self.navigate(Route::AddStudent);
    }

    /// Ask for confirmation before deleting the selected row.
    pub fn request_delete(&mut self) {
        if let Some(id) = self.selected_student().map(|s| s.id) {
            self.state = AppState::ConfirmingDelete(id);
        }
    }

    pub fn confirm_delete(&mut self, id: StudentId) {
        self.state = AppState::Normal;
        let page = self.view.page();
        self.status_message = Some(format!("Deleting student {}...", id));
        self.view.begin_refresh();

        let list = self.list.clone();
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = list.delete_student(id, page).await;
            let _ = tx.send(BackgroundResult::Deleted { page, result }).await;
        });
    }

    /// Refetch the current page regardless of its freshness.
    pub fn refresh(&mut self) {
        let page = self.view.page();
        self.view.begin_refresh();

        let list = self.list.clone();
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = list.refetch_page(page).await;
            let _ = tx.send(BackgroundResult::Page { page, result }).await;
        });
    }

    /// Abort the in-flight request for the current page.
    pub fn cancel(&mut self) {
        let page = self.view.page();
        if self.list.cancel_page(page) {
            self.status_message = Some(format!("Cancelled loading page {}", page));
        }
    }

    fn spawn_page_fetch(&self, page: Page) {
        let list = self.list.clone();
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = list.fetch_page(page).await;
            let _ = tx.send(BackgroundResult::Page { page, result }).await;
        });
    }

    // ========================================================================
    // Form actions
    // ========================================================================

    pub fn focus_next_field(&mut self) {
        self.focused_field = self.focused_field.next();
    }

    pub fn focus_previous_field(&mut self) {
        self.focused_field = self.focused_field.prev();
    }

    pub fn type_char(&mut self, c: char) {
        let field = self.focused_field;
        if field == FormField::Gender {
            return;
        }
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let current = editor.form().value(field);
        if !can_add_field_char(current.chars().count(), c) {
            return;
        }
        let mut value = current.to_string();
        value.push(c);
        editor.change(field, value);
    }

    pub fn delete_char(&mut self) {
        let field = self.focused_field;
        if field == FormField::Gender {
            return;
        }
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let mut value = editor.form().value(field).to_string();
        if value.pop().is_some() {
            editor.change(field, value);
        }
    }

    pub fn cycle_gender(&mut self, forward: bool) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let current = editor.form().gender;
        let next = if forward { current.next() } else { current.prev() };
        editor.change(FormField::Gender, next.as_str());
    }

    pub fn submit_form(&mut self) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let Some((mode, form)) = editor.begin_submit() else {
            return;
        };

        let generation = self.form_generation;
        let coordinator = self.form.clone();
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = coordinator.save(&mode, &form).await;
            let _ = tx.send(BackgroundResult::Submitted { generation, result }).await;
        });
    }

    fn spawn_record_fetch(&self, id: String) {
        let generation = self.form_generation;
        let coordinator = self.form.clone();
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = coordinator.fetch_record(&id).await;
            let _ = tx
                .send(BackgroundResult::RecordLoaded { generation, result })
                .await;
        });
    }

    // ========================================================================
    // Background results
    // ========================================================================

    /// Drain finished background tasks and cache events.
    pub async fn check_background_tasks(&mut self) {
        // Collect first to avoid borrow conflicts
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            results.push(result);
        }
        for result in results {
            self.process_result(result);
        }

        loop {
            match self.events.try_recv() {
                Ok(event) => self.process_event(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Query events lagged");
                }
                Err(_) => break,
            }
        }
    }

    fn process_result(&mut self, result: BackgroundResult) {
        match result {
            BackgroundResult::Page { page, result } => {
                let settled = self.list.cached_page(page);
                if let Err(e) = &result {
                    if !e.is_cancelled() {
                        warn!(page = page.get(), error = %e, "Failed to load page");
                    }
                }
                if self.view.apply(page, result, settled) {
                    self.clamp_selection();
                }
            }
            BackgroundResult::Deleted { page, result } => match result {
                Ok(deleted) => {
                    self.status_message = Some(deleted.notice());
                    let settled = self.list.cached_page(page);
                    if self.view.apply(page, deleted.refetched, settled) {
                        self.clamp_selection();
                    }
                }
                Err(e) => {
                    warn!(page = page.get(), error = %e, "Delete failed");
                    self.status_message = Some(format!("Delete failed: {}", e));
                    if let Some(data) = self.list.cached_page(page) {
                        self.view
                            .refresh_from_cache(data, self.list.page_updated_at(page));
                    }
                }
            },
            BackgroundResult::RecordLoaded { generation, result } => {
                if generation != self.form_generation {
                    debug!(generation, "Dropping record for an unmounted form");
                    return;
                }
                if let Some(editor) = self.editor.as_mut() {
                    editor.finish_load(result);
                }
            }
            BackgroundResult::Submitted { generation, result } => {
                if generation != self.form_generation {
                    debug!(generation, "Dropping submit result for an unmounted form");
                    return;
                }
                if let Some(editor) = self.editor.as_mut() {
                    if let Some(notice) = editor.finish_submit(result) {
                        info!(notice = %notice, "Form saved");
                        self.status_message = Some(notice);
                    }
                }
            }
        }
    }

    fn process_event(&mut self, event: QueryEvent) {
        let QueryEvent::Updated(key) = event else {
            return;
        };

        if self.editor.is_none() && key == QueryKey::students_page(self.view.page()) {
            // A background refetch of the page on screen settled
            let page = self.view.page();
            if let Some(data) = self.list.cached_page(page) {
                self.view
                    .refresh_from_cache(data, self.list.page_updated_at(page));
                self.clamp_selection();
            }
            return;
        }

        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let edited = editor.mode().id().map(QueryKey::student);
        if edited.as_ref() != Some(&key) || editor.is_busy() {
            return;
        }
        if let Some(record) = self.queries.get_query_data::<Student>(&key) {
            editor.sync_from(record);
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.view.students().len();
        if self.selection >= len {
            self.selection = len.saturating_sub(1);
        }
    }
}
