//! The add/edit form.
//!
//! [`FormEditor`] is the per-mount state: the mode picked from the route, the
//! editable form, the load/submit phase and the result of the last submit.
//! [`StudentFormCoordinator`] performs the record fetch and the save against
//! the API and the shared query cache.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::models::{update_field, FieldErrors, FormField, Student, StudentForm};
use crate::query::key::STUDENTS;
use crate::query::{QueryClient, QueryError, QueryKey, QueryPolicy, QueryResult};
use crate::route::Route;

use super::{student_fetcher, STUDENT_ADDED, STUDENT_UPDATED};

/// Create or edit, fixed for the lifetime of one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit { id: String },
}

impl FormMode {
    /// The mode for a form route; `None` for routes that are not forms.
    pub fn from_route(route: &Route) -> Option<Self> {
        match route {
            Route::AddStudent => Some(FormMode::Add),
            Route::EditStudent { id } => Some(FormMode::Edit { id: id.clone() }),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            FormMode::Add => None,
            FormMode::Edit { id } => Some(id),
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, FormMode::Edit { .. })
    }

    pub fn title(&self) -> String {
        match self {
            FormMode::Add => "Add Student".to_string(),
            FormMode::Edit { id } => format!("Edit Student #{}", id),
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match self {
            FormMode::Add => "Add",
            FormMode::Edit { .. } => "Update",
        }
    }
}

/// Where the form is in its load/submit cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorPhase {
    /// Edit mode before the record fetch has started.
    Idle,
    Loading,
    Ready,
    LoadFailed(String),
    Submitting,
    Saved,
    SubmitFailed,
}

/// Why a submit failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// 422: messages keyed by field.
    Fields(FieldErrors),
    /// Anything else, shown as a single message.
    Failed(String),
}

/// The state of the last submit.
#[derive(Debug, Clone)]
pub enum MutationState<T> {
    Idle,
    Loading,
    Success(T),
    Error(SubmitError),
}

impl<T> MutationState<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            MutationState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SubmitError> {
        match self {
            MutationState::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, MutationState::Loading)
    }

    /// A result or error is pending display.
    pub fn is_settled(&self) -> bool {
        matches!(self, MutationState::Success(_) | MutationState::Error(_))
    }
}

/// Per-mount form state.
#[derive(Debug, Clone)]
pub struct FormEditor {
    mode: FormMode,
    form: StudentForm,
    phase: EditorPhase,
    mutation: MutationState<Arc<Student>>,
    /// The record the form was last synchronized from.
    synced_from: Option<Arc<Student>>,
    missing: bool,
}

impl FormEditor {
    pub fn new(mode: FormMode) -> Self {
        let phase = if mode.is_edit() {
            EditorPhase::Idle
        } else {
            EditorPhase::Ready
        };
        Self {
            mode,
            form: StudentForm::default(),
            phase,
            mutation: MutationState::Idle,
            synced_from: None,
            missing: false,
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn form(&self) -> &StudentForm {
        &self.form
    }

    pub fn phase(&self) -> &EditorPhase {
        &self.phase
    }

    pub fn mutation(&self) -> &MutationState<Arc<Student>> {
        &self.mutation
    }

    /// The edited record does not exist on the server.
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Edit mode fetches its record once, before anything else.
    pub fn needs_fetch(&self) -> bool {
        self.mode.is_edit() && self.phase == EditorPhase::Idle
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, EditorPhase::Loading | EditorPhase::Submitting)
    }

    pub fn begin_load(&mut self) {
        if self.mode.is_edit() {
            self.phase = EditorPhase::Loading;
        }
    }

    /// Apply the record fetch. A 404 is an absent record, not a failure to
    /// report; a cancelled fetch changes nothing.
    pub fn finish_load(&mut self, result: Result<QueryResult<Student>, QueryError>) {
        match result {
            Ok(result) => {
                self.sync_from(result.data);
                self.missing = false;
                self.phase = EditorPhase::Ready;
            }
            Err(QueryError::Cancelled) => {
                self.phase = EditorPhase::Idle;
            }
            Err(QueryError::NotFound(_)) => {
                self.missing = true;
                self.phase = EditorPhase::LoadFailed("Student not found".to_string());
            }
            Err(e) => {
                self.phase = EditorPhase::LoadFailed(e.to_string());
            }
        }
    }

    /// Copy a fetched record into the form, unless the form was already
    /// synchronized from this same object. Returns whether the form changed.
    pub fn sync_from(&mut self, record: Arc<Student>) -> bool {
        if self
            .synced_from
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &record))
        {
            return false;
        }
        self.form = record.to_form();
        self.synced_from = Some(record);
        true
    }

    /// Edit one field. Any pending submit result or error is cleared.
    pub fn change(&mut self, field: FormField, value: impl Into<String>) {
        self.form = update_field(std::mem::take(&mut self.form), field, value);
        if self.mutation.is_settled() {
            self.mutation = MutationState::Idle;
        }
        if matches!(self.phase, EditorPhase::Saved | EditorPhase::SubmitFailed) {
            self.phase = EditorPhase::Ready;
        }
    }

    /// The 422 message for `field`, if the last submit produced one.
    pub fn field_error(&self, field: FormField) -> Option<&str> {
        match self.mutation.error() {
            Some(SubmitError::Fields(errors)) => errors.get(field),
            _ => None,
        }
    }

    /// A failure that is not tied to a field.
    pub fn general_error(&self) -> Option<&str> {
        match self.mutation.error() {
            Some(SubmitError::Failed(message)) => Some(message.as_str()),
            _ => None,
        }
    }

    /// Start a submit. Returns the mode and form to send, or `None` when the
    /// form cannot be submitted right now.
    pub fn begin_submit(&mut self) -> Option<(FormMode, StudentForm)> {
        let ready = matches!(
            self.phase,
            EditorPhase::Ready | EditorPhase::Saved | EditorPhase::SubmitFailed
        );
        if !ready {
            return None;
        }
        self.phase = EditorPhase::Submitting;
        self.mutation = MutationState::Loading;
        Some((self.mode.clone(), self.form.clone()))
    }

    /// Apply the submit result. On success a create resets the form to blank
    /// and an update re-syncs it from the returned record. Returns the
    /// notification to show, if any.
    pub fn finish_submit(&mut self, result: Result<Student, ApiError>) -> Option<String> {
        match result {
            Ok(student) => {
                let student = Arc::new(student);
                let notice = match &self.mode {
                    FormMode::Add => {
                        self.form = StudentForm::default();
                        STUDENT_ADDED
                    }
                    FormMode::Edit { .. } => {
                        self.sync_from(Arc::clone(&student));
                        STUDENT_UPDATED
                    }
                };
                self.mutation = MutationState::Success(student);
                self.phase = EditorPhase::Saved;
                Some(notice.to_string())
            }
            Err(ApiError::Cancelled) => {
                self.mutation = MutationState::Idle;
                self.phase = EditorPhase::Ready;
                None
            }
            Err(ApiError::Validation(errors)) => {
                debug!(fields = errors.len(), "Submit rejected with field errors");
                self.mutation = MutationState::Error(SubmitError::Fields(errors));
                self.phase = EditorPhase::SubmitFailed;
                None
            }
            Err(e) => {
                self.mutation = MutationState::Error(SubmitError::Failed(e.to_string()));
                self.phase = EditorPhase::SubmitFailed;
                None
            }
        }
    }
}

/// Fetches and saves single records through the shared query cache.
#[derive(Debug, Clone)]
pub struct StudentFormCoordinator {
    api: ApiClient,
    queries: QueryClient,
    student_policy: QueryPolicy,
}

impl StudentFormCoordinator {
    pub fn new(api: ApiClient, queries: QueryClient, config: &Config) -> Self {
        Self::with_policy(api, queries, config.student_policy())
    }

    pub fn with_policy(api: ApiClient, queries: QueryClient, student_policy: QueryPolicy) -> Self {
        Self {
            api,
            queries,
            student_policy,
        }
    }

    /// Fetch a record via the `("student", id)` entry, reusing a prefetch.
    pub async fn fetch_record(&self, id: &str) -> Result<QueryResult<Student>, QueryError> {
        self.queries
            .fetch(
                &QueryKey::student(id),
                &self.student_policy,
                student_fetcher(self.api.clone(), id.to_string()),
            )
            .await
    }

    /// Send the form. An update writes the returned record into its cache
    /// entry. Either way cached list pages are marked stale.
    pub async fn save(&self, mode: &FormMode, form: &StudentForm) -> Result<Student, ApiError> {
        let student = match mode {
            FormMode::Add => {
                let student = self.api.add_student(form).await?;
                info!(id = student.id, "Created student");
                student
            }
            FormMode::Edit { id } => {
                let student = self.api.update_student(id, form).await?;
                info!(id = student.id, "Updated student");
                self.queries
                    .set_query_data(&QueryKey::student(id.as_str()), student.clone(), &self.student_policy);
                student
            }
        };
        self.queries.invalidate_resource(STUDENTS);
        Ok(student)
    }

    /// Run the edit-mode fetch if the editor still needs it.
    pub async fn load(&self, editor: &mut FormEditor) {
        let Some(id) = editor.mode().id().map(str::to_string) else {
            return;
        };
        if !editor.needs_fetch() {
            return;
        }
        editor.begin_load();
        let result = self.fetch_record(&id).await;
        editor.finish_load(result);
    }

    /// Submit the editor's form and apply the result. Returns the success
    /// notification, if any.
    pub async fn submit(&self, editor: &mut FormEditor) -> Option<String> {
        let (mode, form) = editor.begin_submit()?;
        let result = self.save(&mode, &form).await;
        editor.finish_submit(result)
    }
}
