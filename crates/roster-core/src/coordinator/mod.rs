//! Coordinators between the views and the query cache.
//!
//! [`StudentListCoordinator`] drives the paginated list, prefetch and
//! delete-then-invalidate; [`StudentFormCoordinator`] drives the add/edit
//! form. Both share one [`QueryClient`](crate::query::QueryClient) so that a
//! record prefetched from the list is reused by the form.

pub mod form;
pub mod list;

pub use form::{EditorPhase, FormEditor, FormMode, MutationState, StudentFormCoordinator, SubmitError};
pub use list::{Deleted, PageStatus, PageView, StudentListCoordinator};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::models::{Page, Student, StudentsPage};
use crate::query::QueryError;

/// Notification shown after a successful create.
pub const STUDENT_ADDED: &str = "Student added";

/// Notification shown after a successful update.
pub const STUDENT_UPDATED: &str = "Student updated";

pub fn deleted_notice(id: crate::models::StudentId) -> String {
    format!("Deleted student with id {}", id)
}

type Fetch<T> = BoxFuture<'static, Result<T, QueryError>>;

/// Fetcher for the `("student", id)` entry, shared by list prefetch and the
/// edit form so both fill the same slot the same way.
pub(crate) fn student_fetcher(
    api: ApiClient,
    id: String,
) -> impl Fn(CancellationToken) -> Fetch<Student> + Send + Sync + 'static {
    move |token| {
        let api = api.clone();
        let id = id.clone();
        async move { api.get_student(&id, &token).await.map_err(QueryError::from) }.boxed()
    }
}

/// Fetcher for the `("students", page)` entry.
pub(crate) fn page_fetcher(
    api: ApiClient,
    page: Page,
    page_size: u32,
) -> impl Fn(CancellationToken) -> Fetch<StudentsPage> + Send + Sync + 'static {
    move |token| {
        let api = api.clone();
        async move {
            api.list_students(page, page_size, &token)
                .await
                .map_err(QueryError::from)
        }
        .boxed()
    }
}
