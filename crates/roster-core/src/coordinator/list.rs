use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::models::{Page, StudentId, StudentSummary, StudentsPage};
use crate::query::{QueryClient, QueryError, QueryKey, QueryPolicy, QueryResult};

use super::{deleted_notice, page_fetcher, student_fetcher};

/// Drives the paginated list: page fetches, row prefetch, delete and cancel.
#[derive(Debug, Clone)]
pub struct StudentListCoordinator {
    api: ApiClient,
    queries: QueryClient,
    page_size: u32,
    list_policy: QueryPolicy,
    student_policy: QueryPolicy,
}

/// Outcome of [`StudentListCoordinator::delete_student`].
#[derive(Debug)]
pub struct Deleted {
    pub id: StudentId,
    /// The page refetched after the delete invalidated it.
    pub refetched: Result<QueryResult<StudentsPage>, QueryError>,
}

impl Deleted {
    pub fn notice(&self) -> String {
        deleted_notice(self.id)
    }
}

impl StudentListCoordinator {
    pub fn new(api: ApiClient, queries: QueryClient, config: &Config) -> Self {
        Self::with_policies(
            api,
            queries,
            config.page_size,
            config.list_policy(),
            config.student_policy(),
        )
    }

    pub fn with_policies(
        api: ApiClient,
        queries: QueryClient,
        page_size: u32,
        list_policy: QueryPolicy,
        student_policy: QueryPolicy,
    ) -> Self {
        Self {
            api,
            queries,
            page_size,
            list_policy,
            student_policy,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn list_policy(&self) -> &QueryPolicy {
        &self.list_policy
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// Fetch one page through the cache. Within the freshness window this
    /// makes no network call; once stale the cached page is returned while a
    /// background refetch replaces it.
    pub async fn fetch_page(&self, page: Page) -> Result<QueryResult<StudentsPage>, QueryError> {
        let key = QueryKey::students_page(page);
        self.queries
            .fetch(&key, &self.list_policy, page_fetcher(self.api.clone(), page, self.page_size))
            .await
    }

    /// Fetch a page ignoring its freshness, waiting for the new data.
    pub async fn refetch_page(&self, page: Page) -> Result<QueryResult<StudentsPage>, QueryError> {
        let key = QueryKey::students_page(page);
        self.queries
            .refetch(&key, &self.list_policy, page_fetcher(self.api.clone(), page, self.page_size))
            .await
    }

    /// The last settled data for a page, if any.
    pub fn cached_page(&self, page: Page) -> Option<Arc<StudentsPage>> {
        self.queries.get_query_data(&QueryKey::students_page(page))
    }

    pub fn page_updated_at(&self, page: Page) -> Option<DateTime<Utc>> {
        self.queries.updated_at(&QueryKey::students_page(page))
    }

    pub fn is_fetching(&self, page: Page) -> bool {
        self.queries.is_fetching(&QueryKey::students_page(page))
    }

    /// Warm the `("student", id)` entry for a row the user is pointing at.
    /// Only a hint: the form fetches on its own if this has not finished.
    pub fn prefetch_student(&self, id: StudentId) -> bool {
        let id = id.to_string();
        self.queries.prefetch(
            &QueryKey::student(id.clone()),
            &self.student_policy,
            student_fetcher(self.api.clone(), id),
        )
    }

    /// Abort the in-flight request for a page. The previously settled page,
    /// if any, stays cached.
    pub fn cancel_page(&self, page: Page) -> bool {
        self.queries.cancel(&QueryKey::students_page(page))
    }

    /// Delete a student, then invalidate and refetch the page it was shown on.
    /// A failed delete leaves the cache untouched.
    pub async fn delete_student(&self, id: StudentId, page: Page) -> Result<Deleted, ApiError> {
        self.api.delete_student(id).await?;
        info!(id, page = page.get(), "Deleted student");

        let student_key = QueryKey::student(id.to_string());
        self.queries.invalidate(&student_key);

        // Never splice the cached page; invalidate it and take the server's copy
        let refetched = self.refetch_page(page).await;
        if let Err(e) = &refetched {
            debug!(page = page.get(), error = %e, "Refetch after delete failed");
        }
        Ok(Deleted { id, refetched })
    }
}

/// Display status of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStatus {
    /// Nothing settled for this page yet.
    Loading,
    /// Showing data while a newer copy is fetched.
    Refreshing,
    Ready,
    Error(String),
}

/// What the list view shows: the current page, its data, and whether that
/// data is a placeholder carried over from the previous page.
#[derive(Debug, Clone)]
pub struct PageView {
    page: Page,
    data: Option<Arc<StudentsPage>>,
    showing_previous: bool,
    status: PageStatus,
    updated_at: Option<DateTime<Utc>>,
}

impl PageView {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            data: None,
            showing_previous: false,
            status: PageStatus::Loading,
            updated_at: None,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn data(&self) -> Option<&StudentsPage> {
        self.data.as_deref()
    }

    pub fn students(&self) -> &[StudentSummary] {
        self.data
            .as_deref()
            .map(|page| page.students.as_slice())
            .unwrap_or_default()
    }

    pub fn status(&self) -> &PageStatus {
        &self.status
    }

    pub fn is_placeholder(&self) -> bool {
        self.showing_previous
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn total_pages(&self, page_size: u32) -> u32 {
        self.data().map_or(0, |data| data.total_pages(page_size))
    }

    /// Switch to `page`. Cached data for the page is shown at once; otherwise
    /// the previous page stays up as a placeholder when `keep_previous` is set.
    pub fn navigate(&mut self, page: Page, cached: Option<Arc<StudentsPage>>, keep_previous: bool) {
        if page == self.page && self.data.is_some() {
            return;
        }
        self.page = page;
        match cached {
            Some(data) => {
                self.data = Some(data);
                self.showing_previous = false;
                self.status = PageStatus::Refreshing;
            }
            None => {
                self.showing_previous = keep_previous && self.data.is_some();
                if !self.showing_previous {
                    self.data = None;
                    self.updated_at = None;
                }
                self.status = PageStatus::Loading;
            }
        }
    }

    /// Mark the current data as being refreshed.
    pub fn begin_refresh(&mut self) {
        if self.data.is_some() {
            self.status = PageStatus::Refreshing;
        } else {
            self.status = PageStatus::Loading;
        }
    }

    /// Apply a fetch result for `page`. Results for any other page are
    /// ignored. Cancellation is not an error: the view reverts to `settled`,
    /// the last value the cache holds for the page, or to empty.
    ///
    /// Returns whether the view changed.
    pub fn apply(
        &mut self,
        page: Page,
        result: Result<QueryResult<StudentsPage>, QueryError>,
        settled: Option<Arc<StudentsPage>>,
    ) -> bool {
        if page != self.page {
            debug!(page = page.get(), current = self.page.get(), "Ignoring result for another page");
            return false;
        }
        match result {
            Ok(result) => {
                self.data = Some(result.data);
                self.showing_previous = false;
                self.updated_at = Some(result.fetched_at);
                self.status = if result.is_stale {
                    PageStatus::Refreshing
                } else {
                    PageStatus::Ready
                };
            }
            Err(QueryError::Cancelled) => {
                self.revert(settled);
                self.status = PageStatus::Ready;
            }
            Err(e) => {
                self.revert(settled);
                self.status = PageStatus::Error(e.to_string());
            }
        }
        true
    }

    /// Replace the data after a background refetch of the current page.
    pub fn refresh_from_cache(&mut self, data: Arc<StudentsPage>, updated_at: Option<DateTime<Utc>>) {
        self.data = Some(data);
        self.showing_previous = false;
        self.updated_at = updated_at;
        self.status = PageStatus::Ready;
    }

    fn revert(&mut self, settled: Option<Arc<StudentsPage>>) {
        if settled.is_none() && !self.showing_previous && self.data.is_some() {
            // Keep what was already settled on screen
            return;
        }
        self.data = settled;
        self.showing_previous = false;
    }
}
