//! API client for the json-server `students` resource.
//!
//! This module provides the `ApiClient` struct for the five REST operations
//! the roster needs. List and single-record reads race against a
//! `CancellationToken`; when the token fires the in-flight request future is
//! dropped, which closes the underlying connection.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{total_count_from_header, Page, Student, StudentForm, StudentId, StudentSummary, StudentsPage};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path of the students resource relative to the API base URL.
const STUDENTS_RESOURCE: &str = "students";

/// Response header json-server uses to report the size of a paginated collection.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// HTTP request timeout in seconds.
/// The mock backend is local; 30s only guards against a hung server.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the roster backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    students_url: Url,
}

impl ApiClient {
    /// Create a new API client for the given base URL
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Create a client from the application configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_timeout(&config.api_base_url, config.request_timeout())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        // Url::join replaces the last segment unless the base ends in '/'
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).with_context(|| format!("Invalid API base URL: {}", base_url))?;
        if base.cannot_be_a_base() {
            return Err(anyhow::anyhow!("API base URL cannot carry paths: {}", base_url));
        }
        let students_url = base
            .join(STUDENTS_RESOURCE)
            .with_context(|| format!("Failed to build students URL from {}", base_url))?;

        Ok(Self {
            client,
            students_url,
        })
    }

    pub fn students_url(&self) -> &Url {
        &self.students_url
    }

    fn student_url(&self, id: &str) -> Url {
        let mut url = self.students_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let url = response.url().clone();
            let body = response.text().await.unwrap_or_default();
            warn!(%url, status = status.as_u16(), "Request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Run a request future, racing it against the cancellation token if one is given.
    async fn cancellable<T>(
        work: impl Future<Output = Result<T, ApiError>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, ApiError> {
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Request cancelled before completion");
                        Err(ApiError::Cancelled)
                    }
                    result = work => result,
                }
            }
            None => work.await,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        request: RequestBuilder,
        cancel: Option<&CancellationToken>,
    ) -> Result<(T, HeaderMap), ApiError> {
        let work = async move {
            let response = request.send().await?;
            let response = Self::check_response(response).await?;
            let headers = response.headers().clone();
            let body = response.json::<T>().await.map_err(|e| {
                if e.is_decode() {
                    ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e))
                } else {
                    ApiError::NetworkError(e)
                }
            })?;
            Ok::<_, ApiError>((body, headers))
        };
        Self::cancellable(work, cancel).await
    }

    /// Fetch one page of student summaries.
    /// `GET /students?_page=P&_limit=L`, total from the `x-total-count` header.
    pub async fn list_students(
        &self,
        page: Page,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<StudentsPage, ApiError> {
        debug!(url = %self.students_url, page = page.get(), limit, "Fetching students page");
        let request = self
            .client
            .get(self.students_url.clone())
            .query(&[("_page", page.get()), ("_limit", limit)]);

        let (students, headers): (Vec<StudentSummary>, _) =
            Self::send_json(request, Some(cancel)).await?;

        let total_count = total_count_from_header(
            headers
                .get(TOTAL_COUNT_HEADER)
                .and_then(|value| value.to_str().ok()),
        );
        debug!(count = students.len(), total_count, "Fetched students page");

        Ok(StudentsPage {
            students,
            total_count,
        })
    }

    /// Fetch a single student record. `GET /students/{id}`
    pub async fn get_student(&self, id: &str, cancel: &CancellationToken) -> Result<Student, ApiError> {
        let url = self.student_url(id);
        debug!(%url, "Fetching student");
        let request = self.client.get(url);
        let (student, _) = Self::send_json(request, Some(cancel)).await?;
        Ok(student)
    }

    /// Create a student; the server assigns the id. `POST /students`
    pub async fn add_student(&self, form: &StudentForm) -> Result<Student, ApiError> {
        debug!(url = %self.students_url, "Creating student");
        let request = self.client.post(self.students_url.clone()).json(form);
        let (student, _) = Self::send_json(request, None).await?;
        Ok(student)
    }

    /// Replace a student's fields. `PUT /students/{id}`
    pub async fn update_student(&self, id: &str, form: &StudentForm) -> Result<Student, ApiError> {
        let url = self.student_url(id);
        debug!(%url, "Updating student");
        let request = self.client.put(url).json(form);
        let (student, _) = Self::send_json(request, None).await?;
        Ok(student)
    }

    /// Delete a student. `DELETE /students/{id}`
    pub async fn delete_student(&self, id: StudentId) -> Result<(), ApiError> {
        let url = self.student_url(&id.to_string());
        debug!(%url, "Deleting student");
        let response = self.client.delete(url).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_students_url_appends_resource() {
        let client = ApiClient::new("http://localhost:4000").expect("client");
        assert_eq!(client.students_url().as_str(), "http://localhost:4000/students");

        let client = ApiClient::new("http://localhost:4000/api/").expect("client");
        assert_eq!(client.students_url().as_str(), "http://localhost:4000/api/students");
    }

    #[test]
    fn test_student_url_pushes_id_segment() {
        let client = ApiClient::new("http://localhost:4000/").expect("client");
        assert_eq!(client.student_url("7").as_str(), "http://localhost:4000/students/7");
        // Route ids are path segments, never paths
        assert_eq!(
            client.student_url("a/b").as_str(),
            "http://localhost:4000/students/a%2Fb"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
        assert!(ApiClient::new("mailto:someone@example.com").is_err());
    }

    #[tokio::test]
    async fn test_cancellable_returns_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<(), ApiError> =
            ApiClient::cancellable(std::future::pending(), Some(&token)).await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }
}
