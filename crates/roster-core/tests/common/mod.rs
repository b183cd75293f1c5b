//! In-process stand-in for the json-server backend.
//!
//! Serves the `students` resource from memory and counts requests per route
//! so tests can assert exactly how many network calls a flow made.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use roster_core::config::Config;
use roster_core::models::{Gender, Student, StudentForm};
use roster_core::{ApiClient, QueryClient, StudentFormCoordinator, StudentListCoordinator};

#[derive(Default)]
pub struct MockState {
    students: Mutex<BTreeMap<i64, Student>>,
    next_id: AtomicI64,
    pub list_hits: AtomicUsize,
    pub get_hits: AtomicUsize,
    pub post_hits: AtomicUsize,
    pub put_hits: AtomicUsize,
    pub delete_hits: AtomicUsize,
    /// Requests that ran to completion, as opposed to being dropped.
    pub list_completed: AtomicUsize,
    list_delay_ms: AtomicU64,
    get_delay_ms: AtomicU64,
    omit_total_header: AtomicBool,
}

impl MockState {
    pub fn list_hits(&self) -> usize {
        self.list_hits.load(Ordering::SeqCst)
    }

    pub fn get_hits(&self) -> usize {
        self.get_hits.load(Ordering::SeqCst)
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.list_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_get_delay(&self, delay: Duration) {
        self.get_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn omit_total_header(&self, omit: bool) {
        self.omit_total_header.store(omit, Ordering::SeqCst);
    }

    pub fn student(&self, id: i64) -> Option<Student> {
        self.students.lock().expect("lock").get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.students.lock().expect("lock").len()
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    /// Start a server seeded with `count` students, ids `1..=count`.
    pub async fn start(count: i64) -> Self {
        let state = Arc::new(MockState::default());
        {
            let mut students = state.students.lock().expect("lock");
            for id in 1..=count {
                students.insert(id, sample_student(id));
            }
        }
        state.next_id.store(count + 1, Ordering::SeqCst);

        let app = Router::new()
            .route("/students", get(list_students).post(create_student))
            .route(
                "/students/{id}",
                get(get_student).put(update_student).delete(delete_student),
            )
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = axum::serve(listener, app.into_make_service());
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });
        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn api(&self) -> ApiClient {
        ApiClient::new(&self.base_url()).expect("api client")
    }

    pub fn config(&self) -> Config {
        Config {
            api_base_url: self.base_url(),
            ..Config::default()
        }
    }

    /// List and form coordinators sharing one query cache.
    pub fn coordinators(&self) -> (StudentListCoordinator, StudentFormCoordinator, QueryClient) {
        let config = self.config();
        let api = ApiClient::from_config(&config).expect("api client");
        let queries = QueryClient::new();
        (
            StudentListCoordinator::new(api.clone(), queries.clone(), &config),
            StudentFormCoordinator::new(api, queries.clone(), &config),
            queries,
        )
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn sample_student(id: i64) -> Student {
    Student {
        id,
        first_name: format!("First{}", id),
        last_name: format!("Last{}", id),
        email: format!("student{}@example.com", id),
        gender: Gender::ALL[(id as usize) % Gender::ALL.len()],
        country: "Iceland".to_string(),
        avatar: format!("https://robohash.org/{}.png?size=50x50", id),
        btc_address: format!("1BoatSLRHtKNngkdXEeobR76b53LETtpy{}", id),
    }
}

pub fn valid_form() -> StudentForm {
    StudentForm {
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: "grace@example.com".to_string(),
        gender: Gender::Female,
        country: "USA".to_string(),
        avatar: String::new(),
        btc_address: String::new(),
    }
}

/// Poll until `check` holds, failing the test after two seconds.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(rename = "_page")]
    page: Option<usize>,
    #[serde(rename = "_limit")]
    limit: Option<usize>,
}

async fn list_students(
    State(state): State<Arc<MockState>>,
    Query(params): Query<ListParams>,
) -> Response {
    state.list_hits.fetch_add(1, Ordering::SeqCst);
    let delay = state.list_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10);
    let (summaries, total) = {
        let students = state.students.lock().expect("lock");
        let summaries: Vec<_> = students
            .values()
            .skip((page - 1) * limit)
            .take(limit)
            .map(|s| {
                json!({
                    "id": s.id,
                    "email": s.email,
                    "avatar": s.avatar,
                    "last_name": s.last_name,
                })
            })
            .collect();
        (summaries, students.len())
    };
    state.list_completed.fetch_add(1, Ordering::SeqCst);

    if state.omit_total_header.load(Ordering::SeqCst) {
        Json(summaries).into_response()
    } else {
        ([("x-total-count", total.to_string())], Json(summaries)).into_response()
    }
}

async fn get_student(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    state.get_hits.fetch_add(1, Ordering::SeqCst);
    let delay = state.get_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    match id.parse::<i64>().ok().and_then(|id| state.student(id)) {
        Some(student) => Json(student).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
    }
}

fn validate(form: &StudentForm) -> Option<Response> {
    if form.email.contains('@') {
        return None;
    }
    Some(
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": { "email": "invalid" } })),
        )
            .into_response(),
    )
}

async fn create_student(State(state): State<Arc<MockState>>, Json(form): Json<StudentForm>) -> Response {
    state.post_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = validate(&form) {
        return rejection;
    }
    let id = state.next_id.fetch_add(1, Ordering::SeqCst);
    let student = form.into_student(id);
    state
        .students
        .lock()
        .expect("lock")
        .insert(id, student.clone());
    (StatusCode::CREATED, Json(student)).into_response()
}

async fn update_student(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Json(form): Json<StudentForm>,
) -> Response {
    state.put_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = validate(&form) {
        return rejection;
    }
    let Ok(id) = id.parse::<i64>() else {
        return (StatusCode::NOT_FOUND, Json(json!({}))).into_response();
    };
    let mut students = state.students.lock().expect("lock");
    if !students.contains_key(&id) {
        return (StatusCode::NOT_FOUND, Json(json!({}))).into_response();
    }
    let student = form.into_student(id);
    students.insert(id, student.clone());
    Json(student).into_response()
}

async fn delete_student(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    state.delete_hits.fetch_add(1, Ordering::SeqCst);
    let removed = id
        .parse::<i64>()
        .ok()
        .and_then(|id| state.students.lock().expect("lock").remove(&id));
    match removed {
        Some(_) => Json(json!({})).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
    }
}
