//! Application routes.
//!
//! `/students?page=N` is the list, `/students/add` the create form and
//! `/students/{id}` the edit form. The literal `add` segment always wins over
//! the identifier segment.

use std::fmt;

use reqwest::Url;

use crate::models::Page;

const STUDENTS_SEGMENT: &str = "students";
const ADD_SEGMENT: &str = "add";

/// Only used to give the query string something to hang off when decoding.
const QUERY_BASE: &str = "http://localhost/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/`; shown as the list.
    Home,
    StudentList { page: Page },
    AddStudent,
    EditStudent { id: String },
    NotFound(String),
}

impl Route {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (path, query) = match input.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (input, None),
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Home,
            [STUDENTS_SEGMENT] => Route::StudentList {
                page: Page::from_query(query.and_then(|q| query_param(q, "page")).as_deref()),
            },
            [STUDENTS_SEGMENT, ADD_SEGMENT] => Route::AddStudent,
            [STUDENTS_SEGMENT, id] => Route::EditStudent { id: id.to_string() },
            _ => Route::NotFound(input.to_string()),
        }
    }

    pub fn list(page: Page) -> Self {
        Route::StudentList { page }
    }

    /// Where the route actually lands; the home page shows the first list page.
    pub fn resolve(self) -> Self {
        match self {
            Route::Home => Route::list(Page::FIRST),
            other => other,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::StudentList { page } => format!("/{}?page={}", STUDENTS_SEGMENT, page),
            Route::AddStudent => format!("/{}/{}", STUDENTS_SEGMENT, ADD_SEGMENT),
            Route::EditStudent { id } => format!("/{}/{}", STUDENTS_SEGMENT, id),
            Route::NotFound(path) => path.clone(),
        }
    }

    pub fn is_form(&self) -> bool {
        matches!(self, Route::AddStudent | Route::EditStudent { .. })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Percent-decoded value of the first `name` parameter in `query`.
fn query_param(query: &str, name: &str) -> Option<String> {
    let mut url = Url::parse(QUERY_BASE).ok()?;
    url.set_query(Some(query));
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
