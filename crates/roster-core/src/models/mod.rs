//! Data models for the student roster.
//!
//! - `Student`, `StudentSummary`, `Gender`: records served by the `students` resource
//! - `Page`, `StudentsPage`: pagination of the list endpoint
//! - `StudentForm`, `FormField`, `FieldErrors`: editable form state and
//!   validation errors returned by the backend

pub mod form;
pub mod page;
pub mod student;

pub use form::{update_field, FieldErrors, FormField, StudentForm};
pub use page::{total_count_from_header, total_pages, Page, StudentsPage};
pub use student::{Gender, Student, StudentId, StudentSummary};
