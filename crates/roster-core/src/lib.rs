//! Core library for the student roster.
//!
//! This crate holds everything that is independent of the terminal front-end:
//!
//! - `api`: REST client for the json-server `students` resource
//! - `models`: student records, summaries, pages and form state
//! - `query`: a keyed in-memory query cache with staleness, deduplication,
//!   prefetch, invalidation and cancellation
//! - `coordinator`: list and form coordinators that drive the query cache
//! - `route`: parsing of the `/students...` route surface
//! - `config`: application configuration

pub mod api;
pub mod config;
pub mod coordinator;
pub mod models;
pub mod query;
pub mod route;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use config::Config;
pub use coordinator::{StudentFormCoordinator, StudentListCoordinator};
pub use query::{QueryClient, QueryError, QueryKey, QueryPolicy};
pub use route::Route;
