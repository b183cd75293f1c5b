//! REST API client module for the json-server `students` resource.
//!
//! This module provides the `ApiClient` for listing, reading, creating,
//! updating and deleting students. Read requests take a cancellation token
//! so the query cache can abort them at the transport level.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
