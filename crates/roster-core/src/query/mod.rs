//! Keyed query cache with stale/expire semantics.
//!
//! The [`QueryClient`] stores fetched values under a composite [`QueryKey`],
//! deduplicates identical in-flight fetches, discards results that arrive
//! after a newer write, and lets callers invalidate or cancel a key. Each
//! entry is governed by a [`QueryPolicy`] carrying its freshness and eviction
//! windows.

pub mod client;
pub mod entry;
pub mod error;
pub mod key;
pub mod policy;

pub use client::{QueryClient, QueryEvent, QueryResult};
pub use entry::CacheEntry;
pub use error::QueryError;
pub use key::{Discriminator, QueryKey};
pub use policy::QueryPolicy;
