//! Per-credential entity cache and action execution.
//!
//! This module provides the `EntityStore`, which:
//! - Keeps one cache namespace per credential, created lazily
//! - Translates actions into requests and tracks how many are in flight
//! - Caches entities under their self href and the requested href
//! - Promotes embedded sub-entities with a self link into their own entries
//! - Announces inflight, update and error events to subscribers

mod namespace;
mod result;
mod store;

pub use namespace::{CachedEntity, Namespace, NamespaceKey};
pub use result::{CacheResult, CacheSource};
pub use store::{EntityStore, FetchOptions};
