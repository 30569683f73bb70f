//! Client-side cache and action executor for Siren hypermedia APIs.
//!
//! The [`EntityStore`] fetches entities, caches them per credential, turns
//! actions into HTTP requests and announces what it is doing through
//! [`StoreEvent`]s.

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod siren;

pub use cache::{CacheResult, CacheSource, EntityStore, FetchOptions, Namespace};
pub use config::Config;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use event::{EventReceiver, StoreEvent};
pub use siren::{Action, Entity, Field, Link, SubEntity};
