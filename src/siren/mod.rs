//! Siren entity model, request building and HTTP transport.

pub mod api_types;
pub mod client;
pub mod request;
pub mod types;

pub use client::SirenClient;
pub use request::{build_request, RequestSpec};
pub use types::{Action, Entity, Field, Link, SubEntity, REL_SELF};
