//! # Backend
//!
//! The remote service that owns durable session storage and generates
//! replies. `BackendClient` is the seam; `HttpBackend` is the real
//! implementation, tests substitute in-memory fakes.

pub mod client;
pub mod http;
pub mod types;

pub use client::{BackendClient, BackendError};
pub use http::HttpBackend;
pub use types::{ArtifactPayload, SendReply, SendRequest, SessionRecord};
