//! # Core Application Logic
//!
//! Everything Confcraft knows about chat sessions and their artifacts.
//! It knows nothing about terminals or HTTP; the backend is reached only
//! through the `BackendClient` trait.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   user text ──► │      MessageDispatcher       │ ◄──► BackendClient
//!                 │  (busy flag, send cycle,     │       (HTTP / fake)
//!                 │   session lifecycle)         │
//!                 └──────┬───────────────┬───────┘
//!                        │ on failure    │ writes
//!                        ▼               ▼
//!              ┌────────────────┐  ┌───────────────────────────┐
//!              │ Fallback       │  │ SessionStore              │
//!              │ Responder      │  │  roster + active session  │──► StoreEvent
//!              └────────────────┘  │  ArtifactVersionTracker   │    (broadcast)
//!                                  │  diff() per artifact      │
//!                                  └───────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`artifact`]: artifact catalog, `Artifacts` mapping, fence stripping
//! - [`config`]: `~/.confcraft/config.toml` loading and resolution
//! - [`diff`]: line diff with semantic cleanup
//! - [`dispatcher`]: send cycle and session lifecycle
//! - [`export`]: writing artifacts to disk
//! - [`fallback`]: offline keyword responder
//! - [`store`]: roster and active-session state
//! - [`tracker`]: last-displayed artifact versions
//! - [`types`]: messages and sessions

pub mod artifact;
pub mod config;
pub mod diff;
pub mod dispatcher;
pub mod export;
pub mod fallback;
pub mod store;
pub mod tracker;
pub mod types;
