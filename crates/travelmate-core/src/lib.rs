//! Core library for travelmate.
//!
//! This crate owns the client-held side of an authenticated session:
//!
//! - `store`: durable key/value persistence for tokens and the user record
//! - `auth`: token decoding, startup reconciliation, and the session manager
//! - `api`: the resilient HTTP client with bearer attachment and 401 teardown
//! - `cache`: the offline fallback cache for writes the server could not take
//! - `plans`: travel-plan reads and writes layered over the client and cache
//! - `context`: the object a front end constructs to wire all of the above

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod models;
pub mod plans;
pub mod store;

pub use api::{ApiClient, ApiError, SessionEvent};
pub use auth::{Session, SessionManager, SessionState};
pub use config::Config;
pub use context::SessionContext;
pub use store::CredentialStore;
