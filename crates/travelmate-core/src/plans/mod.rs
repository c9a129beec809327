//! Travel plans, read and written through the API client with the offline
//! fallback cache behind it.

pub mod service;

pub use service::{PlanError, PlanService};
