mod client;
mod error;

pub use client::{ApiClient, SessionEvent};
pub use error::ApiError;

#[cfg(test)]
pub(crate) use client::test_support;
