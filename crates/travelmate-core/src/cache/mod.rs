//! Offline fallback cache.
//!
//! This module provides the `FallbackCache`, which keeps travel plans the
//! server could not be reached for. Records are stored as JSON files wrapped
//! in `CachedData` and are never reconciled with later remote writes; a
//! locally saved plan and its remote counterpart are independent drafts.

pub mod fallback;

pub use fallback::{CachedData, FallbackCache, LOCAL_ID_PREFIX};
