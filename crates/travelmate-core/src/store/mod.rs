//! Durable credential persistence.
//!
//! This module provides:
//! - `KeyValueStore`: the backend trait, with atomic multi-key batches
//! - `MemoryStore` and `FileStore`: in-process and on-disk backends
//! - `CredentialStore`: typed access to the schema, token, and user slots
//!
//! The on-disk store can be sealed with a key kept in the OS keychain.

pub mod backend;
pub mod credential;
pub mod file;
pub mod seal;

pub use backend::{Batch, KeyValueStore, MemoryStore, Op};
pub use credential::{
    CredentialStore, TokenSlot, ACCESS_TOKEN_KEY, CREDENTIAL_SCHEMA_VERSION, LEGACY_TOKEN_KEY,
    SCHEMA_VERSION_KEY, USER_KEY,
};
pub use file::{FileStore, STORE_FILE};
pub use seal::SealKey;
