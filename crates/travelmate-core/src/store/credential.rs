use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use super::backend::{Batch, KeyValueStore, MemoryStore};

/// Storage key for the credential schema marker
pub const SCHEMA_VERSION_KEY: &str = "schema-version";

/// Storage key for the token written by older builds
pub const LEGACY_TOKEN_KEY: &str = "token";

/// Storage key for the token written by `login`
pub const ACCESS_TOKEN_KEY: &str = "access-token";

/// Storage key for the serialized user record
pub const USER_KEY: &str = "user";

/// Version of the stored credential layout. Any other stored value means the
/// store was written by an incompatible build and is wiped on startup.
pub const CREDENTIAL_SCHEMA_VERSION: &str = "1.0.0";

/// The storage slots that may hold a bearer token, in the order they were
/// introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSlot {
    Legacy,
    Current,
}

impl TokenSlot {
    /// Slots in validation order. Later entries take precedence when more
    /// than one survives.
    pub const ALL: [TokenSlot; 2] = [TokenSlot::Legacy, TokenSlot::Current];

    pub fn key(&self) -> &'static str {
        match self {
            TokenSlot::Legacy => LEGACY_TOKEN_KEY,
            TokenSlot::Current => ACCESS_TOKEN_KEY,
        }
    }
}

impl fmt::Display for TokenSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Typed access to the credential slots of a [`KeyValueStore`].
///
/// Clone is cheap; every clone talks to the same backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn backend(&self) -> &dyn KeyValueStore {
        self.backend.as_ref()
    }

    pub fn schema_version(&self) -> Result<Option<String>> {
        self.backend.get(SCHEMA_VERSION_KEY)
    }

    /// Drop everything in the store and stamp the current schema version.
    pub fn wipe(&self) -> Result<()> {
        self.backend
            .wipe_and_set(SCHEMA_VERSION_KEY, CREDENTIAL_SCHEMA_VERSION)
    }

    pub fn token(&self, slot: TokenSlot) -> Result<Option<String>> {
        self.backend.get(slot.key())
    }

    pub fn remove_token(&self, slot: TokenSlot) -> Result<()> {
        self.backend.remove(slot.key())
    }

    /// The token to put on the wire: current slot first, legacy second.
    pub fn bearer_token(&self) -> Result<Option<(TokenSlot, String)>> {
        for slot in [TokenSlot::Current, TokenSlot::Legacy] {
            if let Some(token) = self.token(slot)? {
                return Ok(Some((slot, token)));
            }
        }
        Ok(None)
    }

    pub fn user_json(&self) -> Result<Option<String>> {
        self.backend.get(USER_KEY)
    }

    pub fn remove_user(&self) -> Result<()> {
        self.backend.remove(USER_KEY)
    }

    pub fn set_user_json(&self, user: &str) -> Result<()> {
        self.backend.set(USER_KEY, user)
    }

    /// Write a fresh token and user pair. The legacy slot is left alone.
    pub fn store_login(&self, token: &str, user_json: &str) -> Result<()> {
        self.backend.apply(
            Batch::new()
                .set(ACCESS_TOKEN_KEY, token)
                .set(USER_KEY, user_json),
        )
    }

    /// Remove the current token and the user record together.
    pub fn clear_login(&self) -> Result<()> {
        self.backend.remove_all(&[ACCESS_TOKEN_KEY, USER_KEY])
    }

    /// Remove both token slots and the user record together.
    pub fn purge_credentials(&self) -> Result<()> {
        self.backend
            .remove_all(&[LEGACY_TOKEN_KEY, ACCESS_TOKEN_KEY, USER_KEY])
    }
}
