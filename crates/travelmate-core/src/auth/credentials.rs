use anyhow::{Context, Result};
use keyring::Entry;
use tracing::info;

use crate::store::SealKey;

const SERVICE_NAME: &str = "travelmate";

/// Keychain account under which the credential-file key is kept
const SEAL_KEY_ACCOUNT: &str = "credential-store-key";

/// Secrets kept in the OS keychain.
pub struct Keychain;

impl Keychain {
    fn entry(account: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, account)
            .with_context(|| format!("Failed to open keychain entry {account:?}"))
    }

    pub fn store(account: &str, secret: &str) -> Result<()> {
        Self::entry(account)?
            .set_password(secret)
            .context("Failed to store secret in keychain")
    }

    pub fn get(account: &str) -> Result<String> {
        Self::entry(account)?
            .get_password()
            .context("Failed to read secret from keychain")
    }

    pub fn delete(account: &str) -> Result<()> {
        Self::entry(account)?
            .delete_credential()
            .context("Failed to delete secret from keychain")
    }

    /// Load the credential-file key, creating one on first use.
    ///
    /// Only a missing entry creates a key; any other keychain failure is an
    /// error, since a fresh key would make the existing file unreadable.
    pub fn seal_key() -> Result<SealKey> {
        let entry = Self::entry(SEAL_KEY_ACCOUNT)?;
        match entry.get_password() {
            Ok(hex) => SealKey::from_hex(&hex),
            Err(keyring::Error::NoEntry) => {
                info!("Creating credential store key in keychain");
                let key = SealKey::generate();
                entry
                    .set_password(&key.to_hex())
                    .context("Failed to store credential store key in keychain")?;
                Ok(key)
            }
            Err(e) => Err(e).context("Failed to read credential store key from keychain"),
        }
    }

    /// Remember a login password for `email`.
    pub fn remember_password(email: &str, password: &str) -> Result<()> {
        Self::store(&Self::password_account(email), password)
    }

    pub fn remembered_password(email: &str) -> Option<String> {
        Self::get(&Self::password_account(email)).ok()
    }

    pub fn forget_password(email: &str) -> Result<()> {
        Self::delete(&Self::password_account(email))
    }

    fn password_account(email: &str) -> String {
        format!("password:{}", email.to_lowercase())
    }
}
