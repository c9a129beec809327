//! Startup reconciliation of stored credentials.
//!
//! The store may hold a token in the legacy slot, another in the current
//! slot, and a user record written at some earlier login. Reconciliation
//! decides which of these can be trusted together and removes the rest. Any
//! inconsistency fails closed: the user ends up signed out rather than
//! signed in as a guess.

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::token::{self, DecodeError};
use crate::models::StoredUser;
use crate::store::{CredentialStore, TokenSlot, CREDENTIAL_SCHEMA_VERSION};

/// Something reconciliation found wrong with the stored credentials.
#[derive(Error, Debug)]
pub enum CredentialFault {
    #[error("Stored schema version {found:?} does not match {expected}")]
    SchemaVersion {
        found: Option<String>,
        expected: &'static str,
    },

    #[error("Token in slot {slot} could not be decoded: {source}")]
    Undecodable {
        slot: TokenSlot,
        #[source]
        source: DecodeError,
    },

    #[error("Token in slot {slot} expired at {exp}")]
    Expired { slot: TokenSlot, exp: i64 },

    #[error("Token in slot {slot} names {found}, expected {expected}")]
    ConflictingSubject {
        slot: TokenSlot,
        expected: String,
        found: String,
    },

    #[error("Token subject {token_email} does not match stored user {user_email}")]
    IdentityMismatch {
        token_email: String,
        user_email: String,
    },

    #[error("Stored user record could not be parsed: {0}")]
    UnreadableUser(#[source] serde_json::Error),
}

/// A token that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedToken {
    pub slot: TokenSlot,
    pub token: String,
    pub email: String,
}

/// Outcome of [`reconcile`].
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Surviving tokens in precedence order, highest first.
    pub accepted: Vec<AcceptedToken>,
    pub token_email: Option<String>,
    pub user_email: Option<String>,
    pub user: Option<StoredUser>,
    pub faults: Vec<CredentialFault>,
}

impl Reconciliation {
    pub fn has_valid_token(&self) -> bool {
        !self.accepted.is_empty()
    }

    /// The token the session should carry: the highest-precedence survivor.
    pub fn token(&self) -> Option<&AcceptedToken> {
        self.accepted.first()
    }

    fn reset(&mut self) {
        self.accepted.clear();
        self.token_email = None;
        self.user_email = None;
        self.user = None;
    }
}

/// Reconcile the store against the wall clock.
pub fn reconcile(store: &CredentialStore) -> Result<Reconciliation> {
    reconcile_at(store, Utc::now())
}

/// Reconcile the store as of `now`, removing every slot that fails.
pub fn reconcile_at(store: &CredentialStore, now: DateTime<Utc>) -> Result<Reconciliation> {
    let mut outcome = Reconciliation::default();

    // Version gate: nothing written by an incompatible build is looked at.
    let version = match store.schema_version() {
        Ok(version) => version,
        Err(e) => {
            // Unreadable is treated like an unknown version; the wipe below
            // replaces the file without reading it.
            warn!(error = %e, "Credential store unreadable");
            None
        }
    };
    if version.as_deref() != Some(CREDENTIAL_SCHEMA_VERSION) {
        info!(found = ?version, expected = CREDENTIAL_SCHEMA_VERSION, "Credential schema changed, wiping store");
        store.wipe()?;
        outcome.faults.push(CredentialFault::SchemaVersion {
            found: version,
            expected: CREDENTIAL_SCHEMA_VERSION,
        });
        return Ok(outcome);
    }

    if let Some(raw) = store.user_json()? {
        match serde_json::from_str::<StoredUser>(&raw) {
            Ok(user) => {
                outcome.user_email = Some(user.identity());
                outcome.user = Some(user);
            }
            Err(e) => {
                warn!(error = %e, "Stored user unreadable, removing");
                store.remove_user()?;
                outcome.faults.push(CredentialFault::UnreadableUser(e));
            }
        }
    }

    // The first surviving slot anchors the subject; later slots must agree.
    let mut survivors: Vec<AcceptedToken> = Vec::new();
    for slot in TokenSlot::ALL {
        let Some(raw) = store.token(slot)? else {
            continue;
        };

        let claims = match token::decode(&raw) {
            Ok(claims) => claims,
            Err(source) => {
                warn!(%slot, error = %source, "Token undecodable, removing");
                store.remove_token(slot)?;
                outcome.faults.push(CredentialFault::Undecodable { slot, source });
                continue;
            }
        };

        if claims.is_expired_at(now) {
            warn!(%slot, exp = claims.exp, "Token expired, removing");
            store.remove_token(slot)?;
            outcome.faults.push(CredentialFault::Expired { slot, exp: claims.exp });
            continue;
        }

        let email = claims.email();
        if let Some(anchor) = survivors.first() {
            if anchor.email != email {
                warn!(%slot, anchor = %anchor.slot, "Token belongs to a different account, removing");
                store.remove_token(slot)?;
                outcome.faults.push(CredentialFault::ConflictingSubject {
                    slot,
                    expected: anchor.email.clone(),
                    found: email,
                });
                continue;
            }
        }

        debug!(%slot, email = %email, "Token accepted");
        survivors.push(AcceptedToken {
            slot,
            token: raw,
            email,
        });
    }

    outcome.token_email = survivors.first().map(|t| t.email.clone());
    survivors.reverse();
    outcome.accepted = survivors;

    // Cross-check against the stored user.
    if let (Some(token_email), Some(user_email)) = (&outcome.token_email, &outcome.user_email) {
        if token_email != user_email {
            warn!(%token_email, %user_email, "Token and user disagree, clearing all credentials");
            store.purge_credentials()?;
            outcome.faults.push(CredentialFault::IdentityMismatch {
                token_email: token_email.clone(),
                user_email: user_email.clone(),
            });
            outcome.reset();
        }
    }

    info!(
        has_valid_token = outcome.has_valid_token(),
        token_email = ?outcome.token_email,
        user_email = ?outcome.user_email,
        faults = outcome.faults.len(),
        "Credential reconciliation complete"
    );
    Ok(outcome)
}
