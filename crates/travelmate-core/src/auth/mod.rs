//! Authentication module for the client-held session.
//!
//! This module provides:
//! - `token`: decoding of compact tokens into `Claims`
//! - `reconcile`: startup validation of the stored tokens and user record
//! - `SessionManager`: the in-memory session and its only mutation points
//! - `Keychain`: OS-level secret storage via keyring
//!
//! A session is recovered from the credential store once at startup and is
//! changed afterwards only by login, logout, and user updates.

pub mod credentials;
pub mod reconcile;
pub mod session;
pub mod token;

pub use credentials::Keychain;
pub use reconcile::{reconcile, reconcile_at, AcceptedToken, CredentialFault, Reconciliation};
pub use session::{Membership, Session, SessionManager, SessionState};
pub use token::{decode, Claims, DecodeError};
