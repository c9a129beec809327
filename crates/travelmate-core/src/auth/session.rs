use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::reconcile::{self, Reconciliation};
use super::token;
use crate::models::{LoginGrant, StoredUser, UserPatch};
use crate::store::{CredentialStore, TokenSlot};

/// Which kind of signed-in account a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Membership {
    Admin,
    Member,
}

impl Membership {
    fn of(user: &StoredUser) -> Self {
        if user.is_admin() {
            Membership::Admin
        } else {
            Membership::Member
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Uninitialized,
    Recovering,
    Anonymous,
    Authenticated(Membership),
}

/// Read-only view of the session handed to front ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub is_authenticated: bool,
    pub is_admin: bool,
    pub user: Option<StoredUser>,
    pub token: Option<String>,
    pub is_loading: bool,
}

/// Owns the in-memory session and is the only place it changes.
///
/// The token and user are always set or cleared together, so
/// `is_authenticated` can be derived from them.
pub struct SessionManager {
    store: CredentialStore,
    state: SessionState,
    credentials: Option<(String, StoredUser)>,
    is_loading: bool,
}

impl SessionManager {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            state: SessionState::Uninitialized,
            credentials: None,
            is_loading: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn is_admin(&self) -> bool {
        self.state == SessionState::Authenticated(Membership::Admin)
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn user(&self) -> Option<&StoredUser> {
        self.credentials.as_ref().map(|(_, user)| user)
    }

    pub fn token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|(token, _)| token.as_str())
    }

    pub fn session(&self) -> Session {
        Session {
            is_authenticated: self.is_authenticated(),
            is_admin: self.is_admin(),
            user: self.user().cloned(),
            token: self.token().map(str::to_string),
            is_loading: self.is_loading,
        }
    }

    /// Recover the session from the store. Always ends in a decided state.
    pub fn init(&mut self) -> SessionState {
        self.state = SessionState::Recovering;
        self.is_loading = true;
        self.credentials = None;

        let recovered = reconcile::reconcile(&self.store).map(Self::adopt);
        match recovered {
            Ok(Some((token, user))) => {
                info!(email = %user.email, role = ?user.role, "Session restored");
                self.authenticate(token, user);
            }
            Ok(None) => {
                debug!("No usable credentials, starting signed out");
                self.state = SessionState::Anonymous;
            }
            Err(e) => {
                error!(error = %e, "Session recovery failed, starting signed out");
                self.state = SessionState::Anonymous;
            }
        }

        self.is_loading = false;
        self.state
    }

    /// Pick the token and user a reconciled store supports, if any.
    fn adopt(outcome: Reconciliation) -> Option<(String, StoredUser)> {
        let accepted = outcome.token()?;
        match outcome.user {
            Some(ref user) => Some((accepted.token.clone(), user.clone())),
            None => {
                debug!(slot = %accepted.slot, "Valid token without a stored user");
                None
            }
        }
    }

    fn authenticate(&mut self, token: String, user: StoredUser) {
        self.state = SessionState::Authenticated(Membership::of(&user));
        self.credentials = Some((token, user));
    }

    fn sign_out_in_memory(&mut self) {
        self.state = SessionState::Anonymous;
        self.credentials = None;
    }

    /// Store a freshly issued token with its user and become authenticated.
    pub fn login(&mut self, token: &str, user: StoredUser) -> Result<()> {
        info!(email = %user.email, role = ?user.role, "Logging in");
        self.is_loading = true;

        let persisted = serde_json::to_string(&user)
            .context("Failed to serialize user")
            .and_then(|json| self.store.store_login(token, &json));

        self.is_loading = false;
        persisted?;

        self.authenticate(token.to_string(), user);
        Ok(())
    }

    /// Log in from a credential-issuing endpoint's response.
    ///
    /// The user record is built from the token's claims; the response body
    /// fills in whatever the token does not carry.
    pub fn login_with_grant(&mut self, grant: &LoginGrant) -> Result<()> {
        let claims = token::decode(&grant.access_token)
            .map_err(|e| anyhow!("Issued token could not be decoded: {e}"))?;
        let role = claims.role.clone().or_else(|| grant.role.clone());
        let user = StoredUser::new(claims.sub, role);
        self.login(&grant.access_token, user)
    }

    /// Clear the current token and user. The legacy slot is left for the
    /// next reconciliation to judge.
    pub fn logout(&mut self) -> Result<()> {
        info!("Logging out");
        self.is_loading = true;
        let cleared = self.store.clear_login();
        self.sign_out_in_memory();
        self.is_loading = false;
        cleared
    }

    /// Merge `patch` into the signed-in user. No-op while signed out.
    pub fn update_user(&mut self, patch: &UserPatch) -> Result<()> {
        let Some((_, ref user)) = self.credentials else {
            debug!("update_user called while signed out, ignoring");
            return Ok(());
        };

        let updated = user.merged(patch).context("Patch produced an invalid user record")?;
        let json = serde_json::to_string(&updated)?;
        self.store.set_user_json(&json)?;

        debug!(fields = ?patch.keys().collect::<Vec<_>>(), "User record updated");
        if let Some((_, ref mut user)) = self.credentials {
            *user = updated;
        }
        Ok(())
    }

    /// React to the API client's session-invalidated event.
    ///
    /// The client has already purged the store; this drops in-memory state
    /// and re-runs recovery so anything left behind is judged again.
    pub fn invalidate(&mut self) -> SessionState {
        warn!("Session invalidated by server");
        self.sign_out_in_memory();
        self.init()
    }

    /// Re-read the store, picking up writes made by another process.
    pub fn resync(&mut self) -> SessionState {
        let before = self.token().map(str::to_string);
        let state = self.init();
        if before.as_deref() != self.token() {
            info!(?state, "Session changed in the store since last read");
        }
        state
    }

    pub fn dispose(&mut self) {
        self.credentials = None;
        self.is_loading = false;
        self.state = SessionState::Uninitialized;
    }

    /// The slot an outgoing request would take its token from.
    pub fn bearer_slot(&self) -> Result<Option<TokenSlot>> {
        Ok(self.store.bearer_token()?.map(|(slot, _)| slot))
    }
}
