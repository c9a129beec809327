//! The session context a front end builds once at startup.
//!
//! It owns the credential store handle, the session manager, the API client
//! and the plan service, and it is the subscriber for the client's
//! session-invalidated events. Front ends call `pump_events` after requests
//! (or on a timer) so a server rejection resets the in-memory session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, SessionEvent};
use crate::auth::{Keychain, SessionManager, SessionState};
use crate::cache::FallbackCache;
use crate::config::Config;
use crate::models::ProfileUpdate;
use crate::plans::PlanService;
use crate::store::{CredentialStore, FileStore, STORE_FILE};

/// Open the on-disk credential store the config describes.
pub fn open_credential_store(config: &Config) -> Result<CredentialStore> {
    let dir = config.data_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
    let path = dir.join(STORE_FILE);

    let backend = if config.encrypt_credentials {
        let key = Keychain::seal_key().context(
            "Could not load the credential sealing key from the OS keychain \
             (set encrypt_credentials to false to store credentials unsealed)",
        )?;
        FileStore::sealed(path, key)
    } else {
        FileStore::open(path)
    };

    Ok(CredentialStore::new(Arc::new(backend)))
}

pub struct SessionContext {
    config: Config,
    store: CredentialStore,
    session: SessionManager,
    client: ApiClient,
    plans: PlanService,
    events: broadcast::Receiver<SessionEvent>,
}

impl SessionContext {
    /// Wire everything together and recover the session from `store`.
    pub fn init(config: Config, store: CredentialStore) -> Result<Self> {
        let client = ApiClient::new(&config.api_base_url, store.clone())
            .context("Failed to create API client")?;
        let events = client.subscribe();

        let cache = FallbackCache::new(config.plans_dir()?)?;
        let mut plans = PlanService::new(client.clone(), cache);
        plans.set_offline(config.offline_mode);

        let mut session = SessionManager::new(store.clone());
        let state = session.init();
        info!(?state, api = %config.api_base_url, offline = config.offline_mode, "Session context ready");

        Ok(Self {
            config,
            store,
            session,
            client,
            plans,
            events,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager {
        &mut self.session
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn plans(&self) -> &PlanService {
        &self.plans
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.config.offline_mode = offline;
        self.plans.set_offline(offline);
    }

    /// Apply pending session events. Returns true when the session was reset.
    ///
    /// Several invalidations queued together reset the session once.
    pub fn pump_events(&mut self) -> bool {
        let mut invalidated = false;
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::Invalidated { path }) => {
                    debug!(path = %path, "Received session invalidation");
                    invalidated = true;
                }
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Session events lagged");
                    invalidated = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        if invalidated {
            self.session.invalidate();
        }
        invalidated
    }

    /// Sign in with email and password against the member or admin endpoint.
    pub async fn login(&mut self, email: &str, password: &str, admin: bool) -> Result<SessionState> {
        let grant = if admin {
            self.client.authenticate_admin(email, password).await
        } else {
            self.client.authenticate(email, password).await
        };
        self.pump_events();

        let grant = grant.context("Login failed")?;
        self.session.login_with_grant(&grant)?;
        Ok(self.session.state())
    }

    pub fn logout(&mut self) -> Result<()> {
        self.session.logout()
    }

    /// Send a profile update and mirror it into the stored user record.
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<()> {
        let sent = self.client.update_profile(update).await;
        self.pump_events();
        sent.context("Profile update failed")?;

        let patch = update.user_patch();
        if !patch.is_empty() {
            self.session.update_user(&patch)?;
        }
        Ok(())
    }

    pub fn dispose(mut self) {
        self.pump_events();
        self.session.dispose();
        debug!("Session context disposed");
    }
}
