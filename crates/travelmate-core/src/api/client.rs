//! API client for the TravelMate REST service.
//!
//! Every request is built with the bearer token read from the credential
//! store at send time. A 401 response tears the stored session down and
//! announces it on the session event channel; all other failures are handed
//! back to the caller as they are. Nothing is retried here.

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::models::{LoginGrant, Profile, ProfileUpdate};
use crate::store::{CredentialStore, TokenSlot};

use super::ApiError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Capacity of the session event channel. Invalidations are rare; a lagging
/// subscriber only needs to know that at least one happened.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Notifications from the client to whoever owns the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server rejected the stored session. The credential store has
    /// already been cleared; in-memory session state must be rebuilt.
    Invalidated { path: String },
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// API client for the TravelMate service.
/// Clone is cheap - reqwest::Client and the event sender are both shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: CredentialStore,
    events: broadcast::Sender<SessionEvent>,
}

impl ApiClient {
    pub fn new(base_url: &str, store: CredentialStore) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            events,
        })
    }

    /// Receive session events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authorization header for the token in the store, current slot first.
    ///
    /// A missing token or an unreadable store sends the request without a
    /// header; the server decides whether that is allowed.
    fn auth_headers(&self) -> (header::HeaderMap, Option<TokenSlot>) {
        let mut headers = header::HeaderMap::new();
        let bearer = match self.store.bearer_token() {
            Ok(bearer) => bearer,
            Err(e) => {
                warn!(error = %e, "Could not read credential store, sending without token");
                None
            }
        };

        let Some((slot, token)) = bearer else {
            debug!("No stored token, sending without Authorization header");
            return (headers, None);
        };

        match header::HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                debug!(%slot, token_len = token.len(), "Attaching bearer token");
                headers.insert(header::AUTHORIZATION, value);
                (headers, Some(slot))
            }
            Err(_) => {
                warn!(%slot, "Stored token is not a valid header value, sending without it");
                (headers, None)
            }
        }
    }

    /// Clear the rejected session from the store and announce it.
    ///
    /// A rejected current-slot token clears only the current slot and the
    /// user record. Any legacy token stays in the store, so the next request
    /// goes out with it until reconciliation or a rejection of that token
    /// removes it. A rejected legacy token clears every credential slot.
    fn force_teardown(&self, path: &str, sent_from: Option<TokenSlot>) {
        warn!(path, slot = ?sent_from, "Server rejected session, tearing down");

        let cleared = match sent_from {
            Some(TokenSlot::Legacy) => self.store.purge_credentials(),
            _ => self.store.clear_login(),
        };
        if let Err(e) = cleared {
            error!(error = %e, "Failed to clear rejected session from store");
        }

        let event = SessionEvent::Invalidated {
            path: path.to_string(),
        };
        if self.events.send(event).is_err() {
            debug!("No subscribers for session invalidation");
        }
    }

    /// Send a request and classify the outcome.
    async fn execute(&self, path: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let (headers, slot) = self.auth_headers();

        let response = match request.headers(headers).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => return Err(ApiError::Request(e)),
            Err(e) => {
                warn!(path, error = %e, "No response from server");
                return Err(ApiError::Unreachable(e.to_string()));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.force_teardown(path, slot);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(path, %status, "Request failed");
        Err(ApiError::from_status(status, &body))
    }

    async fn parse<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.client.get(self.url(path));
        let response = self.execute(path, request).await?;
        Self::parse(path, response).await
    }

    /// GET that only cares whether the server answered with success.
    pub async fn ping(&self, path: &str) -> Result<(), ApiError> {
        let request = self.client.get(self.url(path));
        self.execute(path, request).await?;
        Ok(())
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.client.post(self.url(path)).json(body);
        let response = self.execute(path, request).await?;
        Self::parse(path, response).await
    }

    /// PUT whose response body is not needed.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let request = self.client.put(self.url(path)).json(body);
        self.execute(path, request).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let request = self.client.delete(self.url(path));
        self.execute(path, request).await?;
        Ok(())
    }

    // ===== Identity Service =====

    /// Exchange email and password for an access token
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<LoginGrant, ApiError> {
        self.post("/api/auth/login", &LoginRequest { email, password })
            .await
    }

    /// Same as `authenticate`, against the administrator endpoint
    pub async fn authenticate_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginGrant, ApiError> {
        self.post("/api/admin/login", &LoginRequest { email, password })
            .await
    }

    pub async fn fetch_my_profile(&self) -> Result<Profile, ApiError> {
        self.get("/api/profile/me").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        self.put("/api/profile", update).await
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::unreachable_url;
    use super::*;
    use crate::store::{KeyValueStore, ACCESS_TOKEN_KEY, LEGACY_TOKEN_KEY, USER_KEY};
    use serde_json::{json, Value};
    use tokio::sync::broadcast::error::TryRecvError;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_with(entries: &[(&str, &str)]) -> CredentialStore {
        let store = CredentialStore::in_memory();
        for (k, v) in entries {
            store.backend().set(k, v).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_attaches_current_token_over_legacy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile/me"))
            .and(header("Authorization", "Bearer new-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nickname": "al"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with(&[(LEGACY_TOKEN_KEY, "old-token"), (ACCESS_TOKEN_KEY, "new-token")]);
        let client = ApiClient::new(&server.uri(), store).unwrap();

        let profile = client.fetch_my_profile().await.unwrap();
        assert_eq!(profile.nickname.as_deref(), Some("al"));
    }

    #[tokio::test]
    async fn test_falls_back_to_legacy_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile/me"))
            .and(header("Authorization", "Bearer old-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), store_with(&[(LEGACY_TOKEN_KEY, "old-token")])).unwrap();
        client.fetch_my_profile().await.unwrap();
    }

    #[tokio::test]
    async fn test_sends_without_header_when_no_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"email": "a@x.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "h.p.s"})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), CredentialStore::in_memory()).unwrap();
        let grant = client.authenticate("a@x.com", "pw").await.unwrap();
        assert_eq!(grant.access_token, "h.p.s");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_tears_down_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile/me"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with(&[
            (LEGACY_TOKEN_KEY, "legacy"),
            (ACCESS_TOKEN_KEY, "current"),
            (USER_KEY, r#"{"email":"a@x.com"}"#),
        ]);
        let client = ApiClient::new(&server.uri(), store.clone()).unwrap();
        let mut events = client.subscribe();

        let err = client.fetch_my_profile().await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert!(store.token(TokenSlot::Current).unwrap().is_none());
        assert!(store.user_json().unwrap().is_none());
        assert_eq!(store.token(TokenSlot::Legacy).unwrap().as_deref(), Some("legacy"));
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Invalidated {
                path: "/api/profile/me".into()
            }
        );
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_legacy_token_is_sent_after_current_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile/me"))
            .and(header("Authorization", "Bearer current"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/profile/me"))
            .and(header("Authorization", "Bearer legacy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with(&[(LEGACY_TOKEN_KEY, "legacy"), (ACCESS_TOKEN_KEY, "current")]);
        let client = ApiClient::new(&server.uri(), store.clone()).unwrap();

        assert!(matches!(client.fetch_my_profile().await, Err(ApiError::Unauthorized)));
        assert_eq!(
            store.bearer_token().unwrap(),
            Some((TokenSlot::Legacy, "legacy".to_string()))
        );
        client.fetch_my_profile().await.unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_with_legacy_token_clears_legacy_too() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = store_with(&[(LEGACY_TOKEN_KEY, "legacy"), (USER_KEY, "{}")]);
        let client = ApiClient::new(&server.uri(), store.clone()).unwrap();

        let _ = client.get::<Value>("/api/plan/matching").await;

        assert!(store.bearer_token().unwrap().is_none());
        assert!(store.user_json().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_other_errors_pass_through_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/profile"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with(&[(ACCESS_TOKEN_KEY, "current")]);
        let client = ApiClient::new(&server.uri(), store.clone()).unwrap();
        let mut events = client.subscribe();

        let err = client.update_profile(&ProfileUpdate::default()).await.unwrap_err();

        assert!(matches!(err, ApiError::ServerError(ref body) if body == "boom"));
        assert!(store.token(TokenSlot::Current).unwrap().is_some());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_forbidden_does_not_tear_down() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = store_with(&[(ACCESS_TOKEN_KEY, "current")]);
        let client = ApiClient::new(&server.uri(), store.clone()).unwrap();

        let err = client.delete("/api/plan/1").await.unwrap_err();
        assert!(matches!(err, ApiError::AccessDenied(_)));
        assert!(store.token(TokenSlot::Current).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_no_response_is_unreachable() {
        let client = ApiClient::new(&unreachable_url(), CredentialStore::in_memory()).unwrap();
        let err = client.get::<Value>("/api/plan/health").await.unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_bad_json_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), CredentialStore::in_memory()).unwrap();
        let err = client.fetch_my_profile().await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8080/", CredentialStore::in_memory()).unwrap();
        assert_eq!(client.url("/api/plan"), "http://localhost:8080/api/plan");
    }
}
