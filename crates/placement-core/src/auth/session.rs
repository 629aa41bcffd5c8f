use std::future::Future;

use reqwest::{Method, Response};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::GenerateResponse;
use crate::storage::KeyValueStore;

/// Storage key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Storage key holding the display name
pub const USERNAME_KEY: &str = "username";

/// Display name used when the server never told us who we are
pub const PLACEHOLDER_USERNAME: &str = "user";

/// Generation endpoint, proxied by the backend to the model provider
const GENERATE_PATH: &str = "/gemini/generate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated,
}

/// The current bearer credential and display name.
///
/// Fields are only writable from `SessionManager`; everything else gets a
/// read-only view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    username: Option<String>,
}

impl Session {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Name to show in the UI. The username is cosmetic, so an unknown one
    /// falls back to a placeholder.
    pub fn display_name(&self) -> &str {
        self.username().unwrap_or(PLACEHOLDER_USERNAME)
    }

    pub fn state(&self) -> AuthState {
        if self.token.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }
}

/// Owns the session and is the only place it changes.
///
/// Every backend-facing failure is handled here: token validation collapses
/// to a boolean, a rejected credential anywhere clears the session, and
/// nothing is retried.
pub struct SessionManager {
    api: ApiClient,
    store: Box<dyn KeyValueStore>,
    session: Session,
}

impl SessionManager {
    pub fn new(api: ApiClient, store: impl KeyValueStore + 'static) -> Self {
        Self {
            api,
            store: Box::new(store),
            session: Session::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Read the persisted session. No network; absent values mean no session.
    pub fn load_persisted(&mut self) -> AuthState {
        let token = self.store.get(TOKEN_KEY).filter(|t| !t.is_empty());
        let username = token
            .as_ref()
            .and_then(|_| self.store.get(USERNAME_KEY))
            .filter(|u| !u.is_empty());

        self.session = Session { token, username };
        debug!(state = ?self.session.state(), "Persisted session loaded");
        self.session.state()
    }

    /// Check the current token against the identity endpoint.
    ///
    /// Returns `false` without a request when there is no token. Any failure
    /// clears the session.
    pub async fn validate(&mut self) -> bool {
        let Some(token) = self.session.token.clone() else {
            debug!("No token to validate");
            return false;
        };

        let result = self.api.current_user(&token).await;
        self.apply_validation(result)
    }

    /// Apply the identity endpoint's answer for the current token.
    ///
    /// `Ok(Some)` refreshes the username, `Ok(None)` keeps the session as is,
    /// and any error clears it.
    pub fn apply_validation(&mut self, result: Result<Option<String>, ApiError>) -> bool {
        match result {
            Ok(Some(username)) => {
                debug!("Token valid, username refreshed from server");
                self.persist(USERNAME_KEY, &username);
                self.session.username = Some(username);
                true
            }
            Ok(None) => {
                debug!("Token valid, no username in response");
                true
            }
            Err(e) => {
                warn!(error = %e, "Stored token rejected, clearing session");
                self.logout();
                false
            }
        }
    }

    /// Exchange credentials for a token and start a session.
    ///
    /// The displayed username is the one submitted, not one confirmed by the
    /// server; `validate` replaces it on the next start.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ApiError> {
        let token = self.api.request_token(username, password).await?;
        self.complete_login(username, token);
        Ok(())
    }

    /// Start a session from a token issued for `username`.
    pub fn complete_login(&mut self, username: &str, token: String) {
        self.persist(TOKEN_KEY, &token);
        self.persist(USERNAME_KEY, username);
        self.session = Session {
            token: Some(token),
            username: Some(username.to_string()),
        };

        info!(username = username, "Login successful");
    }

    /// Drop the session from memory and storage. Never fails.
    pub fn logout(&mut self) {
        self.session = Session::default();
        for key in [TOKEN_KEY, USERNAME_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(error = %e, key = key, "Failed to remove session value");
            }
        }
        info!("Session cleared");
    }

    /// Send a request with the current token attached.
    ///
    /// A 401 clears the session before the error is returned, so callers only
    /// need to re-render.
    pub async fn authenticated_fetch(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let Some(token) = self.session.token.clone() else {
            return Err(ApiError::Unauthorized);
        };

        let result = self.api.send_authenticated(method, path, &token, body).await;
        self.settle(result)
    }

    /// Pass through the result of an authenticated request, clearing the
    /// session first if the credential was rejected.
    pub fn settle<T>(&mut self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(ApiError::Unauthorized) = &result {
            if self.session.token.is_some() {
                warn!("Credential rejected, logging out");
                self.logout();
            }
        }
        result
    }

    /// Ask the backend to generate a reply for `prompt`.
    pub async fn generate(&mut self, prompt: &str) -> Result<String, ApiError> {
        let request = self.detached_generate(prompt)?;
        let result = request.await;
        self.settle(result)
    }

    /// Build a generation request that does not borrow the manager, so it can
    /// run on a spawned task. Its result must go back through `settle`.
    ///
    /// Fails with `Unauthorized` right away when there is no token.
    pub fn detached_generate(
        &self,
        prompt: &str,
    ) -> Result<impl Future<Output = Result<String, ApiError>> + Send + 'static, ApiError> {
        let Some(token) = self.session.token.clone() else {
            return Err(ApiError::Unauthorized);
        };
        let api = self.api.clone();
        let body = serde_json::json!({ "prompt": prompt });

        Ok(async move {
            let response = api
                .send_authenticated(Method::POST, GENERATE_PATH, &token, Some(&body))
                .await?;
            let reply: GenerateResponse =
                ApiClient::read_json(response, "generate response").await?;
            Ok(reply.text)
        })
    }

    /// Write one session value; storage failures never abort the caller.
    fn persist(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(error = %e, key = key, "Failed to persist session value");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    /// Store that refuses every write
    struct ReadOnlyStore(MemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }

        fn set(&mut self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("quota exceeded"))
        }

        fn remove(&mut self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("permission denied"))
        }
    }

    fn manager_with(store: impl KeyValueStore + 'static) -> SessionManager {
        // Port 9 (discard) is never served; tests here must not touch the network.
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        SessionManager::new(api, store)
    }

    fn seeded_store(token: Option<&str>, username: Option<&str>) -> MemoryStore {
        let mut store = MemoryStore::new();
        if let Some(t) = token {
            store.set(TOKEN_KEY, t).unwrap();
        }
        if let Some(u) = username {
            store.set(USERNAME_KEY, u).unwrap();
        }
        store
    }

    #[test]
    fn test_session_default_is_anonymous() {
        let session = Session::default();
        assert_eq!(session.state(), AuthState::Anonymous);
        assert!(!session.is_authenticated());
        assert_eq!(session.display_name(), PLACEHOLDER_USERNAME);
    }

    #[test]
    fn test_load_persisted_empty_store() {
        let mut manager = manager_with(MemoryStore::new());
        assert_eq!(manager.load_persisted(), AuthState::Anonymous);
        assert!(manager.session().token().is_none());
    }

    #[test]
    fn test_load_persisted_with_token() {
        let mut manager = manager_with(seeded_store(Some("abc"), Some("alice")));
        assert_eq!(manager.load_persisted(), AuthState::Authenticated);
        assert_eq!(manager.session().token(), Some("abc"));
        assert_eq!(manager.session().display_name(), "alice");
    }

    #[test]
    fn test_load_persisted_token_without_username_uses_placeholder() {
        let mut manager = manager_with(seeded_store(Some("abc"), None));
        manager.load_persisted();
        assert_eq!(manager.session().display_name(), PLACEHOLDER_USERNAME);
    }

    #[test]
    fn test_load_persisted_ignores_username_without_token() {
        let mut manager = manager_with(seeded_store(None, Some("alice")));
        assert_eq!(manager.load_persisted(), AuthState::Anonymous);
        assert!(manager.session().username().is_none());
    }

    #[test]
    fn test_load_persisted_empty_token_is_no_session() {
        let mut manager = manager_with(seeded_store(Some(""), Some("alice")));
        assert_eq!(manager.load_persisted(), AuthState::Anonymous);
    }

    #[test]
    fn test_logout_clears_memory_and_storage() {
        let mut manager = manager_with(seeded_store(Some("abc"), Some("alice")));
        manager.load_persisted();
        manager.logout();

        assert_eq!(manager.state(), AuthState::Anonymous);
        assert!(manager.store().get(TOKEN_KEY).is_none());
        assert!(manager.store().get(USERNAME_KEY).is_none());
    }

    #[test]
    fn test_logout_tolerates_storage_failure() {
        let store = ReadOnlyStore(seeded_store(Some("abc"), None));
        let mut manager = manager_with(store);
        manager.load_persisted();
        manager.logout();
        assert_eq!(manager.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_validate_without_token_is_false() {
        let mut manager = manager_with(MemoryStore::new());
        assert!(!manager.validate().await);
        assert_eq!(manager.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_authenticated_fetch_without_token_is_unauthorized() {
        let mut manager = manager_with(MemoryStore::new());
        let result = manager.authenticated_fetch(Method::GET, "/auth/me", None).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn test_settle_unauthorized_clears_session() {
        let mut manager = manager_with(seeded_store(Some("abc"), Some("alice")));
        manager.load_persisted();

        let result: Result<(), ApiError> = manager.settle(Err(ApiError::Unauthorized));
        assert!(result.unwrap_err().is_unauthorized());
        assert_eq!(manager.state(), AuthState::Anonymous);
        assert!(manager.store().get(TOKEN_KEY).is_none());
        assert!(manager.store().get(USERNAME_KEY).is_none());
    }

    #[test]
    fn test_settle_other_errors_keep_session() {
        let mut manager = manager_with(seeded_store(Some("abc"), None));
        manager.load_persisted();

        let result: Result<(), ApiError> =
            manager.settle(Err(ApiError::ServerError("down".to_string())));
        assert!(result.is_err());
        assert_eq!(manager.state(), AuthState::Authenticated);
    }

    #[test]
    fn test_apply_validation_refreshes_username() {
        let mut manager = manager_with(seeded_store(Some("abc"), Some("old")));
        manager.load_persisted();

        assert!(manager.apply_validation(Ok(Some("alice".to_string()))));
        assert_eq!(manager.session().display_name(), "alice");
        assert_eq!(manager.store().get(USERNAME_KEY).as_deref(), Some("alice"));
    }

    #[test]
    fn test_detached_generate_without_token_is_unauthorized() {
        let manager = manager_with(MemoryStore::new());
        assert!(matches!(manager.detached_generate("hi"), Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_generate_without_token_is_unauthorized() {
        let mut manager = manager_with(MemoryStore::new());
        let err = manager.generate("hello").await.unwrap_err();
        assert!(err.is_unauthorized());
    }
}
