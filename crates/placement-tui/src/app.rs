//! Application state management for the placement agent client.
//!
//! `App` holds the form buffers and transient status text the screen shows,
//! and owns the `SessionManager`. It never edits the session directly; every
//! change goes through the manager and the next frame reflects it.

use std::future::Future;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use placement_core::background::{
    spawn_health_monitor, spawn_widget_checker, BackgroundEvent, CHANNEL_BUFFER_SIZE,
};
use placement_core::models::{FeatureModule, HealthStatus, ServerInfo};
use placement_core::widget::WidgetStatus;
use placement_core::{ApiError, AuthState, Config, SessionManager};

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 64;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for a chat prompt.
const MAX_PROMPT_LENGTH: usize = 2000;

/// Number of chat exchanges kept on screen
const MAX_CHAT_HISTORY: usize = 50;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Composing,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// Network-bound work queued by an input handler.
///
/// The action stays in `App::pending` from the moment it is queued until its
/// result is applied, which is what disables the triggering control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Validate,
    Login,
    Generate,
}

/// One prompt/reply pair in the simple chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub prompt: String,
    pub reply: String,
}

/// Result of a request spawned off the UI loop
enum RequestResult {
    Validated(Result<Option<String>, ApiError>),
    LoggedIn {
        username: String,
        result: Result<String, ApiError>,
    },
    Generated {
        prompt: String,
        result: Result<String, ApiError>,
    },
}

/// A request result tagged with the session epoch it was issued in
type RequestEvent = (u64, RequestResult);

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub session: SessionManager,

    // UI State
    pub state: AppState,
    pub current_module: FeatureModule,
    pub status_message: Option<String>,
    pub pending: Option<PendingAction>,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Chat state
    pub chat_input: String,
    pub chat_history: Vec<ChatEntry>,
    pub chat_error: Option<String>,
    pub fallback_chat_open: bool,
    pub widget_status: WidgetStatus,

    // Backend status
    pub health: Option<(HealthStatus, DateTime<Utc>)>,
    pub server_info: Option<ServerInfo>,

    // Background task channel
    events_rx: mpsc::Receiver<BackgroundEvent>,
    events_tx: mpsc::Sender<BackgroundEvent>,

    // Request task channel
    requests_rx: mpsc::Receiver<RequestEvent>,
    requests_tx: mpsc::Sender<RequestEvent>,
    in_flight: bool,
    /// Bumped whenever the session ends; older responses are discarded
    session_epoch: u64,
}

impl App {
    /// Create the application around an already-constructed session manager.
    pub fn new(config: Config, session: SessionManager) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (requests_tx, requests_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let login_username = config.initial_username().unwrap_or_default();
        let login_focus = if login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };

        Self {
            config,
            session,

            state: AppState::Normal,
            current_module: FeatureModule::Chat,
            status_message: None,
            pending: None,

            login_username,
            login_password: String::new(),
            login_focus,
            login_error: None,

            chat_input: String::new(),
            chat_history: Vec::new(),
            chat_error: None,
            fallback_chat_open: false,
            widget_status: WidgetStatus::Loading,

            health: None,
            server_info: None,

            events_rx,
            events_tx,

            requests_rx,
            requests_tx,
            in_flight: false,
            session_epoch: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.state() == AuthState::Authenticated
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Load the stored session and schedule its validation.
    pub fn initialize(&mut self) {
        if self.session.load_persisted() == AuthState::Authenticated {
            self.queue(PendingAction::Validate);
        }
    }

    /// Start health polling and the widget check.
    pub fn start_background_tasks(&self) {
        let api = self.session.api().clone();
        spawn_health_monitor(api.clone(), self.config.health_interval(), self.events_tx.clone());
        spawn_widget_checker(
            api,
            self.config.widget_url(),
            self.config.widget_timeout(),
            self.events_tx.clone(),
        );
    }

    // =========================================================================
    // Pending actions
    // =========================================================================

    /// Queue a network action. It starts on the next `dispatch_pending`.
    ///
    /// A queued action that has not started yet is replaced; one already in
    /// flight is never doubled up.
    pub fn queue(&mut self, action: PendingAction) {
        if self.in_flight {
            debug!(?action, "Request in flight, ignoring new action");
            return;
        }
        if let Some(previous) = self.pending.replace(action) {
            debug!(?previous, ?action, "Replacing queued action");
        }
        self.status_message = Some(
            match action {
                PendingAction::Validate => "Checking session…",
                PendingAction::Login => "Logging in…",
                PendingAction::Generate => "Generating…",
            }
            .to_string(),
        );
    }

    /// Spawn the queued action, if any. Never waits on the network; the
    /// result comes back through `check_background_tasks`.
    pub fn dispatch_pending(&mut self) {
        if self.in_flight {
            return;
        }
        let Some(action) = self.pending else {
            return;
        };

        match action {
            PendingAction::Validate => self.start_validation(),
            PendingAction::Login => self.start_login(),
            PendingAction::Generate => self.start_generation(),
        }
    }

    fn spawn_request<F>(&mut self, request: F)
    where
        F: Future<Output = RequestResult> + Send + 'static,
    {
        let tx = self.requests_tx.clone();
        let epoch = self.session_epoch;
        tokio::spawn(async move {
            let result = request.await;
            if tx.send((epoch, result)).await.is_err() {
                debug!("Request finished after the UI went away");
            }
        });
        self.in_flight = true;
    }

    /// Drop the queued action without running it
    fn cancel_pending(&mut self) {
        self.pending = None;
        self.status_message = None;
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    fn start_validation(&mut self) {
        let Some(token) = self.session.session().token().map(str::to_string) else {
            self.cancel_pending();
            return;
        };
        let api = self.session.api().clone();
        self.spawn_request(async move {
            RequestResult::Validated(api.current_user(&token).await)
        });
    }

    /// Send the credentials from the login form
    fn start_login(&mut self) {
        let username = self.login_username.trim().to_string();
        let password = self.login_password.clone();

        if username.is_empty() || password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            self.cancel_pending();
            return;
        }

        self.login_error = None;
        let api = self.session.api().clone();
        self.spawn_request(async move {
            let result = api.request_token(&username, &password).await;
            RequestResult::LoggedIn { username, result }
        });
    }

    fn finish_validation(&mut self, result: Result<Option<String>, ApiError>) {
        if self.session.apply_validation(result) {
            info!("Stored session is valid");
        } else {
            self.reset_after_logout();
            self.status_message = Some("Not logged in".to_string());
        }
    }

    fn finish_login(&mut self, username: String, result: Result<String, ApiError>) {
        match result {
            Ok(token) => {
                self.session.complete_login(&username, token);
                self.login_password.clear();
                self.current_module = FeatureModule::Chat;
                self.status_message = Some(format!("Logged in as {}", username));

                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.login_error = Some(e.user_message());
            }
        }
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.reset_after_logout();
        self.status_message = Some("Logged out".to_string());
    }

    /// Return the screen to the login form after the session ended.
    fn reset_after_logout(&mut self) {
        self.session_epoch += 1;
        self.pending = None;
        self.in_flight = false;

        self.state = AppState::Normal;
        self.login_password.clear();
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.chat_input.clear();
        self.chat_history.clear();
        self.chat_error = None;
    }

    // =========================================================================
    // Chat
    // =========================================================================

    /// Open the simple chat. Only available once the widget check gave up.
    pub fn open_fallback_chat(&mut self) -> bool {
        if self.widget_status != WidgetStatus::FallbackOffered {
            return false;
        }
        self.fallback_chat_open = true;
        self.current_module = FeatureModule::Chat;
        true
    }

    pub fn chat_available(&self) -> bool {
        self.fallback_chat_open && self.current_module == FeatureModule::Chat
    }

    /// Send the chat input to the generation endpoint
    fn start_generation(&mut self) {
        let prompt = self.chat_input.trim().to_string();
        if prompt.is_empty() {
            self.cancel_pending();
            return;
        }

        match self.session.detached_generate(&prompt) {
            Ok(request) => self.spawn_request(async move {
                let result = request.await;
                RequestResult::Generated { prompt, result }
            }),
            Err(e) => {
                self.cancel_pending();
                self.finish_generation(prompt, Err(e));
            }
        }
    }

    fn finish_generation(&mut self, prompt: String, result: Result<String, ApiError>) {
        match self.session.settle(result) {
            Ok(reply) => {
                self.chat_error = None;
                self.chat_input.clear();
                self.chat_history.push(ChatEntry { prompt, reply });
                if self.chat_history.len() > MAX_CHAT_HISTORY {
                    self.chat_history.remove(0);
                }
            }
            Err(e) if e.is_unauthorized() => {
                warn!("Generation rejected, session cleared");
                self.reset_after_logout();
                self.login_error = Some(e.user_message());
            }
            Err(e) => {
                error!(error = %e, "Generation failed");
                self.chat_error = Some(e.user_message());
            }
        }
    }

    // =========================================================================
    // Background events
    // =========================================================================

    /// Drain events from background tasks and finished requests
    pub fn check_background_tasks(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.process_event(event);
        }
        while let Ok((epoch, result)) = self.requests_rx.try_recv() {
            self.apply_request(epoch, result);
        }
    }

    fn process_event(&mut self, event: BackgroundEvent) {
        match event {
            BackgroundEvent::Health { status, checked_at } => {
                self.health = Some((status, checked_at));
            }
            BackgroundEvent::Info(info) => {
                self.server_info = Some(info);
            }
            BackgroundEvent::Widget(status) => {
                self.widget_status = status;
            }
        }
    }

    fn apply_request(&mut self, epoch: u64, result: RequestResult) {
        if epoch != self.session_epoch {
            debug!("Discarding response from an ended session");
            return;
        }
        self.pending = None;
        self.in_flight = false;
        self.status_message = None;

        match result {
            RequestResult::Validated(result) => self.finish_validation(result),
            RequestResult::LoggedIn { username, result } => self.finish_login(username, result),
            RequestResult::Generated { prompt, result } => self.finish_generation(prompt, result),
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// Check if a prompt character should be accepted
pub fn can_add_prompt_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PROMPT_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::ui::input::handle_input;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use placement_core::auth::{TOKEN_KEY, USERNAME_KEY};
    use placement_core::{ApiClient, KeyValueStore, MemoryStore};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// App with an in-memory store, optionally holding a persisted session
    pub(crate) fn test_app(base_url: &str, token: Option<&str>, username: Option<&str>) -> App {
        let mut store = MemoryStore::new();
        if let Some(t) = token {
            store.set(TOKEN_KEY, t).unwrap();
        }
        if let Some(u) = username {
            store.set(USERNAME_KEY, u).unwrap();
        }
        let api = ApiClient::new(base_url).unwrap();
        let config = Config::default();
        let mut app = App::new(config, SessionManager::new(api, store));
        app.session.load_persisted();
        app
    }

    // -------------------------------------------------------------------------
    // Input Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_username_char() {
        assert!(can_add_username_char(0, 'a'));
        assert!(can_add_username_char(63, 'z'));
        assert!(!can_add_username_char(64, 'a'));
        assert!(!can_add_username_char(0, '\x00'));
        assert!(!can_add_username_char(0, '\n'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }

    #[test]
    fn test_can_add_prompt_char() {
        assert!(can_add_prompt_char(0, ' '));
        assert!(!can_add_prompt_char(MAX_PROMPT_LENGTH, 'a'));
    }

    // -------------------------------------------------------------------------
    // State Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_initialize_queues_validation_for_stored_token() {
        let mut app = test_app("http://127.0.0.1:9", None, None);
        app.initialize();
        assert!(app.pending.is_none());

        let mut app = test_app("http://127.0.0.1:9", Some("abc"), None);
        app.initialize();
        assert_eq!(app.pending, Some(PendingAction::Validate));
        assert_eq!(app.status_message.as_deref(), Some("Checking session…"));
    }

    #[test]
    fn test_queue_replaces_previous_action() {
        let mut app = test_app("http://127.0.0.1:9", None, None);
        app.queue(PendingAction::Login);
        app.queue(PendingAction::Generate);
        assert_eq!(app.pending, Some(PendingAction::Generate));
    }

    #[test]
    fn test_fallback_only_when_offered() {
        let mut app = test_app("http://127.0.0.1:9", Some("abc"), None);
        assert!(!app.open_fallback_chat());

        app.process_event(BackgroundEvent::Widget(WidgetStatus::Loaded));
        assert!(!app.open_fallback_chat());

        app.process_event(BackgroundEvent::Widget(WidgetStatus::FallbackOffered));
        assert!(app.open_fallback_chat());
        assert!(app.chat_available());
    }

    #[test]
    fn test_logout_resets_chat() {
        let mut app = test_app("http://127.0.0.1:9", Some("abc"), Some("alice"));
        app.chat_history.push(ChatEntry {
            prompt: "hi".into(),
            reply: "hello".into(),
        });
        app.logout();
        assert!(!app.is_authenticated());
        assert!(app.chat_history.is_empty());
        assert!(app.session.store().get(TOKEN_KEY).is_none());
    }

    /// Queue `action`, start it, and apply its result once it arrives
    async fn run_to_completion(app: &mut App, action: PendingAction) {
        app.queue(action);
        app.dispatch_pending();
        if app.in_flight {
            let (epoch, result) = app.requests_rx.recv().await.unwrap();
            app.apply_request(epoch, result);
        }
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let mut app = test_app("http://127.0.0.1:9", None, None);
        app.login_username = "bob".into();
        run_to_completion(&mut app, PendingAction::Login).await;

        assert_eq!(app.login_error.as_deref(), Some("Username and password required"));
        assert!(!app.is_authenticated());
        assert!(app.pending.is_none());
    }

    #[tokio::test]
    async fn test_login_error_shows_backend_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri(), None, None);
        app.login_username = "bob".into();
        app.login_password = "wrong".into();
        run_to_completion(&mut app, PendingAction::Login).await;

        assert!(app.login_error.as_deref().unwrap_or_default().contains("bad credentials"));
        assert!(!app.is_authenticated());
        assert!(app.pending.is_none());
    }

    #[tokio::test]
    async fn test_validation_failure_returns_to_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri(), Some("abc"), Some("alice"));
        run_to_completion(&mut app, PendingAction::Validate).await;

        assert!(!app.is_authenticated());
        assert_eq!(app.status_message.as_deref(), Some("Not logged in"));
    }

    #[tokio::test]
    async fn test_validation_success_refreshes_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "alice" })))
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri(), Some("abc"), None);
        run_to_completion(&mut app, PendingAction::Validate).await;

        assert!(app.is_authenticated());
        assert_eq!(app.session.session().display_name(), "alice");
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_generate_unauthorized_returns_to_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini/generate"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri(), Some("abc"), Some("alice"));
        app.chat_input = "hello".into();
        app.state = AppState::Composing;
        run_to_completion(&mut app, PendingAction::Generate).await;

        assert!(!app.is_authenticated());
        assert_eq!(app.state, AppState::Normal);
        assert!(app.chat_error.is_none());
        assert!(app.login_error.is_some());
        assert!(app.session.store().get(USERNAME_KEY).is_none());
    }

    #[tokio::test]
    async fn test_generate_failure_stays_in_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model down"))
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri(), Some("abc"), None);
        app.chat_input = "hello".into();
        run_to_completion(&mut app, PendingAction::Generate).await;

        assert!(app.is_authenticated());
        assert!(app.chat_error.is_some());
        assert_eq!(app.chat_input, "hello");
    }

    #[tokio::test]
    async fn test_generate_success_appends_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "Hello!" })))
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri(), Some("abc"), None);
        app.chat_input = "  hi  ".into();
        run_to_completion(&mut app, PendingAction::Generate).await;

        assert_eq!(
            app.chat_history,
            vec![ChatEntry {
                prompt: "hi".into(),
                reply: "Hello!".into()
            }]
        );
        assert!(app.chat_input.is_empty());
        assert!(app.pending.is_none());
    }

    #[tokio::test]
    async fn test_slow_generation_does_not_block_the_loop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "text": "late" }))
                    .set_delay(Duration::from_secs(1)),
            )
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri(), Some("abc"), None);
        app.chat_input = "hi".into();
        app.queue(PendingAction::Generate);

        let started = Instant::now();
        app.dispatch_pending();
        app.check_background_tasks();
        assert!(started.elapsed() < Duration::from_millis(500));

        // Only the chat control is disabled; navigation still works
        assert_eq!(app.pending, Some(PendingAction::Generate));
        handle_input(&mut app, KeyEvent::new(KeyCode::Right, KeyModifiers::NONE));
        assert_eq!(app.current_module, FeatureModule::Speaking);

        // A second prompt cannot start while the first is in flight
        app.dispatch_pending();
        app.queue(PendingAction::Validate);
        assert_eq!(app.pending, Some(PendingAction::Generate));

        let (epoch, result) = app.requests_rx.recv().await.unwrap();
        app.apply_request(epoch, result);
        assert_eq!(app.chat_history.len(), 1);
        assert!(app.pending.is_none());
    }

    #[tokio::test]
    async fn test_response_after_logout_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini/generate"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri(), Some("abc"), Some("alice"));
        app.chat_input = "hi".into();
        app.queue(PendingAction::Generate);
        app.dispatch_pending();
        app.logout();
        assert!(app.pending.is_none());

        let (epoch, result) = app.requests_rx.recv().await.unwrap();
        app.apply_request(epoch, result);

        assert!(app.login_error.is_none());
        assert_eq!(app.status_message.as_deref(), Some("Logged out"));
    }
}
