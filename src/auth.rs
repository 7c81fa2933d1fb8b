//! Session state shared across the application.
//!
//! [`AuthStore`] restores the session from storage on start-up, keeps the bearer token
//! fresh on a timer while signed in, and follows sign-outs made in other tabs.

use crate::{
    client::ApiClient,
    config::ClientConfig,
    error::ApiError,
    storage::{
        get_json, set_json, KeyValueStorage, StorageError, StorageEvent, KEY_AUTH_TOKEN,
        KEY_USER, KEY_USER_ROLE,
    },
    util::{callback::Listeners, spawn::spawn_local},
};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};
use thiserror::Error;

mod refresh;

pub use crate::util::callback::OnChange;
pub use refresh::RefreshTimer;

/// What a signed-in user is allowed to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Vendor,
    #[default]
    Traveler,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Vendor => "vendor",
            UserRole::Traveler => "traveler",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity of the signed-in user, as cached under the `user` storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: UserRole,
}

impl SessionUser {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Snapshot of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<SessionUser>,
    pub is_authenticated: bool,
    /// True until the stored session has been checked.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading: true,
        }
    }
}

/// Transitions of [`AuthState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    /// A session was read back from storage (`None` when there was none).
    SessionRestored(Option<SessionUser>),
    SignedIn(SessionUser),
    /// Profile data changed for the current user; ignored when signed out.
    UserUpdated(SessionUser),
    SignedOut,
    LoadingFinished,
}

impl AuthState {
    pub fn reduce(self, action: AuthAction) -> AuthState {
        match action {
            AuthAction::SessionRestored(user) => AuthState {
                is_authenticated: user.is_some(),
                user,
                loading: false,
            },
            AuthAction::SignedIn(user) => AuthState {
                user: Some(user),
                is_authenticated: true,
                loading: false,
            },
            AuthAction::UserUpdated(user) if self.is_authenticated => AuthState {
                user: Some(user),
                ..self
            },
            AuthAction::UserUpdated(_) => self,
            AuthAction::SignedOut => AuthState {
                user: None,
                is_authenticated: false,
                loading: false,
            },
            AuthAction::LoadingFinished => AuthState {
                loading: false,
                ..self
            },
        }
    }

    pub fn role(&self) -> Option<UserRole> {
        self.user.as_ref().map(|user| user.role)
    }
}

/// Errors from session operations.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Session endpoints.
///
/// The implementation carries the bearer token for every later request.
pub trait AuthApi {
    /// Sets or clears the bearer token.
    fn set_token(&self, token: Option<&str>);

    /// Fetches the user the current token belongs to.
    fn current_user(&self) -> impl Future<Output = Result<SessionUser, ApiError>>;

    /// Exchanges the current token for a fresh one.
    fn refresh_token(&self) -> impl Future<Output = Result<String, ApiError>>;

    /// Invalidates the current token server-side.
    fn logout(&self) -> impl Future<Output = Result<(), ApiError>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserResponse {
    Wrapped { user: SessionUser },
    Bare(SessionUser),
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(alias = "accessToken")]
    token: String,
}

impl AuthApi for ApiClient {
    fn set_token(&self, token: Option<&str>) {
        ApiClient::set_token(self, token);
    }

    async fn current_user(&self) -> Result<SessionUser, ApiError> {
        if !self.has_token() {
            return Err(ApiError::Unauthenticated);
        }
        let response: UserResponse = self.get("/api/users/me").await?;
        Ok(match response {
            UserResponse::Wrapped { user } => user,
            UserResponse::Bare(user) => user,
        })
    }

    async fn refresh_token(&self) -> Result<String, ApiError> {
        if !self.has_token() {
            return Err(ApiError::Unauthenticated);
        }
        let response: TokenResponse = self
            .post("/api/users/refresh-token", &serde_json::json!({}))
            .await?;
        Ok(response.token)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.send_empty::<()>(Method::POST, "/api/users/logout", None)
            .await
    }
}

struct AuthInner<A> {
    api: A,
    storage: Mutex<Box<dyn KeyValueStorage>>,
    state: Mutex<AuthState>,
    timer: Mutex<RefreshTimer>,
    listeners: Listeners<AuthState>,
    refresh_interval: Duration,
}

/// The session store. Clones share state.
///
/// # Panics
///
/// Starting a session spawns the refresh timer on the current thread. On native targets,
/// [`AuthStore::initialize`], [`AuthStore::sign_in`], [`AuthStore::handle_storage_event`]
/// and [`AuthStore::listen`] therefore panic unless called inside a `tokio::task::LocalSet`.
/// In the browser no setup is needed.
pub struct AuthStore<A>(Arc<AuthInner<A>>);

impl<A> Clone for AuthStore<A> {
    fn clone(&self) -> Self {
        AuthStore(self.0.clone())
    }
}

impl<A> fmt::Debug for AuthStore<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthStore")
            .field("state", &*self.0.state.lock())
            .field("refresh_interval", &self.0.refresh_interval)
            .field("listeners", &self.0.listeners.len())
            .finish()
    }
}

impl<A: AuthApi + 'static> AuthStore<A> {
    /// Creates a store in the `loading` state. Call [`AuthStore::initialize`] next.
    pub fn new<S>(api: A, storage: S, config: &ClientConfig) -> Self
    where
        S: KeyValueStorage + 'static,
    {
        Self(Arc::new(AuthInner {
            api,
            storage: Mutex::new(Box::new(storage)),
            state: Mutex::new(AuthState::default()),
            timer: Mutex::new(RefreshTimer::new()),
            listeners: Listeners::default(),
            refresh_interval: config.token_refresh_interval,
        }))
    }

    pub fn api(&self) -> &A {
        &self.0.api
    }

    pub fn state(&self) -> AuthState {
        self.0.state.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.state.lock().is_authenticated
    }

    /// The signed-in user's id, taken from the session rather than the token.
    pub fn user_id(&self) -> Option<String> {
        self.0.state.lock().user.as_ref().map(|user| user.id.clone())
    }

    pub fn is_refreshing(&self) -> bool {
        self.0.timer.lock().is_running()
    }

    /// Registers a callback run after every state change.
    pub fn subscribe(&self, listener: impl Into<OnChange<AuthState>>) {
        self.0.listeners.push(listener.into());
    }

    fn dispatch(&self, action: AuthAction) {
        let next = {
            let mut state = self.0.state.lock();
            let next = state.clone().reduce(action);
            if *state == next {
                return;
            }
            *state = next.clone();
            next
        };
        self.0.listeners.notify(&next);
    }

    /// Restores the session from storage and confirms it with the server.
    ///
    /// A rejected token signs the user out; any other failure keeps the cached session so
    /// a flaky connection does not log anyone out.
    ///
    /// # Panics
    ///
    /// On native targets, if it starts a background task outside a `tokio::task::LocalSet`.
    pub async fn initialize(&self) {
        let (token, cached_user) = {
            let storage = self.0.storage.lock();
            let token = storage.get(KEY_AUTH_TOKEN).unwrap_or_else(|_e| {
                #[cfg(feature = "tracing")]
                tracing::error!("Could not read the stored token: {_e}");
                None
            });
            let user = get_json::<SessionUser>(&**storage, KEY_USER).unwrap_or_else(|_e| {
                #[cfg(feature = "tracing")]
                tracing::warn!("Discarding the cached user: {_e}");
                None
            });
            (token, user)
        };

        let Some(token) = token else {
            self.dispatch(AuthAction::SessionRestored(None));
            return;
        };

        self.0.api.set_token(Some(&token));
        let had_cached_user = cached_user.is_some();
        if let Some(user) = cached_user {
            self.dispatch(AuthAction::SessionRestored(Some(user)));
        }

        match self.0.api.current_user().await {
            Ok(user) => {
                self.persist_user(&user);
                self.dispatch(AuthAction::SignedIn(user));
                self.start_refresh();
            }
            Err(e) if e.is_unauthorized() => {
                #[cfg(feature = "tracing")]
                tracing::info!("Stored session was rejected - clearing credentials");
                self.end_session(true);
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Could not confirm the stored session: {_e}");
                if had_cached_user {
                    self.start_refresh();
                }
                self.dispatch(AuthAction::LoadingFinished);
            }
        }
    }

    /// Starts a session with a token issued by the sign-in page.
    ///
    /// # Panics
    ///
    /// On native targets, if it starts a background task outside a `tokio::task::LocalSet`.
    pub fn sign_in(&self, token: &str, user: SessionUser) -> Result<(), AuthError> {
        {
            let mut storage = self.0.storage.lock();
            storage.set(KEY_AUTH_TOKEN, token)?;
            storage.set(KEY_USER_ROLE, user.role.as_str())?;
            set_json(&mut **storage, KEY_USER, &user)?;
        }
        self.0.api.set_token(Some(token));
        #[cfg(feature = "tracing")]
        tracing::debug!(user_id = %user.id, role = %user.role, "Signed in");
        self.dispatch(AuthAction::SignedIn(user));
        self.start_refresh();
        Ok(())
    }

    /// Signs out here and, through the storage event, in every other tab.
    pub async fn logout(&self) {
        let has_token = matches!(self.0.storage.lock().get(KEY_AUTH_TOKEN), Ok(Some(_)));
        if has_token {
            if let Err(_e) = self.0.api.logout().await {
                #[cfg(feature = "tracing")]
                tracing::warn!("Server-side logout failed: {_e}");
            }
        }
        self.end_session(true);
    }

    /// Replaces the bearer token with a fresh one.
    pub async fn refresh_token(&self) -> Result<(), AuthError> {
        match self.0.api.refresh_token().await {
            Ok(token) => {
                self.0.storage.lock().set(KEY_AUTH_TOKEN, &token)?;
                self.0.api.set_token(Some(&token));
                Ok(())
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.end_session(true);
                }
                Err(e.into())
            }
        }
    }

    /// Applies a profile change to the session user.
    pub fn update_user(&self, user: SessionUser) {
        if !self.is_authenticated() {
            return;
        }
        self.persist_user(&user);
        self.dispatch(AuthAction::UserUpdated(user));
    }

    /// Reacts to a storage change made by another tab.
    ///
    /// # Panics
    ///
    /// On native targets, if it starts a background task outside a `tokio::task::LocalSet`.
    pub fn handle_storage_event(&self, event: &StorageEvent) {
        if event.removes(KEY_AUTH_TOKEN) {
            if self.is_authenticated() {
                #[cfg(feature = "tracing")]
                tracing::info!("Signed out in another tab");
                self.end_session(false);
            }
            return;
        }

        match (event.key.as_deref(), event.new_value.as_deref()) {
            (Some(KEY_AUTH_TOKEN), Some(token)) => {
                self.0.api.set_token(Some(token));
                if !self.is_authenticated() {
                    let user = get_json::<SessionUser>(&**self.0.storage.lock(), KEY_USER)
                        .ok()
                        .flatten();
                    if let Some(user) = user {
                        self.dispatch(AuthAction::SignedIn(user));
                        self.start_refresh();
                    }
                }
            }
            (Some(KEY_USER), Some(raw)) => {
                if let Ok(user) = serde_json::from_str::<SessionUser>(raw) {
                    if self.is_authenticated() {
                        self.dispatch(AuthAction::UserUpdated(user));
                    } else if matches!(self.0.storage.lock().get(KEY_AUTH_TOKEN), Ok(Some(_))) {
                        self.dispatch(AuthAction::SignedIn(user));
                        self.start_refresh();
                    }
                }
            }
            _ => {}
        }
    }

    /// Feeds another tab's storage changes into [`AuthStore::handle_storage_event`] until
    /// the stream ends or every handle to this store is dropped.
    ///
    /// # Panics
    ///
    /// On native targets, if it starts a background task outside a `tokio::task::LocalSet`.
    pub fn listen<E>(&self, mut events: E)
    where
        E: Stream<Item = StorageEvent> + Unpin + 'static,
    {
        let weak = Arc::downgrade(&self.0);
        spawn_local(async move {
            while let Some(event) = events.next().await {
                match weak.upgrade() {
                    Some(inner) => AuthStore(inner).handle_storage_event(&event),
                    None => break,
                }
            }
        });
    }

    fn persist_user(&self, user: &SessionUser) {
        let mut storage = self.0.storage.lock();
        let result = set_json(&mut **storage, KEY_USER, user)
            .and_then(|()| storage.set(KEY_USER_ROLE, user.role.as_str()));
        if let Err(_e) = result {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to cache the session user: {_e}");
        }
    }

    fn start_refresh(&self) {
        let weak: Weak<AuthInner<A>> = Arc::downgrade(&self.0);
        self.0.timer.lock().start(self.0.refresh_interval, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return false;
                };
                let store = AuthStore(inner);
                if let Err(_e) = store.refresh_token().await {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Token refresh failed: {_e}");
                }
                store.is_authenticated()
            }
        });
    }

    /// Drops the session locally. Storage is left alone when another tab already cleared it.
    fn end_session(&self, clear_storage: bool) {
        self.0.timer.lock().cancel();
        if clear_storage {
            let mut storage = self.0.storage.lock();
            for key in [KEY_AUTH_TOKEN, KEY_USER_ROLE, KEY_USER] {
                if let Err(_e) = storage.remove(key) {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Failed to remove {key}: {_e}");
                }
            }
        }
        self.0.api.set_token(None);
        self.dispatch(AuthAction::SignedOut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::task::LocalSet;

    fn traveler() -> SessionUser {
        SessionUser {
            id: "u-1".to_string(),
            email: "ana@example.com".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Forbes".to_string(),
            role: UserRole::Traveler,
        }
    }

    #[derive(Default)]
    struct FakeAuthApi {
        token: Mutex<Option<String>>,
        reject_token: AtomicBool,
        offline: AtomicBool,
        refreshes: AtomicUsize,
        logouts: AtomicUsize,
    }

    impl AuthApi for Arc<FakeAuthApi> {
        fn set_token(&self, token: Option<&str>) {
            *self.token.lock() = token.map(str::to_string);
        }

        async fn current_user(&self) -> Result<SessionUser, ApiError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(ApiError::from_response_body(503, "{}"));
            }
            if self.reject_token.load(Ordering::SeqCst) {
                return Err(ApiError::from_response_body(401, r#"{"message":"jwt expired"}"#));
            }
            Ok(traveler())
        }

        async fn refresh_token(&self) -> Result<String, ApiError> {
            if self.reject_token.load(Ordering::SeqCst) {
                return Err(ApiError::from_response_body(401, "{}"));
            }
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{n}"))
        }

        async fn logout(&self) -> Result<(), ApiError> {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::builder()
            .token_refresh_interval(Duration::from_secs(60))
            .build()
    }

    fn store(storage: MemoryStorage) -> (AuthStore<Arc<FakeAuthApi>>, Arc<FakeAuthApi>) {
        let api = Arc::new(FakeAuthApi::default());
        (AuthStore::new(api.clone(), storage, &config()), api)
    }

    #[test]
    fn reducer_ignores_user_updates_when_signed_out() {
        let state = AuthState::default().reduce(AuthAction::SessionRestored(None));
        assert_eq!(
            state,
            AuthState {
                user: None,
                is_authenticated: false,
                loading: false
            }
        );
        let state = state.reduce(AuthAction::UserUpdated(traveler()));
        assert!(state.user.is_none());
    }

    #[tokio::test]
    #[should_panic(expected = "LocalSet")]
    async fn sign_in_needs_a_local_set_on_native() {
        let (store, _) = store(MemoryStorage::new());
        let _ = store.sign_in("fresh", traveler());
    }

    #[tokio::test]
    async fn initialize_without_token_is_signed_out() {
        let (store, _) = store(MemoryStorage::new());
        assert!(store.state().loading);
        store.initialize().await;
        let state = store.state();
        assert!(!state.is_authenticated);
        assert!(!state.loading);
        assert!(state.user.is_none());
    }

    #[tokio::test]
    async fn initialize_confirms_stored_session() {
        LocalSet::new()
            .run_until(async {
                let mut storage = MemoryStorage::new();
                storage.set(KEY_AUTH_TOKEN, "stored").unwrap();
                let (store, api) = store(storage);
                store.initialize().await;

                assert!(store.is_authenticated());
                assert_eq!(store.user_id().as_deref(), Some("u-1"));
                assert_eq!(api.token.lock().as_deref(), Some("stored"));
                assert!(store.is_refreshing());
            })
            .await;
    }

    #[tokio::test]
    async fn rejected_token_clears_the_session() {
        let mut storage = MemoryStorage::new();
        storage.set(KEY_AUTH_TOKEN, "expired").unwrap();
        set_json(&mut storage, KEY_USER, &traveler()).unwrap();
        let (store, api) = store(storage.clone());
        api.reject_token.store(true, Ordering::SeqCst);

        store.initialize().await;

        assert!(!store.is_authenticated());
        assert_eq!(storage.get(KEY_AUTH_TOKEN).unwrap(), None);
        assert_eq!(storage.get(KEY_USER).unwrap(), None);
        assert_eq!(*api.token.lock(), None);
    }

    #[tokio::test]
    async fn network_failure_keeps_the_cached_session() {
        LocalSet::new()
            .run_until(async {
                let mut storage = MemoryStorage::new();
                storage.set(KEY_AUTH_TOKEN, "stored").unwrap();
                set_json(&mut storage, KEY_USER, &traveler()).unwrap();
                let (store, api) = store(storage);
                api.offline.store(true, Ordering::SeqCst);

                store.initialize().await;

                let state = store.state();
                assert!(state.is_authenticated);
                assert!(!state.loading);
                assert_eq!(state.user, Some(traveler()));
            })
            .await;
    }

    #[tokio::test]
    async fn sign_in_and_logout_manage_storage_and_timer() {
        LocalSet::new()
            .run_until(async {
                let storage = MemoryStorage::new();
                let (store, api) = store(storage.clone());
                let changes = Arc::new(AtomicUsize::new(0));
                let counter = changes.clone();
                store.subscribe(move |_: &AuthState| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });

                store.sign_in("fresh", traveler()).unwrap();
                assert_eq!(storage.get(KEY_AUTH_TOKEN).unwrap().as_deref(), Some("fresh"));
                assert_eq!(storage.get(KEY_USER_ROLE).unwrap().as_deref(), Some("traveler"));
                assert!(store.is_refreshing());

                store.logout().await;
                assert_eq!(api.logouts.load(Ordering::SeqCst), 1);
                assert!(!store.is_authenticated());
                assert!(!store.is_refreshing());
                for key in [KEY_AUTH_TOKEN, KEY_USER_ROLE, KEY_USER] {
                    assert_eq!(storage.get(key).unwrap(), None);
                }
                assert_eq!(changes.load(Ordering::SeqCst), 2);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn timer_refreshes_the_token() {
        LocalSet::new()
            .run_until(async {
                let storage = MemoryStorage::new();
                let (store, api) = store(storage.clone());
                store.sign_in("first", traveler()).unwrap();

                tokio::time::sleep(Duration::from_secs(125)).await;

                assert_eq!(api.refreshes.load(Ordering::SeqCst), 2);
                assert_eq!(storage.get(KEY_AUTH_TOKEN).unwrap().as_deref(), Some("token-2"));
                assert_eq!(api.token.lock().as_deref(), Some("token-2"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_refresh_signs_out() {
        LocalSet::new()
            .run_until(async {
                let storage = MemoryStorage::new();
                let (store, api) = store(storage.clone());
                store.sign_in("first", traveler()).unwrap();
                api.reject_token.store(true, Ordering::SeqCst);

                tokio::time::sleep(Duration::from_secs(61)).await;

                assert!(!store.is_authenticated());
                assert!(!store.is_refreshing());
                assert_eq!(storage.get(KEY_AUTH_TOKEN).unwrap(), None);
            })
            .await;
    }

    #[tokio::test]
    async fn logout_in_one_tab_signs_out_the_other() {
        LocalSet::new()
            .run_until(async {
                let first_tab = MemoryStorage::new();
                let second_tab = first_tab.new_tab();
                let (first, _) = store(first_tab);
                let (second, _) = store(second_tab.clone());

                first.sign_in("shared", traveler()).unwrap();
                second.initialize().await;
                assert!(second.is_authenticated());

                let mut events = second_tab.events();
                first.logout().await;

                while let Some(event) = events.next().now_or_never().flatten() {
                    second.handle_storage_event(&event);
                }
                let state = second.state();
                assert!(!state.is_authenticated);
                assert!(state.user.is_none());
                assert!(!second.is_refreshing());
            })
            .await;
    }

    #[tokio::test]
    async fn listening_store_follows_other_tabs() {
        LocalSet::new()
            .run_until(async {
                let first_tab = MemoryStorage::new();
                let second_tab = first_tab.new_tab();
                let (first, _) = store(first_tab);
                let (second, _) = store(second_tab.clone());
                second.initialize().await;
                second.listen(second_tab.events());

                first.sign_in("shared", traveler()).unwrap();
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                }
                assert!(second.is_authenticated());

                first.logout().await;
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                }
                assert!(!second.is_authenticated());
                assert!(second.state().user.is_none());
            })
            .await;
    }
}
