use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::events::{SessionEvents, Subscription};
use super::storage::{
    ACCESS_TOKEN_KEY, FileStorage, MemoryStorage, REFRESH_TOKEN_KEY, SessionStorage, USER_KEY,
};
use super::token::{self, TokenClaims};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::{AuthResponse, UserProfile};

/// In-memory view of the signed-in session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    fn from_auth(auth: &AuthResponse) -> Self {
        Self {
            access_token: auth.access_token.clone(),
            token_type: auth.token_type.clone(),
            refresh_token: auth.refresh_token.clone().filter(|t| !t.is_empty()),
            user: auth.user.clone(),
        }
    }
}

/// Durable slots that do not describe one coherent session.
#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("storage read failed: {0}")]
    Storage(Error),
    #[error("inconsistent session slots: {0}")]
    Inconsistent(&'static str),
}

struct Inner {
    storage: Arc<dyn SessionStorage>,
    state: Mutex<Session>,
    events: SessionEvents,
}

/// Single source of truth for authentication state.
///
/// Owns every read and write of the three durable session slots. Each
/// mutation updates memory and storage under one lock, releases it, then
/// notifies listeners, so a listener always observes the finished update.
///
/// Cheap to clone; clones share state and listeners.
///
/// ```rust,ignore
/// let session = SessionStore::open(MemoryStorage::new());
/// let _sub = session.subscribe(|| println!("session changed"));
/// session.set_auth(serde_json::json!({"access_token": "tok", "token_type": "bearer"}));
/// assert!(session.is_authenticated());
/// ```
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .field("events", &self.inner.events)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create an empty store over `storage` without reading it. Call
    /// [`init`](Self::init) to hydrate.
    #[must_use]
    pub fn new(storage: impl SessionStorage) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage: Arc::new(storage),
                state: Mutex::new(Session::default()),
                events: SessionEvents::new(),
            }),
        }
    }

    /// Create and hydrate from durable storage.
    #[must_use]
    pub fn open(storage: impl SessionStorage) -> Self {
        let store = Self::new(storage);
        store.init();
        store
    }

    /// File-backed store when the config names a session directory,
    /// in-memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the session directory cannot be created.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        Ok(match config.session_dir() {
            Some(dir) => Self::open(FileStorage::open(dir)?),
            None => Self::open(MemoryStorage::new()),
        })
    }

    /// Hydrate the in-memory session from durable storage.
    ///
    /// Slots that do not form a coherent session (unparseable user snapshot,
    /// token without a snapshot, mismatched token) are cleared entirely.
    pub fn init(&self) {
        let mut state = self.inner.state.lock();
        match self.load() {
            Ok(session) => {
                tracing::debug!(authenticated = session.is_authenticated(), "Session hydrated");
                *state = session;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding stored session");
                self.remove_slots();
                *state = Session::default();
                drop(state);
                self.inner.events.emit();
            }
        }
    }

    /// Drop every change listener. In-memory and durable state are kept.
    pub fn dispose(&self) {
        self.inner.events.clear();
    }

    #[must_use]
    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    /// Shorthand for `events().subscribe(listener)`.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.subscribe(listener)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.lock().is_authenticated()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.state.lock().user.clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        let state = self.inner.state.lock();
        state
            .is_authenticated()
            .then(|| state.access_token.clone())
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.inner.state.lock().refresh_token.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.lock().clone()
    }

    /// Unverified claims of the current access token.
    #[must_use]
    pub fn token_claims(&self) -> Option<TokenClaims> {
        self.token().and_then(|t| token::decode_claims(&t).ok())
    }

    /// True when no token is held, the token cannot be decoded, or its
    /// `exp` claim is in the past.
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        token::is_expired(self.token().as_deref())
    }

    /// Replace the session from an auth response payload.
    ///
    /// The payload must be a JSON object with a non-empty string
    /// `access_token` and `token_type`. Anything else clears the whole session
    /// instead of applying part of it. `refresh_token` and `user` are read
    /// leniently; the full payload is kept as the user snapshot. Returns the
    /// applied session, or `None` when the payload was rejected.
    pub fn set_auth(&self, payload: JsonValue) -> Option<AuthResponse> {
        let auth = match validate_payload(&payload) {
            Ok(auth) => auth,
            Err(reason) => {
                tracing::warn!(reason, "Rejecting auth payload");
                self.clear_auth();
                return None;
            }
        };

        if auth.user.is_none() && payload.get("user").is_some_and(|u| !u.is_null()) {
            tracing::warn!("Auth payload user not understood; storing session without a profile");
        }

        let mut state = self.inner.state.lock();
        if let Err(e) = self.write_slots(&auth, &payload.to_string()) {
            tracing::warn!(error = %e, "Session write failed; clearing");
            self.remove_slots();
            *state = Session::default();
            drop(state);
            self.inner.events.emit();
            return None;
        }
        *state = Session::from_auth(&auth);
        drop(state);

        tracing::debug!(has_refresh_token = auth.refresh_token.is_some(), "Session stored");
        self.inner.events.emit();
        Some(auth)
    }

    /// Reset to signed-out and remove all three durable slots. Notifies
    /// listeners even if the session was already empty.
    pub fn clear_auth(&self) {
        let mut state = self.inner.state.lock();
        *state = Session::default();
        self.remove_slots();
        drop(state);

        tracing::debug!("Session cleared");
        self.inner.events.emit();
    }

    /// Swap in a freshly fetched profile. Ignored when signed out.
    pub fn replace_user(&self, profile: UserProfile) -> bool {
        let mut state = self.inner.state.lock();
        if !state.is_authenticated() {
            return false;
        }

        let mut snapshot = match self.inner.storage.get(USER_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<JsonValue>(&raw)
                .ok()
                .filter(JsonValue::is_object)
                .unwrap_or_else(|| session_payload(&state)),
            _ => session_payload(&state),
        };
        snapshot["user"] = match serde_json::to_value(&profile) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Profile not serializable; keeping previous user");
                return false;
            }
        };

        if let Err(e) = self.inner.storage.set(USER_KEY, &snapshot.to_string()) {
            tracing::warn!(error = %e, "Session write failed; clearing");
            self.remove_slots();
            *state = Session::default();
            drop(state);
            self.inner.events.emit();
            return false;
        }
        state.user = Some(profile);
        drop(state);

        self.inner.events.emit();
        true
    }

    /// Re-read durable storage written by another process or window.
    ///
    /// Notifies and returns `true` only if the session changed. A snapshot
    /// caught halfway through another writer's update is skipped; the next
    /// call picks up the finished state.
    pub fn sync_from_storage(&self) -> bool {
        let mut state = self.inner.state.lock();
        let loaded = match self.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping storage sync");
                return false;
            }
        };
        if *state == loaded {
            return false;
        }
        *state = loaded;
        drop(state);

        tracing::debug!("Session changed in storage");
        self.inner.events.emit();
        true
    }

    /// Poll [`sync_from_storage`](Self::sync_from_storage) every `period`
    /// until `cancel` fires.
    pub fn spawn_storage_sync(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        store.sync_from_storage();
                    }
                }
            }
        })
    }

    fn load(&self) -> Result<Session, LoadError> {
        let storage = &self.inner.storage;
        let token = storage.get(ACCESS_TOKEN_KEY).map_err(LoadError::Storage)?;
        let refresh = storage.get(REFRESH_TOKEN_KEY).map_err(LoadError::Storage)?;
        let snapshot = storage.get(USER_KEY).map_err(LoadError::Storage)?;

        let token = match token.filter(|t| !t.is_empty()) {
            Some(t) => t,
            None if refresh.as_deref().is_none_or(str::is_empty) && snapshot.is_none() => {
                return Ok(Session::default());
            }
            None => return Err(LoadError::Inconsistent("session slots without a token")),
        };
        let snapshot = snapshot.ok_or(LoadError::Inconsistent("token without user snapshot"))?;
        let payload: JsonValue = serde_json::from_str(&snapshot)
            .map_err(|_| LoadError::Inconsistent("user snapshot is not JSON"))?;
        let auth = validate_payload(&payload).map_err(LoadError::Inconsistent)?;
        if auth.access_token != token {
            return Err(LoadError::Inconsistent("token does not match user snapshot"));
        }

        let mut session = Session::from_auth(&auth);
        session.refresh_token = refresh.filter(|t| !t.is_empty());
        Ok(session)
    }

    fn write_slots(&self, auth: &AuthResponse, snapshot: &str) -> Result<(), Error> {
        let storage = &self.inner.storage;
        storage.set(ACCESS_TOKEN_KEY, &auth.access_token)?;
        storage.set(REFRESH_TOKEN_KEY, auth.refresh_token.as_deref().unwrap_or(""))?;
        storage.set(USER_KEY, snapshot)
    }

    fn remove_slots(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.inner.storage.remove(key) {
                tracing::warn!(key, error = %e, "Failed to remove session slot");
            }
        }
    }
}

fn validate_payload(payload: &JsonValue) -> Result<AuthResponse, &'static str> {
    let fields = payload.as_object().ok_or("payload is not an object")?;
    let text = |key: &str| {
        fields
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };

    let access_token = text("access_token").ok_or("missing access_token")?;
    let token_type = text("token_type").ok_or("missing token_type")?;
    // The token decides validity; an odd `user` or `refresh_token` is dropped.
    let user = fields
        .get("user")
        .filter(|u| !u.is_null())
        .and_then(|u| serde_json::from_value(u.clone()).ok());

    Ok(AuthResponse {
        access_token,
        token_type,
        refresh_token: text("refresh_token"),
        user,
    })
}

fn session_payload(session: &Session) -> JsonValue {
    serde_json::json!({
        "access_token": session.access_token,
        "token_type": session.token_type,
        "refresh_token": session.refresh_token,
    })
}
