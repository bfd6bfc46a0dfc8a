#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::http::HeaderMap;
use membuddy_client::{
    ApiClient, ClientConfig, Location, MemoryStorage, Navigator, SessionStore, Subscription,
};
use parking_lot::Mutex;
use serde_json::json;
use url::Url;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}").parse().unwrap()
}

/// Client over a fresh in-memory session.
pub fn client(base_url: Url) -> ApiClient {
    let session = SessionStore::open(MemoryStorage::new());
    ApiClient::new(ClientConfig::new(base_url), session).unwrap()
}

/// Client whose session already holds `access` (and `refresh`, if given).
pub fn signed_in_client(base_url: Url, access: &str, refresh: Option<&str>) -> ApiClient {
    let api = client(base_url);
    let mut payload = json!({
        "access_token": access,
        "token_type": "bearer",
        "user": {"id": "u1", "email": "a@b.com", "createdAt": "2024-01-01T00:00:00Z"},
    });
    if let Some(refresh) = refresh {
        payload["refresh_token"] = json!(refresh);
    }
    assert!(api.session().set_auth(payload).is_some());
    api
}

/// Token from an `Authorization: Bearer` header.
pub fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

/// Counts session change notifications while alive.
pub struct ChangeCounter {
    count: Arc<AtomicUsize>,
    _subscription: Subscription,
}

impl ChangeCounter {
    pub fn attach(session: &SessionStore) -> Self {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let subscription = session.subscribe(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        Self {
            count,
            _subscription: subscription,
        }
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Navigator that records every navigation.
pub struct RecordingNavigator {
    current: Mutex<Location>,
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn at(location: &str) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Location::parse(location)),
            visits: Mutex::new(Vec::new()),
        })
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> Location {
        self.current.lock().clone()
    }

    fn navigate(&self, to: &str) {
        *self.current.lock() = Location::parse(to);
        self.visits.lock().push(to.to_string());
    }
}
