//! Route gating on top of [`SessionStore`] state.
//!
//! ```rust,ignore
//! use membuddy_client::guard::RouteGuard;
//!
//! // Protected view: bounce anonymous users to the login page.
//! let handle = RouteGuard::new(true).mount(&session, navigator.clone());
//! if handle.should_render() {
//!     render_library();
//! }
//!
//! // Public-only view (login form): bounce signed-in users onward.
//! let handle = RouteGuard::new(false).mount(&session, navigator);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::session::{SessionStore, Subscription};

const DEFAULT_LOGIN_PATH: &str = "/auth/login";
const REDIRECT_PARAM: &str = "redirect";

/// Host router: where the user is, and how to send them elsewhere.
pub trait Navigator: Send + Sync + 'static {
    fn current_location(&self) -> Location;

    fn navigate(&self, to: &str);
}

/// Path plus optional query string. Fragments are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    path: String,
    query: Option<String>,
}

impl Location {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    /// Parse `"/path?query#fragment"`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.split('#').next().unwrap_or_default();
        match s.split_once('?') {
            Some((path, query)) => Self::new(path).with_query(query),
            None => Self::new(s),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// First value of a decoded query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    /// Render nothing; navigate to the target.
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Render,
    Redirecting(String),
}

/// Gate for a view tree.
///
/// With `require_auth`, anonymous users go to the login path with the
/// current location in a `redirect` parameter. Without it (public-only
/// views), signed-in users go to that `redirect` target, or `/`.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    require_auth: bool,
    redirect_to: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RouteGuard {
    #[must_use]
    pub fn new(require_auth: bool) -> Self {
        Self {
            require_auth,
            redirect_to: DEFAULT_LOGIN_PATH.into(),
        }
    }

    /// Login location for anonymous users (default `/auth/login`).
    #[must_use]
    pub fn with_redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }

    #[must_use]
    pub fn require_auth(&self) -> bool {
        self.require_auth
    }

    #[must_use]
    pub fn redirect_to(&self) -> &str {
        &self.redirect_to
    }

    #[must_use]
    pub fn evaluate(&self, authenticated: bool, location: &Location) -> GuardDecision {
        match (self.require_auth, authenticated) {
            (true, false) => {
                let back = urlencoding::encode(&location.to_string()).into_owned();
                GuardDecision::Redirect(format!("{}?{REDIRECT_PARAM}={back}", self.redirect_to))
            }
            (false, true) => {
                let target = location
                    .query_param(REDIRECT_PARAM)
                    .filter(|t| is_local_path(t))
                    .unwrap_or_else(|| "/".into());
                GuardDecision::Redirect(target)
            }
            _ => GuardDecision::Render,
        }
    }

    /// Evaluate now and again on every session change until the handle is dropped.
    pub fn mount(self, session: &SessionStore, navigator: Arc<dyn Navigator>) -> GuardHandle {
        let state = Arc::new(Mutex::new(GuardState::Checking));

        let check = {
            let state = state.clone();
            let session = session.clone();
            move || {
                let location = navigator.current_location();
                let decision = self.evaluate(session.is_authenticated(), &location);
                match decision {
                    GuardDecision::Render => *state.lock() = GuardState::Render,
                    GuardDecision::Redirect(target) => {
                        *state.lock() = GuardState::Redirecting(target.clone());
                        tracing::debug!(from = %location, to = %target, "Route guard redirect");
                        navigator.navigate(&target);
                    }
                }
            }
        };

        check();
        let subscription = session.subscribe(check);

        GuardHandle {
            state,
            _subscription: subscription,
        }
    }
}

/// Only same-origin absolute paths are followed; anything else falls back to `/`.
fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

/// Live guard. Dropping it stops re-evaluation.
pub struct GuardHandle {
    state: Arc<Mutex<GuardState>>,
    _subscription: Subscription,
}

impl GuardHandle {
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state.lock().clone()
    }

    #[must_use]
    pub fn should_render(&self) -> bool {
        matches!(*self.state.lock(), GuardState::Render)
    }
}

impl std::fmt::Debug for GuardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
