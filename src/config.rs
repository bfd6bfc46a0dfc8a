use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::Error;

const DEFAULT_BASE_URL: &str = "https://api.membuddy.com";

/// MemBuddy client configuration.
///
/// ```rust,ignore
/// use membuddy_client::ClientConfig;
///
/// let config = ClientConfig::new("http://localhost:8000".parse()?)
///     .with_login_path("/auth/login")
///     .with_timeout(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) login_path: String,
    pub(crate) timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) session_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.parse().expect("valid default URL"))
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: normalize_base(base_url),
            login_path: "/auth/login".into(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            session_dir: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `MEMBUDDY_API_URL`: backend base URL (default `https://api.membuddy.com`)
    /// - `MEMBUDDY_LOGIN_PATH`: where unauthenticated users are sent
    /// - `MEMBUDDY_HTTP_TIMEOUT_SECS`: whole-request timeout in seconds
    /// - `MEMBUDDY_SESSION_DIR`: directory for the file-backed session store
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but invalid.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = match std::env::var("MEMBUDDY_API_URL") {
            Ok(url_str) => {
                let url: Url = url_str
                    .parse()
                    .map_err(|e| Error::Config(format!("MEMBUDDY_API_URL: {e}")))?;
                Self::new(url)
            }
            Err(_) => Self::default(),
        };

        if let Ok(path) = std::env::var("MEMBUDDY_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Ok(secs) = std::env::var("MEMBUDDY_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "MEMBUDDY_HTTP_TIMEOUT_SECS must be a positive integer, got '{secs}'"
                    ))
                })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Ok(dir) = std::env::var("MEMBUDDY_SESSION_DIR") {
            config = config.with_session_dir(dir);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn session_dir(&self) -> Option<&PathBuf> {
        self.session_dir.as_ref()
    }

    /// Absolute URL for an `/api/...` path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        )
    }

    /// Build the `reqwest` client these settings describe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS backend fails to initialise.
    pub fn http_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(Into::into)
    }
}

fn normalize_base(mut url: Url) -> Url {
    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);
    url
}
