use smol_str::SmolStr;
use std::collections::HashMap;
use std::fmt;

/// A username/password pair for one registry host.
///
/// Either half being empty means "anonymous": handlers that need both
/// (Basic) refuse to produce a header, handlers that can work without
/// them (Bearer) fall back to an anonymous token request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Account name
    pub username: SmolStr,
    /// Password or personal access token
    pub password: SmolStr,
}

impl Credentials {
    /// Build credentials from a username and password.
    pub fn new(username: impl Into<SmolStr>, password: impl Into<SmolStr>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Anonymous (empty) credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// True unless both the username and password are non-empty.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() || self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl From<(String, String)> for Credentials {
    fn from((username, password): (String, String)) -> Self {
        Self::new(username, password)
    }
}

/// Looks up credentials for a host (`host[:port]`, as it appears in the
/// request URI).
///
/// Implemented for any `Fn(&str) -> (String, String)`, so a plain closure
/// works where a lookup table would be overkill.
pub trait CredentialsProvider: Send + Sync {
    /// Return credentials for `host`, or anonymous ones if none are known.
    fn credentials(&self, host: &str) -> Credentials;
}

impl<F> CredentialsProvider for F
where
    F: Fn(&str) -> (String, String) + Send + Sync,
{
    fn credentials(&self, host: &str) -> Credentials {
        self(host).into()
    }
}

/// Provider that never has credentials. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialsProvider for NoCredentials {
    fn credentials(&self, _host: &str) -> Credentials {
        Credentials::anonymous()
    }
}

/// Fixed host → credentials table, suitable for configuration files and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(HashMap<SmolStr, Credentials>);

impl StaticCredentials {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the credentials for `host`.
    pub fn with_host(mut self, host: impl Into<SmolStr>, credentials: Credentials) -> Self {
        self.0.insert(host.into(), credentials);
        self
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self, host: &str) -> Credentials {
        self.0.get(host).cloned().unwrap_or_default()
    }
}
