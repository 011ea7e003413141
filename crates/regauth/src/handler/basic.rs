use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use regauth_common::Credentials;
use smol_str::SmolStr;

use super::SchemeHandler;
use crate::challenge::Challenge;
use crate::error::{AuthError, Result};

/// HTTP Basic authentication.
///
/// Tracks the last realm the server named; credentials are fixed when the
/// handler is built. Anonymous Basic auth is not a thing, so
/// [`generate_auth`](SchemeHandler::generate_auth) fails with
/// [`AuthError::NotFound`] without both a username and a password.
#[derive(Debug, Clone)]
pub struct BasicHandler {
    realm: Option<SmolStr>,
    credentials: Credentials,
}

impl BasicHandler {
    /// New handler with no realm seen yet.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            realm: None,
            credentials,
        }
    }

    /// The realm from the most recent accepted challenge.
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }
}

#[async_trait]
impl SchemeHandler for BasicHandler {
    fn process_challenge(&mut self, challenge: &Challenge) -> Result<()> {
        let realm = challenge
            .param("realm")
            .ok_or_else(|| AuthError::invalid_challenge("basic challenge without realm"))?;
        if self.realm.as_deref() == Some(realm) {
            return Err(AuthError::NoNewChallenge);
        }
        self.realm = Some(realm.into());
        Ok(())
    }

    async fn generate_auth(&mut self) -> Result<String> {
        if self.credentials.is_anonymous() {
            return Err(AuthError::NotFound);
        }
        Ok(basic_authorization(&self.credentials))
    }
}

/// `Basic <base64(user:pass)>`, with standard padded base64.
pub(crate) fn basic_authorization(credentials: &Credentials) -> String {
    let Credentials { username, password } = credentials;
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}
