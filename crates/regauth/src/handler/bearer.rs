use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use regauth_common::{Credentials, HttpClient};
use smol_str::SmolStr;

use super::SchemeHandler;
use crate::challenge::Challenge;
use crate::error::{AuthError, Result};
use crate::token::{IssuedToken, TokenOptions, TokenRequest, fetch_token};

/// Bearer token authentication, as used by container registries.
///
/// A handler is bound to the first `realm` and `service` it sees; a later
/// challenge naming a different one is rejected. Scopes accumulate in the
/// order they were first requested and never shrink, so the token fetched
/// for this host covers everything the server has asked for so far.
///
/// The token is cached until shortly before it expires. Learning a new
/// scope drops the cached token, since it cannot cover that scope.
pub struct BearerHandler<C> {
    client: Arc<C>,
    host: SmolStr,
    credentials: Credentials,
    options: TokenOptions,
    realm: Option<SmolStr>,
    service: Option<SmolStr>,
    scopes: Vec<SmolStr>,
    token: Option<IssuedToken>,
}

impl<C> BearerHandler<C> {
    /// New handler for `host` with nothing learned yet.
    pub fn new(client: Arc<C>, host: impl Into<SmolStr>, credentials: Credentials) -> Self {
        Self {
            client,
            host: host.into(),
            credentials,
            options: TokenOptions::default(),
            realm: None,
            service: None,
            scopes: Vec::new(),
            token: None,
        }
    }

    /// Replace the token caching options.
    pub fn with_options(mut self, options: TokenOptions) -> Self {
        self.options = options;
        self
    }

    /// Token endpoint, once known.
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    /// Service name, once known.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Every scope requested so far, oldest first.
    pub fn scopes(&self) -> &[SmolStr] {
        &self.scopes
    }

    fn bind(slot: &Option<SmolStr>, value: &str, what: &str) -> Result<()> {
        match slot.as_deref() {
            Some(known) if known != value => Err(AuthError::invalid_challenge(format!(
                "bearer {what} changed from {known:?} to {value:?}"
            ))),
            _ => Ok(()),
        }
    }
}

impl<C> std::fmt::Debug for BearerHandler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerHandler")
            .field("host", &self.host)
            .field("realm", &self.realm)
            .field("service", &self.service)
            .field("scopes", &self.scopes)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> SchemeHandler for BearerHandler<C>
where
    C: HttpClient + Send + Sync + 'static,
{
    fn process_challenge(&mut self, challenge: &Challenge) -> Result<()> {
        let required = |key: &str| {
            challenge
                .param(key)
                .ok_or_else(|| AuthError::invalid_challenge(format!("bearer challenge without {key}")))
        };
        let realm = required("realm")?;
        let service = required("service")?;
        let scope = required("scope")?;

        let known_scope = self.scopes.iter().any(|s| s == scope);
        if self.realm.as_deref() == Some(realm)
            && self.service.as_deref() == Some(service)
            && known_scope
        {
            return Err(AuthError::NoNewChallenge);
        }

        Self::bind(&self.realm, realm, "realm")?;
        Self::bind(&self.service, service, "service")?;

        self.realm.get_or_insert_with(|| realm.into());
        self.service.get_or_insert_with(|| service.into());
        if !known_scope {
            self.scopes.push(scope.into());
            self.token = None;
        }
        Ok(())
    }

    async fn generate_auth(&mut self) -> Result<String> {
        let (Some(realm), Some(service)) = (&self.realm, &self.service) else {
            return Err(AuthError::auth_failed("no bearer challenge seen yet"));
        };

        let now = Utc::now();
        if let Some(token) = self.token.as_ref().filter(|t| t.is_fresh(now, self.options.leeway)) {
            #[cfg(feature = "tracing")]
            tracing::debug!(host = %self.host, "reusing cached bearer token");
            return Ok(format!("Bearer {}", token.token));
        }

        let request = TokenRequest {
            realm,
            service,
            scopes: &self.scopes,
        };
        let issued = fetch_token(
            self.client.as_ref(),
            request,
            &self.credentials,
            &self.options,
        )
        .await?;
        let header = format!("Bearer {}", issued.token);
        self.token = Some(issued);
        Ok(header)
    }
}
