//! Bearer token exchange against a registry token endpoint.
//!
//! The endpoint is the `realm` of a Bearer challenge. A token is requested
//! with `GET <realm>?service=<service>&scope=<scope>...`, authenticated with
//! HTTP Basic when credentials are available and anonymously otherwise. The
//! JSON reply carries the token under `token` (or `access_token`), plus an
//! optional `expires_in` in seconds and `issued_at` timestamp.

use bon::Builder;
use chrono::{DateTime, Duration, Utc};
use http::{Method, Request, header};
use regauth_common::{Credentials, HttpClient};
use serde::Deserialize;
use smol_str::SmolStr;
use url::Url;

use crate::error::{AuthError, Result};
use crate::handler::basic::basic_authorization;

/// Token caching behaviour for Bearer handlers.
///
/// - `default_lifetime`: how long a token lives when the server does not
///   say (`expires_in` absent). Registries treat 60 seconds as the minimum.
/// - `leeway`: a cached token is refreshed this long before it expires, so
///   a request is never sent with a token that dies in flight.
#[derive(Debug, Clone, Builder)]
#[builder(start_fn = new)]
pub struct TokenOptions {
    /// Lifetime assumed when the token response has no `expires_in`
    #[builder(default = Duration::seconds(60))]
    pub default_lifetime: Duration,
    /// Refresh margin before the recorded expiry
    #[builder(default = Duration::seconds(5))]
    pub leeway: Duration,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self::new().build()
    }
}

/// A token plus the moment it stops being usable.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Opaque token to send as `Bearer <token>`
    pub token: SmolStr,
    /// Expiry as reported (or assumed) at issue time
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Whether the token can still be sent at `now`, keeping `leeway` spare.
    pub fn is_fresh(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        now.checked_add_signed(leeway)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<SmolStr>,
    access_token: Option<SmolStr>,
    expires_in: Option<i64>,
    issued_at: Option<DateTime<Utc>>,
}

/// Parameters of a single token request.
#[derive(Debug, Clone, Copy)]
pub struct TokenRequest<'a> {
    /// Token endpoint URL (the challenge's `realm`)
    pub realm: &'a str,
    /// Service the token is for
    pub service: &'a str,
    /// Every scope the token must cover
    pub scopes: &'a [SmolStr],
}

impl TokenRequest<'_> {
    /// Build the `GET` request for the token endpoint.
    pub fn to_http(&self, credentials: &Credentials) -> Result<Request<Vec<u8>>> {
        let mut url = Url::parse(self.realm)
            .map_err(|e| AuthError::auth_failed_with("realm is not a valid URL", e))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("service", self.service);
            for scope in self.scopes {
                query.append_pair("scope", scope);
            }
        }

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .header(header::ACCEPT, "application/json");
        if !credentials.is_anonymous() {
            builder = builder.header(header::AUTHORIZATION, basic_authorization(credentials));
        }
        builder
            .body(Vec::new())
            .map_err(|e| AuthError::auth_failed_with("could not build token request", e))
    }
}

/// Exchange `request` for a token, using `credentials` when present.
pub async fn fetch_token<C>(
    client: &C,
    request: TokenRequest<'_>,
    credentials: &Credentials,
    options: &TokenOptions,
) -> Result<IssuedToken>
where
    C: HttpClient + Sync,
{
    #[cfg(feature = "tracing")]
    tracing::debug!(
        realm = request.realm,
        service = request.service,
        scopes = request.scopes.len(),
        anonymous = credentials.is_anonymous(),
        "requesting bearer token"
    );

    let response = client
        .send_http(request.to_http(credentials)?)
        .await
        .map_err(|e| AuthError::auth_failed_with("token request failed", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::auth_failed(format!(
            "token endpoint returned {status}"
        )));
    }

    let body: TokenResponse = serde_json::from_slice(response.body())
        .map_err(|e| AuthError::auth_failed_with("malformed token response", e))?;

    let token = body
        .token
        .filter(|t| !t.is_empty())
        .or(body.access_token.filter(|t| !t.is_empty()))
        .ok_or_else(|| AuthError::auth_failed("token response carried no token"))?;
    let lifetime = match body.expires_in {
        Some(secs) => Duration::try_seconds(secs.max(0))
            .ok_or_else(|| AuthError::auth_failed("token lifetime out of range"))?,
        None => options.default_lifetime,
    };
    let expires_at = body
        .issued_at
        .unwrap_or_else(Utc::now)
        .checked_add_signed(lifetime)
        .ok_or_else(|| AuthError::auth_failed("token lifetime out of range"))?;

    Ok(IssuedToken { token, expires_at })
}
