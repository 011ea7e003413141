//! The authenticator: learns from `401` responses and decorates requests.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, Request, Response, StatusCode, Uri};
use regauth_common::{CredentialsProvider, NoCredentials};
use smol_str::{SmolStr, format_smolstr};
use tokio::sync::Mutex;

use crate::challenge::parse_challenges;
use crate::error::{AuthError, Result};
use crate::handler::{BasicFactory, HandlerFactory, SchemeHandler};

type HostHandlers = HashMap<SmolStr, Box<dyn SchemeHandler>>;

/// Challenge-driven HTTP authentication for a client session.
///
/// - [`handle_response`](Self::handle_response) parses the `WWW-Authenticate`
///   challenges of a `401` and folds each one into the handler for its
///   (host, scheme), creating the handler on first sight.
/// - [`update_request`](Self::update_request) asks the handlers known for the
///   request's host, in scheme registration order, for an `Authorization`
///   value and sets the first one that works.
///
/// Handlers live as long as the `Auth`. All handler state sits behind one
/// async mutex, so a shared `Auth` serialises learning and header generation
/// (including any token exchange in progress).
pub struct Auth<C> {
    client: Arc<C>,
    credentials: Arc<dyn CredentialsProvider>,
    factories: HashMap<SmolStr, Arc<dyn HandlerFactory<C>>>,
    schemes: Vec<SmolStr>,
    handlers: Mutex<HashMap<SmolStr, HostHandlers>>,
}

impl<C> Auth<C>
where
    C: Send + Sync + 'static,
{
    /// Authenticator with anonymous credentials and the default (Basic)
    /// handler.
    pub fn new(client: C) -> Self {
        Self::builder(client).build()
    }

    /// Start configuring an authenticator that talks through `client`.
    pub fn builder(client: C) -> AuthBuilder<C> {
        AuthBuilder::new(client)
    }

    /// Registered schemes, highest priority first.
    pub fn schemes(&self) -> &[SmolStr] {
        &self.schemes
    }

    /// The client handed to Bearer handlers for token exchange.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Whether a handler for `scheme` exists for `host`.
    pub async fn has_handler(&self, host: &str, scheme: &str) -> bool {
        let scheme = scheme.to_ascii_lowercase();
        self.handlers
            .lock()
            .await
            .get(host)
            .is_some_and(|h| h.contains_key(scheme.as_str()))
    }

    /// Learn from an authentication challenge.
    ///
    /// `request_uri` is the URI of the request that produced `response`; its
    /// `host[:port]` keys the handlers.
    ///
    /// Fails with [`AuthError::Unsupported`] unless the response is a `401`
    /// for an absolute URI, and with [`AuthError::NoNewChallenge`] when no
    /// challenge changed any handler. Challenges for unregistered schemes are
    /// skipped. The first handler error other than `NoNewChallenge` aborts
    /// the call; state already updated by earlier challenges is kept.
    pub async fn handle_response<B>(&self, request_uri: &Uri, response: &Response<B>) -> Result<()> {
        if response.status() != StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unsupported);
        }
        let host = host_key(request_uri).ok_or(AuthError::Unsupported)?;
        let challenges = parse_challenges(
            response
                .headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .map(HeaderValue::as_bytes),
        )?;

        let mut handlers = self.handlers.lock().await;
        let mut learned = false;
        for challenge in &challenges {
            let Some(factory) = self.factories.get(challenge.scheme()) else {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    host = %host,
                    scheme = challenge.scheme(),
                    "unsupported auth scheme in challenge"
                );
                continue;
            };

            let handler = handlers
                .entry(host.clone())
                .or_default()
                .entry(SmolStr::new(challenge.scheme()))
                .or_insert_with(|| {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(host = %host, scheme = challenge.scheme(), "creating auth handler");
                    let credentials = self.credentials.credentials(&host);
                    factory.build(Arc::clone(&self.client), &host, credentials)
                });

            match handler.process_challenge(challenge) {
                Ok(()) => learned = true,
                Err(AuthError::NoNewChallenge) => {}
                Err(e) => return Err(e),
            }
        }

        if learned {
            Ok(())
        } else {
            Err(AuthError::NoNewChallenge)
        }
    }

    /// Set the `Authorization` header on `request` if a handler for its host
    /// can produce one.
    ///
    /// Schemes are tried in registration order; a handler that fails to
    /// generate a value is skipped. Returns whether the header was set. A
    /// request for a host with no handlers is left alone.
    pub async fn update_request<B>(&self, request: &mut Request<B>) -> bool {
        let Some(host) = host_key(request.uri()) else {
            return false;
        };
        let mut handlers = self.handlers.lock().await;
        let Some(for_host) = handlers.get_mut(&host) else {
            return false;
        };

        for scheme in &self.schemes {
            let Some(handler) = for_host.get_mut(scheme) else {
                continue;
            };
            let value = match handler.generate_auth().await {
                Ok(value) => value,
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(host = %host, scheme = %scheme, error = %_e, "skipping auth scheme");
                    continue;
                }
            };
            match HeaderValue::from_str(&value) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    request.headers_mut().insert(AUTHORIZATION, value);
                    return true;
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(host = %host, scheme = %scheme, "auth value is not a valid header");
                }
            }
        }
        false
    }
}

#[cfg(feature = "reqwest-client")]
impl Default for Auth<reqwest::Client> {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

/// `host[:port]` of an absolute URI.
fn host_key(uri: &Uri) -> Option<SmolStr> {
    let host = uri.host()?;
    Some(match uri.port_u16() {
        Some(port) => format_smolstr!("{host}:{port}"),
        None => SmolStr::new(host),
    })
}

/// Configuration for [`Auth`].
pub struct AuthBuilder<C> {
    client: C,
    credentials: Arc<dyn CredentialsProvider>,
    factories: HashMap<SmolStr, Arc<dyn HandlerFactory<C>>>,
    schemes: Vec<SmolStr>,
}

impl<C> AuthBuilder<C>
where
    C: Send + Sync + 'static,
{
    /// Builder with anonymous credentials and no schemes registered.
    pub fn new(client: C) -> Self {
        Self {
            client,
            credentials: Arc::new(NoCredentials),
            factories: HashMap::new(),
            schemes: Vec::new(),
        }
    }

    /// Where to look up a username/password for each host.
    pub fn credentials(mut self, provider: impl CredentialsProvider + 'static) -> Self {
        self.credentials = Arc::new(provider);
        self
    }

    /// Register a scheme. Schemes are tried by
    /// [`Auth::update_request`] in the order they are registered;
    /// registering a scheme again replaces its factory but keeps its place.
    ///
    /// Registering any scheme turns off the implicit Basic default; call
    /// [`default_handlers`](Self::default_handlers) to keep it.
    pub fn handler(mut self, scheme: impl AsRef<str>, factory: impl HandlerFactory<C> + 'static) -> Self {
        let scheme = SmolStr::new(scheme.as_ref().to_ascii_lowercase());
        if !self.schemes.contains(&scheme) {
            self.schemes.push(scheme.clone());
        }
        self.factories.insert(scheme, Arc::new(factory));
        self
    }

    /// Register the built-in Basic handler, unless `basic` is already
    /// registered.
    pub fn default_handlers(mut self) -> Self {
        if !self.factories.contains_key("basic") {
            self = self.handler("basic", BasicFactory);
        }
        self
    }

    /// Finish configuration.
    pub fn build(self) -> Auth<C> {
        let this = if self.schemes.is_empty() {
            self.default_handlers()
        } else {
            self
        };
        Auth {
            client: Arc::new(this.client),
            credentials: this.credentials,
            factories: this.factories,
            schemes: this.schemes,
            handlers: Mutex::new(HashMap::new()),
        }
    }
}
