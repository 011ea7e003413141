//! Per-host, per-scheme authentication state.
//!
//! A [`SchemeHandler`] folds every challenge seen for one (host, scheme)
//! pair into its own state and produces an `Authorization` value on demand.
//! Handlers are built through a [`HandlerFactory`] registered for the scheme
//! name, so new schemes plug in without touching the orchestrator.

/// HTTP Basic.
pub mod basic;
/// Registry-style Bearer tokens.
pub mod bearer;

use std::sync::Arc;

use async_trait::async_trait;
use regauth_common::{Credentials, HttpClient};

use crate::challenge::Challenge;
use crate::error::Result;

pub use basic::BasicHandler;
pub use bearer::BearerHandler;

/// Stateful handler for one scheme on one host.
#[async_trait]
pub trait SchemeHandler: Send + Sync {
    /// Fold a challenge into the handler's state.
    ///
    /// Returns [`AuthError::NoNewChallenge`](crate::AuthError::NoNewChallenge)
    /// when the challenge adds nothing that is not already known.
    fn process_challenge(&mut self, challenge: &Challenge) -> Result<()>;

    /// Produce the full `Authorization` header value, scheme prefix included.
    async fn generate_auth(&mut self) -> Result<String>;
}

/// Builds a handler the first time a scheme is seen for a host.
///
/// Any `Fn(Arc<C>, &str, Credentials) -> Box<dyn SchemeHandler>` closure is
/// a factory.
pub trait HandlerFactory<C>: Send + Sync {
    /// Build a fresh handler for `host`.
    fn build(&self, client: Arc<C>, host: &str, credentials: Credentials) -> Box<dyn SchemeHandler>;
}

impl<C, F> HandlerFactory<C> for F
where
    F: Fn(Arc<C>, &str, Credentials) -> Box<dyn SchemeHandler> + Send + Sync,
{
    fn build(&self, client: Arc<C>, host: &str, credentials: Credentials) -> Box<dyn SchemeHandler> {
        self(client, host, credentials)
    }
}

/// Factory for [`BasicHandler`]. Registered under `basic` by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicFactory;

impl<C> HandlerFactory<C> for BasicFactory {
    fn build(&self, _client: Arc<C>, _host: &str, credentials: Credentials) -> Box<dyn SchemeHandler> {
        Box::new(BasicHandler::new(credentials))
    }
}

/// Factory for [`BearerHandler`]. Must be registered explicitly.
#[derive(Debug, Clone, Default)]
pub struct BearerFactory {
    options: crate::token::TokenOptions,
}

impl BearerFactory {
    /// Factory with default token options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose handlers use `options` for token caching.
    pub fn with_options(options: crate::token::TokenOptions) -> Self {
        Self { options }
    }
}

impl<C> HandlerFactory<C> for BearerFactory
where
    C: HttpClient + Send + Sync + 'static,
{
    fn build(&self, client: Arc<C>, host: &str, credentials: Credentials) -> Box<dyn SchemeHandler> {
        Box::new(BearerHandler::new(client, host, credentials).with_options(self.options.clone()))
    }
}
