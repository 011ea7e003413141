//! # regauth
//!
//! Client-side HTTP challenge/response authentication, in the shape
//! container registries use: a request comes back `401 Unauthorized` with
//! one or more `WWW-Authenticate` challenges, the client learns from them,
//! and later requests to the same host carry an `Authorization` header.
//!
//! - [`challenge`] turns raw `WWW-Authenticate` text into [`Challenge`]s.
//! - [`handler`] holds the per-(host, scheme) state machines: Basic and
//!   Bearer, plus the [`HandlerFactory`] seam for adding others.
//! - [`token`] exchanges Bearer challenge parameters for a token.
//! - [`Auth`] ties it together; [`AuthClient`] wraps any [`HttpClient`] so
//!   the retry-on-401 dance happens automatically.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use regauth::{Auth, AuthClient, BearerFactory, HttpClient, StaticCredentials, Credentials};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = Auth::builder(reqwest::Client::new())
//!     .credentials(
//!         StaticCredentials::new()
//!             .with_host("registry.example.com", Credentials::new("alice", "wonderland")),
//!     )
//!     .handler("bearer", BearerFactory::new())
//!     .default_handlers()
//!     .build();
//! let client = AuthClient::new(Arc::new(auth));
//!
//! let request = http::Request::get("https://registry.example.com/v2/")
//!     .body(Vec::new())?;
//! let response = client.send_http(request).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod challenge;
pub mod client;
pub mod error;
pub mod handler;
pub mod token;

pub use auth::{Auth, AuthBuilder};
pub use challenge::{Challenge, format_challenges, parse_challenges, parse_header};
pub use client::AuthClient;
pub use error::{AuthError, ChallengeParseError, ParseErrorKind, Result};
pub use handler::{
    BasicFactory, BasicHandler, BearerFactory, BearerHandler, HandlerFactory, SchemeHandler,
};
pub use regauth_common::{
    Credentials, CredentialsProvider, HttpClient, NoCredentials, StaticCredentials, TransportError,
};
pub use token::TokenOptions;
