//! Shared plumbing for the regauth crates: the transport seam the
//! authenticator talks through, and the credential lookup it consults.

#![warn(missing_docs)]
pub use smol_str;

/// Credential lookup for registry hosts.
pub mod creds;
pub mod error;
/// HTTP client abstraction used by regauth crates.
pub mod http_client;

pub use creds::{Credentials, CredentialsProvider, NoCredentials, StaticCredentials};
pub use error::TransportError;
pub use http_client::HttpClient;
