//! Transport-level error type

/// Errors raised while moving bytes to and from a server.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TransportError {
    /// Failed to establish connection to server
    #[error("connection error: {0}")]
    #[diagnostic(code(regauth::transport::connect))]
    Connect(String),

    /// Request timed out
    #[error("request timeout")]
    #[diagnostic(
        code(regauth::transport::timeout),
        help("timeouts are configured on the underlying HTTP client")
    )]
    Timeout,

    /// Request construction failed (malformed URI, headers, etc.)
    #[error("invalid request: {0}")]
    #[diagnostic(code(regauth::transport::invalid_request))]
    InvalidRequest(String),

    /// The server's reply could not be turned into an `http::Response`
    #[error("invalid response: {0}")]
    #[diagnostic(code(regauth::transport::invalid_response))]
    InvalidResponse(String),

    /// Other transport error
    #[error("transport error: {0}")]
    #[diagnostic(code(regauth::transport::other))]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "reqwest-client")]
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_builder() || e.is_request() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Other(Box::new(e))
        }
    }
}
