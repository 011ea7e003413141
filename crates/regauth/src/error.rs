//! Error types for challenge handling and header generation

use miette::{Diagnostic, SourceSpan};
use smol_str::SmolStr;
use thiserror::Error;

/// Errors surfaced by [`Auth`](crate::Auth) and the scheme handlers.
#[derive(Debug, Error, Diagnostic)]
pub enum AuthError {
    /// The response handed to `handle_response` was not a 401
    #[error("response is not a 401 Unauthorized")]
    #[diagnostic(
        code(regauth::unsupported),
        help("only 401 responses carry WWW-Authenticate challenges worth learning from")
    )]
    Unsupported,

    /// A `WWW-Authenticate` value could not be tokenized
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ChallengeParseError),

    /// Well-formed challenge that a handler cannot accept
    #[error("invalid challenge: {0}")]
    #[diagnostic(code(regauth::invalid_challenge))]
    InvalidChallenge(SmolStr),

    /// The challenge added nothing the handler did not already know
    #[error("no new challenge")]
    #[diagnostic(code(regauth::no_new_challenge))]
    NoNewChallenge,

    /// Credentials are required but none are configured for the host
    #[error("credentials not found")]
    #[diagnostic(
        code(regauth::not_found),
        help("configure a credentials provider that knows this host")
    )]
    NotFound,

    /// The token exchange with the authorization server failed
    #[error("authentication failed: {reason}")]
    #[diagnostic(code(regauth::auth_failed))]
    AuthFailed {
        /// What went wrong
        reason: SmolStr,
        /// Underlying transport or decode error, if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AuthError {
    pub(crate) fn invalid_challenge(reason: impl Into<SmolStr>) -> Self {
        Self::InvalidChallenge(reason.into())
    }

    pub(crate) fn auth_failed(reason: impl Into<SmolStr>) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn auth_failed_with(
        reason: impl Into<SmolStr>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = core::result::Result<T, AuthError>;

/// Why the challenge tokenizer gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A byte that is not allowed in the current position
    UnexpectedByte(u8),
    /// Input ended inside a quoted string
    UnterminatedQuote,
    /// A quoted value is not valid UTF-8
    InvalidUtf8,
}

/// A `WWW-Authenticate` value that does not follow the challenge grammar.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("failed to parse challenge header: {}", describe(.kind, .span))]
#[diagnostic(code(regauth::parse_failure))]
pub struct ChallengeParseError {
    /// What was wrong
    pub kind: ParseErrorKind,
    #[source_code]
    header: String,
    #[label("here")]
    span: SourceSpan,
}

impl ChallengeParseError {
    pub(crate) fn new(kind: ParseErrorKind, header: &[u8], offset: usize) -> Self {
        let len = match kind {
            ParseErrorKind::UnexpectedByte(_) | ParseErrorKind::InvalidUtf8 => 1,
            ParseErrorKind::UnterminatedQuote => 0,
        };
        Self {
            kind,
            header: String::from_utf8_lossy(header).into_owned(),
            span: (offset, len).into(),
        }
    }

    /// The header value that failed to parse (lossily decoded).
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Byte offset of the failure within [`header`](Self::header).
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

fn describe(kind: &ParseErrorKind, span: &SourceSpan) -> String {
    match *kind {
        ParseErrorKind::UnexpectedByte(b) if b.is_ascii_graphic() => {
            format!("unexpected '{}' at byte {}", b as char, span.offset())
        }
        ParseErrorKind::UnexpectedByte(b) => {
            format!("unexpected byte 0x{:02x} at byte {}", b, span.offset())
        }
        ParseErrorKind::UnterminatedQuote => "unterminated quoted string".to_string(),
        ParseErrorKind::InvalidUtf8 => format!("invalid UTF-8 at byte {}", span.offset()),
    }
}
