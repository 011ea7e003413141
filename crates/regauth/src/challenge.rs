//! `WWW-Authenticate` challenge parsing.
//!
//! The tokenizer is lenient about separators and strict about which bytes
//! may appear where:
//!
//! - a scheme name ends at whitespace, so `scheme1 k=v, scheme2 k=v` works
//! - parameters are separated by commas
//! - unquoted values are alphanumeric only
//! - quoted values are opaque apart from `\` escapes, but must be UTF-8
//!
//! Scheme names and parameter keys are lower-cased. Anything the grammar
//! does not allow is a [`ChallengeParseError`]. Parsing is a single pass
//! over the bytes with no backtracking.

mod charclass;

use std::collections::BTreeMap;
use std::fmt;

use smol_str::SmolStr;

use crate::error::{ChallengeParseError, ParseErrorKind};
use charclass::{is_alphanum, is_space};

/// One `scheme + parameters` unit from a `WWW-Authenticate` header.
///
/// Produced by [`parse_header`] / [`parse_challenges`]; the scheme and all
/// parameter keys are lower case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    scheme: SmolStr,
    params: BTreeMap<SmolStr, SmolStr>,
}

impl Challenge {
    /// A challenge for `scheme` with no parameters.
    pub fn new(scheme: impl AsRef<str>) -> Self {
        Self {
            scheme: SmolStr::new(scheme.as_ref().to_ascii_lowercase()),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter. The key is lower-cased; a repeated key replaces the
    /// earlier value.
    pub fn with_param(mut self, key: impl AsRef<str>, value: impl Into<SmolStr>) -> Self {
        self.params
            .insert(SmolStr::new(key.as_ref().to_ascii_lowercase()), value.into());
        self
    }

    /// Authentication scheme, e.g. `basic` or `bearer`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Look up a parameter by its (lower-case) key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(SmolStr::as_str)
    }

    /// All parameters, ordered by key.
    pub fn params(&self) -> &BTreeMap<SmolStr, SmolStr> {
        &self.params
    }
}

/// Renders `scheme k1="v1", k2="v2"`, quoting every value.
impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scheme)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            write!(f, "{key}=\"")?;
            for c in value.chars() {
                if c == '"' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

/// Render several challenges as a single header value that
/// [`parse_header`] reads back into the same list.
pub fn format_challenges(challenges: &[Challenge]) -> String {
    let mut out = String::new();
    for (i, challenge) in challenges.iter().enumerate() {
        if i > 0 {
            // a comma directly after a bare scheme name is not accepted
            let prev = &challenges[i - 1];
            out.push_str(if prev.params.is_empty() { " " } else { ", " });
        }
        out.push_str(&challenge.to_string());
    }
    // a bare scheme ending the value must be whitespace-terminated to be read back
    if let [.., prev, last] = challenges {
        if prev.params.is_empty() && last.params.is_empty() {
            out.push(' ');
        }
    }
    out
}

/// Parse every `WWW-Authenticate` value of a response, in order.
///
/// Fails on the first value that does not parse; the error carries that
/// value's text.
pub fn parse_challenges<I, H>(headers: I) -> Result<Vec<Challenge>, ChallengeParseError>
where
    I: IntoIterator<Item = H>,
    H: AsRef<[u8]>,
{
    let mut challenges = Vec::new();
    for header in headers {
        challenges.extend(parse_header(header)?);
    }
    Ok(challenges)
}

/// Parse a single `WWW-Authenticate` value, which may hold several
/// challenges.
///
/// ```
/// use regauth::challenge::parse_header;
///
/// let parsed = parse_header(r#"Bearer realm="https://auth.example.com/token",service="registry.example.com""#)?;
/// assert_eq!(parsed[0].scheme(), "bearer");
/// assert_eq!(parsed[0].param("service"), Some("registry.example.com"));
/// # Ok::<(), regauth::ChallengeParseError>(())
/// ```
pub fn parse_header(header: impl AsRef<[u8]>) -> Result<Vec<Challenge>, ChallengeParseError> {
    Tokenizer::new(header.as_ref()).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scheme,
    Value,
    Quoted,
    Escape,
    EndValue,
}

struct Tokenizer<'h> {
    input: &'h [u8],
    state: State,
    challenges: Vec<Challenge>,
    token: Vec<u8>,
    key: Vec<u8>,
    value: Vec<u8>,
    after_comma: bool,
}

impl<'h> Tokenizer<'h> {
    fn new(input: &'h [u8]) -> Self {
        Self {
            input,
            state: State::Scheme,
            challenges: Vec::new(),
            token: Vec::new(),
            key: Vec::new(),
            value: Vec::new(),
            after_comma: false,
        }
    }

    fn run(mut self) -> Result<Vec<Challenge>, ChallengeParseError> {
        let input = self.input;
        for (offset, &b) in input.iter().enumerate() {
            self.state = self.step(b).ok_or_else(|| {
                ChallengeParseError::new(ParseErrorKind::UnexpectedByte(b), input, offset)
            })?;
        }

        // a word trailing a bare scheme is token68 credentials, not a scheme
        match self.state {
            State::Scheme
                if !self.token.is_empty() && (self.challenges.is_empty() || self.after_comma) =>
            {
                self.open_challenge()
            }
            State::Value if !self.value.is_empty() => self.store_param(),
            State::Quoted | State::Escape => {
                return Err(ChallengeParseError::new(
                    ParseErrorKind::UnterminatedQuote,
                    input,
                    input.len(),
                ));
            }
            _ => {}
        }
        // only quoted values can carry non-ASCII bytes past the grammar
        if let Err(e) = std::str::from_utf8(input) {
            return Err(ChallengeParseError::new(
                ParseErrorKind::InvalidUtf8,
                input,
                e.valid_up_to(),
            ));
        }
        Ok(self.challenges)
    }

    /// Consume one byte, returning the next state or `None` if the byte is
    /// not allowed here.
    fn step(&mut self, b: u8) -> Option<State> {
        match self.state {
            State::Scheme => {
                if is_alphanum(b) {
                    self.token.push(b);
                    Some(State::Scheme)
                } else if is_space(b) {
                    if !self.token.is_empty() {
                        self.open_challenge();
                    }
                    Some(State::Scheme)
                } else if b == b'=' && !self.token.is_empty() && !self.challenges.is_empty() {
                    self.key = std::mem::take(&mut self.token);
                    self.after_comma = false;
                    Some(State::Value)
                } else {
                    None
                }
            }
            State::Value => {
                if is_alphanum(b) {
                    self.value.push(b);
                    Some(State::Value)
                } else if b == b'"' && self.value.is_empty() {
                    Some(State::Quoted)
                } else if b == b',' {
                    self.store_param();
                    self.after_comma = true;
                    Some(State::Scheme)
                } else if is_space(b) {
                    self.store_param();
                    Some(State::EndValue)
                } else {
                    None
                }
            }
            State::Quoted => match b {
                b'"' => {
                    self.store_param();
                    Some(State::EndValue)
                }
                b'\\' => Some(State::Escape),
                _ => {
                    self.value.push(b);
                    Some(State::Quoted)
                }
            },
            State::Escape => {
                self.value.push(b);
                Some(State::Quoted)
            }
            State::EndValue => {
                if is_space(b) {
                    Some(State::EndValue)
                } else if b == b',' {
                    self.after_comma = true;
                    Some(State::Scheme)
                } else {
                    None
                }
            }
        }
    }

    fn open_challenge(&mut self) {
        self.after_comma = false;
        let scheme = std::mem::take(&mut self.token);
        self.challenges.push(Challenge {
            scheme: lowercase(&scheme),
            params: BTreeMap::new(),
        });
    }

    fn store_param(&mut self) {
        let key = lowercase(&std::mem::take(&mut self.key));
        let value = SmolStr::new(String::from_utf8_lossy(&std::mem::take(&mut self.value)));
        // a key is only ever captured once a challenge exists
        if let Some(challenge) = self.challenges.last_mut() {
            challenge.params.insert(key, value);
        }
    }
}

fn lowercase(bytes: &[u8]) -> SmolStr {
    SmolStr::new(String::from_utf8_lossy(&bytes.to_ascii_lowercase()))
}
