//! Structured application errors.
//!
//! Every failure that may reach a caller is an [`Error`]: a stable machine-readable
//! [`ErrorCode`], a message that is safe to show, and an optional cause that stays inside
//! the process. [`render`] is the only way an error becomes a wire payload.

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Any error crossing a storage or transport seam before it has been classified.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Message shown for every `internal` error, whatever went wrong.
pub const INTERNAL_MESSAGE: &str = "An internal error has occurred.";

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ErrorCode {
    /// Request shape or field validation failed.
    Invalid,
    /// User identifier is malformed.
    InvalidUserId,
    /// Uniqueness violation.
    Conflict,
    /// Entity does not exist.
    NotFound,
    /// Request was throttled.
    RateLimit,
    /// Anything else.
    Internal,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 6] = [
        ErrorCode::Invalid,
        ErrorCode::InvalidUserId,
        ErrorCode::Conflict,
        ErrorCode::NotFound,
        ErrorCode::RateLimit,
        ErrorCode::Internal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Invalid => "invalid",
            ErrorCode::InvalidUserId => "invalid_user_id",
            ErrorCode::Conflict => "conflict",
            ErrorCode::NotFound => "not_found",
            ErrorCode::RateLimit => "rate_limit",
            ErrorCode::Internal => "internal",
        }
    }

    /// Whether an outcome with this code counts against a client circuit breaker.
    ///
    /// Validation outcomes are legitimate answers from a healthy server.
    pub fn trips_breaker(self) -> bool {
        matches!(self, ErrorCode::RateLimit | ErrorCode::Internal)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = std::convert::Infallible;

    /// Unknown codes are read as `internal` so the set stays closed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ErrorCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .unwrap_or(ErrorCode::Internal))
    }
}

impl From<String> for ErrorCode {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(code) => code,
            Err(never) => match never {},
        }
    }
}

impl From<ErrorCode> for &'static str {
    fn from(code: ErrorCode) -> Self {
        code.as_str()
    }
}

/// A classified application error.
#[derive(Clone)]
pub struct Error {
    code: ErrorCode,
    message: String,
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn invalid_user_id() -> Self {
        Self::new(ErrorCode::InvalidUserId, "Invalid user ID.")
    }

    pub fn invalid_username() -> Self {
        Self::new(ErrorCode::Invalid, "Username is invalid.")
    }

    pub fn conflict() -> Self {
        Self::new(
            ErrorCode::Conflict,
            "Username is already in use. Please choose a different username.",
        )
    }

    pub fn not_found() -> Self {
        Self::new(ErrorCode::NotFound, "User not found.")
    }

    pub fn rate_limit() -> Self {
        Self::new(ErrorCode::RateLimit, "API rate limit exceeded.")
    }

    pub fn internal() -> Self {
        Self::new(ErrorCode::Internal, INTERNAL_MESSAGE)
    }

    /// Attach the underlying failure for local diagnostics. It is never rendered.
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(Arc::from(cause.into()));
        self
    }

    /// Classify an error reported by a collaborator.
    ///
    /// A structured error anywhere in the chain keeps its code and message; anything else
    /// becomes `internal`. The source error is kept as the cause either way.
    pub fn classified(err: BoxError) -> Self {
        let err = match err.downcast::<Error>() {
            Ok(structured) => return *structured,
            Err(other) => other,
        };
        let (code, message) = match find(&*err) {
            Some(structured) => (structured.code, structured.message.clone()),
            None => (ErrorCode::Internal, INTERNAL_MESSAGE.to_string()),
        };
        Self::new(code, message).with_cause(err)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// The `{code, message}` pair of this error, without its cause.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code,
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Error");
        s.field("code", &self.code).field("message", &self.message);
        if let Some(cause) = &self.cause {
            s.field("cause", &format_args!("{cause}"));
        }
        s.finish()
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Errors compare by what a caller can observe.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.message == other.message
    }
}

impl Eq for Error {}

impl From<ErrorBody> for Error {
    fn from(body: ErrorBody) -> Self {
        Self::new(body.code, body.message)
    }
}

/// The only shape of an error that leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// Adds an operation name to an error while it propagates.
///
/// Classification looks through it, so wrapping never changes the code.
#[derive(Debug, thiserror::Error)]
#[error("{op}: {source}")]
pub struct OpError {
    pub op: &'static str,
    pub source: BoxError,
}

impl OpError {
    pub fn new(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            op,
            source: source.into(),
        }
    }
}

/// The nearest structured error in the chain starting at `err`.
pub fn find<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a Error> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(structured) = e.downcast_ref::<Error>() {
            return Some(structured);
        }
        current = e.source();
    }
    None
}

/// Code of the nearest structured error, or `internal`.
pub fn classify(err: &(dyn StdError + 'static)) -> ErrorCode {
    find(err).map_or(ErrorCode::Internal, Error::code)
}

/// Turn any error into the payload that may be shown to a caller.
///
/// `internal` errors always carry the generic message, even when a lower layer
/// constructed one with more detail.
pub fn render(err: &(dyn StdError + 'static)) -> ErrorBody {
    match find(err) {
        Some(structured) if structured.code != ErrorCode::Internal => structured.body(),
        _ => ErrorBody {
            code: ErrorCode::Internal,
            message: INTERNAL_MESSAGE.to_string(),
        },
    }
}
