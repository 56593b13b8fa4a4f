//! Typed error model for token expansion.
//!
//! ```text
//! construction → InvalidArgument
//! expansion    → Tokenization { reason: TokenMissing | TokenUnknown
//!                                       | FunctionException | LogicalPropertyExpansionFailed }
//! evaluation   → StrategyError   (wrapped by FunctionException)
//! path hop     → PathError       (wrapped by LogicalPropertyExpansionFailed)
//! members      → ResolutionError
//! ```

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Boxed cause carried by strategy callbacks.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// TokenError
// ---------------------------------------------------------------------------

/// Errors surfaced by [`crate::Tokenizer`].
#[derive(Debug, Error)]
pub enum TokenError {
    /// A required constructor argument was unusable.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// Strict-mode expansion aborted on the first unresolvable token.
    #[error("tokenization failed for '{matched}': {reason}")]
    Tokenization {
        matched: String,
        #[source]
        reason: FailureReason,
    },
}

impl TokenError {
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The matched `${...}` text, for tokenization failures.
    pub fn matched(&self) -> Option<&str> {
        match self {
            Self::Tokenization { matched, .. } => Some(matched),
            Self::InvalidArgument { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Tokenization { reason, .. } => Some(reason),
            Self::InvalidArgument { .. } => None,
        }
    }
}

/// Why a single token could not be expanded.
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("token missing")]
    TokenMissing,

    #[error("token unknown")]
    TokenUnknown,

    #[error("function exception {{{0}}}")]
    FunctionException(#[source] StrategyError),

    #[error("logical property expansion failed {{{0}}}")]
    LogicalPropertyExpansionFailed(#[source] PathError),
}

impl FailureReason {
    /// Short tag for log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::TokenMissing => "token missing",
            Self::TokenUnknown => "token unknown",
            Self::FunctionException(_) => "function exception",
            Self::LogicalPropertyExpansionFailed(_) => "logical property expansion failed",
        }
    }
}

// ---------------------------------------------------------------------------
// StrategyError
// ---------------------------------------------------------------------------

/// The single error kind produced by every [`crate::TokenReplacement`].
#[derive(Debug)]
pub struct StrategyError {
    message: String,
    source: Option<BoxError>,
}

impl StrategyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying cause, keeping it reachable through `source()`.
    pub fn wrap(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

impl StdError for StrategyError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// ---------------------------------------------------------------------------
// PathError
// ---------------------------------------------------------------------------

/// A logical property hop that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{segment}' not found in '{path}'")]
pub struct PathError {
    /// Segment that failed.
    pub segment: String,
    /// Full dotted path being walked.
    pub path: String,
}

// ---------------------------------------------------------------------------
// ResolutionError
// ---------------------------------------------------------------------------

/// Member registry validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("type '{type_name}' is not registered")]
    UnknownType { type_name: String },

    #[error("type '{type_name}' has no member '{member}'")]
    UnknownMember { type_name: String, member: String },

    #[error("member '{type_name}.{member}' is not public")]
    NotPublic { type_name: String, member: String },

    #[error("member '{type_name}.{member}' is not static")]
    NotStatic { type_name: String, member: String },

    #[error("member '{type_name}.{member}' is a {actual}, expected a {expected}")]
    KindMismatch {
        type_name: String,
        member: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("method '{type_name}.{member}' takes {expected} parameter(s), {actual} given")]
    ParameterCount {
        type_name: String,
        member: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "method '{type_name}.{member}' parameter {index} is {expected}, {actual} given"
    )]
    ParameterType {
        type_name: String,
        member: String,
        index: usize,
        expected: String,
        actual: String,
    },
}
