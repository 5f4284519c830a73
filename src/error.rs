use thiserror::Error;

pub type Result<T, E = BenchError> = core::result::Result<T, E>;

/// Failure to turn one log line into a [`crate::record::BenchmarkRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    TooFewFields {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: expected {expected} fields, found {found}; wrong schema?")]
    TooManyFields {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: does not start with `|`")]
    MissingLeadingDelimiter { line: usize },
    #[error("line {line}: field `{field}` is not a valid {kind}: {value:?}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        kind: &'static str,
        value: String,
    },
}

impl ParseError {
    /// Re-anchor the error at a line number within a file.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            ParseError::TooFewFields {
                expected, found, ..
            } => ParseError::TooFewFields {
                line,
                expected,
                found,
            },
            ParseError::TooManyFields {
                expected, found, ..
            } => ParseError::TooManyFields {
                line,
                expected,
                found,
            },
            ParseError::MissingLeadingDelimiter { .. } => {
                ParseError::MissingLeadingDelimiter { line }
            }
            ParseError::InvalidNumber {
                field, kind, value, ..
            } => ParseError::InvalidNumber {
                line,
                field,
                kind,
                value,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("signature library unavailable: {0}")]
    LibraryUnavailable(String),

    #[error("unknown scheme: {0}")]
    UnknownScheme(String),

    #[error("failed to instantiate scheme {0}")]
    InstantiationFailed(String),

    #[error("key generation failed for {scheme} (status {status})")]
    KeygenFailed { scheme: String, status: i32 },

    #[error("signing failed for {scheme} (status {status})")]
    SignFailed { scheme: String, status: i32 },

    #[error("verification failed for {scheme} (status {status})")]
    VerifyFailed { scheme: String, status: i32 },

    #[error("corrupted signature was accepted by {0}")]
    CorruptSignatureAccepted(String),

    #[error("{path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("config: {0}")]
    Config(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors local to one (scheme, size) scenario. Everything else aborts a sweep.
    pub fn is_scenario_local(&self) -> bool {
        matches!(
            self,
            BenchError::UnknownScheme(_)
                | BenchError::InstantiationFailed(_)
                | BenchError::KeygenFailed { .. }
                | BenchError::SignFailed { .. }
                | BenchError::VerifyFailed { .. }
                | BenchError::CorruptSignatureAccepted(_)
        )
    }
}
