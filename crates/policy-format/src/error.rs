//! Error types for format detection and parsing
//!
//! Provides error handling for:
//! - Format detection (no factory claims the input)
//! - Syntax errors with line/column positions
//! - Store rejections raised while applying parsed declarations
//! - I/O and loader configuration failures

use policy_store::PolicyError;
use std::path::PathBuf;

/// Errors during format detection, parsing and loading
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// No registered factory recognized the leading bytes
    #[error("unrecognized policy format")]
    FormatUnrecognized,

    /// A format was requested by name but nothing is registered under it
    #[error("no parser registered for format: '{0}'")]
    UnknownFormat(String),

    /// Malformed input
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
        /// What was wrong
        message: String,
    },

    /// The store rejected a parsed declaration (tag clash, cycle, ...)
    #[error("line {line}: {source}")]
    Store {
        /// Line of the rejected declaration
        line: usize,
        /// Store failure
        #[source]
        source: PolicyError,
    },

    /// Store error outside of a specific declaration (include expansion)
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// IO error during read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Error raised while parsing a named file
    #[error("{path}: {source}")]
    File {
        /// File being parsed
        path: PathBuf,
        /// Failure inside the file
        #[source]
        source: Box<ParseError>,
    },

    /// Loader configuration could not be read
    #[error("invalid loader configuration: {0}")]
    Config(String),
}

impl ParseError {
    /// Create syntax error at a position
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the file being parsed
    #[must_use]
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            already @ Self::File { .. } => already,
            other => Self::File {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through file wrappers
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::File { source, .. } => source.root(),
            other => other,
        }
    }

    /// Line/column of a syntax error, if this is one
    #[must_use]
    pub fn position(&self) -> Option<(usize, usize)> {
        match self.root() {
            Self::Syntax { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

/// Result type alias for parse operations
pub type ParseResult<T> = Result<T, ParseError>;
