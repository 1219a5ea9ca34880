//! Error types for variable lookup, resolution and define loading.
//!
//! Malformed references and bad array indices are not errors: the parser and
//! resolver degrade them to the verbatim reference text.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`ConfigVarStack`](crate::stack::ConfigVarStack) and
/// [`ConfigVar`](crate::var::ConfigVar) operations.
#[derive(Debug, Error)]
pub enum VarError {
    /// Name absent from every scope and no default supplied.
    #[error("variable '{name}' is not defined")]
    NotFound { name: String },

    /// A variable was reached again while its own values were being resolved.
    /// `chain` holds every name on the resolve-stack followed by the repeat.
    #[error("circular reference: {}", .chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    /// A value of unsupported shape was handed to `append`/`extend`.
    #[error("variable '{name}' cannot hold a {found} value")]
    Type { name: String, found: &'static str },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VarError {
    pub(crate) fn not_found(name: &str) -> Self {
        VarError::NotFound { name: name.to_owned() }
    }
}

/// A non-fatal problem found while reading a define document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct DefineError {
    pub line: usize,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, VarError>;

// ── Tests ─────────────────────────────────────────────────────────────────────
