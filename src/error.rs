use std::fmt;

// ---------------------------------------------------------------------------
// Crate error type
// ---------------------------------------------------------------------------

/// Errors raised by the entry model, the unit registry and the loaders.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A unit string that does not parse into a known dimension.
    #[error("unrecognized unit '{0}'")]
    UnrecognizedUnit(String),

    /// Two units that belong to different physical dimensions.
    #[error("cannot convert '{from}' ({from_dimension}) to '{to}' ({to_dimension})")]
    IncompatibleUnits {
        from: String,
        to: String,
        from_dimension: String,
        to_dimension: String,
    },

    /// A field name that is not part of the entry's table.
    #[error("no field named '{name}' in entry '{identifier}'")]
    UnknownField { identifier: String, name: String },

    /// No electrode with this name or function in the entry's system.
    #[error("electrode with name '{name}' does not exist in entry '{identifier}'")]
    ElectrodeNotFound { identifier: String, name: String },

    /// No entry with this identifier in the collection.
    #[error("no database entry with identifier '{0}'")]
    EntryNotFound(String),

    /// A filter predicate failed on one of the entries.
    #[error(transparent)]
    FilterEvaluation(#[from] FilterEvaluationError),

    /// Malformed metadata or tabular data at construction time.
    #[error("schema error: {0}")]
    Schema(String),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow conversion error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl Error {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Filter failures
// ---------------------------------------------------------------------------

/// A predicate passed to [`EntryCollection::filter`](crate::EntryCollection::filter)
/// returned an error for the entry `identifier`.
#[derive(Debug)]
pub struct FilterEvaluationError {
    identifier: String,
    cause: anyhow::Error,
}

impl FilterEvaluationError {
    pub(crate) fn new(identifier: impl Into<String>, cause: anyhow::Error) -> Self {
        Self {
            identifier: identifier.into(),
            cause,
        }
    }

    /// Identifier of the entry the predicate failed on.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The error returned by the predicate.
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

impl fmt::Display for FilterEvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "filter predicate failed on entry '{}': {}",
            self.identifier, self.cause
        )
    }
}

impl std::error::Error for FilterEvaluationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}
