//! Failure taxonomy for the analytics engine and its store collaborators.
//!
//! Every fallible operation in the crate returns [`EngineResult`]. Callers
//! above the engine (the HTTP surface) only look at [`EngineError::kind`];
//! the richer [`NotFoundDiagnostic`] is kept for logs and tests.

use thiserror::Error;

// ---

/// External failure kind, the only thing the surrounding surface branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Store,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::InvalidInput => "BadRequest",
            ErrorKind::Store => "InternalServerError",
        }
    }
}

/// Why a lookup failed. Both variants surface as [`ErrorKind::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundDiagnostic {
    /// The entity does not exist.
    Missing,
    /// The entity exists but is not a child of the claimed parent.
    Mismatch,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{message}")]
    NotFound {
        diagnostic: NotFoundDiagnostic,
        message: String,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    // ---
    pub fn missing(message: impl Into<String>) -> Self {
        EngineError::NotFound {
            diagnostic: NotFoundDiagnostic::Missing,
            message: message.into(),
        }
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        EngineError::NotFound {
            diagnostic: NotFoundDiagnostic::Mismatch,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::Store(_) => ErrorKind::Store,
        }
    }

    pub fn diagnostic(&self) -> Option<NotFoundDiagnostic> {
        match self {
            EngineError::NotFound { diagnostic, .. } => Some(*diagnostic),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        // ---
        // 23505 unique_violation, 23503 foreign_key_violation
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                Some("23505") => return EngineError::Conflict(db.message().to_string()),
                Some("23503") => return EngineError::missing(db.message().to_string()),
                _ => {}
            }
        }
        if let sqlx::Error::RowNotFound = err {
            return EngineError::missing("Row not found");
        }
        EngineError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn mismatch_is_externally_not_found() {
        // ---
        let missing = EngineError::missing("Gateway with id 'gw-1' not found");
        let mismatch = EngineError::mismatch("Gateway gw-1 does not belong to network NET01");

        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(mismatch.kind(), ErrorKind::NotFound);
        assert_eq!(missing.diagnostic(), Some(NotFoundDiagnostic::Missing));
        assert_eq!(mismatch.diagnostic(), Some(NotFoundDiagnostic::Mismatch));
    }

    #[test]
    fn message_is_displayed_verbatim() {
        // ---
        let err = EngineError::Conflict("Measurement already exists".to_string());
        assert_eq!(err.to_string(), "Measurement already exists");
        assert_eq!(err.kind().as_str(), "ConflictError");
        assert_eq!(err.diagnostic(), None);
    }

    #[test]
    fn row_not_found_maps_to_missing() {
        // ---
        let err: EngineError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.diagnostic(), Some(NotFoundDiagnostic::Missing));
    }
}
