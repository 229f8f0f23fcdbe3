use txscope_core::{DatabaseError, TxError};

/// Errors that can occur in the data layer.
#[derive(Debug)]
pub enum DataError {
    NotFound(String),
    /// The session rejected the statement.
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// Raised by the transaction engine.
    Tx(TxError),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates (e.g. `txscope-data-diesel`) to wrap
    /// driver-specific errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    /// The engine error behind a `Tx` variant.
    pub fn tx(&self) -> Option<&TxError> {
        match self {
            DataError::Tx(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Tx(err) => write!(f, "Transaction error: {err}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            DataError::Tx(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TxError> for DataError {
    fn from(err: TxError) -> Self {
        DataError::Tx(err)
    }
}

impl From<DatabaseError> for DataError {
    fn from(err: DatabaseError) -> Self {
        DataError::database(err)
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Other(format!("row serialization failed: {err}"))
    }
}
