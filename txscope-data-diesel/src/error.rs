use txscope_core::DatabaseError;
use txscope_data::DataError;

/// Conversions from diesel errors into txscope error types.
pub trait DieselErrorExt {
    fn into_data_error(self) -> DataError;

    fn into_database_error(self) -> DatabaseError;
}

impl DieselErrorExt for diesel::result::Error {
    fn into_data_error(self) -> DataError {
        match &self {
            diesel::result::Error::NotFound => DataError::NotFound("Row not found".into()),
            _ => DataError::database(self),
        }
    }

    fn into_database_error(self) -> DatabaseError {
        DatabaseError::from_source(self)
    }
}

impl DieselErrorExt for diesel::r2d2::PoolError {
    fn into_data_error(self) -> DataError {
        DataError::database(self)
    }

    fn into_database_error(self) -> DatabaseError {
        DatabaseError::from_source(self)
    }
}
