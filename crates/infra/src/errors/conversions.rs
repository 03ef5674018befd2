//! Conversions from external infrastructure errors into domain errors.

use pomosync_domain::PomoSyncError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub PomoSyncError);

impl From<InfraError> for PomoSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<PomoSyncError> for InfraError {
    fn from(value: PomoSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoPomoSyncError {
    fn into_pomosync(self) -> PomoSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → PomoSyncError */
/* -------------------------------------------------------------------------- */

impl IntoPomoSyncError for SqlError {
    fn into_pomosync(self) -> PomoSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        PomoSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        PomoSyncError::Database("database is locked".into())
                    }
                    // SQLITE_CONSTRAINT_PRIMARYKEY / SQLITE_CONSTRAINT_UNIQUE
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        PomoSyncError::InvalidInput(format!("duplicate record: {message}"))
                    }
                    // SQLITE_CONSTRAINT_CHECK
                    (ErrorCode::ConstraintViolation, 275) => {
                        PomoSyncError::InvalidInput(format!("check constraint failed: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        PomoSyncError::Database("foreign key constraint violation".into())
                    }
                    _ => PomoSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => PomoSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(column, _, cause) => PomoSyncError::Database(format!(
                "failed to convert sqlite value in column {column}: {cause}"
            )),
            RE::InvalidColumnType(_, name, ty) => {
                PomoSyncError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::Utf8Error(_) => {
                PomoSyncError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => PomoSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => PomoSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_pomosync())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → PomoSyncError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(PomoSyncError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → PomoSyncError */
/* -------------------------------------------------------------------------- */

impl IntoPomoSyncError for HttpError {
    fn into_pomosync(self) -> PomoSyncError {
        if self.is_timeout() {
            return PomoSyncError::Delivery("HTTP request timed out".into());
        }

        if self.is_connect() {
            return PomoSyncError::Delivery("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => PomoSyncError::NotFound(message),
                429 => PomoSyncError::Delivery(message),
                400..=499 => PomoSyncError::InvalidInput(message),
                _ => PomoSyncError::Delivery(message),
            };
        }

        PomoSyncError::Delivery(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_pomosync())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
