//! SQLx error mapping
//!
//! Translates driver errors into the kernel's `StoreError`, keeping the
//! transient/permanent split intact: connection-class failures are
//! retryable, query and decoding failures are not.

use core_kernel::StoreError;

/// Maps a SQLx error to the kernel store error
pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut => StoreError::timeout("connection acquire timed out"),
        sqlx::Error::PoolClosed => StoreError::unavailable("connection pool closed"),
        sqlx::Error::Io(io) => StoreError::unavailable(io.to_string()),
        sqlx::Error::Database(db) => {
            // PostgreSQL error class 08 covers connection exceptions;
            // 57014 is query_canceled (statement timeout).
            match db.code().as_deref() {
                Some(code) if code.starts_with("08") => {
                    StoreError::unavailable(db.message().to_string())
                }
                Some("57014") => StoreError::timeout(db.message().to_string()),
                _ => StoreError::query(db.message().to_string()),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::corrupt(err.to_string())
        }
        _ => StoreError::query(err.to_string()),
    }
}
