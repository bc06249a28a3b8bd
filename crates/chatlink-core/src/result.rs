//! Convenience result type alias for chatlink.

use crate::error::AppError;

/// A specialized `Result` type for chatlink operations.
pub type AppResult<T> = Result<T, AppError>;
