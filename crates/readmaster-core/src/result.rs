//! Result type aliases for Read Master.

use crate::ReadMasterError;

/// A specialized `Result` type for Read Master operations.
pub type ReadMasterResult<T> = Result<T, ReadMasterError>;
