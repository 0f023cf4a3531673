//! Error types for pool operations.

use std::fmt;

/// Errors that can occur during pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// `init` was called while the process-wide registry is already up.
    AlreadyInitialized,

    /// An operation was attempted before `init` (or after `shutdown`).
    NotInitialized,

    /// Backing or bookkeeping storage could not be acquired.
    OutOfMemory,

    /// Unknown or stale pool reference. A handle becomes stale once its
    /// pool is closed, even if the registry slot is later reused.
    InvalidHandle,

    /// `close` was attempted on a pool with live allocations or more than
    /// one gap.
    PoolNotEmpty,

    /// No free segment large enough to satisfy the request.
    NoFit,

    /// `free` was called with a handle that does not refer to a currently
    /// allocated segment of the pool.
    InvalidAllocation,

    /// A zero-size `open` or `allocate` request.
    InvalidRequest,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "already initialized"),
            Self::NotInitialized => write!(f, "not initialized"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::InvalidHandle => write!(f, "invalid pool handle"),
            Self::PoolNotEmpty => write!(f, "pool not empty"),
            Self::NoFit => write!(f, "no sufficient gap"),
            Self::InvalidAllocation => write!(f, "invalid allocation handle"),
            Self::InvalidRequest => write!(f, "invalid zero-size request"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_all_variants() {
        assert_eq!(
            format!("{}", PoolError::AlreadyInitialized),
            "already initialized"
        );
        assert_eq!(format!("{}", PoolError::NotInitialized), "not initialized");
        assert_eq!(format!("{}", PoolError::OutOfMemory), "out of memory");
        assert_eq!(
            format!("{}", PoolError::InvalidHandle),
            "invalid pool handle"
        );
        assert_eq!(format!("{}", PoolError::PoolNotEmpty), "pool not empty");
        assert_eq!(format!("{}", PoolError::NoFit), "no sufficient gap");
        assert_eq!(
            format!("{}", PoolError::InvalidAllocation),
            "invalid allocation handle"
        );
        assert_eq!(
            format!("{}", PoolError::InvalidRequest),
            "invalid zero-size request"
        );
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_error<E: std::error::Error>(_: E) {}
        assert_error(PoolError::NoFit);
    }
}
