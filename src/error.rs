// Error types for ray batch misuse.

use thiserror::Error;

/// Result alias for ray batch operations.
pub type RayBatchResult<T> = Result<T, RayBatchError>;

/// Misuse of a [`RayBatch`](crate::ray_batch::RayBatch).
///
/// None of these ever reach the caller of a detonation; the confined blast logs them and
/// falls back to a static-only emission.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RayBatchError {
    /// A schedule is still outstanding; `complete()` must be called first.
    #[error("ray batch already has an outstanding schedule")]
    AlreadyScheduled,

    /// `complete()` was called with nothing scheduled.
    #[error("ray batch has no outstanding schedule to complete")]
    NotScheduled,

    /// The batch buffers were released and can no longer be used.
    #[error("ray batch buffers were released")]
    Released,
}
