//! The propagating error taxonomy of the allocation engine.
//!
//! Most resource-level failures never surface here: a failed exact
//! acquisition falls through the nearest-available and nearest-held phases,
//! and a failed private-pool creation downgrades the session to the shared
//! policy. Only the failures that leave a session unusable escape.

use thiserror::Error;

use crate::client::{SurfaceBindError, VisualError};

/// Errors that can escape an allocation session or a mode transition.
#[derive(Debug, Error)]
pub enum AllocError {
    /// Every fallback phase ran and the session still holds zero cells.
    ///
    /// The session is left empty so the caller can degrade to a
    /// black-and-white rendering instead of aborting.
    #[error("color resource exhausted: session holds no cells to fall back on")]
    ResourceExhausted,

    /// The freshly created private pool could not be bound to the surface.
    #[error("failed to attach color pool to surface")]
    SurfaceBind(#[from] SurfaceBindError),

    /// The display descriptor does not support the requested operation.
    #[error(transparent)]
    Visual(#[from] VisualError),
}
