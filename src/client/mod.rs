//! The resource-client boundary.
//!
//! Everything the engine knows about the shared display resource goes
//! through the [`ResourceClient`] trait. The integrating application
//! implements it against its display-server connection; tests implement it
//! against an in-memory double. Every method is one blocking round trip.

mod visual;

pub use visual::{VisualClass, VisualError, VisualInfo};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Rgb;

/// An opaque reference to a colormap cell owned by the shared resource.
///
/// The resource may coalesce visually identical requests: two different
/// acquisitions can yield the same handle, each carrying its own obligation
/// to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Identifier of a private pool created by [`ResourceClient::create_private_pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u32);

impl PoolId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Identifier of the drawing surface a pool can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(u32);

impl SurfaceId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Which pool a request is directed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolRef {
    /// The display-wide pool shared with every other client.
    Global,
    /// A pool owned exclusively by one session.
    Private(PoolId),
}

impl PoolRef {
    #[inline]
    pub fn is_private(self) -> bool {
        matches!(self, PoolRef::Private(_))
    }
}

/// A granted cell: the handle plus the RGB the resource actually stored.
///
/// The resource is free to round a request to whatever precision the
/// hardware supports, so `actual` is authoritative for all downstream
/// nearest-color bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGrant {
    pub handle: Handle,
    pub actual: Rgb,
}

/// The resource refused to attach a pool to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("resource refused to attach the color pool to the surface")]
pub struct SurfaceBindError;

/// A connection to the shared color resource.
///
/// Acquisition failure is the expected steady state under scarcity, not an
/// exceptional condition, so the acquisition methods return `Option`; the
/// engine reacts with its fallback phases. Only surface binding is a real
/// error.
pub trait ResourceClient {
    /// Request a read-only cell holding exactly `rgb` (the resource may
    /// round it to hardware precision).
    fn try_acquire_exact(&mut self, pool: PoolRef, rgb: Rgb) -> Option<CellGrant>;

    /// Request a read-only share of an existing cell, identified by handle.
    fn try_acquire_closest(&mut self, pool: PoolRef, candidate: Handle) -> Option<CellGrant>;

    /// Request an uninitialized read-write cell.
    fn acquire_writable_cell(&mut self, pool: PoolRef) -> Option<Handle>;

    /// Store `rgb` into a read-write cell this connection owns.
    fn store_color(&mut self, pool: PoolRef, handle: Handle, rgb: Rgb);

    /// Release acquisitions, one per handle listed (a handle appearing
    /// twice was acquired twice and is released twice).
    fn release(&mut self, pool: PoolRef, handles: &[Handle]);

    /// Read up to `max_count` entries currently present in the pool,
    /// whoever owns them.
    fn query_existing_entries(&mut self, pool: PoolRef, max_count: usize) -> Vec<(Handle, Rgb)>;

    /// Create a pool owned exclusively by this connection.
    fn create_private_pool(&mut self) -> Option<PoolId>;

    /// Destroy a private pool and every cell in it.
    fn destroy_private_pool(&mut self, pool: PoolId);

    /// Attach a pool to a drawing surface so the display presents it.
    fn bind_pool_to_surface(
        &mut self,
        pool: PoolRef,
        surface: SurfaceId,
    ) -> Result<(), SurfaceBindError>;
}
