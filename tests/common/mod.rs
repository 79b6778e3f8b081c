//! Common test infrastructure for cellmap integration tests.
//!
//! Each test file compiles its own copy of this module, so items may appear
//! unused from the perspective of a single test file even though they're
//! used elsewhere.

#![allow(dead_code)]

use cellmap::{
    CellGrant, Handle, PoolId, PoolRef, ResourceClient, Rgb, SurfaceBindError, SurfaceId,
};

/// One cell of a fake pool. Read-only cells coalesce by RGB with a
/// reference count, like a display server's shared colormap.
#[derive(Debug, Clone)]
struct FakeCell {
    rgb: Rgb,
    refs: u32,
    writable: bool,
}

#[derive(Debug)]
struct FakePool {
    capacity: usize,
    slots: Vec<Option<FakeCell>>,
}

impl FakePool {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
        }
    }

    fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn total_refs(&self) -> u32 {
        self.slots
            .iter()
            .flatten()
            .map(|cell| cell.refs)
            .sum()
    }

    fn free_slot(&mut self) -> Option<usize> {
        if let Some(index) = self.slots.iter().position(|slot| slot.is_none()) {
            return Some(index);
        }
        if self.slots.len() < self.capacity {
            self.slots.push(None);
            return Some(self.slots.len() - 1);
        }
        None
    }

    fn acquire_exact(&mut self, rgb: Rgb) -> Option<CellGrant> {
        // Coalesce with an existing read-only cell of the same color.
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(cell) = slot {
                if !cell.writable && cell.rgb == rgb {
                    cell.refs += 1;
                    return Some(CellGrant {
                        handle: Handle::new(index as u32),
                        actual: rgb,
                    });
                }
            }
        }
        let index = self.free_slot()?;
        self.slots[index] = Some(FakeCell {
            rgb,
            refs: 1,
            writable: false,
        });
        Some(CellGrant {
            handle: Handle::new(index as u32),
            actual: rgb,
        })
    }

    fn acquire_closest(&mut self, candidate: Handle) -> Option<CellGrant> {
        let cell = self.slots.get_mut(candidate.raw() as usize)?.as_mut()?;
        if cell.writable {
            return None;
        }
        cell.refs += 1;
        Some(CellGrant {
            handle: candidate,
            actual: cell.rgb,
        })
    }

    fn acquire_writable(&mut self) -> Option<Handle> {
        let index = self.free_slot()?;
        self.slots[index] = Some(FakeCell {
            rgb: Rgb::BLACK,
            refs: 1,
            writable: true,
        });
        Some(Handle::new(index as u32))
    }

    fn store(&mut self, handle: Handle, rgb: Rgb) {
        if let Some(Some(cell)) = self.slots.get_mut(handle.raw() as usize) {
            assert!(cell.writable, "stored into a read-only cell");
            cell.rgb = rgb;
        }
    }

    fn release(&mut self, handles: &[Handle]) {
        for handle in handles {
            let slot = self
                .slots
                .get_mut(handle.raw() as usize)
                .expect("released an unknown handle");
            let cell = slot.as_mut().expect("released a free cell");
            cell.refs -= 1;
            if cell.refs == 0 {
                *slot = None;
            }
        }
    }

    fn query(&self, max_count: usize) -> Vec<(Handle, Rgb)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .map(|cell| (Handle::new(index as u32), cell.rgb))
            })
            .take(max_count)
            .collect()
    }
}

/// In-memory stand-in for the shared display resource.
///
/// Counts every trait call so tests can assert "no resource round trips",
/// and tracks reference counts so they can assert exactly-once release.
pub struct FakeDisplay {
    global: FakePool,
    private: Vec<(FakePool, bool)>,
    preseeded_refs: u32,

    /// Whether `create_private_pool` succeeds.
    pub allow_private: bool,
    /// Capacity given to newly created private pools.
    pub private_capacity: usize,
    /// Whether `acquire_writable_cell` always fails.
    pub refuse_writable: bool,
    /// Whether `bind_pool_to_surface` always fails.
    pub fail_bind: bool,

    /// Total trait-method invocations.
    pub calls: usize,
    /// `create_private_pool` invocations.
    pub create_attempts: usize,
    /// Successful bindings, in order.
    pub bindings: Vec<(PoolRef, SurfaceId)>,
}

impl FakeDisplay {
    pub fn new(global_capacity: usize) -> Self {
        Self {
            global: FakePool::new(global_capacity),
            private: Vec::new(),
            preseeded_refs: 0,
            allow_private: true,
            private_capacity: 256,
            refuse_writable: false,
            fail_bind: false,
            calls: 0,
            create_attempts: 0,
            bindings: Vec::new(),
        }
    }

    /// Occupy cells on behalf of "other clients" before the test runs.
    pub fn preseed(&mut self, colors: &[Rgb]) {
        for &rgb in colors {
            self.global
                .acquire_exact(rgb)
                .expect("preseed exceeded capacity");
            self.preseeded_refs += 1;
        }
    }

    /// Acquisitions currently held by the code under test (preseeds
    /// excluded), across the global pool and all live private pools.
    pub fn outstanding(&self) -> u32 {
        let private: u32 = self
            .private
            .iter()
            .filter(|(_, destroyed)| !destroyed)
            .map(|(pool, _)| pool.total_refs())
            .sum();
        self.global.total_refs() - self.preseeded_refs + private
    }

    pub fn global_occupied(&self) -> usize {
        self.global.occupied()
    }

    pub fn private_pools_created(&self) -> usize {
        self.private.len()
    }

    pub fn private_pool_destroyed(&self, pool: PoolId) -> bool {
        self.private[pool.raw() as usize].1
    }

    pub fn private_pool_occupied(&self, pool: PoolId) -> usize {
        self.private[pool.raw() as usize].0.occupied()
    }

    fn pool_mut(&mut self, pool: PoolRef) -> &mut FakePool {
        match pool {
            PoolRef::Global => &mut self.global,
            PoolRef::Private(id) => {
                let (pool, destroyed) = &mut self.private[id.raw() as usize];
                assert!(!*destroyed, "used a destroyed private pool");
                pool
            }
        }
    }
}

impl ResourceClient for FakeDisplay {
    fn try_acquire_exact(&mut self, pool: PoolRef, rgb: Rgb) -> Option<CellGrant> {
        self.calls += 1;
        self.pool_mut(pool).acquire_exact(rgb)
    }

    fn try_acquire_closest(&mut self, pool: PoolRef, candidate: Handle) -> Option<CellGrant> {
        self.calls += 1;
        self.pool_mut(pool).acquire_closest(candidate)
    }

    fn acquire_writable_cell(&mut self, pool: PoolRef) -> Option<Handle> {
        self.calls += 1;
        if self.refuse_writable {
            return None;
        }
        self.pool_mut(pool).acquire_writable()
    }

    fn store_color(&mut self, pool: PoolRef, handle: Handle, rgb: Rgb) {
        self.calls += 1;
        self.pool_mut(pool).store(handle, rgb);
    }

    fn release(&mut self, pool: PoolRef, handles: &[Handle]) {
        self.calls += 1;
        self.pool_mut(pool).release(handles);
    }

    fn query_existing_entries(&mut self, pool: PoolRef, max_count: usize) -> Vec<(Handle, Rgb)> {
        self.calls += 1;
        self.pool_mut(pool).query(max_count)
    }

    fn create_private_pool(&mut self) -> Option<PoolId> {
        self.calls += 1;
        self.create_attempts += 1;
        if !self.allow_private {
            return None;
        }
        let id = PoolId::new(self.private.len() as u32);
        self.private
            .push((FakePool::new(self.private_capacity), false));
        Some(id)
    }

    fn destroy_private_pool(&mut self, pool: PoolId) {
        self.calls += 1;
        let (pool, destroyed) = &mut self.private[pool.raw() as usize];
        pool.slots.clear();
        *destroyed = true;
    }

    fn bind_pool_to_surface(
        &mut self,
        pool: PoolRef,
        surface: SurfaceId,
    ) -> Result<(), SurfaceBindError> {
        self.calls += 1;
        if self.fail_bind {
            return Err(SurfaceBindError);
        }
        self.bindings.push((pool, surface));
        Ok(())
    }
}

/// Opt into log output with `RUST_LOG=cellmap=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// A palette of `n` clearly distinct colors.
pub fn distinct_colors(n: usize) -> Vec<Rgb> {
    (0..n)
        .map(|i| {
            Rgb::new(
                (i * 7 % 256) as u8,
                (i * 31 % 256) as u8,
                (i * 97 % 256) as u8,
            )
        })
        .collect()
}
