//! The allocation session: scarce-cell negotiation with exact-once release.
//!
//! An [`AllocationSession`] owns everything one negotiation pass acquires
//! from the resource: the per-color results, the handle ledger, and the
//! private pool if one was created. It borrows the [`ResourceClient`] only
//! for the duration of each call, so the integrating application keeps
//! ownership of its connection.
//!
//! The read-only policy negotiates in three phases (exact, then
//! nearest-available, then nearest-held); the read-write policy negotiates
//! uninitialized writable cells and stores colors into them. Both live in
//! their own submodules; the shared bookkeeping lives here.

mod readonly;
mod readwrite;

use serde::{Deserialize, Serialize};

use crate::client::{CellGrant, Handle, PoolRef, ResourceClient, SurfaceId};
use crate::color::Rgb;
use crate::error::AllocError;
use crate::progress::ProgressSink;

/// One logical palette entry tracked by a session.
#[derive(Debug, Clone, Copy)]
pub struct LogicalColor {
    /// What the caller asked for.
    pub desired: Rgb,
    /// What the display will actually show. Equals `desired` until a
    /// negotiation pass substitutes something nearer-available.
    pub displayed: Rgb,
    /// The cell backing this color; `None` until allocated.
    pub handle: Option<Handle>,
    /// Linked-cell group id; 0 means ungrouped.
    pub group: u16,
}

impl LogicalColor {
    fn new(desired: Rgb) -> Self {
        Self {
            desired,
            displayed: desired,
            handle: None,
            group: 0,
        }
    }
}

/// Policy knobs for one allocation session.
///
/// # Example
///
/// ```
/// use cellmap::AllocPolicy;
///
/// let policy = AllocPolicy::new().allow_private_pool(true).writable(true);
/// assert!(policy.allow_private_pool);
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AllocPolicy {
    /// Escalate to a private pool when the active pool refuses a request.
    /// Once the escalation happens, the whole session restarts against the
    /// private pool. Default: `false`.
    pub allow_private_pool: bool,

    /// Negotiate read-write cells instead of read-only shares. Required for
    /// live palette editing. Default: `false`.
    pub writable: bool,
}

impl AllocPolicy {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn allow_private_pool(mut self, allow: bool) -> Self {
        self.allow_private_pool = allow;
        self
    }

    #[inline]
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }
}

/// The pool and acquisitions a session (or the standard cube) currently owns.
///
/// Releasing drains the ledger, so calling [`release`](Holdings::release)
/// twice in a row is a no-op the second time. A private pool is torn down
/// with a single call; global-pool acquisitions are returned one per entry,
/// duplicates included (the resource counts acquisitions, not handles).
#[derive(Debug, Default)]
pub struct Holdings {
    pool: Option<PoolRef>,
    handles: Vec<Handle>,
}

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pool requests are currently directed at.
    #[inline]
    pub fn pool(&self) -> PoolRef {
        self.pool.unwrap_or(PoolRef::Global)
    }

    /// Number of acquisitions currently held (not distinct handles).
    #[inline]
    pub fn held_count(&self) -> usize {
        self.handles.len()
    }

    /// Number of distinct handles held; the pool may have coalesced
    /// visually identical requests.
    pub fn unique_count(&self) -> usize {
        let mut sorted: Vec<Handle> = self.handles.clone();
        sorted.sort_unstable();
        sorted.dedup();
        sorted.len()
    }

    pub(crate) fn push(&mut self, handle: Handle) {
        self.handles.push(handle);
    }

    pub(crate) fn set_pool(&mut self, pool: PoolRef) {
        self.pool = Some(pool);
    }

    /// Release everything held: the whole private pool in one call, or each
    /// global-pool acquisition individually. Idempotent.
    pub fn release<C: ResourceClient>(&mut self, client: &mut C) {
        match self.pool.take() {
            Some(PoolRef::Private(pool)) => {
                tracing::debug!(held = self.handles.len(), "destroying private pool");
                client.destroy_private_pool(pool);
            }
            _ => {
                if !self.handles.is_empty() {
                    tracing::debug!(held = self.handles.len(), "releasing global-pool cells");
                    client.release(PoolRef::Global, &self.handles);
                }
            }
        }
        self.handles.clear();
    }

    /// Drop the ledger without talking to the resource. Only for callers
    /// that know the resource-side state is already gone.
    pub(crate) fn forget(&mut self) {
        self.pool = None;
        self.handles.clear();
    }
}

/// Counters and status strings for one completed allocation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocReport {
    /// Colors whose displayed RGB equals the desired RGB.
    pub exact: usize,
    /// Colors substituted with a nearby RGB (nearest-available or
    /// nearest-held).
    pub close: usize,
    /// Colors the session was asked for.
    pub total: usize,
    /// Distinct handles held after the pass.
    pub unique: usize,
    /// Whether the pass ended up on a private pool.
    pub private_pool: bool,
}

impl AllocReport {
    /// One-line summary for the status bar.
    pub fn status(&self) -> String {
        if self.total == 0 {
            "No colors allocated; using black and white only".to_string()
        } else {
            format!(
                "Got {} of {} colors ({} unique)",
                self.exact, self.total, self.unique
            )
        }
    }

    /// Substitution summary, present only when something was substituted.
    pub fn close_status(&self) -> Option<String> {
        if self.close == 0 {
            None
        } else {
            let plural = if self.close == 1 { "" } else { "s" };
            Some(format!("Got {} close color{}", self.close, plural))
        }
    }
}

/// One negotiation pass against the shared color resource.
///
/// Construct a session per decoded image (or per palette edit), run
/// [`allocate`](Self::allocate) once, read the per-color results, and
/// [`release`](Self::release) before the next session starts. All session
/// state (results, counters, the handle ledger) lives in this struct, so
/// dropping it after release leaves nothing dangling.
pub struct AllocationSession {
    surface: SurfaceId,
    policy: AllocPolicy,
    cells: Vec<LogicalColor>,
    /// logical index -> index of the cell actually backing it. Identity
    /// until group sharing or nearest-held fallback makes cells share.
    backing: Vec<usize>,
    holdings: Holdings,
    /// Private-pool creation already failed once; do not ask again.
    pool_denied: bool,
    /// The session owns writable cells (a read-write pass completed without
    /// falling back to read-only).
    writable_cells: bool,
    exact: usize,
    close: usize,
}

impl AllocationSession {
    /// Create a session for the given desired colors (ungrouped). At most
    /// 256 colors; an indexed display cannot address more.
    pub fn new(surface: SurfaceId, policy: AllocPolicy, desired: &[Rgb]) -> Self {
        debug_assert!(desired.len() <= 256);
        let cells: Vec<LogicalColor> = desired.iter().map(|&rgb| LogicalColor::new(rgb)).collect();
        let backing = (0..cells.len()).collect();
        Self {
            surface,
            policy,
            cells,
            backing,
            holdings: Holdings::new(),
            pool_denied: false,
            writable_cells: false,
            exact: 0,
            close: 0,
        }
    }

    /// Attach linked-cell group ids, one per color; 0 means ungrouped.
    /// Members of a group must carry identical desired RGB values.
    pub fn with_groups(mut self, groups: &[u16]) -> Self {
        debug_assert_eq!(groups.len(), self.cells.len());
        for (cell, &group) in self.cells.iter_mut().zip(groups) {
            cell.group = group;
        }
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Per-color results of the last pass.
    #[inline]
    pub fn cells(&self) -> &[LogicalColor] {
        &self.cells
    }

    /// The `logical index -> backing index` remap recorded by group sharing
    /// and nearest-held fallback.
    #[inline]
    pub fn backing(&self) -> &[usize] {
        &self.backing
    }

    #[inline]
    pub fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    /// Counters for the last pass.
    pub fn report(&self) -> AllocReport {
        AllocReport {
            exact: self.exact,
            close: self.close,
            total: self.cells.len(),
            unique: self.holdings.unique_count(),
            private_pool: self.holdings.pool().is_private(),
        }
    }

    /// Negotiate cells for every color, in `order` (a permutation of the
    /// color indices) or index order when `None`.
    ///
    /// Runs each phase exactly once per color. A session holding cells from
    /// an earlier pass releases them first, so re-allocating cannot leak.
    ///
    /// # Errors
    ///
    /// [`AllocError::ResourceExhausted`] when every phase failed and the
    /// session holds nothing to fall back on; [`AllocError::SurfaceBind`]
    /// when a freshly created private pool cannot be attached to the
    /// surface. Either way the session holds nothing afterwards.
    pub fn allocate<C: ResourceClient>(
        &mut self,
        client: &mut C,
        order: Option<&[usize]>,
        progress: &mut dyn ProgressSink,
    ) -> Result<AllocReport, AllocError> {
        self.release(client);

        if self.cells.is_empty() {
            tracing::debug!("no colors to allocate; black and white only");
            return Ok(self.report());
        }

        let index_order: Vec<usize>;
        let order = match order {
            Some(order) => {
                debug_assert_eq!(order.len(), self.cells.len());
                order
            }
            None => {
                index_order = (0..self.cells.len()).collect();
                &index_order
            }
        };

        let result = if self.policy.writable {
            self.allocate_readwrite(client, order, progress)
        } else {
            self.allocate_readonly(client, order, progress)
        };

        if let Err(error) = result {
            tracing::warn!(%error, "allocation pass failed");
            self.release(client);
            return Err(error);
        }

        let report = self.report();
        tracing::info!(
            exact = report.exact,
            close = report.close,
            total = report.total,
            unique = report.unique,
            private_pool = report.private_pool,
            "allocation pass complete"
        );
        Ok(report)
    }

    /// Store a new color into a writable cell, keeping every logical color
    /// backed by that cell in sync. No-op for read-only sessions and for
    /// colors that never obtained a cell.
    pub fn recolor<C: ResourceClient>(&mut self, client: &mut C, index: usize, rgb: Rgb) {
        if !self.writable_cells || index >= self.cells.len() {
            return;
        }
        let backing = self.backing[index];
        let Some(handle) = self.cells[backing].handle else {
            return;
        };
        client.store_color(self.holdings.pool(), handle, rgb);
        for i in 0..self.cells.len() {
            if self.backing[i] == backing {
                self.cells[i].desired = rgb;
                self.cells[i].displayed = rgb;
            }
        }
    }

    /// Return every acquisition to the resource. Idempotent; the per-color
    /// handles are cleared along with the ledger.
    pub fn release<C: ResourceClient>(&mut self, client: &mut C) {
        self.holdings.release(client);
        self.reset_cells();
    }

    /// Hand the ledger to a caller that takes over ownership of the cells
    /// (the standard cube does this). The session is left empty.
    pub(crate) fn take_holdings(&mut self) -> Holdings {
        std::mem::take(&mut self.holdings)
    }

    /// Drop all bookkeeping without resource calls; for callers that know
    /// the server-side state is already gone.
    pub(crate) fn forget(&mut self) {
        self.holdings.forget();
        self.reset_cells();
    }

    fn reset_cells(&mut self) {
        for (i, cell) in self.cells.iter_mut().enumerate() {
            cell.handle = None;
            cell.displayed = cell.desired;
            self.backing[i] = i;
        }
        self.exact = 0;
        self.close = 0;
        self.writable_cells = false;
    }

    /// Record a grant for one logical color and classify it for reporting.
    fn grant_cell(&mut self, index: usize, grant: CellGrant) {
        self.holdings.push(grant.handle);
        let cell = &mut self.cells[index];
        cell.handle = Some(grant.handle);
        cell.displayed = grant.actual;
        if grant.actual == cell.desired {
            self.exact += 1;
        } else {
            self.close += 1;
        }
    }

    /// Release phase-1 grants and start over; used when a private pool is
    /// created mid-pass so every color is serviced from the new pool.
    fn rewind<C: ResourceClient>(&mut self, client: &mut C) {
        self.holdings.release(client);
        self.reset_cells();
    }

    /// Whether a refused request may escalate to a private pool.
    fn can_escalate(&self) -> bool {
        self.policy.allow_private_pool && !self.holdings.pool().is_private() && !self.pool_denied
    }

    /// Map every still-pending color to the nearest cell the session
    /// already backs, recording the share in the backing remap. The one
    /// unrecoverable case is a session that holds nothing at all.
    fn resolve_pending_nearest_held(&mut self, pending: &[usize]) -> Result<(), AllocError> {
        if pending.is_empty() {
            return Ok(());
        }
        let owners: Vec<usize> = (0..self.cells.len())
            .filter(|&i| self.backing[i] == i && self.cells[i].handle.is_some())
            .collect();
        if owners.is_empty() {
            return Err(AllocError::ResourceExhausted);
        }
        for &index in pending {
            let desired = self.cells[index].desired;
            let mut best = owners[0];
            let mut best_dist = u32::MAX;
            for &owner in &owners {
                let d = self.cells[owner].displayed.distance_squared(desired);
                if d < best_dist {
                    best = owner;
                    best_dist = d;
                }
            }
            let (handle, displayed) = (self.cells[best].handle, self.cells[best].displayed);
            let cell = &mut self.cells[index];
            cell.handle = handle;
            cell.displayed = displayed;
            self.backing[index] = best;
            if displayed == desired {
                self.exact += 1;
            } else {
                self.close += 1;
            }
        }
        tracing::debug!(shared = pending.len(), "mapped leftovers onto held cells");
        Ok(())
    }
}
