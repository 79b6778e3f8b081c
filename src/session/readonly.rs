//! The three-phase read-only negotiation.

use crate::client::{PoolRef, ResourceClient};
use crate::error::AllocError;
use crate::progress::{ProgressSink, PROGRESS_INTERVAL};

use super::AllocationSession;

/// Most entries a pool is asked to enumerate in the nearest-available phase.
const MAX_POOL_QUERY: usize = 256;

impl AllocationSession {
    /// Read-only policy: exact requests first, then read-only shares of the
    /// nearest entries already in the pool, then sharing the session's own
    /// cells. Escalates to a private pool mid-pass when the policy allows.
    pub(super) fn allocate_readonly<C: ResourceClient>(
        &mut self,
        client: &mut C,
        order: &[usize],
        progress: &mut dyn ProgressSink,
    ) -> Result<(), AllocError> {
        let pending = self.phase_exact(client, order, progress)?;
        let pending = self.phase_nearest_available(client, pending);
        self.resolve_pending_nearest_held(&pending)
    }

    /// Phase 1: one exact request per color, in priority order.
    ///
    /// When the active pool refuses a request and the policy permits, the
    /// session escalates: everything granted so far is released, a private
    /// pool is created and bound to the surface, and the pass restarts from
    /// the top so *all* colors are serviced from the new pool. The restart
    /// can happen at most once; a private pool never escalates further.
    fn phase_exact<C: ResourceClient>(
        &mut self,
        client: &mut C,
        order: &[usize],
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<usize>, AllocError> {
        let total = order.len();
        'negotiate: loop {
            let mut pending = Vec::new();
            for (step, &index) in order.iter().enumerate() {
                if step % PROGRESS_INTERVAL == 0 {
                    progress.checkpoint(step, total);
                }
                let desired = self.cells[index].desired;
                if let Some(grant) = client.try_acquire_exact(self.holdings.pool(), desired) {
                    self.grant_cell(index, grant);
                    continue;
                }
                if self.can_escalate() {
                    match client.create_private_pool() {
                        Some(pool) => {
                            tracing::debug!(
                                granted = self.holdings.held_count(),
                                "global pool refused a cell; restarting against a private pool"
                            );
                            self.rewind(client);
                            if let Err(error) =
                                client.bind_pool_to_surface(PoolRef::Private(pool), self.surface)
                            {
                                client.destroy_private_pool(pool);
                                return Err(error.into());
                            }
                            self.holdings.set_pool(PoolRef::Private(pool));
                            continue 'negotiate;
                        }
                        None => {
                            tracing::warn!(
                                "private pool creation failed; finishing against the global pool"
                            );
                            self.pool_denied = true;
                            pending.push(index);
                        }
                    }
                } else {
                    pending.push(index);
                }
            }
            tracing::debug!(
                exact = self.exact,
                pending = pending.len(),
                private_pool = self.holdings.pool().is_private(),
                "exact phase complete"
            );
            return Ok(pending);
        }
    }

    /// Phase 2: for each pending color, share (read-only) the nearest entry
    /// already present in the active pool, whoever put it there.
    fn phase_nearest_available<C: ResourceClient>(
        &mut self,
        client: &mut C,
        pending: Vec<usize>,
    ) -> Vec<usize> {
        if pending.is_empty() {
            return pending;
        }
        let entries = client.query_existing_entries(self.holdings.pool(), MAX_POOL_QUERY);
        if entries.is_empty() {
            return pending;
        }
        let mut still_pending = Vec::new();
        for &index in &pending {
            let desired = self.cells[index].desired;
            let nearest = entries
                .iter()
                .min_by_key(|(_, rgb)| rgb.distance_squared(desired))
                .map(|&(handle, _)| handle);
            let Some(candidate) = nearest else {
                still_pending.push(index);
                continue;
            };
            match client.try_acquire_closest(self.holdings.pool(), candidate) {
                Some(grant) => self.grant_cell(index, grant),
                None => still_pending.push(index),
            }
        }
        tracing::debug!(
            resolved = pending.len() - still_pending.len(),
            pending = still_pending.len(),
            "nearest-available phase complete"
        );
        still_pending
    }
}
