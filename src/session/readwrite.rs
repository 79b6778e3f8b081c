//! The read-write (owned-cell) negotiation.

use std::collections::HashMap;

use crate::client::{PoolRef, ResourceClient};
use crate::error::AllocError;
use crate::progress::{ProgressSink, PROGRESS_INTERVAL};

use super::AllocationSession;

impl AllocationSession {
    /// Read-write policy: one uninitialized writable cell per color, with
    /// the desired RGB stored into it explicitly. Group members after the
    /// first reuse the first member's cell without a new request. A pass
    /// that obtains nothing (and never escalated) falls back wholesale to
    /// the read-only policy; leftovers are shared onto the session's own
    /// cells like read-only phase 3, with the shares recorded in the
    /// backing remap.
    pub(super) fn allocate_readwrite<C: ResourceClient>(
        &mut self,
        client: &mut C,
        order: &[usize],
        progress: &mut dyn ProgressSink,
    ) -> Result<(), AllocError> {
        let total = order.len();
        let pending = 'negotiate: loop {
            let mut pending = Vec::new();
            let mut group_leader: HashMap<u16, usize> = HashMap::new();
            for (step, &index) in order.iter().enumerate() {
                if step % PROGRESS_INTERVAL == 0 {
                    progress.checkpoint(step, total);
                }
                let (desired, group) = {
                    let cell = &self.cells[index];
                    (cell.desired, cell.group)
                };
                if group != 0 {
                    if let Some(&leader) = group_leader.get(&group) {
                        // Linked cells share the leader's cell; no request.
                        let (handle, displayed) =
                            (self.cells[leader].handle, self.cells[leader].displayed);
                        let cell = &mut self.cells[index];
                        cell.handle = handle;
                        cell.displayed = displayed;
                        self.backing[index] = leader;
                        if displayed == desired {
                            self.exact += 1;
                        } else {
                            self.close += 1;
                        }
                        continue;
                    }
                }
                if let Some(handle) = client.acquire_writable_cell(self.holdings.pool()) {
                    client.store_color(self.holdings.pool(), handle, desired);
                    self.holdings.push(handle);
                    let cell = &mut self.cells[index];
                    cell.handle = Some(handle);
                    cell.displayed = desired;
                    self.exact += 1;
                    if group != 0 {
                        group_leader.insert(group, index);
                    }
                    continue;
                }
                if self.can_escalate() {
                    match client.create_private_pool() {
                        Some(pool) => {
                            tracing::debug!(
                                granted = self.holdings.held_count(),
                                "no writable cell available; restarting against a private pool"
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
            break pending;
        };

        if self.holdings.held_count() == 0 && !self.holdings.pool().is_private() {
            tracing::warn!("no writable cells granted; falling back to read-only allocation");
            self.reset_cells();
            return self.allocate_readonly(client, order, progress);
        }

        self.writable_cells = true;
        tracing::debug!(
            owned = self.holdings.held_count(),
            pending = pending.len(),
            "writable-cell phase complete"
        );

        // A pending color whose group did obtain a cell joins that cell
        // before the generic nearest-held fallback, keeping groups intact.
        let mut leftovers = Vec::new();
        for &index in &pending {
            match self.group_cell_owner(index) {
                Some(owner) => {
                    let (handle, displayed) =
                        (self.cells[owner].handle, self.cells[owner].displayed);
                    let desired = self.cells[index].desired;
                    let cell = &mut self.cells[index];
                    cell.handle = handle;
                    cell.displayed = displayed;
                    self.backing[index] = owner;
                    if displayed == desired {
                        self.exact += 1;
                    } else {
                        self.close += 1;
                    }
                }
                None => leftovers.push(index),
            }
        }
        self.resolve_pending_nearest_held(&leftovers)
    }

    /// The cell-owning member of this color's group, if any.
    fn group_cell_owner(&self, index: usize) -> Option<usize> {
        let group = self.cells[index].group;
        if group == 0 {
            return None;
        }
        (0..self.cells.len()).find(|&i| {
            i != index
                && self.cells[i].group == group
                && self.backing[i] == i
                && self.cells[i].handle.is_some()
        })
    }
}
