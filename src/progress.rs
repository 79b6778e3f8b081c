//! Cooperative progress checkpoints for long allocation loops.
//!
//! Allocation is synchronous and cannot be cancelled, but a session over a
//! couple hundred colors makes a couple hundred blocking round trips. The
//! negotiation loops call into a [`ProgressSink`] at a fixed stride so the
//! integrating application can keep a busy indicator alive.

/// Number of colors processed between two checkpoints.
pub const PROGRESS_INTERVAL: usize = 16;

/// Receives cooperative checkpoints from the negotiation loops.
///
/// Closures work directly:
///
/// ```
/// use cellmap::ProgressSink;
///
/// let mut ticks = 0;
/// let mut sink = |_done: usize, _total: usize| ticks += 1;
/// ProgressSink::checkpoint(&mut sink, 0, 64);
/// assert_eq!(ticks, 1);
/// ```
pub trait ProgressSink {
    /// Called every [`PROGRESS_INTERVAL`] colors with the number processed
    /// so far and the session total. Checkpoints are informational only;
    /// there is no way to cancel a running session.
    fn checkpoint(&mut self, done: usize, total: usize);
}

/// Discards every checkpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn checkpoint(&mut self, _done: usize, _total: usize) {}
}

impl<F: FnMut(usize, usize)> ProgressSink for F {
    fn checkpoint(&mut self, done: usize, total: usize) {
        self(done, total)
    }
}
