//! Allocation ordering: which colors to request first under scarcity.
//!
//! Under a full pool only the first requests succeed, so the order colors
//! are requested in decides what the image looks like. Both orderers bias
//! toward *diversity*: after the seed, each rank prefers the color farthest
//! (by squared RGB distance) from everything already ranked, so that early
//! grants span the gamut instead of clustering in it.

mod diversity;
mod sorter;

pub use diversity::diversity_order;
pub use sorter::{sort_colors, SortedPalette};
