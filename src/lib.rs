//! cellmap: colormap cell allocation and quantization engine
//!
//! This library maps a set of *desired* colors (a decoded image's palette,
//! an edited palette, or a synthetic sampling cube) onto a *constrained,
//! shared* color resource: an indexed display whose colormap cells are
//! scarce and shared with every other client. On displays without scarcity
//! (true/direct-color framebuffers) the same API degenerates into pure bit
//! arithmetic.
//!
//! # Pipeline Overview
//!
//! ```text
//! indexed image + palette        arbitrary RGB set
//!        |                              |
//!        v                              v
//!  sort_colors()                 diversity_order()
//!  (histogram, compact,          (greedy farthest-point)
//!   diversity-biased order)             |
//!        |                              |
//!        +-------------+----------------+
//!                      v
//!              AllocationOrder
//!                      |
//!                      v
//! ╔═════════════════════════════════════════════════╗
//! ║  AllocationSession (via ResourceClient)         ║
//! ║                                                 ║
//! ║  read-only:  exact -> nearest-available ->      ║
//! ║              nearest-held                       ║
//! ║  read-write: writable cells + store_color,      ║
//! ║              groups share, leftovers nearest-   ║
//! ║              held                               ║
//! ║  either:     escalate to a private pool and     ║
//! ║              restart when the policy allows     ║
//! ╚═════════════════════════════════════════════════╝
//!                      |
//!                      v
//!     per-color (handle, displayed RGB) + report
//! ```
//!
//! [`StandardCubeBuilder`] runs the same negotiation over one of five
//! canonical sampling cubes and shares the result behind a 256-entry lookup
//! table; [`DirectColorMapper`] handles the no-scarcity displays;
//! [`ModeController`] transitions between the strategies, releasing one
//! mode's holdings before the next one allocates.
//!
//! # Ordering Under Scarcity
//!
//! When the pool cannot satisfy everything, the colors requested first win,
//! so request order is quality-critical. Both orderers are greedy
//! farthest-point procedures: each rank picks the color with the greatest
//! running minimum squared RGB distance to everything ranked before it,
//! which spreads the early grants across the gamut. [`sort_colors`]
//! additionally seeds with the most-used color of an image histogram and
//! lets usage counts take over on even ranks past the warmup, so large
//! image areas keep their exact colors too.
//!
//! # Ownership of Scarce Cells
//!
//! Every acquisition lands in the session's [`Holdings`] ledger and is
//! released exactly once, either cell by cell back to the global pool, or
//! by destroying the session's private pool in one call. Release is
//! idempotent; an [`AllocationSession`] can always be released defensively.
//!
//! # Quick Start
//!
//! ```
//! use cellmap::{diversity_order, Rgb};
//!
//! // Order a small palette for allocation, most-diverse first.
//! let palette = [Rgb::BLACK, Rgb::new(16, 16, 16), Rgb::WHITE];
//! let order = diversity_order(&palette);
//! assert_eq!(order[0], 2); // brightest seeds the order
//! ```
//!
//! Negotiation itself runs against whatever implements [`ResourceClient`];
//! see the trait docs for the contract.

pub mod client;
pub mod color;
pub mod cube;
pub mod direct;
pub mod error;
pub mod mode;
pub mod order;
pub mod progress;
pub mod session;

pub use client::{
    CellGrant, Handle, PoolId, PoolRef, ResourceClient, SurfaceBindError, SurfaceId, VisualClass,
    VisualError, VisualInfo,
};
pub use color::{ParseColorError, Rgb};
pub use cube::{lut_index, CubeDensity, CubeSlot, StandardCube, StandardCubeBuilder};
pub use direct::{DirectColorMapper, DirectMapping};
pub use error::AllocError;
pub use mode::{Mode, ModeChange, ModeController, ModeRequest, NoPreview, PreviewSink};
pub use order::{diversity_order, sort_colors, SortedPalette};
pub use progress::{NoProgress, ProgressSink, PROGRESS_INTERVAL};
pub use session::{
    AllocPolicy, AllocReport, AllocationSession, Holdings, LogicalColor,
};
