//! The shared standard sampling cube.
//!
//! When no image-specific histogram exists (or the caller wants one palette
//! for every open surface), the engine allocates a synthetic, evenly spaced
//! RGB cube instead. The cube is negotiated once and shared; callers address
//! it through a fixed 256-entry lookup table regardless of how coarse the
//! cube actually built is, so switching densities never changes caller code.

use serde::{Deserialize, Serialize};

use crate::client::{Handle, ResourceClient, SurfaceId, VisualInfo};
use crate::color::Rgb;
use crate::direct::DirectColorMapper;
use crate::error::AllocError;
use crate::order::diversity_order;
use crate::progress::ProgressSink;
use crate::session::{AllocPolicy, AllocReport, AllocationSession, Holdings};

/// The five canonical sampling densities, named by entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CubeDensity {
    /// 2×2×2: the eight corner colors.
    Cube8,
    /// 4×4×4.
    Cube64,
    /// 4×8×4: extra green levels, where the eye resolves most.
    Cube128,
    /// 6×6×6.
    Cube216,
    /// 8×8×4: the densest scheme; also the table's addressing scheme.
    Cube256,
}

impl CubeDensity {
    /// Levels per channel, `(red, green, blue)`.
    pub const fn levels(self) -> (usize, usize, usize) {
        match self {
            CubeDensity::Cube8 => (2, 2, 2),
            CubeDensity::Cube64 => (4, 4, 4),
            CubeDensity::Cube128 => (4, 8, 4),
            CubeDensity::Cube216 => (6, 6, 6),
            CubeDensity::Cube256 => (8, 8, 4),
        }
    }

    /// Number of colors in the cube.
    pub const fn len(self) -> usize {
        let (r, g, b) = self.levels();
        r * g * b
    }

    /// Pick a density for a display.
    ///
    /// Non-indexed displays always take the full cube: scarcity is
    /// irrelevant there. Indexed displays take the 128-entry cube under the
    /// "standard cube" policy and the 64-entry cube otherwise, downgraded
    /// when the caller declares fewer free slots than the cube needs. The
    /// 216-entry cube is never chosen automatically; request it explicitly.
    ///
    /// # Example
    ///
    /// ```
    /// use cellmap::{CubeDensity, VisualInfo};
    ///
    /// let indexed = VisualInfo::indexed(256);
    /// assert_eq!(CubeDensity::choose(&indexed, false, 256), CubeDensity::Cube64);
    /// assert_eq!(CubeDensity::choose(&indexed, true, 256), CubeDensity::Cube128);
    /// assert_eq!(CubeDensity::choose(&indexed, true, 40), CubeDensity::Cube8);
    /// ```
    pub fn choose(visual: &VisualInfo, standard_policy: bool, available_slots: usize) -> Self {
        if visual.class.is_direct() {
            return CubeDensity::Cube256;
        }
        let preferred = if standard_policy {
            CubeDensity::Cube128
        } else {
            CubeDensity::Cube64
        };
        if available_slots >= preferred.len() {
            preferred
        } else if available_slots >= CubeDensity::Cube64.len() {
            CubeDensity::Cube64
        } else {
            CubeDensity::Cube8
        }
    }

    /// The cube's colors, channel levels spread evenly over 0..=255.
    fn colors(self) -> Vec<Rgb> {
        let (rl, gl, bl) = self.levels();
        let mut colors = Vec::with_capacity(self.len());
        for r in 0..rl {
            for g in 0..gl {
                for b in 0..bl {
                    colors.push(Rgb::new(
                        level_value(r, rl),
                        level_value(g, gl),
                        level_value(b, bl),
                    ));
                }
            }
        }
        colors
    }
}

#[inline]
fn level_value(index: usize, levels: usize) -> u8 {
    (index * 255 / (levels - 1)) as u8
}

/// Index into the 256-entry lookup table for an arbitrary color, using the
/// densest (3-3-2) addressing scheme.
#[inline]
pub fn lut_index(rgb: Rgb) -> usize {
    (((rgb.r >> 5) as usize) << 5) | (((rgb.g >> 5) as usize) << 2) | ((rgb.b >> 6) as usize)
}

/// One entry of the cube lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeSlot {
    /// The cell (indexed displays) or packed pixel value (direct displays)
    /// to draw with.
    pub handle: Handle,
    /// What the display actually shows for this entry.
    pub rgb: Rgb,
}

/// A built cube: density, 256-entry lookup table, and the cells it holds.
#[derive(Debug)]
pub struct StandardCube {
    density: CubeDensity,
    lut: Vec<CubeSlot>,
    holdings: Holdings,
    report: AllocReport,
}

impl StandardCube {
    #[inline]
    pub fn density(&self) -> CubeDensity {
        self.density
    }

    /// The full 256-entry table, addressed by [`lut_index`].
    #[inline]
    pub fn lut(&self) -> &[CubeSlot] {
        &self.lut
    }

    /// The slot an arbitrary color maps to.
    #[inline]
    pub fn slot(&self, rgb: Rgb) -> CubeSlot {
        self.lut[lut_index(rgb)]
    }

    #[inline]
    pub fn report(&self) -> &AllocReport {
        &self.report
    }
}

/// Builds and owns the process-wide standard cube.
///
/// Rebuilding an already-built density is detected and skipped without a
/// single resource call: tearing a cube down recolors every open surface
/// sharing it, so a no-op rebuild must really be a no-op.
#[derive(Debug)]
pub struct StandardCubeBuilder {
    surface: SurfaceId,
    current: Option<StandardCube>,
}

impl StandardCubeBuilder {
    pub fn new(surface: SurfaceId) -> Self {
        Self {
            surface,
            current: None,
        }
    }

    /// The cube built so far, if any.
    #[inline]
    pub fn current(&self) -> Option<&StandardCube> {
        self.current.as_ref()
    }

    /// Negotiate the cube at `density` against the global pool, reusing the
    /// existing build when the density already matches.
    ///
    /// The negotiation is the read-only path of [`AllocationSession`] with
    /// private pools forbidden: the cube exists to be shared, so it never
    /// leaves the global pool.
    pub fn ensure<C: ResourceClient>(
        &mut self,
        client: &mut C,
        density: CubeDensity,
        progress: &mut dyn ProgressSink,
    ) -> Result<&StandardCube, AllocError> {
        let cube = match self.current.take() {
            Some(cube) if cube.density == density => {
                tracing::debug!(entries = density.len(), "standard cube already built; skipping rebuild");
                cube
            }
            previous => {
                if let Some(mut old) = previous {
                    tracing::debug!(entries = old.density.len(), "tearing down previous cube");
                    old.holdings.release(client);
                }
                Self::build(client, self.surface, density, progress)?
            }
        };
        Ok(self.current.insert(cube))
    }

    /// Fill the cube arithmetically for a non-indexed display: every slot's
    /// handle is the packed pixel value, no resource calls at all. Always
    /// the full 256-entry density.
    pub fn ensure_direct(&mut self, mapper: &DirectColorMapper) -> &StandardCube {
        let cube = match self.current.take() {
            Some(cube) if cube.density == CubeDensity::Cube256 => cube,
            previous => {
                if let Some(old) = previous {
                    // No client here; a negotiated cube must have been
                    // released by the caller before switching displays.
                    debug_assert_eq!(old.holdings.held_count(), 0);
                }
                Self::build_direct(mapper)
            }
        };
        self.current.insert(cube)
    }

    /// Tear the cube down and release everything it holds.
    pub fn release<C: ResourceClient>(&mut self, client: &mut C) {
        if let Some(mut cube) = self.current.take() {
            cube.holdings.release(client);
        }
    }

    fn build_direct(mapper: &DirectColorMapper) -> StandardCube {
        let mut exact = 0;
        let lut: Vec<CubeSlot> = (0..256)
            .map(|address| {
                let probe = probe_color(address);
                let mapping = mapper.map_rgb(probe);
                let rgb = Rgb::new(
                    (mapping.achievable[0] >> 8) as u8,
                    (mapping.achievable[1] >> 8) as u8,
                    (mapping.achievable[2] >> 8) as u8,
                );
                if rgb == probe {
                    exact += 1;
                }
                CubeSlot {
                    handle: Handle::new(mapping.pixel),
                    rgb,
                }
            })
            .collect();
        let mut pixels: Vec<u32> = lut.iter().map(|slot| slot.handle.raw()).collect();
        pixels.sort_unstable();
        pixels.dedup();
        let unique = pixels.len();
        tracing::debug!(exact, unique, "standard cube filled arithmetically");
        StandardCube {
            density: CubeDensity::Cube256,
            lut,
            holdings: Holdings::new(),
            report: AllocReport {
                exact,
                close: 256 - exact,
                total: 256,
                unique,
                private_pool: false,
            },
        }
    }

    fn build<C: ResourceClient>(
        client: &mut C,
        surface: SurfaceId,
        density: CubeDensity,
        progress: &mut dyn ProgressSink,
    ) -> Result<StandardCube, AllocError> {
        let colors = density.colors();
        let order = diversity_order(&colors);

        let mut session = AllocationSession::new(surface, AllocPolicy::new(), &colors);
        session.allocate(client, Some(&order), progress)?;

        // Resolve every 3-3-2 address to the nearest cell actually obtained.
        let backed: Vec<(Handle, Rgb)> = session
            .cells()
            .iter()
            .filter_map(|cell| cell.handle.map(|handle| (handle, cell.displayed)))
            .collect();
        if backed.is_empty() {
            return Err(AllocError::ResourceExhausted);
        }
        let lut: Vec<CubeSlot> = (0..256)
            .map(|address| {
                let probe = probe_color(address);
                let mut best = backed[0];
                let mut best_dist = u32::MAX;
                for &(handle, rgb) in &backed {
                    let d = rgb.distance_squared(probe);
                    if d < best_dist {
                        best = (handle, rgb);
                        best_dist = d;
                    }
                }
                CubeSlot {
                    handle: best.0,
                    rgb: best.1,
                }
            })
            .collect();

        let report = session.report();
        let holdings = session.take_holdings();
        tracing::info!(
            entries = density.len(),
            exact = report.exact,
            close = report.close,
            "standard cube built"
        );
        Ok(StandardCube {
            density,
            lut,
            holdings,
            report,
        })
    }
}

/// The representative color of a 3-3-2 table address.
fn probe_color(address: usize) -> Rgb {
    let r = (address >> 5) & 0x7;
    let g = (address >> 2) & 0x7;
    let b = address & 0x3;
    Rgb::new(
        (r * 255 / 7) as u8,
        (g * 255 / 7) as u8,
        (b * 255 / 3) as u8,
    )
}
