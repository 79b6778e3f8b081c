//! Histogram-driven palette compaction and allocation ordering.

use crate::color::Rgb;

/// Result of [`sort_colors`]: the compacted palette plus the order in which
/// its colors should be requested from the resource.
#[derive(Debug, Clone)]
pub struct SortedPalette {
    /// Number of colors that actually appear in the image.
    pub ncols: usize,

    /// Allocation priority order, as indices into the *original* palette.
    pub order: Vec<usize>,

    /// `old index -> new index` for surviving entries, `None` for entries no
    /// pixel referenced. Every plane derived from the image must be remapped
    /// through this table.
    pub translation: Vec<Option<u8>>,

    /// Surviving colors, renumbered contiguously.
    pub palette: Vec<Rgb>,

    /// Pixel counts of the surviving colors, in compacted order.
    pub usage: Vec<u32>,
}

impl SortedPalette {
    /// Remap one pixel through the translation table. Pixels referencing a
    /// dropped entry come back unchanged; they cannot occur in the image the
    /// table was built from.
    #[inline]
    pub fn remap(&self, pixel: u8) -> u8 {
        self.translation
            .get(pixel as usize)
            .copied()
            .flatten()
            .unwrap_or(pixel)
    }
}

/// Ranks below this always select by diversity, whatever their parity.
const DIVERSITY_WARMUP: usize = 10;

/// Histogram an indexed image, drop unused palette entries, and produce a
/// diversity-biased allocation order over the survivors.
///
/// The seed rank is the most-used color. Odd ranks (and every rank below
/// ten) pick the unranked color with the greatest running minimum squared
/// distance to the colors ranked so far; the remaining even ranks pick the
/// most-used unranked color instead, so heavily used colors are requested
/// early without collapsing the spread. The distance cache is folded
/// incrementally, one new selection per rank.
///
/// Never fails: an image with a single color degrades to a one-entry order,
/// an empty image to an empty one.
pub fn sort_colors(pixels: &[u8], palette: &[Rgb]) -> SortedPalette {
    // (1) histogram pixel usage per original index
    let mut counts = vec![0u32; palette.len()];
    for &pixel in pixels {
        if let Some(count) = counts.get_mut(pixel as usize) {
            *count += 1;
        }
    }

    // (2) drop zero-usage entries and renumber the survivors
    let mut translation = vec![None; palette.len()];
    let mut compact = Vec::new();
    let mut usage = Vec::new();
    let mut old_of_new = Vec::new();
    for (old, &count) in counts.iter().enumerate() {
        if count > 0 {
            translation[old] = Some(compact.len() as u8);
            compact.push(palette[old]);
            usage.push(count);
            old_of_new.push(old);
        }
    }

    let ncols = compact.len();
    let mut order = Vec::with_capacity(ncols);
    if ncols == 0 {
        return SortedPalette {
            ncols,
            order,
            translation,
            palette: compact,
            usage,
        };
    }

    // (3) seed with the most-used survivor
    let mut chosen = vec![false; ncols];
    let mut seed = 0;
    for i in 1..ncols {
        if usage[i] > usage[seed] {
            seed = i;
        }
    }
    chosen[seed] = true;
    order.push(old_of_new[seed]);

    // (4) alternate diversity and usage picks, keeping the running minimum
    // distance cache current either way
    let mut min_dist = vec![u32::MAX; ncols];
    let mut latest = seed;
    for rank in 1..ncols {
        let by_diversity = rank % 2 == 1 || rank < DIVERSITY_WARMUP;
        let mut pick = None;
        let mut pick_key = 0u32;
        for i in 0..ncols {
            if chosen[i] {
                continue;
            }
            let d = compact[i].distance_squared(compact[latest]);
            if d < min_dist[i] {
                min_dist[i] = d;
            }
            let key = if by_diversity { min_dist[i] } else { usage[i] };
            if pick.is_none() || key > pick_key {
                pick = Some(i);
                pick_key = key;
            }
        }
        if let Some(pick) = pick {
            chosen[pick] = true;
            order.push(old_of_new[pick]);
            latest = pick;
        }
    }

    SortedPalette {
        ncols,
        order,
        translation,
        palette: compact,
        usage,
    }
}
