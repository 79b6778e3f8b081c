//! Greedy farthest-point ordering of an arbitrary color set.

use crate::color::Rgb;

/// Order `colors` by diversity: seed with the brightest entry, then
/// repeatedly pick the remaining color with the greatest running minimum
/// squared distance to everything already picked.
///
/// Used when no pixel histogram exists (synthetic sampling cubes); image
/// palettes go through [`sort_colors`](crate::order::sort_colors) instead,
/// which folds usage counts into the same procedure.
///
/// Returns a permutation of `0..colors.len()`.
///
/// # Example
///
/// ```
/// use cellmap::{diversity_order, Rgb};
///
/// let colors = [Rgb::BLACK, Rgb::new(250, 250, 250), Rgb::WHITE];
/// let order = diversity_order(&colors);
/// // Brightest first, then the farthest from it.
/// assert_eq!(order, vec![2, 0, 1]);
/// ```
pub fn diversity_order(colors: &[Rgb]) -> Vec<usize> {
    let ncols = colors.len();
    let mut order = Vec::with_capacity(ncols);
    if ncols == 0 {
        return order;
    }

    let mut chosen = vec![false; ncols];

    // Seed with the brightest color.
    let mut seed = 0;
    for (i, color) in colors.iter().enumerate() {
        if color.magnitude_squared() > colors[seed].magnitude_squared() {
            seed = i;
        }
    }
    chosen[seed] = true;
    order.push(seed);

    // Running minimum squared distance from each color to the chosen set,
    // folded in one new selection at a time.
    let mut min_dist = vec![u32::MAX; ncols];
    let mut latest = seed;

    for _rank in 1..ncols {
        let mut pick = None;
        let mut pick_dist = 0;
        for i in 0..ncols {
            if chosen[i] {
                continue;
            }
            let d = colors[i].distance_squared(colors[latest]);
            if d < min_dist[i] {
                min_dist[i] = d;
            }
            if pick.is_none() || min_dist[i] > pick_dist {
                pick = Some(i);
                pick_dist = min_dist[i];
            }
        }
        // ncols - rank colors remain, so there is always a pick
        if let Some(pick) = pick {
            chosen[pick] = true;
            order.push(pick);
            latest = pick;
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_permutation(order: &[usize], len: usize) {
        assert_eq!(order.len(), len);
        let mut seen = vec![false; len];
        for &i in order {
            assert!(!seen[i], "index {i} appears twice");
            seen[i] = true;
        }
    }

    #[test]
    fn test_empty_set() {
        assert!(diversity_order(&[]).is_empty());
    }

    #[test]
    fn test_single_color() {
        assert_eq!(diversity_order(&[Rgb::new(10, 20, 30)]), vec![0]);
    }

    #[test]
    fn test_seed_is_brightest() {
        let colors = [
            Rgb::new(20, 20, 20),
            Rgb::new(200, 10, 10),
            Rgb::WHITE,
            Rgb::new(128, 128, 128),
        ];
        let order = diversity_order(&colors);
        assert_eq!(order[0], 2);
    }

    #[test]
    fn test_second_pick_is_farthest_from_seed() {
        let colors = [Rgb::BLACK, Rgb::new(240, 240, 240), Rgb::WHITE];
        let order = diversity_order(&colors);
        assert_eq!(order[0], 2);
        assert_eq!(order[1], 0, "black is farther from white than near-white");
    }

    #[test]
    fn test_is_permutation_for_various_sizes() {
        for ncols in [0usize, 1, 2, 7, 64, 255, 256] {
            let colors: Vec<Rgb> = (0..ncols)
                .map(|i| Rgb::new(i as u8, (i * 7) as u8, (i * 13) as u8))
                .collect();
            let order = diversity_order(&colors);
            assert_permutation(&order, ncols);
        }
    }

    #[test]
    fn test_duplicates_do_not_break_ordering() {
        let colors = vec![Rgb::new(1, 2, 3); 8];
        let order = diversity_order(&colors);
        assert_permutation(&order, 8);
    }
}
