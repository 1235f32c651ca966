use crate::{Palette, Rgba, MAX_K};
#[cfg(feature = "threads")]
use rayon::prelude::*;
use rand::{prelude::Distribution, SeedableRng};
use rand_distr::{weighted_alias::WeightedAliasIndex, Uniform};
use rand_xoshiro::Xoroshiro128PlusPlus;

/// Lowers each distance to the squared distance to `centroid` where that is smaller.
fn update_distances(colors: &[Rgba], distances: &mut [u64], centroid: Rgba) {
    for (d, &color) in distances.iter_mut().zip(colors) {
        if *d != 0 {
            *d = (*d).min(color.squared_distance(centroid).into());
        }
    }
}

/// [`update_distances`] split across the thread pool.
#[cfg(feature = "threads")]
fn update_distances_par(colors: &[Rgba], distances: &mut [u64], centroid: Rgba) {
    distances
        .par_iter_mut()
        .zip(colors)
        .filter(|(d, _)| **d != 0)
        .for_each(|(d, &color)| *d = (*d).min(color.squared_distance(centroid).into()));
}

/// The shared k-means++ loop, parameterized over how the distances are updated.
fn choose_centroids(
    colors: &[Rgba],
    k: usize,
    seed: u64,
    update: fn(&[Rgba], &mut [u64], Rgba),
) -> Palette {
    let k = k.min(MAX_K);

    if k == 0 {
        return Palette::default();
    }
    if colors.len() <= k {
        return Palette::new_unchecked(colors.to_vec());
    }

    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    let mut centroids = Vec::with_capacity(k);

    let first = colors[Uniform::new(0, colors.len()).sample(&mut rng)];
    centroids.push(first);

    let mut distances = vec![u64::MAX; colors.len()];
    update(colors, &mut distances, first);

    while centroids.len() < k {
        // fails only when every color is already a centroid
        let Ok(weighted) = WeightedAliasIndex::new(distances.clone()) else {
            break;
        };

        let centroid = colors[weighted.sample(&mut rng)];
        centroids.push(centroid);
        update(colors, &mut distances, centroid);
    }

    Palette::new_unchecked(centroids)
}

/// Chooses `k` initial centroids from the distinct `colors` using k-means++ seeding.
///
/// The first centroid is chosen uniformly at random.
/// Each following centroid is drawn with probability proportional to
/// the squared distance from a color to its nearest already chosen centroid,
/// so colors that are poorly represented so far are favored and chosen colors are never repeated.
///
/// If there are at most `k` colors, every color becomes a centroid.
/// The same `seed` always gives the same result.
///
/// # Examples
/// ```
/// # use pngsqueeze::{kmeans::kmeans_plus_plus, Rgba};
/// let colors = (0..=255).map(Rgba::grey).collect::<Vec<_>>();
/// let palette = kmeans_plus_plus(&colors, 16, 42);
/// assert_eq!(palette.len(), 16);
/// assert_eq!(palette, kmeans_plus_plus(&colors, 16, 42));
/// ```
#[must_use]
pub fn kmeans_plus_plus(colors: &[Rgba], k: usize, seed: u64) -> Palette {
    choose_centroids(colors, k, seed, update_distances)
}

/// Chooses `k` initial centroids like [`kmeans_plus_plus`], computing distances in parallel.
///
/// Gives the same result as [`kmeans_plus_plus`] for the same `seed`.
#[cfg(feature = "threads")]
#[must_use]
pub fn kmeans_plus_plus_par(colors: &[Rgba], k: usize, seed: u64) -> Palette {
    choose_centroids(colors, k, seed, update_distances_par)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use std::collections::HashSet;

    fn distinct(n: usize, seed: u64) -> Vec<Rgba> {
        let mut colors = test_colors(n, seed);
        colors.sort_unstable();
        colors.dedup();
        colors
    }

    #[test]
    fn few_colors_are_all_chosen() {
        let colors = distinct(10, 0);
        assert_eq!(kmeans_plus_plus(&colors, 32, 0).into_inner(), colors);
        assert_eq!(kmeans_plus_plus(&colors, colors.len(), 0).into_inner(), colors);
    }

    #[test]
    fn centroids_are_distinct_input_colors() {
        let colors = distinct(2000, 1);
        for k in [1, 2, 17, 256] {
            let palette = kmeans_plus_plus(&colors, k, 7);
            assert_eq!(palette.len(), k);

            let unique = palette.iter().collect::<HashSet<_>>();
            assert_eq!(unique.len(), k);
            assert!(palette.iter().all(|c| colors.binary_search(c).is_ok()));
        }
    }

    #[test]
    fn seed_is_reproducible() {
        let colors = distinct(2000, 2);
        assert_eq!(kmeans_plus_plus(&colors, 32, 5), kmeans_plus_plus(&colors, 32, 5));
    }

    #[test]
    fn far_outlier_is_chosen() {
        // near black colors plus one white: after the first pick,
        // white dominates the distance weights
        let mut colors = (0..16).map(|v| Rgba::opaque(v, 0, 0)).collect::<Vec<_>>();
        colors.push(Rgba::opaque(255, 255, 255));
        let chosen = (0..20)
            .filter(|&seed| {
                kmeans_plus_plus(&colors, 2, seed).contains(&Rgba::opaque(255, 255, 255))
            })
            .count();
        assert!(chosen >= 18, "white chosen {chosen} out of 20 times");
    }

    #[test]
    #[cfg(feature = "threads")]
    fn single_and_multi_threaded_match() {
        let colors = distinct(4096, 3);
        for k in [2, 64, 256] {
            assert_eq!(kmeans_plus_plus(&colors, k, 11), kmeans_plus_plus_par(&colors, k, 11));
        }
    }
}
