use crate::{Palette, Raster, Rgba, Rgba64};

/// Running color sums and member counts for each palette index.
///
/// The mean color of an index is kept up to date in constant time per membership change,
/// so a round of Lloyd's algorithm only pays for the pixels that switched clusters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentroidCache {
    /// The sum of all member colors per index.
    sums: Vec<Rgba64>,
    /// The number of members per index.
    counts: Vec<u64>,
}

impl CentroidCache {
    /// Creates a cache with `len` empty centroids.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            sums: vec![Rgba64::default(); len],
            counts: vec![0; len],
        }
    }

    /// Creates a cache of `len` centroids where pixel `i` of `source` is a member of `indices[i]`.
    ///
    /// # Panics
    /// Panics if an index is not less than `len`.
    #[must_use]
    pub fn from_assignments(source: &Raster, indices: &[u8], len: usize) -> Self {
        let mut cache = Self::new(len);
        for (color, &i) in source.pixels().zip(indices) {
            cache.add_member(i, color);
        }
        cache
    }

    /// The number of centroids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether there are no centroids.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The number of members of centroid `i`.
    #[must_use]
    pub fn count(&self, i: u8) -> u64 {
        self.counts[usize::from(i)]
    }

    /// The summed member colors of centroid `i`.
    #[must_use]
    pub fn sum(&self, i: u8) -> Rgba64 {
        self.sums[usize::from(i)]
    }

    /// Adds `color` to centroid `i`.
    #[inline]
    pub fn add_member(&mut self, i: u8, color: Rgba) {
        let i = usize::from(i);
        self.sums[i] += color;
        self.counts[i] += 1;
    }

    /// Removes `color` from centroid `i`.
    ///
    /// `color` must have previously been added to `i`.
    #[inline]
    pub fn remove_member(&mut self, i: u8, color: Rgba) {
        let i = usize::from(i);
        debug_assert!(self.counts[i] > 0);
        self.sums[i] -= color;
        self.counts[i] -= 1;
    }

    /// Moves `color` from centroid `src` to centroid `dst`.
    #[inline]
    pub fn move_member(&mut self, src: u8, dst: u8, color: Rgba) {
        if src != dst {
            self.remove_member(src, color);
            self.add_member(dst, color);
        }
    }

    /// The rounded mean of the members of centroid `i`, or [`Rgba::TRANSPARENT`] if it has none.
    #[must_use]
    pub fn mean_color(&self, i: u8) -> Rgba {
        let i = usize::from(i);
        self.sums[i].mean(self.counts[i])
    }

    /// The mean color of every centroid, in index order.
    #[must_use]
    pub fn to_palette(&self) -> Palette {
        Palette::new_unchecked(
            self.sums
                .iter()
                .zip(&self.counts)
                .map(|(&sum, &count)| sum.mean(count))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;

    /// Recomputes every sum from scratch.
    fn naive_sums(members: &[Vec<Rgba>]) -> Vec<Rgba64> {
        members
            .iter()
            .map(|colors| {
                let mut sum = Rgba64::default();
                for &c in colors {
                    sum += c;
                }
                sum
            })
            .collect()
    }

    fn assert_matches(cache: &CentroidCache, members: &[Vec<Rgba>]) {
        let mut means = Vec::new();
        for (i, (list, sum)) in members.iter().zip(naive_sums(members)).enumerate() {
            let i = i as u8;
            let count = list.len() as u64;
            assert_eq!(cache.sum(i), sum);
            assert_eq!(cache.count(i), count);
            means.push(sum.mean(count));
        }
        assert_eq!(cache.to_palette().into_inner(), means);
    }

    #[test]
    fn matches_recomputation() {
        const K: usize = 16;
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(3);
        let colors = test_colors(2000, 1);

        let mut cache = CentroidCache::new(K);
        let mut members = vec![Vec::<Rgba>::new(); K];
        // the centroid each color currently belongs to, if any
        let mut placed = vec![None::<u8>; colors.len()];

        let take = |members: &mut [Vec<Rgba>], i: u8, color: Rgba| {
            let list = &mut members[usize::from(i)];
            let pos = list.iter().position(|&c| c == color).unwrap();
            list.swap_remove(pos);
        };

        for step in 0..20_000 {
            let p = rng.gen_range(0..colors.len());
            let color = colors[p];
            let dst = rng.gen_range(0..K as u8);

            match placed[p] {
                None => {
                    cache.add_member(dst, color);
                    members[usize::from(dst)].push(color);
                    placed[p] = Some(dst);
                }
                Some(src) if rng.gen_bool(0.3) => {
                    cache.remove_member(src, color);
                    take(&mut members, src, color);
                    placed[p] = None;
                }
                Some(src) => {
                    cache.move_member(src, dst, color);
                    if src != dst {
                        take(&mut members, src, color);
                        members[usize::from(dst)].push(color);
                    }
                    placed[p] = Some(dst);
                }
            }

            if step % 1000 == 0 {
                assert_matches(&cache, &members);
            }
        }

        assert_matches(&cache, &members);
        assert!(placed.iter().any(Option::is_none));
        assert!(placed.iter().any(Option::is_some));
    }

    #[test]
    fn move_to_self_is_noop() {
        let mut cache = CentroidCache::new(2);
        cache.add_member(0, Rgba::opaque(10, 20, 30));
        let before = cache.clone();
        cache.move_member(0, 0, Rgba::opaque(10, 20, 30));
        assert_eq!(cache, before);
    }

    #[test]
    fn empty_centroid_is_transparent() {
        let mut cache = CentroidCache::new(2);
        cache.add_member(1, Rgba::opaque(7, 7, 7));
        cache.remove_member(1, Rgba::opaque(7, 7, 7));
        assert_eq!(cache.mean_color(0), Rgba::TRANSPARENT);
        assert_eq!(cache.mean_color(1), Rgba::TRANSPARENT);
    }

    #[test]
    fn from_assignments_adds_every_pixel() {
        let colors = [
            Rgba::opaque(0, 0, 0),
            Rgba::opaque(10, 10, 10),
            Rgba::opaque(255, 255, 255),
        ];
        let raster = rgb_raster(3, 1, &colors);
        let cache = CentroidCache::from_assignments(&raster, &[0, 0, 1], 2);
        assert_eq!(cache.mean_color(0), Rgba::opaque(5, 5, 5));
        assert_eq!(cache.mean_color(1), Rgba::opaque(255, 255, 255));
        assert_eq!(cache.count(0), 2);
    }
}
