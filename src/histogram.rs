//! Counting the distinct colors of a raster.

use crate::{Raster, Rgba};
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// The distinct colors of a raster and how many pixels have each one.
///
/// Colors are stored in ascending (lexicographic) order with no duplicates.
/// Rgb pixels are counted as opaque.
///
/// # Examples
/// ```
/// # use pngsqueeze::{Histogram, Raster, ColorType, Rgba};
/// # fn main() -> Result<(), pngsqueeze::Error> {
/// let raster = Raster::from_vec(3, 1, 8, 9, ColorType::Rgb, vec![9, 9, 9, 1, 1, 1, 9, 9, 9])?;
/// let histogram = Histogram::new(&raster);
/// assert_eq!(histogram.colors(), &[Rgba::grey(1), Rgba::grey(9)]);
/// assert_eq!(histogram.counts(), &[1, 2]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Histogram {
    /// The distinct colors, sorted.
    colors: Vec<Rgba>,
    /// The number of pixels for the color at the same index.
    counts: Vec<u32>,
}

impl Histogram {
    /// Counts the colors of `raster` in a single pass.
    #[must_use]
    pub fn new(raster: &Raster) -> Self {
        let mut pixels = raster.pixels().collect::<Vec<_>>();
        pixels.sort_unstable();
        Self::from_sorted(&pixels)
    }

    /// Run-length counts sorted pixels.
    fn from_sorted(pixels: &[Rgba]) -> Self {
        let mut colors = Vec::new();
        let mut counts = Vec::<u32>::new();

        for &color in pixels {
            if colors.last() == Some(&color) {
                if let Some(count) = counts.last_mut() {
                    *count += 1;
                }
            } else {
                colors.push(color);
                counts.push(1);
            }
        }

        Self { colors, counts }
    }

    /// The distinct colors in ascending order.
    #[must_use]
    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    /// The pixel count of each color in [`Histogram::colors`].
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// The number of distinct colors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether there are no colors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// The total number of pixels counted.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.counts.iter().copied().map(u64::from).sum()
    }

    /// The number of pixels with exactly `color`.
    #[must_use]
    pub fn get(&self, color: Rgba) -> u32 {
        self.colors
            .binary_search(&color)
            .map_or(0, |i| self.counts[i])
    }
}

#[cfg(feature = "threads")]
impl Histogram {
    /// Counts the colors of `raster`, sorting in parallel.
    #[must_use]
    pub fn new_par(raster: &Raster) -> Self {
        let mut pixels = raster.pixels().collect::<Vec<_>>();
        pixels.par_sort_unstable();
        Self::from_sorted(&pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use std::collections::HashMap;

    #[test]
    fn counts_match_naive() {
        let colors = test_colors(4096, 5)
            .into_iter()
            .map(|c| Rgba::new(c.r & 0xC0, c.g & 0xC0, c.b & 0xC0, c.a & 0x80))
            .collect::<Vec<_>>();
        let raster = rgba_raster(64, 64, &colors);
        let histogram = Histogram::new(&raster);

        let mut expected = HashMap::<Rgba, u32>::new();
        for &color in &colors {
            *expected.entry(color).or_default() += 1;
        }

        assert_eq!(histogram.len(), expected.len());
        assert_eq!(histogram.total_count(), 4096);
        assert!(histogram.colors().windows(2).all(|w| w[0] < w[1]));
        for (&color, &count) in &expected {
            assert_eq!(histogram.get(color), count);
        }
        assert_eq!(histogram.get(Rgba::new(1, 2, 3, 4)), 0);
    }

    #[test]
    fn rgb_is_opaque() {
        let colors = [Rgba::opaque(1, 2, 3), Rgba::opaque(1, 2, 3)];
        let histogram = Histogram::new(&rgb_raster(2, 1, &colors));
        assert_eq!(histogram.colors(), &[Rgba::opaque(1, 2, 3)]);
        assert_eq!(histogram.counts(), &[2]);
    }

    #[test]
    #[cfg(feature = "threads")]
    fn single_and_multi_threaded_match() {
        let colors = test_colors(4096, 9);
        let raster = rgba_raster(64, 64, &colors);
        assert_eq!(Histogram::new(&raster), Histogram::new_par(&raster));
    }
}
