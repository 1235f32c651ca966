//! Palette generation using Lloyd's algorithm (k-means) over the pixels of a raster.
//!
//! Centroids are seeded with k-means++ over the distinct colors of the image.
//! Each round then re-quantizes the whole image against the current centroids
//! and moves only the pixels whose assignment changed between the cached centroids,
//! so the cost of updating the centroids shrinks as the clustering settles.
//!
//! The palette with the lowest total error across all rounds is returned,
//! which is not necessarily the palette of the last round.
//!
//! # Examples
//! ```
//! # use pngsqueeze::{kmeans::{self, KmeansOptions}, Raster, ColorType};
//! # fn main() -> Result<(), pngsqueeze::Error> {
//! let data = (0..=255).flat_map(|v| [v, v, v]).collect::<Vec<u8>>();
//! let raster = Raster::from_vec(16, 16, 8, 48, ColorType::Rgb, data)?;
//!
//! let output = kmeans::palette(&raster, KmeansOptions::new().palette_size(8.into()).seed(1))?;
//! assert_eq!(output.palette.len(), 8);
//! # Ok(())
//! # }
//! ```

mod cache;
mod seed;

pub use cache::*;
pub use seed::*;

use crate::{
    quantize::{quantize, Quantized},
    Error, Histogram, Palette, PaletteSize, Raster,
};
#[cfg(feature = "threads")]
use crate::quantize::quantize_par;

/// A set of options for k-means palette generation.
///
/// # Examples
/// ```
/// # use pngsqueeze::kmeans::KmeansOptions;
/// let options = KmeansOptions::new()
///     .palette_size(64.into())
///     .seed(42)
///     .max_rounds(Some(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KmeansOptions {
    /// The number of centroids to generate.
    pub(crate) palette_size: PaletteSize,
    /// The seed value for the random number generator.
    pub(crate) seed: u64,
    /// The maximum number of rounds after the initial one.
    pub(crate) max_rounds: Option<u32>,
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl KmeansOptions {
    /// Creates a new [`KmeansOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            palette_size: PaletteSize::from_clamped(32),
            seed: 0,
            max_rounds: None,
        }
    }

    /// Sets the number of centroids (palette colors) to generate.
    ///
    /// The default palette size is `32`.
    #[must_use]
    pub const fn palette_size(mut self, palette_size: PaletteSize) -> Self {
        self.palette_size = palette_size;
        self
    }

    /// Sets the seed value for the random number generator.
    ///
    /// The default seed is `0`.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets a cap on the number of rounds to run after the initial quantization.
    ///
    /// By default, there is no cap and rounds run until the clustering converges.
    #[must_use]
    pub const fn max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

/// The state of a [`Clustering`] after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterState {
    /// The given round has been quantized and another round may change the result.
    Quantized(u32),
    /// Another round would not change the result.
    Converged,
}

/// The result of running k-means to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmeansOutput {
    /// The palette with the lowest total error seen across all rounds.
    pub palette: Palette,
    /// The total error of the source quantized against `palette`.
    pub error: u64,
    /// The number of rounds run after the initial one.
    pub rounds: u32,
    /// Whether the clustering converged, as opposed to hitting the round cap.
    pub converged: bool,
}

/// The signature shared by [`quantize`] and its parallel twin.
type QuantizeFn = fn(&Raster, &Palette) -> Result<Quantized, Error>;

/// A Lloyd's algorithm run in progress over a single source raster.
///
/// Created by [`Clustering::new`], which performs round `0`,
/// and advanced one round at a time with [`Clustering::step`].
#[derive(Debug, Clone)]
pub struct Clustering<'a> {
    /// The image being clustered.
    source: &'a Raster,
    /// Either [`quantize`] or [`quantize_par`].
    quantize: QuantizeFn,
    /// Running sums of the pixels assigned to each centroid.
    cache: CentroidCache,
    /// The quantization of the latest round.
    current: Quantized,
    /// The latest round index.
    round: u32,
    /// Whether the last round changed nothing.
    converged: bool,
    /// The lowest total error so far.
    best_error: u64,
    /// The palette that gave `best_error`.
    best_palette: Palette,
}

impl<'a> Clustering<'a> {
    /// Seeds the centroids and performs the initial quantization.
    ///
    /// # Errors
    /// Fails if `palette_size` is `0`.
    pub fn new(source: &'a Raster, options: KmeansOptions) -> Result<Self, Error> {
        let histogram = Histogram::new(source);
        let seeds =
            kmeans_plus_plus(histogram.colors(), options.palette_size.as_usize(), options.seed);
        Self::with_seeds(source, seeds, quantize)
    }

    /// Starts the clustering from the given initial centroids.
    ///
    /// # Errors
    /// Fails if `seeds` is empty.
    pub fn from_palette(source: &'a Raster, seeds: Palette) -> Result<Self, Error> {
        Self::with_seeds(source, seeds, quantize)
    }

    /// Performs round `0` with `quantize`.
    fn with_seeds(source: &'a Raster, seeds: Palette, quantize: QuantizeFn) -> Result<Self, Error> {
        let current = quantize(source, &seeds)?;
        let cache = CentroidCache::from_assignments(source, current.indexed.data(), seeds.len());
        let best_error = current.total_error();

        tracing::debug!(
            round = 0,
            total_error = best_error,
            colors = seeds.len(),
            "seeded k-means"
        );

        Ok(Self {
            source,
            quantize,
            cache,
            current,
            round: 0,
            converged: best_error == 0,
            best_error,
            best_palette: seeds,
        })
    }

    /// Runs one more round of Lloyd's algorithm.
    ///
    /// Each centroid moves to the mean of its assigned pixels, every pixel is reassigned,
    /// and the pixels that changed centroid are moved in the cache.
    ///
    /// Returns [`ClusterState::Converged`] without doing anything
    /// if the clustering already converged.
    ///
    /// # Errors
    /// Propagates quantization errors, which cannot happen for a non-empty palette.
    pub fn step(&mut self) -> Result<ClusterState, Error> {
        if self.converged {
            return Ok(ClusterState::Converged);
        }

        let palette = self.cache.to_palette();
        let next = (self.quantize)(self.source, &palette)?;

        let mut changed = 0u64;
        for ((color, &old), &new) in self
            .source
            .pixels()
            .zip(self.current.indexed.data())
            .zip(next.indexed.data())
        {
            if old != new {
                self.cache.move_member(old, new, color);
                changed += 1;
            }
        }

        self.round += 1;
        let total_error = next.total_error();
        if total_error < self.best_error {
            self.best_error = total_error;
            self.best_palette = palette;
        }

        tracing::debug!(round = self.round, total_error, changed, "k-means round");

        self.converged = next.indexed == self.current.indexed || self.best_error == 0;
        self.current = next;

        Ok(self.state())
    }

    /// Runs rounds until convergence or until `max_rounds` rounds have been run in total.
    ///
    /// # Errors
    /// Propagates errors from [`Clustering::step`].
    pub fn run(mut self, max_rounds: Option<u32>) -> Result<KmeansOutput, Error> {
        while !self.converged && max_rounds.map_or(true, |max| self.round < max) {
            self.step()?;
        }

        Ok(self.into_output())
    }

    /// The state after the latest round.
    #[must_use]
    pub fn state(&self) -> ClusterState {
        if self.converged {
            ClusterState::Converged
        } else {
            ClusterState::Quantized(self.round)
        }
    }

    /// The latest round index. Round `0` is the seeded quantization.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    /// The quantization produced by the latest round.
    #[must_use]
    pub fn current(&self) -> &Quantized {
        &self.current
    }

    /// The centroid cache.
    #[must_use]
    pub fn cache(&self) -> &CentroidCache {
        &self.cache
    }

    /// The lowest total error seen so far.
    #[must_use]
    pub fn best_error(&self) -> u64 {
        self.best_error
    }

    /// The palette that produced [`Clustering::best_error`].
    #[must_use]
    pub fn best_palette(&self) -> &Palette {
        &self.best_palette
    }

    /// Consumes the clustering and returns its best result.
    #[must_use]
    pub fn into_output(self) -> KmeansOutput {
        KmeansOutput {
            palette: self.best_palette,
            error: self.best_error,
            rounds: self.round,
            converged: self.converged,
        }
    }
}

#[cfg(feature = "threads")]
impl<'a> Clustering<'a> {
    /// Seeds the centroids and performs the initial quantization in parallel.
    ///
    /// Each following round will also quantize in parallel.
    /// Gives the same results as [`Clustering::new`].
    ///
    /// # Errors
    /// Fails if `palette_size` is `0`.
    pub fn new_par(source: &'a Raster, options: KmeansOptions) -> Result<Self, Error> {
        let histogram = Histogram::new_par(source);
        let seeds =
            kmeans_plus_plus_par(histogram.colors(), options.palette_size.as_usize(), options.seed);
        Self::with_seeds(source, seeds, quantize_par)
    }
}

/// Computes a palette for `source` by running k-means until it converges
/// or hits the round cap in `options`.
///
/// # Errors
/// Fails if the palette size in `options` is `0`.
pub fn palette(source: &Raster, options: KmeansOptions) -> Result<KmeansOutput, Error> {
    Clustering::new(source, options)?.run(options.max_rounds)
}

/// Computes a palette for `source` like [`palette`], quantizing in parallel.
///
/// # Errors
/// Fails if the palette size in `options` is `0`.
#[cfg(feature = "threads")]
pub fn palette_par(source: &Raster, options: KmeansOptions) -> Result<KmeansOutput, Error> {
    Clustering::new_par(source, options)?.run(options.max_rounds)
}
