//! Contains the [`Optimizer`] builder struct, which ties every stage together.

use crate::{
    kmeans::{self, KmeansOptions},
    quantize::{quantize, Quantized},
    reindex::{compact, frequency_order, reindex, PaletteOrder, TieBreak},
    search::{search, EncoderParams, ParameterSet, RasterEncoder, SearchOutput},
    ByteBuffer, ColorType, Error, Palette, PaletteSize, Raster, Rgba,
};
#[cfg(feature = "threads")]
use crate::{quantize::quantize_par, search::search_par};
use std::borrow::Cow;

/// One encoded variant tried by the [`Optimizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    /// The requested palette size, or `None` for a source that was not quantized.
    pub palette_size: Option<PaletteSize>,
    /// The number of palette entries actually used, `0` for a true color encoding.
    pub num_colors: u16,
    /// The palette order that was encoded, `None` for a true color encoding.
    pub order: Option<PaletteOrder>,
    /// The total quantization error, `0` for a source that was not quantized.
    pub error: u64,
    /// The best parameters for this variant.
    pub params: EncoderParams,
    /// The encoded size in bytes.
    pub size: usize,
}

/// The result of running an [`Optimizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimized {
    /// The smallest encoding found.
    pub bytes: ByteBuffer,
    /// The parameters that produced `bytes`.
    pub params: EncoderParams,
    /// The indexed raster that was encoded into `bytes`.
    pub raster: Raster,
    /// The per-pixel quantization error of `raster`, if the source had to be quantized.
    pub error_raster: Option<Raster>,
    /// Every variant that was encoded, in the order they were tried.
    pub report: Vec<Variant>,
}

/// A builder struct to specify how to shrink an image.
///
/// A true color source is quantized with k-means once per palette size.
/// Each quantized image, or an already indexed source, then has its unused palette entries removed
/// and is encoded with its palette sorted both ways by usage.
/// With [`Optimizer::lossless`], a true color source is also encoded as is.
/// The smallest encoding across all of these variants wins.
///
/// # Examples
/// ```
/// # use pngsqueeze::{Optimizer, Raster, ColorType, ByteBuffer, Error};
/// # use pngsqueeze::search::{ParameterSet, RasterEncoder, EncoderParams};
/// # fn main() -> Result<(), Error> {
/// # let data = (0..=255).flat_map(|v| [v, 255 - v, v / 2]).collect::<Vec<u8>>();
/// let raster = Raster::from_vec(16, 16, 8, 48, ColorType::Rgb, data)?;
/// # let encoder = |raster: &Raster, _: &EncoderParams| -> Result<ByteBuffer, Error> {
/// #     Ok(ByteBuffer::from(raster.data()))
/// # };
///
/// let optimized = Optimizer::new(&raster)
///     .palette_sizes(vec![8.into(), 16.into()])
///     .parameter_set(ParameterSet::Curated)
///     .optimize(&encoder)?;
///
/// assert_eq!(optimized.report.len(), 4);
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct Optimizer<'a> {
    /// The image to shrink.
    pub(crate) source: &'a Raster,
    /// The palette sizes to try for a true color source.
    pub(crate) palette_sizes: Vec<PaletteSize>,
    /// The options for k-means. The palette size is overridden by `palette_sizes`.
    pub(crate) kmeans: KmeansOptions,
    /// The encoder parameters to search.
    pub(crate) parameters: ParameterSet,
    /// How to order palette entries with equal usage.
    pub(crate) tie_break: TieBreak,
    /// Whether to cluster premultiplied colors.
    pub(crate) premultiply: bool,
    /// Whether a true color source also competes unquantized.
    pub(crate) lossless: bool,
}

impl<'a> Optimizer<'a> {
    /// Creates a new [`Optimizer`] with default options.
    pub fn new(source: &'a Raster) -> Self {
        Self {
            source,
            palette_sizes: vec![PaletteSize::from(32)],
            kmeans: KmeansOptions::new(),
            parameters: ParameterSet::default(),
            tie_break: TieBreak::default(),
            premultiply: false,
            lossless: false,
        }
    }

    /// Sets the palette sizes to try when the source has to be quantized.
    ///
    /// The default is a single palette size of `32`.
    pub fn palette_sizes(&mut self, sizes: Vec<PaletteSize>) -> &mut Self {
        self.palette_sizes = sizes;
        self
    }

    /// Sets the k-means options. The palette size of `options` is ignored.
    pub fn kmeans_options(&mut self, options: KmeansOptions) -> &mut Self {
        self.kmeans = options;
        self
    }

    /// Sets the encoder parameters to search.
    ///
    /// The default is [`ParameterSet::Exhaustive`].
    pub fn parameter_set(&mut self, parameters: ParameterSet) -> &mut Self {
        self.parameters = parameters;
        self
    }

    /// Sets how to order palette entries used by the same number of pixels.
    ///
    /// The default is [`TieBreak::Luma`].
    pub fn tie_break(&mut self, tie_break: TieBreak) -> &mut Self {
        self.tie_break = tie_break;
        self
    }

    /// Sets whether to cluster colors after multiplying them by their alpha.
    ///
    /// Premultiplied colors are closer together the more transparent they are,
    /// so fewer palette entries are spent on nearly invisible pixels.
    /// The palette is divided by alpha again before encoding.
    ///
    /// The default value is `false`.
    pub fn premultiply(&mut self, premultiply: bool) -> &mut Self {
        self.premultiply = premultiply;
        self
    }

    /// Sets whether to also encode a true color source as is, without quantizing it.
    ///
    /// The lossless encoding is tried before the quantized variants and wins
    /// if none of them is strictly smaller.
    /// Palette sizes may then be empty, which gives a pure lossless recompression.
    /// An indexed source is always encoded losslessly, so this has no effect on it.
    ///
    /// The default value is `false`.
    pub fn lossless(&mut self, lossless: bool) -> &mut Self {
        self.lossless = lossless;
        self
    }
}

/// The best variant so far.
struct Winner {
    /// The search result.
    output: SearchOutput,
    /// The raster that was encoded.
    raster: Raster,
    /// The quantization error raster, if any.
    error_raster: Option<Raster>,
}

/// Whether to run the parallel or single threaded version of each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Single threaded.
    Single,
    /// Across the rayon thread pool.
    #[cfg(feature = "threads")]
    Parallel,
}

impl Optimizer<'_> {
    /// Runs the optimizer and returns the smallest encoding.
    ///
    /// # Errors
    /// Fails if no palette sizes were given for a true color source without
    /// [`Optimizer::lossless`], a palette size is `0`, or every encoding failed.
    pub fn optimize(&self, encoder: &(impl RasterEncoder + ?Sized)) -> Result<Optimized, Error> {
        self.run(encoder, Mode::Single)
    }

    /// Runs the optimizer in parallel and returns the smallest encoding.
    ///
    /// Gives the same result as [`Optimizer::optimize`].
    ///
    /// # Errors
    /// Fails for the same reasons as [`Optimizer::optimize`].
    #[cfg(feature = "threads")]
    pub fn optimize_par(
        &self,
        encoder: &(impl RasterEncoder + ?Sized),
    ) -> Result<Optimized, Error> {
        self.run(encoder, Mode::Parallel)
    }

    /// Tries every variant and keeps the smallest.
    fn run(&self, encoder: &(impl RasterEncoder + ?Sized), mode: Mode) -> Result<Optimized, Error> {
        let candidates = self.parameters.candidates();
        let mut report = Vec::new();
        let mut winner = None::<Winner>;

        let true_color = self.source.color_type() != ColorType::Indexed;
        if true_color && self.lossless {
            let output = Self::search(self.source, &candidates, encoder, mode)?;
            let variant = Variant {
                palette_size: None,
                num_colors: 0,
                order: None,
                error: 0,
                params: output.params,
                size: output.bytes.len(),
            };
            tracing::info!(
                size = variant.size,
                params = %variant.params,
                "encoded lossless variant"
            );
            report.push(variant);
            winner = Some(Winner {
                output,
                raster: self.source.clone(),
                error_raster: None,
            });
        }

        let mut consider = |indexed: &Raster,
                            size: Option<PaletteSize>,
                            error: u64,
                            error_raster: Option<&Raster>|
         -> Result<(), Error> {
            for order in PaletteOrder::ALL {
                let permutation = frequency_order(indexed, order, self.tie_break)?;
                let raster = reindex(indexed, &permutation)?;
                let output = Self::search(&raster, &candidates, encoder, mode)?;

                let variant = Variant {
                    palette_size: size,
                    num_colors: raster.palette().map_or(0, Palette::num_colors),
                    order: Some(order),
                    error,
                    params: output.params,
                    size: output.bytes.len(),
                };
                tracing::info!(
                    colors = variant.num_colors,
                    order = ?order,
                    error,
                    size = variant.size,
                    params = %variant.params,
                    "encoded variant"
                );
                report.push(variant);

                if winner
                    .as_ref()
                    .map_or(true, |best| output.bytes.len() < best.output.bytes.len())
                {
                    winner = Some(Winner {
                        output,
                        raster,
                        error_raster: error_raster.cloned(),
                    });
                }
            }
            Ok(())
        };

        if !true_color {
            consider(&compact(self.source)?, None, 0, None)?;
        } else {
            if self.palette_sizes.is_empty() && !self.lossless {
                return Err(Error::Configuration(
                    "at least one palette size is needed to quantize a true color image".into(),
                ));
            }

            let working = self.working_raster(mode);
            for &size in &self.palette_sizes {
                let options = self.kmeans.palette_size(size);
                let output = Self::kmeans(&working, options, mode)?;
                tracing::debug!(
                    colors = %size,
                    rounds = output.rounds,
                    converged = output.converged,
                    error = output.error,
                    "k-means finished"
                );

                let quantized = Self::quantize(&working, &output.palette, mode)?;
                let mut indexed = compact(&quantized.indexed)?;
                if self.premultiply {
                    let straight = indexed
                        .palette()
                        .map(|palette| {
                            palette.iter().copied().map(Rgba::unpremultiplied).collect()
                        })
                        .map(Palette::new_unchecked);
                    indexed.set_palette(straight);
                }

                consider(&indexed, Some(size), output.error, Some(&quantized.error))?;
            }
        }

        let Winner { output, raster, error_raster } = winner.ok_or(Error::EmptyResult)?;
        tracing::info!(size = output.bytes.len(), params = %output.params, "smallest encoding");

        Ok(Optimized {
            bytes: output.bytes,
            params: output.params,
            raster,
            error_raster,
            report,
        })
    }

    /// The source, premultiplied if requested.
    fn working_raster(&self, mode: Mode) -> Cow<'_, Raster> {
        if !self.premultiply {
            return Cow::Borrowed(self.source);
        }

        let raster = self.source.clone();
        Cow::Owned(match mode {
            Mode::Single => raster.premultiply(),
            #[cfg(feature = "threads")]
            Mode::Parallel => raster.premultiply_par(),
        })
    }

    /// Runs k-means in `mode`.
    fn kmeans(
        source: &Raster,
        options: KmeansOptions,
        mode: Mode,
    ) -> Result<kmeans::KmeansOutput, Error> {
        match mode {
            Mode::Single => kmeans::palette(source, options),
            #[cfg(feature = "threads")]
            Mode::Parallel => kmeans::palette_par(source, options),
        }
    }

    /// Quantizes in `mode`.
    fn quantize(source: &Raster, palette: &Palette, mode: Mode) -> Result<Quantized, Error> {
        match mode {
            Mode::Single => quantize(source, palette),
            #[cfg(feature = "threads")]
            Mode::Parallel => quantize_par(source, palette),
        }
    }

    /// Searches encoder parameters in `mode`.
    fn search(
        raster: &Raster,
        candidates: &[EncoderParams],
        encoder: &(impl RasterEncoder + ?Sized),
        mode: Mode,
    ) -> Result<SearchOutput, Error> {
        match mode {
            Mode::Single => search(raster, candidates, encoder),
            #[cfg(feature = "threads")]
            Mode::Parallel => search_par(raster, candidates, encoder),
        }
    }
}
