//! Brute force search over encoder parameters for the smallest output.
//!
//! Every candidate [`EncoderParams`] is handed to a [`RasterEncoder`],
//! and the single smallest encoding is kept. Ties go to the candidate that comes first.
//!
//! The parallel search shares one best result between all workers.
//! A worker first compares its size against the best size seen so far without locking,
//! and only takes the lock when it may improve on it.

use crate::{ByteBuffer, Error, Raster};
#[cfg(feature = "threads")]
use rayon::prelude::*;
use std::fmt::{self, Display};
#[cfg(feature = "threads")]
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, PoisonError,
};

/// The deflate compression strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Standard LZ77 matching and Huffman coding.
    Default,
    /// Favors Huffman coding over short matches, suited to filtered image data.
    Filtered,
    /// Huffman coding only, no matching.
    HuffmanOnly,
    /// Matches of distance one only.
    Rle,
    /// Fixed Huffman codes, no dynamic tables.
    Fixed,
}

impl Strategy {
    /// Every strategy.
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::Filtered,
        Self::HuffmanOnly,
        Self::Rle,
        Self::Fixed,
    ];
}

/// The row filter to apply before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// No filtering.
    None,
    /// Difference to the pixel on the left.
    Sub,
    /// Difference to the pixel above.
    Up,
    /// Difference to the average of the pixels on the left and above.
    Average,
    /// Difference to the Paeth predictor.
    Paeth,
    /// The filter that minimizes the sum of absolute differences, chosen row by row.
    Adaptive,
}

impl Filter {
    /// Every filter selection.
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::Sub,
        Self::Up,
        Self::Average,
        Self::Paeth,
        Self::Adaptive,
    ];
}

/// One combination of encoder settings to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncoderParams {
    /// The compression level from `0` (store) to `9` (best).
    pub level: u8,
    /// The compression strategy.
    pub strategy: Strategy,
    /// The filter selection.
    pub filter: Filter,
}

impl EncoderParams {
    /// The highest compression level.
    pub const MAX_LEVEL: u8 = 9;

    /// Creates a new set of parameters, clamping `level` to [`EncoderParams::MAX_LEVEL`].
    #[must_use]
    pub const fn new(level: u8, strategy: Strategy, filter: Filter) -> Self {
        let level = if level > Self::MAX_LEVEL { Self::MAX_LEVEL } else { level };
        Self { level, strategy, filter }
    }
}

impl Default for EncoderParams {
    /// Best compression, the filtered strategy, and adaptive filtering.
    fn default() -> Self {
        Self::new(Self::MAX_LEVEL, Strategy::Filtered, Filter::Adaptive)
    }
}

impl Display for EncoderParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {} {:?} {:?}", self.level, self.strategy, self.filter)
    }
}

/// A predefined set of candidate [`EncoderParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterSet {
    /// Only [`EncoderParams::default`].
    Single,
    /// A dozen combinations that usually contain the best one.
    Curated,
    /// Every level from `1` to `9` with every strategy and every filter selection.
    #[default]
    Exhaustive,
}

impl ParameterSet {
    /// The candidates in this set, in search order.
    #[must_use]
    pub fn candidates(self) -> Vec<EncoderParams> {
        match self {
            ParameterSet::Single => vec![EncoderParams::default()],
            ParameterSet::Curated => [6, 9]
                .into_iter()
                .flat_map(|level| {
                    [Strategy::Default, Strategy::Filtered].into_iter().flat_map(move |strategy| {
                        [Filter::None, Filter::Paeth, Filter::Adaptive]
                            .into_iter()
                            .map(move |filter| EncoderParams::new(level, strategy, filter))
                    })
                })
                .collect(),
            ParameterSet::Exhaustive => (1..=EncoderParams::MAX_LEVEL)
                .flat_map(|level| {
                    Strategy::ALL.into_iter().flat_map(move |strategy| {
                        Filter::ALL
                            .into_iter()
                            .map(move |filter| EncoderParams::new(level, strategy, filter))
                    })
                })
                .collect(),
        }
    }
}

/// Encodes a raster into an image file format.
///
/// Implementations must be pure functions of the raster and parameters,
/// since they are called concurrently from the parallel search.
pub trait RasterEncoder: Sync {
    /// Encodes `raster` using `params` into a new buffer.
    ///
    /// # Errors
    /// Returns an error if the raster cannot be encoded with these parameters.
    fn encode(&self, raster: &Raster, params: &EncoderParams) -> Result<ByteBuffer, Error>;
}

impl<F> RasterEncoder for F
where
    F: Fn(&Raster, &EncoderParams) -> Result<ByteBuffer, Error> + Sync,
{
    fn encode(&self, raster: &Raster, params: &EncoderParams) -> Result<ByteBuffer, Error> {
        self(raster, params)
    }
}

/// The winning candidate of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutput {
    /// The position of the winner in the candidate list.
    pub index: usize,
    /// The parameters of the winner.
    pub params: EncoderParams,
    /// The encoded bytes.
    pub bytes: ByteBuffer,
}

impl SearchOutput {
    /// The ordering key: smaller output first, then earlier candidate.
    fn key(&self) -> (usize, usize) {
        (self.bytes.len(), self.index)
    }
}

/// Encodes candidate `index`, logging and discarding failures.
fn try_candidate(
    raster: &Raster,
    encoder: &(impl RasterEncoder + ?Sized),
    index: usize,
    params: EncoderParams,
) -> Option<SearchOutput> {
    match encoder.encode(raster, &params) {
        Ok(bytes) => Some(SearchOutput { index, params, bytes }),
        Err(error) => {
            tracing::warn!(%params, %error, "encoding candidate failed");
            None
        }
    }
}

/// Converts the reduction result into the search result.
fn finish(best: Option<SearchOutput>, num_candidates: usize) -> Result<SearchOutput, Error> {
    match best {
        Some(best) => {
            tracing::debug!(params = %best.params, size = best.bytes.len(), "search finished");
            Ok(best)
        }
        None if num_candidates == 0 => Err(Error::EmptyResult),
        None => Err(Error::Encode(format!(
            "all {num_candidates} encoding candidates failed"
        ))),
    }
}

/// Encodes `raster` with every candidate and returns the smallest result.
///
/// # Errors
/// Returns [`Error::EmptyResult`] if `candidates` is empty,
/// or [`Error::Encode`] if every candidate failed to encode.
///
/// # Examples
/// ```
/// # use pngsqueeze::{search::*, ByteBuffer, Raster, ColorType, Error};
/// # fn main() -> Result<(), Error> {
/// let raster = Raster::new(1, 1, 8, ColorType::Rgb)?;
/// // a stand-in encoder whose output shrinks with the level
/// let encoder = |_: &Raster, params: &EncoderParams| -> Result<ByteBuffer, Error> {
///     Ok(ByteBuffer::from(&vec![0; 10 - usize::from(params.level)][..]))
/// };
///
/// let best = search(&raster, &ParameterSet::Curated.candidates(), &encoder)?;
/// assert_eq!(best.params.level, 9);
/// assert_eq!(best.index, 6);
/// # Ok(())
/// # }
/// ```
pub fn search(
    raster: &Raster,
    candidates: &[EncoderParams],
    encoder: &(impl RasterEncoder + ?Sized),
) -> Result<SearchOutput, Error> {
    let best = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, &params)| try_candidate(raster, encoder, i, params))
        .min_by_key(SearchOutput::key);

    finish(best, candidates.len())
}

/// The best result shared between the workers of [`search_par`].
#[cfg(feature = "threads")]
struct SharedBest {
    /// The size of the best result, readable without taking the lock.
    size: AtomicUsize,
    /// The best result.
    best: Mutex<Option<SearchOutput>>,
}

#[cfg(feature = "threads")]
impl SharedBest {
    /// Creates an empty record.
    fn new() -> Self {
        Self {
            size: AtomicUsize::new(usize::MAX),
            best: Mutex::new(None),
        }
    }

    /// Replaces the best result with `candidate` if it is smaller, or equal in size and earlier.
    fn offer(&self, candidate: SearchOutput) {
        // the stored size only ever decreases, so a larger candidate can never win
        if candidate.bytes.len() > self.size.load(Ordering::Acquire) {
            return;
        }

        let mut best = self.best.lock().unwrap_or_else(PoisonError::into_inner);
        if best.as_ref().map_or(true, |best| candidate.key() < best.key()) {
            self.size.store(candidate.bytes.len(), Ordering::Release);
            *best = Some(candidate);
        }
    }

    /// Takes the final result.
    fn into_inner(self) -> Option<SearchOutput> {
        self.best.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Encodes `raster` with every candidate in parallel and returns the smallest result.
///
/// Gives the same result as [`search`].
///
/// # Errors
/// Returns [`Error::EmptyResult`] if `candidates` is empty,
/// or [`Error::Encode`] if every candidate failed to encode.
#[cfg(feature = "threads")]
pub fn search_par(
    raster: &Raster,
    candidates: &[EncoderParams],
    encoder: &(impl RasterEncoder + ?Sized),
) -> Result<SearchOutput, Error> {
    let shared = SharedBest::new();

    candidates
        .par_iter()
        .enumerate()
        .filter_map(|(i, &params)| try_candidate(raster, encoder, i, params))
        .for_each(|candidate| shared.offer(candidate));

    finish(shared.into_inner(), candidates.len())
}
