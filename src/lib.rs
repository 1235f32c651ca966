//! A library for shrinking PNG images by palette quantization and compression parameter search.
//!
//! `pngsqueeze` reduces a true color image to a small palette using k-means
//! with an incrementally updated centroid cache, sorts the palette by usage,
//! and then brute forces encoder settings to find the smallest output.
//!
//! # Features
//! To reduce dependencies and compile times, `pngsqueeze` has several `cargo` features
//! that can be turned off or on:
//! - `threads`: exposes parallel versions of most functions via [`rayon`].
//! - `png`: adds the [`codec`] module for reading and writing PNG files.
//! - `image`: enables integration with the [`image`] crate.
//! - `cli`: builds the `pngsqueeze` command line tool.
//!
//! # High-Level API
//! To get started with the high-level API, see [`Optimizer`].
//! ```no_run
//! # use pngsqueeze::{Optimizer, codec::{self, PngEncoder}, search::ParameterSet};
//! # fn main() -> Result<(), pngsqueeze::Error> {
//! let raster = codec::read("some image.png")?;
//!
//! let optimized = Optimizer::new(&raster)
//!     .palette_sizes(vec![16.into(), 32.into()]) // try two palette sizes
//!     .parameter_set(ParameterSet::Curated) // search fewer encoder settings
//!     .premultiply(true) // cluster in premultiplied alpha
//!     .optimize_par(&PngEncoder)?;
//!
//! std::fs::write("smaller.png", optimized.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! The individual stages are also exposed in the [`kmeans`], [`quantize`], [`reindex`],
//! and [`search`] modules.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod buffer;
mod color;
mod error;
mod fixed;
mod histogram;
mod pipeline;
mod raster;
mod types;

pub mod kmeans;
pub mod paths;
pub mod quantize;
pub mod reindex;
pub mod search;

#[cfg(feature = "png")]
pub mod codec;

pub use buffer::ByteBuffer;
pub use color::{Rgba, Rgba64};
pub use error::{Error, Result};
pub use fixed::{fixdiv, fixmul};
pub use histogram::Histogram;
pub use pipeline::{Optimized, Optimizer, Variant};
pub use raster::{ColorType, Raster};
pub use types::*;

/// The maximum supported image size in number of pixels is `u32::MAX`.
pub const MAX_PIXELS: u32 = u32::MAX;

/// The maximum supported number of palette colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;

/// `MAX_COLORS` as a `usize` for array and `Vec` lengths.
pub(crate) const MAX_K: usize = MAX_COLORS as usize;

/// The only supported number of bits per channel.
pub const BIT_DEPTH: u8 = 8;

#[cfg(test)]
pub(crate) mod tests {
    use crate::{ColorType, Raster, Rgba, BIT_DEPTH};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;

    /// `n` random colors from a fixed seed.
    pub fn test_colors(n: usize, seed: u64) -> Vec<Rgba> {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
        (0..n).map(|_| Rgba::from_array(rng.gen())).collect()
    }

    /// A tightly packed Rgb raster of `colors`, dropping their alpha.
    pub fn rgb_raster(width: u32, height: u32, colors: &[Rgba]) -> Raster {
        let data = colors.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
        Raster::from_vec(width, height, BIT_DEPTH, width as usize * 3, ColorType::Rgb, data)
            .unwrap()
    }

    /// A tightly packed Rgba raster of `colors`.
    pub fn rgba_raster(width: u32, height: u32, colors: &[Rgba]) -> Raster {
        let data = colors.iter().flat_map(|c| c.to_array()).collect();
        Raster::from_vec(width, height, BIT_DEPTH, width as usize * 4, ColorType::Rgba, data)
            .unwrap()
    }
}
