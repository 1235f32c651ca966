//! Mapping every pixel of a raster to its nearest palette entry.

use crate::{Error, Palette, Raster, Rgba};
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// Finds the palette entry closest to `color`.
///
/// Returns the index of the entry and the Euclidean distance to it over all four channels.
/// Ties go to the lowest index, and the scan stops early on an exact match.
///
/// # Panics
/// Panics if `palette` is empty.
///
/// # Examples
/// ```
/// # use pngsqueeze::{quantize::nearest_index, Rgba};
/// let palette = [Rgba::opaque(0, 0, 0), Rgba::opaque(3, 4, 0), Rgba::opaque(3, 4, 0)];
/// assert_eq!(nearest_index(Rgba::opaque(3, 4, 0), &palette), (1, 0.0));
/// assert_eq!(nearest_index(Rgba::opaque(0, 0, 0), &palette), (0, 0.0));
/// assert_eq!(nearest_index(Rgba::opaque(6, 8, 0), &palette), (1, 5.0));
/// ```
#[must_use]
#[inline]
pub fn nearest_index(color: Rgba, palette: &[Rgba]) -> (u8, f64) {
    assert!(!palette.is_empty(), "palette must not be empty");

    let mut min_index = 0;
    let mut min_distance = u32::MAX;
    for (i, &entry) in palette.iter().enumerate() {
        let distance = color.squared_distance(entry);
        if distance < min_distance {
            min_index = i;
            min_distance = distance;
            if distance == 0 {
                break;
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let min_index = min_index as u8;
    (min_index, f64::from(min_distance).sqrt())
}

/// Clips a distance into an error raster byte.
#[inline]
fn error_byte(distance: f64) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let byte = distance.round().min(255.0) as u8;
    byte
}

/// The result of quantizing a raster against a palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    /// The indexed raster, owning a copy of the palette.
    pub indexed: Raster,
    /// The per-pixel distance to the chosen entry, rounded and clipped to `255`,
    /// as an indexed raster over a grey ramp.
    pub error: Raster,
}

impl Quantized {
    /// The sum of all per-pixel errors.
    #[must_use]
    pub fn total_error(&self) -> u64 {
        self.error.rows().flatten().copied().map(u64::from).sum()
    }

    /// Assembles the two output rasters.
    fn new(
        source: &Raster,
        palette: &Palette,
        indices: Vec<u8>,
        errors: Vec<u8>,
    ) -> Result<Self, Error> {
        let (width, height) = (source.width(), source.height());
        Ok(Self {
            indexed: Raster::indexed(width, height, indices, palette.clone())?,
            error: Raster::indexed(width, height, errors, Palette::grey_ramp())?,
        })
    }
}

/// Checks that there is something to quantize against.
fn check_palette(palette: &Palette) -> Result<(), Error> {
    if palette.is_empty() {
        Err(Error::Configuration("cannot quantize against an empty palette".into()))
    } else {
        Ok(())
    }
}

/// Maps every pixel of `source` to its nearest entry in `palette`.
///
/// # Errors
/// Fails if `palette` is empty.
pub fn quantize(source: &Raster, palette: &Palette) -> Result<Quantized, Error> {
    check_palette(palette)?;

    let (indices, errors) = source
        .pixels()
        .map(|color| {
            let (index, distance) = nearest_index(color, palette);
            (index, error_byte(distance))
        })
        .unzip();

    Quantized::new(source, palette, indices, errors)
}

/// Maps every pixel of `source` to its nearest entry in `palette` in parallel.
///
/// Gives the same result as [`quantize`].
///
/// # Errors
/// Fails if `palette` is empty.
#[cfg(feature = "threads")]
pub fn quantize_par(source: &Raster, palette: &Palette) -> Result<Quantized, Error> {
    check_palette(palette)?;

    let (indices, errors): (Vec<_>, Vec<_>) = (0..source.height())
        .into_par_iter()
        .flat_map_iter(|y| {
            (0..source.width()).map(move |x| {
                let (index, distance) = nearest_index(source.pixel_at(x, y), palette);
                (index, error_byte(distance))
            })
        })
        .unzip();

    Quantized::new(source, palette, indices, errors)
}
