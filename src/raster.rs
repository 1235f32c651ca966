//! The raw pixel store shared by every stage.

use crate::{Error, Palette, Rgba, BIT_DEPTH, MAX_PIXELS};
#[cfg(feature = "threads")]
use rayon::prelude::*;
#[cfg(feature = "image")]
use image::{RgbImage, RgbaImage};

/// The channel layout of a [`Raster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorType {
    /// One byte per pixel, an index into the raster's [`Palette`].
    Indexed,
    /// Red, green and blue bytes. Alpha is implicitly `255`.
    Rgb,
    /// Red, green, blue and alpha bytes.
    Rgba,
}

impl ColorType {
    /// The number of bytes per pixel.
    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            ColorType::Indexed => 1,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }
}

/// An image with 8-bit channels stored row by row.
///
/// Each row occupies `stride` bytes, of which the first `width * bytes_per_pixel` hold pixels.
/// Indexed rasters carry the [`Palette`] their pixel bytes refer to.
///
/// Equality is structural: dimensions, stride, layout,
/// every stored byte and the palette must match.
///
/// # Examples
/// ```
/// # use pngsqueeze::{Raster, ColorType, Rgba};
/// # fn main() -> Result<(), pngsqueeze::Error> {
/// let raster = Raster::from_vec(2, 1, 8, 6, ColorType::Rgb, vec![255, 0, 0, 0, 0, 255])?;
/// assert_eq!(raster.pixel_at(1, 0), Rgba::opaque(0, 0, 255));
///
/// assert!(Raster::new(2, 1, 16, ColorType::Rgb).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// The width in pixels.
    width: u32,
    /// The height in pixels.
    height: u32,
    /// The number of bytes per row.
    stride: usize,
    /// The channel layout.
    color_type: ColorType,
    /// `stride * height` bytes of pixel data.
    data: Vec<u8>,
    /// The color table for indexed rasters.
    palette: Option<Palette>,
    /// Whether the color channels have been multiplied by alpha.
    premultiplied: bool,
}

impl Raster {
    /// Creates a zeroed raster with tightly packed rows.
    ///
    /// # Errors
    /// Fails if `depth` is not `8` or the dimensions are empty or too large.
    pub fn new(width: u32, height: u32, depth: u8, color_type: ColorType) -> Result<Self, Error> {
        let stride = width as usize * color_type.channels();
        Self::with_stride(width, height, depth, stride, color_type)
    }

    /// Creates a zeroed raster with `stride` bytes per row.
    ///
    /// # Errors
    /// Fails if `depth` is not `8`, the dimensions are empty or too large,
    /// or `stride` cannot hold a row of pixels.
    pub fn with_stride(
        width: u32,
        height: u32,
        depth: u8,
        stride: usize,
        color_type: ColorType,
    ) -> Result<Self, Error> {
        Self::validate(width, height, depth, stride, color_type)?;
        Ok(Self {
            width,
            height,
            stride,
            color_type,
            data: vec![0; stride * height as usize],
            palette: None,
            premultiplied: false,
        })
    }

    /// Creates a raster from existing pixel bytes.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Raster::with_stride`],
    /// or if `data` is not exactly `stride * height` bytes long.
    pub fn from_vec(
        width: u32,
        height: u32,
        depth: u8,
        stride: usize,
        color_type: ColorType,
        data: Vec<u8>,
    ) -> Result<Self, Error> {
        Self::validate(width, height, depth, stride, color_type)?;
        if data.len() != stride * height as usize {
            return Err(Error::Configuration(format!(
                "expected {} bytes of pixel data, got {}",
                stride * height as usize,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            stride,
            color_type,
            data,
            palette: None,
            premultiplied: false,
        })
    }

    /// Creates a tightly packed indexed raster.
    ///
    /// # Errors
    /// Fails if the dimensions are invalid or `indices` has the wrong length.
    pub fn indexed(
        width: u32,
        height: u32,
        indices: Vec<u8>,
        palette: Palette,
    ) -> Result<Self, Error> {
        let mut raster =
            Self::from_vec(width, height, BIT_DEPTH, width as usize, ColorType::Indexed, indices)?;
        raster.palette = Some(palette);
        Ok(raster)
    }

    /// Checks the construction parameters.
    fn validate(
        width: u32,
        height: u32,
        depth: u8,
        stride: usize,
        color_type: ColorType,
    ) -> Result<(), Error> {
        if depth != BIT_DEPTH {
            return Err(Error::UnsupportedDepth(depth));
        }
        if width == 0 || height == 0 {
            return Err(Error::Configuration(format!(
                "image dimensions cannot be zero, got {width}x{height}"
            )));
        }
        if u64::from(width) * u64::from(height) > u64::from(MAX_PIXELS) {
            return Err(Error::Configuration(format!(
                "{width}x{height} is above the maximum of {MAX_PIXELS} pixels"
            )));
        }
        let row_len = width as usize * color_type.channels();
        if stride < row_len {
            return Err(Error::Configuration(format!(
                "stride {stride} is smaller than a row of {row_len} bytes"
            )));
        }
        Ok(())
    }

    /// The width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// The height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The bit depth of each channel, always `8`.
    #[must_use]
    pub const fn depth(&self) -> u8 {
        BIT_DEPTH
    }

    /// The number of bytes per row, including any padding.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// The channel layout.
    #[must_use]
    pub const fn color_type(&self) -> ColorType {
        self.color_type
    }

    /// The number of bytes per pixel.
    #[must_use]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.color_type.channels()
    }

    /// The total number of pixels, `width * height`.
    #[must_use]
    pub const fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The number of pixel bytes in a row, excluding padding.
    #[must_use]
    pub const fn row_len(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    /// The raw bytes, `stride * height` of them.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the raw bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the raster and returns its raw bytes.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The pixel bytes of row `y`, excluding padding.
    ///
    /// # Panics
    /// Panics if `y` is out of bounds.
    #[must_use]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_len()]
    }

    /// Mutable access to the pixel bytes of row `y`, excluding padding.
    ///
    /// # Panics
    /// Panics if `y` is out of bounds.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let row_len = self.row_len();
        &mut self.data[start..start + row_len]
    }

    /// Iterates over the pixel bytes of each row, excluding padding.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        let row_len = self.row_len();
        self.data.chunks_exact(self.stride).map(move |row| &row[..row_len])
    }

    /// The palette, if any.
    #[must_use]
    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Replaces the palette.
    pub fn set_palette(&mut self, palette: Option<Palette>) {
        self.palette = palette;
    }

    /// Whether the color channels are premultiplied by alpha.
    #[must_use]
    pub const fn is_premultiplied(&self) -> bool {
        self.premultiplied
    }

    /// Decodes the bytes of one pixel.
    #[inline]
    fn decode(&self, bytes: &[u8]) -> Rgba {
        match self.color_type {
            ColorType::Indexed => self
                .palette
                .as_ref()
                .and_then(|palette| palette.get(usize::from(bytes[0])))
                .copied()
                .unwrap_or(Rgba::TRANSPARENT),
            ColorType::Rgb => Rgba::opaque(bytes[0], bytes[1], bytes[2]),
            ColorType::Rgba => Rgba::new(bytes[0], bytes[1], bytes[2], bytes[3]),
        }
    }

    /// The color of the pixel at column `x` and row `y`.
    ///
    /// Rgb pixels are opaque. Indexed pixels are looked up in the palette,
    /// and an index outside of it gives [`Rgba::TRANSPARENT`].
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    #[inline]
    pub fn pixel_at(&self, x: u32, y: u32) -> Rgba {
        assert!(x < self.width, "x = {x} is out of bounds");
        let bpp = self.bytes_per_pixel();
        let start = y as usize * self.stride + x as usize * bpp;
        self.decode(&self.data[start..start + bpp])
    }

    /// The color of the `i`-th pixel in row-major order.
    ///
    /// # Panics
    /// Panics if `i >= num_pixels()`.
    #[must_use]
    #[inline]
    pub fn pixel(&self, i: usize) -> Rgba {
        let width = self.width as usize;
        #[allow(clippy::cast_possible_truncation)]
        let (x, y) = ((i % width) as u32, (i / width) as u32);
        self.pixel_at(x, y)
    }

    /// Iterates over the colors of all pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Rgba> + '_ {
        let bpp = self.bytes_per_pixel();
        self.rows()
            .flat_map(move |row| row.chunks_exact(bpp))
            .map(|bytes| self.decode(bytes))
    }

    /// Multiplies the color channels of every translucent pixel by its alpha.
    ///
    /// Indexed rasters have their palette entries premultiplied instead.
    /// Rgb rasters are opaque and so are left unchanged.
    /// Does nothing if the raster is already premultiplied.
    #[must_use]
    pub fn premultiply(mut self) -> Self {
        if !self.premultiplied {
            self.map_colors(Rgba::premultiplied);
            self.premultiplied = true;
        }
        self
    }

    /// Reverses [`Raster::premultiply`], up to rounding error.
    #[must_use]
    pub fn unpremultiply(mut self) -> Self {
        if self.premultiplied {
            self.map_colors(Rgba::unpremultiplied);
            self.premultiplied = false;
        }
        self
    }

    /// Applies `f` to each pixel or palette entry.
    fn map_colors(&mut self, f: fn(Rgba) -> Rgba) {
        match self.color_type {
            ColorType::Indexed => {
                if let Some(palette) = &mut self.palette {
                    for color in palette.as_mut_slice() {
                        *color = f(*color);
                    }
                }
            }
            ColorType::Rgb => {}
            ColorType::Rgba => {
                let row_len = self.row_len();
                for row in self.data.chunks_exact_mut(self.stride) {
                    map_row(&mut row[..row_len], f);
                }
            }
        }
    }
}

/// Applies `f` to every Rgba pixel in `row`.
#[inline]
fn map_row(row: &mut [u8], f: fn(Rgba) -> Rgba) {
    for pixel in row.chunks_exact_mut(4) {
        let color = Rgba::new(pixel[0], pixel[1], pixel[2], pixel[3]);
        pixel.copy_from_slice(&f(color).to_array());
    }
}

#[cfg(feature = "threads")]
impl Raster {
    /// Multiplies the color channels of every translucent pixel by its alpha, in parallel.
    ///
    /// See [`Raster::premultiply`] for more details.
    #[must_use]
    pub fn premultiply_par(mut self) -> Self {
        if !self.premultiplied {
            self.map_colors_par(Rgba::premultiplied);
            self.premultiplied = true;
        }
        self
    }

    /// Reverses [`Raster::premultiply_par`] in parallel, up to rounding error.
    #[must_use]
    pub fn unpremultiply_par(mut self) -> Self {
        if self.premultiplied {
            self.map_colors_par(Rgba::unpremultiplied);
            self.premultiplied = false;
        }
        self
    }

    /// Applies `f` to each pixel in parallel. Each row is an independent task.
    fn map_colors_par(&mut self, f: fn(Rgba) -> Rgba) {
        if self.color_type == ColorType::Rgba {
            let row_len = self.row_len();
            self.data
                .par_chunks_exact_mut(self.stride)
                .for_each(|row| map_row(&mut row[..row_len], f));
        } else {
            self.map_colors(f);
        }
    }
}

#[cfg(feature = "image")]
impl TryFrom<&RgbImage> for Raster {
    type Error = Error;

    fn try_from(image: &RgbImage) -> Result<Self, Self::Error> {
        let (width, height) = image.dimensions();
        Self::from_vec(
            width,
            height,
            BIT_DEPTH,
            width as usize * 3,
            ColorType::Rgb,
            image.as_raw().clone(),
        )
    }
}

#[cfg(feature = "image")]
impl TryFrom<&RgbaImage> for Raster {
    type Error = Error;

    fn try_from(image: &RgbaImage) -> Result<Self, Self::Error> {
        let (width, height) = image.dimensions();
        Self::from_vec(
            width,
            height,
            BIT_DEPTH,
            width as usize * 4,
            ColorType::Rgba,
            image.as_raw().clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn rejects_other_depths() {
        for depth in [1, 2, 4, 16] {
            assert!(matches!(
                Raster::new(4, 4, depth, ColorType::Rgba),
                Err(Error::UnsupportedDepth(d)) if d == depth
            ));
        }
        assert!(Raster::new(4, 4, 8, ColorType::Rgba).is_ok());
    }

    #[test]
    fn rejects_malformed_layouts() {
        assert!(matches!(
            Raster::new(0, 4, 8, ColorType::Rgb),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Raster::with_stride(4, 4, 8, 11, ColorType::Rgb),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Raster::from_vec(2, 2, 8, 6, ColorType::Rgb, vec![0; 11]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn padded_rows_are_skipped() {
        // 2x2 rgb with 2 bytes of padding per row
        let data = vec![
            1, 2, 3, 4, 5, 6, 99, 99, //
            7, 8, 9, 10, 11, 12, 99, 99,
        ];
        let raster = Raster::from_vec(2, 2, 8, 8, ColorType::Rgb, data).unwrap();

        assert_eq!(raster.row(1), &[7, 8, 9, 10, 11, 12]);
        assert_eq!(raster.pixel(2), Rgba::opaque(7, 8, 9));
        assert_eq!(raster.pixel_at(1, 0), Rgba::opaque(4, 5, 6));
        assert_eq!(
            raster.pixels().collect::<Vec<_>>(),
            vec![
                Rgba::opaque(1, 2, 3),
                Rgba::opaque(4, 5, 6),
                Rgba::opaque(7, 8, 9),
                Rgba::opaque(10, 11, 12),
            ]
        );
    }

    #[test]
    fn indexed_pixels_use_the_palette() {
        let palette =
            Palette::try_from(vec![Rgba::opaque(1, 1, 1), Rgba::new(2, 2, 2, 0)]).unwrap();
        let raster = Raster::indexed(3, 1, vec![1, 0, 7], palette).unwrap();
        assert_eq!(raster.pixel(0), Rgba::new(2, 2, 2, 0));
        assert_eq!(raster.pixel(1), Rgba::opaque(1, 1, 1));
        assert_eq!(raster.pixel(2), Rgba::TRANSPARENT);
    }

    #[test]
    fn premultiply_only_touches_translucent_pixels() {
        let colors = [
            Rgba::new(200, 100, 50, 255),
            Rgba::new(200, 100, 50, 128),
            Rgba::new(200, 100, 50, 0),
        ];
        let raster = rgba_raster(3, 1, &colors).premultiply();
        assert!(raster.is_premultiplied());
        assert_eq!(
            raster.pixels().collect::<Vec<_>>(),
            vec![
                Rgba::new(200, 100, 50, 255),
                Rgba::new(100, 50, 25, 128),
                Rgba::new(0, 0, 0, 0),
            ]
        );

        // premultiplying twice is a no-op
        let again = raster.clone().premultiply();
        assert_eq!(again, raster);
    }

    #[test]
    fn unpremultiply_is_close_to_identity() {
        let colors = test_colors(1024, 7);
        let raster = rgba_raster(32, 32, &colors);
        let round_trip = raster.clone().premultiply().unpremultiply();
        assert!(!round_trip.is_premultiplied());

        for (before, after) in raster.pixels().zip(round_trip.pixels()) {
            assert_eq!(before.a, after.a);
            if before.a == 255 {
                assert_eq!(before, after);
            } else if before.a > 0 {
                let bound = 127.5 / f64::from(before.a) + 0.5;
                for (x, y) in before.to_array().into_iter().zip(after.to_array()).take(3) {
                    assert!(f64::from(x.abs_diff(y)) <= bound, "{before:?} {after:?}");
                }
            }
        }
    }

    #[test]
    fn rgb_premultiply_is_identity() {
        let colors = test_colors(64, 3)
            .into_iter()
            .map(|c| Rgba::opaque(c.r, c.g, c.b))
            .collect::<Vec<_>>();
        let raster = rgb_raster(8, 8, &colors);
        assert_eq!(raster.clone().premultiply().data(), raster.data());
    }

    #[test]
    fn indexed_premultiply_maps_palette() {
        let palette = Palette::try_from(vec![Rgba::new(200, 100, 50, 128)]).unwrap();
        let raster = Raster::indexed(1, 1, vec![0], palette).unwrap().premultiply();
        assert_eq!(raster.pixel(0), Rgba::new(100, 50, 25, 128));
        assert_eq!(raster.data(), &[0]);
    }

    #[test]
    #[cfg(feature = "threads")]
    fn single_and_multi_threaded_match() {
        let colors = test_colors(4096, 11);
        let raster = rgba_raster(64, 64, &colors);
        assert_eq!(raster.clone().premultiply(), raster.clone().premultiply_par());

        let premultiplied = raster.premultiply();
        assert_eq!(
            premultiplied.clone().unpremultiply(),
            premultiplied.unpremultiply_par()
        );
    }
}
