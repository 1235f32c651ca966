//! Reading and writing PNG files.
//!
//! Decoding is done by the [`png`] crate.
//! Encoding filters the rows and compresses them with [`miniz_oxide`] so that every
//! [`EncoderParams`] combination can be expressed,
//! and then lets [`png`] write the chunks around them.

use crate::{
    search::{EncoderParams, Filter, RasterEncoder, Strategy},
    ByteBuffer, ColorType, Error, Palette, Raster, Rgba, BIT_DEPTH,
};
use miniz_oxide::deflate::core::{
    compress_to_output, create_comp_flags_from_zip_params, CompressionStrategy, CompressorOxide,
    TDEFLFlush, TDEFLStatus,
};
use std::{fs, path::Path};

/// Converts a decoder error.
#[allow(clippy::needless_pass_by_value)]
fn decode_error(error: png::DecodingError) -> Error {
    match error {
        png::DecodingError::IoError(error) => Error::Io(error),
        error => Error::Decode(error.to_string()),
    }
}

/// Converts an encoder error.
#[allow(clippy::needless_pass_by_value)]
fn encode_error(error: png::EncodingError) -> Error {
    Error::Encode(error.to_string())
}

/// Converts each pixel of `channels` bytes into tightly packed Rgba bytes.
fn expand(
    data: &[u8],
    line_size: usize,
    width: usize,
    channels: usize,
    to_rgba: impl Fn(&[u8]) -> Rgba,
) -> Vec<u8> {
    data.chunks_exact(line_size)
        .flat_map(|row| row[..width * channels].chunks_exact(channels))
        .flat_map(|pixel| to_rgba(pixel).to_array())
        .collect()
}

/// Decodes a PNG image into a raster.
///
/// Rgb and Rgba images are kept as they are, and palette images stay indexed
/// with any transparency merged into the palette.
/// Greyscale images are expanded to Rgb, or Rgba if they have alpha.
/// A transparent color key on an Rgb or greyscale image becomes an alpha channel.
///
/// # Errors
/// Returns [`Error::UnsupportedDepth`] for images with other than 8 bits per channel,
/// and [`Error::Decode`] if the data is not a valid PNG image.
pub fn decode(bytes: &[u8]) -> Result<Raster, Error> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().map_err(decode_error)?;

    let info = reader.info();
    if info.bit_depth != png::BitDepth::Eight {
        return Err(Error::UnsupportedDepth(info.bit_depth as u8));
    }
    let color_type = info.color_type;
    let palette = info.palette.as_ref().map(|palette| palette.to_vec());
    let trns = info.trns.as_ref().map(|trns| trns.to_vec());

    let mut data = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut data).map_err(decode_error)?;
    data.truncate(frame.buffer_size());

    let (width, height, line_size) = (frame.width, frame.height, frame.line_size);
    let w = width as usize;
    let tight = |data, color_type: ColorType| {
        let stride = w * color_type.channels();
        Raster::from_vec(width, height, BIT_DEPTH, stride, color_type, data)
    };

    match color_type {
        png::ColorType::Rgb => match trns {
            Some(key) if key.len() >= 6 => {
                let key = [key[1], key[3], key[5]];
                let data = expand(&data, line_size, w, 3, |p| {
                    let alpha = if p == key { 0 } else { u8::MAX };
                    Rgba::new(p[0], p[1], p[2], alpha)
                });
                tight(data, ColorType::Rgba)
            }
            _ => Raster::from_vec(width, height, BIT_DEPTH, line_size, ColorType::Rgb, data),
        },
        png::ColorType::Rgba => {
            Raster::from_vec(width, height, BIT_DEPTH, line_size, ColorType::Rgba, data)
        }
        png::ColorType::Grayscale => match trns {
            Some(key) if key.len() >= 2 => {
                let key = key[1];
                let data = expand(&data, line_size, w, 1, |p| {
                    let alpha = if p[0] == key { 0 } else { u8::MAX };
                    Rgba::new(p[0], p[0], p[0], alpha)
                });
                tight(data, ColorType::Rgba)
            }
            _ => {
                let data = data
                    .chunks_exact(line_size)
                    .flat_map(|row| row[..w].iter().flat_map(|&v| [v, v, v]))
                    .collect();
                tight(data, ColorType::Rgb)
            }
        },
        png::ColorType::GrayscaleAlpha => {
            let data = expand(&data, line_size, w, 2, |p| Rgba::new(p[0], p[0], p[0], p[1]));
            tight(data, ColorType::Rgba)
        }
        png::ColorType::Indexed => {
            let rgb = palette.ok_or_else(|| Error::Decode("missing palette".into()))?;
            let alpha = trns.unwrap_or_default();
            let colors = rgb
                .chunks_exact(3)
                .enumerate()
                .map(|(i, c)| Rgba::new(c[0], c[1], c[2], alpha.get(i).copied().unwrap_or(u8::MAX)))
                .collect::<Vec<_>>();

            let mut raster =
                Raster::from_vec(width, height, BIT_DEPTH, line_size, ColorType::Indexed, data)?;
            raster.set_palette(Some(Palette::try_from(colors)?));
            Ok(raster)
        }
    }
}

/// Reads and decodes the PNG file at `path`.
///
/// # Errors
/// Fails if the file cannot be read, or for the reasons given in [`decode`].
pub fn read(path: impl AsRef<Path>) -> Result<Raster, Error> {
    decode(&fs::read(path)?)
}

/// The PNG filter type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RowFilter {
    /// Unfiltered.
    None = 0,
    /// Left.
    Sub = 1,
    /// Above.
    Up = 2,
    /// Mean of left and above.
    Average = 3,
    /// Paeth predictor.
    Paeth = 4,
}

impl RowFilter {
    /// Every filter type in type byte order.
    const ALL: [Self; 5] = [Self::None, Self::Sub, Self::Up, Self::Average, Self::Paeth];
}

/// The Paeth predictor of the left `a`, above `b` and upper left `c` bytes.
#[inline]
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (ia, ib, ic) = (i16::from(a), i16::from(b), i16::from(c));
    let p = ia + ib - ic;
    let (pa, pb, pc) = ((p - ia).abs(), (p - ib).abs(), (p - ic).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Writes the filtered bytes of `row` into `out`.
///
/// `prev` is the previous unfiltered row, all zeros for the first row.
fn filter_row(filter: RowFilter, bpp: usize, row: &[u8], prev: &[u8], out: &mut [u8]) {
    for i in 0..row.len() {
        let x = row[i];
        let a = if i >= bpp { row[i - bpp] } else { 0 };
        let b = prev[i];
        let c = if i >= bpp { prev[i - bpp] } else { 0 };

        #[allow(clippy::cast_possible_truncation)]
        let predicted = match filter {
            RowFilter::None => 0,
            RowFilter::Sub => a,
            RowFilter::Up => b,
            RowFilter::Average => ((u16::from(a) + u16::from(b)) / 2) as u8,
            RowFilter::Paeth => paeth(a, b, c),
        };

        out[i] = x.wrapping_sub(predicted);
    }
}

/// The adaptive filter heuristic: the sum of the filtered bytes taken as signed magnitudes.
fn signed_sum(bytes: &[u8]) -> u64 {
    #[allow(clippy::cast_possible_wrap)]
    let magnitude = |b: u8| u64::from((b as i8).unsigned_abs());
    bytes.iter().copied().map(magnitude).sum()
}

/// Filters every row of `raster`, prefixing each with its filter type byte.
fn filter_image(raster: &Raster, filter: Filter) -> Vec<u8> {
    let bpp = raster.bytes_per_pixel();
    let row_len = raster.row_len();
    let mut output = Vec::with_capacity((row_len + 1) * raster.height() as usize);

    let zeros = vec![0; row_len];
    let mut prev: &[u8] = &zeros;
    let mut scratch = vec![0; row_len];
    let mut best = vec![0; row_len];

    for row in raster.rows() {
        let chosen = match filter {
            Filter::None => RowFilter::None,
            Filter::Sub => RowFilter::Sub,
            Filter::Up => RowFilter::Up,
            Filter::Average => RowFilter::Average,
            Filter::Paeth => RowFilter::Paeth,
            Filter::Adaptive => {
                let mut min = (u64::MAX, RowFilter::None);
                for candidate in RowFilter::ALL {
                    filter_row(candidate, bpp, row, prev, &mut scratch);
                    let sum = signed_sum(&scratch);
                    if sum < min.0 {
                        min = (sum, candidate);
                        best.copy_from_slice(&scratch);
                    }
                }
                output.push(min.1 as u8);
                output.extend_from_slice(&best);
                prev = row;
                continue;
            }
        };

        filter_row(chosen, bpp, row, prev, &mut scratch);
        output.push(chosen as u8);
        output.extend_from_slice(&scratch);
        prev = row;
    }

    output
}

/// Compresses `data` into a zlib stream.
fn deflate(data: &[u8], level: u8, strategy: Strategy) -> Result<ByteBuffer, Error> {
    let strategy = match strategy {
        Strategy::Default => CompressionStrategy::Default,
        Strategy::Filtered => CompressionStrategy::Filtered,
        Strategy::HuffmanOnly => CompressionStrategy::HuffmanOnly,
        Strategy::Rle => CompressionStrategy::RLE,
        Strategy::Fixed => CompressionStrategy::Fixed,
    };

    let flags = create_comp_flags_from_zip_params(i32::from(level), 15, strategy as i32);
    let mut compressor = CompressorOxide::new(flags);
    let mut output = ByteBuffer::with_capacity(data.len() / 2 + 64);

    let (status, _) = compress_to_output(&mut compressor, data, TDEFLFlush::Finish, |chunk| {
        output.append(chunk);
        true
    });

    if status == TDEFLStatus::Done {
        Ok(output)
    } else {
        Err(Error::Encode(format!("deflate stopped with status {status:?}")))
    }
}

/// Writes the PNG chunks around the compressed image data.
fn frame(raster: &Raster, idat: &[u8]) -> Result<ByteBuffer, Error> {
    let mut output = ByteBuffer::with_capacity(idat.len() + 1024);

    {
        let mut encoder = png::Encoder::new(&mut output, raster.width(), raster.height());
        encoder.set_depth(png::BitDepth::Eight);

        match raster.color_type() {
            ColorType::Rgb => encoder.set_color(png::ColorType::Rgb),
            ColorType::Rgba => encoder.set_color(png::ColorType::Rgba),
            ColorType::Indexed => {
                let palette = raster
                    .palette()
                    .filter(|palette| !palette.is_empty())
                    .ok_or_else(|| Error::Encode("indexed raster has no palette".into()))?;

                encoder.set_color(png::ColorType::Indexed);
                encoder.set_palette(
                    palette
                        .iter()
                        .flat_map(|c| [c.r, c.g, c.b])
                        .collect::<Vec<_>>(),
                );

                if palette.has_transparency() {
                    // trailing opaque entries can be left out
                    let len = palette.iter().rposition(|c| c.a != u8::MAX).map_or(0, |i| i + 1);
                    encoder.set_trns(palette[..len].iter().map(|c| c.a).collect::<Vec<_>>());
                }
            }
        }

        let mut writer = encoder.write_header().map_err(encode_error)?;
        writer.write_chunk(png::chunk::IDAT, idat).map_err(encode_error)?;
        writer.finish().map_err(encode_error)?;
    }

    Ok(output)
}

/// An encoder for PNG images that honors every [`EncoderParams`] setting.
///
/// Premultiplied rasters are divided by their alpha again before encoding.
///
/// # Examples
/// ```
/// # use pngsqueeze::{codec::{self, PngEncoder}, Raster, ColorType};
/// # use pngsqueeze::search::{EncoderParams, RasterEncoder};
/// # fn main() -> Result<(), pngsqueeze::Error> {
/// let raster = Raster::from_vec(2, 1, 8, 6, ColorType::Rgb, vec![255, 0, 0, 0, 0, 255])?;
/// let png = PngEncoder.encode(&raster, &EncoderParams::default())?;
/// assert_eq!(codec::decode(&png)?, raster);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PngEncoder;

impl RasterEncoder for PngEncoder {
    fn encode(&self, raster: &Raster, params: &EncoderParams) -> Result<ByteBuffer, Error> {
        let straight;
        let raster = if raster.is_premultiplied() {
            straight = raster.clone().unpremultiply();
            &straight
        } else {
            raster
        };

        let filtered = filter_image(raster, params.filter);
        let idat = deflate(&filtered, params.level, params.strategy)?;
        frame(raster, &idat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{search::ParameterSet, tests::*};

    fn encode_with(raster: &Raster, params: EncoderParams) -> ByteBuffer {
        PngEncoder.encode(raster, &params).unwrap()
    }

    /// Encodes with the `png` crate for inputs this crate never produces.
    fn reference_png(
        (width, height): (u32, u32),
        color: png::ColorType,
        depth: png::BitDepth,
        data: &[u8],
        trns: Option<Vec<u8>>,
    ) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, width, height);
            encoder.set_color(color);
            encoder.set_depth(depth);
            if let Some(trns) = trns {
                encoder.set_trns(trns);
            }
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(data).unwrap();
        }
        bytes
    }

    #[test]
    fn rgb_and_rgba_round_trip() {
        let colors = test_colors(37 * 23, 1);
        let rgba = rgba_raster(37, 23, &colors);
        assert_eq!(decode(&encode_with(&rgba, EncoderParams::default())).unwrap(), rgba);

        let rgb = rgb_raster(37, 23, &colors);
        assert_eq!(decode(&encode_with(&rgb, EncoderParams::default())).unwrap(), rgb);
    }

    #[test]
    fn every_parameter_round_trips() {
        let raster = rgba_raster(19, 11, &test_colors(19 * 11, 2));
        for params in ParameterSet::Exhaustive.candidates() {
            let decoded = decode(&encode_with(&raster, params)).unwrap();
            assert_eq!(decoded, raster, "{params}");
        }
    }

    #[test]
    fn padding_is_not_encoded() {
        let data = vec![
            1, 2, 3, 4, 5, 6, 99, //
            7, 8, 9, 10, 11, 12, 99,
        ];
        let raster = Raster::from_vec(2, 2, 8, 7, ColorType::Rgb, data).unwrap();
        let decoded = decode(&encode_with(&raster, EncoderParams::default())).unwrap();
        assert_eq!(decoded.stride(), 6);
        assert!(decoded.pixels().eq(raster.pixels()));
    }

    #[test]
    fn indexed_round_trip_with_transparency() {
        let palette = Palette::try_from(vec![
            Rgba::new(1, 2, 3, 0),
            Rgba::new(4, 5, 6, 128),
            Rgba::opaque(7, 8, 9),
        ])
        .unwrap();
        let raster = Raster::indexed(3, 2, vec![0, 1, 2, 2, 1, 0], palette).unwrap();
        let decoded = decode(&encode_with(&raster, EncoderParams::default())).unwrap();
        assert_eq!(decoded, raster);

        let opaque = Raster::indexed(2, 1, vec![1, 0], Palette::grey_ramp()).unwrap();
        assert_eq!(decode(&encode_with(&opaque, EncoderParams::default())).unwrap(), opaque);
    }

    #[test]
    fn adaptive_is_no_larger_than_unfiltered_here() {
        // a smooth gradient favors prediction
        let colors = (0..64 * 64)
            .map(|i| {
                let (x, y) = ((i % 64) as u8, (i / 64) as u8);
                Rgba::opaque(x * 4, y * 4, x + y)
            })
            .collect::<Vec<_>>();
        let raster = rgb_raster(64, 64, &colors);
        let none = encode_with(&raster, EncoderParams::new(9, Strategy::Default, Filter::None));
        let adaptive =
            encode_with(&raster, EncoderParams::new(9, Strategy::Default, Filter::Adaptive));
        assert!(adaptive.len() <= none.len());
    }

    #[test]
    fn premultiplied_is_stored_straight() {
        let raster = rgba_raster(2, 1, &[Rgba::new(200, 100, 50, 255), Rgba::new(200, 100, 50, 0)]);
        let premultiplied = raster.clone().premultiply();
        let decoded = decode(&encode_with(&premultiplied, EncoderParams::default())).unwrap();
        assert_eq!(decoded, premultiplied.unpremultiply());
    }

    #[test]
    fn greyscale_is_expanded() {
        let png =
            reference_png((2, 1), png::ColorType::Grayscale, png::BitDepth::Eight, &[10, 20], None);
        let raster = decode(&png).unwrap();
        assert_eq!(raster.color_type(), ColorType::Rgb);
        assert_eq!(raster.data(), &[10, 10, 10, 20, 20, 20]);

        let png = reference_png(
            (2, 1),
            png::ColorType::GrayscaleAlpha,
            png::BitDepth::Eight,
            &[10, 1, 20, 2],
            None,
        );
        let raster = decode(&png).unwrap();
        assert_eq!(raster.color_type(), ColorType::Rgba);
        assert_eq!(raster.data(), &[10, 10, 10, 1, 20, 20, 20, 2]);
    }

    #[test]
    fn color_key_becomes_alpha() {
        let png = reference_png(
            (2, 1),
            png::ColorType::Grayscale,
            png::BitDepth::Eight,
            &[10, 20],
            Some(vec![0, 20]),
        );
        assert_eq!(decode(&png).unwrap().data(), &[10, 10, 10, 255, 20, 20, 20, 0]);

        let png = reference_png(
            (2, 1),
            png::ColorType::Rgb,
            png::BitDepth::Eight,
            &[1, 2, 3, 4, 5, 6],
            Some(vec![0, 1, 0, 2, 0, 3]),
        );
        assert_eq!(decode(&png).unwrap().data(), &[1, 2, 3, 0, 4, 5, 6, 255]);
    }

    #[test]
    fn other_depths_are_rejected() {
        let png =
            reference_png((2, 1), png::ColorType::Rgb, png::BitDepth::Sixteen, &[0; 12], None);
        assert!(matches!(decode(&png), Err(Error::UnsupportedDepth(16))));

        let png = reference_png(
            (8, 1),
            png::ColorType::Grayscale,
            png::BitDepth::One,
            &[0b1010_1010],
            None,
        );
        assert!(matches!(decode(&png), Err(Error::UnsupportedDepth(1))));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode(b"definitely not a png"), Err(Error::Decode(_))));
    }

    #[test]
    fn paeth_prefers_left_on_ties() {
        assert_eq!(paeth(10, 10, 10), 10);
        assert_eq!(paeth(1, 200, 1), 200);
        assert_eq!(paeth(200, 1, 1), 200);
        assert_eq!(paeth(50, 60, 255), 50);
    }
}
