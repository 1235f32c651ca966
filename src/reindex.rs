//! Reordering and compacting the palette of an indexed raster.
//!
//! The order of palette entries does not change how an image looks,
//! but it does change the index bytes the compressor sees.
//! Sorting entries by how often they are used tends to give the filters smoother data.

use crate::{ColorType, Error, Palette, Raster, MAX_K};
use ordered_float::OrderedFloat;

/// How to order palette entries that are used by the same number of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TieBreak {
    /// Darker entries first, by Rec. 709 luma.
    #[default]
    Luma,
    /// Lexicographic order of the `(r, g, b, a)` channels.
    Lexicographic,
}

/// The direction to sort palette entries by usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteOrder {
    /// Least used entries first.
    Ascending,
    /// Most used entries first. The exact reverse of [`PaletteOrder::Ascending`].
    Descending,
}

impl PaletteOrder {
    /// Both orders.
    pub const ALL: [Self; 2] = [Self::Ascending, Self::Descending];
}

/// Returns an error unless `raster` is indexed with a palette.
fn indexed_palette(raster: &Raster) -> Result<&Palette, Error> {
    match (raster.color_type(), raster.palette()) {
        (ColorType::Indexed, Some(palette)) => Ok(palette),
        _ => Err(Error::Configuration(
            "palette reordering requires an indexed raster with a palette".into(),
        )),
    }
}

/// Counts how many pixels use each palette index.
///
/// The result has one entry per palette entry.
/// Pixels with an index outside of the palette are not counted.
///
/// # Errors
/// Fails if `raster` is not indexed.
pub fn index_histogram(raster: &Raster) -> Result<Vec<u32>, Error> {
    let palette = indexed_palette(raster)?;
    let mut counts = [0u32; MAX_K];
    for row in raster.rows() {
        for &i in row {
            counts[usize::from(i)] += 1;
        }
    }
    Ok(counts[..palette.len()].to_vec())
}

/// Sorts the palette indices of `raster` by the number of pixels using them.
///
/// The result is a permutation of `0..palette.len()`.
///
/// # Errors
/// Fails if `raster` is not indexed.
///
/// # Examples
/// ```
/// # use pngsqueeze::{reindex::*, Palette, Raster, Rgba};
/// # fn main() -> Result<(), pngsqueeze::Error> {
/// let palette = Palette::try_from(vec![Rgba::grey(200), Rgba::grey(10), Rgba::grey(90)])?;
/// let raster = Raster::indexed(4, 1, vec![0, 0, 1, 2], palette)?;
///
/// let order = frequency_order(&raster, PaletteOrder::Ascending, TieBreak::Luma)?;
/// assert_eq!(order, vec![1, 2, 0]);
///
/// let order = frequency_order(&raster, PaletteOrder::Descending, TieBreak::Luma)?;
/// assert_eq!(order, vec![0, 2, 1]);
/// # Ok(())
/// # }
/// ```
pub fn frequency_order(
    raster: &Raster,
    order: PaletteOrder,
    tie_break: TieBreak,
) -> Result<Vec<u8>, Error> {
    let palette = indexed_palette(raster)?;
    let counts = index_histogram(raster)?;

    #[allow(clippy::cast_possible_truncation)]
    let mut indices = (0..palette.len()).map(|i| i as u8).collect::<Vec<_>>();

    match tie_break {
        TieBreak::Luma => indices.sort_by_key(|&i| {
            let i = usize::from(i);
            (counts[i], OrderedFloat(palette[i].luma()))
        }),
        TieBreak::Lexicographic => indices.sort_by_key(|&i| {
            let i = usize::from(i);
            (counts[i], palette[i])
        }),
    }

    if order == PaletteOrder::Descending {
        indices.reverse();
    }

    Ok(indices)
}

/// Permutes the palette of `raster` so that new index `k` holds old entry `order[k]`,
/// and rewrites the pixel bytes to match.
///
/// The colors of the image are unchanged.
/// Row padding is copied as is.
///
/// # Errors
/// Fails if `raster` is not indexed or `order` is not a permutation of the palette indices.
pub fn reindex(raster: &Raster, order: &[u8]) -> Result<Raster, Error> {
    let palette = indexed_palette(raster)?;

    let mut remap = [None; MAX_K];
    for (new, &old) in order.iter().enumerate() {
        let old = usize::from(old);
        if old >= palette.len() || remap[old].is_some() {
            return Err(Error::Configuration(format!(
                "palette order is not a permutation: index {old} is out of range or repeated"
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            remap[old] = Some(new as u8);
        }
    }
    if order.len() != palette.len() {
        return Err(Error::Configuration(format!(
            "palette order has {} entries for a palette of {}",
            order.len(),
            palette.len()
        )));
    }

    let new_palette = Palette::new_unchecked(
        order.iter().map(|&old| palette[usize::from(old)]).collect(),
    );

    let mut output = raster.clone();
    for y in 0..output.height() {
        for i in output.row_mut(y) {
            // out of range indices stay out of range
            if let Some(new) = remap[usize::from(*i)] {
                *i = new;
            }
        }
    }
    output.set_palette(Some(new_palette));

    Ok(output)
}

/// Removes the palette entries that no pixel uses, keeping the order of the rest.
///
/// # Errors
/// Fails if `raster` is not indexed.
pub fn compact(raster: &Raster) -> Result<Raster, Error> {
    let counts = index_histogram(raster)?;

    #[allow(clippy::cast_possible_truncation)]
    let used = counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(i, _)| i as u8)
        .collect::<Vec<_>>();

    if used.len() == counts.len() {
        return Ok(raster.clone());
    }

    let palette = indexed_palette(raster)?;
    let mut remap = [0u8; MAX_K];
    for (new, &old) in used.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        {
            remap[usize::from(old)] = new as u8;
        }
    }

    let mut output = raster.clone();
    for y in 0..output.height() {
        for i in output.row_mut(y) {
            if usize::from(*i) < palette.len() {
                *i = remap[usize::from(*i)];
            }
        }
    }
    output.set_palette(Some(Palette::new_unchecked(
        used.iter().map(|&i| palette[usize::from(i)]).collect(),
    )));

    Ok(output)
}
