//! Contains various types needed across the crate.

use crate::{Rgba, MAX_COLORS, MAX_K};
use std::{
    error::Error,
    fmt::{Debug, Display},
    ops::Deref,
};

/// An error type for when the length of an input (e.g., `Vec` or slice)
/// is above the maximum supported value.
///
/// The inner value is the maximum supported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AboveMaxLen<T>(pub T);

impl<T: Display> Display for AboveMaxLen<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "above the maximum length of {}", self.0)
    }
}

impl<T: Debug + Display> Error for AboveMaxLen<T> {}

/// This type is used to specify the (maximum) number of colors to include in a palette.
///
/// This is a simple new type wrapper around `u16` with the invariant that it must be
/// less than or equal to [`MAX_COLORS`].
///
/// # Examples
/// Use `into` to create [`PaletteSize`]s from `u8`s.
/// For `u16`s, use `try_into` or [`PaletteSize::from_clamped`].
/// You can also use the [`PaletteSize::MAX`] constant.
///
/// ```
/// # use pngsqueeze::{PaletteSize, AboveMaxLen};
/// # fn main() -> Result<(), AboveMaxLen<u16>> {
/// let size = PaletteSize::from(16);
/// let size = PaletteSize::try_from(128u16)?;
/// let size = PaletteSize::from_clamped(1024);
/// assert_eq!(size, PaletteSize::MAX);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PaletteSize(u16);

impl PaletteSize {
    /// The maximum supported palette size (given by [`MAX_COLORS`]).
    pub const MAX: Self = Self(MAX_COLORS);

    /// Gets the inner `u16` value.
    #[must_use]
    pub const fn into_inner(self) -> u16 {
        self.0
    }

    /// Creates a [`PaletteSize`] by clamping the given `u16`
    /// to be less than or equal to [`MAX_COLORS`].
    #[must_use]
    pub const fn from_clamped(value: u16) -> Self {
        if value <= MAX_COLORS {
            Self(value)
        } else {
            Self(MAX_COLORS)
        }
    }

    /// The palette size as a `usize` for lengths and indexing.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for PaletteSize {
    fn default() -> Self {
        Self::MAX
    }
}

impl From<PaletteSize> for u16 {
    fn from(val: PaletteSize) -> Self {
        val.into_inner()
    }
}

impl From<u8> for PaletteSize {
    fn from(value: u8) -> Self {
        Self(value.into())
    }
}

impl TryFrom<u16> for PaletteSize {
    type Error = AboveMaxLen<u16>;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= MAX_COLORS {
            Ok(PaletteSize(value))
        } else {
            Err(AboveMaxLen(MAX_COLORS))
        }
    }
}

impl Display for PaletteSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_inner())
    }
}

/// An ordered color table with at most [`MAX_COLORS`] entries.
///
/// Entries are identified by their position, so a palette may contain the same color twice.
///
/// # Examples
/// ```
/// # use pngsqueeze::{Palette, Rgba, AboveMaxLen};
/// # fn main() -> Result<(), AboveMaxLen<u16>> {
/// let palette = Palette::try_from(vec![Rgba::opaque(0, 0, 0), Rgba::opaque(255, 255, 255)])?;
/// assert_eq!(palette.len(), 2);
///
/// let too_long = Palette::try_from(vec![Rgba::default(); 257]);
/// assert!(too_long.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Palette(Vec<Rgba>);

impl Palette {
    /// Creates a [`Palette`] without checking its length against [`MAX_COLORS`].
    pub(crate) fn new_unchecked(colors: Vec<Rgba>) -> Self {
        debug_assert!(colors.len() <= MAX_K);
        Self(colors)
    }

    /// A 256 entry opaque grey ramp where entry `i` is `(i, i, i)`.
    ///
    /// Used as the palette of per-pixel error rasters.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn grey_ramp() -> Self {
        Self((0..MAX_K).map(|i| Rgba::grey(i as u8)).collect())
    }

    /// Gets the inner `Vec`.
    #[must_use]
    pub fn into_inner(self) -> Vec<Rgba> {
        self.0
    }

    /// The number of entries as a `u16`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn num_colors(&self) -> u16 {
        self.0.len() as u16
    }

    /// Mutable access to the entries. The length cannot change through this.
    pub fn as_mut_slice(&mut self) -> &mut [Rgba] {
        &mut self.0
    }

    /// Whether any entry is not fully opaque.
    #[must_use]
    pub fn has_transparency(&self) -> bool {
        self.0.iter().any(|c| c.a != u8::MAX)
    }
}

impl Deref for Palette {
    type Target = [Rgba];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[Rgba]> for Palette {
    fn as_ref(&self) -> &[Rgba] {
        self
    }
}

impl From<Palette> for Vec<Rgba> {
    fn from(value: Palette) -> Self {
        value.into_inner()
    }
}

impl TryFrom<Vec<Rgba>> for Palette {
    type Error = AboveMaxLen<u16>;

    fn try_from(colors: Vec<Rgba>) -> Result<Self, Self::Error> {
        if colors.len() <= MAX_K {
            Ok(Self(colors))
        } else {
            Err(AboveMaxLen(MAX_COLORS))
        }
    }
}

impl<'a> IntoIterator for &'a Palette {
    type Item = &'a Rgba;
    type IntoIter = std::slice::Iter<'a, Rgba>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_size_bounds() {
        assert_eq!(PaletteSize::from_clamped(300), PaletteSize::MAX);
        assert_eq!(PaletteSize::try_from(256u16).map(PaletteSize::as_usize), Ok(MAX_K));
        assert_eq!(PaletteSize::try_from(257u16), Err(AboveMaxLen(MAX_COLORS)));
    }

    #[test]
    fn palette_length_is_checked() {
        let colors = vec![Rgba::opaque(1, 2, 3); MAX_K + 1];
        assert!(Palette::try_from(colors[..MAX_K].to_vec()).is_ok());
        assert_eq!(Palette::try_from(colors), Err(AboveMaxLen(MAX_COLORS)));
    }
}
