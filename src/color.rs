//! Color types for 8-bit channels and their 64-bit accumulators.

use crate::fixed::{fixdiv, fixmul};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A color with four 8-bit channels, each representing a value in `[0, 1)`.
///
/// The derived ordering is lexicographic over `(r, g, b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rgba {
    /// The red channel.
    pub r: u8,
    /// The green channel.
    pub g: u8,
    /// The blue channel.
    pub b: u8,
    /// The alpha channel, `255` is fully opaque.
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black, the color of an empty centroid.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Creates a new color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a fully opaque color.
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, u8::MAX)
    }

    /// Creates a fully opaque grey.
    #[must_use]
    pub const fn grey(v: u8) -> Self {
        Self::opaque(v, v, v)
    }

    /// Creates a color from a `[r, g, b, a]` array.
    #[must_use]
    pub const fn from_array([r, g, b, a]: [u8; 4]) -> Self {
        Self::new(r, g, b, a)
    }

    /// Returns the channels as a `[r, g, b, a]` array.
    #[must_use]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// The sum of the squared channel differences, alpha included.
    #[must_use]
    #[inline]
    pub fn squared_distance(self, other: Self) -> u32 {
        self.to_array()
            .into_iter()
            .zip(other.to_array())
            .map(|(x, y)| {
                let diff = u32::from(x.abs_diff(y));
                diff * diff
            })
            .sum()
    }

    /// Rec. 709 luma of the (gamma encoded) color channels in `[0, 1]`.
    #[must_use]
    pub fn luma(self) -> f64 {
        let [r, g, b, _] = self.to_array().map(|c| f64::from(c) / 255.0);
        0.2126 * r + 0.7152 * g + 0.0722 * b
    }

    /// Multiplies the color channels by alpha. Opaque colors are returned unchanged.
    #[must_use]
    pub fn premultiplied(self) -> Self {
        if self.a == u8::MAX {
            self
        } else {
            Self::new(
                fixmul(self.r, self.a),
                fixmul(self.g, self.a),
                fixmul(self.b, self.a),
                self.a,
            )
        }
    }

    /// Divides the color channels by alpha. Opaque colors are returned unchanged.
    #[must_use]
    pub fn unpremultiplied(self) -> Self {
        if self.a == u8::MAX {
            self
        } else {
            Self::new(
                fixdiv(self.r, self.a),
                fixdiv(self.g, self.a),
                fixdiv(self.b, self.a),
                self.a,
            )
        }
    }
}

impl From<[u8; 4]> for Rgba {
    fn from(value: [u8; 4]) -> Self {
        Self::from_array(value)
    }
}

impl From<Rgba> for [u8; 4] {
    fn from(value: Rgba) -> Self {
        value.to_array()
    }
}

/// An [`Rgba`] widened to 64-bit channels for summing many colors without overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba64 {
    /// The red channel sum.
    pub r: u64,
    /// The green channel sum.
    pub g: u64,
    /// The blue channel sum.
    pub b: u64,
    /// The alpha channel sum.
    pub a: u64,
}

impl Rgba64 {
    /// The channels as a `[r, g, b, a]` array.
    #[must_use]
    pub const fn to_array(self) -> [u64; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Divides each channel by `count`, rounding to nearest, and narrows back to 8 bits.
    ///
    /// A `count` of zero gives [`Rgba::TRANSPARENT`].
    #[must_use]
    pub fn mean(self, count: u64) -> Rgba {
        if count == 0 {
            return Rgba::TRANSPARENT;
        }

        let [r, g, b, a] = self.to_array().map(|sum| {
            let mean = (sum + count / 2) / count;
            #[allow(clippy::cast_possible_truncation)]
            let mean = mean.min(u64::from(u8::MAX)) as u8;
            mean
        });

        Rgba::new(r, g, b, a)
    }
}

impl From<Rgba> for Rgba64 {
    fn from(c: Rgba) -> Self {
        Self {
            r: c.r.into(),
            g: c.g.into(),
            b: c.b.into(),
            a: c.a.into(),
        }
    }
}

impl Add for Rgba64 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            r: self.r + rhs.r,
            g: self.g + rhs.g,
            b: self.b + rhs.b,
            a: self.a + rhs.a,
        }
    }
}

impl Sub for Rgba64 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            r: self.r - rhs.r,
            g: self.g - rhs.g,
            b: self.b - rhs.b,
            a: self.a - rhs.a,
        }
    }
}

impl AddAssign<Rgba> for Rgba64 {
    fn add_assign(&mut self, rhs: Rgba) {
        *self = *self + Self::from(rhs);
    }
}

impl SubAssign<Rgba> for Rgba64 {
    fn sub_assign(&mut self, rhs: Rgba) {
        *self = *self - Self::from(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squared_distance_includes_alpha() {
        let a = Rgba::new(10, 20, 30, 255);
        let b = Rgba::new(13, 16, 30, 0);
        assert_eq!(a.squared_distance(b), 9 + 16 + 255 * 255);
        assert_eq!(a.squared_distance(a), 0);
        assert_eq!(
            Rgba::TRANSPARENT.squared_distance(Rgba::new(255, 255, 255, 255)),
            4 * 255 * 255
        );
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(Rgba::new(1, 0, 0, 0) > Rgba::new(0, 255, 255, 255));
        assert!(Rgba::new(1, 2, 3, 4) < Rgba::new(1, 2, 3, 5));
        assert!(Rgba::new(1, 2, 3, 255) < Rgba::new(1, 2, 4, 0));
    }

    #[test]
    fn mean_rounds_to_nearest() {
        let mut sum = Rgba64::default();
        sum += Rgba::new(0, 1, 10, 255);
        sum += Rgba::new(1, 2, 11, 255);
        assert_eq!(sum.mean(2), Rgba::new(1, 2, 11, 255));

        sum += Rgba::new(1, 2, 11, 255);
        sum -= Rgba::new(0, 1, 10, 255);
        assert_eq!(sum, Rgba64 { r: 2, g: 4, b: 22, a: 510 });
        assert_eq!(sum.mean(2), Rgba::new(1, 2, 11, 255));
    }

    #[test]
    fn empty_mean_is_transparent() {
        assert_eq!(Rgba64::default().mean(0), Rgba::TRANSPARENT);
    }

    #[test]
    fn premultiply_leaves_opaque_colors() {
        let c = Rgba::opaque(12, 200, 99);
        assert_eq!(c.premultiplied(), c);
        assert_eq!(c.unpremultiplied(), c);

        let c = Rgba::new(200, 100, 0, 128);
        assert_eq!(c.premultiplied(), Rgba::new(100, 50, 0, 128));
    }

    #[test]
    fn luma_weights() {
        assert!((Rgba::opaque(255, 255, 255).luma() - 1.0).abs() < 1e-12);
        assert!(Rgba::opaque(0, 255, 0).luma() > Rgba::opaque(255, 0, 0).luma());
        assert!(Rgba::opaque(255, 0, 0).luma() > Rgba::opaque(0, 0, 255).luma());
    }
}
