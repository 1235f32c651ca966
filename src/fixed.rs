//! 8-bit fixed point arithmetic.
//!
//! An 8-bit value `x` represents the fraction `x / 255` in the range `[0, 1]`,
//! so `255` acts as `1.0` for multiplication.

use std::sync::OnceLock;

/// Lookup table for [`fixdiv`], indexed by `divisor * 256 + dividend`.
static FIXDIV_TABLE: OnceLock<Vec<u8>> = OnceLock::new();

/// Multiplies two fixed point values, rounding to nearest.
///
/// This computes `round(x * y / 255)` exactly without a division.
///
/// ```
/// # use pngsqueeze::fixmul;
/// assert_eq!(fixmul(200, 255), 200);
/// assert_eq!(fixmul(200, 0), 0);
/// assert_eq!(fixmul(200, 128), 100);
/// ```
#[must_use]
#[inline]
pub fn fixmul(x: u8, y: u8) -> u8 {
    let t = u32::from(x) * u32::from(y) + 128;
    #[allow(clippy::cast_possible_truncation)]
    let product = ((t + (t >> 8)) >> 8) as u8;
    product
}

/// Divides two fixed point values, rounding to nearest.
///
/// The quotient of a value by a divisor that is not larger than it would be `>= 1.0`,
/// so it is clamped to `255`. This includes division by zero.
///
/// ```
/// # use pngsqueeze::fixdiv;
/// assert_eq!(fixdiv(100, 128), 199);
/// assert_eq!(fixdiv(128, 128), 255);
/// assert_eq!(fixdiv(7, 0), 255);
/// ```
#[must_use]
#[inline]
pub fn fixdiv(x: u8, y: u8) -> u8 {
    let table = FIXDIV_TABLE.get_or_init(|| {
        (0..=u8::MAX)
            .flat_map(|y| (0..=u8::MAX).map(move |x| fixdiv_exact(x, y)))
            .collect()
    });

    table[usize::from(y) << 8 | usize::from(x)]
}

/// Computes a single [`fixdiv`] table entry.
fn fixdiv_exact(x: u8, y: u8) -> u8 {
    if y <= x {
        u8::MAX
    } else {
        let (x, y) = (u32::from(x), u32::from(y));
        #[allow(clippy::cast_possible_truncation)]
        let quotient = ((x * 510 + y) / (2 * y)) as u8;
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_pairs() -> impl Iterator<Item = (u8, u8)> {
        (0..=u8::MAX).flat_map(|x| (0..=u8::MAX).map(move |y| (x, y)))
    }

    #[test]
    fn multiply_by_one_is_identity() {
        for x in 0..=u8::MAX {
            assert_eq!(fixmul(x, 255), x);
            assert_eq!(fixmul(255, x), x);
        }
    }

    #[test]
    fn multiply_by_zero_is_zero() {
        for x in 0..=u8::MAX {
            assert_eq!(fixmul(x, 0), 0);
        }
    }

    #[test]
    fn multiply_matches_float_rounding() {
        for (x, y) in all_pairs() {
            let expected = (f64::from(x) * f64::from(y) / 255.0).round();
            assert_eq!(f64::from(fixmul(x, y)), expected, "{x} * {y}");
            assert_eq!(fixmul(x, y), fixmul(y, x));
        }
    }

    #[test]
    fn divide_clamps() {
        for (x, y) in all_pairs() {
            if y <= x {
                assert_eq!(fixdiv(x, y), 255);
            } else {
                assert!(fixdiv(x, y) < 255);
            }
        }
    }

    #[test]
    fn divide_undoes_multiply_by_one() {
        for x in 0..=u8::MAX {
            assert_eq!(fixdiv(fixmul(x, 255), 255), x);
        }
    }

    #[test]
    fn divide_inverts_multiply_within_rounding() {
        for (x, y) in all_pairs() {
            let product = fixmul(x, y);
            if product < y {
                let back = fixdiv(product, y);
                let bound = 127.5 / f64::from(y) + 0.5;
                assert!(
                    f64::from(back.abs_diff(x)) <= bound,
                    "fixdiv(fixmul({x}, {y}), {y}) = {back}"
                );
            }
        }
    }
}
