//! Functions to construct [`Integer`]s, [`Rational`]s, and [`Float`]s from various types.

use rug::{Assign, Float, Integer, Rational};

/// The number of digits of precision to use when computing float values.
pub const PRECISION: u32 = 1 << 9;

/// Creates an [`Integer`] with the given value.
pub fn int<T>(n: T) -> Integer
where
    Integer: From<T>,
{
    Integer::from(n)
}

/// Creates a [`Rational`] with the given numerator and denominator.
///
/// The result is automatically reduced to canonical form by [`rug`].
pub fn ratio<T, U>(numer: T, denom: U) -> Rational
where
    Integer: From<T> + From<U>,
{
    Rational::from((Integer::from(numer), Integer::from(denom)))
}

/// Creates a [`Float`] with the given value.
pub fn float<T>(n: T) -> Float
where
    Float: Assign<T>,
{
    Float::with_val(PRECISION, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_reduces() {
        assert_eq!(ratio(2, 4), ratio(1, 2));
        assert_eq!(ratio(6, 3), Rational::from(int(2)));
    }

    #[test]
    fn float_precision() {
        assert_eq!(float(1) / float(3) * float(3), float(1));
    }
}
