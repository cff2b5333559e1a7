//! The numeric payload of scalar leaves.
//!
//! A [`ScalarValue`] is an exact integer, an exact rational, or an arbitrary-precision float.
//! Mixed-variant arithmetic promotes to the more general variant (integer → rational → float),
//! and rational results with a denominator of one collapse back to integers, so a value has
//! exactly one canonical representation.
//!
//! Structural equality is *per variant*: `Int(2)` and `Float(2.0)` are different values as far
//! as the expression model is concerned (they hash differently and compare unequal), mirroring
//! the distinction the rest of the tree machinery relies on. Numeric comparison across variants
//! is available separately through [`ScalarValue::numerically_eq`].

use crate::primitive::{float, int};
use rug::ops::Pow;
use rug::{Float, Integer, Rational};
use std::cmp::Ordering;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An exact or floating-point scalar literal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScalarValue {
    /// An arbitrary-precision integer.
    Int(Integer),

    /// An arbitrary-precision rational, never with denominator one.
    Ratio(Rational),

    /// An arbitrary-precision float.
    Float(Float),
}

/// [`Eq`] is implemented manually to allow [`ScalarValue::Float`]s in the variant set. This
/// module **must never** produce non-normal [`Float`]s (such as `NaN` or `Infinity`)! Report any
/// bugs that cause this to happen.
impl Eq for ScalarValue {}

/// [`Hash`] is implemented manually to allow hashing [`ScalarValue::Float`]s; see the [`Eq`]
/// caveat about non-normal floats.
impl std::hash::Hash for ScalarValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::Int(n) => n.hash(state),
            Self::Ratio(r) => {
                r.numer().hash(state);
                r.denom().hash(state);
            },
            Self::Float(f) => f.get_significand().unwrap().hash(state),
        }
    }
}

impl ScalarValue {
    /// Creates an integer value.
    pub fn integer(n: impl Into<i64>) -> Self {
        Self::Int(int(n.into()))
    }

    /// Creates a value from a rational, collapsing denominator one to an integer.
    pub fn from_rational(r: Rational) -> Self {
        if *r.denom() == 1 {
            Self::Int(r.into_numer_denom().0)
        } else {
            Self::Ratio(r)
        }
    }

    /// Returns true if this value is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Int(n) => n.is_zero(),
            Self::Ratio(_) => false,
            Self::Float(f) => f.is_zero(),
        }
    }

    /// Returns true if this value is one.
    pub fn is_one(&self) -> bool {
        match self {
            Self::Int(n) => *n == 1,
            Self::Ratio(_) => false,
            Self::Float(f) => *f == 1,
        }
    }

    /// Returns true if this value is an integer equal to `n`.
    pub fn is_int(&self, n: i64) -> bool {
        matches!(self, Self::Int(v) if *v == n)
    }

    /// Adds two values, promoting variants as needed.
    pub fn add(&self, other: &Self) -> Self {
        use ScalarValue::*;
        match (self, other) {
            (Int(a), Int(b)) => Int(Integer::from(a + b)),
            (Float(a), b) => Float(b.to_float() + a),
            (a, Float(b)) => Float(a.to_float() + b),
            (a, b) => Self::from_rational(a.to_rational() + b.to_rational()),
        }
    }

    /// Multiplies two values, promoting variants as needed.
    pub fn mul(&self, other: &Self) -> Self {
        use ScalarValue::*;
        match (self, other) {
            (Int(a), Int(b)) => Int(Integer::from(a * b)),
            (Float(a), b) => Float(b.to_float() * a),
            (a, Float(b)) => Float(a.to_float() * b),
            (a, b) => Self::from_rational(a.to_rational() * b.to_rational()),
        }
    }

    /// Negates this value.
    pub fn neg(&self) -> Self {
        match self {
            Self::Int(n) => Self::Int(Integer::from(-n)),
            Self::Ratio(r) => Self::Ratio(Rational::from(-r)),
            Self::Float(f) => Self::Float(rug::Float::with_val(f.prec(), -f)),
        }
    }

    /// Raises this value to the power of `exp`, if the result is representable exactly (or both
    /// operands are floats). Returns `None` when the power must stay symbolic, e.g. an exact
    /// integer raised to a fractional exponent.
    pub fn checked_pow(&self, exp: &Self) -> Option<Self> {
        use ScalarValue::*;
        match (self, exp) {
            (base, Int(e)) => {
                let e32 = e.to_i32()?;
                match base {
                    Float(f) => Some(Float(f.clone().pow(e32))),
                    _ => {
                        let r = base.to_rational();
                        if r == 0 && e32 < 0 {
                            return None;
                        }
                        let powed = if e32 < 0 {
                            let inv = Rational::from(r.recip_ref());
                            pow_rational(inv, e32.unsigned_abs())
                        } else {
                            pow_rational(r, e32 as u32)
                        };
                        Some(Self::from_rational(powed))
                    },
                }
            },
            (Float(f), e) => Some(Float(f.clone().pow(e.to_float()))),
            (base, Float(e)) => Some(Float(base.to_float().pow(e))),
            _ => None,
        }
    }

    /// Compares two values numerically, across variants.
    pub fn numerically_eq(&self, other: &Self) -> bool {
        self.numeric_cmp(other) == Ordering::Equal
    }

    /// Numeric ordering across variants; exact when both sides are exact.
    pub fn numeric_cmp(&self, other: &Self) -> Ordering {
        use ScalarValue::*;
        match (self, other) {
            (Float(a), b) => a.partial_cmp(&b.to_float()).unwrap(),
            (a, Float(b)) => a.to_float().partial_cmp(b).unwrap(),
            (a, b) => a.to_rational().cmp(&b.to_rational()),
        }
    }

    fn to_rational(&self) -> Rational {
        match self {
            Self::Int(n) => Rational::from(n),
            Self::Ratio(r) => r.clone(),
            // exact variants only; callers promote floats before getting here
            Self::Float(f) => f.to_rational().unwrap(),
        }
    }

    fn to_float(&self) -> Float {
        match self {
            Self::Int(n) => float(n),
            Self::Ratio(r) => float(r),
            Self::Float(f) => f.clone(),
        }
    }
}

/// `Rational` exponentiation by a non-negative machine exponent.
fn pow_rational(base: Rational, exp: u32) -> Rational {
    let (numer, denom) = base.into_numer_denom();
    Rational::from((numer.pow(exp), denom.pow(exp)))
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        Self::Int(int(n))
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Ratio(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Self::Float(x) => write!(f, "{}", x.to_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::primitive::ratio;
    use pretty_assertions::assert_eq;
    use super::*;

    #[test]
    fn rational_collapses_to_int() {
        let half = ScalarValue::from_rational(ratio(1, 2));
        let sum = half.add(&half);
        assert_eq!(sum, ScalarValue::integer(1));
        assert!(sum.is_one());
    }

    #[test]
    fn variants_are_structurally_distinct() {
        let two = ScalarValue::integer(2);
        let two_f = ScalarValue::Float(float(2));
        assert_ne!(two, two_f);
        assert!(two.numerically_eq(&two_f));
    }

    #[test]
    fn pow_stays_exact() {
        let two = ScalarValue::integer(2);
        assert_eq!(
            two.checked_pow(&ScalarValue::integer(10)),
            Some(ScalarValue::integer(1024)),
        );
        assert_eq!(
            two.checked_pow(&ScalarValue::integer(-2)),
            Some(ScalarValue::from_rational(ratio(1, 4))),
        );
        // 2^(1/2) is not exactly representable
        let half = ScalarValue::from_rational(ratio(1, 2));
        assert_eq!(two.checked_pow(&half), None);
    }

    #[test]
    fn zero_pow_negative_stays_symbolic() {
        let zero = ScalarValue::integer(0);
        assert_eq!(zero.checked_pow(&ScalarValue::integer(-1)), None);
    }
}
