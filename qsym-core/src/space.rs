//! Hilbert-space bookkeeping.
//!
//! The engine does not interpret Hilbert spaces; it only needs enough structure to decide
//! *locality*: whether two operands act on disjoint degrees of freedom (and therefore commute
//! and may be canonically reordered), whether one space is contained in another, and what the
//! union of the spaces of an operation's children is. Dimensions are optional and only consulted
//! when an indexed sum enumerates a space's basis.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single local degree of freedom, identified by its label.
///
/// Two local spaces with the same label but different dimensions are distinct spaces; the
/// dimension participates in equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalSpace {
    /// The label identifying this degree of freedom.
    pub label: String,

    /// The dimension of this space, if a basis has been declared.
    pub dimension: Option<u64>,
}

impl LocalSpace {
    /// Creates a local space with no declared basis.
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), dimension: None }
    }

    /// Creates a local space with the given dimension.
    pub fn with_dimension(label: impl Into<String>, dimension: u64) -> Self {
        Self { label: label.into(), dimension: Some(dimension) }
    }
}

impl fmt::Display for LocalSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H({})", self.label)
    }
}

/// The Hilbert space an expression acts on.
///
/// The variant order here is meaningful: the derived [`Ord`] sorts the trivial space before any
/// local space, local spaces by label, products lexicographically, and the full space last. This
/// order is part of the canonical ordering key used by the normalization pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HilbertSpace {
    /// The trivial (zero-degree-of-freedom) space. Scalars live here.
    Trivial,

    /// A single local degree of freedom.
    Local(LocalSpace),

    /// A tensor product of two or more local spaces, kept sorted and deduplicated.
    Product(Vec<LocalSpace>),

    /// The full space, containing every local space.
    Full,
}

impl HilbertSpace {
    /// Creates a local space with no declared basis.
    pub fn local(label: impl Into<String>) -> Self {
        Self::Local(LocalSpace::new(label))
    }

    /// Creates a local space with the given dimension.
    pub fn local_with_dimension(label: impl Into<String>, dimension: u64) -> Self {
        Self::Local(LocalSpace::with_dimension(label, dimension))
    }

    /// Returns the local factors of this space. The trivial space has none; the full space has
    /// no *known* factors and also returns an empty slice.
    pub fn local_factors(&self) -> &[LocalSpace] {
        match self {
            Self::Trivial | Self::Full => &[],
            Self::Local(ls) => std::slice::from_ref(ls),
            Self::Product(factors) => factors,
        }
    }

    /// Returns true if this is the trivial space.
    pub fn is_trivial(&self) -> bool {
        matches!(self, Self::Trivial)
    }

    /// The tensor product (union of local factors) of two spaces.
    pub fn tensor(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Full, _) | (_, Self::Full) => Self::Full,
            (Self::Trivial, other) => other.clone(),
            (this, Self::Trivial) => this.clone(),
            (this, other) => {
                let mut factors = this.local_factors().to_vec();
                for factor in other.local_factors() {
                    if !factors.contains(factor) {
                        factors.push(factor.clone());
                    }
                }
                factors.sort();
                Self::from_factors(factors)
            },
        }
    }

    /// Returns true if the two spaces share no local factor.
    ///
    /// The trivial space is disjoint from everything, including itself; the full space overlaps
    /// everything except the trivial space.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Trivial, _) | (_, Self::Trivial) => true,
            (Self::Full, _) | (_, Self::Full) => false,
            (this, other) => {
                let factors = other.local_factors();
                !this.local_factors().iter().any(|f| factors.contains(f))
            },
        }
    }

    /// Returns true if every local factor of `other` is a factor of `self`.
    pub fn contains(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Full, _) => true,
            (_, Self::Trivial) => true,
            (_, Self::Full) => false,
            (this, other) => {
                let factors = this.local_factors();
                other.local_factors().iter().all(|f| factors.contains(f))
            },
        }
    }

    /// Removes the local factors of `other` from this space (used e.g. to derive the space left
    /// after a partial trace). The full space is unaffected.
    pub fn remove(&self, other: &Self) -> Self {
        match self {
            Self::Trivial | Self::Full => self.clone(),
            _ => {
                let removed = other.local_factors();
                let factors = self
                    .local_factors()
                    .iter()
                    .filter(|f| !removed.contains(f))
                    .cloned()
                    .collect();
                Self::from_factors(factors)
            },
        }
    }

    /// The total dimension of this space, if every local factor has a declared basis.
    pub fn dimension(&self) -> Option<u64> {
        match self {
            Self::Trivial => Some(1),
            Self::Full => None,
            _ => self
                .local_factors()
                .iter()
                .try_fold(1u64, |acc, f| f.dimension.map(|d| acc * d)),
        }
    }

    /// Builds a space from a sorted, deduplicated list of local factors, collapsing the empty
    /// and singleton cases.
    fn from_factors(mut factors: Vec<LocalSpace>) -> Self {
        match factors.len() {
            0 => Self::Trivial,
            1 => Self::Local(factors.remove(0)),
            _ => Self::Product(factors),
        }
    }
}

impl fmt::Display for HilbertSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trivial => write!(f, "TrivialSpace"),
            Self::Full => write!(f, "FullSpace"),
            Self::Local(ls) => write!(f, "{}", ls),
            Self::Product(factors) => {
                let mut iter = factors.iter();
                if let Some(factor) = iter.next() {
                    write!(f, "{}", factor)?;
                    for factor in iter {
                        write!(f, "*{}", factor)?;
                    }
                }
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use super::*;

    #[test]
    fn tensor_union() {
        let h1 = HilbertSpace::local("1");
        let h2 = HilbertSpace::local("2");
        let h12 = h1.tensor(&h2);
        assert_eq!(h12, HilbertSpace::Product(vec![
            LocalSpace::new("1"),
            LocalSpace::new("2"),
        ]));
        // union is order-independent and idempotent
        assert_eq!(h12, h2.tensor(&h1));
        assert_eq!(h12.tensor(&h1), h12);
    }

    #[test]
    fn trivial_is_neutral() {
        let h1 = HilbertSpace::local("1");
        assert_eq!(HilbertSpace::Trivial.tensor(&h1), h1);
        assert_eq!(h1.tensor(&HilbertSpace::Trivial), h1);
    }

    #[test]
    fn disjointness() {
        let h1 = HilbertSpace::local("1");
        let h2 = HilbertSpace::local("2");
        let h12 = h1.tensor(&h2);
        assert!(h1.is_disjoint(&h2));
        assert!(!h1.is_disjoint(&h12));
        assert!(HilbertSpace::Trivial.is_disjoint(&h1));
        assert!(HilbertSpace::Trivial.is_disjoint(&HilbertSpace::Trivial));
        assert!(!HilbertSpace::Full.is_disjoint(&h1));
    }

    #[test]
    fn containment() {
        let h1 = HilbertSpace::local("1");
        let h2 = HilbertSpace::local("2");
        let h12 = h1.tensor(&h2);
        assert!(h12.contains(&h1));
        assert!(!h1.contains(&h12));
        assert!(h1.contains(&HilbertSpace::Trivial));
        assert!(HilbertSpace::Full.contains(&h12));
    }

    #[test]
    fn dimensions() {
        let h1 = HilbertSpace::local_with_dimension("1", 2);
        let h2 = HilbertSpace::local_with_dimension("2", 3);
        assert_eq!(h1.tensor(&h2).dimension(), Some(6));
        assert_eq!(h1.tensor(&HilbertSpace::local("3")).dimension(), None);
        assert_eq!(HilbertSpace::Trivial.dimension(), Some(1));
    }

    #[test]
    fn same_label_different_dimension_is_distinct() {
        let h1 = HilbertSpace::local("1");
        let h1_dim = HilbertSpace::local_with_dimension("1", 2);
        assert_ne!(h1, h1_dim);
    }
}
