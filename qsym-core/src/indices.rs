//! Bound-index symbols and the ranges an indexed sum iterates over.

use crate::space::{HilbertSpace, LocalSpace};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A symbol reserved for use as a summation index.
///
/// Index symbols are distinct from ordinary scalar symbols so that the engine can tell bound
/// from free occurrences. The `primed` counter exists to generate fresh, non-clashing indices
/// when nested sums over the same base label are combined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdxSym {
    /// The base label of the index, e.g. `i`.
    pub label: String,

    /// The number of primes attached to the base label.
    pub primed: u32,
}

impl IdxSym {
    /// Creates an unprimed index symbol.
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), primed: 0 }
    }

    /// Returns a copy of this symbol with one more prime.
    pub fn prime(&self) -> Self {
        Self { label: self.label.clone(), primed: self.primed + 1 }
    }
}

impl fmt::Display for IdxSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        for _ in 0..self.primed {
            write!(f, "'")?;
        }
        Ok(())
    }
}

/// The upper limit of a contiguous index range: either a concrete integer or a symbolic
/// cardinality (e.g. `N`), which prevents explicit expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RangeLimit {
    /// A concrete (inclusive) limit.
    Int(i64),

    /// A symbolic limit; the range has a finite but unknown number of elements.
    Sym(String),
}

impl fmt::Display for RangeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Sym(s) => write!(f, "{}", s),
        }
    }
}

/// A single index range of an indexed sum, binding one [`IdxSym`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IndexRange {
    /// The index runs over an explicit list of integer values.
    OverList { idx: IdxSym, values: Vec<i64> },

    /// The index runs over the inclusive range `start..=stop`.
    OverRange {
        idx: IdxSym,
        start: i64,
        stop: RangeLimit,
    },

    /// The index enumerates the basis of a local space (`0..dimension`).
    OverFockSpace { idx: IdxSym, space: LocalSpace },
}

impl IndexRange {
    /// The index symbol this range binds.
    pub fn index_symbol(&self) -> &IdxSym {
        match self {
            Self::OverList { idx, .. }
            | Self::OverRange { idx, .. }
            | Self::OverFockSpace { idx, .. } => idx,
        }
    }

    /// The concrete values this range enumerates, or `None` if the range is symbolic or the
    /// space has no declared basis.
    pub fn values(&self) -> Option<Vec<i64>> {
        match self {
            Self::OverList { values, .. } => Some(values.clone()),
            Self::OverRange { start, stop, .. } => match stop {
                RangeLimit::Int(stop) => Some((*start..=*stop).collect()),
                RangeLimit::Sym(_) => None,
            },
            Self::OverFockSpace { space, .. } => {
                space.dimension.map(|dim| (0..dim as i64).collect())
            },
        }
    }

    /// The Hilbert space this range is tied to, if any; contributes to the space of the sum.
    pub fn space(&self) -> HilbertSpace {
        match self {
            Self::OverFockSpace { space, .. } => HilbertSpace::Local(space.clone()),
            _ => HilbertSpace::Trivial,
        }
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverList { idx, values } => {
                write!(f, "{} in {:?}", idx, values)
            },
            Self::OverRange { idx, start, stop } => {
                write!(f, "{} in {}..{}", idx, start, stop)
            },
            Self::OverFockSpace { idx, space } => {
                write!(f, "{} in {}", idx, space)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use super::*;

    #[test]
    fn range_values() {
        let i = IdxSym::new("i");
        let r = IndexRange::OverRange {
            idx: i.clone(),
            start: 1,
            stop: RangeLimit::Int(3),
        };
        assert_eq!(r.values(), Some(vec![1, 2, 3]));

        let symbolic = IndexRange::OverRange {
            idx: i.clone(),
            start: 1,
            stop: RangeLimit::Sym("N".into()),
        };
        assert_eq!(symbolic.values(), None);

        let fock = IndexRange::OverFockSpace {
            idx: i,
            space: LocalSpace::with_dimension("0", 2),
        };
        assert_eq!(fock.values(), Some(vec![0, 1]));
    }

    #[test]
    fn priming() {
        let i = IdxSym::new("i");
        assert_eq!(i.prime().to_string(), "i'");
        assert_ne!(i, i.prime());
    }
}
