//! Error and signal types for the rewrite engine.
//!
//! There are three distinct families here, and they must not be conflated:
//!
//! - [`CannotSimplify`] is **not an error**. It is the control-flow signal a rule handler returns
//! to say "the pattern matched, but this particular instance is out of scope for this rule"; the
//! rule iteration then simply moves on to the next rule. It never escapes
//! [`match_replace`](crate::rules) to a caller of [`create`](crate::context::AlgebraContext::create).
//! - [`AlgebraError`] is a construction error, surfaced synchronously to the caller of `create`.
//! The engine never retries construction.
//! - [`RegistryError`] is a setup / programmer error, detected eagerly at rule-registration time
//! so it is caught during development, not in production rewriting.

use crate::expr::{Domain, OpKind};
use crate::space::HilbertSpace;
use std::fmt;

/// Signal returned by a rule handler to indicate that the matched instance is out of scope for
/// the rule. Expected control flow, caught at the rule-iteration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CannotSimplify;

impl fmt::Display for CannotSimplify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule cannot simplify this instance")
    }
}

/// An error raised while constructing an expression through the canonicalizing pipeline.
///
/// Construction either yields a fully canonical node or exactly one of these; there is no
/// partial or degraded result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlgebraError {
    /// Operands that must share a Hilbert space do not (e.g. adding two kets living on
    /// different local spaces).
    UnequalSpaces(HilbertSpace, HilbertSpace),

    /// Operands that must live on disjoint Hilbert spaces overlap (e.g. a tensor product of
    /// kets on the same local space).
    OverlappingSpaces(HilbertSpace, HilbertSpace),

    /// An operator acts on a space that is not contained in the space of the state it is
    /// applied to.
    SpaceTooLarge(HilbertSpace, HilbertSpace),

    /// An operation was constructed with the wrong number of arguments.
    WrongArity {
        kind: OpKind,
        expected: &'static str,
        got: usize,
    },

    /// An argument belongs to the wrong domain for its position (e.g. a ket where a scalar
    /// is required).
    WrongDomain {
        kind: OpKind,
        expected: Domain,
        got: Domain,
    },

    /// An indexed sum was constructed without any index ranges.
    MissingRanges(OpKind),

    /// A trace was constructed without the space to trace over.
    MissingOverSpace(OpKind),

    /// A keyword parameter was supplied to a kind that does not accept it.
    UnexpectedKwargs(OpKind),

    /// A basis (dimension) is required but not set for the given space.
    BasisNotSet(HilbertSpace),

    /// Expanding a sum would produce an infinite (or symbolically-sized) number of terms.
    InfiniteSum,

    /// A rule scan exceeded the configured pass limit without reaching a fixed point. This
    /// indicates a cyclic rule set, which is the rule author's responsibility; the engine
    /// refuses to loop silently. The kind is reported when the scan ran inside a kind's
    /// binary table.
    DivergentRewrite {
        kind: Option<OpKind>,
        passes: usize,
    },
}

impl fmt::Display for AlgebraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnequalSpaces(a, b) => {
                write!(f, "operands must be in the same Hilbert space: {} != {}", a, b)
            },
            Self::OverlappingSpaces(a, b) => {
                write!(f, "operands must be in disjoint Hilbert spaces: {} overlaps {}", a, b)
            },
            Self::SpaceTooLarge(op, state) => {
                write!(f, "operator space {} is not contained in state space {}", op, state)
            },
            Self::WrongArity { kind, expected, got } => {
                write!(f, "{:?} expects {} argument(s), got {}", kind, expected, got)
            },
            Self::WrongDomain { kind, expected, got } => {
                write!(f, "{:?} expects a {:?} argument, got a {:?}", kind, expected, got)
            },
            Self::MissingRanges(kind) => {
                write!(f, "{:?} requires at least one index range", kind)
            },
            Self::MissingOverSpace(kind) => {
                write!(f, "{:?} requires the space to trace over", kind)
            },
            Self::UnexpectedKwargs(kind) => {
                write!(f, "{:?} does not accept keyword parameters", kind)
            },
            Self::BasisNotSet(hs) => {
                write!(f, "no basis (dimension) is set for {}", hs)
            },
            Self::InfiniteSum => {
                write!(f, "sum expansion would produce an infinite number of terms")
            },
            Self::DivergentRewrite { kind, passes } => {
                match kind {
                    Some(kind) => write!(
                        f,
                        "binary rule scan for {:?} did not reach a fixed point after {} passes",
                        kind, passes
                    ),
                    None => write!(
                        f,
                        "rule application did not reach a fixed point after {} passes",
                        passes
                    ),
                }
            },
        }
    }
}

impl std::error::Error for AlgebraError {}

/// What a rule handler can return besides a successful rewrite: either the expected
/// "does not apply here" signal, or a genuine construction error from a nested
/// [`create`](crate::context::AlgebraContext::create) call.
///
/// The `From` impls let handlers use `?` on nested construction results; a construction error
/// propagates out of the rule iteration as an [`AlgebraError`], while [`CannotSimplify`] makes
/// the iteration move on to the next rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The rule declines this instance; try the next rule.
    CannotSimplify,

    /// A nested construction failed; this is a real error and surfaces to the `create` caller.
    Construction(AlgebraError),
}

impl From<CannotSimplify> for RuleError {
    fn from(_: CannotSimplify) -> Self {
        Self::CannotSimplify
    }
}

impl From<AlgebraError> for RuleError {
    fn from(err: AlgebraError) -> Self {
        Self::Construction(err)
    }
}

/// An error raised while registering or looking up rewrite rules.
///
/// These are programmer errors: they fail loudly at setup time and are meant to be caught by
/// tests, never at runtime in production use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A rule with this name already exists in the table.
    DuplicateRule { table: String, name: String },

    /// A rule declares that its handler consumes a capture the pattern never binds.
    UnboundCapture { rule: String, capture: String },

    /// Binary rules can only be attached to associative operation kinds.
    NotAssociative(OpKind),

    /// No rule table with the given name exists. Carries the closest known table name, if any
    /// is reasonably close.
    UnknownTable {
        name: String,
        suggestion: Option<String>,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRule { table, name } => {
                write!(f, "rule `{}` is already registered in table `{}`", name, table)
            },
            Self::UnboundCapture { rule, capture } => {
                write!(
                    f,
                    "rule `{}` declares capture `{}`, which its pattern does not bind",
                    rule, capture
                )
            },
            Self::NotAssociative(kind) => {
                write!(f, "{:?} is not associative and cannot have binary rules", kind)
            },
            Self::UnknownTable { name, suggestion } => {
                write!(f, "no rule table named `{}`", name)?;
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean `{}`?)", suggestion)?;
                }
                Ok(())
            },
        }
    }
}

impl std::error::Error for RegistryError {}
