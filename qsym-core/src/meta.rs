//! Per-kind metadata: the lookup table that replaces an inheritance hierarchy.
//!
//! Every [`OpKind`] is just a tag; everything the engine needs to know about a kind (its
//! result domain, argument requirements, associativity, commutative-ordering mode, neutral and
//! absorbing elements, and which pipeline stages apply) lives here. Adding a kind means adding
//! a variant and extending these tables; nothing is discovered through dynamic dispatch.

use crate::error::AlgebraError;
use crate::expr::{
    Domain, Expr, Kwargs, OpKind, IDENTITY_OPERATOR, IDENTITY_SUPER_OPERATOR, ONE, TRIVIAL_KET,
    ZERO, ZERO_KET, ZERO_OPERATOR, ZERO_SUPER_OPERATOR,
};
use crate::space::HilbertSpace;

/// One stage of the normalization pipeline. Each kind declares, in fixed order, which stages
/// run for it (see [`stages`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Flatten nested nodes of the same associative kind.
    Assoc,
    /// Canonically reorder commuting children.
    OrderBy,
    /// Drop children equal to the kind's neutral element.
    FilterNeutral,
    /// Merge children equal up to a scalar coefficient (Plus-like kinds only).
    CollectSummands,
    /// Apply the kind's unary rule table (first match wins).
    MatchReplace,
    /// Apply the kind's binary rule table over adjacent pairs until a fixed point.
    MatchReplaceBinary,
}

/// How `orderby` treats a kind's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingMode {
    /// Children are never reordered.
    None,
    /// All children mutually commute; sort totally by the canonical expression order.
    Full,
    /// Children commute only when their Hilbert spaces are disjoint; overlapping children
    /// keep their relative order ("disjoint islands").
    DisjointSpaces,
    /// Like [`OrderingMode::DisjointSpaces`], but `SPre`/`SPost` factors additionally commute
    /// with each other on the same space, with `SPre` ordered first.
    SuperOpFactors,
}

/// The domain of the node an operation of this kind constructs.
pub fn result_domain(kind: OpKind) -> Domain {
    use OpKind::*;
    match kind {
        ScalarPlus | ScalarTimes | ScalarPower | ScalarConjugate | KroneckerDelta
        | ScalarIndexedSum | BraKet => Domain::Scalar,
        OperatorPlus | OperatorTimes | ScalarTimesOperator | Adjoint | Commutator
        | OperatorTrace | OperatorIndexedSum | KetBra | SuperOperatorTimesOperator => {
            Domain::Operator
        },
        KetPlus | TensorKet | ScalarTimesKet | OperatorTimesKet | KetIndexedSum => Domain::State,
        SuperOperatorPlus | SuperOperatorTimes | ScalarTimesSuperOperator | SuperAdjoint
        | SPre | SPost => Domain::SuperOperator,
    }
}

/// The stable name of a kind, used to address rule tables.
pub fn kind_name(kind: OpKind) -> &'static str {
    use OpKind::*;
    match kind {
        ScalarPlus => "ScalarPlus",
        ScalarTimes => "ScalarTimes",
        ScalarPower => "ScalarPower",
        ScalarConjugate => "ScalarConjugate",
        KroneckerDelta => "KroneckerDelta",
        ScalarIndexedSum => "ScalarIndexedSum",
        OperatorPlus => "OperatorPlus",
        OperatorTimes => "OperatorTimes",
        ScalarTimesOperator => "ScalarTimesOperator",
        Adjoint => "Adjoint",
        Commutator => "Commutator",
        OperatorTrace => "OperatorTrace",
        OperatorIndexedSum => "OperatorIndexedSum",
        KetPlus => "KetPlus",
        TensorKet => "TensorKet",
        ScalarTimesKet => "ScalarTimesKet",
        OperatorTimesKet => "OperatorTimesKet",
        BraKet => "BraKet",
        KetBra => "KetBra",
        KetIndexedSum => "KetIndexedSum",
        SuperOperatorPlus => "SuperOperatorPlus",
        SuperOperatorTimes => "SuperOperatorTimes",
        ScalarTimesSuperOperator => "ScalarTimesSuperOperator",
        SuperAdjoint => "SuperAdjoint",
        SPre => "SPre",
        SPost => "SPost",
        SuperOperatorTimesOperator => "SuperOperatorTimesOperator",
    }
}

/// Returns true if the kind is associative (n-ary, flattened by `assoc`).
pub fn is_assoc(kind: OpKind) -> bool {
    use OpKind::*;
    matches!(
        kind,
        ScalarPlus
            | ScalarTimes
            | OperatorPlus
            | OperatorTimes
            | KetPlus
            | TensorKet
            | SuperOperatorPlus
            | SuperOperatorTimes
    )
}

/// Returns true if the kind is Plus-like (collects summands).
pub fn is_plus(kind: OpKind) -> bool {
    use OpKind::*;
    matches!(kind, ScalarPlus | OperatorPlus | KetPlus | SuperOperatorPlus)
}

/// Returns true if the kind is an indexed sum.
pub fn is_indexed_sum(kind: OpKind) -> bool {
    use OpKind::*;
    matches!(kind, ScalarIndexedSum | OperatorIndexedSum | KetIndexedSum)
}

/// The ordering mode `orderby` uses for this kind.
pub fn ordering_mode(kind: OpKind) -> OrderingMode {
    use OpKind::*;
    match kind {
        ScalarPlus | ScalarTimes | OperatorPlus | KetPlus | SuperOperatorPlus
        | KroneckerDelta => OrderingMode::Full,
        OperatorTimes | TensorKet => OrderingMode::DisjointSpaces,
        SuperOperatorTimes => OrderingMode::SuperOpFactors,
        _ => OrderingMode::None,
    }
}

/// The pipeline stages that run for this kind, in their fixed declared order.
pub fn stages(kind: OpKind) -> &'static [Stage] {
    use OpKind::*;
    use Stage::*;
    match kind {
        ScalarPlus | OperatorPlus | KetPlus | SuperOperatorPlus => {
            &[Assoc, OrderBy, FilterNeutral, CollectSummands, MatchReplaceBinary]
        },
        ScalarTimes | OperatorTimes | TensorKet | SuperOperatorTimes => {
            &[Assoc, OrderBy, FilterNeutral, MatchReplaceBinary]
        },
        KroneckerDelta => &[OrderBy, MatchReplace],
        _ => &[MatchReplace],
    }
}

/// The neutral element filtered out of this kind's children, if the kind has one.
pub fn neutral_element(kind: OpKind) -> Option<Expr> {
    use OpKind::*;
    match kind {
        ScalarPlus => Some(ZERO.clone()),
        ScalarTimes => Some(ONE.clone()),
        OperatorPlus => Some(ZERO_OPERATOR.clone()),
        OperatorTimes => Some(IDENTITY_OPERATOR.clone()),
        KetPlus => Some(ZERO_KET.clone()),
        TensorKet => Some(TRIVIAL_KET.clone()),
        SuperOperatorPlus => Some(ZERO_SUPER_OPERATOR.clone()),
        SuperOperatorTimes => Some(IDENTITY_SUPER_OPERATOR.clone()),
        _ => None,
    }
}

/// The absorbing (zero) element of a Times-like kind, if it has one. Encountering it among the
/// arguments collapses the whole construction before the pipeline runs.
pub fn zero_element(kind: OpKind) -> Option<Expr> {
    use OpKind::*;
    match kind {
        ScalarTimes => Some(ZERO.clone()),
        OperatorTimes => Some(ZERO_OPERATOR.clone()),
        TensorKet => Some(ZERO_KET.clone()),
        SuperOperatorTimes => Some(ZERO_SUPER_OPERATOR.clone()),
        _ => None,
    }
}

/// The zero element of a domain.
pub fn zero_of_domain(domain: Domain) -> Expr {
    match domain {
        Domain::Scalar => ZERO.clone(),
        Domain::Operator => ZERO_OPERATOR.clone(),
        Domain::State => ZERO_KET.clone(),
        Domain::SuperOperator => ZERO_SUPER_OPERATOR.clone(),
    }
}

/// The multiplicative identity of a domain, if the domain has one (states do not).
pub fn identity_of_domain(domain: Domain) -> Option<Expr> {
    match domain {
        Domain::Scalar => Some(ONE.clone()),
        Domain::Operator => Some(IDENTITY_OPERATOR.clone()),
        Domain::State => None,
        Domain::SuperOperator => Some(IDENTITY_SUPER_OPERATOR.clone()),
    }
}

/// The Plus kind of a domain.
pub fn plus_kind(domain: Domain) -> OpKind {
    match domain {
        Domain::Scalar => OpKind::ScalarPlus,
        Domain::Operator => OpKind::OperatorPlus,
        Domain::State => OpKind::KetPlus,
        Domain::SuperOperator => OpKind::SuperOperatorPlus,
    }
}

/// The kind that multiplies a scalar coefficient onto an element of a domain. For scalars this
/// is plain multiplication.
pub fn scalar_times_kind(domain: Domain) -> OpKind {
    match domain {
        Domain::Scalar => OpKind::ScalarTimes,
        Domain::Operator => OpKind::ScalarTimesOperator,
        Domain::State => OpKind::ScalarTimesKet,
        Domain::SuperOperator => OpKind::ScalarTimesSuperOperator,
    }
}

/// The indexed-sum kind of a domain, if the domain has one.
pub fn indexed_sum_kind(domain: Domain) -> Option<OpKind> {
    match domain {
        Domain::Scalar => Some(OpKind::ScalarIndexedSum),
        Domain::Operator => Some(OpKind::OperatorIndexedSum),
        Domain::State => Some(OpKind::KetIndexedSum),
        Domain::SuperOperator => None,
    }
}

/// Checks one argument's domain.
fn expect_domain(kind: OpKind, arg: &Expr, expected: Domain) -> Result<(), AlgebraError> {
    let got = arg.domain();
    if got == expected {
        Ok(())
    } else {
        Err(AlgebraError::WrongDomain { kind, expected, got })
    }
}

/// Checks an exact arity.
fn expect_arity(
    kind: OpKind,
    args: &[Expr],
    arity: usize,
    expected: &'static str,
) -> Result<(), AlgebraError> {
    if args.len() == arity {
        Ok(())
    } else {
        Err(AlgebraError::WrongArity { kind, expected, got: args.len() })
    }
}

/// Validates arity, argument domains, kwargs, and space compatibility for a kind.
///
/// Associative kinds accept any number of arguments; fixed-arity kinds are exact. Space
/// compatibility is the *construction-error* portion of the contract: unequal spaces where
/// sameness is required, overlap where disjointness is required, and an operator acting
/// outside the space of the state it is applied to.
pub fn validate(kind: OpKind, args: &[Expr], kwargs: &Kwargs) -> Result<(), AlgebraError> {
    use OpKind::*;

    // kwargs are only meaningful for traces and indexed sums
    match kind {
        OperatorTrace => {
            if kwargs.over_space.is_none() {
                return Err(AlgebraError::MissingOverSpace(kind));
            }
            if kwargs.ranges.is_some() {
                return Err(AlgebraError::UnexpectedKwargs(kind));
            }
        },
        ScalarIndexedSum | OperatorIndexedSum | KetIndexedSum => {
            match &kwargs.ranges {
                Some(ranges) if !ranges.is_empty() => {},
                _ => return Err(AlgebraError::MissingRanges(kind)),
            }
            if kwargs.over_space.is_some() {
                return Err(AlgebraError::UnexpectedKwargs(kind));
            }
        },
        _ => {
            if !kwargs.is_empty() {
                return Err(AlgebraError::UnexpectedKwargs(kind));
            }
        },
    }

    match kind {
        ScalarPlus | ScalarTimes => {
            for arg in args {
                expect_domain(kind, arg, Domain::Scalar)?;
            }
        },
        ScalarPower | KroneckerDelta => {
            expect_arity(kind, args, 2, "exactly 2")?;
            for arg in args {
                expect_domain(kind, arg, Domain::Scalar)?;
            }
        },
        ScalarConjugate => {
            expect_arity(kind, args, 1, "exactly 1")?;
            expect_domain(kind, &args[0], Domain::Scalar)?;
        },
        ScalarIndexedSum => {
            expect_arity(kind, args, 1, "exactly 1")?;
            expect_domain(kind, &args[0], Domain::Scalar)?;
        },
        OperatorPlus | OperatorTimes => {
            for arg in args {
                expect_domain(kind, arg, Domain::Operator)?;
            }
        },
        ScalarTimesOperator => {
            expect_arity(kind, args, 2, "exactly 2")?;
            expect_domain(kind, &args[0], Domain::Scalar)?;
            expect_domain(kind, &args[1], Domain::Operator)?;
        },
        Adjoint => {
            expect_arity(kind, args, 1, "exactly 1")?;
            expect_domain(kind, &args[0], Domain::Operator)?;
        },
        Commutator => {
            expect_arity(kind, args, 2, "exactly 2")?;
            for arg in args {
                expect_domain(kind, arg, Domain::Operator)?;
            }
        },
        OperatorTrace => {
            expect_arity(kind, args, 1, "exactly 1")?;
            expect_domain(kind, &args[0], Domain::Operator)?;
        },
        OperatorIndexedSum => {
            expect_arity(kind, args, 1, "exactly 1")?;
            expect_domain(kind, &args[0], Domain::Operator)?;
        },
        KetPlus => {
            for arg in args {
                expect_domain(kind, arg, Domain::State)?;
            }
            expect_equal_spaces(&nonzero_kets(args))?;
        },
        TensorKet => {
            for arg in args {
                expect_domain(kind, arg, Domain::State)?;
            }
            expect_disjoint_spaces(args)?;
        },
        ScalarTimesKet => {
            expect_arity(kind, args, 2, "exactly 2")?;
            expect_domain(kind, &args[0], Domain::Scalar)?;
            expect_domain(kind, &args[1], Domain::State)?;
        },
        OperatorTimesKet => {
            expect_arity(kind, args, 2, "exactly 2")?;
            expect_domain(kind, &args[0], Domain::Operator)?;
            expect_domain(kind, &args[1], Domain::State)?;
            let op_space = args[0].space();
            let ket_space = args[1].space();
            if args[1] != *ZERO_KET && !ket_space.contains(&op_space) {
                return Err(AlgebraError::SpaceTooLarge(op_space, ket_space));
            }
        },
        BraKet | KetBra => {
            expect_arity(kind, args, 2, "exactly 2")?;
            for arg in args {
                expect_domain(kind, arg, Domain::State)?;
            }
            expect_equal_spaces(&nonzero_kets(args))?;
        },
        KetIndexedSum => {
            expect_arity(kind, args, 1, "exactly 1")?;
            expect_domain(kind, &args[0], Domain::State)?;
        },
        SuperOperatorPlus | SuperOperatorTimes => {
            for arg in args {
                expect_domain(kind, arg, Domain::SuperOperator)?;
            }
        },
        ScalarTimesSuperOperator => {
            expect_arity(kind, args, 2, "exactly 2")?;
            expect_domain(kind, &args[0], Domain::Scalar)?;
            expect_domain(kind, &args[1], Domain::SuperOperator)?;
        },
        SuperAdjoint => {
            expect_arity(kind, args, 1, "exactly 1")?;
            expect_domain(kind, &args[0], Domain::SuperOperator)?;
        },
        SPre | SPost => {
            expect_arity(kind, args, 1, "exactly 1")?;
            expect_domain(kind, &args[0], Domain::Operator)?;
        },
        SuperOperatorTimesOperator => {
            expect_arity(kind, args, 2, "exactly 2")?;
            expect_domain(kind, &args[0], Domain::SuperOperator)?;
            expect_domain(kind, &args[1], Domain::Operator)?;
        },
    }

    Ok(())
}

/// The zero ket is allowed alongside states of any space (it is absorbed or rewritten away),
/// so space-compatibility checks ignore it.
fn nonzero_kets(args: &[Expr]) -> Vec<Expr> {
    args.iter().filter(|a| **a != *ZERO_KET).cloned().collect()
}

fn expect_equal_spaces(args: &[Expr]) -> Result<(), AlgebraError> {
    let mut iter = args.iter();
    if let Some(first) = iter.next() {
        let space = first.space();
        for arg in iter {
            let other = arg.space();
            if other != space {
                return Err(AlgebraError::UnequalSpaces(space, other));
            }
        }
    }
    Ok(())
}

fn expect_disjoint_spaces(args: &[Expr]) -> Result<(), AlgebraError> {
    for (i, a) in args.iter().enumerate() {
        let a_space = a.space();
        for b in &args[i + 1..] {
            let b_space = b.space();
            if !a_space.is_disjoint(&b_space) {
                return Err(AlgebraError::OverlappingSpaces(a_space, b_space));
            }
        }
    }
    Ok(())
}

/// Derives the Hilbert space of an operation from its children and kwargs.
pub fn derive_space(kind: OpKind, args: &[Expr], kwargs: &Kwargs) -> HilbertSpace {
    use OpKind::*;
    match kind {
        // scalars live in the trivial space regardless of what they were built from
        ScalarPlus | ScalarTimes | ScalarPower | ScalarConjugate | KroneckerDelta
        | ScalarIndexedSum | BraKet => HilbertSpace::Trivial,
        // a trace removes the traced-over factors
        OperatorTrace => {
            // over_space presence is validated before this is called
            let over = kwargs.over_space.as_ref().unwrap();
            args[0].space().remove(over)
        },
        // indexed sums extend the term's space by the spaces their ranges run over
        OperatorIndexedSum | KetIndexedSum => {
            let mut space = args[0].space();
            if let Some(ranges) = &kwargs.ranges {
                for range in ranges {
                    space = space.tensor(&range.space());
                }
            }
            space
        },
        _ => {
            let mut space = HilbertSpace::Trivial;
            for arg in args {
                space = space.tensor(&arg.space());
            }
            space
        },
    }
}

/// Looks up a kind by its [`kind_name`].
pub fn kind_by_name(name: &str) -> Option<OpKind> {
    crate::expr::ALL_KINDS
        .iter()
        .copied()
        .find(|&kind| kind_name(kind) == name)
}

#[cfg(test)]
mod tests {
    use crate::expr::Expr;
    use pretty_assertions::assert_eq;
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for &kind in crate::expr::ALL_KINDS {
            assert_eq!(kind_by_name(kind_name(kind)), Some(kind));
        }
    }

    #[test]
    fn scalar_args_rejected_in_operator_plus() {
        let err = validate(OpKind::OperatorPlus, &[Expr::integer(1)], &Kwargs::default());
        assert_eq!(
            err,
            Err(AlgebraError::WrongDomain {
                kind: OpKind::OperatorPlus,
                expected: Domain::Operator,
                got: Domain::Scalar,
            }),
        );
    }

    #[test]
    fn ket_plus_requires_equal_spaces() {
        let psi = Expr::symbol("psi", Domain::State, HilbertSpace::local("1"));
        let phi = Expr::symbol("phi", Domain::State, HilbertSpace::local("2"));
        let err = validate(OpKind::KetPlus, &[psi, phi], &Kwargs::default());
        assert_eq!(
            err,
            Err(AlgebraError::UnequalSpaces(
                HilbertSpace::local("1"),
                HilbertSpace::local("2"),
            )),
        );
    }

    #[test]
    fn tensor_ket_requires_disjoint_spaces() {
        let psi = Expr::symbol("psi", Domain::State, HilbertSpace::local("1"));
        let phi = Expr::symbol("phi", Domain::State, HilbertSpace::local("1"));
        let err = validate(OpKind::TensorKet, &[psi, phi], &Kwargs::default());
        assert!(matches!(err, Err(AlgebraError::OverlappingSpaces(..))));
    }

    #[test]
    fn indexed_sum_requires_ranges() {
        let err = validate(
            OpKind::OperatorIndexedSum,
            &[crate::expr::ZERO_OPERATOR.clone()],
            &Kwargs::default(),
        );
        assert_eq!(err, Err(AlgebraError::MissingRanges(OpKind::OperatorIndexedSum)));
    }
}
