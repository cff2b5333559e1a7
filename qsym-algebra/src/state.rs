//! The state (ket) domain: constructors and the default structural rule set.
//!
//! States form a module over both the scalars and the operators: scalar coefficients pull out
//! of every state-valued product, zero kets absorb, and bra-ket / ket-bra contractions reduce
//! to scalars and operators respectively.

use qsym_core::context::AlgebraContext;
use qsym_core::error::{AlgebraError, CannotSimplify, RegistryError, RuleError};
use qsym_core::expr::{Domain, Expr, Kwargs, OpKind, IDENTITY_OPERATOR, ONE, ZERO, ZERO_KET, ZERO_OPERATOR};
use qsym_core::indices::IndexRange;
use qsym_core::pattern::{pat, pattern_head, wc, Bindings, Head, Pattern};
use qsym_core::rules::Rule;
use qsym_core::space::HilbertSpace;

/// A ket symbol leaf living on the given space. Ket symbols are assumed normalized.
pub fn symbol(label: impl Into<String>, space: HilbertSpace) -> Expr {
    Expr::symbol(label, Domain::State, space)
}

/// The sum of states (all on the same space).
pub fn plus(ctx: &AlgebraContext, terms: Vec<Expr>) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::KetPlus, terms, Kwargs::default())
}

/// The tensor product of states on disjoint spaces.
pub fn tensor(ctx: &AlgebraContext, factors: Vec<Expr>) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::TensorKet, factors, Kwargs::default())
}

/// A scalar multiple of a state.
pub fn scalar_times(ctx: &AlgebraContext, u: Expr, psi: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::ScalarTimesKet, vec![u, psi], Kwargs::default())
}

/// An operator applied to a state.
pub fn apply(ctx: &AlgebraContext, a: Expr, psi: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::OperatorTimesKet, vec![a, psi], Kwargs::default())
}

/// The inner product `<psi|phi>` (a scalar).
pub fn braket(ctx: &AlgebraContext, psi: Expr, phi: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::BraKet, vec![psi, phi], Kwargs::default())
}

/// The outer product `|psi><phi|` (an operator).
pub fn ketbra(ctx: &AlgebraContext, psi: Expr, phi: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::KetBra, vec![psi, phi], Kwargs::default())
}

/// An indexed sum of a state term over the given ranges.
pub fn indexed_sum(
    ctx: &AlgebraContext,
    term: Expr,
    ranges: Vec<IndexRange>,
) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::KetIndexedSum, vec![term], Kwargs::ranges(ranges))
}

/// Registers the default state rules.
pub fn register_rules(ctx: &AlgebraContext) -> Result<(), RegistryError> {
    use OpKind::*;

    // ScalarTimesKet
    ctx.add_rule(
        ScalarTimesKet,
        Rule::new(
            "R001",
            pattern_head(vec![
                wc("one").filter(|e| e.is_scalar_one()).into(),
                wc("Psi").into(),
            ]),
            &["Psi"],
            |_, b| Ok(b.expr("Psi")),
        ),
    )?;
    ctx.add_rule(
        ScalarTimesKet,
        Rule::new(
            "R002",
            pattern_head(vec![
                wc("zero").filter(|e| e.is_scalar_zero()).into(),
                wc("Psi").into(),
            ]),
            &[],
            |_, _| Ok(ZERO_KET.clone()),
        ),
    )?;
    ctx.add_rule(
        ScalarTimesKet,
        Rule::new(
            "R003",
            pattern_head(vec![wc("u").into(), Pattern::from(&*ZERO_KET)]),
            &[],
            |_, _| Ok(ZERO_KET.clone()),
        ),
    )?;
    ctx.add_rule(
        ScalarTimesKet,
        Rule::new(
            "R004",
            pattern_head(vec![
                wc("u").into(),
                pat(ScalarTimesKet, vec![wc("v").into(), wc("Psi").into()]),
            ]),
            &["u", "v", "Psi"],
            |ctx, b| {
                let uv = ctx.create(
                    ScalarTimes,
                    vec![b.expr("u"), b.expr("v")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    ScalarTimesKet,
                    vec![uv, b.expr("Psi")],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;

    // OperatorTimesKet
    ctx.add_rule(
        OperatorTimesKet,
        Rule::new(
            "R001",
            pattern_head(vec![Pattern::from(&*IDENTITY_OPERATOR), wc("Psi").into()]),
            &["Psi"],
            |_, b| Ok(b.expr("Psi")),
        ),
    )?;
    ctx.add_rule(
        OperatorTimesKet,
        Rule::new(
            "R002",
            pattern_head(vec![Pattern::from(&*ZERO_OPERATOR), wc("Psi").into()]),
            &[],
            |_, _| Ok(ZERO_KET.clone()),
        ),
    )?;
    ctx.add_rule(
        OperatorTimesKet,
        Rule::new(
            "R003",
            pattern_head(vec![wc("A").into(), Pattern::from(&*ZERO_KET)]),
            &[],
            |_, _| Ok(ZERO_KET.clone()),
        ),
    )?;
    ctx.add_rule(
        OperatorTimesKet,
        Rule::new(
            "R004",
            pattern_head(vec![
                wc("A").into(),
                pat(ScalarTimesKet, vec![wc("v").into(), wc("Psi").into()]),
            ]),
            &["A", "v", "Psi"],
            |ctx, b| {
                let applied = ctx.create(
                    OperatorTimesKet,
                    vec![b.expr("A"), b.expr("Psi")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    ScalarTimesKet,
                    vec![b.expr("v"), applied],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        OperatorTimesKet,
        Rule::new(
            "R005",
            pattern_head(vec![
                pat(ScalarTimesOperator, vec![wc("u").into(), wc("A").into()]),
                wc("Psi").into(),
            ]),
            &["u", "A", "Psi"],
            |ctx, b| {
                let applied = ctx.create(
                    OperatorTimesKet,
                    vec![b.expr("A"), b.expr("Psi")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    ScalarTimesKet,
                    vec![b.expr("u"), applied],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        OperatorTimesKet,
        Rule::new(
            "R006",
            pattern_head(vec![
                wc("A").into(),
                pat(OperatorTimesKet, vec![wc("B").into(), wc("Psi").into()]),
            ]),
            &["A", "B", "Psi"],
            |ctx, b| associate_application(ctx, b),
        ),
    )?;
    ctx.add_rule(
        OperatorTimesKet,
        Rule::new(
            "R007",
            pattern_head(vec![
                wc("A").into(),
                wc("sum").head(Head::Kind(KetIndexedSum)).into(),
            ]),
            &["A", "sum"],
            |ctx, b| {
                let sum = b.expr("sum");
                // ranges presence is guaranteed for a canonical indexed sum
                let ranges = sum.kwargs().unwrap().ranges.clone().unwrap();
                let term = ctx.create(
                    OperatorTimesKet,
                    vec![b.expr("A"), sum.args()[0].clone()],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(KetIndexedSum, vec![term], Kwargs::ranges(ranges))?)
            },
        ),
    )?;

    // TensorKet: scalar coefficients pull out of tensor factors
    ctx.add_binary_rule(
        TensorKet,
        Rule::new(
            "R001",
            pattern_head(vec![
                pat(ScalarTimesKet, vec![wc("u").into(), wc("Psi").into()]),
                wc("Phi").into(),
            ]),
            &["u", "Psi", "Phi"],
            |ctx, b| tensor_scalar_out(ctx, b),
        ),
    )?;
    ctx.add_binary_rule(
        TensorKet,
        Rule::new(
            "R002",
            pattern_head(vec![
                wc("Psi").into(),
                pat(ScalarTimesKet, vec![wc("u").into(), wc("Phi").into()]),
            ]),
            &["u", "Psi", "Phi"],
            |ctx, b| tensor_scalar_out(ctx, b),
        ),
    )?;

    // BraKet: all results are scalars
    ctx.add_rule(
        BraKet,
        Rule::new(
            "R001",
            pattern_head(vec![wc("Phi").into(), Pattern::from(&*ZERO_KET)]),
            &[],
            |_, _| Ok(ZERO.clone()),
        ),
    )?;
    ctx.add_rule(
        BraKet,
        Rule::new(
            "R002",
            pattern_head(vec![Pattern::from(&*ZERO_KET), wc("Phi").into()]),
            &[],
            |_, _| Ok(ZERO.clone()),
        ),
    )?;
    ctx.add_rule(
        BraKet,
        Rule::new(
            "R003",
            // ket symbols are normalized, so <Psi|Psi> = 1
            pattern_head(vec![
                wc("Psi").head(Head::Symbol).into(),
                wc("Psi").head(Head::Symbol).into(),
            ]),
            &[],
            |_, _| Ok(ONE.clone()),
        ),
    )?;
    ctx.add_rule(
        BraKet,
        Rule::new(
            "R004",
            pattern_head(vec![
                pat(ScalarTimesKet, vec![wc("u").into(), wc("Psi").into()]),
                wc("Phi").into(),
            ]),
            &["u", "Psi", "Phi"],
            |ctx, b| {
                let conj = ctx.create(ScalarConjugate, vec![b.expr("u")], Kwargs::default())?;
                let inner = ctx.create(
                    BraKet,
                    vec![b.expr("Psi"), b.expr("Phi")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(ScalarTimes, vec![conj, inner], Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        BraKet,
        Rule::new(
            "R005",
            pattern_head(vec![
                wc("Psi").into(),
                pat(ScalarTimesKet, vec![wc("u").into(), wc("Phi").into()]),
            ]),
            &["u", "Psi", "Phi"],
            |ctx, b| {
                let inner = ctx.create(
                    BraKet,
                    vec![b.expr("Psi"), b.expr("Phi")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    ScalarTimes,
                    vec![b.expr("u"), inner],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        BraKet,
        Rule::new(
            "R006",
            pattern_head(vec![
                pat(OperatorTimesKet, vec![wc("A").into(), wc("Psi").into()]),
                wc("Phi").into(),
            ]),
            &["A", "Psi", "Phi"],
            |ctx, b| {
                let adj = ctx.create(Adjoint, vec![b.expr("A")], Kwargs::default())?;
                let moved = ctx.create(
                    OperatorTimesKet,
                    vec![adj, b.expr("Phi")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(BraKet, vec![b.expr("Psi"), moved], Kwargs::default())?)
            },
        ),
    )?;

    // KetBra: all results are operators
    ctx.add_rule(
        KetBra,
        Rule::new(
            "R001",
            pattern_head(vec![
                pat(ScalarTimesKet, vec![wc("u").into(), wc("Psi").into()]),
                wc("Phi").into(),
            ]),
            &["u", "Psi", "Phi"],
            |ctx, b| {
                let outer = ctx.create(
                    KetBra,
                    vec![b.expr("Psi"), b.expr("Phi")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    ScalarTimesOperator,
                    vec![b.expr("u"), outer],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        KetBra,
        Rule::new(
            "R002",
            pattern_head(vec![
                wc("Psi").into(),
                pat(ScalarTimesKet, vec![wc("u").into(), wc("Phi").into()]),
            ]),
            &["u", "Psi", "Phi"],
            |ctx, b| {
                let conj = ctx.create(ScalarConjugate, vec![b.expr("u")], Kwargs::default())?;
                let outer = ctx.create(
                    KetBra,
                    vec![b.expr("Psi"), b.expr("Phi")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(ScalarTimesOperator, vec![conj, outer], Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        KetBra,
        Rule::new(
            "R003",
            pattern_head(vec![
                pat(OperatorTimesKet, vec![wc("A").into(), wc("Psi").into()]),
                wc("Phi").into(),
            ]),
            &["A", "Psi", "Phi"],
            |ctx, b| {
                let outer = ctx.create(
                    KetBra,
                    vec![b.expr("Psi"), b.expr("Phi")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    OperatorTimes,
                    vec![b.expr("A"), outer],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        KetBra,
        Rule::new(
            "R004",
            pattern_head(vec![
                wc("Psi").into(),
                pat(OperatorTimesKet, vec![wc("A").into(), wc("Phi").into()]),
            ]),
            &["A", "Psi", "Phi"],
            |ctx, b| {
                let outer = ctx.create(
                    KetBra,
                    vec![b.expr("Psi"), b.expr("Phi")],
                    Kwargs::default(),
                )?;
                let adj = ctx.create(Adjoint, vec![b.expr("A")], Kwargs::default())?;
                Ok(ctx.create(OperatorTimes, vec![outer, adj], Kwargs::default())?)
            },
        ),
    )?;

    // KetIndexedSum
    ctx.add_rule(
        KetIndexedSum,
        Rule::new(
            "R001",
            pattern_head(vec![Pattern::from(&*ZERO_KET)]).with_ranges("indranges"),
            &[],
            |_, _| Ok(ZERO_KET.clone()),
        ),
    )?;
    ctx.add_rule(
        KetIndexedSum,
        Rule::new(
            "R002",
            pattern_head(vec![pat(
                ScalarTimesKet,
                vec![wc("u").into(), wc("Psi").into()],
            )])
            .with_ranges("indranges"),
            &["u", "Psi", "indranges"],
            |ctx, b| pull_constfactor_from_sum(ctx, b),
        ),
    )?;

    Ok(())
}

/// `A * (B * Psi)` reassociates to `(A * B) * Psi` only when `B * Psi` itself stayed
/// irreducible; otherwise the inner application is evaluated first.
fn associate_application(ctx: &AlgebraContext, b: &Bindings) -> Result<Expr, RuleError> {
    let (a, op_b, psi) = (b.expr("A"), b.expr("B"), b.expr("Psi"));
    let inner = ctx.create(
        OpKind::OperatorTimesKet,
        vec![op_b.clone(), psi.clone()],
        Kwargs::default(),
    )?;
    if inner.kind() == Some(OpKind::OperatorTimesKet)
        && inner.args()[0] == op_b
        && inner.args()[1] == psi
    {
        let ab = ctx.create(OpKind::OperatorTimes, vec![a, op_b], Kwargs::default())?;
        Ok(ctx.create(OpKind::OperatorTimesKet, vec![ab, psi], Kwargs::default())?)
    } else {
        Ok(ctx.create(OpKind::OperatorTimesKet, vec![a, inner], Kwargs::default())?)
    }
}

fn tensor_scalar_out(ctx: &AlgebraContext, b: &Bindings) -> Result<Expr, RuleError> {
    let product = ctx.create(
        OpKind::TensorKet,
        vec![b.expr("Psi"), b.expr("Phi")],
        Kwargs::default(),
    )?;
    Ok(ctx.create(
        OpKind::ScalarTimesKet,
        vec![b.expr("u"), product],
        Kwargs::default(),
    )?)
}

fn pull_constfactor_from_sum(ctx: &AlgebraContext, b: &Bindings) -> Result<Expr, RuleError> {
    let u = b.expr("u");
    let indranges = b.ranges("indranges");

    let bound: std::collections::BTreeSet<_> =
        indranges.iter().map(|r| r.index_symbol().clone()).collect();
    if u.free_index_symbols().intersection(&bound).next().is_some() {
        return Err(CannotSimplify.into());
    }

    let sum = ctx.create(
        OpKind::KetIndexedSum,
        vec![b.expr("Psi")],
        Kwargs::ranges(indranges),
    )?;
    Ok(ctx.create(OpKind::ScalarTimesKet, vec![u, sum], Kwargs::default())?)
}

#[cfg(test)]
mod tests {
    use crate::{default_context, operator, scalar};
    use pretty_assertions::assert_eq;
    use qsym_core::error::AlgebraError;
    use super::*;

    #[test]
    fn scalar_coefficients_normalize() {
        let ctx = default_context();
        let psi = symbol("psi", HilbertSpace::local("0"));
        assert_eq!(scalar_times(&ctx, Expr::integer(1), psi.clone()).unwrap(), psi);
        assert_eq!(
            scalar_times(&ctx, Expr::integer(0), psi.clone()).unwrap(),
            *ZERO_KET,
        );

        let inner = scalar_times(&ctx, Expr::integer(3), psi.clone()).unwrap();
        let outer = scalar_times(&ctx, Expr::integer(2), inner).unwrap();
        assert_eq!(outer, scalar_times(&ctx, Expr::integer(6), psi).unwrap());
    }

    #[test]
    fn operators_apply_to_kets() {
        let ctx = default_context();
        let hs = HilbertSpace::local("0");
        let a = operator::symbol("a", hs.clone());
        let psi = symbol("psi", hs);

        assert_eq!(apply(&ctx, IDENTITY_OPERATOR.clone(), psi.clone()).unwrap(), psi);
        assert_eq!(
            apply(&ctx, ZERO_OPERATOR.clone(), psi.clone()).unwrap(),
            *ZERO_KET,
        );
        assert_eq!(apply(&ctx, a.clone(), ZERO_KET.clone()).unwrap(), *ZERO_KET);

        // scalars migrate to the front: (2a)|psi> == 2 (a |psi>)
        let two_a = operator::scalar_times(&ctx, Expr::integer(2), a.clone()).unwrap();
        let applied = apply(&ctx, two_a, psi.clone()).unwrap();
        let expected = scalar_times(
            &ctx,
            Expr::integer(2),
            apply(&ctx, a, psi).unwrap(),
        )
        .unwrap();
        assert_eq!(applied, expected);
    }

    #[test]
    fn operator_must_act_within_the_ket_space() {
        let ctx = default_context();
        let a = operator::symbol("a", HilbertSpace::local("1"));
        let psi = symbol("psi", HilbertSpace::local("2"));
        let err = apply(&ctx, a, psi);
        assert!(matches!(err, Err(AlgebraError::SpaceTooLarge(..))));
    }

    #[test]
    fn ket_sums_collect() {
        let ctx = default_context();
        let hs = HilbertSpace::local("0");
        let psi = symbol("psi", hs.clone());
        let phi = symbol("phi", hs);
        let sum = plus(&ctx, vec![psi.clone(), phi.clone(), psi.clone()]).unwrap();
        let two_psi = scalar_times(&ctx, Expr::integer(2), psi).unwrap();
        assert_eq!(sum, plus(&ctx, vec![two_psi, phi]).unwrap());
    }

    #[test]
    fn tensor_factors_sort_and_pull_scalars() {
        let ctx = default_context();
        let psi1 = symbol("psi", HilbertSpace::local("1"));
        let phi2 = symbol("phi", HilbertSpace::local("2"));

        // disjoint factors sort by space
        let t = tensor(&ctx, vec![phi2.clone(), psi1.clone()]).unwrap();
        assert_eq!(t.args(), &[psi1.clone(), phi2.clone()]);

        // scalar coefficients bubble out of the tensor product
        let two_psi = scalar_times(&ctx, Expr::integer(2), psi1.clone()).unwrap();
        let t = tensor(&ctx, vec![two_psi, phi2.clone()]).unwrap();
        let expected = scalar_times(
            &ctx,
            Expr::integer(2),
            tensor(&ctx, vec![psi1, phi2]).unwrap(),
        )
        .unwrap();
        assert_eq!(t, expected);
    }

    #[test]
    fn brakets_reduce_to_scalars() {
        let ctx = default_context();
        let hs = HilbertSpace::local("0");
        let psi = symbol("psi", hs.clone());
        let phi = symbol("phi", hs);

        assert_eq!(braket(&ctx, psi.clone(), ZERO_KET.clone()).unwrap(), *ZERO);
        assert_eq!(braket(&ctx, ZERO_KET.clone(), psi.clone()).unwrap(), *ZERO);
        // ket symbols are normalized
        assert_eq!(braket(&ctx, psi.clone(), psi.clone()).unwrap(), *ONE);

        // <2 psi | phi> == conjugate(2) <psi|phi> == 2 <psi|phi>
        let two_psi = scalar_times(&ctx, Expr::integer(2), psi.clone()).unwrap();
        let inner = braket(&ctx, two_psi, phi.clone()).unwrap();
        let expected = scalar::times(
            &ctx,
            vec![Expr::integer(2), braket(&ctx, psi, phi).unwrap()],
        )
        .unwrap();
        assert_eq!(inner, expected);
    }

    #[test]
    fn ketbra_pulls_operators_and_scalars() {
        let ctx = default_context();
        let hs = HilbertSpace::local("0");
        let a = operator::symbol("a", hs.clone());
        let psi = symbol("psi", hs.clone());
        let phi = symbol("phi", hs);

        // |A psi><phi| == A |psi><phi|
        let a_psi = apply(&ctx, a.clone(), psi.clone()).unwrap();
        let outer = ketbra(&ctx, a_psi, phi.clone()).unwrap();
        let expected = operator::times(
            &ctx,
            vec![a, ketbra(&ctx, psi, phi).unwrap()],
        )
        .unwrap();
        assert_eq!(outer, expected);
    }

    #[test]
    fn ket_sum_zero_and_pull_out() {
        let ctx = default_context();
        let i = qsym_core::indices::IdxSym::new("i");
        let range = IndexRange::OverList { idx: i, values: vec![0, 1] };
        let sum = indexed_sum(&ctx, ZERO_KET.clone(), vec![range.clone()]).unwrap();
        assert_eq!(sum, *ZERO_KET);

        let psi = symbol("psi", HilbertSpace::local("0"));
        let alpha = scalar::symbol("alpha");
        let term = scalar_times(&ctx, alpha.clone(), psi).unwrap();
        let sum = indexed_sum(&ctx, term, vec![range]).unwrap();
        assert_eq!(sum.kind(), Some(OpKind::ScalarTimesKet));
        assert_eq!(sum.args()[0], alpha);
        assert_eq!(sum.args()[1].kind(), Some(OpKind::KetIndexedSum));
    }
}
