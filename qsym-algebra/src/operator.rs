//! The operator domain: constructors and the default structural rule set.
//!
//! These rules pull scalar coefficients to the outside, absorb zeros that appear mid-product,
//! rewrite traces structurally, collapse commutators of operators on disjoint spaces, and
//! handle operator-valued indexed sums. The physics rule sets (ladder-operator and spin
//! identities) are deliberately not part of this crate; they layer on through the same
//! registration API.

use qsym_core::context::AlgebraContext;
use qsym_core::error::{AlgebraError, CannotSimplify, RegistryError, RuleError};
use qsym_core::expr::{
    Domain, Expr, Kwargs, OpKind, IDENTITY_OPERATOR, ZERO_OPERATOR,
};
use qsym_core::indices::IndexRange;
use qsym_core::pattern::{pat, pattern_head, wc, Bindings, Head, Pattern, SpacePattern};
use qsym_core::rules::Rule;
use qsym_core::space::HilbertSpace;

/// An operator symbol leaf acting on the given space.
pub fn symbol(label: impl Into<String>, space: HilbertSpace) -> Expr {
    Expr::symbol(label, Domain::Operator, space)
}

/// The sum of operators. Scalar arguments are understood as multiples of the identity.
pub fn plus(ctx: &AlgebraContext, terms: Vec<Expr>) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::OperatorPlus, terms, Kwargs::default())
}

/// The product of operators.
pub fn times(ctx: &AlgebraContext, factors: Vec<Expr>) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::OperatorTimes, factors, Kwargs::default())
}

/// A scalar multiple of an operator.
pub fn scalar_times(ctx: &AlgebraContext, u: Expr, a: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::ScalarTimesOperator, vec![u, a], Kwargs::default())
}

/// The adjoint of an operator.
pub fn adjoint(ctx: &AlgebraContext, a: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::Adjoint, vec![a], Kwargs::default())
}

/// The commutator `[a, b]`.
pub fn commutator(ctx: &AlgebraContext, a: Expr, b: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::Commutator, vec![a, b], Kwargs::default())
}

/// The partial trace of an operator over `space`.
pub fn trace(ctx: &AlgebraContext, a: Expr, space: HilbertSpace) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::OperatorTrace, vec![a], Kwargs::over_space(space))
}

/// An indexed sum of an operator term over the given ranges.
pub fn indexed_sum(
    ctx: &AlgebraContext,
    term: Expr,
    ranges: Vec<IndexRange>,
) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::OperatorIndexedSum, vec![term], Kwargs::ranges(ranges))
}

/// Registers the default operator rules.
pub fn register_rules(ctx: &AlgebraContext) -> Result<(), RegistryError> {
    use OpKind::*;

    // ScalarTimesOperator
    ctx.add_rule(
        ScalarTimesOperator,
        Rule::new(
            "R001",
            pattern_head(vec![
                wc("one").filter(|e| e.is_scalar_one()).into(),
                wc("A").into(),
            ]),
            &["A"],
            |_, b| Ok(b.expr("A")),
        ),
    )?;
    ctx.add_rule(
        ScalarTimesOperator,
        Rule::new(
            "R002",
            pattern_head(vec![
                wc("zero").filter(|e| e.is_scalar_zero()).into(),
                wc("A").into(),
            ]),
            &[],
            |_, _| Ok(ZERO_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        ScalarTimesOperator,
        Rule::new(
            "R003",
            pattern_head(vec![wc("u").into(), Pattern::from(&*ZERO_OPERATOR)]),
            &[],
            |_, _| Ok(ZERO_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        ScalarTimesOperator,
        Rule::new(
            "R004",
            pattern_head(vec![
                wc("u").into(),
                pat(ScalarTimesOperator, vec![wc("v").into(), wc("A").into()]),
            ]),
            &["u", "v", "A"],
            |ctx, b| {
                let uv = ctx.create(
                    ScalarTimes,
                    vec![b.expr("u"), b.expr("v")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    ScalarTimesOperator,
                    vec![uv, b.expr("A")],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        ScalarTimesOperator,
        Rule::new(
            "R005",
            pattern_head(vec![
                Expr::integer(-1).into(),
                wc("A").head(Head::Kind(OperatorPlus)).into(),
            ]),
            &["A"],
            |ctx, b| {
                let sum = b.expr("A");
                let negated = sum
                    .args()
                    .iter()
                    .map(|term| {
                        ctx.create(
                            ScalarTimesOperator,
                            vec![Expr::integer(-1), term.clone()],
                            Kwargs::default(),
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.create(OperatorPlus, negated, Kwargs::default())?)
            },
        ),
    )?;

    // OperatorTimes: scalar coefficients migrate out, zeros absorb
    ctx.add_binary_rule(
        OperatorTimes,
        Rule::new(
            "R001",
            pattern_head(vec![
                pat(ScalarTimesOperator, vec![wc("u").into(), wc("A").into()]),
                wc("B").into(),
            ]),
            &["u", "A", "B"],
            |ctx, b| scalar_out(ctx, b),
        ),
    )?;
    ctx.add_binary_rule(
        OperatorTimes,
        Rule::new(
            "R002",
            pattern_head(vec![Pattern::from(&*ZERO_OPERATOR), wc("B").into()]),
            &[],
            |_, _| Ok(ZERO_OPERATOR.clone()),
        ),
    )?;
    ctx.add_binary_rule(
        OperatorTimes,
        Rule::new(
            "R003",
            pattern_head(vec![wc("A").into(), Pattern::from(&*ZERO_OPERATOR)]),
            &[],
            |_, _| Ok(ZERO_OPERATOR.clone()),
        ),
    )?;
    ctx.add_binary_rule(
        OperatorTimes,
        Rule::new(
            "R004",
            pattern_head(vec![
                wc("A").into(),
                pat(ScalarTimesOperator, vec![wc("u").into(), wc("B").into()]),
            ]),
            &["u", "A", "B"],
            |ctx, b| scalar_out(ctx, b),
        ),
    )?;

    // Adjoint
    ctx.add_rule(
        Adjoint,
        Rule::new(
            "R001",
            pattern_head(vec![pat(Adjoint, vec![wc("A").into()])]),
            &["A"],
            |_, b| Ok(b.expr("A")),
        ),
    )?;
    ctx.add_rule(
        Adjoint,
        Rule::new(
            "R002",
            pattern_head(vec![Pattern::from(&*ZERO_OPERATOR)]),
            &[],
            |_, _| Ok(ZERO_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        Adjoint,
        Rule::new(
            "R003",
            pattern_head(vec![Pattern::from(&*IDENTITY_OPERATOR)]),
            &[],
            |_, _| Ok(IDENTITY_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        Adjoint,
        Rule::new(
            "R004",
            pattern_head(vec![wc("A").head(Head::Kind(OperatorPlus)).into()]),
            &["A"],
            |ctx, b| {
                let terms = b
                    .expr("A")
                    .args()
                    .iter()
                    .map(|term| ctx.create(Adjoint, vec![term.clone()], Kwargs::default()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.create(OperatorPlus, terms, Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        Adjoint,
        Rule::new(
            "R005",
            pattern_head(vec![wc("A").head(Head::Kind(OperatorTimes)).into()]),
            &["A"],
            |ctx, b| {
                let factors = b
                    .expr("A")
                    .args()
                    .iter()
                    .rev()
                    .map(|f| ctx.create(Adjoint, vec![f.clone()], Kwargs::default()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.create(OperatorTimes, factors, Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        Adjoint,
        Rule::new(
            "R006",
            pattern_head(vec![pat(
                ScalarTimesOperator,
                vec![wc("u").into(), wc("A").into()],
            )]),
            &["u", "A"],
            |ctx, b| {
                let conj = ctx.create(ScalarConjugate, vec![b.expr("u")], Kwargs::default())?;
                let adj = ctx.create(Adjoint, vec![b.expr("A")], Kwargs::default())?;
                Ok(ctx.create(ScalarTimesOperator, vec![conj, adj], Kwargs::default())?)
            },
        ),
    )?;

    // Commutator
    ctx.add_rule(
        Commutator,
        Rule::new(
            "R001",
            pattern_head(vec![wc("A").into(), wc("A").into()]),
            &[],
            |_, _| Ok(ZERO_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        Commutator,
        Rule::new(
            "R002",
            pattern_head(vec![
                pat(ScalarTimesOperator, vec![wc("u").into(), wc("A").into()]),
                pat(ScalarTimesOperator, vec![wc("v").into(), wc("B").into()]),
            ]),
            &["u", "v", "A", "B"],
            |ctx, b| {
                let uv = ctx.create(
                    ScalarTimes,
                    vec![b.expr("u"), b.expr("v")],
                    Kwargs::default(),
                )?;
                let comm = ctx.create(
                    Commutator,
                    vec![b.expr("A"), b.expr("B")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(ScalarTimesOperator, vec![uv, comm], Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        Commutator,
        Rule::new(
            "R003",
            pattern_head(vec![
                pat(ScalarTimesOperator, vec![wc("v").into(), wc("A").into()]),
                wc("B").into(),
            ]),
            &["v", "A", "B"],
            |ctx, b| commutator_scalar_out(ctx, b),
        ),
    )?;
    ctx.add_rule(
        Commutator,
        Rule::new(
            "R004",
            pattern_head(vec![
                wc("A").into(),
                pat(ScalarTimesOperator, vec![wc("v").into(), wc("B").into()]),
            ]),
            &["v", "A", "B"],
            |ctx, b| commutator_scalar_out(ctx, b),
        ),
    )?;
    ctx.add_rule(
        Commutator,
        Rule::new(
            "R005",
            pattern_head(vec![wc("A").into(), wc("B").into()]),
            &["A", "B"],
            |_, b| {
                // operators on disjoint spaces commute
                if b.expr("A").space().is_disjoint(&b.expr("B").space()) {
                    Ok(ZERO_OPERATOR.clone())
                } else {
                    Err(CannotSimplify.into())
                }
            },
        ),
    )?;

    // OperatorTrace
    ctx.add_rule(
        OperatorTrace,
        Rule::new(
            "R001",
            pattern_head(vec![wc("A").into()])
                .with_over_space(SpacePattern::Literal(HilbertSpace::Trivial)),
            &["A"],
            |_, b| Ok(b.expr("A")),
        ),
    )?;
    ctx.add_rule(
        OperatorTrace,
        Rule::new(
            "R002",
            pattern_head(vec![Pattern::from(&*ZERO_OPERATOR)])
                .with_over_space(SpacePattern::Wildcard("h".into())),
            &[],
            |_, _| Ok(ZERO_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        OperatorTrace,
        Rule::new(
            "R003",
            pattern_head(vec![Pattern::from(&*IDENTITY_OPERATOR)])
                .with_over_space(SpacePattern::Wildcard("h".into())),
            &["h"],
            |ctx, b| {
                // an unknown dimension keeps the trace symbolic
                let dim = b.space("h").dimension().ok_or(CannotSimplify)?;
                Ok(ctx.create(
                    ScalarTimesOperator,
                    vec![Expr::integer(dim as i64), IDENTITY_OPERATOR.clone()],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        OperatorTrace,
        Rule::new(
            "R004",
            pattern_head(vec![wc("A").head(Head::Kind(OperatorPlus)).into()])
                .with_over_space(SpacePattern::Wildcard("h".into())),
            &["A", "h"],
            |ctx, b| {
                let h = b.space("h");
                let terms = b
                    .expr("A")
                    .args()
                    .iter()
                    .map(|term| {
                        ctx.create(
                            OperatorTrace,
                            vec![term.clone()],
                            Kwargs::over_space(h.clone()),
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.create(OperatorPlus, terms, Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        OperatorTrace,
        Rule::new(
            "R005",
            pattern_head(vec![pat(Adjoint, vec![wc("A").into()])])
                .with_over_space(SpacePattern::Wildcard("h".into())),
            &["A", "h"],
            |ctx, b| {
                let traced = ctx.create(
                    OperatorTrace,
                    vec![b.expr("A")],
                    Kwargs::over_space(b.space("h")),
                )?;
                Ok(ctx.create(Adjoint, vec![traced], Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        OperatorTrace,
        Rule::new(
            "R006",
            pattern_head(vec![pat(
                ScalarTimesOperator,
                vec![wc("u").into(), wc("A").into()],
            )])
            .with_over_space(SpacePattern::Wildcard("h".into())),
            &["u", "A", "h"],
            |ctx, b| {
                let traced = ctx.create(
                    OperatorTrace,
                    vec![b.expr("A")],
                    Kwargs::over_space(b.space("h")),
                )?;
                Ok(ctx.create(
                    ScalarTimesOperator,
                    vec![b.expr("u"), traced],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;

    // OperatorIndexedSum
    ctx.add_rule(
        OperatorIndexedSum,
        Rule::new(
            "R001",
            pattern_head(vec![Pattern::from(&*ZERO_OPERATOR)]).with_ranges("indranges"),
            &[],
            |_, _| Ok(ZERO_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        OperatorIndexedSum,
        Rule::new(
            "R002",
            pattern_head(vec![pat(
                ScalarTimesOperator,
                vec![wc("u").into(), wc("A").into()],
            )])
            .with_ranges("indranges"),
            &["u", "A", "indranges"],
            |ctx, b| pull_constfactor_from_sum(ctx, b),
        ),
    )?;

    Ok(())
}

/// `(u * A) * B` and `A * (u * B)` both become `u * (A * B)`.
fn scalar_out(ctx: &AlgebraContext, b: &Bindings) -> Result<Expr, RuleError> {
    let product = ctx.create(
        OpKind::OperatorTimes,
        vec![b.expr("A"), b.expr("B")],
        Kwargs::default(),
    )?;
    Ok(ctx.create(
        OpKind::ScalarTimesOperator,
        vec![b.expr("u"), product],
        Kwargs::default(),
    )?)
}

fn commutator_scalar_out(ctx: &AlgebraContext, b: &Bindings) -> Result<Expr, RuleError> {
    let comm = ctx.create(
        OpKind::Commutator,
        vec![b.expr("A"), b.expr("B")],
        Kwargs::default(),
    )?;
    Ok(ctx.create(
        OpKind::ScalarTimesOperator,
        vec![b.expr("v"), comm],
        Kwargs::default(),
    )?)
}

/// Pulls a constant prefactor out of an operator sum; declines when the coefficient captures a
/// bound index.
fn pull_constfactor_from_sum(ctx: &AlgebraContext, b: &Bindings) -> Result<Expr, RuleError> {
    let u = b.expr("u");
    let indranges = b.ranges("indranges");

    let bound: std::collections::BTreeSet<_> =
        indranges.iter().map(|r| r.index_symbol().clone()).collect();
    if u.free_index_symbols().intersection(&bound).next().is_some() {
        return Err(CannotSimplify.into());
    }

    let sum = ctx.create(
        OpKind::OperatorIndexedSum,
        vec![b.expr("A")],
        Kwargs::ranges(indranges),
    )?;
    Ok(ctx.create(OpKind::ScalarTimesOperator, vec![u, sum], Kwargs::default())?)
}

#[cfg(test)]
mod tests {
    use crate::{default_context, scalar};
    use pretty_assertions::assert_eq;
    use qsym_core::expr::ONE;
    use qsym_core::indices::{IdxSym, IndexRange, RangeLimit};
    use super::*;

    fn ctx_and_ops() -> (AlgebraContext, Expr, Expr, Expr) {
        let ctx = default_context();
        let hs = HilbertSpace::local("0");
        let a = symbol("a", hs.clone());
        let b = symbol("b", hs.clone());
        let c = symbol("c", hs);
        (ctx, a, b, c)
    }

    #[test]
    fn neutral_elements_absorb() {
        let (ctx, a, _, _) = ctx_and_ops();
        assert_eq!(plus(&ctx, vec![a.clone(), ZERO_OPERATOR.clone()]).unwrap(), a);
        assert_eq!(times(&ctx, vec![a.clone(), IDENTITY_OPERATOR.clone()]).unwrap(), a);
        assert_eq!(
            times(&ctx, vec![a.clone(), ZERO_OPERATOR.clone()]).unwrap(),
            *ZERO_OPERATOR,
        );
    }

    #[test]
    fn scalar_terms_coerce_to_identity_multiples() {
        let (ctx, a, _, _) = ctx_and_ops();
        // A + 0 == A even for the scalar zero
        assert_eq!(plus(&ctx, vec![a.clone(), Expr::integer(0)]).unwrap(), a);
        // A + alpha == alpha*1 + A
        let alpha = scalar::symbol("alpha");
        let sum = plus(&ctx, vec![a.clone(), alpha.clone()]).unwrap();
        let expected = plus(
            &ctx,
            vec![
                a,
                scalar_times(&ctx, alpha, IDENTITY_OPERATOR.clone()).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(sum, expected);
    }

    #[test]
    fn like_terms_collect() {
        let (ctx, a, b, _) = ctx_and_ops();
        let sum = plus(&ctx, vec![a.clone(), b.clone(), a.clone()]).unwrap();
        let two_a = scalar_times(&ctx, Expr::integer(2), a.clone()).unwrap();
        assert_eq!(sum, plus(&ctx, vec![two_a, b]).unwrap());

        // coefficients add across collected terms
        let two_a = scalar_times(&ctx, Expr::integer(2), a.clone()).unwrap();
        let three_a = scalar_times(&ctx, Expr::integer(3), a.clone()).unwrap();
        let five_a = scalar_times(&ctx, Expr::integer(5), a.clone()).unwrap();
        assert_eq!(plus(&ctx, vec![two_a, three_a]).unwrap(), five_a);

        // a term whose coefficient collects to zero vanishes
        let neg_a = scalar_times(&ctx, Expr::integer(-1), a.clone()).unwrap();
        assert_eq!(plus(&ctx, vec![a, neg_a]).unwrap(), *ZERO_OPERATOR);
    }

    #[test]
    fn commutative_reordering_is_permutation_stable() {
        let (ctx, a, b, c) = ctx_and_ops();
        let p1 = plus(&ctx, vec![c.clone(), a.clone(), b.clone()]).unwrap();
        let p2 = plus(&ctx, vec![b.clone(), c.clone(), a.clone()]).unwrap();
        assert_eq!(p1, p2);
        // and the construction cache makes them the identical node
        assert!(p1.is_same(&p2));
    }

    #[test]
    fn disjoint_factors_sort_same_space_factors_do_not() {
        let ctx = default_context();
        let a1 = symbol("a", HilbertSpace::local("1"));
        let b2 = symbol("b", HilbertSpace::local("2"));
        let product = times(&ctx, vec![b2.clone(), a1.clone()]).unwrap();
        assert_eq!(product.args(), &[a1.clone(), b2.clone()]);

        let c1 = symbol("c", HilbertSpace::local("1"));
        let product = times(&ctx, vec![c1.clone(), a1.clone()]).unwrap();
        // same space: insertion order is preserved
        assert_eq!(product.args(), &[c1, a1]);
    }

    #[test]
    fn scalars_migrate_out_of_products() {
        let (ctx, a, b, _) = ctx_and_ops();
        let two_a = scalar_times(&ctx, Expr::integer(2), a.clone()).unwrap();
        let product = times(&ctx, vec![two_a, b.clone()]).unwrap();
        let expected = scalar_times(
            &ctx,
            Expr::integer(2),
            times(&ctx, vec![a, b]).unwrap(),
        )
        .unwrap();
        assert_eq!(product, expected);
    }

    #[test]
    fn nested_scalar_multiples_flatten() {
        let (ctx, a, _, _) = ctx_and_ops();
        let inner = scalar_times(&ctx, Expr::integer(3), a.clone()).unwrap();
        let outer = scalar_times(&ctx, Expr::integer(2), inner).unwrap();
        assert_eq!(outer, scalar_times(&ctx, Expr::integer(6), a).unwrap());
    }

    #[test]
    fn adjoint_rules() {
        let (ctx, a, b, _) = ctx_and_ops();
        let adj = adjoint(&ctx, a.clone()).unwrap();
        assert_eq!(adjoint(&ctx, adj.clone()).unwrap(), a);
        assert_eq!(adjoint(&ctx, ZERO_OPERATOR.clone()).unwrap(), *ZERO_OPERATOR);
        assert_eq!(
            adjoint(&ctx, IDENTITY_OPERATOR.clone()).unwrap(),
            *IDENTITY_OPERATOR,
        );

        // (a * b)^+ == b^+ * a^+
        let product = times(&ctx, vec![a.clone(), b.clone()]).unwrap();
        let expected = times(
            &ctx,
            vec![adjoint(&ctx, b).unwrap(), adjoint(&ctx, a).unwrap()],
        )
        .unwrap();
        assert_eq!(adjoint(&ctx, product).unwrap(), expected);
    }

    #[test]
    fn commutator_rules() {
        let (ctx, a, b, _) = ctx_and_ops();
        assert_eq!(commutator(&ctx, a.clone(), a.clone()).unwrap(), *ZERO_OPERATOR);

        // operators on disjoint spaces commute
        let x1 = symbol("x", HilbertSpace::local("1"));
        let y2 = symbol("y", HilbertSpace::local("2"));
        assert_eq!(commutator(&ctx, x1, y2).unwrap(), *ZERO_OPERATOR);

        // scalars pull out of commutators
        let two_a = scalar_times(&ctx, Expr::integer(2), a.clone()).unwrap();
        let comm = commutator(&ctx, two_a, b.clone()).unwrap();
        let expected = scalar_times(
            &ctx,
            Expr::integer(2),
            commutator(&ctx, a, b).unwrap(),
        )
        .unwrap();
        assert_eq!(comm, expected);
    }

    #[test]
    fn trace_rules() {
        let ctx = default_context();
        let h = HilbertSpace::local_with_dimension("1", 3);
        let a = symbol("a", h.clone());

        assert_eq!(trace(&ctx, a.clone(), HilbertSpace::Trivial).unwrap(), a);
        assert_eq!(
            trace(&ctx, ZERO_OPERATOR.clone(), h.clone()).unwrap(),
            *ZERO_OPERATOR,
        );
        assert_eq!(
            trace(&ctx, IDENTITY_OPERATOR.clone(), h.clone()).unwrap(),
            scalar_times(&ctx, Expr::integer(3), IDENTITY_OPERATOR.clone()).unwrap(),
        );

        // the trace over an unknown dimension stays symbolic
        let unknown = HilbertSpace::local("2");
        let traced = trace(&ctx, IDENTITY_OPERATOR.clone(), unknown).unwrap();
        assert_eq!(traced.kind(), Some(OpKind::OperatorTrace));

        // scalars pull out of traces
        let two_a = scalar_times(&ctx, Expr::integer(2), a.clone()).unwrap();
        let traced = trace(&ctx, two_a, h.clone()).unwrap();
        let expected = scalar_times(
            &ctx,
            Expr::integer(2),
            trace(&ctx, a, h).unwrap(),
        )
        .unwrap();
        assert_eq!(traced, expected);
    }

    #[test]
    fn sum_over_zero_term_is_zero() {
        let ctx = default_context();
        let i = IdxSym::new("i");
        let j = IdxSym::new("j");
        let ranges = vec![
            IndexRange::OverRange { idx: i, start: 1, stop: RangeLimit::Sym("N".into()) },
            IndexRange::OverList { idx: j, values: vec![1, 2, 3] },
        ];
        // reduces without evaluating the (symbolic) ranges
        let sum = indexed_sum(&ctx, ZERO_OPERATOR.clone(), ranges).unwrap();
        assert_eq!(sum, *ZERO_OPERATOR);
    }

    #[test]
    fn index_free_coefficient_pulls_out_of_sum() {
        let (ctx, a, _, _) = ctx_and_ops();
        let i = IdxSym::new("i");
        let range = IndexRange::OverList { idx: i.clone(), values: vec![1, 2] };
        let alpha = scalar::symbol("alpha");

        let term = scalar_times(&ctx, alpha.clone(), a.clone()).unwrap();
        let sum = indexed_sum(&ctx, term, vec![range.clone()]).unwrap();
        assert_eq!(sum.kind(), Some(OpKind::ScalarTimesOperator));
        assert_eq!(sum.args()[0], alpha);
        assert_eq!(sum.args()[1].kind(), Some(OpKind::OperatorIndexedSum));

        // a coefficient referencing the bound index must stay inside the sum
        let idx_coeff = scalar::times(&ctx, vec![alpha, Expr::idx(i)]).unwrap();
        let term = scalar_times(&ctx, idx_coeff, a).unwrap();
        let sum = indexed_sum(&ctx, term.clone(), vec![range]).unwrap();
        assert_eq!(sum.kind(), Some(OpKind::OperatorIndexedSum));
        assert_eq!(sum.args()[0], term);
    }

    #[test]
    fn doit_expands_and_deltas_cancel() {
        let (ctx, a, _, _) = ctx_and_ops();
        let i = IdxSym::new("i");
        let j = IdxSym::new("j");
        let ranges = vec![
            IndexRange::OverList { idx: i.clone(), values: vec![1, 2] },
            IndexRange::OverList { idx: j.clone(), values: vec![1, 2] },
        ];
        let delta_ij = scalar::delta(&ctx, Expr::idx(i), Expr::idx(j)).unwrap();
        let term = scalar_times(&ctx, delta_ij, a.clone()).unwrap();
        let sum = indexed_sum(&ctx, term, ranges).unwrap();

        // only the i == j pairs survive, and the Plus pipeline collects them
        let expanded = sum.doit(&ctx).unwrap();
        assert_eq!(expanded, scalar_times(&ctx, Expr::integer(2), a).unwrap());
    }

    #[test]
    fn idempotence_of_reconstruction() {
        let (ctx, a, b, _) = ctx_and_ops();
        let two_a = scalar_times(&ctx, Expr::integer(2), a).unwrap();
        let sum = plus(&ctx, vec![two_a, b]).unwrap();
        let rebuilt = ctx
            .create(
                sum.kind().unwrap(),
                sum.args().to_vec(),
                sum.kwargs().cloned().unwrap_or_default(),
            )
            .unwrap();
        assert_eq!(rebuilt, sum);
        assert!(rebuilt.is_same(&sum));
    }

    #[test]
    fn expand_distributes_products_over_sums() {
        let (ctx, a, b, c) = ctx_and_ops();
        let sum = plus(&ctx, vec![b.clone(), c.clone()]).unwrap();
        let product = times(&ctx, vec![a.clone(), sum]).unwrap();
        assert_eq!(product.kind(), Some(OpKind::OperatorTimes));

        let expanded = product.expand(&ctx).unwrap();
        let expected = plus(
            &ctx,
            vec![
                times(&ctx, vec![a.clone(), b]).unwrap(),
                times(&ctx, vec![a, c]).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(expanded, expected);
    }

    #[test]
    fn one_coefficient_unwraps() {
        let (ctx, a, _, _) = ctx_and_ops();
        assert_eq!(scalar_times(&ctx, ONE.clone(), a.clone()).unwrap(), a);
        assert_eq!(
            scalar_times(&ctx, Expr::integer(0), a).unwrap(),
            *ZERO_OPERATOR,
        );
    }
}
