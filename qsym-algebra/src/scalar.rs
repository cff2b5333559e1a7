//! The scalar domain: constructors and the default structural rule set.
//!
//! Scalars are the coefficient field of every other domain. The rules here fold numeric
//! literals, combine powers, evaluate Kronecker deltas, and handle indexed scalar sums
//! (zero-propagation and the guarded constant pull-out).

use qsym_core::context::AlgebraContext;
use qsym_core::error::{AlgebraError, CannotSimplify, RegistryError, RuleError};
use qsym_core::expr::{Domain, Expr, Kwargs, OpKind, ONE, ZERO};
use qsym_core::indices::IndexRange;
use qsym_core::pattern::{pat, pattern_head, wc, wc_rest, Bindings, Head};
use qsym_core::rules::Rule;
use qsym_core::space::HilbertSpace;
use qsym_core::value::ScalarValue;
use rug::Rational;

/// A scalar symbol leaf.
pub fn symbol(label: impl Into<String>) -> Expr {
    Expr::symbol(label, Domain::Scalar, HilbertSpace::Trivial)
}

/// A numeric scalar literal leaf.
pub fn value(n: i64) -> Expr {
    Expr::integer(n)
}

/// An exact rational scalar literal leaf, reduced to canonical form (`4/2` is the integer
/// `2`).
pub fn rational(numer: i64, denom: i64) -> Expr {
    Expr::scalar(ScalarValue::from_rational(Rational::from((numer, denom))))
}

/// The sum of scalars.
pub fn plus(ctx: &AlgebraContext, terms: Vec<Expr>) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::ScalarPlus, terms, Kwargs::default())
}

/// The product of scalars.
pub fn times(ctx: &AlgebraContext, factors: Vec<Expr>) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::ScalarTimes, factors, Kwargs::default())
}

/// A scalar power.
pub fn power(ctx: &AlgebraContext, base: Expr, exp: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::ScalarPower, vec![base, exp], Kwargs::default())
}

/// The complex conjugate of a scalar.
pub fn conjugate(ctx: &AlgebraContext, x: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::ScalarConjugate, vec![x], Kwargs::default())
}

/// The Kronecker delta of two scalar indices.
pub fn delta(ctx: &AlgebraContext, i: Expr, j: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::KroneckerDelta, vec![i, j], Kwargs::default())
}

/// An indexed sum of a scalar term over the given ranges.
pub fn indexed_sum(
    ctx: &AlgebraContext,
    term: Expr,
    ranges: Vec<IndexRange>,
) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::ScalarIndexedSum, vec![term], Kwargs::ranges(ranges))
}

/// Registers the default scalar rules.
pub fn register_rules(ctx: &AlgebraContext) -> Result<(), RegistryError> {
    use OpKind::*;

    // ScalarTimes: fold adjacent numbers, combine equal factors and powers
    ctx.add_binary_rule(
        ScalarTimes,
        Rule::new(
            "R001",
            pattern_head(vec![
                wc("a").head(Head::Value).into(),
                wc("b").head(Head::Value).into(),
            ]),
            &["a", "b"],
            |_, b| {
                let (x, y) = (b.expr("a"), b.expr("b"));
                // both captures are numeric literals by their head constraints
                Ok(Expr::scalar(x.as_value().unwrap().mul(y.as_value().unwrap())))
            },
        ),
    )?;
    ctx.add_binary_rule(
        ScalarTimes,
        Rule::new(
            "R002",
            pattern_head(vec![wc("x").into(), wc("x").into()]),
            &["x"],
            |ctx, b| {
                let x = b.expr("x");
                Ok(ctx.create(ScalarPower, vec![x, Expr::integer(2)], Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_binary_rule(
        ScalarTimes,
        Rule::new(
            "R003",
            pattern_head(vec![wc("z").filter(|e| e.is_scalar_zero()).into(), wc("x").into()]),
            &[],
            |_, _| Ok(ZERO.clone()),
        ),
    )?;
    ctx.add_binary_rule(
        ScalarTimes,
        Rule::new(
            "R004",
            pattern_head(vec![wc("x").into(), wc("z").filter(|e| e.is_scalar_zero()).into()]),
            &[],
            |_, _| Ok(ZERO.clone()),
        ),
    )?;
    ctx.add_binary_rule(
        ScalarTimes,
        Rule::new(
            "R005",
            pattern_head(vec![
                pat(ScalarPower, vec![wc("x").into(), wc("y").into()]),
                pat(ScalarPower, vec![wc("x").into(), wc("z").into()]),
            ]),
            &["x", "y", "z"],
            |ctx, b| {
                let exp = ctx.create(
                    ScalarPlus,
                    vec![b.expr("y"), b.expr("z")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(ScalarPower, vec![b.expr("x"), exp], Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_binary_rule(
        ScalarTimes,
        Rule::new(
            "R006",
            pattern_head(vec![
                wc("x").into(),
                pat(ScalarPower, vec![wc("x").into(), Expr::integer(-1).into()]),
            ]),
            &[],
            |_, _| Ok(ONE.clone()),
        ),
    )?;

    // ScalarPower
    ctx.add_rule(
        ScalarPower,
        Rule::new(
            "R001",
            pattern_head(vec![
                wc("a").head(Head::Value).into(),
                wc("b").head(Head::Value).into(),
            ]),
            &["a", "b"],
            |_, b| {
                let (base, exp) = (b.expr("a"), b.expr("b"));
                base.as_value()
                    .unwrap()
                    .checked_pow(exp.as_value().unwrap())
                    .map(Expr::scalar)
                    .ok_or(RuleError::CannotSimplify)
            },
        ),
    )?;
    ctx.add_rule(
        ScalarPower,
        Rule::new(
            "R002",
            pattern_head(vec![wc("x").into(), Expr::integer(0).into()]),
            &[],
            |_, _| Ok(ONE.clone()),
        ),
    )?;
    ctx.add_rule(
        ScalarPower,
        Rule::new(
            "R003",
            pattern_head(vec![wc("x").into(), Expr::integer(1).into()]),
            &["x"],
            |_, b| Ok(b.expr("x")),
        ),
    )?;
    ctx.add_rule(
        ScalarPower,
        Rule::new(
            "R004",
            pattern_head(vec![
                pat(ScalarPower, vec![wc("x").into(), wc("y").into()]),
                wc("z").into(),
            ]),
            &["x", "y", "z"],
            |ctx, b| {
                let exp = ctx.create(
                    ScalarTimes,
                    vec![b.expr("y"), b.expr("z")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(ScalarPower, vec![b.expr("x"), exp], Kwargs::default())?)
            },
        ),
    )?;

    // ScalarConjugate: numbers are real, conjugation is an involution, deltas are real
    ctx.add_rule(
        ScalarConjugate,
        Rule::new(
            "R001",
            pattern_head(vec![wc("a").head(Head::Value).into()]),
            &["a"],
            |_, b| Ok(b.expr("a")),
        ),
    )?;
    ctx.add_rule(
        ScalarConjugate,
        Rule::new(
            "R002",
            pattern_head(vec![pat(ScalarConjugate, vec![wc("x").into()])]),
            &["x"],
            |_, b| Ok(b.expr("x")),
        ),
    )?;
    ctx.add_rule(
        ScalarConjugate,
        Rule::new(
            "R003",
            pattern_head(vec![pat(KroneckerDelta, vec![wc("i").into(), wc("j").into()])]),
            &["i", "j"],
            |ctx, b| {
                Ok(ctx.create(
                    KroneckerDelta,
                    vec![b.expr("i"), b.expr("j")],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;

    // KroneckerDelta: delta(x, x) = 1; distinct numeric indices give 0
    ctx.add_rule(
        KroneckerDelta,
        Rule::new(
            "R001",
            pattern_head(vec![wc("x").into(), wc("x").into()]),
            &[],
            |_, _| Ok(ONE.clone()),
        ),
    )?;
    ctx.add_rule(
        KroneckerDelta,
        Rule::new(
            "R002",
            pattern_head(vec![
                wc("a").head(Head::Value).into(),
                wc("b").head(Head::Value).into(),
            ]),
            &["a", "b"],
            |_, b| {
                let (x, y) = (b.expr("a"), b.expr("b"));
                if x.as_value().unwrap().numerically_eq(y.as_value().unwrap()) {
                    Ok(ONE.clone())
                } else {
                    Ok(ZERO.clone())
                }
            },
        ),
    )?;

    // ScalarIndexedSum: zero-propagation and guarded constant pull-out
    ctx.add_rule(
        ScalarIndexedSum,
        Rule::new(
            "R001",
            pattern_head(vec![wc("term").filter(|e| e.is_scalar_zero()).into()])
                .with_ranges("indranges"),
            &[],
            |_, _| Ok(ZERO.clone()),
        ),
    )?;
    ctx.add_rule(
        ScalarIndexedSum,
        Rule::new(
            "R002",
            pattern_head(vec![pat(
                ScalarTimes,
                vec![wc("x").into(), wc_rest("rest").into()],
            )])
            .with_ranges("indranges"),
            &["x", "rest", "indranges"],
            |ctx, b| pull_constfactor_from_sum(ctx, b),
        ),
    )?;

    Ok(())
}

/// Pulls a constant prefactor out of an indexed sum, but only when the factor's free symbols
/// do not intersect the bound index set; otherwise this rule must explicitly decline rather
/// than silently produce an incorrect factoring.
fn pull_constfactor_from_sum(ctx: &AlgebraContext, b: &Bindings) -> Result<Expr, RuleError> {
    let x = b.expr("x");
    let rest = b.exprs("rest");
    let indranges = b.ranges("indranges");

    let bound: std::collections::BTreeSet<_> =
        indranges.iter().map(|r| r.index_symbol().clone()).collect();
    if x.free_index_symbols().intersection(&bound).next().is_some() {
        return Err(CannotSimplify.into());
    }

    let inner = ctx.create(OpKind::ScalarTimes, rest, Kwargs::default())?;
    let sum = ctx.create(
        OpKind::ScalarIndexedSum,
        vec![inner],
        Kwargs::ranges(indranges),
    )?;
    Ok(ctx.create(OpKind::ScalarTimes, vec![x, sum], Kwargs::default())?)
}

#[cfg(test)]
mod tests {
    use crate::default_context;
    use pretty_assertions::assert_eq;
    use qsym_core::indices::{IdxSym, RangeLimit};
    use super::*;

    #[test]
    fn numbers_fold() {
        let ctx = default_context();
        let product = times(&ctx, vec![value(2), value(3), symbol("x")]).unwrap();
        assert_eq!(
            product,
            times(&ctx, vec![value(6), symbol("x")]).unwrap(),
        );
        assert_eq!(plus(&ctx, vec![value(2), value(3)]).unwrap(), value(5));
    }

    #[test]
    fn rational_coefficients_collect_exactly() {
        let ctx = default_context();
        let x = symbol("x");
        let half_x = times(&ctx, vec![rational(1, 2), x.clone()]).unwrap();
        let sum = plus(&ctx, vec![half_x.clone(), half_x]).unwrap();
        assert_eq!(sum, x);
        assert_eq!(rational(4, 2), value(2));
    }

    #[test]
    fn like_factors_square() {
        let ctx = default_context();
        let x = symbol("x");
        let product = times(&ctx, vec![x.clone(), x.clone()]).unwrap();
        assert_eq!(product, power(&ctx, x, value(2)).unwrap());
    }

    #[test]
    fn powers_combine() {
        let ctx = default_context();
        let x = symbol("x");
        let p2 = power(&ctx, x.clone(), value(2)).unwrap();
        let p3 = power(&ctx, x.clone(), value(3)).unwrap();
        let product = times(&ctx, vec![p2, p3]).unwrap();
        assert_eq!(product, power(&ctx, x, value(5)).unwrap());
    }

    #[test]
    fn reciprocal_cancels() {
        let ctx = default_context();
        let x = symbol("x");
        let inv = power(&ctx, x.clone(), value(-1)).unwrap();
        let product = times(&ctx, vec![x, inv]).unwrap();
        assert_eq!(product, *ONE);
    }

    #[test]
    fn power_of_power_flattens() {
        let ctx = default_context();
        let x = symbol("x");
        let p = power(&ctx, x.clone(), value(2)).unwrap();
        let pp = power(&ctx, p, value(3)).unwrap();
        assert_eq!(pp, power(&ctx, x, value(6)).unwrap());
    }

    #[test]
    fn numeric_powers_evaluate_or_stay() {
        let ctx = default_context();
        assert_eq!(power(&ctx, value(2), value(10)).unwrap(), value(1024));
        // 2^-1 evaluates to the exact rational 1/2
        let half = power(&ctx, value(2), value(-1)).unwrap();
        assert!(half.as_value().is_some());
        // 2^(1/2) stays symbolic: the numeric rule declines via CannotSimplify
        let root = power(&ctx, value(2), half).unwrap();
        assert_eq!(root.kind(), Some(OpKind::ScalarPower));
    }

    #[test]
    fn delta_evaluates() {
        let ctx = default_context();
        let i = Expr::idx(IdxSym::new("i"));
        let j = Expr::idx(IdxSym::new("j"));
        assert_eq!(delta(&ctx, i.clone(), i.clone()).unwrap(), *ONE);
        assert_eq!(delta(&ctx, value(0), value(1)).unwrap(), *ZERO);
        assert_eq!(delta(&ctx, value(2), value(2)).unwrap(), *ONE);
        // symbolic indices stay, and the argument order is canonical
        let sym = delta(&ctx, j.clone(), i.clone()).unwrap();
        assert_eq!(sym, delta(&ctx, i, j).unwrap());
        assert_eq!(sym.kind(), Some(OpKind::KroneckerDelta));
    }

    #[test]
    fn conjugate_is_involution() {
        let ctx = default_context();
        let x = symbol("x");
        let c = conjugate(&ctx, x.clone()).unwrap();
        assert_eq!(c.kind(), Some(OpKind::ScalarConjugate));
        assert_eq!(conjugate(&ctx, c).unwrap(), x);
        assert_eq!(conjugate(&ctx, value(3)).unwrap(), value(3));
    }

    #[test]
    fn sum_over_zero_is_zero() {
        let ctx = default_context();
        let i = IdxSym::new("i");
        let range = IndexRange::OverRange {
            idx: i,
            start: 1,
            stop: RangeLimit::Sym("N".into()),
        };
        // the symbolic range is never consulted
        let sum = indexed_sum(&ctx, value(0), vec![range]).unwrap();
        assert_eq!(sum, *ZERO);
    }

    #[test]
    fn constant_pulls_out_of_sum() {
        let ctx = default_context();
        let i = IdxSym::new("i");
        let range = IndexRange::OverRange {
            idx: i.clone(),
            start: 1,
            stop: RangeLimit::Sym("N".into()),
        };
        let c = symbol("c");
        let x = symbol("x");
        let term = times(&ctx, vec![c.clone(), power(&ctx, x, Expr::idx(i)).unwrap()])
            .unwrap();
        let sum = indexed_sum(&ctx, term, vec![range]).unwrap();
        // c is index-free, so it must be pulled out in front of the sum
        assert_eq!(sum.kind(), Some(OpKind::ScalarTimes));
        assert_eq!(sum.args()[0], c);
        assert_eq!(sum.args()[1].kind(), Some(OpKind::ScalarIndexedSum));
    }

    #[test]
    fn bound_factor_stays_in_sum() {
        let ctx = default_context();
        let i = IdxSym::new("i");
        let range = IndexRange::OverRange {
            idx: i.clone(),
            start: 1,
            stop: RangeLimit::Sym("N".into()),
        };
        let x = symbol("x");
        // i * x has the bound index as its leading factor: the pull-out rule must decline
        let term = times(&ctx, vec![Expr::idx(i), x]).unwrap();
        let sum = indexed_sum(&ctx, term.clone(), vec![range]).unwrap();
        assert_eq!(sum.kind(), Some(OpKind::ScalarIndexedSum));
        assert_eq!(sum.args()[0], term);
    }
}
