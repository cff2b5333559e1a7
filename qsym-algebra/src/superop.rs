//! The super-operator domain: constructors and the default structural rule set.
//!
//! `SPre` and `SPost` wrap operators into left- and right-multiplication super-operators; they
//! compose among themselves, collapse on identity/zero operators, and applying a
//! super-operator expression to an operator unwraps back into the operator domain.

use qsym_core::context::AlgebraContext;
use qsym_core::error::{AlgebraError, RegistryError, RuleError};
use qsym_core::expr::{
    Domain, Expr, Kwargs, OpKind, IDENTITY_OPERATOR, IDENTITY_SUPER_OPERATOR, ZERO_OPERATOR,
    ZERO_SUPER_OPERATOR,
};
use qsym_core::pattern::{pat, pattern_head, wc, wc_rest, Bindings, Head, Pattern};
use qsym_core::rules::Rule;
use qsym_core::space::HilbertSpace;

/// A super-operator symbol leaf acting on the given space.
pub fn symbol(label: impl Into<String>, space: HilbertSpace) -> Expr {
    Expr::symbol(label, Domain::SuperOperator, space)
}

/// The sum of super-operators. Scalar arguments are understood as multiples of the identity.
pub fn plus(ctx: &AlgebraContext, terms: Vec<Expr>) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::SuperOperatorPlus, terms, Kwargs::default())
}

/// The product (composition) of super-operators.
pub fn times(ctx: &AlgebraContext, factors: Vec<Expr>) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::SuperOperatorTimes, factors, Kwargs::default())
}

/// A scalar multiple of a super-operator.
pub fn scalar_times(ctx: &AlgebraContext, u: Expr, sa: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::ScalarTimesSuperOperator, vec![u, sa], Kwargs::default())
}

/// The super-operator adjoint.
pub fn adjoint(ctx: &AlgebraContext, sa: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::SuperAdjoint, vec![sa], Kwargs::default())
}

/// Left multiplication by `a`: `SPre(a): rho -> a * rho`.
pub fn spre(ctx: &AlgebraContext, a: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::SPre, vec![a], Kwargs::default())
}

/// Right multiplication by `a`: `SPost(a): rho -> rho * a`.
pub fn spost(ctx: &AlgebraContext, a: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::SPost, vec![a], Kwargs::default())
}

/// A super-operator applied to an operator (an operator).
pub fn apply(ctx: &AlgebraContext, sa: Expr, b: Expr) -> Result<Expr, AlgebraError> {
    ctx.create(OpKind::SuperOperatorTimesOperator, vec![sa, b], Kwargs::default())
}

/// Registers the default super-operator rules.
pub fn register_rules(ctx: &AlgebraContext) -> Result<(), RegistryError> {
    use OpKind::*;

    // ScalarTimesSuperOperator
    ctx.add_rule(
        ScalarTimesSuperOperator,
        Rule::new(
            "R001",
            pattern_head(vec![
                wc("one").filter(|e| e.is_scalar_one()).into(),
                wc("sA").into(),
            ]),
            &["sA"],
            |_, b| Ok(b.expr("sA")),
        ),
    )?;
    ctx.add_rule(
        ScalarTimesSuperOperator,
        Rule::new(
            "R002",
            pattern_head(vec![
                wc("zero").filter(|e| e.is_scalar_zero()).into(),
                wc("sA").into(),
            ]),
            &[],
            |_, _| Ok(ZERO_SUPER_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        ScalarTimesSuperOperator,
        Rule::new(
            "R003",
            pattern_head(vec![wc("u").into(), Pattern::from(&*ZERO_SUPER_OPERATOR)]),
            &[],
            |_, _| Ok(ZERO_SUPER_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        ScalarTimesSuperOperator,
        Rule::new(
            "R004",
            pattern_head(vec![
                wc("u").into(),
                pat(ScalarTimesSuperOperator, vec![wc("v").into(), wc("sA").into()]),
            ]),
            &["u", "v", "sA"],
            |ctx, b| {
                let uv = ctx.create(
                    ScalarTimes,
                    vec![b.expr("u"), b.expr("v")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    ScalarTimesSuperOperator,
                    vec![uv, b.expr("sA")],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;

    // SuperOperatorTimes
    ctx.add_binary_rule(
        SuperOperatorTimes,
        Rule::new(
            "R001",
            pattern_head(vec![
                pat(ScalarTimesSuperOperator, vec![wc("u").into(), wc("sA").into()]),
                wc("sB").into(),
            ]),
            &["u", "sA", "sB"],
            |ctx, b| compose_scalar_out(ctx, b),
        ),
    )?;
    ctx.add_binary_rule(
        SuperOperatorTimes,
        Rule::new(
            "R002",
            pattern_head(vec![
                wc("sA").into(),
                pat(ScalarTimesSuperOperator, vec![wc("u").into(), wc("sB").into()]),
            ]),
            &["u", "sA", "sB"],
            |ctx, b| compose_scalar_out(ctx, b),
        ),
    )?;
    ctx.add_binary_rule(
        SuperOperatorTimes,
        Rule::new(
            "R003",
            pattern_head(vec![
                pat(SPre, vec![wc("A").into()]),
                pat(SPre, vec![wc("B").into()]),
            ]),
            &["A", "B"],
            |ctx, b| {
                let product = ctx.create(
                    OperatorTimes,
                    vec![b.expr("A"), b.expr("B")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(SPre, vec![product], Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_binary_rule(
        SuperOperatorTimes,
        Rule::new(
            "R004",
            pattern_head(vec![
                pat(SPost, vec![wc("A").into()]),
                pat(SPost, vec![wc("B").into()]),
            ]),
            &["A", "B"],
            |ctx, b| {
                // right multiplication composes in reverse order
                let product = ctx.create(
                    OperatorTimes,
                    vec![b.expr("B"), b.expr("A")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(SPost, vec![product], Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_binary_rule(
        SuperOperatorTimes,
        Rule::new(
            "R005",
            pattern_head(vec![Pattern::from(&*ZERO_SUPER_OPERATOR), wc("sB").into()]),
            &[],
            |_, _| Ok(ZERO_SUPER_OPERATOR.clone()),
        ),
    )?;
    ctx.add_binary_rule(
        SuperOperatorTimes,
        Rule::new(
            "R006",
            pattern_head(vec![wc("sA").into(), Pattern::from(&*ZERO_SUPER_OPERATOR)]),
            &[],
            |_, _| Ok(ZERO_SUPER_OPERATOR.clone()),
        ),
    )?;

    // SPre / SPost
    for kind in [SPre, SPost] {
        ctx.add_rule(
            kind,
            Rule::new(
                "R001",
                pattern_head(vec![pat(
                    ScalarTimesOperator,
                    vec![wc("u").into(), wc("A").into()],
                )]),
                &["u", "A"],
                move |ctx, b| {
                    let wrapped = ctx.create(kind, vec![b.expr("A")], Kwargs::default())?;
                    Ok(ctx.create(
                        ScalarTimesSuperOperator,
                        vec![b.expr("u"), wrapped],
                        Kwargs::default(),
                    )?)
                },
            ),
        )?;
        ctx.add_rule(
            kind,
            Rule::new(
                "R002",
                pattern_head(vec![Pattern::from(&*IDENTITY_OPERATOR)]),
                &[],
                |_, _| Ok(IDENTITY_SUPER_OPERATOR.clone()),
            ),
        )?;
        ctx.add_rule(
            kind,
            Rule::new(
                "R003",
                pattern_head(vec![Pattern::from(&*ZERO_OPERATOR)]),
                &[],
                |_, _| Ok(ZERO_SUPER_OPERATOR.clone()),
            ),
        )?;
    }

    // SuperAdjoint
    ctx.add_rule(
        SuperAdjoint,
        Rule::new(
            "R001",
            pattern_head(vec![pat(SuperAdjoint, vec![wc("sA").into()])]),
            &["sA"],
            |_, b| Ok(b.expr("sA")),
        ),
    )?;
    ctx.add_rule(
        SuperAdjoint,
        Rule::new(
            "R002",
            pattern_head(vec![wc("sA").head(Head::Kind(SuperOperatorPlus)).into()]),
            &["sA"],
            |ctx, b| {
                let terms = b
                    .expr("sA")
                    .args()
                    .iter()
                    .map(|term| ctx.create(SuperAdjoint, vec![term.clone()], Kwargs::default()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.create(SuperOperatorPlus, terms, Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        SuperAdjoint,
        Rule::new(
            "R003",
            pattern_head(vec![pat(
                ScalarTimesSuperOperator,
                vec![wc("u").into(), wc("sA").into()],
            )]),
            &["u", "sA"],
            |ctx, b| {
                let conj = ctx.create(ScalarConjugate, vec![b.expr("u")], Kwargs::default())?;
                let adj = ctx.create(SuperAdjoint, vec![b.expr("sA")], Kwargs::default())?;
                Ok(ctx.create(
                    ScalarTimesSuperOperator,
                    vec![conj, adj],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        SuperAdjoint,
        Rule::new(
            "R004",
            pattern_head(vec![pat(SPre, vec![wc("A").into()])]),
            &["A"],
            |ctx, b| {
                let adj = ctx.create(Adjoint, vec![b.expr("A")], Kwargs::default())?;
                Ok(ctx.create(SPre, vec![adj], Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        SuperAdjoint,
        Rule::new(
            "R005",
            pattern_head(vec![pat(SPost, vec![wc("A").into()])]),
            &["A"],
            |ctx, b| {
                let adj = ctx.create(Adjoint, vec![b.expr("A")], Kwargs::default())?;
                Ok(ctx.create(SPost, vec![adj], Kwargs::default())?)
            },
        ),
    )?;

    // SuperOperatorTimesOperator
    ctx.add_rule(
        SuperOperatorTimesOperator,
        Rule::new(
            "R001",
            pattern_head(vec![
                wc("sA").head(Head::Kind(SuperOperatorPlus)).into(),
                wc("B").into(),
            ]),
            &["sA", "B"],
            |ctx, b| {
                let applied = b
                    .expr("sA")
                    .args()
                    .iter()
                    .map(|term| {
                        ctx.create(
                            SuperOperatorTimesOperator,
                            vec![term.clone(), b.expr("B")],
                            Kwargs::default(),
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.create(OperatorPlus, applied, Kwargs::default())?)
            },
        ),
    )?;
    ctx.add_rule(
        SuperOperatorTimesOperator,
        Rule::new(
            "R002",
            pattern_head(vec![Pattern::from(&*IDENTITY_SUPER_OPERATOR), wc("B").into()]),
            &["B"],
            |_, b| Ok(b.expr("B")),
        ),
    )?;
    ctx.add_rule(
        SuperOperatorTimesOperator,
        Rule::new(
            "R003",
            pattern_head(vec![Pattern::from(&*ZERO_SUPER_OPERATOR), wc("B").into()]),
            &[],
            |_, _| Ok(ZERO_OPERATOR.clone()),
        ),
    )?;
    ctx.add_rule(
        SuperOperatorTimesOperator,
        Rule::new(
            "R004",
            pattern_head(vec![
                pat(ScalarTimesSuperOperator, vec![wc("u").into(), wc("sA").into()]),
                wc("B").into(),
            ]),
            &["u", "sA", "B"],
            |ctx, b| {
                let applied = ctx.create(
                    SuperOperatorTimesOperator,
                    vec![b.expr("sA"), b.expr("B")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    ScalarTimesOperator,
                    vec![b.expr("u"), applied],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        SuperOperatorTimesOperator,
        Rule::new(
            "R005",
            pattern_head(vec![
                wc("sA").into(),
                pat(ScalarTimesOperator, vec![wc("u").into(), wc("B").into()]),
            ]),
            &["u", "sA", "B"],
            |ctx, b| {
                let applied = ctx.create(
                    SuperOperatorTimesOperator,
                    vec![b.expr("sA"), b.expr("B")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    ScalarTimesOperator,
                    vec![b.expr("u"), applied],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        SuperOperatorTimesOperator,
        Rule::new(
            "R006",
            pattern_head(vec![
                wc("sA").into(),
                pat(
                    SuperOperatorTimesOperator,
                    vec![wc("sB").into(), wc("C").into()],
                ),
            ]),
            &["sA", "sB", "C"],
            |ctx, b| {
                let composed = ctx.create(
                    SuperOperatorTimes,
                    vec![b.expr("sA"), b.expr("sB")],
                    Kwargs::default(),
                )?;
                Ok(ctx.create(
                    SuperOperatorTimesOperator,
                    vec![composed, b.expr("C")],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        SuperOperatorTimesOperator,
        Rule::new(
            "R007",
            pattern_head(vec![pat(SPre, vec![wc("A").into()]), wc("B").into()]),
            &["A", "B"],
            |ctx, b| {
                Ok(ctx.create(
                    OperatorTimes,
                    vec![b.expr("A"), b.expr("B")],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;
    ctx.add_rule(
        SuperOperatorTimesOperator,
        Rule::new(
            "R008",
            pattern_head(vec![
                pat(
                    SuperOperatorTimes,
                    vec![
                        wc_rest("sA").into(),
                        wc("sB")
                            .heads([Head::Kind(SPre), Head::Kind(SPost)])
                            .into(),
                    ],
                ),
                wc("C").into(),
            ]),
            &["sA", "sB", "C"],
            |ctx, b| split_composition(ctx, b),
        ),
    )?;
    ctx.add_rule(
        SuperOperatorTimesOperator,
        Rule::new(
            "R009",
            pattern_head(vec![pat(SPost, vec![wc("A").into()]), wc("B").into()]),
            &["A", "B"],
            |ctx, b| {
                Ok(ctx.create(
                    OperatorTimes,
                    vec![b.expr("B"), b.expr("A")],
                    Kwargs::default(),
                )?)
            },
        ),
    )?;

    Ok(())
}

fn compose_scalar_out(ctx: &AlgebraContext, b: &Bindings) -> Result<Expr, RuleError> {
    let composed = ctx.create(
        OpKind::SuperOperatorTimes,
        vec![b.expr("sA"), b.expr("sB")],
        Kwargs::default(),
    )?;
    Ok(ctx.create(
        OpKind::ScalarTimesSuperOperator,
        vec![b.expr("u"), composed],
        Kwargs::default(),
    )?)
}

/// `(sA... * sB) * C` with a trailing `SPre`/`SPost` factor peels the trailing factor onto the
/// operator first.
fn split_composition(ctx: &AlgebraContext, b: &Bindings) -> Result<Expr, RuleError> {
    let init = b.exprs("sA");
    let applied = ctx.create(
        OpKind::SuperOperatorTimesOperator,
        vec![b.expr("sB"), b.expr("C")],
        Kwargs::default(),
    )?;
    let head = ctx.create(OpKind::SuperOperatorTimes, init, Kwargs::default())?;
    Ok(ctx.create(
        OpKind::SuperOperatorTimesOperator,
        vec![head, applied],
        Kwargs::default(),
    )?)
}

#[cfg(test)]
mod tests {
    use crate::{default_context, operator};
    use pretty_assertions::assert_eq;
    use super::*;

    #[test]
    fn spre_spost_collapse_on_sentinels() {
        let ctx = default_context();
        assert_eq!(
            spre(&ctx, IDENTITY_OPERATOR.clone()).unwrap(),
            *IDENTITY_SUPER_OPERATOR,
        );
        assert_eq!(spre(&ctx, ZERO_OPERATOR.clone()).unwrap(), *ZERO_SUPER_OPERATOR);
        assert_eq!(
            spost(&ctx, IDENTITY_OPERATOR.clone()).unwrap(),
            *IDENTITY_SUPER_OPERATOR,
        );
        assert_eq!(spost(&ctx, ZERO_OPERATOR.clone()).unwrap(), *ZERO_SUPER_OPERATOR);
    }

    #[test]
    fn spre_composes_spost_reverses() {
        let ctx = default_context();
        let hs = HilbertSpace::local("0");
        let a = operator::symbol("a", hs.clone());
        let b = operator::symbol("b", hs);

        let composed = times(
            &ctx,
            vec![spre(&ctx, a.clone()).unwrap(), spre(&ctx, b.clone()).unwrap()],
        )
        .unwrap();
        let ab = operator::times(&ctx, vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(composed, spre(&ctx, ab).unwrap());

        let composed = times(
            &ctx,
            vec![spost(&ctx, a.clone()).unwrap(), spost(&ctx, b.clone()).unwrap()],
        )
        .unwrap();
        let ba = operator::times(&ctx, vec![b, a]).unwrap();
        assert_eq!(composed, spost(&ctx, ba).unwrap());
    }

    #[test]
    fn spre_sorts_before_spost_on_the_same_space() {
        let ctx = default_context();
        let hs = HilbertSpace::local("0");
        let a = operator::symbol("a", hs.clone());
        let b = operator::symbol("b", hs);
        let pre = spre(&ctx, a).unwrap();
        let post = spost(&ctx, b).unwrap();

        let product = times(&ctx, vec![post.clone(), pre.clone()]).unwrap();
        assert_eq!(product.args(), &[pre, post]);
    }

    #[test]
    fn application_unwraps_to_operators() {
        let ctx = default_context();
        let hs = HilbertSpace::local("0");
        let a = operator::symbol("a", hs.clone());
        let b = operator::symbol("b", hs);

        // SPre(a) b == a * b, SPost(a) b == b * a
        assert_eq!(
            apply(&ctx, spre(&ctx, a.clone()).unwrap(), b.clone()).unwrap(),
            operator::times(&ctx, vec![a.clone(), b.clone()]).unwrap(),
        );
        assert_eq!(
            apply(&ctx, spost(&ctx, a.clone()).unwrap(), b.clone()).unwrap(),
            operator::times(&ctx, vec![b.clone(), a.clone()]).unwrap(),
        );

        assert_eq!(
            apply(&ctx, IDENTITY_SUPER_OPERATOR.clone(), b.clone()).unwrap(),
            b,
        );
        assert_eq!(
            apply(&ctx, ZERO_SUPER_OPERATOR.clone(), b).unwrap(),
            *ZERO_OPERATOR,
        );
    }

    #[test]
    fn superadjoint_distributes() {
        let ctx = default_context();
        let hs = HilbertSpace::local("0");
        let a = operator::symbol("a", hs.clone());

        let pre = spre(&ctx, a.clone()).unwrap();
        let adj = adjoint(&ctx, pre).unwrap();
        let expected = spre(&ctx, operator::adjoint(&ctx, a).unwrap()).unwrap();
        assert_eq!(adj, expected);

        // involution
        assert_eq!(adjoint(&ctx, adj.clone()).unwrap().kind(), expected.kind());
    }

    #[test]
    fn scalar_multiples_normalize() {
        let ctx = default_context();
        let s = symbol("L", HilbertSpace::local("0"));
        assert_eq!(scalar_times(&ctx, Expr::integer(1), s.clone()).unwrap(), s);
        assert_eq!(
            scalar_times(&ctx, Expr::integer(0), s.clone()).unwrap(),
            *ZERO_SUPER_OPERATOR,
        );
        let inner = scalar_times(&ctx, Expr::integer(3), s.clone()).unwrap();
        let outer = scalar_times(&ctx, Expr::integer(2), inner).unwrap();
        assert_eq!(outer, scalar_times(&ctx, Expr::integer(6), s).unwrap());
    }
}
