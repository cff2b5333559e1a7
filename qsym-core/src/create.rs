//! The canonicalizing constructor and its normalization pipeline.
//!
//! [`AlgebraContext::create`] is the only sanctioned way to build an operation node. It wraps
//! the raw arguments into a proto-form and pushes it through the pipeline stages declared for
//! the kind, in fixed order:
//!
//! 1. **assoc**: flatten nested nodes of the same associative kind.
//! 2. **orderby**: canonically reorder commuting children (see [`crate::ordering`]).
//! 3. **filter_neutral**: drop children equal to the kind's neutral element.
//! 4. **collect_summands**: merge children equal up to a scalar coefficient (Plus-like kinds).
//! 5. **match_replace** / **match_replace_binary**: apply the kind's rule tables.
//!
//! Two shortcuts run before the pipeline proper: a Times-like kind containing its domain's
//! zero collapses to that zero immediately, and scalar arguments to an operator or
//! super-operator sum are coerced to scalar multiples of the identity.
//!
//! A construction request is always terminal after one pipeline pass; callers never observe a
//! partially-normalized node. Children were already canonical before being passed in, so
//! recursive simplification happens through the `create` calls rule handlers make, not through
//! repeated passes here.
//!
//! Construction is memoized per kind on the *input* `(args, kwargs)`: building the same
//! expression twice returns the identical allocation, which is what makes the pointer-identity
//! fast path in equality effective.

use crate::context::AlgebraContext;
use crate::error::AlgebraError;
use crate::expr::{Domain, Expr, Kwargs, OpExpr, OpKind, ONE};
use crate::meta::{
    self, derive_space, is_assoc, neutral_element, result_domain, scalar_times_kind, stages,
    zero_element, zero_of_domain, Stage,
};
use crate::ordering::sort_args;
use crate::value::ScalarValue;
use std::collections::HashMap;

impl AlgebraContext {
    /// Builds the canonical node for `kind(args, kwargs)`.
    ///
    /// Construction never panics for well-typed input; malformed input (wrong arity, wrong
    /// argument domain, incompatible spaces) raises a typed [`AlgebraError`] to the caller and
    /// is never retried.
    pub fn create(
        &self,
        kind: OpKind,
        args: Vec<Expr>,
        kwargs: Kwargs,
    ) -> Result<Expr, AlgebraError> {
        let args = coerce_args(self, kind, args)?;
        meta::validate(kind, &args, &kwargs)?;

        // multiplying by the global zero collapses before any pipeline work
        if let Some(zero) = zero_element(kind) {
            if args.iter().any(|arg| is_zero_like(arg, kind)) {
                return Ok(zero);
            }
        }

        let key = (kind, args.clone(), kwargs.clone());
        if let Some(hit) = self.cache_get(&key) {
            return Ok(hit);
        }

        let mut args = args;
        for stage in stages(kind) {
            match stage {
                Stage::Assoc => args = flatten(kind, args),
                Stage::OrderBy => sort_args(meta::ordering_mode(kind), &mut args),
                Stage::FilterNeutral => args.retain(|arg| !is_neutral(arg, kind)),
                Stage::CollectSummands => args = collect_summands(self, kind, args)?,
                Stage::MatchReplace => {
                    let replaced = self
                        .with_unary_table(kind, |table| table.match_replace(self, &args, &kwargs))?;
                    if let Some(result) = replaced {
                        self.cache_insert(key, result.clone());
                        return Ok(result);
                    }
                },
                Stage::MatchReplaceBinary => {
                    let max_passes = self.options().max_binary_passes;
                    args = self.with_binary_table(kind, |table| {
                        table.match_replace_binary(self, kind, args, max_passes)
                    })?;
                    // a binary rewrite may produce the neutral element (e.g. x * x^-1)
                    args.retain(|arg| !is_neutral(arg, kind));
                },
            }
        }

        // intern on the canonicalized argument list as well, so different argument orders of
        // the same commuting operands end up as the identical node, not merely equal ones
        let result = match unwrap_trivial(kind, &mut args) {
            Some(result) => result,
            None => {
                let canon_key = (kind, args.clone(), kwargs.clone());
                match self.cache_get(&canon_key) {
                    Some(hit) => hit,
                    None => {
                        let space = derive_space(kind, &args, &kwargs);
                        let built = Expr::from_op(OpExpr { kind, args, kwargs, space });
                        self.cache_insert(canon_key, built.clone());
                        built
                    },
                }
            },
        };
        self.cache_insert(key, result.clone());
        Ok(result)
    }
}

/// Scalars passed to an operator or super-operator sum stand for multiples of the identity;
/// the scalar zero stands for the domain zero.
fn coerce_args(
    ctx: &AlgebraContext,
    kind: OpKind,
    args: Vec<Expr>,
) -> Result<Vec<Expr>, AlgebraError> {
    let identity = match kind {
        OpKind::OperatorPlus => crate::expr::IDENTITY_OPERATOR.clone(),
        OpKind::SuperOperatorPlus => crate::expr::IDENTITY_SUPER_OPERATOR.clone(),
        _ => return Ok(args),
    };
    let domain = result_domain(kind);
    args.into_iter()
        .map(|arg| {
            if arg.domain() != Domain::Scalar {
                return Ok(arg);
            }
            if arg.is_scalar_zero() {
                return Ok(zero_of_domain(domain));
            }
            ctx.create(
                scalar_times_kind(domain),
                vec![arg, identity.clone()],
                Kwargs::default(),
            )
        })
        .collect()
}

fn is_zero_like(arg: &Expr, kind: OpKind) -> bool {
    match kind {
        OpKind::ScalarTimes => arg.is_scalar_zero(),
        _ => zero_element(kind).is_some_and(|zero| *arg == zero),
    }
}

fn is_neutral(arg: &Expr, kind: OpKind) -> bool {
    match kind {
        OpKind::ScalarPlus => arg.is_scalar_zero(),
        OpKind::ScalarTimes => arg.is_scalar_one(),
        _ => neutral_element(kind).is_some_and(|neutral| *arg == neutral),
    }
}

/// Flattens nested nodes of the same associative kind one level deep; children are already
/// canonical, so they are already flat themselves.
fn flatten(kind: OpKind, args: Vec<Expr>) -> Vec<Expr> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        if arg.kind() == Some(kind) {
            out.extend(arg.args().iter().cloned());
        } else {
            out.push(arg);
        }
    }
    out
}

/// Unwraps trivial results of an associative kind: an empty operation is its neutral element,
/// a 1-ary one is its sole operand. Returns `None` when a real node must be built.
fn unwrap_trivial(kind: OpKind, args: &mut Vec<Expr>) -> Option<Expr> {
    if is_assoc(kind) {
        match args.len() {
            // associative kinds all have a neutral element
            0 => return Some(neutral_element(kind).unwrap()),
            1 => return Some(args.remove(0)),
            _ => {},
        }
    }
    None
}

/// Merges children that are the same term up to a scalar coefficient, summing coefficients.
///
/// First-occurrence order is preserved; since the canonical comparison anchors a
/// scalar-weighted term at its base term, the collected list is still canonically sorted. A
/// term whose coefficient collects to the additive identity is dropped.
fn collect_summands(
    ctx: &AlgebraContext,
    kind: OpKind,
    args: Vec<Expr>,
) -> Result<Vec<Expr>, AlgebraError> {
    let st_kind = scalar_times_kind(result_domain(kind));

    let mut order: Vec<Expr> = Vec::new();
    let mut coeffs: HashMap<Expr, Vec<Expr>> = HashMap::new();
    for arg in args {
        let (coeff, base) = split_summand(ctx, st_kind, arg)?;
        coeffs
            .entry(base.clone())
            .or_insert_with(|| {
                order.push(base);
                Vec::new()
            })
            .push(coeff);
    }

    let mut out = Vec::with_capacity(order.len());
    for base in order {
        // every base in `order` has an entry
        let coeff = sum_coeffs(ctx, coeffs.remove(&base).unwrap())?;
        if coeff.is_scalar_zero() {
            continue;
        }
        if coeff.is_scalar_one() {
            out.push(base);
        } else if base.is_scalar_one() {
            out.push(coeff);
        } else {
            out.push(ctx.create(st_kind, vec![coeff, base], Kwargs::default())?);
        }
    }
    Ok(out)
}

/// Splits a summand into `(scalar coefficient, base term)`.
fn split_summand(
    ctx: &AlgebraContext,
    st_kind: OpKind,
    arg: Expr,
) -> Result<(Expr, Expr), AlgebraError> {
    if arg.kind() == Some(st_kind) {
        if st_kind == OpKind::ScalarTimes {
            // n-ary scalar product: a leading numeric literal is the coefficient
            let args = arg.args();
            if args.len() >= 2 && args[0].as_value().is_some() {
                let base = if args.len() == 2 {
                    args[1].clone()
                } else {
                    ctx.create(OpKind::ScalarTimes, args[1..].to_vec(), Kwargs::default())?
                };
                return Ok((args[0].clone(), base));
            }
        } else {
            return Ok((arg.args()[0].clone(), arg.args()[1].clone()));
        }
    }
    if arg.as_value().is_some() {
        // a bare number is a coefficient on the scalar one
        return Ok((arg, ONE.clone()));
    }
    Ok((ONE.clone(), arg))
}

/// Sums a list of scalar coefficients. Numeric literals fold exactly; symbolic coefficients go
/// back through scalar-sum construction.
fn sum_coeffs(ctx: &AlgebraContext, coeffs: Vec<Expr>) -> Result<Expr, AlgebraError> {
    let mut value_acc: Option<ScalarValue> = None;
    let mut symbolic: Vec<Expr> = Vec::new();
    for coeff in coeffs {
        match coeff.as_value() {
            Some(value) => {
                value_acc = Some(match value_acc {
                    Some(acc) => acc.add(value),
                    None => value.clone(),
                });
            },
            None => symbolic.push(coeff),
        }
    }

    let folded = value_acc.map(Expr::scalar);
    match folded {
        Some(value) if symbolic.is_empty() => Ok(value),
        None if symbolic.len() == 1 => Ok(symbolic.remove(0)),
        folded => {
            let mut args = symbolic;
            if let Some(value) = folded {
                args.push(value);
            }
            ctx.create(OpKind::ScalarPlus, args, Kwargs::default())
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::context::ContextOptions;
    use crate::expr::{IDENTITY_OPERATOR, ZERO_OPERATOR};
    use crate::pattern::{pattern_head, wc};
    use crate::rules::Rule;
    use crate::space::HilbertSpace;
    use pretty_assertions::assert_eq;
    use super::*;

    fn op(label: &str, hs: &str) -> Expr {
        Expr::symbol(label, Domain::Operator, HilbertSpace::local(hs))
    }

    #[test]
    fn empty_tables_still_normalize() {
        // flattening, ordering, and neutral filtering run even with no rules registered
        let ctx = AlgebraContext::new();
        let (a, b, c) = (op("a", "0"), op("b", "0"), op("c", "0"));

        let inner = ctx
            .create(OpKind::OperatorPlus, vec![b.clone(), c.clone()], Kwargs::default())
            .unwrap();
        let nested = ctx
            .create(
                OpKind::OperatorPlus,
                vec![inner, a.clone(), ZERO_OPERATOR.clone()],
                Kwargs::default(),
            )
            .unwrap();
        let flat = ctx
            .create(OpKind::OperatorPlus, vec![a, b, c], Kwargs::default())
            .unwrap();
        assert_eq!(nested, flat);
    }

    #[test]
    fn empty_and_unary_sums_unwrap() {
        let ctx = AlgebraContext::new();
        let a = op("a", "0");
        assert_eq!(
            ctx.create(OpKind::OperatorPlus, vec![], Kwargs::default()).unwrap(),
            *ZERO_OPERATOR,
        );
        assert_eq!(
            ctx.create(OpKind::OperatorPlus, vec![a.clone()], Kwargs::default()).unwrap(),
            a,
        );
        assert_eq!(
            ctx.create(OpKind::OperatorTimes, vec![], Kwargs::default()).unwrap(),
            *IDENTITY_OPERATOR,
        );
    }

    #[test]
    fn construction_cache_returns_identical_nodes() {
        let ctx = AlgebraContext::new();
        let (a, b) = (op("a", "0"), op("b", "0"));
        let p1 = ctx
            .create(OpKind::OperatorPlus, vec![a.clone(), b.clone()], Kwargs::default())
            .unwrap();
        let p2 = ctx
            .create(OpKind::OperatorPlus, vec![a, b], Kwargs::default())
            .unwrap();
        assert!(p1.is_same(&p2));
    }

    #[test]
    fn collection_without_rules() {
        // collect_summands is a pipeline stage, not a rule: it works on an empty registry
        let ctx = AlgebraContext::new();
        let (a, b) = (op("a", "0"), op("b", "0"));
        let sum = ctx
            .create(
                OpKind::OperatorPlus,
                vec![a.clone(), b.clone(), a.clone()],
                Kwargs::default(),
            )
            .unwrap();
        let two_a = ctx
            .create(
                OpKind::ScalarTimesOperator,
                vec![Expr::integer(2), a],
                Kwargs::default(),
            )
            .unwrap();
        let expected = ctx
            .create(OpKind::OperatorPlus, vec![two_a, b], Kwargs::default())
            .unwrap();
        assert_eq!(sum, expected);
    }

    #[test]
    fn divergent_binary_rules_error_instead_of_hanging() {
        let ctx = AlgebraContext::with_options(ContextOptions {
            max_binary_passes: 16,
            ..ContextOptions::default()
        });
        // a rule that swaps any adjacent pair cycles forever; the replacement is spliced as a
        // raw node so the cycle stays inside a single binary scan
        ctx.add_binary_rule(
            OpKind::OperatorTimes,
            Rule::new(
                "cycle",
                pattern_head(vec![wc("A").into(), wc("B").into()]),
                &["A", "B"],
                |_, b| {
                    let args = vec![b.expr("B"), b.expr("A")];
                    let space = args[0].space().tensor(&args[1].space());
                    Ok(Expr::from_op(OpExpr {
                        kind: OpKind::OperatorTimes,
                        args,
                        kwargs: Kwargs::default(),
                        space,
                    }))
                },
            ),
        )
        .unwrap();

        let err = ctx.create(
            OpKind::OperatorTimes,
            vec![op("a", "0"), op("b", "0")],
            Kwargs::default(),
        );
        assert!(matches!(
            err,
            Err(AlgebraError::DivergentRewrite { kind: Some(OpKind::OperatorTimes), .. }),
        ));
    }

    #[test]
    fn temporary_rule_changes_take_effect_and_revert() {
        let ctx = AlgebraContext::new();
        let (a, b) = (op("a", "0"), op("b", "0"));
        let product = ctx
            .create(OpKind::OperatorTimes, vec![a.clone(), b.clone()], Kwargs::default())
            .unwrap();
        assert_eq!(product.kind(), Some(OpKind::OperatorTimes));

        {
            let _guard = ctx.temporary_rules();
            ctx.add_binary_rule(
                OpKind::OperatorTimes,
                Rule::new(
                    "collapse",
                    pattern_head(vec![wc("A").into(), wc("B").into()]),
                    &[],
                    |_, _| Ok(ZERO_OPERATOR.clone()),
                ),
            )
            .unwrap();
            let collapsed = product.rebuild(&ctx).unwrap();
            assert_eq!(collapsed, *ZERO_OPERATOR);
        }

        // the guard restored the registry and invalidated the cache
        let restored = product.rebuild(&ctx).unwrap();
        assert_eq!(restored, product);
    }

    #[test]
    fn wrong_domain_is_a_construction_error() {
        let ctx = AlgebraContext::new();
        let psi = Expr::symbol("psi", Domain::State, HilbertSpace::local("0"));
        let err = ctx.create(OpKind::OperatorPlus, vec![psi], Kwargs::default());
        assert!(matches!(err, Err(AlgebraError::WrongDomain { .. })));
    }
}
