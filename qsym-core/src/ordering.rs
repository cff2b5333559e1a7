//! Canonical ordering of expressions.
//!
//! [`compare_exprs`] defines a total order used by the `orderby` pipeline stage to sort the
//! children of fully-commutative kinds. The order is: node-class rank, then Hilbert space, then
//! per-class fields (value / label / kind), then children lexicographically. Grouping by space
//! first keeps operands acting on the same degrees of freedom adjacent, which is what the
//! pairwise binary-rule scan relies on.
//!
//! Kinds whose operands only *conditionally* commute do not get the total sort. For them,
//! [`sort_args`] runs a stable adjacent-swap sort that only ever exchanges two neighbors when
//! they are declared comparable (for operator products, when their spaces are disjoint). A
//! maximal run of mutually-overlapping operands (an "island") therefore keeps its internal
//! order under all circumstances, while operands on disjoint spaces sort past each other into
//! canonical positions.

use crate::expr::{Expr, Node, OpKind, ONE};
use crate::meta::OrderingMode;
use crate::value::ScalarValue;
use std::cmp::Ordering;

/// The total canonical order on expressions.
///
/// A scalar-weighted term sorts at the position of its *base* term, with the coefficient as
/// the final tie-break: `2*a` sits exactly where `a` sits. This keeps the output of summand
/// collection (which rebuilds terms as coefficient-times-base) in the same order `orderby`
/// would have produced, so reconstruction is idempotent.
pub fn compare_exprs(a: &Expr, b: &Expr) -> Ordering {
    if a.is_same(b) {
        return Ordering::Equal;
    }

    let (coeff_a, base_a) = strip_coefficient(a);
    let (coeff_b, base_b) = strip_coefficient(b);

    for (x, y) in base_a.iter().zip(base_b.iter()) {
        match compare_nodes(x, y) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    match base_a.len().cmp(&base_b.len()) {
        Ordering::Equal => {},
        ord => return ord,
    }

    compare_nodes(coeff_a.unwrap_or(&ONE), coeff_b.unwrap_or(&ONE))
}

/// Splits off a leading scalar coefficient: `ScalarTimesOperator(u, A)` (and its ket and
/// super-operator analogs) anchors at `A`; an n-ary scalar product with a leading numeric
/// literal anchors at the remaining factors. Everything else is its own anchor.
fn strip_coefficient(expr: &Expr) -> (Option<&Expr>, &[Expr]) {
    match expr.kind() {
        Some(OpKind::ScalarTimesOperator)
        | Some(OpKind::ScalarTimesKet)
        | Some(OpKind::ScalarTimesSuperOperator) => {
            let args = expr.args();
            (Some(&args[0]), &args[1..])
        },
        Some(OpKind::ScalarTimes) => {
            let args = expr.args();
            if args.len() >= 2 && args[0].as_value().is_some() {
                (Some(&args[0]), &args[1..])
            } else {
                (None, std::slice::from_ref(expr))
            }
        },
        _ => (None, std::slice::from_ref(expr)),
    }
}

/// The raw structural order: node-class rank, then Hilbert space, then per-class fields.
fn compare_nodes(a: &Expr, b: &Expr) -> Ordering {
    if a.is_same(b) {
        return Ordering::Equal;
    }

    let rank_a = class_rank(a.node());
    let rank_b = class_rank(b.node());
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    match a.space().cmp(&b.space()) {
        Ordering::Equal => {},
        ord => return ord,
    }

    match (a.node(), b.node()) {
        (Node::Scalar(v1), Node::Scalar(v2)) => compare_values(v1, v2),
        (Node::Idx(i1), Node::Idx(i2)) => i1.cmp(i2),
        (Node::Symbol(s1), Node::Symbol(s2)) => s1.label.cmp(&s2.label),
        (Node::Sentinel(s1), Node::Sentinel(s2)) => (*s1 as u8).cmp(&(*s2 as u8)),
        (Node::Op(o1), Node::Op(o2)) => match o1.kind.cmp(&o2.kind) {
            Ordering::Equal => match compare_args(&o1.args, &o2.args) {
                Ordering::Equal => {
                    let kw1 = (&o1.kwargs.over_space, &o1.kwargs.ranges);
                    let kw2 = (&o2.kwargs.over_space, &o2.kwargs.ranges);
                    kw1.cmp(&kw2)
                },
                ord => ord,
            },
            ord => ord,
        },
        // ranks are equal, so the classes are equal
        _ => unreachable!("class ranks agree but node classes differ"),
    }
}

fn class_rank(node: &Node) -> u8 {
    match node {
        Node::Scalar(_) => 0,
        Node::Idx(_) => 1,
        Node::Symbol(_) => 2,
        Node::Sentinel(_) => 3,
        Node::Op(_) => 4,
    }
}

/// Numbers sort numerically; exact/float representations of the same number tie-break by
/// variant so the order stays total.
fn compare_values(a: &ScalarValue, b: &ScalarValue) -> Ordering {
    match a.numeric_cmp(b) {
        Ordering::Equal => variant_rank(a).cmp(&variant_rank(b)),
        ord => ord,
    }
}

fn variant_rank(value: &ScalarValue) -> u8 {
    match value {
        ScalarValue::Int(_) => 0,
        ScalarValue::Ratio(_) => 1,
        ScalarValue::Float(_) => 2,
    }
}

fn compare_args(args1: &[Expr], args2: &[Expr]) -> Ordering {
    for (a1, a2) in args1.iter().zip(args2.iter()) {
        match compare_exprs(a1, a2) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    args1.len().cmp(&args2.len())
}

/// Sorts an argument list according to the kind's ordering mode.
pub fn sort_args(mode: OrderingMode, args: &mut [Expr]) {
    match mode {
        OrderingMode::None => {},
        OrderingMode::Full => args.sort_by(compare_exprs),
        OrderingMode::DisjointSpaces => {
            adjacent_swap_sort(args, |a, b| a.space().is_disjoint(&b.space()), compare_exprs);
        },
        OrderingMode::SuperOpFactors => {
            adjacent_swap_sort(args, superop_comparable, superop_compare);
        },
    }
}

/// Stable partial-order sort: repeatedly swaps adjacent out-of-order neighbors, but only when
/// `comparable` declares them exchangeable. Incomparable neighbors block each other, so the
/// relative order within an island of mutually-incomparable operands is preserved exactly.
fn adjacent_swap_sort(
    args: &mut [Expr],
    comparable: impl Fn(&Expr, &Expr) -> bool,
    compare: impl Fn(&Expr, &Expr) -> Ordering,
) {
    if args.len() < 2 {
        return;
    }
    loop {
        let mut swapped = false;
        for i in 0..args.len() - 1 {
            if comparable(&args[i], &args[i + 1])
                && compare(&args[i], &args[i + 1]) == Ordering::Greater
            {
                args.swap(i, i + 1);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
    }
}

fn is_side_kind(expr: &Expr) -> bool {
    matches!(expr.kind(), Some(OpKind::SPre) | Some(OpKind::SPost))
}

/// `SPre` and `SPost` factors commute with each other even on the same space (they multiply
/// from opposite sides), so a mixed pair is always exchangeable.
fn superop_comparable(a: &Expr, b: &Expr) -> bool {
    if a.space().is_disjoint(&b.space()) {
        return true;
    }
    is_side_kind(a) && is_side_kind(b) && a.kind() != b.kind()
}

/// Within an island, `SPre` sorts before `SPost`; across disjoint spaces the canonical order
/// applies unchanged.
fn superop_compare(a: &Expr, b: &Expr) -> Ordering {
    if !a.space().is_disjoint(&b.space()) && is_side_kind(a) && is_side_kind(b) {
        return match (a.kind(), b.kind()) {
            (Some(OpKind::SPre), Some(OpKind::SPost)) => Ordering::Less,
            (Some(OpKind::SPost), Some(OpKind::SPre)) => Ordering::Greater,
            _ => compare_exprs(a, b),
        };
    }
    compare_exprs(a, b)
}

#[cfg(test)]
mod tests {
    use crate::expr::Domain;
    use crate::space::HilbertSpace;
    use pretty_assertions::assert_eq;
    use super::*;

    fn op(label: &str, hs: &str) -> Expr {
        Expr::symbol(label, Domain::Operator, HilbertSpace::local(hs))
    }

    #[test]
    fn total_order_ranks_numbers_first() {
        let two = Expr::integer(2);
        let a = op("a", "0");
        assert_eq!(compare_exprs(&two, &a), Ordering::Less);
        assert_eq!(compare_exprs(&a, &two), Ordering::Greater);
    }

    #[test]
    fn symbols_sort_by_space_then_label() {
        let a1 = op("a", "1");
        let b0 = op("b", "0");
        let a0 = op("a", "0");
        // H(0) before H(1), then labels
        assert_eq!(compare_exprs(&b0, &a1), Ordering::Less);
        assert_eq!(compare_exprs(&a0, &b0), Ordering::Less);
    }

    #[test]
    fn disjoint_factors_sort_overlapping_factors_stay() {
        // b and c act on the same space and must not reorder; a on a disjoint space
        // bubbles past both
        let mut args = vec![op("c", "2"), op("b", "2"), op("a", "1")];
        sort_args(OrderingMode::DisjointSpaces, &mut args);
        assert_eq!(args, vec![op("a", "1"), op("c", "2"), op("b", "2")]);
    }

    #[test]
    fn full_sort_is_permutation_stable() {
        let (a, b, c) = (op("a", "0"), op("b", "0"), op("c", "0"));
        let mut p1 = vec![c.clone(), a.clone(), b.clone()];
        let mut p2 = vec![b.clone(), c.clone(), a.clone()];
        sort_args(OrderingMode::Full, &mut p1);
        sort_args(OrderingMode::Full, &mut p2);
        assert_eq!(p1, p2);
        assert_eq!(p1, vec![a, b, c]);
    }

    #[test]
    fn scalar_weighted_terms_anchor_at_their_base() {
        use crate::expr::{Kwargs, OpExpr};

        let a = op("a", "0");
        let b = op("b", "0");
        let two_a = Expr::from_op(OpExpr {
            kind: OpKind::ScalarTimesOperator,
            args: vec![Expr::integer(2), a.clone()],
            kwargs: Kwargs::default(),
            space: a.space(),
        });
        // 2*a sorts where a sorts: before b, not after it
        assert_eq!(compare_exprs(&two_a, &b), Ordering::Less);
        assert_eq!(compare_exprs(&b, &two_a), Ordering::Greater);
        // and the coefficient is the tie-break against the bare term
        assert_eq!(compare_exprs(&a, &two_a), Ordering::Less);
    }

    #[test]
    fn overlapping_island_blocks_motion() {
        // x overlaps both neighbors, so nothing may cross it
        let x = Expr::symbol(
            "x",
            Domain::Operator,
            HilbertSpace::local("1").tensor(&HilbertSpace::local("2")),
        );
        let mut args = vec![op("b", "2"), x.clone(), op("a", "1")];
        let expected = args.clone();
        sort_args(OrderingMode::DisjointSpaces, &mut args);
        assert_eq!(args, expected);
    }
}
