//! The expression model: immutable typed trees of symbolic quantum expressions.
//!
//! An [`Expr`] is a cheap-to-clone handle over an immutable [`Node`]. A node is either a *leaf*
//! (a numeric [`ScalarValue`], an index symbol, a named symbol, or one of the singleton
//! [`Sentinel`] elements) or an *operation*: a [`kind`](OpKind) tag, an ordered argument list,
//! and a small set of named non-argument parameters ([`Kwargs`]).
//!
//! # Canonical construction
//!
//! Operation nodes are only ever built through
//! [`AlgebraContext::create`](crate::context::AlgebraContext::create), which runs the
//! normalization pipeline and consults the construction cache. Everything in this module
//! therefore only ever *observes* canonical nodes; none of the equality or ordering machinery
//! needs to reason about non-canonical trees. Leaf construction bypasses the pipeline.
//!
//! # Equality and hashing
//!
//! Equality is structural over `(kind, args, kwargs)`, with pointer identity as a fast path:
//! the construction cache guarantees that building the same expression twice yields the same
//! allocation, so the fast path hits often. [`Hash`] is consistent with [`Eq`]. Because
//! arguments were canonically ordered at construction time, structural equality never has to
//! consider permutations.
//!
//! # Singletons
//!
//! The neutral elements of each domain ([`ZERO_OPERATOR`], [`IDENTITY_OPERATOR`], [`ZERO_KET`],
//! [`TRIVIAL_KET`], [`ZERO_SUPER_OPERATOR`], [`IDENTITY_SUPER_OPERATOR`], and the scalar
//! [`ZERO`]/[`ONE`]) are process-wide `Lazy` statics: every zero operator in the process is the
//! same allocation, so identity comparison short-circuits structural comparison.

use crate::indices::{IdxSym, IndexRange};
use crate::space::HilbertSpace;
use crate::value::ScalarValue;
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The algebraic domain an expression belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Domain {
    Scalar,
    Operator,
    State,
    SuperOperator,
}

/// The closed set of operation kinds.
///
/// Per-kind behavior (argument validation, pipeline stages, neutral elements, ordering mode) is
/// defined in [`crate::meta`]; the variant itself is only a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OpKind {
    // scalars
    ScalarPlus,
    ScalarTimes,
    ScalarPower,
    ScalarConjugate,
    KroneckerDelta,
    ScalarIndexedSum,
    // operators
    OperatorPlus,
    OperatorTimes,
    ScalarTimesOperator,
    Adjoint,
    Commutator,
    OperatorTrace,
    OperatorIndexedSum,
    // states
    KetPlus,
    TensorKet,
    ScalarTimesKet,
    OperatorTimesKet,
    BraKet,
    KetBra,
    KetIndexedSum,
    // super-operators
    SuperOperatorPlus,
    SuperOperatorTimes,
    ScalarTimesSuperOperator,
    SuperAdjoint,
    SPre,
    SPost,
    SuperOperatorTimesOperator,
}

/// Every operation kind, in declaration order. Used for name lookup and registry iteration.
pub const ALL_KINDS: &[OpKind] = &[
    OpKind::ScalarPlus,
    OpKind::ScalarTimes,
    OpKind::ScalarPower,
    OpKind::ScalarConjugate,
    OpKind::KroneckerDelta,
    OpKind::ScalarIndexedSum,
    OpKind::OperatorPlus,
    OpKind::OperatorTimes,
    OpKind::ScalarTimesOperator,
    OpKind::Adjoint,
    OpKind::Commutator,
    OpKind::OperatorTrace,
    OpKind::OperatorIndexedSum,
    OpKind::KetPlus,
    OpKind::TensorKet,
    OpKind::ScalarTimesKet,
    OpKind::OperatorTimesKet,
    OpKind::BraKet,
    OpKind::KetBra,
    OpKind::KetIndexedSum,
    OpKind::SuperOperatorPlus,
    OpKind::SuperOperatorTimes,
    OpKind::ScalarTimesSuperOperator,
    OpKind::SuperAdjoint,
    OpKind::SPre,
    OpKind::SPost,
    OpKind::SuperOperatorTimesOperator,
];

/// The singleton sentinel leaves: the zero and identity elements of the non-scalar domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Sentinel {
    ZeroOperator,
    IdentityOperator,
    ZeroKet,
    TrivialKet,
    ZeroSuperOperator,
    IdentitySuperOperator,
}

impl Sentinel {
    /// The domain this sentinel belongs to.
    pub fn domain(&self) -> Domain {
        match self {
            Self::ZeroOperator | Self::IdentityOperator => Domain::Operator,
            Self::ZeroKet | Self::TrivialKet => Domain::State,
            Self::ZeroSuperOperator | Self::IdentitySuperOperator => Domain::SuperOperator,
        }
    }
}

/// A named symbolic leaf: an operator, ket, super-operator, or scalar symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Symbol {
    /// The symbol's label.
    pub label: String,

    /// The domain of the quantity this symbol stands for.
    pub domain: Domain,

    /// The Hilbert space the symbol acts on / lives in. Scalar symbols use the trivial space.
    pub space: HilbertSpace,
}

/// The named non-argument parameters of an operation node.
///
/// This is a closed mapping: the engine knows exactly two keys. `over_space` carries the space
/// a trace is taken over; `ranges` carries the bound index ranges of an indexed sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Kwargs {
    /// The space a trace is taken over.
    pub over_space: Option<HilbertSpace>,

    /// The index ranges of an indexed sum, in binding order.
    pub ranges: Option<Vec<IndexRange>>,
}

impl Kwargs {
    /// Kwargs with only `ranges` set.
    pub fn ranges(ranges: Vec<IndexRange>) -> Self {
        Self { over_space: None, ranges: Some(ranges) }
    }

    /// Kwargs with only `over_space` set.
    pub fn over_space(space: HilbertSpace) -> Self {
        Self { over_space: Some(space), ranges: None }
    }

    /// Returns true if no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.over_space.is_none() && self.ranges.is_none()
    }
}

/// An operation node: kind tag, canonically-ordered arguments, named parameters, and the
/// derived Hilbert space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OpExpr {
    pub kind: OpKind,
    pub args: Vec<Expr>,
    pub kwargs: Kwargs,

    /// The union of the subspaces of the children, computed once at construction. The engine
    /// uses this only for ordering and locality decisions.
    pub space: HilbertSpace,
}

/// A node in an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Node {
    /// A numeric scalar literal.
    Scalar(ScalarValue),

    /// A summation index symbol.
    Idx(IdxSym),

    /// A named symbolic leaf.
    Symbol(Symbol),

    /// A singleton zero/identity element.
    Sentinel(Sentinel),

    /// An operation over child expressions.
    Op(OpExpr),
}

/// An immutable symbolic expression. Cloning is cheap (a reference-count bump).
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Expr {
    node: Arc<Node>,
}

/// The scalar zero, as a process-wide singleton.
pub static ZERO: Lazy<Expr> = Lazy::new(|| Expr::scalar(ScalarValue::integer(0)));

/// The scalar one, as a process-wide singleton.
pub static ONE: Lazy<Expr> = Lazy::new(|| Expr::scalar(ScalarValue::integer(1)));

/// The zero operator.
pub static ZERO_OPERATOR: Lazy<Expr> = Lazy::new(|| Expr::sentinel(Sentinel::ZeroOperator));

/// The identity operator.
pub static IDENTITY_OPERATOR: Lazy<Expr> =
    Lazy::new(|| Expr::sentinel(Sentinel::IdentityOperator));

/// The zero ket.
pub static ZERO_KET: Lazy<Expr> = Lazy::new(|| Expr::sentinel(Sentinel::ZeroKet));

/// The neutral element of the ket tensor product.
pub static TRIVIAL_KET: Lazy<Expr> = Lazy::new(|| Expr::sentinel(Sentinel::TrivialKet));

/// The zero super-operator.
pub static ZERO_SUPER_OPERATOR: Lazy<Expr> =
    Lazy::new(|| Expr::sentinel(Sentinel::ZeroSuperOperator));

/// The identity super-operator.
pub static IDENTITY_SUPER_OPERATOR: Lazy<Expr> =
    Lazy::new(|| Expr::sentinel(Sentinel::IdentitySuperOperator));

impl Expr {
    /// Creates a scalar literal leaf.
    pub fn scalar(value: ScalarValue) -> Self {
        Self { node: Arc::new(Node::Scalar(value)) }
    }

    /// Creates an integer scalar literal leaf.
    pub fn integer(n: i64) -> Self {
        Self::scalar(ScalarValue::integer(n))
    }

    /// Creates an index-symbol leaf.
    pub fn idx(idx: IdxSym) -> Self {
        Self { node: Arc::new(Node::Idx(idx)) }
    }

    /// Creates a named symbol leaf.
    pub fn symbol(label: impl Into<String>, domain: Domain, space: HilbertSpace) -> Self {
        Self {
            node: Arc::new(Node::Symbol(Symbol { label: label.into(), domain, space })),
        }
    }

    /// Creates a sentinel leaf. Callers should use the `Lazy` statics instead; this exists so
    /// the statics themselves (and tests probing singleton identity) can build one.
    pub(crate) fn sentinel(sentinel: Sentinel) -> Self {
        Self { node: Arc::new(Node::Sentinel(sentinel)) }
    }

    /// Wraps an already-canonicalized operation node. Only the construction pipeline calls
    /// this.
    pub(crate) fn from_op(op: OpExpr) -> Self {
        Self { node: Arc::new(Node::Op(op)) }
    }

    /// The underlying node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Returns true if `self` and `other` are the same allocation. This is the identity fast
    /// path: singletons and cache hits share allocations.
    pub fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// The operation kind, or `None` for leaves.
    pub fn kind(&self) -> Option<OpKind> {
        match &*self.node {
            Node::Op(op) => Some(op.kind),
            _ => None,
        }
    }

    /// The operation arguments; empty for leaves.
    pub fn args(&self) -> &[Expr] {
        match &*self.node {
            Node::Op(op) => &op.args,
            _ => &[],
        }
    }

    /// The operation kwargs, or `None` for leaves.
    pub fn kwargs(&self) -> Option<&Kwargs> {
        match &*self.node {
            Node::Op(op) => Some(&op.kwargs),
            _ => None,
        }
    }

    /// The domain this expression belongs to.
    pub fn domain(&self) -> Domain {
        match &*self.node {
            Node::Scalar(_) | Node::Idx(_) => Domain::Scalar,
            Node::Symbol(sym) => sym.domain,
            Node::Sentinel(s) => s.domain(),
            Node::Op(op) => crate::meta::result_domain(op.kind),
        }
    }

    /// The Hilbert space this expression acts on. Scalars and sentinels live in the trivial
    /// space; operations carry the union of their children's spaces.
    pub fn space(&self) -> HilbertSpace {
        match &*self.node {
            Node::Scalar(_) | Node::Idx(_) | Node::Sentinel(_) => HilbertSpace::Trivial,
            Node::Symbol(sym) => sym.space.clone(),
            Node::Op(op) => op.space.clone(),
        }
    }

    /// If this is a scalar literal leaf, its value.
    pub fn as_value(&self) -> Option<&ScalarValue> {
        match &*self.node {
            Node::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// If this is an index-symbol leaf, the symbol.
    pub fn as_idx(&self) -> Option<&IdxSym> {
        match &*self.node {
            Node::Idx(i) => Some(i),
            _ => None,
        }
    }

    /// If this is a named-symbol leaf, the symbol.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match &*self.node {
            Node::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    /// Returns true if this is the scalar literal zero.
    pub fn is_scalar_zero(&self) -> bool {
        matches!(&*self.node, Node::Scalar(v) if v.is_zero())
    }

    /// Returns true if this is the scalar literal one.
    pub fn is_scalar_one(&self) -> bool {
        matches!(&*self.node, Node::Scalar(v) if v.is_one())
    }

    /// The index symbols occurring free in this expression. An index bound by an indexed sum's
    /// ranges is not free within that sum's term.
    pub fn free_index_symbols(&self) -> BTreeSet<IdxSym> {
        let mut free = BTreeSet::new();
        self.collect_free_indices(&mut free);
        free
    }

    /// The index symbols bound by this node's own ranges (empty for anything that is not an
    /// indexed sum).
    pub fn bound_index_symbols(&self) -> BTreeSet<IdxSym> {
        match self.kwargs().and_then(|kw| kw.ranges.as_ref()) {
            Some(ranges) => ranges.iter().map(|r| r.index_symbol().clone()).collect(),
            None => BTreeSet::new(),
        }
    }

    fn collect_free_indices(&self, free: &mut BTreeSet<IdxSym>) {
        match &*self.node {
            Node::Idx(i) => {
                free.insert(i.clone());
            },
            Node::Op(op) => {
                let bound = self.bound_index_symbols();
                if bound.is_empty() {
                    for arg in &op.args {
                        arg.collect_free_indices(free);
                    }
                } else {
                    let mut inner = BTreeSet::new();
                    for arg in &op.args {
                        arg.collect_free_indices(&mut inner);
                    }
                    free.extend(inner.difference(&bound).cloned());
                }
            },
            _ => {},
        }
    }
}

/// Structural equality over `(kind, args, kwargs)`, with pointer identity as the fast path.
///
/// Equality is only ever evaluated on canonical nodes, so argument order is already canonical
/// on both sides and positional comparison is sufficient.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node) || self.node == other.node
    }
}

impl std::hash::Hash for Expr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.node.hash(state);
    }
}

/// Returns true if the kind is a Plus-like (summation) kind, for parenthesization.
fn is_plus_like(expr: &Expr) -> bool {
    matches!(
        expr.kind(),
        Some(OpKind::ScalarPlus)
            | Some(OpKind::OperatorPlus)
            | Some(OpKind::KetPlus)
            | Some(OpKind::SuperOperatorPlus)
    )
}

/// Writes `expr`, parenthesized if it is Plus-like.
fn fmt_factor(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if is_plus_like(expr) {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

/// Writes `args` joined by `sep`, parenthesizing Plus-like children.
fn fmt_joined(f: &mut fmt::Formatter<'_>, args: &[Expr], sep: &str) -> fmt::Result {
    let mut iter = args.iter();
    if let Some(first) = iter.next() {
        fmt_factor(f, first)?;
        for arg in iter {
            write!(f, "{}", sep)?;
            fmt_factor(f, arg)?;
        }
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.node {
            Node::Scalar(v) => write!(f, "{}", v),
            Node::Idx(i) => write!(f, "{}", i),
            Node::Symbol(sym) => match sym.domain {
                Domain::State => write!(f, "|{}>", sym.label),
                _ => write!(f, "{}", sym.label),
            },
            Node::Sentinel(s) => match s {
                Sentinel::ZeroOperator | Sentinel::ZeroKet | Sentinel::ZeroSuperOperator => {
                    write!(f, "0")
                },
                Sentinel::IdentityOperator
                | Sentinel::TrivialKet
                | Sentinel::IdentitySuperOperator => write!(f, "1"),
            },
            Node::Op(op) => match op.kind {
                OpKind::ScalarPlus
                | OpKind::OperatorPlus
                | OpKind::KetPlus
                | OpKind::SuperOperatorPlus => fmt_joined(f, &op.args, " + "),
                OpKind::ScalarTimes
                | OpKind::OperatorTimes
                | OpKind::SuperOperatorTimes
                | OpKind::ScalarTimesOperator
                | OpKind::ScalarTimesKet
                | OpKind::ScalarTimesSuperOperator
                | OpKind::OperatorTimesKet
                | OpKind::SuperOperatorTimesOperator => fmt_joined(f, &op.args, " * "),
                OpKind::TensorKet => fmt_joined(f, &op.args, " x "),
                OpKind::ScalarPower => {
                    fmt_factor(f, &op.args[0])?;
                    write!(f, "^")?;
                    fmt_factor(f, &op.args[1])
                },
                OpKind::ScalarConjugate => write!(f, "conjugate({})", op.args[0]),
                OpKind::KroneckerDelta => {
                    write!(f, "delta({}, {})", op.args[0], op.args[1])
                },
                OpKind::Adjoint | OpKind::SuperAdjoint => {
                    write!(f, "adjoint({})", op.args[0])
                },
                OpKind::Commutator => write!(f, "[{}, {}]", op.args[0], op.args[1]),
                OpKind::OperatorTrace => {
                    // over_space is validated at construction
                    let space = op.kwargs.over_space.as_ref().unwrap();
                    write!(f, "tr[{}]({})", space, op.args[0])
                },
                OpKind::ScalarIndexedSum
                | OpKind::OperatorIndexedSum
                | OpKind::KetIndexedSum => {
                    let ranges = op.kwargs.ranges.as_ref().unwrap();
                    write!(f, "Sum")?;
                    for range in ranges {
                        write!(f, "_{{{}}}", range)?;
                    }
                    write!(f, " ")?;
                    fmt_factor(f, &op.args[0])
                },
                OpKind::BraKet => write!(f, "<{}|{}>", op.args[0], op.args[1]),
                OpKind::KetBra => write!(f, "|{}><{}|", op.args[0], op.args[1]),
                OpKind::SPre => write!(f, "SPre({})", op.args[0]),
                OpKind::SPost => write!(f, "SPost({})", op.args[0]),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use super::*;

    #[test]
    fn singleton_identity() {
        // two independent accesses to a singleton are the same allocation, not merely
        // structurally equal
        let a = ZERO_OPERATOR.clone();
        let b = ZERO_OPERATOR.clone();
        assert!(a.is_same(&b));
        assert_eq!(a, b);

        // a freshly built sentinel is structurally equal but a different allocation
        let fresh = Expr::sentinel(Sentinel::ZeroOperator);
        assert!(!fresh.is_same(&a));
        assert_eq!(fresh, a);
    }

    #[test]
    fn leaf_equality_and_hash() {
        use std::collections::HashMap;

        let hs = HilbertSpace::local("0");
        let a1 = Expr::symbol("a", Domain::Operator, hs.clone());
        let a2 = Expr::symbol("a", Domain::Operator, hs.clone());
        let b = Expr::symbol("b", Domain::Operator, hs);
        assert_eq!(a1, a2);
        assert_ne!(a1, b);

        // equal expressions are interchangeable as map keys
        let mut map = HashMap::new();
        map.insert(a1, 1);
        map.insert(b, 2);
        assert_eq!(map[&a2], 1);
    }

    #[test]
    fn symbols_on_different_spaces_differ() {
        let a1 = Expr::symbol("a", Domain::Operator, HilbertSpace::local("1"));
        let a2 = Expr::symbol("a", Domain::Operator, HilbertSpace::local_with_dimension("1", 2));
        assert_ne!(a1, a2);
    }

    #[test]
    fn free_and_bound_indices() {
        let i = IdxSym::new("i");
        let j = IdxSym::new("j");
        let expr = Expr::idx(i.clone());
        assert_eq!(expr.free_index_symbols(), BTreeSet::from([i.clone()]));
        assert_ne!(i, j);
    }

    #[test]
    fn scalar_predicates() {
        assert!(ZERO.is_scalar_zero());
        assert!(ONE.is_scalar_one());
        assert!(!ONE.is_scalar_zero());
        assert!(ZERO.is_same(&ZERO.clone()));
    }
}
