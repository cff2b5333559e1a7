//! Canonicalizing rewrite engine for symbolic quantum algebra.
//!
//! Expressions (scalars, operators, kets, super-operators) are immutable trees of typed
//! nodes, kept in a canonical simplified form by a generic rewriting engine: a wildcard
//! [pattern matcher](pattern), per-kind [rule tables](rules), and a fixed
//! [normalization pipeline](create) applied at construction time (associative flattening,
//! canonical commutative [ordering], neutral-element filtering, like-term collection, and
//! pairwise binary-rule application).
//!
//! # Construction is canonicalization
//!
//! There is no separate "simplify" pass: the only way to build an operation node is
//! [`AlgebraContext::create`](context::AlgebraContext::create), and what it returns is already
//! canonical. Rule handlers build their replacement expressions through `create` as well, so a
//! single rewrite cascades exactly as far as it needs to and no further: a construction
//! request is always terminal after one pipeline pass.
//!
//! ```
//! use qsym_core::context::AlgebraContext;
//! use qsym_core::expr::{Domain, Expr, Kwargs, OpKind, ZERO_OPERATOR};
//! use qsym_core::space::HilbertSpace;
//!
//! let ctx = AlgebraContext::new();
//! let hs = HilbertSpace::local("0");
//! let a = Expr::symbol("a", Domain::Operator, hs.clone());
//! let b = Expr::symbol("b", Domain::Operator, hs);
//!
//! // neutral elements vanish, and the 1-ary sum is unwrapped
//! let sum = ctx
//!     .create(
//!         OpKind::OperatorPlus,
//!         vec![a.clone(), ZERO_OPERATOR.clone()],
//!         Kwargs::default(),
//!     )
//!     .unwrap();
//! assert_eq!(sum, a);
//!
//! // commuting children are canonically ordered: b + a == a + b
//! let ab = ctx
//!     .create(OpKind::OperatorPlus, vec![a.clone(), b.clone()], Kwargs::default())
//!     .unwrap();
//! let ba = ctx.create(OpKind::OperatorPlus, vec![b, a], Kwargs::default()).unwrap();
//! assert_eq!(ab, ba);
//! // ...and thanks to the construction cache, they are the *same* node
//! assert!(ab.is_same(&ba));
//! ```
//!
//! # Rules
//!
//! Domain behavior is layered on as rules: `(name, pattern, handler)` triples registered per
//! operation kind, tried in registration order. A handler signals "this instance is out of
//! scope" by returning [`CannotSimplify`](error::CannotSimplify), which is expected control
//! flow, not an error. Registration problems (duplicate names, captures the pattern never
//! binds) fail loudly at setup time. The default rule sets for the four domains live in the
//! `qsym-algebra` crate; this crate is only the engine.
//!
//! # Determinism and sharing
//!
//! The engine is single-threaded, synchronous, and deterministic. All shared state (rule
//! tables, the construction cache, options) lives in an [`AlgebraContext`](context) passed by
//! reference into every construction; there are no process-wide globals apart from the
//! singleton zero/identity leaves. Identical construction requests return reference-identical
//! nodes, making pointer comparison a valid equality fast path.

pub mod context;
pub mod create;
pub mod error;
pub mod expand;
pub mod expr;
pub mod indices;
pub mod meta;
pub mod ordering;
pub mod pattern;
pub mod primitive;
pub mod rules;
pub mod space;
pub mod subst;
pub mod value;

pub use context::{AlgebraContext, ContextOptions, TemporaryRules};
pub use error::{AlgebraError, CannotSimplify, RegistryError, RuleError};
pub use expr::{Domain, Expr, Kwargs, Node, OpKind, Sentinel};
pub use indices::{IdxSym, IndexRange, RangeLimit};
pub use pattern::{pat, pattern_head, wc, wc_rest, Bindings, Head, Pattern, PatternHead};
pub use rules::{apply_rules, ExprRule, Rule};
pub use space::{HilbertSpace, LocalSpace};
pub use subst::Substitution;
pub use value::ScalarValue;
