//! Default rule sets and constructors for the `qsym` rewrite engine.
//!
//! The engine crate (`qsym-core`) knows *how* to rewrite (pattern matching, rule tables, the
//! construction pipeline) but ships with empty tables. This crate supplies the structural
//! algebra of the four domains as rule sets layered on top:
//!
//! - [`scalar`]: numeric folding, power laws, Kronecker deltas, scalar indexed sums;
//! - [`operator`]: scalar-coefficient migration, adjoints, traces, commutators, operator
//!   indexed sums;
//! - [`state`]: kets as a module over scalars and operators, inner/outer products;
//! - [`superop`]: `SPre`/`SPost` composition and application back into the operator domain.
//!
//! Physics rule sets (ladder operators, spin algebra) are deliberately out of scope; they are
//! consumers of the same registration API.
//!
//! ```
//! use qsym_algebra::{default_context, operator};
//! use qsym_core::space::HilbertSpace;
//!
//! let ctx = default_context();
//! let hs = HilbertSpace::local("0");
//! let a = operator::symbol("a", hs.clone());
//! let b = operator::symbol("b", hs);
//!
//! // a + b + a  ==  2*a + b
//! let sum = operator::plus(&ctx, vec![a.clone(), b.clone(), a.clone()]).unwrap();
//! let two_a = operator::scalar_times(&ctx, qsym_core::expr::Expr::integer(2), a).unwrap();
//! assert_eq!(sum, operator::plus(&ctx, vec![two_a, b]).unwrap());
//! ```

pub mod operator;
pub mod scalar;
pub mod state;
pub mod superop;

use qsym_core::context::AlgebraContext;
use qsym_core::error::RegistryError;

/// Registers the default rule sets of all four domains into `ctx`.
pub fn register_all(ctx: &AlgebraContext) -> Result<(), RegistryError> {
    scalar::register_rules(ctx)?;
    operator::register_rules(ctx)?;
    state::register_rules(ctx)?;
    superop::register_rules(ctx)?;
    Ok(())
}

/// A context pre-loaded with the default rule sets.
pub fn default_context() -> AlgebraContext {
    let ctx = AlgebraContext::new();
    // the shipped rule sets are validated by the test suite
    register_all(&ctx).expect("default rule sets register cleanly");
    ctx
}
