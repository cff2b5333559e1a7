//! Substitution of index symbols and explicit expansion of indexed sums.
//!
//! Substitution rebuilds every affected subtree through
//! [`create`](crate::context::AlgebraContext::create), so rule-driven simplification cascades:
//! substituting a concrete index into a Kronecker delta evaluates it, and the resulting zeros
//! propagate through the containing products and sums.

use crate::context::AlgebraContext;
use crate::error::AlgebraError;
use crate::expr::{Expr, Kwargs, Node, OpKind};
use crate::indices::{IdxSym, IndexRange};
use crate::meta::{is_indexed_sum, plus_kind, result_domain};
use std::collections::BTreeMap;

/// A mapping from index symbols to the scalar expressions replacing them.
pub type Substitution = BTreeMap<IdxSym, Expr>;

impl Expr {
    /// Replaces free occurrences of the given index symbols, rebuilding through `create`.
    ///
    /// An index bound by an indexed sum shadows the substitution inside that sum's term.
    pub fn substitute(
        &self,
        ctx: &AlgebraContext,
        subs: &Substitution,
    ) -> Result<Expr, AlgebraError> {
        if subs.is_empty() {
            return self.rebuild(ctx);
        }
        match self.node() {
            Node::Idx(idx) => Ok(match subs.get(idx) {
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            }),
            Node::Op(op) => {
                let bound = self.bound_index_symbols();
                let narrowed;
                let effective = if bound.iter().any(|idx| subs.contains_key(idx)) {
                    narrowed = subs
                        .iter()
                        .filter(|(idx, _)| !bound.contains(*idx))
                        .map(|(idx, expr)| (idx.clone(), expr.clone()))
                        .collect();
                    &narrowed
                } else {
                    subs
                };
                let mut args = Vec::with_capacity(op.args.len());
                for arg in &op.args {
                    args.push(arg.substitute(ctx, effective)?);
                }
                ctx.create(op.kind, args, op.kwargs.clone())
            },
            _ => Ok(self.clone()),
        }
    }

    /// Re-creates this expression bottom-up through the current context. Useful after the rule
    /// registry changed (e.g. under a temporary-rules guard), since nodes are otherwise never
    /// revisited.
    pub fn rebuild(&self, ctx: &AlgebraContext) -> Result<Expr, AlgebraError> {
        match self.node() {
            Node::Op(op) => {
                let mut args = Vec::with_capacity(op.args.len());
                for arg in &op.args {
                    args.push(arg.rebuild(ctx)?);
                }
                ctx.create(op.kind, args, op.kwargs.clone())
            },
            _ => Ok(self.clone()),
        }
    }

    /// Expands every finite indexed sum in this expression into an explicit sum of substituted
    /// terms. The Plus-construction pipeline is then responsible for any resulting collection
    /// and cancellation.
    ///
    /// A symbolic range limit raises [`AlgebraError::InfiniteSum`]; enumerating a space with no
    /// declared basis raises [`AlgebraError::BasisNotSet`].
    pub fn doit(&self, ctx: &AlgebraContext) -> Result<Expr, AlgebraError> {
        match self.node() {
            Node::Op(op) if is_indexed_sum(op.kind) => {
                // ranges presence is validated at construction
                let ranges = op.kwargs.ranges.clone().unwrap();
                expand_sum(ctx, op.kind, &op.args[0], &ranges)
            },
            Node::Op(op) => {
                let mut args = Vec::with_capacity(op.args.len());
                for arg in &op.args {
                    args.push(arg.doit(ctx)?);
                }
                ctx.create(op.kind, args, op.kwargs.clone())
            },
            _ => Ok(self.clone()),
        }
    }
}

/// Expands one range at a time, recursing through the remaining ranges and any nested sums.
fn expand_sum(
    ctx: &AlgebraContext,
    kind: OpKind,
    term: &Expr,
    ranges: &[IndexRange],
) -> Result<Expr, AlgebraError> {
    let (first, rest) = match ranges.split_first() {
        Some(split) => split,
        None => return term.doit(ctx),
    };

    let values = first.values().ok_or_else(|| match first {
        IndexRange::OverFockSpace { space, .. } => {
            AlgebraError::BasisNotSet(crate::space::HilbertSpace::Local(space.clone()))
        },
        _ => AlgebraError::InfiniteSum,
    })?;

    let idx = first.index_symbol().clone();
    let mut terms = Vec::with_capacity(values.len());
    for value in values {
        let mut subs = Substitution::new();
        subs.insert(idx.clone(), Expr::integer(value));
        let substituted = term.substitute(ctx, &subs)?;
        terms.push(expand_sum(ctx, kind, &substituted, rest)?);
    }
    ctx.create(plus_kind(result_domain(kind)), terms, Kwargs::default())
}
