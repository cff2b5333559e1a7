//! Consumer-facing transforms implemented through repeated `create` calls: distributing
//! products over sums, domain-dispatched adjoints, and scalar-subtree simplification.

use crate::context::AlgebraContext;
use crate::error::AlgebraError;
use crate::expr::{Domain, Expr, Kwargs, Node, OpKind};
use crate::meta::{plus_kind, result_domain};

impl Expr {
    /// Fully distributes products over sums, bottom-up: `A * (B + C)` becomes
    /// `A * B + A * C` in every domain, including scalar coefficients over sums of terms.
    pub fn expand(&self, ctx: &AlgebraContext) -> Result<Expr, AlgebraError> {
        match self.node() {
            Node::Op(op) => {
                let mut args = Vec::with_capacity(op.args.len());
                for arg in &op.args {
                    args.push(arg.expand(ctx)?);
                }
                let rebuilt = ctx.create(op.kind, args, op.kwargs.clone())?;
                distribute(ctx, rebuilt)
            },
            _ => Ok(self.clone()),
        }
    }

    /// The adjoint of this expression, dispatched by domain: operator adjoint, super-operator
    /// adjoint, or complex conjugation for scalars. States have no adjoint within their own
    /// domain (it would be a bra), so they are rejected.
    pub fn adjoint(&self, ctx: &AlgebraContext) -> Result<Expr, AlgebraError> {
        let kind = match self.domain() {
            Domain::Operator => OpKind::Adjoint,
            Domain::SuperOperator => OpKind::SuperAdjoint,
            Domain::Scalar => OpKind::ScalarConjugate,
            Domain::State => {
                return Err(AlgebraError::WrongDomain {
                    kind: OpKind::Adjoint,
                    expected: Domain::Operator,
                    got: Domain::State,
                })
            },
        };
        ctx.create(kind, vec![self.clone()], Kwargs::default())
    }

    /// Rebuilds every scalar subtree through the current context, leaving the non-scalar
    /// structure untouched.
    pub fn simplify_scalar(&self, ctx: &AlgebraContext) -> Result<Expr, AlgebraError> {
        if self.domain() == Domain::Scalar {
            return self.rebuild(ctx);
        }
        match self.node() {
            Node::Op(op) => {
                let mut args = Vec::with_capacity(op.args.len());
                for arg in &op.args {
                    args.push(arg.simplify_scalar(ctx)?);
                }
                ctx.create(op.kind, args, op.kwargs.clone())
            },
            _ => Ok(self.clone()),
        }
    }
}

/// If `expr` is a product-like node with a Plus-like argument, distributes over it and
/// recurses into the resulting partial products.
fn distribute(ctx: &AlgebraContext, expr: Expr) -> Result<Expr, AlgebraError> {
    let Some(kind) = expr.kind() else {
        return Ok(expr);
    };

    let distributable = matches!(
        kind,
        OpKind::ScalarTimes
            | OpKind::OperatorTimes
            | OpKind::TensorKet
            | OpKind::SuperOperatorTimes
            | OpKind::ScalarTimesOperator
            | OpKind::ScalarTimesKet
            | OpKind::ScalarTimesSuperOperator
            | OpKind::OperatorTimesKet
            | OpKind::SuperOperatorTimesOperator
    );
    if !distributable {
        return Ok(expr);
    }

    let args = expr.args();
    let sum_pos = args
        .iter()
        .position(|arg| arg.kind() == Some(plus_kind(arg.domain())));
    let Some(pos) = sum_pos else {
        return Ok(expr);
    };

    let kwargs = expr.kwargs().cloned().unwrap_or_default();
    let mut terms = Vec::with_capacity(args[pos].args().len());
    for term in args[pos].args() {
        let mut factors = args.to_vec();
        factors[pos] = term.clone();
        let product = ctx.create(kind, factors, kwargs.clone())?;
        terms.push(distribute(ctx, product)?);
    }
    ctx.create(plus_kind(result_domain(kind)), terms, Kwargs::default())
}
