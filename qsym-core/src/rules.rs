//! Rule tables: named, ordered collections of (pattern, handler) pairs.
//!
//! Each operation kind owns up to two tables: a *unary* table matched against the whole
//! proto-form, and, for associative kinds, a *binary* table matched against adjacent argument
//! pairs. Rules are tried in registration order; the first whose pattern matches *and* whose
//! handler accepts the bindings wins. A handler returning
//! [`CannotSimplify`](crate::error::CannotSimplify) is not an error: it means the pattern
//! matched but a side condition failed, and iteration simply continues with the next rule.
//!
//! Only one replacement is applied per call. Cascades happen because handlers build their
//! results through [`create`](crate::context::AlgebraContext::create), which re-enters the
//! pipeline for the rewritten sub-expression, never by looping inside the table.

use crate::context::AlgebraContext;
use crate::error::{AlgebraError, RegistryError, RuleError};
use crate::expr::{Expr, Kwargs, OpKind};
use crate::pattern::{Bindings, Pattern, PatternHead};
use std::rc::Rc;
use tracing::{debug, warn};

/// The function a rule runs when its pattern matches.
pub type Handler = Rc<dyn Fn(&AlgebraContext, &Bindings) -> Result<Expr, RuleError>>;

/// A named rewrite rule.
pub struct Rule {
    name: String,
    pattern: PatternHead,
    required: Vec<String>,
    handler: Handler,
}

impl Rule {
    /// Creates a rule. `required` lists the captures the handler consumes; registration
    /// verifies every one of them is bound by the pattern, so a typo fails at setup time
    /// instead of producing a confusing panic mid-rewrite.
    pub fn new(
        name: impl Into<String>,
        pattern: PatternHead,
        required: &[&str],
        handler: impl Fn(&AlgebraContext, &Bindings) -> Result<Expr, RuleError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            required: required.iter().map(|s| s.to_string()).collect(),
            handler: Rc::new(handler),
        }
    }

    /// The rule's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An ordered collection of rules attached to one operation kind.
#[derive(Clone)]
pub struct RuleTable {
    name: String,
    rules: Vec<Rc<Rule>>,
}

impl RuleTable {
    pub(crate) fn new(name: String) -> Self {
        Self { name, rules: Vec::new() }
    }

    /// The table's name, e.g. `OperatorTimes.binary`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registered rule names, in application order.
    pub fn rule_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name.clone()).collect()
    }

    /// Registers a rule at the end of the table, validating its name and declared captures.
    pub(crate) fn register(&mut self, rule: Rule) -> Result<(), RegistryError> {
        if self.rules.iter().any(|r| r.name == rule.name) {
            return Err(RegistryError::DuplicateRule {
                table: self.name.clone(),
                name: rule.name,
            });
        }
        let bound = rule.pattern.captures();
        for capture in &rule.required {
            if !bound.contains(capture) {
                return Err(RegistryError::UnboundCapture {
                    rule: rule.name.clone(),
                    capture: capture.clone(),
                });
            }
        }
        self.rules.push(Rc::new(rule));
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Vec<Rc<Rule>> {
        self.rules.clone()
    }

    pub(crate) fn restore(&mut self, rules: Vec<Rc<Rule>>) {
        self.rules = rules;
    }

    /// Tries every rule against the proto-form `(args, kwargs)` in registration order.
    ///
    /// Returns the first successful replacement, `Ok(None)` if every rule either failed to
    /// match or declined, and a construction error only if a handler's nested `create` failed.
    pub(crate) fn match_replace(
        &self,
        ctx: &AlgebraContext,
        args: &[Expr],
        kwargs: &Kwargs,
    ) -> Result<Option<Expr>, AlgebraError> {
        for rule in &self.rules {
            let Some(bindings) = rule.pattern.match_proto(args, kwargs) else {
                continue;
            };
            match (rule.handler)(ctx, &bindings) {
                Ok(replacement) => {
                    debug!(table = %self.name, rule = %rule.name, "rewrote proto-form");
                    return Ok(Some(replacement));
                },
                Err(RuleError::CannotSimplify) => continue,
                Err(RuleError::Construction(err)) => return Err(err),
            }
        }
        Ok(None)
    }

    /// Scans adjacent pairs of an already-flattened, already-ordered argument list, applying
    /// the first matching binary rule and restarting the scan after every replacement (a
    /// change can enable new adjacent matches, including with elements that were not
    /// previously adjacent to the replaced one).
    ///
    /// Non-commuting operands are never reordered here; only the rule outcome changes
    /// adjacency. If a replacement is itself of kind `kind`, its children are spliced in flat.
    ///
    /// Terminates when no adjacent pair matches any rule. Termination is not provable for
    /// arbitrary rule sets, so a pass cap turns a divergent set into
    /// [`AlgebraError::DivergentRewrite`] instead of a silent infinite loop.
    pub(crate) fn match_replace_binary(
        &self,
        ctx: &AlgebraContext,
        kind: OpKind,
        mut args: Vec<Expr>,
        max_passes: usize,
    ) -> Result<Vec<Expr>, AlgebraError> {
        if self.rules.is_empty() {
            return Ok(args);
        }

        let empty_kwargs = Kwargs::default();
        let mut passes = 0usize;
        'scan: loop {
            if args.len() < 2 {
                return Ok(args);
            }
            passes += 1;
            if passes > max_passes {
                warn!(
                    kind = ?kind,
                    passes,
                    "binary rule scan did not converge; rule set is likely cyclic"
                );
                return Err(AlgebraError::DivergentRewrite { kind: Some(kind), passes });
            }

            for i in 0..args.len() - 1 {
                let pair = [args[i].clone(), args[i + 1].clone()];
                if let Some(replacement) = self.match_replace(ctx, &pair, &empty_kwargs)? {
                    if replacement.kind() == Some(kind) {
                        let children = replacement.args().to_vec();
                        args.splice(i..=i + 1, children);
                    } else {
                        args.splice(i..=i + 1, [replacement]);
                    }
                    continue 'scan;
                }
            }
            return Ok(args);
        }
    }
}

/// A standalone (pattern, handler) rule applied to whole expressions rather than proto-forms,
/// used by [`apply_rules`] for one-off rewrites outside the construction pipeline.
pub struct ExprRule {
    pub pattern: Pattern,
    pub handler: Handler,
}

impl ExprRule {
    /// Creates a standalone expression rule.
    pub fn new(
        pattern: Pattern,
        handler: impl Fn(&AlgebraContext, &Bindings) -> Result<Expr, RuleError> + 'static,
    ) -> Self {
        Self { pattern, handler: Rc::new(handler) }
    }
}

/// Rebuilds `expr` bottom-up, applying the given rules at every node until none matches.
///
/// Children are rewritten first, the node is re-created from the rewritten children (so the
/// normal pipeline simplifications still apply), and then each rule is tried in order on the
/// result. The per-node rewrite loop shares the binary-scan pass cap to guard against cyclic
/// rule lists.
pub fn apply_rules(
    ctx: &AlgebraContext,
    expr: &Expr,
    rules: &[ExprRule],
) -> Result<Expr, AlgebraError> {
    let mut current = match expr.kind() {
        Some(kind) => {
            let mut new_args = Vec::with_capacity(expr.args().len());
            for arg in expr.args() {
                new_args.push(apply_rules(ctx, arg, rules)?);
            }
            let kwargs = expr.kwargs().cloned().unwrap_or_default();
            ctx.create(kind, new_args, kwargs)?
        },
        None => expr.clone(),
    };

    let max_passes = ctx.options().max_binary_passes;
    let mut passes = 0usize;
    'rewrite: loop {
        passes += 1;
        if passes > max_passes {
            return Err(AlgebraError::DivergentRewrite { kind: current.kind(), passes });
        }
        for rule in rules {
            let Some(bindings) = rule.pattern.match_expr(&current) else {
                continue;
            };
            match (rule.handler)(ctx, &bindings) {
                Ok(replacement) => {
                    if replacement == current {
                        return Ok(replacement);
                    }
                    current = replacement;
                    continue 'rewrite;
                },
                Err(RuleError::CannotSimplify) => continue,
                Err(RuleError::Construction(err)) => return Err(err),
            }
        }
        return Ok(current);
    }
}
