//! Wildcard patterns and the structural matcher.
//!
//! A pattern is a tree over the same operation kinds as the expressions it matches, except that
//! its leaves may be [`Wildcard`]s: named captures with an optional *head constraint* (a closed
//! set of admissible node heads) and an optional predicate. Matching a pattern against a
//! candidate produces a [`Bindings`] mapping capture names to the captured values, or fails.
//!
//! Patterns are matched positionally against the concrete argument order the normalization
//! pipeline produced; there is no backtracking across sibling order, because commuting operands
//! are already canonically sorted before any rule is tried. The only variable-width construct
//! is a single variadic wildcard ([`wc_rest`]) per argument list, which captures a slice of
//! arguments.
//!
//! A capture name bound twice must bind to equal values, which is how `pattern_head(A, A)`
//! expresses "both operands identical".

use crate::expr::{Domain, Expr, Kwargs, Node, OpKind, Sentinel};
use crate::indices::IndexRange;
use crate::space::HilbertSpace;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A head constraint: the closed set membership test a wildcard may impose on candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Head {
    /// Any expression of the given domain.
    Domain(Domain),
    /// An operation node of the given kind.
    Kind(OpKind),
    /// A numeric scalar literal leaf.
    Value,
    /// An index-symbol leaf.
    Index,
    /// A named-symbol leaf.
    Symbol,
    /// A specific singleton sentinel.
    Sentinel(Sentinel),
}

impl Head {
    fn matches(&self, expr: &Expr) -> bool {
        match self {
            Self::Domain(domain) => expr.domain() == *domain,
            Self::Kind(kind) => expr.kind() == Some(*kind),
            Self::Value => expr.as_value().is_some(),
            Self::Index => expr.as_idx().is_some(),
            Self::Symbol => expr.as_symbol().is_some(),
            Self::Sentinel(s) => matches!(expr.node(), Node::Sentinel(x) if x == s),
        }
    }
}

/// Whether a wildcard captures a single argument or a variadic slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WcMode {
    Single,
    Rest,
}

/// A named capture with optional constraints.
#[derive(Clone)]
pub struct Wildcard {
    name: String,
    heads: Vec<Head>,
    predicate: Option<fn(&Expr) -> bool>,
    mode: WcMode,
}

/// Creates a wildcard capturing a single argument.
pub fn wc(name: impl Into<String>) -> Wildcard {
    Wildcard {
        name: name.into(),
        heads: Vec::new(),
        predicate: None,
        mode: WcMode::Single,
    }
}

/// Creates a variadic wildcard capturing a slice of arguments. At most one may appear in an
/// argument list.
pub fn wc_rest(name: impl Into<String>) -> Wildcard {
    Wildcard {
        name: name.into(),
        heads: Vec::new(),
        predicate: None,
        mode: WcMode::Rest,
    }
}

impl Wildcard {
    /// Restricts the wildcard to candidates matching the given head.
    pub fn head(mut self, head: Head) -> Self {
        self.heads.push(head);
        self
    }

    /// Restricts the wildcard to candidates matching any of the given heads.
    pub fn heads(mut self, heads: impl IntoIterator<Item = Head>) -> Self {
        self.heads.extend(heads);
        self
    }

    /// Adds an arbitrary predicate the candidate must satisfy.
    pub fn filter(mut self, predicate: fn(&Expr) -> bool) -> Self {
        self.predicate = Some(predicate);
        self
    }

    fn admits(&self, expr: &Expr) -> bool {
        (self.heads.is_empty() || self.heads.iter().any(|h| h.matches(expr)))
            && self.predicate.map_or(true, |p| p(expr))
    }
}

impl fmt::Debug for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wildcard")
            .field("name", &self.name)
            .field("heads", &self.heads)
            .field("predicate", &self.predicate.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

/// A pattern over a keyword parameter slot holding a Hilbert space.
#[derive(Debug, Clone)]
pub enum SpacePattern {
    /// Matches only this exact space.
    Literal(HilbertSpace),
    /// Matches any space, binding it under the given capture name.
    Wildcard(String),
}

/// Constraints on an operation's keyword parameters. Unconstrained slots match anything.
#[derive(Debug, Clone, Default)]
pub struct KwargsPattern {
    /// Constraint on the `over_space` slot.
    pub over_space: Option<SpacePattern>,
    /// Capture name for the `ranges` slot; matches only if ranges are present.
    pub ranges: Option<String>,
}

impl KwargsPattern {
    fn is_empty(&self) -> bool {
        self.over_space.is_none() && self.ranges.is_none()
    }

    fn matches(&self, kwargs: &Kwargs, bindings: &mut Bindings) -> bool {
        if let Some(space_pat) = &self.over_space {
            let Some(space) = &kwargs.over_space else {
                return false;
            };
            match space_pat {
                SpacePattern::Literal(expected) => {
                    if expected != space {
                        return false;
                    }
                },
                SpacePattern::Wildcard(name) => {
                    if !bindings.bind(name, Bound::Space(space.clone())) {
                        return false;
                    }
                },
            }
        }
        if let Some(name) = &self.ranges {
            let Some(ranges) = &kwargs.ranges else {
                return false;
            };
            if !bindings.bind(name, Bound::Ranges(ranges.clone())) {
                return false;
            }
        }
        true
    }

    fn collect_captures(&self, names: &mut BTreeSet<String>) {
        if let Some(SpacePattern::Wildcard(name)) = &self.over_space {
            names.insert(name.clone());
        }
        if let Some(name) = &self.ranges {
            names.insert(name.clone());
        }
    }
}

/// A structural pattern tree.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches only an expression structurally equal to the literal.
    Literal(Expr),
    /// A wildcard capture.
    Wc(Wildcard),
    /// An operation of a given kind with child and kwargs patterns.
    Proto {
        kind: OpKind,
        args: Vec<Pattern>,
        kwargs: KwargsPattern,
    },
}

/// Creates a structural pattern for an operation kind with the given child patterns.
pub fn pat(kind: OpKind, args: Vec<Pattern>) -> Pattern {
    Pattern::Proto { kind, args, kwargs: KwargsPattern::default() }
}

impl From<Wildcard> for Pattern {
    fn from(wc: Wildcard) -> Self {
        Pattern::Wc(wc)
    }
}

impl From<Expr> for Pattern {
    fn from(expr: Expr) -> Self {
        Pattern::Literal(expr)
    }
}

impl From<&Expr> for Pattern {
    fn from(expr: &Expr) -> Self {
        Pattern::Literal(expr.clone())
    }
}

impl Pattern {
    /// Matches this pattern against a single expression, returning the bindings on success.
    pub fn match_expr(&self, expr: &Expr) -> Option<Bindings> {
        let mut bindings = Bindings::default();
        if self.matches_into(expr, &mut bindings) {
            Some(bindings)
        } else {
            None
        }
    }

    fn matches_into(&self, expr: &Expr, bindings: &mut Bindings) -> bool {
        match self {
            Self::Literal(lit) => lit == expr,
            Self::Wc(wildcard) => match wildcard.mode {
                WcMode::Single => {
                    wildcard.admits(expr)
                        && bindings.bind(&wildcard.name, Bound::Expr(expr.clone()))
                },
                // a variadic wildcard only makes sense inside an argument list
                WcMode::Rest => false,
            },
            Self::Proto { kind, args, kwargs } => {
                if expr.kind() != Some(*kind) {
                    return false;
                }
                let expr_kwargs = expr.kwargs().cloned().unwrap_or_default();
                kwargs.matches(&expr_kwargs, bindings)
                    && match_seq(args, expr.args(), bindings)
            },
        }
    }

    /// The capture names this pattern binds.
    pub fn captures(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_captures(&mut names);
        names
    }

    fn collect_captures(&self, names: &mut BTreeSet<String>) {
        match self {
            Self::Literal(_) => {},
            Self::Wc(wildcard) => {
                names.insert(wildcard.name.clone());
            },
            Self::Proto { args, kwargs, .. } => {
                for arg in args {
                    arg.collect_captures(names);
                }
                kwargs.collect_captures(names);
            },
        }
    }
}

/// Matches a pattern sequence against an argument slice, allowing at most one variadic
/// wildcard. Fixed patterns to the left of the variadic match from the front, fixed patterns
/// to its right match from the back, and the variadic captures the middle (possibly empty).
fn match_seq(patterns: &[Pattern], exprs: &[Expr], bindings: &mut Bindings) -> bool {
    let rest_pos = patterns
        .iter()
        .position(|p| matches!(p, Pattern::Wc(w) if w.mode == WcMode::Rest));

    match rest_pos {
        None => {
            patterns.len() == exprs.len()
                && patterns
                    .iter()
                    .zip(exprs.iter())
                    .all(|(p, e)| p.matches_into(e, bindings))
        },
        Some(pos) => {
            let fixed = patterns.len() - 1;
            if exprs.len() < fixed {
                return false;
            }
            let tail_len = patterns.len() - pos - 1;
            let middle_end = exprs.len() - tail_len;

            let front_ok = patterns[..pos]
                .iter()
                .zip(exprs[..pos].iter())
                .all(|(p, e)| p.matches_into(e, bindings));
            if !front_ok {
                return false;
            }
            let back_ok = patterns[pos + 1..]
                .iter()
                .zip(exprs[middle_end..].iter())
                .all(|(p, e)| p.matches_into(e, bindings));
            if !back_ok {
                return false;
            }

            let Pattern::Wc(wildcard) = &patterns[pos] else {
                return false;
            };
            let middle = &exprs[pos..middle_end];
            if !middle.iter().all(|e| wildcard.admits(e)) {
                return false;
            }
            bindings.bind(&wildcard.name, Bound::Exprs(middle.to_vec()))
        },
    }
}

/// A pattern over a proto-form: the argument tuple (plus kwargs) of an operation *before* the
/// node is constructed. This is what rule tables match against.
#[derive(Debug, Clone)]
pub struct PatternHead {
    /// Patterns over the positional arguments.
    pub args: Vec<Pattern>,
    /// Constraints on the keyword parameters.
    pub kwargs: KwargsPattern,
}

/// Creates a proto-form pattern over the given argument patterns.
pub fn pattern_head(args: Vec<Pattern>) -> PatternHead {
    PatternHead { args, kwargs: KwargsPattern::default() }
}

impl PatternHead {
    /// Adds a `ranges` wildcard matching the kwargs of the candidate.
    pub fn with_ranges(mut self, name: impl Into<String>) -> Self {
        self.kwargs.ranges = Some(name.into());
        self
    }

    /// Adds an `over_space` constraint.
    pub fn with_over_space(mut self, pattern: SpacePattern) -> Self {
        self.kwargs.over_space = Some(pattern);
        self
    }

    /// Matches against a proto-form's argument list and kwargs.
    pub fn match_proto(&self, args: &[Expr], kwargs: &Kwargs) -> Option<Bindings> {
        let mut bindings = Bindings::default();
        if self.kwargs.is_empty() && !kwargs.is_empty() {
            // a head pattern without kwargs constraints only matches kwargs-free proto-forms
            return None;
        }
        if !self.kwargs.matches(kwargs, &mut bindings) {
            return None;
        }
        if match_seq(&self.args, args, &mut bindings) {
            Some(bindings)
        } else {
            None
        }
    }

    /// The capture names this pattern binds.
    pub fn captures(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for arg in &self.args {
            arg.collect_captures(&mut names);
        }
        self.kwargs.collect_captures(&mut names);
        names
    }
}

/// A value captured by a wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    /// A single expression.
    Expr(Expr),
    /// A slice of expressions captured by a variadic wildcard.
    Exprs(Vec<Expr>),
    /// A Hilbert space captured from a kwargs slot.
    Space(HilbertSpace),
    /// Index ranges captured from a kwargs slot.
    Ranges(Vec<IndexRange>),
}

/// The result of a successful match: capture name → captured value.
///
/// The typed accessors require the capture to be present and of the accessed type; rule
/// registration validates the declared captures against the pattern, so a violation here is a
/// programmer error, not a runtime condition.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: BTreeMap<String, Bound>,
}

impl Bindings {
    /// Binds `name` to `value`, or checks consistency if `name` is already bound. Returns
    /// false if the new value differs from the existing one.
    fn bind(&mut self, name: &str, value: Bound) -> bool {
        match self.map.get(name) {
            Some(existing) => *existing == value,
            None => {
                self.map.insert(name.to_string(), value);
                true
            },
        }
    }

    /// Looks up a capture.
    pub fn get(&self, name: &str) -> Option<&Bound> {
        self.map.get(name)
    }

    /// The captured expression under `name`.
    pub fn expr(&self, name: &str) -> Expr {
        match self.map.get(name) {
            Some(Bound::Expr(expr)) => expr.clone(),
            _ => panic!("capture `{name}` is not a bound expression (validated at registration)"),
        }
    }

    /// The captured expression slice under `name`.
    pub fn exprs(&self, name: &str) -> Vec<Expr> {
        match self.map.get(name) {
            Some(Bound::Exprs(exprs)) => exprs.clone(),
            _ => panic!("capture `{name}` is not a bound sequence (validated at registration)"),
        }
    }

    /// The captured Hilbert space under `name`.
    pub fn space(&self, name: &str) -> HilbertSpace {
        match self.map.get(name) {
            Some(Bound::Space(space)) => space.clone(),
            _ => panic!("capture `{name}` is not a bound space (validated at registration)"),
        }
    }

    /// The captured index ranges under `name`.
    pub fn ranges(&self, name: &str) -> Vec<IndexRange> {
        match self.map.get(name) {
            Some(Bound::Ranges(ranges)) => ranges.clone(),
            _ => panic!("capture `{name}` is not bound ranges (validated at registration)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::ZERO_OPERATOR;
    use crate::indices::IdxSym;
    use pretty_assertions::assert_eq;
    use super::*;

    fn op(label: &str, hs: &str) -> Expr {
        Expr::symbol(label, Domain::Operator, HilbertSpace::local(hs))
    }

    #[test]
    fn wildcard_binds_candidate() {
        let a = op("a", "0");
        let head = pattern_head(vec![wc("A").head(Head::Domain(Domain::Operator)).into()]);
        let bindings = head.match_proto(&[a.clone()], &Kwargs::default()).unwrap();
        assert_eq!(bindings.expr("A"), a);
    }

    #[test]
    fn head_constraint_rejects() {
        let head = pattern_head(vec![wc("u").head(Head::Domain(Domain::Scalar)).into()]);
        assert!(head.match_proto(&[op("a", "0")], &Kwargs::default()).is_none());
        assert!(head.match_proto(&[Expr::integer(2)], &Kwargs::default()).is_some());
    }

    #[test]
    fn repeated_capture_requires_equal_values() {
        let a = op("a", "0");
        let b = op("b", "0");
        let head = pattern_head(vec![wc("A").into(), wc("A").into()]);
        // (x, x) matches
        assert!(head.match_proto(&[a.clone(), a.clone()], &Kwargs::default()).is_some());
        // (x, y) with x != y fails
        assert!(head.match_proto(&[a, b], &Kwargs::default()).is_none());
    }

    #[test]
    fn literal_matches_by_equality() {
        let head = pattern_head(vec![Pattern::from(&*ZERO_OPERATOR), wc("B").into()]);
        let b = op("b", "0");
        let bindings = head
            .match_proto(&[ZERO_OPERATOR.clone(), b.clone()], &Kwargs::default())
            .unwrap();
        assert_eq!(bindings.expr("B"), b);
        assert!(head.match_proto(&[b.clone(), b], &Kwargs::default()).is_none());
    }

    #[test]
    fn arity_mismatch_fails() {
        let head = pattern_head(vec![wc("A").into(), wc("B").into()]);
        assert!(head.match_proto(&[op("a", "0")], &Kwargs::default()).is_none());
    }

    #[test]
    fn variadic_tail_captures_rest() {
        let (a, b, c) = (op("a", "0"), op("b", "1"), op("c", "2"));
        let head = pattern_head(vec![wc("A").into(), wc_rest("rest").into()]);
        let bindings = head
            .match_proto(&[a.clone(), b.clone(), c.clone()], &Kwargs::default())
            .unwrap();
        assert_eq!(bindings.expr("A"), a);
        assert_eq!(bindings.exprs("rest"), vec![b, c]);
    }

    #[test]
    fn variadic_head_with_fixed_tail() {
        let (a, b, c) = (op("a", "0"), op("b", "1"), op("c", "2"));
        let head = pattern_head(vec![wc_rest("init").into(), wc("Z").into()]);
        let bindings = head
            .match_proto(&[a.clone(), b.clone(), c.clone()], &Kwargs::default())
            .unwrap();
        assert_eq!(bindings.exprs("init"), vec![a, b]);
        assert_eq!(bindings.expr("Z"), c);
    }

    #[test]
    fn ranges_wildcard_matches_kwargs() {
        let i = IdxSym::new("i");
        let ranges = vec![IndexRange::OverList { idx: i, values: vec![1, 2] }];
        let kwargs = Kwargs::ranges(ranges.clone());
        let head = pattern_head(vec![wc("term").into()]).with_ranges("indranges");
        let bindings = head.match_proto(&[op("a", "0")], &kwargs).unwrap();
        assert_eq!(bindings.ranges("indranges"), ranges);

        // without ranges present the pattern does not match
        assert!(head.match_proto(&[op("a", "0")], &Kwargs::default()).is_none());
    }

    #[test]
    fn kwargs_free_pattern_rejects_kwargs() {
        let i = IdxSym::new("i");
        let kwargs = Kwargs::ranges(vec![IndexRange::OverList { idx: i, values: vec![1] }]);
        let head = pattern_head(vec![wc("term").into()]);
        assert!(head.match_proto(&[op("a", "0")], &kwargs).is_none());
    }

    #[test]
    fn nested_proto_pattern() {
        let u = Expr::integer(2);
        let a = op("a", "0");
        // build a fake canonical node by hand for matcher testing only
        let nested = Expr::from_op(crate::expr::OpExpr {
            kind: OpKind::ScalarTimesOperator,
            args: vec![u.clone(), a.clone()],
            kwargs: Kwargs::default(),
            space: a.space(),
        });
        let head = pattern_head(vec![
            pat(OpKind::ScalarTimesOperator, vec![wc("u").into(), wc("A").into()]),
            wc("B").into(),
        ]);
        let b = op("b", "0");
        let bindings = head.match_proto(&[nested, b.clone()], &Kwargs::default()).unwrap();
        assert_eq!(bindings.expr("u"), u);
        assert_eq!(bindings.expr("A"), a);
        assert_eq!(bindings.expr("B"), b);
    }
}
