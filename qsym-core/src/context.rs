//! The algebra context: rule registry, construction cache, and options.
//!
//! Instead of process-wide mutable rule tables, all shared state lives in an explicit
//! [`AlgebraContext`] value passed by reference into every construction. The engine is
//! single-threaded and synchronous; interior mutability is plain [`RefCell`]s.
//!
//! Determinism contract: given identical input node values and an identical registry state,
//! [`create`](AlgebraContext::create) always returns a structurally identical (and, thanks to
//! the construction cache, reference-identical) result. To keep that contract exact, any rule
//! mutation (including through the [`TemporaryRules`] guard) invalidates the cache.
//!
//! Rule registration is configuration: perform it before handing the context to rewriting
//! code. Registering rules *from within* a rule handler is not supported.

use crate::error::RegistryError;
use crate::expr::{Expr, Kwargs, OpKind, ALL_KINDS};
use crate::meta::{is_assoc, kind_name};
use crate::rules::{Rule, RuleTable};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Tunable engine options, fixed at context construction.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Upper bound on restart passes of the adjacent-pair binary-rule scan (and of
    /// [`apply_rules`](crate::rules::apply_rules) per-node loops) before the engine reports
    /// [`AlgebraError::DivergentRewrite`].
    pub max_binary_passes: usize,

    /// Whether construction results are memoized. Disabling trades the reference-identity
    /// guarantee of repeated construction for lower memory use; structural equality is
    /// unaffected.
    pub cache_enabled: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self { max_binary_passes: 1000, cache_enabled: true }
    }
}

pub(crate) struct KindTables {
    pub unary: RuleTable,
    pub binary: RuleTable,
}

type CacheKey = (OpKind, Vec<Expr>, Kwargs);

/// The shared state of the rewrite engine.
pub struct AlgebraContext {
    options: ContextOptions,
    tables: RefCell<HashMap<OpKind, KindTables>>,
    cache: RefCell<HashMap<CacheKey, Expr>>,
}

impl AlgebraContext {
    /// Creates a context with empty rule tables and default options.
    pub fn new() -> Self {
        Self::with_options(ContextOptions::default())
    }

    /// Creates a context with the given options.
    pub fn with_options(options: ContextOptions) -> Self {
        let tables = ALL_KINDS
            .iter()
            .map(|&kind| {
                let name = kind_name(kind);
                (kind, KindTables {
                    unary: RuleTable::new(name.to_string()),
                    binary: RuleTable::new(format!("{name}.binary")),
                })
            })
            .collect();
        Self {
            options,
            tables: RefCell::new(tables),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The context's options.
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Registers a unary rule for `kind`, at the end of its table.
    pub fn add_rule(&self, kind: OpKind, rule: Rule) -> Result<(), RegistryError> {
        let mut tables = self.tables.borrow_mut();
        // tables are pre-populated for every kind
        tables.get_mut(&kind).unwrap().unary.register(rule)?;
        drop(tables);
        self.invalidate_cache();
        Ok(())
    }

    /// Registers a binary (adjacent-pair) rule for an associative `kind`.
    pub fn add_binary_rule(&self, kind: OpKind, rule: Rule) -> Result<(), RegistryError> {
        if !is_assoc(kind) {
            return Err(RegistryError::NotAssociative(kind));
        }
        let mut tables = self.tables.borrow_mut();
        tables.get_mut(&kind).unwrap().binary.register(rule)?;
        drop(tables);
        self.invalidate_cache();
        Ok(())
    }

    /// Lists the rule names of the table addressed by `name` (`KindName` for the unary table,
    /// `KindName.binary` for the binary table). An unknown name reports the closest known
    /// table name as a suggestion.
    pub fn show_rules(&self, name: &str) -> Result<Vec<String>, RegistryError> {
        let tables = self.tables.borrow();
        for kind_tables in tables.values() {
            if kind_tables.unary.name() == name {
                return Ok(kind_tables.unary.rule_names());
            }
            if kind_tables.binary.name() == name {
                return Ok(kind_tables.binary.rule_names());
            }
        }
        let mut known: Vec<String> = tables
            .values()
            .flat_map(|t| [t.unary.name().to_string(), t.binary.name().to_string()])
            .collect();
        known.sort();
        let suggestion = known
            .into_iter()
            .min_by_key(|candidate| levenshtein::levenshtein(name, candidate))
            .filter(|candidate| levenshtein::levenshtein(name, candidate) <= name.len() / 2);
        Err(RegistryError::UnknownTable { name: name.to_string(), suggestion })
    }

    /// Begins a scoped rule-registration session: every rule added while the returned guard is
    /// alive is removed again when it drops, restoring the registry to its prior state on all
    /// exit paths.
    pub fn temporary_rules(&self) -> TemporaryRules<'_> {
        let tables = self.tables.borrow();
        let saved = tables
            .iter()
            .map(|(&kind, t)| (kind, (t.unary.snapshot(), t.binary.snapshot())))
            .collect();
        TemporaryRules { ctx: self, saved }
    }

    pub(crate) fn invalidate_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub(crate) fn cache_get(&self, key: &CacheKey) -> Option<Expr> {
        if !self.options.cache_enabled {
            return None;
        }
        self.cache.borrow().get(key).cloned()
    }

    pub(crate) fn cache_insert(&self, key: CacheKey, value: Expr) {
        if self.options.cache_enabled {
            self.cache.borrow_mut().insert(key, value);
        }
    }

    /// Runs `f` with the unary table of `kind`.
    pub(crate) fn with_unary_table<R>(
        &self,
        kind: OpKind,
        f: impl FnOnce(&RuleTable) -> R,
    ) -> R {
        let tables = self.tables.borrow();
        f(&tables.get(&kind).unwrap().unary)
    }

    /// Runs `f` with the binary table of `kind`.
    pub(crate) fn with_binary_table<R>(
        &self,
        kind: OpKind,
        f: impl FnOnce(&RuleTable) -> R,
    ) -> R {
        let tables = self.tables.borrow();
        f(&tables.get(&kind).unwrap().binary)
    }

    fn restore_tables(&self, saved: HashMap<OpKind, (Vec<Rc<Rule>>, Vec<Rc<Rule>>)>) {
        let mut tables = self.tables.borrow_mut();
        for (kind, (unary, binary)) in saved {
            let kind_tables = tables.get_mut(&kind).unwrap();
            kind_tables.unary.restore(unary);
            kind_tables.binary.restore(binary);
        }
        drop(tables);
        self.invalidate_cache();
    }
}

impl Default for AlgebraContext {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for scoped rule registration; see
/// [`AlgebraContext::temporary_rules`]. Dropping the guard restores the registry snapshot
/// taken at construction and invalidates the construction cache.
pub struct TemporaryRules<'a> {
    ctx: &'a AlgebraContext,
    saved: HashMap<OpKind, (Vec<Rc<Rule>>, Vec<Rc<Rule>>)>,
}

impl Drop for TemporaryRules<'_> {
    fn drop(&mut self) {
        self.ctx.restore_tables(std::mem::take(&mut self.saved));
    }
}
