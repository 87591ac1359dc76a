//! Rule registry and dispatch engine.
//!
//! A [`Compiler`] maps node kinds to rules. Compiling a node walks the
//! kind's lineage (see [`NodeKind::lineage`]) and runs the first rule found,
//! so a rule for an abstract kind such as `BinaryOper` covers every operator
//! without a more specific rule.
//!
//! # Precedence
//!
//! Each concrete kind may carry a precedence level. While a rule runs, the
//! state's precedence is the level of the node being compiled; a child whose
//! level is lower (or equal, once the parent called
//! [`State::break_ties`]) comes back parenthesized.
//!
//! # Forking
//!
//! [`Compiler::fork`] returns a registry that sees every rule of its parent
//! chain and can override or extend them locally. Lookups go through a merged
//! table cached against the generations of all registries in the chain, so
//! rules registered on a parent after forking are picked up on the next
//! compile.
//!
//! # Output
//!
//! Registries are generic over the produced [`Fragment`]: `String` for SQL
//! text, [`Pred`](crate::predicate::Pred) for in-process predicates.

use crate::error::{Error, Result};
use crate::expressions::{Expr, NodeKind};
use crate::state::{Precedence, State, MAX_PRECEDENCE};
use crate::value::Value;
use crate::variables::Variable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

/// Output produced by rules.
pub trait Fragment: Sized {
    /// Splice already valid text without compiling it.
    fn raw(text: &str) -> Result<Self>;
    /// Parenthesize.
    fn group(self) -> Self;
    /// Combine the compiled elements of a list.
    fn join(parts: Vec<Self>, separator: &str) -> Self;
}

impl Fragment for String {
    fn raw(text: &str) -> Result<Self> {
        Ok(text.to_string())
    }

    fn group(self) -> Self {
        format!("({})", self)
    }

    fn join(parts: Vec<Self>, separator: &str) -> Self {
        parts.join(separator)
    }
}

/// A compile rule: receives the registry (to compile children), the state
/// and the node.
pub type Rule<O> = Arc<dyn Fn(&Compiler<O>, &mut State, &Expr) -> Result<O> + Send + Sync>;

/// Settings shared by a registry and its forks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Positional placeholder emitted for each bind parameter
    pub placeholder: String,
    /// Separator used when compiling lists
    pub separator: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            placeholder: "?".to_string(),
            separator: ", ".to_string(),
        }
    }
}

struct Tables<O> {
    rules: HashMap<NodeKind, Rule<O>>,
    precedence: HashMap<NodeKind, u32>,
}

impl<O> Default for Tables<O> {
    fn default() -> Self {
        Self {
            rules: HashMap::new(),
            precedence: HashMap::new(),
        }
    }
}

impl<O> Tables<O> {
    fn extend(&mut self, other: &Tables<O>) {
        for (kind, rule) in &other.rules {
            self.rules.insert(*kind, Arc::clone(rule));
        }
        self.precedence.extend(other.precedence.iter().map(|(k, v)| (*k, *v)));
    }
}

struct Merged<O> {
    fingerprint: Vec<u64>,
    tables: Arc<Tables<O>>,
}

static GENERATIONS: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    GENERATIONS.fetch_add(1, Ordering::Relaxed)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Nodes spliced as-is: raw SQL, tokens, and strings when compiling raw.
fn passthrough(expr: &Expr, raw: bool) -> Option<&str> {
    match expr {
        Expr::Raw(text) | Expr::Token(text) => Some(text),
        Expr::Literal(Value::Str(text)) if raw => Some(text),
        _ => None,
    }
}

/// A registry of compile rules and precedences.
pub struct Compiler<O> {
    config: CompilerConfig,
    local: RwLock<Tables<O>>,
    generation: AtomicU64,
    /// Ancestors, root first
    parents: Vec<Arc<Compiler<O>>>,
    merged: RwLock<Option<Merged<O>>>,
}

impl<O: Fragment> Default for Compiler<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> fmt::Debug for Compiler<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("config", &self.config)
            .field("generation", &self.generation.load(Ordering::Acquire))
            .field("parents", &self.parents.len())
            .finish()
    }
}

impl<O: Fragment> Compiler<O> {
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            config,
            local: RwLock::new(Tables::default()),
            generation: AtomicU64::new(next_generation()),
            parents: Vec::new(),
            merged: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Create a child registry inheriting every rule and precedence of this
    /// one. Registrations on the child never affect the parent.
    pub fn fork(self: &Arc<Self>) -> Self {
        let mut parents = self.parents.clone();
        parents.push(Arc::clone(self));
        Self {
            config: self.config.clone(),
            local: RwLock::new(Tables::default()),
            generation: AtomicU64::new(next_generation()),
            parents,
            merged: RwLock::new(None),
        }
    }

    /// Register `rule` for each of `kinds`, replacing earlier local rules.
    pub fn register<F>(&self, kinds: &[NodeKind], rule: F)
    where
        F: Fn(&Compiler<O>, &mut State, &Expr) -> Result<O> + Send + Sync + 'static,
    {
        let rule: Rule<O> = Arc::new(rule);
        {
            let mut local = write(&self.local);
            for kind in kinds {
                local.rules.insert(*kind, Arc::clone(&rule));
            }
        }
        self.generation.store(next_generation(), Ordering::Release);
    }

    pub fn set_precedence(&self, level: u32, kinds: &[NodeKind]) {
        {
            let mut local = write(&self.local);
            for kind in kinds {
                local.precedence.insert(*kind, level);
            }
        }
        self.generation.store(next_generation(), Ordering::Release);
    }

    /// The level registered for `kind`, or [`MAX_PRECEDENCE`].
    pub fn get_precedence(&self, kind: NodeKind) -> u32 {
        self.refresh()
            .precedence
            .get(&kind)
            .copied()
            .unwrap_or(MAX_PRECEDENCE)
    }

    fn fingerprint(&self) -> Vec<u64> {
        self.parents
            .iter()
            .map(|parent| parent.generation.load(Ordering::Acquire))
            .chain(std::iter::once(self.generation.load(Ordering::Acquire)))
            .collect()
    }

    /// Merged tables, rebuilt when any registry in the chain changed.
    fn refresh(&self) -> Arc<Tables<O>> {
        let fingerprint = self.fingerprint();
        if let Some(merged) = read(&self.merged).as_ref() {
            if merged.fingerprint == fingerprint {
                return Arc::clone(&merged.tables);
            }
        }

        let mut tables = Tables::default();
        for parent in &self.parents {
            tables.extend(&read(&parent.local));
        }
        tables.extend(&read(&self.local));
        debug!(
            parents = self.parents.len(),
            rules = tables.rules.len(),
            "merged compile tables"
        );

        let tables = Arc::new(tables);
        *write(&self.merged) = Some(Merged {
            fingerprint,
            tables: Arc::clone(&tables),
        });
        tables
    }

    fn snapshot(&self) -> Arc<Tables<O>> {
        if let Some(merged) = read(&self.merged).as_ref() {
            return Arc::clone(&merged.tables);
        }
        self.refresh()
    }

    /// Compile a tree with a fresh [`State`], returning the output and the
    /// bind parameters in placeholder order.
    pub fn compile(&self, expr: &Expr) -> Result<(O, Vec<Variable>)> {
        self.refresh();
        let mut state = State::new();
        let output = self.compile_expr(&mut state, expr)?;
        trace!(
            kind = %expr.kind(),
            parameters = state.parameters.len(),
            "compiled expression"
        );
        Ok((output, state.parameters))
    }

    /// Compile a child node under the current state.
    pub fn compile_expr(&self, state: &mut State, expr: &Expr) -> Result<O> {
        self.compile_with(state, expr, &self.config.separator, false)
    }

    /// Compile a child node, splicing plain strings as SQL text.
    pub fn compile_raw(&self, state: &mut State, expr: &Expr) -> Result<O> {
        self.compile_with(state, expr, &self.config.separator, true)
    }

    /// Compile a node; lists are joined with `separator`.
    pub fn compile_with(&self, state: &mut State, expr: &Expr, separator: &str, raw: bool) -> Result<O> {
        let outer = state.precedence;
        let result = match (passthrough(expr, raw), expr) {
            (Some(text), _) => O::raw(text),
            (None, Expr::List(items)) => self
                .compile_items(state, items, separator, raw, outer)
                .map(|parts| O::join(parts, separator)),
            (None, _) => self.compile_single(state, expr, outer),
        };
        state.precedence = outer;
        result
    }

    /// Compile a sequence of nodes and join them with `separator`.
    pub fn compile_each(&self, state: &mut State, items: &[Expr], separator: &str, raw: bool) -> Result<O> {
        self.compile_parts(state, items, separator, raw)
            .map(|parts| O::join(parts, separator))
    }

    /// Compile a sequence of nodes, keeping the outputs apart.
    pub fn compile_parts(&self, state: &mut State, items: &[Expr], separator: &str, raw: bool) -> Result<Vec<O>> {
        let outer = state.precedence;
        let result = self.compile_items(state, items, separator, raw, outer);
        state.precedence = outer;
        result
    }

    fn compile_items(
        &self,
        state: &mut State,
        items: &[Expr],
        separator: &str,
        raw: bool,
        outer: Precedence,
    ) -> Result<Vec<O>> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let part = match (passthrough(item, raw), item) {
                (Some(text), _) => O::raw(text)?,
                (None, Expr::List(nested)) => {
                    state.precedence = outer;
                    let nested = self.compile_items(state, nested, separator, raw, outer)?;
                    O::join(nested, separator)
                }
                (None, _) => self.compile_single(state, item, outer)?,
            };
            parts.push(part);
        }
        state.precedence = outer;
        Ok(parts)
    }

    fn compile_single(&self, state: &mut State, expr: &Expr, outer: Precedence) -> Result<O> {
        let tables = self.snapshot();
        let kind = expr.kind();
        let rule = kind
            .lineage()
            .iter()
            .find_map(|k| tables.rules.get(k))
            .map(Arc::clone);
        let Some(rule) = rule else {
            debug!(kind = %kind, "no compile rule registered");
            return Err(Error::compile(format!(
                "Don't know how to compile type {} of {:?}",
                kind, expr
            )));
        };

        let inner = tables.precedence.get(&kind).copied().unwrap_or(MAX_PRECEDENCE);
        state.precedence = Precedence::new(inner);
        let output = rule(self, state, expr)?;
        if outer.groups(inner) {
            Ok(output.group())
        } else {
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::{BinaryOp, BinaryOperator, Column};

    fn toy() -> Compiler<String> {
        let compiler = Compiler::new();
        compiler.register(&[NodeKind::Column], |_, _, expr| match expr {
            Expr::Column(c) => Ok(c.name.clone()),
            _ => Err(Error::internal("not a column")),
        });
        compiler.register(&[NodeKind::BinaryOper], |c, state, expr| match expr {
            Expr::Binary(op) => {
                let left = c.compile_expr(state, &op.left)?;
                let right = c.compile_expr(state, &op.right)?;
                Ok(format!("{}{}{}", left, op.op.sql_token(), right))
            }
            _ => Err(Error::internal("not an operator")),
        });
        compiler
    }

    fn gt(a: &str, b: &str) -> Expr {
        BinaryOperator::new(BinaryOp::Gt, Column::new(a), Column::new(b)).into()
    }

    #[test]
    fn test_abstract_rule_covers_subkinds() {
        let (sql, params) = toy().compile(&gt("a", "b")).unwrap();
        assert_eq!(sql, "a > b");
        assert!(params.is_empty());
    }

    #[test]
    fn test_unknown_kind_fails() {
        let err = toy().compile(&Expr::Literal(Value::Int(1))).unwrap_err();
        assert!(err.to_string().contains("Don't know how to compile type Literal"));
    }

    #[test]
    fn test_lower_precedence_child_is_grouped() {
        let compiler = toy();
        compiler.set_precedence(10, &[NodeKind::Gt]);
        compiler.set_precedence(20, &[NodeKind::Lt]);
        let inner = gt("a", "b");
        let outer: Expr = BinaryOperator::new(BinaryOp::Lt, inner, Column::new("c")).into();
        assert_eq!(compiler.compile(&outer).unwrap().0, "(a > b) < c");
    }

    #[test]
    fn test_raw_and_list_passthrough() {
        let compiler = toy();
        let list = Expr::List(vec![Expr::raw("x"), Expr::token("y"), Column::new("z").into()]);
        assert_eq!(compiler.compile(&list).unwrap().0, "x, y, z");

        let mut state = State::new();
        let text = compiler
            .compile_with(&mut state, &Expr::from(vec!["a", "b"]), " AND ", true)
            .unwrap();
        assert_eq!(text, "a AND b");
    }

    #[test]
    fn test_default_precedence_is_max() {
        let compiler = toy();
        assert_eq!(compiler.get_precedence(NodeKind::Eq), MAX_PRECEDENCE);
        compiler.set_precedence(50, &[NodeKind::Eq]);
        assert_eq!(compiler.get_precedence(NodeKind::Eq), 50);
    }

    #[test]
    fn test_fork_sees_later_parent_rules() {
        let parent = Arc::new(toy());
        let child = parent.fork();
        assert!(child.compile(&Expr::Literal(Value::Int(1))).is_err());

        parent.register(&[NodeKind::Literal], |_, _, _| Ok("lit".to_string()));
        parent.set_precedence(5, &[NodeKind::Literal]);
        assert_eq!(child.compile(&Expr::Literal(Value::Int(1))).unwrap().0, "lit");
        assert_eq!(child.get_precedence(NodeKind::Literal), 5);
    }

    #[test]
    fn test_fork_override_keeps_parent() {
        let parent = Arc::new(toy());
        let child = parent.fork();
        child.register(&[NodeKind::Column], |_, _, _| Ok("overridden".to_string()));

        let column: Expr = Column::new("a").into();
        assert_eq!(child.compile(&column).unwrap().0, "overridden");
        assert_eq!(parent.compile(&column).unwrap().0, "a");
    }
}
