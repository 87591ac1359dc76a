//! Compilation context threaded through every rule.
//!
//! A fresh [`State`] is created for each top-level compile. Rules read and
//! modify it while recursing: the precedence of the enclosing node, the bind
//! parameters gathered so far, the tables referenced by columns, and whether
//! columns render qualified. Attributes can be pushed and popped to open
//! nested scopes; the `with_*` helpers pair each push with its pop on every
//! exit path, errors included.

use crate::error::Result;
use crate::expressions::Expr;
use crate::variables::Variable;

/// Precedence assigned to kinds without an explicit level. Never grouped.
pub const MAX_PRECEDENCE: u32 = 1000;

/// The precedence a child node is compiled under.
///
/// A child whose own level is below `level` gets parenthesized. With
/// `tie_break` set, a child at exactly `level` is parenthesized too; this is
/// how right operands of non-associative operators keep their grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precedence {
    pub level: u32,
    pub tie_break: bool,
}

impl Precedence {
    /// Nothing is grouped under this precedence.
    pub const MIN: Precedence = Precedence::new(0);

    pub const fn new(level: u32) -> Self {
        Self {
            level,
            tie_break: false,
        }
    }

    /// Whether a node at `inner` needs parentheses under this precedence.
    pub fn groups(self, inner: u32) -> bool {
        inner < self.level || (self.tie_break && inner == self.level)
    }
}

/// Names of the attributes that can be pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Precedence,
    Parameters,
    AutoTables,
    ColumnPrefix,
}

/// A value for one attribute, as pushed, saved or popped.
#[derive(Debug, Clone)]
pub enum Slot {
    Precedence(Precedence),
    Parameters(Vec<Variable>),
    AutoTables(Vec<Expr>),
    ColumnPrefix(bool),
}

impl Slot {
    pub fn attr(&self) -> Attr {
        match self {
            Slot::Precedence(_) => Attr::Precedence,
            Slot::Parameters(_) => Attr::Parameters,
            Slot::AutoTables(_) => Attr::AutoTables,
            Slot::ColumnPrefix(_) => Attr::ColumnPrefix,
        }
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub precedence: Precedence,
    /// Bind parameters, in placeholder order
    pub parameters: Vec<Variable>,
    /// Tables referenced by compiled columns, in discovery order
    pub auto_tables: Vec<Expr>,
    /// Render columns as `table.column`
    pub column_prefix: bool,
    stack: Vec<Slot>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub fn new() -> Self {
        Self {
            precedence: Precedence::MIN,
            parameters: Vec::new(),
            auto_tables: Vec::new(),
            column_prefix: false,
            stack: Vec::new(),
        }
    }

    /// Set the tie-break on the current precedence, so the next child at the
    /// same level as its parent gets grouped.
    pub fn break_ties(&mut self) {
        self.precedence.tie_break = true;
    }

    /// Replace an attribute with `value`, saving the old one.
    pub fn push(&mut self, value: Slot) {
        let old = self.replace(value);
        self.stack.push(old);
    }

    /// Save an attribute and keep working on a copy of it.
    pub fn push_copy(&mut self, attr: Attr) {
        let copy = self.get(attr);
        self.push(copy);
    }

    /// Restore the most recently pushed attribute, returning the value it
    /// had in the scope being closed.
    pub fn pop(&mut self) -> Option<Slot> {
        let saved = self.stack.pop()?;
        Some(self.replace(saved))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn get(&self, attr: Attr) -> Slot {
        match attr {
            Attr::Precedence => Slot::Precedence(self.precedence),
            Attr::Parameters => Slot::Parameters(self.parameters.clone()),
            Attr::AutoTables => Slot::AutoTables(self.auto_tables.clone()),
            Attr::ColumnPrefix => Slot::ColumnPrefix(self.column_prefix),
        }
    }

    fn replace(&mut self, value: Slot) -> Slot {
        match value {
            Slot::Precedence(p) => Slot::Precedence(std::mem::replace(&mut self.precedence, p)),
            Slot::Parameters(p) => Slot::Parameters(std::mem::replace(&mut self.parameters, p)),
            Slot::AutoTables(t) => Slot::AutoTables(std::mem::replace(&mut self.auto_tables, t)),
            Slot::ColumnPrefix(c) => Slot::ColumnPrefix(std::mem::replace(&mut self.column_prefix, c)),
        }
    }

    /// Run `f` with `value` pushed, popping afterwards even when `f` fails.
    /// Returns `f`'s result together with the attribute's final scoped value.
    pub fn scoped<T>(
        &mut self,
        value: Slot,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<(T, Slot)> {
        let depth = self.stack.len();
        self.push(value);
        let result = f(self);
        while self.stack.len() > depth + 1 {
            self.pop();
        }
        let scoped = self.pop();
        match (result, scoped) {
            (Ok(value), Some(slot)) => Ok((value, slot)),
            (Ok(_), None) => Err(crate::error::Error::internal("state stack underflow")),
            (Err(e), _) => Err(e),
        }
    }

    pub fn with_column_prefix<T>(
        &mut self,
        column_prefix: bool,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.scoped(Slot::ColumnPrefix(column_prefix), f).map(|(value, _)| value)
    }

    /// Run `f` with a fresh inferred-table list; tables it finds stay local to it.
    pub fn with_auto_tables<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.scoped(Slot::AutoTables(Vec::new()), f).map(|(value, _)| value)
    }

    /// Run `f` collecting bind parameters into a separate list, returned
    /// alongside the result instead of being appended to the outer list.
    pub fn with_parameters<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<(T, Vec<Variable>)> {
        let (value, slot) = self.scoped(Slot::Parameters(Vec::new()), f)?;
        match slot {
            Slot::Parameters(parameters) => Ok((value, parameters)),
            other => Err(crate::error::Error::internal(format!(
                "expected parameters scope, found {:?}",
                other.attr()
            ))),
        }
    }
}
