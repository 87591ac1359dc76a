//! sqlexpr - SQL expression compiler
//!
//! This library turns composable expression trees (columns, comparisons,
//! boolean logic, arithmetic, joins, functions and whole statements) into
//! parameterized SQL text plus an ordered list of bind variables, or into an
//! in-process predicate evaluated against rows.
//!
//! # Architecture
//!
//! 1. **Expressions** - a closed AST ([`Expr`]) with a [`NodeKind`] per
//!    construct and abstract kinds grouping them
//! 2. **Builder** - fluent methods and operators producing trees
//! 3. **Compiler** - a registry of rules dispatched by node kind, with
//!    precedence-driven parenthesization and forkable rule tables
//! 4. **Generator** / **Predicate** - the rule sets for SQL text and for
//!    in-process predicates
//!
//! Every placeholder in the produced SQL corresponds to exactly one bind
//! variable, in the same order.

pub mod builder;
pub mod compiler;
pub mod error;
pub mod expressions;
pub mod generator;
pub mod predicate;
pub mod state;
pub mod value;
pub mod variables;

pub use compiler::{Compiler, CompilerConfig, Fragment, Rule};
pub use error::{Error, Result};
pub use expressions::{
    Alias, BinaryOp, BinaryOperator, Column, CompoundOp, CompoundOperator, Count, Delete, Expr,
    Function, FunctionName, Insert, JoinExpr, JoinKind, NodeKind, PrefixOp, Prefixed, Select,
    SetOp, SetOperation, Sql, SuffixOp, Suffixed, Table, Update,
};
pub use generator::{register_sql_rules, sql_compiler};
pub use predicate::{predicate_compiler, register_predicate_rules, Pred, PredOp, Predicate};
pub use state::{Precedence, State, MAX_PRECEDENCE};
pub use value::Value;
pub use variables::{Variable, VariableFactory, VariableKind};

use std::sync::{Arc, LazyLock};

/// The default SQL registry. Fork it to customize rules for a backend.
pub static COMPILE: LazyLock<Arc<Compiler<String>>> = LazyLock::new(|| Arc::new(sql_compiler()));

/// The default predicate registry.
pub static COMPILE_PREDICATE: LazyLock<Arc<Compiler<Pred>>> =
    LazyLock::new(|| Arc::new(predicate_compiler()));

/// Compile an expression tree into SQL text and its bind variables.
///
/// # Example
/// ```
/// use sqlexpr::{compile, Column, Expr, Select, Table};
///
/// let id = Column::new("id").of(Table::new("users"));
/// let query = Select::new(Column::new("id")).where_(Expr::from(id).eq(5));
///
/// let (sql, params) = compile(&query.into()).unwrap();
/// assert_eq!(sql, "SELECT id FROM users WHERE users.id = ?");
/// assert_eq!(params.len(), 1);
/// ```
pub fn compile(expr: &Expr) -> Result<(String, Vec<Variable>)> {
    COMPILE.compile(expr)
}

/// Compile an expression tree into an evaluable [`Predicate`].
pub fn compile_predicate(expr: &Expr) -> Result<Predicate> {
    COMPILE_PREDICATE.predicate(expr)
}

/// Compile an expression tree into predicate expression text, e.g.
/// `get_column('id') == 5`.
pub fn predicate_expression(expr: &Expr) -> Result<String> {
    COMPILE_PREDICATE.expression(expr)
}
