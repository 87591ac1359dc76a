//! SQL text rules.
//!
//! [`sql_compiler`] builds a registry that renders expression trees as
//! parameterized SQL: every literal or bind variable becomes one placeholder
//! and one entry in the parameter list, in the order the placeholders appear
//! in the final text.
//!
//! # Table inference
//!
//! Columns linked to a table record it in the state while compiling. A
//! `SELECT` without explicit tables collects those records from its columns,
//! WHERE, ORDER BY and GROUP BY clauses and emits them as its FROM clause.
//! Because FROM is compiled last but appears early in the text, its text and
//! parameters are spliced back at the position recorded before the clauses
//! were compiled.

use crate::compiler::Compiler;
use crate::error::{Error, Result};
use crate::expressions::{BinaryOp, CompoundOp, Expr, JoinExpr, NodeKind, Select};
use crate::state::{Precedence, State};
use crate::value::Value;
use crate::variables::Variable;
use tracing::debug;

fn mismatch(expected: &str, expr: &Expr) -> Error {
    Error::internal(format!("{} rule applied to {} node", expected, expr.kind()))
}

/// Build a registry with every SQL rule and precedence registered.
pub fn sql_compiler() -> Compiler<String> {
    let compiler = Compiler::new();
    register_sql_rules(&compiler);
    compiler
}

/// Register the SQL rules and precedences on an existing registry.
pub fn register_sql_rules(compiler: &Compiler<String>) {
    register_values(compiler);
    register_sources(compiler);
    register_operators(compiler);
    register_statements(compiler);
    register_functions(compiler);
    register_precedence(compiler);
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

fn register_values(compiler: &Compiler<String>) {
    compiler.register(&[NodeKind::Literal], |c, state, expr| match expr {
        Expr::Literal(Value::Null) => Ok("NULL".to_string()),
        Expr::Literal(value) => {
            state.parameters.push(Variable::from_value(value.clone()));
            Ok(c.config().placeholder.clone())
        }
        _ => Err(mismatch("literal", expr)),
    });

    compiler.register(&[NodeKind::Variable], |c, state, expr| match expr {
        Expr::Variable(variable) => {
            state.parameters.push(variable.clone());
            Ok(c.config().placeholder.clone())
        }
        _ => Err(mismatch("variable", expr)),
    });

    compiler.register(&[NodeKind::Sql], |_, state, expr| {
        let Expr::Sql(sql) = expr else {
            return Err(mismatch("sql", expr));
        };
        match &sql.params {
            None => {}
            Some(Expr::List(params)) => {
                for param in params {
                    state.parameters.push(bind_parameter(param)?);
                }
            }
            Some(other) => {
                return Err(Error::compile(format!(
                    "Parameters should be a list, not {}",
                    other.kind()
                )));
            }
        }
        if let Some(tables) = &sql.tables {
            state.auto_tables.push(tables.clone());
        }
        Ok(sql.text.clone())
    });
}

fn bind_parameter(param: &Expr) -> Result<Variable> {
    match param {
        Expr::Variable(variable) => Ok(variable.clone()),
        Expr::Literal(value) => Ok(Variable::from_value(value.clone())),
        other => Err(Error::compile(format!(
            "Can't bind {} as a parameter",
            other.kind()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Columns, tables, aliases, joins
// ---------------------------------------------------------------------------

fn register_sources(compiler: &Compiler<String>) {
    compiler.register(&[NodeKind::Column], |c, state, expr| {
        let Expr::Column(column) = expr else {
            return Err(mismatch("column", expr));
        };
        match &column.table {
            Some(table) => {
                state.auto_tables.push(table.as_ref().clone());
                if state.column_prefix {
                    let table = c.compile_raw(state, table)?;
                    Ok(format!("{}.{}", table, column.name))
                } else {
                    Ok(column.name.clone())
                }
            }
            None => Ok(column.name.clone()),
        }
    });

    compiler.register(&[NodeKind::Table], |_, _, expr| match expr {
        Expr::Table(table) => Ok(table.name.clone()),
        _ => Err(mismatch("table", expr)),
    });

    compiler.register(&[NodeKind::Alias], |c, state, expr| {
        let Expr::Alias(alias) = expr else {
            return Err(mismatch("alias", expr));
        };
        if state.column_prefix {
            return Ok(alias.name.clone());
        }
        let inner = c.compile_expr(state, &alias.expr)?;
        Ok(format!("{} AS {}", inner, alias.name))
    });

    compiler.register(&[NodeKind::JoinExpr], |c, state, expr| {
        let Expr::Join(join) = expr else {
            return Err(mismatch("join", expr));
        };
        compile_join(c, state, join)
    });
}

fn compile_join(c: &Compiler<String>, state: &mut State, join: &JoinExpr) -> Result<String> {
    let mut result = Vec::with_capacity(5);
    state.break_ties();
    if let Some(left) = &join.left {
        result.push(c.compile_raw(state, left)?);
    }
    result.push(join.kind.keyword().to_string());
    result.push(c.compile_raw(state, &join.right)?);
    if let Some(on) = &join.on {
        result.push("ON".to_string());
        result.push(state.with_column_prefix(true, |state| c.compile_raw(state, on))?);
    }
    Ok(result.join(" "))
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn register_operators(compiler: &Compiler<String>) {
    compiler.register(&[NodeKind::BinaryOper], |c, state, expr| {
        let Expr::Binary(op) = expr else {
            return Err(mismatch("binary operator", expr));
        };
        let left = c.compile_expr(state, &op.left)?;
        let right = c.compile_expr(state, &op.right)?;
        Ok(format!("{}{}{}", left, op.op.sql_token(), right))
    });

    compiler.register(&[NodeKind::NonAssocBinaryOper], |c, state, expr| {
        let Expr::Binary(op) = expr else {
            return Err(mismatch("binary operator", expr));
        };
        let left = c.compile_expr(state, &op.left)?;
        state.break_ties();
        let right = c.compile_expr(state, &op.right)?;
        Ok(format!("{}{}{}", left, op.op.sql_token(), right))
    });

    compiler.register(&[NodeKind::Eq, NodeKind::Ne], |c, state, expr| {
        let Expr::Binary(op) = expr else {
            return Err(mismatch("comparison", expr));
        };
        let left = c.compile_expr(state, &op.left)?;
        let negated = op.op == BinaryOp::Ne;
        if op.right.is_null_literal() {
            let test = if negated { "IS NOT NULL" } else { "IS NULL" };
            return Ok(format!("{} {}", left, test));
        }
        let right = c.compile_expr(state, &op.right)?;
        Ok(format!("{}{}{}", left, op.op.sql_token(), right))
    });

    compiler.register(&[NodeKind::In], |c, state, expr| {
        let Expr::Binary(op) = expr else {
            return Err(mismatch("in", expr));
        };
        let left = c.compile_expr(state, &op.left)?;
        // Parentheses are always emitted below.
        state.precedence = Precedence::MIN;
        let right = c.compile_expr(state, &op.right)?;
        Ok(format!("{} IN ({})", left, right))
    });

    compiler.register(&[NodeKind::CompoundOper], |c, state, expr| {
        let Expr::Compound(op) = expr else {
            return Err(mismatch("compound operator", expr));
        };
        let raw = matches!(op.op, CompoundOp::And | CompoundOp::Or);
        c.compile_each(state, &op.operands, op.op.sql_token(), raw)
    });

    compiler.register(&[NodeKind::PrefixExpr], |c, state, expr| {
        let Expr::Prefix(prefix) = expr else {
            return Err(mismatch("prefix", expr));
        };
        let inner = c.compile_expr(state, &prefix.expr)?;
        Ok(format!("{} {}", prefix.op.keyword(), inner))
    });

    compiler.register(&[NodeKind::SuffixExpr], |c, state, expr| {
        let Expr::Suffix(suffix) = expr else {
            return Err(mismatch("suffix", expr));
        };
        let inner = c.compile_raw(state, &suffix.expr)?;
        Ok(format!("{} {}", inner, suffix.op.keyword()))
    });
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

fn has_tables(state: &State, tables: Option<&Expr>, default_tables: Option<&Expr>) -> bool {
    tables.is_some() || default_tables.is_some() || !state.auto_tables.is_empty()
}

/// Compile the tables recorded by columns, once per distinct text.
fn build_auto_tables(c: &Compiler<String>, state: &mut State) -> Result<String> {
    let auto_tables = state.auto_tables.clone();
    let mut compiled: Vec<String> = Vec::with_capacity(auto_tables.len());
    for table in &auto_tables {
        let mark = state.parameters.len();
        let text = c.compile_raw(state, table)?;
        if compiled.contains(&text) {
            state.parameters.truncate(mark);
        } else {
            compiled.push(text);
        }
    }
    Ok(compiled.join(", "))
}

fn build_tables(c: &Compiler<String>, state: &mut State, select: &Select) -> Result<String> {
    if let Some(tables) = &select.tables {
        let Expr::List(items) = tables else {
            return c.compile_raw(state, tables);
        };
        let mut result = String::new();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                let continues_join = matches!(item, Expr::Join(join) if join.left.is_none());
                result.push_str(if continues_join { " " } else { ", " });
            }
            result.push_str(&c.compile_raw(state, item)?);
        }
        return Ok(result);
    }
    if !state.auto_tables.is_empty() {
        return build_auto_tables(c, state);
    }
    if let Some(default_tables) = &select.default_tables {
        return c.compile_raw(state, default_tables);
    }
    debug!("select has no resolvable tables");
    Err(Error::no_table("Couldn't find any tables"))
}

fn build_table(
    c: &Compiler<String>,
    state: &mut State,
    table: Option<&Expr>,
    default_table: Option<&Expr>,
) -> Result<String> {
    state.with_column_prefix(false, |state| {
        if let Some(table) = table {
            return c.compile_raw(state, table);
        }
        if !state.auto_tables.is_empty() {
            return build_auto_tables(c, state);
        }
        if let Some(default_table) = default_table {
            return c.compile_raw(state, default_table);
        }
        debug!("statement has no resolvable table");
        Err(Error::no_table("Couldn't find any table"))
    })
}

fn compile_select(c: &Compiler<String>, state: &mut State, select: &Select) -> Result<String> {
    state.with_auto_tables(|state| {
        let mut tokens = vec!["SELECT ".to_string()];
        let (tables_pos, parameters_pos) = state.with_column_prefix(true, |state| {
            if select.distinct {
                tokens.push("DISTINCT ".to_string());
            }
            tokens.push(c.compile_expr(state, &select.columns)?);
            let positions = (tokens.len(), state.parameters.len());
            if let Some(where_) = &select.where_ {
                tokens.push(" WHERE ".to_string());
                tokens.push(c.compile_raw(state, where_)?);
            }
            if let Some(order_by) = &select.order_by {
                tokens.push(" ORDER BY ".to_string());
                tokens.push(c.compile_raw(state, order_by)?);
            }
            if let Some(group_by) = &select.group_by {
                tokens.push(" GROUP BY ".to_string());
                tokens.push(c.compile_raw(state, group_by)?);
            }
            if let Some(limit) = select.limit {
                tokens.push(format!(" LIMIT {}", limit));
            }
            if let Some(offset) = select.offset {
                tokens.push(format!(" OFFSET {}", offset));
            }
            Ok(positions)
        })?;

        if has_tables(state, select.tables.as_ref(), select.default_tables.as_ref()) {
            let (from, parameters) = state.with_parameters(|state| {
                state.with_column_prefix(false, |state| build_tables(c, state, select))
            })?;
            tokens.splice(tables_pos..tables_pos, [" FROM ".to_string(), from]);
            state.parameters.splice(parameters_pos..parameters_pos, parameters);
        }
        Ok(tokens.concat())
    })
}

/// Resolve a statement's table after its body, splicing the table's
/// parameters back at `parameters_pos` where the table sits in the text.
fn deferred_table(
    c: &Compiler<String>,
    state: &mut State,
    parameters_pos: usize,
    explicit: Option<&Expr>,
    default: Option<&Expr>,
) -> Result<String> {
    let (table, parameters) = state.with_parameters(|state| build_table(c, state, explicit, default))?;
    state.parameters.splice(parameters_pos..parameters_pos, parameters);
    Ok(table)
}

fn register_statements(compiler: &Compiler<String>) {
    compiler.register(&[NodeKind::Select], |c, state, expr| match expr {
        Expr::Select(select) => compile_select(c, state, select),
        _ => Err(mismatch("select", expr)),
    });

    compiler.register(&[NodeKind::Insert], |c, state, expr| {
        let Expr::Insert(insert) = expr else {
            return Err(mismatch("insert", expr));
        };
        let columns = c.compile_raw(state, &insert.columns)?;
        let table = build_table(c, state, insert.table.as_ref(), insert.default_table.as_ref())?;
        let values = c.compile_expr(state, &insert.values)?;
        Ok(format!("INSERT INTO {} ({}) VALUES ({})", table, columns, values))
    });

    compiler.register(&[NodeKind::Update], |c, state, expr| {
        let Expr::Update(update) = expr else {
            return Err(mismatch("update", expr));
        };
        let parameters_pos = state.parameters.len();
        let mut sets = Vec::with_capacity(update.set.len());
        for (column, value) in &update.set {
            let column = c.compile_expr(state, column)?;
            let value = c.compile_expr(state, value)?;
            sets.push(format!("{}={}", column, value));
        }
        let table = deferred_table(c, state, parameters_pos, update.table.as_ref(), update.default_table.as_ref())?;
        let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));
        if let Some(where_) = &update.where_ {
            let condition = state.with_column_prefix(true, |state| c.compile_raw(state, where_))?;
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }
        Ok(sql)
    });

    compiler.register(&[NodeKind::Delete], |c, state, expr| {
        let Expr::Delete(delete) = expr else {
            return Err(mismatch("delete", expr));
        };
        let parameters_pos = state.parameters.len();
        let condition = match &delete.where_ {
            Some(where_) => Some(state.with_column_prefix(true, |state| c.compile_raw(state, where_))?),
            None => None,
        };
        // Resolved after WHERE so its columns can supply the table.
        let table = deferred_table(c, state, parameters_pos, delete.table.as_ref(), delete.default_table.as_ref())?;
        let mut sql = format!("DELETE FROM {}", table);
        if let Some(condition) = condition {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }
        Ok(sql)
    });

    compiler.register(&[NodeKind::SetExpr], |c, state, expr| {
        let Expr::SetOperation(set) = expr else {
            return Err(mismatch("set operation", expr));
        };
        let mut suffix = String::new();
        let mut suffix_parameters = Vec::new();
        if let Some(order_by) = &set.order_by {
            let (order, parameters) = state.with_parameters(|state| c.compile_expr(state, order_by))?;
            suffix.push_str(" ORDER BY ");
            suffix.push_str(&order);
            suffix_parameters = parameters;
        }
        if let Some(limit) = set.limit {
            suffix.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = set.offset {
            suffix.push_str(&format!(" OFFSET {}", offset));
        }
        let mut token = set.op.sql_token().to_string();
        if set.all {
            token.push_str("ALL ");
        }
        state.break_ties();
        let arms = c.compile_each(state, &set.arms, &token, false)?;
        state.parameters.extend(suffix_parameters);
        Ok(arms + &suffix)
    });
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn register_functions(compiler: &Compiler<String>) {
    compiler.register(&[NodeKind::Count], |c, state, expr| {
        let Expr::Count(count) = expr else {
            return Err(mismatch("count", expr));
        };
        match (&count.column, count.distinct) {
            (Some(column), true) => Ok(format!("COUNT(DISTINCT {})", c.compile_expr(state, column)?)),
            (Some(column), false) => Ok(format!("COUNT({})", c.compile_expr(state, column)?)),
            (None, false) => Ok("COUNT(*)".to_string()),
            (None, true) => Err(Error::expression("Must specify column when using distinct count")),
        }
    });

    compiler.register(&[NodeKind::Func, NodeKind::NamedFunc], |c, state, expr| {
        let Expr::Function(func) = expr else {
            return Err(mismatch("function", expr));
        };
        let args = c.compile_each(state, &func.args, ", ", false)?;
        Ok(format!("{}({})", func.name.as_str(), args))
    });
}

fn register_precedence(compiler: &Compiler<String>) {
    use NodeKind as K;
    compiler.set_precedence(10, &[K::Select, K::Insert, K::Update, K::Delete]);
    compiler.set_precedence(10, &[K::Join, K::LeftJoin, K::RightJoin]);
    compiler.set_precedence(10, &[K::NaturalJoin, K::NaturalLeftJoin, K::NaturalRightJoin]);
    compiler.set_precedence(10, &[K::Union, K::Intersect, K::Except]);
    compiler.set_precedence(20, &[K::Sql]);
    compiler.set_precedence(30, &[K::Or]);
    compiler.set_precedence(40, &[K::And]);
    compiler.set_precedence(50, &[K::Eq, K::Ne, K::Gt, K::Ge, K::Lt, K::Le, K::Like, K::In]);
    compiler.set_precedence(60, &[K::LShift, K::RShift]);
    compiler.set_precedence(70, &[K::Add, K::Sub]);
    compiler.set_precedence(80, &[K::Mul, K::Div, K::Mod]);
}
