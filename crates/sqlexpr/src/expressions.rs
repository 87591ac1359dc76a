//! Expression AST.
//!
//! The central type is [`Expr`], a closed tagged enum with one variant per
//! construct the compilers understand: literals, bind variables, columns,
//! tables, operators, joins, statements, functions and raw SQL passthrough.
//!
//! # Node kinds
//!
//! Rules are registered per [`NodeKind`]. Besides one kind per concrete
//! construct there are abstract kinds (`BinaryOper`, `FromExpr`, `Expr`, ...)
//! grouping related constructs. [`NodeKind::lineage`] lists a kind followed by
//! its abstract ancestors, most specific first, so a rule registered for
//! `BinaryOper` applies to `Gt` unless `Gt` has a rule of its own.
//!
//! | Group | Kinds |
//! |---|---|
//! | **Values** | `Literal`, `Variable` |
//! | **Sources** | `Table`, `Alias`, `Join`, `LeftJoin`, ... |
//! | **Operators** | `Eq`, `Like`, `In`, `Sub`, `And`, `Add`, ... |
//! | **Statements** | `Select`, `Insert`, `Update`, `Delete`, `Union`, ... |
//! | **Functions** | `Count`, `Func`, `Max`, `Lower`, ... |
//! | **Passthrough** | `Sql`, `Raw`, `Token`, `List` |
//!
//! Nodes are immutable once built. Builder operations (see the `builder`
//! module) always produce new nodes.

use crate::error::{Error, Result};
use crate::value::Value;
use crate::variables::{Variable, VariableFactory};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Any node of an expression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    Variable(Variable),
    Column(Column),
    Table(Table),
    Alias(Box<Alias>),
    Join(Box<JoinExpr>),
    Binary(Box<BinaryOperator>),
    Compound(CompoundOperator),
    SetOperation(Box<SetOperation>),
    Select(Box<Select>),
    Insert(Box<Insert>),
    Update(Box<Update>),
    Delete(Box<Delete>),
    Function(Function),
    Count(Box<Count>),
    Prefix(Box<Prefixed>),
    Suffix(Box<Suffixed>),
    /// Raw SQL with optional bind parameters and implied table
    Sql(Box<Sql>),
    /// Already valid SQL text, spliced verbatim
    Raw(String),
    /// A single SQL token such as an identifier, spliced verbatim
    Token(String),
    /// Ordered sequence compiled element-wise and joined
    List(Vec<Expr>),
}

impl Expr {
    /// A `NULL` literal.
    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    pub fn token(token: impl Into<String>) -> Self {
        Expr::Token(token.into())
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Expr::List(items.into_iter().map(Into::into).collect())
    }

    /// The node kind used to look up compile rules and precedence.
    pub fn kind(&self) -> NodeKind {
        match self {
            Expr::Literal(_) => NodeKind::Literal,
            Expr::Variable(_) => NodeKind::Variable,
            Expr::Column(_) => NodeKind::Column,
            Expr::Table(_) => NodeKind::Table,
            Expr::Alias(_) => NodeKind::Alias,
            Expr::Join(join) => join.kind.node_kind(),
            Expr::Binary(op) => op.op.node_kind(),
            Expr::Compound(op) => op.op.node_kind(),
            Expr::SetOperation(set) => set.op.node_kind(),
            Expr::Select(_) => NodeKind::Select,
            Expr::Insert(_) => NodeKind::Insert,
            Expr::Update(_) => NodeKind::Update,
            Expr::Delete(_) => NodeKind::Delete,
            Expr::Function(func) => func.name.node_kind(),
            Expr::Count(_) => NodeKind::Count,
            Expr::Prefix(prefix) => prefix.op.node_kind(),
            Expr::Suffix(suffix) => suffix.op.node_kind(),
            Expr::Sql(_) => NodeKind::Sql,
            Expr::Raw(_) => NodeKind::Raw,
            Expr::Token(_) => NodeKind::Token,
            Expr::List(_) => NodeKind::List,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Expr::Literal(Value::Null))
    }

    /// Whether this node can stand on the right-hand side of a two-sided join:
    /// a table-like source or plain text naming one.
    pub fn is_from_source(&self) -> bool {
        match self {
            Expr::Raw(_) | Expr::Token(_) | Expr::Literal(Value::Str(_)) => true,
            other => other.kind().lineage().contains(&NodeKind::FromExpr),
        }
    }
}

/// Discriminant of a node for rule dispatch, including abstract kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    // Values
    Literal,
    Variable,
    // Sources
    Column,
    Table,
    Alias,
    Join,
    LeftJoin,
    RightJoin,
    NaturalJoin,
    NaturalLeftJoin,
    NaturalRightJoin,
    // Binary operators
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    RShift,
    LShift,
    Like,
    In,
    Sub,
    Div,
    Mod,
    // Compound operators
    And,
    Or,
    Add,
    Mul,
    // Set operations
    Union,
    Intersect,
    Except,
    // Statements
    Select,
    Insert,
    Update,
    Delete,
    // Functions
    Count,
    Func,
    Max,
    Min,
    Avg,
    Sum,
    Lower,
    Upper,
    // Decorators
    Not,
    Exists,
    Asc,
    Desc,
    // Passthrough
    Sql,
    Raw,
    Token,
    List,
    // Abstract kinds
    Expr,
    ComparableExpr,
    FromExpr,
    JoinExpr,
    BinaryOper,
    NonAssocBinaryOper,
    CompoundOper,
    SetExpr,
    FuncExpr,
    NamedFunc,
    PrefixExpr,
    SuffixExpr,
}

impl NodeKind {
    /// This kind followed by its abstract ancestors, most specific first.
    pub fn lineage(self) -> &'static [NodeKind] {
        use NodeKind as K;
        match self {
            K::Literal => &[K::Literal],
            K::Variable => &[K::Variable],
            K::Raw => &[K::Raw],
            K::Token => &[K::Token],
            K::List => &[K::List],
            K::Column => &[K::Column, K::ComparableExpr, K::Expr],
            K::Sql => &[K::Sql, K::ComparableExpr, K::Expr],
            K::Table => &[K::Table, K::FromExpr, K::Expr],
            K::Alias => &[K::Alias, K::FromExpr, K::Expr],
            K::Join => &[K::Join, K::JoinExpr, K::FromExpr, K::Expr],
            K::LeftJoin => &[K::LeftJoin, K::JoinExpr, K::FromExpr, K::Expr],
            K::RightJoin => &[K::RightJoin, K::JoinExpr, K::FromExpr, K::Expr],
            K::NaturalJoin => &[K::NaturalJoin, K::JoinExpr, K::FromExpr, K::Expr],
            K::NaturalLeftJoin => &[K::NaturalLeftJoin, K::JoinExpr, K::FromExpr, K::Expr],
            K::NaturalRightJoin => &[K::NaturalRightJoin, K::JoinExpr, K::FromExpr, K::Expr],
            K::Eq => &[K::Eq, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::Ne => &[K::Ne, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::Gt => &[K::Gt, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::Ge => &[K::Ge, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::Lt => &[K::Lt, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::Le => &[K::Le, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::RShift => &[K::RShift, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::LShift => &[K::LShift, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::Like => &[K::Like, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::In => &[K::In, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::Sub => &[K::Sub, K::NonAssocBinaryOper, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::Div => &[K::Div, K::NonAssocBinaryOper, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::Mod => &[K::Mod, K::NonAssocBinaryOper, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::And => &[K::And, K::CompoundOper, K::ComparableExpr, K::Expr],
            K::Or => &[K::Or, K::CompoundOper, K::ComparableExpr, K::Expr],
            K::Add => &[K::Add, K::CompoundOper, K::ComparableExpr, K::Expr],
            K::Mul => &[K::Mul, K::CompoundOper, K::ComparableExpr, K::Expr],
            K::Union => &[K::Union, K::SetExpr, K::Expr],
            K::Intersect => &[K::Intersect, K::SetExpr, K::Expr],
            K::Except => &[K::Except, K::SetExpr, K::Expr],
            K::Select => &[K::Select, K::Expr],
            K::Insert => &[K::Insert, K::Expr],
            K::Update => &[K::Update, K::Expr],
            K::Delete => &[K::Delete, K::Expr],
            K::Count => &[K::Count, K::FuncExpr, K::ComparableExpr, K::Expr],
            K::Func => &[K::Func, K::FuncExpr, K::ComparableExpr, K::Expr],
            K::Max => &[K::Max, K::NamedFunc, K::FuncExpr, K::ComparableExpr, K::Expr],
            K::Min => &[K::Min, K::NamedFunc, K::FuncExpr, K::ComparableExpr, K::Expr],
            K::Avg => &[K::Avg, K::NamedFunc, K::FuncExpr, K::ComparableExpr, K::Expr],
            K::Sum => &[K::Sum, K::NamedFunc, K::FuncExpr, K::ComparableExpr, K::Expr],
            K::Lower => &[K::Lower, K::NamedFunc, K::FuncExpr, K::ComparableExpr, K::Expr],
            K::Upper => &[K::Upper, K::NamedFunc, K::FuncExpr, K::ComparableExpr, K::Expr],
            K::Not => &[K::Not, K::PrefixExpr, K::Expr],
            K::Exists => &[K::Exists, K::PrefixExpr, K::Expr],
            K::Asc => &[K::Asc, K::SuffixExpr, K::Expr],
            K::Desc => &[K::Desc, K::SuffixExpr, K::Expr],
            K::Expr => &[K::Expr],
            K::ComparableExpr => &[K::ComparableExpr, K::Expr],
            K::FromExpr => &[K::FromExpr, K::Expr],
            K::JoinExpr => &[K::JoinExpr, K::FromExpr, K::Expr],
            K::BinaryOper => &[K::BinaryOper, K::ComparableExpr, K::Expr],
            K::NonAssocBinaryOper => &[K::NonAssocBinaryOper, K::BinaryOper, K::ComparableExpr, K::Expr],
            K::CompoundOper => &[K::CompoundOper, K::ComparableExpr, K::Expr],
            K::SetExpr => &[K::SetExpr, K::Expr],
            K::FuncExpr => &[K::FuncExpr, K::ComparableExpr, K::Expr],
            K::NamedFunc => &[K::NamedFunc, K::FuncExpr, K::ComparableExpr, K::Expr],
            K::PrefixExpr => &[K::PrefixExpr, K::Expr],
            K::SuffixExpr => &[K::SuffixExpr, K::Expr],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Columns and sources
// ---------------------------------------------------------------------------

/// A column, optionally linked to the table-like node that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub table: Option<Arc<Expr>>,
    /// Wraps raw values compared against this column
    #[serde(skip)]
    pub variable_factory: VariableFactory,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            variable_factory: VariableFactory::default(),
        }
    }

    /// Link this column to its owning table, alias or raw table name.
    pub fn of(mut self, table: impl Into<Expr>) -> Self {
        self.table = Some(Arc::new(table.into()));
        self
    }

    pub fn with_factory(mut self, factory: VariableFactory) -> Self {
        self.variable_factory = factory;
        self
    }
}

/// A named table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

static ALIAS_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A from-expression renamed with `AS`.
///
/// Aliases built without a name get `_<hex>` from a process-wide counter, so
/// two unnamed aliases never collide within a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    pub expr: Expr,
    pub name: String,
}

impl Alias {
    pub fn new(expr: impl Into<Expr>) -> Self {
        let id = ALIAS_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        Self {
            expr: expr.into(),
            name: format!("_{:x}", id),
        }
    }

    pub fn named(expr: impl Into<Expr>, name: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Join,
    LeftJoin,
    RightJoin,
    NaturalJoin,
    NaturalLeftJoin,
    NaturalRightJoin,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Join => "JOIN",
            JoinKind::LeftJoin => "LEFT JOIN",
            JoinKind::RightJoin => "RIGHT JOIN",
            JoinKind::NaturalJoin => "NATURAL JOIN",
            JoinKind::NaturalLeftJoin => "NATURAL LEFT JOIN",
            JoinKind::NaturalRightJoin => "NATURAL RIGHT JOIN",
        }
    }

    pub fn node_kind(self) -> NodeKind {
        match self {
            JoinKind::Join => NodeKind::Join,
            JoinKind::LeftJoin => NodeKind::LeftJoin,
            JoinKind::RightJoin => NodeKind::RightJoin,
            JoinKind::NaturalJoin => NodeKind::NaturalJoin,
            JoinKind::NaturalLeftJoin => NodeKind::NaturalLeftJoin,
            JoinKind::NaturalRightJoin => NodeKind::NaturalRightJoin,
        }
    }
}

/// A join. Without a left side it extends the implicit table list
/// (`FROM a JOIN b ON ...`); with one it is a self-contained two-sided join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinExpr {
    pub kind: JoinKind,
    pub left: Option<Expr>,
    pub right: Expr,
    pub on: Option<Expr>,
}

impl JoinExpr {
    pub fn new(kind: JoinKind, right: impl Into<Expr>) -> Self {
        Self {
            kind,
            left: None,
            right: right.into(),
            on: None,
        }
    }

    pub fn between(kind: JoinKind, left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self {
            kind,
            left: Some(left.into()),
            right: right.into(),
            on: None,
        }
    }

    pub fn on(mut self, condition: impl Into<Expr>) -> Self {
        self.on = Some(condition.into());
        self
    }

    /// Build a join from positional arguments.
    ///
    /// With one argument it is the right side. With two, the second is the
    /// right side when it names a source (table, alias, join or text) and
    /// the ON condition otherwise; in the latter case an explicit `on` is
    /// rejected.
    pub fn from_args(kind: JoinKind, arg1: Expr, arg2: Option<Expr>, on: Option<Expr>) -> Result<Self> {
        match arg2 {
            None => Ok(Self {
                kind,
                left: None,
                right: arg1,
                on,
            }),
            Some(arg2) if arg2.is_from_source() => Ok(Self {
                kind,
                left: Some(arg1),
                right: arg2,
                on,
            }),
            Some(arg2) => {
                if let Some(on) = on {
                    return Err(Error::expression(format!(
                        "Improper join arguments: ({:?}, {:?}, {:?})",
                        arg1, arg2, on
                    )));
                }
                Ok(Self {
                    kind,
                    left: None,
                    right: arg1,
                    on: Some(arg2),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    RShift,
    LShift,
    Like,
    In,
    Sub,
    Div,
    Mod,
}

impl BinaryOp {
    /// Operator text as spliced between the operands in SQL.
    pub fn sql_token(self) -> &'static str {
        match self {
            BinaryOp::Eq => " = ",
            BinaryOp::Ne => " != ",
            BinaryOp::Gt => " > ",
            BinaryOp::Ge => " >= ",
            BinaryOp::Lt => " < ",
            BinaryOp::Le => " <= ",
            BinaryOp::RShift => ">>",
            BinaryOp::LShift => "<<",
            BinaryOp::Like => " LIKE ",
            BinaryOp::In => " IN ",
            BinaryOp::Sub => "-",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }

    /// Whether `a op (b op c)` differs from `(a op b) op c`.
    pub fn is_non_associative(self) -> bool {
        matches!(self, BinaryOp::Sub | BinaryOp::Div | BinaryOp::Mod)
    }

    pub fn node_kind(self) -> NodeKind {
        match self {
            BinaryOp::Eq => NodeKind::Eq,
            BinaryOp::Ne => NodeKind::Ne,
            BinaryOp::Gt => NodeKind::Gt,
            BinaryOp::Ge => NodeKind::Ge,
            BinaryOp::Lt => NodeKind::Lt,
            BinaryOp::Le => NodeKind::Le,
            BinaryOp::RShift => NodeKind::RShift,
            BinaryOp::LShift => NodeKind::LShift,
            BinaryOp::Like => NodeKind::Like,
            BinaryOp::In => NodeKind::In,
            BinaryOp::Sub => NodeKind::Sub,
            BinaryOp::Div => NodeKind::Div,
            BinaryOp::Mod => NodeKind::Mod,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryOperator {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
}

impl BinaryOperator {
    pub fn new(op: BinaryOp, left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self {
            op,
            left: left.into(),
            right: right.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompoundOp {
    And,
    Or,
    Add,
    Mul,
}

impl CompoundOp {
    pub fn sql_token(self) -> &'static str {
        match self {
            CompoundOp::And => " AND ",
            CompoundOp::Or => " OR ",
            CompoundOp::Add => "+",
            CompoundOp::Mul => "*",
        }
    }

    pub fn node_kind(self) -> NodeKind {
        match self {
            CompoundOp::And => NodeKind::And,
            CompoundOp::Or => NodeKind::Or,
            CompoundOp::Add => NodeKind::Add,
            CompoundOp::Mul => NodeKind::Mul,
        }
    }
}

/// An associative n-ary operator over a flat operand list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundOperator {
    pub op: CompoundOp,
    pub operands: Vec<Expr>,
}

impl CompoundOperator {
    pub fn new<I, T>(op: CompoundOp, operands: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Self {
            op,
            operands: operands.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Set operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOp {
    Union,
    Intersect,
    Except,
}

impl SetOp {
    pub fn sql_token(self) -> &'static str {
        match self {
            SetOp::Union => " UNION ",
            SetOp::Intersect => " INTERSECT ",
            SetOp::Except => " EXCEPT ",
        }
    }

    pub fn node_kind(self) -> NodeKind {
        match self {
            SetOp::Union => NodeKind::Union,
            SetOp::Intersect => NodeKind::Intersect,
            SetOp::Except => NodeKind::Except,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetOperation {
    pub op: SetOp,
    pub arms: Vec<Expr>,
    pub all: bool,
    pub order_by: Option<Expr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SetOperation {
    pub fn new<I, T>(op: SetOp, arms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Self {
            op,
            arms: arms.into_iter().map(Into::into).collect(),
            all: false,
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    pub fn union<I, T>(arms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Self::new(SetOp::Union, arms)
    }

    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    pub fn order_by(mut self, order_by: impl Into<Expr>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// A `SELECT` statement.
///
/// The FROM clause comes from `tables` when given, otherwise from the tables
/// of columns referenced anywhere in the statement, otherwise from
/// `default_tables`. Without any of them no FROM clause is emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Select {
    pub columns: Expr,
    #[serde(rename = "where")]
    pub where_: Option<Expr>,
    pub tables: Option<Expr>,
    pub default_tables: Option<Expr>,
    pub order_by: Option<Expr>,
    pub group_by: Option<Expr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
}

impl Select {
    pub fn new(columns: impl Into<Expr>) -> Self {
        Self {
            columns: columns.into(),
            where_: None,
            tables: None,
            default_tables: None,
            order_by: None,
            group_by: None,
            limit: None,
            offset: None,
            distinct: false,
        }
    }

    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.where_ = Some(condition.into());
        self
    }

    pub fn tables(mut self, tables: impl Into<Expr>) -> Self {
        self.tables = Some(tables.into());
        self
    }

    pub fn default_tables(mut self, tables: impl Into<Expr>) -> Self {
        self.default_tables = Some(tables.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<Expr>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn group_by(mut self, group_by: impl Into<Expr>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insert {
    pub columns: Expr,
    pub values: Expr,
    pub table: Option<Expr>,
    pub default_table: Option<Expr>,
}

impl Insert {
    pub fn new(columns: impl Into<Expr>, values: impl Into<Expr>) -> Self {
        Self {
            columns: columns.into(),
            values: values.into(),
            table: None,
            default_table: None,
        }
    }

    pub fn table(mut self, table: impl Into<Expr>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn default_table(mut self, table: impl Into<Expr>) -> Self {
        self.default_table = Some(table.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    /// Ordered `column = value` assignments
    pub set: Vec<(Expr, Expr)>,
    #[serde(rename = "where")]
    pub where_: Option<Expr>,
    pub table: Option<Expr>,
    pub default_table: Option<Expr>,
}

impl Update {
    pub fn new<I, C, V>(set: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: Into<Expr>,
        V: Into<Expr>,
    {
        Self {
            set: set.into_iter().map(|(c, v)| (c.into(), v.into())).collect(),
            where_: None,
            table: None,
            default_table: None,
        }
    }

    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.where_ = Some(condition.into());
        self
    }

    pub fn table(mut self, table: impl Into<Expr>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn default_table(mut self, table: impl Into<Expr>) -> Self {
        self.default_table = Some(table.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delete {
    #[serde(rename = "where")]
    pub where_: Option<Expr>,
    pub table: Option<Expr>,
    pub default_table: Option<Expr>,
}

impl Delete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.where_ = Some(condition.into());
        self
    }

    pub fn table(mut self, table: impl Into<Expr>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn default_table(mut self, table: impl Into<Expr>) -> Self {
        self.default_table = Some(table.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionName {
    /// Any function, called by the given name
    Named(String),
    Max,
    Min,
    Avg,
    Sum,
    Lower,
    Upper,
}

impl FunctionName {
    pub fn as_str(&self) -> &str {
        match self {
            FunctionName::Named(name) => name,
            FunctionName::Max => "MAX",
            FunctionName::Min => "MIN",
            FunctionName::Avg => "AVG",
            FunctionName::Sum => "SUM",
            FunctionName::Lower => "LOWER",
            FunctionName::Upper => "UPPER",
        }
    }

    pub fn node_kind(&self) -> NodeKind {
        match self {
            FunctionName::Named(_) => NodeKind::Func,
            FunctionName::Max => NodeKind::Max,
            FunctionName::Min => NodeKind::Min,
            FunctionName::Avg => NodeKind::Avg,
            FunctionName::Sum => NodeKind::Sum,
            FunctionName::Lower => NodeKind::Lower,
            FunctionName::Upper => NodeKind::Upper,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: FunctionName,
    pub args: Vec<Expr>,
}

impl Function {
    pub fn new<I, T>(name: FunctionName, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Self {
            name,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A call to an arbitrary function by name.
    pub fn call<I, T>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Self::new(FunctionName::Named(name.into()), args)
    }
}

/// `COUNT(*)`, `COUNT(col)` or `COUNT(DISTINCT col)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Count {
    pub column: Option<Expr>,
    pub distinct: bool,
}

impl Count {
    /// `COUNT(*)`
    pub fn all() -> Self {
        Self {
            column: None,
            distinct: false,
        }
    }

    pub fn of(column: impl Into<Expr>) -> Self {
        Self {
            column: Some(column.into()),
            distinct: false,
        }
    }

    pub fn distinct(column: impl Into<Expr>) -> Self {
        Self {
            column: Some(column.into()),
            distinct: true,
        }
    }

    /// Build from optional parts, rejecting a distinct count without column.
    pub fn try_new(column: Option<Expr>, distinct: bool) -> Result<Self> {
        if distinct && column.is_none() {
            return Err(Error::expression("Must specify column when using distinct count"));
        }
        Ok(Self { column, distinct })
    }
}

// ---------------------------------------------------------------------------
// Decorators and raw SQL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixOp {
    Not,
    Exists,
}

impl PrefixOp {
    pub fn keyword(self) -> &'static str {
        match self {
            PrefixOp::Not => "NOT",
            PrefixOp::Exists => "EXISTS",
        }
    }

    pub fn node_kind(self) -> NodeKind {
        match self {
            PrefixOp::Not => NodeKind::Not,
            PrefixOp::Exists => NodeKind::Exists,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prefixed {
    pub op: PrefixOp,
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuffixOp {
    Asc,
    Desc,
}

impl SuffixOp {
    pub fn keyword(self) -> &'static str {
        match self {
            SuffixOp::Asc => "ASC",
            SuffixOp::Desc => "DESC",
        }
    }

    pub fn node_kind(self) -> NodeKind {
        match self {
            SuffixOp::Asc => NodeKind::Asc,
            SuffixOp::Desc => NodeKind::Desc,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suffixed {
    pub op: SuffixOp,
    pub expr: Expr,
}

/// Raw SQL text that still takes part in parameter and table collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sql {
    pub text: String,
    /// Bind parameters, expected to be a [`Expr::List`]
    pub params: Option<Expr>,
    /// Table implied by the text, added to the inferred tables
    pub tables: Option<Expr>,
}

impl Sql {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: None,
            tables: None,
        }
    }

    pub fn params(mut self, params: impl Into<Expr>) -> Self {
        self.params = Some(params.into());
        self
    }

    pub fn tables(mut self, tables: impl Into<Expr>) -> Self {
        self.tables = Some(tables.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

impl From<Variable> for Expr {
    fn from(variable: Variable) -> Self {
        Expr::Variable(variable)
    }
}

impl From<Column> for Expr {
    fn from(column: Column) -> Self {
        Expr::Column(column)
    }
}

impl From<Table> for Expr {
    fn from(table: Table) -> Self {
        Expr::Table(table)
    }
}

impl From<Alias> for Expr {
    fn from(alias: Alias) -> Self {
        Expr::Alias(Box::new(alias))
    }
}

impl From<JoinExpr> for Expr {
    fn from(join: JoinExpr) -> Self {
        Expr::Join(Box::new(join))
    }
}

impl From<BinaryOperator> for Expr {
    fn from(op: BinaryOperator) -> Self {
        Expr::Binary(Box::new(op))
    }
}

impl From<CompoundOperator> for Expr {
    fn from(op: CompoundOperator) -> Self {
        Expr::Compound(op)
    }
}

impl From<SetOperation> for Expr {
    fn from(set: SetOperation) -> Self {
        Expr::SetOperation(Box::new(set))
    }
}

impl From<Select> for Expr {
    fn from(select: Select) -> Self {
        Expr::Select(Box::new(select))
    }
}

impl From<Insert> for Expr {
    fn from(insert: Insert) -> Self {
        Expr::Insert(Box::new(insert))
    }
}

impl From<Update> for Expr {
    fn from(update: Update) -> Self {
        Expr::Update(Box::new(update))
    }
}

impl From<Delete> for Expr {
    fn from(delete: Delete) -> Self {
        Expr::Delete(Box::new(delete))
    }
}

impl From<Function> for Expr {
    fn from(func: Function) -> Self {
        Expr::Function(func)
    }
}

impl From<Count> for Expr {
    fn from(count: Count) -> Self {
        Expr::Count(Box::new(count))
    }
}

impl From<Sql> for Expr {
    fn from(sql: Sql) -> Self {
        Expr::Sql(Box::new(sql))
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(Value::from(value))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(Value::Str(value))
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Literal(Value::Bool(value))
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Literal(Value::Int(value))
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Literal(Value::from(value))
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Expr::Literal(Value::from(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Literal(Value::Float(value))
    }
}

impl From<NaiveDateTime> for Expr {
    fn from(value: NaiveDateTime) -> Self {
        Expr::Literal(Value::DateTime(value))
    }
}

impl From<NaiveDate> for Expr {
    fn from(value: NaiveDate) -> Self {
        Expr::Literal(Value::Date(value))
    }
}

impl From<NaiveTime> for Expr {
    fn from(value: NaiveTime) -> Self {
        Expr::Literal(Value::Time(value))
    }
}

impl From<TimeDelta> for Expr {
    fn from(value: TimeDelta) -> Self {
        Expr::Literal(Value::Interval(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Expr::Literal(Value::from(value))
    }
}

impl<T: Into<Expr>> From<Vec<T>> for Expr {
    fn from(items: Vec<T>) -> Self {
        Expr::list(items)
    }
}

impl<T: Into<Expr>, const N: usize> From<[T; N]> for Expr {
    fn from(items: [T; N]) -> Self {
        Expr::list(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lineage_starts_with_kind() {
        for kind in [NodeKind::Sub, NodeKind::Max, NodeKind::LeftJoin, NodeKind::Literal] {
            assert_eq!(kind.lineage()[0], kind);
        }
        assert_eq!(
            NodeKind::Sub.lineage(),
            &[
                NodeKind::Sub,
                NodeKind::NonAssocBinaryOper,
                NodeKind::BinaryOper,
                NodeKind::ComparableExpr,
                NodeKind::Expr
            ]
        );
    }

    #[test]
    fn test_alias_auto_names_are_unique() {
        let a = Alias::new(Table::new("t"));
        let b = Alias::new(Table::new("t"));
        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with('_'));
        let parse = |name: &str| u64::from_str_radix(&name[1..], 16).unwrap();
        assert!(parse(&b.name) > parse(&a.name));
    }

    #[test]
    fn test_join_from_args_disambiguates() {
        let join = JoinExpr::from_args(JoinKind::Join, Table::new("a").into(), Some(Table::new("b").into()), None)
            .unwrap();
        assert!(join.left.is_some());
        assert!(join.on.is_none());

        let join = JoinExpr::from_args(JoinKind::Join, Table::new("b").into(), Some(Expr::raw("x = y")), None)
            .unwrap();
        assert!(join.left.is_some());

        let cond: Expr = BinaryOperator::new(BinaryOp::Eq, Column::new("x"), Column::new("y")).into();
        let join = JoinExpr::from_args(JoinKind::Join, Table::new("b").into(), Some(cond.clone()), None).unwrap();
        assert!(join.left.is_none());
        assert!(join.on.is_some());

        let err = JoinExpr::from_args(JoinKind::Join, Table::new("b").into(), Some(cond.clone()), Some(cond))
            .unwrap_err();
        assert!(matches!(err, Error::Expression(_)));
    }

    #[test]
    fn test_distinct_count_requires_column() {
        let err = Count::try_new(None, true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expression error: Must specify column when using distinct count"
        );
        assert!(Count::try_new(None, false).is_ok());
    }
}
