//! Fluent construction of expression trees.
//!
//! Comparison and arithmetic methods on [`Expr`] consume the receiver and
//! return a new node. Raw values on the right-hand side are wrapped into bind
//! variables through the left side's [`VariableFactory`] when the left side is
//! a column, or a generic variable otherwise:
//!
//! ```
//! use sqlexpr::builder::col;
//! use sqlexpr::Expr;
//!
//! let cond = col("age").ge(18).and(col("name").ne(Expr::null()));
//! let (sql, params) = sqlexpr::compile(&cond).unwrap();
//! assert_eq!(sql, "age >= ? AND name IS NOT NULL");
//! assert_eq!(params.len(), 1);
//! ```
//!
//! `eq` and `ne` keep a null right-hand side as a `NULL` literal so it can
//! render as `IS NULL`; every other operator binds null as a variable.
//!
//! The `std::ops` operators are implemented as well: `+ - * / %` build
//! arithmetic, `& |` build `AND`/`OR`, `<< >>` build shifts and `!` builds
//! `NOT`.

use crate::expressions::{
    BinaryOp, BinaryOperator, Column, CompoundOp, CompoundOperator, Expr, Function, FunctionName,
    PrefixOp, Prefixed, SuffixOp, Suffixed, Table,
};
use crate::variables::VariableFactory;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// A column by name, not linked to any table.
pub fn col(name: &str) -> Expr {
    Expr::Column(Column::new(name))
}

/// A named table.
pub fn table(name: &str) -> Expr {
    Expr::Table(Table::new(name))
}

/// `a AND b AND ...` over all conditions, or `None` when there are none.
pub fn and_all<I, T>(conditions: I) -> Option<Expr>
where
    I: IntoIterator<Item = T>,
    T: Into<Expr>,
{
    compound_all(CompoundOp::And, conditions)
}

/// `a OR b OR ...` over all conditions, or `None` when there are none.
pub fn or_all<I, T>(conditions: I) -> Option<Expr>
where
    I: IntoIterator<Item = T>,
    T: Into<Expr>,
{
    compound_all(CompoundOp::Or, conditions)
}

fn compound_all<I, T>(op: CompoundOp, conditions: I) -> Option<Expr>
where
    I: IntoIterator<Item = T>,
    T: Into<Expr>,
{
    let mut operands: Vec<Expr> = conditions.into_iter().map(Into::into).collect();
    match operands.len() {
        0 => None,
        1 => operands.pop(),
        _ => Some(CompoundOperator { op, operands }.into()),
    }
}

/// Equality between each column and the value at the same position.
///
/// One column gives a single `col = value`; several give an `AND` of
/// equalities. Raw values are bound with each column's own factory.
/// Returns `None` when `columns` is empty.
pub fn compare_columns(columns: &[Column], values: &[Expr]) -> Option<Expr> {
    let mut equals: Vec<Expr> = columns
        .iter()
        .zip(values)
        .map(|(column, value)| {
            let value = coerce(&column.variable_factory, value.clone(), true);
            BinaryOperator::new(BinaryOp::Eq, column.clone(), value).into()
        })
        .collect();
    match equals.len() {
        0 => None,
        1 => equals.pop(),
        _ => Some(CompoundOperator::new(CompoundOp::And, equals).into()),
    }
}

/// Wrap a raw literal into a bind variable. Nodes that are already
/// expressions pass through; a null stays literal when `keep_null` is set.
fn coerce(factory: &VariableFactory, value: Expr, keep_null: bool) -> Expr {
    match value {
        Expr::Literal(v) if v.is_null() && keep_null => Expr::Literal(v),
        Expr::Literal(v) => Expr::Variable(factory.build(v)),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Comparable methods
// ---------------------------------------------------------------------------

impl Expr {
    fn variable_factory(&self) -> VariableFactory {
        match self {
            Expr::Column(column) => column.variable_factory,
            _ => VariableFactory::default(),
        }
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>, keep_null: bool) -> Expr {
        let other = coerce(&self.variable_factory(), other.into(), keep_null);
        BinaryOperator::new(op, self, other).into()
    }

    fn compound(self, op: CompoundOp, other: impl Into<Expr>) -> Expr {
        let other = coerce(&self.variable_factory(), other.into(), false);
        CompoundOperator::new(op, [self, other]).into()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Eq, other, true)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn ne(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ne, other, true)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Gt, other, false)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ge, other, false)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Lt, other, false)
    }

    pub fn le(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Le, other, false)
    }

    pub fn rshift(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::RShift, other, false)
    }

    pub fn lshift(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::LShift, other, false)
    }

    pub fn like(self, pattern: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Like, pattern, false)
    }

    pub fn and(self, other: impl Into<Expr>) -> Expr {
        self.compound(CompoundOp::And, other)
    }

    pub fn or(self, other: impl Into<Expr>) -> Expr {
        self.compound(CompoundOp::Or, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: impl Into<Expr>) -> Expr {
        self.compound(CompoundOp::Add, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Sub, other, false)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, other: impl Into<Expr>) -> Expr {
        self.compound(CompoundOp::Mul, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Div, other, false)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn rem(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Mod, other, false)
    }

    /// `self IN (values...)`, or `None` when there are no candidates.
    ///
    /// An empty candidate list can never match; callers usually short-circuit
    /// the whole condition in that case.
    pub fn is_in<I, T>(self, values: I) -> Option<Expr>
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        let factory = self.variable_factory();
        let values: Vec<Expr> = values
            .into_iter()
            .map(|value| coerce(&factory, value.into(), false))
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(BinaryOperator::new(BinaryOp::In, self, Expr::List(values)).into())
    }

    /// `self IN (<subquery>)`.
    pub fn in_select(self, subquery: impl Into<Expr>) -> Expr {
        BinaryOperator::new(BinaryOp::In, self, subquery).into()
    }

    pub fn lower(self) -> Expr {
        Function::new(FunctionName::Lower, [self]).into()
    }

    pub fn upper(self) -> Expr {
        Function::new(FunctionName::Upper, [self]).into()
    }

    pub fn asc(self) -> Expr {
        Expr::Suffix(Box::new(Suffixed {
            op: SuffixOp::Asc,
            expr: self,
        }))
    }

    pub fn desc(self) -> Expr {
        Expr::Suffix(Box::new(Suffixed {
            op: SuffixOp::Desc,
            expr: self,
        }))
    }

    pub fn not_(self) -> Expr {
        Expr::Prefix(Box::new(Prefixed {
            op: PrefixOp::Not,
            expr: self,
        }))
    }

    pub fn exists(self) -> Expr {
        Expr::Prefix(Box::new(Prefixed {
            op: PrefixOp::Exists,
            expr: self,
        }))
    }
}

// ---------------------------------------------------------------------------
// Operator overloads
// ---------------------------------------------------------------------------

impl<T: Into<Expr>> std::ops::Add<T> for Expr {
    type Output = Expr;

    fn add(self, rhs: T) -> Expr {
        Expr::add(self, rhs)
    }
}

impl<T: Into<Expr>> std::ops::Sub<T> for Expr {
    type Output = Expr;

    fn sub(self, rhs: T) -> Expr {
        Expr::sub(self, rhs)
    }
}

impl<T: Into<Expr>> std::ops::Mul<T> for Expr {
    type Output = Expr;

    fn mul(self, rhs: T) -> Expr {
        Expr::mul(self, rhs)
    }
}

impl<T: Into<Expr>> std::ops::Div<T> for Expr {
    type Output = Expr;

    fn div(self, rhs: T) -> Expr {
        Expr::div(self, rhs)
    }
}

impl<T: Into<Expr>> std::ops::Rem<T> for Expr {
    type Output = Expr;

    fn rem(self, rhs: T) -> Expr {
        Expr::rem(self, rhs)
    }
}

impl<T: Into<Expr>> std::ops::BitAnd<T> for Expr {
    type Output = Expr;

    fn bitand(self, rhs: T) -> Expr {
        self.and(rhs)
    }
}

impl<T: Into<Expr>> std::ops::BitOr<T> for Expr {
    type Output = Expr;

    fn bitor(self, rhs: T) -> Expr {
        self.or(rhs)
    }
}

impl<T: Into<Expr>> std::ops::Shl<T> for Expr {
    type Output = Expr;

    fn shl(self, rhs: T) -> Expr {
        self.lshift(rhs)
    }
}

impl<T: Into<Expr>> std::ops::Shr<T> for Expr {
    type Output = Expr;

    fn shr(self, rhs: T) -> Expr {
        self.rshift(rhs)
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        self.not_()
    }
}
