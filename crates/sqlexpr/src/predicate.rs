//! In-process predicates.
//!
//! The predicate registry compiles the same expression trees as the SQL
//! generator, but into a [`Pred`] tree that is evaluated against a row
//! through a `get_column(name)` lookup instead of being sent to a database.
//! A compiled tree renders as a Python-like expression, which is what the
//! precedence tables below are tuned for:
//!
//! ```
//! use sqlexpr::builder::col;
//! use sqlexpr::Value;
//!
//! let cond = col("age").ge(18).and(col("name").ne("bob"));
//! let predicate = sqlexpr::compile_predicate(&cond).unwrap();
//! assert_eq!(
//!     predicate.to_string(),
//!     "get_column('age') >= 18 and get_column('name') != 'bob'"
//! );
//!
//! let row = |name: &str| match name {
//!     "age" => Value::Int(30),
//!     _ => Value::from("alice"),
//! };
//! assert!(predicate.matches(row).unwrap());
//! ```
//!
//! Only comparisons, arithmetic, `IN`, `AND`/`OR`, columns and values are
//! supported. Anything else, raw SQL included, fails at compile time with
//! [`Error::Unsupported`].

use crate::compiler::{Compiler, Fragment};
use crate::error::{Error, Result};
use crate::expressions::{BinaryOp, CompoundOp, Expr, NodeKind};
use crate::state::Precedence;
use crate::value::Value;
use chrono::{Datelike, TimeDelta, Timelike};
use std::cmp::Ordering;
use std::fmt;

/// Operators a predicate can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    RShift,
    LShift,
    In,
    Sub,
    Div,
    Mod,
    And,
    Or,
    Add,
    Mul,
}

impl PredOp {
    pub fn token(self) -> &'static str {
        match self {
            PredOp::Eq => " == ",
            PredOp::Ne => " != ",
            PredOp::Gt => " > ",
            PredOp::Ge => " >= ",
            PredOp::Lt => " < ",
            PredOp::Le => " <= ",
            PredOp::RShift => ">>",
            PredOp::LShift => "<<",
            PredOp::In => " in ",
            PredOp::Sub => "-",
            PredOp::Div => "/",
            PredOp::Mod => "%",
            PredOp::And => " and ",
            PredOp::Or => " or ",
            PredOp::Add => "+",
            PredOp::Mul => "*",
        }
    }

    fn from_binary(op: BinaryOp) -> Result<Self> {
        Ok(match op {
            BinaryOp::Eq => PredOp::Eq,
            BinaryOp::Ne => PredOp::Ne,
            BinaryOp::Gt => PredOp::Gt,
            BinaryOp::Ge => PredOp::Ge,
            BinaryOp::Lt => PredOp::Lt,
            BinaryOp::Le => PredOp::Le,
            BinaryOp::RShift => PredOp::RShift,
            BinaryOp::LShift => PredOp::LShift,
            BinaryOp::In => PredOp::In,
            BinaryOp::Sub => PredOp::Sub,
            BinaryOp::Div => PredOp::Div,
            BinaryOp::Mod => PredOp::Mod,
            BinaryOp::Like => return Err(unsupported(NodeKind::Like)),
        })
    }

    fn from_compound(op: CompoundOp) -> Self {
        match op {
            CompoundOp::And => PredOp::And,
            CompoundOp::Or => PredOp::Or,
            CompoundOp::Add => PredOp::Add,
            CompoundOp::Mul => PredOp::Mul,
        }
    }
}

/// A compiled predicate node.
#[derive(Debug, Clone, PartialEq)]
pub enum Pred {
    Literal(Value),
    /// Value looked up from the row by column name
    Column(String),
    Binary {
        op: PredOp,
        left: Box<Pred>,
        right: Box<Pred>,
    },
    Compound {
        op: PredOp,
        operands: Vec<Pred>,
    },
    /// Candidates of an `in` test
    Tuple(Vec<Pred>),
    /// Parenthesized subexpression
    Group(Box<Pred>),
}

impl Fragment for Pred {
    fn raw(text: &str) -> Result<Self> {
        Err(Error::unsupported(format!(
            "Can't compile raw SQL into a predicate: {:?}",
            text
        )))
    }

    fn group(self) -> Self {
        Pred::Group(Box::new(self))
    }

    fn join(parts: Vec<Self>, _separator: &str) -> Self {
        Pred::Tuple(parts)
    }
}

impl fmt::Display for Pred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pred::Literal(value) => f.write_str(&repr(value)),
            Pred::Column(name) => write!(f, "get_column({})", repr_str(name)),
            Pred::Binary {
                op: PredOp::In,
                left,
                right,
            } => write!(f, "{} in ({},)", left, right),
            Pred::Binary { op, left, right } => write!(f, "{}{}{}", left, op.token(), right),
            Pred::Compound { op, operands } => write_joined(f, operands, op.token()),
            Pred::Tuple(items) => write_joined(f, items, ", "),
            Pred::Group(inner) => write!(f, "({})", inner),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Pred], separator: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Literal representation
// ---------------------------------------------------------------------------

/// Exponents carry a sign and at least two digits: `1e+20`, `1e-05`.
fn repr_float(x: f64) -> String {
    let text = format!("{:?}", x);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

fn repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) if x.is_nan() => "nan".to_string(),
        Value::Float(x) if x.is_infinite() => (if *x > 0.0 { "inf" } else { "-inf" }).to_string(),
        Value::Float(x) => repr_float(*x),
        Value::Str(s) => repr_str(s),
        Value::Bytes(bytes) => {
            let mut out = String::from("b'");
            for &byte in bytes {
                match byte {
                    b'\\' => out.push_str("\\\\"),
                    b'\'' => out.push_str("\\'"),
                    b'\n' => out.push_str("\\n"),
                    b'\r' => out.push_str("\\r"),
                    b'\t' => out.push_str("\\t"),
                    0x20..=0x7e => out.push(byte as char),
                    _ => out.push_str(&format!("\\x{:02x}", byte)),
                }
            }
            out.push('\'');
            out
        }
        Value::DateTime(dt) => {
            let mut parts = vec![
                dt.year().to_string(),
                dt.month().to_string(),
                dt.day().to_string(),
            ];
            parts.extend(clock_parts(dt.hour(), dt.minute(), dt.second(), dt.nanosecond() / 1000));
            format!("datetime.datetime({})", parts.join(", "))
        }
        Value::Date(d) => format!("datetime.date({}, {}, {})", d.year(), d.month(), d.day()),
        Value::Time(t) => {
            let parts = clock_parts(t.hour(), t.minute(), t.second(), t.nanosecond() / 1000);
            format!("datetime.time({})", parts.join(", "))
        }
        Value::Interval(delta) => repr_interval(delta),
    }
}

fn repr_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Hour and minute always, seconds and microseconds only when non-zero.
fn clock_parts(hour: u32, minute: u32, second: u32, micros: u32) -> Vec<String> {
    let mut parts = vec![hour.to_string(), minute.to_string()];
    if second != 0 || micros != 0 {
        parts.push(second.to_string());
    }
    if micros != 0 {
        parts.push(micros.to_string());
    }
    parts
}

fn repr_interval(delta: &TimeDelta) -> String {
    const MICROS_PER_DAY: i128 = 86_400_000_000;
    let total = delta.num_microseconds().map(i128::from).unwrap_or_else(|| {
        i128::from(delta.num_milliseconds()) * 1000
    });
    let days = total.div_euclid(MICROS_PER_DAY);
    let rest = total.rem_euclid(MICROS_PER_DAY);
    let (seconds, micros) = (rest / 1_000_000, rest % 1_000_000);

    let mut parts = Vec::new();
    if days != 0 {
        parts.push(format!("days={}", days));
    }
    if seconds != 0 {
        parts.push(format!("seconds={}", seconds));
    }
    if micros != 0 {
        parts.push(format!("microseconds={}", micros));
    }
    if parts.is_empty() {
        return "datetime.timedelta(0)".to_string();
    }
    format!("datetime.timedelta({})", parts.join(", "))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Truthiness: null, false, zero, empty strings and zero intervals are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(x) => *x != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::Bytes(b) => !b.is_empty(),
        Value::Interval(delta) => !delta.is_zero(),
        Value::DateTime(_) | Value::Date(_) | Value::Time(_) => true,
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(x) => Some(Number::Float(*x)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(x) => x,
        }
    }
}

fn type_error(op: PredOp, left: &Value, right: &Value) -> Error {
    Error::evaluate(format!(
        "unsupported operand types for '{}': {} and {}",
        op.token().trim(),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> Error {
    Error::evaluate("integer overflow")
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (Number::of(left), Number::of(right)) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(op: PredOp, left: &Value, right: &Value) -> Result<Ordering> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Interval(a), Value::Interval(b)) => Some(a.cmp(b)),
        _ => match (Number::of(left), Number::of(right)) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
            (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
            _ => return Err(type_error(op, left, right)),
        },
    };
    // NaN compares false against everything; Less makes `>`/`>=` false but
    // not `<`, so report it as an evaluation error instead.
    ordering.ok_or_else(|| Error::evaluate("comparison with NaN"))
}

fn add(left: Value, right: Value) -> Result<Value> {
    Ok(match (&left, &right) {
        (Value::Str(a), Value::Str(b)) => Value::Str(format!("{}{}", a, b)),
        (Value::Bytes(a), Value::Bytes(b)) => Value::Bytes([a.as_slice(), b.as_slice()].concat()),
        (Value::DateTime(dt), Value::Interval(d)) | (Value::Interval(d), Value::DateTime(dt)) => {
            Value::DateTime(dt.checked_add_signed(*d).ok_or_else(overflow)?)
        }
        (Value::Date(date), Value::Interval(d)) | (Value::Interval(d), Value::Date(date)) => {
            let days = TimeDelta::days(d.num_days());
            Value::Date(date.checked_add_signed(days).ok_or_else(overflow)?)
        }
        (Value::Interval(a), Value::Interval(b)) => Value::Interval(a.checked_add(b).ok_or_else(overflow)?),
        _ => match (Number::of(&left), Number::of(&right)) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
            (Some(a), Some(b)) => Value::Float(a.as_f64() + b.as_f64()),
            _ => return Err(type_error(PredOp::Add, &left, &right)),
        },
    })
}

fn sub(left: Value, right: Value) -> Result<Value> {
    Ok(match (&left, &right) {
        (Value::DateTime(a), Value::DateTime(b)) => Value::Interval(a.signed_duration_since(*b)),
        (Value::Date(a), Value::Date(b)) => Value::Interval(a.signed_duration_since(*b)),
        (Value::DateTime(dt), Value::Interval(d)) => {
            Value::DateTime(dt.checked_sub_signed(*d).ok_or_else(overflow)?)
        }
        (Value::Date(date), Value::Interval(d)) => {
            let days = TimeDelta::days(d.num_days());
            Value::Date(date.checked_sub_signed(days).ok_or_else(overflow)?)
        }
        (Value::Interval(a), Value::Interval(b)) => Value::Interval(a.checked_sub(b).ok_or_else(overflow)?),
        _ => match (Number::of(&left), Number::of(&right)) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
            (Some(a), Some(b)) => Value::Float(a.as_f64() - b.as_f64()),
            _ => return Err(type_error(PredOp::Sub, &left, &right)),
        },
    })
}

fn mul(left: Value, right: Value) -> Result<Value> {
    Ok(match (&left, &right) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let count = usize::try_from(*n).unwrap_or(0);
            s.len()
                .checked_mul(count)
                .filter(|len| isize::try_from(*len).is_ok())
                .ok_or_else(|| Error::evaluate("repeated string is too long"))?;
            Value::Str(s.repeat(count))
        }
        (Value::Interval(d), Value::Int(n)) | (Value::Int(n), Value::Interval(d)) => {
            let n = i32::try_from(*n).map_err(|_| overflow())?;
            Value::Interval(d.checked_mul(n).ok_or_else(overflow)?)
        }
        _ => match (Number::of(&left), Number::of(&right)) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
            (Some(a), Some(b)) => Value::Float(a.as_f64() * b.as_f64()),
            _ => return Err(type_error(PredOp::Mul, &left, &right)),
        },
    })
}

/// True division: numbers always divide to a float.
fn div(left: Value, right: Value) -> Result<Value> {
    match (Number::of(&left), Number::of(&right)) {
        (Some(a), Some(b)) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(Error::evaluate("division by zero"));
            }
            Ok(Value::Float(a.as_f64() / divisor))
        }
        _ => Err(type_error(PredOp::Div, &left, &right)),
    }
}

/// Modulo taking the sign of the divisor.
fn rem(left: Value, right: Value) -> Result<Value> {
    match (Number::of(&left), Number::of(&right)) {
        (Some(_), Some(Number::Int(0))) => Err(Error::evaluate("integer division or modulo by zero")),
        (Some(Number::Int(a)), Some(Number::Int(b))) => {
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
        }
        (Some(a), Some(b)) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            if b == 0.0 {
                return Err(Error::evaluate("float modulo"));
            }
            let r = a % b;
            Ok(Value::Float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }))
        }
        _ => Err(type_error(PredOp::Mod, &left, &right)),
    }
}

fn shift(op: PredOp, left: Value, right: Value) -> Result<Value> {
    let (Some(Number::Int(a)), Some(Number::Int(b))) = (Number::of(&left), Number::of(&right)) else {
        return Err(type_error(op, &left, &right));
    };
    if b < 0 {
        return Err(Error::evaluate("negative shift count"));
    }
    let shifted = match op {
        PredOp::LShift => u32::try_from(b)
            .ok()
            .and_then(|b| a.checked_shl(b))
            .filter(|shifted| shifted >> b == a)
            .ok_or_else(overflow)?,
        _ => a >> b.min(63),
    };
    Ok(Value::Int(shifted))
}

impl Pred {
    /// Evaluate against a row.
    pub fn evaluate<F>(&self, get_column: &F) -> Result<Value>
    where
        F: Fn(&str) -> Value,
    {
        match self {
            Pred::Literal(value) => Ok(value.clone()),
            Pred::Column(name) => Ok(get_column(name)),
            Pred::Group(inner) => inner.evaluate(get_column),
            Pred::Tuple(_) => Err(Error::evaluate("a candidate list can only appear after 'in'")),
            Pred::Binary {
                op: PredOp::In,
                left,
                right,
            } => {
                let needle = left.evaluate(get_column)?;
                let candidates = match right.as_ref() {
                    Pred::Tuple(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                for candidate in candidates {
                    if values_equal(&needle, &candidate.evaluate(get_column)?) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Pred::Binary { op, left, right } => {
                let left = left.evaluate(get_column)?;
                let right = right.evaluate(get_column)?;
                apply(*op, left, right)
            }
            Pred::Compound {
                op: op @ (PredOp::And | PredOp::Or),
                operands,
            } => {
                let mut last = Value::Bool(*op == PredOp::And);
                for operand in operands {
                    last = operand.evaluate(get_column)?;
                    if truthy(&last) != (*op == PredOp::And) {
                        break;
                    }
                }
                Ok(last)
            }
            Pred::Compound { op, operands } => {
                let mut values = operands.iter().map(|operand| operand.evaluate(get_column));
                let first = values
                    .next()
                    .ok_or_else(|| Error::evaluate("operator without operands"))??;
                values.try_fold(first, |acc, value| apply(*op, acc, value?))
            }
        }
    }
}

fn apply(op: PredOp, left: Value, right: Value) -> Result<Value> {
    match op {
        PredOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        PredOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        PredOp::Gt => Ok(Value::Bool(compare(op, &left, &right)? == Ordering::Greater)),
        PredOp::Ge => Ok(Value::Bool(compare(op, &left, &right)? != Ordering::Less)),
        PredOp::Lt => Ok(Value::Bool(compare(op, &left, &right)? == Ordering::Less)),
        PredOp::Le => Ok(Value::Bool(compare(op, &left, &right)? != Ordering::Greater)),
        PredOp::RShift | PredOp::LShift => shift(op, left, right),
        PredOp::Add => add(left, right),
        PredOp::Sub => sub(left, right),
        PredOp::Mul => mul(left, right),
        PredOp::Div => div(left, right),
        PredOp::Mod => rem(left, right),
        PredOp::And => Ok(if truthy(&left) { right } else { left }),
        PredOp::Or => Ok(if truthy(&left) { left } else { right }),
        PredOp::In => Ok(Value::Bool(values_equal(&left, &right))),
    }
}

/// A compiled predicate, ready to test rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: Pred,
}

impl Predicate {
    pub fn new(expr: Pred) -> Self {
        Self { expr }
    }

    pub fn expr(&self) -> &Pred {
        &self.expr
    }

    /// Evaluate against a row, returning the raw result.
    pub fn evaluate<F>(&self, get_column: F) -> Result<Value>
    where
        F: Fn(&str) -> Value,
    {
        self.expr.evaluate(&get_column)
    }

    /// Whether the row satisfies the predicate.
    pub fn matches<F>(&self, get_column: F) -> Result<bool>
    where
        F: Fn(&str) -> Value,
    {
        self.evaluate(get_column).map(|value| truthy(&value))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expr, f)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

fn unsupported(kind: NodeKind) -> Error {
    Error::unsupported(format!("Can't compile predicates with {}", kind))
}

fn mismatch(expected: &str, expr: &Expr) -> Error {
    Error::internal(format!("{} rule applied to {} node", expected, expr.kind()))
}

impl Compiler<Pred> {
    /// Compile a tree into a [`Predicate`].
    pub fn predicate(&self, expr: &Expr) -> Result<Predicate> {
        let (pred, _) = self.compile(expr)?;
        Ok(Predicate::new(pred))
    }

    /// Compile a tree and render its predicate expression text.
    pub fn expression(&self, expr: &Expr) -> Result<String> {
        self.predicate(expr).map(|predicate| predicate.to_string())
    }
}

/// Build a registry compiling trees into predicates.
pub fn predicate_compiler() -> Compiler<Pred> {
    let compiler = Compiler::new();
    register_predicate_rules(&compiler);
    compiler
}

/// Register the predicate rules and precedences on an existing registry.
pub fn register_predicate_rules(compiler: &Compiler<Pred>) {
    compiler.register(&[NodeKind::Expr, NodeKind::Like], |_, _, expr| {
        Err(unsupported(expr.kind()))
    });

    compiler.register(&[NodeKind::Literal], |_, _, expr| match expr {
        Expr::Literal(value) => Ok(Pred::Literal(value.clone())),
        _ => Err(mismatch("literal", expr)),
    });

    compiler.register(&[NodeKind::Variable], |_, _, expr| match expr {
        Expr::Variable(variable) => Ok(Pred::Literal(variable.get().clone())),
        _ => Err(mismatch("variable", expr)),
    });

    compiler.register(&[NodeKind::Column], |_, _, expr| match expr {
        Expr::Column(column) => Ok(Pred::Column(column.name.clone())),
        _ => Err(mismatch("column", expr)),
    });

    compiler.register(&[NodeKind::BinaryOper], |c, state, expr| {
        let Expr::Binary(op) = expr else {
            return Err(mismatch("binary operator", expr));
        };
        let left = c.compile_expr(state, &op.left)?;
        let right = c.compile_expr(state, &op.right)?;
        Ok(Pred::Binary {
            op: PredOp::from_binary(op.op)?,
            left: Box::new(left),
            right: Box::new(right),
        })
    });

    compiler.register(&[NodeKind::NonAssocBinaryOper], |c, state, expr| {
        let Expr::Binary(op) = expr else {
            return Err(mismatch("binary operator", expr));
        };
        let left = c.compile_expr(state, &op.left)?;
        state.break_ties();
        let right = c.compile_expr(state, &op.right)?;
        Ok(Pred::Binary {
            op: PredOp::from_binary(op.op)?,
            left: Box::new(left),
            right: Box::new(right),
        })
    });

    compiler.register(&[NodeKind::In], |c, state, expr| {
        let Expr::Binary(op) = expr else {
            return Err(mismatch("in", expr));
        };
        let left = c.compile_expr(state, &op.left)?;
        state.precedence = Precedence::MIN;
        let right = c.compile_expr(state, &op.right)?;
        Ok(Pred::Binary {
            op: PredOp::In,
            left: Box::new(left),
            right: Box::new(right),
        })
    });

    compiler.register(&[NodeKind::CompoundOper], |c, state, expr| {
        let Expr::Compound(op) = expr else {
            return Err(mismatch("compound operator", expr));
        };
        let pred_op = PredOp::from_compound(op.op);
        let operands = c.compile_parts(state, &op.operands, pred_op.token(), false)?;
        Ok(Pred::Compound {
            op: pred_op,
            operands,
        })
    });

    use NodeKind as K;
    compiler.set_precedence(10, &[K::Or]);
    compiler.set_precedence(20, &[K::And]);
    compiler.set_precedence(30, &[K::Eq, K::Ne, K::Gt, K::Ge, K::Lt, K::Le, K::Like, K::In]);
    compiler.set_precedence(40, &[K::LShift, K::RShift]);
    compiler.set_precedence(50, &[K::Add, K::Sub]);
    compiler.set_precedence(60, &[K::Mul, K::Div, K::Mod]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn eval(op: PredOp, left: impl Into<Value>, right: impl Into<Value>) -> Result<Value> {
        apply(op, left.into(), right.into())
    }

    #[test]
    fn test_repr_literals() {
        assert_eq!(repr(&Value::Null), "None");
        assert_eq!(repr(&Value::Bool(true)), "True");
        assert_eq!(repr(&Value::Float(1.0)), "1.0");
        assert_eq!(repr(&Value::from("it's")), "'it\\'s'");
        assert_eq!(repr(&Value::Bytes(vec![b'a', 0])), "b'a\\x00'");
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(repr(&Value::Date(date)), "datetime.date(2024, 3, 1)");
        let dt = date.and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(repr(&Value::DateTime(dt)), "datetime.datetime(2024, 3, 1, 10, 30)");
        assert_eq!(
            repr(&Value::Interval(TimeDelta::seconds(-1))),
            "datetime.timedelta(days=-1, seconds=86399)"
        );
        assert_eq!(repr(&Value::Interval(TimeDelta::zero())), "datetime.timedelta(0)");
    }

    #[test]
    fn test_repr_float_exponent() {
        assert_eq!(repr(&Value::Float(1e20)), "1e+20");
        assert_eq!(repr(&Value::Float(1.5e-7)), "1.5e-07");
        assert_eq!(repr(&Value::Float(-2.5e300)), "-2.5e+300");
        assert_eq!(repr(&Value::Float(0.25)), "0.25");
    }

    #[test]
    fn test_string_repeat() {
        assert_eq!(eval(PredOp::Mul, "ab", 3).unwrap(), Value::from("ababab"));
        assert_eq!(eval(PredOp::Mul, 2, "x").unwrap(), Value::from("xx"));
        assert_eq!(eval(PredOp::Mul, "ab", -1).unwrap(), Value::from(""));
        let err = eval(PredOp::Mul, "ab", i64::MAX).unwrap_err();
        assert!(matches!(err, Error::Evaluate(_)));
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert_eq!(eval(PredOp::Eq, 1, 1.0).unwrap(), Value::Bool(true));
        assert_eq!(eval(PredOp::Eq, true, 1).unwrap(), Value::Bool(true));
        assert_eq!(eval(PredOp::Eq, "1", 1).unwrap(), Value::Bool(false));
        assert_eq!(eval(PredOp::Ne, Value::Null, 0).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_ordering_type_mismatch_errors() {
        assert_eq!(eval(PredOp::Lt, 1, 2.5).unwrap(), Value::Bool(true));
        assert_eq!(eval(PredOp::Ge, "b", "a").unwrap(), Value::Bool(true));
        let err = eval(PredOp::Lt, "a", 1).unwrap_err();
        assert!(matches!(err, Error::Evaluate(_)));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval(PredOp::Div, 7, 2).unwrap(), Value::Float(3.5));
        assert_eq!(eval(PredOp::Mod, -7, 3).unwrap(), Value::Int(2));
        assert_eq!(eval(PredOp::Mod, 7, -3).unwrap(), Value::Int(-2));
        assert_eq!(eval(PredOp::Add, "ab", "cd").unwrap(), Value::from("abcd"));
        assert_eq!(eval(PredOp::Mul, 2, 2.5).unwrap(), Value::Float(5.0));
        assert_eq!(eval(PredOp::LShift, 1, 4).unwrap(), Value::Int(16));
        assert!(matches!(eval(PredOp::Div, 1, 0), Err(Error::Evaluate(_))));
        assert!(matches!(eval(PredOp::Add, i64::MAX, 1), Err(Error::Evaluate(_))));
    }

    #[test]
    fn test_datetime_arithmetic() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let dt = date.and_hms_opt(12, 0, 0).unwrap();
        let later = eval(PredOp::Add, dt, TimeDelta::hours(24)).unwrap();
        assert_eq!(later, Value::DateTime(dt + TimeDelta::hours(24)));
        assert_eq!(
            eval(PredOp::Sub, later, dt).unwrap(),
            Value::Interval(TimeDelta::hours(24))
        );
        assert_eq!(
            eval(PredOp::Add, date, TimeDelta::days(2)).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
    }

    #[test]
    fn test_and_or_return_operands() {
        let row = |_: &str| Value::Null;
        let and = Pred::Compound {
            op: PredOp::And,
            operands: vec![Pred::Literal(Value::Int(1)), Pred::Literal(Value::from(""))],
        };
        assert_eq!(and.evaluate(&row).unwrap(), Value::from(""));
        let or = Pred::Compound {
            op: PredOp::Or,
            operands: vec![Pred::Literal(Value::Int(0)), Pred::Literal(Value::Int(7))],
        };
        assert_eq!(or.evaluate(&row).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_and_short_circuits() {
        let row = |_: &str| Value::Null;
        let and = Pred::Compound {
            op: PredOp::And,
            operands: vec![
                Pred::Literal(Value::Bool(false)),
                Pred::Tuple(Vec::new()),
            ],
        };
        assert_eq!(and.evaluate(&row).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_raw_is_unsupported() {
        let err = predicate_compiler().compile(&Expr::raw("1 = 1")).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
