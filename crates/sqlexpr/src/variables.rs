//! Typed bind variables.
//!
//! A [`Variable`] is the value handed to the database layer for each `?`
//! placeholder. The marshalling to and from the wire lives outside this
//! crate; here a variable is only a raw [`Value`] tagged with the kind of
//! column it was produced for.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared kind of a bind variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// No declared kind; the value is passed through as-is
    Generic,
    Chars,
    Unicode,
    Int,
    Float,
    Bool,
    DateTime,
    Date,
    Time,
    TimeDelta,
}

/// A typed bind value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    kind: VariableKind,
    value: Value,
}

impl Variable {
    /// Wrap a value without declaring a kind.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            kind: VariableKind::Generic,
            value: value.into(),
        }
    }

    pub fn typed(kind: VariableKind, value: impl Into<Value>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Wrap a literal, picking the kind from the value itself.
    pub fn from_value(value: Value) -> Self {
        let kind = match &value {
            Value::Null => VariableKind::Generic,
            Value::Bool(_) => VariableKind::Bool,
            Value::Int(_) => VariableKind::Int,
            Value::Float(_) => VariableKind::Float,
            Value::Str(_) => VariableKind::Unicode,
            Value::Bytes(_) => VariableKind::Chars,
            Value::DateTime(_) => VariableKind::DateTime,
            Value::Date(_) => VariableKind::Date,
            Value::Time(_) => VariableKind::Time,
            Value::Interval(_) => VariableKind::TimeDelta,
        };
        Self { kind, value }
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// The raw value held by this variable.
    pub fn get(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Builds variables for raw values compared against a column.
///
/// Columns carry a factory so that `column.eq(5)` binds the value with the
/// column's declared kind instead of a generic one.
#[derive(Clone, Copy)]
pub struct VariableFactory(fn(Value) -> Variable);

impl VariableFactory {
    pub const fn new(build: fn(Value) -> Variable) -> Self {
        Self(build)
    }

    /// A factory that always declares the given kind.
    pub fn of_kind(kind: VariableKind) -> Self {
        fn generic(value: Value) -> Variable {
            Variable::new(value)
        }
        fn chars(value: Value) -> Variable {
            Variable::typed(VariableKind::Chars, value)
        }
        fn unicode(value: Value) -> Variable {
            Variable::typed(VariableKind::Unicode, value)
        }
        fn int(value: Value) -> Variable {
            Variable::typed(VariableKind::Int, value)
        }
        fn float(value: Value) -> Variable {
            Variable::typed(VariableKind::Float, value)
        }
        fn boolean(value: Value) -> Variable {
            Variable::typed(VariableKind::Bool, value)
        }
        fn datetime(value: Value) -> Variable {
            Variable::typed(VariableKind::DateTime, value)
        }
        fn date(value: Value) -> Variable {
            Variable::typed(VariableKind::Date, value)
        }
        fn time(value: Value) -> Variable {
            Variable::typed(VariableKind::Time, value)
        }
        fn timedelta(value: Value) -> Variable {
            Variable::typed(VariableKind::TimeDelta, value)
        }

        Self(match kind {
            VariableKind::Generic => generic,
            VariableKind::Chars => chars,
            VariableKind::Unicode => unicode,
            VariableKind::Int => int,
            VariableKind::Float => float,
            VariableKind::Bool => boolean,
            VariableKind::DateTime => datetime,
            VariableKind::Date => date,
            VariableKind::Time => time,
            VariableKind::TimeDelta => timedelta,
        })
    }

    pub fn build(&self, value: Value) -> Variable {
        (self.0)(value)
    }
}

impl Default for VariableFactory {
    fn default() -> Self {
        Self::of_kind(VariableKind::Generic)
    }
}

impl fmt::Debug for VariableFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VariableFactory")
    }
}
