//! Common helpers for the compile tests

#![allow(dead_code)]

use sqlexpr::{Column, Expr, Table, Value};

/// Compile with the default registry and keep only the raw parameter values.
pub fn sql(expr: impl Into<Expr>) -> (String, Vec<Value>) {
    let (text, params) = sqlexpr::compile(&expr.into()).expect("compile failed");
    (text, params.into_iter().map(|p| p.into_value()).collect())
}

/// A column linked to a named table.
pub fn column_of(table: &str, name: &str) -> Expr {
    Column::new(name).of(Table::new(table)).into()
}

pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}
