//! Serialization Tests
//!
//! Expression trees stored as JSON compile to the same SQL after reloading.

mod common;

use common::column_of;
use sqlexpr::builder::{col, table};
use sqlexpr::{Alias, Column, Expr, Select, Value, Variable, VariableFactory, VariableKind};

fn roundtrip(expr: &Expr) -> Expr {
    let json = serde_json::to_string(expr).expect("serialize");
    serde_json::from_str(&json).expect("deserialize")
}

#[test]
fn test_select_roundtrip_compiles_identically() {
    let sq = Alias::named(Select::new(col("id")).where_(col("x").gt(7)).tables(table("s")), "sq");
    let query: Expr = Select::new([Column::new("id").of(sq).into(), column_of("t", "name")])
        .where_(column_of("t", "age").ge(18).and(col("deleted").eq(Expr::null())))
        .order_by(col("name").desc())
        .limit(3)
        .into();

    let reloaded = roundtrip(&query);
    assert_eq!(sqlexpr::compile(&reloaded).unwrap(), sqlexpr::compile(&query).unwrap());
}

#[test]
fn test_variable_kind_survives() {
    let price = Column::new("price").with_factory(VariableFactory::of_kind(VariableKind::Float));
    let expr = Expr::from(price).eq(3);
    let (_, params) = sqlexpr::compile(&roundtrip(&expr)).unwrap();
    assert_eq!(params, vec![Variable::typed(VariableKind::Float, 3)]);
}

#[test]
fn test_value_tagging() {
    let json = serde_json::to_value(Value::Int(5)).unwrap();
    assert_eq!(json, serde_json::json!({"type": "int", "value": 5}));
    let interval = Value::Interval(chrono::TimeDelta::milliseconds(1500));
    let back: Value = serde_json::from_value(serde_json::to_value(&interval).unwrap()).unwrap();
    assert_eq!(back, interval);
}
