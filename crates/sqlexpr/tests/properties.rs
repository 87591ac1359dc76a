//! Property Tests
//!
//! Placeholder/parameter correspondence and arithmetic grouping over
//! generated trees.

use proptest::prelude::*;
use sqlexpr::builder::{and_all, col, table};
use sqlexpr::{Alias, Column, Expr, Select, Table, Value};

fn arithmetic() -> impl Strategy<Value = (Expr, i64)> {
    let leaf = (-50i64..50).prop_map(|v| (Expr::literal(v), v));
    leaf.prop_recursive(4, 16, 2, |inner| {
        (inner.clone(), inner, any::<bool>()).prop_map(|((left, lv), (right, rv), add)| {
            if add {
                (left + right, lv + rv)
            } else {
                (left - right, lv - rv)
            }
        })
    })
}

proptest! {
    #[test]
    fn parameters_follow_placeholders(
        values in proptest::collection::vec(any::<i64>(), 1..12),
        prefix in any::<i64>(),
        inner_value in any::<i64>(),
    ) {
        let inner = Select::new(col("id")).where_(col("x").eq(inner_value)).tables(table("s"));
        let sq = Alias::named(inner, "sq");
        let conditions = values.iter().enumerate().map(|(i, v)| {
            let column: Expr = if i % 2 == 0 {
                Column::new(format!("c{i}")).of(sq.clone()).into()
            } else {
                Column::new(format!("c{i}")).of(Table::new(format!("t{}", i % 3))).into()
            };
            column.eq(*v)
        });
        let query = Select::new(vec![Expr::literal(prefix)]).where_(and_all(conditions).unwrap());

        let (text, params) = sqlexpr::compile(&query.into()).unwrap();
        prop_assert_eq!(text.matches('?').count(), params.len());

        let mut expected = vec![Value::Int(prefix), Value::Int(inner_value)];
        expected.extend(values.iter().copied().map(Value::Int));
        let actual: Vec<Value> = params.into_iter().map(|p| p.into_value()).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn arithmetic_evaluates_like_native((expr, expected) in arithmetic()) {
        let predicate = sqlexpr::compile_predicate(&expr).unwrap();
        prop_assert_eq!(predicate.evaluate(|_| Value::Null).unwrap(), Value::Int(expected));

        let (text, params) = sqlexpr::compile(&expr).unwrap();
        prop_assert_eq!(text.matches('?').count(), params.len());
    }
}
