//! SQL Compilation Tests
//!
//! End-to-end rendering of expression trees into parameterized SQL.

mod common;

use common::{column_of, ints, sql};
use sqlexpr::builder::{and_all, col, table};
use sqlexpr::{
    Alias, Column, Count, Delete, Error, Expr, Function, FunctionName, Insert, JoinExpr, JoinKind,
    Select, SetOperation, Sql, Table, Update, Value,
};

// ============================================================================
// Values and Operators
// ============================================================================

mod operators {
    use super::*;

    #[test]
    fn test_literals_bind_parameters() {
        assert_eq!(sql(Expr::literal(5)), ("?".to_string(), ints(&[5])));
        assert_eq!(sql(Expr::literal("x")), ("?".to_string(), vec![Value::from("x")]));
        assert_eq!(sql(Expr::null()), ("NULL".to_string(), vec![]));
    }

    #[test]
    fn test_comparison() {
        let (text, params) = sql(col("a").ge(3));
        assert_eq!(text, "a >= ?");
        assert_eq!(params, ints(&[3]));
    }

    #[test]
    fn test_is_null() {
        assert_eq!(sql(col("a").eq(Expr::null())).0, "a IS NULL");
        assert_eq!(sql(col("a").ne(Expr::null())).0, "a IS NOT NULL");
        assert!(sql(col("a").eq(Expr::null())).1.is_empty());
    }

    #[test]
    fn test_non_associative_grouping() {
        assert_eq!(sql(col("a") - col("b") - col("c")).0, "a-b-c");
        assert_eq!(sql(col("a") - (col("b") - col("c"))).0, "a-(b-c)");
        assert_eq!(sql(col("a") / (col("b") / col("c"))).0, "a/(b/c)");
    }

    #[test]
    fn test_lower_precedence_operand_grouped() {
        assert_eq!(sql(col("a") * (col("b") + col("c"))).0, "a*(b+c)");
        assert_eq!(sql(col("a") * col("b") + col("c")).0, "a*b+c");
    }

    #[test]
    fn test_or_inside_and() {
        let cond = col("a").eq(1).and(col("b").eq(2).or(col("c").eq(3)));
        let (text, params) = sql(cond);
        assert_eq!(text, "a = ? AND (b = ? OR c = ?)");
        assert_eq!(params, ints(&[1, 2, 3]));
    }

    #[test]
    fn test_in_always_parenthesized() {
        let (text, params) = sql(col("id").is_in([1, 2, 3]).unwrap());
        assert_eq!(text, "id IN (?, ?, ?)");
        assert_eq!(params, ints(&[1, 2, 3]));

        let (text, _) = sql(col("id").is_in([7]).unwrap());
        assert_eq!(text, "id IN (?)");
    }

    #[test]
    fn test_in_subquery() {
        let subquery = Select::new(col("x")).tables(table("t"));
        let (text, _) = sql(col("id").in_select(subquery));
        assert_eq!(text, "id IN (SELECT x FROM t)");
    }

    #[test]
    fn test_like_and_shift() {
        assert_eq!(sql(col("name").like("a%")).0, "name LIKE ?");
        assert_eq!(sql(col("flags") >> 2).0, "flags>>?");
    }

    #[test]
    fn test_prefix_and_suffix() {
        assert_eq!(sql(col("a").eq(1).not_()).0, "NOT (a = ?)");
        assert_eq!(sql(col("a").desc()).0, "a DESC");
        let exists = Expr::from(Select::new(col("x")).tables(table("t"))).exists();
        assert_eq!(sql(exists).0, "EXISTS (SELECT x FROM t)");
    }

    #[test]
    fn test_functions() {
        assert_eq!(sql(Count::all()).0, "COUNT(*)");
        assert_eq!(sql(Count::of(col("x"))).0, "COUNT(x)");
        assert_eq!(sql(Count::distinct(col("x"))).0, "COUNT(DISTINCT x)");
        assert_eq!(sql(Function::new(FunctionName::Max, [col("x")])).0, "MAX(x)");
        assert_eq!(sql(col("name").lower()).0, "LOWER(name)");
        let (text, params) = sql(Function::call("COALESCE", [col("a"), Expr::literal(0)]));
        assert_eq!(text, "COALESCE(a, ?)");
        assert_eq!(params, ints(&[0]));
    }

    #[test]
    fn test_alias_outside_select() {
        assert_eq!(sql(Alias::named(Table::new("t"), "x")).0, "t AS x");
    }
}

// ============================================================================
// SELECT
// ============================================================================

mod select {
    use super::*;

    #[test]
    fn test_where_infers_from() {
        let query = Select::new(col("id")).where_(column_of("users", "id").eq(5));
        let (text, params) = sql(query);
        assert_eq!(text, "SELECT id FROM users WHERE users.id = ?");
        assert_eq!(params, ints(&[5]));
    }

    #[test]
    fn test_no_tables_no_from() {
        assert_eq!(sql(Select::new(Expr::literal(1))).0, "SELECT ?");
    }

    #[test]
    fn test_default_tables() {
        let query = Select::new(col("x")).default_tables(table("d"));
        assert_eq!(sql(query).0, "SELECT x FROM d");
    }

    #[test]
    fn test_explicit_tables_win() {
        let query = Select::new(column_of("a", "x"))
            .tables(table("b"))
            .default_tables(table("c"));
        assert_eq!(sql(query).0, "SELECT a.x FROM b");
    }

    #[test]
    fn test_inferred_tables_deduplicated() {
        let query = Select::new([column_of("t", "a"), column_of("t", "b"), column_of("u", "c")]);
        assert_eq!(sql(query).0, "SELECT t.a, t.b, u.c FROM t, u");
    }

    #[test]
    fn test_clauses() {
        let query = Select::new(col("x"))
            .distinct(true)
            .tables(table("t"))
            .where_(col("x").gt(1))
            .order_by(col("x").desc())
            .group_by(col("x"))
            .limit(10)
            .offset(5);
        assert_eq!(
            sql(query).0,
            "SELECT DISTINCT x FROM t WHERE x > ? ORDER BY x DESC GROUP BY x LIMIT 10 OFFSET 5"
        );
    }

    #[test]
    fn test_subquery_alias_parameters_in_placeholder_order() {
        let inner = Select::new(col("id")).where_(col("x").gt(7)).tables(table("s"));
        let sq = Alias::named(inner, "sq");
        let columns = vec![Column::new("id").of(sq.clone()).into(), Expr::literal("k")];
        let query = Select::new(columns).where_(Expr::from(Column::new("v").of(sq)).eq(9));

        let (text, params) = sql(query);
        assert_eq!(
            text,
            "SELECT sq.id, ? FROM (SELECT id FROM s WHERE x > ?) AS sq WHERE sq.v = ?"
        );
        assert_eq!(params, vec![Value::from("k"), Value::Int(7), Value::Int(9)]);
    }

    #[test]
    fn test_subquery_tables_stay_local() {
        let inner = Select::new(column_of("t2", "y"));
        let query = Select::new(col("x")).where_(col("x").in_select(inner));
        assert_eq!(sql(query).0, "SELECT x WHERE x IN (SELECT t2.y FROM t2)");
    }

    #[test]
    fn test_join_list() {
        let on = column_of("b", "id").eq(column_of("a", "id"));
        let join = JoinExpr::new(JoinKind::LeftJoin, Table::new("b")).on(on);
        let query = Select::new(col("x")).tables(vec![table("a"), join.into()]);
        assert_eq!(sql(query).0, "SELECT x FROM a LEFT JOIN b ON b.id = a.id");
    }

    #[test]
    fn test_chained_joins_grouped() {
        let inner = JoinExpr::between(JoinKind::Join, Table::new("a"), Table::new("b"));
        let outer = JoinExpr::between(JoinKind::NaturalJoin, inner, Table::new("c"));
        let query = Select::new(col("x")).tables(outer);
        assert_eq!(sql(query).0, "SELECT x FROM (a JOIN b) NATURAL JOIN c");
    }

    #[test]
    fn test_raw_sql_fragments() {
        let query = Select::new(col("a"))
            .tables(table("t"))
            .where_(Sql::new("x = ?").params(vec![5]));
        let (text, params) = sql(query);
        assert_eq!(text, "SELECT a FROM t WHERE x = ?");
        assert_eq!(params, ints(&[5]));

        let counted = Select::new(Sql::new("COUNT(*)").tables(table("t")));
        assert_eq!(sql(counted).0, "SELECT COUNT(*) FROM t");
    }

    #[test]
    fn test_raw_where_text() {
        let query = Select::new(col("a")).tables(table("t")).where_("a > 1");
        assert_eq!(sql(query), ("SELECT a FROM t WHERE a > 1".to_string(), vec![]));
    }

    #[test]
    fn test_compile_is_repeatable() {
        let query: Expr = Select::new(col("id"))
            .where_(and_all([column_of("u", "a").eq(1), column_of("u", "b").lt(2)]).unwrap())
            .into();
        let first = sqlexpr::compile(&query).unwrap();
        let second = sqlexpr::compile(&query).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0, "SELECT id FROM u WHERE u.a = ? AND u.b < ?");
    }
}

// ============================================================================
// Set Operations
// ============================================================================

mod set_operations {
    use super::*;

    fn arm(name: &str) -> Expr {
        Select::new(col("x")).tables(table(name)).into()
    }

    #[test]
    fn test_union() {
        let union = SetOperation::union([arm("a"), arm("b")]);
        assert_eq!(sql(union).0, "(SELECT x FROM a) UNION (SELECT x FROM b)");
    }

    #[test]
    fn test_union_all_with_suffix() {
        let union = SetOperation::union([arm("a"), arm("b")])
            .all(true)
            .order_by(col("x"))
            .limit(5);
        assert_eq!(
            sql(union).0,
            "(SELECT x FROM a) UNION ALL (SELECT x FROM b) ORDER BY x LIMIT 5"
        );
    }

    #[test]
    fn test_order_by_parameters_follow_arms() {
        let first = Select::new(col("a")).where_(col("x").eq(1)).tables(table("t"));
        let second = Select::new(col("a")).where_(col("y").eq(2)).tables(table("u"));
        let union = SetOperation::union([first, second]).order_by(col("z") + 9);
        let (text, params) = sql(union);
        assert_eq!(
            text,
            "(SELECT a FROM t WHERE x = ?) UNION (SELECT a FROM u WHERE y = ?) ORDER BY z+?"
        );
        assert_eq!(params, ints(&[1, 2, 9]));
    }

    #[test]
    fn test_except() {
        let except = SetOperation::new(sqlexpr::SetOp::Except, [arm("a"), arm("b")]);
        assert_eq!(sql(except).0, "(SELECT x FROM a) EXCEPT (SELECT x FROM b)");
    }
}

// ============================================================================
// INSERT / UPDATE / DELETE
// ============================================================================

mod statements {
    use super::*;

    #[test]
    fn test_insert() {
        let insert = Insert::new(vec!["a", "b"], vec![1, 2]).table(Table::new("t"));
        let (text, params) = sql(insert);
        assert_eq!(text, "INSERT INTO t (a, b) VALUES (?, ?)");
        assert_eq!(params, ints(&[1, 2]));
    }

    #[test]
    fn test_insert_infers_table_from_columns() {
        let insert = Insert::new([column_of("t", "a")], [1]);
        assert_eq!(sql(insert).0, "INSERT INTO t (a) VALUES (?)");
    }

    #[test]
    fn test_update() {
        let update = Update::new([(col("a"), 1)])
            .table(table("t"))
            .where_(col("id").eq(2));
        let (text, params) = sql(update);
        assert_eq!(text, "UPDATE t SET a=? WHERE id = ?");
        assert_eq!(params, ints(&[1, 2]));
    }

    #[test]
    fn test_delete_infers_table_from_where() {
        let delete = Delete::new().where_(column_of("users", "id").eq(3));
        assert_eq!(sql(delete).0, "DELETE FROM users WHERE users.id = ?");
    }

    #[test]
    fn test_update_table_parameters_come_first() {
        let update = Update::new([(col("a"), 1)])
            .table(Sql::new("tenant_rows(?)").params(vec![7]))
            .where_(col("id").eq(2));
        let (text, params) = sql(update);
        assert_eq!(text, "UPDATE tenant_rows(?) SET a=? WHERE id = ?");
        assert_eq!(params, ints(&[7, 1, 2]));
    }

    #[test]
    fn test_delete_subquery_table_parameters_come_first() {
        let inner = Select::new(col("id")).where_(col("k").eq(7)).tables(table("s"));
        let sq = Alias::named(inner, "sq");
        let delete = Delete::new().where_(Expr::from(Column::new("id").of(sq)).eq(3));
        let (text, params) = sql(delete);
        assert_eq!(
            text,
            "DELETE FROM (SELECT id FROM s WHERE k = ?) AS sq WHERE sq.id = ?"
        );
        assert_eq!(params, ints(&[7, 3]));
    }

    #[test]
    fn test_delete_default_table() {
        let delete = Delete::new().default_table(table("t"));
        assert_eq!(sql(delete).0, "DELETE FROM t");
    }
}

// ============================================================================
// Errors
// ============================================================================

mod errors {
    use super::*;

    #[test]
    fn test_delete_without_table() {
        let err = sqlexpr::compile(&Delete::new().into()).unwrap_err();
        assert!(matches!(err, Error::NoTable(_)));
        assert_eq!(err.to_string(), "No table: Couldn't find any table");
    }

    #[test]
    fn test_insert_without_table() {
        let err = sqlexpr::compile(&Insert::new(vec!["a"], vec![1]).into()).unwrap_err();
        assert!(matches!(err, Error::NoTable(_)));
    }

    #[test]
    fn test_sql_params_must_be_list() {
        let err = sqlexpr::compile(&Sql::new("x = ?").params(1).into()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compile error: Parameters should be a list, not Literal"
        );
    }

    #[test]
    fn test_distinct_count_without_column() {
        let count = Count {
            column: None,
            distinct: true,
        };
        let err = sqlexpr::compile(&count.into()).unwrap_err();
        assert!(matches!(err, Error::Expression(_)));
        assert_eq!(
            err.to_string(),
            "Expression error: Must specify column when using distinct count"
        );
    }

    #[test]
    fn test_unregistered_kind() {
        let empty = sqlexpr::Compiler::<String>::new();
        let err = empty.compile(&col("a")).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
        assert!(err.to_string().contains("Don't know how to compile type Column"));
    }

    #[test]
    fn test_error_discards_partial_output() {
        let query = Select::new(col("x"))
            .tables(table("t"))
            .where_(col("a").eq(1).and(Sql::new("y").params(2)));
        assert!(sqlexpr::compile(&query.into()).is_err());
    }
}
