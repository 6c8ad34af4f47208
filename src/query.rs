use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::ast::{
    AggArg, AggFunc, ColumnRef, CompareOp, Join, OrderByClause, Predicate, ProjItem, Select,
    SortDirection,
};
use crate::data_type::DataType;
use crate::database::Database;
use crate::error::{DbError, Result};
use crate::index::Key;
use crate::table::{RowId, Table};
use crate::value::{like_match, Value};

/// How the evaluator reached the base table's rows. Exposed on
/// [QueryResult] so callers (and tests) can observe whether an equality
/// predicate was answered from an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanKind {
    /// Every row was visited.
    FullScan,
    /// An equality conjunct was answered by the named index; remaining
    /// predicates ran row-wise over the candidates.
    IndexScan { index: String },
}

/// Represents the result of a successful `SELECT` query.
#[derive(Debug)]
pub struct QueryResult {
    /// The names of the columns included in the result set.
    pub columns: Vec<String>,
    /// The actual data, returned as a vector of rows, where each row is a
    /// vector of [Value].
    pub rows: Vec<Vec<Value>>,
    /// The access path used for the base table.
    pub scan: ScanKind,
}

/// One column of the relation a query reads from: its owning table, name,
/// and declared type. A join concatenates two of these lists.
#[derive(Debug, Clone)]
struct SourceColumn {
    table: String,
    name: String,
    data_type: DataType,
}

fn source_columns(table: &Table) -> Vec<SourceColumn> {
    table
        .schema
        .columns
        .iter()
        .map(|c| SourceColumn {
            table: table.name.clone(),
            name: c.name.clone(),
            data_type: c.data_type,
        })
        .collect()
}

/// Resolves a possibly qualified reference against the source columns.
///
/// # Errors
/// [DbError::Schema] for an unknown column, [DbError::AmbiguousColumn]
/// when a bare name matches more than one source column.
fn resolve_column(columns: &[SourceColumn], colref: &ColumnRef) -> Result<usize> {
    match &colref.table {
        Some(table) => columns
            .iter()
            .position(|c| c.table == *table && c.name == colref.column)
            .ok_or_else(|| DbError::Schema(format!("no such column: {}", colref.label()))),
        None => {
            let mut matches = columns.iter().enumerate().filter(|(_, c)| c.name == colref.column);
            let first = matches.next();
            if matches.next().is_some() {
                return Err(DbError::AmbiguousColumn(colref.column.clone()));
            }
            first
                .map(|(i, _)| i)
                .ok_or_else(|| DbError::Schema(format!("no such column: {}", colref.column)))
        }
    }
}

/// A predicate bound to a source column, with its literal coerced to the
/// column's declared type so evaluation always compares within one domain.
struct BoundPredicate {
    col: usize,
    op: CompareOp,
    value: Value,
}

fn bind_predicates(columns: &[SourceColumn], predicates: &[Predicate]) -> Result<Vec<BoundPredicate>> {
    predicates
        .iter()
        .map(|pred| {
            let col = resolve_column(columns, &pred.column)?;
            let value = bind_operand(&pred.value, pred.op, &columns[col])?;
            Ok(BoundPredicate {
                col,
                op: pred.op,
                value,
            })
        })
        .collect()
}

fn bind_operand(value: &Value, op: CompareOp, column: &SourceColumn) -> Result<Value> {
    if op == CompareOp::Like {
        if column.data_type != DataType::Text {
            return Err(DbError::Type(format!(
                "LIKE requires a TEXT column, {} is {}",
                column.name, column.data_type
            )));
        }
        return match value {
            Value::Text(_) | Value::Null => Ok(value.clone()),
            other => Err(DbError::Type(format!(
                "LIKE pattern must be a string, got {other:?}"
            ))),
        };
    }
    value.clone().coerce(column.data_type)
}

/// Applies one bound predicate to a row. A null on either side never
/// matches, for every operator.
fn eval_predicate(pred: &BoundPredicate, row: &[Value]) -> Result<bool> {
    let cell = &row[pred.col];
    if cell.is_null() || pred.value.is_null() {
        return Ok(false);
    }
    if pred.op == CompareOp::Like {
        let (Some(text), Some(pattern)) = (cell.as_str(), pred.value.as_str()) else {
            return Ok(false);
        };
        return Ok(like_match(text, pattern));
    }
    let ord = cell.compare(&pred.value)?;
    Ok(match pred.op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
        CompareOp::Like => unreachable!("handled above"),
    })
}

fn eval_all(predicates: &[BoundPredicate], row: &[Value]) -> Result<bool> {
    for pred in predicates {
        if !eval_predicate(pred, row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The filter protocol over one table: pick an index-answerable equality
/// conjunct for candidate selection when one exists, then apply every
/// predicate row-wise. Returns matching rids in ascending order.
pub(crate) fn matching_rids(
    table: &Table,
    predicates: &[Predicate],
) -> Result<(Vec<RowId>, ScanKind)> {
    let columns = source_columns(table);
    let bound = bind_predicates(&columns, predicates)?;

    let indexed = bound.iter().find_map(|pred| {
        if pred.op != CompareOp::Eq {
            return None;
        }
        table
            .index_on(&columns[pred.col].name)
            .map(|idx| (idx, &pred.value))
    });

    let mut rids = Vec::new();
    let scan = match indexed {
        Some((idx, value)) => {
            let mut candidates: Vec<RowId> = idx.lookup_eq(value).into_iter().collect();
            candidates.sort_unstable();
            for rid in candidates {
                if let Some(row) = table.row(rid) {
                    if eval_all(&bound, row)? {
                        rids.push(rid);
                    }
                }
            }
            ScanKind::IndexScan {
                index: idx.name.clone(),
            }
        }
        None => {
            for (rid, row) in table.scan() {
                if eval_all(&bound, row)? {
                    rids.push(rid);
                }
            }
            ScanKind::FullScan
        }
    };
    Ok((rids, scan))
}

/// Hash-equi-join: build a hash map over the right relation's join
/// column, probe with the left. Output rows are left-tuple concatenated
/// with right-tuple, in left-scan x right-scan order. Null join keys
/// never match.
fn hash_join(left: &Table, right: &Table, join: &Join) -> Result<Vec<Vec<Value>>> {
    let (left_ref, right_ref) = if join.left.table.as_deref() == Some(left.name.as_str()) {
        (&join.left, &join.right)
    } else {
        (&join.right, &join.left)
    };
    if left_ref.table.as_deref() != Some(left.name.as_str())
        || right_ref.table.as_deref() != Some(right.name.as_str())
    {
        return Err(DbError::Schema(format!(
            "JOIN condition must reference {:?} and {:?}",
            left.name, right.name
        )));
    }
    let l_col = left.schema.column_index(&left_ref.column).ok_or_else(|| {
        DbError::Schema(format!("no such column: {}", left_ref.label()))
    })?;
    let r_col = right.schema.column_index(&right_ref.column).ok_or_else(|| {
        DbError::Schema(format!("no such column: {}", right_ref.label()))
    })?;

    // Build phase over the right relation, preserving its scan order.
    let mut built: HashMap<Key, Vec<Vec<Value>>> = HashMap::new();
    for (_, row) in right.scan() {
        if row[r_col].is_null() {
            continue;
        }
        built
            .entry(Key(row[r_col].clone()))
            .or_default()
            .push(row.clone());
    }

    // Probe phase over the left relation.
    let mut out = Vec::new();
    for (_, row) in left.scan() {
        if row[l_col].is_null() {
            continue;
        }
        if let Some(matches) = built.get(&Key(row[l_col].clone())) {
            for right_row in matches {
                let mut joined = row.clone();
                joined.extend(right_row.iter().cloned());
                out.push(joined);
            }
        }
    }
    Ok(out)
}

/// Group key with a total lexicographic ordering: null sorts before any
/// value, so null groups come first in results.
struct GroupKey(Vec<Value>);

impl GroupKey {
    fn cmp_values(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            match a.total_cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_values(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp_values(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_values(other)
    }
}

/// One output column of a grouped query.
enum GroupedItem {
    /// A GROUP BY key, by its position in the key tuple.
    KeyColumn { label: String, key_pos: usize },
    /// An aggregate over the group's rows. `arg` is the source column,
    /// `None` for `COUNT(*)`.
    Agg {
        label: String,
        func: AggFunc,
        arg: Option<usize>,
    },
}

fn compute_aggregate(
    func: AggFunc,
    arg: Option<usize>,
    columns: &[SourceColumn],
    rows: &[Vec<Value>],
    members: &[usize],
) -> Result<Value> {
    let col = match (func, arg) {
        (AggFunc::Count, None) => return Ok(Value::Int(members.len() as i64)),
        (_, None) => {
            return Err(DbError::Type(format!(
                "{}(*) is not supported, name a column",
                func.keyword()
            )));
        }
        (_, Some(col)) => col,
    };

    let non_null = || {
        members
            .iter()
            .map(|i| &rows[*i][col])
            .filter(|v| !v.is_null())
    };

    match func {
        AggFunc::Count => Ok(Value::Int(non_null().count() as i64)),
        AggFunc::Sum => match columns[col].data_type {
            DataType::Integer => {
                let mut sum = None;
                for v in non_null() {
                    let i = v.as_int().unwrap_or_default();
                    sum = Some(sum.unwrap_or(0i64) + i);
                }
                Ok(sum.map_or(Value::Null, Value::Int))
            }
            DataType::Real => {
                let mut sum = None;
                for v in non_null() {
                    let f = v.as_real().unwrap_or_default();
                    sum = Some(sum.unwrap_or(0f64) + f);
                }
                Ok(sum.map_or(Value::Null, Value::Real))
            }
            other => Err(DbError::Type(format!(
                "SUM requires a numeric column, {} is {other}",
                columns[col].name
            ))),
        },
        AggFunc::Avg => match columns[col].data_type {
            DataType::Integer | DataType::Real => {
                let mut sum = 0f64;
                let mut count = 0usize;
                for v in non_null() {
                    sum += match v {
                        Value::Int(i) => *i as f64,
                        Value::Real(f) => *f,
                        _ => 0.0,
                    };
                    count += 1;
                }
                if count == 0 {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Real(sum / count as f64))
                }
            }
            other => Err(DbError::Type(format!(
                "AVG requires a numeric column, {} is {other}",
                columns[col].name
            ))),
        },
        AggFunc::Min | AggFunc::Max => {
            let mut best: Option<Value> = None;
            for v in non_null() {
                best = Some(match best {
                    None => v.clone(),
                    Some(b) => {
                        let keep_new = match func {
                            AggFunc::Min => v.compare(&b)? == Ordering::Less,
                            _ => v.compare(&b)? == Ordering::Greater,
                        };
                        if keep_new { v.clone() } else { b }
                    }
                });
            }
            Ok(best.unwrap_or(Value::Null))
        }
    }
}

impl Database {
    /// Evaluates a parsed `SELECT` statement.
    pub(crate) fn eval_select(&self, stmt: &Select) -> Result<QueryResult> {
        let table = self.table(&stmt.table)?;

        let (columns, rows, scan) = match &stmt.join {
            None => {
                let (rids, scan) = matching_rids(table, &stmt.predicates)?;
                let rows = rids
                    .iter()
                    .filter_map(|rid| table.row(*rid).cloned())
                    .collect();
                (source_columns(table), rows, scan)
            }
            Some(join) => {
                let right = self.table(&join.table)?;
                let columns: Vec<SourceColumn> = source_columns(table)
                    .into_iter()
                    .chain(source_columns(right))
                    .collect();
                let joined = hash_join(table, right, join)?;
                // Remaining predicates apply post-join to the joined tuple.
                let bound = bind_predicates(&columns, &stmt.predicates)?;
                let mut rows = Vec::new();
                for row in joined {
                    if eval_all(&bound, &row)? {
                        rows.push(row);
                    }
                }
                (columns, rows, ScanKind::FullScan)
            }
        };

        let grouped = !stmt.group_by.is_empty()
            || stmt
                .projection
                .iter()
                .any(|p| matches!(p, ProjItem::Aggregate(_)));

        if grouped {
            eval_grouped(stmt, &columns, rows, scan)
        } else {
            eval_plain(stmt, &columns, rows, scan)
        }
    }
}

/// Projection, ordering, and limiting for a query with no aggregation.
fn eval_plain(
    stmt: &Select,
    columns: &[SourceColumn],
    mut rows: Vec<Vec<Value>>,
    scan: ScanKind,
) -> Result<QueryResult> {
    // Sorting runs against the source relation, before projection, so a
    // query may order by a column it does not return.
    if !stmt.order_by.is_empty() {
        let keys = bind_order_by(columns, &stmt.order_by)?;
        sort_rows(&mut rows, &keys);
    }

    let joined = stmt.join.is_some();
    let mut labels = Vec::new();
    let mut picks = Vec::new();
    for item in &stmt.projection {
        match item {
            ProjItem::Star => {
                for (i, col) in columns.iter().enumerate() {
                    labels.push(if joined {
                        format!("{}.{}", col.table, col.name)
                    } else {
                        col.name.clone()
                    });
                    picks.push(i);
                }
            }
            ProjItem::Column(colref) => {
                labels.push(colref.label());
                picks.push(resolve_column(columns, colref)?);
            }
            ProjItem::Aggregate(_) => {
                return Err(DbError::Schema(
                    "aggregate in a non-aggregated projection".into(),
                ));
            }
        }
    }

    let mut out: Vec<Vec<Value>> = rows
        .into_iter()
        .map(|row| picks.iter().map(|i| row[*i].clone()).collect())
        .collect();
    if let Some(limit) = stmt.limit {
        out.truncate(limit);
    }

    Ok(QueryResult {
        columns: labels,
        rows: out,
        scan,
    })
}

/// Partitioning, aggregation, ordering, and limiting for a grouped query.
///
/// Every non-aggregate projection item must be a GROUP BY key. Groups are
/// emitted in ascending lexicographic key order; with no GROUP BY clause a
/// single implicit group produces exactly one row, even over zero rows.
fn eval_grouped(
    stmt: &Select,
    columns: &[SourceColumn],
    rows: Vec<Vec<Value>>,
    scan: ScanKind,
) -> Result<QueryResult> {
    let mut key_cols = Vec::new();
    for name in &stmt.group_by {
        key_cols.push(resolve_column(columns, &ColumnRef::bare(name.clone()))?);
    }

    let mut items = Vec::new();
    for item in &stmt.projection {
        match item {
            ProjItem::Star => {
                return Err(DbError::Schema(
                    "'*' cannot be projected from an aggregated query".into(),
                ));
            }
            ProjItem::Column(colref) => {
                let col = resolve_column(columns, colref)?;
                let key_pos = key_cols.iter().position(|k| *k == col).ok_or_else(|| {
                    DbError::Schema(format!(
                        "column {} must appear in GROUP BY",
                        colref.label()
                    ))
                })?;
                items.push(GroupedItem::KeyColumn {
                    label: colref.label(),
                    key_pos,
                });
            }
            ProjItem::Aggregate(agg) => {
                let (arg, arg_label) = match &agg.arg {
                    AggArg::Star => (None, "*".to_string()),
                    AggArg::Column(colref) => {
                        (Some(resolve_column(columns, colref)?), colref.label())
                    }
                };
                items.push(GroupedItem::Agg {
                    label: format!("{}({arg_label})", agg.func.keyword()),
                    func: agg.func,
                    arg,
                });
            }
        }
    }

    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    if key_cols.is_empty() {
        groups.insert(GroupKey(vec![]), (0..rows.len()).collect());
    } else {
        for (i, row) in rows.iter().enumerate() {
            let key = GroupKey(key_cols.iter().map(|c| row[*c].clone()).collect());
            groups.entry(key).or_default().push(i);
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key, members) in &groups {
        let mut row = Vec::with_capacity(items.len());
        for item in &items {
            match item {
                GroupedItem::KeyColumn { key_pos, .. } => row.push(key.0[*key_pos].clone()),
                GroupedItem::Agg { func, arg, .. } => {
                    row.push(compute_aggregate(*func, *arg, columns, &rows, members)?);
                }
            }
        }
        out.push(row);
    }

    let labels: Vec<String> = items
        .iter()
        .map(|item| match item {
            GroupedItem::KeyColumn { label, .. } | GroupedItem::Agg { label, .. } => label.clone(),
        })
        .collect();

    // ORDER BY on a grouped result resolves against the output columns.
    if !stmt.order_by.is_empty() {
        let mut keys = Vec::new();
        for clause in &stmt.order_by {
            let pos = labels
                .iter()
                .position(|l| *l == clause.column.label())
                .ok_or_else(|| {
                    DbError::Schema(format!(
                        "ORDER BY column {} is not in the result",
                        clause.column.label()
                    ))
                })?;
            keys.push((pos, clause.direction == SortDirection::Desc));
        }
        sort_rows(&mut out, &keys);
    }

    if let Some(limit) = stmt.limit {
        out.truncate(limit);
    }

    Ok(QueryResult {
        columns: labels,
        rows: out,
        scan,
    })
}

fn bind_order_by(
    columns: &[SourceColumn],
    order_by: &[OrderByClause],
) -> Result<Vec<(usize, bool)>> {
    order_by
        .iter()
        .map(|clause| {
            let idx = resolve_column(columns, &clause.column)?;
            Ok((idx, clause.direction == SortDirection::Desc))
        })
        .collect()
}

/// Multi-key sort: later keys break ties left by earlier ones.
fn sort_rows(rows: &mut [Vec<Value>], keys: &[(usize, bool)]) {
    rows.sort_by(|a, b| {
        for (idx, desc) in keys {
            let mut ord = a[*idx].total_cmp(&b[*idx]);
            if *desc {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    fn tx_db() -> Database {
        let mut db = Database::new();
        db.execute("CREATE TABLE tx (amt REAL, type TEXT)").unwrap();
        db.execute("INSERT INTO tx VALUES (100, 'CR')").unwrap();
        db.execute("INSERT INTO tx VALUES (50, 'DR')").unwrap();
        db.execute("INSERT INTO tx VALUES (200, 'CR')").unwrap();
        db
    }

    #[test]
    fn test_group_by_with_count_and_sum() {
        let db = tx_db();
        let result = db
            .query("SELECT type, COUNT(*), SUM(amt) FROM tx GROUP BY type")
            .unwrap();

        assert_eq!(result.columns, vec!["type", "COUNT(*)", "SUM(amt)"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Text("CR".into()), Value::Int(2), Value::Real(300.0)],
                vec![Value::Text("DR".into()), Value::Int(1), Value::Real(50.0)],
            ]
        );
    }

    #[test]
    fn test_pure_aggregate_single_implicit_group() {
        let db = tx_db();
        let result = db
            .query("SELECT COUNT(*), SUM(amt), AVG(amt), MIN(amt), MAX(amt) FROM tx")
            .unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.rows[0],
            vec![
                Value::Int(3),
                Value::Real(350.0),
                Value::Real(350.0 / 3.0),
                Value::Real(50.0),
                Value::Real(200.0),
            ]
        );
    }

    #[test]
    fn test_aggregates_over_empty_table() {
        let mut db = Database::new();
        db.execute("CREATE TABLE empty (n INTEGER)").unwrap();
        let result = db
            .query("SELECT COUNT(*), SUM(n), AVG(n), MIN(n) FROM empty")
            .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Int(0), Value::Null, Value::Null, Value::Null]]
        );
    }

    #[test]
    fn test_count_column_skips_nulls() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (n INTEGER)").unwrap();
        db.execute("INSERT INTO t VALUES (1)").unwrap();
        db.execute("INSERT INTO t VALUES (NULL)").unwrap();
        db.execute("INSERT INTO t VALUES (3)").unwrap();

        let result = db.query("SELECT COUNT(*), COUNT(n), SUM(n) FROM t").unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Int(3), Value::Int(2), Value::Int(4)]]
        );
    }

    #[test]
    fn test_null_group_sorts_first() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (tag TEXT, n INTEGER)").unwrap();
        db.execute("INSERT INTO t VALUES ('b', 1)").unwrap();
        db.execute("INSERT INTO t VALUES (NULL, 2)").unwrap();
        db.execute("INSERT INTO t VALUES ('a', 3)").unwrap();

        let result = db.query("SELECT tag, COUNT(*) FROM t GROUP BY tag").unwrap();
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0][0], Value::Null);
        assert_eq!(result.rows[1][0], Value::Text("a".into()));
        assert_eq!(result.rows[2][0], Value::Text("b".into()));
    }

    #[test]
    fn test_non_key_projection_rejected() {
        let db = tx_db();
        let result = db.query("SELECT amt, COUNT(*) FROM tx GROUP BY type");
        assert!(matches!(result, Err(DbError::Schema(_))));
    }

    #[test]
    fn test_sum_on_text_column_rejected() {
        let db = tx_db();
        let result = db.query("SELECT SUM(type) FROM tx");
        assert!(matches!(result, Err(DbError::Type(_))));
    }

    fn join_db() -> Database {
        let mut db = Database::new();
        db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        db.execute("CREATE TABLE orders (oid INTEGER PRIMARY KEY, uid INTEGER, total REAL)")
            .unwrap();
        db.execute("INSERT INTO users VALUES (1, 'Alice')").unwrap();
        db.execute("INSERT INTO users VALUES (2, 'Bob')").unwrap();
        db.execute("INSERT INTO users VALUES (3, 'Cara')").unwrap();
        db.execute("INSERT INTO orders VALUES (100, 1, 9.5)").unwrap();
        db.execute("INSERT INTO orders VALUES (101, 2, 3.0)").unwrap();
        db.execute("INSERT INTO orders VALUES (102, 1, 7.25)").unwrap();
        db.execute("INSERT INTO orders VALUES (103, NULL, 1.0)").unwrap();
        db
    }

    #[test]
    fn test_join_star_qualifies_columns() {
        let db = join_db();
        let result = db
            .query("SELECT * FROM users JOIN orders ON users.id = orders.uid")
            .unwrap();

        assert_eq!(
            result.columns,
            vec![
                "users.id",
                "users.name",
                "orders.oid",
                "orders.uid",
                "orders.total"
            ]
        );
        // Probe order is users scan order; order rows follow orders scan order.
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0][2], Value::Int(100));
        assert_eq!(result.rows[1][2], Value::Int(102));
        assert_eq!(result.rows[2][2], Value::Int(101));
    }

    #[test]
    fn test_join_equals_nested_loop() {
        let db = join_db();
        let hashed = db
            .query("SELECT users.id, orders.oid FROM users JOIN orders ON users.id = orders.uid")
            .unwrap();

        // Naive nested-loop reference over the same inputs.
        let users = db.table("users").unwrap();
        let orders = db.table("orders").unwrap();
        let mut expected = Vec::new();
        for (_, u) in users.scan() {
            for (_, o) in orders.scan() {
                if !u[0].is_null() && !o[1].is_null() && u[0] == o[1] {
                    expected.push(vec![u[0].clone(), o[0].clone()]);
                }
            }
        }
        assert_eq!(hashed.rows, expected);
    }

    #[test]
    fn test_join_with_post_join_where() {
        let db = join_db();
        let result = db
            .query(
                "SELECT orders.oid FROM users JOIN orders ON users.id = orders.uid \
                 WHERE users.name = 'Alice' AND orders.total > 8.0",
            )
            .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(100)]]);
    }

    #[test]
    fn test_join_bare_ambiguous_column_rejected() {
        let mut db = Database::new();
        db.execute("CREATE TABLE a (id INTEGER)").unwrap();
        db.execute("CREATE TABLE b (id INTEGER)").unwrap();
        let result = db.query("SELECT id FROM a JOIN b ON a.id = b.id");
        assert!(matches!(result, Err(DbError::AmbiguousColumn(_))));
    }

    #[test]
    fn test_join_then_group_by() {
        let db = join_db();
        let result = db
            .query(
                "SELECT name, SUM(orders.total) FROM users \
                 JOIN orders ON users.id = orders.uid GROUP BY name",
            )
            .unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Text("Alice".into()), Value::Real(16.75)],
                vec![Value::Text("Bob".into()), Value::Real(3.0)],
            ]
        );
    }

    #[test]
    fn test_indexed_equality_uses_index() {
        let mut db = Database::new();
        db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        db.execute("INSERT INTO users VALUES (1, 'Alicia')").unwrap();
        db.execute("INSERT INTO users VALUES (2, 'Bob')").unwrap();

        // Primary key equality is answered by the automatic index.
        let by_pk = db.query("SELECT * FROM users WHERE id = 2").unwrap();
        assert_eq!(
            by_pk.scan,
            ScanKind::IndexScan {
                index: "pk_id".into()
            }
        );
        assert_eq!(by_pk.rows.len(), 1);

        // No index on name yet: full scan.
        let by_name = db.query("SELECT * FROM users WHERE name = 'Alicia'").unwrap();
        assert_eq!(by_name.scan, ScanKind::FullScan);

        db.execute("CREATE INDEX idx_name ON users (name)").unwrap();
        let indexed = db.query("SELECT * FROM users WHERE name = 'Alicia'").unwrap();
        assert_eq!(
            indexed.scan,
            ScanKind::IndexScan {
                index: "idx_name".into()
            }
        );
        assert_eq!(indexed.rows, vec![vec![
            Value::Int(1),
            Value::Text("Alicia".into())
        ]]);
    }

    #[test]
    fn test_index_candidates_still_apply_remaining_predicates() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, n INTEGER)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, 10)").unwrap();

        let result = db.query("SELECT * FROM t WHERE id = 1 AND n > 50").unwrap();
        assert!(matches!(result.scan, ScanKind::IndexScan { .. }));
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_inequality_not_answered_by_index() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        db.execute("INSERT INTO t VALUES (1)").unwrap();
        let result = db.query("SELECT * FROM t WHERE id > 0").unwrap();
        assert_eq!(result.scan, ScanKind::FullScan);
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_like_predicate() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (name TEXT)").unwrap();
        db.execute("INSERT INTO t VALUES ('Alice')").unwrap();
        db.execute("INSERT INTO t VALUES ('Bob')").unwrap();
        db.execute("INSERT INTO t VALUES (NULL)").unwrap();

        let result = db.query("SELECT name FROM t WHERE name LIKE '_ob'").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Text("Bob".into())]]);

        let all = db.query("SELECT name FROM t WHERE name LIKE '%'").unwrap();
        // NULL never matches, even against '%'.
        assert_eq!(all.rows.len(), 2);
    }

    #[test]
    fn test_like_on_integer_column_rejected() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (n INTEGER)").unwrap();
        let result = db.query("SELECT * FROM t WHERE n LIKE '1%'");
        assert!(matches!(result, Err(DbError::Type(_))));
    }

    #[test]
    fn test_null_comparisons_never_match() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (n INTEGER)").unwrap();
        db.execute("INSERT INTO t VALUES (NULL)").unwrap();
        db.execute("INSERT INTO t VALUES (5)").unwrap();

        for op in ["=", "!=", "<", "<=", ">", ">="] {
            let sql = format!("SELECT n FROM t WHERE n {op} 5");
            let rows = db.query(&sql).unwrap().rows;
            assert!(
                rows.iter().all(|r| r[0] != Value::Null),
                "operator {op} matched a null"
            );
        }
        // A null literal matches nothing at all.
        let rows = db.query("SELECT n FROM t WHERE n = NULL").unwrap().rows;
        assert!(rows.is_empty());
    }

    #[test]
    fn test_order_by_hidden_column_and_limit() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (id INTEGER, age INTEGER)").unwrap();
        db.execute("INSERT INTO t VALUES (1, 30)").unwrap();
        db.execute("INSERT INTO t VALUES (2, 20)").unwrap();
        db.execute("INSERT INTO t VALUES (3, 25)").unwrap();

        let result = db
            .query("SELECT id FROM t ORDER BY age DESC LIMIT 2")
            .unwrap();
        assert_eq!(result.columns, vec!["id"]);
        assert_eq!(result.rows, vec![vec![Value::Int(1)], vec![Value::Int(3)]]);
    }

    #[test]
    fn test_rows_follow_ascending_rid_order() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (n INTEGER)").unwrap();
        db.execute("INSERT INTO t VALUES (3)").unwrap();
        db.execute("INSERT INTO t VALUES (1)").unwrap();
        db.execute("INSERT INTO t VALUES (2)").unwrap();

        let result = db.query("SELECT n FROM t").unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Int(3)], vec![Value::Int(1)], vec![Value::Int(2)]]
        );
    }

    #[test]
    fn test_date_predicate() {
        let mut db = Database::new();
        db.execute("CREATE TABLE events (name TEXT, day DATE)").unwrap();
        db.execute("INSERT INTO events VALUES ('a', '2024-01-01')").unwrap();
        db.execute("INSERT INTO events VALUES ('b', '2024-06-15')").unwrap();

        let result = db
            .query("SELECT name FROM events WHERE day > '2024-03-01'")
            .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Text("b".into())]]);
    }
}
