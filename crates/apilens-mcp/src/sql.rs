//! Ad-hoc SQL execution over staged JSON payloads.
//!
//! Every call opens a fresh in-memory engine connection, stages the payload's
//! lists as tables, runs the caller's SQL verbatim, and drops the connection.
//! Nothing persists between calls: the connection (and with it every staged
//! relation) is released on success, on query error, and on any unexpected
//! fault alike.
//!
//! Arbitrary SQL is allowed here, including relation-creating statements.
//! Staged tables are ephemeral and request-scoped and cannot touch any real
//! remote system, unlike a GraphQL mutation.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured success/error envelope shared by the SQL executor and the
/// GraphQL gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    /// SQL result rows, columns ordered as produced by the query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Map<String, Value>>>,
    /// GraphQL response data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    /// Create a successful SQL result.
    pub fn ok(rows: Vec<Map<String, Value>>) -> Self {
        Self {
            success: true,
            result: Some(rows),
            data: None,
            error: None,
        }
    }

    /// Create a successful GraphQL result.
    pub fn ok_data(data: Value) -> Self {
        Self {
            success: true,
            result: None,
            data: Some(data),
            error: None,
        }
    }

    /// Create a failed result.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Execute a SQL query against tables staged from a JSON payload.
///
/// A mapping payload stages every key whose value is a non-empty list as a
/// table named after that key; a list payload stages a single table named
/// `data`. Engine failures come back as `SQL error: ...` results, anything
/// else as a generic error; neither raises.
pub fn execute(data: &Value, query: &str) -> QueryResult {
    match run_query(data, query) {
        Ok(rows) => QueryResult::ok(rows),
        Err(SqlExecError::Engine(e)) => QueryResult::err(format!("SQL error: {e}")),
        Err(SqlExecError::Other(e)) => {
            tracing::error!(error = %e, "SQL execution error");
            QueryResult::err(e.to_string())
        }
    }
}

/// Internal failure split matching the result tagging policy.
enum SqlExecError {
    Engine(rusqlite::Error),
    Other(anyhow::Error),
}

impl From<rusqlite::Error> for SqlExecError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Engine(e)
    }
}

fn run_query(data: &Value, query: &str) -> Result<Vec<Map<String, Value>>, SqlExecError> {
    // The connection owns all staged state; dropping it on any return path
    // releases everything.
    let conn = Connection::open_in_memory()?;
    stage_tables(&conn, data)?;

    let mut stmt = conn.prepare(query)?;
    let column_count = stmt.column_count();
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    if column_count == 0 {
        // DDL or other non-row-producing statement.
        stmt.execute([])?;
        return Ok(Vec::new());
    }

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Map::new();
        for (idx, column) in columns.iter().enumerate() {
            let value = row
                .get_ref(idx)
                .map(sql_value_to_json)
                .map_err(|e| SqlExecError::Other(anyhow::anyhow!(e)))?;
            record.insert(column.clone(), value);
        }
        out.push(record);
    }
    Ok(out)
}

/// Stage the payload's lists as tables on the given connection.
fn stage_tables(conn: &Connection, data: &Value) -> Result<(), SqlExecError> {
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                if let Value::Array(rows) = value {
                    if !rows.is_empty() {
                        create_table(conn, key, rows)?;
                    }
                }
            }
        }
        Value::Array(rows) => {
            if !rows.is_empty() {
                create_table(conn, "data", rows)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Materialize one list of JSON rows as a table.
///
/// Columns are the union of object keys in first-seen order; scalar values
/// become native SQL values, nested arrays/objects become JSON text. A list
/// of bare scalars stages as a single `value` column.
fn create_table(conn: &Connection, name: &str, rows: &[Value]) -> Result<(), SqlExecError> {
    let columns = collect_columns(rows);

    let decls: Vec<String> = columns
        .iter()
        .map(|col| format!("{} {}", quote_ident(col), column_type(rows, col)))
        .collect();
    conn.execute(
        &format!("CREATE TABLE {} ({})", quote_ident(name), decls.join(", ")),
        [],
    )?;

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(name),
        columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", "),
        placeholders.join(", ")
    );
    let mut stmt = conn.prepare(&insert)?;

    for row in rows {
        let values: Vec<rusqlite::types::Value> = columns
            .iter()
            .map(|col| json_to_sql_value(field_value(row, col)))
            .collect();
        stmt.execute(rusqlite::params_from_iter(values))?;
    }
    Ok(())
}

/// Column names across all object rows, in first-seen order. `value` when
/// no row is an object.
fn collect_columns(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    if columns.is_empty() {
        columns.push("value".to_string());
    }
    columns
}

/// The staged value for one column of one row.
fn field_value<'a>(row: &'a Value, column: &str) -> Option<&'a Value> {
    match row {
        Value::Object(map) => map.get(column),
        // Bare scalar rows land in the synthetic `value` column.
        other if column == "value" => Some(other),
        _ => None,
    }
}

/// Declared column type from the first non-null value.
fn column_type(rows: &[Value], column: &str) -> &'static str {
    for row in rows {
        match field_value(row, column) {
            Some(Value::Bool(_)) => return "BOOLEAN",
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => return "INTEGER",
            Some(Value::Number(_)) => return "REAL",
            Some(Value::String(_)) => return "TEXT",
            Some(Value::Array(_)) | Some(Value::Object(_)) => return "JSON",
            _ => continue,
        }
    }
    "TEXT"
}

fn json_to_sql_value(value: Option<&Value>) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        None | Some(Value::Null) => Sql::Null,
        Some(Value::Bool(b)) => Sql::Integer(i64::from(*b)),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Sql::Integer(i)
            } else {
                Sql::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Some(Value::String(s)) => Sql::Text(s.clone()),
        Some(nested) => Sql::Text(nested.to_string()),
    }
}

fn sql_value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Stage rows as a table and read back its column names and declared types,
/// in column order. Shared with response schema inference.
pub fn describe_rows(rows: &[Value], table_name: &str) -> anyhow::Result<Vec<(String, String)>> {
    let conn = Connection::open_in_memory()?;
    create_table(&conn, table_name, rows).map_err(|e| match e {
        SqlExecError::Engine(e) => anyhow::anyhow!(e),
        SqlExecError::Other(e) => e,
    })?;

    let mut stmt = conn.prepare(&format!(
        "SELECT name, type FROM pragma_table_info({})",
        quote_string(table_name)
    ))?;
    let mut rows_iter = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows_iter.next()? {
        columns.push((row.get::<_, String>(0)?, row.get::<_, String>(1)?));
    }
    Ok(columns)
}

fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_over_mapping_payload() {
        let data = json!({
            "users": [
                {"id": 1, "name": "ada"},
                {"id": 2, "name": "grace"}
            ]
        });
        let result = execute(&data, "SELECT name FROM users WHERE id = 2");
        assert!(result.success);
        let rows = result.result.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("grace"));
    }

    #[test]
    fn test_list_payload_stages_as_data() {
        let data = json!([{"id": 1}, {"id": 2}, {"id": 3}]);
        let result = execute(&data, "SELECT count(*) AS n FROM data");
        assert!(result.success);
        assert_eq!(result.result.unwrap()[0]["n"], json!(3));
    }

    #[test]
    fn test_multiple_tables_from_keys() {
        let data = json!({
            "posts": [{"id": 1, "author_id": 10}],
            "authors": [{"id": 10, "name": "ada"}]
        });
        let result = execute(
            &data,
            "SELECT a.name FROM posts p JOIN authors a ON a.id = p.author_id",
        );
        assert!(result.success);
        assert_eq!(result.result.unwrap()[0]["name"], json!("ada"));
    }

    #[test]
    fn test_syntax_error_is_tagged() {
        let result = execute(&json!([{"id": 1}]), "SELEKT * FROM data");
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("SQL error:"));
    }

    #[test]
    fn test_unknown_table_is_sql_error() {
        let result = execute(&json!([{"id": 1}]), "SELECT * FROM missing");
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("SQL error:"));
    }

    #[test]
    fn test_nested_values_stored_as_json_text() {
        let data = json!([{"id": 1, "tags": ["a", "b"]}]);
        let result = execute(
            &data,
            "SELECT json_extract(tags, '$[1]') AS second FROM data",
        );
        assert!(result.success);
        assert_eq!(result.result.unwrap()[0]["second"], json!("b"));
    }

    #[test]
    fn test_no_state_survives_between_calls() {
        let data = json!([{"id": 1}]);
        let created = execute(&data, "CREATE TABLE scratch AS SELECT * FROM data");
        assert!(created.success);

        // A fresh call must not see the previous call's relation.
        let result = execute(&data, "SELECT * FROM scratch");
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("SQL error:"));
    }

    #[test]
    fn test_isolation_survives_failures() {
        let data = json!({"users": [{"id": 1}]});
        for _ in 0..3 {
            assert!(!execute(&data, "bogus").success);
            assert!(execute(&data, "SELECT id FROM users").success);
        }
    }

    #[test]
    fn test_sparse_rows_union_columns() {
        let data = json!([{"a": 1}, {"b": "x"}]);
        let result = execute(&data, "SELECT a, b FROM data ORDER BY a");
        assert!(result.success);
        let rows = result.result.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], json!({"a": 1, "b": null}).as_object().cloned().unwrap());
    }

    #[test]
    fn test_describe_rows_reports_columns_in_order() {
        let rows = vec![json!({"id": 1, "name": "ada", "score": 1.5})];
        let columns = describe_rows(&rows, "t").unwrap();
        let names: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "score"]);
        assert_eq!(columns[0].1, "INTEGER");
        assert_eq!(columns[2].1, "REAL");
    }

    #[test]
    fn test_scalar_rows_get_value_column() {
        let result = execute(&json!([1, 2, 3]), "SELECT sum(value) AS total FROM data");
        assert!(result.success);
        assert_eq!(result.result.unwrap()[0]["total"], json!(6));
    }
}
