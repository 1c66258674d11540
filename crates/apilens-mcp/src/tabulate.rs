//! Response tabulation and context-budget truncation.
//!
//! Raw API responses are reshaped into named tables so the agent never
//! receives an unbounded payload. Previews are always a contiguous prefix of
//! the source rows in response order, never sampled or reordered; when a
//! preview is cut short, an inferred schema summary and a filtering hint ride
//! along so the agent can switch to SQL instead of asking for more rows.

use crate::sql;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named, ordered sequence of record rows extracted from a response.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePayload {
    pub name: String,
    pub rows: Vec<Value>,
}

/// Shape summary for a staged table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchemaInfo {
    /// Total row count.
    pub rows: usize,
    /// Compact `col: type, col: type` description.
    pub schema: String,
    /// Suggested next step, referencing an example query.
    pub hint: String,
}

/// Budget-bounded view over a table's rows.
///
/// Serialized field order matches the wire shape agents consume:
/// `{table, rows, showing?, schema?, data, truncated, hint?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncatedView {
    pub table: String,
    /// Total row count in the source table.
    pub rows: usize,
    /// Number of rows shown, present only when truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showing: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Contiguous prefix of the source rows.
    pub data: Vec<Value>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Extract tables from an API response.
///
/// - A list response becomes one table under `name`.
/// - A mapping response with a top-level list-valued key becomes one table
///   from the first such list in document order.
/// - A mapping with no list-valued key is wrapped as a single-row table and
///   returns an inferred schema alongside, since single-object payloads
///   benefit most from immediate shape feedback.
/// - Anything else produces no tables.
pub fn tabulize(response: &Value, name: &str) -> (Vec<TablePayload>, Option<TableSchemaInfo>) {
    match response {
        Value::Array(rows) => (
            vec![TablePayload {
                name: name.to_string(),
                rows: rows.clone(),
            }],
            None,
        ),
        Value::Object(map) if !map.is_empty() => {
            for value in map.values() {
                if let Value::Array(rows) = value {
                    return (
                        vec![TablePayload {
                            name: name.to_string(),
                            rows: rows.clone(),
                        }],
                        None,
                    );
                }
            }
            // No list found: wrap the whole mapping as a one-row table.
            let rows = vec![response.clone()];
            let schema_info = infer_schema(&rows, name);
            (
                vec![TablePayload {
                    name: name.to_string(),
                    rows,
                }],
                Some(schema_info),
            )
        }
        _ => (Vec::new(), None),
    }
}

/// Infer a schema summary by staging the rows into the embedded engine.
///
/// Inference failures never abort the caller's response path: they degrade
/// to `schema: "unknown"` with the error text as the hint.
pub fn infer_schema(rows: &[Value], table_name: &str) -> TableSchemaInfo {
    if rows.is_empty() {
        return TableSchemaInfo {
            rows: 0,
            schema: String::new(),
            hint: "Empty table".to_string(),
        };
    }

    match sql::describe_rows(rows, table_name) {
        Ok(columns) => {
            let schema = columns
                .iter()
                .map(|(name, col_type)| format!("{name}: {col_type}"))
                .collect::<Vec<_>>()
                .join(", ");
            let first_column = columns
                .first()
                .map(|(name, _)| name.as_str())
                .unwrap_or("*");
            TableSchemaInfo {
                rows: rows.len(),
                schema,
                hint: format!(
                    "Use the sql argument to access fields. Example: SELECT {first_column} FROM {table_name}"
                ),
            }
        }
        Err(e) => {
            tracing::error!(table = table_name, error = %e, "schema inference error");
            TableSchemaInfo {
                rows: rows.len(),
                schema: "unknown".to_string(),
                hint: e.to_string(),
            }
        }
    }
}

/// Truncate rows to the character budget, attaching a schema summary and a
/// filtering hint when rows are dropped.
pub fn truncate(rows: &[Value], table_name: &str, max_chars: usize) -> TruncatedView {
    let total_rows = rows.len();

    if serialized_len(&Value::Array(rows.to_vec())) <= max_chars {
        return TruncatedView {
            table: table_name.to_string(),
            rows: total_rows,
            showing: None,
            schema: None,
            data: rows.to_vec(),
            truncated: false,
            hint: None,
        };
    }

    // Accumulate complete rows greedily in source order; one separator unit
    // per row after the first.
    let mut preview: Vec<Value> = Vec::new();
    let mut current_size = 2; // "[]"
    for row in rows {
        let row_len = serialized_len(row);
        let new_size = current_size + row_len + usize::from(!preview.is_empty());
        if new_size > max_chars {
            break;
        }
        preview.push(row.clone());
        current_size = new_size;
    }

    let schema = infer_schema(rows, table_name);
    let shown = preview.len();
    TruncatedView {
        table: table_name.to_string(),
        rows: total_rows,
        showing: Some(shown),
        schema: Some(schema.schema),
        data: preview,
        truncated: true,
        hint: Some(format!(
            "Showing {shown}/{total_rows}. Use the sql argument to filter."
        )),
    }
}

fn serialized_len(value: &Value) -> usize {
    serde_json::to_string(value)
        .map(|s| s.chars().count())
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_response_is_one_table() {
        let response = json!([{"id": 1}, {"id": 2}]);
        let (tables, schema) = tabulize(&response, "items");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "items");
        assert_eq!(tables[0].rows, vec![json!({"id": 1}), json!({"id": 2})]);
        assert!(schema.is_none());
    }

    #[test]
    fn test_mapping_with_list_key() {
        let response = json!({"users": [{"id": 1}, {"id": 2}]});
        let (tables, schema) = tabulize(&response, "catalog");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "catalog");
        assert_eq!(tables[0].rows, vec![json!({"id": 1}), json!({"id": 2})]);
        assert!(schema.is_none());
    }

    #[test]
    fn test_first_list_key_wins() {
        let response = json!({
            "count": 2,
            "items": [{"id": 1}],
            "extra": [{"id": 99}]
        });
        let (tables, _) = tabulize(&response, "t");
        assert_eq!(tables[0].rows, vec![json!({"id": 1})]);
    }

    #[test]
    fn test_mapping_without_list_wraps_single_row() {
        let response = json!({"id": 7, "name": "ada"});
        let (tables, schema) = tabulize(&response, "user");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows, vec![response.clone()]);

        let schema = schema.unwrap();
        assert_eq!(schema.rows, 1);
        assert_eq!(schema.schema, "id: INTEGER, name: TEXT");
        assert!(schema.hint.contains("SELECT id FROM user"));
    }

    #[test]
    fn test_scalar_and_empty_inputs_produce_no_tables() {
        assert!(tabulize(&json!(42), "t").0.is_empty());
        assert!(tabulize(&json!("x"), "t").0.is_empty());
        assert!(tabulize(&json!(null), "t").0.is_empty());
        assert!(tabulize(&json!({}), "t").0.is_empty());
    }

    #[test]
    fn test_truncate_within_budget() {
        let rows = vec![json!({"id": 1}), json!({"id": 2})];
        let view = truncate(&rows, "t", 10000);
        assert!(!view.truncated);
        assert_eq!(view.rows, 2);
        assert_eq!(view.data, rows);
        assert!(view.showing.is_none());
        assert!(view.schema.is_none());
        assert!(view.hint.is_none());
    }

    #[test]
    fn test_truncate_over_budget_keeps_prefix() {
        let rows: Vec<Value> = (0..50).map(|i| json!({"id": i, "pad": "x".repeat(20)})).collect();
        let budget = 200;
        let view = truncate(&rows, "t", budget);
        assert!(view.truncated);
        assert_eq!(view.rows, 50);

        let shown = view.showing.unwrap();
        assert!(shown > 0 && shown < 50);
        // Strict order-preserving prefix
        assert_eq!(view.data.as_slice(), &rows[..shown]);
        // The preview itself fits the budget
        assert!(serialized_len(&Value::Array(view.data.clone())) <= budget);

        assert!(view.schema.is_some());
        assert_eq!(view.hint.unwrap(), format!("Showing {shown}/50. Use the sql argument to filter."));
    }

    #[test]
    fn test_infer_schema_empty_rows() {
        let info = infer_schema(&[], "t");
        assert_eq!(info.rows, 0);
        assert_eq!(info.schema, "");
        assert_eq!(info.hint, "Empty table");
    }

    #[test]
    fn test_truncated_view_wire_shape() {
        let rows = vec![json!({"id": 1})];
        let view = truncate(&rows, "t", 10000);
        let wire = serde_json::to_value(&view).unwrap();
        assert_eq!(wire, json!({"table": "t", "rows": 1, "data": [{"id": 1}], "truncated": false}));
    }
}
