//! Classification of JSON payloads into tabular shapes

use super::{display_value, ensure_structured};
use crate::error::FormatError;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Name of the row identifier column for keyed layouts
///
/// A keyed table whose entries already carry an `index` field names its
/// identifier column `level_0` instead.
pub const INDEX_COLUMN: &str = "index";

/// Key whose object value is laid out as a keyed table
pub const VARIABLES_KEY: &str = "variables";

/// Column used for non-object entries of a keyed table, unless an entry
/// already has a field of that name (then `0`)
const VALUE_COLUMN: &str = "value";

/// Tabular interpretation of a payload
///
/// Classification precedence for objects is `KeyedTable`, then
/// `RowMajorMapping`, then `SingleRecord`. Arrays are `HeaderedRows` when the
/// first element is an array and every other element is an array of the same
/// length, otherwise `RawRows`.
#[derive(Debug, Clone, PartialEq)]
pub enum TableShape<'a> {
    /// `{"variables": {row_id: {column: value}}}`: one row per entry, keyed by
    /// an `index` column (`level_0` when an entry has its own `index` field)
    KeyedTable(&'a Map<String, Value>),
    /// `{row_id: [v0, v1, ...]}`: one row per key, positional columns
    RowMajorMapping(&'a Map<String, Value>),
    /// Any other object: a single row whose header is the object's keys
    SingleRecord(&'a Map<String, Value>),
    /// `[[h1, h2], [a, b], ...]`: first element is the header
    HeaderedRows {
        /// Column names
        header: &'a [Value],
        /// Data rows, each the same length as `header`
        rows: &'a [Value],
    },
    /// Every element is its own row
    RawRows(&'a [Value]),
}

/// Rendered table: header plus rows of cell text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Header row
    pub columns: Vec<String>,
    /// Data rows, each as wide as `columns`
    pub rows: Vec<Vec<String>>,
}

/// Decide how `value` is laid out as a table
pub fn classify(value: &Value) -> Result<TableShape<'_>, FormatError> {
    ensure_structured(value)?;

    let shape = match value {
        Value::Object(map) => match map.get(VARIABLES_KEY) {
            Some(Value::Object(variables)) => TableShape::KeyedTable(variables),
            _ if map.values().all(Value::is_array) => TableShape::RowMajorMapping(map),
            _ => TableShape::SingleRecord(map),
        },
        Value::Array(items) => match items.split_first() {
            Some((Value::Array(header), rows))
                if rows
                    .iter()
                    .all(|row| row.as_array().is_some_and(|r| r.len() == header.len())) =>
            {
                TableShape::HeaderedRows { header, rows }
            }
            _ => TableShape::RawRows(items),
        },
        // ensure_structured rejected everything else
        _ => return Err(FormatError::NotStructured { found: "scalar" }),
    };

    Ok(shape)
}

impl TableShape<'_> {
    /// Lay the payload out as rows and columns
    pub fn into_table(self) -> Table {
        match self {
            TableShape::KeyedTable(variables) => {
                let inner_keys: HashSet<&str> = variables
                    .values()
                    .filter_map(Value::as_object)
                    .flat_map(|fields| fields.keys().map(String::as_str))
                    .collect();
                let value_column = unused_column(&inner_keys, VALUE_COLUMN, "");

                let mut builder = TableBuilder::default();
                builder.column(&unused_column(&inner_keys, INDEX_COLUMN, "level_"));
                for (row_id, entry) in variables {
                    let mut cells = vec![(0, row_id.clone())];
                    match entry {
                        Value::Object(fields) => {
                            for (column, value) in fields {
                                cells.push((builder.column(column), cell(value)));
                            }
                        }
                        other => cells.push((builder.column(&value_column), cell(other))),
                    }
                    builder.push_row(cells);
                }
                builder.finish()
            }
            TableShape::RowMajorMapping(map) => {
                let mut builder = TableBuilder::with_index_column();
                for (row_id, entry) in map {
                    let mut cells = vec![(0, row_id.clone())];
                    if let Value::Array(values) = entry {
                        for (i, value) in values.iter().enumerate() {
                            cells.push((builder.column(&i.to_string()), cell(value)));
                        }
                    }
                    builder.push_row(cells);
                }
                builder.finish()
            }
            TableShape::SingleRecord(map) => {
                let mut builder = TableBuilder::default();
                let cells: Vec<(usize, String)> = map
                    .iter()
                    .map(|(column, value)| (builder.column(column), cell(value)))
                    .collect();
                builder.push_row(cells);
                builder.finish()
            }
            TableShape::HeaderedRows { header, rows } => Table {
                columns: header.iter().map(cell).collect(),
                rows: rows
                    .iter()
                    .filter_map(Value::as_array)
                    .map(|row| row.iter().map(cell).collect())
                    .collect(),
            },
            TableShape::RawRows(items) => {
                let mut builder = TableBuilder::default();
                for item in items {
                    let cells: Vec<(usize, String)> = match item {
                        Value::Object(fields) => fields
                            .iter()
                            .map(|(column, value)| (builder.column(column), cell(value)))
                            .collect(),
                        Value::Array(values) => values
                            .iter()
                            .enumerate()
                            .map(|(i, value)| (builder.column(&i.to_string()), cell(value)))
                            .collect(),
                        scalar => vec![(builder.column("0"), cell(scalar))],
                    };
                    builder.push_row(cells);
                }
                builder.finish()
            }
        }
    }
}

/// `preferred`, or the first `{fallback_prefix}{n}` that is not a data column
fn unused_column(taken: &HashSet<&str>, preferred: &str, fallback_prefix: &str) -> String {
    if !taken.contains(preferred) {
        return preferred.to_string();
    }
    let mut n = 0usize;
    loop {
        let candidate = format!("{fallback_prefix}{n}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => display_value(other),
    }
}

/// Collects columns in first-seen order and pads short rows.
#[derive(Default)]
struct TableBuilder {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    rows: Vec<Vec<(usize, String)>>,
}

impl TableBuilder {
    fn with_index_column() -> Self {
        let mut builder = Self::default();
        builder.column(INDEX_COLUMN);
        builder
    }

    fn column(&mut self, name: &str) -> usize {
        if let Some(&position) = self.positions.get(name) {
            return position;
        }
        let position = self.columns.len();
        self.columns.push(name.to_string());
        self.positions.insert(name.to_string(), position);
        position
    }

    fn push_row(&mut self, cells: Vec<(usize, String)>) {
        self.rows.push(cells);
    }

    fn finish(self) -> Table {
        let width = self.columns.len();
        let rows = self
            .rows
            .into_iter()
            .map(|cells| {
                let mut row = vec![String::new(); width];
                for (position, text) in cells {
                    row[position] = text;
                }
                row
            })
            .collect();

        Table {
            columns: self.columns,
            rows,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn variables_object_is_a_keyed_table() {
        let value = json!({"variables": {"a": {"x": 1}, "b": {"x": 2}}, "other": 5});
        let shape = classify(&value).unwrap();
        assert!(matches!(shape, TableShape::KeyedTable(_)));

        let table = shape.into_table();
        assert_eq!(table.columns, strings(&["index", "x"]));
        assert_eq!(table.rows, vec![strings(&["a", "1"]), strings(&["b", "2"])]);
    }

    #[test]
    fn keyed_table_unions_inner_keys_in_first_seen_order() {
        let value = json!({"variables": {
            "P1": {"label": "Total", "concept": "RACE"},
            "P2": {"label": "White", "group": "P1"}
        }});
        let table = classify(&value).unwrap().into_table();

        assert_eq!(
            table.columns,
            strings(&["index", "label", "concept", "group"])
        );
        assert_eq!(table.rows[0], strings(&["P1", "Total", "RACE", ""]));
        assert_eq!(table.rows[1], strings(&["P2", "White", "", "P1"]));
    }

    #[test]
    fn inner_index_field_moves_the_row_id_to_level_0() {
        let value = json!({"variables": {"a": {"index": 5, "x": 1}, "b": {"x": 2}}});
        let table = classify(&value).unwrap().into_table();

        assert_eq!(table.columns, strings(&["level_0", "index", "x"]));
        assert_eq!(table.rows[0], strings(&["a", "5", "1"]));
        assert_eq!(table.rows[1], strings(&["b", "", "2"]));
    }

    #[test]
    fn scalar_entries_stay_out_of_an_inner_value_field() {
        let value = json!({"variables": {"a": {"value": 1}, "b": 7}});
        let table = classify(&value).unwrap().into_table();

        assert_eq!(table.columns, strings(&["index", "value", "0"]));
        assert_eq!(table.rows[0], strings(&["a", "1", ""]));
        assert_eq!(table.rows[1], strings(&["b", "", "7"]));
    }

    #[test]
    fn scalar_entries_use_the_value_column() {
        let value = json!({"variables": {"a": {"x": 1}, "b": 7}});
        let table = classify(&value).unwrap().into_table();

        assert_eq!(table.columns, strings(&["index", "x", "value"]));
        assert_eq!(table.rows[1], strings(&["b", "", "7"]));
    }

    #[test]
    fn non_object_variables_fall_through() {
        let value = json!({"variables": [1, 2]});
        assert!(matches!(
            classify(&value).unwrap(),
            TableShape::RowMajorMapping(_)
        ));

        let value = json!({"variables": "none", "count": 3});
        assert!(matches!(
            classify(&value).unwrap(),
            TableShape::SingleRecord(_)
        ));
    }

    #[test]
    fn all_array_values_are_row_major() {
        let value = json!({"r1": [1, 2, 3], "r2": [4]});
        let table = classify(&value).unwrap().into_table();

        assert_eq!(table.columns, strings(&["index", "0", "1", "2"]));
        assert_eq!(table.rows[0], strings(&["r1", "1", "2", "3"]));
        assert_eq!(table.rows[1], strings(&["r2", "4", "", ""]));
    }

    #[test]
    fn plain_object_is_a_single_record() {
        let value = json!({"id": 7, "name": "alpha", "tags": ["x"], "missing": null});
        let table = classify(&value).unwrap().into_table();

        assert_eq!(table.columns, strings(&["id", "name", "tags", "missing"]));
        assert_eq!(table.rows, vec![strings(&["7", "alpha", "[\"x\"]", ""])]);
    }

    #[test]
    fn first_array_is_header_when_widths_match() {
        let value = json!([["col1", "col2"], [1, 2], [3, 4]]);
        let shape = classify(&value).unwrap();
        assert!(matches!(shape, TableShape::HeaderedRows { .. }));

        let table = shape.into_table();
        assert_eq!(table.columns, strings(&["col1", "col2"]));
        assert_eq!(table.rows, vec![strings(&["1", "2"]), strings(&["3", "4"])]);
    }

    #[test]
    fn ragged_arrays_fall_back_to_raw_rows() {
        let value = json!([["a", "b"], [1, 2, 3]]);
        let shape = classify(&value).unwrap();
        assert!(matches!(shape, TableShape::RawRows(_)));

        let table = shape.into_table();
        assert_eq!(table.columns, strings(&["0", "1", "2"]));
        assert_eq!(
            table.rows,
            vec![strings(&["a", "b", ""]), strings(&["1", "2", "3"])]
        );
    }

    #[test]
    fn array_of_objects_is_raw_rows_with_key_columns() {
        let value = json!([{"id": 1, "name": "x"}, {"id": 2, "email": "e"}]);
        let table = classify(&value).unwrap().into_table();

        assert_eq!(table.columns, strings(&["id", "name", "email"]));
        assert_eq!(table.rows[0], strings(&["1", "x", ""]));
        assert_eq!(table.rows[1], strings(&["2", "", "e"]));
    }

    #[test]
    fn array_of_scalars_is_a_single_column() {
        let table = classify(&json!(["a", 1, true])).unwrap().into_table();
        assert_eq!(table.columns, strings(&["0"]));
        assert_eq!(table.rows.len(), 3);
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(classify(&json!([])).unwrap().into_table(), Table::default());

        let table = classify(&json!({})).unwrap().into_table();
        assert_eq!(table.columns, strings(&["index"]));
        assert!(table.rows.is_empty());
    }

    #[test]
    fn scalars_cannot_be_classified() {
        assert!(matches!(
            classify(&json!(3)),
            Err(FormatError::NotStructured { found: "number" })
        ));
    }
}
