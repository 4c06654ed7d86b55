// JSON ↔ CSV. Rows are JSON objects; columns are the union of their keys.
use csv::{ReaderBuilder, Trim, WriterBuilder};
use indexmap::IndexSet;
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

const FORMAT: &str = "csv";

/// Column used when a row is not an object.
pub const SCALAR_COLUMN: &str = "value";

pub fn json_to_csv(value: &Value) -> Result<String> {
    let rows: Vec<Map<String, Value>> = match value {
        Value::Array(items) => items.iter().map(as_row).collect(),
        other => vec![as_row(other)],
    };

    let mut headers = IndexSet::<&str>::new();
    for row in &rows {
        headers.extend(row.keys().map(String::as_str));
    }
    if headers.is_empty() {
        return Ok(String::new());
    }

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(headers.iter()).map_err(|e| Error::render(FORMAT, e))?;
    for row in &rows {
        let record: Vec<String> = headers.iter().map(|h| cell_text(row.get(*h))).collect();
        writer.write_record(&record).map_err(|e| Error::render(FORMAT, e))?;
    }
    let bytes = writer.into_inner().map_err(|e| Error::render(FORMAT, e))?;
    String::from_utf8(bytes).map_err(|e| Error::render(FORMAT, e))
}

fn as_row(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        other => {
            let mut row = Map::new();
            row.insert(SCALAR_COLUMN.to_string(), other.clone());
            row
        }
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Reads a CSV document with a header row into an array of objects.
pub fn csv_to_json(source: &str) -> Result<Value> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source.as_bytes());
    let headers = reader.headers().map_err(|e| Error::input(FORMAT, e))?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::input(FORMAT, e))?;
        let mut row = Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), typed_cell(cell));
        }
        rows.push(Value::Object(row));
    }
    tracing::debug!(rows = rows.len(), columns = headers.len(), "parsed csv");
    Ok(Value::Array(rows))
}

fn typed_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match cell {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Value::from(int);
    }
    cell.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(cell.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_use_the_union_of_keys() {
        let value = json!([{"id": 1, "name": "a"}, {"id": 2, "tags": ["x", "y"]}]);
        let text = json_to_csv(&value).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,name,tags");
        assert_eq!(lines[1], "1,a,");
        assert_eq!(lines[2], r#"2,,"[""x"",""y""]""#);
    }

    #[test]
    fn object_is_a_single_row_and_scalar_a_value_column() {
        assert_eq!(json_to_csv(&json!({"a": true})).unwrap(), "a\ntrue\n");
        assert_eq!(json_to_csv(&json!(3.5)).unwrap(), "value\n3.5\n");
        assert_eq!(json_to_csv(&json!([])).unwrap(), "");
    }

    #[test]
    fn cells_are_typed_on_read() {
        let value = csv_to_json("id,score,ok,name,note\n1,2.5,true,alice,\n2,x,false,bob,hi\n").unwrap();
        assert_eq!(
            value,
            json!([
                {"id": 1, "score": 2.5, "ok": true, "name": "alice", "note": null},
                {"id": 2, "score": "x", "ok": false, "name": "bob", "note": "hi"},
            ])
        );
    }

    #[test]
    fn rendered_csv_reads_back() {
        let value = json!([{"id": 1, "name": "a, b"}, {"id": 2, "name": "c"}]);
        let text = json_to_csv(&value).unwrap();
        assert_eq!(csv_to_json(&text).unwrap(), value);
    }
}
