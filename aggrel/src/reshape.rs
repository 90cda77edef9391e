//! Turning flattened pipeline rows back into per-key record collections.

use std::{borrow::Cow, collections::HashMap};

use serde_json::Value;

use crate::{errors::PipelineError, pipeline::RowShape, types::Record};

/// Root identifier to every record below it (root excluded, order unspecified).
pub type HierarchyResult<T> = HashMap<String, Vec<T>>;

/// Leaf identifier to its ancestor chain, root first and the leaf itself last.
pub type PathResult<T> = HashMap<String, Vec<T>>;

/// One row per matched root, each carrying an array of descendants.
///
/// Every row produces a key, so a root without descendants maps to an empty
/// sequence and the key set is exactly the set of matched roots.
pub fn reshape_hierarchy<T: Record>(rows: Vec<Value>, shape: &RowShape) -> Result<HierarchyResult<T>, PipelineError> {
    let mut result = HashMap::with_capacity(rows.len());
    for mut row in rows {
        let key = row_key(&row, &shape.key_field)?;
        let descendants = match take_field(&mut row, &shape.record_field) {
            Value::Array(items) => items.into_iter().map(decode::<T>).collect::<Result<Vec<_>, _>>()?,
            Value::Null => Vec::new(),
            other => {
                return Err(malformed(format!(
                    "`{}` of hierarchy row `{key}` is not an array: {other}",
                    shape.record_field
                )));
            }
        };
        result.insert(key, descendants);
    }
    Ok(result)
}

/// One row per (matched record, ancestor) pair, grouped and ordered by
/// descending depth.
pub fn reshape_path<T: Record>(rows: Vec<Value>, shape: &RowShape) -> Result<PathResult<T>, PipelineError> {
    let depth_field = shape
        .depth_field
        .as_deref()
        .ok_or_else(|| malformed("path rows require a depth field"))?;

    let mut grouped: HashMap<String, Vec<(i64, Value)>> = HashMap::new();
    for mut row in rows {
        let key = row_key(&row, &shape.key_field)?;
        let depth = row
            .get(depth_field)
            .and_then(Value::as_i64)
            .ok_or_else(|| malformed(format!("path row `{key}` has no integer `{depth_field}`")))?;
        let record = take_field(&mut row, &shape.record_field);
        grouped.entry(key).or_default().push((depth, record));
    }

    grouped
        .into_iter()
        .map(|(key, mut chain)| -> Result<(String, Vec<T>), PipelineError> {
            chain.sort_by(|a, b| b.0.cmp(&a.0));
            let records = chain
                .into_iter()
                .map(|(_, record)| decode::<T>(record))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((key, records))
        })
        .collect()
}

fn row_key(row: &Value, field: &str) -> Result<String, PipelineError> {
    match row.get(field) {
        Some(Value::String(key)) => Ok(key.clone()),
        Some(Value::Number(key)) => Ok(key.to_string()),
        Some(other) => Err(malformed(format!("row key `{field}` is not a scalar: {other}"))),
        None => Err(malformed(format!("row has no `{field}`"))),
    }
}

fn take_field(row: &mut Value, field: &str) -> Value {
    row.as_object_mut()
        .and_then(|object| object.remove(field))
        .unwrap_or(Value::Null)
}

pub(crate) fn decode<T: Record>(document: Value) -> Result<T, PipelineError> {
    serde_json::from_value(document).map_err(|source| PipelineError::Decode {
        type_name: std::any::type_name::<T>(),
        source,
    })
}

/// Encode a record for storage.
pub(crate) fn encode<T: Record>(record: &T) -> Result<Value, PipelineError> {
    serde_json::to_value(record).map_err(|source| PipelineError::Encode {
        type_name: std::any::type_name::<T>(),
        source,
    })
}

fn malformed(message: impl Into<Cow<'static, str>>) -> PipelineError {
    PipelineError::MalformedRow {
        message: message.into(),
    }
}
