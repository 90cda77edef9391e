use serde_json::{Map, Value, json};

use crate::errors::ExecutionError;

/// One aggregation stage.
///
/// Stages are rendered to documents with [`Stage::to_document`] before they
/// reach an engine, and engines parse them back with
/// [`Stage::from_document`].
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Value),
    Limit(u64),
    Skip(u64),
    Sort(Vec<(String, SortOrder)>),
    Project(Vec<(String, Projection)>),
    Unset(Vec<String>),
    Unwind(Unwind),
    Lookup(Lookup),
    GraphLookup(GraphLookup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include,
    Exclude,
    /// Value taken from another field path (`"$path"`).
    Field(String),
}

/// Flatten an array field into one document per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwind {
    pub path: String,
    /// Keep documents whose field is missing, null or an empty array.
    pub preserve_null_and_empty: bool,
}

/// Attach the documents of `from` whose `foreign_field` matches `local_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
}

/// Recursive closure over `from`, following `connect_from_field` values into
/// `connect_to_field` until no new documents are reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphLookup {
    pub from: String,
    /// Field path evaluated on the input document to seed the traversal.
    pub start_with: String,
    pub connect_from_field: String,
    pub connect_to_field: String,
    pub as_field: String,
    /// When set, every hit carries its recursion depth (0 for the first hop).
    pub depth_field: Option<String>,
}

impl Stage {
    pub fn match_filter(filter: Value) -> Self {
        Stage::Match(filter)
    }

    pub fn unset(path: impl Into<String>) -> Self {
        Stage::Unset(vec![path.into()])
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Limit(_) => "$limit",
            Stage::Skip(_) => "$skip",
            Stage::Sort(_) => "$sort",
            Stage::Project(_) => "$project",
            Stage::Unset(_) => "$unset",
            Stage::Unwind(_) => "$unwind",
            Stage::Lookup(_) => "$lookup",
            Stage::GraphLookup(_) => "$graphLookup",
        }
    }

    pub fn to_document(&self) -> Value {
        let body = match self {
            Stage::Match(filter) => filter.clone(),
            Stage::Limit(count) | Stage::Skip(count) => json!(count),
            Stage::Sort(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(field, order)| {
                        let direction = match order {
                            SortOrder::Asc => 1,
                            SortOrder::Desc => -1,
                        };
                        (field.clone(), json!(direction))
                    })
                    .collect(),
            ),
            Stage::Project(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(field, projection)| {
                        let value = match projection {
                            Projection::Include => json!(1),
                            Projection::Exclude => json!(0),
                            Projection::Field(path) => json!(format!("${path}")),
                        };
                        (field.clone(), value)
                    })
                    .collect(),
            ),
            Stage::Unset(paths) => match paths.as_slice() {
                [single] => json!(single),
                _ => json!(paths),
            },
            Stage::Unwind(unwind) => json!({
                "path": format!("${}", unwind.path),
                "preserveNullAndEmptyArrays": unwind.preserve_null_and_empty,
            }),
            Stage::Lookup(lookup) => json!({
                "from": lookup.from,
                "localField": lookup.local_field,
                "foreignField": lookup.foreign_field,
                "as": lookup.as_field,
            }),
            Stage::GraphLookup(graph) => {
                let mut body = Map::new();
                body.insert("from".into(), json!(graph.from));
                body.insert("startWith".into(), json!(format!("${}", graph.start_with)));
                body.insert("connectFromField".into(), json!(graph.connect_from_field));
                body.insert("connectToField".into(), json!(graph.connect_to_field));
                body.insert("as".into(), json!(graph.as_field));
                if let Some(depth) = &graph.depth_field {
                    body.insert("depthField".into(), json!(depth));
                }
                Value::Object(body)
            }
        };

        let mut document = Map::new();
        document.insert(self.name().to_string(), body);
        Value::Object(document)
    }

    pub fn from_document(document: &Value) -> Result<Self, ExecutionError> {
        let object = document
            .as_object()
            .ok_or_else(|| invalid("each pipeline stage must be an object"))?;
        let mut entries = object.iter();
        let (name, body) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(invalid("each pipeline stage must have exactly one key")),
        };

        let stage = match name.as_str() {
            "$match" => {
                if !body.is_object() {
                    return Err(invalid("$match must be an object"));
                }
                Stage::Match(body.clone())
            }
            "$limit" => Stage::Limit(body.as_u64().ok_or_else(|| invalid("$limit must be a non-negative integer"))?),
            "$skip" => Stage::Skip(body.as_u64().ok_or_else(|| invalid("$skip must be a non-negative integer"))?),
            "$sort" => {
                let fields = body.as_object().ok_or_else(|| invalid("$sort must be an object"))?;
                let mut parsed = Vec::with_capacity(fields.len());
                for (field, direction) in fields {
                    let order = match direction.as_i64() {
                        Some(1) => SortOrder::Asc,
                        Some(-1) => SortOrder::Desc,
                        _ => return Err(invalid(format!("$sort direction for `{field}` must be 1 or -1"))),
                    };
                    parsed.push((field.clone(), order));
                }
                Stage::Sort(parsed)
            }
            "$project" => {
                let fields = body.as_object().ok_or_else(|| invalid("$project must be an object"))?;
                let mut parsed = Vec::with_capacity(fields.len());
                for (field, spec) in fields {
                    let projection = match spec {
                        Value::Bool(true) => Projection::Include,
                        Value::Bool(false) => Projection::Exclude,
                        Value::Number(number) if number.as_i64() == Some(1) => Projection::Include,
                        Value::Number(number) if number.as_i64() == Some(0) => Projection::Exclude,
                        Value::String(reference) => Projection::Field(field_reference(reference)?),
                        _ => return Err(invalid(format!("unsupported projection for `{field}`"))),
                    };
                    parsed.push((field.clone(), projection));
                }
                Stage::Project(parsed)
            }
            "$unset" => match body {
                Value::String(path) => Stage::Unset(vec![path.clone()]),
                Value::Array(paths) => Stage::Unset(
                    paths
                        .iter()
                        .map(|path| path.as_str().map(str::to_string).ok_or_else(|| invalid("$unset entries must be strings")))
                        .collect::<Result<_, _>>()?,
                ),
                _ => return Err(invalid("$unset must be a string or an array of strings")),
            },
            "$unwind" => match body {
                Value::String(reference) => Stage::Unwind(Unwind {
                    path: field_reference(reference)?,
                    preserve_null_and_empty: false,
                }),
                Value::Object(spec) => Stage::Unwind(Unwind {
                    path: field_reference(required_str(spec, "$unwind", "path")?)?,
                    preserve_null_and_empty: spec
                        .get("preserveNullAndEmptyArrays")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                }),
                _ => return Err(invalid("$unwind must be a string or an object")),
            },
            "$lookup" => {
                let spec = body.as_object().ok_or_else(|| invalid("$lookup must be an object"))?;
                Stage::Lookup(Lookup {
                    from: required_str(spec, "$lookup", "from")?.to_string(),
                    local_field: required_str(spec, "$lookup", "localField")?.to_string(),
                    foreign_field: required_str(spec, "$lookup", "foreignField")?.to_string(),
                    as_field: required_str(spec, "$lookup", "as")?.to_string(),
                })
            }
            "$graphLookup" => {
                let spec = body.as_object().ok_or_else(|| invalid("$graphLookup must be an object"))?;
                Stage::GraphLookup(GraphLookup {
                    from: required_str(spec, "$graphLookup", "from")?.to_string(),
                    start_with: field_reference(required_str(spec, "$graphLookup", "startWith")?)?,
                    connect_from_field: required_str(spec, "$graphLookup", "connectFromField")?.to_string(),
                    connect_to_field: required_str(spec, "$graphLookup", "connectToField")?.to_string(),
                    as_field: required_str(spec, "$graphLookup", "as")?.to_string(),
                    depth_field: spec.get("depthField").and_then(Value::as_str).map(str::to_string),
                })
            }
            other => return Err(invalid(format!("unknown stage: {other}"))),
        };
        Ok(stage)
    }
}

fn invalid(message: impl Into<String>) -> ExecutionError {
    ExecutionError::InvalidPipeline(message.into())
}

fn field_reference(reference: &str) -> Result<String, ExecutionError> {
    reference
        .strip_prefix('$')
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("`{reference}` is not a field reference")))
}

fn required_str<'a>(spec: &'a Map<String, Value>, stage: &str, key: &str) -> Result<&'a str, ExecutionError> {
    spec.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("{stage} requires '{key}' string")))
}
