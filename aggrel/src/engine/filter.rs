use std::cmp::Ordering;

use serde_json::Value;

use super::document::{compare_scalars, lookup_path};
use crate::errors::ExecutionError;

/// Parsed `$match` / find document.
///
/// Supports field equality, `$eq`, `$ne`, `$in`, `$nin`, `$gt`, `$gte`,
/// `$lt`, `$lte`, `$exists`, and the `$and` / `$or` combinators.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All(Vec<Filter>),
    Any(Vec<Filter>),
    Field { path: String, conditions: Vec<Condition> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Exists(bool),
}

impl Filter {
    pub fn parse(filter: &Value) -> Result<Self, ExecutionError> {
        let object = filter
            .as_object()
            .ok_or_else(|| invalid(format!("filter must be an object, got {filter}")))?;

        let mut clauses = Vec::with_capacity(object.len());
        for (key, value) in object {
            let clause = match key.as_str() {
                "$and" => Filter::All(parse_list(key, value)?),
                "$or" => Filter::Any(parse_list(key, value)?),
                operator if operator.starts_with('$') => {
                    return Err(invalid(format!("unsupported top-level operator {operator}")));
                }
                path => Filter::Field {
                    path: path.to_string(),
                    conditions: parse_conditions(value)?,
                },
            };
            clauses.push(clause);
        }
        Ok(Filter::All(clauses))
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All(clauses) => clauses.iter().all(|clause| clause.matches(doc)),
            Filter::Any(clauses) => clauses.iter().any(|clause| clause.matches(doc)),
            Filter::Field { path, conditions } => {
                let value = lookup_path(doc, path);
                conditions.iter().all(|condition| condition.matches(value))
            }
        }
    }
}

impl Condition {
    fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => equals(value, expected),
            Condition::Ne(expected) => !equals(value, expected),
            Condition::In(options) => options.iter().any(|expected| equals(value, expected)),
            Condition::Nin(options) => !options.iter().any(|expected| equals(value, expected)),
            Condition::Gt(bound) => compares(value, bound, |ord| ord == Ordering::Greater),
            Condition::Gte(bound) => compares(value, bound, |ord| ord != Ordering::Less),
            Condition::Lt(bound) => compares(value, bound, |ord| ord == Ordering::Less),
            Condition::Lte(bound) => compares(value, bound, |ord| ord != Ordering::Greater),
            Condition::Exists(expected) => value.is_some() == *expected,
        }
    }
}

fn parse_list(operator: &str, value: &Value) -> Result<Vec<Filter>, ExecutionError> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| invalid(format!("{operator} requires a non-empty array")))?;
    items.iter().map(Filter::parse).collect()
}

fn parse_conditions(value: &Value) -> Result<Vec<Condition>, ExecutionError> {
    let operators = match value {
        Value::Object(map) if !map.is_empty() && map.keys().all(|key| key.starts_with('$')) => map,
        literal => return Ok(vec![Condition::Eq(literal.clone())]),
    };

    operators
        .iter()
        .map(|(operator, operand)| {
            let condition = match operator.as_str() {
                "$eq" => Condition::Eq(operand.clone()),
                "$ne" => Condition::Ne(operand.clone()),
                "$in" => Condition::In(operand_list(operator, operand)?),
                "$nin" => Condition::Nin(operand_list(operator, operand)?),
                "$gt" => Condition::Gt(operand.clone()),
                "$gte" => Condition::Gte(operand.clone()),
                "$lt" => Condition::Lt(operand.clone()),
                "$lte" => Condition::Lte(operand.clone()),
                "$exists" => Condition::Exists(
                    operand
                        .as_bool()
                        .ok_or_else(|| invalid("$exists requires a boolean"))?,
                ),
                other => return Err(invalid(format!("unsupported operator {other}"))),
            };
            Ok(condition)
        })
        .collect()
}

fn operand_list(operator: &str, operand: &Value) -> Result<Vec<Value>, ExecutionError> {
    operand
        .as_array()
        .cloned()
        .ok_or_else(|| invalid(format!("{operator} requires an array")))
}

/// Equality with array-contains semantics; `null` also matches a missing field.
fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(Value::Array(items)) => items.iter().any(|item| item == expected) || value == Some(expected),
        Some(actual) => actual == expected,
    }
}

fn compares(value: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |candidate: &Value| compare_scalars(candidate, bound).is_some_and(&accept);
    match value {
        None => false,
        Some(Value::Array(items)) => items.iter().any(check),
        Some(actual) => check(actual),
    }
}

fn invalid(message: impl Into<String>) -> ExecutionError {
    ExecutionError::InvalidFilter(message.into())
}
