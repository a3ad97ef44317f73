//! Filter operator evaluation for view stages.
//! Document-store style filter semantics with array lifting.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::{QueryError, Result};

// ============================================================================
// Ordering
// ============================================================================

/// Total order used by `$gt`-style operators and `SortBy`.
///
/// Nulls sort after everything else. Numbers compare numerically, strings by
/// codepoint; values of different kinds order as number, string, then the
/// rest.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        _ => 2,
    }
}

// ============================================================================
// Field Path Resolution
// ============================================================================

/// Resolve a dot-separated path, descending through arrays.
///
/// When a segment lands on an array, the rest of the path is resolved against
/// every element and the results are collected into an array, so
/// `gt.detections.label` yields one array of labels per record. Missing
/// segments resolve to `None` (or are skipped inside arrays).
pub fn resolve_path(record: &Value, path: &str) -> Option<Value> {
    let parts: Vec<&str> = path.split('.').collect();
    resolve_parts(record, &parts)
}

fn resolve_parts(value: &Value, parts: &[&str]) -> Option<Value> {
    let Some((head, rest)) = parts.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Object(obj) => resolve_parts(obj.get(*head)?, rest),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| resolve_parts(item, parts))
                .collect(),
        )),
        _ => None,
    }
}

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Regex,
    Size,
}

impl Op {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "$eq" => Op::Eq,
            "$ne" => Op::Ne,
            "$gt" => Op::Gt,
            "$gte" => Op::Gte,
            "$lt" => Op::Lt,
            "$lte" => Op::Lte,
            "$in" => Op::In,
            "$nin" => Op::Nin,
            "$regex" => Op::Regex,
            "$size" => Op::Size,
            other => return Err(QueryError::UnknownOperator(other.to_string()).into()),
        })
    }

    /// Orderings accepted by a comparison operator.
    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Op::Gt => ord.is_gt(),
            Op::Gte => ord.is_ge(),
            Op::Lt => ord.is_lt(),
            Op::Lte => ord.is_le(),
            _ => false,
        }
    }

    /// Apply to one value, without looking inside arrays.
    fn test(self, value: &Value, operand: &Value) -> Result<bool> {
        Ok(match self {
            Op::Eq => value == operand,
            Op::Ne => value != operand,
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
                !value.is_null()
                    && !operand.is_null()
                    && self.accepts(compare_values(value, operand))
            }
            Op::In | Op::Nin => {
                let hit = operand.as_array().is_some_and(|set| match value {
                    Value::Array(items) => items.iter().any(|v| set.contains(v)),
                    scalar => set.contains(scalar),
                });
                hit == (self == Op::In)
            }
            Op::Regex => match (value.as_str(), operand.as_str()) {
                (Some(text), Some(pattern)) => regex::Regex::new(pattern)
                    .map_err(|e| QueryError::InvalidRegex(e.to_string()))?
                    .is_match(text),
                _ => false,
            },
            Op::Size => match (value.as_array(), operand.as_u64()) {
                (Some(items), Some(n)) => items.len() as u64 == n,
                _ => false,
            },
        })
    }

    /// Apply to a resolved field value. A list compared against a scalar
    /// matches when any element does; `$ne` requires every element to differ.
    fn eval(self, value: &Value, operand: &Value) -> Result<bool> {
        let items = match value {
            Value::Array(items) if !operand.is_array() => items,
            _ => return self.test(value, operand),
        };
        match self {
            Op::Ne => {
                for item in items {
                    if !self.test(item, operand)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Op::Eq | Op::Gt | Op::Gte | Op::Lt | Op::Lte | Op::Regex => {
                for item in items {
                    if self.test(item, operand)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Op::In | Op::Nin | Op::Size => self.test(value, operand),
        }
    }
}

/// The operators of `condition` when it is an operator document such as
/// `{"$gt": 1}`. Anything else is an equality operand.
fn operator_doc(condition: &Value) -> Option<&Map<String, Value>> {
    condition
        .as_object()
        .filter(|obj| !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')))
}

fn eval_condition(value: Option<&Value>, condition: &Value) -> Result<bool> {
    let Some(ops) = operator_doc(condition) else {
        return Op::Eq.eval(value.unwrap_or(&Value::Null), condition);
    };
    for (name, operand) in ops {
        let ok = if name == "$exists" {
            let present = value.is_some_and(|v| !v.is_null());
            present == operand.as_bool().unwrap_or(false)
        } else {
            Op::parse(name)?.eval(value.unwrap_or(&Value::Null), operand)?
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// Filter Evaluation
// ============================================================================

/// Evaluate a filter object against a record.
///
/// Every clause must hold. `$and`, `$or` and `$not` combine sub-filters; any
/// other key is a field path, resolved through arrays, with its condition.
pub fn matches_filter(record: &Value, filter: &Value) -> Result<bool> {
    let Some(clauses) = filter.as_object() else {
        return Ok(true);
    };

    for (key, condition) in clauses {
        let ok = match key.as_str() {
            "$and" => all_match(record, condition)?,
            "$or" => any_match(record, condition)?,
            "$not" => !matches_filter(record, condition)?,
            _ if key.starts_with('$') => true,
            path => eval_condition(resolve_path(record, path).as_ref(), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn all_match(record: &Value, subs: &Value) -> Result<bool> {
    for sub in subs.as_array().into_iter().flatten() {
        if !matches_filter(record, sub)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_match(record: &Value, subs: &Value) -> Result<bool> {
    let Some(subs) = subs.as_array() else {
        return Ok(true);
    };
    for sub in subs {
        if matches_filter(record, sub)? {
            return Ok(true);
        }
    }
    Ok(false)
}

// ============================================================================
// Tests
// ============================================================================
