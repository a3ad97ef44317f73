//! `Values` aggregation: project a field path across a collection.

use serde_json::Value;

use super::operators::resolve_path;

/// Key holding a stored document's label type. Stripped from non-raw output.
const CLS_KEY: &str = "_cls";

/// Extract the value of `path` from every sample of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Values {
    pub path: String,
    /// Flatten list values into the output and drop nulls.
    pub unwind: bool,
    /// Return documents exactly as stored instead of user-facing values.
    pub raw: bool,
}

impl Values {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            unwind: false,
            raw: false,
        }
    }

    pub fn unwind(mut self) -> Self {
        self.unwind = true;
        self
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    /// Run the aggregation over already-materialized samples.
    pub fn collect(&self, samples: &[Value]) -> Vec<Value> {
        let mut out = Vec::with_capacity(samples.len());
        for sample in samples {
            let value = resolve_path(sample, &self.path).unwrap_or(Value::Null);
            let value = if self.raw { value } else { strip_internal(value) };
            if self.unwind {
                flatten_into(value, &mut out);
            } else {
                out.push(value);
            }
        }
        out
    }
}

fn flatten_into(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        other => out.push(other),
    }
}

fn strip_internal(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => {
            obj.remove(CLS_KEY);
            Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, strip_internal(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(strip_internal).collect()),
        other => other,
    }
}

/// Run several aggregations over the same samples in one pass, so their
/// outputs line up element by element (unwound outputs excepted).
pub fn aggregate(samples: &[Value], aggregations: &[Values]) -> Vec<Vec<Value>> {
    aggregations.iter().map(|agg| agg.collect(samples)).collect()
}

// ============================================================================
// Tests
// ============================================================================
