use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generate a fresh sample or label id (32 lowercase hex chars).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// ============================================================================
// Label tag edits
// ============================================================================

/// An edit applied to the `tags` array of embedded label documents.
///
/// This is the unit of work behind `tag_labels()` / `untag_labels()`; the
/// same edit is replayed against the source collection when it is issued
/// through a patches view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelTagEdit {
    Add(Vec<String>),
    Remove(Vec<String>),
}

impl LabelTagEdit {
    /// Apply the edit to a single label document. Returns true if the
    /// document changed. Non-object values are left alone.
    pub fn apply(&self, label: &mut Value) -> bool {
        let Some(obj) = label.as_object_mut() else {
            return false;
        };
        let tags = obj
            .entry("tags")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !tags.is_array() {
            *tags = Value::Array(Vec::new());
        }
        let Some(tags) = tags.as_array_mut() else {
            return false;
        };

        match self {
            LabelTagEdit::Add(add) => {
                let mut changed = false;
                for tag in add {
                    if !tags.iter().any(|t| t.as_str() == Some(tag)) {
                        tags.push(Value::String(tag.clone()));
                        changed = true;
                    }
                }
                changed
            }
            LabelTagEdit::Remove(remove) => {
                let before = tags.len();
                tags.retain(|t| match t.as_str() {
                    Some(s) => !remove.iter().any(|r| r == s),
                    None => true,
                });
                tags.len() != before
            }
        }
    }
}

// ============================================================================
// Field selection
// ============================================================================

/// Which fields an operation applies to.
///
/// A bare field name converts to a one-element selection, so callers may pass
/// `"ground_truth"`, `["gt", "pred"]`, a `Vec<String>`, or `FieldSelection::All`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSelection {
    #[default]
    All,
    Only(Vec<String>),
}

impl FieldSelection {
    pub fn is_all(&self) -> bool {
        matches!(self, FieldSelection::All)
    }

    /// The explicit field names, or `None` for `All`.
    pub fn names(&self) -> Option<&[String]> {
        match self {
            FieldSelection::All => None,
            FieldSelection::Only(fields) => Some(fields),
        }
    }

    /// Intersect with a set of candidate fields. `All` yields every candidate;
    /// explicit names not among the candidates are dropped.
    pub fn restrict(&self, candidates: &[String]) -> Vec<String> {
        match self {
            FieldSelection::All => candidates.to_vec(),
            FieldSelection::Only(fields) => fields
                .iter()
                .filter(|f| candidates.contains(f))
                .cloned()
                .collect(),
        }
    }

    /// True if `field` is covered by this selection.
    pub fn contains(&self, field: &str) -> bool {
        match self {
            FieldSelection::All => true,
            FieldSelection::Only(fields) => fields.iter().any(|f| f == field),
        }
    }
}

impl From<&str> for FieldSelection {
    fn from(field: &str) -> Self {
        FieldSelection::Only(vec![field.to_string()])
    }
}

impl From<String> for FieldSelection {
    fn from(field: String) -> Self {
        FieldSelection::Only(vec![field])
    }
}

impl From<&String> for FieldSelection {
    fn from(field: &String) -> Self {
        FieldSelection::Only(vec![field.clone()])
    }
}

impl From<Vec<String>> for FieldSelection {
    fn from(fields: Vec<String>) -> Self {
        FieldSelection::Only(fields)
    }
}

impl From<Vec<&str>> for FieldSelection {
    fn from(fields: Vec<&str>) -> Self {
        FieldSelection::Only(fields.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for FieldSelection {
    fn from(fields: &[&str]) -> Self {
        FieldSelection::Only(fields.iter().map(|f| f.to_string()).collect())
    }
}

impl From<&[String]> for FieldSelection {
    fn from(fields: &[String]) -> Self {
        FieldSelection::Only(fields.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for FieldSelection {
    fn from(fields: [&str; N]) -> Self {
        FieldSelection::Only(fields.iter().map(|f| f.to_string()).collect())
    }
}

impl<T: Into<FieldSelection>> From<Option<T>> for FieldSelection {
    fn from(fields: Option<T>) -> Self {
        fields.map(Into::into).unwrap_or_default()
    }
}

// ============================================================================
// Options structs
// ============================================================================

/// Extraction options shared by both patches stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchesConfig {
    /// Sample-level fields copied onto every patch.
    #[serde(default)]
    pub other_fields: Vec<String>,
}

impl PatchesConfig {
    pub fn with_other_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            other_fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Configuration of a stored evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub method: String,
    pub gt_field: String,
    pub pred_field: String,
    /// IoU threshold used for matching, when the method has one.
    pub iou: Option<f64>,
}

impl EvaluationConfig {
    pub fn new(gt_field: impl Into<String>, pred_field: impl Into<String>) -> Self {
        Self {
            method: "iou".to_string(),
            gt_field: gt_field.into(),
            pred_field: pred_field.into(),
            iou: Some(0.5),
        }
    }
}

/// An evaluation run as recorded on a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInfo {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub config: EvaluationConfig,
}

// ============================================================================
// Tests
// ============================================================================
