//! Label types and label-field descriptors.
//!
//! A label field holds either one embedded label document (`Scalar`) or a
//! container whose list attribute holds many (`List`). The descriptor is
//! resolved once from the schema and then drives every path computation, so
//! no caller has to inspect label type names itself.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// LabelType
// ============================================================================

/// The declared type of a label field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelType {
    Classification,
    Classifications,
    Detection,
    Detections,
    Polyline,
    Polylines,
    Keypoint,
    Keypoints,
}

impl LabelType {
    pub const ALL: [LabelType; 8] = [
        LabelType::Classification,
        LabelType::Classifications,
        LabelType::Detection,
        LabelType::Detections,
        LabelType::Polyline,
        LabelType::Polylines,
        LabelType::Keypoint,
        LabelType::Keypoints,
    ];

    /// The `_cls` name stored on documents of this type.
    pub fn name(&self) -> &'static str {
        match self {
            LabelType::Classification => "Classification",
            LabelType::Classifications => "Classifications",
            LabelType::Detection => "Detection",
            LabelType::Detections => "Detections",
            LabelType::Polyline => "Polyline",
            LabelType::Polylines => "Polylines",
            LabelType::Keypoint => "Keypoint",
            LabelType::Keypoints => "Keypoints",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Name of the attribute holding the labels, for list types.
    pub fn list_attr(&self) -> Option<&'static str> {
        match self {
            LabelType::Classifications => Some("classifications"),
            LabelType::Detections => Some("detections"),
            LabelType::Polylines => Some("polylines"),
            LabelType::Keypoints => Some("keypoints"),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        self.list_attr().is_some()
    }

    /// The type of a single element: `Detections` → `Detection`.
    pub fn element_type(&self) -> LabelType {
        match self {
            LabelType::Classifications => LabelType::Classification,
            LabelType::Detections => LabelType::Detection,
            LabelType::Polylines => LabelType::Polyline,
            LabelType::Keypoints => LabelType::Keypoint,
            other => *other,
        }
    }

    /// The container type for a single element: `Detection` → `Detections`.
    pub fn list_type(&self) -> LabelType {
        match self {
            LabelType::Classification => LabelType::Classifications,
            LabelType::Detection => LabelType::Detections,
            LabelType::Polyline => LabelType::Polylines,
            LabelType::Keypoint => LabelType::Keypoints,
            other => *other,
        }
    }

    /// Read the label type off a stored document's `_cls` key.
    pub fn of_document(doc: &Value) -> Option<Self> {
        doc.get("_cls").and_then(Value::as_str).and_then(Self::from_name)
    }
}

impl fmt::Display for LabelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// LabelField
// ============================================================================

/// Whether a field stores a bare label or a list container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Scalar,
    List { attr: &'static str },
}

/// A resolved label field: its name, declared type and storage shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelField {
    pub name: String,
    pub label_type: LabelType,
    pub kind: LabelKind,
}

impl LabelField {
    pub fn new(name: impl Into<String>, label_type: LabelType) -> Self {
        let kind = match label_type.list_attr() {
            Some(attr) => LabelKind::List { attr },
            None => LabelKind::Scalar,
        };
        Self {
            name: name.into(),
            label_type,
            kind,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, LabelKind::List { .. })
    }

    /// Path of the label document(s): `field` or `field.<list_attr>`.
    pub fn label_path(&self) -> String {
        match self.kind {
            LabelKind::Scalar => self.name.clone(),
            LabelKind::List { attr } => format!("{}.{attr}", self.name),
        }
    }

    /// Path of an attribute of each label, e.g. `field.detections.id`.
    /// With `None`, same as [`label_path`](Self::label_path).
    pub fn path(&self, attr: Option<&str>) -> String {
        match attr {
            Some(attr) => format!("{}.{attr}", self.label_path()),
            None => self.label_path(),
        }
    }

    /// Path of the label ids.
    pub fn id_path(&self) -> String {
        self.path(Some("id"))
    }

    /// The label payload of a field value as written back by id: the inner
    /// list for list fields, the bare label otherwise. `None` when absent.
    pub fn payload<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let payload = match self.kind {
            LabelKind::Scalar => value,
            LabelKind::List { attr } => value.get(attr)?,
        };
        if payload.is_null() {
            None
        } else {
            Some(payload)
        }
    }

    /// All label documents held by a field value.
    pub fn labels<'a>(&self, value: &'a Value) -> Vec<&'a Value> {
        match self.payload(value) {
            None => Vec::new(),
            Some(Value::Array(items)) => items.iter().filter(|v| v.is_object()).collect(),
            Some(label) if label.is_object() => vec![label],
            Some(_) => Vec::new(),
        }
    }

    /// Mutable access to every label document held by a field value.
    pub fn labels_mut<'a>(&self, value: &'a mut Value) -> Vec<&'a mut Value> {
        let payload = match self.kind {
            LabelKind::Scalar => Some(value),
            LabelKind::List { attr } => value.get_mut(attr),
        };
        match payload {
            Some(Value::Array(items)) => items.iter_mut().filter(|v| v.is_object()).collect(),
            Some(label) if label.is_object() => vec![label],
            _ => Vec::new(),
        }
    }

    /// Ids of every label held by a field value.
    pub fn label_ids(&self, value: &Value) -> Vec<String> {
        self.labels(value)
            .into_iter()
            .filter_map(|l| l.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    /// Wrap a list of label documents into this field's container.
    pub fn container(&self, labels: Vec<Value>) -> Value {
        match self.kind {
            LabelKind::Scalar => labels.into_iter().next().unwrap_or(Value::Null),
            LabelKind::List { attr } => {
                let mut obj = serde_json::Map::new();
                obj.insert(
                    "_cls".to_string(),
                    Value::String(self.label_type.name().to_string()),
                );
                obj.insert(attr.to_string(), Value::Array(labels));
                Value::Object(obj)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
