//! Constructors for embedded label documents.
//!
//! Every label gets a fresh id and an empty tag list. List constructors wrap
//! their elements in the matching container.

use serde_json::{json, Map, Value};

use crate::schema::{LabelField, LabelType};
use crate::types::new_id;

fn label(label_type: LabelType, name: &str, mut attrs: Map<String, Value>) -> Value {
    attrs.insert("_cls".to_string(), json!(label_type.name()));
    attrs.insert("id".to_string(), json!(new_id()));
    attrs.insert("label".to_string(), json!(name));
    attrs.insert("tags".to_string(), json!([]));
    Value::Object(attrs)
}

fn container(label_type: LabelType, labels: Vec<Value>) -> Value {
    LabelField::new("", label_type).container(labels)
}

pub fn classification(name: &str) -> Value {
    label(LabelType::Classification, name, Map::new())
}

pub fn classifications(labels: Vec<Value>) -> Value {
    container(LabelType::Classifications, labels)
}

/// A detection with a `[x, y, width, height]` box in relative coordinates.
pub fn detection(name: &str, bounding_box: [f64; 4]) -> Value {
    let mut attrs = Map::new();
    attrs.insert("bounding_box".to_string(), json!(bounding_box));
    label(LabelType::Detection, name, attrs)
}

pub fn detections(labels: Vec<Value>) -> Value {
    container(LabelType::Detections, labels)
}

/// A polyline made of one or more shapes of `(x, y)` points.
pub fn polyline(name: &str, points: Vec<Vec<[f64; 2]>>, closed: bool, filled: bool) -> Value {
    let mut attrs = Map::new();
    attrs.insert("points".to_string(), json!(points));
    attrs.insert("closed".to_string(), json!(closed));
    attrs.insert("filled".to_string(), json!(filled));
    label(LabelType::Polyline, name, attrs)
}

pub fn polylines(labels: Vec<Value>) -> Value {
    container(LabelType::Polylines, labels)
}

pub fn keypoint(name: &str, points: Vec<[f64; 2]>) -> Value {
    let mut attrs = Map::new();
    attrs.insert("points".to_string(), json!(points));
    label(LabelType::Keypoint, name, attrs)
}

pub fn keypoints(labels: Vec<Value>) -> Value {
    container(LabelType::Keypoints, labels)
}

/// Set `key` on a label document, returning it.
pub fn with_attr(mut label: Value, key: &str, value: Value) -> Value {
    if let Some(obj) = label.as_object_mut() {
        obj.insert(key.to_string(), value);
    }
    label
}

pub fn with_confidence(label: Value, confidence: f64) -> Value {
    with_attr(label, "confidence", json!(confidence))
}
