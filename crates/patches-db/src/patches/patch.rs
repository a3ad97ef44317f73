//! Patch: one element of a patches view.

use std::fmt;

use serde_json::Value;

use crate::error::Result;
use crate::query::operators::resolve_path;
use crate::query::stages::sample_id;

use super::view::PatchesView;

/// A patch read from a [`PatchesView`]. Edits stay local until
/// [`save`](Patch::save), which commits the patch and writes its labels back
/// to the source sample.
pub struct Patch<'a> {
    doc: Value,
    view: &'a PatchesView,
}

impl fmt::Debug for Patch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch").field("doc", &self.doc).finish()
    }
}

impl<'a> Patch<'a> {
    pub(crate) fn new(doc: Value, view: &'a PatchesView) -> Self {
        Self { doc, view }
    }

    /// The patch's own id in the patches dataset.
    pub fn id(&self) -> &str {
        sample_id(&self.doc).unwrap_or_default()
    }

    /// Id of the source sample the patch was extracted from.
    pub fn sample_id(&self) -> &str {
        self.doc
            .get("sample_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        resolve_path(&self.doc, path)
    }

    /// Set a top-level field.
    pub fn set(&mut self, field: &str, value: Value) {
        if let Some(obj) = self.doc.as_object_mut() {
            obj.insert(field.to_string(), value);
        }
    }

    /// The stored value of a label field: a list container or a bare label.
    pub fn label(&self, field: &str) -> Option<&Value> {
        self.doc.get(field).filter(|v| !v.is_null())
    }

    pub fn label_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.doc.get_mut(field).filter(|v| !v.is_null())
    }

    pub fn doc(&self) -> &Value {
        &self.doc
    }

    pub fn into_doc(self) -> Value {
        self.doc
    }

    pub fn save(&self) -> Result<()> {
        self.view.save_patch(&self.doc)
    }
}
