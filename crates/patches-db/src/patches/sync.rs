//! SourceSync: write-back of patch edits to the source collection.
//!
//! Every write is keyed by label id: a patch's labels are upserted into the
//! source sample named by its `sample_id`, and labels that disappeared from
//! the patches dataset are deleted from the source by id difference.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace};

use crate::collection::{Dataset, SampleCollection};
use crate::error::Result;
use crate::query::Values;
use crate::types::{FieldSelection, LabelTagEdit};

/// Field holding a patch's source sample id.
const SAMPLE_ID: &str = "sample_id";

// ============================================================================
// SourceSync
// ============================================================================

pub(crate) struct SourceSync<'a> {
    source: &'a dyn SampleCollection,
    patches: &'a Dataset,
}

impl<'a> SourceSync<'a> {
    pub(crate) fn new(source: &'a dyn SampleCollection, patches: &'a Dataset) -> Self {
        Self { source, patches }
    }

    // -----------------------------------------------------------------------
    // Single patch
    // -----------------------------------------------------------------------

    /// Write the labels of one saved patch back to its source sample.
    pub(crate) fn sync_sample(&self, patch: &Value, fields: &[String]) -> Result<()> {
        let Some(sid) = patch.get(SAMPLE_ID).and_then(Value::as_str) else {
            return Ok(());
        };
        for field in fields {
            let label_field = self.patches.label_field(field)?;
            let payload = patch
                .get(field)
                .and_then(|v| label_field.payload(v))
                .cloned()
                .unwrap_or(Value::Null);
            trace!(field = %field, sample_id = sid, "syncing patch");
            self.source
                .set_labels_by_id(field, &[sid.to_string()], &[payload])?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bulk writes
    // -----------------------------------------------------------------------

    /// Write the labels of `field` for every patch visible in `view`.
    ///
    /// Only the patches `view` currently contains are synced.
    pub(crate) fn sync_view_field(&self, view: &dyn SampleCollection, field: &str) -> Result<()> {
        let label_field = self.patches.label_field(field)?;
        let mut results = view.aggregate(&[
            Values::new(SAMPLE_ID),
            Values::new(label_field.label_path()).raw(),
        ])?;
        let docs = results.pop().unwrap_or_default();
        let sample_ids = results.pop().unwrap_or_default();

        let (sample_ids, docs) = pair_by_sample(sample_ids, docs);
        let written = self.source.set_labels_by_id(field, &sample_ids, &docs)?;
        debug!(field, written, "synced view field to source");
        Ok(())
    }

    /// Full write-back of `fields` from the whole patches dataset.
    pub(crate) fn sync_root(&self, fields: &[String]) -> Result<()> {
        for field in fields {
            self.sync_root_field(field)?;
        }
        Ok(())
    }

    /// Upsert every patch's labels of `field`, then delete from the source
    /// the labels no patch holds anymore.
    ///
    /// Reads the patches dataset rather than any view over it, so patches
    /// hidden by a view are neither skipped nor mistaken for deletions.
    pub(crate) fn sync_root_field(&self, field: &str) -> Result<()> {
        let label_field = self.patches.label_field(field)?;
        let mut results = self.patches.aggregate(&[
            Values::new(SAMPLE_ID),
            Values::new(label_field.label_path()).raw(),
            Values::new(label_field.id_path()).unwind(),
        ])?;
        let label_ids = results.pop().unwrap_or_default();
        let docs = results.pop().unwrap_or_default();
        let sample_ids = results.pop().unwrap_or_default();

        let (sample_ids, docs) = pair_by_sample(sample_ids, docs);
        let written = self.source.set_labels_by_id(field, &sample_ids, &docs)?;

        let kept: HashSet<String> = string_values(label_ids).collect();
        let src_id_path = self.source.label_field_path(field, Some("id"))?;
        let delete_ids: HashSet<String> = string_values(self.source.values(&src_id_path, true)?)
            .filter(|id| !kept.contains(id))
            .collect();

        let deleted = if delete_ids.is_empty() {
            0
        } else {
            self.source.delete_labels(&delete_ids, field)?
        };
        debug!(field, written, deleted, "synced patches to source");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// Replay a tag edit on the source labels matching the labels of
    /// `fields` visible in `view`.
    pub(crate) fn sync_label_tags(
        &self,
        view: &dyn SampleCollection,
        edit: &LabelTagEdit,
        fields: &[String],
    ) -> Result<()> {
        for field in fields {
            let id_path = self.patches.label_field(field)?.id_path();
            let ids: Vec<String> = string_values(view.values(&id_path, true)?).collect();
            let source_view = self.source.select_labels(&ids, field)?;
            source_view.edit_label_tags(edit, &FieldSelection::from(field))?;
            debug!(field = %field, labels = ids.len(), "synced label tags to source");
        }
        Ok(())
    }
}

// ============================================================================
// Id index
// ============================================================================

/// Map each label id of `field` in `view` to the id of the patch holding it.
/// Patches without labels contribute nothing.
pub(crate) fn ids_map(
    view: &dyn SampleCollection,
    patches: &Dataset,
    field: &str,
) -> Result<HashMap<String, String>> {
    let label_field = patches.label_field(field)?;
    let mut results = view.aggregate(&[Values::new("id"), Values::new(label_field.id_path())])?;
    let label_ids = results.pop().unwrap_or_default();
    let patch_ids = results.pop().unwrap_or_default();

    let mut map = HashMap::new();
    for (patch_id, ids) in patch_ids.iter().zip(label_ids) {
        let Some(patch_id) = patch_id.as_str() else {
            continue;
        };
        let ids: Vec<Value> = match ids {
            Value::Array(ids) if label_field.is_list() => ids,
            Value::String(_) if !label_field.is_list() => vec![ids],
            _ => continue,
        };
        for id in string_values(ids) {
            map.insert(id, patch_id.to_string());
        }
    }
    Ok(map)
}

// ============================================================================
// Helpers
// ============================================================================

/// Zip aggregated sample ids with label payloads, dropping rows whose
/// sample id is missing.
fn pair_by_sample(sample_ids: Vec<Value>, docs: Vec<Value>) -> (Vec<String>, Vec<Value>) {
    sample_ids
        .into_iter()
        .zip(docs)
        .filter_map(|(sid, doc)| match sid {
            Value::String(sid) => Some((sid, doc)),
            _ => None,
        })
        .unzip()
}

fn string_values(values: Vec<Value>) -> impl Iterator<Item = String> {
    values.into_iter().filter_map(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}
