//! Dataset: an ordered, in-memory sample store behind a shared handle.
//!
//! Cloning a `Dataset` clones the handle, not the samples: every clone
//! observes the same state, including deletion. Once deleted, every access
//! fails with `StorageError::DatasetNotFound`.
//!
//! Interior mutability via `parking_lot::RwLock`. Locks are held only for the
//! duration of a single operation and never across calls into other
//! collections.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::error::{Result, StorageError};
use crate::patches::{PatchesStage, PatchesView, PipelineStage};
use crate::query::stages::{label_id, sample_id};
use crate::schema::{root_field, LabelField, LabelKind, LabelType, Schema};
use crate::types::{new_id, EvaluationConfig, EvaluationInfo, FieldSelection, LabelTagEdit};

use super::database::{Database, Registry};
use super::traits::SampleCollection;
use super::view::DatasetView;

// ============================================================================
// State
// ============================================================================

struct DatasetState {
    name: String,
    samples: Vec<Value>,
    schema: Schema,
    evaluations: BTreeMap<String, EvaluationInfo>,
    deleted: bool,
    registry: Option<Weak<Registry>>,
}

impl DatasetState {
    fn live(&self) -> Result<()> {
        if self.deleted {
            return Err(StorageError::DatasetNotFound(self.name.clone()).into());
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.samples.iter().position(|s| sample_id(s) == Some(id))
    }

    fn index(&self) -> HashMap<String, usize> {
        self.samples
            .iter()
            .enumerate()
            .filter_map(|(i, s)| sample_id(s).map(|id| (id.to_string(), i)))
            .collect()
    }

    fn label_field(&self, field: &str) -> Result<LabelField> {
        self.schema.label_field(&self.name, field)
    }

    /// Assign ids (and empty tag lists) to labels that lack them.
    fn stamp_labels(&self, sample: &mut Value) {
        for field in self.schema.label_fields() {
            let Some(value) = sample.get_mut(&field.name) else {
                continue;
            };
            for label in field.labels_mut(value) {
                let Some(obj) = label.as_object_mut() else {
                    continue;
                };
                if !obj.get("id").is_some_and(Value::is_string) {
                    obj.insert("id".to_string(), Value::String(new_id()));
                }
                obj.entry("tags")
                    .or_insert_with(|| Value::Array(Vec::new()));
            }
        }
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// Shared handle to an in-memory dataset.
#[derive(Clone)]
pub struct Dataset {
    state: Arc<RwLock<DatasetState>>,
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Dataset")
            .field("name", &state.name)
            .field("samples", &state.samples.len())
            .field("deleted", &state.deleted)
            .finish()
    }
}

/// Non-owning handle to a dataset, held by registries that must not keep
/// derived datasets alive.
#[derive(Clone)]
pub(crate) struct WeakDataset {
    state: Weak<RwLock<DatasetState>>,
}

impl WeakDataset {
    pub(crate) fn upgrade(&self) -> Option<Dataset> {
        self.state.upgrade().map(|state| Dataset { state })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.state.strong_count() > 0
    }
}

impl Dataset {
    /// Create a standalone dataset that belongs to no [`Database`].
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    pub(crate) fn with_registry(name: String, registry: Weak<Registry>) -> Self {
        Self::build(name, Some(registry))
    }

    fn build(name: String, registry: Option<Weak<Registry>>) -> Self {
        Self {
            state: Arc::new(RwLock::new(DatasetState {
                name,
                samples: Vec::new(),
                schema: Schema::new(),
                evaluations: BTreeMap::new(),
                deleted: false,
                registry,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn is_deleted(&self) -> bool {
        self.state.read().deleted
    }

    pub(crate) fn downgrade(&self) -> WeakDataset {
        WeakDataset {
            state: Arc::downgrade(&self.state),
        }
    }

    /// True if both handles refer to the same dataset.
    pub fn same_as(&self, other: &Dataset) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// The database this dataset is registered in, if any.
    pub fn database(&self) -> Option<Database> {
        let state = self.state.read();
        let registry = state.registry.as_ref()?.upgrade()?;
        Some(Database::from_registry(registry))
    }

    pub fn len(&self) -> Result<usize> {
        let state = self.state.read();
        state.live()?;
        Ok(state.samples.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn schema(&self) -> Result<Schema> {
        let state = self.state.read();
        state.live()?;
        Ok(state.schema.clone())
    }

    pub fn add_label_field(&self, field: &str, label_type: LabelType) -> Result<()> {
        let mut state = self.state.write();
        state.live()?;
        state.schema.add_label_field(field, label_type)
    }

    // -----------------------------------------------------------------------
    // Samples
    // -----------------------------------------------------------------------

    /// Add a sample, returning its id. A missing `id` is generated, as are the
    /// ids of any labels that lack one.
    pub fn add_sample(&self, sample: Value) -> Result<String> {
        Ok(self.add_samples([sample])?.remove(0))
    }

    pub fn add_samples(&self, samples: impl IntoIterator<Item = Value>) -> Result<Vec<String>> {
        let mut state = self.state.write();
        state.live()?;

        let mut ids = Vec::new();
        for mut sample in samples {
            if !sample.is_object() {
                return Err(StorageError::InvalidSample(format!(
                    "expected an object, received {sample}"
                ))
                .into());
            }
            let existing = sample_id(&sample).map(str::to_string);
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = new_id();
                    sample["id"] = Value::String(id.clone());
                    id
                }
            };
            if state.position(&id).is_some() {
                return Err(StorageError::InvalidSample(format!("duplicate sample id {id}")).into());
            }
            state.schema.expand(&sample)?;
            state.stamp_labels(&mut sample);
            state.samples.push(sample);
            ids.push(id);
        }
        trace!(dataset = %state.name, added = ids.len(), "added samples");
        Ok(ids)
    }

    pub fn sample(&self, id: &str) -> Result<Option<Value>> {
        let state = self.state.read();
        state.live()?;
        Ok(state.position(id).map(|i| state.samples[i].clone()))
    }

    /// Overwrite the top-level fields present in `doc` on the sample `doc.id`.
    pub fn update_sample(&self, doc: &Value) -> Result<()> {
        self.merge_sample(doc, false)
    }

    /// Like [`update_sample`](Self::update_sample), but when `merge_labels` is
    /// set, label fields are merged by label id instead of replaced, so a doc
    /// read through a label-filtering view does not drop hidden labels.
    pub(crate) fn merge_sample(&self, doc: &Value, merge_labels: bool) -> Result<()> {
        let mut state = self.state.write();
        state.live()?;

        let Some(id) = sample_id(doc) else {
            return Err(StorageError::InvalidSample("sample has no id".to_string()).into());
        };
        let Some(pos) = state.position(id) else {
            return Err(StorageError::SampleNotFound {
                dataset: state.name.clone(),
                id: id.to_string(),
            }
            .into());
        };
        let Some(fields) = doc.as_object() else {
            return Ok(());
        };

        state.schema.expand(doc)?;
        let label_fields: HashMap<String, LabelField> = state
            .schema
            .label_fields()
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();

        let mut sample = std::mem::take(&mut state.samples[pos]);
        for (key, value) in fields {
            if key == "id" {
                continue;
            }
            match label_fields.get(key) {
                Some(field) if merge_labels => {
                    let target = object_entry(&mut sample, key);
                    merge_labels_by_id(field, target, value);
                }
                _ => {
                    *object_entry(&mut sample, key) = value.clone();
                }
            }
        }
        state.stamp_labels(&mut sample);
        state.samples[pos] = sample;
        Ok(())
    }

    /// Delete samples by id. Returns how many were removed.
    pub fn delete_samples(&self, ids: &[String]) -> Result<usize> {
        let mut state = self.state.write();
        state.live()?;
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = state.samples.len();
        state
            .samples
            .retain(|s| !sample_id(s).is_some_and(|id| ids.contains(id)));
        Ok(before - state.samples.len())
    }

    /// Write one value per sample at `path`. See [`DatasetView::set_values`].
    pub fn set_values(&self, path: &str, values: Vec<Value>) -> Result<()> {
        self.view().set_values(path, values)
    }

    /// Merge the root field of `path` from view documents back into the
    /// dataset. Whole-field writes replace; writes below a label field merge
    /// the view's labels by id.
    pub(crate) fn write_view_field(&self, path: &str, docs: &[Value]) -> Result<()> {
        let mut state = self.state.write();
        state.live()?;

        let root = root_field(path);
        let label_field = state.label_field(root).ok();
        let index = state.index();

        for doc in docs {
            let Some(pos) = sample_id(doc).and_then(|id| index.get(id)) else {
                continue;
            };
            let incoming = doc.get(root).cloned().unwrap_or(Value::Null);
            let sample = &mut state.samples[*pos];
            match &label_field {
                Some(field) if path != root => {
                    merge_labels_by_id(field, object_entry(sample, root), &incoming);
                }
                _ => *object_entry(sample, root) = incoming,
            }
        }

        for doc in docs {
            if let Some(value) = doc.get(root) {
                let mut partial = Map::new();
                partial.insert(root.to_string(), value.clone());
                state.schema.expand(&Value::Object(partial))?;
            }
        }
        Ok(())
    }

    /// Write the contents of a view back to the dataset.
    ///
    /// With `FieldSelection::All` the dataset is overwritten: samples absent
    /// from `docs` are deleted and the rest are replaced. With explicit fields
    /// only those fields of the samples in `docs` are written; every other
    /// sample is left alone.
    pub(crate) fn save_view(&self, docs: Vec<Value>, fields: &FieldSelection) -> Result<()> {
        let mut state = self.state.write();
        state.live()?;

        let keep: HashMap<String, Value> = docs
            .into_iter()
            .filter_map(|d| {
                let id = sample_id(&d)?.to_string();
                Some((id, d))
            })
            .collect();

        let before = state.samples.len();
        if fields.is_all() {
            state
                .samples
                .retain(|s| sample_id(s).is_some_and(|id| keep.contains_key(id)));
        }
        let removed = before - state.samples.len();

        for sample in state.samples.iter_mut() {
            let Some(view_doc) = sample_id(sample).and_then(|id| keep.get(id)) else {
                continue;
            };
            match fields {
                FieldSelection::All => *sample = view_doc.clone(),
                FieldSelection::Only(names) => {
                    for name in names {
                        match view_doc.get(name) {
                            Some(v) => *object_entry(sample, name) = v.clone(),
                            None => {
                                if let Some(obj) = sample.as_object_mut() {
                                    obj.remove(name);
                                }
                            }
                        }
                    }
                }
            }
        }

        debug!(dataset = %state.name, kept = state.samples.len(), removed, "saved view");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Labels
    // -----------------------------------------------------------------------

    /// Upsert label payloads into `field` of the given samples, by label id.
    ///
    /// List fields replace the element with a matching id or append it,
    /// creating the container when the field is empty. Scalar fields are
    /// overwritten. Null or empty payloads are skipped, as are sample ids the
    /// dataset does not hold. Returns the number of samples written.
    pub(crate) fn write_labels_by_id(
        &self,
        field: &str,
        sample_ids: &[String],
        docs: &[Value],
    ) -> Result<usize> {
        let mut state = self.state.write();
        state.live()?;

        let label_field = state.label_field(field)?;
        let index = state.index();
        let name = state.name.clone();

        let mut written = 0;
        for (sid, doc) in sample_ids.iter().zip(docs) {
            if is_empty_payload(doc) {
                continue;
            }
            let Some(pos) = index.get(sid) else {
                warn!(dataset = %name, sample_id = %sid, field, "label write targets unknown sample");
                continue;
            };
            let target = object_entry(&mut state.samples[*pos], field);
            match label_field.kind {
                LabelKind::Scalar => *target = doc.clone(),
                LabelKind::List { .. } => {
                    let labels = match doc {
                        Value::Array(items) => items.clone(),
                        other => vec![other.clone()],
                    };
                    upsert_labels(&label_field, target, labels);
                }
            }
            trace!(dataset = %name, sample_id = %sid, field, "wrote labels");
            written += 1;
        }
        Ok(written)
    }

    /// Remove labels with the given ids from `field` across all samples.
    /// Returns the number of labels removed.
    pub(crate) fn remove_labels_by_id(&self, ids: &HashSet<String>, field: &str) -> Result<usize> {
        let mut state = self.state.write();
        state.live()?;
        let label_field = state.label_field(field)?;

        let mut removed = 0;
        for sample in state.samples.iter_mut() {
            let Some(value) = sample.get_mut(field) else {
                continue;
            };
            match label_field.kind {
                LabelKind::Scalar => {
                    if label_id(value).is_some_and(|id| ids.contains(id)) {
                        *value = Value::Null;
                        removed += 1;
                    }
                }
                LabelKind::List { attr } => {
                    if let Some(items) = value.get_mut(attr).and_then(Value::as_array_mut) {
                        let before = items.len();
                        items.retain(|l| !label_id(l).is_some_and(|id| ids.contains(id)));
                        removed += before - items.len();
                    }
                }
            }
        }
        debug!(dataset = %state.name, field, removed, "deleted labels");
        Ok(removed)
    }

    /// Apply a tag edit to labels of `field`; all of them when `ids` is `None`.
    /// Returns the number of labels changed.
    pub(crate) fn edit_tags_by_id(
        &self,
        field: &str,
        ids: Option<&HashSet<String>>,
        edit: &LabelTagEdit,
    ) -> Result<usize> {
        let mut state = self.state.write();
        state.live()?;
        let label_field = state.label_field(field)?;

        let mut changed = 0;
        for sample in state.samples.iter_mut() {
            let Some(value) = sample.get_mut(field) else {
                continue;
            };
            for label in label_field.labels_mut(value) {
                let selected = match ids {
                    Some(ids) => label_id(label).is_some_and(|id| ids.contains(id)),
                    None => true,
                };
                if selected && edit.apply(label) {
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    // -----------------------------------------------------------------------
    // Evaluations
    // -----------------------------------------------------------------------

    /// Record an evaluation run under `key`, replacing any previous run.
    pub fn register_evaluation(&self, key: &str, config: EvaluationConfig) -> Result<EvaluationInfo> {
        let mut state = self.state.write();
        state.live()?;
        let info = EvaluationInfo {
            key: key.to_string(),
            timestamp: Utc::now(),
            config,
        };
        state.evaluations.insert(key.to_string(), info.clone());
        Ok(info)
    }

    pub fn evaluation_info(&self, key: &str) -> Result<EvaluationInfo> {
        let state = self.state.read();
        state.live()?;
        state.evaluations.get(key).cloned().ok_or_else(|| {
            StorageError::EvaluationNotFound {
                dataset: state.name.clone(),
                key: key.to_string(),
            }
            .into()
        })
    }

    pub fn list_evaluations(&self) -> Result<Vec<String>> {
        let state = self.state.read();
        state.live()?;
        Ok(state.evaluations.keys().cloned().collect())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Delete the dataset. Every handle observes the deletion; the dataset is
    /// also removed from its database.
    pub fn delete(&self) -> Result<()> {
        let (name, registry) = {
            let mut state = self.state.write();
            state.live()?;
            state.deleted = true;
            state.samples.clear();
            state.evaluations.clear();
            (state.name.clone(), state.registry.take())
        };
        if let Some(registry) = registry.and_then(|r| r.upgrade()) {
            registry.lock().remove(&name);
        }
        debug!(dataset = %name, "deleted dataset");
        Ok(())
    }

    /// Refresh in-memory state from storage. Samples live in memory only, so
    /// this just checks the dataset still exists.
    pub fn reload(&self) -> Result<()> {
        let state = self.state.read();
        state.live()?;
        trace!(dataset = %state.name, "reloaded dataset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn view(&self) -> DatasetView {
        DatasetView::new(self.clone(), Vec::new())
    }

    pub fn to_patches(&self, field: &str) -> Result<PatchesView> {
        PatchesStage::to_patches(field).load_view(Arc::new(self.clone()))
    }

    pub fn to_evaluation_patches(&self, eval_key: &str) -> Result<PatchesView> {
        PatchesStage::to_evaluation_patches(eval_key).load_view(Arc::new(self.clone()))
    }
}

impl SampleCollection for Dataset {
    fn name(&self) -> String {
        Dataset::name(self)
    }

    fn dataset(&self) -> Dataset {
        self.clone()
    }

    fn all_stages(&self) -> Vec<PipelineStage> {
        Vec::new()
    }

    fn label_field(&self, field: &str) -> Result<LabelField> {
        let state = self.state.read();
        state.live()?;
        state.label_field(field)
    }

    fn label_fields(&self) -> Result<Vec<LabelField>> {
        Ok(self.schema()?.label_fields())
    }

    fn samples(&self) -> Result<Vec<Value>> {
        let state = self.state.read();
        state.live()?;
        Ok(state.samples.clone())
    }

    fn count(&self) -> Result<usize> {
        self.len()
    }

    fn select_labels(&self, ids: &[String], field: &str) -> Result<DatasetView> {
        self.view().select_labels(ids, field)
    }

    fn edit_label_tags(&self, edit: &LabelTagEdit, fields: &FieldSelection) -> Result<()> {
        for field in self.label_fields()? {
            if fields.contains(&field.name) {
                self.edit_tags_by_id(&field.name, None, edit)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Mutable access to `key` of an object, inserting null if absent. Non-object
/// samples are replaced with an empty object first.
fn object_entry<'a>(sample: &'a mut Value, key: &str) -> &'a mut Value {
    if !sample.is_object() {
        *sample = Value::Object(Map::new());
    }
    &mut sample[key]
}

fn is_empty_payload(doc: &Value) -> bool {
    match doc {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Insert or replace labels in a list container, by id.
fn upsert_labels(field: &LabelField, target: &mut Value, labels: Vec<Value>) {
    let LabelKind::List { attr } = field.kind else {
        return;
    };
    if !target.is_object() {
        *target = field.container(Vec::new());
    }
    let items = object_entry(target, attr);
    if !items.is_array() {
        *items = Value::Array(Vec::new());
    }
    let Value::Array(items) = items else {
        return;
    };
    for label in labels {
        let existing = label_id(&label)
            .and_then(|id| items.iter().position(|l| label_id(l) == Some(id)));
        match existing {
            Some(i) => items[i] = label,
            None => items.push(label),
        }
    }
}

/// Merge the labels of `incoming` into `target` by id. A null scalar never
/// overwrites, since a filtered view shows hidden labels as null.
fn merge_labels_by_id(field: &LabelField, target: &mut Value, incoming: &Value) {
    match field.kind {
        LabelKind::Scalar => {
            if !incoming.is_null() {
                *target = incoming.clone();
            }
        }
        LabelKind::List { .. } => {
            let labels: Vec<Value> = field.labels(incoming).into_iter().cloned().collect();
            upsert_labels(field, target, labels);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
