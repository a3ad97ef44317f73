//! View stages and their in-memory execution.
//!
//! A view is a dataset plus an ordered list of stages; executing the view
//! runs every stage over the dataset's samples in order. Stages never mutate
//! the dataset, they only narrow, reorder or filter copies of its documents.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::schema::{LabelField, LabelKind, Schema};

use super::operators::{compare_values, matches_filter, resolve_path};

/// A single step in a view's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "args", rename_all = "snake_case")]
pub enum ViewStage {
    /// Keep samples matching a filter.
    Match(Value),
    /// Keep samples whose field is (or is not) set.
    Exists { field: String, exists: bool },
    /// Keep only the samples with these ids.
    Select(Vec<String>),
    /// Drop the samples with these ids.
    Exclude(Vec<String>),
    SortBy { field: String, descending: bool },
    Skip(usize),
    Limit(usize),
    /// Keep only the labels with these ids, dropping samples left with none.
    /// An empty `fields` list means every label field.
    SelectLabels { ids: Vec<String>, fields: Vec<String> },
    /// Keep only the labels of `field` matching `filter`.
    FilterLabels {
        field: String,
        filter: Value,
        only_matches: bool,
    },
}

impl ViewStage {
    pub fn name(&self) -> &'static str {
        match self {
            ViewStage::Match(_) => "Match",
            ViewStage::Exists { .. } => "Exists",
            ViewStage::Select(_) => "Select",
            ViewStage::Exclude(_) => "Exclude",
            ViewStage::SortBy { .. } => "SortBy",
            ViewStage::Skip(_) => "Skip",
            ViewStage::Limit(_) => "Limit",
            ViewStage::SelectLabels { .. } => "SelectLabels",
            ViewStage::FilterLabels { .. } => "FilterLabels",
        }
    }

    /// True for stages that may rewrite label contents rather than just
    /// choosing samples.
    pub fn filters_labels(&self) -> bool {
        matches!(
            self,
            ViewStage::SelectLabels { .. } | ViewStage::FilterLabels { .. }
        )
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Run `stages` over `samples` in order.
pub fn apply_stages(
    mut samples: Vec<Value>,
    stages: &[ViewStage],
    schema: &Schema,
    dataset: &str,
) -> Result<Vec<Value>> {
    for stage in stages {
        samples = apply_stage(samples, stage, schema, dataset)?;
    }
    Ok(samples)
}

fn apply_stage(
    samples: Vec<Value>,
    stage: &ViewStage,
    schema: &Schema,
    dataset: &str,
) -> Result<Vec<Value>> {
    match stage {
        ViewStage::Match(filter) => {
            let mut kept = Vec::with_capacity(samples.len());
            for sample in samples {
                if matches_filter(&sample, filter)? {
                    kept.push(sample);
                }
            }
            Ok(kept)
        }

        ViewStage::Exists { field, exists } => Ok(samples
            .into_iter()
            .filter(|s| resolve_path(s, field).is_some_and(|v| !v.is_null()) == *exists)
            .collect()),

        ViewStage::Select(ids) => {
            let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
            Ok(samples
                .into_iter()
                .filter(|s| sample_id(s).is_some_and(|id| ids.contains(id)))
                .collect())
        }

        ViewStage::Exclude(ids) => {
            let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
            Ok(samples
                .into_iter()
                .filter(|s| !sample_id(s).is_some_and(|id| ids.contains(id)))
                .collect())
        }

        ViewStage::SortBy { field, descending } => {
            let mut keyed: Vec<(Value, Value)> = samples
                .into_iter()
                .map(|s| (resolve_path(&s, field).unwrap_or(Value::Null), s))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| {
                let cmp = compare_values(a, b);
                if *descending {
                    cmp.reverse()
                } else {
                    cmp
                }
            });
            Ok(keyed.into_iter().map(|(_, s)| s).collect())
        }

        ViewStage::Skip(n) => Ok(samples.into_iter().skip(*n).collect()),

        ViewStage::Limit(n) => Ok(samples.into_iter().take(*n).collect()),

        ViewStage::SelectLabels { ids, fields } => {
            let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
            let label_fields = resolve_fields(schema, dataset, fields)?;
            let mut kept = Vec::with_capacity(samples.len());
            for mut sample in samples {
                let mut remaining = 0;
                for field in &label_fields {
                    remaining += retain_labels(field, &mut sample, |label| {
                        Ok(label_id(label).is_some_and(|id| ids.contains(id)))
                    })?;
                }
                if remaining > 0 {
                    kept.push(sample);
                }
            }
            Ok(kept)
        }

        ViewStage::FilterLabels {
            field,
            filter,
            only_matches,
        } => {
            let label_field = schema.label_field(dataset, field)?;
            let mut kept = Vec::with_capacity(samples.len());
            for mut sample in samples {
                let remaining =
                    retain_labels(&label_field, &mut sample, |label| matches_filter(label, filter))?;
                if remaining > 0 || !only_matches {
                    kept.push(sample);
                }
            }
            Ok(kept)
        }
    }
}

fn resolve_fields(schema: &Schema, dataset: &str, fields: &[String]) -> Result<Vec<LabelField>> {
    if fields.is_empty() {
        return Ok(schema.label_fields());
    }
    fields
        .iter()
        .map(|f| schema.label_field(dataset, f))
        .collect()
}

/// Drop the labels of `field` in `sample` for which `keep` is false and
/// return how many remain.
fn retain_labels<F>(field: &LabelField, sample: &mut Value, mut keep: F) -> Result<usize>
where
    F: FnMut(&Value) -> Result<bool>,
{
    let Some(value) = sample.get_mut(&field.name) else {
        return Ok(0);
    };
    match field.kind {
        LabelKind::Scalar => {
            if value.is_null() {
                return Ok(0);
            }
            if keep(value)? {
                Ok(1)
            } else {
                *value = Value::Null;
                Ok(0)
            }
        }
        LabelKind::List { attr } => {
            let Some(items) = value.get_mut(attr).and_then(Value::as_array_mut) else {
                return Ok(0);
            };
            let mut retained = Vec::with_capacity(items.len());
            for item in items.drain(..) {
                if keep(&item)? {
                    retained.push(item);
                }
            }
            *items = retained;
            Ok(items.len())
        }
    }
}

pub(crate) fn sample_id(sample: &Value) -> Option<&str> {
    sample.get("id").and_then(Value::as_str)
}

pub(crate) fn label_id(label: &Value) -> Option<&str> {
    label.get("id").and_then(Value::as_str)
}

// ============================================================================
// Tests
// ============================================================================
