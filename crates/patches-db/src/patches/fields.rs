//! Which label fields a patches view keeps in sync with its source.

use crate::types::FieldSelection;

/// The label fields tracked by a patches view.
///
/// A plain patches view tracks the one field its patches were extracted
/// from; an evaluation patches view tracks the ground truth and prediction
/// fields of the evaluation run, resolved once when the view is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackedFields {
    Patches {
        field: String,
    },
    Evaluation {
        eval_key: String,
        gt_field: String,
        pred_field: String,
    },
}

impl TrackedFields {
    pub fn label_fields(&self) -> Vec<String> {
        match self {
            TrackedFields::Patches { field } => vec![field.clone()],
            TrackedFields::Evaluation {
                gt_field,
                pred_field,
                ..
            } => vec![gt_field.clone(), pred_field.clone()],
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        match self {
            TrackedFields::Patches { field: f } => f == field,
            TrackedFields::Evaluation {
                gt_field,
                pred_field,
                ..
            } => gt_field == field || pred_field == field,
        }
    }

    /// Tracked fields covered by `fields`. Untracked names are dropped.
    pub fn select(&self, fields: &FieldSelection) -> Vec<String> {
        fields.restrict(&self.label_fields())
    }
}
