//! Dataset schema: which top-level fields exist and which of them hold labels.

pub mod field;
pub mod path;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Result, SchemaError};

pub use field::{LabelField, LabelKind, LabelType};
pub use path::{root_field, split_path};

/// Kind of a top-level sample field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Label(LabelType),
    Primitive,
}

/// Dynamic schema of a dataset, grown as samples are added.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: BTreeMap<String, FieldKind>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<FieldKind> {
        self.fields.get(field).copied()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Declare a label field. Re-declaring with the same type is a no-op.
    pub fn add_label_field(&mut self, field: &str, label_type: LabelType) -> Result<()> {
        match self.fields.get(field) {
            Some(FieldKind::Label(existing)) if *existing != label_type => {
                Err(SchemaError::LabelTypeMismatch {
                    field: field.to_string(),
                    existing: existing.name().to_string(),
                    received: label_type.name().to_string(),
                }
                .into())
            }
            Some(FieldKind::Primitive) => Err(SchemaError::LabelTypeMismatch {
                field: field.to_string(),
                existing: "primitive".to_string(),
                received: label_type.name().to_string(),
            }
            .into()),
            _ => {
                self.fields
                    .insert(field.to_string(), FieldKind::Label(label_type));
                Ok(())
            }
        }
    }

    /// Declare a non-label field, unless the name is already known.
    pub fn add_primitive_field(&mut self, field: &str) {
        self.fields
            .entry(field.to_string())
            .or_insert(FieldKind::Primitive);
    }

    /// Grow the schema with the top-level fields of `sample`. Objects carrying
    /// a known `_cls` register as label fields; nulls register nothing.
    pub fn expand(&mut self, sample: &Value) -> Result<()> {
        let Some(obj) = sample.as_object() else {
            return Ok(());
        };
        for (key, value) in obj {
            if value.is_null() {
                continue;
            }
            match LabelType::of_document(value) {
                Some(label_type) => self.add_label_field(key, label_type)?,
                None => self.add_primitive_field(key),
            }
        }
        Ok(())
    }

    /// Resolve `field` to its label descriptor.
    pub fn label_field(&self, dataset: &str, field: &str) -> Result<LabelField> {
        match self.fields.get(field) {
            Some(FieldKind::Label(label_type)) => Ok(LabelField::new(field, *label_type)),
            Some(FieldKind::Primitive) => Err(SchemaError::NotALabelField {
                dataset: dataset.to_string(),
                field: field.to_string(),
            }
            .into()),
            None => Err(SchemaError::FieldNotFound {
                dataset: dataset.to_string(),
                field: field.to_string(),
            }
            .into()),
        }
    }

    /// Every label field, in name order.
    pub fn label_fields(&self) -> Vec<LabelField> {
        self.fields
            .iter()
            .filter_map(|(name, kind)| match kind {
                FieldKind::Label(t) => Some(LabelField::new(name.clone(), *t)),
                FieldKind::Primitive => None,
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
