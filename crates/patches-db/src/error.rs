use thiserror::Error;

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Dataset \"{dataset}\" has no field \"{field}\"")]
    FieldNotFound { dataset: String, field: String },

    #[error("Field \"{field}\" of dataset \"{dataset}\" is not a label field")]
    NotALabelField { dataset: String, field: String },

    #[error("Field \"{field}\" holds {existing} labels, cannot store {received}")]
    LabelTypeMismatch {
        field: String,
        existing: String,
        received: String,
    },

    #[error("{stage} does not support {label_type} labels (field \"{field}\")")]
    UnsupportedLabelType {
        stage: String,
        field: String,
        label_type: String,
    },
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Dataset \"{0}\" not found")]
    DatasetNotFound(String),

    #[error("Dataset \"{0}\" already exists")]
    DatasetExists(String),

    #[error("Sample not found: {dataset}/{id}")]
    SampleNotFound { dataset: String, id: String },

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Expected {expected} values for \"{path}\", received {received}")]
    ValueCountMismatch {
        path: String,
        expected: usize,
        received: usize,
    },

    #[error("Dataset \"{dataset}\" has no evaluation with key \"{key}\"")]
    EvaluationNotFound { dataset: String, key: String },
}

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid regex: {0}")]
    InvalidRegex(String),
}

// ---------------------------------------------------------------------------
// PatchesDbError (top-level rollup)
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PatchesDbError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl PatchesDbError {
    /// True when the error reports a dataset that no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PatchesDbError::Storage(StorageError::DatasetNotFound(_))
        )
    }
}

/// Convenience alias. The default error type is `PatchesDbError`.
pub type Result<T, E = PatchesDbError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
