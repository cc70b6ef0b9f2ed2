use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::FieldValue;

/// Failures while loading, grouping, aggregating or placing a series on a figure.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("source '{source_id}' not found at {}", path.display())]
    SourceNotFound { source_id: String, path: PathBuf },
    #[error("source '{source_id}' could not be read: {source}")]
    Io {
        source_id: String,
        #[source]
        source: io::Error,
    },
    #[error("source '{source_id}' is not a sequence of flat records: {reason}")]
    Malformed { source_id: String, reason: String },
    #[error("record {index} with {key_field} = {key_value} has no '{field}' field")]
    MissingField {
        field: String,
        key_field: String,
        key_value: FieldValue,
        index: usize,
    },
    #[error("record {index} has non-numeric '{field}' value {value}")]
    NonNumericValue {
        field: String,
        value: FieldValue,
        index: usize,
    },
    #[error(
        "group {key_field} = {key_value} has {found} '{value_field}' samples, expected {expected}"
    )]
    ShapeMismatch {
        key_field: String,
        value_field: String,
        key_value: FieldValue,
        expected: usize,
        found: usize,
    },
    #[error("group key {key_value} of '{key_field}' cannot be placed on a numeric axis")]
    NonNumericKey {
        key_field: String,
        key_value: FieldValue,
    },
    #[error("no shared axis is open; call open_shared_axis before add_series")]
    NoSharedAxis,
}

impl ReportError {
    /// True for the errors raised while resolving and reading a source.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. } | Self::Io { .. } | Self::Malformed { .. }
        )
    }
}
