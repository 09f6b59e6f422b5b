use thiserror::Error;

/// What was wrong with a required archive field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldFault {
    #[error("is missing")]
    Missing,
    #[error("is empty")]
    Empty,
    #[error("has the wrong type: {0}")]
    WrongType(String),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A required field could not be read back. Identifier and location are
    /// needed for the later lookup, so they are never defaulted.
    #[error("malformed record: `{field}` {fault}")]
    MalformedRecord {
        field: &'static str,
        fault: FieldFault,
    },

    #[error("annex in `{field}` does not decode as the requested type: {reason}")]
    MalformedAnnex { field: &'static str, reason: String },

    #[error("failed to encode `{field}`: {reason}")]
    Encode { field: &'static str, reason: String },

    #[error("archive is not a keyed object: {0}")]
    Format(String),
}

impl ArchiveError {
    pub fn is_malformed_record(&self) -> bool {
        matches!(self, ArchiveError::MalformedRecord { .. })
    }

    /// Field the error refers to, if any
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ArchiveError::MalformedRecord { field, .. }
            | ArchiveError::MalformedAnnex { field, .. }
            | ArchiveError::Encode { field, .. } => Some(field),
            ArchiveError::Format(_) => None,
        }
    }
}
