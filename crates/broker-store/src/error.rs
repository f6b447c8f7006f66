use std::path::PathBuf;

use thiserror::Error;

/// Record store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record under the given key.
    #[error("{kind} record {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Reading or writing the backing file failed.
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record set could not be encoded for persistence.
    #[error("Failed to encode records: {0}")]
    Encode(#[source] serde_json::Error),

    /// The persisted record set could not be decoded.
    #[error("Corrupted record file {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn instance_not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind: "instance",
            id: id.into(),
        }
    }

    pub fn binding_not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind: "binding",
            id: id.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_kind_and_id() {
        let err = StoreError::binding_not_found("b-1");
        assert_eq!(err.to_string(), "binding record b-1 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn io_error_names_path() {
        let err = StoreError::io(
            "/tmp/records.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/records.json"));
        assert!(!err.is_not_found());
    }
}
