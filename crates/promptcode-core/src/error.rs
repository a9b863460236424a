//! Error taxonomy for the context pipeline.
//!
//! Every failure the pipeline can produce is a [`ContextError`]. Callers that
//! need to translate failures into exit codes or HTTP statuses match on
//! [`ContextError::kind`] instead of individual variants.

use std::path::PathBuf;

/// Coarse classification of a [`ContextError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The named preset does not exist.
    NotFound,
    /// A file listed by a preset is missing or unreadable.
    FileAccess,
    /// The tokenizer identifier is unknown or could not be initialized.
    Tokenizer,
    /// The preset directory or a preset document could not be read or written.
    Store,
    /// A preset is structurally unusable (empty name, conflicting paths).
    Invalid,
    /// A pipeline task panicked or was cancelled.
    Internal,
}

/// Errors produced by the preset store, token counter, tree builder, and
/// context assembler.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("preset \"{name}\" not found")]
    PresetNotFound { name: String },

    #[error("cannot read {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tokenizer \"{id}\" unavailable: {reason}")]
    Tokenizer { id: String, reason: String },

    #[error("preset store error at {}: {source}", path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed preset document {}: {source}", path.display())]
    PresetParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid preset: {0}")]
    InvalidPreset(String),

    #[error("path \"{path}\" is used both as a file and as a directory")]
    PathConflict { path: String },

    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ContextError {
    /// Classify this error for callers that map errors onto exit codes or
    /// HTTP statuses.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PresetNotFound { .. } => ErrorKind::NotFound,
            Self::FileAccess { .. } => ErrorKind::FileAccess,
            Self::Tokenizer { .. } => ErrorKind::Tokenizer,
            Self::StoreIo { .. } | Self::PresetParse { .. } => ErrorKind::Store,
            Self::InvalidPreset(_) | Self::PathConflict { .. } => ErrorKind::Invalid,
            Self::Join(_) => ErrorKind::Internal,
        }
    }

    /// Whether this is the "preset not found" case.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ContextError::PresetNotFound {
            name: "demo".to_string(),
        };
        assert_eq!(err.to_string(), "preset \"demo\" not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_file_access_names_path() {
        let err = ContextError::FileAccess {
            path: PathBuf::from("/ws/src/missing.rs"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/ws/src/missing.rs"));
        assert_eq!(err.kind(), ErrorKind::FileAccess);
    }

    #[test]
    fn test_kinds() {
        let tok = ContextError::Tokenizer {
            id: "nope".to_string(),
            reason: "unknown".to_string(),
        };
        assert_eq!(tok.kind(), ErrorKind::Tokenizer);

        let conflict = ContextError::PathConflict {
            path: "a".to_string(),
        };
        assert_eq!(conflict.kind(), ErrorKind::Invalid);
        assert!(!conflict.is_not_found());
    }
}
