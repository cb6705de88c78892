//! Error taxonomy for project and map operations

use thiserror::Error;

use crate::file_system::FileError;

/// Errors raised by project, map, and resource operations
///
/// Validation failures are raised immediately; best-effort cleanup failures
/// (backup clearing, library unload trouble) are logged and swallowed by the
/// operations that perform them, per the propagation policy of this layer.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// No valid context is set, or context validation failed
    #[error("invalid context: {0}")]
    ContextInvalid(String),
    /// A mutating operation was attempted on a read-only context
    #[error("context is read-only: {0}")]
    ReadOnly(String),
    /// An expected file, map, resource, or category does not exist
    #[error("not found: {0}")]
    FileNotFound(String),
    /// A path exists but is the wrong kind for the operation
    #[error("wrong type: {0}")]
    WrongType(String),
    /// An underlying OS operation failed
    #[error("I/O failure: {0}")]
    IoFailure(String),
    /// A map or resource name/file name collides with an existing entry
    #[error("name collision: {0}")]
    NameCollision(String),
    /// A document could not be parsed into a usable map
    #[error("parsing failure: {0}")]
    ParsingFailure(String),
    /// An invariant this layer assumes was violated; programming-error class
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),
}

impl From<FileError> for ProjectError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound(msg) => ProjectError::FileNotFound(msg),
            FileError::WrongType(msg) => ProjectError::WrongType(msg),
            FileError::Io(msg) => ProjectError::IoFailure(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_kinds_map_onto_taxonomy() {
        let err: ProjectError = FileError::NotFound("maps/a.map".to_string()).into();
        assert!(matches!(err, ProjectError::FileNotFound(_)));

        let err: ProjectError = FileError::WrongType("maps".to_string()).into();
        assert!(matches!(err, ProjectError::WrongType(_)));

        let err: ProjectError = FileError::Io("disk full".to_string()).into();
        assert!(matches!(err, ProjectError::IoFailure(_)));
    }

    #[test]
    fn test_messages_are_human_readable() {
        let err = ProjectError::NameCollision("map \"Level1\" already exists".to_string());
        assert_eq!(
            err.to_string(),
            "name collision: map \"Level1\" already exists"
        );
    }
}
