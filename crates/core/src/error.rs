//! Error types for the query-serving core.
//!
//! Collaborator failures ([`CollectionError`], [`EngineError`]) are typed close
//! to their source and folded into the service-level [`Error`] at the operation
//! boundary. Every [`Error`] carries a discriminable [`ErrorKind`] plus a
//! human-readable `Display` detail.

use crate::collection::DocId;
use std::io;
use std::path::PathBuf;

/// Failures of the collection store.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("failed to read collection {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path:?} line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("document {0} not found in collection")]
    NotFound(DocId),
}

/// Failures of an engine while loading or searching an index.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("index io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt index {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("invalid build configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification used by the service boundary to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input or unknown tenant. Never cached, not retried.
    ClientError,
    /// The engine returned a document the collection does not hold.
    ConsistencyFault,
    /// Index construction failed. Registry unchanged; caller may retry.
    BuildFailure,
    /// A build for the same tenant is already running.
    Conflict,
    /// Any other engine or IO failure.
    Internal,
}

/// Service-level error returned by [`crate::service::SearchService`] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Bad k")]
    BadK,
    #[error("Bad index_name")]
    UnknownIndex(String),
    #[error("document {pid} returned by index '{index}' is missing from its collection")]
    LookupFailure { index: String, pid: DocId },
    #[error("{0}")]
    BuildFailure(String),
    #[error("build already in progress for '{0}'")]
    BuildInProgress(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Collection(#[from] CollectionError),
}

impl Error {
    /// Classifies the error for the service boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadK | Error::UnknownIndex(_) => ErrorKind::ClientError,
            Error::LookupFailure { .. } => ErrorKind::ConsistencyFault,
            Error::BuildFailure(_) => ErrorKind::BuildFailure,
            Error::BuildInProgress(_) => ErrorKind::Conflict,
            Error::Engine(_) | Error::Collection(_) => ErrorKind::Internal,
        }
    }
}

/// Result alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_messages() {
        assert_eq!(Error::BadK.to_string(), "Bad k");
        assert_eq!(
            Error::UnknownIndex("nope".into()).to_string(),
            "Bad index_name"
        );
        assert_eq!(Error::BadK.kind(), ErrorKind::ClientError);
        assert_eq!(
            Error::UnknownIndex("nope".into()).kind(),
            ErrorKind::ClientError
        );
    }

    #[test]
    fn test_kinds() {
        let lookup = Error::LookupFailure {
            index: "t".into(),
            pid: 4,
        };
        assert_eq!(lookup.kind(), ErrorKind::ConsistencyFault);
        assert_eq!(
            Error::BuildFailure("boom".into()).kind(),
            ErrorKind::BuildFailure
        );
        assert_eq!(
            Error::BuildInProgress("t".into()).kind(),
            ErrorKind::Conflict
        );
        let engine = Error::from(EngineError::InvalidConfig("x".into()));
        assert_eq!(engine.kind(), ErrorKind::Internal);
    }
}
