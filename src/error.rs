//! Error taxonomy shared by storage, resolvers and the GraphQL surface.
//!
//! Resolvers never let a failure escape the traversal: storage and
//! resolution errors are turned into [`GraphError`] entries attached to the
//! response, next to whatever data could still be produced.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Failures reported by a [`Storage`](crate::storage::Storage) backend.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Backend unreachable, timed out or otherwise failing. Retryable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("record {id} already exists in {table}")]
    Duplicate { table: &'static str, id: Uuid },

    #[error("unknown column `{column}` on {table}")]
    UnknownColumn { table: &'static str, column: String },

    #[error("malformed {table} record: {message}")]
    Malformed { table: &'static str, message: String },
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Failures of a single field or edge during graph traversal.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// A stored id points at a row that is missing or tombstoned.
    #[error("{type_name} {id} does not exist")]
    DanglingReference { type_name: &'static str, id: Uuid },

    #[error("not authorized to {action} {type_name}")]
    Forbidden {
        action: &'static str,
        type_name: &'static str,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResolveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ResolveError::DanglingReference { .. } => ErrorCode::DanglingReference,
            ResolveError::Forbidden { .. } => ErrorCode::Forbidden,
            ResolveError::Validation(_) => ErrorCode::ValidationError,
            ResolveError::Storage(StorageError::Unavailable(_)) => ErrorCode::StorageUnavailable,
            ResolveError::Storage(_) | ResolveError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Message safe to hand to clients. Backend details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ResolveError::Storage(StorageError::Unavailable(_)) => {
                "storage unavailable, try again later".to_string()
            }
            ResolveError::Storage(_) | ResolveError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Failures that reject a whole request before any field is resolved.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    #[error("document contains several operations, operationName is required")]
    AmbiguousOperation,

    #[error("document contains no operation")]
    NoOperation,

    #[error("{0} operations are not supported")]
    Unsupported(&'static str),

    #[error("unknown fragment `{0}`")]
    UnknownFragment(String),

    #[error("invalid variables: {0}")]
    Variables(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    StorageUnavailable,
    NotFound,
    DanglingReference,
    Forbidden,
    ValidationError,
    Conflict,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

pub type Path = Vec<PathSegment>;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorExtensions {
    pub code: ErrorCode,
}

/// One entry of the `errors` list of a GraphQL response.
#[derive(Debug, Clone, Serialize)]
pub struct GraphError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Path,
    pub extensions: ErrorExtensions,
}

impl GraphError {
    pub fn new(code: ErrorCode, message: impl Into<String>, path: Path) -> Self {
        GraphError {
            message: message.into(),
            path,
            extensions: ErrorExtensions { code },
        }
    }

    pub fn from_resolve(error: &ResolveError, path: Path) -> Self {
        GraphError::new(error.code(), error.public_message(), path)
    }

    pub fn code(&self) -> ErrorCode {
        self.extensions.code
    }
}

/// The resolvers declared for the subgraph disagree with its SDL.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse schema: {0}")]
    Parse(String),

    #[error("type {0} is declared twice")]
    DuplicateType(String),

    #[error("type {0} has a resolver but is not defined in the schema")]
    MissingType(String),

    #[error("{type_name}.{field} is resolved as an edge but is not in the schema")]
    MissingField { type_name: String, field: String },

    #[error("{type_name}.{field} leads to {target}, which has no resolver")]
    UnknownTarget {
        type_name: String,
        field: String,
        target: String,
    },
}
