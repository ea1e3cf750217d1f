//! Error types for the permission engine

use thiserror::Error;

/// Permission engine errors
#[derive(Debug, Error)]
pub enum AclError {
    /// Role referenced by an assignment does not exist in the registry
    #[error("Role with ID {role_id} not found")]
    RoleNotFound { role_id: String },

    /// Revocation targeted a (user, role) pair with no assignment record
    #[error("Role {role_id} not assigned to user {user_id}")]
    AssignmentNotFound { user_id: String, role_id: String },

    /// The (user, role) pair already has an assignment record, active or expired
    #[error("Role {role_id} already assigned to user {user_id}")]
    DuplicateAssignment { user_id: String, role_id: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Registry or assignment store backend failure
    #[error("Store error: {0}")]
    Store(String),

    /// Cache backend failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Metric registration or export failure
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`AclError`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Duplicate,
    Internal,
}

impl ErrorKind {
    /// Stable error name, suitable for API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Duplicate => "DuplicateError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AclError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AclError::RoleNotFound { .. } | AclError::AssignmentNotFound { .. } => {
                ErrorKind::NotFound
            }
            AclError::DuplicateAssignment { .. } => ErrorKind::Duplicate,
            AclError::InvalidInput(_) | AclError::InvalidConfig(_) | AclError::Toml(_) => {
                ErrorKind::Validation
            }
            AclError::Store(_) | AclError::Cache(_) | AclError::Metrics(_) | AclError::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_duplicate(&self) -> bool {
        self.kind() == ErrorKind::Duplicate
    }
}

/// Result type for permission engine operations
pub type Result<T> = std::result::Result<T, AclError>;
