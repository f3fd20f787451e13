//! Error types for Biosim kernel operations.

use crate::ids::Principal;

/// Failure category of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InvalidState,
    InsufficientBalance,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InsufficientBalance => "insufficient_balance",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason an operation was rejected.
///
/// A rejected operation leaves every registry exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// A referenced id does not exist in the relevant registry.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: u64 },

    /// The caller failed the identity predicate guarding the operation.
    #[error("{principal} is not authorized to {action}")]
    Unauthorized {
        principal: Principal,
        action: &'static str,
    },

    /// The target entity is not in a state that admits the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The buyer cannot cover the listing price.
    #[error("insufficient balance for {principal}: required {required}, available {available}")]
    InsufficientBalance {
        principal: Principal,
        required: u64,
        available: u64,
    },
}

impl SimulationError {
    pub fn not_found(entity: &'static str, id: impl Into<u64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn unauthorized(principal: &Principal, action: &'static str) -> Self {
        Self::Unauthorized {
            principal: principal.clone(),
            action,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
        }
    }
}

pub type SimulationResult<T> = Result<T, SimulationError>;
