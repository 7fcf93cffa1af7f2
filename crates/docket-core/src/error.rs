//! Shared denial taxonomy for core decisions.

use serde::{Deserialize, Serialize};

/// The failure buckets every denial maps onto at the operation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NotFound,
    Forbidden,
    InvalidTransition,
    ValidationError,
    Conflict,
}

impl DenialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::InvalidTransition => "invalid_transition",
            Self::ValidationError => "validation_error",
            Self::Conflict => "conflict",
        }
    }
}

impl std::fmt::Display for DenialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
