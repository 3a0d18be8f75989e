//! Versioning stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A versioning dimension of a record that the index keeps distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Working copy of a record.
    #[default]
    Draft,
    /// Publicly visible copy of a record.
    Published,
}

impl Stage {
    /// Every known stage, in indexing order.
    pub const ALL: [Stage; 2] = [Stage::Draft, Stage::Published];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Draft => "draft",
            Stage::Published => "published",
        }
    }

    /// Parse from string, returning None for unknown stages.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Stage::Draft),
            "published" => Some(Stage::Published),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stage: {0}")]
pub struct ParseStageError(pub String);

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseStageError(s.to_string()))
    }
}
