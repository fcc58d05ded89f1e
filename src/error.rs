//! Error types for the Notion source.
//!
//! Every failure the core can raise ends up in [`SourceError`]. Nothing in the
//! crate recovers from these locally; the caller decides whether to abort the
//! run or skip the affected stream.

use thiserror::Error;

use crate::client::TransportError;
use crate::melt::LoadError;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    /// A property type tag outside the supported set.
    #[error("unsupported property type: {0}")]
    UnsupportedPropertyType(String),

    /// An entity discriminator outside the supported set.
    #[error("unsupported entity type: {0}")]
    UnsupportedEntityType(String),

    /// Two sources project onto the same column.
    #[error("column name collision on '{column}' between {}", .properties.join(", "))]
    NamingCollision {
        column: String,
        properties: Vec<String>,
    },

    #[error("{kind} without an id")]
    MissingIdentity { kind: &'static str },

    #[error("malformed {kind} payload: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("stream task failed: {0}")]
    Task(String),
}

impl SourceError {
    pub(crate) fn decode(kind: &'static str, source: serde_json::Error) -> Self {
        SourceError::Decode { kind, source }
    }

    /// Schema and configuration errors need a code or config change to go away.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SourceError::UnsupportedPropertyType(_)
                | SourceError::UnsupportedEntityType(_)
                | SourceError::NamingCollision { .. }
                | SourceError::Config(_)
        )
    }
}
