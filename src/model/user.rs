use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SourceError;

/// Discriminator of a Notion user object (`"type"` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserKind {
    Person,
    Bot,
}

impl UserKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UserKind::Person => "person",
            UserKind::Bot => "bot",
        }
    }
}

impl FromStr for UserKind {
    type Err = SourceError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "person" => Ok(UserKind::Person),
            "bot" => Ok(UserKind::Bot),
            other => Err(SourceError::UnsupportedEntityType(other.to_string())),
        }
    }
}

impl fmt::Display for UserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user mentioned from somewhere else (people, last_edited_by, created_by).
///
/// Partial user objects only guarantee `id`, so nothing else is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReference {
    pub id: String,
}
