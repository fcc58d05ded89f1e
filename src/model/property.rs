use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SourceError};
use crate::model::user::UserReference;

/// The closed set of page property types this source knows how to normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Title,
    RichText,
    Number,
    Select,
    MultiSelect,
    Date,
    People,
    LastEditedBy,
    LastEditedTime,
    Relation,
}

impl PropertyType {
    pub const ALL: [PropertyType; 10] = [
        PropertyType::Title,
        PropertyType::RichText,
        PropertyType::Number,
        PropertyType::Select,
        PropertyType::MultiSelect,
        PropertyType::Date,
        PropertyType::People,
        PropertyType::LastEditedBy,
        PropertyType::LastEditedTime,
        PropertyType::Relation,
    ];

    /// The wire tag, which is also the key holding the payload.
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Title => "title",
            PropertyType::RichText => "rich_text",
            PropertyType::Number => "number",
            PropertyType::Select => "select",
            PropertyType::MultiSelect => "multi_select",
            PropertyType::Date => "date",
            PropertyType::People => "people",
            PropertyType::LastEditedBy => "last_edited_by",
            PropertyType::LastEditedTime => "last_edited_time",
            PropertyType::Relation => "relation",
        }
    }
}

impl FromStr for PropertyType {
    type Err = SourceError;

    fn from_str(tag: &str) -> std::result::Result<Self, Self::Err> {
        PropertyType::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| SourceError::UnsupportedPropertyType(tag.to_string()))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of rich text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
    /// Only present on `"type": "text"` runs.
    #[serde(default)]
    pub text: Option<TextContent>,
}

impl RichText {
    /// Text runs expose `text.content`; mentions and equations only have `plain_text`.
    pub fn content(&self) -> &str {
        match &self.text {
            Some(text) => &text.content,
            None => &self.plain_text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdReference {
    pub id: String,
}

/// A page property value, decoded by its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(Vec<RichText>),
    RichText(Vec<RichText>),
    Number(Option<serde_json::Number>),
    Select(Option<SelectOption>),
    MultiSelect(Vec<SelectOption>),
    Date(Option<DateRange>),
    People(Vec<UserReference>),
    LastEditedBy(UserReference),
    LastEditedTime(String),
    Relation {
        references: Vec<IdReference>,
        /// Set when the API truncated the reference list.
        has_more: bool,
    },
}

impl PropertyValue {
    /// Decode a raw property value object such as
    /// `{"id": "%3AUPp", "type": "select", "select": {...}}`.
    ///
    /// Unknown tags fail with [`SourceError::UnsupportedPropertyType`].
    pub fn from_value(value: &Value) -> Result<Self> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SourceError::decode("property", serde_json::Error::missing_field("type"))
            })?;
        let property_type: PropertyType = tag.parse()?;
        let payload = value
            .get(property_type.as_str())
            .cloned()
            .unwrap_or(Value::Null);

        let decoded = match property_type {
            PropertyType::Title => PropertyValue::Title(decode(payload)?),
            PropertyType::RichText => PropertyValue::RichText(decode(payload)?),
            PropertyType::Number => PropertyValue::Number(decode(payload)?),
            PropertyType::Select => PropertyValue::Select(decode(payload)?),
            PropertyType::MultiSelect => PropertyValue::MultiSelect(decode(payload)?),
            PropertyType::Date => PropertyValue::Date(decode(payload)?),
            PropertyType::People => PropertyValue::People(decode(payload)?),
            PropertyType::LastEditedBy => PropertyValue::LastEditedBy(decode(payload)?),
            PropertyType::LastEditedTime => PropertyValue::LastEditedTime(decode(payload)?),
            PropertyType::Relation => PropertyValue::Relation {
                references: decode(payload)?,
                has_more: value
                    .get("has_more")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
        };
        Ok(decoded)
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| SourceError::decode("property", e))
}
