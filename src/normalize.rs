//! Property value normalization.
//!
//! Projects one decoded [`PropertyValue`] onto a destination cell. The match
//! is exhaustive over the supported types; unsupported tags never reach this
//! point because decoding already rejected them.

use serde_json::Value;
use tracing::warn;

use crate::error::{Result, SourceError};
use crate::model::{PropertyValue, RichText};

/// Decode a raw property value and normalize it in one step.
pub fn normalize_raw(value: &Value) -> Result<Value> {
    let property = PropertyValue::from_value(value)?;
    normalize_property(&property)
}

/// Normalize a decoded property value. `Value::Null` marks absent data.
pub fn normalize_property(property: &PropertyValue) -> Result<Value> {
    let cell = match property {
        PropertyValue::Title(runs) | PropertyValue::RichText(runs) => {
            Value::String(join_runs(runs))
        }
        PropertyValue::Number(number) => number.clone().map(Value::Number).unwrap_or(Value::Null),
        PropertyValue::Select(option) => option
            .as_ref()
            .map(|option| Value::String(option.id.clone()))
            .unwrap_or(Value::Null),
        PropertyValue::MultiSelect(options) => Value::Array(
            options
                .iter()
                .map(|option| Value::String(option.id.clone()))
                .collect(),
        ),
        PropertyValue::Date(None) => Value::Null,
        PropertyValue::Date(Some(range)) => match range.end {
            None => Value::String(range.start.clone()),
            Some(_) => serde_json::to_value(range).map_err(|e| SourceError::decode("date", e))?,
        },
        PropertyValue::People(users) => Value::Array(
            users
                .iter()
                .map(|user| Value::String(user.id.clone()))
                .collect(),
        ),
        PropertyValue::LastEditedBy(user) => Value::String(user.id.clone()),
        PropertyValue::LastEditedTime(timestamp) => Value::String(timestamp.clone()),
        PropertyValue::Relation { references, has_more } => {
            if *has_more {
                warn!(
                    references = references.len(),
                    "relation list truncated by the API, extra references are dropped"
                );
            }
            Value::Array(
                references
                    .iter()
                    .map(|reference| Value::String(reference.id.clone()))
                    .collect(),
            )
        }
    };
    Ok(cell)
}

fn join_runs(runs: &[RichText]) -> String {
    runs.iter()
        .map(RichText::content)
        .collect::<Vec<_>>()
        .join(" ")
}
