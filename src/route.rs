//! Entity routing.
//!
//! Splits polymorphic entities into destination tables. Routing depends on
//! the discriminator tag only, and every route upserts on `id`, so loading the
//! same entity twice leaves a single row.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::config::DatabaseResource;
use crate::error::{Result, SourceError};
use crate::model::{Database, UserKind};
use crate::naming::normalize_identifier;
use crate::row::{identity_row, key_value, Row, ID_COLUMN};

/// Destination tables of the users stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Persons,
    Bots,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Persons => "persons",
            Table::Bots => "bots",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteDisposition {
    #[default]
    Append,
    /// Replace rows sharing the primary key.
    Merge,
}

/// Where a record goes and how it is written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRoute {
    pub table: String,
    pub primary_key: String,
    pub disposition: WriteDisposition,
}

impl TableRoute {
    /// Upsert into `table` keyed on `id`.
    pub fn merge_on_id(table: impl Into<String>) -> Self {
        TableRoute {
            table: table.into(),
            primary_key: ID_COLUMN.to_string(),
            disposition: WriteDisposition::Merge,
        }
    }
}

/// A row together with its route; the unit handed to a loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedRecord {
    pub route: TableRoute,
    pub row: Row,
}

impl RoutedRecord {
    /// The primary key value as a string, if present.
    pub fn key(&self) -> Option<String> {
        key_value(&self.row, &self.route.primary_key)
    }
}

/// Route one user object to `persons` or `bots`.
///
/// The `type` and `object` discriminators are stripped; persons also lose the
/// (always empty) `bot` field.
pub fn route_user(user: Map<String, Value>) -> Result<RoutedRecord> {
    let tag = user
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::UnsupportedEntityType(describe_tag(user.get("type"))))?;

    let (table, excluded): (Table, &[&str]) = match tag.parse::<UserKind>()? {
        UserKind::Bot => (Table::Bots, &["type", "object"][..]),
        UserKind::Person => (Table::Persons, &["bot", "type", "object"][..]),
    };

    let id = match user.get(ID_COLUMN) {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => return Err(SourceError::MissingIdentity { kind: "user" }),
    };

    let mut row: Row = user
        .into_iter()
        .filter(|(key, _)| !excluded.contains(&key.as_str()))
        .collect();
    row.extend(identity_row(&id));

    Ok(RoutedRecord {
        route: TableRoute::merge_on_id(table.as_str()),
        row,
    })
}

/// Route a raw user value, which must be a JSON object.
pub fn route_user_value(user: Value) -> Result<RoutedRecord> {
    match user {
        Value::Object(map) => route_user(map),
        other => Err(SourceError::UnsupportedEntityType(describe_tag(Some(&other)))),
    }
}

/// Table for a database's rows: configured name, else the snake_case title,
/// else `database_<id>`.
pub fn database_table_name(database: &Database, resource: &DatabaseResource) -> String {
    if let Some(table_name) = &resource.table_name {
        return table_name.clone();
    }

    let title = normalize_identifier(&database.plain_title());
    if title != "_" {
        return title;
    }

    format!("database_{}", database.id.replace('-', ""))
}

/// Route for the rows of one database.
pub fn database_route(database: &Database, resource: &DatabaseResource) -> TableRoute {
    TableRoute::merge_on_id(database_table_name(database, resource))
}

fn describe_tag(tag: Option<&Value>) -> String {
    match tag {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::from("<missing>"),
    }
}
