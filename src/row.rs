//! Row assembly for database pages.
//!
//! A [`RowAssembler`] is built once per database from its schema. Building it
//! resolves which properties become which columns and fails on name
//! collisions, so a misconfigured database is rejected before any of its rows
//! are emitted. Assembling a page is then all-or-nothing.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::DatabaseResource;
use crate::error::{Result, SourceError};
use crate::model::{Database, Page, PropertyValue};
use crate::normalize::normalize_property;

/// Primary key column of every emitted row.
pub const ID_COLUMN: &str = "id";

/// Load identity column, always equal to the source id.
pub const LOAD_ID_COLUMN: &str = "_load_id";

const RESERVED_COLUMNS: [&str; 2] = [ID_COLUMN, LOAD_ID_COLUMN];

/// A flat destination row.
pub type Row = Map<String, Value>;

/// A database property that made it into the row, with its column.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedProperty {
    pub name: String,
    pub column: String,
}

/// Build a row with the identity columns set from `id`.
pub fn identity_row(id: &str) -> Row {
    let mut row = Map::new();
    row.insert(ID_COLUMN.to_string(), Value::String(id.to_string()));
    row.insert(LOAD_ID_COLUMN.to_string(), Value::String(id.to_string()));
    row
}

/// The value of `column` as a key string. Null and missing values have no key.
pub fn key_value(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct RowAssembler {
    selection: Vec<SelectedProperty>,
}

impl RowAssembler {
    /// Resolve the column for every selected property of `database`.
    ///
    /// Fails with [`SourceError::NamingCollision`] when two properties (or a
    /// property and an identity column) share a column, and with
    /// [`SourceError::UnsupportedPropertyType`] when a selected property has a
    /// type that cannot be normalized.
    pub fn new(database: &Database, resource: &DatabaseResource) -> Result<Self> {
        let mut by_column: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut selection = Vec::new();
        let mut unsupported = None;

        for (name, schema) in &database.properties {
            if !resource.includes(schema) {
                continue;
            }
            let Some(column) = resource.project(schema) else {
                debug!(property = %name, "property dropped by column projection");
                continue;
            };

            by_column
                .entry(column.clone())
                .or_default()
                .push(name.clone());

            match schema.property_type() {
                Ok(_) => selection.push(SelectedProperty {
                    name: name.clone(),
                    column,
                }),
                Err(e) => {
                    unsupported.get_or_insert(e);
                }
            }
        }

        // Naming problems win over unsupported types.
        check_collisions(&by_column)?;
        if let Some(e) = unsupported {
            return Err(e);
        }

        Ok(RowAssembler { selection })
    }

    pub fn selection(&self) -> &[SelectedProperty] {
        &self.selection
    }

    /// Build the row for one page.
    pub fn assemble(&self, page: &Page) -> Result<Row> {
        if page.id.is_empty() {
            return Err(SourceError::MissingIdentity { kind: "page" });
        }

        let mut row = Map::new();
        for selected in &self.selection {
            let cell = match page.properties.get(&selected.name) {
                Some(raw) => normalize_property(&PropertyValue::from_value(raw)?)?,
                None => {
                    debug!(page = %page.id, property = %selected.name, "property missing on page");
                    Value::Null
                }
            };
            row.insert(selected.column.clone(), cell);
        }

        row.extend(identity_row(&page.id));
        Ok(row)
    }

    /// Assemble a whole batch, or nothing if any page fails.
    pub fn assemble_batch(&self, pages: &[Page]) -> Result<Vec<Row>> {
        pages.iter().map(|page| self.assemble(page)).collect()
    }
}

fn check_collisions(by_column: &BTreeMap<String, Vec<String>>) -> Result<()> {
    for (column, properties) in by_column {
        if properties.len() > 1 {
            return Err(SourceError::NamingCollision {
                column: column.clone(),
                properties: properties.clone(),
            });
        }
        if RESERVED_COLUMNS.contains(&column.as_str()) {
            let mut properties = properties.clone();
            properties.push(format!("<{} column>", column));
            return Err(SourceError::NamingCollision {
                column: column.clone(),
                properties,
            });
        }
    }
    Ok(())
}
