use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::property::{PropertyType, RichText};

/// A database row as returned by "query database".
///
/// Property values stay raw until the row assembler decodes the selected ones,
/// so an unselected property of an unsupported type never fails a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// A database object as returned by "retrieve database".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub id: String,
    #[serde(default)]
    pub title: Vec<RichText>,
    /// Keyed by property name.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
}

impl Database {
    pub fn plain_title(&self) -> String {
        self.title
            .iter()
            .map(|run| run.plain_text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Schema entry of a database property.
///
/// The type tag is kept as a string: databases routinely contain types this
/// source does not support, and that only matters once they are selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl PropertySchema {
    pub fn property_type(&self) -> Result<PropertyType> {
        self.kind.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_database_schema_decoding() {
        let database: Database = serde_json::from_value(json!({
            "object": "database",
            "id": "db-1",
            "title": [{"type": "text", "text": {"content": "Tasks"}, "plain_text": "Tasks"}],
            "properties": {
                "Name": {"id": "title", "name": "Name", "type": "title", "title": {}},
                "Score": {"id": "x%3Ab", "name": "Score", "type": "formula", "formula": {"expression": "1"}}
            }
        }))
        .unwrap();

        assert_eq!(database.plain_title(), "Tasks");
        assert_eq!(database.properties["Name"].property_type().unwrap(), PropertyType::Title);
        assert!(database.properties["Score"].property_type().is_err());
    }

    #[test]
    fn test_page_keeps_raw_properties() {
        let page: Page = serde_json::from_value(json!({
            "object": "page",
            "id": "page-1",
            "archived": false,
            "properties": {
                "Score": {"id": "x%3Ab", "type": "formula", "formula": {"type": "number", "number": 1}}
            }
        }))
        .unwrap();
        assert_eq!(page.id, "page-1");
        assert!(page.properties.contains_key("Score"));
    }
}
