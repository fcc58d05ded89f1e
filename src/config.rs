//! Source configuration.
//!
//! Everything here is built once before a run and then shared read-only
//! between stream tasks.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SourceError};
use crate::model::PropertySchema;
use crate::naming::normalize_identifier;

/// Decides whether a database property becomes a column.
pub type PropertyFilter = Arc<dyn Fn(&PropertySchema) -> bool + Send + Sync>;

/// Maps a database property onto its column name, given the default
/// normalizer. Returning `None` drops the property.
pub type ColumnProjection =
    Arc<dyn Fn(&PropertySchema, &dyn Fn(&str) -> String) -> Option<String> + Send + Sync>;

/// Row limit for the users stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    Unlimited,
    Rows(usize),
}

impl Limit {
    /// Negative values are the "no limit" sentinel.
    pub fn from_signed(limit: i64) -> Self {
        if limit < 0 {
            Limit::Unlimited
        } else {
            Limit::Rows(limit as usize)
        }
    }

    pub fn remaining(&self, emitted: usize) -> Option<usize> {
        match self {
            Limit::Unlimited => None,
            Limit::Rows(max) => Some(max.saturating_sub(emitted)),
        }
    }
}

/// One database to extract.
#[derive(Clone)]
pub struct DatabaseResource {
    pub database_id: String,
    pub table_name: Option<String>,
    include: Option<PropertyFilter>,
    projection: Option<ColumnProjection>,
}

impl DatabaseResource {
    pub fn new(database_id: impl Into<String>) -> Self {
        DatabaseResource {
            database_id: database_id.into(),
            table_name: None,
            include: None,
            projection: None,
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn with_include<F>(mut self, include: F) -> Self
    where
        F: Fn(&PropertySchema) -> bool + Send + Sync + 'static,
    {
        self.include = Some(Arc::new(include));
        self
    }

    pub fn with_column_projection<F>(mut self, projection: F) -> Self
    where
        F: Fn(&PropertySchema, &dyn Fn(&str) -> String) -> Option<String> + Send + Sync + 'static,
    {
        self.projection = Some(Arc::new(projection));
        self
    }

    /// All properties are included unless a filter says otherwise.
    pub fn includes(&self, property: &PropertySchema) -> bool {
        self.include.as_ref().map_or(true, |include| include(property))
    }

    /// Defaults to the snake_case property name.
    pub fn project(&self, property: &PropertySchema) -> Option<String> {
        match &self.projection {
            Some(projection) => projection(property, &normalize_identifier),
            None => Some(normalize_identifier(&property.name)),
        }
    }
}

impl fmt::Debug for DatabaseResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseResource")
            .field("database_id", &self.database_id)
            .field("table_name", &self.table_name)
            .field("include", &self.include.is_some())
            .field("projection", &self.projection.is_some())
            .finish()
    }
}

/// Configuration for a whole extraction run.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub databases: Vec<DatabaseResource>,
    pub include_users: bool,
    pub users_limit: Limit,
    /// Keep running the other streams when one fails.
    pub skip_failed_streams: bool,
    /// Batches buffered between stream tasks and the loader.
    pub channel_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            databases: vec![],
            include_users: true,
            users_limit: Limit::Unlimited,
            skip_failed_streams: false,
            channel_capacity: 64,
        }
    }
}

impl SourceConfig {
    pub fn with_database(mut self, database: DatabaseResource) -> Self {
        self.databases.push(database);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(SourceError::Config(
                "channel capacity must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for database in &self.databases {
            if database.database_id.trim().is_empty() {
                return Err(SourceError::Config("empty database id".to_string()));
            }
            if !seen.insert(database.database_id.as_str()) {
                return Err(SourceError::Config(format!(
                    "database {} configured twice",
                    database.database_id
                )));
            }
        }

        if !self.include_users && self.databases.is_empty() {
            return Err(SourceError::Config("nothing to extract".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(name: &str, kind: &str) -> PropertySchema {
        PropertySchema {
            id: name.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }

    #[test]
    fn test_limit_sentinel() {
        assert_eq!(Limit::from_signed(-1), Limit::Unlimited);
        assert_eq!(Limit::from_signed(0), Limit::Rows(0));
        assert_eq!(Limit::from_signed(3).remaining(1), Some(2));
        assert_eq!(Limit::Rows(1).remaining(5), Some(0));
        assert_eq!(Limit::Unlimited.remaining(10), None);
    }

    #[test]
    fn test_database_defaults() {
        let database = DatabaseResource::new("db");
        let due = property("Due Date", "date");
        assert!(database.includes(&due));
        assert_eq!(database.project(&due), Some("due_date".to_string()));
    }

    #[test]
    fn test_custom_projection_can_drop() {
        let database = DatabaseResource::new("db").with_column_projection(|property, normalize| {
            let name = normalize(property.name.as_str());
            if name == "my_column_name" {
                None
            } else {
                Some(name)
            }
        });
        assert_eq!(database.project(&property("My Column Name", "number")), None);
        assert_eq!(database.project(&property("Other", "number")), Some("other".to_string()));
    }

    #[test]
    fn test_custom_include() {
        let database =
            DatabaseResource::new("db").with_include(|property| property.kind != "relation");
        assert!(!database.includes(&property("Links", "relation")));
        assert!(database.includes(&property("Name", "title")));
    }

    #[test]
    fn test_validate() {
        assert!(SourceConfig::default().validate().is_ok());

        let nothing = SourceConfig {
            include_users: false,
            ..SourceConfig::default()
        };
        assert!(matches!(nothing.validate(), Err(SourceError::Config(_))));

        let blank = SourceConfig::default().with_database(DatabaseResource::new(" "));
        assert!(blank.validate().is_err());

        let twice = SourceConfig::default()
            .with_database(DatabaseResource::new("db"))
            .with_database(DatabaseResource::new("db").with_table_name("other"));
        assert!(matches!(twice.validate(), Err(SourceError::Config(msg)) if msg.contains("twice")));
    }
}
