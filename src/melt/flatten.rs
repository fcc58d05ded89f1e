use serde_json::{Map, Value};

use crate::row::Row;

/// Configuration for flattening nested objects into columns.
#[derive(Debug, Clone)]
pub struct FlattenConfig {
    /// Object nesting levels melted into columns (0 = keep nested objects as values)
    pub max_depth: usize,

    /// Separator between parent and child column names
    pub separator: String,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            max_depth: 4,
            separator: String::from("__"),
        }
    }
}

/// Melt nested objects of a row into top-level columns.
///
/// `{"person": {"email": "a@b.c"}}` becomes `{"person__email": "a@b.c"}`.
/// Arrays and scalars are kept as they are, empty objects disappear, and
/// objects nested deeper than `max_depth` stay JSON values.
pub fn flatten_row(row: Row, config: &FlattenConfig) -> Row {
    let mut flat = Map::new();
    flatten_into(&mut flat, None, row, config, 0);
    flat
}

fn flatten_into(
    flat: &mut Row,
    prefix: Option<&str>,
    object: Map<String, Value>,
    config: &FlattenConfig,
    depth: usize,
) {
    for (key, value) in object.into_iter() {
        let column = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, config.separator, key),
            None => key,
        };

        match value {
            Value::Object(nested) if depth < config.max_depth => {
                flatten_into(flat, Some(&column), nested, config, depth + 1);
            }
            other => {
                flat.insert(column, other);
            }
        }
    }
}
