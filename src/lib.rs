//! # notion-source - Notion entity extraction
//!
//! Pulls users and database rows out of a Notion workspace and turns them
//! into flat, typed rows ready for a relational destination.
//!
//! ## Modules
//!
//! - **paginate**: cursor pagination over any list/query endpoint
//! - **normalize**: reduce a typed page property to a scalar or list cell
//! - **row**: assemble one row per database page, with collision detection
//! - **route**: split users into `persons` and `bots`, keyed on `id`
//! - **source**: run all streams concurrently and feed a [`Loader`]
//! - **melt**: the JSON Lines reference loader
//!
//! ## Quick Start
//!
//! ### Property normalization
//!
//! ```rust
//! use notion_source::normalize::normalize_raw;
//! use serde_json::json;
//!
//! # fn main() -> notion_source::Result<()> {
//! let tags = json!({
//!     "id": "t",
//!     "type": "multi_select",
//!     "multi_select": [
//!         {"id": "id_a", "name": "A", "color": "red"},
//!         {"id": "id_b", "name": "B", "color": "blue"}
//!     ]
//! });
//!
//! assert_eq!(normalize_raw(&tags)?, json!(["id_a", "id_b"]));
//! # Ok(())
//! # }
//! ```
//!
//! ### Routing users
//!
//! ```rust
//! use notion_source::route::route_user_value;
//! use serde_json::json;
//!
//! # fn main() -> notion_source::Result<()> {
//! let record = route_user_value(json!({
//!     "object": "user",
//!     "id": "u1",
//!     "type": "bot",
//!     "name": "Importer",
//!     "bot": {}
//! }))?;
//!
//! assert_eq!(record.route.table, "bots");
//! assert_eq!(record.key().as_deref(), Some("u1"));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod melt;
pub mod model;
pub mod naming;
pub mod normalize;
pub mod paginate;
pub mod route;
pub mod row;
pub mod source;

// Re-export commonly used types for convenience
pub use client::{MockNotionClient, NotionApi, NotionHttpClient, TransportError};
pub use config::{DatabaseResource, Limit, SourceConfig};
pub use error::{Result, SourceError};
pub use melt::{FlattenConfig, LoadError, Loader, StreamWriter, TableWriter};
pub use paginate::{PageResponse, Paginator};
pub use route::{RoutedRecord, Table, TableRoute, WriteDisposition};
pub use row::{Row, RowAssembler};
pub use source::{NotionSource, RunSummary, StreamReport};
