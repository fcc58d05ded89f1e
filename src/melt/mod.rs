//! Loading routed records into JSON Lines tables.
//!
//! This is the reference loader used by the CLI: nested objects are melted
//! into `parent__child` columns, and every table becomes one `.jsonl` file.
//! Merge tables are rewritten on [`Loader::finish`] so a primary key appears
//! once per file no matter how often it was loaded.

pub mod flatten;
pub mod writer;

pub use flatten::{flatten_row, FlattenConfig};
pub use writer::{LoadError, Loader, StreamWriter, TableWriter};
