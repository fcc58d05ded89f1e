//! Typed views over Notion API objects (API version `2022-06-28`).
//!
//! Only the fields the normalizer and router read are modelled. Everything is
//! discriminated by an explicit tag and decoded into a closed enum, so an
//! unknown tag surfaces as an error instead of a silent default.

pub mod page;
pub mod property;
pub mod user;

pub use page::{Database, Page, PropertySchema};
pub use property::{
    DateRange, IdReference, PropertyType, PropertyValue, RichText, SelectOption, TextContent,
};
pub use user::{UserKind, UserReference};
