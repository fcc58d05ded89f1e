//! Notion API access.
//!
//! This module provides:
//! - [`NotionApi`], the capability the extraction streams depend on
//! - [`NotionHttpClient`], the production client over `reqwest`
//! - [`MockNotionClient`], an in-memory client serving canned pages
//!
//! Clients are constructed by the caller and passed in explicitly; nothing in
//! the crate caches a global client.

mod http;
mod mock;

pub use http::{NotionHttpClient, NOTION_API_URL, NOTION_VERSION};
pub use mock::MockNotionClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::model::{Database, Page};
use crate::paginate::PageResponse;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("notion api error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("not found: {0}")]
    NotFound(String),
}

impl TransportError {
    /// Rate limiting and server-side failures may go away on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Reqwest(e) => e.is_timeout() || e.is_connect(),
            TransportError::Api { status, .. } => *status == 429 || *status >= 500,
            TransportError::NotFound(_) => false,
        }
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// The Notion endpoints this source reads.
///
/// Paged endpoints take the cursor returned by the previous page, or `None`
/// for the first page.
#[async_trait]
pub trait NotionApi: Send + Sync {
    /// `GET /v1/users`. Users stay raw JSON so the router sees every field.
    async fn list_users(&self, cursor: Option<String>) -> TransportResult<PageResponse<Value>>;

    /// `GET /v1/databases/{id}`.
    async fn retrieve_database(&self, database_id: &str) -> TransportResult<Database>;

    /// `POST /v1/databases/{id}/query`.
    async fn query_database(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> TransportResult<PageResponse<Page>>;
}
