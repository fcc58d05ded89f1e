//! Mock Notion client for tests and local development.
//!
//! Batches registered with the mock are served as consecutive pages. The
//! cursor of page `n` is `"<stream>:<n>"`, so the pagination contract can be
//! exercised without network access.
//!
//! # Example
//!
//! ```ignore
//! use notion_source::client::{MockNotionClient, NotionApi};
//!
//! let client = MockNotionClient::new().with_users(vec![vec![person], vec![bot]]);
//! let first = client.list_users(None).await?;
//! assert_eq!(first.next_cursor.as_deref(), Some("users:1"));
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use super::{NotionApi, TransportError, TransportResult};
use crate::model::{Database, Page};
use crate::paginate::PageResponse;

const USERS_STREAM: &str = "users";

#[derive(Default)]
pub struct MockNotionClient {
    users: RwLock<Vec<Vec<Value>>>,
    databases: RwLock<HashMap<String, Database>>,
    rows: RwLock<HashMap<String, Vec<Vec<Page>>>>,
    /// Stream name → status code returned instead of data.
    failures: RwLock<HashMap<String, u16>>,
    requests: RwLock<Vec<String>>,
}

impl MockNotionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `batches` as the pages of the users list.
    pub fn with_users(self, batches: Vec<Vec<Value>>) -> Self {
        *self.users.write().unwrap() = batches;
        self
    }

    /// Register a database schema and the pages its query returns.
    pub fn with_database(self, database: Database, batches: Vec<Vec<Page>>) -> Self {
        self.rows
            .write()
            .unwrap()
            .insert(database.id.clone(), batches);
        self.databases
            .write()
            .unwrap()
            .insert(database.id.clone(), database);
        self
    }

    /// Make every request of a stream (`"users"` or a database id) fail.
    pub fn with_failure(self, stream: &str, status: u16) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(stream.to_string(), status);
        self
    }

    /// Requests served so far, as `"<endpoint> <stream> <cursor>"`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.read().unwrap().clone()
    }

    fn record(&self, endpoint: &str, stream: &str, cursor: Option<&str>) {
        self.requests
            .write()
            .unwrap()
            .push(format!("{} {} {}", endpoint, stream, cursor.unwrap_or("-")));
    }

    fn check_failure(&self, stream: &str) -> TransportResult<()> {
        match self.failures.read().unwrap().get(stream) {
            Some(status) => Err(TransportError::Api {
                status: *status,
                code: String::from("mock_failure"),
                message: format!("configured failure for {}", stream),
            }),
            None => Ok(()),
        }
    }
}

fn serve<T: Clone>(
    stream: &str,
    batches: &[Vec<T>],
    cursor: Option<&str>,
) -> TransportResult<PageResponse<T>> {
    let index = match cursor {
        None => 0,
        Some(cursor) => cursor
            .rsplit_once(':')
            .and_then(|(_, n)| n.parse::<usize>().ok())
            .ok_or_else(|| TransportError::Api {
                status: 400,
                code: String::from("validation_error"),
                message: format!("invalid start_cursor {}", cursor),
            })?,
    };

    let results = match batches.get(index) {
        Some(batch) => batch.clone(),
        None if index == 0 => vec![],
        None => return Err(TransportError::NotFound(format!("{} page {}", stream, index))),
    };
    let has_more = index + 1 < batches.len();

    Ok(PageResponse {
        results,
        next_cursor: has_more.then(|| format!("{}:{}", stream, index + 1)),
        has_more,
    })
}

#[async_trait]
impl NotionApi for MockNotionClient {
    async fn list_users(&self, cursor: Option<String>) -> TransportResult<PageResponse<Value>> {
        self.record("list_users", USERS_STREAM, cursor.as_deref());
        self.check_failure(USERS_STREAM)?;
        let users = self.users.read().unwrap();
        serve(USERS_STREAM, &users, cursor.as_deref())
    }

    async fn retrieve_database(&self, database_id: &str) -> TransportResult<Database> {
        self.record("retrieve_database", database_id, None);
        self.check_failure(database_id)?;
        self.databases
            .read()
            .unwrap()
            .get(database_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(database_id.to_string()))
    }

    async fn query_database(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> TransportResult<PageResponse<Page>> {
        self.record("query_database", database_id, cursor.as_deref());
        self.check_failure(database_id)?;
        let rows = self.rows.read().unwrap();
        let batches = rows
            .get(database_id)
            .ok_or_else(|| TransportError::NotFound(database_id.to_string()))?;
        serve(database_id, batches, cursor.as_deref())
    }
}
