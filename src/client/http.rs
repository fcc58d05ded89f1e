use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{NotionApi, TransportError, TransportResult};
use crate::model::{Database, Page};
use crate::paginate::PageResponse;

pub const NOTION_API_URL: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;

/// Production client talking to the Notion REST API.
///
/// # Example
///
/// ```ignore
/// use notion_source::client::NotionHttpClient;
///
/// let client = NotionHttpClient::new(std::env::var("NOTION_TOKEN")?);
/// let database = client.retrieve_database("a8aec43384f447ed84390e8e42c2e089").await?;
/// ```
pub struct NotionHttpClient {
    base_url: String,
    token: String,
    client: ReqwestClient,
}

/// Error body returned by Notion on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl NotionHttpClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(NOTION_API_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Self {
        NotionHttpClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client: ReqwestClient::new(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> TransportResult<T> {
        let response = self.authorized(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<ApiErrorBody>(&body).unwrap_or(ApiErrorBody {
            code: String::from("unknown"),
            message: body,
        });

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(error.message));
        }

        Err(TransportError::Api {
            status: status.as_u16(),
            code: error.code,
            message: error.message,
        })
    }
}

#[async_trait]
impl NotionApi for NotionHttpClient {
    async fn list_users(&self, cursor: Option<String>) -> TransportResult<PageResponse<Value>> {
        debug!(cursor = ?cursor, "listing users");
        let mut query = vec![("page_size", PAGE_SIZE.to_string())];
        if let Some(cursor) = cursor {
            query.push(("start_cursor", cursor));
        }

        let request = self
            .client
            .get(format!("{}/users", self.base_url))
            .query(&query);
        self.send(request).await
    }

    async fn retrieve_database(&self, database_id: &str) -> TransportResult<Database> {
        debug!(database_id, "retrieving database");
        let request = self
            .client
            .get(format!("{}/databases/{}", self.base_url, database_id));
        self.send(request).await
    }

    async fn query_database(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> TransportResult<PageResponse<Page>> {
        debug!(database_id, cursor = ?cursor, "querying database");
        let mut body = json!({ "page_size": PAGE_SIZE });
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor);
        }

        let request = self
            .client
            .post(format!("{}/databases/{}/query", self.base_url, database_id))
            .json(&body);
        self.send(request).await
    }
}
