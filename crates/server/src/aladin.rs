//! HTTP client for the Aladin TTB open API.

use std::time::Duration;

use async_trait::async_trait;
use bookbot_core::{
    catalog::optional_field, config::CatalogConfig, Book, CatalogError, CatalogSource,
    ListRequest, SearchRequest,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

const API_VERSION: &str = "20131101";
const JS_PREFIX: &str = "var book = ";

pub struct AladinCatalog {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AladinPayload {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    item: Option<Vec<AladinItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AladinItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(default)]
    category_name: Option<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    isbn13: Option<String>,
}

impl From<AladinItem> for Book {
    fn from(item: AladinItem) -> Self {
        Self {
            title: optional_field(item.title).unwrap_or_default(),
            author: optional_field(item.author).unwrap_or_default(),
            publisher: optional_field(item.publisher).unwrap_or_default(),
            category_name: optional_field(item.category_name),
            cover_url: optional_field(item.cover),
            description: optional_field(item.description),
            link: optional_field(item.link),
            isbn13: optional_field(item.isbn13),
        }
    }
}

impl AladinCatalog {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| CatalogError::Http(error.to_string()))?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_owned(), api_key })
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn fetch(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<Book>, CatalogError> {
        let response = self
            .http
            .get(format!("{}/{endpoint}", self.base_url))
            .query(&[("ttbkey", self.api_key.expose_secret())])
            .query(params)
            .query(&[("SearchTarget", "Book"), ("output", "js"), ("Version", API_VERSION)])
            .send()
            .await
            .map_err(|error| CatalogError::Http(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|error| CatalogError::Http(error.to_string()))?;
        let books = parse_payload(&body)?;
        debug!(
            event_name = "catalog.http.fetched",
            endpoint,
            items = books.len(),
            "catalog page fetched"
        );
        Ok(books)
    }
}

#[async_trait]
impl CatalogSource for AladinCatalog {
    async fn list_items(&self, request: &ListRequest) -> Result<Vec<Book>, CatalogError> {
        self.fetch(
            "ItemList.aspx",
            &[
                ("QueryType", request.query_type.as_str().to_owned()),
                ("CategoryId", request.category_id.to_string()),
                ("MaxResults", request.max_results.to_string()),
                ("start", request.start.to_string()),
            ],
        )
        .await
    }

    async fn search_items(&self, request: &SearchRequest) -> Result<Vec<Book>, CatalogError> {
        self.fetch(
            "ItemSearch.aspx",
            &[
                ("Query", request.keyword.clone()),
                ("QueryType", "Keyword".to_owned()),
                ("MaxResults", request.max_results.to_string()),
                ("start", "1".to_owned()),
            ],
        )
        .await
    }
}

/// Decodes an `output=js` body, which may arrive wrapped as `var book = {...};`.
fn parse_payload(body: &str) -> Result<Vec<Book>, CatalogError> {
    let trimmed = body.trim();
    let trimmed = trimmed.strip_prefix(JS_PREFIX).unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed).trim();

    let payload: AladinPayload =
        serde_json::from_str(trimmed).map_err(|error| CatalogError::Decode(error.to_string()))?;

    if let Some(code) = payload.error_code {
        return Err(CatalogError::Api {
            code,
            message: payload.error_message.unwrap_or_else(|| "unknown error".to_owned()),
        });
    }

    Ok(payload.item.unwrap_or_default().into_iter().map(Book::from).collect())
}
