//! Catalog domain types and the seam to the external book-catalog API.
//!
//! The catalog is consulted through [`CatalogSource`]; the server crate provides
//! the HTTP implementation, tests provide scripted fakes.

pub mod genre;

use async_trait::async_trait;
use thiserror::Error;

pub use genre::{find_genre, Genre, GENRES};

pub const MISSING_TITLE: &str = "제목 없음";
pub const MISSING_INFO: &str = "정보 없음";
pub const MISSING_DESCRIPTION: &str = "소개 없음";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub category_name: Option<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub isbn13: Option<String>,
}

impl Book {
    pub fn display_title(&self) -> &str {
        non_empty(&self.title).unwrap_or(MISSING_TITLE)
    }

    pub fn display_author(&self) -> &str {
        non_empty(&self.author).unwrap_or(MISSING_INFO)
    }

    pub fn display_publisher(&self) -> &str {
        non_empty(&self.publisher).unwrap_or(MISSING_INFO)
    }

    /// Category reported by the catalog, else the genre the book was picked from.
    pub fn display_category<'a>(&'a self, fallback: Option<&'a Genre>) -> &'a str {
        self.category_name
            .as_deref()
            .and_then(non_empty)
            .or_else(|| fallback.map(|genre| genre.label))
            .unwrap_or(MISSING_INFO)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Normalizes an optional catalog string field: blank values become `None`.
pub fn optional_field(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_owned()).filter(|raw| !raw.is_empty())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryType {
    ItemNewAll,
    ItemNewSpecial,
    Bestseller,
    ItemEditorChoice,
    BlogBest,
}

impl QueryType {
    pub const ALL: [QueryType; 5] = [
        QueryType::ItemNewAll,
        QueryType::ItemNewSpecial,
        QueryType::Bestseller,
        QueryType::ItemEditorChoice,
        QueryType::BlogBest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ItemNewAll => "ItemNewAll",
            Self::ItemNewSpecial => "ItemNewSpecial",
            Self::Bestseller => "Bestseller",
            Self::ItemEditorChoice => "ItemEditorChoice",
            Self::BlogBest => "BlogBest",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRequest {
    pub query_type: QueryType,
    pub category_id: u32,
    pub max_results: u32,
    pub start: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub keyword: String,
    pub max_results: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(String),
    #[error("catalog responded with HTTP status {0}")]
    Status(u16),
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
    #[error("catalog rejected the request ({code}): {message}")]
    Api { code: i64, message: String },
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_items(&self, request: &ListRequest) -> Result<Vec<Book>, CatalogError>;
    async fn search_items(&self, request: &SearchRequest) -> Result<Vec<Book>, CatalogError>;
}
