//! Domain core for the book recommendation bot: catalog types, the retrying
//! recommender and layered configuration.

pub mod catalog;
pub mod config;
pub mod errors;
pub mod recommend;

pub use catalog::{
    find_genre, Book, CatalogError, CatalogSource, Genre, ListRequest, QueryType, SearchRequest,
    GENRES,
};
pub use errors::{ApplicationError, InterfaceError};
pub use recommend::{Pick, Recommender, RetryPolicy};
