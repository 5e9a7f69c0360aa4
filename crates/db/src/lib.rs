pub mod catalog_cache;
pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod seed;

pub use catalog_cache::CatalogCache;
pub use connection::{connect, DbPool};
