use async_trait::async_trait;
use thiserror::Error;

use mercabot_core::{Lead, Message, Product, ProductKey, UserId};

pub mod conversation;
pub mod lead;
pub mod memory;
pub mod product;

pub use conversation::SqlConversationRepository;
pub use lead::SqlLeadRepository;
pub use memory::{
    InMemoryConversationRepository, InMemoryLeadRepository, InMemoryProductRepository,
};
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Usage counters surfaced by the administrative stats endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationStats {
    pub total_messages: u64,
    pub inbound: u64,
    pub outbound: u64,
    pub unique_users: u64,
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn append(&self, message: Message) -> Result<(), RepositoryError>;
    /// Most recent messages for a user, newest first, bounded by `limit`.
    async fn fetch_recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError>;
    async fn count_outbound(&self, user_id: &UserId) -> Result<u32, RepositoryError>;
    async fn stats(&self) -> Result<ConversationStats, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Active, in-stock products ordered by display name. This ordering is
    /// the deterministic tie-break for ambiguous keyword matches.
    async fn list_sellable(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn find(&self, key: &ProductKey) -> Result<Option<Product>, RepositoryError>;
    async fn upsert(&self, product: Product) -> Result<(), RepositoryError>;
    /// Returns false when no product carries the key.
    async fn deactivate(&self, key: &ProductKey) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Overwrite semantics keyed by (user_id, phone); never duplicates.
    async fn upsert(&self, lead: Lead) -> Result<(), RepositoryError>;
    async fn list(&self) -> Result<Vec<Lead>, RepositoryError>;
    async fn count(&self) -> Result<u64, RepositoryError>;
}
