//! In-memory repository doubles for tests and for wiring the engine without
//! a database.

use std::collections::HashMap;

use tokio::sync::RwLock;

use mercabot_core::{Direction, Lead, Message, Product, ProductKey, UserId};

use super::{
    ConversationRepository, ConversationStats, LeadRepository, ProductRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryConversationRepository {
    messages: RwLock<Vec<Message>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn append(&self, message: Message) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        messages.push(message);
        Ok(())
    }

    async fn fetch_recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .rev()
            .filter(|message| &message.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_outbound(&self, user_id: &UserId) -> Result<u32, RepositoryError> {
        let messages = self.messages.read().await;
        let count = messages
            .iter()
            .filter(|message| {
                &message.user_id == user_id && message.direction == Direction::Outbound
            })
            .count();
        Ok(count as u32)
    }

    async fn stats(&self) -> Result<ConversationStats, RepositoryError> {
        let messages = self.messages.read().await;
        let inbound =
            messages.iter().filter(|message| message.direction == Direction::Inbound).count();
        let users: std::collections::HashSet<&str> =
            messages.iter().map(|message| message.user_id.0.as_str()).collect();

        Ok(ConversationStats {
            total_messages: messages.len() as u64,
            inbound: inbound as u64,
            outbound: (messages.len() - inbound) as u64,
            unique_users: users.len() as u64,
        })
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryProductRepository {
    pub async fn with_products(products: Vec<Product>) -> Self {
        let repo = Self::default();
        {
            let mut map = repo.products.write().await;
            for product in products {
                map.insert(product.key.0.clone(), product);
            }
        }
        repo
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn list_sellable(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut sellable: Vec<Product> =
            products.values().filter(|product| product.sellable()).cloned().collect();
        sellable.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sellable)
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn find(&self, key: &ProductKey) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&key.0).cloned())
    }

    async fn upsert(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.key.0.clone(), product);
        Ok(())
    }

    async fn deactivate(&self, key: &ProductKey) -> Result<bool, RepositoryError> {
        let mut products = self.products.write().await;
        match products.get_mut(&key.0) {
            Some(product) => {
                product.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<HashMap<(String, String), Lead>>,
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn upsert(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut leads = self.leads.write().await;
        leads.insert((lead.user_id.0.clone(), lead.phone.clone()), lead);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        let leads = self.leads.read().await;
        let mut all: Vec<Lead> = leads.values().cloned().collect();
        all.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        Ok(all)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let leads = self.leads.read().await;
        Ok(leads.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use mercabot_core::{Direction, Lead, Message, Product, ProductKey, UserId};

    use crate::repositories::{
        ConversationRepository, InMemoryConversationRepository, InMemoryLeadRepository,
        InMemoryProductRepository, LeadRepository, ProductRepository,
    };

    fn message(user: &str, text: &str, direction: Direction) -> Message {
        Message {
            user_id: UserId(user.to_string()),
            text: text.to_string(),
            direction,
            timestamp: Utc::now(),
        }
    }

    fn product(key: &str, name: &str, stock: i64) -> Product {
        Product {
            key: ProductKey(key.to_string()),
            name: name.to_string(),
            unit_price: Decimal::from(10),
            stock,
            keywords: vec![key.to_string()],
            active: true,
            discount: None,
        }
    }

    #[tokio::test]
    async fn fetch_recent_is_newest_first_and_bounded() {
        let repo = InMemoryConversationRepository::default();
        let user = UserId("u-1".to_string());
        for index in 0..4 {
            repo.append(message("u-1", &format!("m{index}"), Direction::Inbound))
                .await
                .expect("append");
        }
        repo.append(message("u-2", "other user", Direction::Inbound)).await.expect("append");

        let window = repo.fetch_recent(&user, 3).await.expect("fetch");
        let texts: Vec<&str> = window.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m2", "m1"]);
    }

    #[tokio::test]
    async fn count_outbound_is_per_user() {
        let repo = InMemoryConversationRepository::default();
        repo.append(message("u-1", "hola", Direction::Inbound)).await.expect("append");
        repo.append(message("u-1", "35 bs", Direction::Outbound)).await.expect("append");
        repo.append(message("u-2", "te escribo", Direction::Outbound)).await.expect("append");

        let count = repo.count_outbound(&UserId("u-1".to_string())).await.expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn sellable_listing_is_name_ordered_and_filtered() {
        let repo = InMemoryProductRepository::with_products(vec![
            product("vasos", "Vasos", 5),
            product("tappers", "Tappers", 10),
            product("platos", "Platos", 0),
        ])
        .await;

        let sellable = repo.list_sellable().await.expect("list");
        let names: Vec<&str> = sellable.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Tappers", "Vasos"]);
    }

    #[tokio::test]
    async fn deactivated_product_leaves_sellable_listing() {
        let repo = InMemoryProductRepository::with_products(vec![product("tappers", "Tappers", 10)])
            .await;

        let found = repo.deactivate(&ProductKey("tappers".to_string())).await.expect("deactivate");
        assert!(found);
        assert!(repo.list_sellable().await.expect("list").is_empty());
        assert_eq!(repo.list_all().await.expect("list all").len(), 1);

        let missing = repo.deactivate(&ProductKey("nope".to_string())).await.expect("deactivate");
        assert!(!missing);
    }

    #[tokio::test]
    async fn lead_recapture_overwrites_instead_of_duplicating() {
        let repo = InMemoryLeadRepository::default();
        let first = Lead {
            user_id: UserId("u-1".to_string()),
            phone: "70012345".to_string(),
            interested_products: BTreeSet::from([ProductKey("tappers".to_string())]),
            captured_at: Utc::now() - Duration::minutes(5),
        };
        let second = Lead {
            interested_products: BTreeSet::from([
                ProductKey("tappers".to_string()),
                ProductKey("vasos".to_string()),
            ]),
            captured_at: Utc::now(),
            ..first.clone()
        };

        repo.upsert(first).await.expect("first upsert");
        repo.upsert(second.clone()).await.expect("second upsert");

        assert_eq!(repo.count().await.expect("count"), 1);
        let stored = repo.list().await.expect("list");
        assert_eq!(stored, vec![second]);
    }
}
