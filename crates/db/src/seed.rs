use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::info;

use mercabot_core::{DiscountPolicy, Product, ProductKey};

use crate::repositories::{ProductRepository, RepositoryError};

/// Seed the starter catalog when the products table is empty. Returns true
/// when seeding happened.
pub async fn seed_if_empty(repository: &dyn ProductRepository) -> Result<bool, RepositoryError> {
    if !repository.list_all().await?.is_empty() {
        return Ok(false);
    }

    for product in starter_catalog() {
        repository.upsert(product).await?;
    }
    info!("seeded starter product catalog");
    Ok(true)
}

fn starter_catalog() -> Vec<Product> {
    vec![
        Product {
            key: ProductKey("tappers".to_string()),
            name: "Tappers".to_string(),
            unit_price: Decimal::from(35),
            stock: 50,
            keywords: split_keywords("tapper,tappers,recipiente,contenedor,tupper"),
            active: true,
            discount: Some(DiscountPolicy {
                min_quantity: 3,
                percent_tiers: BTreeMap::from([(3, 10)]),
                fixed_totals: BTreeMap::from([(3, Decimal::from(95))]),
            }),
        },
        Product {
            key: ProductKey("vasos".to_string()),
            name: "Vasos".to_string(),
            unit_price: Decimal::from(12),
            stock: 30,
            keywords: split_keywords("vaso,vasos,copa,copas"),
            active: true,
            discount: None,
        },
        Product {
            key: ProductKey("platos".to_string()),
            name: "Platos".to_string(),
            unit_price: Decimal::from(20),
            stock: 25,
            keywords: split_keywords("plato,platos,plato hondo,plato llano"),
            active: true,
            discount: None,
        },
    ]
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}
