use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::DiscountPolicy;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductKey(pub String);

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub key: ProductKey,
    pub name: String,
    pub unit_price: Decimal,
    pub stock: i64,
    pub keywords: Vec<String>,
    pub active: bool,
    pub discount: Option<DiscountPolicy>,
}

impl Product {
    /// Only active products with stock on hand are visible to the engine.
    pub fn sellable(&self) -> bool {
        self.active && self.stock > 0
    }
}
