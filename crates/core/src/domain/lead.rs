use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::UserId;
use super::product::ProductKey;

/// A captured customer contact plus the products they showed interest in.
/// At most one lead exists per (user, phone) pair; re-capture overwrites.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub user_id: UserId,
    pub phone: String,
    pub interested_products: BTreeSet<ProductKey>,
    pub captured_at: DateTime<Utc>,
}
