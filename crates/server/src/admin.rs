//! JSON administrative surface: catalog management, captured leads, and
//! usage counters. Thin reads/writes over the same stores the engine uses;
//! catalog writes invalidate the engine's cache.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use mercabot_core::{
    ApplicationError, DiscountPolicy, InterfaceError, Product, ProductKey,
};
use mercabot_db::repositories::{ConversationRepository, LeadRepository, ProductRepository};
use mercabot_db::CatalogCache;

#[derive(Clone)]
pub struct AdminState {
    pub products: Arc<dyn ProductRepository>,
    pub leads: Arc<dyn LeadRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub catalog_cache: Arc<CatalogCache>,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/{key}", axum::routing::put(update_product).delete(deactivate_product))
        .route("/api/leads", get(list_leads))
        .route("/api/stats", get(stats))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ProductPayload {
    pub key: String,
    pub name: String,
    pub unit_price: rust_decimal::Decimal,
    pub stock: i64,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub discount: Option<DiscountPolicy>,
}

fn default_active() -> bool {
    true
}

impl ProductPayload {
    fn into_product(self, key_override: Option<String>) -> Result<Product, ApplicationError> {
        if let Some(policy) = &self.discount {
            policy.validate()?;
        }
        Ok(Product {
            key: ProductKey(key_override.unwrap_or(self.key)),
            name: self.name,
            unit_price: self.unit_price,
            stock: self.stock,
            keywords: self.keywords,
            active: self.active,
            discount: self.discount,
        })
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    correlation_id: String,
}

fn error_response(error: ApplicationError) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    warn!(correlation_id = %correlation_id, error = %error, "admin request failed");

    let interface = error.into_interface(correlation_id.clone());
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody { error: interface.user_message(), correlation_id })).into_response()
}

fn persistence(err: impl std::fmt::Display) -> ApplicationError {
    ApplicationError::Persistence(err.to_string())
}

async fn list_products(State(state): State<AdminState>) -> Response {
    match state.products.list_all().await {
        Ok(products) => Json(products).into_response(),
        Err(err) => error_response(persistence(err)),
    }
}

async fn create_product(
    State(state): State<AdminState>,
    Json(payload): Json<ProductPayload>,
) -> Response {
    upsert_product(state, payload, None, StatusCode::CREATED).await
}

async fn update_product(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Json(payload): Json<ProductPayload>,
) -> Response {
    upsert_product(state, payload, Some(key), StatusCode::OK).await
}

async fn upsert_product(
    state: AdminState,
    payload: ProductPayload,
    key_override: Option<String>,
    success: StatusCode,
) -> Response {
    let product = match payload.into_product(key_override) {
        Ok(product) => product,
        Err(err) => return error_response(err),
    };

    match state.products.upsert(product.clone()).await {
        Ok(()) => {
            state.catalog_cache.invalidate().await;
            (success, Json(product)).into_response()
        }
        Err(err) => error_response(persistence(err)),
    }
}

async fn deactivate_product(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> Response {
    match state.products.deactivate(&ProductKey(key.clone())).await {
        Ok(true) => {
            state.catalog_cache.invalidate().await;
            Json(json!({ "status": "deactivated", "key": key })).into_response()
        }
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no product carries that key", "key": key })),
        )
            .into_response(),
        Err(err) => error_response(persistence(err)),
    }
}

async fn list_leads(State(state): State<AdminState>) -> Response {
    match state.leads.list().await {
        Ok(leads) => Json(leads).into_response(),
        Err(err) => error_response(persistence(err)),
    }
}

#[derive(Debug, Serialize)]
struct StatsBody {
    total_messages: u64,
    inbound: u64,
    outbound: u64,
    unique_users: u64,
    leads: u64,
}

async fn stats(State(state): State<AdminState>) -> Response {
    let conversation_stats = match state.conversations.stats().await {
        Ok(stats) => stats,
        Err(err) => return error_response(persistence(err)),
    };
    let leads = match state.leads.count().await {
        Ok(count) => count,
        Err(err) => return error_response(persistence(err)),
    };

    Json(StatsBody {
        total_messages: conversation_stats.total_messages,
        inbound: conversation_stats.inbound,
        outbound: conversation_stats.outbound,
        unique_users: conversation_stats.unique_users,
        leads,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use mercabot_db::repositories::{
        InMemoryConversationRepository, InMemoryLeadRepository, InMemoryProductRepository,
        ProductRepository,
    };
    use mercabot_db::CatalogCache;

    use super::{router, AdminState};

    fn state(products: Arc<InMemoryProductRepository>) -> AdminState {
        AdminState {
            products: products.clone(),
            leads: Arc::new(InMemoryLeadRepository::default()),
            conversations: Arc::new(InMemoryConversationRepository::default()),
            catalog_cache: Arc::new(CatalogCache::new(products, Duration::from_secs(60))),
        }
    }

    fn product_body(discount: Value) -> Value {
        json!({
            "key": "tappers",
            "name": "Tappers",
            "unit_price": "35",
            "stock": 50,
            "keywords": ["tapper", "tappers"],
            "discount": discount,
        })
    }

    async fn post_product(app: axum::Router, body: Value) -> StatusCode {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/products")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        response.status()
    }

    #[tokio::test]
    async fn valid_product_is_created_and_visible_to_the_engine() {
        let products = Arc::new(InMemoryProductRepository::default());
        let state = state(products.clone());
        let app = router(state.clone());

        let body = product_body(json!({
            "min_quantity": 3,
            "percent_tiers": { "3": 10 },
            "fixed_totals": { "3": "95" },
        }));
        assert_eq!(post_product(app, body).await, StatusCode::CREATED);

        let sellable = products.list_sellable().await.expect("list");
        assert_eq!(sellable.len(), 1);
        assert_eq!(sellable[0].unit_price, Decimal::from(35));

        let cached = state.catalog_cache.sellable().await.expect("cache read");
        assert_eq!(cached.len(), 1, "cache reflects the write");
    }

    #[tokio::test]
    async fn invalid_discount_policy_is_rejected_with_correlation_id() {
        let products = Arc::new(InMemoryProductRepository::default());
        let app = router(state(products.clone()));

        // decreasing percents violate the policy invariant
        let body = product_body(json!({
            "min_quantity": 3,
            "percent_tiers": { "3": 10, "6": 5 },
        }));
        assert_eq!(post_product(app, body).await, StatusCode::BAD_REQUEST);
        assert!(products.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn deactivating_unknown_product_is_not_found() {
        let products = Arc::new(InMemoryProductRepository::default());
        let app = router(state(products));

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/products/nope")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
