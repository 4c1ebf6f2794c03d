//! CRM Hub API Server
//!
//! REST API for customers, orders, audience previews and campaigns.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::{AppConfig, ConfigError, StorageKind};
pub use error::ApiError;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Customers and orders
        .route("/api/customers", post(handlers::create_customer).get(handlers::list_customers))
        .route("/api/orders", post(handlers::create_order))
        .route("/api/orders/:customer_id", get(handlers::list_customer_orders))
        // Campaigns
        .route("/api/campaigns", post(handlers::create_campaign).get(handlers::list_campaigns))
        .route("/api/campaigns/preview", post(handlers::preview_audience))
        .route("/api/campaigns/:id", get(handlers::get_campaign))
        // Rule generation
        .route("/api/ai/generate-rules", post(handlers::generate_rules))
        .route("/api/dashboard/stats", get(handlers::dashboard_stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
