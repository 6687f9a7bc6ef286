use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub mod auth;
pub mod campaign;
pub mod customer;
pub mod dashboard;
pub mod segment_filter;
pub mod vendor;

async fn health() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/vendor-dashboard", get(dashboard::get_vendor_dashboard))
        .route("/api/customer-segments", get(dashboard::get_customer_segments))
        .route(
            "/api/customers-segment-filter",
            post(segment_filter::filter_customers),
        )
        .route("/api/customers", get(customer::get_customers))
        .route("/api/campaigns", post(campaign::send_campaign))
        .route("/api/connect-processor", post(vendor::connect_processor))
        .route("/api/sync", post(vendor::sync_now))
        .route(
            "/api/initiate-subscription",
            post(vendor::initiate_subscription),
        )
        .route(
            "/api/verify-transaction/{reference}",
            get(vendor::verify_transaction),
        )
        .with_state(state)
}
