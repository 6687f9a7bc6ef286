use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::handlers::auth::AuthenticatedVendor;
use crate::models::common::ErrorResponse;
use crate::models::dashboard::{DashboardResponse, FreshQuery, SegmentsResponse};
use crate::AppState;

/// GET /api/vendor-dashboard
pub async fn get_vendor_dashboard(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor_id): AuthenticatedVendor,
    Query(query): Query<FreshQuery>,
) -> Result<Json<DashboardResponse>, (StatusCode, Json<ErrorResponse>)> {
    let result = state.analytics.dashboard(vendor_id, query.fresh).await?;

    Ok(Json(DashboardResponse::new(result.value, result.cached)))
}

/// GET /api/customer-segments
pub async fn get_customer_segments(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor_id): AuthenticatedVendor,
    Query(query): Query<FreshQuery>,
) -> Result<Json<SegmentsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let result = state.analytics.segment_counts(vendor_id, query.fresh).await?;

    Ok(Json(SegmentsResponse {
        segments: result.value,
        cached: result.cached,
    }))
}
