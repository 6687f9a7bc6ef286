use axum::{extract::State, http::StatusCode, Json};

use crate::handlers::auth::AuthenticatedVendor;
use crate::models::common::ErrorResponse;
use crate::models::customer::{CustomerOverview, CustomerOverviewResponse};
use crate::AppState;

/// GET /api/customers
pub async fn get_customers(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor_id): AuthenticatedVendor,
) -> Result<Json<CustomerOverviewResponse>, (StatusCode, Json<ErrorResponse>)> {
    let activity = state.analytics.customer_activity(vendor_id).await?;

    Ok(Json(activity.into_iter().map(CustomerOverview::from).collect()))
}
