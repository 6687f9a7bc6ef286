use axum::{extract::State, http::StatusCode, Json};

use crate::handlers::auth::AuthenticatedVendor;
use crate::models::common::ErrorResponse;
use crate::models::segment_filter::{FilteredCustomer, SegmentFilterRequest, SegmentFilterResponse};
use crate::services::dynamic_filter::DynamicFilter;
use crate::AppState;

/// POST /api/customers-segment-filter
pub async fn filter_customers(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor_id): AuthenticatedVendor,
    Json(request): Json<SegmentFilterRequest>,
) -> Result<Json<SegmentFilterResponse>, (StatusCode, Json<ErrorResponse>)> {
    let filter = DynamicFilter::parse(
        request.filter_type.as_deref(),
        request.value.as_ref(),
        request.days.as_ref(),
    )?;

    let matched = state.analytics.filter_customers(vendor_id, &filter).await?;

    let customers: Vec<FilteredCustomer> = matched
        .iter()
        .map(|(customer, stats)| FilteredCustomer::new(customer, stats))
        .collect();

    Ok(Json(SegmentFilterResponse {
        filter_type: request.filter_type.unwrap_or_default(),
        count: customers.len(),
        customers,
    }))
}
