use axum::{extract::State, http::StatusCode, Json};

use crate::error::AppError;
use crate::handlers::auth::AuthenticatedVendor;
use crate::models::campaign::{CampaignRequest, CampaignResponse};
use crate::models::common::ErrorResponse;
use crate::services::campaign::{parse_segment, Channel};
use crate::AppState;

/// POST /api/campaigns
pub async fn send_campaign(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor_id): AuthenticatedVendor,
    Json(request): Json<CampaignRequest>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (Some(segment), Some(channel), Some(message)) = (
        request.segment.as_deref().filter(|s| !s.trim().is_empty()),
        request.channel.as_deref().filter(|s| !s.trim().is_empty()),
        request.message.as_deref().filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(AppError::validation("segment, channel and message are required").into());
    };

    let segment = parse_segment(segment)?;
    let channel: Channel = channel.parse()?;

    let outcome = state
        .campaigns
        .dispatch(vendor_id, segment, channel, &request.subject, message)
        .await?;

    Ok(Json(CampaignResponse {
        targeted: outcome.targeted,
        delivered: outcome.delivered,
        message: outcome.summary(),
    }))
}
