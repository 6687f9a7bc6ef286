//! Bearer-token authentication resolving the caller to exactly one vendor.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    Json,
};

use crate::error::AppError;
use crate::models::common::ErrorResponse;
use crate::services::transaction_store;
use crate::AppState;

/// Id of the vendor owning the presented API token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedVendor(pub i32);

impl FromRequestParts<AppState> for AuthenticatedVendor {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;

        if let Some(vendor_id) = state.vendor_tokens.get(token).await {
            return Ok(Self(vendor_id));
        }

        let vendor_id = transaction_store::find_vendor_id_by_token(&state.db, token)
            .await
            .map_err(AppError::from)?
            .ok_or(AppError::Unauthorized)?;

        state
            .vendor_tokens
            .insert(token.to_string(), vendor_id)
            .await;
        Ok(Self(vendor_id))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
