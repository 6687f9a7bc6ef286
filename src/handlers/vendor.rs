use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AppError;
use crate::handlers::auth::AuthenticatedVendor;
use crate::models::common::{ErrorResponse, MessageResponse};
use crate::models::vendor::{
    ConnectProcessorRequest, ConnectProcessorResponse, InitiateSubscriptionResponse,
};
use crate::services::processor;
use crate::services::processor_sync::SyncSummary;
use crate::services::transaction_store;
use crate::AppState;

/// POST /api/connect-processor
pub async fn connect_processor(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor_id): AuthenticatedVendor,
    Json(request): Json<ConnectProcessorRequest>,
) -> Result<Json<ConnectProcessorResponse>, (StatusCode, Json<ErrorResponse>)> {
    let secret_key = request.secret_key.trim();
    if !secret_key.starts_with("sk_") {
        return Err(AppError::validation("secret_key must start with sk_").into());
    }

    let vendor = transaction_store::find_vendor(&state.db, vendor_id).await?;
    let vendor = transaction_store::set_processor_credential(
        &state.db,
        vendor,
        secret_key,
        state.clock.now(),
    )
    .await
    .map_err(AppError::from)?;

    tracing::info!("Vendor {} connected a processor account", vendor_id);

    let bootstrapped_customer = match state.sync.bootstrap_customer(&vendor).await {
        Ok(created) => created,
        Err(e) => {
            tracing::warn!("Vendor {}: customer bootstrap failed: {}", vendor_id, e);
            false
        }
    };

    Ok(Json(ConnectProcessorResponse {
        message: "Payment processor connected".to_string(),
        bootstrapped_customer,
    }))
}

/// POST /api/sync
pub async fn sync_now(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor_id): AuthenticatedVendor,
) -> Result<Json<SyncSummary>, (StatusCode, Json<ErrorResponse>)> {
    let vendor = transaction_store::find_vendor(&state.db, vendor_id).await?;
    let summary = state.sync.sync_and_record(&vendor).await?;

    Ok(Json(summary))
}

/// POST /api/initiate-subscription
pub async fn initiate_subscription(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor_id): AuthenticatedVendor,
) -> Result<Json<InitiateSubscriptionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let vendor = transaction_store::find_vendor(&state.db, vendor_id).await?;
    let secret = vendor.processor_credential().ok_or(AppError::NotConnected)?;
    let email = vendor
        .contact_email
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::validation("Vendor has no contact email"))?;

    let initialized = state
        .processor
        .initialize_transaction(
            secret,
            email,
            state.config.subscription_amount_minor,
            &state.config.payment_callback_url,
        )
        .await?;

    Ok(Json(InitiateSubscriptionResponse {
        authorization_url: initialized.authorization_url,
        reference: initialized.reference,
    }))
}

/// GET /api/verify-transaction/{reference}
pub async fn verify_transaction(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor_id): AuthenticatedVendor,
    Path(reference): Path<String>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    processor::validate_reference(&reference)?;
    let vendor = transaction_store::find_vendor(&state.db, vendor_id).await?;
    let secret = vendor.processor_credential().ok_or(AppError::NotConnected)?;

    let verified = state.processor.verify_transaction(secret, &reference).await?;
    if !verified.is_some_and(|v| v.status == "success") {
        return Err(AppError::validation("verification failed").into());
    }

    transaction_store::set_subscription_active(&state.db, vendor, state.clock.now())
        .await
        .map_err(AppError::from)?;
    tracing::info!("Vendor {} subscription activated ({})", vendor_id, reference);

    Ok(Json(MessageResponse::new("Subscription activated")))
}
