use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectProcessorRequest {
    pub secret_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectProcessorResponse {
    pub message: String,
    pub bootstrapped_customer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateSubscriptionResponse {
    pub authorization_url: String,
    pub reference: String,
}
