use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignRequest {
    pub segment: Option<String>,
    pub channel: Option<String>,
    #[serde(default)]
    pub subject: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignResponse {
    pub targeted: usize,
    pub delivered: usize,
    pub message: String,
}
