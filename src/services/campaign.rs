//! Campaign Dispatcher
//!
//! Resolves a segment through the analytics service and forwards the members
//! to a delivery gateway. Delivery itself belongs to the gateway; SMS has no
//! real provider yet and is only logged.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::entities::customers;
use crate::error::AppError;
use crate::services::analytics::AnalyticsService;
use crate::services::segmentation::Segment;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl FromStr for Channel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            other => Err(AppError::validation(format!(
                "Unsupported channel '{}' (expected email or sms)",
                other
            ))),
        }
    }
}

/// Accepts `high_value` style names and display names like `High Value Customers`.
pub fn parse_segment(name: &str) -> Result<Segment, AppError> {
    serde_json::from_value(serde_json::Value::String(name.trim().to_string()))
        .map_err(|_| AppError::validation(format!("Unknown segment '{}'", name)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub first_name: Option<String>,
    pub phone: Option<String>,
}

impl Recipient {
    /// Value substituted for `{name}` in templates
    pub fn greeting_name(&self) -> String {
        self.first_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or_default().to_string())
    }

    pub fn personalize(&self, template: &str) -> String {
        template.replace("{name}", &self.greeting_name())
    }
}

impl From<&customers::Model> for Recipient {
    fn from(customer: &customers::Model) -> Self {
        Self {
            email: customer.email.clone(),
            first_name: customer.first_name.clone(),
            phone: customer.phone.clone(),
        }
    }
}

/// External messaging collaborator
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Returns how many recipients were handed off successfully.
    async fn deliver(
        &self,
        recipients: &[Recipient],
        subject: &str,
        message: &str,
    ) -> Result<usize, AppError>;
}

/// Records deliveries in the log only
pub struct LogGateway {
    channel: Channel,
}

impl LogGateway {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl DeliveryGateway for LogGateway {
    async fn deliver(
        &self,
        recipients: &[Recipient],
        subject: &str,
        _message: &str,
    ) -> Result<usize, AppError> {
        for recipient in recipients {
            let address = match self.channel {
                Channel::Email => recipient.email.as_str(),
                Channel::Sms => recipient.phone.as_deref().unwrap_or("<no phone>"),
            };
            info!(
                "[{}] would deliver '{}' to {}",
                self.channel.as_str(),
                recipient.personalize(subject),
                address
            );
        }
        Ok(recipients.len())
    }
}

/// SendGrid v3 mail API, one personalised request per recipient
pub struct SendGridGateway {
    client: Client,
    api_key: String,
    from_email: String,
    url: String,
}

impl SendGridGateway {
    pub fn new(api_key: String, from_email: String, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            from_email,
            url: SENDGRID_URL.to_string(),
        })
    }

    fn body(&self, recipient: &Recipient, subject: &str, message: &str) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": recipient.email }] }],
            "from": { "email": self.from_email },
            "subject": recipient.personalize(subject),
            "content": [{ "type": "text/plain", "value": recipient.personalize(message) }],
        })
    }

    async fn send_one(&self, recipient: &Recipient, subject: &str, message: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.body(recipient, subject, message))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "SendGrid returned {}: {}",
                status, error_text
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryGateway for SendGridGateway {
    async fn deliver(
        &self,
        recipients: &[Recipient],
        subject: &str,
        message: &str,
    ) -> Result<usize, AppError> {
        let mut delivered = 0;
        let mut last_error = None;

        for recipient in recipients {
            match self.send_one(recipient, subject, message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Failed to email {}: {}", recipient.email, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(delivered),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignOutcome {
    pub segment: Segment,
    pub channel: Channel,
    pub targeted: usize,
    pub delivered: usize,
}

impl CampaignOutcome {
    pub fn summary(&self) -> String {
        format!(
            "Campaign sent to {} {} via {}.",
            self.targeted,
            self.segment.display_name(),
            self.channel.as_str()
        )
    }
}

#[derive(Clone)]
pub struct CampaignDispatcher {
    analytics: AnalyticsService,
    email: Arc<dyn DeliveryGateway>,
    sms: Arc<dyn DeliveryGateway>,
}

impl CampaignDispatcher {
    pub fn new(
        analytics: AnalyticsService,
        email: Arc<dyn DeliveryGateway>,
        sms: Arc<dyn DeliveryGateway>,
    ) -> Self {
        Self {
            analytics,
            email,
            sms,
        }
    }

    pub async fn dispatch(
        &self,
        vendor_id: i32,
        segment: Segment,
        channel: Channel,
        subject: &str,
        message: &str,
    ) -> Result<CampaignOutcome, AppError> {
        if message.trim().is_empty() {
            return Err(AppError::validation("message is required"));
        }

        let members = self.analytics.customers_in_segment(vendor_id, segment).await?;
        let recipients: Vec<Recipient> = members.iter().map(Recipient::from).collect();

        let gateway = match channel {
            Channel::Email => &self.email,
            Channel::Sms => &self.sms,
        };
        let delivered = if recipients.is_empty() {
            0
        } else {
            gateway.deliver(&recipients, subject, message).await?
        };

        info!(
            "Vendor {}: campaign to {:?} via {} targeted {}, delivered {}",
            vendor_id,
            segment,
            channel.as_str(),
            recipients.len(),
            delivered
        );

        Ok(CampaignOutcome {
            segment,
            channel,
            targeted: recipients.len(),
            delivered,
        })
    }
}
