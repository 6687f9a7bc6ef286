//! External payment processor client (Paystack-compatible REST API)
//!
//! Bearer-authenticated with the vendor's secret key. Listing calls are
//! retried with exponential backoff; calls that create state are not.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::error::AppError;

/// Largest page the processor serves
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: Option<PageMeta>,
}

impl<T> Page<T> {
    /// True when no page follows this one.
    pub fn is_last(&self, page: u32, per_page: u32) -> bool {
        if self.items.is_empty() || (self.items.len() as u32) < per_page {
            return true;
        }
        match self.meta.as_ref().and_then(|m| m.page_count) {
            Some(page_count) => page >= page_count,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorCustomer {
    pub customer_code: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, rename = "createdAt", alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCustomer {
    pub customer_code: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorTransaction {
    #[serde(default)]
    pub id: Option<i64>,
    pub reference: String,
    /// Minor currency units
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: String,
    #[serde(default, alias = "paidAt")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channel: Option<String>,
    pub customer: TransactionCustomer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub reference: String,
    #[serde(default)]
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub status: String,
    pub reference: String,
    #[serde(default)]
    pub amount: Option<i64>,
}

#[derive(Debug, Serialize)]
struct CreateCustomerBody<'a> {
    email: &'a str,
    first_name: &'a str,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    callback_url: &'a str,
}

/// Operations consumed from the external processor
#[async_trait]
pub trait ProcessorApi: Send + Sync {
    async fn list_customers(
        &self,
        secret: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<ProcessorCustomer>, AppError>;

    async fn list_transactions(
        &self,
        secret: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<ProcessorTransaction>, AppError>;

    async fn create_customer(
        &self,
        secret: &str,
        email: &str,
        first_name: &str,
    ) -> Result<ProcessorCustomer, AppError>;

    async fn initialize_transaction(
        &self,
        secret: &str,
        email: &str,
        amount_minor: i64,
        callback_url: &str,
    ) -> Result<InitializedTransaction, AppError>;

    /// `Ok(None)` when the processor reports the lookup itself as failed.
    async fn verify_transaction(
        &self,
        secret: &str,
        reference: &str,
    ) -> Result<Option<VerifiedTransaction>, AppError>;
}

#[derive(Clone)]
pub struct ProcessorClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ProcessorClient {
    pub fn new(base_url: String, timeout: Duration, max_retries: u32) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: max_retries.max(1),
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Initial backoff delay; doubles after every retry.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// GET with exponential backoff on transport errors, 429 and 5xx
    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        secret: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let mut delay = self.retry_delay;

        for attempt in 0..self.max_retries {
            let last_attempt = attempt + 1 == self.max_retries;

            let failure = match self
                .client
                .get(&url)
                .bearer_auth(secret)
                .header("accept", "application/json")
                .query(query)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json::<Envelope<T>>().await?);
                }
                Ok(response) if is_retryable(response.status()) => {
                    format!("HTTP {}", response.status())
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::Upstream(format!(
                        "processor returned {} for {}: {}",
                        status, path, body
                    )));
                }
                Err(e) => e.to_string(),
            };

            if last_attempt {
                return Err(AppError::Upstream(format!(
                    "{} failed after {} attempts: {}",
                    path, self.max_retries, failure
                )));
            }

            tracing::warn!(
                "Retry {}/{} for {}: {}. Waiting {:?}",
                attempt + 1,
                self.max_retries,
                path,
                failure,
                delay
            );

            tokio::time::sleep(delay).await;
            delay *= 2; // Exponential backoff
        }

        Err(AppError::Upstream("Max retries exceeded".into()))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        secret: &str,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(secret)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "processor returned {} for {}: {}",
                status, path, error_text
            )));
        }

        Ok(response.json().await?)
    }
}

/// Transaction references travel as a URL path segment.
pub fn validate_reference(reference: &str) -> Result<(), AppError> {
    let valid = !reference.is_empty()
        && reference.len() <= 100
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::validation(
            "reference may only contain letters, digits, '-' and '_'",
        ))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn into_page<T>(envelope: Envelope<Vec<T>>, path: &str) -> Result<Page<T>, AppError> {
    if !envelope.status {
        return Err(AppError::Upstream(format!(
            "{} rejected: {}",
            path, envelope.message
        )));
    }
    Ok(Page {
        items: envelope.data.unwrap_or_default(),
        meta: envelope.meta,
    })
}

fn into_data<T>(envelope: Envelope<T>, path: &str) -> Result<T, AppError> {
    if !envelope.status {
        return Err(AppError::Upstream(format!(
            "{} rejected: {}",
            path, envelope.message
        )));
    }
    envelope
        .data
        .ok_or_else(|| AppError::Upstream(format!("{} returned no data", path)))
}

fn page_query(page: u32, per_page: u32) -> Vec<(&'static str, String)> {
    vec![
        ("perPage", per_page.min(MAX_PAGE_SIZE).to_string()),
        ("page", page.to_string()),
    ]
}

#[async_trait]
impl ProcessorApi for ProcessorClient {
    async fn list_customers(
        &self,
        secret: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<ProcessorCustomer>, AppError> {
        let envelope = self
            .get_with_retry(secret, "/customer", &page_query(page, per_page))
            .await?;
        into_page(envelope, "/customer")
    }

    async fn list_transactions(
        &self,
        secret: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<ProcessorTransaction>, AppError> {
        let envelope = self
            .get_with_retry(secret, "/transaction", &page_query(page, per_page))
            .await?;
        into_page(envelope, "/transaction")
    }

    async fn create_customer(
        &self,
        secret: &str,
        email: &str,
        first_name: &str,
    ) -> Result<ProcessorCustomer, AppError> {
        let envelope = self
            .post(secret, "/customer", &CreateCustomerBody { email, first_name })
            .await?;
        into_data(envelope, "/customer")
    }

    async fn initialize_transaction(
        &self,
        secret: &str,
        email: &str,
        amount_minor: i64,
        callback_url: &str,
    ) -> Result<InitializedTransaction, AppError> {
        let body = InitializeBody {
            email,
            amount: amount_minor,
            callback_url,
        };
        let envelope = self.post(secret, "/transaction/initialize", &body).await?;
        into_data(envelope, "/transaction/initialize")
    }

    async fn verify_transaction(
        &self,
        secret: &str,
        reference: &str,
    ) -> Result<Option<VerifiedTransaction>, AppError> {
        validate_reference(reference)?;
        let path = format!("/transaction/verify/{}", reference);
        let envelope: Envelope<VerifiedTransaction> =
            self.get_with_retry(secret, &path, &[]).await?;
        if !envelope.status {
            tracing::info!("Verification of {} rejected: {}", reference, envelope.message);
            return Ok(None);
        }
        Ok(envelope.data)
    }
}
