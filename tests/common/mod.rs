#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use vendor_segments::config::AppConfig;
use vendor_segments::entities::{customers, transactions, vendors};
use vendor_segments::error::AppError;
use vendor_segments::services::campaign::{Channel, LogGateway};
use vendor_segments::services::clock::ManualClock;
use vendor_segments::services::processor::{
    InitializedTransaction, Page, PageMeta, ProcessorApi, ProcessorCustomer,
    ProcessorTransaction, TransactionCustomer, VerifiedTransaction,
};
use vendor_segments::{handlers, AppState};

/// Fixed reference "now" for every test
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    test_now() - Duration::days(days)
}

/// Set up a migrated in-memory SQLite database
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    // One pooled connection keeps the in-memory database alive for the test
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn create_vendor(
    db: &DatabaseConnection,
    name: &str,
    api_token: &str,
    secret: Option<&str>,
) -> vendors::Model {
    vendors::ActiveModel {
        name: Set(name.to_string()),
        contact_email: Set(Some(format!("{}@shop.example", api_token))),
        api_token: Set(api_token.to_string()),
        processor_secret: Set(secret.map(str::to_string)),
        connected: Set(secret.is_some()),
        subscription_active: Set(false),
        created_at: Set(test_now()),
        updated_at: Set(test_now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_customer(
    db: &DatabaseConnection,
    vendor_id: i32,
    code: &str,
    email: &str,
    first_name: Option<&str>,
) -> customers::Model {
    customers::ActiveModel {
        vendor_id: Set(vendor_id),
        customer_code: Set(code.to_string()),
        email: Set(email.to_string()),
        first_name: Set(first_name.map(str::to_string)),
        last_name: Set(None),
        phone: Set(None),
        created_at: Set(test_now()),
        updated_at: Set(test_now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_transaction(
    db: &DatabaseConnection,
    customer: &customers::Model,
    reference: &str,
    amount_minor: i64,
    status: &str,
    paid_at: Option<DateTime<Utc>>,
) -> transactions::Model {
    transactions::ActiveModel {
        vendor_id: Set(customer.vendor_id),
        customer_id: Set(customer.id),
        reference: Set(reference.to_string()),
        transaction_code: Set(format!("code_{}", reference)),
        amount: Set(amount_minor),
        currency: Set("NGN".to_string()),
        status: Set(status.to_string()),
        channel: Set(Some("card".to_string())),
        paid_at: Set(paid_at),
        created_at: Set(test_now()),
        updated_at: Set(test_now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn wire_customer(code: &str, email: &str) -> ProcessorCustomer {
    ProcessorCustomer {
        customer_code: code.to_string(),
        email: email.to_string(),
        first_name: None,
        last_name: None,
        phone: None,
        created_at: Some(days_ago(365)),
    }
}

pub fn wire_transaction(
    id: i64,
    customer_code: &str,
    amount_minor: i64,
    status: &str,
    paid_at: Option<DateTime<Utc>>,
) -> ProcessorTransaction {
    ProcessorTransaction {
        id: Some(id),
        reference: format!("ref_{}", id),
        amount: amount_minor,
        currency: Some("NGN".to_string()),
        status: status.to_string(),
        paid_at,
        created_at: paid_at,
        channel: Some("card".to_string()),
        customer: TransactionCustomer {
            customer_code: customer_code.to_string(),
            email: None,
            first_name: None,
            last_name: None,
            phone: None,
        },
    }
}

/// In-process stand-in for the payment processor
#[derive(Default)]
pub struct FakeProcessor {
    pub customers: Mutex<Vec<ProcessorCustomer>>,
    pub transactions: Mutex<Vec<ProcessorTransaction>>,
    /// Transaction page that answers with an upstream failure
    pub fail_transaction_page: Mutex<Option<u32>>,
    pub verify_status: Mutex<Option<String>>,
    pub created_customers: Mutex<Vec<String>>,
    pub page_requests: Mutex<u32>,
}

impl FakeProcessor {
    pub fn new(customers: Vec<ProcessorCustomer>, transactions: Vec<ProcessorTransaction>) -> Self {
        Self {
            customers: Mutex::new(customers),
            transactions: Mutex::new(transactions),
            ..Default::default()
        }
    }

    fn page<T: Clone>(items: &[T], page: u32, per_page: u32) -> Page<T> {
        let start = ((page - 1) * per_page) as usize;
        let page_count = items.len().div_ceil(per_page as usize) as u32;
        Page {
            items: items.iter().skip(start).take(per_page as usize).cloned().collect(),
            meta: Some(PageMeta {
                total: Some(items.len() as u64),
                page: Some(page),
                page_count: Some(page_count),
                per_page: Some(per_page),
            }),
        }
    }
}

#[async_trait]
impl ProcessorApi for FakeProcessor {
    async fn list_customers(
        &self,
        _secret: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<ProcessorCustomer>, AppError> {
        *self.page_requests.lock() += 1;
        Ok(Self::page(&self.customers.lock(), page, per_page))
    }

    async fn list_transactions(
        &self,
        _secret: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<ProcessorTransaction>, AppError> {
        *self.page_requests.lock() += 1;
        if *self.fail_transaction_page.lock() == Some(page) {
            return Err(AppError::Upstream("processor unavailable".to_string()));
        }
        Ok(Self::page(&self.transactions.lock(), page, per_page))
    }

    async fn create_customer(
        &self,
        _secret: &str,
        email: &str,
        first_name: &str,
    ) -> Result<ProcessorCustomer, AppError> {
        self.created_customers.lock().push(email.to_string());
        Ok(ProcessorCustomer {
            customer_code: "CUS_bootstrap".to_string(),
            email: email.to_string(),
            first_name: Some(first_name.to_string()),
            last_name: None,
            phone: None,
            created_at: None,
        })
    }

    async fn initialize_transaction(
        &self,
        _secret: &str,
        _email: &str,
        amount_minor: i64,
        _callback_url: &str,
    ) -> Result<InitializedTransaction, AppError> {
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.example/pay/{}", amount_minor),
            reference: "sub_ref_1".to_string(),
            access_code: None,
        })
    }

    async fn verify_transaction(
        &self,
        _secret: &str,
        reference: &str,
    ) -> Result<Option<VerifiedTransaction>, AppError> {
        Ok(self.verify_status.lock().clone().map(|status| VerifiedTransaction {
            status,
            reference: reference.to_string(),
            amount: Some(10_000),
        }))
    }
}

pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|name| match name {
        "DATABASE_URL" => Some("sqlite::memory:".to_string()),
        "PAYMENT_CALLBACK_URL" => Some("https://shop.example/callback".to_string()),
        _ => None,
    })
    .unwrap()
}

pub struct TestApp {
    pub db: DatabaseConnection,
    pub clock: Arc<ManualClock>,
    pub processor: Arc<FakeProcessor>,
    pub state: AppState,
}

impl TestApp {
    pub async fn new(processor: FakeProcessor) -> Self {
        let db = setup_test_db().await.unwrap();
        let clock = Arc::new(ManualClock::new(test_now()));
        let processor = Arc::new(processor);
        let state = AppState::new(
            db.clone(),
            test_config(),
            processor.clone(),
            Arc::new(LogGateway::new(Channel::Email)),
            clock.clone(),
        );
        Self {
            db,
            clock,
            processor,
            state,
        }
    }

    pub fn router(&self) -> Router {
        handlers::router(self.state.clone())
    }

    /// Send one request and return status plus JSON body (Null when empty).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}
