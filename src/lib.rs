// src/lib.rs

use moka::future::Cache;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;

use config::AppConfig;
use error::AppError;
use services::{
    analytics::AnalyticsService,
    campaign::{CampaignDispatcher, Channel, DeliveryGateway, LogGateway, SendGridGateway},
    clock::{Clock, SystemClock},
    dashboard_cache::DashboardCache,
    processor::{ProcessorApi, ProcessorClient},
    processor_sync::ProcessorSync,
    segmentation::SegmentRules,
};

/// How long a resolved bearer token stays cached
const VENDOR_TOKEN_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub processor: Arc<dyn ProcessorApi>,
    pub analytics: AnalyticsService,
    pub sync: ProcessorSync,
    pub campaigns: CampaignDispatcher,
    /// API token -> vendor id
    pub vendor_tokens: Cache<String, i32>,
}

impl AppState {
    /// Wire the services from explicit collaborators.
    pub fn new(
        db: DatabaseConnection,
        config: AppConfig,
        processor: Arc<dyn ProcessorApi>,
        email: Arc<dyn DeliveryGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mode = config
            .segmentation_mode
            .resolve(db.get_database_backend());
        let rules = SegmentRules::with_high_value_threshold(config.high_value_threshold);
        let cache = Arc::new(DashboardCache::new(clock.clone()));

        let analytics = AnalyticsService::new(db.clone(), mode, rules, cache, clock.clone());
        let sync = ProcessorSync::new(
            db.clone(),
            processor.clone(),
            clock.clone(),
            config.sync_max_pages,
        );
        let campaigns = CampaignDispatcher::new(
            analytics.clone(),
            email,
            Arc::new(LogGateway::new(Channel::Sms)),
        );

        tracing::info!("Segmentation aggregation mode: {:?}", mode);

        Self {
            db,
            config: Arc::new(config),
            clock,
            processor,
            analytics,
            sync,
            campaigns,
            vendor_tokens: Cache::builder().time_to_live(VENDOR_TOKEN_TTL).build(),
        }
    }

    /// Production wiring: HTTP processor client, SendGrid when a key is configured.
    pub fn from_config(db: DatabaseConnection, config: AppConfig) -> Result<Self, AppError> {
        let processor = ProcessorClient::new(
            config.processor_base_url.clone(),
            config.processor_timeout,
            config.processor_max_retries,
        )?;

        let email: Arc<dyn DeliveryGateway> = match &config.sendgrid_api_key {
            Some(api_key) => Arc::new(SendGridGateway::new(
                api_key.clone(),
                config.sendgrid_from_email.clone(),
                config.processor_timeout,
            )?),
            None => {
                tracing::info!("SENDGRID_API_KEY not set, email campaigns will only be logged");
                Arc::new(LogGateway::new(Channel::Email))
            }
        };

        Ok(Self::new(
            db,
            config,
            Arc::new(processor),
            email,
            Arc::new(SystemClock),
        ))
    }
}

pub mod config;
pub mod error;

pub mod entities {
    pub mod prelude;
    pub mod customers;
    pub mod sync_status;
    pub mod transactions;
    pub mod vendors;
}

pub mod services {
    pub mod analytics;
    pub mod campaign;
    pub mod clock;
    pub mod dashboard_cache;
    pub mod dynamic_filter;
    pub mod processor;
    pub mod processor_sync;
    pub mod segmentation;
    pub mod sync_status;
    pub mod transaction_store;
}

pub mod models {
    pub mod campaign;
    pub mod common;
    pub mod customer;
    pub mod dashboard;
    pub mod segment_filter;
    pub mod vendor;
}

pub mod handlers;
pub mod jobs;
