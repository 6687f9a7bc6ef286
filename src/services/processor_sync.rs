//! Sync Adapter
//!
//! Sole bridge from the external processor into the Transaction Store. Pages
//! through customers then transactions and upserts each record by its external
//! id. Every record is committed as it arrives, so a failure part-way keeps the
//! progress made so far.

use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::entities::vendors;
use crate::error::AppError;
use crate::services::clock::Clock;
use crate::services::processor::{
    ProcessorApi, ProcessorCustomer, ProcessorTransaction, MAX_PAGE_SIZE,
};
use crate::services::sync_status;
use crate::services::transaction_store::{self, CustomerRecord, TransactionRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub customers_upserted: u64,
    /// Transactions inserted or changed
    pub transactions_upserted: u64,
    /// Transactions already stored with identical fields
    pub transactions_unchanged: u64,
    /// Transactions whose customer could not be resolved
    pub transactions_skipped: u64,
    pub pages_fetched: u32,
    /// True when a pagination ceiling stopped the sync early
    pub truncated: bool,
}

#[derive(Clone)]
pub struct ProcessorSync {
    db: DatabaseConnection,
    processor: Arc<dyn ProcessorApi>,
    clock: Arc<dyn Clock>,
    max_pages: u32,
}

impl ProcessorSync {
    pub fn new(
        db: DatabaseConnection,
        processor: Arc<dyn ProcessorApi>,
        clock: Arc<dyn Clock>,
        max_pages: u32,
    ) -> Self {
        Self {
            db,
            processor,
            clock,
            max_pages: max_pages.max(1),
        }
    }

    /// Sync and record the outcome in `sync_status`.
    pub async fn sync_and_record(&self, vendor: &vendors::Model) -> Result<SyncSummary, AppError> {
        let result = self.sync_vendor(vendor).await;
        let now = self.clock.now();

        let recorded = match &result {
            Ok(_) => sync_status::record_success(&self.db, vendor.id, now).await,
            Err(e) => sync_status::record_failure(&self.db, vendor.id, &e.to_string(), now).await,
        };
        if let Err(e) = recorded {
            warn!("Failed to record sync status for vendor {}: {}", vendor.id, e);
        }

        result
    }

    pub async fn sync_vendor(&self, vendor: &vendors::Model) -> Result<SyncSummary, AppError> {
        let secret = vendor.processor_credential().ok_or(AppError::NotConnected)?;
        let mut summary = SyncSummary::default();

        info!("Starting processor sync for vendor {}", vendor.id);

        let mut customer_ids = self.sync_customers(vendor.id, secret, &mut summary).await?;
        self.sync_transactions(vendor.id, secret, &mut customer_ids, &mut summary)
            .await?;

        info!(
            "Processor sync complete for vendor {}: {} customers, {} transactions written, {} unchanged, {} skipped, {} pages{}",
            vendor.id,
            summary.customers_upserted,
            summary.transactions_upserted,
            summary.transactions_unchanged,
            summary.transactions_skipped,
            summary.pages_fetched,
            if summary.truncated { " (truncated)" } else { "" }
        );

        Ok(summary)
    }

    /// Returns customer_code -> row id for every customer seen
    async fn sync_customers(
        &self,
        vendor_id: i32,
        secret: &str,
        summary: &mut SyncSummary,
    ) -> Result<HashMap<String, i32>, AppError> {
        let mut customer_ids = HashMap::new();

        for page in 1..=self.max_pages {
            let result = self
                .processor
                .list_customers(secret, page, MAX_PAGE_SIZE)
                .await?;
            summary.pages_fetched += 1;

            for customer in &result.items {
                let id = transaction_store::upsert_customer(
                    &self.db,
                    vendor_id,
                    &customer_record(customer),
                    self.clock.now(),
                )
                .await?;
                customer_ids.insert(customer.customer_code.clone(), id);
                summary.customers_upserted += 1;
            }

            debug!(
                "Vendor {}: customer page {} had {} records",
                vendor_id,
                page,
                result.items.len()
            );

            if result.is_last(page, MAX_PAGE_SIZE) {
                return Ok(customer_ids);
            }
        }

        warn!(
            "Vendor {}: stopped customer sync at the {}-page ceiling",
            vendor_id, self.max_pages
        );
        summary.truncated = true;
        Ok(customer_ids)
    }

    async fn sync_transactions(
        &self,
        vendor_id: i32,
        secret: &str,
        customer_ids: &mut HashMap<String, i32>,
        summary: &mut SyncSummary,
    ) -> Result<(), AppError> {
        for page in 1..=self.max_pages {
            let result = self
                .processor
                .list_transactions(secret, page, MAX_PAGE_SIZE)
                .await?;
            summary.pages_fetched += 1;

            for tx in &result.items {
                let Some(customer_id) = self.resolve_customer(vendor_id, tx, customer_ids).await?
                else {
                    debug!(
                        "Vendor {}: skipping transaction {} for unknown customer {}",
                        vendor_id, tx.reference, tx.customer.customer_code
                    );
                    summary.transactions_skipped += 1;
                    continue;
                };

                let written = transaction_store::upsert_transaction(
                    &self.db,
                    vendor_id,
                    customer_id,
                    &transaction_record(tx),
                    self.clock.now(),
                )
                .await?;
                if written {
                    summary.transactions_upserted += 1;
                } else {
                    summary.transactions_unchanged += 1;
                }
            }

            if result.is_last(page, MAX_PAGE_SIZE) {
                return Ok(());
            }
        }

        warn!(
            "Vendor {}: stopped transaction sync at the {}-page ceiling",
            vendor_id, self.max_pages
        );
        summary.truncated = true;
        Ok(())
    }

    /// Known customer, stored customer, or one created from the embedded
    /// customer object when it carries an email.
    async fn resolve_customer(
        &self,
        vendor_id: i32,
        tx: &ProcessorTransaction,
        customer_ids: &mut HashMap<String, i32>,
    ) -> Result<Option<i32>, AppError> {
        let code = &tx.customer.customer_code;
        if let Some(id) = customer_ids.get(code) {
            return Ok(Some(*id));
        }

        let id = match transaction_store::find_customer_id_by_code(&self.db, vendor_id, code).await? {
            Some(id) => id,
            None => {
                let Some(email) = tx.customer.email.clone() else {
                    return Ok(None);
                };
                let record = CustomerRecord {
                    customer_code: code.clone(),
                    email,
                    first_name: tx.customer.first_name.clone(),
                    last_name: tx.customer.last_name.clone(),
                    phone: tx.customer.phone.clone(),
                    created_at: None,
                };
                transaction_store::upsert_customer(&self.db, vendor_id, &record, self.clock.now())
                    .await?
            }
        };

        customer_ids.insert(code.clone(), id);
        Ok(Some(id))
    }

    /// Create the vendor's own processor customer on first connect.
    ///
    /// No-op when the vendor already has customers or no contact email.
    pub async fn bootstrap_customer(&self, vendor: &vendors::Model) -> Result<bool, AppError> {
        let secret = vendor.processor_credential().ok_or(AppError::NotConnected)?;
        let Some(email) = vendor.contact_email.as_deref().filter(|e| !e.is_empty()) else {
            return Ok(false);
        };
        if transaction_store::count_customers(&self.db, vendor.id).await? > 0 {
            return Ok(false);
        }

        let first_name = vendor.name.split_whitespace().next().unwrap_or_default();
        let created = self
            .processor
            .create_customer(secret, email, first_name)
            .await?;
        transaction_store::upsert_customer(
            &self.db,
            vendor.id,
            &customer_record(&created),
            self.clock.now(),
        )
        .await?;

        info!("Bootstrapped processor customer {} for vendor {}", created.customer_code, vendor.id);
        Ok(true)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

fn customer_record(customer: &ProcessorCustomer) -> CustomerRecord {
    CustomerRecord {
        customer_code: customer.customer_code.clone(),
        email: customer.email.clone(),
        first_name: non_empty(&customer.first_name),
        last_name: non_empty(&customer.last_name),
        phone: non_empty(&customer.phone),
        created_at: customer.created_at,
    }
}

fn transaction_record(tx: &ProcessorTransaction) -> TransactionRecord {
    TransactionRecord {
        reference: tx.reference.clone(),
        transaction_code: tx
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| tx.reference.clone()),
        amount_minor: tx.amount,
        currency: tx.currency.clone().unwrap_or_else(|| "NGN".to_string()),
        status: tx.status.clone(),
        channel: non_empty(&tx.channel),
        paid_at: tx.paid_at,
        created_at: tx.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::processor::TransactionCustomer;

    #[test]
    fn test_transaction_record_falls_back_to_reference() {
        let tx = ProcessorTransaction {
            id: None,
            reference: "ref_1".to_string(),
            amount: 5000,
            currency: None,
            status: "failed".to_string(),
            paid_at: None,
            created_at: None,
            channel: Some("".to_string()),
            customer: TransactionCustomer {
                customer_code: "CUS_1".to_string(),
                email: None,
                first_name: None,
                last_name: None,
                phone: None,
            },
        };
        let record = transaction_record(&tx);
        assert_eq!(record.transaction_code, "ref_1");
        assert_eq!(record.currency, "NGN");
        assert_eq!(record.channel, None);
        assert_eq!(record.status, "failed");
    }
}
