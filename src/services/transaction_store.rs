//! Transaction Store access
//!
//! Vendor-scoped reads and sync upserts over customers and transactions.
//! Aggregation runs in one of two equivalent modes: load rows and fold in
//! memory, or push sums and counts down to the database as grouped queries.

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Alias, Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, FromQueryResult, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::collections::HashMap;
use tracing::debug;

use crate::entities::{
    customers, prelude::*, transactions, transactions::STATUS_SUCCESS, vendors,
};
use crate::error::AppError;
use crate::services::segmentation::{CustomerStats, SuccessfulOrder, VendorTotals};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    /// Load customers and successful transactions, group and fold in Rust
    InMemory,
    /// Vendor totals and per-customer stats computed by grouped SQL
    Pushdown,
}

impl AggregationMode {
    pub fn for_backend(backend: DatabaseBackend) -> Self {
        match backend {
            DatabaseBackend::Postgres => AggregationMode::Pushdown,
            _ => AggregationMode::InMemory,
        }
    }
}

/// Everything the engines need for one vendor
#[derive(Debug, Clone)]
pub struct VendorSnapshot {
    pub customers: Vec<customers::Model>,
    /// Only customers with at least one successful order
    pub stats: HashMap<i32, CustomerStats>,
    pub totals: VendorTotals,
}

pub async fn find_vendor(db: &DatabaseConnection, vendor_id: i32) -> Result<vendors::Model, AppError> {
    Vendors::find_by_id(vendor_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Vendor {}", vendor_id)))
}

pub async fn find_vendor_id_by_token(
    db: &DatabaseConnection,
    api_token: &str,
) -> Result<Option<i32>, DbErr> {
    let vendor = Vendors::find()
        .filter(vendors::Column::ApiToken.eq(api_token))
        .one(db)
        .await?;
    Ok(vendor.map(|v| v.id))
}

pub async fn connected_vendors(db: &DatabaseConnection) -> Result<Vec<vendors::Model>, DbErr> {
    Vendors::find()
        .filter(vendors::Column::Connected.eq(true))
        .filter(vendors::Column::ProcessorSecret.is_not_null())
        .order_by_asc(vendors::Column::Id)
        .all(db)
        .await
}

pub async fn set_processor_credential(
    db: &DatabaseConnection,
    vendor: vendors::Model,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<vendors::Model, DbErr> {
    let mut active_model = vendor.into_active_model();
    active_model.processor_secret = Set(Some(secret.to_string()));
    active_model.connected = Set(true);
    active_model.updated_at = Set(now);
    active_model.update(db).await
}

pub async fn set_subscription_active(
    db: &DatabaseConnection,
    vendor: vendors::Model,
    now: DateTime<Utc>,
) -> Result<vendors::Model, DbErr> {
    let mut active_model = vendor.into_active_model();
    active_model.subscription_active = Set(true);
    active_model.updated_at = Set(now);
    active_model.update(db).await
}

pub async fn count_customers(db: &DatabaseConnection, vendor_id: i32) -> Result<u64, DbErr> {
    Customers::find()
        .filter(customers::Column::VendorId.eq(vendor_id))
        .count(db)
        .await
}

pub async fn load_snapshot(
    db: &DatabaseConnection,
    vendor_id: i32,
    mode: AggregationMode,
    recent_since: DateTime<Utc>,
) -> Result<VendorSnapshot, DbErr> {
    let customers = Customers::find()
        .filter(customers::Column::VendorId.eq(vendor_id))
        .order_by_asc(customers::Column::Id)
        .all(db)
        .await?;

    let (stats, totals) = match mode {
        AggregationMode::InMemory => in_memory_stats(db, vendor_id, recent_since).await?,
        AggregationMode::Pushdown => {
            let stats = pushdown_stats(db, vendor_id, recent_since).await?;
            let totals = pushdown_totals(db, vendor_id).await?;
            (stats, totals)
        }
    };

    debug!(
        "Loaded snapshot for vendor {} ({:?}): {} customers, {} with orders, {} orders",
        vendor_id,
        mode,
        customers.len(),
        stats.len(),
        totals.order_count
    );

    Ok(VendorSnapshot {
        customers,
        stats,
        totals,
    })
}

async fn in_memory_stats(
    db: &DatabaseConnection,
    vendor_id: i32,
    recent_since: DateTime<Utc>,
) -> Result<(HashMap<i32, CustomerStats>, VendorTotals), DbErr> {
    let rows = Transactions::find()
        .filter(transactions::Column::VendorId.eq(vendor_id))
        .filter(transactions::Column::Status.eq(STATUS_SUCCESS))
        .all(db)
        .await?;

    let mut grouped: HashMap<i32, Vec<SuccessfulOrder>> = HashMap::new();
    let mut totals = VendorTotals::default();
    for tx in rows {
        totals.order_count += 1;
        totals.total_minor = totals
            .total_minor
            .checked_add(tx.amount)
            .ok_or_else(|| amount_overflow(vendor_id))?;
        grouped.entry(tx.customer_id).or_default().push(SuccessfulOrder {
            amount_minor: tx.amount,
            paid_at: tx.paid_at,
        });
    }

    let stats = grouped
        .into_iter()
        .map(|(customer_id, orders)| {
            CustomerStats::from_orders(&orders, recent_since)
                .map(|stats| (customer_id, stats))
                .ok_or_else(|| amount_overflow(vendor_id))
        })
        .collect::<Result<_, _>>()?;

    Ok((stats, totals))
}

/// Same failure pushdown mode gets from the database for a SUM outside BIGINT
fn amount_overflow(vendor_id: i32) -> DbErr {
    DbErr::Custom(format!(
        "vendor {}: transaction amount total exceeds the 64-bit range",
        vendor_id
    ))
}

#[derive(Debug, FromQueryResult)]
struct CustomerAggregateRow {
    customer_id: i32,
    order_count: i64,
    total_minor: i64,
    recent_orders: i64,
    last_paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromQueryResult)]
struct VendorTotalsRow {
    order_count: i64,
    total_minor: i64,
}

fn as_bigint(expr: impl Into<sea_orm::sea_query::SimpleExpr>) -> sea_orm::sea_query::SimpleExpr {
    // SUM over BIGINT is NUMERIC on Postgres
    Expr::expr(expr).cast_as(Alias::new("BIGINT"))
}

async fn pushdown_stats(
    db: &DatabaseConnection,
    vendor_id: i32,
    recent_since: DateTime<Utc>,
) -> Result<HashMap<i32, CustomerStats>, DbErr> {
    let recent = Expr::case(transactions::Column::PaidAt.gte(recent_since), 1).finally(0);

    let rows = Transactions::find()
        .select_only()
        .column(transactions::Column::CustomerId)
        .column_as(transactions::Column::Id.count(), "order_count")
        .column_as(as_bigint(transactions::Column::Amount.sum()), "total_minor")
        .column_as(as_bigint(Func::sum(recent)), "recent_orders")
        .column_as(transactions::Column::PaidAt.max(), "last_paid_at")
        .filter(transactions::Column::VendorId.eq(vendor_id))
        .filter(transactions::Column::Status.eq(STATUS_SUCCESS))
        .group_by(transactions::Column::CustomerId)
        .into_model::<CustomerAggregateRow>()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.customer_id,
                CustomerStats {
                    order_count: row.order_count,
                    total_minor: row.total_minor,
                    last_paid_at: row.last_paid_at,
                    recent_orders: row.recent_orders,
                },
            )
        })
        .collect())
}

async fn pushdown_totals(db: &DatabaseConnection, vendor_id: i32) -> Result<VendorTotals, DbErr> {
    let row = Transactions::find()
        .select_only()
        .column_as(transactions::Column::Id.count(), "order_count")
        .column_as(
            as_bigint(Func::coalesce([
                transactions::Column::Amount.sum(),
                Expr::val(0i64).into(),
            ])),
            "total_minor",
        )
        .filter(transactions::Column::VendorId.eq(vendor_id))
        .filter(transactions::Column::Status.eq(STATUS_SUCCESS))
        .into_model::<VendorTotalsRow>()
        .one(db)
        .await?;

    Ok(row
        .map(|r| VendorTotals {
            order_count: r.order_count,
            total_minor: r.total_minor,
        })
        .unwrap_or_default())
}

/// Normalized customer as delivered by the sync adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRecord {
    pub customer_code: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Normalized transaction as delivered by the sync adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub reference: String,
    pub transaction_code: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub channel: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

pub async fn find_customer_id_by_code(
    db: &DatabaseConnection,
    vendor_id: i32,
    customer_code: &str,
) -> Result<Option<i32>, DbErr> {
    let customer = Customers::find()
        .filter(customers::Column::VendorId.eq(vendor_id))
        .filter(customers::Column::CustomerCode.eq(customer_code))
        .one(db)
        .await?;
    Ok(customer.map(|c| c.id))
}

/// Insert or refresh contact fields by `(vendor, customer_code)`. Returns the row id.
///
/// Unchanged rows are not touched, so repeated syncs leave the store identical.
pub async fn upsert_customer<C: ConnectionTrait>(
    db: &C,
    vendor_id: i32,
    record: &CustomerRecord,
    now: DateTime<Utc>,
) -> Result<i32, DbErr> {
    let existing = Customers::find()
        .filter(customers::Column::VendorId.eq(vendor_id))
        .filter(customers::Column::CustomerCode.eq(&record.customer_code))
        .one(db)
        .await?;

    match existing {
        Some(customer) => {
            let id = customer.id;
            let unchanged = customer.email == record.email
                && customer.first_name == record.first_name
                && customer.last_name == record.last_name
                && customer.phone == record.phone;
            if !unchanged {
                let mut active_model = customer.into_active_model();
                active_model.email = Set(record.email.clone());
                active_model.first_name = Set(record.first_name.clone());
                active_model.last_name = Set(record.last_name.clone());
                active_model.phone = Set(record.phone.clone());
                active_model.updated_at = Set(now);
                active_model.update(db).await?;
            }
            Ok(id)
        }
        None => {
            let new_customer = customers::ActiveModel {
                vendor_id: Set(vendor_id),
                customer_code: Set(record.customer_code.clone()),
                email: Set(record.email.clone()),
                first_name: Set(record.first_name.clone()),
                last_name: Set(record.last_name.clone()),
                phone: Set(record.phone.clone()),
                created_at: Set(record.created_at.unwrap_or(now)),
                updated_at: Set(now),
                ..Default::default()
            };
            Ok(new_customer.insert(db).await?.id)
        }
    }
}

/// Insert or refresh a transaction by `(vendor, reference)`.
///
/// Returns `true` when a row was inserted or changed.
pub async fn upsert_transaction<C: ConnectionTrait>(
    db: &C,
    vendor_id: i32,
    customer_id: i32,
    record: &TransactionRecord,
    now: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let existing = Transactions::find()
        .filter(transactions::Column::VendorId.eq(vendor_id))
        .filter(transactions::Column::Reference.eq(&record.reference))
        .one(db)
        .await?;

    match existing {
        Some(tx) => {
            let unchanged = tx.customer_id == customer_id
                && tx.amount == record.amount_minor
                && tx.currency == record.currency
                && tx.status == record.status
                && tx.channel == record.channel
                && tx.paid_at == record.paid_at;
            if unchanged {
                return Ok(false);
            }
            let mut active_model = tx.into_active_model();
            active_model.customer_id = Set(customer_id);
            active_model.amount = Set(record.amount_minor);
            active_model.currency = Set(record.currency.clone());
            active_model.status = Set(record.status.clone());
            active_model.channel = Set(record.channel.clone());
            active_model.paid_at = Set(record.paid_at);
            active_model.updated_at = Set(now);
            active_model.update(db).await?;
            Ok(true)
        }
        None => {
            let new_tx = transactions::ActiveModel {
                vendor_id: Set(vendor_id),
                customer_id: Set(customer_id),
                reference: Set(record.reference.clone()),
                transaction_code: Set(record.transaction_code.clone()),
                amount: Set(record.amount_minor),
                currency: Set(record.currency.clone()),
                status: Set(record.status.clone()),
                channel: Set(record.channel.clone()),
                paid_at: Set(record.paid_at),
                created_at: Set(record.created_at.unwrap_or(now)),
                updated_at: Set(now),
                ..Default::default()
            };
            new_tx.insert(db).await?;
            Ok(true)
        }
    }
}
