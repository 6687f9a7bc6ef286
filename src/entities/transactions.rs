//! `SeaORM` Entity for processor transactions
//!
//! Every status is stored; only `success` rows take part in analytics.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status value denoting a completed payment
pub const STATUS_SUCCESS: &str = "success";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub vendor_id: i32,
    pub customer_id: i32,
    pub reference: String,
    pub transaction_code: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub channel: Option<String>,
    pub paid_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id",
        on_delete = "Cascade"
    )]
    Customers,
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
