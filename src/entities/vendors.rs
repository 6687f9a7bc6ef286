//! `SeaORM` Entity for vendors (merchant tenants)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vendors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub contact_email: Option<String>,
    /// Bearer token issued by the account system
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub api_token: String,
    /// External processor secret key (`sk_...`)
    #[serde(skip_serializing)]
    pub processor_secret: Option<String>,
    pub connected: bool,
    pub subscription_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// The processor credential, only when the vendor is marked connected.
    pub fn processor_credential(&self) -> Option<&str> {
        if !self.connected {
            return None;
        }
        self.processor_secret.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::customers::Entity")]
    Customers,
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
