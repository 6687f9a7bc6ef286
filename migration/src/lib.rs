pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_vendors;
mod m20260301_000002_create_customers;
mod m20260301_000003_create_transactions;
mod m20260301_000004_create_sync_status;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_vendors::Migration),
            Box::new(m20260301_000002_create_customers::Migration),
            Box::new(m20260301_000003_create_transactions::Migration),
            Box::new(m20260301_000004_create_sync_status::Migration),
        ]
    }
}
