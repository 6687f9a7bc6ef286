use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_vendors::Vendors;
use super::m20260301_000002_create_customers::Customers;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::VendorId).integer().not_null())
                    .col(ColumnDef::new(Transactions::CustomerId).integer().not_null())
                    .col(ColumnDef::new(Transactions::Reference).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Transactions::TransactionCode)
                            .string_len(128)
                            .not_null(),
                    )
                    // Minor currency units (kobo, cents)
                    .col(ColumnDef::new(Transactions::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::Currency).string_len(8).not_null())
                    .col(ColumnDef::new(Transactions::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Transactions::Channel).string_len(64).null())
                    .col(
                        ColumnDef::new(Transactions::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_vendor_id")
                            .from(Transactions::Table, Transactions::VendorId)
                            .to(Vendors::Table, Vendors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_customer_id")
                            .from(Transactions::Table, Transactions::CustomerId)
                            .to(Customers::Table, Customers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_vendor_reference")
                    .table(Transactions::Table)
                    .col(Transactions::VendorId)
                    .col(Transactions::Reference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_vendor_code")
                    .table(Transactions::Table)
                    .col(Transactions::VendorId)
                    .col(Transactions::TransactionCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Covers the grouped per-customer aggregation
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_vendor_status_customer")
                    .table(Transactions::Table)
                    .col(Transactions::VendorId)
                    .col(Transactions::Status)
                    .col(Transactions::CustomerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    VendorId,
    CustomerId,
    Reference,
    TransactionCode,
    Amount,
    Currency,
    Status,
    Channel,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}
