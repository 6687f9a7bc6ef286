use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_vendors::Vendors;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Customers::VendorId).integer().not_null())
                    .col(ColumnDef::new(Customers::CustomerCode).string_len(64).not_null())
                    .col(ColumnDef::new(Customers::Email).string_len(255).not_null())
                    .col(ColumnDef::new(Customers::FirstName).string_len(255).null())
                    .col(ColumnDef::new(Customers::LastName).string_len(255).null())
                    .col(ColumnDef::new(Customers::Phone).string_len(32).null())
                    .col(
                        ColumnDef::new(Customers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Customers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_customers_vendor_id")
                            .from(Customers::Table, Customers::VendorId)
                            .to(Vendors::Table, Vendors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // (vendor, customer_code) is the sync upsert key
        manager
            .create_index(
                Index::create()
                    .name("idx_customers_vendor_code")
                    .table(Customers::Table)
                    .col(Customers::VendorId)
                    .col(Customers::CustomerCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Customers {
    Table,
    Id,
    VendorId,
    CustomerCode,
    Email,
    FirstName,
    LastName,
    Phone,
    CreatedAt,
    UpdatedAt,
}
