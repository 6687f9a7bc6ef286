pub use super::customers::Entity as Customers;
pub use super::sync_status::Entity as SyncStatus;
pub use super::transactions::Entity as Transactions;
pub use super::vendors::Entity as Vendors;
