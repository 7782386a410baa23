pub mod catalog_repository;
pub mod inventory_repository;
pub mod ledger_repository;
pub mod mock_db;
pub mod postgres_catalog_repository;
pub mod postgres_inventory_repository;
pub mod postgres_ledger_repository;
