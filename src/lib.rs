pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use config::AppConfig;
pub use db::{create_pool, CostRepository, InMemoryRepository, PgRepository};
pub use error::{EngineError, RepositoryError};
pub use service::{BillingService, DocumentExtractor, IngestionService, ReconciliationService};
