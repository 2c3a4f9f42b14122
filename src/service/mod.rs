pub mod billing;
pub mod export;
pub mod extractor;
pub mod ingestion;
pub mod plan_aggregator;
pub mod rate_resolver;
pub mod reconciliation;

pub use billing::{calculate_billing, select_bonus_tier, BillingService};
pub use export::export_daily_csv;
pub use extractor::DocumentExtractor;
pub use ingestion::{FileOutcome, IngestOutcome, IngestionService, UploadedDocument};
pub use plan_aggregator::{aggregate, Forecast};
pub use rate_resolver::{resolve, RateResolver, ResolveError};
pub use reconciliation::{classify, ReconciliationService};
