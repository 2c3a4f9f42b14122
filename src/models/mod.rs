pub mod billing;
pub mod invoice;
pub mod period;
pub mod plan;
pub mod price;
pub mod proof;
pub mod reconciliation;

pub use billing::{
    BillingResult, BillingTotals, BonusBasis, CostBreakdown, DayBreakdown, DayStatus,
    DepotBreakdown, InsufficientReason,
};
pub use invoice::{
    AmountSource, ExtractedInvoice, Invoice, InvoiceItem, InvoiceStatus, NewInvoice,
};
pub use period::{window_contains, window_intersection, DateRange, Period};
pub use plan::{
    CoverageWarning, DayForecast, PlanScope, PlanShift, PlanUsage, PlannedLinehauls,
    PlannedRoutes, RoutePlan, WeightedLinehauls, WeightedPlan, WeightedRoutes,
};
pub use price::{
    BonusRate, DepoRate, DepoRateKind, FixRate, KmRate, LinehaulRate, PriceConfig, RateTable,
    Scoped,
};
pub use proof::Proof;
pub use reconciliation::{
    Classification, Comparison, CostItem, Difference, ExpectedTotals, InvoicedTotals,
    ReconciliationResult, ReconciliationStatus,
};
