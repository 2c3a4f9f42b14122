use bigdecimal::BigDecimal;
use carrier_cost_recon::config::PolicyConfig;
use carrier_cost_recon::models::{
    DepoRate, DepoRateKind, FixRate, InsufficientReason, KmRate, Period, PlanShift,
    PlannedRoutes, PriceConfig, Proof, ReconciliationStatus, RoutePlan,
};
use carrier_cost_recon::service::{export_daily_csv, IngestOutcome, UploadedDocument};
use carrier_cost_recon::{
    BillingService, CostRepository, DocumentExtractor, EngineError, InMemoryRepository,
    IngestionService, ReconciliationService,
};
use chrono::NaiveDate;
use std::str::FromStr;
use std::sync::Arc;

const INVOICE: &str = "Dodavatel: Rychlá doprava s.r.o.
IČ: 12345678 DIČ: CZ12345678
FAKTURA - DAŇOVÝ DOKLAD č. 25100123
Datum vystavení: 03.11.2025
ALZABOXY FIX - 10/2025 1 558 000,00 558 000,00 21% 117 180,00 675 180,00
CELKEM K ÚHRADĚ 675 180,00";

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct Fixture {
    repo: Arc<InMemoryRepository>,
    billing: BillingService,
    reconciliation: ReconciliationService,
    ingestion: IngestionService,
}

fn fixture() -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    repo.add_price_config(PriceConfig {
        id: 1,
        carrier_id: 1,
        contract_id: Some(3),
        service_type: "AlzaBox".to_string(),
        valid_from: d(2025, 1, 1),
        valid_to: None,
        is_active: true,
        fix_rates: vec![FixRate {
            route_type: "DPO".to_string(),
            rate: dec("1000"),
            depot: None,
        }],
        km_rates: vec![KmRate {
            route_type: "DPO".to_string(),
            rate: dec("10"),
            depot: None,
        }],
        depo_rates: vec![DepoRate {
            depot_name: "Praha".to_string(),
            kind: DepoRateKind::Monthly,
            rate: dec("310000"),
            hours_per_day: None,
        }],
        linehaul_rates: Vec::new(),
        bonus_rates: Vec::new(),
    });
    repo.add_route_plan(RoutePlan {
        id: 1,
        carrier_id: 1,
        valid_from: d(2025, 10, 1),
        valid_to: Some(d(2025, 10, 31)),
        plan_type: PlanShift::Dpo,
        depot: None,
        routes: vec![PlannedRoutes {
            route_type: "DPO".to_string(),
            count: 4,
            distance_km: dec("400"),
        }],
        linehauls: Vec::new(),
        stop_count: 160,
    });

    let policy = PolicyConfig::default();
    let shared: Arc<dyn CostRepository> = repo.clone();
    Fixture {
        repo,
        billing: BillingService::new(shared.clone(), policy.clone()),
        reconciliation: ReconciliationService::new(shared.clone(), policy.clone()),
        ingestion: IngestionService::new(shared, DocumentExtractor::from_policy(&policy)),
    }
}

fn proof(grand_total: &str) -> Proof {
    Proof {
        id: 77,
        carrier_id: 1,
        period: Period::new(2025, 10).unwrap(),
        total_fix: Some(dec("124000")),
        total_km: Some(dec("124500")),
        total_linehaul: None,
        total_depo: Some(dec("310000")),
        grand_total: Some(dec(grand_total)),
        route_count: Some(124),
        quality_percentage: None,
    }
}

#[tokio::test]
async fn expected_billing_for_a_month() {
    let f = fixture();
    let result = f.billing.calculate(1, "AlzaBox", 2025, 10).await.unwrap();

    assert!(result.is_complete());
    assert_eq!(result.totals.costs.fix, dec("124000"));
    assert_eq!(result.totals.costs.km, dec("124000"));
    assert_eq!(result.totals.costs.depo, dec("310000"));
    assert_eq!(result.totals.total_net, dec("558000"));
    assert_eq!(result.totals.total_gross, dec("675180"));
    assert_eq!(result.plans_used.len(), 1);
    assert_eq!(result.plans_used[0].covered_days, 31);

    let csv = String::from_utf8(export_daily_csv(&result).unwrap()).unwrap();
    assert_eq!(csv.lines().count(), 32);
    assert!(csv.lines().nth(1).unwrap().starts_with("2025-10-01,calculated,4,400,"));
}

#[tokio::test]
async fn missing_configuration_is_reported_by_reason() {
    let f = fixture();

    let err = f.billing.calculate(2, "AlzaBox", 2025, 10).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientData(InsufficientReason::NoActivePriceConfig)
    ));

    let err = f.billing.calculate(1, "AlzaBox", 2025, 11).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientData(InsufficientReason::NoPlans)));

    let err = f.billing.calculate(1, "AlzaBox", 2025, 13).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidPeriod { month: 13, .. }));
}

#[tokio::test]
async fn reconciliation_moves_from_missing_to_ok() {
    let f = fixture();

    let empty = f.reconciliation.reconcile(1, "AlzaBox", 2025, 11).await.unwrap();
    assert_eq!(empty.status, ReconciliationStatus::Missing);
    assert!(empty.expected.is_none());
    assert_eq!(empty.expected_unavailable, Some(InsufficientReason::NoPlans));

    f.repo.add_proof(proof("558500"));
    let before = f.reconciliation.reconcile(1, "AlzaBox", 2025, 10).await.unwrap();
    assert_eq!(before.status, ReconciliationStatus::Warning);
    assert_eq!(before.proof_id, Some(77));
    assert_eq!(before.expected.as_ref().unwrap().total_net, dec("558000"));

    let outcomes = f
        .ingestion
        .ingest_batch(
            1,
            vec![UploadedDocument {
                filename: "FA_25100123.pdf".to_string(),
                text: INVOICE.to_string(),
            }],
        )
        .await;
    assert!(matches!(outcomes[0].outcome, IngestOutcome::Created { .. }));

    let after = f.reconciliation.reconcile(1, "AlzaBox", 2025, 10).await.unwrap();
    assert_eq!(after.status, ReconciliationStatus::Ok);
    assert_eq!(after.invoiced.invoice_count, 1);
    assert_eq!(after.invoiced.total_net, dec("558000"));

    let km = after
        .differences
        .iter()
        .find(|d| d.item == carrier_cost_recon::models::CostItem::Km)
        .unwrap();
    assert_eq!(km.delta, dec("500"));
    assert_eq!(km.status, ReconciliationStatus::Ok);
}

#[tokio::test]
async fn partial_invoicing_is_flagged() {
    let f = fixture();
    f.repo.add_proof(proof("1200000"));
    f.ingestion
        .ingest_one(
            1,
            &UploadedDocument {
                filename: "a.pdf".to_string(),
                text: INVOICE.to_string(),
            },
        )
        .await
        .unwrap();

    let result = f.reconciliation.reconcile(1, "AlzaBox", 2025, 10).await.unwrap();
    assert_eq!(result.status, ReconciliationStatus::Partial);
}

#[tokio::test]
async fn invoice_without_service_period_is_booked_by_tax_date() {
    let f = fixture();
    let text = "FAKTURA - DAŇOVÝ DOKLAD č. 25100124
Datum vystavení: 03.11.2025
Datum zdanitelného plnění: 31.10.2025
Součet položek 558 000,00 117 180,00 675 180,00";
    f.ingestion
        .ingest_one(
            1,
            &UploadedDocument {
                filename: "scan-0042.pdf".to_string(),
                text: text.to_string(),
            },
        )
        .await
        .unwrap();

    let result = f.reconciliation.reconcile(1, "AlzaBox", 2025, 10).await.unwrap();
    assert_eq!(result.invoiced.invoice_count, 1);
    assert_eq!(result.invoiced.total_net, dec("558000"));
    assert_eq!(result.status, ReconciliationStatus::Ok);

    let november = f.reconciliation.reconcile(1, "AlzaBox", 2025, 11).await.unwrap();
    assert_eq!(november.invoiced.invoice_count, 0);
}
