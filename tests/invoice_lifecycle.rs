use bigdecimal::BigDecimal;
use carrier_cost_recon::config::PolicyConfig;
use carrier_cost_recon::models::{InvoiceStatus, Period, Proof, ReconciliationStatus};
use carrier_cost_recon::service::{IngestOutcome, UploadedDocument};
use carrier_cost_recon::{
    CostRepository, DocumentExtractor, EngineError, InMemoryRepository, IngestionService,
    ReconciliationService,
};
use std::str::FromStr;
use std::sync::Arc;

const HEADER_ONLY: &str = "FAKTURA - DAŇOVÝ DOKLAD č. 25100200";

const FULL: &str = "FAKTURA - DAŇOVÝ DOKLAD č. 25100200
Datum vystavení: 03.11.2025
Datum splatnosti: 17.11.2025
ALZABOXY DEPO - 10/2025 1 100 000,00 100 000,00 21% 21 000,00 121 000,00
CELKEM K ÚHRADĚ 121 000,00";

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn doc(filename: &str, text: &str) -> UploadedDocument {
    UploadedDocument {
        filename: filename.to_string(),
        text: text.to_string(),
    }
}

fn services() -> (Arc<InMemoryRepository>, IngestionService, ReconciliationService) {
    let repo = Arc::new(InMemoryRepository::new());
    let shared: Arc<dyn CostRepository> = repo.clone();
    let policy = PolicyConfig::default();
    (
        repo,
        IngestionService::new(shared.clone(), DocumentExtractor::from_policy(&policy)),
        ReconciliationService::new(shared, policy),
    )
}

#[tokio::test]
async fn second_upload_completes_a_partial_invoice() {
    let (repo, ingestion, reconciliation) = services();

    let first = ingestion.ingest_one(5, &doc("scan.pdf", HEADER_ONLY)).await.unwrap();
    let IngestOutcome::Created { invoice_id, status } = first else {
        panic!("expected a created invoice, got {first:?}");
    };
    assert_eq!(status, InvoiceStatus::Pending);

    // 没有账期也没有日期的发票不参与对账
    let before = reconciliation.reconcile(5, "AlzaBox", 2025, 10).await.unwrap();
    assert_eq!(before.status, ReconciliationStatus::Missing);
    assert_eq!(before.invoiced.invoice_count, 0);

    let second = ingestion.ingest_one(5, &doc("FA_25100200.pdf", FULL)).await.unwrap();
    assert_eq!(second, IngestOutcome::Updated { invoice_id });

    let stored = repo.find_invoice(invoice_id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Parsed);
    assert_eq!(stored.period, Period::new(2025, 10));
    assert_eq!(stored.total_without_vat, Some(dec("100000")));
    assert_eq!(stored.source_file.as_deref(), Some("scan.pdf"));

    let third = ingestion.ingest_one(5, &doc("FA_25100200.pdf", FULL)).await.unwrap();
    assert!(matches!(third, IngestOutcome::SkippedDuplicate { .. }));

    let after = reconciliation.reconcile(5, "AlzaBox", 2025, 10).await.unwrap();
    assert_eq!(after.status, ReconciliationStatus::Warning);
    assert_eq!(after.invoiced.total_net, dec("100000"));
    assert_eq!(after.invoiced.total_gross, dec("121000"));
}

#[tokio::test]
async fn proof_link_and_dispute_round_trip() {
    let (repo, ingestion, reconciliation) = services();
    repo.add_proof(Proof {
        id: 31,
        carrier_id: 5,
        period: Period::new(2025, 10).unwrap(),
        total_fix: None,
        total_km: None,
        total_linehaul: None,
        total_depo: None,
        grand_total: Some(dec("150000")),
        route_count: None,
        quality_percentage: None,
    });

    let outcomes = ingestion
        .ingest_batch(5, vec![doc("a.pdf", FULL), doc("empty.pdf", "")])
        .await;
    assert_eq!(outcomes.len(), 2);
    let IngestOutcome::Created { invoice_id, .. } = outcomes[0].outcome.clone() else {
        panic!("expected a created invoice, got {:?}", outcomes[0].outcome);
    };
    assert!(matches!(outcomes[1].outcome, IngestOutcome::Failed { .. }));

    let linked = ingestion.link_invoice_to_proof(invoice_id, 31).await.unwrap();
    assert_eq!(linked.status, InvoiceStatus::Matched);
    assert_eq!(linked.proof_id, Some(31));

    let disputed = ingestion.mark_disputed(invoice_id).await.unwrap();
    assert_eq!(disputed.status, InvoiceStatus::Disputed);

    // 争议状态下重新上传不会降级
    ingestion.ingest_one(5, &doc("a.pdf", FULL)).await.unwrap();
    let stored = repo.find_invoice(invoice_id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Disputed);

    let relinked = ingestion.link_invoice_to_proof(invoice_id, 31).await.unwrap();
    assert_eq!(relinked.status, InvoiceStatus::Matched);

    let err = ingestion.mark_disputed(404).await.unwrap_err();
    assert!(matches!(err, EngineError::Repository(_)));

    let result = reconciliation.reconcile(5, "AlzaBox", 2025, 10).await.unwrap();
    assert_eq!(result.proof_total, Some(dec("150000")));
    assert_eq!(result.status, ReconciliationStatus::Disputed);
}
