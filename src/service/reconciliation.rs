use bigdecimal::{BigDecimal, Zero};
use std::sync::Arc;

use crate::config::PolicyConfig;
use crate::db::CostRepository;
use crate::error::{EngineError, Result};
use crate::models::{
    BillingResult, Classification, Comparison, CostItem, Difference, ExpectedTotals, Invoice,
    InvoicedTotals, Period, Proof, ReconciliationResult, ReconciliationStatus,
};
use crate::service::billing::calculate_billing;

/// 对账服务: 预期 (计费) / 承运商报告 (Proof) / 已开票 三方比对
pub struct ReconciliationService {
    repo: Arc<dyn CostRepository>,
    policy: PolicyConfig,
}

impl ReconciliationService {
    pub fn new(repo: Arc<dyn CostRepository>, policy: PolicyConfig) -> Self {
        Self { repo, policy }
    }

    pub async fn reconcile(
        &self,
        carrier_id: i64,
        service_type: &str,
        year: i32,
        month: u32,
    ) -> Result<ReconciliationResult> {
        let period = Period::new(year, month).ok_or(EngineError::InvalidPeriod { year, month })?;
        let snapshot = self
            .repo
            .load_snapshot(carrier_id, service_type, period)
            .await?;

        // 预期金额缺失不影响 proof 与发票的比对
        let (expected, expected_unavailable) =
            match calculate_billing(carrier_id, service_type, period, &snapshot, &self.policy) {
                Ok(billing) => (Some(expected_totals(&billing)), None),
                Err(EngineError::InsufficientData(reason)) => (None, Some(reason)),
                Err(e) => return Err(e),
            };

        let invoiced = invoiced_totals(&snapshot.invoices);
        let proof = snapshot.proof.as_ref();
        let classification = classify(expected.as_ref(), proof, &invoiced, &self.policy);

        tracing::info!(
            "对账 carrier={} type={} {}: status={} proof={:?} invoices={} differences={}",
            carrier_id,
            service_type,
            period,
            classification.status,
            proof.map(|p| p.id),
            invoiced.invoice_count,
            classification.differences.len()
        );

        Ok(ReconciliationResult {
            carrier_id,
            service_type: service_type.to_string(),
            period,
            status: classification.status,
            expected,
            expected_unavailable,
            proof_id: proof.map(|p| p.id),
            proof_total: proof.and_then(proof_total),
            invoiced,
            differences: classification.differences,
        })
    }
}

pub fn expected_totals(billing: &BillingResult) -> ExpectedTotals {
    let costs = &billing.totals.costs;
    ExpectedTotals {
        fix: costs.fix.clone(),
        km: costs.km.clone(),
        linehaul: costs.linehaul.clone(),
        depo: costs.depo.clone(),
        total_net: billing.totals.total_net.clone(),
        incomplete_days: billing.incomplete_days.len(),
    }
}

/// 已开票合计; 缺少净额的发票单独列出, 不按 0 计入
pub fn invoiced_totals(invoices: &[Invoice]) -> InvoicedTotals {
    let mut totals = InvoicedTotals::none();
    totals.invoice_count = invoices.len();
    for invoice in invoices {
        match &invoice.total_without_vat {
            Some(net) => totals.total_net += net,
            None => totals.missing_amounts.push(invoice.invoice_number.clone()),
        }
        if let Some(gross) = &invoice.total_with_vat {
            totals.total_gross += gross;
        }
    }
    totals
}

/// Proof 总额: 优先 grand_total, 否则四项齐全时求和
pub fn proof_total(proof: &Proof) -> Option<BigDecimal> {
    if let Some(total) = &proof.grand_total {
        return Some(total.clone());
    }
    let fix = proof.total_fix.as_ref()?;
    let km = proof.total_km.as_ref()?;
    let linehaul = proof.total_linehaul.as_ref()?;
    let depo = proof.total_depo.as_ref()?;
    Some(fix + km + linehaul + depo)
}

/// 单组比较: |actual - baseline| < ok 阈值为 ok, actual < baseline × partial 比例为 partial,
/// 其余为 disputed
pub fn compare(
    baseline: &BigDecimal,
    actual: &BigDecimal,
    policy: &PolicyConfig,
) -> ReconciliationStatus {
    let delta = actual - baseline;
    if delta.abs() < policy.ok_threshold {
        ReconciliationStatus::Ok
    } else if actual < &(baseline * &policy.partial_threshold) {
        ReconciliationStatus::Partial
    } else {
        ReconciliationStatus::Disputed
    }
}

/// 基准不完整 (预期有未计价的日期) 时只给出差额, 状态为 warning
fn difference(
    item: CostItem,
    comparison: Comparison,
    baseline: &BigDecimal,
    actual: &BigDecimal,
    baseline_complete: bool,
    policy: &PolicyConfig,
) -> Difference {
    let status = if baseline_complete {
        compare(baseline, actual, policy)
    } else {
        ReconciliationStatus::Warning
    };
    Difference {
        item,
        comparison,
        baseline: baseline.clone(),
        actual: actual.clone(),
        delta: actual - baseline,
        baseline_complete,
        status,
    }
}

/// 对账分类
///
/// - 无 proof 且无发票: missing
/// - 有 proof 无 (有金额的) 发票: warning
/// - 有 proof 有发票: 按 proof 与已开票净额比较
/// - 无 proof 有发票: 预期完整时按预期比较, 否则 warning
pub fn classify(
    expected: Option<&ExpectedTotals>,
    proof: Option<&Proof>,
    invoiced: &InvoicedTotals,
    policy: &PolicyConfig,
) -> Classification {
    let reported = proof.and_then(proof_total);
    let priced_invoices = invoiced
        .invoice_count
        .saturating_sub(invoiced.missing_amounts.len());
    let invoiced_amount = (priced_invoices > 0).then_some(&invoiced.total_net);

    let status = match (proof, invoiced.invoice_count) {
        (None, 0) => ReconciliationStatus::Missing,
        (Some(_), 0) => ReconciliationStatus::Warning,
        (Some(_), _) => match (&reported, invoiced_amount) {
            (Some(total), Some(amount)) if !amount.is_zero() => compare(total, amount, policy),
            _ => ReconciliationStatus::Warning,
        },
        (None, _) => match (expected, invoiced_amount) {
            (Some(e), Some(amount)) if e.is_complete() && !amount.is_zero() => {
                compare(&e.total_net, amount, policy)
            }
            _ => ReconciliationStatus::Warning,
        },
    };

    let mut differences = Vec::new();
    if let (Some(e), Some(p)) = (expected, proof) {
        let items = [
            (CostItem::Fix, &e.fix, &p.total_fix),
            (CostItem::Km, &e.km, &p.total_km),
            (CostItem::Linehaul, &e.linehaul, &p.total_linehaul),
            (CostItem::Depo, &e.depo, &p.total_depo),
        ];
        for (item, baseline, actual) in items {
            if let Some(actual) = actual {
                differences.push(difference(
                    item,
                    Comparison::ExpectedVsProof,
                    baseline,
                    actual,
                    e.is_complete(),
                    policy,
                ));
            }
        }
        if let Some(total) = &reported {
            differences.push(difference(
                CostItem::Total,
                Comparison::ExpectedVsProof,
                &e.total_net,
                total,
                e.is_complete(),
                policy,
            ));
        }
    }
    if let (Some(total), Some(amount)) = (&reported, invoiced_amount) {
        differences.push(difference(
            CostItem::Total,
            Comparison::ProofVsInvoiced,
            total,
            amount,
            true,
            policy,
        ));
    }
    if let (Some(e), Some(amount)) = (expected, invoiced_amount) {
        differences.push(difference(
            CostItem::Total,
            Comparison::ExpectedVsInvoiced,
            &e.total_net,
            amount,
            e.is_complete(),
            policy,
        ));
    }

    Classification {
        status,
        differences,
    }
}
