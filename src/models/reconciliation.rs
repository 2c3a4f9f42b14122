use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{InsufficientReason, Period};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Ok,
    Warning,
    Partial,
    Missing,
    Disputed,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Partial => "partial",
            Self::Missing => "missing",
            Self::Disputed => "disputed",
        }
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostItem {
    Fix,
    Km,
    Linehaul,
    Depo,
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    ExpectedVsProof,
    ProofVsInvoiced,
    ExpectedVsInvoiced,
}

/// 单项差异; delta = actual - baseline (正数表示实际高于预期)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Difference {
    pub item: CostItem,
    pub comparison: Comparison,
    pub baseline: BigDecimal,
    pub actual: BigDecimal,
    pub delta: BigDecimal,
    pub status: ReconciliationStatus,
    /// baseline 覆盖整个账期; 否则不做容差判定, status 固定为 warning
    pub baseline_complete: bool,
}

/// 预期金额 (来自计费计算)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedTotals {
    pub fix: BigDecimal,
    pub km: BigDecimal,
    pub linehaul: BigDecimal,
    pub depo: BigDecimal,
    pub total_net: BigDecimal,
    /// 无预测或缺费率的天数; 非 0 时合计只是部分金额
    pub incomplete_days: usize,
}

impl ExpectedTotals {
    pub fn is_complete(&self) -> bool {
        self.incomplete_days == 0
    }
}

/// 已开票金额
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicedTotals {
    pub invoice_count: usize,
    pub total_net: BigDecimal,
    pub total_gross: BigDecimal,
    /// 缺少净额的发票号 (未计入合计)
    pub missing_amounts: Vec<String>,
}

impl InvoicedTotals {
    pub fn none() -> Self {
        Self {
            invoice_count: 0,
            total_net: BigDecimal::from(0),
            total_gross: BigDecimal::from(0),
            missing_amounts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub status: ReconciliationStatus,
    pub differences: Vec<Difference>,
}

/// 对账结果, 每次请求重新计算, 不落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub carrier_id: i64,
    pub service_type: String,
    pub period: Period,
    pub status: ReconciliationStatus,
    pub expected: Option<ExpectedTotals>,
    pub expected_unavailable: Option<InsufficientReason>,
    pub proof_id: Option<i64>,
    pub proof_total: Option<BigDecimal>,
    pub invoiced: InvoicedTotals,
    pub differences: Vec<Difference>,
}
