use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{CoverageWarning, Period, PlanUsage};

/// 费用构成 (净额)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub fix: BigDecimal,
    pub km: BigDecimal,
    pub linehaul: BigDecimal,
    pub depo: BigDecimal,
}

impl Default for CostBreakdown {
    fn default() -> Self {
        Self::zero()
    }
}

impl CostBreakdown {
    pub fn zero() -> Self {
        Self {
            fix: BigDecimal::from(0),
            km: BigDecimal::from(0),
            linehaul: BigDecimal::from(0),
            depo: BigDecimal::from(0),
        }
    }

    pub fn total(&self) -> BigDecimal {
        &self.fix + &self.km + &self.linehaul + &self.depo
    }

    pub fn add(&mut self, other: &CostBreakdown) {
        self.fix += &other.fix;
        self.km += &other.km;
        self.linehaul += &other.linehaul;
        self.depo += &other.depo;
    }

    pub fn rounded(&self) -> Self {
        Self {
            fix: self.fix.round(2),
            km: self.km.round(2),
            linehaul: self.linehaul.round(2),
            depo: self.depo.round(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Calculated,
    /// 当天没有计划覆盖
    NoForecast,
    /// 有计划但至少一个分项找不到费率
    MissingRates,
}

impl DayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calculated => "calculated",
            Self::NoForecast => "no_forecast",
            Self::MissingRates => "missing_rates",
        }
    }
}

/// 单日明细 (审计用); costs 为 None 表示无法计算而不是 0
///
/// `MissingRates` 的日期仍保留能算出的分项, 算不出的分项列在 `missing` 中
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayBreakdown {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub routes: Option<BigDecimal>,
    pub distance_km: Option<BigDecimal>,
    pub costs: Option<CostBreakdown>,
    pub price_config_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// 仓库维度汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotBreakdown {
    pub depot: String,
    pub active_days: i64,
    pub costs: CostBreakdown,
    pub total_net: BigDecimal,
}

/// 账期汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingTotals {
    pub costs: CostBreakdown,
    /// 质量奖金; 无质量数据或无档位时为 None
    pub bonus: Option<BigDecimal>,
    pub total_net: BigDecimal,
    pub vat_rate: BigDecimal,
    pub total_gross: BigDecimal,
}

/// 奖金计算依据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusBasis {
    pub quality_percentage: Option<BigDecimal>,
    pub tier_min: Option<BigDecimal>,
    pub amount: Option<BigDecimal>,
}

/// 预期账单 (BillingResult)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingResult {
    pub carrier_id: i64,
    pub service_type: String,
    pub period: Period,
    pub totals: BillingTotals,
    pub by_depot: IndexMap<String, DepotBreakdown>,
    pub by_day: Vec<DayBreakdown>,
    pub bonus: BonusBasis,
    pub plans_used: Vec<PlanUsage>,
    pub coverage_warnings: Vec<CoverageWarning>,
    pub ambiguous_price_configs: Vec<i64>,
    /// 因无计划或缺费率而未计费的日期
    pub incomplete_days: Vec<NaiveDate>,
}

impl BillingResult {
    pub fn is_complete(&self) -> bool {
        self.incomplete_days.is_empty()
    }
}

/// 无法计算预期账单的原因 (界面据此提示用户)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientReason {
    NoActivePriceConfig,
    NoPlans,
    /// 有计划有配置, 但没有任何一天能算出费用
    NoApplicableRates,
}

impl InsufficientReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActivePriceConfig => "no_active_price_config",
            Self::NoPlans => "no_plans",
            Self::NoApplicableRates => "no_applicable_rates",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::NoActivePriceConfig => "no contract for this period",
            Self::NoPlans => "no plan uploaded",
            Self::NoApplicableRates => "price config has no rates for the planned routes",
        }
    }
}

impl std::fmt::Display for InsufficientReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
