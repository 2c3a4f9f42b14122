use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::Period;

/// 承运商提交的实际运营报告 (Proof), 每承运商每账期一份
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    pub id: i64,
    pub carrier_id: i64,
    pub period: Period,
    pub total_fix: Option<BigDecimal>,
    pub total_km: Option<BigDecimal>,
    pub total_linehaul: Option<BigDecimal>,
    pub total_depo: Option<BigDecimal>,
    pub grand_total: Option<BigDecimal>,
    pub route_count: Option<i64>,
    /// 准时率 (%), 用于奖金档位
    pub quality_percentage: Option<BigDecimal>,
}
