use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 价格配置 (PriceConfig) 及其费率表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    pub id: i64,
    pub carrier_id: i64,
    pub contract_id: Option<i64>,
    pub service_type: String,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub is_active: bool,
    pub fix_rates: Vec<FixRate>,
    pub km_rates: Vec<KmRate>,
    pub depo_rates: Vec<DepoRate>,
    pub linehaul_rates: Vec<LinehaulRate>,
    pub bonus_rates: Vec<BonusRate>,
}

/// 固定费率: 按线路类型计价, depot 为 None 表示标准 (共享) 费率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRate {
    pub route_type: String,
    pub rate: BigDecimal,
    pub depot: Option<String>,
}

/// 公里费率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KmRate {
    pub route_type: String,
    pub rate: BigDecimal,
    pub depot: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepoRateKind {
    Hourly,
    Daily,
    Monthly,
}

impl DepoRateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }
}

impl FromStr for DepoRateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!("unknown depo rate kind '{other}'")),
        }
    }
}

impl fmt::Display for DepoRateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 仓库管理费
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepoRate {
    pub depot_name: String,
    pub kind: DepoRateKind,
    pub rate: BigDecimal,
    /// 按小时计价时每个运营日的工时
    pub hours_per_day: Option<BigDecimal>,
}

/// 干线费率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinehaulRate {
    pub from_code: String,
    pub to_code: String,
    pub vehicle_type: String,
    pub pallet_min: Option<i32>,
    pub pallet_max: Option<i32>,
    pub rate: BigDecimal,
    pub depot: Option<String>,
}

impl LinehaulRate {
    pub fn matches(&self, from: &str, to: &str, vehicle: &str, pallets: Option<i32>) -> bool {
        if self.from_code != from || self.to_code != to || self.vehicle_type != vehicle {
            return false;
        }
        match pallets {
            Some(p) => {
                self.pallet_min.map_or(true, |min| p >= min)
                    && self.pallet_max.map_or(true, |max| p <= max)
            }
            None => true,
        }
    }
}

/// 质量奖金档位, 下限闭区间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusRate {
    pub quality_min: BigDecimal,
    pub quality_max: Option<BigDecimal>,
    pub bonus_amount: BigDecimal,
}

/// 带作用域的费率行
pub trait Scoped {
    fn depot(&self) -> Option<&str>;
    /// 同一 key 的仓库专属行覆盖共享行; 干线的 key 含托盘区间
    fn override_key(&self) -> String;
}

impl Scoped for FixRate {
    fn depot(&self) -> Option<&str> {
        self.depot.as_deref()
    }

    fn override_key(&self) -> String {
        self.route_type.clone()
    }
}

impl Scoped for KmRate {
    fn depot(&self) -> Option<&str> {
        self.depot.as_deref()
    }

    fn override_key(&self) -> String {
        self.route_type.clone()
    }
}

impl Scoped for LinehaulRate {
    fn depot(&self) -> Option<&str> {
        self.depot.as_deref()
    }

    fn override_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.from_code,
            self.to_code,
            self.vehicle_type,
            self.pallet_min.map_or_else(String::new, |p| p.to_string()),
            self.pallet_max.map_or_else(String::new, |p| p.to_string())
        )
    }
}

/// 解析后的适用费率表 (RateTable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    pub price_config_id: i64,
    pub contract_id: Option<i64>,
    pub service_type: String,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub depot: Option<String>,
    pub fix_rates: Vec<FixRate>,
    pub km_rates: Vec<KmRate>,
    pub depo_rates: Vec<DepoRate>,
    pub linehaul_rates: Vec<LinehaulRate>,
    pub bonus_rates: Vec<BonusRate>,
    /// 同日同时生效的其他配置 (数据问题, 非空即告警)
    pub ambiguous_with: Vec<i64>,
}

impl RateTable {
    pub fn fix_rate(&self, route_type: &str) -> Option<&BigDecimal> {
        self.fix_rates
            .iter()
            .find(|r| r.route_type == route_type)
            .map(|r| &r.rate)
    }

    pub fn km_rate(&self, route_type: &str) -> Option<&BigDecimal> {
        self.km_rates
            .iter()
            .find(|r| r.route_type == route_type)
            .map(|r| &r.rate)
    }

    pub fn linehaul_rate(
        &self,
        from: &str,
        to: &str,
        vehicle: &str,
        pallets: Option<i32>,
    ) -> Option<&BigDecimal> {
        self.linehaul_rates
            .iter()
            .find(|r| r.matches(from, to, vehicle, pallets))
            .map(|r| &r.rate)
    }

    pub fn depo_rates_for<'a>(&'a self, depot: &'a str) -> impl Iterator<Item = &'a DepoRate> + 'a {
        self.depo_rates.iter().filter(move |r| r.depot_name == depot)
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous_with.is_empty()
    }
}
