use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 计划班次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanShift {
    Dpo,
    Sd,
    Both,
}

impl PlanShift {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dpo => "DPO",
            Self::Sd => "SD",
            Self::Both => "BOTH",
        }
    }
}

impl FromStr for PlanShift {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DPO" => Ok(Self::Dpo),
            "SD" => Ok(Self::Sd),
            "BOTH" => Ok(Self::Both),
            other => Err(format!("unknown plan type '{other}'")),
        }
    }
}

impl fmt::Display for PlanShift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 线路计划 (RoutePlan): 有效期内每天的线路/干线/里程数量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub id: i64,
    pub carrier_id: i64,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub plan_type: PlanShift,
    pub depot: Option<String>,
    pub routes: Vec<PlannedRoutes>,
    pub linehauls: Vec<PlannedLinehauls>,
    pub stop_count: i64,
}

impl RoutePlan {
    /// 同作用域的计划在同一天重复覆盖时需要加权
    pub fn scope(&self) -> PlanScope {
        PlanScope {
            depot: self.depot.clone(),
            shift: self.plan_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedRoutes {
    pub route_type: String,
    pub count: i64,
    /// 该线路类型每天的总里程
    pub distance_km: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedLinehauls {
    pub from_code: String,
    pub to_code: String,
    pub vehicle_type: String,
    pub pallets: Option<i32>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanScope {
    pub depot: Option<String>,
    pub shift: PlanShift,
}

impl fmt::Display for PlanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.depot {
            Some(depot) => write!(f, "{}@{}", self.shift, depot),
            None => write!(f, "{}", self.shift),
        }
    }
}

/// 某天来自单个计划的加权贡献
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedPlan {
    pub plan_id: i64,
    pub depot: Option<String>,
    pub shift: PlanShift,
    pub weight: BigDecimal,
    pub routes: Vec<WeightedRoutes>,
    pub linehauls: Vec<WeightedLinehauls>,
    pub stops: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedRoutes {
    pub route_type: String,
    pub count: BigDecimal,
    pub distance_km: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedLinehauls {
    pub from_code: String,
    pub to_code: String,
    pub vehicle_type: String,
    pub pallets: Option<i32>,
    pub count: BigDecimal,
}

/// 单日预测; NoForecast 表示当天没有任何计划覆盖 (不等于 0)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayForecast {
    NoForecast,
    Planned { entries: Vec<WeightedPlan> },
}

impl DayForecast {
    pub fn entries(&self) -> Option<&[WeightedPlan]> {
        match self {
            Self::NoForecast => None,
            Self::Planned { entries } => Some(entries),
        }
    }

    pub fn total_routes(&self) -> Option<BigDecimal> {
        self.entries().map(|entries| {
            entries
                .iter()
                .flat_map(|e| e.routes.iter())
                .fold(BigDecimal::from(0), |acc, r| acc + &r.count)
        })
    }

    pub fn total_distance_km(&self) -> Option<BigDecimal> {
        self.entries().map(|entries| {
            entries
                .iter()
                .flat_map(|e| e.routes.iter())
                .fold(BigDecimal::from(0), |acc, r| acc + &r.distance_km)
        })
    }
}

/// 重复覆盖告警 (同一天同作用域多个计划)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageWarning {
    pub date: NaiveDate,
    pub scope: PlanScope,
    pub plan_ids: Vec<i64>,
}

/// 计划在请求区间内的使用情况 (追溯用)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanUsage {
    pub plan_id: i64,
    pub effective_start: NaiveDate,
    pub effective_end: NaiveDate,
    pub covered_days: i64,
    /// Σ 每日权重
    pub weighted_days: BigDecimal,
    pub min_weight: BigDecimal,
}
