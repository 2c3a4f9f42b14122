use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::models::{
    window_contains, window_intersection, CoverageWarning, DateRange, DayForecast, PlanScope,
    PlanUsage, RoutePlan, WeightedLinehauls, WeightedPlan, WeightedRoutes,
};

/// 展示用权重精度; 数量本身按 count / n 计算, 不经过该权重
const WEIGHT_SCALE: i64 = 6;

/// 区间内逐日预测
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub carrier_id: i64,
    pub range: DateRange,
    pub days: BTreeMap<NaiveDate, DayForecast>,
    pub plans_used: Vec<PlanUsage>,
    pub warnings: Vec<CoverageWarning>,
}

impl Forecast {
    pub fn day(&self, date: NaiveDate) -> Option<&DayForecast> {
        self.days.get(&date)
    }

    pub fn has_any_plan(&self) -> bool {
        !self.plans_used.is_empty()
    }
}

/// 汇总线路计划为逐日预测
///
/// 不同作用域 (仓库/班次) 的计划直接相加; 同作用域多个计划覆盖同一天时,
/// 每个计划按 1/n 加权, 并按日期记录告警。
pub fn aggregate(
    carrier_id: i64,
    range: DateRange,
    plans: &[RoutePlan],
) -> Result<Forecast, EngineError> {
    if !range.is_valid() {
        return Err(EngineError::InvalidDateRange {
            start: range.start,
            end: range.end,
        });
    }

    let plans: Vec<&RoutePlan> = plans
        .iter()
        .filter(|p| p.carrier_id == carrier_id)
        .collect();

    let mut days = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut usage: IndexMap<i64, PlanUsage> = IndexMap::new();

    for date in range.days() {
        let covering: Vec<&RoutePlan> = plans
            .iter()
            .copied()
            .filter(|p| window_contains(p.valid_from, p.valid_to, date))
            .collect();

        if covering.is_empty() {
            days.insert(date, DayForecast::NoForecast);
            continue;
        }

        // 按作用域分组, 保留出现顺序
        let mut by_scope: IndexMap<PlanScope, Vec<&RoutePlan>> = IndexMap::new();
        for plan in covering {
            by_scope.entry(plan.scope()).or_default().push(plan);
        }

        let mut entries = Vec::new();
        for (scope, group) in by_scope {
            let share = BigDecimal::from(group.len() as i64);
            let weight = (BigDecimal::from(1) / &share).round(WEIGHT_SCALE);
            if group.len() > 1 {
                let plan_ids: Vec<i64> = group.iter().map(|p| p.id).collect();
                tracing::warn!(
                    "计划重复覆盖 carrier={} date={} scope={} plans={:?}, 按 1/{} 加权",
                    carrier_id,
                    date,
                    scope,
                    plan_ids,
                    group.len()
                );
                warnings.push(CoverageWarning {
                    date,
                    scope: scope.clone(),
                    plan_ids,
                });
            }

            for plan in group {
                record_usage(&mut usage, plan, &range, &weight);
                entries.push(weigh(plan, &share, &weight));
            }
        }

        days.insert(date, DayForecast::Planned { entries });
    }

    let plans_used: Vec<PlanUsage> = usage.into_values().collect();
    tracing::debug!(
        "计划汇总 carrier={} {}..{}: 使用 {} 个计划, {} 条重复覆盖告警",
        carrier_id,
        range.start,
        range.end,
        plans_used.len(),
        warnings.len()
    );

    Ok(Forecast {
        carrier_id,
        range,
        days,
        plans_used,
        warnings,
    })
}

/// 数量按 count / n 计算, 整除时结果精确
fn weigh(plan: &RoutePlan, share: &BigDecimal, weight: &BigDecimal) -> WeightedPlan {
    WeightedPlan {
        plan_id: plan.id,
        depot: plan.depot.clone(),
        shift: plan.plan_type,
        weight: weight.clone(),
        routes: plan
            .routes
            .iter()
            .map(|r| WeightedRoutes {
                route_type: r.route_type.clone(),
                count: BigDecimal::from(r.count) / share,
                distance_km: &r.distance_km / share,
            })
            .collect(),
        linehauls: plan
            .linehauls
            .iter()
            .map(|l| WeightedLinehauls {
                from_code: l.from_code.clone(),
                to_code: l.to_code.clone(),
                vehicle_type: l.vehicle_type.clone(),
                pallets: l.pallets,
                count: BigDecimal::from(l.count) / share,
            })
            .collect(),
        stops: BigDecimal::from(plan.stop_count) / share,
    }
}

fn record_usage(
    usage: &mut IndexMap<i64, PlanUsage>,
    plan: &RoutePlan,
    range: &DateRange,
    weight: &BigDecimal,
) {
    match usage.get_mut(&plan.id) {
        Some(u) => {
            u.covered_days += 1;
            u.weighted_days += weight;
            if weight < &u.min_weight {
                u.min_weight = weight.clone();
            }
        }
        None => {
            let effective = window_intersection(plan.valid_from, plan.valid_to, range)
                .unwrap_or(*range);
            usage.insert(
                plan.id,
                PlanUsage {
                    plan_id: plan.id,
                    effective_start: effective.start,
                    effective_end: effective.end,
                    covered_days: 1,
                    weighted_days: weight.clone(),
                    min_weight: weight.clone(),
                },
            );
        }
    }
}
