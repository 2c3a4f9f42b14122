use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::PolicyConfig;
use crate::db::{CostRepository, PeriodSnapshot};
use crate::error::{EngineError, Result};
use crate::models::{
    BillingResult, BillingTotals, BonusBasis, BonusRate, CostBreakdown, DayBreakdown, DayStatus,
    DepoRateKind, DepotBreakdown, InsufficientReason, Period, Proof, RateTable, WeightedPlan,
};
use crate::service::plan_aggregator::{aggregate, Forecast};
use crate::service::rate_resolver::RateResolver;

/// 未指定仓库的计划在仓库维度汇总中的键
pub const STANDARD_DEPOT: &str = "standard";

/// 加权后的线路数/里程输出精度
const QUANTITY_SCALE: i64 = 4;

/// 预期账单服务
pub struct BillingService {
    repo: Arc<dyn CostRepository>,
    policy: PolicyConfig,
}

impl BillingService {
    pub fn new(repo: Arc<dyn CostRepository>, policy: PolicyConfig) -> Self {
        Self { repo, policy }
    }

    /// 计算承运商某月的预期账单
    pub async fn calculate(
        &self,
        carrier_id: i64,
        service_type: &str,
        year: i32,
        month: u32,
    ) -> Result<BillingResult> {
        let period = Period::new(year, month).ok_or(EngineError::InvalidPeriod { year, month })?;
        let snapshot = self
            .repo
            .load_snapshot(carrier_id, service_type, period)
            .await?;
        calculate_billing(carrier_id, service_type, period, &snapshot, &self.policy)
    }
}

/// 基于一致性快照计算预期账单 (纯函数)
///
/// 1. 没有任何与账期相交的生效价格配置 -> `NoActivePriceConfig`
/// 2. 没有任何覆盖账期的计划 -> `NoPlans`
/// 3. 逐日: 无计划的日期记为 `NoForecast`, 找不到费率的日期记为 `MissingRates`,
///    两者都不计费 (不按 0 计)
pub fn calculate_billing(
    carrier_id: i64,
    service_type: &str,
    period: Period,
    snapshot: &PeriodSnapshot,
    policy: &PolicyConfig,
) -> Result<BillingResult> {
    let range = period.range();
    let mut resolver = RateResolver::new(&snapshot.price_configs, carrier_id, service_type);
    if !resolver.any_active_between(range.start, range.end) {
        tracing::info!(
            "carrier={} type={} {}: 没有生效的价格配置",
            carrier_id,
            service_type,
            period
        );
        return Err(EngineError::InsufficientData(
            InsufficientReason::NoActivePriceConfig,
        ));
    }

    let forecast = aggregate(carrier_id, range, &snapshot.route_plans)?;
    if !forecast.has_any_plan() {
        tracing::info!("carrier={} {}: 没有上传计划", carrier_id, period);
        return Err(EngineError::InsufficientData(InsufficientReason::NoPlans));
    }

    let day_depots = active_depots(&forecast, &mut resolver);
    let mut active_days: HashMap<String, i64> = HashMap::new();
    for depots in day_depots.values() {
        for depot in depots {
            *active_days.entry(depot.clone()).or_default() += 1;
        }
    }

    let mut costs = CostBreakdown::zero();
    let mut depots: IndexMap<String, DepotAccumulator> = IndexMap::new();
    let mut by_day = Vec::with_capacity(forecast.days.len());
    let mut incomplete_days = Vec::new();
    let mut ambiguous: BTreeSet<i64> = BTreeSet::new();
    let mut priced_days = 0usize;
    let no_depots = BTreeSet::new();

    for (date, day) in &forecast.days {
        let Some(entries) = day.entries() else {
            by_day.push(DayBreakdown {
                date: *date,
                status: DayStatus::NoForecast,
                routes: None,
                distance_km: None,
                costs: None,
                price_config_ids: Vec::new(),
                missing: Vec::new(),
            });
            incomplete_days.push(*date);
            continue;
        };

        let depots_today = day_depots.get(date).unwrap_or(&no_depots);
        let priced = price_day(*date, entries, depots_today, &active_days, &mut resolver);

        let mut day_total = CostBreakdown::zero();
        for (depot, part) in &priced.parts {
            day_total.add(part);
            let acc = depots.entry(depot.clone()).or_default();
            acc.days.insert(*date);
            acc.costs.add(part);
        }
        costs.add(&day_total);
        ambiguous.extend(priced.ambiguous.iter().copied());

        let status = if priced.missing.is_empty() {
            tracing::debug!(
                "{} 计费: fix={} km={} linehaul={} depo={}",
                date,
                day_total.fix.round(2),
                day_total.km.round(2),
                day_total.linehaul.round(2),
                day_total.depo.round(2)
            );
            DayStatus::Calculated
        } else {
            tracing::warn!(
                "carrier={} {} 缺少费率, 对应分项不计费: {:?}",
                carrier_id,
                date,
                priced.missing
            );
            incomplete_days.push(*date);
            DayStatus::MissingRates
        };

        let day_costs = if priced.parts.is_empty() {
            None
        } else {
            priced_days += 1;
            Some(day_total.rounded())
        };

        by_day.push(DayBreakdown {
            date: *date,
            status,
            routes: day.total_routes().map(|v| v.round(QUANTITY_SCALE)),
            distance_km: day.total_distance_km().map(|v| v.round(QUANTITY_SCALE)),
            costs: day_costs,
            price_config_ids: priced.config_ids.into_iter().collect(),
            missing: priced.missing,
        });
    }

    if priced_days == 0 {
        tracing::info!(
            "carrier={} type={} {}: 计划中的线路没有适用的费率",
            carrier_id,
            service_type,
            period
        );
        return Err(EngineError::InsufficientData(
            InsufficientReason::NoApplicableRates,
        ));
    }

    let bonus = bonus_basis(&forecast, &mut resolver, snapshot.proof.as_ref());
    let net = costs.total() + bonus.amount.clone().unwrap_or_else(BigDecimal::zero);
    let total_net = net.round(2);
    let total_gross = (&total_net * &(BigDecimal::from(1) + &policy.vat_rate)).round(2);

    let by_depot: IndexMap<String, DepotBreakdown> = depots
        .into_iter()
        .map(|(depot, acc)| {
            let breakdown = DepotBreakdown {
                depot: depot.clone(),
                active_days: acc.days.len() as i64,
                total_net: acc.costs.total().round(2),
                costs: acc.costs.rounded(),
            };
            (depot, breakdown)
        })
        .collect();

    tracing::info!(
        "预期账单 carrier={} type={} {}: net={} gross={} 未计费天数={}",
        carrier_id,
        service_type,
        period,
        total_net,
        total_gross,
        incomplete_days.len()
    );

    Ok(BillingResult {
        carrier_id,
        service_type: service_type.to_string(),
        period,
        totals: BillingTotals {
            costs: costs.rounded(),
            bonus: bonus.amount.clone(),
            total_net,
            vat_rate: policy.vat_rate.clone(),
            total_gross,
        },
        by_depot,
        by_day,
        bonus,
        plans_used: forecast.plans_used,
        coverage_warnings: forecast.warnings,
        ambiguous_price_configs: ambiguous.into_iter().collect(),
        incomplete_days,
    })
}

#[derive(Debug, Default)]
struct DepotAccumulator {
    days: BTreeSet<NaiveDate>,
    costs: CostBreakdown,
}

#[derive(Debug, Default)]
struct DayPricing {
    parts: IndexMap<String, CostBreakdown>,
    config_ids: BTreeSet<i64>,
    ambiguous: BTreeSet<i64>,
    /// 算不出的分项 (原因)
    missing: Vec<String>,
}

impl DayPricing {
    fn note(&mut self, table: &RateTable) {
        self.config_ids.insert(table.price_config_id);
        if table.is_ambiguous() {
            self.ambiguous.insert(table.price_config_id);
            self.ambiguous.extend(table.ambiguous_with.iter().copied());
        }
    }

    fn add(&mut self, depot: String, costs: &CostBreakdown) {
        self.parts.entry(depot).or_default().add(costs);
    }
}

/// 每天运营的仓库: 计划指定的仓库; 未指定仓库的计划带上标准配置中的全部仓库
fn active_depots(
    forecast: &Forecast,
    resolver: &mut RateResolver<'_>,
) -> BTreeMap<NaiveDate, BTreeSet<String>> {
    let mut out = BTreeMap::new();
    for (date, day) in &forecast.days {
        let Some(entries) = day.entries() else {
            continue;
        };
        let mut depots = BTreeSet::new();
        for entry in entries {
            match &entry.depot {
                Some(depot) => {
                    depots.insert(depot.clone());
                }
                None => {
                    if let Ok(table) = resolver.resolve(*date, None) {
                        depots.extend(table.depo_rates.iter().map(|r| r.depot_name.clone()));
                    }
                }
            }
        }
        out.insert(*date, depots);
    }
    out
}

/// 单日计费: 每个分项独立计价, 缺费率的分项记入 missing, 其余照常计入
fn price_day(
    date: NaiveDate,
    entries: &[WeightedPlan],
    depots_today: &BTreeSet<String>,
    active_days: &HashMap<String, i64>,
    resolver: &mut RateResolver<'_>,
) -> DayPricing {
    let mut pricing = DayPricing::default();

    for entry in entries {
        let table = match resolver.resolve(date, entry.depot.as_deref()) {
            Ok(table) => table,
            Err(e) => {
                pricing.missing.push(format!("plan {}: {}", entry.plan_id, e));
                continue;
            }
        };
        pricing.note(table);
        if let Some(costs) = entry_costs(table, entry, &mut pricing.missing) {
            let key = entry
                .depot
                .clone()
                .unwrap_or_else(|| STANDARD_DEPOT.to_string());
            pricing.add(key, &costs);
        }
    }

    for depot in depots_today {
        let table = match resolver.resolve(date, Some(depot.as_str())) {
            Ok(table) => table,
            Err(e) => {
                pricing.missing.push(format!("depot '{depot}': {e}"));
                continue;
            }
        };
        pricing.note(table);
        if table.depo_rates_for(depot).next().is_none() {
            continue;
        }
        let days = active_days.get(depot).copied().unwrap_or(1);
        match depo_cost(table, depot, days) {
            Ok(depo) => pricing.add(
                depot.clone(),
                &CostBreakdown {
                    depo,
                    ..CostBreakdown::zero()
                },
            ),
            Err(reason) => pricing.missing.push(reason),
        }
    }

    pricing
}

/// FIX = 线路数 × 固定费率, KM = 里程 × 公里费率, 干线 = 次数 × 干线费率
///
/// 所有分项都缺费率时返回 None
fn entry_costs(
    table: &RateTable,
    entry: &WeightedPlan,
    missing: &mut Vec<String>,
) -> Option<CostBreakdown> {
    let mut costs = CostBreakdown::zero();
    let missing_before = missing.len();
    let mut priced = false;

    for routes in &entry.routes {
        if routes.count.is_zero() && routes.distance_km.is_zero() {
            continue;
        }
        let fix = table.fix_rate(&routes.route_type);
        let km = table.km_rate(&routes.route_type);
        if fix.is_none() && km.is_none() {
            missing.push(format!(
                "price config {} has no FIX or KM rate for route type '{}'",
                table.price_config_id, routes.route_type
            ));
            continue;
        }
        if let Some(rate) = fix {
            costs.fix += &routes.count * rate;
        }
        if let Some(rate) = km {
            costs.km += &routes.distance_km * rate;
        }
        priced = true;
    }

    for lh in &entry.linehauls {
        if lh.count.is_zero() {
            continue;
        }
        match table.linehaul_rate(&lh.from_code, &lh.to_code, &lh.vehicle_type, lh.pallets) {
            Some(rate) => {
                costs.linehaul += &lh.count * rate;
                priced = true;
            }
            None => missing.push(format!(
                "price config {} has no linehaul rate for {}->{} {} ({:?} pallets)",
                table.price_config_id, lh.from_code, lh.to_code, lh.vehicle_type, lh.pallets
            )),
        }
    }

    (priced || missing.len() == missing_before).then_some(costs)
}

/// 仓库管理费 (单日): 月费按当月实际运营天数分摊
fn depo_cost(
    table: &RateTable,
    depot: &str,
    active_days: i64,
) -> std::result::Result<BigDecimal, String> {
    let mut total = BigDecimal::zero();
    for rate in table.depo_rates_for(depot) {
        match rate.kind {
            DepoRateKind::Monthly => {
                total += rate.rate.clone() / BigDecimal::from(active_days.max(1));
            }
            DepoRateKind::Daily => total += &rate.rate,
            DepoRateKind::Hourly => {
                let hours = rate.hours_per_day.as_ref().ok_or_else(|| {
                    format!("hourly depot rate for '{depot}' has no hours_per_day")
                })?;
                total += &rate.rate * hours;
            }
        }
    }
    Ok(total)
}

/// 质量奖金档位: 下限 <= quality 的档位中下限最高者, 同下限取金额较高者
pub fn select_bonus_tier<'a>(tiers: &'a [BonusRate], quality: &BigDecimal) -> Option<&'a BonusRate> {
    tiers
        .iter()
        .filter(|t| &t.quality_min <= quality)
        .max_by(|a, b| {
            a.quality_min
                .cmp(&b.quality_min)
                .then_with(|| a.bonus_amount.cmp(&b.bonus_amount))
        })
}

/// 奖金档位取自账期内最后一个有计划的日期所适用的配置
fn bonus_basis(
    forecast: &Forecast,
    resolver: &mut RateResolver<'_>,
    proof: Option<&Proof>,
) -> BonusBasis {
    let quality = proof.and_then(|p| p.quality_percentage.clone());
    let tier = quality.as_ref().and_then(|q| {
        let tiers = forecast
            .days
            .iter()
            .rev()
            .filter(|(_, day)| day.entries().is_some())
            .find_map(|(date, _)| resolver.resolve(*date, None).ok().map(|t| t.bonus_rates.clone()))?;
        select_bonus_tier(&tiers, q).cloned()
    });

    BonusBasis {
        quality_percentage: quality,
        tier_min: tier.as_ref().map(|t| t.quality_min.clone()),
        amount: tier.map(|t| t.bonus_amount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DepoRate, FixRate, KmRate, LinehaulRate, PlanShift, PlannedLinehauls, PlannedRoutes,
        PriceConfig, RoutePlan,
    };
    use std::str::FromStr;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn july() -> Period {
        Period::new(2025, 7).unwrap()
    }

    fn tiers() -> Vec<BonusRate> {
        vec![
            BonusRate {
                quality_min: dec("98"),
                quality_max: None,
                bonus_amount: dec("445600"),
            },
            BonusRate {
                quality_min: dec("97.51"),
                quality_max: Some(dec("97.99")),
                bonus_amount: dec("445600"),
            },
            BonusRate {
                quality_min: dec("97.01"),
                quality_max: Some(dec("97.50")),
                bonus_amount: dec("436700"),
            },
        ]
    }

    fn config(id: i64, from: NaiveDate) -> PriceConfig {
        PriceConfig {
            id,
            carrier_id: 1,
            contract_id: Some(7),
            service_type: "AlzaBox".to_string(),
            valid_from: from,
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
            linehaul_rates: vec![LinehaulRate {
                from_code: "CZ01".to_string(),
                to_code: "CZ02".to_string(),
                vehicle_type: "SOLO".to_string(),
                pallet_min: Some(1),
                pallet_max: Some(21),
                rate: dec("2500"),
                depot: None,
            }],
            bonus_rates: tiers(),
        }
    }

    fn plan(id: i64, depot: Option<&str>, routes: i64, to: NaiveDate) -> RoutePlan {
        RoutePlan {
            id,
            carrier_id: 1,
            valid_from: d(2025, 7, 1),
            valid_to: Some(to),
            plan_type: PlanShift::Dpo,
            depot: depot.map(str::to_string),
            routes: vec![PlannedRoutes {
                route_type: "DPO".to_string(),
                count: routes,
                distance_km: BigDecimal::from(routes * 100),
            }],
            linehauls: vec![PlannedLinehauls {
                from_code: "CZ01".to_string(),
                to_code: "CZ02".to_string(),
                vehicle_type: "SOLO".to_string(),
                pallets: Some(18),
                count: 2,
            }],
            stop_count: 0,
        }
    }

    fn proof(quality: &str) -> Proof {
        Proof {
            id: 50,
            carrier_id: 1,
            period: july(),
            total_fix: None,
            total_km: None,
            total_linehaul: None,
            total_depo: None,
            grand_total: None,
            route_count: None,
            quality_percentage: Some(dec(quality)),
        }
    }

    fn snapshot(configs: Vec<PriceConfig>, plans: Vec<RoutePlan>) -> PeriodSnapshot {
        PeriodSnapshot {
            price_configs: configs,
            route_plans: plans,
            proof: None,
            invoices: Vec::new(),
        }
    }

    #[test]
    fn bonus_tier_uses_inclusive_lower_bound() {
        let tiers = tiers();
        let tier = select_bonus_tier(&tiers, &dec("97.80")).unwrap();
        assert_eq!(tier.quality_min, dec("97.51"));
        assert_eq!(tier.bonus_amount, dec("445600"));

        assert_eq!(select_bonus_tier(&tiers, &dec("98")).unwrap().quality_min, dec("98"));
        assert_eq!(
            select_bonus_tier(&tiers, &dec("97.01")).unwrap().bonus_amount,
            dec("436700")
        );
        assert!(select_bonus_tier(&tiers, &dec("96.99")).is_none());
    }

    #[test]
    fn bonus_tie_prefers_higher_payout() {
        let mut tiers = tiers();
        tiers.push(BonusRate {
            quality_min: dec("97.51"),
            quality_max: None,
            bonus_amount: dec("450000"),
        });
        let tier = select_bonus_tier(&tiers, &dec("97.80")).unwrap();
        assert_eq!(tier.bonus_amount, dec("450000"));
    }

    #[test]
    fn full_month_for_single_depot() {
        let mut snap = snapshot(
            vec![config(1, d(2025, 1, 1))],
            vec![plan(1, Some("Praha"), 5, d(2025, 7, 31))],
        );
        snap.proof = Some(proof("97.80"));

        let result =
            calculate_billing(1, "AlzaBox", july(), &snap, &PolicyConfig::default()).unwrap();

        assert!(result.is_complete());
        assert_eq!(result.by_day.len(), 31);
        assert_eq!(result.totals.costs.fix, dec("155000"));
        assert_eq!(result.totals.costs.km, dec("155000"));
        assert_eq!(result.totals.costs.linehaul, dec("155000"));
        assert_eq!(result.totals.costs.depo, dec("310000"));
        assert_eq!(result.totals.bonus, Some(dec("445600")));
        assert_eq!(result.bonus.tier_min, Some(dec("97.51")));
        assert_eq!(result.totals.total_net, dec("1220600"));
        assert_eq!(result.totals.total_gross, dec("1476926"));

        let praha = &result.by_depot["Praha"];
        assert_eq!(praha.active_days, 31);
        assert_eq!(praha.total_net, dec("775000"));
        assert_eq!(result.by_day[0].costs.as_ref().unwrap().total(), dec("25000"));
        assert_eq!(result.by_day[0].price_config_ids, vec![1]);
    }

    #[test]
    fn insufficient_data_reasons_are_distinct() {
        let policy = PolicyConfig::default();

        let none = snapshot(Vec::new(), vec![plan(1, None, 5, d(2025, 7, 31))]);
        let err = calculate_billing(1, "AlzaBox", july(), &none, &policy).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData(InsufficientReason::NoActivePriceConfig)
        ));

        let later = snapshot(vec![config(1, d(2025, 8, 1))], Vec::new());
        let err = calculate_billing(1, "AlzaBox", july(), &later, &policy).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData(InsufficientReason::NoActivePriceConfig)
        ));

        let no_plans = snapshot(vec![config(1, d(2025, 1, 1))], Vec::new());
        let err = calculate_billing(1, "AlzaBox", july(), &no_plans, &policy).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(InsufficientReason::NoPlans)));
    }

    #[test]
    fn uncovered_days_are_not_billed_as_zero() {
        let snap = snapshot(
            vec![config(1, d(2025, 1, 1))],
            vec![plan(1, Some("Praha"), 5, d(2025, 7, 15))],
        );
        let result =
            calculate_billing(1, "AlzaBox", july(), &snap, &PolicyConfig::default()).unwrap();

        assert!(!result.is_complete());
        assert_eq!(result.incomplete_days.len(), 16);
        let day20 = &result.by_day[19];
        assert_eq!(day20.status, DayStatus::NoForecast);
        assert!(day20.costs.is_none());
        assert!(day20.routes.is_none());

        assert_eq!(result.totals.costs.fix, dec("75000"));
        // 月费按 15 个运营日分摊, 全额计入
        assert_eq!(result.totals.costs.depo, dec("310000"));
        assert_eq!(result.by_depot["Praha"].active_days, 15);
        assert_eq!(result.totals.bonus, None);
    }

    #[test]
    fn days_before_contract_start_are_missing_rates() {
        let snap = snapshot(
            vec![config(1, d(2025, 7, 11))],
            vec![plan(1, Some("Praha"), 5, d(2025, 7, 31))],
        );
        let result =
            calculate_billing(1, "AlzaBox", july(), &snap, &PolicyConfig::default()).unwrap();

        assert_eq!(result.incomplete_days.len(), 10);
        assert_eq!(result.by_day[0].status, DayStatus::MissingRates);
        assert!(result.by_day[0].costs.is_none());
        assert_eq!(result.by_day[0].routes, Some(dec("5")));
        assert_eq!(result.by_day[10].status, DayStatus::Calculated);
        assert_eq!(result.totals.costs.fix, dec("105000"));
    }

    #[test]
    fn unscoped_plan_carries_every_depot_overhead() {
        let mut cfg = config(1, d(2025, 1, 1));
        cfg.depo_rates = vec![
            DepoRate {
                depot_name: "Praha".to_string(),
                kind: DepoRateKind::Daily,
                rate: dec("1000"),
                hours_per_day: None,
            },
            DepoRate {
                depot_name: "Brno".to_string(),
                kind: DepoRateKind::Hourly,
                rate: dec("200"),
                hours_per_day: Some(dec("8")),
            },
        ];
        let snap = snapshot(vec![cfg], vec![plan(1, None, 5, d(2025, 7, 31))]);
        let result =
            calculate_billing(1, "AlzaBox", july(), &snap, &PolicyConfig::default()).unwrap();

        assert_eq!(result.by_day[0].costs.as_ref().unwrap().depo, dec("2600"));
        assert_eq!(result.totals.costs.depo, dec("80600"));
        assert_eq!(result.by_depot["standard"].costs.fix, dec("155000"));
        assert_eq!(result.by_depot["Brno"].costs.depo, dec("49600"));
        assert_eq!(result.by_depot["Praha"].costs.depo, dec("31000"));
    }

    #[test]
    fn hourly_rate_without_hours_keeps_route_costs() {
        let mut cfg = config(1, d(2025, 1, 1));
        cfg.depo_rates[0].kind = DepoRateKind::Hourly;
        let snap = snapshot(vec![cfg], vec![plan(1, Some("Praha"), 5, d(2025, 7, 31))]);
        let result =
            calculate_billing(1, "AlzaBox", july(), &snap, &PolicyConfig::default()).unwrap();
        assert_eq!(result.incomplete_days.len(), 31);
        assert!(result.by_day.iter().all(|d| d.status == DayStatus::MissingRates));
        assert!(result.by_day[0].missing[0].contains("hours_per_day"));
        assert_eq!(result.by_day[0].costs.as_ref().unwrap().fix, dec("5000"));
        assert_eq!(result.totals.costs.fix, dec("155000"));
        assert_eq!(result.totals.costs.depo, dec("0"));
    }

    #[test]
    fn unpriced_route_type_is_listed_and_the_rest_billed() {
        let mut p = plan(1, Some("Praha"), 5, d(2025, 7, 31));
        p.routes.push(PlannedRoutes {
            route_type: "SD".to_string(),
            count: 2,
            distance_km: dec("80"),
        });
        let snap = snapshot(vec![config(1, d(2025, 1, 1))], vec![p]);
        let result =
            calculate_billing(1, "AlzaBox", july(), &snap, &PolicyConfig::default()).unwrap();

        let day = &result.by_day[0];
        assert_eq!(day.status, DayStatus::MissingRates);
        assert_eq!(day.missing.len(), 1);
        assert!(day.missing[0].contains("'SD'"));
        assert_eq!(day.routes, Some(dec("7")));
        assert_eq!(day.costs.as_ref().unwrap().linehaul, dec("5000"));
        assert_eq!(result.totals.costs.fix, dec("155000"));
        assert_eq!(result.totals.costs.depo, dec("310000"));
        assert_eq!(result.incomplete_days.len(), 31);
    }

    #[test]
    fn plans_without_any_applicable_rate_are_insufficient_data() {
        let mut cfg = config(1, d(2025, 1, 1));
        cfg.depo_rates.clear();
        cfg.linehaul_rates.clear();
        let mut p = plan(1, Some("Praha"), 5, d(2025, 7, 31));
        p.plan_type = PlanShift::Sd;
        p.routes[0].route_type = "SD".to_string();
        p.linehauls.clear();

        let snap = snapshot(vec![cfg], vec![p]);
        let err =
            calculate_billing(1, "AlzaBox", july(), &snap, &PolicyConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData(InsufficientReason::NoApplicableRates)
        ));
    }

    #[test]
    fn three_identical_plans_report_whole_quantities() {
        let snap = snapshot(
            vec![config(1, d(2025, 1, 1))],
            vec![
                plan(1, Some("Praha"), 6, d(2025, 7, 31)),
                plan(2, Some("Praha"), 6, d(2025, 7, 31)),
                plan(3, Some("Praha"), 6, d(2025, 7, 31)),
            ],
        );
        let result =
            calculate_billing(1, "AlzaBox", july(), &snap, &PolicyConfig::default()).unwrap();

        let day = &result.by_day[0];
        assert_eq!(day.routes.as_ref().unwrap().to_string(), "6");
        assert_eq!(day.distance_km.as_ref().unwrap().to_string(), "600");
        assert_eq!(result.totals.costs.fix, dec("186000"));

        let csv = String::from_utf8(crate::service::export_daily_csv(&result).unwrap()).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("2025-07-01,calculated,6,600,"));
        assert!(result
            .plans_used
            .iter()
            .all(|u| u.weighted_days.to_string().len() <= 12));
    }

    #[test]
    fn duplicate_plans_are_weighted_and_overlaps_flagged() {
        let snap = snapshot(
            vec![config(1, d(2025, 1, 1)), config(2, d(2025, 7, 1))],
            vec![
                plan(1, Some("Praha"), 5, d(2025, 7, 31)),
                plan(2, Some("Praha"), 7, d(2025, 7, 31)),
            ],
        );
        let result =
            calculate_billing(1, "AlzaBox", july(), &snap, &PolicyConfig::default()).unwrap();

        assert_eq!(result.by_day[9].routes, Some(dec("6")));
        assert_eq!(result.totals.costs.fix, dec("186000"));
        assert_eq!(result.coverage_warnings.len(), 31);
        assert_eq!(result.ambiguous_price_configs, vec![1, 2]);
        assert_eq!(result.by_day[0].price_config_ids, vec![2]);
    }
}
