use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::models::{window_contains, PriceConfig, RateTable, Scoped};

/// 找不到生效的价格配置 (调用方不得默认为 0)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no active price config for carrier {carrier_id}, type '{service_type}' on {date}")]
    NotFound {
        carrier_id: i64,
        service_type: String,
        date: NaiveDate,
    },
}

/// 解析某承运商/服务类型/日期/仓库适用的费率表
pub fn resolve(
    configs: &[PriceConfig],
    carrier_id: i64,
    service_type: &str,
    date: NaiveDate,
    depot: Option<&str>,
) -> Result<RateTable, ResolveError> {
    let survivors = active_on(configs, carrier_id, service_type, date);
    let Some(chosen) = survivors.first() else {
        return Err(ResolveError::NotFound {
            carrier_id,
            service_type: service_type.to_string(),
            date,
        });
    };

    let ambiguous_with: Vec<i64> = survivors.iter().skip(1).map(|c| c.id).collect();
    if !ambiguous_with.is_empty() {
        tracing::warn!(
            "价格配置重叠: carrier={} type={} date={} 选用 {} (valid_from {}), 同时生效: {:?}",
            carrier_id,
            service_type,
            date,
            chosen.id,
            chosen.valid_from,
            ambiguous_with
        );
    }

    Ok(build_table(chosen, depot, ambiguous_with))
}

/// 当日生效的配置, 按 valid_from 降序 (最新修订优先), 再按 id 降序
fn active_on<'a>(
    configs: &'a [PriceConfig],
    carrier_id: i64,
    service_type: &str,
    date: NaiveDate,
) -> Vec<&'a PriceConfig> {
    let mut survivors: Vec<&PriceConfig> = configs
        .iter()
        .filter(|c| c.carrier_id == carrier_id && c.service_type == service_type && c.is_active)
        .filter(|c| window_contains(c.valid_from, c.valid_to, date))
        .collect();
    survivors.sort_by(|a, b| b.valid_from.cmp(&a.valid_from).then(b.id.cmp(&a.id)));
    survivors
}

fn build_table(config: &PriceConfig, depot: Option<&str>, ambiguous_with: Vec<i64>) -> RateTable {
    let depo_rates = config
        .depo_rates
        .iter()
        .filter(|r| depot.map_or(true, |d| r.depot_name == d))
        .cloned()
        .collect();

    RateTable {
        price_config_id: config.id,
        contract_id: config.contract_id,
        service_type: config.service_type.clone(),
        valid_from: config.valid_from,
        valid_to: config.valid_to,
        depot: depot.map(str::to_string),
        fix_rates: scoped_rows(&config.fix_rates, depot),
        km_rates: scoped_rows(&config.km_rates, depot),
        depo_rates,
        linehaul_rates: scoped_rows(&config.linehaul_rates, depot),
        bonus_rates: config.bonus_rates.clone(),
        ambiguous_with,
    }
}

/// 标准行由所有没有专属覆盖的仓库共享; 专属行整体替换同 key 的标准行
fn scoped_rows<T: Scoped + Clone>(rows: &[T], depot: Option<&str>) -> Vec<T> {
    let Some(depot) = depot else {
        return rows.iter().filter(|r| r.depot().is_none()).cloned().collect();
    };

    let overridden: HashSet<String> = rows
        .iter()
        .filter(|r| r.depot() == Some(depot))
        .map(|r| r.override_key())
        .collect();

    rows.iter()
        .filter(|r| match r.depot() {
            Some(d) => d == depot,
            None => !overridden.contains(&r.override_key()),
        })
        .cloned()
        .collect()
}

/// 带缓存的解析器, 供按天计费时复用; 同一组生效配置只解析 (和告警) 一次
pub struct RateResolver<'a> {
    configs: &'a [PriceConfig],
    carrier_id: i64,
    service_type: &'a str,
    cache: HashMap<(Vec<i64>, Option<String>), RateTable>,
}

impl<'a> RateResolver<'a> {
    pub fn new(configs: &'a [PriceConfig], carrier_id: i64, service_type: &'a str) -> Self {
        Self {
            configs,
            carrier_id,
            service_type,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(
        &mut self,
        date: NaiveDate,
        depot: Option<&str>,
    ) -> Result<&RateTable, ResolveError> {
        let ids: Vec<i64> = active_on(self.configs, self.carrier_id, self.service_type, date)
            .iter()
            .map(|c| c.id)
            .collect();
        if ids.is_empty() {
            return Err(ResolveError::NotFound {
                carrier_id: self.carrier_id,
                service_type: self.service_type.to_string(),
                date,
            });
        }

        let key = (ids, depot.map(str::to_string));
        if !self.cache.contains_key(&key) {
            let table = resolve(self.configs, self.carrier_id, self.service_type, date, depot)?;
            self.cache.insert(key.clone(), table);
        }
        self.cache.get(&key).ok_or_else(|| ResolveError::NotFound {
            carrier_id: self.carrier_id,
            service_type: self.service_type.to_string(),
            date,
        })
    }

    /// 在 [start, end] 任一天生效的配置是否存在
    pub fn any_active_between(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.configs.iter().any(|c| {
            c.carrier_id == self.carrier_id
                && c.service_type == self.service_type
                && c.is_active
                && c.valid_from <= end
                && c.valid_to.map_or(true, |to| to >= start)
        })
    }
}
