use bigdecimal::BigDecimal;
use csv::Writer;

use crate::models::BillingResult;
use crate::service::extractor::format_amount;

const HEADER: [&str; 10] = [
    "date",
    "status",
    "routes",
    "distance_km",
    "fix",
    "km",
    "linehaul",
    "depo",
    "total_net",
    "missing",
];

/// 空值输出为空单元格, 不输出 0
fn option_to_csv(val: &Option<BigDecimal>) -> String {
    val.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn amount_to_csv(val: Option<&BigDecimal>) -> String {
    val.map(format_amount).unwrap_or_default()
}

/// 导出逐日计费明细 (审计用)
pub fn export_daily_csv(result: &BillingResult) -> Result<Vec<u8>, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for day in &result.by_day {
        let costs = day.costs.as_ref();
        let total = costs.map(|c| c.total());
        writer.write_record(&[
            day.date.format("%Y-%m-%d").to_string(),
            day.status.as_str().to_string(),
            option_to_csv(&day.routes),
            option_to_csv(&day.distance_km),
            amount_to_csv(costs.map(|c| &c.fix)),
            amount_to_csv(costs.map(|c| &c.km)),
            amount_to_csv(costs.map(|c| &c.linehaul)),
            amount_to_csv(costs.map(|c| &c.depo)),
            amount_to_csv(total.as_ref()),
            day.missing.join("; "),
        ])?;
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BillingTotals, BonusBasis, CostBreakdown, DayBreakdown, DayStatus, Period,
    };
    use chrono::NaiveDate;
    use indexmap::IndexMap;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn result() -> BillingResult {
        let costs = CostBreakdown {
            fix: dec("5000"),
            km: dec("1234.5"),
            linehaul: dec("0"),
            depo: dec("10000"),
        };
        BillingResult {
            carrier_id: 1,
            service_type: "AlzaBox".to_string(),
            period: Period::new(2025, 7).unwrap(),
            totals: BillingTotals {
                costs: costs.clone(),
                bonus: None,
                total_net: costs.total(),
                vat_rate: dec("0.21"),
                total_gross: dec("19646.75"),
            },
            by_depot: IndexMap::new(),
            by_day: vec![
                DayBreakdown {
                    date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                    status: DayStatus::Calculated,
                    routes: Some(dec("5")),
                    distance_km: Some(dec("123.45")),
                    costs: Some(costs),
                    price_config_ids: vec![1],
                    missing: Vec::new(),
                },
                DayBreakdown {
                    date: NaiveDate::from_ymd_opt(2025, 7, 3).unwrap(),
                    status: DayStatus::MissingRates,
                    routes: Some(dec("2")),
                    distance_km: Some(dec("80")),
                    costs: Some(CostBreakdown {
                        fix: dec("2000"),
                        km: dec("0"),
                        linehaul: dec("0"),
                        depo: dec("0"),
                    }),
                    price_config_ids: vec![1],
                    missing: vec!["linehaul CZ01->CZ02 SOLO".to_string()],
                },
                DayBreakdown {
                    date: NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
                    status: DayStatus::NoForecast,
                    routes: None,
                    distance_km: None,
                    costs: None,
                    price_config_ids: Vec::new(),
                    missing: Vec::new(),
                },
            ],
            bonus: BonusBasis {
                quality_percentage: None,
                tier_min: None,
                amount: None,
            },
            plans_used: Vec::new(),
            coverage_warnings: Vec::new(),
            ambiguous_price_configs: Vec::new(),
            incomplete_days: vec![NaiveDate::from_ymd_opt(2025, 7, 2).unwrap()],
        }
    }

    #[test]
    fn no_forecast_days_have_empty_cells() {
        let bytes = export_daily_csv(&result()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "date,status,routes,distance_km,fix,km,linehaul,depo,total_net,missing"
        );
        assert_eq!(
            lines[1],
            "2025-07-01,calculated,5,123.45,\"5 000,00\",\"1 234,50\",\"0,00\",\"10 000,00\",\"16 234,50\","
        );
        assert_eq!(lines[2], "2025-07-02,no_forecast,,,,,,,,");
        assert_eq!(
            lines[3],
            "2025-07-03,missing_rates,2,80,\"2 000,00\",\"0,00\",\"0,00\",\"0,00\",\"2 000,00\",linehaul CZ01->CZ02 SOLO"
        );
    }

    #[test]
    fn export_reads_back_with_csv_reader() {
        let bytes = export_daily_csv(&result()).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][4], "5 000,00");
        assert_eq!(&rows[1][8], "");
        assert_eq!(&rows[2][9], "linehaul CZ01->CZ02 SOLO");
    }
}
