use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;

use super::repository::{CostRepository, PeriodSnapshot};
use crate::error::RepositoryError;
use crate::models::{
    BonusRate, DateRange, DepoRate, DepoRateKind, FixRate, Invoice, InvoiceItem, InvoiceStatus,
    KmRate, LinehaulRate, NewInvoice, Period, PlanShift, PlannedLinehauls, PlannedRoutes,
    PriceConfig, Proof, RoutePlan,
};

/// PostgreSQL 仓储
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PriceConfigRow {
    id: i64,
    carrier_id: i64,
    contract_id: Option<i64>,
    service_type: String,
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct FixRateRow {
    price_config_id: i64,
    route_type: String,
    rate: BigDecimal,
    depot: Option<String>,
}

#[derive(Debug, FromRow)]
struct DepoRateRow {
    price_config_id: i64,
    depo_name: String,
    rate_type: String,
    rate: BigDecimal,
    hours_per_day: Option<BigDecimal>,
}

#[derive(Debug, FromRow)]
struct LinehaulRateRow {
    price_config_id: i64,
    from_code: String,
    to_code: String,
    vehicle_type: String,
    pallet_min: Option<i32>,
    pallet_max: Option<i32>,
    rate: BigDecimal,
    depot: Option<String>,
}

#[derive(Debug, FromRow)]
struct BonusRateRow {
    price_config_id: i64,
    quality_min: BigDecimal,
    quality_max: Option<BigDecimal>,
    bonus_amount: BigDecimal,
}

#[derive(Debug, FromRow)]
struct RoutePlanRow {
    id: i64,
    carrier_id: i64,
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
    plan_type: String,
    depot: Option<String>,
    stop_count: i64,
}

#[derive(Debug, FromRow)]
struct PlanRouteRow {
    route_plan_id: i64,
    route_type: String,
    route_count: i64,
    distance_km: BigDecimal,
}

#[derive(Debug, FromRow)]
struct PlanLinehaulRow {
    route_plan_id: i64,
    from_code: String,
    to_code: String,
    vehicle_type: String,
    pallets: Option<i32>,
    linehaul_count: i64,
}

#[derive(Debug, FromRow)]
struct ProofRow {
    id: i64,
    carrier_id: i64,
    period_year: i32,
    period_month: i32,
    total_fix: Option<BigDecimal>,
    total_km: Option<BigDecimal>,
    total_linehaul: Option<BigDecimal>,
    total_depo: Option<BigDecimal>,
    grand_total: Option<BigDecimal>,
    route_count: Option<i64>,
    quality_percentage: Option<BigDecimal>,
}

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: i64,
    carrier_id: i64,
    proof_id: Option<i64>,
    invoice_number: String,
    variable_symbol: Option<String>,
    period_year: Option<i32>,
    period_month: Option<i32>,
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    tax_date: Option<NaiveDate>,
    total_without_vat: Option<BigDecimal>,
    vat_amount: Option<BigDecimal>,
    total_with_vat: Option<BigDecimal>,
    status: String,
    source_file: Option<String>,
    raw_text: Option<String>,
}

#[derive(Debug, FromRow)]
struct InvoiceItemRow {
    invoice_id: i64,
    item_type: String,
    amount_without_vat: Option<BigDecimal>,
    vat_amount: Option<BigDecimal>,
    amount_with_vat: Option<BigDecimal>,
}

const INVOICE_COLUMNS: &str = r#"
    id, carrier_id, proof_id, invoice_number, variable_symbol,
    period_year, period_month, issue_date, due_date, tax_date,
    total_without_vat, vat_amount, total_with_vat, status, source_file, raw_text
"#;

fn period_of(year: i32, month: i32) -> Result<Period, RepositoryError> {
    u32::try_from(month)
        .ok()
        .and_then(|m| Period::new(year, m))
        .ok_or_else(|| RepositoryError::Corrupt(format!("invalid period {month}/{year}")))
}

/// 查询价格配置及全部费率行
async fn fetch_price_configs(
    conn: &mut PgConnection,
    carrier_id: i64,
    service_type: &str,
    active_only: bool,
) -> Result<Vec<PriceConfig>, RepositoryError> {
    let rows = sqlx::query_as::<_, PriceConfigRow>(
        r#"
        SELECT id, carrier_id, contract_id, type as service_type,
               valid_from, valid_to, is_active
        FROM price_config
        WHERE carrier_id = $1
          AND type = $2
          AND ($3 = FALSE OR is_active = TRUE)
        ORDER BY valid_from DESC, id DESC
        "#,
    )
    .bind(carrier_id)
    .bind(service_type)
    .bind(active_only)
    .fetch_all(&mut *conn)
    .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let fix_rows = sqlx::query_as::<_, FixRateRow>(
        "SELECT price_config_id, route_type, rate, depot FROM fix_rate WHERE price_config_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let km_rows = sqlx::query_as::<_, FixRateRow>(
        "SELECT price_config_id, route_type, rate, depot FROM km_rate WHERE price_config_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let depo_rows = sqlx::query_as::<_, DepoRateRow>(
        r#"
        SELECT price_config_id, depo_name, rate_type, rate, hours_per_day
        FROM depo_rate
        WHERE price_config_id = ANY($1)
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let linehaul_rows = sqlx::query_as::<_, LinehaulRateRow>(
        r#"
        SELECT price_config_id, from_code, to_code, vehicle_type,
               pallet_min, pallet_max, rate, depot
        FROM linehaul_rate
        WHERE price_config_id = ANY($1)
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let bonus_rows = sqlx::query_as::<_, BonusRateRow>(
        r#"
        SELECT price_config_id, quality_min, quality_max, bonus_amount
        FROM bonus_rate
        WHERE price_config_id = ANY($1)
        ORDER BY quality_min DESC
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut configs: HashMap<i64, PriceConfig> = rows
        .into_iter()
        .map(|r| {
            (
                r.id,
                PriceConfig {
                    id: r.id,
                    carrier_id: r.carrier_id,
                    contract_id: r.contract_id,
                    service_type: r.service_type,
                    valid_from: r.valid_from,
                    valid_to: r.valid_to,
                    is_active: r.is_active,
                    fix_rates: Vec::new(),
                    km_rates: Vec::new(),
                    depo_rates: Vec::new(),
                    linehaul_rates: Vec::new(),
                    bonus_rates: Vec::new(),
                },
            )
        })
        .collect();

    for r in fix_rows {
        if let Some(c) = configs.get_mut(&r.price_config_id) {
            c.fix_rates.push(FixRate {
                route_type: r.route_type,
                rate: r.rate,
                depot: r.depot,
            });
        }
    }
    for r in km_rows {
        if let Some(c) = configs.get_mut(&r.price_config_id) {
            c.km_rates.push(KmRate {
                route_type: r.route_type,
                rate: r.rate,
                depot: r.depot,
            });
        }
    }
    for r in depo_rows {
        let kind: DepoRateKind = r.rate_type.parse().map_err(RepositoryError::Corrupt)?;
        if let Some(c) = configs.get_mut(&r.price_config_id) {
            c.depo_rates.push(DepoRate {
                depot_name: r.depo_name,
                kind,
                rate: r.rate,
                hours_per_day: r.hours_per_day,
            });
        }
    }
    for r in linehaul_rows {
        if let Some(c) = configs.get_mut(&r.price_config_id) {
            c.linehaul_rates.push(LinehaulRate {
                from_code: r.from_code,
                to_code: r.to_code,
                vehicle_type: r.vehicle_type,
                pallet_min: r.pallet_min,
                pallet_max: r.pallet_max,
                rate: r.rate,
                depot: r.depot,
            });
        }
    }
    for r in bonus_rows {
        if let Some(c) = configs.get_mut(&r.price_config_id) {
            c.bonus_rates.push(BonusRate {
                quality_min: r.quality_min,
                quality_max: r.quality_max,
                bonus_amount: r.bonus_amount,
            });
        }
    }

    let mut configs: Vec<PriceConfig> = configs.into_values().collect();
    configs.sort_by(|a, b| b.valid_from.cmp(&a.valid_from).then(b.id.cmp(&a.id)));
    Ok(configs)
}

/// 查询与区间相交的线路计划
async fn fetch_route_plans(
    conn: &mut PgConnection,
    carrier_id: i64,
    range: DateRange,
) -> Result<Vec<RoutePlan>, RepositoryError> {
    let rows = sqlx::query_as::<_, RoutePlanRow>(
        r#"
        SELECT id, carrier_id, valid_from, valid_to, plan_type, depot, stop_count
        FROM route_plan
        WHERE carrier_id = $1
          AND valid_from <= $3
          AND (valid_to IS NULL OR valid_to >= $2)
        ORDER BY valid_from, id
        "#,
    )
    .bind(carrier_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&mut *conn)
    .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let route_rows = sqlx::query_as::<_, PlanRouteRow>(
        r#"
        SELECT route_plan_id, route_type, route_count, distance_km
        FROM route_plan_route
        WHERE route_plan_id = ANY($1)
        ORDER BY route_plan_id, id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let linehaul_rows = sqlx::query_as::<_, PlanLinehaulRow>(
        r#"
        SELECT route_plan_id, from_code, to_code, vehicle_type, pallets, linehaul_count
        FROM route_plan_linehaul
        WHERE route_plan_id = ANY($1)
        ORDER BY route_plan_id, id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut routes: HashMap<i64, Vec<PlannedRoutes>> = HashMap::new();
    for r in route_rows {
        routes.entry(r.route_plan_id).or_default().push(PlannedRoutes {
            route_type: r.route_type,
            count: r.route_count,
            distance_km: r.distance_km,
        });
    }
    let mut linehauls: HashMap<i64, Vec<PlannedLinehauls>> = HashMap::new();
    for r in linehaul_rows {
        linehauls.entry(r.route_plan_id).or_default().push(PlannedLinehauls {
            from_code: r.from_code,
            to_code: r.to_code,
            vehicle_type: r.vehicle_type,
            pallets: r.pallets,
            count: r.linehaul_count,
        });
    }

    rows.into_iter()
        .map(|r| {
            let plan_type: PlanShift = r.plan_type.parse().map_err(RepositoryError::Corrupt)?;
            Ok(RoutePlan {
                id: r.id,
                carrier_id: r.carrier_id,
                valid_from: r.valid_from,
                valid_to: r.valid_to,
                plan_type,
                depot: r.depot,
                routes: routes.remove(&r.id).unwrap_or_default(),
                linehauls: linehauls.remove(&r.id).unwrap_or_default(),
                stop_count: r.stop_count,
            })
        })
        .collect()
}

async fn fetch_proof(
    conn: &mut PgConnection,
    carrier_id: i64,
    period: Period,
) -> Result<Option<Proof>, RepositoryError> {
    let row = sqlx::query_as::<_, ProofRow>(
        r#"
        SELECT id, carrier_id, period_year, period_month,
               total_fix, total_km, total_linehaul, total_depo, grand_total,
               route_count, quality_percentage
        FROM proof
        WHERE carrier_id = $1 AND period_year = $2 AND period_month = $3
        "#,
    )
    .bind(carrier_id)
    .bind(period.year)
    .bind(period.month as i32)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| {
        Ok(Proof {
            id: r.id,
            carrier_id: r.carrier_id,
            period: period_of(r.period_year, r.period_month)?,
            total_fix: r.total_fix,
            total_km: r.total_km,
            total_linehaul: r.total_linehaul,
            total_depo: r.total_depo,
            grand_total: r.grand_total,
            route_count: r.route_count,
            quality_percentage: r.quality_percentage,
        })
    })
    .transpose()
}

/// 组装发票及明细
async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<InvoiceRow>,
) -> Result<Vec<Invoice>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let item_rows = sqlx::query_as::<_, InvoiceItemRow>(
        r#"
        SELECT invoice_id, item_type, amount_without_vat, vat_amount, amount_with_vat
        FROM invoice_item
        WHERE invoice_id = ANY($1)
        ORDER BY invoice_id, id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<i64, Vec<InvoiceItem>> = HashMap::new();
    for r in item_rows {
        items.entry(r.invoice_id).or_default().push(InvoiceItem {
            item_type: r.item_type,
            amount_without_vat: r.amount_without_vat,
            vat_amount: r.vat_amount,
            amount_with_vat: r.amount_with_vat,
        });
    }

    rows.into_iter()
        .map(|r| {
            let status: InvoiceStatus = r.status.parse().map_err(RepositoryError::Corrupt)?;
            let period = match (r.period_year, r.period_month) {
                (Some(y), Some(m)) => Some(period_of(y, m)?),
                _ => None,
            };
            Ok(Invoice {
                id: r.id,
                carrier_id: r.carrier_id,
                proof_id: r.proof_id,
                invoice_number: r.invoice_number,
                variable_symbol: r.variable_symbol,
                period,
                issue_date: r.issue_date,
                due_date: r.due_date,
                tax_date: r.tax_date,
                total_without_vat: r.total_without_vat,
                vat_amount: r.vat_amount,
                total_with_vat: r.total_with_vat,
                status,
                items: items.remove(&r.id).unwrap_or_default(),
                source_file: r.source_file,
                raw_text: r.raw_text,
            })
        })
        .collect()
}

async fn fetch_invoices(
    conn: &mut PgConnection,
    carrier_id: i64,
    period: Period,
) -> Result<Vec<Invoice>, RepositoryError> {
    let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoice
         WHERE carrier_id = $1 AND period_year = $2 AND period_month = $3
         ORDER BY id"
    ))
    .bind(carrier_id)
    .bind(period.year)
    .bind(period.month as i32)
    .fetch_all(&mut *conn)
    .await?;
    attach_items(conn, rows).await
}

async fn replace_items(
    conn: &mut PgConnection,
    invoice_id: i64,
    items: &[InvoiceItem],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM invoice_item WHERE invoice_id = $1")
        .bind(invoice_id)
        .execute(&mut *conn)
        .await?;
    if items.is_empty() {
        return Ok(());
    }

    let mut query_builder = sqlx::QueryBuilder::new(
        "INSERT INTO invoice_item (
            invoice_id, item_type, amount_without_vat, vat_amount, amount_with_vat
        ) ",
    );
    query_builder.push_values(items, |mut b, item| {
        b.push_bind(invoice_id)
            .push_bind(&item.item_type)
            .push_bind(item.amount_without_vat.clone())
            .push_bind(item.vat_amount.clone())
            .push_bind(item.amount_with_vat.clone());
    });
    query_builder.build().execute(&mut *conn).await?;
    Ok(())
}

#[async_trait]
impl CostRepository for PgRepository {
    async fn find_price_configs(
        &self,
        carrier_id: i64,
        service_type: &str,
        active_only: bool,
    ) -> Result<Vec<PriceConfig>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_price_configs(&mut conn, carrier_id, service_type, active_only).await
    }

    async fn find_route_plans(
        &self,
        carrier_id: i64,
        range: DateRange,
    ) -> Result<Vec<RoutePlan>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_route_plans(&mut conn, carrier_id, range).await
    }

    async fn find_proof(
        &self,
        carrier_id: i64,
        period: Period,
    ) -> Result<Option<Proof>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_proof(&mut conn, carrier_id, period).await
    }

    async fn find_invoices(
        &self,
        carrier_id: i64,
        period: Period,
    ) -> Result<Vec<Invoice>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_invoices(&mut conn, carrier_id, period).await
    }

    async fn find_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoice WHERE id = $1"
        ))
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(attach_items(&mut conn, rows).await?.into_iter().next())
    }

    async fn find_invoice_by_number(
        &self,
        carrier_id: i64,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoice WHERE carrier_id = $1 AND invoice_number = $2"
        ))
        .bind(carrier_id)
        .bind(invoice_number)
        .fetch_all(&mut *conn)
        .await?;
        Ok(attach_items(&mut conn, rows).await?.into_iter().next())
    }

    async fn insert_invoice(&self, invoice: &NewInvoice) -> Result<i64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO invoice (
                carrier_id, invoice_number, variable_symbol, period_year, period_month,
                issue_date, due_date, tax_date,
                total_without_vat, vat_amount, total_with_vat,
                status, source_file, raw_text
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (carrier_id, invoice_number) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(invoice.carrier_id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.variable_symbol)
        .bind(invoice.period.map(|p| p.year))
        .bind(invoice.period.map(|p| p.month as i32))
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.tax_date)
        .bind(invoice.total_without_vat.clone())
        .bind(invoice.vat_amount.clone())
        .bind(invoice.total_with_vat.clone())
        .bind(invoice.status.as_str())
        .bind(&invoice.source_file)
        .bind(&invoice.raw_text)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = inserted else {
            return Err(RepositoryError::DuplicateInvoice {
                carrier_id: invoice.carrier_id,
                invoice_number: invoice.invoice_number.clone(),
            });
        };
        replace_items(&mut tx, id, &invoice.items).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE invoice SET
                proof_id = $2, variable_symbol = $3, period_year = $4, period_month = $5,
                issue_date = $6, due_date = $7, tax_date = $8,
                total_without_vat = $9, vat_amount = $10, total_with_vat = $11,
                status = $12, source_file = $13, raw_text = $14
            WHERE id = $1
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.proof_id)
        .bind(&invoice.variable_symbol)
        .bind(invoice.period.map(|p| p.year))
        .bind(invoice.period.map(|p| p.month as i32))
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.tax_date)
        .bind(invoice.total_without_vat.clone())
        .bind(invoice.vat_amount.clone())
        .bind(invoice.total_with_vat.clone())
        .bind(invoice.status.as_str())
        .bind(&invoice.source_file)
        .bind(&invoice.raw_text)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("invoice {}", invoice.id)));
        }
        replace_items(&mut tx, invoice.id, &invoice.items).await?;
        tx.commit().await?;
        Ok(())
    }

    /// 同一 REPEATABLE READ 只读事务内读取, 避免读到改了一半的费率表
    async fn load_snapshot(
        &self,
        carrier_id: i64,
        service_type: &str,
        period: Period,
    ) -> Result<PeriodSnapshot, RepositoryError> {
        let start_time = std::time::Instant::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let price_configs = fetch_price_configs(&mut tx, carrier_id, service_type, true).await?;
        let route_plans = fetch_route_plans(&mut tx, carrier_id, period.range()).await?;
        let proof = fetch_proof(&mut tx, carrier_id, period).await?;
        let invoices = fetch_invoices(&mut tx, carrier_id, period).await?;
        tx.commit().await?;

        tracing::debug!(
            "快照读取完成 carrier={} period={}: {} 价格配置, {} 计划, {} 发票, 耗时: {:?}",
            carrier_id,
            period,
            price_configs.len(),
            route_plans.len(),
            invoices.len(),
            start_time.elapsed()
        );

        Ok(PeriodSnapshot {
            price_configs,
            route_plans,
            proof,
            invoices,
        })
    }
}
