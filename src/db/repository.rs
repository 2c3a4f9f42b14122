use async_trait::async_trait;
use serde::Serialize;

use crate::error::RepositoryError;
use crate::models::{DateRange, Invoice, NewInvoice, Period, PriceConfig, Proof, RoutePlan};

/// 单次计费/对账读取的一致性快照
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeriodSnapshot {
    pub price_configs: Vec<PriceConfig>,
    pub route_plans: Vec<RoutePlan>,
    pub proof: Option<Proof>,
    pub invoices: Vec<Invoice>,
}

/// 成本数据仓储接口; 核心逻辑只通过它读取存储数据
#[async_trait]
pub trait CostRepository: Send + Sync {
    async fn find_price_configs(
        &self,
        carrier_id: i64,
        service_type: &str,
        active_only: bool,
    ) -> Result<Vec<PriceConfig>, RepositoryError>;

    /// 有效期与 range 相交的计划
    async fn find_route_plans(
        &self,
        carrier_id: i64,
        range: DateRange,
    ) -> Result<Vec<RoutePlan>, RepositoryError>;

    async fn find_proof(
        &self,
        carrier_id: i64,
        period: Period,
    ) -> Result<Option<Proof>, RepositoryError>;

    async fn find_invoices(
        &self,
        carrier_id: i64,
        period: Period,
    ) -> Result<Vec<Invoice>, RepositoryError>;

    async fn find_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, RepositoryError>;

    async fn find_invoice_by_number(
        &self,
        carrier_id: i64,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, RepositoryError>;

    async fn insert_invoice(&self, invoice: &NewInvoice) -> Result<i64, RepositoryError>;

    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), RepositoryError>;

    /// 默认实现逐个查询; 支持事务的实现应在同一读视图内完成
    async fn load_snapshot(
        &self,
        carrier_id: i64,
        service_type: &str,
        period: Period,
    ) -> Result<PeriodSnapshot, RepositoryError> {
        Ok(PeriodSnapshot {
            price_configs: self.find_price_configs(carrier_id, service_type, true).await?,
            route_plans: self.find_route_plans(carrier_id, period.range()).await?,
            proof: self.find_proof(carrier_id, period).await?,
            invoices: self.find_invoices(carrier_id, period).await?,
        })
    }
}
