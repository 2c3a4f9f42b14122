use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use super::repository::CostRepository;
use crate::error::RepositoryError;
use crate::models::{
    window_intersection, DateRange, Invoice, NewInvoice, Period, PriceConfig, Proof, RoutePlan,
};

/// 内存仓储 (测试与本地运行)
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    price_configs: RwLock<Vec<PriceConfig>>,
    route_plans: RwLock<Vec<RoutePlan>>,
    proofs: DashMap<(i64, Period), Proof>,
    invoices: DashMap<i64, Invoice>,
    /// (carrier_id, invoice_number) -> invoice id
    invoice_keys: DashMap<(i64, String), i64>,
    next_id: AtomicI64,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_price_config(&self, config: PriceConfig) {
        if let Ok(mut configs) = self.price_configs.write() {
            configs.push(config);
        }
    }

    pub fn add_route_plan(&self, plan: RoutePlan) {
        if let Ok(mut plans) = self.route_plans.write() {
            plans.push(plan);
        }
    }

    pub fn add_proof(&self, proof: Proof) {
        self.proofs.insert((proof.carrier_id, proof.period), proof);
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn poisoned() -> RepositoryError {
        RepositoryError::Corrupt("in-memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl CostRepository for InMemoryRepository {
    async fn find_price_configs(
        &self,
        carrier_id: i64,
        service_type: &str,
        active_only: bool,
    ) -> Result<Vec<PriceConfig>, RepositoryError> {
        let configs = self.price_configs.read().map_err(|_| Self::poisoned())?;
        Ok(configs
            .iter()
            .filter(|c| c.carrier_id == carrier_id && c.service_type == service_type)
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect())
    }

    async fn find_route_plans(
        &self,
        carrier_id: i64,
        range: DateRange,
    ) -> Result<Vec<RoutePlan>, RepositoryError> {
        let plans = self.route_plans.read().map_err(|_| Self::poisoned())?;
        Ok(plans
            .iter()
            .filter(|p| p.carrier_id == carrier_id)
            .filter(|p| window_intersection(p.valid_from, p.valid_to, &range).is_some())
            .cloned()
            .collect())
    }

    async fn find_proof(
        &self,
        carrier_id: i64,
        period: Period,
    ) -> Result<Option<Proof>, RepositoryError> {
        Ok(self.proofs.get(&(carrier_id, period)).map(|p| p.clone()))
    }

    async fn find_invoices(
        &self,
        carrier_id: i64,
        period: Period,
    ) -> Result<Vec<Invoice>, RepositoryError> {
        let mut found: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|i| i.carrier_id == carrier_id && i.period == Some(period))
            .map(|i| i.value().clone())
            .collect();
        found.sort_by_key(|i| i.id);
        Ok(found)
    }

    async fn find_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, RepositoryError> {
        Ok(self.invoices.get(&invoice_id).map(|i| i.clone()))
    }

    async fn find_invoice_by_number(
        &self,
        carrier_id: i64,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let id = self
            .invoice_keys
            .get(&(carrier_id, invoice_number.to_string()))
            .map(|id| *id);
        Ok(id.and_then(|id| self.invoices.get(&id).map(|i| i.clone())))
    }

    async fn insert_invoice(&self, invoice: &NewInvoice) -> Result<i64, RepositoryError> {
        let key = (invoice.carrier_id, invoice.invoice_number.clone());
        match self.invoice_keys.entry(key) {
            Entry::Occupied(_) => Err(RepositoryError::DuplicateInvoice {
                carrier_id: invoice.carrier_id,
                invoice_number: invoice.invoice_number.clone(),
            }),
            Entry::Vacant(slot) => {
                let id = self.allocate_id();
                self.invoices.insert(id, invoice.clone().with_id(id));
                slot.insert(id);
                Ok(id)
            }
        }
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), RepositoryError> {
        match self.invoices.get_mut(&invoice.id) {
            Some(mut existing) => {
                *existing = invoice.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("invoice {}", invoice.id))),
        }
    }
}
