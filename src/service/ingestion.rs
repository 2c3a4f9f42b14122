use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::CostRepository;
use crate::error::{EngineError, RepositoryError, Result};
use crate::models::{
    ExtractedInvoice, Invoice, InvoiceItem, InvoiceStatus, NewInvoice, Period,
};
use crate::service::extractor::DocumentExtractor;

/// 上传的发票文本 (PDF 解析在外部完成)
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedDocument {
    pub filename: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Created {
        invoice_id: i64,
        status: InvoiceStatus,
    },
    Updated {
        invoice_id: i64,
    },
    SkippedDuplicate {
        invoice_id: i64,
        invoice_number: String,
    },
    Failed {
        reason: String,
    },
}

/// 单个文件的处理结果
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    #[serde(flatten)]
    pub outcome: IngestOutcome,
}

/// 发票导入服务
pub struct IngestionService {
    repo: Arc<dyn CostRepository>,
    extractor: DocumentExtractor,
}

impl IngestionService {
    pub fn new(repo: Arc<dyn CostRepository>, extractor: DocumentExtractor) -> Self {
        Self { repo, extractor }
    }

    /// 逐个处理, 单个文件失败不影响其余文件
    pub async fn ingest_batch(
        &self,
        carrier_id: i64,
        documents: Vec<UploadedDocument>,
    ) -> Vec<FileOutcome> {
        let total = documents.len();
        let mut outcomes = Vec::with_capacity(total);

        for (idx, doc) in documents.into_iter().enumerate() {
            let outcome = match self.ingest_one(carrier_id, &doc).await {
                Ok(outcome) => outcome,
                Err(e) => IngestOutcome::Failed {
                    reason: e.to_string(),
                },
            };
            if let IngestOutcome::Failed { reason } = &outcome {
                tracing::warn!("发票 {} 导入失败: {}", doc.filename, reason);
            }
            tracing::info!(
                "导入发票 {}/{} {}: {:?}",
                idx + 1,
                total,
                doc.filename,
                outcome
            );
            outcomes.push(FileOutcome {
                filename: doc.filename,
                outcome,
            });
        }

        outcomes
    }

    pub async fn ingest_one(
        &self,
        carrier_id: i64,
        doc: &UploadedDocument,
    ) -> Result<IngestOutcome> {
        let extracted = self
            .extractor
            .extract_with_hint(&doc.text, Some(&doc.filename));
        let Some(number) = extracted.invoice_number.clone() else {
            return Ok(IngestOutcome::Failed {
                reason: "no invoice number found in text or filename".to_string(),
            });
        };

        if let Some(existing) = self.repo.find_invoice_by_number(carrier_id, &number).await? {
            return self.merge_existing(existing, &extracted, &doc.filename).await;
        }

        let invoice = new_invoice(carrier_id, number.clone(), &extracted, &doc.filename);
        let status = invoice.status;
        match self.repo.insert_invoice(&invoice).await {
            Ok(invoice_id) => Ok(IngestOutcome::Created { invoice_id, status }),
            // 并发导入同一发票: 按已存在的行合并
            Err(RepositoryError::DuplicateInvoice { .. }) => {
                let existing = self
                    .repo
                    .find_invoice_by_number(carrier_id, &number)
                    .await?
                    .ok_or_else(|| RepositoryError::NotFound(format!("invoice {number}")))?;
                tracing::debug!("发票 {} 已被并发写入, 转为合并", number);
                self.merge_existing(existing, &extracted, &doc.filename).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn merge_existing(
        &self,
        existing: Invoice,
        extracted: &ExtractedInvoice,
        filename: &str,
    ) -> Result<IngestOutcome> {
        let invoice_id = existing.id;
        let invoice_number = existing.invoice_number.clone();
        match merge_invoice(existing, extracted, filename) {
            Some(merged) => {
                self.repo.update_invoice(&merged).await?;
                Ok(IngestOutcome::Updated { invoice_id })
            }
            None => Ok(IngestOutcome::SkippedDuplicate {
                invoice_id,
                invoice_number,
            }),
        }
    }

    /// 关联 Proof 并置为 matched
    pub async fn link_invoice_to_proof(&self, invoice_id: i64, proof_id: i64) -> Result<Invoice> {
        let mut invoice = self.load(invoice_id).await?;
        if invoice.status == InvoiceStatus::Matched && invoice.proof_id == Some(proof_id) {
            return Ok(invoice);
        }
        transition(&mut invoice, InvoiceStatus::Matched)?;
        invoice.proof_id = Some(proof_id);
        self.repo.update_invoice(&invoice).await?;
        tracing::info!("发票 {} 已关联 proof {}", invoice_id, proof_id);
        Ok(invoice)
    }

    pub async fn mark_disputed(&self, invoice_id: i64) -> Result<Invoice> {
        let mut invoice = self.load(invoice_id).await?;
        if invoice.status == InvoiceStatus::Disputed {
            return Ok(invoice);
        }
        transition(&mut invoice, InvoiceStatus::Disputed)?;
        self.repo.update_invoice(&invoice).await?;
        tracing::info!("发票 {} 标记为 disputed", invoice_id);
        Ok(invoice)
    }

    async fn load(&self, invoice_id: i64) -> Result<Invoice> {
        self.repo
            .find_invoice(invoice_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("invoice {invoice_id}")).into())
    }
}

fn transition(invoice: &mut Invoice, next: InvoiceStatus) -> Result<()> {
    if !invoice.status.can_transition_to(next) {
        return Err(EngineError::InvalidTransition {
            invoice_id: invoice.id,
            from: invoice.status.to_string(),
            to: next.to_string(),
        });
    }
    invoice.status = next;
    Ok(())
}

/// 三项金额齐全且不是反推得到的才算解析完成
fn extracted_status(extracted: &ExtractedInvoice) -> InvoiceStatus {
    let complete = extracted.total_without_vat.is_some()
        && extracted.vat_amount.is_some()
        && extracted.total_with_vat.is_some();
    if complete && !extracted.is_derived() {
        InvoiceStatus::Parsed
    } else {
        InvoiceStatus::Pending
    }
}

fn extracted_item(extracted: &ExtractedInvoice) -> Option<InvoiceItem> {
    let item_type = extracted.item_type.clone()?;
    Some(InvoiceItem {
        item_type,
        amount_without_vat: extracted.total_without_vat.clone(),
        vat_amount: extracted.vat_amount.clone(),
        amount_with_vat: extracted.total_with_vat.clone(),
    })
}

/// 账期: 文本中的 MM/YYYY, 否则取 DUZP 所在月份, 再否则取开票日期所在月份
pub fn invoice_period(extracted: &ExtractedInvoice) -> Option<Period> {
    extracted
        .period
        .as_deref()
        .and_then(Period::parse)
        .or_else(|| extracted.tax_date.map(Period::of))
        .or_else(|| extracted.issue_date.map(Period::of))
}

fn new_invoice(
    carrier_id: i64,
    invoice_number: String,
    extracted: &ExtractedInvoice,
    filename: &str,
) -> NewInvoice {
    NewInvoice {
        carrier_id,
        invoice_number,
        variable_symbol: extracted.variable_symbol.clone(),
        period: invoice_period(extracted),
        issue_date: extracted.issue_date,
        due_date: extracted.due_date,
        tax_date: extracted.tax_date,
        total_without_vat: extracted.total_without_vat.clone(),
        vat_amount: extracted.vat_amount.clone(),
        total_with_vat: extracted.total_with_vat.clone(),
        status: extracted_status(extracted),
        items: extracted_item(extracted).into_iter().collect(),
        source_file: Some(filename.to_string()),
        raw_text: Some(extracted.raw_text.clone()),
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) -> bool {
    match (slot.is_none(), value) {
        (true, Some(v)) => {
            *slot = Some(v.clone());
            true
        }
        _ => false,
    }
}

/// 重复发票合并: 只补齐原来为空的字段, 已有值 (含人工修正) 保持不变;
/// 状态只会从 pending 升级为 parsed, 不会降级。无变化时返回 None
pub fn merge_invoice(
    mut invoice: Invoice,
    extracted: &ExtractedInvoice,
    filename: &str,
) -> Option<Invoice> {
    let mut changed = false;
    changed |= fill(&mut invoice.variable_symbol, &extracted.variable_symbol);
    changed |= fill(&mut invoice.period, &invoice_period(extracted));
    changed |= fill(&mut invoice.issue_date, &extracted.issue_date);
    changed |= fill(&mut invoice.due_date, &extracted.due_date);
    changed |= fill(&mut invoice.tax_date, &extracted.tax_date);

    let mut amounts_filled = false;
    amounts_filled |= fill(&mut invoice.total_without_vat, &extracted.total_without_vat);
    amounts_filled |= fill(&mut invoice.vat_amount, &extracted.vat_amount);
    amounts_filled |= fill(&mut invoice.total_with_vat, &extracted.total_with_vat);
    changed |= amounts_filled;

    if invoice.items.is_empty() {
        if let Some(item) = extracted_item(extracted) {
            invoice.items.push(item);
            changed = true;
        }
    }

    if amounts_filled
        && invoice.status == InvoiceStatus::Pending
        && extracted_status(extracted) == InvoiceStatus::Parsed
        && invoice.total_without_vat.is_some()
        && invoice.vat_amount.is_some()
        && invoice.total_with_vat.is_some()
    {
        invoice.status = InvoiceStatus::Parsed;
    }

    if changed {
        fill(&mut invoice.source_file, &Some(filename.to_string()));
        fill(&mut invoice.raw_text, &Some(extracted.raw_text.clone()));
    }

    changed.then_some(invoice)
}
