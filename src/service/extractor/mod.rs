//! 发票文本抽取
//!
//! 每组字段 (发票号、日期、服务期间、金额、税号) 各自有一条按优先级排列的策略链,
//! 链中第一个返回值的策略胜出, 各组之间互不影响。任何输入都不会 panic,
//! 无法识别的字段保持 None。

pub mod amounts;
pub mod fields;

use bigdecimal::BigDecimal;

use crate::config::PolicyConfig;
use crate::models::ExtractedInvoice;
use amounts::{extract_amounts, AmountContext};
use fields::{first_match, FieldStrategy, INVOICE_NUMBER_CHAIN};

pub use amounts::{format_amount, parse_amount};

const PERIOD_CHAIN: [FieldStrategy<String>; 2] = [service_period_only, fields::bare_period];

fn service_period_only(text: &str) -> Option<String> {
    fields::service_and_period(text).map(|(_, period)| period)
}

/// 发票文本抽取器
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    vat_rate: BigDecimal,
    max_text_bytes: usize,
}

impl DocumentExtractor {
    pub fn new(vat_rate: BigDecimal, max_text_bytes: usize) -> Self {
        Self {
            vat_rate,
            max_text_bytes,
        }
    }

    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self::new(policy.vat_rate.clone(), policy.max_text_bytes)
    }

    pub fn extract(&self, raw_text: &str) -> ExtractedInvoice {
        let (text, truncated) = truncate_at_boundary(raw_text, self.max_text_bytes);
        if truncated {
            tracing::warn!(
                "发票文本过大 ({} bytes), 仅处理前 {} bytes",
                raw_text.len(),
                text.len()
            );
        }

        let service = fields::service_and_period(text);
        let item_type = service.as_ref().map(|(s, _)| s.clone());
        let period = first_match(text, &PERIOD_CHAIN);

        let ctx = AmountContext {
            item_type: item_type.as_deref(),
            period: period.as_deref(),
            vat_rate: &self.vat_rate,
        };
        let amounts = extract_amounts(text, &ctx);
        let (amount_source, facts) = match amounts {
            Some((source, facts)) => (Some(source), Some(facts)),
            None => (None, None),
        };

        let (supplier_ico, customer_ico) = fields::registration_numbers(text);
        let (supplier_dic, customer_dic) = fields::vat_numbers(text);

        let extracted = ExtractedInvoice {
            invoice_number: first_match(text, &INVOICE_NUMBER_CHAIN),
            variable_symbol: fields::variable_symbol(text),
            issue_date: fields::issue_date(text),
            due_date: fields::due_date(text),
            tax_date: fields::tax_date(text),
            item_type,
            period,
            total_without_vat: facts.as_ref().and_then(|f| f.net.clone()),
            vat_amount: facts.as_ref().and_then(|f| f.vat.clone()),
            total_with_vat: facts.and_then(|f| f.gross),
            amount_source,
            supplier_ico,
            supplier_dic,
            customer_ico,
            customer_dic,
            truncated,
            raw_text: text.to_string(),
        };

        tracing::debug!(
            "抽取完成: number={:?} period={:?} amounts_tier={:?}",
            extracted.invoice_number,
            extracted.period,
            extracted.amount_source.map(|s| s.tier())
        );
        extracted
    }

    /// 文本中找不到发票号时, 使用文件名中的 8 位数字
    pub fn extract_with_hint(&self, raw_text: &str, filename: Option<&str>) -> ExtractedInvoice {
        let mut extracted = self.extract(raw_text);
        if extracted.invoice_number.is_none() {
            extracted.invoice_number = filename.and_then(fields::number_from_filename);
        }
        extracted
    }
}

fn truncate_at_boundary(text: &str, max_bytes: usize) -> (&str, bool) {
    if text.len() <= max_bytes {
        return (text, false);
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}
