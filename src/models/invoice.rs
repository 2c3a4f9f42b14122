use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Parsed,
    Matched,
    Disputed,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Parsed => "parsed",
            Self::Matched => "matched",
            Self::Disputed => "disputed",
        }
    }

    /// 允许的状态迁移
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Pending, Parsed)
                | (Pending, Matched)
                | (Pending, Disputed)
                | (Parsed, Matched)
                | (Parsed, Disputed)
                | (Matched, Disputed)
                | (Disputed, Matched)
        )
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "parsed" => Ok(Self::Parsed),
            "matched" => Ok(Self::Matched),
            "disputed" => Ok(Self::Disputed),
            other => Err(format!("unknown invoice status '{other}'")),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 发票 (carrier_id + invoice_number 唯一)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub carrier_id: i64,
    pub proof_id: Option<i64>,
    pub invoice_number: String,
    pub variable_symbol: Option<String>,
    pub period: Option<Period>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_date: Option<NaiveDate>,
    pub total_without_vat: Option<BigDecimal>,
    pub vat_amount: Option<BigDecimal>,
    pub total_with_vat: Option<BigDecimal>,
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItem>,
    pub source_file: Option<String>,
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub item_type: String,
    pub amount_without_vat: Option<BigDecimal>,
    pub vat_amount: Option<BigDecimal>,
    pub amount_with_vat: Option<BigDecimal>,
}

/// 待插入的新发票 (id 由仓储分配)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    pub carrier_id: i64,
    pub invoice_number: String,
    pub variable_symbol: Option<String>,
    pub period: Option<Period>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_date: Option<NaiveDate>,
    pub total_without_vat: Option<BigDecimal>,
    pub vat_amount: Option<BigDecimal>,
    pub total_with_vat: Option<BigDecimal>,
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItem>,
    pub source_file: Option<String>,
    pub raw_text: Option<String>,
}

impl NewInvoice {
    pub fn with_id(self, id: i64) -> Invoice {
        Invoice {
            id,
            carrier_id: self.carrier_id,
            proof_id: None,
            invoice_number: self.invoice_number,
            variable_symbol: self.variable_symbol,
            period: self.period,
            issue_date: self.issue_date,
            due_date: self.due_date,
            tax_date: self.tax_date,
            total_without_vat: self.total_without_vat,
            vat_amount: self.vat_amount,
            total_with_vat: self.total_with_vat,
            status: self.status,
            items: self.items,
            source_file: self.source_file,
            raw_text: self.raw_text,
        }
    }
}

/// 金额来源档位 (数字越大可信度越低)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSource {
    /// 1: 服务明细行
    LineItem,
    /// 2: 明细合计行
    ItemsSum,
    /// 3: 增值税汇总行
    VatRecap,
    /// 4: 由应付总额按税率反推
    DerivedFromTotal,
}

impl AmountSource {
    pub fn tier(&self) -> u8 {
        match self {
            Self::LineItem => 1,
            Self::ItemsSum => 2,
            Self::VatRecap => 3,
            Self::DerivedFromTotal => 4,
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, Self::DerivedFromTotal)
    }
}

/// 从发票文本抽取的事实, 所有字段可缺失
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    pub invoice_number: Option<String>,
    pub variable_symbol: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_date: Option<NaiveDate>,
    pub item_type: Option<String>,
    pub period: Option<String>,
    pub total_without_vat: Option<BigDecimal>,
    pub vat_amount: Option<BigDecimal>,
    pub total_with_vat: Option<BigDecimal>,
    pub amount_source: Option<AmountSource>,
    pub supplier_ico: Option<String>,
    pub supplier_dic: Option<String>,
    pub customer_ico: Option<String>,
    pub customer_dic: Option<String>,
    pub truncated: bool,
    pub raw_text: String,
}

impl ExtractedInvoice {
    pub fn has_amounts(&self) -> bool {
        self.total_without_vat.is_some()
            || self.vat_amount.is_some()
            || self.total_with_vat.is_some()
    }

    pub fn is_derived(&self) -> bool {
        self.amount_source.map_or(false, |s| s.is_derived())
    }
}
