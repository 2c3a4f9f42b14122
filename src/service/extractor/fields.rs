//! 发票号/日期/服务期间/税号 识别策略

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Period;

/// 单字段策略: 文本 -> 值
pub type FieldStrategy<T> = fn(&str) -> Option<T>;

/// 依次尝试, 第一个非空结果胜出
pub fn first_match<T>(text: &str, chain: &[FieldStrategy<T>]) -> Option<T> {
    chain.iter().find_map(|strategy| strategy(text))
}

static NUMBER_SHORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"č\.\s*(\d{8})\b").unwrap());

static NUMBER_AFTER_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)FAKTURA.{0,120}?č(?:íslo)?\.?\s*:?\s*(\d{8})\b").unwrap()
});

static VARIABLE_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Variabilní\s+symbol\s*:?\s*(\d+)").unwrap());

static FILENAME_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\D)(\d{8})(?:\D|$)").unwrap());

const DATE_TOKEN: &str = r"(\d{1,2}\.\s?\d{1,2}\.\s?\d{2,4}|\S+)";

static ISSUE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)Datum\s+vystavení\s*:?\s*{DATE_TOKEN}")).unwrap());

static DUE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)Datum\s+splatnosti\s*:?\s*{DATE_TOKEN}")).unwrap());

static TAX_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:Datum\s+zdanitelného\s+plnění|DUZP)\s*:?\s*{DATE_TOKEN}"
    ))
    .unwrap()
});

static SERVICE_PERIOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<service>\p{Lu}[\p{Lu}0-9 ]*?[\p{Lu}0-9])\s+-\s+(?P<period>\d{2}/\d{4})")
        .unwrap()
});

static BARE_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2}/\d{4})\b").unwrap());

static ICO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^|[^\p{L}])IČO?\s*:?\s*(\d{8})\b").unwrap());

static DIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"DIČ\s*:?\s*([A-Z]{2}\d{8,10})\b").unwrap());

/// 发票号策略链
pub const INVOICE_NUMBER_CHAIN: [FieldStrategy<String>; 3] =
    [number_short_form, number_after_title, variable_symbol];

pub fn number_short_form(text: &str) -> Option<String> {
    NUMBER_SHORT.captures(text).map(|c| c[1].to_string())
}

pub fn number_after_title(text: &str) -> Option<String> {
    NUMBER_AFTER_TITLE.captures(text).map(|c| c[1].to_string())
}

/// 同时作为标识与发票号兜底
pub fn variable_symbol(text: &str) -> Option<String> {
    VARIABLE_SYMBOL.captures(text).map(|c| c[1].to_string())
}

/// 文件名中的 8 位数字 (最后兜底)
pub fn number_from_filename(filename: &str) -> Option<String> {
    FILENAME_NUMBER.captures(filename).map(|c| c[1].to_string())
}

/// d.m.yyyy; 形状不对或日期不存在时返回 None
pub fn parse_local_date(token: &str) -> Option<NaiveDate> {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parts = compact.trim_end_matches('.').split('.');
    let day: u32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let year_part = parts.next()?;
    if parts.next().is_some() || year_part.len() != 4 {
        return None;
    }
    let year: i32 = year_part.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn labelled_date(re: &Regex, text: &str) -> Option<NaiveDate> {
    re.captures(text).and_then(|c| parse_local_date(&c[1]))
}

pub fn issue_date(text: &str) -> Option<NaiveDate> {
    labelled_date(&ISSUE_DATE, text)
}

pub fn due_date(text: &str) -> Option<NaiveDate> {
    labelled_date(&DUE_DATE, text)
}

pub fn tax_date(text: &str) -> Option<NaiveDate> {
    labelled_date(&TAX_DATE, text)
}

/// "<SERVICE> - MM/YYYY" -> (服务, 期间)
pub fn service_and_period(text: &str) -> Option<(String, String)> {
    SERVICE_PERIOD.captures_iter(text).find_map(|c| {
        let period = &c["period"];
        Period::parse(period).map(|_| (c["service"].trim().to_string(), period.to_string()))
    })
}

/// 任意 "MM/YYYY" 作为期间兜底
pub fn bare_period(text: &str) -> Option<String> {
    BARE_PERIOD
        .captures_iter(text)
        .find_map(|c| Period::parse(&c[1]).map(|_| c[1].to_string()))
}

/// 依出现顺序: 第一个为供应商, 第二个为客户
pub fn registration_numbers(text: &str) -> (Option<String>, Option<String>) {
    let mut found = ICO.captures_iter(text).map(|c| c[1].to_string());
    (found.next(), found.next())
}

pub fn vat_numbers(text: &str) -> (Option<String>, Option<String>) {
    let mut found = DIC.captures_iter(text).map(|c| c[1].to_string());
    (found.next(), found.next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_falls_back_in_order() {
        assert_eq!(
            first_match("FAKTURA č. 25100123", &INVOICE_NUMBER_CHAIN),
            Some("25100123".to_string())
        );
        assert_eq!(
            first_match("FAKTURA - daňový doklad\nčíslo: 25100124", &INVOICE_NUMBER_CHAIN),
            Some("25100124".to_string())
        );
        assert_eq!(
            first_match("Variabilní symbol: 2510", &INVOICE_NUMBER_CHAIN),
            Some("2510".to_string())
        );
        assert_eq!(first_match("nothing", &INVOICE_NUMBER_CHAIN), None);
        assert_eq!(number_from_filename("faktura_25100125.pdf"), Some("25100125".to_string()));
        assert_eq!(number_from_filename("scan-123456789.pdf"), None);
    }

    #[test]
    fn malformed_date_only_nulls_its_own_field() {
        let text = "Datum vystavení: 31.02.2025\nDatum splatnosti: 14. 11. 2025\nDUZP: 31.10.2025";
        assert_eq!(issue_date(text), None);
        assert_eq!(due_date(text), NaiveDate::from_ymd_opt(2025, 11, 14));
        assert_eq!(tax_date(text), NaiveDate::from_ymd_opt(2025, 10, 31));
        assert_eq!(parse_local_date("2025-10-31"), None);
        assert_eq!(parse_local_date("1.1.25"), None);
    }

    #[test]
    fn service_tag_and_bare_period() {
        let text = "ALZABOXY FIX - 10/2025 1 3 688 000,00";
        assert_eq!(
            service_and_period(text),
            Some(("ALZABOXY FIX".to_string(), "10/2025".to_string()))
        );
        assert_eq!(service_and_period("TRIDIRNA - 13/2025"), None);
        assert_eq!(bare_period("za období 09/2025"), Some("09/2025".to_string()));
        assert_eq!(bare_period("13/2025"), None);
    }

    #[test]
    fn tax_identifiers_are_best_effort() {
        let text = "IČ: 12345678 DIČ: CZ12345678\nIČO: 27082440 DIČ: CZ27082440";
        assert_eq!(
            registration_numbers(text),
            (Some("12345678".to_string()), Some("27082440".to_string()))
        );
        assert_eq!(
            vat_numbers(text),
            (Some("CZ12345678".to_string()), Some("CZ27082440".to_string()))
        );
        assert_eq!(registration_numbers("none"), (None, None));
    }
}
