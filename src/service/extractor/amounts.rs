//! 金额识别: 本地格式数字 + 四级回退策略

use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

use crate::models::AmountSource;

/// 本地格式金额: 空格/不换行空格分隔千位, 逗号小数
pub const AMOUNT: &str = r"(?:\d{1,3}(?:[ \x{00A0}\x{202F}]\d{3})+|\d+),\d{2}";

static ITEMS_SUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)Součet\s+položek\s*:?\s*(?P<net>{AMOUNT})\s+(?P<vat>{AMOUNT})\s+(?P<gross>{AMOUNT})"
    ))
    .unwrap()
});

static RECAP_ANCHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)rekapitulace").unwrap());

static RECAP_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?P<rate>\d{{1,2}})\s*%\s+(?P<net>{AMOUNT})\s+(?P<vat>{AMOUNT})\s+(?P<gross>{AMOUNT})"
    ))
    .unwrap()
});

static TOTAL_TO_PAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)celkem\s+k\s+úhradě\s*:?\s*(?P<gross>{AMOUNT})")).unwrap()
});

/// "3 688 000,00" -> 3688000.00; 无法解析返回 None (不会返回 0)
pub fn parse_amount(token: &str) -> Option<BigDecimal> {
    let cleaned: String = token
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{00a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let digits = cleaned.strip_prefix('-').unwrap_or(&cleaned);
    let dots = digits.chars().filter(|c| *c == '.').count();
    if digits.is_empty()
        || dots > 1
        || digits.starts_with('.')
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        return None;
    }
    BigDecimal::from_str(&cleaned).ok()
}

/// 3688000.5 -> "3 688 000,50"
pub fn format_amount(value: &BigDecimal) -> String {
    let s = value.round(2).with_scale(2).to_string();
    let (sign, unsigned) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*c);
    }

    format!("{sign}{grouped},{frac_part}")
}

/// 一组金额 (净额/税额/含税)
#[derive(Debug, Clone, PartialEq)]
pub struct AmountFacts {
    pub net: Option<BigDecimal>,
    pub vat: Option<BigDecimal>,
    pub gross: Option<BigDecimal>,
}

/// 策略上下文: 识别到的服务标签与已知税率
#[derive(Debug, Clone)]
pub struct AmountContext<'a> {
    pub item_type: Option<&'a str>,
    pub period: Option<&'a str>,
    pub vat_rate: &'a BigDecimal,
}

pub type AmountStrategy = fn(&str, &AmountContext<'_>) -> Option<AmountFacts>;

/// 按优先级排列的金额策略
pub const AMOUNT_CHAIN: [(AmountSource, AmountStrategy); 4] = [
    (AmountSource::LineItem, from_line_item),
    (AmountSource::ItemsSum, from_items_sum),
    (AmountSource::VatRecap, from_vat_recap),
    (AmountSource::DerivedFromTotal, derive_from_total),
];

/// 依次尝试, 第一个命中的策略决定金额来源
pub fn extract_amounts(text: &str, ctx: &AmountContext<'_>) -> Option<(AmountSource, AmountFacts)> {
    AMOUNT_CHAIN
        .iter()
        .find_map(|(source, strategy)| strategy(text, ctx).map(|facts| (*source, facts)))
}

fn complete(net: Option<BigDecimal>, vat: Option<BigDecimal>, gross: Option<BigDecimal>) -> Option<AmountFacts> {
    Some(AmountFacts {
        net: Some(net?),
        vat: Some(vat?),
        gross: Some(gross?),
    })
}

/// 1: 服务明细行 "<SERVICE> - MM/YYYY qty unit net rate% vat gross"
pub fn from_line_item(text: &str, ctx: &AmountContext<'_>) -> Option<AmountFacts> {
    let (item_type, period) = (ctx.item_type?, ctx.period?);
    let pattern = format!(
        r"{}\s*-\s*{}\s+\d+(?:,\d+)?\s+(?P<unit>{AMOUNT})\s+(?P<net>{AMOUNT})\s+\d{{1,2}}\s*%\s+(?P<vat>{AMOUNT})\s+(?P<gross>{AMOUNT})",
        regex::escape(item_type),
        regex::escape(period)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    complete(
        parse_amount(&caps["net"]),
        parse_amount(&caps["vat"]),
        parse_amount(&caps["gross"]),
    )
}

/// 2: "Součet položek net vat gross"
pub fn from_items_sum(text: &str, _ctx: &AmountContext<'_>) -> Option<AmountFacts> {
    let caps = ITEMS_SUM.captures(text)?;
    complete(
        parse_amount(&caps["net"]),
        parse_amount(&caps["vat"]),
        parse_amount(&caps["gross"]),
    )
}

/// 3: 增值税汇总中与已知税率一致的行
pub fn from_vat_recap(text: &str, ctx: &AmountContext<'_>) -> Option<AmountFacts> {
    let anchor = RECAP_ANCHOR.find(text)?;
    let expected_rate = ctx.vat_rate.clone() * BigDecimal::from(100);
    RECAP_ROW
        .captures_iter(&text[anchor.end()..])
        .filter(|caps| BigDecimal::from_str(&caps["rate"]).ok().as_ref() == Some(&expected_rate))
        .find_map(|caps| {
            complete(
                parse_amount(&caps["net"]),
                parse_amount(&caps["vat"]),
                parse_amount(&caps["gross"]),
            )
        })
}

/// 4: 只有应付总额时按税率反推 net = round(gross / (1 + rate), 2)
pub fn derive_from_total(text: &str, ctx: &AmountContext<'_>) -> Option<AmountFacts> {
    let caps = TOTAL_TO_PAY.captures(text)?;
    let gross = parse_amount(&caps["gross"])?;
    let divisor = BigDecimal::from(1) + ctx.vat_rate;
    let net = (gross.clone() / divisor).round(2);
    let vat = &gross - &net;
    complete(Some(net), Some(vat), Some(gross))
}
