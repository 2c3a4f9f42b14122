use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 账期 (月/年)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// 月份不在 1..=12 时返回 None
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// 解析 "MM/YYYY"
    pub fn parse(s: &str) -> Option<Self> {
        let (mm, yyyy) = s.trim().split_once('/')?;
        if mm.len() != 2 || yyyy.len() != 4 {
            return None;
        }
        Self::new(yyyy.parse().ok()?, mm.parse().ok()?)
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.first_day(),
            end: self.last_day(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

/// 闭区间日期范围 [start, end]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn day_count(&self) -> i64 {
        if self.is_valid() {
            (self.end - self.start).num_days() + 1
        } else {
            0
        }
    }
}

/// 有效期窗口: valid_to 为 None 表示无限期
pub fn window_contains(valid_from: NaiveDate, valid_to: Option<NaiveDate>, date: NaiveDate) -> bool {
    valid_from <= date && valid_to.map_or(true, |to| to >= date)
}

/// 有效期窗口与区间的交集
pub fn window_intersection(
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
    range: &DateRange,
) -> Option<DateRange> {
    let start = valid_from.max(range.start);
    let end = valid_to.map_or(range.end, |to| to.min(range.end));
    (start <= end).then_some(DateRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn period_bounds_handle_leap_years_and_december() {
        let feb = Period::new(2024, 2).unwrap();
        assert_eq!(feb.last_day(), d(2024, 2, 29));
        assert_eq!(feb.range().day_count(), 29);

        let dec = Period::new(2025, 12).unwrap();
        assert_eq!(dec.last_day(), d(2025, 12, 31));
        assert_eq!(dec.to_string(), "12/2025");
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert_eq!(Period::parse("10/2025"), Period::new(2025, 10));
        assert_eq!(Period::parse("13/2025"), None);
        assert_eq!(Period::parse("1/2025"), None);
        assert_eq!(Period::parse("garbage"), None);
    }

    #[test]
    fn open_window_intersection() {
        let range = Period::new(2025, 7).unwrap().range();
        let cut = window_intersection(d(2025, 7, 10), None, &range).unwrap();
        assert_eq!(cut.start, d(2025, 7, 10));
        assert_eq!(cut.end, d(2025, 7, 31));
        assert!(window_intersection(d(2025, 8, 1), None, &range).is_none());
        assert!(window_contains(d(2025, 1, 1), Some(d(2025, 7, 10)), d(2025, 7, 10)));
    }
}
