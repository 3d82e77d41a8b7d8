//! Monthly grid.
//!
//! Every series handled by Albany lives on a `YYYY-MM` axis. [`Month`] is a
//! point on that axis and [`MonthRange`] an inclusive span of it.

use crate::error::{AnalyticsError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar month, formatted as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Create a month, validating that `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AnalyticsError::InvalidMonth(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// December of `year`, the anchor month for yearly observations.
    pub const fn december(year: i32) -> Self {
        Self { year, month: 12 }
    }

    /// Calendar year.
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Month of the year (1-12).
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Position on a continuous month axis.
    pub const fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    const fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    /// The following month.
    pub const fn succ(&self) -> Self {
        Self::from_ordinal(self.ordinal() + 1)
    }

    /// The preceding month.
    pub const fn pred(&self) -> Self {
        Self::from_ordinal(self.ordinal() - 1)
    }

    /// Number of months from `self` to `other` (negative when `other` is earlier).
    pub const fn months_until(&self, other: &Self) -> i64 {
        other.ordinal() - self.ordinal()
    }

    /// First calendar day of the month.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = AnalyticsError;

    /// Parses `YYYY-MM`; a full `YYYY-MM-DD` date is accepted and truncated.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::from_date(date));
        }

        let invalid = || AnalyticsError::InvalidMonth(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive range of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    start: Month,
    end: Month,
}

impl MonthRange {
    /// Create a range; `start` must not be after `end`.
    pub fn new(start: Month, end: Month) -> Result<Self> {
        if start > end {
            return Err(AnalyticsError::InvalidInput(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The months containing `start` and `end`, inclusive.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(Month::from_date(start), Month::from_date(end))
    }

    /// January of `first` through December of `last`, swapping the bounds
    /// when given out of order.
    pub const fn years(first: i32, last: i32) -> Self {
        let (first, last) = if first <= last { (first, last) } else { (last, first) };
        Self {
            start: Month { year: first, month: 1 },
            end: Month::december(last),
        }
    }

    /// First month of the range.
    pub const fn start(&self) -> Month {
        self.start
    }

    /// Last month of the range.
    pub const fn end(&self) -> Month {
        self.end
    }

    /// Whether `month` falls inside the range.
    pub fn contains(&self, month: &Month) -> bool {
        self.start <= *month && *month <= self.end
    }

    /// Number of months in the range.
    pub const fn len(&self) -> usize {
        (self.start.months_until(&self.end) + 1) as usize
    }

    /// A range always holds at least one month.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Iterate the months of the range in order.
    pub fn iter(&self) -> impl Iterator<Item = Month> + use<> {
        let first = self.start.ordinal();
        (first..=self.end.ordinal()).map(Month::from_ordinal)
    }
}

impl fmt::Display for MonthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Describe the span covered by a sorted list of months, for error messages.
pub(crate) fn describe_span(months: &[Month]) -> String {
    match (months.first(), months.last()) {
        (Some(first), Some(last)) => format!("{first}..{last}"),
        _ => "an empty series".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2020-01", 2020, 1)]
    #[case("1999-12", 1999, 12)]
    #[case("2024-06-30", 2024, 6)]
    fn test_parse_month(#[case] input: &str, #[case] year: i32, #[case] month: u32) {
        let parsed: Month = input.parse().unwrap();
        assert_eq!(parsed.year(), year);
        assert_eq!(parsed.month(), month);
    }

    #[rstest]
    #[case("2020-13")]
    #[case("2020-1")]
    #[case("20-01")]
    #[case("garbage")]
    fn test_parse_invalid_month(#[case] input: &str) {
        assert!(matches!(
            input.parse::<Month>(),
            Err(AnalyticsError::InvalidMonth(_))
        ));
    }

    #[test]
    fn test_display_is_zero_padded() {
        let month = Month::new(2021, 3).unwrap();
        assert_eq!(month.to_string(), "2021-03");
    }

    #[test]
    fn test_succ_and_pred_cross_year_boundary() {
        let december = Month::december(2020);
        assert_eq!(december.succ().to_string(), "2021-01");
        assert_eq!(december.succ().pred(), december);
        assert_eq!(Month::new(2021, 1).unwrap().pred(), december);
    }

    #[test]
    fn test_months_until() {
        let start = Month::new(2020, 12).unwrap();
        let end = Month::new(2021, 12).unwrap();
        assert_eq!(start.months_until(&end), 12);
        assert_eq!(end.months_until(&start), -12);
    }

    #[test]
    fn test_range_iteration() {
        let range = MonthRange::new(
            Month::new(2020, 11).unwrap(),
            Month::new(2021, 2).unwrap(),
        )
        .unwrap();

        let labels: Vec<String> = range.iter().map(|m| m.to_string()).collect();
        assert_eq!(labels, vec!["2020-11", "2020-12", "2021-01", "2021-02"]);
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let result = MonthRange::new(Month::december(2021), Month::december(2020));
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn test_year_span() {
        let range = MonthRange::years(2012, 2010);
        assert_eq!(range.to_string(), "2010-01..2012-12");
        assert_eq!(range.len(), 36);
    }

    #[test]
    fn test_range_from_dates() {
        let range = MonthRange::from_dates(
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
        .unwrap();
        assert_eq!(range.to_string(), "2000-01..2024-06");
        assert!(range.contains(&Month::new(2024, 6).unwrap()));
        assert!(!range.contains(&Month::new(2024, 7).unwrap()));
    }

    #[test]
    fn test_serde_as_string() {
        let month = Month::new(2022, 7).unwrap();
        let json = serde_json::to_string(&month).unwrap();
        assert_eq!(json, "\"2022-07\"");
        let back: Month = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month);
    }
}
