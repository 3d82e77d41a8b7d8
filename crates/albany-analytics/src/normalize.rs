//! Frequency normalization.
//!
//! Brings raw series onto the monthly grid:
//!
//! - daily prices are averaged per calendar month ([`monthly_mean`])
//! - yearly indicator values are anchored to December and linearly
//!   interpolated between consecutive anchors ([`interpolate_yearly`])
//!
//! Both outputs are sorted by month and clipped to the requested range.

use crate::calendar::{Month, MonthRange};
use crate::error::{AnalyticsError, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Minimum number of yearly anchors needed to interpolate.
pub const MIN_ANCHORS: usize = 2;

/// Average observations per calendar month.
///
/// Non-finite observations are ignored. Months without any observation are
/// absent from the output rather than filled.
///
/// # Errors
/// [`AnalyticsError::InsufficientData`] when `observations` holds no finite value.
pub fn monthly_mean(
    entity: &str,
    observations: &[(NaiveDate, f64)],
    range: &MonthRange,
) -> Result<Vec<(Month, f64)>> {
    let mut buckets: BTreeMap<Month, (f64, usize)> = BTreeMap::new();

    for &(date, value) in observations {
        if !value.is_finite() {
            continue;
        }
        let bucket = buckets.entry(Month::from_date(date)).or_insert((0.0, 0));
        bucket.0 += value;
        bucket.1 += 1;
    }

    if buckets.is_empty() {
        return Err(AnalyticsError::insufficient(entity, 1, 0));
    }

    Ok(buckets
        .into_iter()
        .filter(|(month, _)| range.contains(month))
        .map(|(month, (sum, count))| (month, sum / count as f64))
        .collect())
}

/// Interpolate yearly values onto the monthly grid.
///
/// Each year's value is placed on December of that year. Months strictly
/// between two anchors are linear blends of them; months before the first
/// anchor or after the last one are not produced. Missing years are skipped
/// and the interpolation spans across them.
///
/// # Errors
/// - [`AnalyticsError::InsufficientData`] with fewer than [`MIN_ANCHORS`] usable values
/// - [`AnalyticsError::InvalidInput`] when a year appears twice
pub fn interpolate_yearly(
    entity: &str,
    observations: &[(i32, Option<f64>)],
    range: &MonthRange,
) -> Result<Vec<(Month, f64)>> {
    let mut anchors: Vec<(Month, f64)> = observations
        .iter()
        .filter_map(|&(year, value)| {
            value
                .filter(|v| v.is_finite())
                .map(|v| (Month::december(year), v))
        })
        .collect();
    anchors.sort_by_key(|(month, _)| *month);

    if let Some(pair) = anchors.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(AnalyticsError::InvalidInput(format!(
            "{entity}: year {} observed more than once",
            pair[0].0.year()
        )));
    }

    if anchors.len() < MIN_ANCHORS {
        return Err(AnalyticsError::insufficient(
            entity,
            MIN_ANCHORS,
            anchors.len(),
        ));
    }

    let mut out = Vec::new();
    for pair in anchors.windows(2) {
        let (from, from_value) = pair[0];
        let (to, to_value) = pair[1];
        let span = from.months_until(&to) as f64;

        let mut month = from;
        while month < to {
            if range.contains(&month) {
                let step = from.months_until(&month) as f64;
                out.push((month, from_value + (to_value - from_value) * step / span));
            }
            month = month.succ();
        }
    }

    if let Some(&(last, value)) = anchors.last()
        && range.contains(&last)
    {
        out.push((last, value));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn range(start: &str, end: &str) -> MonthRange {
        MonthRange::new(start.parse().unwrap(), end.parse().unwrap()).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_yearly_interpolation_is_linear_between_anchors() {
        let observations = vec![(2020, Some(10.0)), (2021, Some(20.0))];
        let series =
            interpolate_yearly("GDP/USA", &observations, &range("2000-01", "2024-06")).unwrap();

        assert_eq!(series.len(), 13);
        assert_eq!(series.first().unwrap().0.to_string(), "2020-12");
        assert_relative_eq!(series.first().unwrap().1, 10.0);
        assert_eq!(series.last().unwrap().0.to_string(), "2021-12");
        assert_relative_eq!(series.last().unwrap().1, 20.0);

        for (i, (_, value)) in series.iter().enumerate() {
            assert_relative_eq!(*value, 10.0 + 10.0 * i as f64 / 12.0, epsilon = 1e-12);
        }
        assert!(series.windows(2).all(|w| w[1].1 > w[0].1));
    }

    #[test]
    fn test_yearly_interpolation_spans_missing_years() {
        let observations = vec![(2019, Some(0.0)), (2020, None), (2021, Some(24.0))];
        let series =
            interpolate_yearly("CPI/FRA", &observations, &range("2000-01", "2024-06")).unwrap();

        assert_eq!(series.len(), 25);
        let dec_2020 = series
            .iter()
            .find(|(m, _)| m.to_string() == "2020-12")
            .unwrap();
        assert_relative_eq!(dec_2020.1, 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_yearly_interpolation_is_clipped_to_range() {
        let observations = vec![(2020, Some(10.0)), (2021, Some(20.0))];
        let series =
            interpolate_yearly("GDP/USA", &observations, &range("2021-01", "2021-06")).unwrap();

        let labels: Vec<String> = series.iter().map(|(m, _)| m.to_string()).collect();
        assert_eq!(
            labels,
            vec!["2021-01", "2021-02", "2021-03", "2021-04", "2021-05", "2021-06"]
        );
    }

    #[test]
    fn test_single_anchor_is_insufficient() {
        let observations = vec![(2020, Some(10.0)), (2021, None)];
        let result = interpolate_yearly("GDP/USA", &observations, &range("2000-01", "2024-06"));

        match result {
            Err(AnalyticsError::InsufficientData {
                entity,
                required,
                actual,
            }) => {
                assert_eq!(entity, "GDP/USA");
                assert_eq!(required, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected insufficient data, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_year_rejected() {
        let observations = vec![(2020, Some(10.0)), (2020, Some(11.0)), (2021, Some(1.0))];
        let result = interpolate_yearly("GDP/USA", &observations, &range("2000-01", "2024-06"));
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn test_monthly_mean_averages_each_month() {
        let observations = vec![
            (date(2020, 1, 2), 100.0),
            (date(2020, 1, 3), 102.0),
            (date(2020, 1, 31), 104.0),
            (date(2020, 2, 3), 110.0),
            (date(2020, 2, 4), f64::NAN),
        ];
        let series =
            monthly_mean("^GSPC", &observations, &range("2000-01", "2024-06")).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0.to_string(), "2020-01");
        assert_relative_eq!(series[0].1, 102.0);
        assert_eq!(series[1].0.to_string(), "2020-02");
        assert_relative_eq!(series[1].1, 110.0);
    }

    #[test]
    fn test_monthly_mean_of_monthly_series_is_noop() {
        let monthly = vec![
            (date(2020, 1, 1), 100.0),
            (date(2020, 2, 1), 101.5),
            (date(2020, 3, 1), 103.0),
            (date(2020, 4, 1), 107.25),
        ];
        let window = range("2000-01", "2024-06");
        let first = monthly_mean("^FTSE", &monthly, &window).unwrap();

        let replayed: Vec<(NaiveDate, f64)> = first
            .iter()
            .map(|(m, v)| (m.first_day().unwrap(), *v))
            .collect();
        let second = monthly_mean("^FTSE", &replayed, &window).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_monthly_mean_without_values() {
        let result = monthly_mean(
            "^N225",
            &[(date(2020, 1, 1), f64::NAN)],
            &range("2000-01", "2024-06"),
        );
        assert!(matches!(
            result,
            Err(AnalyticsError::InsufficientData { actual: 0, .. })
        ));
    }
}
