//! Daily price data from Yahoo Finance.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use yahoo_finance_api as yahoo;

/// Source of daily market data.
///
/// Implemented by [`YahooQuoteProvider`]; tests substitute an in-process stub.
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars for `ticker` between `start` and `end`, inclusive.
    ///
    /// The frame carries at least `date` (Date) and `adjusted_close` (f64) columns.
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<DataFrame>> + Send;

    /// Display name of `ticker`.
    fn fetch_name(&self, ticker: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Yahoo Finance quote provider with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a provider with default rate limiting (1 req/sec).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(1000))
    }

    /// Create a provider with custom rate limiting.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
        })
    }

    /// Fetch OHLCV data for a single symbol.
    ///
    /// # Returns
    /// A Polars DataFrame with columns: symbol, date, open, high, low, close,
    /// volume, adjusted_close
    pub async fn fetch_quotes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let start_time = to_offset_datetime(start, 0, 0, 0)?;
        let end_time = to_offset_datetime(end, 23, 59, 59)?;

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No data returned from Yahoo Finance".to_string(),
            });
        }

        let dates: Vec<i64> = quotes.iter().map(|q| q.timestamp).collect();
        let opens: Vec<f64> = quotes.iter().map(|q| q.open).collect();
        let highs: Vec<f64> = quotes.iter().map(|q| q.high).collect();
        let lows: Vec<f64> = quotes.iter().map(|q| q.low).collect();
        let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
        let volumes: Vec<u64> = quotes.iter().map(|q| q.volume).collect();
        let adj_closes: Vec<f64> = quotes.iter().map(|q| q.adjclose).collect();

        let mut df = DataFrame::new(vec![
            Series::new("timestamp".into(), dates).into(),
            Series::new("open".into(), opens).into(),
            Series::new("high".into(), highs).into(),
            Series::new("low".into(), lows).into(),
            Series::new("close".into(), closes).into(),
            Series::new("volume".into(), volumes).into(),
            Series::new("adjusted_close".into(), adj_closes).into(),
        ])?;

        let symbol_col: Column = Series::new("symbol".into(), vec![symbol; df.height()]).into();
        df.with_column(symbol_col)?;

        let df = df
            .lazy()
            .with_column(
                (col("timestamp") * lit(1_000_000_000))
                    .cast(DataType::Datetime(TimeUnit::Nanoseconds, None))
                    .cast(DataType::Date)
                    .alias("date"),
            )
            .select(&[
                col("symbol"),
                col("date"),
                col("open"),
                col("high"),
                col("low"),
                col("close"),
                col("volume"),
                col("adjusted_close"),
            ])
            .collect()?;

        sleep(self.rate_limit_delay).await;

        Ok(df)
    }

    /// Look up the long name of a symbol, falling back to its short name.
    pub async fn lookup_name(&self, symbol: &str) -> Result<String> {
        let result = self.provider.search_ticker(symbol).await?;

        let item = result
            .quotes
            .iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol))
            .or_else(|| result.quotes.first())
            .ok_or_else(|| DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No search results".to_string(),
            })?;

        let name = if item.long_name.trim().is_empty() {
            item.short_name.trim()
        } else {
            item.long_name.trim()
        };
        Ok(name.to_string())
    }
}

impl MarketDataProvider for YahooQuoteProvider {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<DataFrame>> + Send {
        self.fetch_quotes(ticker, start, end)
    }

    fn fetch_name(&self, ticker: &str) -> impl Future<Output = Result<String>> + Send {
        self.lookup_name(ticker)
    }
}

fn to_offset_datetime(date: NaiveDate, h: u32, m: u32, s: u32) -> Result<time::OffsetDateTime> {
    let timestamp = date
        .and_hms_opt(h, m, s)
        .ok_or_else(|| DataError::TimeConversion(format!("invalid time on {date}")))?
        .and_utc()
        .timestamp();
    time::OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| DataError::TimeConversion(e.to_string()))
}

/// Extract `(date, adjusted_close)` pairs from a daily price frame.
///
/// Rows with a missing date or price are skipped.
pub fn daily_closes(df: &DataFrame) -> Result<Vec<(NaiveDate, f64)>> {
    let dates = df.column("date")?.cast(&DataType::String)?;
    let dates = dates.str()?;
    let closes = df.column("adjusted_close")?.cast(&DataType::Float64)?;
    let closes = closes.f64()?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(date), Some(close)) = (dates.get(i), closes.get(i)) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| DataError::Parse(format!("Invalid date '{date}': {e}")))?;
        out.push((date, close));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(dates: Vec<&str>, closes: Vec<Option<f64>>) -> DataFrame {
        DataFrame::new(vec![
            Series::new("date".into(), dates).into(),
            Series::new("adjusted_close".into(), closes).into(),
        ])
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .unwrap()
    }

    #[test]
    fn test_daily_closes() {
        let df = frame(
            vec!["2020-01-02", "2020-01-03", "2020-02-03"],
            vec![Some(100.0), None, Some(110.0)],
        );
        let closes = daily_closes(&df).unwrap();
        assert_eq!(
            closes,
            vec![
                (NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(), 100.0),
                (NaiveDate::from_ymd_opt(2020, 2, 3).unwrap(), 110.0),
            ]
        );
    }

    #[test]
    fn test_daily_closes_needs_columns() {
        let df = DataFrame::new(vec![Series::new("close".into(), vec![1.0]).into()]).unwrap();
        assert!(matches!(daily_closes(&df), Err(DataError::Polars(_))));
    }

    #[tokio::test]
    async fn test_invalid_date_range() {
        let provider = YahooQuoteProvider::new().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let result = provider.fetch_prices("^GSPC", start, end).await;
        assert!(matches!(result, Err(DataError::InvalidDateRange { .. })));
    }

    #[tokio::test]
    async fn test_invalid_symbol() {
        let provider = YahooQuoteProvider::new().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

        let result = provider.fetch_prices("", start, end).await;
        assert!(matches!(result, Err(DataError::InvalidSymbol(_))));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_prices() {
        let provider = YahooQuoteProvider::new().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        let df = provider.fetch_prices("^GSPC", start, end).await.unwrap();
        assert!(df.height() > 0);
        assert!(!daily_closes(&df).unwrap().is_empty());
    }
}
