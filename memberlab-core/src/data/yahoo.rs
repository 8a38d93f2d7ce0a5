//! Yahoo Finance price provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. One request per
//! fetch; there is no retry or backoff, a failed request is reported to the
//! caller, which decides what to do with the ticker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.
//! The CSV provider is the fallback when Yahoo is unavailable.

use super::provider::{PriceProvider, ProviderError};
use crate::domain::PriceBar;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

fn at<T: Copy>(values: &[Option<T>], i: usize) -> Option<T> {
    values.get(i).copied().flatten()
}

impl QuoteData {
    /// Bar for timestamp `i`. Rows with no price and no volume (exchange
    /// holidays) yield `None`; missing prices inside a real row become NaN.
    fn bar_at(&self, i: usize, date: NaiveDate, adj_close: Option<f64>) -> Option<PriceBar> {
        let prices = [
            at(&self.open, i),
            at(&self.high, i),
            at(&self.low, i),
            at(&self.close, i),
        ];
        let volume = at(&self.volume, i);
        if volume.is_none() && prices.iter().all(Option::is_none) {
            return None;
        }
        let [open, high, low, close] = prices.map(|p| p.unwrap_or(f64::NAN));
        Some(PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume: volume.unwrap_or(0),
            adj_close: adj_close.unwrap_or(f64::NAN),
        })
    }
}

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the provider at a different host (mirrors, local test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Build the chart API URL. `period2` is midnight UTC of `end`, so `end` itself is excluded.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(NaiveTime::MIN).and_utc().timestamp();
        format!(
            "{}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            self.base_url
        )
    }

    /// Parse the chart API response into bars.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<PriceBar>, ProviderError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    ProviderError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    ProviderError::ResponseFormatChanged(format!(
                        "{}: {}",
                        err.code, err.description
                    ))
                }
            } else {
                ProviderError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("result array is empty".into()))?;

        // No timestamps means no trading days in the window.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    ProviderError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;
            let adj_close = adj_closes.as_ref().and_then(|v| at(v, i));
            if let Some(bar) = quote.bar_at(i, date, adj_close) {
                bars.push(bar);
            }
        }

        Ok(bars)
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        let url = self.chart_url(symbol, start, end);
        tracing::debug!(symbol, %start, %end, "requesting chart");

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ProviderError::NetworkUnreachable(e.to_string())
            } else {
                ProviderError::Other(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                symbol: symbol.to_string(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!(
                "failed to parse response for {symbol}: {e}"
            ))
        })?;

        Self::parse_response(symbol, chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<PriceBar>, ProviderError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response("TEST", resp)
    }

    #[test]
    fn url_uses_exclusive_midnight_end() {
        let provider = YahooProvider::with_base_url("http://localhost").unwrap();
        let url = provider.chart_url(
            "AAPL",
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
        );
        assert!(url.starts_with("http://localhost/v8/finance/chart/AAPL?"));
        assert!(url.contains("period1=1577836800"));
        assert!(url.contains("period2=1580515200"));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn parses_bars_and_skips_empty_rows() {
        // 2020-01-02, 2020-01-03 (all null), 2020-01-06 (UTC market-open timestamps)
        let json = r#"{"chart":{"result":[{
            "timestamp":[1577975400,1578061800,1578321000],
            "indicators":{
                "quote":[{
                    "open":[74.06,null,73.45],
                    "high":[75.15,null,74.99],
                    "low":[73.80,null,73.19],
                    "close":[75.09,null,74.95],
                    "volume":[135480400,null,118387200]
                }],
                "adjclose":[{"adjclose":[73.06,null,72.93]}]
            }
        }],"error":null}}"#;
        let bars = parse(json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2020, 1, 6).unwrap());
        assert_eq!(bars[1].close, 74.95);
        assert_eq!(bars[0].adj_close, 73.06);
    }

    #[test]
    fn partial_rows_keep_missing_prices_as_nan() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1577975400],
            "indicators":{"quote":[{
                "open":[null],"high":[75.15],"low":[null],"close":[null],"volume":[1000]
            }]}
        }],"error":null}}"#;
        let bars = parse(json).unwrap();
        assert_eq!(bars.len(), 1);
        assert!(bars[0].close.is_nan());
        assert!(bars[0].adj_close.is_nan());
        assert_eq!(bars[0].high, 75.15);
        assert_eq!(bars[0].volume, 1000);
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert!(matches!(parse(json), Err(ProviderError::SymbolNotFound { .. })));
    }

    #[test]
    fn missing_timestamps_is_an_empty_window() {
        let json = r#"{"chart":{"result":[{"indicators":{"quote":[{"open":[],"high":[],"low":[],"close":[],"volume":[]}]}}],"error":null}}"#;
        assert!(parse(json).unwrap().is_empty());
    }
}
