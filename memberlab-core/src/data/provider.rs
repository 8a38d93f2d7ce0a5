//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over price sources (Yahoo Finance,
//! local CSV files) so pipelines can swap implementations and tests can
//! use a mock.

use crate::domain::PriceBar;
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for price fetches.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("HTTP {status} for {symbol}")]
    Http { status: u16, symbol: String },

    #[error("read price file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse price file: {0}")]
    Csv(#[from] csv::Error),

    #[error("provider error: {0}")]
    Other(String),
}

/// Source of daily OHLCV bars.
///
/// `end` is exclusive: a provider returns bars dated `start <= date < end`.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for a symbol over `[start, end)`.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ProviderError>;
}
