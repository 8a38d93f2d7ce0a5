//! Price data: providers and the batch fetcher

pub mod csv_provider;
pub mod fetch;
pub mod provider;
pub mod yahoo;

pub use csv_provider::CsvPriceProvider;
pub use fetch::{
    fetch_batch, fetch_prices, FetchFailure, FetchProgress, LogProgress, PriceBatch,
    PriceRequest, TickerFailure,
};
pub use provider::{PriceProvider, ProviderError};
pub use yahoo::YahooProvider;
