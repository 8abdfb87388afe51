//! Delta sources and structured error types.
//!
//! The DeltaSource trait abstracts over where an option delta comes from
//! (Binance options mark data, a moneyness mock) so the lifecycle manager can
//! treat every source the same way: call in, delta or failure out.

pub mod binance;
pub mod mock;

use thiserror::Error;

pub use binance::BinanceDeltaSource;
pub use mock::MockDeltaSource;

/// Structured error types for delta fetches.
///
/// All of them are recoverable: the caller falls back to a manual delta.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by exchange (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("no delta reported for {symbol}")]
    DeltaMissing { symbol: String },

    #[error("market data error: {0}")]
    Other(String),
}

/// Blocking source of option deltas.
pub trait DeltaSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Current delta for an exchange symbol such as `BTC-260227-70000-C`.
    fn fetch_delta(&self, symbol: &str) -> Result<f64, MarketError>;
}
