//! Binance options delta source.
//!
//! Reads the public mark-price endpoint (`/eapi/v1/mark`), which reports greeks
//! per contract. No API key is needed. Retries transient failures with
//! exponential backoff.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{DeltaSource, MarketError};
use crate::config::MarketConfig;

/// Longest wait between two attempts.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// One entry of the mark endpoint response. Numbers arrive as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkEntry {
    symbol: String,
    #[serde(default)]
    mark_price: Option<String>,
    #[serde(default)]
    delta: Option<String>,
}

/// Binance error body, e.g. `{"code":-1121,"msg":"Invalid symbol."}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

pub struct BinanceDeltaSource {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl BinanceDeltaSource {
    pub fn new(config: &MarketConfig) -> Result<Self, MarketError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("dnlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MarketError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    fn mark_url(&self, symbol: &str) -> String {
        format!("{}/eapi/v1/mark?symbol={symbol}", self.base_url)
    }

    /// Wait before retry number `attempt` (1-based): doubles each time, capped.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }

    /// Pull the delta for `symbol` out of a mark response.
    fn parse_response(symbol: &str, body: &str) -> Result<f64, MarketError> {
        let entries: Vec<MarkEntry> = serde_json::from_str(body).map_err(|e| {
            MarketError::ResponseFormatChanged(format!(
                "failed to parse mark data for {symbol}: {e}"
            ))
        })?;

        let entry = entries
            .into_iter()
            .find(|e| e.symbol == symbol)
            .ok_or_else(|| MarketError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let raw = entry.delta.ok_or_else(|| MarketError::DeltaMissing {
            symbol: symbol.to_string(),
        })?;
        let delta: f64 = raw.trim().parse().map_err(|_| {
            MarketError::ResponseFormatChanged(format!(
                "delta '{raw}' for {symbol} is not a number"
            ))
        })?;

        debug!(symbol, delta, mark_price = ?entry.mark_price, "Fetched mark data");
        Ok(delta)
    }

    fn fetch_with_retry(&self, symbol: &str) -> Result<f64, MarketError> {
        let url = self.mark_url(symbol);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.backoff(attempt));
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        warn!(symbol, attempt, error = %e, "Mark request failed, retrying");
                        last_error = Some(MarketError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(MarketError::NetworkUnreachable(e.to_string()));
                }
            };

            let status = resp.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(MarketError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            let body = resp
                .text()
                .map_err(|e| MarketError::NetworkUnreachable(e.to_string()))?;

            if status.is_client_error() {
                let detail = serde_json::from_str::<ApiError>(&body)
                    .map(|e| format!("{} ({})", e.msg, e.code))
                    .unwrap_or_else(|_| format!("HTTP {status}"));
                debug!(symbol, %detail, "Exchange rejected symbol");
                return Err(MarketError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if !status.is_success() {
                last_error = Some(MarketError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            return Self::parse_response(symbol, &body);
        }

        Err(last_error.unwrap_or_else(|| MarketError::Other("max retries exceeded".into())))
    }
}

impl DeltaSource for BinanceDeltaSource {
    fn name(&self) -> &str {
        "binance_options"
    }

    fn fetch_delta(&self, symbol: &str) -> Result<f64, MarketError> {
        self.fetch_with_retry(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[{
        "symbol": "BTC-260227-70000-C",
        "markPrice": "1850.5",
        "bidIV": "0.48",
        "askIV": "0.52",
        "markIV": "0.5",
        "delta": "0.4512",
        "theta": "-95.1",
        "gamma": "0.00004",
        "vega": "60.2"
    }]"#;

    #[test]
    fn parses_delta_from_mark_entry() {
        let delta = BinanceDeltaSource::parse_response("BTC-260227-70000-C", SAMPLE).unwrap();
        assert!((delta - 0.4512).abs() < 1e-12);
    }

    #[test]
    fn other_symbol_is_not_found() {
        let err = BinanceDeltaSource::parse_response("BTC-260227-80000-C", SAMPLE).unwrap_err();
        assert!(matches!(err, MarketError::SymbolNotFound { .. }));
    }

    #[test]
    fn missing_delta_is_reported() {
        let body = r#"[{"symbol": "BTC-260227-70000-P", "markPrice": "900"}]"#;
        let err = BinanceDeltaSource::parse_response("BTC-260227-70000-P", body).unwrap_err();
        assert!(matches!(err, MarketError::DeltaMissing { .. }));
    }

    #[test]
    fn garbage_body_is_format_change() {
        let err = BinanceDeltaSource::parse_response("X", "<html>").unwrap_err();
        assert!(matches!(err, MarketError::ResponseFormatChanged(_)));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let source = BinanceDeltaSource::new(&MarketConfig::default()).unwrap();
        assert_eq!(source.backoff(1), Duration::from_millis(500));
        assert_eq!(source.backoff(3), Duration::from_secs(2));
        assert_eq!(source.backoff(7), MAX_DELAY);
        assert_eq!(source.backoff(u32::MAX), MAX_DELAY);
    }

    #[test]
    fn url_has_no_double_slash() {
        let config = MarketConfig {
            base_url: "https://eapi.binance.com/".into(),
            ..MarketConfig::default()
        };
        let source = BinanceDeltaSource::new(&config).unwrap();
        assert_eq!(
            source.mark_url("BTC-260227-70000-C"),
            "https://eapi.binance.com/eapi/v1/mark?symbol=BTC-260227-70000-C"
        );
    }
}
