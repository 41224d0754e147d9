//! HTTP client for the external accrual oracle.

use async_trait::async_trait;
use thiserror::Error;

use crate::db_types::AccrualReply;

/// Seconds to pause the pool when a 429 arrives without a usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 10;

/// What one poll of the oracle produced. Transport and decode failures are errors instead; the
/// worker retries both with a short back-off.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Reply(AccrualReply),
    /// HTTP 429. `retry_after` comes from the `Retry-After` header and is authoritative for the
    /// whole pool.
    RateLimited { retry_after: u64 },
    /// Any other HTTP status. The tag is dropped; the rescue scanner re-emits it if the order is
    /// still live.
    Rejected(u16),
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("accrual oracle is unreachable: {0}")]
    Transport(String),
    #[error("accrual oracle returned an undecodable body: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait AccrualOracle {
    async fn poll_order(&self, order_num: &str) -> Result<PollOutcome, OracleError>;
}

/// The real oracle client: `GET {base}/api/orders/{order_num}`.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    base: String,
}

impl HttpOracle {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { client: reqwest::Client::new(), base }
    }
}

#[async_trait]
impl AccrualOracle for HttpOracle {
    async fn poll_order(&self, order_num: &str) -> Result<PollOutcome, OracleError> {
        let url = format!("{}/api/orders/{}", self.base, order_num);
        let response = self.client.get(&url).send().await.map_err(|e| OracleError::Transport(e.to_string()))?;
        match response.status().as_u16() {
            200 => {
                let reply =
                    response.json::<AccrualReply>().await.map_err(|e| OracleError::Malformed(e.to_string()))?;
                Ok(PollOutcome::Reply(reply))
            },
            429 => {
                let header = response.headers().get(reqwest::header::RETRY_AFTER);
                let retry_after = parse_retry_after(header.and_then(|v| v.to_str().ok()));
                Ok(PollOutcome::RateLimited { retry_after })
            },
            code => Ok(PollOutcome::Rejected(code)),
        }
    }
}

/// `Retry-After` as whole seconds; absent or unparseable values fall back to the default.
pub(crate) fn parse_retry_after(header: Option<&str>) -> u64 {
    header.and_then(|s| s.trim().parse::<u64>().ok()).unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
