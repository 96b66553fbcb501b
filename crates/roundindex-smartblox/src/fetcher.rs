//! SmartBlox HTTP gateway.
//!
//! Talks to the node's REST API:
//! - `GET /api/status` → `{"last-round": 1234}`
//! - `GET /api/block/{round}` → `{"round": 1234, "transactions": [...]}`
//!
//! A 404 on the block endpoint means the round has not been produced yet.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use roundindex_core::error::IndexerError;
use roundindex_core::source::SourceGateway;
use roundindex_core::types::{Block, Round, Transaction};

/// Response of `/api/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStatus {
    #[serde(rename = "last-round")]
    pub last_round: u64,
}

/// Response of `/api/block/{round}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlock {
    pub round: u64,
    /// The node sends `null` for a block without transactions.
    #[serde(default)]
    pub transactions: Option<Vec<RawTransaction>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub sig: String,
    pub tx: RawTxDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTxDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub sender: u64,
    // Spelled this way on the wire.
    #[serde(rename = "receipient")]
    pub recipient: u64,
    pub amount: u64,
}

impl From<RawTransaction> for Transaction {
    fn from(raw: RawTransaction) -> Self {
        Transaction {
            signature: raw.sig,
            kind: raw.tx.kind,
            sender: raw.tx.sender,
            recipient: raw.tx.recipient,
            amount: raw.tx.amount,
        }
    }
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        Block {
            round: raw.round,
            transactions: raw
                .transactions
                .unwrap_or_default()
                .into_iter()
                .map(Transaction::from)
                .collect(),
        }
    }
}

/// Decode a `/api/status` body into the frontier round.
pub fn parse_status(body: &str) -> Result<Round, IndexerError> {
    let status: RawStatus = serde_json::from_str(body)
        .map_err(|e| IndexerError::SourceUnavailable(format!("failed to decode status: {e}")))?;
    Ok(status.last_round)
}

/// Decode a `/api/block/{round}` body.
pub fn parse_block(body: &str) -> Result<Block, IndexerError> {
    let raw: RawBlock = serde_json::from_str(body)
        .map_err(|e| IndexerError::SourceUnavailable(format!("failed to decode block: {e}")))?;
    Ok(raw.into())
}

/// Configuration for `SmartBloxClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for a SmartBlox node.
pub struct SmartBloxClient {
    base_url: String,
    http: reqwest::Client,
}

impl SmartBloxClient {
    /// Create a client for the node at `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>, config: ClientConfig) -> Result<Self, IndexerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IndexerError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn status_url(&self) -> String {
        format!("{}/api/status", self.base_url)
    }

    pub fn block_url(&self, round: Round) -> String {
        format!("{}/api/block/{round}", self.base_url)
    }

    async fn get(&self, url: &str) -> Result<(reqwest::StatusCode, String), IndexerError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| IndexerError::SourceUnavailable(format!("GET {url}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| IndexerError::SourceUnavailable(format!("GET {url}: {e}")))?;
        Ok((status, body))
    }
}

#[async_trait]
impl SourceGateway for SmartBloxClient {
    async fn current_frontier(&self) -> Result<Round, IndexerError> {
        let url = self.status_url();
        let (status, body) = self.get(&url).await?;
        if !status.is_success() {
            return Err(IndexerError::SourceUnavailable(format!(
                "GET {url}: HTTP {}: {body}",
                status.as_u16()
            )));
        }
        parse_status(&body)
    }

    async fn fetch_block(&self, round: Round) -> Result<Block, IndexerError> {
        let url = self.block_url(round);
        let (status, body) = self.get(&url).await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexerError::RoundNotFound { round });
        }
        if !status.is_success() {
            return Err(IndexerError::SourceUnavailable(format!(
                "GET {url}: HTTP {}: {body}",
                status.as_u16()
            )));
        }
        tracing::trace!(round, bytes = body.len(), "block fetched");
        parse_block(&body)
    }
}
