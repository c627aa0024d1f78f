//! HTTP resource client for the Kalon explorer API
//!
//! [`ApiClient`] issues GET requests with deterministic query strings and a
//! bounded timeout, unwraps the `{success, data, meta}` envelope and folds
//! every failure into a [`FetchError`]. It performs no caching; that is the
//! scheduler's job.

use crate::config::ApiConfig;
use crate::error::{ConfigError, FetchError};
use crate::models::{
    AddressBalance, AddressInfo, Block, ChainStats, Envelope, Health, MempoolTx, Meta,
    NetworkStats, PeerInfo, SearchHit, Transaction, TreasuryInfo,
};
use crate::resource::{Listing, QueryParams, ResourceKey, ResourceKind, ResourceValue};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = concat!("kalon-explorer/", env!("CARGO_PKG_VERSION"));

/// Read-only data source consumed by the scheduler and the search resolver.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch one pollable resource.
    async fn fetch_resource(&self, key: &ResourceKey) -> Result<ResourceValue, FetchError>;

    async fn block_by_hash(&self, hash: &str) -> Result<Block, FetchError>;

    async fn block_by_height(&self, height: u64) -> Result<Block, FetchError>;

    async fn transaction(&self, hash: &str) -> Result<Transaction, FetchError>;

    async fn address(&self, address: &str) -> Result<AddressInfo, FetchError>;
}

/// Typed client for the explorer REST surface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::Invalid(format!("api.base_url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "api.base_url '{}' cannot carry a path",
                base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ConfigError> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the wire URL for `segments` under the base URL. Segments are
    /// percent-encoded; parameters are appended in sorted key order.
    pub fn request_url(&self, segments: &[&str], params: &QueryParams) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| FetchError::Protocol(format!("base URL {} cannot carry a path", self.base_url)))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (k, v) in params.iter() {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn get_envelope(
        &self,
        segments: &[&str],
        params: &QueryParams,
    ) -> Result<(Value, Option<Meta>), FetchError> {
        let url = self.request_url(segments, params)?;
        tracing::debug!(url = %url, "api.get");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Server(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        decode_envelope(&body)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &QueryParams,
    ) -> Result<T, FetchError> {
        let (data, _) = self.get_envelope(segments, params).await?;
        if data.is_null() {
            return Err(FetchError::Protocol("envelope has no data".to_string()));
        }
        decode_data(data)
    }

    /// List endpoints may answer `data: null` for an empty collection.
    async fn get_list<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &QueryParams,
    ) -> Result<Listing<T>, FetchError> {
        let (data, meta) = self.get_envelope(segments, params).await?;
        let items: Vec<T> = if data.is_null() {
            Vec::new()
        } else {
            decode_data(data)?
        };
        Ok(Listing::new(items, meta.and_then(|m| m.total)))
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_decode() {
            FetchError::Protocol(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Server(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }

    pub async fn health(&self) -> Result<Health, FetchError> {
        self.get(&["health"], &QueryParams::new()).await
    }

    pub async fn blocks(&self, params: &QueryParams) -> Result<Listing<Block>, FetchError> {
        self.get_list(&["blocks"], params).await
    }

    pub async fn latest_block(&self) -> Result<Block, FetchError> {
        self.get(&["blocks", "latest"], &QueryParams::new()).await
    }

    pub async fn transactions(&self, params: &QueryParams) -> Result<Listing<Transaction>, FetchError> {
        self.get_list(&["transactions"], params).await
    }

    pub async fn pending_transactions(&self) -> Result<Vec<MempoolTx>, FetchError> {
        Ok(self
            .get_list(&["transactions", "pending"], &QueryParams::new())
            .await?
            .items)
    }

    pub async fn address_transactions(
        &self,
        address: &str,
        params: &QueryParams,
    ) -> Result<Listing<Transaction>, FetchError> {
        self.get_list(&["addresses", address, "transactions"], params).await
    }

    pub async fn address_balance(&self, address: &str) -> Result<AddressBalance, FetchError> {
        self.get(&["addresses", address, "balance"], &QueryParams::new()).await
    }

    pub async fn treasury(&self) -> Result<TreasuryInfo, FetchError> {
        self.get(&["treasury"], &QueryParams::new()).await
    }

    pub async fn network_stats(&self) -> Result<NetworkStats, FetchError> {
        self.get(&["network", "stats"], &QueryParams::new()).await
    }

    pub async fn peers(&self) -> Result<Vec<PeerInfo>, FetchError> {
        Ok(self.get_list(&["network", "peers"], &QueryParams::new()).await?.items)
    }

    /// The backend's own classification of a free-text query. Used as a hint
    /// when local resolution finds nothing.
    pub async fn search(&self, query: &str) -> Result<SearchHit, FetchError> {
        self.get(&["search"], &QueryParams::new().with("q", query)).await
    }

    pub async fn stats(&self) -> Result<ChainStats, FetchError> {
        self.get(&["stats"], &QueryParams::new()).await
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn fetch_resource(&self, key: &ResourceKey) -> Result<ResourceValue, FetchError> {
        let value = match key.kind {
            ResourceKind::Blocks => ResourceValue::Blocks(self.blocks(&key.params).await?),
            ResourceKind::Transactions => {
                ResourceValue::Transactions(self.transactions(&key.params).await?)
            }
            ResourceKind::PendingTransactions => {
                ResourceValue::PendingTransactions(self.pending_transactions().await?)
            }
            ResourceKind::LatestBlock => ResourceValue::LatestBlock(self.latest_block().await?),
            ResourceKind::NetworkStats => ResourceValue::NetworkStats(self.network_stats().await?),
            ResourceKind::Peers => ResourceValue::Peers(self.peers().await?),
            ResourceKind::Treasury => ResourceValue::Treasury(self.treasury().await?),
            ResourceKind::Stats => ResourceValue::Stats(self.stats().await?),
        };
        Ok(value)
    }

    async fn block_by_hash(&self, hash: &str) -> Result<Block, FetchError> {
        self.get(&["blocks", hash], &QueryParams::new()).await
    }

    async fn block_by_height(&self, height: u64) -> Result<Block, FetchError> {
        let height = height.to_string();
        self.get(&["blocks", "height", &height], &QueryParams::new()).await
    }

    async fn transaction(&self, hash: &str) -> Result<Transaction, FetchError> {
        self.get(&["transactions", hash], &QueryParams::new()).await
    }

    async fn address(&self, address: &str) -> Result<AddressInfo, FetchError> {
        self.get(&["addresses", address], &QueryParams::new()).await
    }
}

/// Unwrap a response body. Anything but `success: true` is a protocol error,
/// whatever else the body says.
pub fn decode_envelope(body: &[u8]) -> Result<(Value, Option<Meta>), FetchError> {
    let envelope: Envelope<Value> = serde_json::from_slice(body)
        .map_err(|e| FetchError::Protocol(format!("malformed envelope: {}", e)))?;

    if !envelope.success {
        return Err(FetchError::Protocol(format!(
            "success=false: {}",
            envelope.error.as_deref().unwrap_or("no error message")
        )));
    }

    Ok((envelope.data.unwrap_or(Value::Null), envelope.meta))
}

fn decode_data<T: DeserializeOwned>(data: Value) -> Result<T, FetchError> {
    serde_json::from_value(data).map_err(|e| FetchError::Protocol(format!("malformed data: {}", e)))
}
