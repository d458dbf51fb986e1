//! Gene-symbol resolution over HTTP.
//!
//! Gene columns in the expression table are numeric Entrez-style ids; the
//! output stores carry human-readable symbols alongside them. Symbols come
//! from a remote batch-query service (mygene.info by default). Lookup
//! failures are fatal for the run.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Result, ScprepError};

/// Default batch-query endpoint.
const DEFAULT_API_URL: &str = "https://mygene.info/v3/query";

/// One hit in the batch-query response.
#[derive(Debug, Deserialize)]
struct QueryHit {
    query: String,
    symbol: Option<String>,
}

/// Client for the gene-symbol service.
pub struct GeneSymbolClient {
    client: Client,
    api_url: String,
}

impl GeneSymbolClient {
    /// Create a client against the default endpoint.
    ///
    /// The endpoint can be overridden through `SCPREP_GENE_API_URL`.
    pub fn new() -> Result<Self> {
        let api_url =
            std::env::var("SCPREP_GENE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::with_url(api_url)
    }

    /// Create a client against a specific endpoint.
    pub fn with_url(api_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ScprepError::Lookup(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    /// Resolve a batch of Entrez-style gene ids to lower-cased symbols.
    ///
    /// The result is the same length and order as `gene_ids`. Any id the
    /// service cannot resolve, a non-success status, or a response of the
    /// wrong shape is an error.
    pub fn resolve(&self, gene_ids: &[String]) -> Result<Vec<String>> {
        info!("Resolving {} gene symbols via {}", gene_ids.len(), self.api_url);

        let body = json!({
            "q": gene_ids,
            "scopes": "entrezgene",
            "fields": "symbol",
            "species": "human",
        });

        let response = self
            .client
            .post(&self.api_url)
            .json(&body)
            .send()
            .map_err(|e| ScprepError::Lookup(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScprepError::Lookup(format!(
                "service returned status {status}"
            )));
        }

        let hits: Vec<QueryHit> = response
            .json()
            .map_err(|e| ScprepError::Lookup(format!("unexpected response shape: {e}")))?;

        if hits.len() != gene_ids.len() {
            return Err(ScprepError::Lookup(format!(
                "requested {} ids but got {} results",
                gene_ids.len(),
                hits.len()
            )));
        }

        let mut symbols = Vec::with_capacity(gene_ids.len());
        for (id, hit) in gene_ids.iter().zip(&hits) {
            if hit.query != *id {
                return Err(ScprepError::Lookup(format!(
                    "result order mismatch: expected '{}', got '{}'",
                    id, hit.query
                )));
            }
            let symbol = hit.symbol.as_deref().ok_or_else(|| {
                ScprepError::Lookup(format!("no symbol for gene id '{id}'"))
            })?;
            symbols.push(symbol.to_lowercase());
        }

        debug!("Resolved {} symbols", symbols.len());
        Ok(symbols)
    }
}
