//! Consul HTTP KV backend
//!
//! Uses the agent's `/v1/kv` endpoints:
//! - `GET /v1/kv/<prefix>?recurse=true` lists entries (404 means no keys)
//! - `PUT /v1/kv/<key>` stores the request body, answering `true` or `false`

use super::{KvPair, KvStore};
use crate::config::ConsulConfig;
use crate::{Error, Result};
use base64::Engine;
use bytes::Bytes;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

/// One element of a recursive KV listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulEntry {
    key: String,
    /// Base64 encoded, `null` for keys without a value
    value: Option<String>,
}

/// Blocking client for a Consul agent's KV store
pub struct ConsulClient {
    config: ConsulConfig,
    base: Url,
    client: Client,
}

impl ConsulClient {
    /// Create a new client
    ///
    /// No request is made here; an unreachable agent surfaces on first use.
    pub fn new(config: ConsulConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url()).map_err(|e| {
            Error::BackendConnection(format!("invalid address {}: {}", config.base_url(), e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| Error::BackendConnection(e.to_string()))?;

        Ok(ConsulClient {
            config,
            base,
            client,
        })
    }

    pub fn config(&self) -> &ConsulConfig {
        &self.config
    }

    /// Build the URL of a KV entry, percent-encoding each key segment
    fn kv_url(&self, key: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::BackendConnection(format!("address {} cannot carry a path", self.base))
            })?
            .pop_if_empty()
            .extend(["v1", "kv"])
            .extend(key.split('/'));

        if let Some(dc) = &self.config.datacenter {
            url.query_pairs_mut().append_pair("dc", dc);
        }
        Ok(url)
    }

    fn with_token(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => builder.header("X-Consul-Token", token),
            None => builder,
        }
    }
}

impl KvStore for ConsulClient {
    fn list(&self, prefix: &str) -> Result<Vec<KvPair>> {
        let mut url = self.kv_url(prefix)?;
        url.query_pairs_mut().append_pair("recurse", "true");

        let resp = self
            .with_token(self.client.get(url))
            .send()
            .map_err(|e| {
                Error::BackendConnection(format!("Error retrieving data for key {}: {}", prefix, e))
            })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(Error::BackendConnection(format!(
                "listing {} failed ({}): {}",
                prefix,
                status,
                text.trim()
            )));
        }

        let entries: Vec<ConsulEntry> = resp
            .json()
            .map_err(|e| Error::BackendConnection(format!("Invalid list response: {}", e)))?;
        decode_entries(entries)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let write_err = |reason: String| Error::BackendWrite {
            key: key.to_string(),
            reason,
        };

        let url = self.kv_url(key)?;
        let resp = self
            .with_token(self.client.put(url).body(value.to_vec()))
            .send()
            .map_err(|e| write_err(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            return Err(write_err(format!("HTTP {}: {}", status, text.trim())));
        }
        if text.trim() != "true" {
            return Err(write_err("Consul rejected the write".into()));
        }
        Ok(())
    }
}

fn decode_entries(entries: Vec<ConsulEntry>) -> Result<Vec<KvPair>> {
    entries
        .into_iter()
        .map(|entry| -> Result<KvPair> {
            let value = match entry.value {
                Some(encoded) => base64::engine::general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| {
                        Error::BackendConnection(format!(
                            "invalid base64 value for key {}: {}",
                            entry.key, e
                        ))
                    })?,
                None => Vec::new(),
            };
            Ok(KvPair::new(entry.key, Bytes::from(value)))
        })
        .collect()
}
