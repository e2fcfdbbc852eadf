//! Consul client configuration
//!
//! Resolved from the same environment variables Consul's own tooling reads:
//!
//! - `CONSUL_HTTP_ADDR`: agent address, `host:port` or a full URL
//! - `CONSUL_HTTP_SSL`: `true` selects https when the address has no scheme
//! - `CONSUL_HTTP_SSL_VERIFY`: `false` disables certificate verification
//! - `CONSUL_HTTP_TOKEN`: ACL token
//! - `CONSUL_HTTP_TOKEN_FILE`: file holding the ACL token (when no token is set)

use crate::{Error, Result};

/// Default agent address
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8500";

/// Configuration for talking to a Consul agent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsulConfig {
    /// `host:port` of the agent, without scheme
    pub address: String,
    /// `http` or `https`
    pub scheme: String,
    /// ACL token sent as `X-Consul-Token`
    pub token: Option<String>,
    /// Datacenter to query instead of the agent's own
    pub datacenter: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Accept invalid TLS certificates
    pub insecure_skip_verify: bool,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        ConsulConfig {
            address: DEFAULT_HTTP_ADDR.to_string(),
            scheme: "http".to_string(),
            token: None,
            datacenter: None,
            timeout_secs: 30,
            insecure_skip_verify: false,
        }
    }
}

impl ConsulConfig {
    /// Create config from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ConsulConfig::default();

        if let Some(ssl) = lookup("CONSUL_HTTP_SSL") {
            if parse_bool("CONSUL_HTTP_SSL", &ssl)? {
                config.scheme = "https".to_string();
            }
        }

        if let Some(addr) = lookup("CONSUL_HTTP_ADDR").filter(|a| !a.is_empty()) {
            config.set_address(&addr);
        }

        if let Some(verify) = lookup("CONSUL_HTTP_SSL_VERIFY") {
            config.insecure_skip_verify = !parse_bool("CONSUL_HTTP_SSL_VERIFY", &verify)?;
        }

        config.token = match lookup("CONSUL_HTTP_TOKEN").filter(|t| !t.is_empty()) {
            Some(token) => Some(token),
            None => match lookup("CONSUL_HTTP_TOKEN_FILE").filter(|p| !p.is_empty()) {
                Some(path) => Some(read_token_file(&path)?),
                None => None,
            },
        };

        Ok(config)
    }

    /// Set the agent address; a scheme prefix overrides the current scheme
    pub fn set_address(&mut self, addr: &str) {
        let addr = addr.trim().trim_end_matches('/');
        if let Some(rest) = addr.strip_prefix("https://") {
            self.scheme = "https".to_string();
            self.address = rest.to_string();
        } else if let Some(rest) = addr.strip_prefix("http://") {
            self.scheme = "http".to_string();
            self.address = rest.to_string();
        } else {
            self.address = addr.to_string();
        }
    }

    /// Base URL of the agent's HTTP API
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.address)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

fn read_token_file(path: &str) -> Result<String> {
    let token = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read token file {}: {}", path, e)))?;
    Ok(token.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ConsulConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ConsulConfig::default());
        assert_eq!(config.base_url(), "http://127.0.0.1:8500");
    }

    #[test]
    fn test_address_with_scheme() {
        let config =
            ConsulConfig::from_lookup(lookup(&[("CONSUL_HTTP_ADDR", "https://consul.local:8501/")]))
                .unwrap();
        assert_eq!(config.scheme, "https");
        assert_eq!(config.address, "consul.local:8501");
        assert_eq!(config.base_url(), "https://consul.local:8501");
    }

    #[test]
    fn test_ssl_flag_and_verify() {
        let config = ConsulConfig::from_lookup(lookup(&[
            ("CONSUL_HTTP_ADDR", "consul.local:8501"),
            ("CONSUL_HTTP_SSL", "true"),
            ("CONSUL_HTTP_SSL_VERIFY", "false"),
        ]))
        .unwrap();
        assert_eq!(config.base_url(), "https://consul.local:8501");
        assert!(config.insecure_skip_verify);
    }

    #[test]
    fn test_invalid_bool() {
        let err = ConsulConfig::from_lookup(lookup(&[("CONSUL_HTTP_SSL", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_token_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "from-file\n").unwrap();
        let token_path = token_path.to_str().unwrap();

        let config = ConsulConfig::from_lookup(lookup(&[
            ("CONSUL_HTTP_TOKEN", "from-env"),
            ("CONSUL_HTTP_TOKEN_FILE", token_path),
        ]))
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("from-env"));

        let config =
            ConsulConfig::from_lookup(lookup(&[("CONSUL_HTTP_TOKEN_FILE", token_path)])).unwrap();
        assert_eq!(config.token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_missing_token_file() {
        let err = ConsulConfig::from_lookup(lookup(&[(
            "CONSUL_HTTP_TOKEN_FILE",
            "/nonexistent/consul/token",
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
