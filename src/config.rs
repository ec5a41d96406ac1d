//! Proxy configuration.
//!
//! Flags win over environment variables, which win over the defaults. The
//! credential is read once at startup and never re-read.

use crate::ProxyCredential;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::str::FromStr;

/// Upstream background-removal endpoint
pub const REMOVE_BG_URL: &str = "https://api.remove.bg/v1.0/removebg";

/// Environment variable holding the upstream API key
pub const API_KEY_ENV: &str = "REMOVE_BG_API_KEY";

pub const LISTEN_ENV: &str = "IMAGEFORGE_LISTEN";
pub const UPSTREAM_ENV: &str = "IMAGEFORGE_UPSTREAM_URL";

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

/// Inbound upload limit (12 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 12 * 1024 * 1024;

impl FromStr for ProxyCredential {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ProxyCredential::new(s))
    }
}

/// Settings for the background-removal proxy
#[derive(Debug, Clone, clap::Args)]
pub struct ProxyConfig {
    /// Address to listen on
    #[arg(long, env = LISTEN_ENV, default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Upstream background-removal endpoint
    #[arg(long, env = UPSTREAM_ENV, default_value = REMOVE_BG_URL)]
    pub upstream_url: String,

    /// Upstream API key (sent as X-Api-Key)
    #[arg(long, env = API_KEY_ENV, hide_env_values = true, default_value = "")]
    pub api_key: ProxyCredential,

    /// Largest accepted upload, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
            upstream_url: REMOVE_BG_URL.to_string(),
            api_key: ProxyCredential::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ProxyConfig {
    /// Build from the process environment, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(listen) = lookup(LISTEN_ENV) {
            match listen.parse() {
                Ok(addr) => config.listen = addr,
                Err(e) => tracing::warn!(%listen, error = %e, "ignoring invalid {}", LISTEN_ENV),
            }
        }
        if let Some(url) = lookup(UPSTREAM_ENV) {
            config.upstream_url = url;
        }
        if let Some(key) = lookup(API_KEY_ENV) {
            config.api_key = ProxyCredential::new(key);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        proxy: ProxyConfig,
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "imageforge",
            "--listen",
            "0.0.0.0:8080",
            "--api-key",
            "abc",
            "--max-upload-bytes",
            "1024",
        ]);
        assert_eq!(cli.proxy.listen, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cli.proxy.api_key.expose(), "abc");
        assert_eq!(cli.proxy.max_upload_bytes, 1024);
    }

    #[test]
    fn lookup_fills_missing_values() {
        let env: HashMap<&str, &str> = [
            (API_KEY_ENV, "from-env"),
            (UPSTREAM_ENV, "http://localhost:9/removebg"),
        ]
        .into_iter()
        .collect();
        let config = ProxyConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key.expose(), "from-env");
        assert_eq!(config.upstream_url, "http://localhost:9/removebg");
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
    }

    #[test]
    fn missing_key_is_not_an_error() {
        let config = ProxyConfig::from_lookup(|_| None);
        assert!(config.api_key.is_empty());
        assert_eq!(config.upstream_url, REMOVE_BG_URL);
    }

    #[test]
    fn bad_listen_address_falls_back() {
        let config = ProxyConfig::from_lookup(|k| (k == LISTEN_ENV).then(|| "nope".to_string()));
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
    }
}
