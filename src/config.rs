use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::translate::CasAccounting;

/// Top-level configuration for the exporter.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (trace, debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// memcached servers to scrape.
    #[serde(default)]
    pub memcached: MemcachedConfig,

    /// Exposition endpoint configuration.
    #[serde(default)]
    pub web: WebConfig,
}

/// memcached server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemcachedConfig {
    /// Comma-separated `host:port` addresses or unix socket paths. Absolute
    /// paths containing `*` are glob-expanded. Default: "localhost:11211".
    #[serde(default = "default_address")]
    pub address: String,

    /// Bound on connecting and on each stats round trip. Default: 1s.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// cas outcomes subtracted from per slab class sets.
    /// Default: hits_and_badval.
    #[serde(default)]
    pub slab_cas_accounting: CasAccounting,

    /// TLS towards the memcached servers. Default: disabled.
    #[serde(default)]
    pub tls: TlsConfig,
}

/// TLS settings for memcached connections. Files are PEM encoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// CA bundle used to verify servers. Default: bundled webpki roots.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// Client certificate, presented when the server asks for one.
    #[serde(default)]
    pub cert_file: Option<PathBuf>,

    /// Private key for `cert_file`.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Name to verify the server certificate against. Default: the host part
    /// of each address. Required for unix sockets.
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Exposition endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Address to listen on. ":port" binds all interfaces. Default: ":9150".
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Path under which metrics are exposed. Default: "/metrics".
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_address() -> String {
    "localhost:11211".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_listen_address() -> String {
    ":9150".to_string()
}

fn default_telemetry_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            memcached: MemcachedConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout: default_timeout(),
            slab_cas_accounting: CasAccounting::default(),
            tls: TlsConfig::default(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            telemetry_path: default_telemetry_path(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.memcached.timeout.is_zero() {
            bail!("memcached.timeout must be positive");
        }

        let tls = &self.memcached.tls;
        if tls.enabled && tls.cert_file.is_some() != tls.key_file.is_some() {
            bail!("memcached.tls.cert_file and memcached.tls.key_file must be set together");
        }

        if self.web.listen_address.is_empty() {
            bail!("web.listen_address is required");
        }

        let path = &self.web.telemetry_path;
        if !path.starts_with('/') {
            bail!("web.telemetry_path must start with '/': {path}");
        }
        if path == "/" || path == "/healthz" {
            bail!("web.telemetry_path must not shadow {path}");
        }

        Ok(())
    }
}

/// Expands a comma-separated address list into scrape targets.
///
/// Entries are trimmed and empty ones dropped. Absolute paths containing `*`
/// are replaced by their matches. Duplicates keep their first position.
pub fn resolve_addresses(list: &str) -> Result<Vec<String>> {
    let mut addresses: Vec<String> = Vec::new();

    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if !(entry.starts_with('/') && entry.contains('*')) {
            push_unique(&mut addresses, entry.to_string());
            continue;
        }

        let paths =
            glob::glob(entry).with_context(|| format!("invalid socket pattern {entry}"))?;

        let before = addresses.len();
        for path in paths {
            match path {
                Ok(path) => push_unique(&mut addresses, path.to_string_lossy().into_owned()),
                Err(e) => warn!(pattern = entry, error = %e, "skipping unreadable path"),
            }
        }

        if addresses.len() == before {
            warn!(pattern = entry, "socket pattern matched nothing");
        }
    }

    Ok(addresses)
}

fn push_unique(addresses: &mut Vec<String>, address: String) {
    if !addresses.contains(&address) {
        addresses.push(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.memcached.address, "localhost:11211");
        assert_eq!(cfg.memcached.timeout, Duration::from_secs(1));
        assert_eq!(cfg.memcached.slab_cas_accounting, CasAccounting::HitsAndBadval);
        assert_eq!(cfg.web.listen_address, ":9150");
        assert_eq!(cfg.web.telemetry_path, "/metrics");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let cfg: Config = serde_yaml::from_str(
            r#"
log_level: debug
memcached:
  address: "a:11211, b:11211"
  timeout: 250ms
  slab_cas_accounting: all
web:
  listen_address: "127.0.0.1:9999"
"#,
        )
        .expect("parse");

        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.memcached.timeout, Duration::from_millis(250));
        assert_eq!(cfg.memcached.slab_cas_accounting, CasAccounting::All);
        assert_eq!(cfg.web.listen_address, "127.0.0.1:9999");
        assert_eq!(cfg.web.telemetry_path, "/metrics");
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").expect("parse");
        assert_eq!(cfg.memcached.address, "localhost:11211");
        assert_eq!(cfg.web.listen_address, ":9150");
    }

    #[test]
    fn test_unknown_cas_accounting_rejected() {
        let result: std::result::Result<Config, _> =
            serde_yaml::from_str("memcached:\n  slab_cas_accounting: some\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut cfg = Config::default();
        cfg.memcached.timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_telemetry_path() {
        for path in ["metrics", "/", "/healthz"] {
            let mut cfg = Config::default();
            cfg.web.telemetry_path = path.to_string();
            assert!(cfg.validate().is_err(), "{path} should be rejected");
        }

        let mut cfg = Config::default();
        cfg.web.telemetry_path = "/custom".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_tls() {
        let cfg: Config = serde_yaml::from_str(
            r#"
memcached:
  address: "cache:11211"
  tls:
    enabled: true
    ca_file: /etc/memcached/ca.pem
    server_name: cache.internal
"#,
        )
        .expect("parse");

        let tls = &cfg.memcached.tls;
        assert!(tls.enabled);
        assert_eq!(tls.ca_file.as_deref(), Some(Path::new("/etc/memcached/ca.pem")));
        assert_eq!(tls.server_name.as_deref(), Some("cache.internal"));
        assert!(tls.cert_file.is_none());
        assert!(cfg.validate().is_ok());

        assert!(!Config::default().memcached.tls.enabled);
    }

    #[test]
    fn test_validate_tls_cert_without_key() {
        let mut cfg = Config::default();
        cfg.memcached.tls.enabled = true;
        cfg.memcached.tls.cert_file = Some(PathBuf::from("/etc/memcached/client.pem"));
        assert!(cfg.validate().is_err());

        cfg.memcached.tls.key_file = Some(PathBuf::from("/etc/memcached/client.key"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_listen_address() {
        let mut cfg = Config::default();
        cfg.web.listen_address.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "memcached:\n  address: cache:11211\n").expect("write");

        let cfg = Config::load(&path).expect("load");
        assert_eq!(cfg.memcached.address, "cache:11211");
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "web:\n  telemetry_path: /\n").expect("write");

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_resolve_addresses_split_and_trim() {
        let addresses = resolve_addresses(" a:11211 ,,b:11211, a:11211,").expect("resolve");
        assert_eq!(addresses, vec!["a:11211", "b:11211"]);
    }

    #[test]
    fn test_resolve_addresses_empty() {
        assert!(resolve_addresses("").expect("resolve").is_empty());
        assert!(resolve_addresses(" , ").expect("resolve").is_empty());
    }

    #[test]
    fn test_resolve_addresses_glob() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.sock", "a.sock", "other.txt"] {
            std::fs::write(dir.path().join(name), "").expect("write");
        }
        let pattern = format!("{}/*.sock", dir.path().display());
        let a = dir.path().join("a.sock").display().to_string();
        let b = dir.path().join("b.sock").display().to_string();

        let addresses =
            resolve_addresses(&format!("tcp:11211,{pattern},{a}")).expect("resolve");

        assert_eq!(addresses, vec!["tcp:11211".to_string(), a, b]);
    }

    #[test]
    fn test_resolve_addresses_glob_without_matches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pattern = format!("{}/*.sock", dir.path().display());

        assert!(resolve_addresses(&pattern).expect("resolve").is_empty());
    }

    #[test]
    fn test_relative_star_is_literal() {
        let addresses = resolve_addresses("cache-*:11211").expect("resolve");
        assert_eq!(addresses, vec!["cache-*:11211"]);
    }
}
