use crate::domain::entities::BackendEntry;
use crate::domain::value_objects::{ProxyMode, StorageKind};
use anyhow::{anyhow, Context};
use std::time::Duration;

/// Backends seeded into an empty registry when none are configured.
pub const DEFAULT_BACKENDS: &str =
    "webserver1|http://192.168.178.28|70,webserver2|http://192.168.178.137|30";

#[derive(Debug, Clone)]
pub struct Config {
    // Listeners
    pub listen_addr: String,
    pub api_listen_addr: String,
    pub mode: ProxyMode,

    // Registry storage
    pub storage: StorageKind,
    pub db_path: String,
    pub default_backends: Vec<BackendEntry>,

    // Health monitor
    pub health_interval_secs: u64,
    pub probe_timeout_ms: u64,
    pub restore_evicted: bool,

    // Relay
    pub relay_timeout_secs: u64,

    pub debug: bool,
}

impl Config {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            api_listen_addr: "0.0.0.0:5000".to_string(),
            mode: ProxyMode::Proxy,
            storage: StorageKind::Sqlite,
            db_path: "loadbalancer.db".to_string(),
            default_backends: parse_backends(DEFAULT_BACKENDS).unwrap_or_default(),
            health_interval_secs: 30,
            probe_timeout_ms: 2000,
            restore_evicted: false,
            relay_timeout_secs: 10,
            debug: false,
        }
    }
}

/// Parse `name|url|weight` triples separated by commas.
///
/// Blank items are skipped, so an empty string yields no backends.
pub fn parse_backends(list: &str) -> anyhow::Result<Vec<BackendEntry>> {
    let mut entries = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let parts: Vec<&str> = item.split('|').map(str::trim).collect();
        let [name, url, weight] = parts.as_slice() else {
            return Err(anyhow!("expected name|url|weight, got {:?}", item));
        };
        let weight: i64 = weight
            .parse()
            .with_context(|| format!("invalid weight in {:?}", item))?;
        entries.push(BackendEntry::new(*name, *url, weight)?);
    }
    Ok(entries)
}

fn parse_flag(v: &str) -> bool {
    v == "1" || v.to_lowercase() == "true"
}

pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Build the configuration from an arbitrary variable lookup.
pub fn load_config_from<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let listen_addr = var("SPEEDBALANCER_LISTEN_ADDR")
        .unwrap_or_else(|| "0.0.0.0:8080".to_string());

    let api_listen_addr = var("SPEEDBALANCER_API_LISTEN_ADDR")
        .unwrap_or_else(|| "0.0.0.0:5000".to_string());

    let mode = match var("SPEEDBALANCER_MODE") {
        Some(v) => ProxyMode::parse(&v)
            .ok_or_else(|| anyhow!("SPEEDBALANCER_MODE must be proxy or redirect, got {:?}", v))?,
        None => ProxyMode::Proxy,
    };

    let storage = match var("SPEEDBALANCER_STORAGE") {
        Some(v) => StorageKind::parse(&v)
            .ok_or_else(|| anyhow!("SPEEDBALANCER_STORAGE must be sqlite or memory, got {:?}", v))?,
        None => StorageKind::Sqlite,
    };

    let db_path = var("SPEEDBALANCER_DB_PATH")
        .unwrap_or_else(|| "loadbalancer.db".to_string());

    let default_backends = parse_backends(
        &var("SPEEDBALANCER_DEFAULT_BACKENDS").unwrap_or_else(|| DEFAULT_BACKENDS.to_string()),
    )
    .context("SPEEDBALANCER_DEFAULT_BACKENDS")?;

    let health_interval_secs: u64 = var("SPEEDBALANCER_HEALTH_INTERVAL_SECS")
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(30);

    let probe_timeout_ms: u64 = var("SPEEDBALANCER_PROBE_TIMEOUT_MS")
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(2000);

    let restore_evicted = var("SPEEDBALANCER_RESTORE_EVICTED")
        .map(|v| parse_flag(&v))
        .unwrap_or(false);

    let relay_timeout_secs: u64 = var("SPEEDBALANCER_RELAY_TIMEOUT_SECS")
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(10);

    let debug = var("DEBUG").is_some();

    Ok(Config {
        listen_addr,
        api_listen_addr,
        mode,
        storage,
        db_path,
        default_backends,
        health_interval_secs,
        probe_timeout_ms,
        restore_evicted,
        relay_timeout_secs,
        debug,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_config_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.api_listen_addr, "0.0.0.0:5000");
        assert_eq!(cfg.mode, ProxyMode::Proxy);
        assert_eq!(cfg.storage, StorageKind::Sqlite);
        assert_eq!(cfg.default_backends.len(), 2);
        assert!(!cfg.restore_evicted);
    }

    #[test]
    fn test_load_config_defaults() {
        let cfg = load_with(&[]).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.db_path, "loadbalancer.db");
        assert_eq!(cfg.health_interval(), Duration::from_secs(30));
        assert_eq!(cfg.probe_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.relay_timeout(), Duration::from_secs(10));
        assert!(!cfg.debug);
        assert_eq!(
            cfg.default_backends,
            vec![
                BackendEntry::new("webserver1", "http://192.168.178.28", 70).unwrap(),
                BackendEntry::new("webserver2", "http://192.168.178.137", 30).unwrap(),
            ]
        );
    }

    #[test]
    fn test_load_config_with_custom_listeners() {
        let cfg = load_with(&[
            ("SPEEDBALANCER_LISTEN_ADDR", "127.0.0.1:9000"),
            ("SPEEDBALANCER_API_LISTEN_ADDR", "127.0.0.1:9001"),
        ])
        .unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
        assert_eq!(cfg.api_listen_addr, "127.0.0.1:9001");
    }

    #[test]
    fn test_load_config_with_redirect_mode() {
        let cfg = load_with(&[("SPEEDBALANCER_MODE", "Redirect")]).unwrap();
        assert_eq!(cfg.mode, ProxyMode::Redirect);
    }

    #[test]
    fn test_load_config_unknown_mode_is_error() {
        assert!(load_with(&[("SPEEDBALANCER_MODE", "tunnel")]).is_err());
    }

    #[test]
    fn test_load_config_with_memory_storage() {
        let cfg = load_with(&[("SPEEDBALANCER_STORAGE", "memory")]).unwrap();
        assert_eq!(cfg.storage, StorageKind::Memory);
    }

    #[test]
    fn test_load_config_unknown_storage_is_error() {
        assert!(load_with(&[("SPEEDBALANCER_STORAGE", "redis")]).is_err());
    }

    #[test]
    fn test_load_config_with_timeouts() {
        let cfg = load_with(&[
            ("SPEEDBALANCER_HEALTH_INTERVAL_SECS", "5"),
            ("SPEEDBALANCER_PROBE_TIMEOUT_MS", "250"),
            ("SPEEDBALANCER_RELAY_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(cfg.health_interval(), Duration::from_secs(5));
        assert_eq!(cfg.probe_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.relay_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_load_config_parse_error_uses_default() {
        let cfg = load_with(&[("SPEEDBALANCER_HEALTH_INTERVAL_SECS", "not_a_number")]).unwrap();
        assert_eq!(cfg.health_interval_secs, 30); // default
    }

    #[test]
    fn test_load_config_zero_uses_default() {
        let cfg = load_with(&[
            ("SPEEDBALANCER_HEALTH_INTERVAL_SECS", "0"),
            ("SPEEDBALANCER_RELAY_TIMEOUT_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(cfg.health_interval_secs, 30);
        assert_eq!(cfg.relay_timeout_secs, 10);
    }

    #[test]
    fn test_load_config_with_restore_evicted() {
        assert!(load_with(&[("SPEEDBALANCER_RESTORE_EVICTED", "1")]).unwrap().restore_evicted);
        assert!(load_with(&[("SPEEDBALANCER_RESTORE_EVICTED", "TRUE")]).unwrap().restore_evicted);
        assert!(!load_with(&[("SPEEDBALANCER_RESTORE_EVICTED", "no")]).unwrap().restore_evicted);
    }

    #[test]
    fn test_load_config_with_debug() {
        let cfg = load_with(&[("DEBUG", "1")]).unwrap();
        assert!(cfg.debug);
    }

    #[test]
    fn test_load_config_with_custom_backends() {
        let cfg = load_with(&[(
            "SPEEDBALANCER_DEFAULT_BACKENDS",
            "a|http://10.0.0.1:8000|3, b|http://10.0.0.2:8000|1",
        )])
        .unwrap();
        assert_eq!(cfg.default_backends.len(), 2);
        assert_eq!(cfg.default_backends[0].url, "http://10.0.0.1:8000");
        assert_eq!(cfg.default_backends[1].weight, 1);
    }

    #[test]
    fn test_load_config_with_empty_backends() {
        let cfg = load_with(&[("SPEEDBALANCER_DEFAULT_BACKENDS", "")]).unwrap();
        assert!(cfg.default_backends.is_empty());
    }

    #[test]
    fn test_parse_backends_rejects_bad_items() {
        assert!(parse_backends("only-a-name").is_err());
        assert!(parse_backends("a|http://x|heavy").is_err());
        assert!(parse_backends("a|http://x|0").is_err());
        assert!(parse_backends("a||1").is_err());
    }

    #[test]
    fn test_load_config_from_process_env() {
        std::env::set_var("SPEEDBALANCER_DB_PATH", "/tmp/speedbalancer-test.db");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.db_path, "/tmp/speedbalancer-test.db");
        std::env::remove_var("SPEEDBALANCER_DB_PATH");
    }

    #[test]
    fn test_config_clone() {
        let cfg = Config::default();
        let cloned = cfg.clone();
        assert_eq!(cfg.listen_addr, cloned.listen_addr);
        assert_eq!(cfg.default_backends, cloned.default_backends);
    }
}
