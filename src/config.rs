use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Total per-request timeout, retries included.
    /// Set via HTTPCALL_REQUEST_TIMEOUT_SECS. Default: 30.
    pub request_timeout_secs: u64,
    /// Set via HTTPCALL_CONNECT_TIMEOUT_SECS. Default: 5.
    pub connect_timeout_secs: u64,
    /// Retries on transient upstream failures. 0 = disabled.
    /// Set via HTTPCALL_MAX_RETRIES. Default: 0.
    pub max_retries: u32,
    /// Emit logs as JSON lines. Set via HTTPCALL_LOG_JSON.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            max_retries: 0,
            log_json: false,
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|name| std::env::var(name).ok())
}

/// Build a config from any variable source; `load` uses the process env.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let defaults = Config::default();

    let cfg = Config {
        request_timeout_secs: parse_or(&lookup, "HTTPCALL_REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
        connect_timeout_secs: parse_or(&lookup, "HTTPCALL_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs)?,
        max_retries: parse_or(&lookup, "HTTPCALL_MAX_RETRIES", defaults.max_retries)?,
        log_json: lookup("HTTPCALL_LOG_JSON")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.log_json),
    };

    if cfg.request_timeout_secs == 0 {
        anyhow::bail!("HTTPCALL_REQUEST_TIMEOUT_SECS must be greater than zero");
    }
    Ok(cfg)
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T> {
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has invalid value '{}'", name, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.request_timeout_secs, 30);
        assert_eq!(cfg.connect_timeout_secs, 5);
        assert_eq!(cfg.max_retries, 0);
        assert!(!cfg.log_json);
    }

    #[test]
    fn test_overrides() {
        let cfg = from_lookup(lookup(&[
            ("HTTPCALL_REQUEST_TIMEOUT_SECS", "10"),
            ("HTTPCALL_MAX_RETRIES", " 3 "),
            ("HTTPCALL_LOG_JSON", "TRUE"),
        ]))
        .unwrap();
        assert_eq!(cfg.request_timeout_secs, 10);
        assert_eq!(cfg.max_retries, 3);
        assert!(cfg.log_json);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = from_lookup(lookup(&[("HTTPCALL_MAX_RETRIES", "lots")])).unwrap_err();
        assert!(err.to_string().contains("HTTPCALL_MAX_RETRIES"));
        assert!(from_lookup(lookup(&[("HTTPCALL_REQUEST_TIMEOUT_SECS", "0")])).is_err());
    }
}
