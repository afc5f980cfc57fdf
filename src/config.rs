//! Binary configuration: TOML file with environment overrides.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// TCP address to serve on. Unset means stdio.
    pub listen: Option<SocketAddr>,
    /// `tracing` filter directive, e.g. `info` or `scaffold_bridge=debug`.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self { listen: None, log_filter: "info".to_owned() }
    }
}

impl Config {
    /// Defaults, then the TOML file (when given), then env overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.override_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn override_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(listen) = get("SCAFFOLD_BRIDGE_LISTEN") {
            match listen.parse() {
                Ok(addr) => self.listen = Some(addr),
                Err(err) => {
                    tracing::warn!(%listen, %err, "ignoring unparseable SCAFFOLD_BRIDGE_LISTEN");
                }
            }
        }
        if let Some(filter) = get("SCAFFOLD_BRIDGE_LOG") {
            self.log_filter = filter;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_to_stdio_and_info() {
        let config = Config::default();
        assert!(config.listen.is_none());
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn file_values_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen = \"127.0.0.1:9321\"\nlog_filter = \"debug\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.listen, Some("127.0.0.1:9321".parse().unwrap()));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listne = \"127.0.0.1:9321\"").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config { listen: None, log_filter: "info".into() };
        config.override_from(|key| match key {
            "SCAFFOLD_BRIDGE_LISTEN" => Some("0.0.0.0:4000".into()),
            "SCAFFOLD_BRIDGE_LOG" => Some("trace".into()),
            _ => None,
        });
        assert_eq!(config.listen, Some("0.0.0.0:4000".parse().unwrap()));
        assert_eq!(config.log_filter, "trace");
    }

    #[test]
    fn bad_env_address_is_ignored() {
        let mut config = Config::default();
        config.override_from(|key| {
            (key == "SCAFFOLD_BRIDGE_LISTEN").then(|| "not-an-addr".to_owned())
        });
        assert!(config.listen.is_none());
    }
}
