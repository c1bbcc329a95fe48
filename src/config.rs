//! Layered engine configuration: built-in defaults, overlaid by
//! `/etc/katmer/katmer.toml`, `~/.katmer.toml`, `./katmer.toml`, `KATMER_*`
//! environment variables, and finally CLI flags — each layer shallow-merging
//! over the last, later wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub inventory: Option<PathBuf>,
    pub remote_user: Option<String>,
    pub timeout_ms: u64,
    pub check_mode: bool,
    pub become_method: String,
    pub private_key: Option<PathBuf>,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inventory: None,
            remote_user: None,
            timeout_ms: 30_000,
            check_mode: false,
            become_method: "sudo".to_string(),
            private_key: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl EngineConfig {
    /// Loads the layered config: built-in defaults ⊕ `/etc/katmer/katmer.toml`
    /// ⊕ `~/.katmer.toml` ⊕ `./katmer.toml` ⊕ `KATMER_*` env vars. CLI flags
    /// are applied afterward by the caller via the `with_*` setters.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&EngineConfig::default()).map_err(to_error)?);

        for path in Self::layer_paths() {
            if path.exists() {
                builder = builder.add_source(config::File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("KATMER")
                .separator("_")
                .try_parsing(true),
        );

        let settled = builder.build().map_err(to_error)?;
        settled.try_deserialize().map_err(to_error)
    }

    fn layer_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/katmer/katmer.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".katmer.toml"));
        }
        paths.push(PathBuf::from("./katmer.toml"));
        paths
    }

    pub fn with_inventory(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.inventory = Some(path);
        }
        self
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        if let Some(timeout_ms) = timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        self
    }
}

fn to_error(e: config::ConfigError) -> Error {
    Error::config(format!("configuration error: {e}"))
}

/// Resolves an explicit `--config` path, bypassing the default layer search.
pub fn load_from(path: &Path) -> Result<EngineConfig> {
    let settled = config::Config::builder()
        .add_source(config::Config::try_from(&EngineConfig::default()).map_err(to_error)?)
        .add_source(config::File::from(path.to_path_buf()))
        .build()
        .map_err(to_error)?;
    settled.try_deserialize().map_err(to_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_timeout() {
        let config = EngineConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.become_method, "sudo");
    }

    #[test]
    fn with_setters_override_only_when_present() {
        let config = EngineConfig::default().with_check_mode(true).with_timeout_ms(None);
        assert!(config.check_mode);
        assert_eq!(config.timeout_ms, 30_000);
    }

    // Mutates process-wide env vars that `load()` reads; serialized so it
    // can't interleave with another test doing the same.
    #[test]
    #[serial_test::serial]
    fn load_picks_up_katmer_prefixed_env_vars() {
        std::env::set_var("KATMER_TIMEOUT_MS", "45000");
        std::env::set_var("KATMER_BECOME_METHOD", "doas");
        let config = EngineConfig::load().unwrap();
        std::env::remove_var("KATMER_TIMEOUT_MS");
        std::env::remove_var("KATMER_BECOME_METHOD");

        assert_eq!(config.timeout_ms, 45_000);
        assert_eq!(config.become_method, "doas");
    }
}
