//! Runtime configuration.
//!
//! Values come from an optional TOML file, then selected `SEER_*` environment
//! variables, then built-in defaults for anything left unset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use seer_shared::{DEFAULT_GATEWAY_PORT, DEFAULT_LOGIN_PORT, DEFAULT_POLICY_PORT};

/// Config file used when neither the CLI nor `SEER_CONFIG` names one
pub const DEFAULT_CONFIG_PATH: &str = "configs/server.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    Env { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub log: LogConfig,
    pub gateway: GatewayConfig,
    pub login: LoginConfig,
    pub game: GameConfig,
    pub data: DataConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub address: String,
    pub max_connections: usize,
    pub read_buffer_bytes: usize,
    /// Deadline for the first complete frame
    pub handshake_timeout_secs: u64,
    /// Per-read idle limit after the handshake, 0 disables it
    pub idle_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{}", DEFAULT_GATEWAY_PORT),
            max_connections: 5000,
            read_buffer_bytes: 64 * 1024,
            handshake_timeout_secs: 5,
            idle_timeout_secs: 0,
        }
    }
}

impl GatewayConfig {
    pub fn handshake_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.handshake_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub address: String,
    pub policy_enabled: bool,
    pub policy_port: u16,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{}", DEFAULT_LOGIN_PORT),
            policy_enabled: true,
            policy_port: DEFAULT_POLICY_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub public_ip: String,
    pub port: u16,
    pub server_id: u32,
    pub spawn_map: u32,
    pub spawn_x: u32,
    pub spawn_y: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            public_ip: "127.0.0.1".to_string(),
            port: DEFAULT_GATEWAY_PORT,
            server_id: 1,
            spawn_map: 1,
            spawn_x: 300,
            spawn_y: 270,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub root: PathBuf,
    pub species_file: String,
    pub skills_file: String,
    pub types_file: String,
    pub bosses_file: String,
    pub ogres_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            species_file: "spt.xml".to_string(),
            skills_file: "skills.xml".to_string(),
            types_file: "elements.json".to_string(),
            bosses_file: "spt-boss.json".to_string(),
            ogres_file: "map-ogres.json".to_string(),
        }
    }
}

impl DataConfig {
    pub fn species_path(&self) -> PathBuf {
        self.root.join(&self.species_file)
    }

    pub fn skills_path(&self) -> PathBuf {
        self.root.join(&self.skills_file)
    }

    pub fn types_path(&self) -> PathBuf {
        self.root.join(&self.types_file)
    }

    pub fn bosses_path(&self) -> PathBuf {
        self.root.join(&self.bosses_file)
    }

    pub fn ogres_path(&self) -> PathBuf {
        self.root.join(&self.ogres_file)
    }
}

/// PostgreSQL settings; persistence stays in memory when `url` is unset
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

/// Redis settings; the player cache is skipped when `url` is unset
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub url: Option<String>,
}

impl ServerConfig {
    /// Load from `path` when it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Resolve the config path: CLI argument, then `SEER_CONFIG`, then the default.
    pub fn resolve_path(cli_arg: Option<String>) -> PathBuf {
        cli_arg
            .or_else(|| std::env::var("SEER_CONFIG").ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("SEER_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = lookup("SEER_GATEWAY_ADDRESS") {
            self.gateway.address = v;
        }
        if let Some(v) = lookup("SEER_LOGIN_ADDRESS") {
            self.login.address = v;
        }
        if let Some(v) = lookup("SEER_IDLE_TIMEOUT_SECS") {
            self.gateway.idle_timeout_secs = parse_env("SEER_IDLE_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("SEER_DATA_ROOT") {
            self.data.root = PathBuf::from(v);
        }
        if let Some(v) = lookup("SEER_DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Some(v) = lookup("SEER_CACHE_URL") {
            self.cache.url = Some(v);
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env { key, value })
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_deployment() {
        let config = ServerConfig::default();
        assert_eq!(config.gateway.address, "0.0.0.0:5000");
        assert_eq!(config.gateway.handshake_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.gateway.idle_timeout(), None);
        assert_eq!(config.login.policy_port, 843);
        assert_eq!(config.game.spawn_map, 1);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            [gateway]
            address = "127.0.0.1:6000"
            idle_timeout_secs = 300

            [database]
            url = "postgres://seer@localhost/seer"
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.address, "127.0.0.1:6000");
        assert_eq!(config.gateway.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.gateway.max_connections, 5000);
        assert_eq!(config.database.url.as_deref(), Some("postgres://seer@localhost/seer"));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SEER_LOG_LEVEL", "debug"),
            ("SEER_IDLE_TIMEOUT_SECS", "60"),
            ("SEER_CACHE_URL", "redis://localhost:6379"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.gateway.idle_timeout_secs, 60);
        assert_eq!(config.cache.url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn test_bad_env_number_is_rejected() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_env(|key| (key == "SEER_IDLE_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "SEER_IDLE_TIMEOUT_SECS", .. }));
    }
}
