use anyhow::{Context, Result};
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::{Action, Permission, Resource};

/// Upper bound for `verification.ttl_seconds` (30 days).
pub const MAX_CODE_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub accounts: AccountsConfig,

    pub verification: VerificationConfig,

    pub blog: BlogConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/bookshelves.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Group every new account joins.
    pub default_group: String,

    /// Granted to the default group by `init-groups`, written as
    /// `"app.model.action"`. Unknown entries fail config loading.
    pub default_group_permissions: Vec<Permission>,

    /// Maximum mobile number length.
    pub mobile_length: usize,

    pub mobile_pattern: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            default_group: "users".to_string(),
            default_group_permissions: vec![
                Permission::new(Resource::Post, Action::View),
                Permission::new(Resource::Comment, Action::Add),
                Permission::new(Resource::Comment, Action::View),
                Permission::new(Resource::Star, Action::Add),
                Permission::new(Resource::Address, Action::Add),
            ],
            mobile_length: 15,
            mobile_pattern: r"^\+?[0-9]+$".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Inclusive lower bound of the numeric code.
    pub code_min: u32,

    /// Inclusive upper bound of the numeric code.
    pub code_max: u32,

    pub ttl_seconds: u64,

    /// Base64 encoded 32-byte ChaCha20-Poly1305 key.
    /// When empty a random key is generated at startup, so codes issued
    /// before a restart stop being redeemable.
    pub secret_key: String,

    /// "memory" or "database"
    pub cache_backend: String,

    /// "log" or "webhook"
    pub notifier: String,

    pub webhook_url: String,

    pub webhook_timeout_seconds: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_min: 100_000,
            code_max: 999_999,
            ttl_seconds: 24 * 60 * 60,
            secret_key: String::new(),
            cache_backend: "memory".to_string(),
            notifier: "log".to_string(),
            webhook_url: String::new(),
            webhook_timeout_seconds: 10,
        }
    }
}

impl VerificationConfig {
    /// Decodes the configured key, `None` when no key is configured.
    pub fn decode_secret_key(&self) -> Result<Option<[u8; 32]>> {
        if self.secret_key.trim().is_empty() {
            return Ok(None);
        }

        let bytes = Base64::decode_vec(self.secret_key.trim())
            .map_err(|e| anyhow::anyhow!("verification.secret_key is not valid base64: {e}"))?;

        let key: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            anyhow::anyhow!(
                "verification.secret_key must decode to 32 bytes, got {}",
                bytes.len()
            )
        })?;

        Ok(Some(key))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    pub star_min: i32,

    pub star_max: i32,

    /// Posts of a deleted category are moved here.
    pub deleted_post_category: String,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            star_min: 1,
            star_max: 5,
            deleted_post_category: "deleted".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "bookshelves".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    /// Loads from `explicit` when given, otherwise the first existing file
    /// among the default locations, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from: {}", path.display());
            return Self::load_from_path(path);
        }

        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("bookshelves").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".bookshelves").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let v = &self.verification;

        if v.code_min > v.code_max {
            anyhow::bail!(
                "verification.code_min ({}) must not exceed code_max ({})",
                v.code_min,
                v.code_max
            );
        }

        if v.ttl_seconds == 0 {
            anyhow::bail!("verification.ttl_seconds must be > 0");
        }

        if v.ttl_seconds > MAX_CODE_TTL_SECONDS {
            anyhow::bail!(
                "verification.ttl_seconds ({}) must not exceed {MAX_CODE_TTL_SECONDS}",
                v.ttl_seconds
            );
        }

        v.decode_secret_key()?;

        match v.cache_backend.as_str() {
            "memory" | "database" => {}
            other => anyhow::bail!("Unknown verification.cache_backend '{other}'"),
        }

        match v.notifier.as_str() {
            "log" => {}
            "webhook" => {
                if v.webhook_url.is_empty() {
                    anyhow::bail!("verification.webhook_url cannot be empty when notifier is webhook");
                }
                url::Url::parse(&v.webhook_url).context("Invalid verification.webhook_url")?;
            }
            other => anyhow::bail!("Unknown verification.notifier '{other}'"),
        }

        if self.blog.star_min > self.blog.star_max {
            anyhow::bail!("blog.star_min must not exceed blog.star_max");
        }

        if self.accounts.default_group.trim().is_empty() {
            anyhow::bail!("accounts.default_group cannot be empty");
        }

        if self.accounts.mobile_length == 0 {
            anyhow::bail!("accounts.mobile_length must be > 0");
        }

        regex::Regex::new(&self.accounts.mobile_pattern)
            .context("Invalid accounts.mobile_pattern")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.accounts.default_group, "users");
        assert_eq!(config.verification.code_min, 100_000);
        assert_eq!(config.verification.code_max, 999_999);
        assert_eq!(config.blog.star_max, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[accounts]"));
        assert!(toml_str.contains("[verification]"));
        assert!(toml_str.contains("\"blog.comment.add\""));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [accounts]
            default_group = "readers"
            default_group_permissions = ["blog.post.view", "account.address.add"]

            [verification]
            ttl_seconds = 60
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.accounts.default_group, "readers");
        assert_eq!(config.accounts.default_group_permissions.len(), 2);
        assert_eq!(config.verification.ttl_seconds, 60);

        assert_eq!(config.verification.code_max, 999_999);
    }

    #[test]
    fn test_unknown_permission_fails_loading() {
        let toml_str = r#"
            [accounts]
            default_group_permissions = ["blog.post.publish"]
        "#;

        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_ranges() {
        let mut config = Config::default();
        config.verification.code_min = 10;
        config.verification.code_max = 9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.blog.star_min = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_code_ttl() {
        let mut config = Config::default();
        config.verification.ttl_seconds = 0;
        assert!(config.validate().is_err());

        config.verification.ttl_seconds = MAX_CODE_TTL_SECONDS;
        assert!(config.validate().is_ok());

        config.verification.ttl_seconds = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_key_must_be_32_bytes() {
        let mut config = Config::default();
        config.verification.secret_key = Base64::encode_string(&[7u8; 16]);
        assert!(config.validate().is_err());

        config.verification.secret_key = Base64::encode_string(&[7u8; 32]);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.verification.decode_secret_key().unwrap(),
            Some([7u8; 32])
        );
    }

    #[test]
    fn test_webhook_requires_url() {
        let mut config = Config::default();
        config.verification.notifier = "webhook".to_string();
        assert!(config.validate().is_err());

        config.verification.webhook_url = "https://notify.example.com/codes".to_string();
        assert!(config.validate().is_ok());
    }
}
