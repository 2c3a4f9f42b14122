use bigdecimal::BigDecimal;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 默认增值税率 21%
pub const DEFAULT_VAT_RATE: &str = "0.21";
/// |proof - invoiced| 小于该值视为一致
pub const DEFAULT_OK_THRESHOLD: &str = "1000";
/// invoiced < proof × 该比例 视为部分开票
pub const DEFAULT_PARTIAL_THRESHOLD: &str = "0.5";
/// 单份发票文本处理上限
pub const DEFAULT_MAX_TEXT_BYTES: usize = 2 * 1024 * 1024;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// 对账业务容差与税率, 可按部署覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub vat_rate: BigDecimal,
    pub ok_threshold: BigDecimal,
    pub partial_threshold: BigDecimal,
    pub max_text_bytes: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            vat_rate: decimal(DEFAULT_VAT_RATE),
            ok_threshold: decimal(DEFAULT_OK_THRESHOLD),
            partial_threshold: decimal(DEFAULT_PARTIAL_THRESHOLD),
            max_text_bytes: DEFAULT_MAX_TEXT_BYTES,
        }
    }
}

fn decimal(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap_or_default()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/carrier_costs".to_string()),
                max_connections: 20,
                acquire_timeout_secs: 10,
            },
            policy: PolicyConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 → config/recon.* → RECON__* 环境变量 → DATABASE_URL
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/recon")
    }

    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port)?
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", defaults.database.max_connections)?
            .set_default(
                "database.acquire_timeout_secs",
                defaults.database.acquire_timeout_secs,
            )?
            .set_default("policy.vat_rate", DEFAULT_VAT_RATE)?
            .set_default("policy.ok_threshold", DEFAULT_OK_THRESHOLD)?
            .set_default("policy.partial_threshold", DEFAULT_PARTIAL_THRESHOLD)?
            .set_default("policy.max_text_bytes", DEFAULT_MAX_TEXT_BYTES as u64)?
            .add_source(File::with_name(file_stem).required(false))
            .add_source(
                Environment::with_prefix("RECON")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()
    }
}
