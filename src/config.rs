//! Service configuration, loaded from the environment.
//!
//! Mirrors the teacher's `Config::from_env` shape (read each variable with a
//! sane default, parse, fail fast on a malformed value) extended to the
//! full enumerated list in spec §6.

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub metrics_port: u16,

    pub quality_threshold_real: u8,
    pub quality_threshold_recovery: u8,
    pub coordinates_threshold: u8,
    pub schedules_threshold: u8,

    pub cache_ttl_seconds: u64,
    pub cache_key: String,
    pub cache_enabled: bool,
    pub dragonfly_url: String,
    pub dragonfly_pass: Option<String>,

    pub hub_city_name: String,
    pub region_center_lat: f64,
    pub region_center_lon: f64,

    pub sync_worker_interval_seconds: u64,

    pub search_timeout_ms: u64,
    pub search_k_alternatives: usize,

    pub catalog_fetch_timeout_secs: u64,
    pub cache_op_timeout_secs: u64,

    pub fallback_data_dir: String,
    pub primary_catalog_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            http_port: env_parse("HTTP_PORT", "8080")?,
            metrics_port: env_parse("METRICS_PORT", "9090")?,

            quality_threshold_real: env_parse("QUALITY_THRESHOLD_REAL", "90")?,
            quality_threshold_recovery: env_parse("QUALITY_THRESHOLD_RECOVERY", "50")?,
            coordinates_threshold: env_parse("COORDINATES_THRESHOLD", "50")?,
            schedules_threshold: env_parse("SCHEDULES_THRESHOLD", "50")?,

            cache_ttl_seconds: env_parse("CACHE_TTL_SECONDS", "3600")?,
            cache_key: std::env::var("CACHE_KEY").unwrap_or_else(|_| "transport-dataset".into()),
            cache_enabled: env_parse_bool("CACHE_ENABLED", true)?,
            dragonfly_url: std::env::var("DRAGONFLY_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            dragonfly_pass: std::env::var("DRAGONFLY_PASS").ok(),

            hub_city_name: std::env::var("HUB_CITY_NAME").unwrap_or_else(|_| "якутск".to_string()),
            region_center_lat: env_parse("REGION_CENTER_LAT", "62.0")?,
            region_center_lon: env_parse("REGION_CENTER_LON", "129.0")?,

            sync_worker_interval_seconds: env_parse("SYNC_WORKER_INTERVAL_SECONDS", "3600")?,

            search_timeout_ms: env_parse("SEARCH_TIMEOUT_MS", "30000")?,
            search_k_alternatives: env_parse("SEARCH_K_ALTERNATIVES", "3")?,

            catalog_fetch_timeout_secs: env_parse("CATALOG_FETCH_TIMEOUT_SECS", "10")?,
            cache_op_timeout_secs: env_parse("CACHE_OP_TIMEOUT_SECS", "5")?,

            fallback_data_dir: std::env::var("FALLBACK_DATA_DIR")
                .unwrap_or_else(|_| "./demo-data".to_string()),
            primary_catalog_url: std::env::var("PRIMARY_CATALOG_URL").ok(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))
}

fn env_parse_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("invalid boolean for {key}: {other}"),
        },
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            http_port: 8080,
            metrics_port: 9090,
            quality_threshold_real: 90,
            quality_threshold_recovery: 50,
            coordinates_threshold: 50,
            schedules_threshold: 50,
            cache_ttl_seconds: 3600,
            cache_key: "transport-dataset".to_string(),
            cache_enabled: true,
            dragonfly_url: "redis://localhost:6379".to_string(),
            dragonfly_pass: None,
            hub_city_name: "якутск".to_string(),
            region_center_lat: 62.0,
            region_center_lon: 129.0,
            sync_worker_interval_seconds: 3600,
            search_timeout_ms: 30000,
            search_k_alternatives: 3,
            catalog_fetch_timeout_secs: 10,
            cache_op_timeout_secs: 5,
            fallback_data_dir: "./demo-data".to_string(),
            primary_catalog_url: None,
        }
    }
}
