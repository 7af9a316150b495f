//! Application configuration loaded from environment variables.

use std::time::Duration;

use orchestrator::OrchestratorConfig;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default: `0.0.0.0:8082`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for plain text
/// - `DATABASE_URLS`: comma-separated, one URL per partition; unset keeps
///   orders in memory across `PARTITION_COUNT` partitions (default: 3)
/// - `DATABASE_MAX_CONNECTIONS`: pool size per partition (default: 10)
/// - `REDIS_URL`: idempotency cache; unset uses an in-memory cache
/// - `KAFKA_BROKERS`, `KAFKA_TOPIC`: event sink; unset brokers keep events
///   in memory (default topic: `order-topic`)
/// - `INVENTORY_SERVICE_URL`, `PRICING_SERVICE_URL`: collaborators
/// - `COLLABORATOR_TIMEOUT_MS`: per-call timeout (default: 5000)
/// - `IDEMPOTENCY_TTL_SECS`: token reservation window (default: 86400)
/// - `FANOUT_MAX_IN_FLIGHT`: concurrent collaborator calls per request
///   (default: unbounded)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_urls: Vec<String>,
    pub database_max_connections: u32,
    pub partition_count: usize,
    pub redis_url: Option<String>,
    pub kafka_brokers: Option<String>,
    pub kafka_topic: String,
    pub inventory_service_url: String,
    pub pricing_service_url: String,
    pub collaborator_timeout: Duration,
    pub idempotency_ttl: Duration,
    pub fanout_max_in_flight: Option<usize>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: var("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            database_urls: var("DATABASE_URLS")
                .map(|urls| {
                    urls.split(',')
                        .map(str::trim)
                        .filter(|u| !u.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.database_urls),
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.database_max_connections),
            partition_count: parsed("PARTITION_COUNT")
                .map(|n| n as usize)
                .unwrap_or(defaults.partition_count),
            redis_url: var("REDIS_URL"),
            kafka_brokers: var("KAFKA_BROKERS"),
            kafka_topic: var("KAFKA_TOPIC").unwrap_or(defaults.kafka_topic),
            inventory_service_url: var("INVENTORY_SERVICE_URL")
                .unwrap_or(defaults.inventory_service_url),
            pricing_service_url: var("PRICING_SERVICE_URL")
                .unwrap_or(defaults.pricing_service_url),
            collaborator_timeout: parsed("COLLABORATOR_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.collaborator_timeout),
            idempotency_ttl: parsed("IDEMPOTENCY_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.idempotency_ttl),
            fanout_max_in_flight: parsed("FANOUT_MAX_IN_FLIGHT")
                .filter(|n| *n > 0)
                .map(|n| n as usize),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the orchestrator tunables.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            collaborator_timeout: self.collaborator_timeout,
            max_in_flight: self.fanout_max_in_flight,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_urls: Vec::new(),
            database_max_connections: 10,
            partition_count: 3,
            redis_url: None,
            kafka_brokers: None,
            kafka_topic: orchestrator::publisher::DEFAULT_TOPIC.to_string(),
            inventory_service_url: "http://localhost:8081".to_string(),
            pricing_service_url: "http://localhost:8083".to_string(),
            collaborator_timeout: Duration::from_millis(5000),
            idempotency_ttl: orchestrator::idempotency::DEFAULT_TTL,
            fanout_max_in_flight: None,
        }
    }
}
