use lodge_core::RetryPolicy;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub kafka: Option<KafkaConfig>,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeConfig {
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "default_expiring_soon_seconds")]
    pub expiring_soon_seconds: u64,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

fn default_broadcast_capacity() -> usize {
    256
}
fn default_expiring_soon_seconds() -> u64 {
    120
}
fn default_tick_millis() -> u64 {
    1000
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: default_broadcast_capacity(),
            expiring_soon_seconds: default_expiring_soon_seconds(),
            tick_millis: default_tick_millis(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// TTL applied to a session's reservation cache entries.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
}

fn default_session_ttl() -> u64 {
    86_400
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_capacity_topic")]
    pub capacity_topic: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
}

fn default_capacity_topic() -> String {
    "package.capacity".to_string()
}
fn default_group_id() -> String {
    "lodge-realtime".to_string()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `LODGE_SERVER__PORT=8080` sets `server.port`
            .add_source(config::Environment::with_prefix("LODGE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let s = config::Config::builder()
            .add_source(config::File::from_str("[server]\nport = 8080\n", config::FileFormat::Toml))
            .build()
            .unwrap();
        let cfg: Config = s.try_deserialize().unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.database.is_none());
        assert!(cfg.kafka.is_none());
        assert_eq!(cfg.realtime.expiring_soon_seconds, 120);
        assert_eq!(cfg.realtime.tick_millis, 1000);
        assert_eq!(cfg.retry.max_attempts, 1);
    }

    #[test]
    fn test_kafka_section_defaults() {
        let toml = "[server]\nport = 1\n[kafka]\nbrokers = \"localhost:9092\"\n";
        let s = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap();
        let cfg: Config = s.try_deserialize().unwrap();
        let kafka = cfg.kafka.unwrap();
        assert_eq!(kafka.capacity_topic, "package.capacity");
        assert_eq!(kafka.group_id, "lodge-realtime");
    }
}
