// src/config.rs
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    #[serde(default = "default_list_cache_capacity")]
    pub list_cache_capacity: u64,
    #[serde(default = "default_list_cache_ttl_secs")]
    pub list_cache_ttl_secs: u64,
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    8080
}

fn default_list_cache_capacity() -> u64 {
    1000
}

fn default_list_cache_ttl_secs() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn list_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.list_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config: Config =
            envy::from_iter(vars(&[("DATABASE_URL", "postgres://localhost/hub")])).unwrap();
        assert_eq!(config.bind_host, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.list_cache_capacity, 1000);
        assert_eq!(config.list_cache_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_parsed() {
        let config: Config = envy::from_iter(vars(&[
            ("DATABASE_URL", "postgres://db/hub"),
            ("BIND_PORT", "9000"),
            ("LIST_CACHE_TTL_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.list_cache_ttl_secs, 5);
    }

    #[test]
    fn database_url_is_required() {
        assert!(envy::from_iter::<_, Config>(vars(&[("BIND_PORT", "9000")])).is_err());
    }
}
