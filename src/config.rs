use std::{env, fmt::Display, str::FromStr, time::Duration};

const DEFAULT_DATABASE_URL: &str = "sqlite://quotebook.db?mode=rwc";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_address: String,
    pub port: u16,
    pub cookie_max_age: Duration,
    pub otlp_endpoint: Option<String>,
    /// Settings that fell back to their defaults, as `(key, default)`.
    pub defaulted: Vec<(&'static str, &'static str)>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut loader = Loader {
            lookup,
            defaulted: Vec::new(),
        };

        let cookie_max_age_days: u64 = loader.try_load("COOKIE_MAX_AGE_DAYS", "365")?;

        Ok(Self {
            database_url: loader.try_load("DATABASE_URL", DEFAULT_DATABASE_URL)?,
            max_connections: loader.try_load("DATABASE_MAX_CONNECTIONS", "20")?,
            bind_address: loader.try_load("BIND_ADDRESS", "0.0.0.0")?,
            port: loader.try_load("PORT", "8000")?,
            cookie_max_age: Duration::from_secs(cookie_max_age_days * 24 * 60 * 60),
            otlp_endpoint: loader.var("OTEL_EXPORTER_OTLP_ENDPOINT"),
            defaulted: loader.defaulted,
        })
    }

    /// Reports the defaulted settings. Config is read before the subscriber exists, so this
    /// runs once telemetry is up.
    pub fn log_defaults(&self) {
        for (key, default) in &self.defaulted {
            tracing::info!("{key} not set, using default: {default}");
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

struct Loader<F> {
    lookup: F,
    defaulted: Vec<(&'static str, &'static str)>,
}

impl<F: Fn(&str) -> Option<String>> Loader<F> {
    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn try_load<T: FromStr>(&mut self, key: &'static str, default: &'static str) -> anyhow::Result<T>
    where
        T::Err: Display,
    {
        let raw = self.var(key).unwrap_or_else(|| {
            self.defaulted.push((key, default));
            default.to_string()
        });

        parse_value(key, &raw)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}"))
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            cookie_max_age: Duration::from_secs(365 * 24 * 60 * 60),
            otlp_endpoint: None,
            defaulted: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_values() {
        let port: u16 = parse_value("PORT", " 8080 ").unwrap();

        assert_eq!(port, 8080);
    }

    #[test]
    fn malformed_value_names_the_variable() {
        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();

        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn listen_address_joins_host_and_port() {
        let config = Config {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            ..Config::for_tests()
        };

        assert_eq!(config.listen_address(), "0.0.0.0:8000");
    }

    #[test]
    fn unset_values_fall_back_and_are_recorded() {
        let config = Config::from_lookup(|key| match key {
            "PORT" => Some("9000".to_string()),
            "BIND_ADDRESS" => Some("   ".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.otlp_endpoint.is_none());
        assert!(config.defaulted.contains(&("BIND_ADDRESS", "0.0.0.0")));
        assert!(!config.defaulted.iter().any(|(key, _)| *key == "PORT"));
    }

    #[test]
    fn malformed_environment_value_fails_loading() {
        let err = Config::from_lookup(|key| (key == "DATABASE_MAX_CONNECTIONS").then(|| "many".to_string()))
            .unwrap_err();

        assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));
    }
}
