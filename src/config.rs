use std::{env, fmt, fmt::Display, str::FromStr};

use log::{info, warn};

use crate::bus::DEFAULT_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBackend {
    Sqlite,
    Memory,
    Redis,
}

impl FromStr for ScoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown score backend '{}'", other)),
        }
    }
}

impl fmt::Display for ScoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
            Self::Redis => "redis",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub score_backend: ScoreBackend,
    pub redis_url: String,
    pub bus_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:live_poll.db".to_string(),
            bind_addr: "0.0.0.0:3333".to_string(),
            score_backend: ScoreBackend::Sqlite,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            bus_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Reads the environment; call after `dotenvy::dotenv()`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: try_load("DATABASE_URL", defaults.database_url),
            bind_addr: try_load("BIND_ADDR", defaults.bind_addr),
            score_backend: try_load("SCORE_BACKEND", defaults.score_backend),
            redis_url: try_load("REDIS_URL", defaults.redis_url),
            bus_capacity: try_load("BUS_CAPACITY", defaults.bus_capacity),
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    parse_or_default(key, env::var(key).ok(), default)
}

fn parse_or_default<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = raw else {
        info!("{} not set, using default: {}", key, default);
        return default;
    };

    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("Invalid {} value '{}': {}, using default: {}", key, raw, e, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_value_uses_default() {
        let capacity: usize = parse_or_default("BUS_CAPACITY", None, 256);
        assert_eq!(capacity, 256);
    }

    #[test]
    fn set_value_wins_over_default() {
        let capacity: usize = parse_or_default("BUS_CAPACITY", Some("16".into()), 256);
        assert_eq!(capacity, 16);
    }

    #[test]
    fn invalid_value_falls_back() {
        let capacity: usize = parse_or_default("BUS_CAPACITY", Some("lots".into()), 256);
        assert_eq!(capacity, 256);

        let backend = parse_or_default("SCORE_BACKEND", Some("mongo".into()), ScoreBackend::Sqlite);
        assert_eq!(backend, ScoreBackend::Sqlite);
    }

    #[test]
    fn backend_names_are_case_insensitive() {
        assert_eq!("Redis".parse::<ScoreBackend>(), Ok(ScoreBackend::Redis));
        assert_eq!("MEMORY".parse::<ScoreBackend>(), Ok(ScoreBackend::Memory));
    }

    #[test]
    fn backend_names_survive_display() {
        for backend in [ScoreBackend::Sqlite, ScoreBackend::Memory, ScoreBackend::Redis] {
            assert_eq!(backend.to_string().parse::<ScoreBackend>(), Ok(backend));
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.database_url, "sqlite:live_poll.db");
        assert_eq!(config.score_backend, ScoreBackend::Sqlite);
        assert_eq!(config.bus_capacity, DEFAULT_CAPACITY);
    }
}
