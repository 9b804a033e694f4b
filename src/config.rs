use anyhow::Context;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ENVIRONMENT: &str = "development";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub environment: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup` so tests need not touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|value| *value > 0)
                .with_context(|| format!("DB_MAX_CONNECTIONS must be a positive integer, got {raw:?}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let environment = lookup("APP_ENV")
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        Ok(Self {
            database_url,
            max_connections,
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn requires_database_url() {
        let err = settings(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
        assert!(settings(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn applies_defaults() {
        let settings = settings(&[("DATABASE_URL", "postgres://localhost/saude")]).unwrap();
        assert_eq!(settings.max_connections, 5);
        assert_eq!(settings.environment, "development");
        assert!(!settings.is_production());
    }

    #[test]
    fn reads_overrides() {
        let settings = settings(&[
            ("DATABASE_URL", "postgres://localhost/saude"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("APP_ENV", "Production"),
        ])
        .unwrap();
        assert_eq!(settings.max_connections, 12);
        assert!(settings.is_production());
    }

    #[test]
    fn rejects_invalid_pool_size() {
        assert!(settings(&[
            ("DATABASE_URL", "postgres://localhost/saude"),
            ("DB_MAX_CONNECTIONS", "zero"),
        ])
        .is_err());
        assert!(settings(&[
            ("DATABASE_URL", "postgres://localhost/saude"),
            ("DB_MAX_CONNECTIONS", "0"),
        ])
        .is_err());
    }
}
