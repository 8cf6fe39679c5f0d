use std::str::FromStr;

use anyhow::{ensure, Context};
use time::Duration;

/// Upper bound for `INACTIVE_AFTER_DAYS`, about a century.
pub const MAX_INACTIVE_AFTER_DAYS: i64 = 36_500;

#[derive(Debug, Clone)]
pub struct HashingConfig {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            m_cost_kib: argon2::Params::DEFAULT_M_COST,
            t_cost: argon2::Params::DEFAULT_T_COST,
            p_cost: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub hashing: HashingConfig,
    pub inactive_after_days: i64,
    pub calorie_goal_threshold: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 5,
            hashing: HashingConfig::default(),
            inactive_after_days: 182,
            calorie_goal_threshold: 2000,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a number, got '{raw}'")),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Inactivity window as a duration; saturates instead of overflowing.
    pub fn inactive_after(&self) -> Duration {
        Duration::seconds(self.inactive_after_days.saturating_mul(86_400))
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let inactive_after_days =
            parse_or(&lookup, "INACTIVE_AFTER_DAYS", defaults.inactive_after_days)?;
        ensure!(
            (1..=MAX_INACTIVE_AFTER_DAYS).contains(&inactive_after_days),
            "INACTIVE_AFTER_DAYS must be between 1 and {MAX_INACTIVE_AFTER_DAYS}, got {inactive_after_days}"
        );
        let hashing = HashingConfig {
            m_cost_kib: parse_or(&lookup, "ARGON2_M_COST_KIB", defaults.hashing.m_cost_kib)?,
            t_cost: parse_or(&lookup, "ARGON2_T_COST", defaults.hashing.t_cost)?,
            p_cost: parse_or(&lookup, "ARGON2_P_COST", defaults.hashing.p_cost)?,
        };
        Ok(Self {
            database_url,
            db_max_connections: parse_or(
                &lookup,
                "DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            )?,
            hashing,
            inactive_after_days,
            calorie_goal_threshold: parse_or(
                &lookup,
                "CALORIE_GOAL_THRESHOLD",
                defaults.calorie_goal_threshold,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.db_max_connections, 5);
        assert_eq!(cfg.inactive_after_days, 182);
        assert_eq!(cfg.calorie_goal_threshold, 2000);
        assert_eq!(cfg.hashing.t_cost, argon2::Params::DEFAULT_T_COST);
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/nutrilog"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("INACTIVE_AFTER_DAYS", "30"),
            ("ARGON2_T_COST", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/nutrilog"));
        assert_eq!(cfg.db_max_connections, 12);
        assert_eq!(cfg.inactive_after_days, 30);
        assert_eq!(cfg.hashing.t_cost, 1);
    }

    #[test]
    fn blank_database_url_means_memory() {
        let cfg = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn inactivity_window_must_be_in_range() {
        for raw in ["-1", "0", "36501", "9223372036854775807"] {
            let err = AppConfig::from_lookup(lookup(&[("INACTIVE_AFTER_DAYS", raw)])).unwrap_err();
            assert!(err.to_string().contains("INACTIVE_AFTER_DAYS"), "{raw}: {err}");
        }
        let cfg = AppConfig::from_lookup(lookup(&[("INACTIVE_AFTER_DAYS", "36500")])).unwrap();
        assert_eq!(cfg.inactive_after(), Duration::days(36_500));
    }

    #[test]
    fn oversized_window_saturates_instead_of_panicking() {
        let cfg = AppConfig {
            inactive_after_days: i64::MAX,
            ..AppConfig::default()
        };
        assert_eq!(cfg.inactive_after(), Duration::seconds(i64::MAX));
    }

    #[test]
    fn malformed_number_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("CALORIE_GOAL_THRESHOLD", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("CALORIE_GOAL_THRESHOLD"));
    }
}
