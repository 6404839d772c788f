//! Application-level configuration loading, including the rate-limit tunables.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BOSS_RUN_BACK_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    rate_limits: RateLimits,
}

/// Thresholds enforced before a new run may start.
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// Maximum starts allowed inside [`RateLimits::burst_window`] by the
    /// in-process fast path.
    pub burst_max_starts: usize,
    /// Trailing window inspected by the fast path.
    pub burst_window: Duration,
    /// Maximum runs a player may start inside [`RateLimits::daily_window`].
    pub daily_cap: u64,
    /// Trailing window inspected by the authoritative store query.
    pub daily_window: Duration,
    /// Minimum age an unfinished run must reach before another start is allowed.
    pub cooldown: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded rate-limit settings from config");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Rate-limit thresholds applied to `POST /battle/start`.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limits: RateLimits::default(),
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            burst_max_starts: 3,
            burst_window: Duration::from_secs(20),
            daily_cap: 30,
            daily_window: Duration::from_secs(24 * 60 * 60),
            cooldown: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    rate_limits: RawRateLimits,
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the rate-limit block; absent fields keep their defaults.
struct RawRateLimits {
    burst_max_starts: Option<usize>,
    burst_window_seconds: Option<u64>,
    daily_cap: Option<u64>,
    daily_window_seconds: Option<u64>,
    cooldown_seconds: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = RateLimits::default();
        let raw = value.rate_limits;
        Self {
            rate_limits: RateLimits {
                burst_max_starts: raw.burst_max_starts.unwrap_or(defaults.burst_max_starts),
                burst_window: raw
                    .burst_window_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.burst_window),
                daily_cap: raw.daily_cap.unwrap_or(defaults.daily_cap),
                daily_window: raw
                    .daily_window_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.daily_window),
                cooldown: raw
                    .cooldown_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cooldown),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let limits = RateLimits::default();
        assert_eq!(limits.burst_max_starts, 3);
        assert_eq!(limits.burst_window, Duration::from_secs(20));
        assert_eq!(limits.daily_cap, 30);
        assert_eq!(limits.daily_window, Duration::from_secs(86_400));
        assert_eq!(limits.cooldown, Duration::from_secs(3));
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"rate_limits": {"daily_cap": 10}}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.rate_limits().daily_cap, 10);
        assert_eq!(config.rate_limits().burst_max_starts, 3);
        assert_eq!(config.rate_limits().cooldown, Duration::from_secs(3));
    }
}
