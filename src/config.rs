//! Application-level configuration loading for the scheduler daemon.

use std::time::Duration;
use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the daemon looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COURTSIDE_CONFIG_PATH";

const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 30;
const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 3_600;
const DEFAULT_HIGH_PRIORITY_DELAY_MINUTES: u64 = 60;
const DEFAULT_ALTERNATIVE_DELAY_MINUTES: u64 = 1_440;
const DEFAULT_RANDOM_WAIT_MINUTES: u64 = 60;
const DEFAULT_LATE_DROP_NOTICE_MINUTES: u64 = 15;
const DEFAULT_LOGIN_ATTEMPT_RETENTION_DAYS: u64 = 7;
const DEFAULT_OUTBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
/// Immutable timing and capacity settings shared across the daemon.
pub struct AppConfig {
    /// How often the scheduler scans for due jobs and deferred games.
    pub poll_interval: Duration,
    /// How often expired security artifacts are purged.
    pub cleanup_interval: Duration,
    /// Head start the high-priority tier gets before standard players.
    pub high_priority_delay: Duration,
    /// Additional delay before the low-priority tier is notified.
    pub alternative_delay: Duration,
    /// Signup window a random-selection game stays open before the draw.
    pub random_wait_period: Duration,
    /// Minimum time a confirmed signup must have stood before a drop is
    /// reported to organizers.
    pub late_drop_notice_after: Duration,
    /// Retention window for recorded login attempts.
    pub login_attempt_retention: Duration,
    /// Capacity of the notification dispatch queue.
    pub outbox_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        poll_interval = ?app_config.poll_interval,
                        "loaded scheduler settings from config"
                    );
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
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECONDS),
            high_priority_delay: minutes(DEFAULT_HIGH_PRIORITY_DELAY_MINUTES),
            alternative_delay: minutes(DEFAULT_ALTERNATIVE_DELAY_MINUTES),
            random_wait_period: minutes(DEFAULT_RANDOM_WAIT_MINUTES),
            late_drop_notice_after: minutes(DEFAULT_LATE_DROP_NOTICE_MINUTES),
            login_attempt_retention: days(DEFAULT_LOGIN_ATTEMPT_RETENTION_DAYS),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    poll_interval_seconds: Option<u64>,
    cleanup_interval_seconds: Option<u64>,
    high_priority_delay_minutes: Option<u64>,
    alternative_delay_minutes: Option<u64>,
    random_wait_minutes: Option<u64>,
    late_drop_notice_minutes: Option<u64>,
    login_attempt_retention_days: Option<u64>,
    outbox_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: value
                .poll_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            cleanup_interval: value
                .cleanup_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
            high_priority_delay: value
                .high_priority_delay_minutes
                .map(minutes)
                .unwrap_or(defaults.high_priority_delay),
            alternative_delay: value
                .alternative_delay_minutes
                .map(minutes)
                .unwrap_or(defaults.alternative_delay),
            random_wait_period: value
                .random_wait_minutes
                .map(minutes)
                .unwrap_or(defaults.random_wait_period),
            late_drop_notice_after: value
                .late_drop_notice_minutes
                .map(minutes)
                .unwrap_or(defaults.late_drop_notice_after),
            login_attempt_retention: value
                .login_attempt_retention_days
                .map(days)
                .unwrap_or(defaults.login_attempt_retention),
            outbox_capacity: value.outbox_capacity.unwrap_or(defaults.outbox_capacity),
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

fn minutes(count: u64) -> Duration {
    Duration::from_secs(count * 60)
}

fn days(count: u64) -> Duration {
    Duration::from_secs(count * 86_400)
}
