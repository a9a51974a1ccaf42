//! Worker configuration loaded from environment variables
//!
//! Defaults reproduce the historical behavior: one attempt per job and
//! failed jobs are dropped after being logged.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use openmusic_export_queue::{EXPORT_DEAD_LETTER_CHANNEL, EXPORT_PLAYLIST_CHANNEL};
use openmusic_shared_config::{
    get_env_or_default, parse_env, CommonConfig, ConfigError, DatabaseConfig, Environment,
    RedisConfig, SmtpConfig,
};

use crate::aggregator::ReadConsistency;

/// What happens to a job once it has failed for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and acknowledge the message
    #[default]
    Drop,
    /// Copy the original payload to the dead-letter channel, then acknowledge
    DeadLetter,
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "dead_letter" | "dead-letter" | "dlq" => Ok(Self::DeadLetter),
            other => Err(ConfigError::InvalidValue(
                "EXPORT_FAILURE_POLICY".to_string(),
                format!("expected drop or dead_letter, got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::DeadLetter => write!(f, "dead_letter"),
        }
    }
}

/// How the consumer treats failed jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Channel jobs are read from
    pub channel: String,

    /// Channel terminally failed payloads are copied to under [`FailurePolicy::DeadLetter`]
    pub dead_letter_channel: String,

    /// Total attempts for a job that keeps failing with a retryable error
    pub max_attempts: u32,

    pub failure_policy: FailurePolicy,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            channel: EXPORT_PLAYLIST_CHANNEL.to_string(),
            dead_letter_channel: EXPORT_DEAD_LETTER_CHANNEL.to_string(),
            max_attempts: 1,
            failure_policy: FailurePolicy::Drop,
        }
    }
}

impl ConsumerSettings {
    pub fn from_env() -> Result<Self> {
        let max_attempts: u32 =
            parse_env("EXPORT_MAX_ATTEMPTS", 1).context("Invalid EXPORT_MAX_ATTEMPTS value")?;
        if max_attempts == 0 {
            anyhow::bail!("EXPORT_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            channel: EXPORT_PLAYLIST_CHANNEL.to_string(),
            dead_letter_channel: get_env_or_default(
                "EXPORT_DEAD_LETTER_CHANNEL",
                EXPORT_DEAD_LETTER_CHANNEL,
            ),
            max_attempts,
            failure_policy: parse_env("EXPORT_FAILURE_POLICY", FailurePolicy::Drop)
                .context("Invalid EXPORT_FAILURE_POLICY value")?,
        })
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with the API
    pub common: CommonConfig,

    /// Mail relay used to deliver exports
    pub smtp: SmtpConfig,

    /// Name of this consumer inside the Redis stream group
    pub consumer_name: String,

    /// How long one blocking read waits before polling again
    pub block_timeout_ms: usize,

    pub consumer: ConsumerSettings,

    pub read_consistency: ReadConsistency,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        let smtp = SmtpConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load SMTP config: {}", e))?;

        let snapshot_reads: bool = parse_env("EXPORT_SNAPSHOT_READS", false)
            .context("Invalid EXPORT_SNAPSHOT_READS value")?;

        Ok(Self {
            common,
            smtp,
            consumer_name: get_env_or_default("WORKER_CONSUMER_NAME", "export-worker"),
            block_timeout_ms: parse_env("WORKER_BLOCK_TIMEOUT_MS", 5_000)
                .context("Invalid WORKER_BLOCK_TIMEOUT_MS value")?,
            consumer: ConsumerSettings::from_env()?,
            read_consistency: if snapshot_reads {
                ReadConsistency::Snapshot
            } else {
                ReadConsistency::BestEffort
            },
        })
    }

    pub fn database(&self) -> &DatabaseConfig {
        &self.common.database
    }

    pub fn redis(&self) -> &RedisConfig {
        &self.common.redis
    }

    pub fn environment(&self) -> Environment {
        self.common.environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT_VARS: [&str; 3] = [
        "EXPORT_MAX_ATTEMPTS",
        "EXPORT_FAILURE_POLICY",
        "EXPORT_DEAD_LETTER_CHANNEL",
    ];

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("drop".parse::<FailurePolicy>().unwrap(), FailurePolicy::Drop);
        assert_eq!(
            "DEAD_LETTER".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::DeadLetter
        );
        assert_eq!(
            "dead-letter".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::DeadLetter
        );
        assert!("retry-forever".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::DeadLetter.to_string(), "dead_letter");
    }

    #[test]
    fn test_consumer_defaults() {
        temp_env::with_vars_unset(EXPORT_VARS, || {
            let settings = ConsumerSettings::from_env().unwrap();
            assert_eq!(settings, ConsumerSettings::default());
            assert_eq!(settings.channel, "export:playlist");
            assert_eq!(settings.dead_letter_channel, "export:playlist:dead");
            assert_eq!(settings.max_attempts, 1);
            assert_eq!(settings.failure_policy, FailurePolicy::Drop);
        });
    }

    #[test]
    fn test_consumer_overrides() {
        temp_env::with_vars(
            [
                ("EXPORT_MAX_ATTEMPTS", Some("3")),
                ("EXPORT_FAILURE_POLICY", Some("dead_letter")),
                ("EXPORT_DEAD_LETTER_CHANNEL", Some("exports:failed")),
            ],
            || {
                let settings = ConsumerSettings::from_env().unwrap();
                assert_eq!(settings.max_attempts, 3);
                assert_eq!(settings.failure_policy, FailurePolicy::DeadLetter);
                assert_eq!(settings.dead_letter_channel, "exports:failed");
            },
        );
    }

    #[test]
    fn test_zero_attempts_rejected() {
        temp_env::with_var("EXPORT_MAX_ATTEMPTS", Some("0"), || {
            assert!(ConsumerSettings::from_env().is_err());
        });
    }

    #[test]
    fn test_invalid_attempts_format() {
        temp_env::with_var("EXPORT_MAX_ATTEMPTS", Some("many"), || {
            assert!(ConsumerSettings::from_env().is_err());
        });
    }

    #[test]
    fn test_full_config_from_env() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/openmusic")),
                ("REDIS_URL", Some("redis://localhost:6379")),
                ("SMTP_HOST", Some("smtp.example.com")),
                ("SMTP_FROM", Some("exports@openmusic.dev")),
                ("WORKER_CONSUMER_NAME", Some("worker-7")),
                ("WORKER_BLOCK_TIMEOUT_MS", Some("250")),
                ("EXPORT_SNAPSHOT_READS", Some("true")),
                ("EXPORT_MAX_ATTEMPTS", None),
                ("EXPORT_FAILURE_POLICY", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.consumer_name, "worker-7");
                assert_eq!(config.block_timeout_ms, 250);
                assert_eq!(config.read_consistency, ReadConsistency::Snapshot);
                assert_eq!(config.smtp.host, "smtp.example.com");
                assert_eq!(config.consumer.max_attempts, 1);
            },
        );
    }

    #[test]
    fn test_missing_smtp_host_fails() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/openmusic")),
                ("SMTP_HOST", None),
                ("SMTP_FROM", Some("exports@openmusic.dev")),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }
}
