//! Environment-driven configuration.
//!
//! All settings come from environment variables (a `.env` file, or one given
//! explicitly, is loaded first). Numeric settings that fail to parse, are zero
//! or exceed [`MAX_SECONDS`] fall back to their defaults with a warning.

use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Default backend base URL.
pub const DEFAULT_API_BASE: &str = "https://imzo-ai.uzjoylar.uz";

/// Default delay between two polls for a deferred answer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default time a deferred answer is waited for.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout of a single HTTP call to the backend.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Largest accepted value of a seconds setting: one day.
pub const MAX_SECONDS: u64 = 24 * 60 * 60;

/// Environment variable names.
pub mod vars {
    /// Telegram bot token.
    pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
    /// Backend base URL.
    pub const API_BASE: &str = "IMZO_API_BASE";
    /// Chat room every question is submitted to.
    pub const CHAT_ROOM_ID: &str = "IMZO_CHAT_ROOM_ID";
    /// Poll cadence in seconds.
    pub const POLL_INTERVAL: &str = "POLL_INTERVAL_SECONDS";
    /// Poll deadline in seconds.
    pub const POLL_TIMEOUT: &str = "POLL_TIMEOUT_SECONDS";
    /// HTTP timeout in seconds.
    pub const HTTP_TIMEOUT: &str = "HTTP_TIMEOUT_SECONDS";
    /// Static `Authorization` value for the polling call.
    pub const POLL_AUTH_BEARER: &str = "GATEWAY_AUTH_BEARER";

    /// Every variable the bot reads, for status output.
    pub const ALL: [&str; 7] = [
        TELEGRAM_BOT_TOKEN,
        API_BASE,
        CHAT_ROOM_ID,
        POLL_INTERVAL,
        POLL_TIMEOUT,
        HTTP_TIMEOUT,
        POLL_AUTH_BEARER,
    ];
}

/// Backend connection settings.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL, without trailing slash.
    pub api_base: String,
    /// Chat room id sent with every question.
    pub chat_room_id: String,
    /// Timeout applied to every HTTP request.
    pub http_timeout: Duration,
    /// Overrides the user token on the polling call when set.
    pub poll_auth_override: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_base", &self.api_base)
            .field("chat_room_id", &self.chat_room_id)
            .field("http_timeout", &self.http_timeout)
            .field("poll_auth_override", &self.poll_auth_override.is_some())
            .finish()
    }
}

impl BackendConfig {
    /// Create backend settings with default timeouts.
    #[must_use]
    pub fn new(api_base: impl Into<String>, chat_room_id: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            chat_room_id: chat_room_id.into(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            poll_auth_override: None,
        }
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the static authorization used for polling.
    #[must_use]
    pub fn poll_auth_override(mut self, value: impl Into<String>) -> Self {
        self.poll_auth_override = Some(value.into());
        self
    }
}

/// Poll cadence and deadline for deferred answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two fetches.
    pub interval: Duration,
    /// Maximum time from submission until the poller gives up.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Complete bot configuration.
#[derive(Clone)]
pub struct BotConfig {
    /// Telegram bot token; only required when the Telegram channel runs.
    pub telegram_token: Option<String>,
    /// Backend settings.
    pub backend: BackendConfig,
    /// Poller settings.
    pub poll: PollConfig,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("telegram_token", &self.telegram_token.is_some())
            .field("backend", &self.backend)
            .field("poll", &self.poll)
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file is read first if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `IMZO_CHAT_ROOM_ID` is not set.
    pub fn from_env() -> ConfigResult<Self> {
        Self::load(None)
    }

    /// Load configuration, reading `env_file` instead of `./.env` when given.
    ///
    /// Variables already set in the process win over the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `env_file` cannot be read and
    /// [`ConfigError::Missing`] when `IMZO_CHAT_ROOM_ID` is not set.
    pub fn load(env_file: Option<&Path>) -> ConfigResult<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    ConfigError::invalid(format!("failed to read {}: {e}", path.display()))
                })?;
            }
            None => {
                // Absent .env is the normal production case.
                let _ = dotenvy::dotenv();
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `IMZO_CHAT_ROOM_ID` is not set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let chat_room_id =
            get(vars::CHAT_ROOM_ID).ok_or_else(|| ConfigError::missing(vars::CHAT_ROOM_ID))?;
        let api_base = get(vars::API_BASE).unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mut backend = BackendConfig::new(api_base, chat_room_id).http_timeout(seconds_or(
            vars::HTTP_TIMEOUT,
            get(vars::HTTP_TIMEOUT),
            DEFAULT_HTTP_TIMEOUT,
        ));
        if let Some(bearer) = get(vars::POLL_AUTH_BEARER) {
            backend = backend.poll_auth_override(bearer);
        }

        Ok(Self {
            telegram_token: get(vars::TELEGRAM_BOT_TOKEN),
            backend,
            poll: PollConfig {
                interval: seconds_or(
                    vars::POLL_INTERVAL,
                    get(vars::POLL_INTERVAL),
                    DEFAULT_POLL_INTERVAL,
                ),
                timeout: seconds_or(
                    vars::POLL_TIMEOUT,
                    get(vars::POLL_TIMEOUT),
                    DEFAULT_POLL_TIMEOUT,
                ),
            },
        })
    }

    /// The Telegram token, or an error naming the variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no token is configured.
    pub fn require_telegram_token(&self) -> ConfigResult<&str> {
        self.telegram_token
            .as_deref()
            .ok_or_else(|| ConfigError::missing(vars::TELEGRAM_BOT_TOKEN))
    }
}

fn seconds_or(key: &str, raw: Option<String>, default: Duration) -> Duration {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<u64>() {
        Ok(secs) if (1..=MAX_SECONDS).contains(&secs) => Duration::from_secs(secs),
        _ => {
            warn!(
                variable = key,
                value = %raw,
                max_secs = MAX_SECONDS,
                default_secs = default.as_secs(),
                "expected a number of seconds between 1 and the maximum, using default"
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_lookup(lookup(&[(vars::CHAT_ROOM_ID, "room-1")])).unwrap();

        assert_eq!(config.backend.api_base, DEFAULT_API_BASE);
        assert_eq!(config.backend.chat_room_id, "room-1");
        assert_eq!(config.backend.http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert!(config.backend.poll_auth_override.is_none());
        assert_eq!(config.poll, PollConfig::default());
        assert!(config.telegram_token.is_none());
        assert!(config.require_telegram_token().is_err());
    }

    #[test]
    fn test_missing_room_id() {
        let err = BotConfig::from_lookup(lookup(&[(vars::TELEGRAM_BOT_TOKEN, "t")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref v) if v == vars::CHAT_ROOM_ID));
    }

    #[test]
    fn test_overrides() {
        let config = BotConfig::from_lookup(lookup(&[
            (vars::CHAT_ROOM_ID, "room-2"),
            (vars::TELEGRAM_BOT_TOKEN, "123:abc"),
            (vars::API_BASE, "http://localhost:9000//"),
            (vars::POLL_INTERVAL, "5"),
            (vars::POLL_TIMEOUT, "60"),
            (vars::HTTP_TIMEOUT, "7"),
            (vars::POLL_AUTH_BEARER, "Bearer static"),
        ]))
        .unwrap();

        assert_eq!(config.require_telegram_token().unwrap(), "123:abc");
        assert_eq!(config.backend.api_base, "http://localhost:9000");
        assert_eq!(config.backend.http_timeout, Duration::from_secs(7));
        assert_eq!(
            config.backend.poll_auth_override.as_deref(),
            Some("Bearer static")
        );
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.poll.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = BotConfig::from_lookup(lookup(&[
            (vars::CHAT_ROOM_ID, "room"),
            (vars::POLL_INTERVAL, "soon"),
            (vars::POLL_TIMEOUT, "0"),
            (vars::HTTP_TIMEOUT, "-3"),
        ]))
        .unwrap();

        assert_eq!(config.poll.interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.poll.timeout, DEFAULT_POLL_TIMEOUT);
        assert_eq!(config.backend.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn test_oversized_seconds_fall_back() {
        let config = BotConfig::from_lookup(lookup(&[
            (vars::CHAT_ROOM_ID, "room"),
            (vars::POLL_TIMEOUT, "18446744073709551615"),
            (vars::POLL_INTERVAL, &(MAX_SECONDS + 1).to_string()),
            (vars::HTTP_TIMEOUT, &MAX_SECONDS.to_string()),
        ]))
        .unwrap();

        assert_eq!(config.poll.timeout, DEFAULT_POLL_TIMEOUT);
        assert_eq!(config.poll.interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.backend.http_timeout, Duration::from_secs(MAX_SECONDS));
    }

    #[test]
    fn test_missing_env_file_is_invalid() {
        let err = BotConfig::load(Some(Path::new("/nonexistent/imzo-bot.env"))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("imzo-bot.env")));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = BotConfig::from_lookup(lookup(&[
            (vars::CHAT_ROOM_ID, "room"),
            (vars::TELEGRAM_BOT_TOKEN, "super-secret"),
            (vars::POLL_AUTH_BEARER, "also-secret"),
        ]))
        .unwrap();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("also-secret"));
    }
}
