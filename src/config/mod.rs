//! Configuration module for the scraper.
//!
//! Loaded from environment variables (and a `.env` file via dotenvy) through
//! figment. Durations accept integer seconds or fundu strings like `30s`,
//! `2m` or `1500ms`.

use crate::models::Credential;
use custom_debug_derive::Debug as CustomDebug;
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Deserialize, Clone, CustomDebug)]
pub struct Config {
    /// Login identifier for the fantasy site
    #[serde(rename = "biwenger_email", deserialize_with = "deserialize_text")]
    pub email: String,
    #[serde(rename = "biwenger_password", deserialize_with = "deserialize_text")]
    #[debug(skip)]
    password: String,
    /// League whose roster and market are scraped
    #[serde(rename = "liga_id", deserialize_with = "deserialize_text")]
    pub league_id: String,

    /// Path of the "latest" snapshot file
    #[serde(default = "default_public_out_path", rename = "public_out_path")]
    pub out_path: PathBuf,
    /// Directory holding timestamped history snapshots.
    ///
    /// Defaults to a `history/` directory beside `PUBLIC_OUT_PATH`.
    #[serde(default)]
    pub history_dir: Option<PathBuf>,
    #[serde(default = "default_diagnostics_dir")]
    pub diagnostics_dir: PathBuf,

    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Login entry point; defaults to the base URL
    #[serde(default)]
    pub login_url: Option<String>,

    /// Number of parallel detail-page workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Log level for the application
    ///
    /// Valid values: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whole-run time limit
    #[serde(
        default = "default_run_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub run_timeout: Duration,
    #[serde(
        default = "default_auth_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub auth_timeout: Duration,
    #[serde(
        default = "default_consent_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub consent_timeout: Duration,
    /// Pause after submitting credentials before judging the login result
    #[serde(
        default = "default_settle_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub settle_delay: Duration,
    #[serde(
        default = "default_navigation_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub navigation_timeout: Duration,
    #[serde(
        default = "default_idle_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub idle_timeout: Duration,
    /// Per-visit limit for detail pages during enrichment
    #[serde(
        default = "default_detail_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub detail_timeout: Duration,
}

impl Config {
    pub fn credential(&self) -> Credential {
        Credential::new(self.email.clone(), self.password.clone())
    }

    pub fn login_url(&self) -> &str {
        self.login_url.as_deref().unwrap_or(&self.base_url)
    }

    pub fn history_dir(&self) -> PathBuf {
        match &self.history_dir {
            Some(dir) => dir.clone(),
            None => self
                .out_path
                .parent()
                .map(|p| p.join("history"))
                .unwrap_or_else(|| PathBuf::from("history")),
        }
    }

    /// Worker count, never below one.
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

fn default_public_out_path() -> PathBuf {
    PathBuf::from("./public/data.json")
}

fn default_diagnostics_dir() -> PathBuf {
    PathBuf::from("./diagnostics")
}

fn default_base_url() -> String {
    "https://biwenger.as.com".to_string()
}

fn default_concurrency() -> usize {
    5
}

fn default_headless() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_run_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_auth_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_consent_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_navigation_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_detail_timeout() -> Duration {
    Duration::from_secs(20)
}

/// Duration parser configured to handle various time units with seconds as default
///
/// Supports:
/// - Seconds (s) - default unit
/// - Milliseconds (ms)
/// - Minutes (m)
/// - Hours (h)
///
/// Does not support fractions, exponents, or infinity values
const DURATION_PARSER: DurationParser<'static> = DurationParser::builder()
    .time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ])
    .allow_time_unit_delimiter()
    .disable_infinity()
    .disable_fraction()
    .disable_exponent()
    .default_unit(TimeUnit::Second)
    .build();

/// Parse a duration string with the configured units.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    DURATION_PARSER
        .parse(input.trim())
        .map_err(|e| format!("invalid duration '{input}': {e}"))?
        .try_into()
        .map_err(|e| format!("duration '{input}' out of range: {e}"))
}

/// Custom deserializer for duration fields that accepts both numeric and string values
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration(value).map_err(serde::de::Error::custom)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if value < 0 {
                return Err(serde::de::Error::custom("duration cannot be negative"));
            }
            Ok(Duration::from_secs(value as u64))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

/// Deserializer for free-text fields that the env provider may have typed.
///
/// figment parses `LIGA_ID=1234567` into an integer; the raw text is wanted.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct TextVisitor;

    impl<'de> Visitor<'de> for TextVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_owned())
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u128<E>(self, value: u128) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i128<E>(self, value: i128) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_char<E>(self, value: char) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(TextVisitor)
}
