//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `FUNNEL_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `FUNNEL_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `FUNNEL_PAYMENT__STRIPE__SECRET_KEY=sk_live_...` sets `payment.stripe.secret_key`.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use funnel::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`, `public_url` - binding and the base URL used in outbound links
//! - **Database**: `database.url` - SQLite file, created on first start
//! - **Admin User**: `admin_email`, `admin_password` - dashboard login created on startup
//! - **Security**: `secret_key`, `auth`, `cors`
//! - **Adapters**: `email`, `sms`, `calendar`, `payment`
//! - **Funnel**: `videos`, `scheduling`, `reminders`

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, time::Duration};

use crate::db::models::notifications::NotificationChannel;
use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FUNNEL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults defined in the `Default` implementation, so an empty file plus a
/// `secret_key` is a runnable development setup (file-based email, log-only SMS, dummy calendar).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Public base URL of the funnel, used for links in emails and SMS
    pub public_url: String,
    /// Name shown in emails, SMS and calendar invites
    pub business_name: String,
    /// Set from the raw `DATABASE_URL` environment variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub database: DatabaseConfig,
    /// Email address for the initial admin user (created on startup)
    pub admin_email: String,
    /// Password for the initial admin user
    pub admin_password: Option<String>,
    /// Secret key for JWT signing (required)
    pub secret_key: Option<String>,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub email: EmailConfig,
    pub sms: SmsConfig,
    pub calendar: CalendarConfig,
    /// Payment provider configuration. Invoices cannot be sent without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentConfig>,
    pub scheduling: SchedulingConfig,
    pub reminders: ReminderConfig,
    /// Videos that can be unlocked by captured leads
    pub videos: Vec<VideoConfig>,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
}

/// SQLite database settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite connection string, e.g. `sqlite://funnel.db`
    pub url: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
    /// Create the database file if it does not exist
    pub create_if_missing: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub session: SessionConfig,
    /// JWT token expiry duration
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie name for session token
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none")
    pub cookie_same_site: String,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests. `"*"` allows any origin (credentials are then disabled).
    pub allowed_origins: Vec<String>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// Email configuration for funnel notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
// Note: Cannot use deny_unknown_fields here due to #[serde(flatten)] on transport
pub struct EmailConfig {
    /// Email transport method
    #[serde(flatten)]
    pub transport: EmailTransportConfig,
    /// Sender email address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
    /// Who to set the reply to field from
    pub reply_to: Option<String>,
}

/// Email transport configuration - either SMTP or file-based for testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// Send emails via SMTP server
    Smtp {
        host: String,
        port: u16,
        username: String,
        password: String,
        /// Use STARTTLS
        use_tls: bool,
    },
    /// Write emails to files (for development/testing)
    File {
        /// Directory path where email files will be written
        path: String,
    },
}

/// SMS provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SmsConfig {
    /// Send SMS through the Twilio Messages API
    /// Set credentials via:
    /// - `FUNNEL_SMS__ACCOUNT_SID`
    /// - `FUNNEL_SMS__AUTH_TOKEN`
    Twilio {
        account_sid: String,
        auth_token: String,
        /// Sender number in E.164 format
        from_number: String,
        #[serde(default = "default_twilio_api_base")]
        api_base: String,
        /// Per-request timeout for Twilio API calls
        #[serde(default = "default_provider_timeout", with = "humantime_serde")]
        timeout: Duration,
    },
    /// Log messages instead of sending them
    Log,
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// Calendar provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CalendarConfig {
    /// Google Calendar via an OAuth refresh token
    Google {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default = "default_calendar_id")]
        calendar_id: String,
        #[serde(default = "default_token_uri")]
        token_uri: String,
        #[serde(default = "default_google_api_base")]
        api_base: String,
        /// Per-request timeout for token refresh and Calendar API calls
        #[serde(default = "default_provider_timeout", with = "humantime_serde")]
        timeout: Duration,
    },
    /// In-memory calendar with no busy time (development/testing)
    Dummy,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_google_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

/// Payment provider configuration.
///
/// Credentials should be set via environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentConfig {
    /// Stripe PaymentIntents
    /// - `FUNNEL_PAYMENT__STRIPE__SECRET_KEY` - secret API key (sk_...)
    /// - `FUNNEL_PAYMENT__STRIPE__PUBLISHABLE_KEY` - key handed to the payment page (pk_...)
    /// - `FUNNEL_PAYMENT__STRIPE__WEBHOOK_SECRET` - webhook signing secret (whsec_...)
    Stripe(StripeConfig),
    /// Dummy payment provider for testing
    Dummy(DummyConfig),
}

/// Stripe payment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub publishable_key: String,
    pub webhook_secret: String,
}

/// Dummy payment configuration for testing.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DummyConfig {
    /// When set, webhooks must carry an `x-dummy-signature` HMAC of the body
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// Booking window configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulingConfig {
    /// IANA timezone the business hours are expressed in
    pub timezone: Tz,
    /// First bookable time of day, "HH:MM"
    pub day_start: String,
    /// End of the bookable day, "HH:MM" (the last slot ends here)
    pub day_end: String,
    /// Length of one appointment slot
    #[serde(with = "humantime_serde")]
    pub slot_length: Duration,
    /// Days that can be booked
    pub working_days: Vec<Weekday>,
    /// Minimum lead time between now and the start of a bookable slot
    #[serde(with = "humantime_serde")]
    pub min_notice: Duration,
    /// How many days ahead slots are offered
    pub booking_horizon_days: u32,
    /// Calendar event title; `{name}` is replaced by the lead's name
    pub meeting_title: String,
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReminderConfig {
    /// Run the polling scheduler
    pub enabled: bool,
    /// How often to scan for due reminders
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Maximum reminders dispatched per tick
    pub batch_size: u32,
    /// Reminders created for each new appointment
    pub schedule: Vec<ReminderRule>,
}

/// One reminder offset before an appointment and the channels it goes out on.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReminderRule {
    #[serde(with = "humantime_serde")]
    pub before: Duration,
    pub channels: Vec<NotificationChannel>,
}

/// A gated video.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VideoConfig {
    /// Stable identifier used in URLs and the `video_views` table
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Playback URL, only revealed to leads with a valid access token
    pub url: String,
    pub duration_seconds: u32,
    /// Fraction of the video (0, 1] that counts as watched
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f64,
}

fn default_completion_threshold() -> f64 {
    0.9
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            public_url: "http://localhost:3001".to_string(),
            business_name: "Funnel".to_string(),
            database_url: None,
            database: DatabaseConfig::default(),
            admin_email: "admin@example.com".to_string(),
            admin_password: None,
            secret_key: None,
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            email: EmailConfig::default(),
            sms: SmsConfig::Log,
            calendar: CalendarConfig::Dummy,
            payment: None,
            scheduling: SchedulingConfig::default(),
            reminders: ReminderConfig::default(),
            videos: Vec::new(),
            enable_metrics: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://funnel.db".to_string(),
            max_connections: 5,
            create_if_missing: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            jwt_expiry: Duration::from_secs(12 * 60 * 60), // 12 hours
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "funnel_session".to_string(),
            cookie_secure: true,
            cookie_same_site: "strict".to_string(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::default(),
            from_email: "noreply@example.com".to_string(),
            from_name: "Funnel".to_string(),
            reply_to: None,
        }
    }
}

impl Default for EmailTransportConfig {
    fn default() -> Self {
        Self::File {
            path: "./emails".to_string(),
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self::Log
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self::Dummy
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            day_start: "09:00".to_string(),
            day_end: "17:00".to_string(),
            slot_length: Duration::from_secs(30 * 60),
            working_days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
            min_notice: Duration::from_secs(2 * 60 * 60),
            booking_horizon_days: 30,
            meeting_title: "Discovery call with {name}".to_string(),
        }
    }
}

impl SchedulingConfig {
    /// Parsed `(day_start, day_end)`.
    pub fn business_hours(&self) -> Result<(NaiveTime, NaiveTime), Error> {
        let parse = |field: &str, value: &str| {
            NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| Error::Internal {
                operation: format!("Config validation: scheduling.{field} '{value}' is not HH:MM: {e}"),
            })
        };
        Ok((parse("day_start", &self.day_start)?, parse("day_end", &self.day_end)?))
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(60),
            batch_size: 50,
            schedule: vec![
                ReminderRule {
                    before: Duration::from_secs(24 * 60 * 60),
                    channels: vec![NotificationChannel::Email],
                },
                ReminderRule {
                    before: Duration::from_secs(60 * 60),
                    channels: vec![NotificationChannel::Email, NotificationChannel::Sms],
                },
            ],
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Internal {
                operation: "Config validation: secret_key is not configured. \
                 Please set FUNNEL_SECRET_KEY environment variable or add secret_key to config file."
                    .to_string(),
            });
        }

        if self.auth.jwt_expiry.as_secs() < 300 {
            return Err(Error::Internal {
                operation: "Config validation: JWT expiry duration is too short (minimum 5 minutes)".to_string(),
            });
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: cors.allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        let (day_start, day_end) = self.scheduling.business_hours()?;
        if day_start >= day_end {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: scheduling.day_start ({}) must be before scheduling.day_end ({})",
                    self.scheduling.day_start, self.scheduling.day_end
                ),
            });
        }

        if self.scheduling.slot_length.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: scheduling.slot_length must be greater than zero".to_string(),
            });
        }

        if self.scheduling.working_days.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: scheduling.working_days cannot be empty".to_string(),
            });
        }

        if self.reminders.poll_interval.is_zero() || self.reminders.batch_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: reminders.poll_interval and reminders.batch_size must be greater than zero".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for video in &self.videos {
            if !seen.insert(video.id.as_str()) {
                return Err(Error::Internal {
                    operation: format!("Config validation: duplicate video id '{}'", video.id),
                });
            }
            if !(video.completion_threshold > 0.0 && video.completion_threshold <= 1.0) {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: video '{}' completion_threshold must be in (0, 1], got {}",
                        video.id, video.completion_threshold
                    ),
                });
            }
            if video.duration_seconds == 0 {
                return Err(Error::Internal {
                    operation: format!("Config validation: video '{}' duration_seconds must be greater than zero", video.id),
                });
            }
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("FUNNEL_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn video(&self, id: &str) -> Option<&VideoConfig> {
        self.videos.iter().find(|v| v.id == id)
    }

    /// Absolute link under `public_url`.
    pub fn public_link(&self, path_and_query: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), path_and_query.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "secret_key: hello\n")?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.port, 3001);
            assert!(matches!(config.sms, SmsConfig::Log));
            assert!(matches!(config.calendar, CalendarConfig::Dummy));
            assert!(config.payment.is_none());
            assert_eq!(config.reminders.schedule.len(), 2);
            assert_eq!(config.scheduling.slot_length, Duration::from_secs(1800));

            Ok(())
        });
    }

    #[test]
    fn test_full_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
secret_key: hello
public_url: https://go.example.com/
business_name: Example Coaching
database:
  url: sqlite:///var/lib/funnel/funnel.db
email:
  type: smtp
  host: smtp.example.com
  port: 587
  username: mailer
  password: secret
  use_tls: true
  from_email: hello@example.com
  from_name: Example Coaching
sms:
  type: twilio
  account_sid: AC123
  auth_token: tok
  from_number: "+15550001111"
calendar:
  type: google
  client_id: cid
  client_secret: csecret
  refresh_token: rtoken
  timeout: 5s
payment:
  stripe:
    secret_key: sk_test_123
    publishable_key: pk_test_123
    webhook_secret: whsec_123
scheduling:
  timezone: America/New_York
  day_start: "10:00"
  day_end: "16:30"
  slot_length: 45m
  working_days: [Mon, Wed, Fri]
  min_notice: 1day
reminders:
  poll_interval: 30s
  schedule:
    - before: 2h
      channels: [sms]
videos:
  - id: intro
    title: Intro
    url: https://videos.example.com/intro.mp4
    duration_seconds: 600
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.public_link("/pay?invoice=abc"), "https://go.example.com/pay?invoice=abc");
            assert!(matches!(config.email.transport, EmailTransportConfig::Smtp { port: 587, .. }));
            match &config.sms {
                SmsConfig::Twilio {
                    api_base,
                    from_number,
                    timeout,
                    ..
                } => {
                    assert_eq!(api_base, "https://api.twilio.com");
                    assert_eq!(*timeout, Duration::from_secs(10));
                    assert_eq!(from_number, "+15550001111");
                }
                other => panic!("unexpected sms config {other:?}"),
            }
            match &config.calendar {
                CalendarConfig::Google {
                    calendar_id,
                    token_uri,
                    timeout,
                    ..
                } => {
                    assert_eq!(calendar_id, "primary");
                    assert_eq!(*timeout, Duration::from_secs(5));
                    assert_eq!(token_uri, "https://oauth2.googleapis.com/token");
                }
                other => panic!("unexpected calendar config {other:?}"),
            }
            assert!(matches!(config.payment, Some(PaymentConfig::Stripe(_))));
            assert_eq!(config.scheduling.timezone, chrono_tz::America::New_York);
            assert_eq!(config.scheduling.slot_length, Duration::from_secs(45 * 60));
            assert_eq!(config.scheduling.working_days, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
            assert_eq!(config.scheduling.min_notice, Duration::from_secs(86400));
            assert_eq!(config.reminders.poll_interval, Duration::from_secs(30));
            assert_eq!(config.reminders.schedule[0].channels, vec![NotificationChannel::Sms]);
            assert_eq!(config.videos[0].completion_threshold, 0.9);

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "secret_key: hello\nbusiness_name: From File\n")?;

            jail.set_env("FUNNEL_HOST", "127.0.0.1");
            jail.set_env("FUNNEL_PORT", "8080");
            jail.set_env("FUNNEL_REMINDERS__BATCH_SIZE", "5");
            jail.set_env("DATABASE_URL", "sqlite://override.db");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
            assert_eq!(config.reminders.batch_size, 5);
            assert_eq!(config.database.url, "sqlite://override.db");
            assert_eq!(config.business_name, "From File");

            Ok(())
        });
    }

    #[test]
    fn test_shipped_config_loads() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", include_str!("../config.yaml"))?;
            jail.set_env("FUNNEL_SECRET_KEY", "from-env");

            let config = Config::load(&args("config.yaml"))?;

            assert_eq!(config.secret_key.as_deref(), Some("from-env"));
            assert!(matches!(config.payment, Some(PaymentConfig::Dummy(DummyConfig { webhook_secret: None }))));
            assert_eq!(config.scheduling.timezone, chrono_tz::Europe::London);
            assert_eq!(config.videos.len(), 1);

            Ok(())
        });
    }

    #[test]
    fn test_unknown_field_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "secret_key: hello\nnot_a_field: 1\n")?;

            assert!(Config::load(&args("test.yaml")).is_err());

            Ok(())
        });
    }

    #[test]
    fn test_validation_requires_secret_key() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_inverted_business_hours() {
        let mut config = Config {
            secret_key: Some("k".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.scheduling.day_start = "18:00".to_string();
        assert!(config.validate().is_err());

        config.scheduling.day_start = "9am".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_videos() {
        let video = VideoConfig {
            id: "intro".to_string(),
            title: "Intro".to_string(),
            description: None,
            url: "https://example.com/v.mp4".to_string(),
            duration_seconds: 60,
            completion_threshold: 0.9,
        };
        let mut config = Config {
            secret_key: Some("k".to_string()),
            videos: vec![video.clone(), video.clone()],
            ..Default::default()
        };
        assert!(config.validate().is_err(), "duplicate ids");

        config.videos = vec![VideoConfig {
            completion_threshold: 1.5,
            ..video
        }];
        assert!(config.validate().is_err(), "threshold out of range");
    }
}
