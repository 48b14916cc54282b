//! Service configuration.
//!
//! Loaded from ~/.config/taskx/config.toml, with `TASKX_` environment
//! variables layered on top (`__` separates nested keys, e.g.
//! `TASKX_GOOGLE__CLIENT_SECRET`).

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{TaskxError, TaskxResult};

static DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:4096";
static DEFAULT_CALENDAR_NAME: &str = "TaskX Events";
static DEFAULT_DISPLAY_TIME_ZONE: &str = "Asia/Kolkata";

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("taskx"))
        .unwrap_or_else(|| PathBuf::from("~/.taskx"))
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct TaskxConfig {
    /// Where the task and user documents are stored.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Public URL of the web app, used for the OAuth redirect and the
    /// post-connect redirect back to the dashboard.
    #[serde(default)]
    pub app_url: String,

    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub smtp: SmtpConfig,

    #[serde(default)]
    pub twilio: TwilioConfig,

    #[serde(default)]
    pub reminders: ReminderConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,
}

/// Google OAuth client and Identity Toolkit credentials.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Web API key used to verify identity tokens.
    #[serde(default)]
    pub api_key: String,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_from_name() -> String {
    "Task Reminder".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        SmtpConfig {
            host: default_smtp_host(),
            username: String::new(),
            password: String::new(),
            from_name: default_from_name(),
        }
    }
}

fn default_twilio_url() -> String {
    "https://api.twilio.com".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from_number: String,
    #[serde(default = "default_twilio_url")]
    pub base_url: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        TwilioConfig {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            base_url: default_twilio_url(),
        }
    }
}

fn default_window_start() -> u32 {
    9
}

fn default_window_end() -> u32 {
    10
}

fn default_display_time_zone() -> String {
    DEFAULT_DISPLAY_TIME_ZONE.to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct ReminderConfig {
    /// Tasks are reminded when their deadline is between `window_start_minutes`
    /// and `window_end_minutes` from now.
    #[serde(default = "default_window_start")]
    pub window_start_minutes: u32,
    #[serde(default = "default_window_end")]
    pub window_end_minutes: u32,
    /// Time zone deadlines are rendered in inside reminder messages.
    #[serde(default = "default_display_time_zone")]
    pub display_time_zone: String,
    /// Run the dispatcher inside the server every N seconds. Leave unset when
    /// an external scheduler calls the reminders endpoint.
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        ReminderConfig {
            window_start_minutes: default_window_start(),
            window_end_minutes: default_window_end(),
            display_time_zone: default_display_time_zone(),
            interval_secs: None,
        }
    }
}

impl ReminderConfig {
    pub fn display_tz(&self) -> TaskxResult<Tz> {
        self.display_time_zone.parse::<Tz>().map_err(|e| {
            TaskxError::Config(format!(
                "Invalid reminders.display_time_zone '{}': {e}",
                self.display_time_zone
            ))
        })
    }
}

fn default_calendar_name() -> String {
    DEFAULT_CALENDAR_NAME.to_string()
}

fn default_utc() -> String {
    "UTC".to_string()
}

/// Dedicated calendar settings.
#[derive(Deserialize, Clone, Debug)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_name")]
    pub name: String,
    /// Time zone the dedicated calendar is created with.
    #[serde(default = "default_utc")]
    pub calendar_time_zone: String,
    /// Time zone attached to mirrored events.
    #[serde(default = "default_utc")]
    pub event_time_zone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            name: default_calendar_name(),
            calendar_time_zone: default_utc(),
            event_time_zone: default_utc(),
        }
    }
}

impl TaskxConfig {
    pub fn config_path() -> TaskxResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| TaskxError::Config("Could not determine config directory".into()))?
            .join("taskx");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from `path` (or the default location) plus the
    /// environment. A commented default file is created if none exists.
    pub fn load(path: Option<&Path>) -> TaskxResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            Self::create_default_config(&path)?;
        }

        let config: TaskxConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("TASKX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| TaskxError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| TaskxError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TaskxResult<()> {
        if self.reminders.window_start_minutes >= self.reminders.window_end_minutes {
            return Err(TaskxError::Config(format!(
                "reminders.window_start_minutes ({}) must be less than window_end_minutes ({})",
                self.reminders.window_start_minutes, self.reminders.window_end_minutes
            )));
        }
        self.reminders.display_tz()?;
        Ok(())
    }

    /// `data_dir` with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned();
        PathBuf::from(full_path_str)
    }

    /// OAuth callback registered with Google.
    pub fn redirect_uri(&self) -> String {
        format!("{}/api/integrate", self.app_url.trim_end_matches('/'))
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> TaskxResult<()> {
        let contents = format!(
            "\
# taskx configuration
#
# Every key can also be set from the environment, e.g.
#   TASKX_APP_URL=https://taskx.example.com
#   TASKX_GOOGLE__CLIENT_SECRET=...

# Where tasks and user profiles are stored:
# data_dir = \"~/.local/share/taskx\"

# Address the HTTP server listens on:
# bind_address = \"{DEFAULT_BIND_ADDRESS}\"

# Public URL of the web app:
# app_url = \"https://taskx.example.com\"

# [google]
# client_id = \"your-client-id.apps.googleusercontent.com\"
# client_secret = \"your-client-secret\"
# api_key = \"your-web-api-key\"

# [smtp]
# host = \"smtp.gmail.com\"
# username = \"reminders@example.com\"
# password = \"app-password\"

# [twilio]
# account_sid = \"AC...\"
# auth_token = \"...\"
# from_number = \"+15550000000\"

# [reminders]
# window_start_minutes = 9
# window_end_minutes = 10
# display_time_zone = \"{DEFAULT_DISPLAY_TIME_ZONE}\"
# interval_secs = 60

# [calendar]
# name = \"{DEFAULT_CALENDAR_NAME}\"
# event_time_zone = \"UTC\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TaskxError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| TaskxError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}
