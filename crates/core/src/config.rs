use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub business_hours: BusinessHoursConfig,
    pub policy: PolicyConfig,
    pub scoring: ScoringConfig,
    pub calendar: CalendarConfig,
    pub notifications: NotificationConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Local opening hours. Times are `HH:MM` in the configured IANA timezone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusinessHoursConfig {
    pub timezone: String,
    pub open: String,
    pub close: String,
    pub rest_day: String,
    pub rest_day_close: String,
    pub closed_days: Vec<String>,
    /// Weekday-specific hours keyed by weekday name; they take precedence over the rest.
    pub days: BTreeMap<String, DayHoursConfig>,
}

/// Either bound left out falls back to the general hours for that day.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DayHoursConfig {
    pub open: Option<String>,
    pub close: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    pub dedup_window_secs: u64,
    pub notification_cooldown_secs: u64,
    pub conversation_window: usize,
    pub max_name_asks: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoringConfig {
    pub appointment_bonus: u8,
    pub budget_bonus: u8,
    pub income_bonus: u8,
    pub financing_bonus: u8,
    pub visit_intent_bonus: u8,
    pub inquiry_intent_bonus: u8,
    pub hot_threshold: u8,
    pub warm_threshold: u8,
    pub jump_threshold: u8,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub timezone: Option<String>,
    pub dedup_window_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Mexico_City".to_string(),
            open: "09:00".to_string(),
            close: "19:00".to_string(),
            rest_day: "saturday".to_string(),
            rest_day_close: "14:00".to_string(),
            closed_days: Vec::new(),
            days: BTreeMap::new(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: 4,
            notification_cooldown_secs: 4 * 60 * 60,
            conversation_window: 30,
            max_name_asks: 2,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            appointment_bonus: 15,
            budget_bonus: 10,
            income_bonus: 5,
            financing_bonus: 5,
            visit_intent_bonus: 10,
            inquiry_intent_bonus: 5,
            hot_threshold: 70,
            warm_threshold: 40,
            jump_threshold: 20,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://leadflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            business_hours: BusinessHoursConfig::default(),
            policy: PolicyConfig::default(),
            scoring: ScoringConfig::default(),
            calendar: CalendarConfig {
                enabled: false,
                base_url: None,
                api_key: None,
                timeout_secs: 10,
            },
            notifications: NotificationConfig {
                enabled: false,
                webhook_url: None,
                token: None,
                timeout_secs: 10,
            },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(hours) = patch.business_hours {
            if let Some(timezone) = hours.timezone {
                self.business_hours.timezone = timezone;
            }
            if let Some(open) = hours.open {
                self.business_hours.open = open;
            }
            if let Some(close) = hours.close {
                self.business_hours.close = close;
            }
            if let Some(rest_day) = hours.rest_day {
                self.business_hours.rest_day = rest_day;
            }
            if let Some(rest_day_close) = hours.rest_day_close {
                self.business_hours.rest_day_close = rest_day_close;
            }
            if let Some(closed_days) = hours.closed_days {
                self.business_hours.closed_days = closed_days;
            }
            if let Some(days) = hours.days {
                self.business_hours.days.extend(days);
            }
        }

        if let Some(policy) = patch.policy {
            if let Some(value) = policy.dedup_window_secs {
                self.policy.dedup_window_secs = value;
            }
            if let Some(value) = policy.notification_cooldown_secs {
                self.policy.notification_cooldown_secs = value;
            }
            if let Some(value) = policy.conversation_window {
                self.policy.conversation_window = value;
            }
            if let Some(value) = policy.max_name_asks {
                self.policy.max_name_asks = value;
            }
        }

        if let Some(scoring) = patch.scoring {
            let target = &mut self.scoring;
            let fields = [
                (scoring.appointment_bonus, &mut target.appointment_bonus),
                (scoring.budget_bonus, &mut target.budget_bonus),
                (scoring.income_bonus, &mut target.income_bonus),
                (scoring.financing_bonus, &mut target.financing_bonus),
                (scoring.visit_intent_bonus, &mut target.visit_intent_bonus),
                (scoring.inquiry_intent_bonus, &mut target.inquiry_intent_bonus),
                (scoring.hot_threshold, &mut target.hot_threshold),
                (scoring.warm_threshold, &mut target.warm_threshold),
                (scoring.jump_threshold, &mut target.jump_threshold),
            ];
            for (value, slot) in fields {
                if let Some(value) = value {
                    *slot = value;
                }
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(enabled) = calendar.enabled {
                self.calendar.enabled = enabled;
            }
            if let Some(base_url) = calendar.base_url {
                self.calendar.base_url = Some(base_url);
            }
            if let Some(calendar_api_key_value) = calendar.api_key {
                self.calendar.api_key = Some(secret_value(calendar_api_key_value));
            }
            if let Some(timeout_secs) = calendar.timeout_secs {
                self.calendar.timeout_secs = timeout_secs;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(enabled) = notifications.enabled {
                self.notifications.enabled = enabled;
            }
            if let Some(webhook_url) = notifications.webhook_url {
                self.notifications.webhook_url = Some(webhook_url);
            }
            if let Some(notifications_token_value) = notifications.token {
                self.notifications.token = Some(secret_value(notifications_token_value));
            }
            if let Some(timeout_secs) = notifications.timeout_secs {
                self.notifications.timeout_secs = timeout_secs;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADFLOW_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADFLOW_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("LEADFLOW_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADFLOW_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("LEADFLOW_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADFLOW_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LEADFLOW_SERVER_PORT") {
            self.server.port = parse_env("LEADFLOW_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("LEADFLOW_LOGGING_LEVEL").or_else(|| read_env("LEADFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADFLOW_LOGGING_FORMAT").or_else(|| read_env("LEADFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("LEADFLOW_BUSINESS_HOURS_TIMEZONE") {
            self.business_hours.timezone = value;
        }

        if let Some(value) = read_env("LEADFLOW_POLICY_DEDUP_WINDOW_SECS") {
            self.policy.dedup_window_secs =
                parse_env("LEADFLOW_POLICY_DEDUP_WINDOW_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADFLOW_POLICY_NOTIFICATION_COOLDOWN_SECS") {
            self.policy.notification_cooldown_secs =
                parse_env("LEADFLOW_POLICY_NOTIFICATION_COOLDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADFLOW_CALENDAR_ENABLED") {
            self.calendar.enabled = parse_env("LEADFLOW_CALENDAR_ENABLED", &value)?;
        }
        if let Some(value) = read_env("LEADFLOW_CALENDAR_BASE_URL") {
            self.calendar.base_url = Some(value);
        }
        if let Some(value) = read_env("LEADFLOW_CALENDAR_API_KEY") {
            self.calendar.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("LEADFLOW_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = parse_env("LEADFLOW_NOTIFICATIONS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("LEADFLOW_NOTIFICATIONS_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(value);
        }
        if let Some(value) = read_env("LEADFLOW_NOTIFICATIONS_TOKEN") {
            self.notifications.token = Some(secret_value(value));
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(timezone) = overrides.timezone {
            self.business_hours.timezone = timezone;
        }
        if let Some(dedup_window_secs) = overrides.dedup_window_secs {
            self.policy.dedup_window_secs = dedup_window_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_business_hours(&self.business_hours)?;
        validate_policy(&self.policy)?;
        validate_scoring(&self.scoring)?;
        validate_endpoint("calendar", self.calendar.enabled, self.calendar.base_url.as_deref())?;
        validate_endpoint(
            "notifications",
            self.notifications.enabled,
            self.notifications.webhook_url.as_deref(),
        )?;
        if self.notifications.enabled && blank_secret(self.notifications.token.as_ref()) {
            return Err(ConfigError::Validation(
                "notifications.token is required when notifications are enabled".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadflow.toml"), PathBuf::from("config/leadflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_business_hours(hours: &BusinessHoursConfig) -> Result<(), ConfigError> {
    hours.timezone.parse::<Tz>().map_err(|_| {
        ConfigError::Validation(format!(
            "business_hours.timezone `{}` is not an IANA timezone (e.g. America/Mexico_City)",
            hours.timezone
        ))
    })?;

    let open = parse_clock("business_hours.open", &hours.open)?;
    let close = parse_clock("business_hours.close", &hours.close)?;
    let rest_day_close = parse_clock("business_hours.rest_day_close", &hours.rest_day_close)?;
    if open >= close {
        return Err(ConfigError::Validation(
            "business_hours.open must be earlier than business_hours.close".to_string(),
        ));
    }
    if rest_day_close <= open {
        return Err(ConfigError::Validation(
            "business_hours.rest_day_close must be later than business_hours.open".to_string(),
        ));
    }

    for day in std::iter::once(&hours.rest_day)
        .chain(hours.closed_days.iter())
        .chain(hours.days.keys())
    {
        if day.parse::<chrono::Weekday>().is_err() {
            return Err(ConfigError::Validation(format!(
                "`{day}` is not a weekday name (expected monday..sunday)"
            )));
        }
    }

    for day in hours.days.keys() {
        if hours.closed_days.iter().any(|closed| closed.eq_ignore_ascii_case(day)) {
            return Err(ConfigError::Validation(format!(
                "business_hours.days.{day} is also listed in business_hours.closed_days"
            )));
        }
    }

    crate::appointments::BusinessHours::from_config(hours).map(|_| ())
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    if policy.conversation_window == 0 {
        return Err(ConfigError::Validation(
            "policy.conversation_window must be greater than zero".to_string(),
        ));
    }
    if policy.dedup_window_secs > 300 {
        return Err(ConfigError::Validation(
            "policy.dedup_window_secs must be in range 0..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_scoring(scoring: &ScoringConfig) -> Result<(), ConfigError> {
    if scoring.hot_threshold > 100 || scoring.warm_threshold >= scoring.hot_threshold {
        return Err(ConfigError::Validation(
            "scoring thresholds must satisfy warm_threshold < hot_threshold <= 100".to_string(),
        ));
    }
    if scoring.jump_threshold == 0 {
        return Err(ConfigError::Validation(
            "scoring.jump_threshold must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_endpoint(section: &str, enabled: bool, url: Option<&str>) -> Result<(), ConfigError> {
    match url.map(str::trim) {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
            Err(ConfigError::Validation(format!("{section} url must start with http:// or https://")))
        }
        None if enabled => Err(ConfigError::Validation(format!(
            "{section}.enabled is true but no endpoint url is configured"
        ))),
        _ => Ok(()),
    }
}

fn blank_secret(secret: Option<&SecretString>) -> bool {
    secret.map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
}

pub(crate) fn parse_clock(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ConfigError::Validation(format!("{key} must be HH:MM, got `{value}`")))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    business_hours: Option<BusinessHoursPatch>,
    policy: Option<PolicyPatch>,
    scoring: Option<ScoringPatch>,
    calendar: Option<CalendarPatch>,
    notifications: Option<NotificationPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct BusinessHoursPatch {
    timezone: Option<String>,
    open: Option<String>,
    close: Option<String>,
    rest_day: Option<String>,
    rest_day_close: Option<String>,
    closed_days: Option<Vec<String>>,
    days: Option<BTreeMap<String, DayHoursConfig>>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    dedup_window_secs: Option<u64>,
    notification_cooldown_secs: Option<u64>,
    conversation_window: Option<usize>,
    max_name_asks: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoringPatch {
    appointment_bonus: Option<u8>,
    budget_bonus: Option<u8>,
    income_bonus: Option<u8>,
    financing_bonus: Option<u8>,
    visit_intent_bonus: Option<u8>,
    inquiry_intent_bonus: Option<u8>,
    hot_threshold: Option<u8>,
    warm_threshold: Option<u8>,
    jump_threshold: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    enabled: Option<bool>,
    webhook_url: Option<String>,
    token: Option<String>,
    timeout_secs: Option<u64>,
}
