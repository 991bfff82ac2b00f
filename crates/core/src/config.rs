use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommend::RetryPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub catalog: CatalogConfig,
    pub recommend: RecommendConfig,
    pub daily: DailyConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub command: String,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecommendConfig {
    pub max_attempts: u32,
    pub max_start_page: u32,
    pub list_max_results: u32,
    pub search_max_results: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyConfig {
    pub enabled: bool,
    pub channel_id: Option<String>,
    pub interval_hours: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub catalog_api_key: Option<String>,
    pub catalog_base_url: Option<String>,
    pub daily_enabled: Option<bool>,
    pub daily_channel_id: Option<String>,
    pub daily_interval_hours: Option<u64>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                api_base_url: "https://slack.com/api".to_string(),
                command: "/book".to_string(),
            },
            catalog: CatalogConfig {
                api_key: String::new().into(),
                base_url: "https://www.aladin.co.kr/ttb/api".to_string(),
                timeout_secs: 10,
            },
            recommend: RecommendConfig {
                max_attempts: 5,
                max_start_page: 100,
                list_max_results: 20,
                search_max_results: 10,
            },
            daily: DailyConfig { enabled: true, channel_id: None, interval_hours: 24 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl RecommendConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            max_start_page: self.max_start_page,
            list_max_results: self.list_max_results,
            search_max_results: self.search_max_results,
        }
    }
}

impl DailyConfig {
    /// Channel to post into when the daily pick is switched on.
    pub fn active_channel(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.channel_id.as_deref()
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("bookbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(app_token) = slack.app_token {
                self.slack.app_token = secret_value(app_token);
            }
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(command) = slack.command {
                self.slack.command = command;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(api_key) = catalog.api_key {
                self.catalog.api_key = secret_value(api_key);
            }
            if let Some(base_url) = catalog.base_url {
                self.catalog.base_url = base_url;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
        }

        if let Some(recommend) = patch.recommend {
            if let Some(max_attempts) = recommend.max_attempts {
                self.recommend.max_attempts = max_attempts;
            }
            if let Some(max_start_page) = recommend.max_start_page {
                self.recommend.max_start_page = max_start_page;
            }
            if let Some(list_max_results) = recommend.list_max_results {
                self.recommend.list_max_results = list_max_results;
            }
            if let Some(search_max_results) = recommend.search_max_results {
                self.recommend.search_max_results = search_max_results;
            }
        }

        if let Some(daily) = patch.daily {
            if let Some(enabled) = daily.enabled {
                self.daily.enabled = enabled;
            }
            if let Some(channel_id) = daily.channel_id {
                self.daily.channel_id = Some(channel_id);
            }
            if let Some(interval_hours) = daily.interval_hours {
                self.daily.interval_hours = interval_hours;
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
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BOOKBOT_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("BOOKBOT_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("BOOKBOT_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("BOOKBOT_SLACK_COMMAND") {
            self.slack.command = value;
        }

        let api_key = read_env("BOOKBOT_CATALOG_API_KEY").or_else(|| read_env("ALADIN_API_KEY"));
        if let Some(value) = api_key {
            self.catalog.api_key = secret_value(value);
        }
        if let Some(value) = read_env("BOOKBOT_CATALOG_BASE_URL") {
            self.catalog.base_url = value;
        }
        if let Some(value) = read_env("BOOKBOT_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("BOOKBOT_CATALOG_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BOOKBOT_RECOMMEND_MAX_ATTEMPTS") {
            self.recommend.max_attempts = parse_u32("BOOKBOT_RECOMMEND_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("BOOKBOT_RECOMMEND_MAX_START_PAGE") {
            self.recommend.max_start_page = parse_u32("BOOKBOT_RECOMMEND_MAX_START_PAGE", &value)?;
        }
        if let Some(value) = read_env("BOOKBOT_RECOMMEND_LIST_MAX_RESULTS") {
            self.recommend.list_max_results =
                parse_u32("BOOKBOT_RECOMMEND_LIST_MAX_RESULTS", &value)?;
        }
        if let Some(value) = read_env("BOOKBOT_RECOMMEND_SEARCH_MAX_RESULTS") {
            self.recommend.search_max_results =
                parse_u32("BOOKBOT_RECOMMEND_SEARCH_MAX_RESULTS", &value)?;
        }

        if let Some(value) = read_env("BOOKBOT_DAILY_ENABLED") {
            self.daily.enabled = parse_bool("BOOKBOT_DAILY_ENABLED", &value)?;
        }
        let channel_id = read_env("BOOKBOT_DAILY_CHANNEL_ID").or_else(|| read_env("CHANNEL_ID"));
        if let Some(value) = channel_id {
            self.daily.channel_id = Some(value);
        }
        if let Some(value) = read_env("BOOKBOT_DAILY_INTERVAL_HOURS") {
            self.daily.interval_hours = parse_u64("BOOKBOT_DAILY_INTERVAL_HOURS", &value)?;
        }

        let log_level =
            read_env("BOOKBOT_LOGGING_LEVEL").or_else(|| read_env("BOOKBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BOOKBOT_LOGGING_FORMAT").or_else(|| read_env("BOOKBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(slack_api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = slack_api_base_url;
        }
        if let Some(catalog_api_key) = overrides.catalog_api_key {
            self.catalog.api_key = secret_value(catalog_api_key);
        }
        if let Some(catalog_base_url) = overrides.catalog_base_url {
            self.catalog.base_url = catalog_base_url;
        }
        if let Some(daily_enabled) = overrides.daily_enabled {
            self.daily.enabled = daily_enabled;
        }
        if let Some(daily_channel_id) = overrides.daily_channel_id {
            self.daily.channel_id = Some(daily_channel_id);
        }
        if let Some(daily_interval_hours) = overrides.daily_interval_hours {
            self.daily.interval_hours = daily_interval_hours;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_catalog(&self.catalog)?;
        validate_recommend(&self.recommend)?;
        validate_daily(&self.daily)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("bookbot.toml"), PathBuf::from("config/bookbot.toml")]
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

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    validate_http_url("slack.api_base_url", &slack.api_base_url)?;

    let command = slack.command.trim();
    if !command.starts_with('/') || command.len() < 2 || command.contains(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "slack.command must be a slash command such as `/book`".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "catalog.api_key is required. Request a TTB key at https://www.aladin.co.kr/ttb/wblog_manage.aspx"
                .to_string(),
        ));
    }

    validate_http_url("catalog.base_url", &catalog.base_url)?;

    if catalog.timeout_secs == 0 || catalog.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommend(recommend: &RecommendConfig) -> Result<(), ConfigError> {
    if recommend.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "recommend.max_attempts must be greater than zero".to_string(),
        ));
    }
    if recommend.max_start_page == 0 {
        return Err(ConfigError::Validation(
            "recommend.max_start_page must be greater than zero".to_string(),
        ));
    }
    if !(1..=50).contains(&recommend.list_max_results) {
        return Err(ConfigError::Validation(
            "recommend.list_max_results must be in range 1..=50".to_string(),
        ));
    }
    if !(1..=50).contains(&recommend.search_max_results) {
        return Err(ConfigError::Validation(
            "recommend.search_max_results must be in range 1..=50".to_string(),
        ));
    }

    Ok(())
}

fn validate_daily(daily: &DailyConfig) -> Result<(), ConfigError> {
    if daily.interval_hours == 0 {
        return Err(ConfigError::Validation(
            "daily.interval_hours must be greater than zero".to_string(),
        ));
    }

    if let Some(channel_id) = &daily.channel_id {
        if channel_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "daily.channel_id must not be blank when set".to_string(),
            ));
        }
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

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    catalog: Option<CatalogPatch>,
    recommend: Option<RecommendPatch>,
    daily: Option<DailyPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    api_base_url: Option<String>,
    command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendPatch {
    max_attempts: Option<u32>,
    max_start_page: Option<u32>,
    list_max_results: Option<u32>,
    search_max_results: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DailyPatch {
    enabled: Option<bool>,
    channel_id: Option<String>,
    interval_hours: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
