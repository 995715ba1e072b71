use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::realtime::BroadcastScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub client_origin: Option<String>,
    pub event_buffer_size: usize,
    pub side_effect_queue_size: usize,
    pub session_buffer_size: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub realtime_scope: BroadcastScope,
    pub audit_log_path: Option<PathBuf>,
    pub directory_seed_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 5000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            client_origin: None,
            event_buffer_size: 1024,
            side_effect_queue_size: 1024,
            session_buffer_size: 256,
            default_page_size: 5,
            max_page_size: 100,
            realtime_scope: BroadcastScope::Global,
            audit_log_path: None,
            directory_seed_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") | Err(_) => LogFormat::Compact,
            Ok(other) => {
                return Err(AppError::Internal(format!("invalid LOG_FORMAT: {other}")));
            }
        };

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            client_origin: optional("CLIENT_ORIGIN"),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            side_effect_queue_size: parse_or_default(
                "SIDE_EFFECT_QUEUE_SIZE",
                defaults.side_effect_queue_size,
            )?,
            session_buffer_size: parse_or_default(
                "SESSION_BUFFER_SIZE",
                defaults.session_buffer_size,
            )?,
            default_page_size: parse_or_default("DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: parse_or_default("MAX_PAGE_SIZE", defaults.max_page_size)?,
            realtime_scope: parse_or_default("REALTIME_SCOPE", defaults.realtime_scope)?,
            audit_log_path: optional("AUDIT_LOG_PATH").map(PathBuf::from),
            directory_seed_path: optional("DIRECTORY_SEED_PATH").map(PathBuf::from),
        };

        if config.default_page_size == 0 || config.max_page_size < config.default_page_size {
            return Err(AppError::Internal(
                "DEFAULT_PAGE_SIZE must be >= 1 and <= MAX_PAGE_SIZE".to_string(),
            ));
        }

        Ok(config)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
