use crate::error::{Error, Result};
use chrono::NaiveDate;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    /// Sender identity, e.g. `"Northwind Capital <no-reply@northwind.example>"`.
    pub from: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ConsultationConfig {
    pub booking_window_days: i64,
    pub blackout_dates: Vec<NaiveDate>,
    pub success_display_secs: u64,
}

impl Default for ConsultationConfig {
    fn default() -> Self {
        Self {
            booking_window_days: 90,
            blackout_dates: Vec::new(),
            success_display_secs: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub public_rps: u32,
    pub api_rps: u32,
    pub uploads_dir: PathBuf,
    pub public_base_url: String,
    pub scroll_delay: Duration,
    pub email: EmailConfig,
    pub consultation: ConsultationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let consultation = ConsultationConfig {
            booking_window_days: booking_window(get_env_parse_or("CONSULTATION_BOOKING_WINDOW_DAYS", 90)?)?,
            blackout_dates: parse_dates(&env::var("CONSULTATION_BLACKOUT_DATES").unwrap_or_default())?,
            success_display_secs: get_env_parse_or("CONSULTATION_SUCCESS_DISPLAY_SECS", 5)?,
        };

        Ok(Self {
            server_address: env::var("SERVER_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            jwt_secret: get_env("JWT_SECRET")?,
            public_rps: get_env_parse_or("PUBLIC_RPS", 20)?,
            api_rps: get_env_parse_or("API_RPS", 100)?,
            uploads_dir: PathBuf::from(env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string())),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            scroll_delay: Duration::from_millis(get_env_parse_or("CONVERSATION_SCROLL_DELAY_MS", 100)?),
            email: EmailConfig {
                api_url: get_env("EMAIL_API_URL")?,
                api_key: get_env("EMAIL_API_KEY")?,
                from: get_env("EMAIL_FROM")?,
                timeout: Duration::from_secs(get_env_parse_or("EMAIL_TIMEOUT_SECS", 30)?),
            },
            consultation,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

const MAX_BOOKING_WINDOW_DAYS: i64 = 3_650;

fn booking_window(days: i64) -> Result<i64> {
    if (0..=MAX_BOOKING_WINDOW_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(Error::Config(format!(
            "CONSULTATION_BOOKING_WINDOW_DAYS must be between 0 and {}, got {}",
            MAX_BOOKING_WINDOW_DAYS, days
        )))
    }
}

/// Comma-separated `YYYY-MM-DD` list.
fn parse_dates(raw: &str) -> Result<Vec<NaiveDate>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| Error::Config(format!("Invalid blackout date {}: {}", s, e)))
        })
        .collect()
}
