use crate::error::{Error, Result};
use crate::models::assessment::AssessmentType;
use dotenvy::dotenv;
use ipnetwork::IpNetwork;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Production,
    Development,
}

/// Threshold/scale snapshot for one assessment type, copied onto every
/// Assessment row at creation time.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdConfig {
    pub threshold: f64,
    pub scale: f64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub app_env: AppEnv,
    pub webhook_secret: String,
    /// CIDR ranges a production webhook caller must originate from.
    pub webhook_allowed_cidrs: Vec<IpNetwork>,
    pub webhook_rate_limit: u32,
    pub webhook_rate_window_secs: u64,
    pub general_threshold: ThresholdConfig,
    pub specialized_threshold: ThresholdConfig,
    pub email_hourly_cap: u32,
    pub email_daily_cap: u32,
    pub email_max_attempts: u32,
    pub email_retry_delay_secs: u64,
    pub smtp_server: String,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub from_email: String,
    /// Optional provider-API endpoint used as the per-recipient alternate
    /// outbound channel.
    pub alternate_mail_url: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let app_env = match env::var("APP_ENV").as_deref() {
            Ok("production") => AppEnv::Production,
            _ => AppEnv::Development,
        };

        let webhook_allowed_cidrs = match env::var("WEBHOOK_ALLOWED_CIDRS") {
            Ok(raw) if !raw.trim().is_empty() => parse_cidrs(&raw)?,
            _ => Vec::new(),
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            app_env,
            webhook_secret: get_env("WEBHOOK_SECRET")?,
            webhook_allowed_cidrs,
            webhook_rate_limit: get_env_parse("WEBHOOK_RATE_LIMIT")?,
            webhook_rate_window_secs: get_env_parse("WEBHOOK_RATE_WINDOW_SECS")?,
            general_threshold: ThresholdConfig {
                threshold: get_env_parse("GENERAL_THRESHOLD")?,
                scale: get_env_parse("GENERAL_SCALE")?,
            },
            specialized_threshold: ThresholdConfig {
                threshold: get_env_parse("SPECIALIZED_THRESHOLD")?,
                scale: get_env_parse("SPECIALIZED_SCALE")?,
            },
            email_hourly_cap: get_env_parse("EMAIL_HOURLY_CAP")?,
            email_daily_cap: get_env_parse("EMAIL_DAILY_CAP")?,
            email_max_attempts: get_env_parse("EMAIL_MAX_ATTEMPTS")?,
            email_retry_delay_secs: get_env_parse("EMAIL_RETRY_DELAY_SECS")?,
            smtp_server: get_env("SMTP_SERVER")?,
            smtp_user: get_env("SMTP_USER")?,
            smtp_pass: get_env("SMTP_PASS")?,
            from_email: get_env("FROM_EMAIL")?,
            alternate_mail_url: env::var("ALTERNATE_MAIL_URL").ok(),
        })
    }

    pub fn threshold_for(&self, assessment_type: AssessmentType) -> ThresholdConfig {
        match assessment_type {
            AssessmentType::GeneralCompetencies => self.general_threshold,
            AssessmentType::SpecializedCompetencies => self.specialized_threshold,
        }
    }
}

fn parse_cidrs(raw: &str) -> Result<Vec<IpNetwork>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpNetwork>()
                .map_err(|e| Error::Config(format!("Invalid CIDR '{}': {}", s, e)))
        })
        .collect()
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
