use serde::Deserialize;
use std::env;

use ticketbot_core::CheckoutMode;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub messaging: MessagingConfig,
    pub tickets: TicketsConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the bot runs on the in-memory store.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessagingProvider {
    Twilio,
    Cloud,
    #[default]
    Log,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MessagingConfig {
    #[serde(default)]
    pub provider: MessagingProvider,
    pub twilio: Option<TwilioConfig>,
    pub cloud: Option<CloudApiConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    #[serde(default = "default_twilio_from")]
    pub from_number: String,
}

fn default_twilio_from() -> String {
    "+14155238886".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CloudApiConfig {
    pub access_token: String,
    pub phone_number_id: String,
    #[serde(default = "default_graph_version")]
    pub api_version: String,
    /// Token echoed back during the webhook verification handshake.
    pub verify_token: Option<String>,
}

fn default_graph_version() -> String {
    "v18.0".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TicketsConfig {
    pub public_base_url: String,
    #[serde(default = "default_qr_service_url")]
    pub qr_service_url: String,
    #[serde(default = "default_qr_size")]
    pub qr_size: u32,
}

fn default_qr_service_url() -> String {
    "https://api.qrserver.com/v1/create-qr-code/".into()
}

fn default_qr_size() -> u32 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_reservation_ttl")]
    pub reservation_ttl_minutes: i64,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_minutes: i64,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    #[serde(default = "default_max_tickets")]
    pub max_tickets: i32,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default)]
    pub checkout: CheckoutMode,
    #[serde(default = "default_booking_id_attempts")]
    pub booking_id_attempts: u32,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
    /// Balance (paise) credited to a new account in balance checkout.
    #[serde(default)]
    pub opening_balance: i64,
    /// Offset applied to dates shown in chat replies.
    #[serde(default = "default_display_offset")]
    pub display_utc_offset_minutes: i32,
}

fn default_reservation_ttl() -> i64 { 5 }
fn default_session_timeout() -> i64 { 30 }
fn default_max_search_results() -> usize { 3 }
fn default_max_tickets() -> i32 { 10 }
fn default_sweep_interval() -> u64 { 60 }
fn default_booking_id_attempts() -> u32 { 5 }
fn default_rate_limit() -> i64 { 30 }
fn default_display_offset() -> i32 { 330 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            reservation_ttl_minutes: default_reservation_ttl(),
            session_timeout_minutes: default_session_timeout(),
            max_search_results: default_max_search_results(),
            max_tickets: default_max_tickets(),
            sweep_interval_seconds: default_sweep_interval(),
            checkout: CheckoutMode::default(),
            booking_id_attempts: default_booking_id_attempts(),
            rate_limit_per_minute: default_rate_limit(),
            opening_balance: 0,
            display_utc_offset_minutes: default_display_offset(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // TICKETBOT__BUSINESS_RULES__CHECKOUT=balance sets business_rules.checkout
            .add_source(config::Environment::with_prefix("TICKETBOT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rules_defaults_apply_to_missing_keys() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 3000

                [tickets]
                public_base_url = "https://tickets.example.com"

                [business_rules]
                checkout = "balance"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: Config = cfg.try_deserialize().unwrap();

        assert_eq!(config.business_rules.checkout, CheckoutMode::Balance);
        assert_eq!(config.business_rules.reservation_ttl_minutes, 5);
        assert_eq!(config.business_rules.max_search_results, 3);
        assert_eq!(config.messaging.provider, MessagingProvider::Log);
        assert!(config.database.url.is_none());
        assert!(config.redis.is_none());
    }
}
