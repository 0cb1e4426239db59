use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_REMINDER_LEAD_MINUTES: i64 = 120;
pub const DEFAULT_REMINDER_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub redis_url: Option<String>,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub blocks_affect_availability: bool,
    pub reminder_lead_minutes: i64,
    pub reminder_poll_interval_secs: u64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            supabase_service_role_key: String::new(),
            redis_url: None,
            email_api_url: String::new(),
            email_api_key: String::new(),
            email_from: String::new(),
            blocks_affect_availability: true,
            reminder_lead_minutes: DEFAULT_REMINDER_LEAD_MINUTES,
            reminder_poll_interval_secs: DEFAULT_REMINDER_POLL_INTERVAL_SECS,
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_API_URL not set, reminder emails are disabled");
                    String::new()
                }),
            email_api_key: env::var("EMAIL_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@amae.clinic".to_string()),
            blocks_affect_availability: parse_or_default(
                "BLOCKS_AFFECT_AVAILABILITY",
                env::var("BLOCKS_AFFECT_AVAILABILITY").ok(),
                true,
            ),
            reminder_lead_minutes: parse_or_default(
                "REMINDER_LEAD_MINUTES",
                env::var("REMINDER_LEAD_MINUTES").ok(),
                DEFAULT_REMINDER_LEAD_MINUTES,
            ),
            reminder_poll_interval_secs: parse_or_default(
                "REMINDER_POLL_INTERVAL_SECS",
                env::var("REMINDER_POLL_INTERVAL_SECS").ok(),
                DEFAULT_REMINDER_POLL_INTERVAL_SECS,
            ),
            port: parse_or_default("PORT", env::var("PORT").ok(), DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.redis_url.is_none() {
            warn!("REDIS_URL not set, armed reminders will not survive a restart");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Whether the Supabase-backed stores can be used instead of the in-memory ones.
    pub fn is_supabase_store_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_role_key.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_url.is_empty() && !self.email_api_key.is_empty()
    }
}

fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Copy,
{
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", name, value);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_default_falls_back_on_garbage() {
        assert!(parse_or_default("FLAG", Some("false".to_string()), true) == false);
        assert!(parse_or_default("FLAG", Some("nope".to_string()), true));
        assert_eq!(parse_or_default("LEAD", Some(" 90 ".to_string()), 120i64), 90);
        assert_eq!(parse_or_default("LEAD", None, 120i64), 120);
    }

    #[test]
    fn test_default_config_blocks_affect_availability() {
        let config = AppConfig::default();
        assert!(config.blocks_affect_availability);
        assert_eq!(config.reminder_lead_minutes, 120);
        assert!(!config.is_supabase_store_configured());
        assert!(!config.is_email_configured());
    }
}
