use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub email_api_url: String,
    pub email_api_key: String,
    pub sender_email: String,
    pub server_host: String,
    pub server_port: u16,
    pub reminder_window_start_hours: i64,
    pub reminder_window_end_hours: i64,
    pub notification_retention_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            supabase_jwt_secret: String::new(),
            email_api_url: "https://api.resend.com/emails".to_string(),
            email_api_key: String::new(),
            sender_email: "noreply@example.com".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            reminder_window_start_hours: 23,
            reminder_window_end_hours: 25,
            notification_retention_days: 30,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, falling back to in-memory storage");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or(defaults.email_api_url),
            email_api_key: env::var("EMAIL_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_API_KEY not set, notifications will only be logged");
                    String::new()
                }),
            sender_email: env::var("SENDER_EMAIL")
                .unwrap_or(defaults.sender_email),
            server_host: env::var("SERVER_HOST")
                .unwrap_or(defaults.server_host),
            server_port: parse_or("SERVER_PORT", defaults.server_port),
            reminder_window_start_hours: parse_or(
                "REMINDER_WINDOW_START_HOURS",
                defaults.reminder_window_start_hours,
            ),
            reminder_window_end_hours: parse_or(
                "REMINDER_WINDOW_END_HOURS",
                defaults.reminder_window_end_hours,
            ),
            notification_retention_days: parse_or(
                "NOTIFICATION_RETENTION_DAYS",
                defaults.notification_retention_days,
            ),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.reminder_window_start_hours >= config.reminder_window_end_hours {
            warn!(
                "Reminder window {}h..{}h is empty, reminders will never be sent",
                config.reminder_window_start_hours, config.reminder_window_end_hours
            );
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        self.is_database_configured() && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_database_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_key.is_empty() && !self.email_api_url.is_empty()
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
