use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub calendar_sync_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            bind_addr: env::var("CLINIC_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            work_start_hour: parse_hour("CLINIC_WORK_START_HOUR", 9),
            work_end_hour: parse_hour("CLINIC_WORK_END_HOUR", 20),
            calendar_sync_url: env::var("CLINIC_CALENDAR_SYNC_URL")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_CALENDAR_SYNC_URL not set, calendar sync disabled");
                    String::new()
                }),
        };

        if config.work_start_hour >= config.work_end_hour {
            warn!(
                "Working hours misconfigured ({}..{}), falling back to 9..20",
                config.work_start_hour, config.work_end_hour
            );
            return Self {
                work_start_hour: 9,
                work_end_hour: 20,
                ..config
            };
        }

        config
    }

    pub fn is_calendar_sync_configured(&self) -> bool {
        !self.calendar_sync_url.is_empty()
    }
}

fn parse_hour(var: &str, default: u32) -> u32 {
    match env::var(var) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(hour) if hour < 24 => hour,
            _ => {
                warn!("{} is not a valid hour ({}), using {}", var, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
