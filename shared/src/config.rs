//! Configuration management for the webhook Lambda.

use std::env;

use chrono_tz::Tz;

use crate::{Error, Result};

/// Secret id holding the Google service-account JSON.
pub const DEFAULT_CREDENTIALS_SECRET_ID: &str = "google_calendar_config/credentials.json";

/// Physical location attached to every event.
pub const DEFAULT_EVENT_LOCATION: &str = "Via Antonio Allegri, 39, 25124 Brescia BS";

/// Google palette id used when an appointment has no resolvable color.
pub const DEFAULT_COLOR_ID: &str = "1";

/// Settings that shape every generated calendar event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSettings {
    /// Zone the stored appointment timestamps are expressed in
    pub time_zone: Tz,
    /// Location string for the event
    pub location: String,
    /// Fallback palette id
    pub default_color_id: String,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            time_zone: chrono_tz::Europe::Rome,
            location: DEFAULT_EVENT_LOCATION.to_string(),
            default_color_id: DEFAULT_COLOR_ID.to_string(),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Google Cloud project hosting the Firestore database
    pub project_id: String,
    /// Firestore database name
    pub firestore_database: String,
    /// Calendar all events are written to
    pub calendar_id: String,
    /// Secrets Manager id of the service-account credentials
    pub credentials_secret_id: String,
    /// AWS region
    pub aws_region: String,
    /// Event shaping
    pub event: EventSettings,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_id = lookup("GOOGLE_PROJECT_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config("GOOGLE_PROJECT_ID not set".to_string()))?;

        let time_zone = match lookup("EVENT_TIME_ZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| Error::Config(format!("Invalid EVENT_TIME_ZONE: {}", e)))?,
            None => chrono_tz::Europe::Rome,
        };

        Ok(Self {
            project_id,
            firestore_database: lookup("FIRESTORE_DATABASE")
                .unwrap_or_else(|| "(default)".to_string()),
            calendar_id: lookup("CALENDAR_ID").unwrap_or_else(|| "primary".to_string()),
            credentials_secret_id: lookup("CREDENTIALS_SECRET_ID")
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_SECRET_ID.to_string()),
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            event: EventSettings {
                time_zone,
                location: lookup("EVENT_LOCATION")
                    .unwrap_or_else(|| DEFAULT_EVENT_LOCATION.to_string()),
                default_color_id: lookup("DEFAULT_COLOR_ID")
                    .unwrap_or_else(|| DEFAULT_COLOR_ID.to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("GOOGLE_PROJECT_ID", "aurea")])).unwrap();
        assert_eq!(config.project_id, "aurea");
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.firestore_database, "(default)");
        assert_eq!(config.credentials_secret_id, DEFAULT_CREDENTIALS_SECRET_ID);
        assert_eq!(config.event, EventSettings::default());
    }

    #[test]
    fn test_missing_project_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_time_zone_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("GOOGLE_PROJECT_ID", "aurea"),
            ("EVENT_TIME_ZONE", "Mars/Olympus"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("GOOGLE_PROJECT_ID", "aurea"),
            ("CALENDAR_ID", "studio@example.com"),
            ("EVENT_TIME_ZONE", "Europe/London"),
            ("DEFAULT_COLOR_ID", "7"),
        ]))
        .unwrap();
        assert_eq!(config.calendar_id, "studio@example.com");
        assert_eq!(config.event.time_zone, chrono_tz::Europe::London);
        assert_eq!(config.event.default_color_id, "7");
    }
}
