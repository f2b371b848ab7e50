//! Google Calendar v3 event payloads and client.
//!
//! Remote failures never escape as transport errors: they are normalized to
//! [`Error::Remote`] with a 4xx status and the best message available.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::google_auth::TokenSource;
use crate::{Error, Result};

pub const CALENDAR_BASE_URL: &str = "https://www.googleapis.com";

/// Fallback when the remote gives no usable message.
pub const GENERIC_REMOTE_ERROR: &str = "Calendar request failed";

/// Event payload accepted by `events.insert` and `events.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub location: String,
    pub reminders: Reminders,
    pub visibility: String,
    pub transparency: String,
    pub color_id: String,
    pub extended_properties: ExtendedProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// RFC 3339 timestamp with offset
    pub date_time: String,
    /// IANA zone name
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    pub overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    Email,
    Popup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderOverride {
    pub method: ReminderMethod,
    pub minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub private: BTreeMap<String, String>,
}

/// The part of an event resource the webhook cares about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventResource {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: Option<String>,
}

/// Normalize a failed call: keep a remote 4xx, anything else becomes 400.
pub fn remote_error(status: Option<u16>, body: &str) -> Error {
    let status = status.filter(|s| (400..500).contains(s)).unwrap_or(400);
    let message = serde_json::from_str::<GoogleErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_REMOTE_ERROR.to_string());
    Error::Remote { status, message }
}

/// Calendar operations used by the dispatcher.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Create an event; the returned resource carries the external id.
    async fn insert(&self, event: &CalendarEvent) -> Result<EventResource>;

    /// Replace an existing event.
    async fn update(&self, event_id: &str, event: &CalendarEvent) -> Result<EventResource>;

    /// Best-effort delete. Failures are logged, never returned.
    async fn delete(&self, event_id: &str) -> bool;
}

/// Google Calendar REST client bound to one calendar.
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    token: Arc<dyn TokenSource>,
    base_url: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    pub fn new(http_client: reqwest::Client, token: Arc<dyn TokenSource>, calendar_id: impl Into<String>) -> Self {
        Self {
            http_client,
            token,
            base_url: CALENDAR_BASE_URL.to_string(),
            calendar_id: calendar_id.into(),
        }
    }

    /// Point the client at another host (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendar/v3/calendars/{}/events",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.token.access_token().await?;
        let response = match request
            .bearer_auth(token)
            .query(&[("sendUpdates", "all")])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Calendar request failed: {}", e);
                return Err(remote_error(e.status().map(|s| s.as_u16()), ""));
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("Calendar API returned {}: {}", status, body);
            return Err(remote_error(Some(status), &body));
        }

        Ok(response)
    }

    async fn read_event(response: reqwest::Response) -> Result<EventResource> {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str(&body).map_err(|e| {
            warn!("Unreadable calendar response ({}): {}", status, e);
            remote_error(None, "")
        })
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn insert(&self, event: &CalendarEvent) -> Result<EventResource> {
        let response = self
            .send(self.http_client.post(self.events_url()).json(event))
            .await?;
        let created = Self::read_event(response).await?;
        info!("Event created with ID: {:?}", created.id);
        Ok(created)
    }

    async fn update(&self, event_id: &str, event: &CalendarEvent) -> Result<EventResource> {
        let response = self
            .send(self.http_client.put(self.event_url(event_id)).json(event))
            .await?;
        let updated = Self::read_event(response).await?;
        info!("Event updated: {}", event_id);
        Ok(updated)
    }

    async fn delete(&self, event_id: &str) -> bool {
        match self.send(self.http_client.delete(self.event_url(event_id))).await {
            Ok(_) => {
                info!("Event deleted: {}", event_id);
                true
            }
            Err(e) => {
                warn!("Error deleting event {}: {}", event_id, e);
                false
            }
        }
    }
}
