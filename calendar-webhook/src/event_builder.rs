//! Maps an appointment and its related records onto a calendar event.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use shared::calendar::{
    CalendarEvent, EventDateTime, ExtendedProperties, ReminderMethod, ReminderOverride, Reminders,
};
use shared::{Appointment, Client, Color, Error, EventSettings, Result, Treatment};

/// Private extended property carrying the appointment id.
pub const CORRELATION_PROPERTY: &str = "appointment_id";

/// Pattern of stored appointment timestamps (fraction optional).
const STORED_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.f";
const CALENDAR_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Everything the builder needs, already resolved from the document store.
#[derive(Debug, Clone, Copy)]
pub struct EventSource<'a> {
    pub appointment_id: &'a str,
    pub appointment: &'a Appointment,
    pub client: Option<&'a Client>,
    pub treatments: &'a [Treatment],
    pub color: Option<&'a Color>,
}

/// Build the calendar event for an appointment.
///
/// Pure: no I/O, and the same source always yields the same event.
pub fn build_event(source: &EventSource<'_>, settings: &EventSettings) -> Result<CalendarEvent> {
    let client = source
        .client
        .ok_or_else(|| Error::Validation("Client not found".to_string()))?;

    let summary = summary(client, source.treatments)?;

    let start = parse_local_timestamp(&source.appointment.start_time, settings.time_zone)?;
    let end = parse_local_timestamp(&source.appointment.end_time, settings.time_zone)?;
    if end < start {
        return Err(Error::Validation(format!(
            "Appointment ends before it starts ({} < {})",
            source.appointment.end_time, source.appointment.start_time
        )));
    }

    let color_id = source
        .color
        .and_then(|color| color.color_id.as_deref())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(settings.default_color_id.as_str())
        .to_string();

    let mut private = BTreeMap::new();
    private.insert(CORRELATION_PROPERTY.to_string(), source.appointment_id.to_string());

    Ok(CalendarEvent {
        summary,
        description: description(source.appointment, client),
        start: event_time(&start),
        end: event_time(&end),
        location: settings.location.clone(),
        reminders: Reminders {
            use_default: false,
            overrides: vec![
                ReminderOverride {
                    method: ReminderMethod::Email,
                    minutes: 30,
                },
                ReminderOverride {
                    method: ReminderMethod::Popup,
                    minutes: 10,
                },
            ],
        },
        visibility: "default".to_string(),
        transparency: "opaque".to_string(),
        color_id,
        extended_properties: ExtendedProperties { private },
    })
}

fn required_name<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Validation(format!("Client {} is missing", field)))
}

/// `"{first} {last} - {category} {treatment}, ..."`
fn summary(client: &Client, treatments: &[Treatment]) -> Result<String> {
    let first_name = required_name(client.first_name.as_deref(), "first name")?;
    let last_name = required_name(client.last_name.as_deref(), "last name")?;

    let treatments = treatments
        .iter()
        .map(|t| format!("{} {}", t.treatment_category_name, t.name).trim().to_string())
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let summary = if treatments.is_empty() {
        format!("{} {}", first_name, last_name)
    } else {
        format!("{} {} - {}", first_name, last_name, treatments)
    };

    let summary = summary.trim().to_string();
    if summary.is_empty() {
        return Err(Error::Validation("Event summary is empty".to_string()));
    }
    Ok(summary)
}

fn description(appointment: &Appointment, client: &Client) -> String {
    let mut lines = Vec::new();

    let notes = appointment.notes.trim();
    if !notes.is_empty() {
        lines.push(notes.to_string());
    }
    if let Some(phone) = client.phone_number.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        lines.push(format!("Phone: {}", phone));
    }
    if let Some(email) = client.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        lines.push(format!("Email: {}", email));
    }

    lines.join("\n")
}

/// Read a stored timestamp as wall-clock time in `tz`.
///
/// The booking app writes local time with a trailing `Z`, so the suffix is
/// dropped rather than honored.
pub fn parse_local_timestamp(raw: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let trimmed = raw.trim();
    let local = trimmed.strip_suffix('Z').unwrap_or(trimmed);

    let naive = NaiveDateTime::parse_from_str(local, STORED_TIMESTAMP)
        .map_err(|e| Error::Format(format!("Invalid timestamp '{}': {}", raw, e)))?;

    // Ambiguous (DST fall-back) times resolve to the earlier instant.
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| Error::Format(format!("Timestamp '{}' does not exist in {}", raw, tz.name())))
}

fn event_time(dt: &DateTime<Tz>) -> EventDateTime {
    EventDateTime {
        date_time: dt.format(CALENDAR_TIMESTAMP).to_string(),
        time_zone: dt.timezone().name().to_string(),
    }
}
