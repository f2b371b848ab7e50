//! Booking data model and the inbound webhook payload.
//!
//! Booking documents are loosely typed: fields may be missing, `null`, or a
//! number where text is expected. The models read all of those without
//! failing and leave validation to the event builder.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `null` reads as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Scalar read as text; `null`, arrays and maps read as `None`.
fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    optional_text(deserializer).map(Option::unwrap_or_default)
}

/// Appointment as stored by the booking application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub google_calendar_event_id: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub client_id: String,
    #[serde(default, deserialize_with = "text")]
    pub date: String,
    #[serde(default, deserialize_with = "text")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub employee_id_list: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    pub end_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_regular: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub from_google_calendar: bool,
    #[serde(default, deserialize_with = "text")]
    pub notes: String,
    #[serde(default, deserialize_with = "text")]
    pub number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub room_id_list: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    pub start_time: String,
    #[serde(default, deserialize_with = "text")]
    pub status_id: String,
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_duration: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub treatment_id_list: Vec<String>,
}

/// The only part of a stored appointment that UPDATE and DELETE read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LinkedEvent {
    #[serde(default, deserialize_with = "optional_text")]
    pub google_calendar_event_id: Option<String>,
}

impl LinkedEvent {
    /// The linked calendar event id, ignoring blank values.
    pub fn event_id(&self) -> Option<&str> {
        self.google_calendar_event_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Client record referenced by an appointment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Client {
    #[serde(default, deserialize_with = "optional_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub birthday: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub phone_number: Option<String>,
}

/// Treatment offered by the studio.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Treatment {
    #[serde(default, deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_employee_required: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub room_id_list: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub treatment_category_id: String,
    /// Joined from `treatment_categories` at read time, never persisted
    #[serde(skip)]
    pub treatment_category_name: String,
}

/// Treatment category.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TreatmentCategory {
    #[serde(default, deserialize_with = "optional_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
}

/// Entry of the `colors` collection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Color {
    /// Google Calendar palette id
    #[serde(default, deserialize_with = "optional_text")]
    pub color_id: Option<String>,
}

/// Kind of change the booking application reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Webhook request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub appointment: Option<Appointment>,
    #[serde(default)]
    pub appointment_id: Option<String>,
    pub operation: Operation,
}
