//! Routes a sync request to the calendar and reports one outcome.

use serde_json::Value;
use shared::calendar::{CalendarClient, CalendarEvent};
use shared::firestore::{Collection, DocumentRepository};
use shared::{Appointment, Error, EventSettings, LinkedEvent, Operation, Result, SyncRequest};
use tracing::{error, info, warn};

use crate::event_builder::{build_event, EventSource};
use crate::records;

/// Field on the appointment linking it to its calendar event.
pub const EVENT_ID_FIELD: &str = "google_calendar_event_id";

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success,
    Failure { status: u16, message: String },
}

impl Reply {
    pub fn status(&self) -> u16 {
        match self {
            Reply::Success => 200,
            Reply::Failure { status, .. } => *status,
        }
    }
}

pub struct Dispatcher<'a> {
    repository: &'a dyn DocumentRepository,
    calendar: &'a dyn CalendarClient,
    settings: &'a EventSettings,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        repository: &'a dyn DocumentRepository,
        calendar: &'a dyn CalendarClient,
        settings: &'a EventSettings,
    ) -> Self {
        Self {
            repository,
            calendar,
            settings,
        }
    }

    /// Handle one request. Anticipated failures come back as 4xx with their
    /// own message; anything else is logged and reported as a generic 500.
    pub async fn dispatch(&self, request: SyncRequest) -> Reply {
        match self.run(request).await {
            Ok(()) => Reply::Success,
            Err(e) if e.is_client_error() => {
                warn!("Request rejected: {}", e);
                Reply::Failure {
                    status: e.status_code(),
                    message: e.to_string(),
                }
            }
            Err(e) => {
                error!("Error: {}", e);
                Reply::Failure {
                    status: 500,
                    message: INTERNAL_ERROR_MESSAGE.to_string(),
                }
            }
        }
    }

    async fn run(&self, request: SyncRequest) -> Result<()> {
        let appointment_id = request
            .appointment_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Input("Missing appointment_id".to_string()))?;

        info!(
            appointment_id,
            operation = ?request.operation,
            client_id = request.appointment.as_ref().map(|a| a.client_id.as_str()),
            "Processing appointment"
        );

        match request.operation {
            Operation::Delete => self.delete(appointment_id).await,
            Operation::Create => {
                let appointment = require_appointment(request.appointment.as_ref())?;
                self.create(appointment_id, appointment).await
            }
            Operation::Update => {
                let appointment = require_appointment(request.appointment.as_ref())?;
                self.update(appointment_id, appointment).await
            }
        }
    }

    async fn create(&self, appointment_id: &str, appointment: &Appointment) -> Result<()> {
        let event = self.build(appointment_id, appointment).await?;
        let created = self.calendar.insert(&event).await?;

        let event_id = created
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::Remote {
                status: 400,
                message: "Calendar did not return an event id".to_string(),
            })?;

        self.repository
            .update_field(
                Collection::Appointments,
                appointment_id,
                EVENT_ID_FIELD,
                Value::String(event_id.clone()),
            )
            .await?;

        info!(appointment_id, event_id = event_id.as_str(), "Event created");
        Ok(())
    }

    async fn update(&self, appointment_id: &str, appointment: &Appointment) -> Result<()> {
        let event = self.build(appointment_id, appointment).await?;
        let linked = self.linked_event(appointment_id).await?;
        let event_id = linked_event_id(&linked)?;

        self.calendar.update(event_id, &event).await?;

        info!(appointment_id, event_id, "Event updated");
        Ok(())
    }

    async fn delete(&self, appointment_id: &str) -> Result<()> {
        let linked = self.linked_event(appointment_id).await?;
        let event_id = linked_event_id(&linked)?;

        if !self.calendar.delete(event_id).await {
            warn!(appointment_id, event_id, "Calendar delete failed; ignoring");
        }
        Ok(())
    }

    /// Resolve the related records and build the event payload.
    async fn build(&self, appointment_id: &str, appointment: &Appointment) -> Result<CalendarEvent> {
        let (client, categories, color) = futures::try_join!(
            records::fetch_client(self.repository, &appointment.client_id),
            records::fetch_category_names(self.repository),
            records::fetch_color(self.repository, appointment.color_id.as_deref()),
        )?;
        let treatments =
            records::fetch_treatments(self.repository, &appointment.treatment_id_list, &categories).await?;

        let source = EventSource {
            appointment_id,
            appointment,
            client: client.as_ref(),
            treatments: &treatments,
            color: color.as_ref(),
        };
        build_event(&source, self.settings)
    }

    async fn linked_event(&self, appointment_id: &str) -> Result<LinkedEvent> {
        records::fetch_linked_event(self.repository, appointment_id)
            .await?
            .ok_or_else(|| Error::Lookup(format!("Appointment {} not found", appointment_id)))
    }
}

fn require_appointment(appointment: Option<&Appointment>) -> Result<&Appointment> {
    appointment.ok_or_else(|| Error::Input("Missing appointment".to_string()))
}

fn linked_event_id(linked: &LinkedEvent) -> Result<&str> {
    linked
        .event_id()
        .ok_or_else(|| Error::Lookup("Missing calendar event id".to_string()))
}
