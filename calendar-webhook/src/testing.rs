//! In-memory doubles for the repository and calendar seams.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use shared::calendar::{CalendarClient, CalendarEvent, EventResource};
use shared::firestore::{Collection, Document, DocumentRepository};
use shared::{Error, Result};

#[derive(Default)]
pub struct InMemoryRepository {
    documents: Mutex<HashMap<(Collection, String), Value>>,
    updates: Mutex<Vec<(Collection, String, String, Value)>>,
    unavailable: bool,
}

impl InMemoryRepository {
    pub fn with(self, collection: Collection, id: &str, data: Value) -> Self {
        self.documents
            .lock()
            .unwrap()
            .insert((collection, id.to_string()), data);
        self
    }

    /// Every call fails as if credentials could not be loaded.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn updates(&self) -> Vec<(Collection, String, String, Value)> {
        self.updates.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            return Err(Error::Credentials("secret missing".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for InMemoryRepository {
    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        self.check()?;
        let documents = self.documents.lock().unwrap();
        Ok(documents
            .get(&(collection, id.to_string()))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>> {
        self.check()?;
        let documents = self.documents.lock().unwrap();
        let mut all: Vec<Document> = documents
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|((_, id), data)| Document::new(id.clone(), data.clone()))
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn update_field(&self, collection: Collection, id: &str, field: &str, value: Value) -> Result<()> {
        self.check()?;
        let mut documents = self.documents.lock().unwrap();
        let document = documents
            .get_mut(&(collection, id.to_string()))
            .ok_or_else(|| Error::Lookup(format!("Document {}/{} not found", collection, id)))?;
        if let Some(object) = document.as_object_mut() {
            object.insert(field.to_string(), value.clone());
        }
        self.updates
            .lock()
            .unwrap()
            .push((collection, id.to_string(), field.to_string(), value));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalendarCall {
    Insert(CalendarEvent),
    Update(String, CalendarEvent),
    Delete(String),
}

pub struct RecordingCalendar {
    calls: Mutex<Vec<CalendarCall>>,
    created_id: Option<String>,
    failure: Option<(u16, String)>,
    delete_succeeds: bool,
}

impl Default for RecordingCalendar {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            created_id: Some("evt-new".to_string()),
            failure: None,
            delete_succeeds: true,
        }
    }
}

impl RecordingCalendar {
    /// Insert and update fail with this normalized remote error; delete fails too.
    pub fn failing(status: u16, message: &str) -> Self {
        Self {
            failure: Some((status, message.to_string())),
            delete_succeeds: false,
            ..Default::default()
        }
    }

    pub fn without_created_id() -> Self {
        Self {
            created_id: None,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        self.calls.lock().unwrap().clone()
    }

    fn outcome(&self, id: Option<String>) -> Result<EventResource> {
        match &self.failure {
            Some((status, message)) => Err(Error::Remote {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(EventResource { id }),
        }
    }
}

#[async_trait]
impl CalendarClient for RecordingCalendar {
    async fn insert(&self, event: &CalendarEvent) -> Result<EventResource> {
        self.calls.lock().unwrap().push(CalendarCall::Insert(event.clone()));
        self.outcome(self.created_id.clone())
    }

    async fn update(&self, event_id: &str, event: &CalendarEvent) -> Result<EventResource> {
        self.calls
            .lock()
            .unwrap()
            .push(CalendarCall::Update(event_id.to_string(), event.clone()));
        self.outcome(Some(event_id.to_string()))
    }

    async fn delete(&self, event_id: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push(CalendarCall::Delete(event_id.to_string()));
        self.delete_succeeds
    }
}
