//! Document repository backed by the Firestore REST API.
//!
//! Firestore wraps every field in a typed envelope (`{"stringValue": "..."}`);
//! documents are unwrapped into plain JSON so they deserialize straight into
//! the booking models.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::google_auth::TokenSource;
use crate::{Error, Result};

pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

const PAGE_SIZE: &str = "300";

/// Collections the webhook reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Appointments,
    Clients,
    Treatments,
    TreatmentCategories,
    Colors,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Appointments => "appointments",
            Collection::Clients => "clients",
            Collection::Treatments => "treatments",
            Collection::TreatmentCategories => "treatment_categories",
            Collection::Colors => "colors",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document with its fields decoded to plain JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Deserialize the document's fields into a model.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.data)?)
    }
}

/// Read/write access to the booking collections.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Fetch one document; `None` when it does not exist.
    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Fetch every document of a collection.
    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>>;

    /// Overwrite a single field of an existing document.
    async fn update_field(&self, collection: Collection, id: &str, field: &str, value: Value) -> Result<()>;
}

/// Document as returned by the REST API.
#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Option<Map<String, Value>>,
}

impl RawDocument {
    fn into_document(self) -> Result<Document> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let data = decode_fields(self.fields.as_ref())?;
        Ok(Document { id, data })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    next_page_token: Option<String>,
}

/// Decode a Firestore `fields` map into a JSON object.
pub fn decode_fields(fields: Option<&Map<String, Value>>) -> Result<Value> {
    let mut object = Map::new();
    if let Some(fields) = fields {
        for (name, value) in fields {
            object.insert(name.clone(), decode_value(value)?);
        }
    }
    Ok(Value::Object(object))
}

/// Decode one typed Firestore value.
pub fn decode_value(value: &Value) -> Result<Value> {
    let (kind, inner) = value
        .as_object()
        .and_then(|o| o.iter().next())
        .ok_or_else(|| Error::Store(format!("Malformed Firestore value: {}", value)))?;

    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue"
        | "bytesValue" | "geoPointValue" => inner.clone(),
        // Int64 travels as a decimal string.
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "arrayValue" => {
            let values = match inner.get("values").and_then(Value::as_array) {
                Some(values) => values.iter().map(decode_value).collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            Value::Array(values)
        }
        "mapValue" => decode_fields(inner.get("fields").and_then(Value::as_object))?,
        other => {
            return Err(Error::Store(format!("Unsupported Firestore value type: {}", other)));
        }
    };

    Ok(decoded)
}

/// Encode plain JSON as a typed Firestore value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => serde_json::json!({ "nullValue": null }),
        Value::Bool(b) => serde_json::json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => serde_json::json!({ "integerValue": i.to_string() }),
            None => serde_json::json!({ "doubleValue": n }),
        },
        Value::String(s) => serde_json::json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            serde_json::json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect();
            serde_json::json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Firestore REST client.
pub struct FirestoreRepository {
    http_client: reqwest::Client,
    token: Arc<dyn TokenSource>,
    base_url: String,
    project_id: String,
    database: String,
}

impl FirestoreRepository {
    pub fn new(
        http_client: reqwest::Client,
        token: Arc<dyn TokenSource>,
        project_id: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            token,
            base_url: FIRESTORE_BASE_URL.to_string(),
            project_id: project_id.into(),
            database: database.into(),
        }
    }

    /// Point the client at another host (emulator, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents/{}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.database,
            collection
        )
    }

    fn document_url(&self, collection: Collection, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), urlencoding::encode(id))
    }

    async fn error_from(response: reqwest::Response, what: &str) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Error::Store(format!("{} failed ({}): {}", what, status, body))
    }
}

#[async_trait]
impl DocumentRepository for FirestoreRepository {
    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let token = self.token.access_token().await?;
        let response = self
            .http_client
            .get(self.document_url(collection, id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Store(format!("Failed to read {}/{}: {}", collection, id, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response, &format!("Read of {}/{}", collection, id)).await);
        }

        let raw: RawDocument = response.json().await?;
        raw.into_document().map(Some)
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>> {
        let token = self.token.access_token().await?;
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(self.collection_url(collection))
                .bearer_auth(&token)
                .query(&[("pageSize", PAGE_SIZE)]);

            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Store(format!("Failed to list {}: {}", collection, e)))?;

            if !response.status().is_success() {
                return Err(Self::error_from(response, &format!("List of {}", collection)).await);
            }

            let page: ListDocumentsResponse = response.json().await?;
            for raw in page.documents {
                documents.push(raw.into_document()?);
            }

            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        Ok(documents)
    }

    async fn update_field(&self, collection: Collection, id: &str, field: &str, value: Value) -> Result<()> {
        let token = self.token.access_token().await?;

        let mut fields = Map::new();
        fields.insert(field.to_string(), encode_value(&value));

        let response = self
            .http_client
            .patch(self.document_url(collection, id))
            .bearer_auth(token)
            .query(&[("updateMask.fieldPaths", field), ("currentDocument.exists", "true")])
            .json(&serde_json::json!({ "fields": fields }))
            .send()
            .await
            .map_err(|e| Error::Store(format!("Failed to update {}/{}: {}", collection, id, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Lookup(format!("Document {}/{} not found", collection, id)));
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response, &format!("Update of {}/{}", collection, id)).await);
        }

        info!("Updated {}/{} field {}", collection, id, field);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google_auth::StaticToken;
    use crate::models::{Appointment, Client};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS: &str = "/v1/projects/aurea/databases/(default)/documents";

    fn repository(server: &MockServer) -> FirestoreRepository {
        FirestoreRepository::new(
            reqwest::Client::new(),
            Arc::new(StaticToken("test-token".to_string())),
            "aurea",
            "(default)",
        )
        .with_base_url(server.uri())
    }

    #[test]
    fn test_decode_nested_values() {
        let fields = json!({
            "client_id": { "stringValue": "c1" },
            "total_duration": { "integerValue": "90" },
            "is_regular": { "booleanValue": true },
            "notes": { "nullValue": null },
            "treatment_id_list": { "arrayValue": { "values": [
                { "stringValue": "t1" },
                { "stringValue": "t2" }
            ] } },
            "meta": { "mapValue": { "fields": { "score": { "doubleValue": 4.5 } } } },
            "empty": { "arrayValue": {} }
        });

        let decoded = decode_fields(fields.as_object()).unwrap();
        assert_eq!(
            decoded,
            json!({
                "client_id": "c1",
                "total_duration": 90,
                "is_regular": true,
                "notes": null,
                "treatment_id_list": ["t1", "t2"],
                "meta": { "score": 4.5 },
                "empty": []
            })
        );
    }

    #[test]
    fn test_decode_rejects_malformed_value() {
        assert!(decode_value(&json!("bare")).is_err());
        assert!(decode_value(&json!({ "mysteryValue": 1 })).is_err());
    }

    #[test]
    fn test_encode_values() {
        assert_eq!(encode_value(&json!("evt-1")), json!({ "stringValue": "evt-1" }));
        assert_eq!(encode_value(&json!(3)), json!({ "integerValue": "3" }));
        assert_eq!(
            encode_value(&json!(["a"])),
            json!({ "arrayValue": { "values": [{ "stringValue": "a" }] } })
        );
    }

    #[test]
    fn test_document_parses_into_model() {
        let document = Document::new(
            "a1",
            json!({
                "client_id": "c1",
                "start_time": "2024-03-10T10:00:00.000Z",
                "end_time": "2024-03-10T11:00:00.000Z",
                "total_duration": 60,
                "google_calendar_event_id": "evt-9"
            }),
        );
        let appointment: Appointment = document.parse().unwrap();
        assert_eq!(appointment.client_id, "c1");
        assert_eq!(appointment.total_duration, 60.0);
        assert_eq!(appointment.google_calendar_event_id.as_deref(), Some("evt-9"));
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/clients/c1", DOCS)))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/aurea/databases/(default)/documents/clients/c1",
                "fields": {
                    "first_name": { "stringValue": "Giulia" },
                    "last_name": { "stringValue": "Rossi" }
                }
            })))
            .mount(&server)
            .await;

        let document = repository(&server)
            .get_by_id(Collection::Clients, "c1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(document.id, "c1");
        let client: Client = document.parse().unwrap();
        assert_eq!(client.first_name.as_deref(), Some("Giulia"));
    }

    #[tokio::test]
    async fn test_get_by_id_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "status": "NOT_FOUND" }
            })))
            .mount(&server)
            .await;

        let document = repository(&server)
            .get_by_id(Collection::Colors, "missing")
            .await
            .unwrap();
        assert!(document.is_none());
    }

    #[tokio::test]
    async fn test_get_by_id_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = repository(&server)
            .get_by_id(Collection::Clients, "c1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_get_all_follows_pages() {
        let server = MockServer::start().await;
        let url = format!("{}/treatment_categories", DOCS);

        Mock::given(method("GET"))
            .and(path(url.clone()))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [{
                    "name": "projects/aurea/databases/(default)/documents/treatment_categories/cat2",
                    "fields": { "name": { "stringValue": "Viso" } }
                }]
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(url))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [{
                    "name": "projects/aurea/databases/(default)/documents/treatment_categories/cat1",
                    "fields": { "name": { "stringValue": "Corpo" } }
                }],
                "nextPageToken": "page-2"
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let documents = repository(&server)
            .get_all(Collection::TreatmentCategories)
            .await
            .unwrap();
        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["cat1", "cat2"]);
    }

    #[tokio::test]
    async fn test_update_field() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/appointments/a1", DOCS)))
            .and(query_param("updateMask.fieldPaths", "google_calendar_event_id"))
            .and(query_param("currentDocument.exists", "true"))
            .and(body_json(json!({
                "fields": { "google_calendar_event_id": { "stringValue": "evt-1" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/aurea/databases/(default)/documents/appointments/a1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        repository(&server)
            .update_field(
                Collection::Appointments,
                "a1",
                "google_calendar_event_id",
                json!("evt-1"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_document_is_lookup_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = repository(&server)
            .update_field(Collection::Appointments, "gone", "google_calendar_event_id", json!("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Lookup(_)));
    }
}
