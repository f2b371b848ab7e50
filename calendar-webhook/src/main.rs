//! Google Calendar Event Lambda - Mirrors booking appointments onto a calendar.
//!
//! The booking application calls this webhook whenever an appointment is
//! created, updated or deleted. The matching calendar event is inserted,
//! replaced or removed, and the created event's id is stamped back onto the
//! appointment document.

mod dispatcher;
mod event_builder;
mod records;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use lambda_http::http::Method;
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::google_auth::{CALENDAR_SCOPE, DATASTORE_SCOPE};
use shared::http::{error_response, text_response, SUCCESS_MESSAGE};
use shared::{
    Config, CredentialProvider, FirestoreRepository, GoogleCalendarClient, SecretsManagerCredentialProvider,
    ServiceAccountAuth, SyncRequest,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::dispatcher::{Dispatcher, Reply};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state
struct AppState {
    config: Config,
    http_client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;
        let secrets_client = aws_sdk_secretsmanager::Client::new(&aws_config);

        let http_client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let credentials = Arc::new(SecretsManagerCredentialProvider::new(
            secrets_client,
            config.credentials_secret_id.clone(),
        ));

        Ok(Self {
            config,
            http_client,
            credentials,
        })
    }
}

fn into_response(reply: Reply) -> Result<Response<Body>, Error> {
    match reply {
        Reply::Success => text_response(200, SUCCESS_MESSAGE),
        Reply::Failure { status, message } => error_response(status, message),
    }
}

/// Only POST carries a sync request; anything else is answered with 405.
fn reject_method(method: &Method) -> Option<Result<Response<Body>, Error>> {
    if *method == Method::POST {
        return None;
    }
    Some(error_response(405, "Method not allowed"))
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if let Some(response) = reject_method(event.method()) {
        return response;
    }

    let request: SyncRequest = shared::parse_body!(event.body());

    // Credentials and tokens are per invocation; nothing is shared across requests.
    let auth = Arc::new(ServiceAccountAuth::new(
        state.http_client.clone(),
        Arc::clone(&state.credentials),
        vec![CALENDAR_SCOPE, DATASTORE_SCOPE],
    ));
    let repository = FirestoreRepository::new(
        state.http_client.clone(),
        auth.clone(),
        state.config.project_id.clone(),
        state.config.firestore_database.clone(),
    );
    let calendar = GoogleCalendarClient::new(
        state.http_client.clone(),
        auth,
        state.config.calendar_id.clone(),
    );

    let reply = Dispatcher::new(&repository, &calendar, &state.config.event)
        .dispatch(request)
        .await;

    info!("Replying with status {}", reply.status());
    into_response(reply)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::http::ErrorBody;

    #[test]
    fn test_only_post_is_accepted() {
        assert!(reject_method(&Method::POST).is_none());

        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let response = reject_method(&method).unwrap().unwrap();
            assert_eq!(response.status(), 405);
            let body: ErrorBody = serde_json::from_slice(response.body().as_ref()).unwrap();
            assert_eq!(body.error, "Method not allowed");
        }
    }

    #[test]
    fn test_success_reply_is_plain_text() {
        let response = into_response(Reply::Success).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.body().as_ref(), SUCCESS_MESSAGE.as_bytes());
    }

    #[test]
    fn test_failure_reply_is_json_error() {
        let response = into_response(Reply::Failure {
            status: 400,
            message: "Missing calendar event id".to_string(),
        })
        .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorBody = serde_json::from_slice(response.body().as_ref()).unwrap();
        assert_eq!(body.error, "Missing calendar event id");
    }
}
