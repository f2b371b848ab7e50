//! Shared library for the appointment calendar sync Lambda.
//!
//! This crate provides the booking data model, configuration, errors, and the
//! Firestore, Secrets Manager and Google Calendar clients.

pub mod calendar;
pub mod config;
pub mod credentials;
pub mod error;
pub mod firestore;
pub mod google_auth;
pub mod http;
pub mod models;
pub mod secrets;

pub use calendar::{CalendarClient, CalendarEvent, EventResource, GoogleCalendarClient};
pub use config::{Config, EventSettings};
pub use credentials::{CredentialProvider, SecretsManagerCredentialProvider, ServiceAccountCredentials};
pub use error::{Error, Result};
pub use firestore::{Collection, Document, DocumentRepository, FirestoreRepository};
pub use google_auth::{ServiceAccountAuth, TokenSource};
pub use models::{Appointment, Client, Color, LinkedEvent, Operation, SyncRequest, Treatment, TreatmentCategory};
pub use secrets::get_secret;
