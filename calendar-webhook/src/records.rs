//! Typed lookups over the document repository.

use std::collections::HashMap;

use futures::future::try_join_all;
use shared::firestore::{Collection, DocumentRepository};
use shared::{Client, Color, LinkedEvent, Result, Treatment, TreatmentCategory};

/// Category name used when a treatment points at an unknown category.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Category id → name table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryNames(HashMap<String, String>);

impl CategoryNames {
    pub fn name_for(&self, category_id: &str) -> &str {
        self.0
            .get(category_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CATEGORY)
    }
}

impl FromIterator<(String, String)> for CategoryNames {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Read only the calendar link of a stored appointment; the rest of the
/// document is never parsed.
pub async fn fetch_linked_event(repo: &dyn DocumentRepository, appointment_id: &str) -> Result<Option<LinkedEvent>> {
    match repo.get_by_id(Collection::Appointments, appointment_id).await? {
        Some(document) => Ok(Some(document.parse()?)),
        None => Ok(None),
    }
}

pub async fn fetch_client(repo: &dyn DocumentRepository, client_id: &str) -> Result<Option<Client>> {
    if client_id.trim().is_empty() {
        return Ok(None);
    }
    match repo.get_by_id(Collection::Clients, client_id).await? {
        Some(document) => Ok(Some(document.parse()?)),
        None => Ok(None),
    }
}

pub async fn fetch_category_names(repo: &dyn DocumentRepository) -> Result<CategoryNames> {
    let documents = repo.get_all(Collection::TreatmentCategories).await?;
    documents
        .into_iter()
        .map(|document| -> Result<(String, String)> {
            let category: TreatmentCategory = document.parse()?;
            Ok((document.id, category.name))
        })
        .collect()
}

/// Fetch every treatment of the appointment concurrently.
///
/// Missing documents are skipped; list order is kept. Each treatment gets its
/// category name joined in.
pub async fn fetch_treatments(
    repo: &dyn DocumentRepository,
    treatment_ids: &[String],
    categories: &CategoryNames,
) -> Result<Vec<Treatment>> {
    let lookups = treatment_ids
        .iter()
        .map(|id| repo.get_by_id(Collection::Treatments, id));
    let documents = try_join_all(lookups).await?;

    documents
        .into_iter()
        .flatten()
        .map(|document| -> Result<Treatment> {
            let mut treatment: Treatment = document.parse()?;
            if treatment.id.is_empty() {
                treatment.id = document.id;
            }
            treatment.treatment_category_name = categories
                .name_for(&treatment.treatment_category_id)
                .to_string();
            Ok(treatment)
        })
        .collect()
}

/// Resolve the appointment's color, if it names one that exists.
pub async fn fetch_color(repo: &dyn DocumentRepository, color_id: Option<&str>) -> Result<Option<Color>> {
    let Some(color_id) = color_id.map(str::trim).filter(|id| !id.is_empty()) else {
        return Ok(None);
    };
    match repo.get_by_id(Collection::Colors, color_id).await? {
        Some(document) => Ok(Some(document.parse()?)),
        None => Ok(None),
    }
}
