use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    common::{lenient_vec, Displayable, Identifiable, NamedEntity},
    document::Document,
    schedule::{ScheduleError, WorkSchedule},
};

pub const DEFAULT_HOURS_PER_DAY: u32 = 4;

/// A client project: capacity settings plus the offers and invoices written for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub client_id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default = "Project::default_hours_per_day")]
    pub hours_per_day: u32,
    #[serde(default = "Project::default_work_days")]
    pub work_days: BTreeSet<u8>,
    #[serde(default)]
    pub minimum_days: u32,
    #[serde(default)]
    pub wage: Decimal,
    #[serde(default)]
    pub limited: bool,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub offers: Vec<Document>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub invoices: Vec<Document>,
}

impl Project {
    pub fn new(client_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            title: title.into(),
            comment: String::new(),
            hours_per_day: Self::default_hours_per_day(),
            work_days: Self::default_work_days(),
            minimum_days: 0,
            wage: Decimal::ZERO,
            limited: false,
            offers: Vec::new(),
            invoices: Vec::new(),
        }
    }

    pub fn default_hours_per_day() -> u32 {
        DEFAULT_HOURS_PER_DAY
    }

    /// Monday through Friday.
    pub fn default_work_days() -> BTreeSet<u8> {
        (0..5).collect()
    }

    /// Validates the capacity settings used by the finish-date scheduler.
    pub fn work_schedule(&self) -> Result<WorkSchedule, ScheduleError> {
        WorkSchedule::new(self.hours_per_day, &self.work_days, self.minimum_days)
    }

    pub fn offer(&self, id: Uuid) -> Option<&Document> {
        self.offers.iter().find(|doc| doc.id == id)
    }

    pub fn offer_mut(&mut self, id: Uuid) -> Option<&mut Document> {
        self.offers.iter_mut().find(|doc| doc.id == id)
    }

    pub fn invoice(&self, id: Uuid) -> Option<&Document> {
        self.invoices.iter().find(|doc| doc.id == id)
    }

    pub fn invoice_mut(&mut self, id: Uuid) -> Option<&mut Document> {
        self.invoices.iter_mut().find(|doc| doc.id == id)
    }

    /// Looks up an offer or invoice by id.
    pub fn document(&self, id: Uuid) -> Option<&Document> {
        self.offer(id).or_else(|| self.invoice(id))
    }

    pub fn document_mut(&mut self, id: Uuid) -> Option<&mut Document> {
        if self.offers.iter().any(|doc| doc.id == id) {
            return self.offer_mut(id);
        }
        self.invoice_mut(id)
    }

    /// Files a document under offers or invoices according to its kind.
    pub fn add_document(&mut self, document: Document) -> Uuid {
        let id = document.id;
        if document.is_invoice() {
            self.invoices.push(document);
        } else {
            self.offers.push(document);
        }
        id
    }

    pub fn remove_document(&mut self, id: Uuid) -> Option<Document> {
        if let Some(index) = self.offers.iter().position(|doc| doc.id == id) {
            return Some(self.offers.remove(index));
        }
        let index = self.invoices.iter().position(|doc| doc.id == id)?;
        Some(self.invoices.remove(index))
    }
}

impl Identifiable for Project {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Project {
    fn name(&self) -> &str {
        &self.title
    }
}

impl Displayable for Project {
    fn display_label(&self) -> String {
        format!(
            "{} ({} offers, {} invoices)",
            self.title,
            self.offers.len(),
            self.invoices.len()
        )
    }
}
