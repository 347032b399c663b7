//! Business logic helpers for offers and invoices.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::core::services::ServiceResult;
use crate::domain::{round_money, ConnectError, Document, Entry, Project, WorkDuration};
use crate::errors::CoreError;

/// Aggregated figures of a single document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub wage: Decimal,
    pub net: Decimal,
    pub tax: Decimal,
    pub gross: Decimal,
    pub time: WorkDuration,
    pub hourly_wage: Decimal,
    pub finish_date: Option<NaiveDate>,
    pub finish_days: Option<i64>,
}

/// Validated operations on documents and their entries.
pub struct DocumentService;

impl DocumentService {
    /// Computes the totals of `document`, using the project for the wage
    /// fallback and the schedule. A misconfigured project schedule is an error.
    pub fn summarize(document: &Document, project: Option<&Project>) -> ServiceResult<DocumentSummary> {
        let wage = document.effective_wage(project);
        let net = document.total_price(Some(wage), None);
        let tax = document.total_tax(Some(wage));
        let schedule = project.map(Project::work_schedule).transpose()?;
        Ok(DocumentSummary {
            wage,
            net,
            tax,
            gross: round_money(net.saturating_add(tax)),
            time: document.total_time(),
            hourly_wage: document.hourly_wage(Some(wage), None),
            finish_date: schedule
                .as_ref()
                .and_then(|schedule| document.finish_date(schedule)),
            finish_days: schedule.as_ref().map(|schedule| document.finish_days(schedule)),
        })
    }

    /// Adds a copy of a preset entry under a fresh id. References of the
    /// preset do not survive the move into another document.
    pub fn add_preset_entry(document: &mut Document, preset: &Entry) -> Uuid {
        let mut entry = preset.copy(false);
        if let Some(reference) = entry.as_reference_mut() {
            reference.disconnect_all();
        }
        tracing::debug!(document = %document.id, entry = %entry.id(), "preset entry added");
        document.add_entry(entry)
    }

    /// Applies `mutator` to the entry identified by `id`.
    pub fn update_entry<F>(document: &mut Document, id: Uuid, mutator: F) -> ServiceResult<()>
    where
        F: FnOnce(&mut Entry),
    {
        let entry = document
            .entry_mut(id)
            .ok_or_else(|| CoreError::NotFound(format!("entry {id}")))?;
        mutator(entry);
        Ok(())
    }

    pub fn remove_entry(document: &mut Document, id: Uuid) -> ServiceResult<Entry> {
        document
            .remove_entry(id)
            .ok_or_else(|| CoreError::NotFound(format!("entry {id}")).into())
    }

    /// Connects `source` to each target and reports the titles that were refused.
    pub fn connect(document: &mut Document, source: Uuid, targets: &[Uuid]) -> ServiceResult<Vec<String>> {
        match document.entry(source) {
            None => return Err(CoreError::NotFound(format!("entry {source}")).into()),
            Some(entry) if entry.as_reference().is_none() => {
                return Err(CoreError::from(ConnectError::NotReference(source)).into())
            }
            Some(_) => {}
        }
        let refused = document.connect_entries(source, targets);
        if !refused.is_empty() {
            tracing::warn!(%source, refused = ?refused, "some connections were rejected");
        }
        Ok(refused)
    }

    /// Files an invoice built from the offer `offer_id` into the same project.
    pub fn convert_to_invoice(
        project: &mut Project,
        offer_id: Uuid,
        date: NaiveDate,
        due_days: u32,
    ) -> ServiceResult<Uuid> {
        let offer = project
            .offer(offer_id)
            .ok_or_else(|| CoreError::NotFound(format!("offer {offer_id}")))?;
        let mut invoice = offer.to_invoice(Some(date), due_days);
        if invoice.wage.is_zero() {
            invoice.wage = project.wage;
        }
        let id = project.add_document(invoice);
        tracing::debug!(project = %project.id, offer = %offer_id, invoice = %id, "offer converted");
        Ok(id)
    }
}
