//! Business logic helpers for projects.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::Defaults;
use crate::core::services::{DocumentService, ServiceError, ServiceResult};
use crate::domain::{round_money, Client, Document, Project, WorkSchedule};
use crate::errors::CoreError;

pub struct ProjectService;

impl ProjectService {
    /// Creates a project for `client` seeded from `defaults`.
    pub fn create(client: &Client, title: &str, defaults: &Defaults) -> ServiceResult<Project> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ServiceError::Invalid("Project title must not be empty".into()));
        }
        let project = defaults.project(client.id, title);
        project.work_schedule()?;
        tracing::debug!(client = %client.id, project = %project.id, "project created");
        Ok(project)
    }

    pub fn validate(project: &Project) -> ServiceResult<WorkSchedule> {
        Ok(project.work_schedule()?)
    }

    pub fn new_offer(
        project: &mut Project,
        title: &str,
        date: NaiveDate,
        defaults: &Defaults,
    ) -> Uuid {
        project.add_document(defaults.offer(title, date))
    }

    pub fn new_invoice(
        project: &mut Project,
        title: &str,
        date: NaiveDate,
        defaults: &Defaults,
    ) -> Uuid {
        project.add_document(defaults.invoice(title, date))
    }

    pub fn remove_document(project: &mut Project, id: Uuid) -> ServiceResult<Document> {
        project
            .remove_document(id)
            .ok_or_else(|| CoreError::NotFound(format!("document {id}")).into())
    }

    /// Invoices without a paid date.
    pub fn open_invoices(project: &Project) -> Vec<&Document> {
        project
            .invoices
            .iter()
            .filter(|invoice| !invoice.is_paid())
            .collect()
    }

    /// Gross amount still owed across the open invoices.
    pub fn outstanding(project: &Project) -> ServiceResult<Decimal> {
        let mut total = Decimal::ZERO;
        for invoice in Self::open_invoices(project) {
            let gross = DocumentService::summarize(invoice, Some(project))?.gross;
            total = total.saturating_add(gross);
        }
        Ok(round_money(total))
    }
}
