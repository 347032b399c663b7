//! Offers and invoices: ordered entry lists plus pricing metadata.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    common::{lenient_vec, Displayable, Identifiable, NamedEntity},
    duration::WorkDuration,
    entry::{check_connection, ConnectError, Entry},
    money::{round_money, round_whole, saturating_div},
    project::Project,
    schedule::WorkSchedule,
};

/// Distinguishes offers from invoices and carries their specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DocumentKind {
    Offer {
        #[serde(default)]
        valid_till: Option<NaiveDate>,
    },
    Invoice {
        #[serde(default)]
        delivery_date: Option<NaiveDate>,
        #[serde(default)]
        due_days: u32,
        #[serde(default)]
        paid_date: Option<NaiveDate>,
    },
}

impl Default for DocumentKind {
    fn default() -> Self {
        DocumentKind::Offer { valid_till: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub kind: DocumentKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub wage: Decimal,
    #[serde(default)]
    pub round_price: bool,
    #[serde(default)]
    pub commodity: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub entries: Vec<Entry>,
}

impl Document {
    pub fn offer(title: impl Into<String>) -> Self {
        Self::with_kind(title, DocumentKind::default())
    }

    pub fn invoice(title: impl Into<String>, due_days: u32) -> Self {
        Self::with_kind(
            title,
            DocumentKind::Invoice {
                delivery_date: None,
                due_days,
                paid_date: None,
            },
        )
    }

    fn with_kind(title: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            number: String::new(),
            comment: String::new(),
            date: None,
            wage: Decimal::ZERO,
            round_price: false,
            commodity: String::new(),
            entries: Vec::new(),
        }
    }

    pub fn is_invoice(&self) -> bool {
        matches!(self.kind, DocumentKind::Invoice { .. })
    }

    /// Invoice due date: document date plus `due_days`, if the calendar reaches it.
    pub fn due_date(&self) -> Option<NaiveDate> {
        match self.kind {
            DocumentKind::Invoice { due_days, .. } => {
                self.date?.checked_add_days(Days::new(u64::from(due_days)))
            }
            DocumentKind::Offer { .. } => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(
            self.kind,
            DocumentKind::Invoice {
                paid_date: Some(_),
                ..
            }
        )
    }

    /// Builds an invoice from this offer, copying entries with their ids so
    /// references between them stay intact.
    pub fn to_invoice(&self, date: Option<NaiveDate>, due_days: u32) -> Document {
        let mut invoice = Document::invoice(self.title.clone(), due_days);
        invoice.comment = self.comment.clone();
        invoice.date = date;
        invoice.wage = self.wage;
        invoice.round_price = self.round_price;
        invoice.commodity = self.commodity.clone();
        invoice.entries = self.entries.iter().map(|entry| entry.copy(true)).collect();
        invoice
    }

    // --- entry list -------------------------------------------------------

    pub fn entry(&self, id: Uuid) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn entry_mut(&mut self, id: Uuid) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| entry.id() == id)
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }

    pub fn add_entry(&mut self, entry: Entry) -> Uuid {
        let id = entry.id();
        self.entries.push(entry);
        id
    }

    /// Inserts at `index`, clamped to the end of the list.
    pub fn insert_entry(&mut self, index: usize, entry: Entry) -> Uuid {
        let id = entry.id();
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
        id
    }

    /// Removes an entry. Reference entries pointing at it keep the dangling id.
    pub fn remove_entry(&mut self, id: Uuid) -> Option<Entry> {
        let index = self.position(id)?;
        Some(self.entries.remove(index))
    }

    pub fn move_entry_up(&mut self, id: Uuid) -> bool {
        match self.position(id) {
            Some(index) if index > 0 => {
                self.entries.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    pub fn move_entry_down(&mut self, id: Uuid) -> bool {
        match self.position(id) {
            Some(index) if index + 1 < self.entries.len() => {
                self.entries.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Appends a copy of the entry under a fresh id, right after the original.
    pub fn duplicate_entry(&mut self, id: Uuid) -> Option<Uuid> {
        let index = self.position(id)?;
        let copy = self.entries[index].copy(false);
        Some(self.insert_entry(index + 1, copy))
    }

    /// Swaps in an edited entry with the same id; returns the previous version.
    pub fn replace_entry(&mut self, entry: Entry) -> Option<Entry> {
        let slot = self.entry_mut(entry.id())?;
        Some(std::mem::replace(slot, entry))
    }

    pub fn connect_entry(&mut self, source: Uuid, target: Uuid) -> Result<(), ConnectError> {
        match self.entry(source) {
            None => return Err(ConnectError::UnknownEntry(source)),
            Some(entry) if entry.as_reference().is_none() => {
                return Err(ConnectError::NotReference(source))
            }
            Some(_) => {}
        }
        check_connection(&self.entries, source, target)?;
        if let Some(reference) = self.entry_mut(source).and_then(Entry::as_reference_mut) {
            reference.connect_unchecked(target);
        }
        Ok(())
    }

    /// Connects `source` to every target, returning the titles that were refused.
    pub fn connect_entries(&mut self, source: Uuid, targets: &[Uuid]) -> Vec<String> {
        let mut refused = Vec::new();
        for &target in targets {
            if let Err(err) = self.connect_entry(source, target) {
                tracing::debug!(%source, %target, %err, "connection refused");
                let title = self
                    .entry(target)
                    .map(|entry| entry.title().to_string())
                    .unwrap_or_else(|| target.to_string());
                refused.push(title);
            }
        }
        refused
    }

    pub fn disconnect_entry(&mut self, source: Uuid, target: Uuid) -> bool {
        self.entry_mut(source)
            .and_then(Entry::as_reference_mut)
            .map(|reference| reference.disconnect(target))
            .unwrap_or(false)
    }

    // --- aggregation ------------------------------------------------------

    /// Document wage when set, otherwise the project's wage, otherwise zero.
    pub fn effective_wage(&self, project: Option<&Project>) -> Decimal {
        if !self.wage.is_zero() {
            return self.wage;
        }
        project.map(|project| project.wage).unwrap_or(Decimal::ZERO)
    }

    /// Sum of entry prices. `None` arguments fall back to the document's own
    /// wage and rounding flag; whole-unit rounding applies to the sum only.
    pub fn total_price(&self, wage: Option<Decimal>, round_price: Option<bool>) -> Decimal {
        let wage = wage.unwrap_or(self.wage);
        let total = self
            .entries
            .iter()
            .map(|entry| entry.price(&self.entries, wage))
            .fold(Decimal::ZERO, Decimal::saturating_add);
        if round_price.unwrap_or(self.round_price) {
            round_whole(total)
        } else {
            round_money(total)
        }
    }

    pub fn total_tax(&self, wage: Option<Decimal>) -> Decimal {
        let wage = wage.unwrap_or(self.wage);
        let total = self
            .entries
            .iter()
            .map(|entry| entry.price_tax(&self.entries, wage))
            .fold(Decimal::ZERO, Decimal::saturating_add);
        round_money(total)
    }

    pub fn total_time(&self) -> WorkDuration {
        self.entries
            .iter()
            .map(|entry| entry.time(&self.entries))
            .sum()
    }

    /// Effective earnings per hour; zero when the document holds no time.
    pub fn hourly_wage(&self, wage: Option<Decimal>, round_price: Option<bool>) -> Decimal {
        let hours = self.total_time().hours();
        if hours <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let round = round_price.unwrap_or(self.round_price);
        let hourly = saturating_div(self.total_price(wage, Some(round)), hours);
        if round {
            round_whole(hourly)
        } else {
            round_money(hourly)
        }
    }

    /// Projected completion date; `None` when the document has no date or the
    /// work runs past the end of the calendar.
    pub fn finish_date(&self, schedule: &WorkSchedule) -> Option<NaiveDate> {
        let start = self.date?;
        schedule.finish_date(start, self.total_time())
    }

    pub fn finish_days(&self, schedule: &WorkSchedule) -> i64 {
        schedule.finish_days(self.total_time())
    }
}

impl Identifiable for Document {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Document {
    fn name(&self) -> &str {
        &self.title
    }
}

impl Displayable for Document {
    fn display_label(&self) -> String {
        let kind = if self.is_invoice() { "Invoice" } else { "Offer" };
        match self.date {
            Some(date) => format!("{} ({kind}, {date})", self.title),
            None => format!("{} ({kind})", self.title),
        }
    }
}
