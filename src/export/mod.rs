//! Flattened, display-ready views of documents for renderers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    core::services::{DocumentService, DocumentSummary, ServiceResult},
    domain::{round_money, round_whole, Document, Project, WorkDuration},
};

/// Separators used when rendering numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub grouping_separator: char,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            grouping_separator: ',',
        }
    }
}

impl NumberFormat {
    pub fn format_number(&self, value: Decimal, precision: u32) -> String {
        let rounded = value.round_dp(precision);
        let mut body = format!("{:.*}", precision as usize, rounded);
        if self.decimal_separator != '.' {
            if let Some(pos) = body.find('.') {
                body.replace_range(pos..=pos, &self.decimal_separator.to_string());
            }
        }
        match body.find(self.decimal_separator) {
            Some(pos) if precision > 0 => {
                let int_part = insert_grouping(&body[..pos], self.grouping_separator);
                format!("{}{}", int_part, &body[pos..])
            }
            _ => insert_grouping(&body, self.grouping_separator),
        }
    }

    pub fn money(&self, value: Decimal) -> String {
        self.format_number(value, 2)
    }
}

fn insert_grouping(int_part: &str, separator: char) -> String {
    match int_part.strip_prefix('-') {
        Some(digits) => format!("-{}", group_digits(digits, separator)),
        None => group_digits(int_part, separator),
    }
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut grouped = String::new();
    for (count, ch) in digits.chars().rev().enumerate() {
        if count != 0 && count % 3 == 0 {
            grouped.insert(0, separator);
        }
        grouped.insert(0, ch);
    }
    grouped
}

/// Renders an entry amount through its format string.
///
/// `{s}` is the plain amount, `{d}` the amount to two places, `{H}` and `{M}`
/// split the amount read as hours into whole hours and zero-padded minutes.
pub fn format_amount(amount: Decimal, format: &str) -> String {
    let sixty = Decimal::from(60);
    let minutes = round_whole(amount.saturating_mul(sixty));
    let total_minutes = minutes.trunc().abs();
    let hours = (total_minutes / sixty).trunc();
    let rest = total_minutes - hours * sixty;
    let sign = if minutes.is_sign_negative() && !minutes.is_zero() {
        "-"
    } else {
        ""
    };
    format
        .replace("{s}", &amount.normalize().to_string())
        .replace("{d}", &format!("{:.2}", round_money(amount)))
        .replace("{H}", &format!("{sign}{hours}"))
        .replace("{M}", &format!("{:0>2}", rest.to_string()))
}

/// One printable line of a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryRow {
    pub position: usize,
    pub kind: &'static str,
    pub title: String,
    pub comment: String,
    pub amount: String,
    pub unit_price: Decimal,
    pub price: Decimal,
    pub tax_percent: String,
    pub tax: Decimal,
    pub time: WorkDuration,
}

impl EntryRow {
    /// Cells in column order with money rendered through `format`.
    pub fn cells(&self, format: &NumberFormat) -> Vec<String> {
        vec![
            self.position.to_string(),
            self.title.clone(),
            self.amount.clone(),
            format.money(self.unit_price),
            format.money(self.price),
            format!("{}%", self.tax_percent),
            format.money(self.tax),
            self.time.to_string(),
        ]
    }
}

/// A document flattened into rows plus its totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentExport {
    pub title: String,
    pub number: String,
    pub kind: &'static str,
    pub date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub commodity: String,
    pub rows: Vec<EntryRow>,
    pub summary: DocumentSummary,
}

impl DocumentExport {
    pub fn build(document: &Document, project: Option<&Project>) -> ServiceResult<Self> {
        let summary = DocumentService::summarize(document, project)?;
        let wage = summary.wage;
        let siblings = &document.entries;
        let rows = siblings
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let header = entry.header();
                EntryRow {
                    position: index + 1,
                    kind: entry.kind_label(),
                    title: header.title.clone(),
                    comment: header.comment.clone(),
                    amount: format_amount(header.amount, &header.amount_format),
                    unit_price: entry.unit_price(siblings, wage),
                    price: entry.price(siblings, wage),
                    tax_percent: round_whole(header.tax_percent).normalize().to_string(),
                    tax: entry.price_tax(siblings, wage),
                    time: entry.time(siblings),
                }
            })
            .collect();
        Ok(Self {
            title: document.title.clone(),
            number: document.number.clone(),
            kind: if document.is_invoice() { "Invoice" } else { "Offer" },
            date: document.date,
            due_date: document.due_date(),
            commodity: document.commodity.clone(),
            rows,
            summary,
        })
    }

    /// Net, tax and gross lines rendered with `format` and the commodity.
    pub fn total_lines(&self, format: &NumberFormat) -> Vec<(String, String)> {
        let with_commodity = |value: Decimal| {
            let amount = format.money(value);
            if self.commodity.is_empty() {
                amount
            } else {
                format!("{} {}", amount, self.commodity)
            }
        };
        vec![
            ("Net".into(), with_commodity(self.summary.net)),
            ("Tax".into(), with_commodity(self.summary.tax)),
            ("Total".into(), with_commodity(self.summary.gross)),
        ]
    }
}
