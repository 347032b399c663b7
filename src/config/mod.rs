use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    core::utils::{
        backup_file_name, ensure_dir, parse_backup_timestamp, replace_file, sanitize_note,
        write_atomic, PathResolver, BACKUP_TIMESTAMP_FORMAT, JSON_EXTENSION,
    },
    domain::{Document, DocumentKind, Entry, Project},
    errors::{CoreError, Result},
    export::NumberFormat,
};

/// User-level settings persisted as `config/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub number_format: NumberFormat,
    pub defaults: Defaults,
}

impl Settings {
    /// Configured data directory, or the resolver default.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(PathResolver::base_dir)
    }
}

/// Values stamped onto newly created projects, documents and entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub wage: Decimal,
    pub hours_per_day: u32,
    pub work_days: BTreeSet<u8>,
    pub minimum_days: u32,
    pub round_price: bool,
    pub tax_percent: Decimal,
    pub amount_format: String,
    pub commodity: String,
    pub due_days: u32,
    pub offer_valid_days: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            wage: Decimal::ZERO,
            hours_per_day: Project::default_hours_per_day(),
            work_days: Project::default_work_days(),
            minimum_days: 0,
            round_price: false,
            tax_percent: Decimal::ZERO,
            amount_format: "{s}".into(),
            commodity: "EUR".into(),
            due_days: 14,
            offer_valid_days: 30,
        }
    }
}

impl Defaults {
    pub fn project(&self, client_id: Uuid, title: impl Into<String>) -> Project {
        let mut project = Project::new(client_id, title);
        project.wage = self.wage;
        project.hours_per_day = self.hours_per_day;
        project.work_days = self.work_days.clone();
        project.minimum_days = self.minimum_days;
        project
    }

    /// New offer dated `date`, valid for `offer_valid_days`.
    pub fn offer(&self, title: impl Into<String>, date: NaiveDate) -> Document {
        let mut offer = Document::offer(title);
        offer.kind = DocumentKind::Offer {
            valid_till: date.checked_add_days(Days::new(u64::from(self.offer_valid_days))),
        };
        self.stamp_document(&mut offer, date);
        offer
    }

    pub fn invoice(&self, title: impl Into<String>, date: NaiveDate) -> Document {
        let mut invoice = Document::invoice(title, self.due_days);
        if let DocumentKind::Invoice { delivery_date, .. } = &mut invoice.kind {
            *delivery_date = Some(date);
        }
        self.stamp_document(&mut invoice, date);
        invoice
    }

    /// Applies the default amount format and tax to a freshly built entry.
    pub fn stamp_entry(&self, entry: &mut Entry) {
        let header = entry.header_mut();
        header.amount_format = self.amount_format.clone();
        header.tax_percent = self.tax_percent;
    }

    fn stamp_document(&self, document: &mut Document, date: NaiveDate) {
        document.date = Some(date);
        document.round_price = self.round_price;
        document.commodity = self.commodity.clone();
    }
}

/// Loads, saves and snapshots [`Settings`].
pub struct ConfigManager {
    path: PathBuf,
    backups_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::with_base_dir(PathResolver::base_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self> {
        ensure_dir(&base)?;
        ensure_dir(&PathResolver::config_dir_in(&base))?;
        let backups_dir = PathResolver::config_backup_dir_in(&base);
        ensure_dir(&backups_dir)?;
        Ok(Self {
            path: PathResolver::config_file_in(&base),
            backups_dir,
        })
    }

    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }
        let data = fs::read_to_string(&self.path)?;
        serde_json::from_str(&data).map_err(|err| CoreError::ConfigError(err.to_string()))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        replace_file(&self.path, &json)?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    /// Writes a timestamped snapshot and returns its file name.
    pub fn backup(&self, settings: &Settings, note: Option<&str>) -> Result<String> {
        ensure_dir(&self.backups_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut name = format!("config_{}", timestamp);
        if let Some(label) = sanitize_note(note) {
            name.push('_');
            name.push_str(&label);
        }
        name.push_str(&format!(".{}", JSON_EXTENSION));
        let json = serde_json::to_string_pretty(settings)?;
        write_atomic(&self.backups_dir.join(&name), &json)?;
        tracing::debug!(backup = %name, "settings backup written");
        Ok(name)
    }

    pub fn restore(&self, backup_name: &str) -> Result<Settings> {
        let path = self.backups_dir.join(backup_file_name(backup_name)?);
        if !path.exists() {
            return Err(CoreError::NotFound(format!(
                "configuration backup `{}`",
                backup_name
            )));
        }
        let data = fs::read_to_string(&path)?;
        let settings: Settings =
            serde_json::from_str(&data).map_err(|err| CoreError::ConfigError(err.to_string()))?;
        self.save(&settings)?;
        Ok(settings)
    }

    /// Backup file names, newest first.
    pub fn list_backups(&self) -> Result<Vec<String>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(JSON_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(name.to_string());
            }
        }
        entries.sort_by(|a, b| {
            parse_backup_timestamp(b)
                .cmp(&parse_backup_timestamp(a))
                .then_with(|| b.cmp(a))
        });
        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
