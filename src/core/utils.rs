use std::{
    env,
    fs::{self, File},
    io::Write,
    path::{Component, Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use dirs::home_dir;

use crate::errors::{CoreError, Result};

const DEFAULT_DIR_NAME: &str = ".freelance_core";
const HOME_ENV: &str = "FREELANCE_CORE_HOME";
const CLIENTS_DIR: &str = "clients";
const PROJECTS_DIR: &str = "projects";
const BACKUPS_DIR: &str = "backups";
const PRESETS_DIR: &str = "presets";
const CONFIG_DIR: &str = "config";
const CONFIG_FILE: &str = "config.json";

pub(crate) const JSON_EXTENSION: &str = "json";
pub(crate) const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";

/// Resolves the on-disk layout below the data directory.
pub struct PathResolver;

impl PathResolver {
    /// `$FREELANCE_CORE_HOME` when set, otherwise `~/.freelance_core`.
    pub fn base_dir() -> PathBuf {
        if let Some(custom) = env::var_os(HOME_ENV) {
            return PathBuf::from(custom);
        }
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }

    pub fn clients_dir_in(base: &Path) -> PathBuf {
        base.join(CLIENTS_DIR)
    }

    pub fn projects_dir_in(base: &Path) -> PathBuf {
        base.join(PROJECTS_DIR)
    }

    pub fn backups_dir_in(base: &Path) -> PathBuf {
        base.join(BACKUPS_DIR)
    }

    pub fn entry_presets_dir_in(base: &Path) -> PathBuf {
        base.join(PRESETS_DIR).join("entries")
    }

    pub fn document_presets_dir_in(base: &Path) -> PathBuf {
        base.join(PRESETS_DIR).join("documents")
    }

    pub fn config_dir_in(base: &Path) -> PathBuf {
        base.join(CONFIG_DIR)
    }

    pub fn config_file_in(base: &Path) -> PathBuf {
        Self::config_dir_in(base).join(CONFIG_FILE)
    }

    pub fn config_backup_dir_in(base: &Path) -> PathBuf {
        Self::config_dir_in(base).join(BACKUPS_DIR)
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Lowercase file-system slug; falls back to `fallback` for names without
/// any usable character.
pub(crate) fn canonical_name(name: &str, fallback: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        fallback.into()
    } else {
        sanitized
    }
}

pub(crate) fn sanitize_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Reads the `<date>_<time>` pair out of `<prefix>_<date>_<time>[_note].json`.
pub(crate) fn parse_backup_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let stem = file_name.strip_suffix(&format!(".{}", JSON_EXTENSION))?;
    let segments: Vec<&str> = stem.split('_').collect();
    segments.windows(2).rev().find_map(|pair| {
        let (date, time) = (pair[0], pair[1]);
        if !is_digits(date, 8) || !is_digits(time, 6) {
            return None;
        }
        NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M%S")
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    })
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

/// Accepts only a bare file name, so a restore cannot leave its backups directory.
pub(crate) fn backup_file_name(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    let bare = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !bare || name.contains(['/', '\\']) {
        return Err(CoreError::InvalidInput(format!(
            "backup name `{}` must be a plain file name",
            name
        )));
    }
    Ok(name)
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

pub(crate) fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Writes through a sibling `.tmp` file and renames it over `path`.
pub(crate) fn replace_file(path: &Path, data: &str) -> Result<()> {
    let tmp = tmp_path(path);
    write_atomic(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
