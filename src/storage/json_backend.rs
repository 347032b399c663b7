use std::{
    cmp::Reverse,
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    core::utils::{
        backup_file_name, canonical_name, ensure_dir, parse_backup_timestamp, replace_file,
        PathResolver, BACKUP_TIMESTAMP_FORMAT, JSON_EXTENSION,
    },
    domain::{Client, Document, Entry, NamedEntity, Project},
    errors::{CoreError, Result},
};

use super::StorageBackend;

const DEFAULT_RETENTION: usize = 5;

/// Filesystem-backed JSON persistence with copy-on-write backups.
///
/// Layout below the root:
/// `clients/<client>.json`, `projects/<client>/<project>.json`,
/// `presets/{entries,documents}/<title>.json` and
/// `backups/{clients,projects/<client>}/<name>/<name>_<timestamp>.json`.
#[derive(Clone)]
pub struct JsonStorage {
    root: PathBuf,
    clients_dir: PathBuf,
    projects_dir: PathBuf,
    backups_dir: PathBuf,
    entry_presets_dir: PathBuf,
    document_presets_dir: PathBuf,
    retention: usize,
}

impl JsonStorage {
    pub fn new(root: Option<PathBuf>, retention: Option<usize>) -> Result<Self> {
        let root = root.unwrap_or_else(PathResolver::base_dir);
        ensure_dir(&root)?;
        let storage = Self {
            clients_dir: PathResolver::clients_dir_in(&root),
            projects_dir: PathResolver::projects_dir_in(&root),
            backups_dir: PathResolver::backups_dir_in(&root),
            entry_presets_dir: PathResolver::entry_presets_dir_in(&root),
            document_presets_dir: PathResolver::document_presets_dir_in(&root),
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
            root,
        };
        for dir in [
            &storage.clients_dir,
            &storage.projects_dir,
            &storage.backups_dir,
            &storage.entry_presets_dir,
            &storage.document_presets_dir,
        ] {
            ensure_dir(dir)?;
        }
        tracing::debug!(root = %storage.root.display(), "json storage ready");
        Ok(storage)
    }

    pub fn new_default() -> Result<Self> {
        Self::new(None, None)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn client_path(&self, name: &str) -> PathBuf {
        self.clients_dir.join(file_name(&client_slug(name)))
    }

    pub fn project_path(&self, client: &Client, title: &str) -> PathBuf {
        self.project_dir(client)
            .join(file_name(&project_slug(title)))
    }

    fn project_dir(&self, client: &Client) -> PathBuf {
        self.projects_dir.join(client_slug(client.name()))
    }

    fn client_backup_dir(&self, name: &str) -> PathBuf {
        self.backups_dir.join("clients").join(client_slug(name))
    }

    fn project_backup_dir(&self, client: &Client, title: &str) -> PathBuf {
        self.backups_dir
            .join("projects")
            .join(client_slug(client.name()))
            .join(project_slug(title))
    }

    /// Saves `value` at `path`, first copying any previous version into `backup_dir`.
    fn save_with_backup<T: Serialize>(&self, value: &T, path: &Path, backup_dir: &Path) -> Result<()> {
        if path.exists() {
            self.backup_existing_file(path, backup_dir)?;
        }
        write_json(path, value)?;
        tracing::debug!(path = %path.display(), "saved");
        Ok(())
    }

    fn backup_existing_file(&self, path: &Path, backup_dir: &Path) -> Result<()> {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            return Ok(());
        };
        ensure_dir(backup_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let backup_path = backup_dir.join(format!("{}_{}.{}", stem, timestamp, JSON_EXTENSION));
        fs::copy(path, &backup_path)?;
        tracing::debug!(backup = %backup_path.display(), "previous version backed up");
        self.prune_backups(backup_dir)
    }

    fn prune_backups(&self, backup_dir: &Path) -> Result<()> {
        let backups = list_backup_names(backup_dir)?;
        for name in backups.iter().skip(self.retention) {
            if let Err(err) = fs::remove_file(backup_dir.join(name)) {
                tracing::warn!(backup = %name, %err, "failed to prune backup");
            }
        }
        Ok(())
    }
}

impl StorageBackend for JsonStorage {
    fn save_client(&self, client: &Client) -> Result<()> {
        let name = client.name();
        self.save_with_backup(client, &self.client_path(name), &self.client_backup_dir(name))
    }

    fn load_client(&self, name: &str) -> Result<Client> {
        read_existing(&self.client_path(name), "client", name)
    }

    fn list_clients(&self) -> Result<Vec<Client>> {
        let mut clients: Vec<Client> = read_all(&self.clients_dir)?;
        clients.sort_by_key(|client| client.name().to_lowercase());
        Ok(clients)
    }

    fn delete_client(&self, name: &str) -> Result<()> {
        let path = self.client_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn save_project(&self, client: &Client, project: &Project) -> Result<()> {
        if project.client_id != client.id {
            return Err(CoreError::InvalidInput(format!(
                "project `{}` does not belong to client `{}`",
                project.title,
                client.name()
            )));
        }
        self.save_with_backup(
            project,
            &self.project_path(client, &project.title),
            &self.project_backup_dir(client, &project.title),
        )
    }

    fn load_project(&self, client: &Client, title: &str) -> Result<Project> {
        read_existing(&self.project_path(client, title), "project", title)
    }

    fn list_projects(&self, client: &Client) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = read_all(&self.project_dir(client))?;
        projects.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(projects)
    }

    fn delete_project(&self, client: &Client, title: &str) -> Result<()> {
        let path = self.project_path(client, title);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn list_project_backups(&self, client: &Client, title: &str) -> Result<Vec<String>> {
        list_backup_names(&self.project_backup_dir(client, title))
    }

    fn restore_project(&self, client: &Client, title: &str, backup_name: &str) -> Result<Project> {
        let backup_path = self
            .project_backup_dir(client, title)
            .join(backup_file_name(backup_name)?);
        if !backup_path.exists() {
            return Err(CoreError::NotFound(format!("backup `{}`", backup_name)));
        }
        let project: Project = read_json(&backup_path)?;
        self.save_project(client, &project)?;
        tracing::info!(project = %project.title, backup = %backup_name, "project restored");
        Ok(project)
    }

    /// Presets never keep references; they are stored demoted.
    fn save_entry_preset(&self, entry: &Entry) -> Result<()> {
        let mut preset = entry.copy(true);
        if let Some(reference) = preset.as_reference_mut() {
            reference.disconnect_all();
        }
        let path = self.entry_presets_dir.join(file_name(&preset_slug(entry.title())));
        write_json(&path, &preset.to_record()?)
    }

    fn load_entry_preset(&self, name: &str) -> Result<Entry> {
        let path = self.entry_presets_dir.join(file_name(&preset_slug(name)));
        let record: serde_json::Value = read_existing(&path, "entry preset", name)?;
        Ok(Entry::from_record(record, true)?)
    }

    fn list_entry_presets(&self) -> Result<Vec<Entry>> {
        let records: Vec<serde_json::Value> = read_all(&self.entry_presets_dir)?;
        let mut presets = Vec::with_capacity(records.len());
        for record in records {
            match Entry::from_record(record, true) {
                Ok(entry) => presets.push(entry),
                Err(err) => tracing::warn!(%err, "skipping malformed entry preset"),
            }
        }
        presets.sort_by(|a, b| a.title().cmp(b.title()));
        Ok(presets)
    }

    fn save_document_preset(&self, document: &Document) -> Result<()> {
        let path = self
            .document_presets_dir
            .join(file_name(&preset_slug(&document.title)));
        write_json(&path, document)
    }

    /// The loaded document gets a fresh id; its entries keep theirs so
    /// references inside it stay valid.
    fn load_document_preset(&self, name: &str) -> Result<Document> {
        let path = self.document_presets_dir.join(file_name(&preset_slug(name)));
        let mut document: Document = read_existing(&path, "document preset", name)?;
        document.id = uuid::Uuid::new_v4();
        Ok(document)
    }

    fn list_document_presets(&self) -> Result<Vec<Document>> {
        let mut documents: Vec<Document> = read_all(&self.document_presets_dir)?;
        documents.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(documents)
    }
}

/// Serializes `value` to `path` through a temporary file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    replace_file(path, &json)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn read_existing<T: DeserializeOwned>(path: &Path, what: &str, name: &str) -> Result<T> {
    if !path.exists() {
        return Err(CoreError::NotFound(format!("{} `{}`", what, name)));
    }
    read_json(path)
}

/// Reads every `*.json` file in `dir`, skipping the ones that fail to parse.
fn read_all<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut items = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(JSON_EXTENSION) {
            continue;
        }
        match read_json(&path) {
            Ok(item) => items.push(item),
            Err(err) => tracing::warn!(path = %path.display(), %err, "skipping unreadable file"),
        }
    }
    Ok(items)
}

/// Backup file names in `dir`, newest first.
fn list_backup_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(JSON_EXTENSION) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort_by_key(|name| Reverse((parse_backup_timestamp(name), name.clone())));
    Ok(names)
}

fn file_name(slug: &str) -> String {
    format!("{}.{}", slug, JSON_EXTENSION)
}

fn client_slug(name: &str) -> String {
    canonical_name(name, "client")
}

fn project_slug(title: &str) -> String {
    canonical_name(title, "project")
}

fn preset_slug(title: &str) -> String {
    canonical_name(title, "preset")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FixedEntry, ReferenceEntry, WorkDuration};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn storage_with_temp_dir() -> (JsonStorage, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let storage =
            JsonStorage::new(Some(temp.path().to_path_buf()), Some(3)).expect("json storage");
        (storage, temp)
    }

    fn sample_client() -> Client {
        let mut client = Client::new("Ada", "Lovelace");
        client.company = "Analytical Engines".into();
        client
    }

    #[test]
    fn client_save_and_load() {
        let (storage, _guard) = storage_with_temp_dir();
        let client = sample_client();
        storage.save_client(&client).expect("save client");
        assert!(storage
            .client_path("Analytical Engines")
            .ends_with("clients/analytical_engines.json"));
        let loaded = storage.load_client("Analytical Engines").expect("load client");
        assert_eq!(loaded, client);
        assert!(matches!(
            storage.load_client("Nobody"),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn overwriting_creates_backup_and_prunes() {
        let (storage, _guard) = storage_with_temp_dir();
        let client = sample_client();
        let mut project = Project::new(client.id, "Difference Engine");
        storage.save_project(&client, &project).expect("first save");
        assert!(storage
            .list_project_backups(&client, &project.title)
            .expect("list")
            .is_empty());

        let backup_dir = storage.project_backup_dir(&client, &project.title);
        ensure_dir(&backup_dir).expect("backup dir");
        for day in 1..=4 {
            let name = format!("difference_engine_2020010{}_120000.json", day);
            fs::write(backup_dir.join(name), "{}").expect("seed backup");
        }

        project.comment = "second".into();
        storage.save_project(&client, &project).expect("second save");
        let backups = storage
            .list_project_backups(&client, &project.title)
            .expect("list");
        assert_eq!(backups.len(), 3);
        assert!(!backups.iter().any(|name| name.contains("20200101")));
        assert!(!storage
            .project_path(&client, &project.title)
            .with_extension("json.tmp")
            .exists());
    }

    #[test]
    fn restore_project_from_backup() {
        let (storage, _guard) = storage_with_temp_dir();
        let client = sample_client();
        let mut project = Project::new(client.id, "Mill");
        project.comment = "original".into();
        storage.save_project(&client, &project).expect("save");
        project.comment = "changed".into();
        storage.save_project(&client, &project).expect("save again");

        let backups = storage.list_project_backups(&client, "Mill").expect("list");
        let restored = storage
            .restore_project(&client, "Mill", &backups[0])
            .expect("restore");
        assert_eq!(restored.comment, "original");
        assert_eq!(
            storage.load_project(&client, "Mill").expect("load").comment,
            "original"
        );
    }

    #[test]
    fn restore_rejects_names_outside_the_backup_dir() {
        let (storage, _guard) = storage_with_temp_dir();
        let client = sample_client();
        let mut project = Project::new(client.id, "Mill");
        storage.save_project(&client, &project).expect("save");
        project.comment = "planted".into();
        let outside = storage
            .project_backup_dir(&client, "Mill")
            .with_file_name("x.json");
        storage
            .save_project_to_path(&project, &outside)
            .expect("plant");

        for name in ["../x.json", "/tmp/x.json", ""] {
            assert!(matches!(
                storage.restore_project(&client, "Mill", name),
                Err(CoreError::InvalidInput(_))
            ));
        }
        assert_eq!(
            storage.load_project(&client, "Mill").expect("load").comment,
            ""
        );
    }

    #[test]
    fn project_of_other_client_is_rejected() {
        let (storage, _guard) = storage_with_temp_dir();
        let project = Project::new(uuid::Uuid::new_v4(), "Stray");
        assert!(matches!(
            storage.save_project(&sample_client(), &project),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn listing_skips_malformed_files() {
        let (storage, _guard) = storage_with_temp_dir();
        let client = sample_client();
        storage.save_client(&client).expect("save");
        storage
            .save_client(&Client::new("Charles", "Babbage"))
            .expect("save");
        fs::write(storage.clients_dir.join("broken.json"), "{ nope").expect("write");
        fs::write(storage.clients_dir.join("notes.txt"), "ignored").expect("write");

        let clients = storage.list_clients().expect("list");
        let names: Vec<&str> = clients.iter().map(|client| client.name()).collect();
        assert_eq!(names, vec!["Analytical Engines", "Babbage"]);
    }

    #[test]
    fn entry_presets_are_demoted_and_reloaded_with_fresh_ids() {
        let (storage, _guard) = storage_with_temp_dir();
        let mut reference =
            ReferenceEntry::new("Project management", Decimal::ONE, Decimal::new(1, 1), false);
        reference.connect_unchecked(uuid::Uuid::new_v4());
        let entry = Entry::from(reference);
        storage.save_entry_preset(&entry).expect("save preset");
        storage
            .save_entry_preset(&Entry::from(FixedEntry::new(
                "Domain",
                WorkDuration::ZERO,
                Decimal::new(1500, 2),
            )))
            .expect("save preset");

        let loaded = storage.load_entry_preset("Project management").expect("load");
        assert_ne!(loaded.id(), entry.id());
        assert!(loaded.as_reference().expect("reference").connected().is_empty());

        let titles: Vec<String> = storage
            .list_entry_presets()
            .expect("list")
            .iter()
            .map(|entry| entry.title().to_string())
            .collect();
        assert_eq!(titles, vec!["Domain", "Project management"]);
    }

    #[test]
    fn document_presets_keep_entry_ids() {
        let (storage, _guard) = storage_with_temp_dir();
        let mut document = Document::offer("Landing page");
        let fixed = document.add_entry(Entry::from(FixedEntry::new(
            "Setup",
            WorkDuration::from_hms(1, 0, 0),
            Decimal::new(100, 0),
        )));
        storage.save_document_preset(&document).expect("save");
        let loaded = storage.load_document_preset("Landing page").expect("load");
        assert_ne!(loaded.id, document.id);
        assert!(loaded.entry(fixed).is_some());
        assert_eq!(storage.list_document_presets().expect("list").len(), 1);
    }

    #[test]
    fn path_helpers_roundtrip_outside_managed_tree() {
        let (storage, guard) = storage_with_temp_dir();
        let project = Project::new(uuid::Uuid::new_v4(), "Export");
        let path = guard.path().join("exports").join("export.json");
        storage
            .save_project_to_path(&project, &path)
            .expect("save to path");
        let loaded = storage.load_project_from_path(&path).expect("load from path");
        assert_eq!(loaded, project);
    }
}
