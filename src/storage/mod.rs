pub mod json_backend;

use std::path::Path;

use crate::{
    domain::{Client, Document, Entry, Project},
    errors::Result,
};

/// Abstraction over persistence backends for clients, projects and presets.
pub trait StorageBackend: Send + Sync {
    fn save_client(&self, client: &Client) -> Result<()>;
    fn load_client(&self, name: &str) -> Result<Client>;
    /// Every readable client; malformed files are skipped.
    fn list_clients(&self) -> Result<Vec<Client>>;
    fn delete_client(&self, name: &str) -> Result<()>;

    fn save_project(&self, client: &Client, project: &Project) -> Result<()>;
    fn load_project(&self, client: &Client, title: &str) -> Result<Project>;
    fn list_projects(&self, client: &Client) -> Result<Vec<Project>>;
    fn delete_project(&self, client: &Client, title: &str) -> Result<()>;
    fn list_project_backups(&self, client: &Client, title: &str) -> Result<Vec<String>>;
    fn restore_project(&self, client: &Client, title: &str, backup_name: &str) -> Result<Project>;

    fn save_entry_preset(&self, entry: &Entry) -> Result<()>;
    fn load_entry_preset(&self, name: &str) -> Result<Entry>;
    fn list_entry_presets(&self) -> Result<Vec<Entry>>;

    fn save_document_preset(&self, document: &Document) -> Result<()>;
    fn load_document_preset(&self, name: &str) -> Result<Document>;
    fn list_document_presets(&self) -> Result<Vec<Document>>;

    /// Writes a project to an arbitrary location outside the managed tree.
    fn save_project_to_path(&self, project: &Project, path: &Path) -> Result<()> {
        json_backend::write_json(path, project)
    }

    fn load_project_from_path(&self, path: &Path) -> Result<Project> {
        json_backend::read_json(path)
    }
}

pub use json_backend::JsonStorage;
