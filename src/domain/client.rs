use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{Displayable, Identifiable, NamedEntity};

/// Contact record of a client; projects refer to it by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub company: String,
    pub salutation: String,
    pub name: String,
    pub family_name: String,
    pub street: String,
    pub post_code: String,
    pub city: String,
    pub country: String,
    pub language: String,
    pub tax_id: String,
}

impl Client {
    pub fn new(name: impl Into<String>, family_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            family_name: family_name.into(),
            ..Self::default()
        }
    }

    pub fn full_name(&self) -> String {
        [self.name.trim(), self.family_name.trim()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Identifiable for Client {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Client {
    fn name(&self) -> &str {
        if self.company.is_empty() {
            &self.family_name
        } else {
            &self.company
        }
    }
}

impl Displayable for Client {
    fn display_label(&self) -> String {
        let full_name = self.full_name();
        if self.company.is_empty() {
            full_name
        } else if full_name.is_empty() {
            self.company.clone()
        } else {
            format!("{} ({})", self.company, full_name)
        }
    }
}
