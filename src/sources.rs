use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::SourceError;
use crate::models::{Recipient, RelatedRecord, Template};
use crate::parser::parse_templates;

pub(crate) trait TemplateSource {
    /// Default templates first, the rest in creation order.
    fn list_templates(&self) -> Result<Vec<Template>, SourceError>;
}

pub(crate) trait RecipientSource {
    /// Ordered by display name.
    fn list_recipients(&self) -> Result<Vec<Recipient>, SourceError>;
}

pub(crate) trait RelationalRecordSource: Send + Sync {
    fn list_related_records(&self, recipient_id: &str) -> Result<Vec<RelatedRecord>, SourceError>;
}

/// Templates kept as `## Title` sections of a markdown file.
#[derive(Clone, Debug)]
pub(crate) struct MarkdownTemplateSource {
    path: PathBuf,
}

impl MarkdownTemplateSource {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TemplateSource for MarkdownTemplateSource {
    fn list_templates(&self) -> Result<Vec<Template>, SourceError> {
        let content = read(&self.path)?;
        let mut templates = parse_templates(&content);
        templates.sort_by_key(|template| !template.is_default);
        Ok(templates)
    }
}

/// Clients and their cases from `clientes.toml`.
#[derive(Clone, Debug)]
pub(crate) struct DirectoryFile {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryData {
    #[serde(default)]
    clients: Vec<ClientRow>,
    #[serde(default)]
    cases: Vec<CaseRow>,
}

#[derive(Debug, Deserialize)]
struct ClientRow {
    id: String,
    name: String,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaseRow {
    id: String,
    client_id: String,
    number: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    status: String,
}

impl DirectoryFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<DirectoryData, SourceError> {
        let content = read(&self.path)?;
        toml::from_str(&content).map_err(|err| SourceError::Parse {
            path: self.path.clone(),
            message: err.message().to_string(),
        })
    }
}

impl RecipientSource for DirectoryFile {
    fn list_recipients(&self) -> Result<Vec<Recipient>, SourceError> {
        let mut recipients: Vec<Recipient> = self
            .load()?
            .clients
            .into_iter()
            .map(|row| Recipient {
                id: row.id,
                display_name: row.name,
                contact_address: row.phone.filter(|phone| !phone.trim().is_empty()),
            })
            .collect();
        recipients.sort_by_key(|recipient| recipient.display_name.to_lowercase());
        Ok(recipients)
    }
}

impl RelationalRecordSource for DirectoryFile {
    fn list_related_records(&self, recipient_id: &str) -> Result<Vec<RelatedRecord>, SourceError> {
        Ok(self
            .load()?
            .cases
            .into_iter()
            .filter(|row| row.client_id == recipient_id)
            .map(|row| RelatedRecord {
                id: row.id,
                label: row.number,
                subtitle: row.title,
                status_text: row.status,
            })
            .collect())
    }
}

fn read(path: &Path) -> Result<String, SourceError> {
    fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}
