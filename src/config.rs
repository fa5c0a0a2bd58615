use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use crate::classifier::SlotClassifier;
use crate::error::ConfigError;
use crate::models::{RecipientField, SlotKind, SlotRule};

pub(crate) const DEFAULT_SETTINGS: &str = r#"# Código do país aplicado ao telefone antes do envio.
country_code = "55"
# Formato das datas inseridas nos campos de data.
date_format = "%d/%m/%Y"
# Campo preenchido automaticamente com o nome do cliente selecionado.
recipient_name_slot = "nome_cliente"
link_base = "https://wa.me/"
log_level = "info"

[[slots]]
name = "numero_processo"
kind = "relational"
relation = "processos"

[[slots]]
name = "status_processo"
kind = "choice"
options = ["Em Andamento", "Concluído", "Arquivado"]

[[slots]]
prefix = "data_"
kind = "date"
"#;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) country_code: String,
    pub(crate) date_format: String,
    pub(crate) recipient_name_slot: Option<String>,
    pub(crate) recipient_phone_slot: Option<String>,
    pub(crate) link_base: String,
    pub(crate) log_level: String,
    pub(crate) slots: Vec<SlotEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SlotEntry {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) prefix: Option<String>,
    pub(crate) kind: KindName,
    #[serde(default)]
    pub(crate) relation: Option<String>,
    #[serde(default)]
    pub(crate) options: Vec<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum KindName {
    Relational,
    Choice,
    Date,
    Text,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            country_code: "55".to_string(),
            date_format: "%d/%m/%Y".to_string(),
            recipient_name_slot: Some("nome_cliente".to_string()),
            recipient_phone_slot: None,
            link_base: "https://wa.me/".to_string(),
            log_level: "info".to_string(),
            slots: Vec::new(),
        }
    }
}

impl Settings {
    pub(crate) fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let broken = StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error));
        if broken || self.date_format.is_empty() || !round_trips(&self.date_format) {
            return Err(ConfigError::InvalidRule {
                key: "date_format".to_string(),
                reason: format!("formato de data inválido: {}", self.date_format),
            });
        }
        if !self.country_code.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(ConfigError::InvalidRule {
                key: "country_code".to_string(),
                reason: "use apenas dígitos".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the slot table. Conflicting entries fail here, before any template is opened.
    pub(crate) fn build_classifier(&self) -> Result<SlotClassifier, ConfigError> {
        let mut classifier = SlotClassifier::default();
        let mut relation: Option<&str> = None;
        for entry in &self.slots {
            let rule = entry.rule()?;
            // Related records are fetched per recipient from a single source.
            if let SlotKind::RelationalSelect { relation: named } = &rule.kind {
                match relation {
                    Some(first) if first != named.as_str() => {
                        return Err(ConfigError::InvalidRule {
                            key: entry.key(),
                            reason: format!("apenas uma relação é suportada (`{first}`)"),
                        });
                    }
                    _ => relation = entry.relation.as_deref(),
                }
            }
            match (&entry.name, &entry.prefix) {
                (Some(name), None) => classifier.register_name(name, rule)?,
                (None, Some(prefix)) => classifier.register_prefix(prefix, rule)?,
                _ => {
                    return Err(ConfigError::InvalidRule {
                        key: entry.key(),
                        reason: "informe `name` ou `prefix`, não ambos".to_string(),
                    });
                }
            }
        }
        let derived = [
            (&self.recipient_name_slot, RecipientField::DisplayName),
            (&self.recipient_phone_slot, RecipientField::ContactAddress),
        ];
        for (slot, field) in derived {
            if let Some(name) = slot {
                let rule = SlotRule {
                    kind: SlotKind::FreeText,
                    derived_from: Some(field),
                };
                classifier.register_name(name, rule)?;
            }
        }
        Ok(classifier)
    }
}

/// Dates are stored as text, so the pattern must parse back to the same day.
fn round_trips(pattern: &str) -> bool {
    NaiveDate::from_ymd_opt(2024, 3, 5).is_some_and(|sample| {
        let text = sample.format(pattern).to_string();
        NaiveDate::parse_from_str(&text, pattern).ok() == Some(sample)
    })
}

impl SlotEntry {
    fn key(&self) -> String {
        match (&self.name, &self.prefix) {
            (Some(name), _) => name.clone(),
            (None, Some(prefix)) => format!("{prefix}*"),
            (None, None) => "?".to_string(),
        }
    }

    fn rule(&self) -> Result<SlotRule, ConfigError> {
        let kind = match self.kind {
            KindName::Relational => {
                let relation = self.relation.clone().ok_or_else(|| ConfigError::InvalidRule {
                    key: self.key(),
                    reason: "campo relacional sem `relation`".to_string(),
                })?;
                SlotKind::RelationalSelect { relation }
            }
            KindName::Choice => {
                if self.options.is_empty() {
                    return Err(ConfigError::InvalidRule {
                        key: self.key(),
                        reason: "lista de opções vazia".to_string(),
                    });
                }
                SlotKind::EnumeratedSelect {
                    options: self.options.clone(),
                }
            }
            KindName::Date => SlotKind::Date,
            KindName::Text => SlotKind::FreeText,
        };
        Ok(SlotRule {
            kind,
            derived_from: None,
        })
    }
}
