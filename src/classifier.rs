use std::collections::HashMap;

use crate::error::ConfigError;
use crate::models::{SlotKind, SlotRule};

/// Lookup table from placeholder name to slot rule.
///
/// Rules are keyed either by an exact name or by a name prefix. Overlapping
/// entries that disagree are rejected while the table is built, so
/// [`SlotClassifier::classify`] never has to pick between two conventions.
#[derive(Clone, Debug, Default)]
pub(crate) struct SlotClassifier {
    exact: HashMap<String, SlotRule>,
    prefixes: Vec<(String, SlotRule)>,
}

impl SlotClassifier {
    pub(crate) fn register_name(&mut self, name: &str, rule: SlotRule) -> Result<(), ConfigError> {
        if name.is_empty() {
            return Err(invalid(name, "nome vazio"));
        }
        if let Some(existing) = self.exact.get(name) {
            return check_same(name, existing, &rule);
        }
        for (prefix, existing) in &self.prefixes {
            if name.starts_with(prefix.as_str()) {
                check_same(name, existing, &rule)?;
            }
        }
        self.exact.insert(name.to_string(), rule);
        Ok(())
    }

    pub(crate) fn register_prefix(
        &mut self,
        prefix: &str,
        rule: SlotRule,
    ) -> Result<(), ConfigError> {
        if prefix.is_empty() {
            return Err(invalid(prefix, "prefixo vazio"));
        }
        let key = format!("{prefix}*");
        for (known, existing) in &self.prefixes {
            if known.starts_with(prefix) || prefix.starts_with(known.as_str()) {
                check_same(&key, existing, &rule)?;
            }
        }
        for (name, existing) in &self.exact {
            if name.starts_with(prefix) {
                check_same(name, existing, &rule)?;
            }
        }
        if !self.prefixes.iter().any(|(known, _)| known == prefix) {
            self.prefixes.push((prefix.to_string(), rule));
        }
        Ok(())
    }

    pub(crate) fn classify(&self, name: &str) -> SlotRule {
        if let Some(rule) = self.exact.get(name) {
            return rule.clone();
        }
        self.prefixes
            .iter()
            .filter(|(prefix, _)| name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, rule)| rule.clone())
            .unwrap_or_else(SlotRule::free_text)
    }
}

fn check_same(key: &str, existing: &SlotRule, rule: &SlotRule) -> Result<(), ConfigError> {
    if existing == rule {
        Ok(())
    } else {
        Err(ConfigError::ConflictingRule {
            key: key.to_string(),
            existing: describe(&existing.kind).to_string(),
        })
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidRule {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub(crate) fn describe(kind: &SlotKind) -> &'static str {
    match kind {
        SlotKind::RelationalSelect { .. } => "registro relacionado",
        SlotKind::EnumeratedSelect { .. } => "lista de opções",
        SlotKind::Date => "data",
        SlotKind::FreeText => "texto livre",
    }
}
