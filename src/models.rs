#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Template {
    pub(crate) id: usize,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) is_default: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct TreeItem {
    pub(crate) label: String,
    pub(crate) depth: usize,
    pub(crate) template_index: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Recipient {
    pub(crate) id: String,
    pub(crate) display_name: String,
    pub(crate) contact_address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RelatedRecord {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) subtitle: String,
    pub(crate) status_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Token {
    Text(String),
    Marker { name: String, raw: String },
}

/// How the value of a slot is obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SlotKind {
    /// Label of a record from the relation scoped to the selected recipient.
    RelationalSelect { relation: String },
    /// One of a closed vocabulary.
    EnumeratedSelect { options: Vec<String> },
    Date,
    FreeText,
}

impl SlotKind {
    pub(crate) fn is_relational(&self) -> bool {
        matches!(self, SlotKind::RelationalSelect { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RecipientField {
    DisplayName,
    ContactAddress,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SlotRule {
    pub(crate) kind: SlotKind,
    pub(crate) derived_from: Option<RecipientField>,
}

impl SlotRule {
    pub(crate) fn free_text() -> Self {
        Self {
            kind: SlotKind::FreeText,
            derived_from: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) kind: SlotKind,
    pub(crate) derived_from: Option<RecipientField>,
    pub(crate) value: Option<String>,
}

impl Slot {
    pub(crate) fn new(name: &str, rule: SlotRule) -> Self {
        Self {
            name: name.to_string(),
            kind: rule.kind,
            derived_from: rule.derived_from,
            value: None,
        }
    }

    pub(crate) fn bound_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !value.is_empty())
    }
}

/// A complete message ready for the dispatch channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Dispatch {
    pub(crate) address: String,
    pub(crate) message: String,
}
