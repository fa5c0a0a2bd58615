use log::{debug, info, warn};

use crate::bindings::BindingStore;
use crate::error::SourceError;
use crate::models::{Recipient, RecipientField, RelatedRecord};

/// Related records of the selected recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Candidates {
    Idle,
    Loading,
    Ready(Vec<RelatedRecord>),
    Failed(String),
}

/// A pending related-record fetch. Only the newest ticket is honoured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FetchTicket {
    pub(crate) generation: u64,
    pub(crate) recipient_id: String,
}

#[derive(Debug)]
pub(crate) enum FetchOutcome {
    Applied(usize),
    Stale,
    Failed(SourceError),
}

#[derive(Clone, Debug)]
pub(crate) struct RecipientContext {
    recipient: Option<Recipient>,
    candidates: Candidates,
    generation: u64,
}

impl Default for RecipientContext {
    fn default() -> Self {
        Self {
            recipient: None,
            candidates: Candidates::Idle,
            generation: 0,
        }
    }
}

impl RecipientContext {
    pub(crate) fn recipient(&self) -> Option<&Recipient> {
        self.recipient.as_ref()
    }

    pub(crate) fn state(&self) -> &Candidates {
        &self.candidates
    }

    /// Records available for selection; empty while loading or after a failure.
    pub(crate) fn candidates(&self) -> &[RelatedRecord] {
        match &self.candidates {
            Candidates::Ready(records) => records,
            _ => &[],
        }
    }

    pub(crate) fn record(&self, id: &str) -> Option<&RelatedRecord> {
        self.candidates().iter().find(|record| record.id == id)
    }

    /// Makes `recipient` current, drops the cached records and issues a new fetch ticket.
    pub(crate) fn switch_to(&mut self, recipient: Recipient) -> FetchTicket {
        self.generation += 1;
        let ticket = FetchTicket {
            generation: self.generation,
            recipient_id: recipient.id.clone(),
        };
        debug!(
            "recipient changed to `{}` (generation {})",
            recipient.id, self.generation
        );
        self.recipient = Some(recipient);
        self.candidates = Candidates::Loading;
        ticket
    }

    /// Drops the cached records of the current recipient and issues a new ticket.
    pub(crate) fn refresh(&mut self) -> Option<FetchTicket> {
        let recipient = self.recipient.take()?;
        Some(self.switch_to(recipient))
    }

    pub(crate) fn resolve(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<RelatedRecord>, SourceError>,
    ) -> FetchOutcome {
        let current = self
            .recipient
            .as_ref()
            .is_some_and(|recipient| recipient.id == ticket.recipient_id);
        if ticket.generation != self.generation || !current {
            info!(
                "discarding stale records for `{}` (generation {}, current {})",
                ticket.recipient_id, ticket.generation, self.generation
            );
            return FetchOutcome::Stale;
        }
        match result {
            Ok(records) => {
                let count = records.len();
                debug!("{count} records loaded for `{}`", ticket.recipient_id);
                self.candidates = Candidates::Ready(records);
                FetchOutcome::Applied(count)
            }
            Err(err) => {
                warn!("records for `{}` failed: {err}", ticket.recipient_id);
                self.candidates = Candidates::Failed(err.to_string());
                FetchOutcome::Failed(err)
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.generation += 1;
        self.recipient = None;
        self.candidates = Candidates::Idle;
    }
}

/// Clears every binding that belonged to the previous recipient.
pub(crate) fn clear_recipient_slots(store: &mut BindingStore) {
    store.clear_where(|slot| slot.kind.is_relational() || slot.derived_from.is_some());
}

/// Fills the slots whose value comes straight from the recipient record.
pub(crate) fn seed_recipient_slots(store: &mut BindingStore, recipient: Option<&Recipient>) {
    let recipient = match recipient {
        Some(recipient) => recipient,
        None => return,
    };
    let derived: Vec<(String, RecipientField)> = store
        .slots()
        .iter()
        .filter_map(|slot| slot.derived_from.map(|field| (slot.name.clone(), field)))
        .collect();
    for (name, field) in derived {
        let value = match field {
            RecipientField::DisplayName => Some(recipient.display_name.as_str()),
            RecipientField::ContactAddress => recipient.contact_address.as_deref(),
        };
        if let Some(value) = value {
            store.set(&name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Slot, SlotKind, SlotRule};

    fn recipient(id: &str, name: &str) -> Recipient {
        Recipient {
            id: id.to_string(),
            display_name: name.to_string(),
            contact_address: Some("(11) 91234-5678".to_string()),
        }
    }

    fn record(label: &str) -> RelatedRecord {
        RelatedRecord {
            id: format!("id-{label}"),
            label: label.to_string(),
            subtitle: String::new(),
            status_text: String::new(),
        }
    }

    #[test]
    fn newest_ticket_is_applied() {
        let mut context = RecipientContext::default();
        let ticket = context.switch_to(recipient("a", "Ana"));
        assert_eq!(context.state(), &Candidates::Loading);
        assert!(context.candidates().is_empty());

        let outcome = context.resolve(&ticket, Ok(vec![record("1/2024")]));
        assert!(matches!(outcome, FetchOutcome::Applied(1)));
        assert_eq!(context.candidates().len(), 1);
        assert!(context.record("id-1/2024").is_some());
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut context = RecipientContext::default();
        let first = context.switch_to(recipient("a", "Ana"));
        let second = context.switch_to(recipient("b", "Bruno"));

        let outcome = context.resolve(&first, Ok(vec![record("A-1")]));
        assert!(matches!(outcome, FetchOutcome::Stale));
        assert_eq!(context.state(), &Candidates::Loading);

        context.resolve(&second, Ok(vec![record("B-1")]));
        assert_eq!(context.candidates()[0].label, "B-1");
    }

    #[test]
    fn reselecting_the_same_recipient_invalidates_older_ticket() {
        let mut context = RecipientContext::default();
        let first = context.switch_to(recipient("a", "Ana"));
        let _second = context.switch_to(recipient("a", "Ana"));
        assert!(matches!(
            context.resolve(&first, Ok(vec![record("A-1")])),
            FetchOutcome::Stale
        ));
    }

    #[test]
    fn failure_leaves_candidates_empty() {
        let mut context = RecipientContext::default();
        let ticket = context.switch_to(recipient("a", "Ana"));
        let outcome = context.resolve(&ticket, Err(SourceError::Worker("boom".to_string())));
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert!(matches!(context.state(), Candidates::Failed(_)));
        assert!(context.candidates().is_empty());
    }

    #[test]
    fn refresh_reissues_ticket_for_same_recipient() {
        let mut context = RecipientContext::default();
        assert!(context.refresh().is_none());

        let first = context.switch_to(recipient("a", "Ana"));
        context.resolve(&first, Ok(vec![record("A-1")]));
        let second = context.refresh().expect("recipient selected");
        assert_eq!(second.recipient_id, "a");
        assert_eq!(context.state(), &Candidates::Loading);
        assert_eq!(context.recipient().map(|r| r.display_name.as_str()), Some("Ana"));
        assert!(matches!(context.resolve(&first, Ok(vec![])), FetchOutcome::Stale));
    }

    #[test]
    fn reset_rejects_in_flight_fetch() {
        let mut context = RecipientContext::default();
        let ticket = context.switch_to(recipient("a", "Ana"));
        context.reset();
        assert!(matches!(context.resolve(&ticket, Ok(vec![])), FetchOutcome::Stale));
        assert!(context.recipient().is_none());
    }

    #[test]
    fn seeding_fills_only_derived_slots() {
        let mut store = BindingStore::default();
        store.install(vec![
            Slot::new(
                "nome_cliente",
                SlotRule {
                    kind: SlotKind::FreeText,
                    derived_from: Some(RecipientField::DisplayName),
                },
            ),
            Slot::new(
                "telefone",
                SlotRule {
                    kind: SlotKind::FreeText,
                    derived_from: Some(RecipientField::ContactAddress),
                },
            ),
            Slot::new("assunto", SlotRule::free_text()),
        ]);
        seed_recipient_slots(&mut store, Some(&recipient("a", "Maria")));
        assert_eq!(store.get("nome_cliente"), Some("Maria"));
        assert_eq!(store.get("telefone"), Some("(11) 91234-5678"));
        assert_eq!(store.get("assunto"), None);

        store.set("assunto", "cobrança");
        clear_recipient_slots(&mut store);
        assert_eq!(store.get("nome_cliente"), None);
        assert_eq!(store.get("assunto"), Some("cobrança"));
    }
}
