use std::collections::HashMap;

use log::warn;

use crate::models::Slot;

/// Read access to the values bound to placeholder names.
pub(crate) trait Bindings {
    fn value(&self, name: &str) -> Option<&str>;
}

impl Bindings for HashMap<String, String> {
    fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// Current slot values of the active template.
#[derive(Clone, Debug, Default)]
pub(crate) struct BindingStore {
    slots: Vec<Slot>,
}

impl BindingStore {
    pub(crate) fn install(&mut self, slots: Vec<Slot>) {
        self.slots = slots;
        self.clear_all();
    }

    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub(crate) fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// Binds `value` to `name`. Returns `false` when the active template has no such slot.
    pub(crate) fn set(&mut self, name: &str, value: &str) -> bool {
        match self.slots.iter_mut().find(|slot| slot.name == name) {
            Some(slot) => {
                slot.value = Some(value.to_string());
                true
            }
            None => {
                warn!("configuration mismatch: no slot named `{name}` in the active template");
                false
            }
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.slot(name).and_then(Slot::bound_value)
    }

    pub(crate) fn clear_all(&mut self) {
        for slot in &mut self.slots {
            slot.value = None;
        }
    }

    pub(crate) fn clear(&mut self, names: &[&str]) {
        self.clear_where(|slot| names.contains(&slot.name.as_str()));
    }

    pub(crate) fn clear_where(&mut self, predicate: impl Fn(&Slot) -> bool) {
        for slot in &mut self.slots {
            if predicate(slot) {
                slot.value = None;
            }
        }
    }
}

impl Bindings for BindingStore {
    fn value(&self, name: &str) -> Option<&str> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SlotKind, SlotRule};

    fn store() -> BindingStore {
        let mut store = BindingStore::default();
        store.install(vec![
            Slot::new("nome", SlotRule::free_text()),
            Slot::new(
                "processo",
                SlotRule {
                    kind: SlotKind::RelationalSelect {
                        relation: "processos".to_string(),
                    },
                    derived_from: None,
                },
            ),
            Slot::new(
                "data",
                SlotRule {
                    kind: SlotKind::Date,
                    derived_from: None,
                },
            ),
        ]);
        store
    }

    #[test]
    fn set_and_get_known_slot() {
        let mut store = store();
        assert!(store.set("nome", "Maria"));
        assert_eq!(store.get("nome"), Some("Maria"));
        assert_eq!(store.get("processo"), None);
    }

    #[test]
    fn set_unknown_slot_is_a_no_op() {
        let mut store = store();
        assert!(!store.set("inexistente", "x"));
        assert_eq!(store.get("inexistente"), None);
        assert_eq!(store.slots().len(), 3);
    }

    #[test]
    fn empty_value_reads_as_absent() {
        let mut store = store();
        store.set("nome", "");
        assert_eq!(store.get("nome"), None);
    }

    #[test]
    fn partial_clear_keeps_other_bindings() {
        let mut store = store();
        store.set("nome", "Maria");
        store.set("processo", "123/2024");
        store.set("data", "01/02/2024");
        store.clear(&["nome", "data"]);
        assert_eq!(store.get("nome"), None);
        assert_eq!(store.get("data"), None);
        assert_eq!(store.get("processo"), Some("123/2024"));

        store.clear_where(|slot| slot.kind.is_relational());
        assert_eq!(store.get("processo"), None);
    }

    #[test]
    fn install_replaces_slots_and_values() {
        let mut store = store();
        store.set("nome", "Maria");
        store.install(vec![Slot::new("outro", SlotRule::free_text())]);
        assert_eq!(store.get("nome"), None);
        assert!(store.slot("nome").is_none());
        assert!(store.set("outro", "ok"));
    }
}
