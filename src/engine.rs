use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::bindings::BindingStore;
use crate::classifier::SlotClassifier;
use crate::config::Settings;
use crate::contact::normalize_contact_address;
use crate::context::{
    Candidates, FetchOutcome, FetchTicket, RecipientContext, clear_recipient_slots,
    seed_recipient_slots,
};
use crate::error::{DispatchError, SourceError};
use crate::models::{Dispatch, Recipient, RelatedRecord, Slot, SlotKind, Template, Token};
use crate::parser::{
    is_complete, missing_placeholders, parse_tokens, placeholder_names, render_template,
};

#[derive(Clone, Debug)]
struct ActiveTemplate {
    template: Template,
    tokens: Vec<Token>,
}

#[derive(Clone, Debug)]
pub(crate) struct Composer {
    classifier: SlotClassifier,
    country_code: String,
    date_format: String,
    active: Option<ActiveTemplate>,
    store: BindingStore,
    context: RecipientContext,
}

impl Composer {
    pub(crate) fn new(classifier: SlotClassifier, settings: &Settings) -> Self {
        Self {
            classifier,
            country_code: settings.country_code.clone(),
            date_format: settings.date_format.clone(),
            active: None,
            store: BindingStore::default(),
            context: RecipientContext::default(),
        }
    }

    pub(crate) fn template(&self) -> Option<&Template> {
        self.active.as_ref().map(|active| &active.template)
    }

    pub(crate) fn recipient(&self) -> Option<&Recipient> {
        self.context.recipient()
    }

    pub(crate) fn slots(&self) -> &[Slot] {
        self.store.slots()
    }

    pub(crate) fn value(&self, name: &str) -> Option<&str> {
        self.store.get(name)
    }

    pub(crate) fn candidates(&self) -> &[RelatedRecord] {
        self.context.candidates()
    }

    pub(crate) fn candidate_state(&self) -> &Candidates {
        self.context.state()
    }

    /// Installs fresh slots for `template`, then binds the current recipient again.
    /// A recipient, when present, gets a new fetch ticket like [`Composer::select_recipient`].
    pub(crate) fn select_template(&mut self, template: Template) -> Option<FetchTicket> {
        let tokens = parse_tokens(&template.body);
        let slots = placeholder_names(&tokens)
            .iter()
            .map(|name| Slot::new(name, self.classifier.classify(name)))
            .collect();
        debug!("template #{} `{}` selected", template.id, template.title);
        self.store.install(slots);
        self.active = Some(ActiveTemplate { template, tokens });
        let ticket = self.context.refresh();
        seed_recipient_slots(&mut self.store, self.context.recipient());
        ticket
    }

    /// Switches recipient. The returned ticket must be executed by the caller and
    /// handed back to [`Composer::resolve_fetch`].
    pub(crate) fn select_recipient(&mut self, recipient: Recipient) -> FetchTicket {
        clear_recipient_slots(&mut self.store);
        let ticket = self.context.switch_to(recipient);
        seed_recipient_slots(&mut self.store, self.context.recipient());
        ticket
    }

    pub(crate) fn resolve_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<RelatedRecord>, SourceError>,
    ) -> FetchOutcome {
        self.context.resolve(ticket, result)
    }

    pub(crate) fn set_text(&mut self, name: &str, value: &str) -> bool {
        self.store.set(name, value)
    }

    pub(crate) fn clear_value(&mut self, name: &str) {
        self.store.clear(&[name]);
    }

    pub(crate) fn choose_option(&mut self, name: &str, option: &str) -> bool {
        let allowed = match self.store.slot(name).map(|slot| &slot.kind) {
            Some(SlotKind::EnumeratedSelect { options }) => options.iter().any(|o| o == option),
            _ => false,
        };
        if !allowed {
            warn!("configuration mismatch: `{option}` is not an option of `{name}`");
            return false;
        }
        self.store.set(name, option)
    }

    /// Binds the label of a candidate record, never its id.
    pub(crate) fn choose_record(&mut self, name: &str, record_id: &str) -> bool {
        let relational = self
            .store
            .slot(name)
            .is_some_and(|slot| slot.kind.is_relational());
        let label = match self.context.record(record_id) {
            Some(record) if relational => record.label.clone(),
            _ => {
                warn!("configuration mismatch: record `{record_id}` cannot fill `{name}`");
                return false;
            }
        };
        self.store.set(name, &label)
    }

    pub(crate) fn choose_date(&mut self, name: &str, date: NaiveDate) -> bool {
        let is_date = self
            .store
            .slot(name)
            .is_some_and(|slot| slot.kind == SlotKind::Date);
        if !is_date {
            warn!("configuration mismatch: `{name}` is not a date slot");
            return false;
        }
        let formatted = date.format(&self.date_format).to_string();
        self.store.set(name, &formatted)
    }

    /// Date currently bound to a date slot, parsed back with the configured pattern.
    pub(crate) fn bound_date(&self, name: &str) -> Option<NaiveDate> {
        let value = self.store.get(name)?;
        NaiveDate::parse_from_str(value, &self.date_format).ok()
    }

    pub(crate) fn preview(&self) -> String {
        match &self.active {
            Some(active) => render_template(&active.tokens, &self.store),
            None => String::new(),
        }
    }

    pub(crate) fn missing(&self) -> Vec<String> {
        match &self.active {
            Some(active) => missing_placeholders(&active.tokens, &self.store),
            None => Vec::new(),
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| is_complete(&active.tokens, &self.store))
    }

    /// The rendered message and normalized address, or the reason dispatch is refused.
    pub(crate) fn prepare_dispatch(&self) -> Result<Dispatch, DispatchError> {
        let active = self.active.as_ref().ok_or(DispatchError::NoTemplate)?;
        let recipient = self.context.recipient().ok_or(DispatchError::NoRecipient)?;
        let address = recipient
            .contact_address
            .as_deref()
            .and_then(|raw| normalize_contact_address(raw, &self.country_code))
            .ok_or(DispatchError::NoContactAddress)?;
        if !is_complete(&active.tokens, &self.store) {
            return Err(DispatchError::Incomplete {
                missing: missing_placeholders(&active.tokens, &self.store),
            });
        }
        Ok(Dispatch {
            address,
            message: render_template(&active.tokens, &self.store),
        })
    }

    pub(crate) fn reset(&mut self) {
        info!("composer reset");
        self.active = None;
        self.store.install(Vec::new());
        self.context.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SETTINGS;

    const BODY: &str = "Olá [nome_cliente], seu processo [numero_processo] está [status_processo].";

    fn composer() -> Composer {
        let settings: Settings = toml::from_str(DEFAULT_SETTINGS).unwrap();
        Composer::new(settings.build_classifier().unwrap(), &settings)
    }

    fn template(body: &str) -> Template {
        Template {
            id: 0,
            title: "Status".to_string(),
            body: body.to_string(),
            is_default: false,
        }
    }

    fn recipient(id: &str, name: &str, phone: Option<&str>) -> Recipient {
        Recipient {
            id: id.to_string(),
            display_name: name.to_string(),
            contact_address: phone.map(str::to_string),
        }
    }

    fn record(id: &str, label: &str) -> RelatedRecord {
        RelatedRecord {
            id: id.to_string(),
            label: label.to_string(),
            subtitle: "Ação de cobrança".to_string(),
            status_text: "Em Andamento".to_string(),
        }
    }

    fn maria(composer: &mut Composer) {
        let ticket = composer.select_recipient(recipient("1", "Maria", Some("(11) 91234-5678")));
        composer.resolve_fetch(&ticket, Ok(vec![record("c1", "123/2024")]));
    }

    #[test]
    fn scenario_renders_complete_message() {
        let mut composer = composer();
        composer.select_template(template(BODY));
        maria(&mut composer);
        assert!(composer.choose_record("numero_processo", "c1"));
        assert!(composer.choose_option("status_processo", "Em Andamento"));

        assert_eq!(
            composer.preview(),
            "Olá Maria, seu processo 123/2024 está Em Andamento."
        );
        assert!(composer.is_complete());
        let dispatch = composer.prepare_dispatch().unwrap();
        assert_eq!(dispatch.address, "5511912345678");
        assert_eq!(dispatch.message, composer.preview());
    }

    #[test]
    fn unbound_status_blocks_dispatch() {
        let mut composer = composer();
        composer.select_template(template(BODY));
        maria(&mut composer);
        composer.choose_record("numero_processo", "c1");

        assert!(composer.preview().contains("[status_processo]"));
        assert!(!composer.is_complete());
        assert_eq!(
            composer.prepare_dispatch(),
            Err(DispatchError::Incomplete {
                missing: vec!["status_processo".to_string()]
            })
        );
    }

    #[test]
    fn dispatch_needs_template_recipient_and_address() {
        let mut composer = composer();
        assert_eq!(composer.prepare_dispatch(), Err(DispatchError::NoTemplate));

        composer.select_template(template("Bom dia."));
        assert_eq!(composer.prepare_dispatch(), Err(DispatchError::NoRecipient));

        composer.select_recipient(recipient("2", "Bruno", None));
        assert_eq!(composer.prepare_dispatch(), Err(DispatchError::NoContactAddress));

        composer.select_recipient(recipient("3", "Carla", Some("sem número")));
        assert_eq!(composer.prepare_dispatch(), Err(DispatchError::NoContactAddress));

        composer.select_recipient(recipient("4", "Davi", Some("11 3333-4444")));
        assert_eq!(composer.prepare_dispatch().unwrap().address, "551133334444");
    }

    #[test]
    fn recipient_switch_discards_relational_binding() {
        let mut composer = composer();
        composer.select_template(template(BODY));
        maria(&mut composer);
        composer.choose_record("numero_processo", "c1");
        composer.choose_option("status_processo", "Concluído");

        let ticket = composer.select_recipient(recipient("2", "Bruno", Some("11 90000-0000")));
        assert_eq!(composer.value("numero_processo"), None);
        assert_eq!(composer.value("nome_cliente"), Some("Bruno"));
        assert_eq!(composer.value("status_processo"), Some("Concluído"));
        assert!(!composer.choose_record("numero_processo", "c1"));

        composer.resolve_fetch(&ticket, Ok(vec![record("c9", "123/2024")]));
        assert_eq!(composer.value("numero_processo"), None);
        assert!(composer.choose_record("numero_processo", "c9"));
        assert_eq!(composer.value("numero_processo"), Some("123/2024"));
    }

    #[test]
    fn stale_fetch_never_populates_newer_recipient() {
        let mut composer = composer();
        composer.select_template(template(BODY));
        let ana = composer.select_recipient(recipient("a", "Ana", Some("1")));
        let bruno = composer.select_recipient(recipient("b", "Bruno", Some("2")));

        let outcome = composer.resolve_fetch(&ana, Ok(vec![record("a1", "A-1")]));
        assert!(matches!(outcome, FetchOutcome::Stale));
        assert!(composer.candidates().is_empty());
        assert!(!composer.choose_record("numero_processo", "a1"));

        composer.resolve_fetch(&bruno, Ok(vec![record("b1", "B-1")]));
        assert_eq!(composer.candidates()[0].label, "B-1");
    }

    #[test]
    fn empty_relation_is_a_valid_state() {
        let mut composer = composer();
        composer.select_template(template(BODY));
        let ticket = composer.select_recipient(recipient("a", "Ana", Some("1")));
        let outcome = composer.resolve_fetch(&ticket, Ok(Vec::new()));
        assert!(matches!(outcome, FetchOutcome::Applied(0)));
        assert_eq!(composer.candidate_state(), &Candidates::Ready(Vec::new()));
    }

    #[test]
    fn failed_fetch_keeps_unrelated_bindings() {
        let mut composer = composer();
        composer.select_template(template("[assunto] [numero_processo]"));
        composer.set_text("assunto", "Aviso");
        let ticket = composer.select_recipient(recipient("a", "Ana", Some("1")));
        let failure = Err(SourceError::Worker("timeout".to_string()));
        let outcome = composer.resolve_fetch(&ticket, failure);
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert_eq!(composer.value("assunto"), Some("Aviso"));
        assert!(composer.candidates().is_empty());
    }

    #[test]
    fn template_change_clears_and_reseeds() {
        let mut composer = composer();
        composer.select_template(template("[assunto] para [nome_cliente]"));
        maria(&mut composer);
        composer.set_text("assunto", "Lembrete");

        composer.select_template(template("Oi [nome_cliente], [assunto]"));
        assert_eq!(composer.value("assunto"), None);
        assert_eq!(composer.value("nome_cliente"), Some("Maria"));
        assert!(!composer.set_text("numero_processo", "x"));
    }

    #[test]
    fn template_change_refetches_records_of_current_recipient() {
        let mut composer = composer();
        assert!(composer.select_template(template(BODY)).is_none());
        let before = composer.select_recipient(recipient("1", "Maria", Some("11 91234-5678")));
        composer.resolve_fetch(&before, Ok(vec![record("c1", "OLD")]));
        composer.choose_record("numero_processo", "c1");

        let ticket = composer
            .select_template(template("Processo [numero_processo] de [nome_cliente]"))
            .expect("recipient selected");
        assert_eq!(ticket.recipient_id, "1");
        assert_eq!(composer.candidate_state(), &Candidates::Loading);
        assert!(!composer.choose_record("numero_processo", "c1"));
        assert_eq!(composer.value("nome_cliente"), Some("Maria"));

        let outcome = composer.resolve_fetch(&before, Ok(vec![record("c1", "OLD")]));
        assert!(matches!(outcome, FetchOutcome::Stale));
        assert!(composer.candidates().is_empty());

        composer.resolve_fetch(&ticket, Ok(vec![record("c2", "NEW")]));
        assert!(composer.choose_record("numero_processo", "c2"));
        assert_eq!(composer.value("numero_processo"), Some("NEW"));
    }

    #[test]
    fn dates_are_bound_as_formatted_text() {
        let mut composer = composer();
        composer.select_template(template("Audiência em [data_audiencia]."));
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(composer.choose_date("data_audiencia", date));
        assert_eq!(composer.preview(), "Audiência em 05/03/2024.");
        assert_eq!(composer.bound_date("data_audiencia"), Some(date));
    }

    #[test]
    fn bound_dates_step_from_the_stored_day() {
        let mut composer = composer();
        composer.select_template(template("[data_audiencia]"));
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        composer.choose_date("data_audiencia", date);
        let next = composer.bound_date("data_audiencia").unwrap() + chrono::Duration::days(1);
        composer.choose_date("data_audiencia", next);
        assert_eq!(composer.value("data_audiencia"), Some("01/01/2025"));
    }

    #[test]
    fn typed_helpers_reject_wrong_kinds() {
        let mut composer = composer();
        composer.select_template(template(BODY));
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(!composer.choose_date("status_processo", date));
        assert!(!composer.choose_option("status_processo", "Inventado"));
        assert!(!composer.choose_option("nome_cliente", "Em Andamento"));
        assert_eq!(composer.value("status_processo"), None);
    }

    #[test]
    fn clearing_a_value_reopens_the_marker() {
        let mut composer = composer();
        composer.select_template(template("[assunto]"));
        composer.set_text("assunto", "x");
        composer.clear_value("assunto");
        assert_eq!(composer.preview(), "[assunto]");
        assert_eq!(composer.missing(), vec!["assunto"]);
    }

    #[test]
    fn reset_drops_everything() {
        let mut composer = composer();
        composer.select_template(template(BODY));
        maria(&mut composer);
        composer.reset();
        assert!(composer.template().is_none());
        assert!(composer.recipient().is_none());
        assert!(composer.slots().is_empty());
        assert_eq!(composer.preview(), "");
    }
}
