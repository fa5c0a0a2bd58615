use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Instant;

use chrono::{Duration, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use log::{info, warn};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;

use crate::channel::{DispatchChannel, WhatsAppLink};
use crate::classifier::SlotClassifier;
use crate::config::{DEFAULT_SETTINGS, Settings};
use crate::context::{Candidates, FetchOutcome, FetchTicket};
use crate::engine::Composer;
use crate::error::{ConfigError, SourceError};
use crate::models::{Recipient, RelatedRecord, Slot, SlotKind, Template, TreeItem};
use crate::parser::build_tree_items;
use crate::sources::{
    DirectoryFile, MarkdownTemplateSource, RecipientSource, RelationalRecordSource, TemplateSource,
};
use crate::system::{
    DIRECTORY_FILE, SETTINGS_FILE, TEMPLATES_FILE, config_dir, ensure_data_files, init_logging,
    set_clipboard,
};

const DOUBLE_CLICK_MS: u128 = 400;

type FetchResult = (FetchTicket, Result<Vec<RelatedRecord>, SourceError>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum View {
    List,
    Recipients,
    Editor,
    Error,
}

#[derive(Clone, Debug)]
pub(crate) struct StatusMessage {
    pub(crate) text: String,
    pub(crate) since: Instant,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct EditorState {
    pub(crate) active_field: usize,
    pub(crate) field_scroll: usize,
    /// Blocking message shown over the editor until a key is pressed.
    pub(crate) alert: Option<String>,
}

/// Collaborators the app talks to.
pub(crate) struct Services {
    pub(crate) templates: Box<dyn TemplateSource>,
    pub(crate) recipients: Box<dyn RecipientSource>,
    pub(crate) records: Arc<dyn RelationalRecordSource>,
    pub(crate) channel: Box<dyn DispatchChannel>,
}

pub(crate) struct App {
    pub(crate) composer: Composer,
    pub(crate) templates: Vec<Template>,
    pub(crate) tree_items: Vec<TreeItem>,
    pub(crate) list_state: ListState,
    pub(crate) list_scroll: usize,
    pub(crate) recipients: Vec<Recipient>,
    pub(crate) recipient_state: ListState,
    pub(crate) recipient_scroll: usize,
    pub(crate) view: View,
    pub(crate) return_view: View,
    pub(crate) editor: Option<EditorState>,
    pub(crate) error_message: Option<String>,
    pub(crate) last_click: Option<(usize, Instant)>,
    pub(crate) tree_area: Rect,
    pub(crate) should_quit: bool,
    pub(crate) status: Option<StatusMessage>,
    services: Option<Services>,
    fetch_tx: Sender<FetchResult>,
    fetch_rx: Receiver<FetchResult>,
}

impl App {
    /// Reads settings and data files; configuration problems open the error view.
    pub(crate) fn load() -> Self {
        match open_workspace() {
            Ok((composer, services)) => {
                let mut app = Self::with_composer(composer, Some(services));
                app.reload_lists();
                app
            }
            Err(err) => {
                let settings = Settings::default();
                let composer = Composer::new(SlotClassifier::default(), &settings);
                let mut app = Self::with_composer(composer, None);
                app.view = View::Error;
                app.error_message = Some(err.to_string());
                app
            }
        }
    }

    pub(crate) fn with_composer(composer: Composer, services: Option<Services>) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::channel();
        Self {
            composer,
            templates: Vec::new(),
            tree_items: Vec::new(),
            list_state: ListState::default(),
            list_scroll: 0,
            recipients: Vec::new(),
            recipient_state: ListState::default(),
            recipient_scroll: 0,
            view: View::List,
            return_view: View::List,
            editor: None,
            error_message: None,
            last_click: None,
            tree_area: Rect::default(),
            should_quit: false,
            status: None,
            services,
            fetch_tx,
            fetch_rx,
        }
    }

    pub(crate) fn reload_lists(&mut self) {
        let services = match self.services.as_ref() {
            Some(services) => services,
            None => return,
        };
        let templates = services.templates.list_templates();
        let recipients = services.recipients.list_recipients();

        match templates {
            Ok(templates) => self.templates = templates,
            Err(err) => {
                warn!("template listing failed: {err}");
                self.templates.clear();
                self.set_status(&format!("modelos indisponíveis: {err}"));
            }
        }
        self.tree_items = build_tree_items(&self.templates);
        self.list_state = ListState::default();
        if !self.tree_items.is_empty() {
            self.list_state.select(Some(0));
        }
        self.list_scroll = 0;

        match recipients {
            Ok(recipients) => self.recipients = recipients,
            Err(err) => {
                warn!("recipient listing failed: {err}");
                self.recipients.clear();
                self.set_status(&format!("clientes indisponíveis: {err}"));
            }
        }
        self.recipient_state = ListState::default();
        if !self.recipients.is_empty() {
            self.recipient_state.select(Some(0));
        }
        self.recipient_scroll = 0;
    }

    /// Applies finished record fetches. Called once per tick of the event loop.
    pub(crate) fn poll_fetches(&mut self) {
        while let Ok((ticket, result)) = self.fetch_rx.try_recv() {
            self.apply_fetch(&ticket, result);
        }
    }

    fn apply_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<RelatedRecord>, SourceError>,
    ) {
        if let FetchOutcome::Failed(err) = self.composer.resolve_fetch(ticket, result) {
            self.set_status(&format!("processos indisponíveis: {err}"));
        }
    }

    pub(crate) fn on_key(&mut self, key: KeyEvent) {
        match self.view {
            View::List => self.on_key_list(key),
            View::Recipients => self.on_key_recipients(key),
            View::Editor => self.on_key_editor(key),
            View::Error => self.on_key_error(key),
        }
    }

    pub(crate) fn on_mouse(&mut self, mouse: MouseEvent) {
        match self.view {
            View::List => self.on_mouse_list(mouse),
            View::Recipients | View::Editor | View::Error => {}
        }
    }

    fn on_key_error(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }

    fn on_key_list(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.move_list(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_list(-1),
            KeyCode::Enter => self.open_selected_template(),
            KeyCode::Char('c') => self.open_recipients(),
            KeyCode::Char('r') => {
                self.set_status("listas recarregadas");
                self.reload_lists();
            }
            KeyCode::Char('n') => {
                self.composer.reset();
                self.editor = None;
                self.set_status("novo atendimento");
            }
            _ => {}
        }
    }

    fn on_key_recipients(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.view = self.return_view,
            KeyCode::Down | KeyCode::Char('j') => {
                move_selection(&mut self.recipient_state, self.recipients.len(), 1)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                move_selection(&mut self.recipient_state, self.recipients.len(), -1)
            }
            KeyCode::Enter => self.pick_selected_recipient(),
            _ => {}
        }
    }

    fn on_mouse_list(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        if let Some(index) = self.index_from_mouse(mouse) {
            self.list_state.select(Some(index));
            let now = Instant::now();
            if let Some((last_index, last_time)) = self.last_click {
                if last_index == index && last_time.elapsed().as_millis() <= DOUBLE_CLICK_MS {
                    self.open_selected_template();
                }
            }
            self.last_click = Some((index, now));
        }
    }

    fn on_key_editor(&mut self, key: KeyEvent) {
        let editor = match self.editor.as_mut() {
            Some(editor) => editor,
            None => return,
        };
        if editor.alert.take().is_some() {
            return;
        }
        let field_count = self.composer.slots().len();

        match key.code {
            KeyCode::Esc => self.view = View::List,
            KeyCode::Tab | KeyCode::Down => editor.next_field(field_count),
            KeyCode::Up => editor.prev_field(field_count),
            KeyCode::F(2) => self.open_recipients(),
            KeyCode::Left => self.step_active(-1),
            KeyCode::Right => self.step_active(1),
            KeyCode::Backspace => self.backspace_active(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.copy_rendered();
            }
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.dispatch();
            }
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.type_active(ch)
            }
            _ => {}
        }
    }

    fn move_list(&mut self, delta: isize) {
        move_selection(&mut self.list_state, self.tree_items.len(), delta);
    }

    fn open_selected_template(&mut self) {
        let index = match self.list_state.selected() {
            Some(index) => index,
            None => return,
        };
        let template_index = match self.tree_items.get(index).and_then(|item| item.template_index) {
            Some(template_index) => template_index,
            None => return,
        };
        let template = match self.templates.get(template_index) {
            Some(template) => template.clone(),
            None => return,
        };
        if let Some(ticket) = self.composer.select_template(template) {
            self.spawn_fetch(ticket);
        }
        self.editor = Some(EditorState::default());
        self.view = View::Editor;
    }

    fn open_recipients(&mut self) {
        if self.view != View::Recipients {
            self.return_view = self.view;
        }
        self.view = View::Recipients;
    }

    fn pick_selected_recipient(&mut self) {
        let recipient = match self
            .recipient_state
            .selected()
            .and_then(|index| self.recipients.get(index))
        {
            Some(recipient) => recipient.clone(),
            None => return,
        };
        let name = recipient.display_name.clone();
        let ticket = self.composer.select_recipient(recipient);
        self.spawn_fetch(ticket);
        self.set_status(&format!("cliente: {name}"));
        self.view = self.return_view;
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket) {
        let source = match self.services.as_ref() {
            Some(services) => Arc::clone(&services.records),
            None => return,
        };
        let tx = self.fetch_tx.clone();
        let worker_ticket = ticket.clone();
        info!("fetching records for `{}`", ticket.recipient_id);
        let spawned = thread::Builder::new()
            .name("records".to_string())
            .spawn(move || {
                let result = source.list_related_records(&worker_ticket.recipient_id);
                let _ = tx.send((worker_ticket, result));
            });
        if let Err(err) = spawned {
            self.apply_fetch(&ticket, Err(SourceError::Worker(err.to_string())));
        }
    }

    fn active_slot(&self) -> Option<Slot> {
        let editor = self.editor.as_ref()?;
        self.composer.slots().get(editor.active_field).cloned()
    }

    fn step_active(&mut self, delta: isize) {
        let slot = match self.active_slot() {
            Some(slot) => slot,
            None => return,
        };
        match &slot.kind {
            SlotKind::EnumeratedSelect { options } => {
                let current = slot
                    .bound_value()
                    .and_then(|value| options.iter().position(|option| option == value));
                if let Some(index) = cycle(options.len(), current, delta) {
                    self.composer.choose_option(&slot.name, &options[index]);
                }
            }
            SlotKind::RelationalSelect { relation } => {
                let candidates = self.composer.candidates();
                let current = slot.bound_value().and_then(|value| {
                    candidates.iter().position(|record| record.label == value)
                });
                match cycle(candidates.len(), current, delta) {
                    Some(index) => {
                        let id = candidates[index].id.clone();
                        self.composer.choose_record(&slot.name, &id);
                    }
                    None => {
                        let message = match self.composer.candidate_state() {
                            Candidates::Loading => format!("{relation}: carregando"),
                            Candidates::Idle => "selecione um cliente (F2)".to_string(),
                            _ => format!("{relation}: sem registros"),
                        };
                        self.set_status(&message);
                    }
                }
            }
            SlotKind::Date => {
                let today = Local::now().date_naive();
                let date = match self.composer.bound_date(&slot.name) {
                    Some(date) => date + Duration::days(delta as i64),
                    None => today,
                };
                self.composer.choose_date(&slot.name, date);
            }
            SlotKind::FreeText => {}
        }
    }

    fn type_active(&mut self, ch: char) {
        let slot = match self.active_slot() {
            Some(slot) => slot,
            None => return,
        };
        match slot.kind {
            SlotKind::FreeText => {
                let mut value = slot.value.unwrap_or_default();
                value.push(ch);
                self.composer.set_text(&slot.name, &value);
            }
            SlotKind::Date if ch == 't' => {
                self.composer.choose_date(&slot.name, Local::now().date_naive());
            }
            _ => {}
        }
    }

    fn backspace_active(&mut self) {
        let slot = match self.active_slot() {
            Some(slot) => slot,
            None => return,
        };
        match slot.kind {
            SlotKind::FreeText => {
                let mut value = slot.value.unwrap_or_default();
                value.pop();
                self.composer.set_text(&slot.name, &value);
            }
            _ => self.composer.clear_value(&slot.name),
        }
    }

    fn copy_rendered(&mut self) {
        let rendered = self.composer.preview();
        match set_clipboard(&rendered) {
            Ok(_) => self.set_status("copiado"),
            Err(err) => self.set_status(&err),
        }
    }

    fn dispatch(&mut self) {
        let result = self.composer.prepare_dispatch().and_then(|dispatch| {
            match self.services.as_ref() {
                Some(services) => services
                    .channel
                    .dispatch(&dispatch.address, &dispatch.message),
                None => Ok(()),
            }
        });
        match result {
            Ok(()) => self.set_status("mensagem enviada ao WhatsApp"),
            Err(err) => {
                warn!("dispatch refused: {err}");
                if let Some(editor) = self.editor.as_mut() {
                    editor.alert = Some(err.to_string());
                }
            }
        }
    }

    pub(crate) fn set_status(&mut self, text: &str) {
        self.status = Some(StatusMessage {
            text: text.to_string(),
            since: Instant::now(),
        });
    }

    fn index_from_mouse(&self, mouse: MouseEvent) -> Option<usize> {
        let area = self.tree_area;
        if area.width == 0 || area.height == 0 {
            return None;
        }
        if mouse.column < area.x
            || mouse.column >= area.x + area.width
            || mouse.row < area.y
            || mouse.row >= area.y + area.height
        {
            return None;
        }
        let row_offset = (mouse.row - area.y) as usize;
        let index = self.list_scroll + row_offset;
        if index >= self.tree_items.len() {
            return None;
        }
        Some(index)
    }
}

impl EditorState {
    fn next_field(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.active_field = (self.active_field + 1) % count;
    }

    fn prev_field(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        if self.active_field == 0 {
            self.active_field = count - 1;
        } else {
            self.active_field -= 1;
        }
    }
}

fn open_workspace() -> Result<(Composer, Services), ConfigError> {
    let dir = config_dir()?;
    ensure_data_files(&dir, DEFAULT_SETTINGS)?;
    let settings = Settings::load_from_path(&dir.join(SETTINGS_FILE))?;
    init_logging(&dir, &settings.log_level)?;
    info!("data directory {}", dir.display());

    let classifier = settings.build_classifier()?;
    let directory = DirectoryFile::new(dir.join(DIRECTORY_FILE));
    let services = Services {
        templates: Box::new(MarkdownTemplateSource::new(dir.join(TEMPLATES_FILE))),
        recipients: Box::new(directory.clone()),
        records: Arc::new(directory),
        channel: Box::new(WhatsAppLink::new(&settings.link_base)),
    };
    Ok((Composer::new(classifier, &settings), services))
}

fn move_selection(state: &mut ListState, len: usize, delta: isize) {
    if len == 0 {
        return;
    }
    let current = state.selected().unwrap_or(0) as isize;
    let next = (current + delta).clamp(0, (len - 1) as isize) as usize;
    state.select(Some(next));
}

/// Next index when cycling through `len` choices; the first step from nothing
/// lands on the first (forward) or last (backward) entry.
fn cycle(len: usize, current: Option<usize>, delta: isize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let next = match current {
        Some(index) => (index as isize + delta).rem_euclid(len),
        None if delta >= 0 => 0,
        None => len - 1,
    };
    Some(next as usize)
}
