use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::{App, EditorState, View};
use crate::classifier::describe;
use crate::context::Candidates;
use crate::engine::Composer;
use crate::models::{RecipientField, Slot, SlotKind, TreeItem};

const STATUS_DURATION_MS: u128 = 1500;
const ICON_FOLDER: &str = "";
const ICON_TEMPLATE: &str = "󰈙";
const SELECTED_MARKER: &str = " ";
const UNSELECTED_MARKER: &str = "  ";
const TREE_BRANCH: &str = "├─ ";
const TREE_LAST: &str = "└─ ";
const TREE_PIPE: &str = "│  ";
const TREE_EMPTY: &str = "   ";

pub(crate) fn render_app(frame: &mut Frame, app: &mut App) {
    match app.view {
        View::List => render_list(frame, app),
        View::Recipients => render_recipients(frame, app),
        View::Editor => render_editor(frame, app),
        View::Error => render_error(frame, app),
    }
}

fn render_error(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let message = app
        .error_message
        .clone()
        .unwrap_or_else(|| "erro desconhecido".to_string());
    let block = Block::bordered().title("Erro de configuração");
    let paragraph = Paragraph::new(format!("{message}\n\nq sair"))
        .block(block)
        .style(Style::new().fg(Color::Red))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_list(frame: &mut Frame, app: &mut App) {
    let (list_area, help_area) = split_help(frame.area());

    let title = match app.composer.recipient() {
        Some(recipient) => format!(
            "Modelos ({}) · cliente: {}",
            app.templates.len(),
            recipient.display_name
        ),
        None => format!("Modelos ({})", app.templates.len()),
    };
    let block = Block::bordered().title(title);
    let inner = inner_rect(list_area);
    app.tree_area = inner;

    let view_height = inner.height as usize;
    app.list_scroll = ensure_visible(
        app.list_scroll,
        app.list_state.selected().unwrap_or(0),
        app.tree_items.len(),
        view_height,
    );

    let start = app.list_scroll;
    let end = (start + view_height).min(app.tree_items.len());
    let tree_lines = build_tree_lines(&app.tree_items);
    let visible = &tree_lines[start..end];
    let selected = app.list_state.selected().unwrap_or(0);

    let items: Vec<ListItem> = visible
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let marker = if start + idx == selected {
                SELECTED_MARKER
            } else {
                UNSELECTED_MARKER
            };
            ListItem::new(format!("{marker}{line}"))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::new().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("");

    let mut state = visible_state(app.list_state.selected(), start, end);
    frame.render_stateful_widget(list, list_area, &mut state);

    render_help(
        frame,
        app,
        "↑↓/j k selecionar  Enter/duplo clique abrir  c cliente  r recarregar  n novo  q sair",
        help_area,
    );
}

fn render_recipients(frame: &mut Frame, app: &mut App) {
    let (list_area, help_area) = split_help(frame.area());
    let inner = inner_rect(list_area);
    let view_height = inner.height as usize;
    app.recipient_scroll = ensure_visible(
        app.recipient_scroll,
        app.recipient_state.selected().unwrap_or(0),
        app.recipients.len(),
        view_height,
    );

    let start = app.recipient_scroll;
    let end = (start + view_height).min(app.recipients.len());
    let current = app.composer.recipient().map(|recipient| recipient.id.as_str());
    let items: Vec<ListItem> = app.recipients[start..end]
        .iter()
        .map(|recipient| {
            let marker = if Some(recipient.id.as_str()) == current {
                "● "
            } else {
                "  "
            };
            let phone = recipient.contact_address.as_deref().unwrap_or("sem telefone");
            ListItem::new(format!("{marker}{}  ({phone})", recipient.display_name))
        })
        .collect();

    let list = List::new(items)
        .block(Block::bordered().title(format!("Clientes ({})", app.recipients.len())))
        .highlight_style(Style::new().bg(Color::Blue).fg(Color::White));
    let mut state = visible_state(app.recipient_state.selected(), start, end);
    frame.render_stateful_widget(list, list_area, &mut state);

    render_help(frame, app, "↑↓/j k selecionar  Enter escolher  Esc voltar", help_area);
}

fn render_editor(frame: &mut Frame, app: &mut App) {
    let title = app
        .composer
        .template()
        .map(|template| format!("Prévia: {}", template.title))
        .unwrap_or_else(|| "Prévia".to_string());

    let (content_area, status_area) = split_help(frame.area());
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(content_area);

    let form_area = horizontal[0];
    let preview_area = horizontal[1];

    let alert = match app.editor.as_mut() {
        Some(editor) => {
            render_fields(frame, &app.composer, editor, form_area);
            editor.alert.clone()
        }
        None => return,
    };
    render_preview(frame, &app.composer, &title, preview_area);

    render_help(
        frame,
        app,
        "Esc voltar  Tab/↑↓ campo  ←/→ escolher  F2 cliente  Ctrl+C copiar  Ctrl+S enviar",
        status_area,
    );

    if let Some(message) = alert {
        render_alert(frame, &message);
    }
}

fn render_fields(frame: &mut Frame, composer: &Composer, editor: &mut EditorState, area: Rect) {
    let title = match composer.recipient() {
        Some(recipient) => format!("Campos · {}", recipient.display_name),
        None => "Campos · sem cliente (F2)".to_string(),
    };
    let block = Block::bordered().title(title);
    let inner = inner_rect(area);
    frame.render_widget(block, area);

    let slots = composer.slots();
    if slots.is_empty() {
        let empty = Paragraph::new("Este modelo não tem campos.")
            .style(Style::new().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    let field_height: u16 = 3;
    let view_capacity = (inner.height / field_height) as usize;
    editor.field_scroll = ensure_visible(
        editor.field_scroll,
        editor.active_field,
        slots.len(),
        view_capacity,
    );

    let start = editor.field_scroll;
    let end = (start + view_capacity).min(slots.len());

    for (idx, slot) in slots[start..end].iter().enumerate() {
        let is_active = start + idx == editor.active_field;
        let border_style = if is_active {
            Style::new().fg(Color::Blue)
        } else if slot.bound_value().is_none() {
            Style::new().fg(Color::Yellow)
        } else {
            Style::new().fg(Color::DarkGray)
        };
        let field_area = Rect {
            x: inner.x,
            y: inner.y + (idx as u16) * field_height,
            width: inner.width,
            height: field_height,
        };
        let field_block = Block::bordered()
            .title(field_label(slot))
            .border_style(border_style);
        let paragraph = Paragraph::new(field_text(composer, slot, is_active))
            .block(field_block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, field_area);
    }
}

fn field_label(slot: &Slot) -> String {
    match (&slot.kind, slot.derived_from) {
        (_, Some(RecipientField::DisplayName)) => format!("{} (nome do cliente)", slot.name),
        (_, Some(RecipientField::ContactAddress)) => format!("{} (telefone)", slot.name),
        (SlotKind::FreeText, None) => slot.name.clone(),
        (kind, None) => format!("{} ({})", slot.name, describe(kind)),
    }
}

fn field_text(composer: &Composer, slot: &Slot, is_active: bool) -> String {
    let value = slot.bound_value();
    match &slot.kind {
        SlotKind::FreeText => {
            let mut text = value.unwrap_or_default().to_string();
            if is_active {
                text.push('|');
            }
            text
        }
        SlotKind::EnumeratedSelect { .. } => match value {
            Some(value) => format!("◀ {value} ▶"),
            None => "←/→ escolher".to_string(),
        },
        SlotKind::Date => match value {
            Some(value) => format!("◀ {value} ▶"),
            None => "←/→ ou t para hoje".to_string(),
        },
        SlotKind::RelationalSelect { relation } => match composer.candidate_state() {
            Candidates::Idle => "selecione um cliente (F2)".to_string(),
            Candidates::Loading => format!("carregando {relation}…"),
            Candidates::Failed(err) => format!("indisponível: {err}"),
            Candidates::Ready(records) if records.is_empty() => {
                format!("sem {relation} para este cliente")
            }
            Candidates::Ready(records) => match value {
                Some(value) => match records.iter().find(|record| record.label == value) {
                    Some(record) if !record.status_text.is_empty() => format!(
                        "◀ {value} · {} ({}) ▶",
                        record.subtitle, record.status_text
                    ),
                    Some(record) if !record.subtitle.is_empty() => {
                        format!("◀ {value} · {} ▶", record.subtitle)
                    }
                    _ => format!("◀ {value} ▶"),
                },
                None => format!("←/→ escolher ({} disponíveis)", records.len()),
            },
        },
    }
}

fn render_preview(frame: &mut Frame, composer: &Composer, title: &str, area: Rect) {
    let (title, color) = if composer.is_complete() {
        (format!("{title} · pronta"), Color::Green)
    } else {
        let missing = composer.missing().len();
        (format!("{title} · faltam {missing}"), Color::Yellow)
    };
    let paragraph = Paragraph::new(composer.preview())
        .block(
            Block::bordered()
                .title(title)
                .border_style(Style::new().fg(color)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_alert(frame: &mut Frame, message: &str) {
    let area = centered_rect(frame.area(), 60, 7);
    let paragraph = Paragraph::new(format!("{message}\n\nqualquer tecla para continuar"))
        .block(
            Block::bordered()
                .title("Envio recusado")
                .border_style(Style::new().fg(Color::Red)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, app: &App, keys: &str, area: Rect) {
    let mut help = keys.to_string();
    if let Some(message) = app
        .status
        .as_ref()
        .filter(|msg| msg.since.elapsed().as_millis() <= STATUS_DURATION_MS)
    {
        help.push_str("  |  ");
        help.push_str(&message.text);
    }
    let help = Paragraph::new(help).style(Style::new().fg(Color::DarkGray));
    frame.render_widget(help, area);
}

fn split_help(area: Rect) -> (Rect, Rect) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(1)])
        .split(area);
    (layout[0], layout[1])
}

fn visible_state(selected: Option<usize>, start: usize, end: usize) -> ListState {
    let mut state = ListState::default();
    if let Some(selected) = selected {
        if selected >= start && selected < end {
            state.select(Some(selected - start));
        }
    }
    state
}

fn centered_rect(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = area.width * percent_x / 100;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn inner_rect(area: Rect) -> Rect {
    let mut inner = area;
    if inner.width >= 2 {
        inner.x += 1;
        inner.width -= 2;
    }
    if inner.height >= 2 {
        inner.y += 1;
        inner.height -= 2;
    }
    inner
}

fn ensure_visible(current_scroll: usize, selected: usize, total: usize, view_height: usize) -> usize {
    if total == 0 || view_height == 0 {
        return 0;
    }
    let mut scroll = current_scroll.min(total.saturating_sub(1));
    if selected < scroll {
        scroll = selected;
    } else if selected >= scroll + view_height {
        scroll = selected + 1 - view_height;
    }
    scroll
}

fn build_tree_lines(items: &[TreeItem]) -> Vec<String> {
    let mut lines = Vec::with_capacity(items.len());
    let mut branches: Vec<bool> = Vec::new();
    for (index, item) in items.iter().enumerate() {
        branches.truncate(item.depth);
        let is_last = is_last_sibling(items, index);
        let icon = if has_children(items, index) || item.template_index.is_none() {
            ICON_FOLDER
        } else {
            ICON_TEMPLATE
        };

        let mut line = String::new();
        for has_next in &branches {
            line.push_str(if *has_next { TREE_PIPE } else { TREE_EMPTY });
        }
        line.push_str(if is_last { TREE_LAST } else { TREE_BRANCH });
        line.push_str(icon);
        line.push(' ');
        line.push_str(&item.label);
        lines.push(line);

        branches.push(!is_last);
    }
    lines
}

fn is_last_sibling(items: &[TreeItem], index: usize) -> bool {
    let depth = items[index].depth;
    for item in &items[index + 1..] {
        if item.depth <= depth {
            return item.depth < depth;
        }
    }
    true
}

fn has_children(items: &[TreeItem], index: usize) -> bool {
    match items.get(index + 1) {
        Some(next) => next.depth > items[index].depth,
        None => false,
    }
}
