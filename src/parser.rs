use crate::bindings::Bindings;
use crate::models::{Template, Token, TreeItem};

const DEFAULT_SUFFIX: &str = "(padrão)";

pub(crate) fn parse_templates(content: &str) -> Vec<Template> {
    let mut templates = Vec::new();
    let mut current_title: Option<String> = None;
    let mut body = String::new();

    for line in content.lines() {
        if let Some(title) = parse_heading(line) {
            if let Some(prev) = current_title.take() {
                templates.push(make_template(templates.len(), &prev, &body));
                body.clear();
            }
            current_title = Some(title);
        } else if current_title.is_some() {
            body.push_str(line);
            body.push('\n');
        }
    }

    if let Some(title) = current_title {
        templates.push(make_template(templates.len(), &title, &body));
    }
    templates
}

fn make_template(id: usize, heading: &str, body: &str) -> Template {
    let (title, is_default) = match heading.strip_suffix(DEFAULT_SUFFIX) {
        Some(rest) if !rest.trim().is_empty() => (rest.trim().to_string(), true),
        _ => (heading.to_string(), false),
    };
    Template {
        id,
        title,
        body: trim_trailing_newline(body).to_string(),
        is_default,
    }
}

fn parse_heading(line: &str) -> Option<String> {
    let rest = line.strip_prefix("##")?;
    if !(rest.starts_with(' ') || rest.starts_with('\t')) {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

fn trim_trailing_newline(input: &str) -> &str {
    let trimmed = input.strip_suffix('\n').unwrap_or(input);
    trimmed.strip_suffix('\r').unwrap_or(trimmed)
}

pub(crate) fn build_tree_items(templates: &[Template]) -> Vec<TreeItem> {
    let mut root = TreeNode::new("");
    for (index, template) in templates.iter().enumerate() {
        let parts: Vec<&str> = template
            .title
            .split('/')
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect();
        root.insert(&parts, index);
    }

    let mut items = Vec::new();
    root.flatten(0, &mut items);
    items
}

#[derive(Clone, Debug)]
struct TreeNode {
    name: String,
    template_index: Option<usize>,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            template_index: None,
            children: Vec::new(),
        }
    }

    fn insert(&mut self, parts: &[&str], template_index: usize) {
        if parts.is_empty() {
            self.template_index = Some(template_index);
            return;
        }
        let part = parts[0];
        let child = self.children.iter_mut().find(|child| child.name == part);
        match child {
            Some(node) => node.insert(&parts[1..], template_index),
            None => {
                let mut node = TreeNode::new(part);
                node.insert(&parts[1..], template_index);
                self.children.push(node);
            }
        }
    }

    fn flatten(&self, depth: usize, items: &mut Vec<TreeItem>) {
        for child in &self.children {
            items.push(TreeItem {
                label: child.name.clone(),
                depth,
                template_index: child.template_index,
            });
            child.flatten(depth + 1, items);
        }
    }
}

/// Splits a template body into literal text and `[name]` markers.
///
/// Bracket pairs whose content is not a valid placeholder name stay literal.
pub(crate) fn parse_tokens(body: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut index = 0;
    while let Some(start) = body[index..].find('[') {
        let start_idx = index + start;
        text.push_str(&body[index..start_idx]);
        let after = &body[start_idx + 1..];
        let marker = after
            .find(']')
            .map(|end_rel| &after[..end_rel])
            .filter(|inner| is_placeholder_name(inner));
        match marker {
            Some(name) => {
                if !text.is_empty() {
                    tokens.push(Token::Text(std::mem::take(&mut text)));
                }
                let end_idx = start_idx + 1 + name.len();
                tokens.push(Token::Marker {
                    name: name.to_string(),
                    raw: body[start_idx..=end_idx].to_string(),
                });
                index = end_idx + 1;
            }
            None => {
                text.push('[');
                index = start_idx + 1;
            }
        }
    }
    text.push_str(&body[index..]);
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    tokens
}

fn is_placeholder_name(inner: &str) -> bool {
    !inner.is_empty()
        && inner
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

/// Distinct marker names in order of first occurrence.
pub(crate) fn placeholder_names(tokens: &[Token]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in tokens {
        if let Token::Marker { name, .. } = token {
            if names.iter().any(|known| known == name) {
                continue;
            }
            names.push(name.clone());
        }
    }
    names
}

pub(crate) fn render_template(tokens: &[Token], bindings: &impl Bindings) -> String {
    let mut output = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => output.push_str(text),
            Token::Marker { name, raw } => match bound(bindings, name) {
                Some(value) => output.push_str(value),
                None => output.push_str(raw),
            },
        }
    }
    output
}

pub(crate) fn missing_placeholders(tokens: &[Token], bindings: &impl Bindings) -> Vec<String> {
    placeholder_names(tokens)
        .into_iter()
        .filter(|name| bound(bindings, name).is_none())
        .collect()
}

pub(crate) fn is_complete(tokens: &[Token], bindings: &impl Bindings) -> bool {
    tokens.iter().all(|token| match token {
        Token::Text(_) => true,
        Token::Marker { name, .. } => bound(bindings, name).is_some(),
    })
}

fn bound<'a>(bindings: &'a impl Bindings, name: &str) -> Option<&'a str> {
    bindings.value(name).filter(|value| !value.is_empty())
}
