//! A minimal element tree for markup import/export.
//!
//! This is not an HTML parser. It covers the subset the registry emits and
//! the simple fragments hosts hand back (well-formed tags, quoted attributes,
//! the usual entities).

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Element(MarkupElement),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Markup>,
}

const VOID_TAGS: [&str; 4] = ["img", "hr", "br", "input"];

impl MarkupElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, child: Markup) -> Self {
        self.children.push(child);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Markup::Text(text.into()));
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.get_attr(name).is_some()
    }

    pub fn is_void(&self) -> bool {
        VOID_TAGS.contains(&self.tag.as_str())
    }

    /// Concatenated text of every descendant.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

impl From<MarkupElement> for Markup {
    fn from(element: MarkupElement) -> Self {
        Markup::Element(element)
    }
}

fn collect_text(nodes: &[Markup], out: &mut String) {
    for node in nodes {
        match node {
            Markup::Text(text) => out.push_str(text),
            Markup::Element(element) => collect_text(&element.children, out),
        }
    }
}

pub fn render(nodes: &[Markup]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Markup, out: &mut String) {
    match node {
        Markup::Text(text) => out.push_str(&escape_text(text)),
        Markup::Element(element) => write_element(element, out),
    }
}

fn write_element(element: &MarkupElement, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.attrs {
        if value.is_empty() && is_boolean_attr(name) {
            let _ = write!(out, " {name}");
        } else {
            let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
        }
    }
    out.push('>');
    if element.is_void() {
        return;
    }
    for child in &element.children {
        write_node(child, out);
    }
    let _ = write!(out, "</{}>", element.tag);
}

fn is_boolean_attr(name: &str) -> bool {
    matches!(name, "open" | "checked" | "disabled" | "allowfullscreen")
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Parses a markup fragment into a forest. Unclosed elements are closed at
/// the end of input and stray closing tags are ignored.
pub fn parse(input: &str) -> Vec<Markup> {
    let mut stack: Vec<MarkupElement> = vec![MarkupElement::new("#fragment")];
    let mut rest = input;

    while !rest.is_empty() {
        let Some(open) = rest.find('<') else {
            push_text(&mut stack, rest);
            break;
        };
        if open > 0 {
            push_text(&mut stack, &rest[..open]);
        }
        rest = &rest[open..];

        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map(|end| &after[end + 3..]).unwrap_or("");
            continue;
        }
        let Some(close) = rest.find('>') else {
            push_text(&mut stack, rest);
            break;
        };
        let inner = &rest[1..close];
        rest = &rest[close + 1..];

        if let Some(name) = inner.strip_prefix('/') {
            let name = name.trim().to_ascii_lowercase();
            if let Some(depth) = stack.iter().rposition(|el| el.tag == name)
                && depth > 0
            {
                while stack.len() > depth {
                    close_top(&mut stack);
                }
            }
            continue;
        }

        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');
        let Some(element) = parse_open_tag(inner) else {
            push_text(&mut stack, &format!("<{inner}>"));
            continue;
        };
        if self_closing || element.is_void() {
            if let Some(top) = stack.last_mut() {
                top.children.push(Markup::Element(element));
            }
        } else {
            stack.push(element);
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn push_text(stack: &mut [MarkupElement], text: &str) {
    if let Some(top) = stack.last_mut() {
        top.children.push(Markup::Text(unescape(text)));
    }
}

fn close_top(stack: &mut Vec<MarkupElement>) {
    if let Some(element) = stack.pop()
        && let Some(parent) = stack.last_mut()
    {
        parent.children.push(Markup::Element(element));
    }
}

fn parse_open_tag(inner: &str) -> Option<MarkupElement> {
    let inner = inner.trim();
    let name_end = inner
        .find(|ch: char| ch.is_whitespace())
        .unwrap_or(inner.len());
    let name = &inner[..name_end];
    if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-') {
        return None;
    }
    let mut element = MarkupElement::new(name.to_ascii_lowercase());
    let mut rest = inner[name_end..].trim_start();
    while !rest.is_empty() {
        let key_end = rest
            .find(|ch: char| ch == '=' || ch.is_whitespace())
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_ascii_lowercase();
        rest = rest[key_end..].trim_start();
        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (value, remaining) = match after_eq.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    let end = body.find(quote).unwrap_or(body.len());
                    (&body[..end], body.get(end + 1..).unwrap_or(""))
                }
                _ => {
                    let end = after_eq
                        .find(char::is_whitespace)
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            rest = remaining.trim_start();
            unescape(value)
        } else {
            String::new()
        };
        if !key.is_empty() {
            element.attrs.push((key, value));
        }
    }
    Some(element)
}
