//! HTML to wiki markup
//!
//! A small walker over scraper's node tree that keeps text, line breaks,
//! emphasis and links, and renders links as wikilinks when they point at
//! another page of the same source.

use crate::import::ImportError;
use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Node, Selector};

/// Parse a CSS selector
pub(crate) fn selector(css: &str) -> Result<Selector, ImportError> {
    Selector::parse(css).map_err(|e| ImportError::Parse(format!("invalid selector {:?}: {}", css, e)))
}

/// Drop replacement characters left behind by lossy decoding
pub fn clean_text(text: &str) -> String {
    text.chars().filter(|&c| c != char::REPLACEMENT_CHARACTER).collect()
}

/// Text content of an element, cleaned
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Renders HTML fragments as wiki markup
#[derive(Debug, Clone, Copy)]
pub struct MarkupWriter {
    is_internal: fn(&str) -> bool,
}

impl MarkupWriter {
    /// `is_internal` decides which hrefs become `[[wikilinks]]`
    pub fn new(is_internal: fn(&str) -> bool) -> Self {
        Self { is_internal }
    }

    /// Render the children of `element`
    pub fn children(&self, element: ElementRef<'_>) -> String {
        let mut out = String::new();
        for child in element.children() {
            self.write_node(&mut out, child);
        }
        out
    }

    /// Render the children of `element`, leaving out the node `skip`
    pub fn children_except(&self, element: ElementRef<'_>, skip: NodeId) -> String {
        let mut out = String::new();
        for child in element.children().filter(|c| c.id() != skip) {
            self.write_node(&mut out, child);
        }
        out
    }

    fn write_children(&self, out: &mut String, node: NodeRef<'_, Node>) {
        for child in node.children() {
            self.write_node(out, child);
        }
    }

    fn write_node(&self, out: &mut String, node: NodeRef<'_, Node>) {
        match node.value() {
            Node::Text(text) => out.push_str(&clean_text(text)),
            Node::Element(element) => match element.name() {
                "br" => out.push('\n'),
                "b" | "strong" => {
                    out.push_str("**");
                    self.write_children(out, node);
                    out.push_str("**");
                }
                "i" | "em" => {
                    out.push('_');
                    self.write_children(out, node);
                    out.push('_');
                }
                "a" => {
                    let text = ElementRef::wrap(node).map(element_text).unwrap_or_default();
                    match element.attr("href") {
                        Some(href) if (self.is_internal)(href) => {
                            out.push_str("[[");
                            out.push_str(text.trim());
                            out.push_str("]]");
                        }
                        Some(href) => {
                            out.push('[');
                            out.push_str(&text);
                            out.push_str("](");
                            out.push_str(href);
                            out.push(')');
                        }
                        None => out.push_str(&text),
                    }
                }
                "script" | "style" | "noscript" => {}
                // span, p, div and anything else: keep the content
                _ => self.write_children(out, node),
            },
            _ => {}
        }
    }
}
