use std::fmt::Write;

use quick_xml::escape::{escape, partial_escape};

use super::{Document, NodeId, NodeKind};

/// Elements which never have content or an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text is written as is
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

impl Document {
    /// Serializes `id` and its descendants as HTML
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, false, &mut out);
        out
    }

    /// Serializes the children of `id` as HTML
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .name(id)
            .map_or(false, |name| is_one_of(name, RAW_TEXT_ELEMENTS));
        for &child in self.children(id) {
            self.write_node(child, raw, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match self.kind(id) {
            NodeKind::Document => {
                for &child in self.children(id) {
                    self.write_node(child, false, out);
                }
            }
            NodeKind::Text(text) if raw_text => out.push_str(text),
            NodeKind::Text(text) => out.push_str(&partial_escape(text.as_str())),
            NodeKind::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeKind::Element { name, attributes } => {
                out.push('<');
                out.push_str(name);
                for attribute in attributes {
                    let _ = write!(
                        out,
                        " {}=\"{}\"",
                        attribute.name,
                        escape(attribute.value.as_str())
                    );
                }
                out.push('>');

                if is_one_of(name, VOID_ELEMENTS) {
                    return;
                }

                let raw = is_one_of(name, RAW_TEXT_ELEMENTS);
                for &child in self.children(id) {
                    self.write_node(child, raw, out);
                }
                let _ = write!(out, "</{name}>");
            }
        }
    }
}

fn is_one_of(name: &str, names: &[&str]) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}
