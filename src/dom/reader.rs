use std::borrow::Cow;

use quick_xml::{
    escape::{resolve_html5_entity, unescape_with},
    events::{BytesStart, Event},
    Reader,
};

use super::{Attribute, Document, NodeId, NodeKind};
use crate::{error, Error};

impl Document {
    /// Parses a well-formed XML document
    ///
    /// Whitespace is kept. HTML named entities such as `&nbsp;` are understood
    /// in text and attribute values. Processing instructions and the document
    /// type declaration are dropped.
    pub fn parse(xml: &str) -> Result<Self, Error> {
        let mut doc = Document::new();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut open: Vec<NodeId> = vec![doc.root()];
        let current = |open: &[NodeId]| open.last().copied().unwrap_or(NodeId(0));

        loop {
            let at = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| error::document(format!("at byte {at}: {e}")))?;
            match event {
                Event::Start(e) => {
                    let element = element(&mut doc, &e)?;
                    doc.append_child(current(&open), element);
                    open.push(element);
                }
                Event::Empty(e) => {
                    let element = element(&mut doc, &e)?;
                    doc.append_child(current(&open), element);
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Text(e) => {
                    let text = unescape(&utf8(&e)?)?.into_owned();
                    append_text(&mut doc, current(&open), &text);
                }
                Event::CData(e) => {
                    let text = utf8(&e)?.into_owned();
                    append_text(&mut doc, current(&open), &text);
                }
                Event::GeneralRef(e) => {
                    let reference = format!("&{};", utf8(&e)?);
                    let text = unescape(&reference)?.into_owned();
                    append_text(&mut doc, current(&open), &text);
                }
                Event::Comment(e) => {
                    let comment = doc.create_comment(utf8(&e)?.into_owned());
                    doc.append_child(current(&open), comment);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if open.len() > 1 {
            return Err(error::document("unexpected end of document"));
        }
        Ok(doc)
    }
}

fn element(doc: &mut Document, start: &BytesStart<'_>) -> Result<NodeId, Error> {
    let name = utf8(start.name().as_ref())?.into_owned();
    let element = doc.create_element(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| error::document(e.to_string()))?;
        let name = utf8(attribute.key.as_ref())?.into_owned();
        let value = unescape(&utf8(&attribute.value)?)?.into_owned();
        if let NodeKind::Element { attributes, .. } = &mut doc.nodes[element.0].kind {
            attributes.push(Attribute { name, value });
        }
    }
    Ok(element)
}

/// Appends text to `parent`, merging it into a directly preceding text node
fn append_text(doc: &mut Document, parent: NodeId, text: &str) {
    if let Some(&last) = doc.children(parent).last() {
        if let NodeKind::Text(existing) = &mut doc.nodes[last.0].kind {
            existing.push_str(text);
            return;
        }
    }
    let node = doc.create_text(text);
    doc.append_child(parent, node);
}

fn utf8(bytes: &[u8]) -> Result<Cow<'_, str>, Error> {
    std::str::from_utf8(bytes)
        .map(Cow::Borrowed)
        .map_err(error::document)
}

fn unescape(raw: &str) -> Result<Cow<'_, str>, Error> {
    unescape_with(raw, resolve_html5_entity).map_err(|e| error::document(format!("{raw}: {e}")))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn elements_text_and_attributes() {
        let doc = Document::parse(
            r#"<?xml version="1.0"?>
<email><subject>Caf&#233; &amp; b&aelig;r</subject><html-body><IMG SRC="a.png?x=1&amp;y=2"/><!-- note --></html-body></email>"#,
        )
        .unwrap();

        let email = doc.document_element().unwrap();
        assert!(doc.is_element(email, "email"));

        let subject = doc.child_element(email, "subject").unwrap();
        assert_eq!(doc.text_content(subject), "Caf\u{e9} & b\u{e6}r");

        let body = doc.child_element(email, "html-body").unwrap();
        let img = doc.child_element(body, "img").unwrap();
        assert_eq!(doc.attribute(img, "src"), Some("a.png?x=1&y=2"));
        assert!(matches!(
            doc.kind(doc.children(body)[1]),
            NodeKind::Comment(c) if c == " note "
        ));
    }

    #[test]
    fn whitespace_and_cdata() {
        let doc = Document::parse("<p>  a <![CDATA[<b>]]> b  </p>").unwrap();
        let p = doc.document_element().unwrap();
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "  a <b> b  ");
    }

    #[test]
    fn malformed() {
        assert!(Document::parse("<a><b></a>").unwrap_err().is_document());
        assert!(Document::parse("<a>").unwrap_err().is_document());
    }
}
