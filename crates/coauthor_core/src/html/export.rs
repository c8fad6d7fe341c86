//! Markup exporter: serializes a structural tree back to markup.
//!
//! Pure and side-effect free. Right inverse of the importer for the supported
//! tag subset: tag structure and mark sets survive a round trip; attribute
//! order and insignificant whitespace are not guaranteed.

use indexmap::IndexMap;
use yrs::types::text::YChange;
use yrs::{Any, Out, ReadTxn, Text, Xml, XmlElementRef, XmlFragment, XmlOut, XmlTextRef};

use super::entities::escape_attr;
use crate::doc::{BlockKind, BlockTag, Mark, marks_from_attrs};

/// Serialize a fragment's children to a markup string.
pub fn export_fragment<T: ReadTxn, F: XmlFragment>(txn: &T, fragment: &F) -> String {
    let mut out = String::new();
    for i in 0..fragment.len(txn) {
        if let Some(node) = fragment.get(txn, i) {
            export_node(txn, &node, &mut out, false);
        }
    }
    out
}

fn export_node<T: ReadTxn>(txn: &T, node: &XmlOut, out: &mut String, in_code: bool) {
    match node {
        XmlOut::Element(element) => export_element(txn, element, out),
        XmlOut::Text(text) => export_text_run(txn, text, out, in_code),
        XmlOut::Fragment(fragment) => {
            for i in 0..fragment.len(txn) {
                if let Some(child) = fragment.get(txn, i) {
                    export_node(txn, &child, out, in_code);
                }
            }
        }
    }
}

fn export_element<T: ReadTxn>(txn: &T, element: &XmlElementRef, out: &mut String) {
    let (tag, attrs) = read_element(txn, element);
    let markup_tag = tag.markup_tag();

    out.push('<');
    out.push_str(&markup_tag);
    push_attrs(out, &tag, &attrs);

    if tag.kind() == BlockKind::Void {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let in_code = tag == BlockTag::CodeBlock;
    for i in 0..element.len(txn) {
        if let Some(child) = element.get(txn, i) {
            export_node(txn, &child, out, in_code);
        }
    }

    out.push_str("</");
    out.push_str(&markup_tag);
    out.push('>');
}

/// Walk a text run's format-run deltas in document order, wrapping each chunk
/// with its active marks, innermost mark last in rank order.
fn export_text_run<T: ReadTxn>(txn: &T, text: &XmlTextRef, out: &mut String, in_code: bool) {
    for delta in text.diff(txn, YChange::identity) {
        let chunk = match &delta.insert {
            Out::Any(Any::String(s)) => s.to_string(),
            _ => continue,
        };
        let marks = delta
            .attributes
            .as_ref()
            .map(|attrs| marks_from_attrs(attrs))
            .unwrap_or_default();

        for mark in &marks {
            out.push('<');
            out.push_str(mark.markup_tag());
            if let Mark::Link { href } = mark {
                out.push_str(" href=\"");
                out.push_str(&escape_attr(href));
                out.push('"');
            }
            out.push('>');
        }

        push_chunk(out, &chunk, in_code);

        for mark in marks.iter().rev() {
            out.push_str("</");
            out.push_str(mark.markup_tag());
            out.push('>');
        }
    }
}

fn push_chunk(out: &mut String, chunk: &str, in_code: bool) {
    for ch in chunk.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            // Hard breaks live as newlines in the run; code blocks keep them.
            '\n' if !in_code => out.push_str("<br/>"),
            _ => out.push(ch),
        }
    }
}

fn push_attrs(out: &mut String, tag: &BlockTag, attrs: &IndexMap<String, String>) {
    let internal = tag.internal_attrs();
    let mut keys: Vec<&String> = attrs
        .keys()
        .filter(|k| !internal.contains(&k.as_str()))
        .collect();
    keys.sort();
    for key in keys {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(&attrs[key]));
        out.push('"');
    }
}

/// Read an element's structural tag and attribute map.
pub(crate) fn read_element<T: ReadTxn>(
    txn: &T,
    element: &XmlElementRef,
) -> (BlockTag, IndexMap<String, String>) {
    let mut attrs = IndexMap::new();
    for (key, value) in element.attributes(txn) {
        attrs.insert(key.to_string(), value.to_string(txn));
    }
    let name = element
        .try_tag()
        .map(|tag| tag.to_string())
        .unwrap_or_default();
    (BlockTag::from_node_name(&name, &attrs), attrs)
}

/// Concatenated plain text of a run, format attributes ignored.
pub(crate) fn text_run_string<T: ReadTxn>(txn: &T, text: &XmlTextRef) -> String {
    let mut out = String::new();
    for delta in text.diff(txn, YChange::identity) {
        if let Out::Any(Any::String(s)) = &delta.insert {
            out.push_str(s);
        }
    }
    out
}
