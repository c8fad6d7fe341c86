//! Plain-text rendering of a structural tree.
//!
//! Produces the markdown-flavored text the suggestion pipeline diffs against:
//! `#` headings, `-`/`N.` list items, fenced code, `>` quotes, table cells
//! joined by ` | `. Marks are dropped; only text and block shape survive.

use yrs::{ReadTxn, XmlFragment, XmlOut};

use super::export::{read_element, text_run_string};
use crate::doc::BlockTag;

/// Render a fragment's children to plain text. Blocks are separated by blank
/// lines.
pub fn export_plain_text<T: ReadTxn, F: XmlFragment>(txn: &T, fragment: &F) -> String {
    let mut blocks = Vec::new();
    for i in 0..fragment.len(txn) {
        if let Some(node) = fragment.get(txn, i) {
            let rendered = render_node(txn, &node, 0);
            if !rendered.is_empty() {
                blocks.push(rendered);
            }
        }
    }
    blocks.join("\n\n")
}

fn render_node<T: ReadTxn>(txn: &T, node: &XmlOut, depth: usize) -> String {
    let element = match node {
        XmlOut::Element(element) => element,
        XmlOut::Text(text) => return text_run_string(txn, text),
        XmlOut::Fragment(_) => return String::new(),
    };
    let (tag, attrs) = read_element(txn, element);

    match tag {
        BlockTag::Paragraph => inline_text(txn, element),
        BlockTag::Heading(level) => {
            format!("{} {}", "#".repeat(level as usize), inline_text(txn, element))
        }
        BlockTag::CodeBlock => format!("```\n{}\n```", inline_text(txn, element)),
        BlockTag::BulletList => render_list(txn, element, depth, None),
        BlockTag::OrderedList => render_list(txn, element, depth, Some(1)),
        BlockTag::ListItem => children_text(txn, element, depth),
        BlockTag::Blockquote => prefix_lines(&children_text(txn, element, depth), "> "),
        BlockTag::Table => children_text(txn, element, depth),
        BlockTag::TableRow => {
            let mut cells = Vec::new();
            for i in 0..element.len(txn) {
                if let Some(child) = element.get(txn, i) {
                    cells.push(render_node(txn, &child, depth));
                }
            }
            cells.join(" | ")
        }
        BlockTag::TableHeader | BlockTag::TableCell => {
            children_text(txn, element, depth).replace('\n', " ")
        }
        BlockTag::Image => {
            let alt = attrs.get("alt").cloned().unwrap_or_default();
            let src = attrs.get("src").cloned().unwrap_or_default();
            format!("![{}]({})", alt, src)
        }
        BlockTag::HorizontalRule => "---".to_string(),
        BlockTag::HardBreak => String::new(),
        BlockTag::Other(_) => children_text(txn, element, depth),
    }
}

fn render_list<T: ReadTxn>(
    txn: &T,
    element: &yrs::XmlElementRef,
    depth: usize,
    ordered_from: Option<usize>,
) -> String {
    let indent = "  ".repeat(depth);
    let mut lines = Vec::new();
    let mut number = ordered_from;
    for i in 0..element.len(txn) {
        let Some(child) = element.get(txn, i) else {
            continue;
        };
        let body = render_node(txn, &child, depth + 1);
        let bullet = match &mut number {
            Some(n) => {
                let b = format!("{}. ", n);
                *n += 1;
                b
            }
            None => "- ".to_string(),
        };
        // First line gets the bullet, continuation lines align under it.
        let mut item_lines = body.lines();
        let first = item_lines.next().unwrap_or_default();
        lines.push(format!("{}{}{}", indent, bullet, first));
        for line in item_lines {
            lines.push(format!("{}{}{}", indent, " ".repeat(bullet.len()), line));
        }
    }
    lines.join("\n")
}

/// Text of all child blocks of an element, joined by newlines.
fn children_text<T: ReadTxn>(txn: &T, element: &yrs::XmlElementRef, depth: usize) -> String {
    let mut parts = Vec::new();
    for i in 0..element.len(txn) {
        if let Some(child) = element.get(txn, i) {
            let rendered = render_node(txn, &child, depth);
            if !rendered.is_empty() {
                parts.push(rendered);
            }
        }
    }
    parts.join("\n")
}

/// Concatenated text-run content directly under an element.
fn inline_text<T: ReadTxn>(txn: &T, element: &yrs::XmlElementRef) -> String {
    let mut out = String::new();
    for i in 0..element.len(txn) {
        match element.get(txn, i) {
            Some(XmlOut::Text(text)) => out.push_str(&text_run_string(txn, &text)),
            Some(XmlOut::Element(child)) => {
                // Nested element inside a leaf block; flatten its text.
                out.push_str(&inline_text(txn, &child));
            }
            _ => {}
        }
    }
    out
}

fn prefix_lines(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}
