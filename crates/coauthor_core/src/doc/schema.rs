//! The closed node/mark schema for the structural tree.
//!
//! Markup tags are classified into a fixed table of block tags and inline
//! marks. Inline tags (`strong`, `em`, `a`, ...) never materialize as element
//! nodes; they become [`Mark`]s on a text run. Unknown tags pass through as
//! [`BlockTag::Other`] so foreign markup degrades gracefully instead of
//! erroring.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use yrs::Any;
use yrs::types::Attrs;

/// Name of the element attribute carrying a heading's level.
pub const LEVEL_ATTR: &str = "level";

/// Block-level node tags the tree understands.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BlockTag {
    Paragraph,
    /// Heading with level 1..=6.
    Heading(u8),
    BulletList,
    OrderedList,
    ListItem,
    CodeBlock,
    Blockquote,
    Table,
    TableRow,
    TableHeader,
    TableCell,
    Image,
    HorizontalRule,
    HardBreak,
    /// Unknown tag, kept under its markup name.
    Other(String),
}

/// Structural role of a block tag, driving importer recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Holds exactly one text run (paragraph, heading, code block).
    Leaf,
    /// Holds block children only (lists, blockquote, table, rows).
    Container,
    /// Holds block children if any are present, otherwise its inline content
    /// is wrapped in an implicit paragraph (list item, table cells, unknown).
    Mixed,
    /// No children (image, rule, break).
    Void,
}

impl BlockTag {
    /// Structural tag name stored on the element node.
    pub fn node_name(&self) -> &str {
        match self {
            BlockTag::Paragraph => "paragraph",
            BlockTag::Heading(_) => "heading",
            BlockTag::BulletList => "bulletList",
            BlockTag::OrderedList => "orderedList",
            BlockTag::ListItem => "listItem",
            BlockTag::CodeBlock => "codeBlock",
            BlockTag::Blockquote => "blockquote",
            BlockTag::Table => "table",
            BlockTag::TableRow => "tableRow",
            BlockTag::TableHeader => "tableHeader",
            BlockTag::TableCell => "tableCell",
            BlockTag::Image => "image",
            BlockTag::HorizontalRule => "horizontalRule",
            BlockTag::HardBreak => "hardBreak",
            BlockTag::Other(name) => name,
        }
    }

    /// Rebuild a tag from a structural node name plus its attributes.
    pub fn from_node_name(name: &str, attrs: &IndexMap<String, String>) -> Self {
        match name {
            "paragraph" => BlockTag::Paragraph,
            "heading" => {
                let level = attrs
                    .get(LEVEL_ATTR)
                    .and_then(|v| v.parse::<u8>().ok())
                    .unwrap_or(1)
                    .clamp(1, 6);
                BlockTag::Heading(level)
            }
            "bulletList" => BlockTag::BulletList,
            "orderedList" => BlockTag::OrderedList,
            "listItem" => BlockTag::ListItem,
            "codeBlock" => BlockTag::CodeBlock,
            "blockquote" => BlockTag::Blockquote,
            "table" => BlockTag::Table,
            "tableRow" => BlockTag::TableRow,
            "tableHeader" => BlockTag::TableHeader,
            "tableCell" => BlockTag::TableCell,
            "image" => BlockTag::Image,
            "horizontalRule" => BlockTag::HorizontalRule,
            "hardBreak" => BlockTag::HardBreak,
            other => BlockTag::Other(other.to_string()),
        }
    }

    /// Markup tag this node renders back to.
    pub fn markup_tag(&self) -> String {
        match self {
            BlockTag::Paragraph => "p".to_string(),
            BlockTag::Heading(level) => format!("h{}", (*level).clamp(1, 6)),
            BlockTag::BulletList => "ul".to_string(),
            BlockTag::OrderedList => "ol".to_string(),
            BlockTag::ListItem => "li".to_string(),
            BlockTag::CodeBlock => "pre".to_string(),
            BlockTag::Blockquote => "blockquote".to_string(),
            BlockTag::Table => "table".to_string(),
            BlockTag::TableRow => "tr".to_string(),
            BlockTag::TableHeader => "th".to_string(),
            BlockTag::TableCell => "td".to_string(),
            BlockTag::Image => "img".to_string(),
            BlockTag::HorizontalRule => "hr".to_string(),
            BlockTag::HardBreak => "br".to_string(),
            BlockTag::Other(name) => name.clone(),
        }
    }

    /// Structural role of this tag.
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockTag::Paragraph | BlockTag::Heading(_) | BlockTag::CodeBlock => BlockKind::Leaf,
            BlockTag::BulletList
            | BlockTag::OrderedList
            | BlockTag::Blockquote
            | BlockTag::Table
            | BlockTag::TableRow => BlockKind::Container,
            BlockTag::ListItem | BlockTag::TableHeader | BlockTag::TableCell | BlockTag::Other(_) => {
                BlockKind::Mixed
            }
            BlockTag::Image | BlockTag::HorizontalRule | BlockTag::HardBreak => BlockKind::Void,
        }
    }

    /// Internal attributes excluded from re-rendered markup.
    pub fn internal_attrs(&self) -> &[&str] {
        match self {
            BlockTag::Heading(_) => &[LEVEL_ATTR],
            _ => &[],
        }
    }
}

/// Classification of a markup tag during import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagClass {
    /// Block-level tag mapped onto the structural schema.
    Block(BlockTag),
    /// Inline tag flattened into marks.
    Inline,
    /// Wrapper tag whose children splice into the parent (`thead`, `tbody`).
    Transparent,
}

/// Classify a (lowercased) markup tag name.
pub fn classify_markup(tag: &str) -> TagClass {
    match tag {
        "p" => TagClass::Block(BlockTag::Paragraph),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag.as_bytes()[1] - b'0';
            TagClass::Block(BlockTag::Heading(level))
        }
        "ul" => TagClass::Block(BlockTag::BulletList),
        "ol" => TagClass::Block(BlockTag::OrderedList),
        "li" => TagClass::Block(BlockTag::ListItem),
        "pre" => TagClass::Block(BlockTag::CodeBlock),
        "blockquote" => TagClass::Block(BlockTag::Blockquote),
        "table" => TagClass::Block(BlockTag::Table),
        "tr" => TagClass::Block(BlockTag::TableRow),
        "th" => TagClass::Block(BlockTag::TableHeader),
        "td" => TagClass::Block(BlockTag::TableCell),
        "img" => TagClass::Block(BlockTag::Image),
        "hr" => TagClass::Block(BlockTag::HorizontalRule),
        "br" => TagClass::Block(BlockTag::HardBreak),
        "strong" | "b" | "em" | "i" | "code" | "a" | "u" | "s" | "strike" | "span" => {
            TagClass::Inline
        }
        "thead" | "tbody" | "tfoot" => TagClass::Transparent,
        other => TagClass::Block(BlockTag::Other(other.to_string())),
    }
}

/// Void markup tags that never carry children, written `<br>` or `<br/>`.
pub fn is_void_markup(tag: &str) -> bool {
    matches!(tag, "br" | "hr" | "img")
}

/// An inline formatting mark applied over a sub-range of a text run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Mark {
    Bold,
    Italic,
    Code,
    Underline,
    Strike,
    Link { href: String },
}

impl Mark {
    /// Mark derived from an inline markup tag, if the tag carries formatting.
    /// `span` is transparent: inline but mark-free.
    pub fn from_markup(tag: &str, attrs: &IndexMap<String, String>) -> Option<Mark> {
        match tag {
            "strong" | "b" => Some(Mark::Bold),
            "em" | "i" => Some(Mark::Italic),
            "code" => Some(Mark::Code),
            "u" => Some(Mark::Underline),
            "s" | "strike" => Some(Mark::Strike),
            "a" => Some(Mark::Link {
                href: attrs.get("href").cloned().unwrap_or_default(),
            }),
            _ => None,
        }
    }

    /// Attribute key under which this mark is stored on the text run.
    pub fn attr_key(&self) -> &'static str {
        match self {
            Mark::Bold => "bold",
            Mark::Italic => "italic",
            Mark::Code => "code",
            Mark::Underline => "underline",
            Mark::Strike => "strike",
            Mark::Link { .. } => "link",
        }
    }

    /// Markup tag this mark renders to.
    pub fn markup_tag(&self) -> &'static str {
        match self {
            Mark::Bold => "strong",
            Mark::Italic => "em",
            Mark::Code => "code",
            Mark::Underline => "u",
            Mark::Strike => "s",
            Mark::Link { .. } => "a",
        }
    }

    /// Nesting rank for export: lower ranks wrap outermost. Keeps the
    /// rendered tag order deterministic regardless of input nesting order.
    pub fn nesting_rank(&self) -> u8 {
        match self {
            Mark::Link { .. } => 0,
            Mark::Bold => 1,
            Mark::Italic => 2,
            Mark::Underline => 3,
            Mark::Strike => 4,
            Mark::Code => 5,
        }
    }

    fn attr_value(&self) -> Any {
        match self {
            Mark::Link { href } => {
                let mut map = HashMap::new();
                map.insert("href".to_string(), Any::from(href.as_str()));
                Any::from(map)
            }
            _ => Any::Bool(true),
        }
    }
}

/// Build the yrs formatting attributes for a set of active marks.
pub fn marks_to_attrs(marks: &[Mark]) -> Attrs {
    let mut attrs = Attrs::new();
    for mark in marks {
        attrs.insert(Arc::from(mark.attr_key()), mark.attr_value());
    }
    attrs
}

/// Recover the mark set from yrs formatting attributes, sorted by nesting
/// rank so the exporter emits a stable tag order.
pub fn marks_from_attrs(attrs: &Attrs) -> Vec<Mark> {
    let mut marks = Vec::new();
    for (key, value) in attrs.iter() {
        // Explicit `false`/null clears a mark in yjs deltas; skip those.
        if matches!(value, Any::Bool(false) | Any::Null | Any::Undefined) {
            continue;
        }
        let mark = match key.as_ref() {
            "bold" => Mark::Bold,
            "italic" => Mark::Italic,
            "code" => Mark::Code,
            "underline" => Mark::Underline,
            "strike" => Mark::Strike,
            "link" => {
                let href = match value {
                    Any::Map(map) => match map.get("href") {
                        Some(Any::String(s)) => s.to_string(),
                        _ => String::new(),
                    },
                    Any::String(s) => s.to_string(),
                    _ => String::new(),
                };
                Mark::Link { href }
            }
            _ => continue,
        };
        marks.push(mark);
    }
    marks.sort_by_key(|m| m.nesting_rank());
    marks
}
