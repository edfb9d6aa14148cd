//! Block-tree documents: the visual surface's native program representation.
//!
//! A [`BlockDocument`] is an ordered list of top-level statement blocks. Each
//! [`Block`] names its type and carries literal fields, value slots holding one
//! nested block each, and statement slots holding ordered block sequences.
//! Which names are legal for a given block type is declared by the
//! [`schema::BlockRegistry`].

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

pub mod codegen;
pub mod schema;

pub use codegen::generate_code;
pub use schema::{
    build_default_block_registry, BlockRegistry, BlockSchema, BlockShape, FieldSpec,
    DEFAULT_BLOCK_REGISTRY,
};

// ============================================================================
// BLOCK TYPE VOCABULARY
// ============================================================================

pub const PRINT_STATEMENT: &str = "print-statement";
pub const ASSIGN_STATEMENT: &str = "assign-statement";
pub const IF_STATEMENT: &str = "if-statement";
pub const FOR_STATEMENT: &str = "for-statement";
pub const NUMBER_LITERAL: &str = "math_number";
pub const TEXT_LITERAL: &str = "text";

/// Slot and field names shared by the built-in block types.
pub mod slots {
    pub const TEXT: &str = "TEXT";
    pub const VAR: &str = "VAR";
    pub const VALUE: &str = "VALUE";
    pub const COND: &str = "COND";
    pub const DO: &str = "DO";
    pub const RANGE: &str = "RANGE";
    pub const NUM: &str = "NUM";
}

// ============================================================================
// DOCUMENT MODEL
// ============================================================================

/// An editable literal carried by a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

/// One node of a block tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, Box<Block>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub statements: BTreeMap<String, Vec<Block>>,
}

impl Block {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
            values: BTreeMap::new(),
            statements: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Fill a value slot; `None` leaves the slot empty.
    pub fn with_value(mut self, name: &str, block: Option<Block>) -> Self {
        if let Some(block) = block {
            self.values.insert(name.to_string(), Box::new(block));
        }
        self
    }

    pub fn with_statements(mut self, name: &str, blocks: Vec<Block>) -> Self {
        self.statements.insert(name.to_string(), blocks);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Block> {
        self.values.get(name).map(|b| b.as_ref())
    }

    /// Blocks in a statement slot; an absent slot reads as empty.
    pub fn statements(&self, name: &str) -> &[Block] {
        self.statements.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of blocks in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.values.values().map(|b| b.subtree_len()).sum::<usize>()
            + self
                .statements
                .values()
                .flatten()
                .map(Block::subtree_len)
                .sum::<usize>()
    }

    pub fn number(value: f64) -> Self {
        Block::new(NUMBER_LITERAL).with_field(slots::NUM, FieldValue::Number(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Block::new(TEXT_LITERAL).with_field(slots::TEXT, FieldValue::Text(value.into()))
    }
}

/// An ordered sequence of top-level blocks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockDocument {
    pub blocks: Vec<Block>,
}

impl BlockDocument {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total number of blocks at every depth.
    pub fn block_count(&self) -> usize {
        self.blocks.iter().map(Block::subtree_len).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Blockly XML serialisation. Top-level blocks form one stack chained
    /// through `<next>`, as do the blocks inside each statement slot.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<xml xmlns=\"https://developers.google.com/blockly/xml\">");
        write_chain(&mut out, &self.blocks);
        out.push_str("</xml>");
        out
    }
}

// ============================================================================
// XML EXPORT
// ============================================================================

fn write_chain(out: &mut String, blocks: &[Block]) {
    let Some((first, rest)) = blocks.split_first() else {
        return;
    };
    write_block_open(out, first);
    if !rest.is_empty() {
        out.push_str("<next>");
        write_chain(out, rest);
        out.push_str("</next>");
    }
    out.push_str("</block>");
}

/// Writes a block's opening tag and its contents, leaving `</block>` to the caller
/// so that a `<next>` sibling can be nested inside.
fn write_block_open(out: &mut String, block: &Block) {
    let _ = write!(out, "<block type=\"{}\">", escape_xml(&block.kind));
    for (name, value) in &block.fields {
        let _ = write!(
            out,
            "<field name=\"{}\">{}</field>",
            escape_xml(name),
            escape_xml(&value.to_string())
        );
    }
    for (name, child) in &block.values {
        let _ = write!(out, "<value name=\"{}\">", escape_xml(name));
        write_chain(out, std::slice::from_ref(child.as_ref()));
        out.push_str("</value>");
    }
    for (name, children) in &block.statements {
        if children.is_empty() {
            continue;
        }
        let _ = write!(out, "<statement name=\"{}\">", escape_xml(name));
        write_chain(out, children);
        out.push_str("</statement>");
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Integral values print without a fraction (`5`, not `5.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
