//! Python code generation from block documents.
//!
//! The inverse of translation: walks a [`BlockDocument`] and writes the
//! Python program it denotes, two spaces per indentation level.

use crate::blocks::{
    format_number, slots, Block, BlockDocument, ASSIGN_STATEMENT, FOR_STATEMENT, IF_STATEMENT,
    NUMBER_LITERAL, PRINT_STATEMENT, TEXT_LITERAL,
};

const INDENT: &str = "  ";

/// Generate Python source for a whole document. An empty document yields
/// an empty string; otherwise every line ends with a newline.
pub fn generate_code(document: &BlockDocument) -> String {
    let mut out = String::new();
    for block in &document.blocks {
        statement(&mut out, block, 0);
    }
    out
}

fn statement(out: &mut String, block: &Block, depth: usize) {
    let pad = INDENT.repeat(depth);
    match block.kind.as_str() {
        PRINT_STATEMENT => {
            out.push_str(&format!("{}print({})\n", pad, value_or(block, slots::TEXT, "None")));
        }
        ASSIGN_STATEMENT => {
            out.push_str(&format!(
                "{}{} = {}\n",
                pad,
                variable(block, "x"),
                value_or(block, slots::VALUE, "None")
            ));
        }
        IF_STATEMENT => {
            out.push_str(&format!("{}if {}:\n", pad, value_or(block, slots::COND, "False")));
            body(out, block.statements(slots::DO), depth + 1);
        }
        FOR_STATEMENT => {
            let bound = block
                .field(slots::RANGE)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "0".to_string());
            out.push_str(&format!(
                "{}for {} in range({}):\n",
                pad,
                variable(block, "i"),
                bound
            ));
            body(out, block.statements(slots::DO), depth + 1);
        }
        _ => match expression(block) {
            Some(expr) => out.push_str(&format!("{}{}\n", pad, expr)),
            None => log::warn!("no code generator for block type '{}'", block.kind),
        },
    }
}

fn body(out: &mut String, blocks: &[Block], depth: usize) {
    if blocks.is_empty() {
        out.push_str(&format!("{}pass\n", INDENT.repeat(depth)));
        return;
    }
    for block in blocks {
        statement(out, block, depth);
    }
}

fn variable(block: &Block, default: &str) -> String {
    block
        .field(slots::VAR)
        .and_then(|v| v.as_text())
        .filter(|name| !name.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn value_or(block: &Block, slot: &str, empty: &str) -> String {
    block
        .value(slot)
        .and_then(expression)
        .unwrap_or_else(|| empty.to_string())
}

/// Code for an output block, or `None` for statement blocks and unknown types.
fn expression(block: &Block) -> Option<String> {
    match block.kind.as_str() {
        NUMBER_LITERAL => {
            let n = block.field(slots::NUM).and_then(|v| v.as_number()).unwrap_or(0.0);
            Some(number_literal(n))
        }
        TEXT_LITERAL => {
            let text = block.field(slots::TEXT).and_then(|v| v.as_text()).unwrap_or("");
            Some(quote(text))
        }
        _ => None,
    }
}

fn number_literal(n: f64) -> String {
    if n.is_nan() {
        "float('nan')".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "float('inf')" } else { "float('-inf')" }.to_string()
    } else if n < 0.0 {
        format!("({})", format_number(n))
    } else {
        format_number(n)
    }
}

/// Single-quoted Python string literal.
fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                quoted.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::FieldValue;

    #[test]
    fn empty_document_generates_nothing() {
        assert_eq!(generate_code(&BlockDocument::default()), "");
    }

    #[test]
    fn nested_statements_indent_by_two() {
        let doc = BlockDocument::new(vec![Block::new(FOR_STATEMENT)
            .with_field(slots::VAR, FieldValue::Text("i".into()))
            .with_field(slots::RANGE, FieldValue::Number(3.0))
            .with_statements(
                slots::DO,
                vec![Block::new(IF_STATEMENT)
                    .with_value(slots::COND, Some(Block::text("x")))
                    .with_statements(
                        slots::DO,
                        vec![Block::new(PRINT_STATEMENT)
                            .with_value(slots::TEXT, Some(Block::number(2.5)))],
                    )],
            )]);
        assert_eq!(
            generate_code(&doc),
            "for i in range(3):\n  if 'x':\n    print(2.5)\n"
        );
    }

    #[test]
    fn empty_slots_use_placeholders() {
        let doc = BlockDocument::new(vec![
            Block::new(PRINT_STATEMENT),
            Block::new(ASSIGN_STATEMENT).with_field(slots::VAR, FieldValue::Text("y".into())),
            Block::new(IF_STATEMENT),
        ]);
        assert_eq!(generate_code(&doc), "print(None)\ny = None\nif False:\n  pass\n");
    }

    #[test]
    fn quotes_and_escapes_text() {
        assert_eq!(quote("it's\n"), "'it\\'s\\n'");
        assert_eq!(quote("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn negative_numbers_are_parenthesised() {
        assert_eq!(number_literal(-3.0), "(-3)");
        assert_eq!(number_literal(7.0), "7");
    }
}
