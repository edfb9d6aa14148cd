//! Block Schema Registry
//!
//! Declares which block types the visual surface offers and, for each, its
//! fields, value slots and statement slots. The registry is static
//! configuration: built once at start-up, then consulted to validate
//! documents before they are loaded and to list the toolbox.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::blocks::{
    slots, Block, BlockDocument, FieldValue, ASSIGN_STATEMENT, FOR_STATEMENT, IF_STATEMENT,
    NUMBER_LITERAL, PRINT_STATEMENT, TEXT_LITERAL,
};
use crate::errors::{
    unspanned, DiagnosticContext, EditorError, ErrorKind, ErrorReporting, SourceContext,
};

// ============================================================================
// SCHEMA TYPES
// ============================================================================

/// How a block connects to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockShape {
    /// Previous/next connections; lives in statement sequences.
    Statement,
    /// A single output connection; lives in value slots.
    Output,
}

/// Default value and constraints of an editable field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldSpec {
    Text { default: String },
    Number {
        default: f64,
        min: Option<f64>,
        /// Only whole numbers are accepted.
        integer: bool,
    },
}

impl FieldSpec {
    pub fn default_value(&self) -> FieldValue {
        match self {
            FieldSpec::Text { default } => FieldValue::Text(default.clone()),
            FieldSpec::Number { default, .. } => FieldValue::Number(*default),
        }
    }
}

/// Static declaration of one block type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSchema {
    pub id: String,
    pub label: String,
    /// Hue on the visual surface's colour wheel
    pub colour: u16,
    pub tooltip: String,
    pub shape: BlockShape,
    pub fields: Vec<(String, FieldSpec)>,
    pub value_slots: Vec<String>,
    pub statement_slots: Vec<String>,
}

impl BlockSchema {
    pub fn statement(id: &str, label: &str, colour: u16) -> Self {
        Self::new(id, label, colour, BlockShape::Statement)
    }

    pub fn output(id: &str, label: &str, colour: u16) -> Self {
        Self::new(id, label, colour, BlockShape::Output)
    }

    fn new(id: &str, label: &str, colour: u16, shape: BlockShape) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            colour,
            tooltip: String::new(),
            shape,
            fields: Vec::new(),
            value_slots: Vec::new(),
            statement_slots: Vec::new(),
        }
    }

    pub fn tooltip(mut self, tooltip: &str) -> Self {
        self.tooltip = tooltip.to_string();
        self
    }

    pub fn text_field(mut self, name: &str, default: &str) -> Self {
        self.fields.push((
            name.to_string(),
            FieldSpec::Text {
                default: default.to_string(),
            },
        ));
        self
    }

    pub fn number_field(mut self, name: &str, default: f64, min: Option<f64>) -> Self {
        self.fields.push((
            name.to_string(),
            FieldSpec::Number {
                default,
                min,
                integer: false,
            },
        ));
        self
    }

    /// A number field restricted to whole values.
    pub fn integer_field(mut self, name: &str, default: f64, min: Option<f64>) -> Self {
        self.fields.push((
            name.to_string(),
            FieldSpec::Number {
                default,
                min,
                integer: true,
            },
        ));
        self
    }

    pub fn value_slot(mut self, name: &str) -> Self {
        self.value_slots.push(name.to_string());
        self
    }

    pub fn statement_slot(mut self, name: &str) -> Self {
        self.statement_slots.push(name.to_string());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, spec)| spec)
    }

    /// A fresh block of this type with every field at its default.
    pub fn instantiate(&self) -> Block {
        self.fields
            .iter()
            .fold(Block::new(&self.id), |block, (name, spec)| {
                block.with_field(name, spec.default_value())
            })
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Registry of block types, iterated in registration order.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    schemas: Vec<BlockSchema>,
    index: HashMap<String, usize>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block type. Re-registering an id replaces the earlier
    /// schema in place, keeping its toolbox position.
    pub fn register(&mut self, schema: BlockSchema) {
        match self.index.get(&schema.id) {
            Some(&slot) => self.schemas[slot] = schema,
            None => {
                self.index.insert(schema.id.clone(), self.schemas.len());
                self.schemas.push(schema);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&BlockSchema> {
        self.index.get(id).map(|&slot| &self.schemas[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockSchema> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Block type ids in the order the visual surface lists them.
    pub fn toolbox(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.schemas)
    }

    /// Check every block in `document` against its schema: known type,
    /// declared field and slot names, field types, finite and whole numbers
    /// where required, minimums, and statement versus output placement.
    pub fn validate(&self, document: &BlockDocument) -> Result<(), EditorError> {
        let ctx = DiagnosticContext::new(SourceContext::fallback("block document"), "session");
        document
            .blocks
            .iter()
            .try_for_each(|block| self.validate_block(block, None, &ctx))
    }

    fn validate_block(
        &self,
        block: &Block,
        expected: Option<BlockShape>,
        ctx: &DiagnosticContext,
    ) -> Result<(), EditorError> {
        let schema = self.get(&block.kind).ok_or_else(|| {
            ctx.report(
                ErrorKind::UnknownBlockType {
                    kind: block.kind.clone(),
                },
                unspanned(),
            )
        })?;

        if let Some(expected) = expected {
            if schema.shape != expected {
                return Err(ctx.type_mismatch(
                    format!(
                        "block '{}' cannot be placed in a {} position",
                        block.kind,
                        match expected {
                            BlockShape::Statement => "statement",
                            BlockShape::Output => "value",
                        }
                    ),
                    unspanned(),
                ));
            }
        }

        for (name, value) in &block.fields {
            let spec = schema
                .field(name)
                .ok_or_else(|| unknown_slot(ctx, block, "field", name))?;
            match (spec, value) {
                (FieldSpec::Text { .. }, FieldValue::Text(_)) => {}
                (FieldSpec::Number { min, integer, .. }, FieldValue::Number(n)) => {
                    let problem = if !n.is_finite() {
                        Some("must be a finite number".to_string())
                    } else if *integer && n.fract() != 0.0 {
                        Some("must be a whole number".to_string())
                    } else {
                        min.filter(|min| n < min)
                            .map(|min| format!("must be at least {}", min))
                    };
                    if let Some(problem) = problem {
                        return Err(ctx.type_mismatch(
                            format!("field {} of '{}' {}", name, block.kind, problem),
                            unspanned(),
                        ));
                    }
                }
                _ => {
                    return Err(ctx.type_mismatch(
                        format!("field {} of '{}' has the wrong type", name, block.kind),
                        unspanned(),
                    ))
                }
            }
        }

        for (name, child) in &block.values {
            if !schema.value_slots.contains(name) {
                return Err(unknown_slot(ctx, block, "value slot", name));
            }
            self.validate_block(child, Some(BlockShape::Output), ctx)?;
        }

        for (name, children) in &block.statements {
            if !schema.statement_slots.contains(name) {
                return Err(unknown_slot(ctx, block, "statement slot", name));
            }
            children
                .iter()
                .try_for_each(|child| self.validate_block(child, Some(BlockShape::Statement), ctx))?;
        }

        Ok(())
    }
}

fn unknown_slot(ctx: &DiagnosticContext, block: &Block, slot_kind: &str, name: &str) -> EditorError {
    ctx.report(
        ErrorKind::UnknownSlot {
            kind: block.kind.clone(),
            slot_kind: slot_kind.to_string(),
            name: name.to_string(),
        },
        unspanned(),
    )
}

// ============================================================================
// BUILT-IN BLOCK TYPES
// ============================================================================

/// Shared instance of [`build_default_block_registry`] for callers that only
/// read it.
pub static DEFAULT_BLOCK_REGISTRY: Lazy<BlockRegistry> = Lazy::new(build_default_block_registry);

/// Builds the registry of block types the editor ships with: the four
/// statement blocks and the number and text literals.
///
/// # Example
/// ```rust
/// use pyblocks::blocks::build_default_block_registry;
/// let registry = build_default_block_registry();
/// assert!(registry.contains("for-statement"));
/// assert_eq!(registry.len(), 6);
/// ```
pub fn build_default_block_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();

    registry.register(
        BlockSchema::statement(PRINT_STATEMENT, "print %1", 160)
            .tooltip("Print a value")
            .value_slot(slots::TEXT),
    );
    registry.register(
        BlockSchema::statement(ASSIGN_STATEMENT, "set %1 to %2", 230)
            .tooltip("Assign a value to a variable")
            .text_field(slots::VAR, "x")
            .value_slot(slots::VALUE),
    );
    registry.register(
        BlockSchema::statement(IF_STATEMENT, "if %1 do %2", 210)
            .tooltip("Run the body when the condition holds")
            .value_slot(slots::COND)
            .statement_slot(slots::DO),
    );
    registry.register(
        BlockSchema::statement(FOR_STATEMENT, "for %1 in range %2 do %3", 120)
            .tooltip("Repeat the body a fixed number of times")
            .text_field(slots::VAR, "i")
            .integer_field(slots::RANGE, 5.0, Some(0.0))
            .statement_slot(slots::DO),
    );
    registry.register(
        BlockSchema::output(NUMBER_LITERAL, "%1", 230)
            .tooltip("A number")
            .number_field(slots::NUM, 0.0, None),
    );
    registry.register(
        BlockSchema::output(TEXT_LITERAL, "\"%1\"", 160)
            .tooltip("A piece of text")
            .text_field(slots::TEXT, ""),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_lists_statements_first() {
        let registry = build_default_block_registry();
        assert_eq!(
            registry.toolbox(),
            vec![
                PRINT_STATEMENT,
                ASSIGN_STATEMENT,
                IF_STATEMENT,
                FOR_STATEMENT,
                NUMBER_LITERAL,
                TEXT_LITERAL
            ]
        );
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let mut registry = build_default_block_registry();
        registry.register(BlockSchema::statement(IF_STATEMENT, "when %1", 0));
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.toolbox()[2], IF_STATEMENT);
        assert_eq!(registry.get(IF_STATEMENT).unwrap().label, "when %1");
        assert!(registry.get(IF_STATEMENT).unwrap().statement_slots.is_empty());
    }

    #[test]
    fn instantiate_uses_field_defaults() {
        let registry = build_default_block_registry();
        let block = registry.get(FOR_STATEMENT).unwrap().instantiate();
        assert_eq!(block.field(slots::VAR), Some(&FieldValue::Text("i".into())));
        assert_eq!(block.field(slots::RANGE), Some(&FieldValue::Number(5.0)));
    }

    #[test]
    fn validate_rejects_unknown_types_and_slots() {
        let registry = build_default_block_registry();

        let doc = BlockDocument::new(vec![Block::new("while-statement")]);
        assert!(matches!(
            registry.validate(&doc).unwrap_err().kind,
            ErrorKind::UnknownBlockType { .. }
        ));

        let doc = BlockDocument::new(vec![
            Block::new(PRINT_STATEMENT).with_value("VALUE", Some(Block::number(1.0)))
        ]);
        assert!(matches!(
            registry.validate(&doc).unwrap_err().kind,
            ErrorKind::UnknownSlot { .. }
        ));
    }

    #[test]
    fn validate_checks_placement_and_minimums() {
        let registry = build_default_block_registry();

        let misplaced = BlockDocument::new(vec![Block::new(IF_STATEMENT)
            .with_statements(slots::DO, vec![Block::number(1.0)])]);
        assert!(registry.validate(&misplaced).is_err());

        let negative = BlockDocument::new(vec![registry
            .get(FOR_STATEMENT)
            .unwrap()
            .instantiate()
            .with_field(slots::RANGE, FieldValue::Number(-1.0))]);
        assert!(registry.validate(&negative).is_err());

        let for_with = |n: f64| {
            BlockDocument::new(vec![registry
                .get(FOR_STATEMENT)
                .unwrap()
                .instantiate()
                .with_field(slots::RANGE, FieldValue::Number(n))])
        };
        assert!(registry.validate(&for_with(3.0)).is_ok());
        for bad in [2.5, f64::NAN, f64::INFINITY] {
            let err = registry.validate(&for_with(bad)).unwrap_err();
            assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }), "{}", bad);
        }

        let fractional = BlockDocument::new(vec![Block::new(PRINT_STATEMENT)
            .with_value(slots::TEXT, Some(Block::number(2.5)))]);
        assert!(registry.validate(&fractional).is_ok());
        let not_finite = BlockDocument::new(vec![Block::new(PRINT_STATEMENT)
            .with_value(slots::TEXT, Some(Block::number(f64::NAN)))]);
        assert!(registry.validate(&not_finite).is_err());

        let ok = BlockDocument::new(vec![Block::new(PRINT_STATEMENT)
            .with_value(slots::TEXT, Some(Block::text("hi")))]);
        assert!(registry.validate(&ok).is_ok());
    }
}
