//! Tree-to-Blocks Translator
//!
//! Maps a parsed Python module onto the fixed block vocabulary: `print`
//! calls, simple assignments, single-branch conditionals and `range` loops.
//! Everything else is dropped rather than rejected. Each drop is recorded in
//! the [`TranslationReport`] so the lossy path stays observable.
//!
//! Expressions translate only when they are numeric or string literals or
//! bare names. Names become text literals carrying the identifier's
//! spelling; there is no variable-getter block. Any other expression leaves
//! its slot empty.

use std::fmt;

use serde::Serialize;

use crate::blocks::{
    slots, Block, BlockDocument, FieldValue, ASSIGN_STATEMENT, FOR_STATEMENT, IF_STATEMENT,
    PRINT_STATEMENT,
};
use crate::errors::{EditorError, SourceContext};
use crate::syntax::{self, Constant, Expr, ExprNode, Keyword, Span, Stmt, StmtNode, UnaryOp};

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Outcome of a successful translation.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// The source was empty or whitespace; the caller should clear the surface.
    Empty,
    Document(TranslationReport),
}

impl Translation {
    pub fn document(&self) -> Option<&BlockDocument> {
        match self {
            Translation::Empty => None,
            Translation::Document(report) => Some(&report.document),
        }
    }

    /// The translated document, or an empty one for [`Translation::Empty`].
    pub fn into_document(self) -> BlockDocument {
        match self {
            Translation::Empty => BlockDocument::default(),
            Translation::Document(report) => report.document,
        }
    }

    pub fn dropped(&self) -> &[DroppedStatement] {
        match self {
            Translation::Empty => &[],
            Translation::Document(report) => &report.dropped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TranslationReport {
    pub document: BlockDocument,
    pub dropped: Vec<DroppedStatement>,
}

/// A statement (or clause) that has no block equivalent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedStatement {
    pub span: Span,
    /// Syntax form of the dropped statement, e.g. `def` or `while`
    pub form: &'static str,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    UnsupportedForm,
    NotPrintCall,
    PrintArity { args: usize },
    PrintKeywords,
    ComplexTarget,
    ChainedAssignment,
    NotRangeIterable,
    RangeArity { args: usize },
    NonLiteralBound,
    ComplexLoopVariable,
    IgnoredElse,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::UnsupportedForm => write!(f, "no block for this statement form"),
            DropReason::NotPrintCall => write!(f, "only calls to print have a block"),
            DropReason::PrintArity { args } => {
                write!(f, "print takes exactly one argument, found {}", args)
            }
            DropReason::PrintKeywords => write!(f, "print with keyword arguments"),
            DropReason::ComplexTarget => write!(f, "assignment target is not a simple name"),
            DropReason::ChainedAssignment => write!(f, "chained assignment"),
            DropReason::NotRangeIterable => write!(f, "loop does not iterate over range(...)"),
            DropReason::RangeArity { args } => {
                write!(f, "range takes exactly one argument, found {}", args)
            }
            DropReason::NonLiteralBound => {
                write!(f, "range bound is not a non-negative integer literal")
            }
            DropReason::ComplexLoopVariable => write!(f, "loop variable is not a simple name"),
            DropReason::IgnoredElse => write!(f, "else/elif clause ignored"),
        }
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Translate source text named `<stdin>`.
pub fn translate(source: &str) -> Result<Translation, EditorError> {
    translate_source(&SourceContext::from_file("<stdin>", source))
}

/// Translate a named source. Parse failures are returned whole; there is no
/// partial document.
pub fn translate_source(source: &SourceContext) -> Result<Translation, EditorError> {
    if source.content.trim().is_empty() {
        log::debug!("translate: {} is empty", source.name);
        return Ok(Translation::Empty);
    }

    let module = syntax::parse(source).map_err(|err| {
        log::error!("ParseError in {}: {}", source.name, err);
        err
    })?;

    let mut translator = Translator::default();
    let blocks = translator.statements(&module.body);
    let report = TranslationReport {
        document: BlockDocument::new(blocks),
        dropped: translator.dropped,
    };
    log::debug!(
        "translate: {} blocks from {} ({} dropped)",
        report.document.block_count(),
        source.name,
        report.dropped.len()
    );
    Ok(Translation::Document(report))
}

// ============================================================================
// STATEMENT TRANSLATION
// ============================================================================

#[derive(Default)]
struct Translator {
    dropped: Vec<DroppedStatement>,
}

impl Translator {
    fn statements(&mut self, body: &[StmtNode]) -> Vec<Block> {
        body.iter().filter_map(|stmt| self.statement(stmt)).collect()
    }

    fn record_drop(&mut self, stmt: &StmtNode, reason: DropReason) -> Option<Block> {
        log::debug!(
            "translate: dropping {} at {}..{}: {}",
            stmt.value.form_name(),
            stmt.span.start,
            stmt.span.end,
            reason
        );
        self.dropped.push(DroppedStatement {
            span: stmt.span,
            form: stmt.value.form_name(),
            reason,
        });
        None
    }

    fn ignore_else(&mut self, stmt: &StmtNode, orelse: &[StmtNode]) {
        if let (Some(first), Some(last)) = (orelse.first(), orelse.last()) {
            self.dropped.push(DroppedStatement {
                span: first.span.to(last.span),
                form: stmt.value.form_name(),
                reason: DropReason::IgnoredElse,
            });
        }
    }

    fn statement(&mut self, stmt: &StmtNode) -> Option<Block> {
        match &stmt.value {
            Stmt::Expr(expr) => match &expr.value {
                Expr::Call {
                    func,
                    args,
                    keywords,
                } if func.value.as_name() == Some("print") => self.print(stmt, args, keywords),
                _ => self.record_drop(stmt, DropReason::NotPrintCall),
            },

            Stmt::Assign { targets, value } => match targets.as_slice() {
                [target] => match target.value.as_name() {
                    Some(name) => Some(
                        Block::new(ASSIGN_STATEMENT)
                            .with_field(slots::VAR, FieldValue::Text(name.to_string()))
                            .with_value(slots::VALUE, expression(value)),
                    ),
                    None => self.record_drop(stmt, DropReason::ComplexTarget),
                },
                _ => self.record_drop(stmt, DropReason::ChainedAssignment),
            },

            Stmt::If { test, body, orelse } => {
                let body = self.statements(body);
                self.ignore_else(stmt, orelse);
                Some(
                    Block::new(IF_STATEMENT)
                        .with_value(slots::COND, expression(test))
                        .with_statements(slots::DO, body),
                )
            }

            Stmt::For {
                target,
                iter,
                body,
                orelse,
                is_async: false,
            } => {
                let Some(var) = target.value.as_name() else {
                    return self.record_drop(stmt, DropReason::ComplexLoopVariable);
                };
                let bound = match range_bound(iter) {
                    Ok(bound) => bound,
                    Err(reason) => return self.record_drop(stmt, reason),
                };
                let body = self.statements(body);
                self.ignore_else(stmt, orelse);
                Some(
                    Block::new(FOR_STATEMENT)
                        .with_field(slots::VAR, FieldValue::Text(var.to_string()))
                        .with_field(slots::RANGE, FieldValue::Number(bound as f64))
                        .with_statements(slots::DO, body),
                )
            }

            _ => self.record_drop(stmt, DropReason::UnsupportedForm),
        }
    }

    fn print(&mut self, stmt: &StmtNode, args: &[ExprNode], keywords: &[Keyword]) -> Option<Block> {
        if !keywords.is_empty() {
            return self.record_drop(stmt, DropReason::PrintKeywords);
        }
        match args {
            [arg] => Some(Block::new(PRINT_STATEMENT).with_value(slots::TEXT, expression(arg))),
            _ => self.record_drop(stmt, DropReason::PrintArity { args: args.len() }),
        }
    }
}

/// The literal bound of `range(N)`.
fn range_bound(iter: &ExprNode) -> Result<i64, DropReason> {
    let Expr::Call {
        func,
        args,
        keywords,
    } = &iter.value
    else {
        return Err(DropReason::NotRangeIterable);
    };
    if func.value.as_name() != Some("range") || !keywords.is_empty() {
        return Err(DropReason::NotRangeIterable);
    }
    match args.as_slice() {
        [arg] => match arg.value {
            Expr::Constant(Constant::Int(n)) if n >= 0 => Ok(n),
            _ => Err(DropReason::NonLiteralBound),
        },
        _ => Err(DropReason::RangeArity { args: args.len() }),
    }
}

// ============================================================================
// EXPRESSION TRANSLATION
// ============================================================================

/// Literal or name to block; `None` leaves the slot empty.
fn expression(expr: &ExprNode) -> Option<Block> {
    match &expr.value {
        Expr::Constant(Constant::Str(text)) => Some(Block::text(text.clone())),
        Expr::Name(name) => Some(Block::text(name.clone())),
        _ => numeric_literal(expr).map(Block::number),
    }
}

/// Numbers, including a literal under unary `-` or `+`. Literals that
/// overflow to infinity have no number block.
fn numeric_literal(expr: &ExprNode) -> Option<f64> {
    match &expr.value {
        Expr::Constant(Constant::Int(n)) => Some(*n as f64),
        Expr::Constant(Constant::Float(f)) if f.is_finite() => Some(*f),
        Expr::UnaryOp {
            op: UnaryOp::Neg,
            operand,
        } => numeric_literal(operand).map(|n| -n),
        Expr::UnaryOp {
            op: UnaryOp::Pos,
            operand,
        } => numeric_literal(operand),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(source: &str) -> TranslationReport {
        match translate(source).unwrap() {
            Translation::Document(report) => report,
            Translation::Empty => panic!("expected a document"),
        }
    }

    #[test]
    fn whitespace_is_empty() {
        assert_eq!(translate("  \n\t\n").unwrap(), Translation::Empty);
    }

    #[test]
    fn print_of_string() {
        let report = report("print(\"hi\")");
        assert_eq!(
            report.document.blocks,
            vec![Block::new(PRINT_STATEMENT).with_value(slots::TEXT, Some(Block::text("hi")))]
        );
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn negative_numbers_fold_into_literals() {
        let report = report("x = -3");
        let value = report.document.blocks[0].value(slots::VALUE).unwrap();
        assert_eq!(value, &Block::number(-3.0));
    }

    #[test]
    fn other_expressions_leave_slot_empty() {
        let report = report("y = 1 + 2\nprint(len(x))");
        assert!(report.document.blocks[0].value(slots::VALUE).is_none());
        assert!(report.document.blocks[1].value(slots::TEXT).is_none());
    }

    #[test]
    fn records_drop_reasons() {
        let report = report(
            "print(1, 2)\nprint(1, sep='')\na.b = 1\na = b = 1\nfoo()\nfor i in x: pass\nfor i in range(1, 3): pass\nfor i in range(n): pass\nfor i, j in range(2): pass\nwhile x: pass\n",
        );
        assert!(report.document.is_empty());
        let reasons: Vec<_> = report.dropped.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                DropReason::PrintArity { args: 2 },
                DropReason::PrintKeywords,
                DropReason::ComplexTarget,
                DropReason::ChainedAssignment,
                DropReason::NotPrintCall,
                DropReason::NotRangeIterable,
                DropReason::RangeArity { args: 2 },
                DropReason::NonLiteralBound,
                DropReason::ComplexLoopVariable,
                DropReason::UnsupportedForm,
            ]
        );
        assert_eq!(report.dropped[9].form, "while");
    }

    #[test]
    fn else_clause_is_dropped_but_if_kept() {
        let report = report("if x:\n    print(1)\nelif y:\n    print(2)\nelse:\n    print(3)\n");
        assert_eq!(report.document.blocks.len(), 1);
        assert_eq!(report.document.blocks[0].statements(slots::DO).len(), 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].reason, DropReason::IgnoredElse);
    }

    #[test]
    fn nested_drops_are_reported() {
        let report = report("for i in range(2):\n    import os\n    print(i)\n");
        assert_eq!(report.document.blocks[0].statements(slots::DO).len(), 1);
        assert_eq!(report.dropped[0].form, "import");
    }
}
