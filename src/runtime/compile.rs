//! Lowers a syntax tree to a flat instruction list.
//!
//! Control flow becomes conditional and unconditional jumps, so the machine
//! can run one instruction at a time and stop between any two of them.
//! `for` loops keep their iterator on a stack: `IterInit` pushes, `IterNext`
//! advances or pops at exhaustion, and `break` pops explicitly.

use crate::errors::{to_source_span, DiagnosticContext, EditorError, ErrorKind, ErrorReporting};
use crate::syntax::{BinOp, ExprNode, Module, Span, Stmt, StmtNode};

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Evaluate and discard.
    Exec(ExprNode),
    /// Evaluate `value` once, bind it to every target left to right.
    Assign {
        targets: Vec<ExprNode>,
        value: ExprNode,
    },
    AugAssign {
        target: ExprNode,
        op: BinOp,
        value: ExprNode,
        span: Span,
    },
    Delete(Vec<ExprNode>),
    JumpIfFalse {
        test: ExprNode,
        target: usize,
    },
    Jump(usize),
    IterInit(ExprNode),
    /// Bind the next item to `target`, or pop the iterator and jump to `exit`.
    IterNext {
        target: ExprNode,
        exit: usize,
    },
    IterPop,
    Assert {
        test: ExprNode,
        msg: Option<ExprNode>,
        span: Span,
    },
    Unsupported {
        construct: &'static str,
        span: Span,
    },
}

impl Instr {
    /// Source location the instruction came from, for error reports.
    pub fn span(&self) -> Span {
        match self {
            Instr::Exec(expr) | Instr::IterInit(expr) => expr.span,
            Instr::Assign { value, .. } => value.span,
            Instr::AugAssign { span, .. }
            | Instr::Assert { span, .. }
            | Instr::Unsupported { span, .. } => *span,
            Instr::Delete(targets) => targets.first().map(|t| t.span).unwrap_or_default(),
            Instr::JumpIfFalse { test, .. } => test.span,
            Instr::IterNext { target, .. } => target.span,
            Instr::Jump(_) | Instr::IterPop => Span::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub instrs: Vec<Instr>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}

/// Compile a module. Only `break`/`continue` outside a loop fail here;
/// statements the machine cannot run compile to [`Instr::Unsupported`].
pub fn compile(module: &Module, ctx: &DiagnosticContext) -> Result<Program, EditorError> {
    let mut compiler = Compiler {
        instrs: Vec::new(),
        loops: Vec::new(),
        ctx,
    };
    compiler.block(&module.body)?;
    Ok(Program {
        instrs: compiler.instrs,
    })
}

struct LoopFrame {
    continue_to: usize,
    /// Indices of `Jump` instructions to patch with the loop's end.
    breaks: Vec<usize>,
    has_iterator: bool,
}

struct Compiler<'a> {
    instrs: Vec<Instr>,
    loops: Vec<LoopFrame>,
    ctx: &'a DiagnosticContext,
}

impl<'a> Compiler<'a> {
    fn emit(&mut self, instr: Instr) -> usize {
        self.instrs.push(instr);
        self.instrs.len() - 1
    }

    fn here(&self) -> usize {
        self.instrs.len()
    }

    fn patch(&mut self, at: usize, to: usize) {
        match &mut self.instrs[at] {
            Instr::Jump(target) | Instr::JumpIfFalse { target, .. } => *target = to,
            Instr::IterNext { exit, .. } => *exit = to,
            _ => {}
        }
    }

    fn block(&mut self, body: &[StmtNode]) -> Result<(), EditorError> {
        body.iter().try_for_each(|stmt| self.statement(stmt))
    }

    fn statement(&mut self, stmt: &StmtNode) -> Result<(), EditorError> {
        match &stmt.value {
            Stmt::Expr(expr) => {
                self.emit(Instr::Exec(expr.clone()));
            }
            Stmt::Assign { targets, value } => {
                self.emit(Instr::Assign {
                    targets: targets.clone(),
                    value: value.clone(),
                });
            }
            Stmt::AnnAssign {
                target,
                value: Some(value),
                ..
            } => {
                self.emit(Instr::Assign {
                    targets: vec![target.clone()],
                    value: value.clone(),
                });
            }
            Stmt::AnnAssign { value: None, .. } | Stmt::Pass => {}
            Stmt::AugAssign { target, op, value } => {
                self.emit(Instr::AugAssign {
                    target: target.clone(),
                    op: *op,
                    value: value.clone(),
                    span: stmt.span,
                });
            }
            Stmt::Delete(targets) => {
                self.emit(Instr::Delete(targets.clone()));
            }
            Stmt::Assert { test, msg } => {
                self.emit(Instr::Assert {
                    test: test.clone(),
                    msg: msg.clone(),
                    span: stmt.span,
                });
            }

            Stmt::If { test, body, orelse } => {
                let branch = self.emit(Instr::JumpIfFalse {
                    test: test.clone(),
                    target: 0,
                });
                self.block(body)?;
                if orelse.is_empty() {
                    let end = self.here();
                    self.patch(branch, end);
                } else {
                    let skip_else = self.emit(Instr::Jump(0));
                    let else_start = self.here();
                    self.patch(branch, else_start);
                    self.block(orelse)?;
                    let end = self.here();
                    self.patch(skip_else, end);
                }
            }

            Stmt::While { test, body, orelse } => {
                let head = self.here();
                let exit = self.emit(Instr::JumpIfFalse {
                    test: test.clone(),
                    target: 0,
                });
                self.loop_body(head, false, body, |c| {
                    c.emit(Instr::Jump(head));
                    let else_start = c.here();
                    c.patch(exit, else_start);
                    c.block(orelse)
                })?;
            }

            Stmt::For {
                target,
                iter,
                body,
                orelse,
                is_async: false,
            } => {
                self.emit(Instr::IterInit(iter.clone()));
                let head = self.emit(Instr::IterNext {
                    target: target.clone(),
                    exit: 0,
                });
                self.loop_body(head, true, body, |c| {
                    c.emit(Instr::Jump(head));
                    let else_start = c.here();
                    c.patch(head, else_start);
                    c.block(orelse)
                })?;
            }

            Stmt::Break | Stmt::Continue => {
                let keyword = if matches!(stmt.value, Stmt::Break) {
                    "break"
                } else {
                    "continue"
                };
                let Some(frame) = self.loops.last() else {
                    return Err(self.ctx.report(
                        ErrorKind::OutsideLoop {
                            keyword: keyword.to_string(),
                        },
                        to_source_span(stmt.span),
                    ));
                };
                if keyword == "continue" {
                    let to = frame.continue_to;
                    self.emit(Instr::Jump(to));
                } else {
                    if frame.has_iterator {
                        self.emit(Instr::IterPop);
                    }
                    let jump = self.emit(Instr::Jump(0));
                    if let Some(frame) = self.loops.last_mut() {
                        frame.breaks.push(jump);
                    }
                }
            }

            Stmt::For { is_async: true, .. }
            | Stmt::FunctionDef { .. }
            | Stmt::ClassDef { .. }
            | Stmt::Try { .. }
            | Stmt::With { .. }
            | Stmt::Return(_)
            | Stmt::Raise(_)
            | Stmt::Global(_)
            | Stmt::Import(_)
            | Stmt::ImportFrom { .. } => {
                self.emit(Instr::Unsupported {
                    construct: stmt.value.form_name(),
                    span: stmt.span,
                });
            }
        }
        Ok(())
    }

    /// Compile a loop body inside a fresh frame, then `tail` (back-jump and
    /// else clause). `break` jumps land after the tail.
    fn loop_body(
        &mut self,
        continue_to: usize,
        has_iterator: bool,
        body: &[StmtNode],
        tail: impl FnOnce(&mut Self) -> Result<(), EditorError>,
    ) -> Result<(), EditorError> {
        self.loops.push(LoopFrame {
            continue_to,
            breaks: Vec::new(),
            has_iterator,
        });
        let result = self.block(body);
        let frame = self.loops.pop();
        result?;
        tail(self)?;
        let end = self.here();
        for jump in frame.map(|f| f.breaks).unwrap_or_default() {
            self.patch(jump, end);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceContext;
    use crate::syntax::parse;

    fn compile_str(source: &str) -> Result<Program, EditorError> {
        let ctx = SourceContext::from_file("test.py", source);
        let module = parse(&ctx)?;
        compile(&module, &DiagnosticContext::new(ctx, "runtime"))
    }

    #[test]
    fn if_else_jumps() {
        let program = compile_str("if x:\n    a = 1\nelse:\n    a = 2\n").unwrap();
        assert_eq!(program.len(), 4);
        assert!(matches!(program.instrs[0], Instr::JumpIfFalse { target: 3, .. }));
        assert_eq!(program.instrs[2], Instr::Jump(4));
    }

    #[test]
    fn for_loop_layout() {
        let program = compile_str("for i in range(3):\n    if i:\n        break\n    continue\n").unwrap();
        // 0 IterInit, 1 IterNext, 2 JumpIfFalse, 3 IterPop, 4 Jump(end), 5 Jump(1), 6 Jump(1)
        assert!(matches!(program.instrs[1], Instr::IterNext { exit: 7, .. }));
        assert_eq!(program.instrs[3], Instr::IterPop);
        assert_eq!(program.instrs[4], Instr::Jump(7));
        assert_eq!(program.instrs[5], Instr::Jump(1));
        assert_eq!(program.instrs[6], Instr::Jump(1));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let err = compile_str("break").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::OutsideLoop {
                keyword: "break".into()
            }
        );
    }

    #[test]
    fn definitions_compile_to_unsupported() {
        let program = compile_str("def f():\n    pass\n").unwrap();
        assert!(matches!(
            program.instrs[0],
            Instr::Unsupported {
                construct: "def",
                ..
            }
        ));
    }
}
