//! Python Parser - Syntax Tree Source
//!
//! Converts source text into a [`Module`] with span tracking. Parsing runs in
//! two stages: the layout pass produces logical lines, pest parses each line
//! into a simple statement list or a compound header, and the assembler
//! nests headers and their indented bodies into statements.
//! This parser is purely syntactic - no name resolution or evaluation.

use std::iter::Peekable;

use pest::{
    iterators::{Pair, Pairs},
    Parser,
};
use pest_derive::Parser;

use crate::errors::{
    to_source_span, DiagnosticContext, EditorError, ErrorKind, ErrorReporting, SourceContext,
};
use crate::syntax::layout::{logical_lines, LogicalLine};
use crate::syntax::{
    BinOp, BoolOp, CmpOp, ComprehensionClause, ComprehensionKind, Constant, ExceptHandler, Expr,
    ExprNode, Keyword, Module, Span, Spanned, Stmt, StmtNode, UnaryOp,
};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct PythonParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse Python source into a syntax tree
pub fn parse(source: &SourceContext) -> Result<Module, EditorError> {
    if source.content.trim().is_empty() {
        return Ok(Module::default());
    }

    let ctx = DiagnosticContext::new(source.clone(), "parse");
    let lines = logical_lines(&source.content, &ctx)?
        .into_iter()
        .map(|line| parse_line(line, &ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let mut assembler = Assembler {
        lines,
        pos: 0,
        ctx: &ctx,
    };
    let body = assembler.block(0)?;
    log::debug!("parsed {} top-level statements from {}", body.len(), source.name);
    Ok(Module { body })
}

/// Parse a bare string, naming the source `<stdin>`
pub fn parse_str(text: &str) -> Result<Module, EditorError> {
    parse(&SourceContext::from_file("<stdin>", text))
}

// ============================================================================
// LINE PARSING
// ============================================================================

/// A logical line after pest has parsed it.
struct ParsedLine {
    indent: usize,
    span: Span,
    kind: LineKind,
}

enum LineKind {
    Simple(Vec<StmtNode>),
    Decorator(ExprNode),
    Header {
        clause: Clause,
        inline: Option<Vec<StmtNode>>,
    },
}

enum Clause {
    If(ExprNode),
    Elif(ExprNode),
    Else,
    While(ExprNode),
    For {
        target: ExprNode,
        iter: ExprNode,
        is_async: bool,
    },
    Def {
        name: String,
        params: Vec<String>,
        is_async: bool,
    },
    Class { name: String, bases: Vec<ExprNode> },
    Try,
    Except { kind: Option<ExprNode>, name: Option<String> },
    Finally,
    With { items: Vec<ExprNode>, is_async: bool },
}

impl Clause {
    fn keyword(&self) -> &'static str {
        match self {
            Clause::If(_) => "if",
            Clause::Elif(_) => "elif",
            Clause::Else => "else",
            Clause::While(_) => "while",
            Clause::For { .. } => "for",
            Clause::Def { .. } => "def",
            Clause::Class { .. } => "class",
            Clause::Try => "try",
            Clause::Except { .. } => "except",
            Clause::Finally => "finally",
            Clause::With { .. } => "with",
        }
    }
}

fn parse_line(line: LogicalLine, ctx: &DiagnosticContext) -> Result<ParsedLine, EditorError> {
    let span = Span::new(line.start, line.end());
    let mut pairs = PythonParser::parse(Rule::line, &line.text)
        .map_err(|e| convert_parse_error(e, line.start, ctx))?;

    let builder = Builder {
        ctx,
        offset: line.start,
    };
    let line_pair = builder.next(&mut pairs, span, "line")?;
    let mut inner = line_pair.into_inner();
    let content = builder.next(&mut inner, span, "statement")?;

    let kind = match content.as_rule() {
        Rule::simple_stmts => LineKind::Simple(builder.simple_stmts(content)?),
        Rule::decorator => {
            let decorator = builder.next(&mut content.into_inner(), span, "decorator")?;
            LineKind::Decorator(builder.expr(decorator)?)
        }
        Rule::compound_header => {
            let mut parts = content.into_inner();
            let head = builder.next(&mut parts, span, "clause header")?;
            let clause = builder.clause(head)?;
            let inline = parts
                .next()
                .map(|stmts| builder.simple_stmts(stmts))
                .transpose()?;
            LineKind::Header { clause, inline }
        }
        _ => return Err(ctx.internal_error("unexpected line rule", to_source_span(span))),
    };

    Ok(ParsedLine {
        indent: line.indent,
        span,
        kind,
    })
}

/// Turns pest pairs for one line into syntax nodes; `offset` maps line-local
/// positions back into the full source.
struct Builder<'a> {
    ctx: &'a DiagnosticContext,
    offset: usize,
}

impl<'a> Builder<'a> {
    fn span(&self, pair: &Pair<Rule>) -> Span {
        let span = pair.as_span();
        Span::new(self.offset + span.start(), self.offset + span.end())
    }

    fn next<'i>(
        &self,
        pairs: &mut impl Iterator<Item = Pair<'i, Rule>>,
        span: Span,
        element: &str,
    ) -> Result<Pair<'i, Rule>, EditorError> {
        pairs.next().ok_or_else(|| {
            self.ctx
                .internal_error(&format!("missing {}", element), to_source_span(span))
        })
    }

    /// Next pair that is not a keyword token.
    fn next_operand<'i>(
        &self,
        pairs: &mut impl Iterator<Item = Pair<'i, Rule>>,
        span: Span,
    ) -> Result<Pair<'i, Rule>, EditorError> {
        loop {
            let pair = self.next(pairs, span, "operand")?;
            if !is_keyword(pair.as_rule()) {
                return Ok(pair);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn simple_stmts(&self, pair: Pair<Rule>) -> Result<Vec<StmtNode>, EditorError> {
        pair.into_inner().map(|p| self.simple_stmt(p)).collect()
    }

    fn simple_stmt(&self, pair: Pair<Rule>) -> Result<StmtNode, EditorError> {
        let span = self.span(&pair);
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();

        let stmt = match rule {
            Rule::pass_stmt => Stmt::Pass,
            Rule::break_stmt => Stmt::Break,
            Rule::continue_stmt => Stmt::Continue,
            Rule::return_stmt => {
                inner.next(); // return
                Stmt::Return(inner.next().map(|p| self.expr(p)).transpose()?)
            }
            Rule::raise_stmt => {
                inner.next(); // raise
                Stmt::Raise(inner.next().map(|p| self.expr(p)).transpose()?)
            }
            Rule::assert_stmt => {
                inner.next(); // assert
                let test = self.expr(self.next(&mut inner, span, "assert test")?)?;
                let msg = inner.next().map(|p| self.expr(p)).transpose()?;
                Stmt::Assert { test, msg }
            }
            Rule::del_stmt => {
                inner.next(); // del
                let targets = self.expr(self.next(&mut inner, span, "del targets")?)?;
                let targets = match targets.value {
                    Expr::Tuple(items) => items,
                    _ => vec![targets],
                };
                for target in &targets {
                    self.check_target(target)?;
                }
                Stmt::Delete(targets)
            }
            Rule::global_stmt => Stmt::Global(
                inner
                    .filter(|p| p.as_rule() == Rule::identifier)
                    .map(|p| p.as_str().to_string())
                    .collect(),
            ),
            Rule::import_stmt => Stmt::Import(
                inner
                    .filter(|p| p.as_rule() == Rule::dotted_as_name)
                    .filter_map(|p| p.into_inner().next())
                    .map(|p| p.as_str().to_string())
                    .collect(),
            ),
            Rule::from_import_stmt => {
                inner.next(); // from
                let module = self.next(&mut inner, span, "module path")?.as_str().to_string();
                inner.next(); // import
                let targets = self.next(&mut inner, span, "import targets")?;
                let names = match targets.into_inner().next() {
                    None => vec!["*".to_string()],
                    Some(names) => names
                        .into_inner()
                        .filter_map(|p| p.into_inner().next())
                        .map(|p| p.as_str().to_string())
                        .collect(),
                };
                Stmt::ImportFrom { module, names }
            }
            Rule::yield_stmt => Stmt::Expr(self.expr(self.next(&mut inner, span, "yield")?)?),
            Rule::assignment_stmt => self.assignment(inner, span)?,
            _ => {
                return Err(self
                    .ctx
                    .internal_error("unexpected statement rule", to_source_span(span)))
            }
        };

        Ok(Spanned { value: stmt, span })
    }

    /// An expression statement or one of the assignment forms, told apart by
    /// what follows the leading expression.
    fn assignment(&self, mut inner: Pairs<Rule>, span: Span) -> Result<Stmt, EditorError> {
        let first = self.expr(self.next(&mut inner, span, "expression")?)?;
        let Some(tail) = inner.next() else {
            return Ok(Stmt::Expr(first));
        };

        match tail.as_rule() {
            Rule::aug_op => {
                let op = aug_op(tail.as_str());
                let value = self.expr(self.next(&mut inner, span, "value")?)?;
                if !matches!(
                    first.value,
                    Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. }
                ) {
                    return Err(self.invalid_target(&first));
                }
                Ok(Stmt::AugAssign {
                    target: first,
                    op,
                    value,
                })
            }
            Rule::annotation => {
                self.check_target(&first)?;
                let annotation = self.expr(self.next(&mut tail.into_inner(), span, "annotation")?)?;
                let value = inner.next().map(|p| self.expr(p)).transpose()?;
                Ok(Stmt::AnnAssign {
                    target: first,
                    annotation,
                    value,
                })
            }
            _ => {
                let mut parts = vec![first, self.expr(tail)?];
                for part in inner {
                    parts.push(self.expr(part)?);
                }
                let value = parts
                    .pop()
                    .ok_or_else(|| self.ctx.malformed("assignment", to_source_span(span)))?;
                for target in &parts {
                    self.check_target(target)?;
                }
                Ok(Stmt::Assign {
                    targets: parts,
                    value,
                })
            }
        }
    }

    fn clause(&self, pair: Pair<Rule>) -> Result<Clause, EditorError> {
        let span = self.span(&pair);
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();
        let is_async = inner.clone().any(|p| p.as_rule() == Rule::kw_async);

        Ok(match rule {
            Rule::if_head => Clause::If(self.expr(self.next_operand(&mut inner, span)?)?),
            Rule::elif_head => Clause::Elif(self.expr(self.next_operand(&mut inner, span)?)?),
            Rule::else_head => Clause::Else,
            Rule::while_head => Clause::While(self.expr(self.next_operand(&mut inner, span)?)?),
            Rule::for_head => {
                let target = self.expr(self.next_operand(&mut inner, span)?)?;
                self.check_target(&target)?;
                let iter = self.expr(self.next_operand(&mut inner, span)?)?;
                Clause::For {
                    target,
                    iter,
                    is_async,
                }
            }
            Rule::def_head => {
                let name = self.next_operand(&mut inner, span)?.as_str().to_string();
                let params = match inner.next() {
                    Some(p) if p.as_rule() == Rule::params => param_names(p),
                    _ => Vec::new(),
                };
                Clause::Def {
                    name,
                    params,
                    is_async,
                }
            }
            Rule::class_head => {
                let name = self.next_operand(&mut inner, span)?.as_str().to_string();
                let bases = match inner.next() {
                    Some(args) => self.call_args(args)?.0,
                    None => Vec::new(),
                };
                Clause::Class { name, bases }
            }
            Rule::try_head => Clause::Try,
            Rule::except_head => {
                inner.next(); // except
                let kind = inner.next().map(|p| self.expr(p)).transpose()?;
                let name = inner
                    .find(|p| p.as_rule() == Rule::identifier)
                    .map(|p| p.as_str().to_string());
                Clause::Except { kind, name }
            }
            Rule::finally_head => Clause::Finally,
            Rule::with_head => Clause::With {
                items: inner
                    .filter(|p| p.as_rule() == Rule::with_item)
                    .filter_map(|item| item.into_inner().next())
                    .map(|p| self.expr(p))
                    .collect::<Result<Vec<_>, _>>()?,
                is_async,
            },
            _ => {
                return Err(self
                    .ctx
                    .internal_error("unexpected clause rule", to_source_span(span)))
            }
        })
    }

    fn check_target(&self, target: &ExprNode) -> Result<(), EditorError> {
        match &target.value {
            Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. } => Ok(()),
            Expr::Tuple(items) | Expr::List(items) => {
                let starred = items
                    .iter()
                    .filter(|item| matches!(item.value, Expr::Starred(_)))
                    .count();
                if starred > 1 {
                    return Err(self.ctx.report(
                        ErrorKind::InvalidTarget {
                            target: "multiple starred expressions".to_string(),
                        },
                        to_source_span(target.span),
                    ));
                }
                items.iter().try_for_each(|item| self.check_target(item))
            }
            Expr::Starred(inner) => self.check_target(inner),
            _ => Err(self.invalid_target(target)),
        }
    }

    fn invalid_target(&self, target: &ExprNode) -> EditorError {
        self.ctx.report(
            ErrorKind::InvalidTarget {
                target: target.value.form_name().to_string(),
            },
            to_source_span(target.span),
        )
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expr(&self, pair: Pair<Rule>) -> Result<ExprNode, EditorError> {
        let span = self.span(&pair);
        let rule = pair.as_rule();

        match rule {
            Rule::expression => self.expression(pair, span),
            Rule::operation => self.operation(pair, span),

            Rule::primary => {
                let mut inner = pair.into_inner();
                let mut current = self.expr(self.next(&mut inner, span, "atom")?)?;
                for trailer in inner {
                    current = self.trailer(current, trailer)?;
                }
                Ok(current)
            }

            Rule::star_expressions | Rule::target_list => {
                let (mut items, trailing_comma) = self.items(pair.into_inner())?;
                if items.len() == 1 && !trailing_comma {
                    return items
                        .pop()
                        .ok_or_else(|| self.ctx.malformed("expression", to_source_span(span)));
                }
                Ok(node(Expr::Tuple(items), span))
            }

            Rule::starred | Rule::star_target => {
                let value = self.expr(self.next(&mut pair.into_inner(), span, "starred value")?)?;
                Ok(node(Expr::Starred(Box::new(value)), span))
            }

            Rule::named_expr => {
                let mut inner = pair.into_inner();
                let target = self.expr(self.next(&mut inner, span, "name")?)?;
                let value = self.expr(self.next(&mut inner, span, "value")?)?;
                Ok(node(
                    Expr::NamedExpr {
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                    span,
                ))
            }

            Rule::lambda_expr => self.lambda(pair, span),
            Rule::yield_expr => self.yield_expr(pair, span),
            Rule::paren_expr => self.paren(pair, span),
            Rule::list_display => self.list_display(pair, span),
            Rule::brace_display => self.brace_display(pair, span),
            Rule::strings => self.strings(pair, span),
            Rule::integer | Rule::float | Rule::imaginary => self.number(pair, span),

            Rule::none_lit => Ok(node(Expr::Constant(Constant::None), span)),
            Rule::true_lit => Ok(node(Expr::Constant(Constant::Bool(true)), span)),
            Rule::false_lit => Ok(node(Expr::Constant(Constant::Bool(false)), span)),
            Rule::ellipsis => Ok(node(Expr::Constant(Constant::Ellipsis), span)),
            Rule::identifier => Ok(node(Expr::Name(pair.as_str().to_string()), span)),

            _ => Err(self.ctx.internal_error(
                &format!("unexpected expression rule {:?}", rule),
                to_source_span(span),
            )),
        }
    }

    fn expression(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let mut inner = pair.into_inner();
        let body = self.expr(self.next(&mut inner, span, "expression")?)?;
        if inner.next().is_none() {
            return Ok(body);
        }
        let test = self.expr(self.next(&mut inner, span, "condition")?)?;
        inner.next(); // else
        let orelse = self.expr(self.next(&mut inner, span, "else branch")?)?;
        Ok(node(
            Expr::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            span,
        ))
    }

    /// Fold a flat run of prefix operators, operands and infix operators by
    /// binding power.
    fn operation(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let mut tokens = pair.into_inner().peekable();
        Ok(self.climb(&mut tokens, 0, span)?.node)
    }

    fn climb<'i>(
        &self,
        tokens: &mut Peekable<Pairs<'i, Rule>>,
        min_power: u8,
        span: Span,
    ) -> Result<Operand, EditorError> {
        let first = self.next(tokens, span, "operand")?;
        let mut lhs = match prefix_power(first.as_rule()) {
            Some(power) => {
                let operand = self.climb(tokens, power, span)?.node;
                Operand::closed(self.prefix(first, operand)?)
            }
            None => Operand::closed(self.expr(first)?),
        };

        while let Some((left, right)) = tokens.peek().and_then(|op| infix_power(op.as_rule())) {
            if left < min_power {
                break;
            }
            let op = self.next(tokens, span, "operator")?;
            let rhs = self.climb(tokens, right, span)?.node;
            lhs = self.infix(lhs, op, rhs)?;
        }
        Ok(lhs)
    }

    fn prefix(&self, op: Pair<Rule>, operand: ExprNode) -> Result<ExprNode, EditorError> {
        let span = self.span(&op).to(operand.span);
        let expr = match op.as_rule() {
            Rule::kw_await => Expr::Await(Box::new(operand)),
            Rule::kw_not => Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            _ => {
                let op = match self.bin_op(op)? {
                    BinOp::Sub => UnaryOp::Neg,
                    _ => UnaryOp::Pos,
                };
                Expr::UnaryOp {
                    op,
                    operand: Box::new(operand),
                }
            }
        };
        Ok(node(expr, span))
    }

    fn infix(&self, lhs: Operand, op: Pair<Rule>, rhs: ExprNode) -> Result<Operand, EditorError> {
        let span = lhs.node.span.to(rhs.span);
        let Operand {
            node: mut left,
            open,
        } = lhs;

        match op.as_rule() {
            Rule::kw_or | Rule::kw_and => {
                let bool_op = if op.as_rule() == Rule::kw_or {
                    BoolOp::Or
                } else {
                    BoolOp::And
                };
                let chain = Chain::Bool(bool_op);
                if open == Some(chain) {
                    if let Expr::BoolOp { values, .. } = &mut left.value {
                        values.push(rhs);
                        left.span = span;
                        return Ok(Operand { node: left, open });
                    }
                }
                Ok(Operand {
                    node: node(
                        Expr::BoolOp {
                            op: bool_op,
                            values: vec![left, rhs],
                        },
                        span,
                    ),
                    open: Some(chain),
                })
            }

            Rule::comp_op => {
                let cmp = self.cmp_op(op)?;
                if open == Some(Chain::Compare) {
                    if let Expr::Compare {
                        ops, comparators, ..
                    } = &mut left.value
                    {
                        ops.push(cmp);
                        comparators.push(rhs);
                        left.span = span;
                        return Ok(Operand { node: left, open });
                    }
                }
                Ok(Operand {
                    node: node(
                        Expr::Compare {
                            left: Box::new(left),
                            ops: vec![cmp],
                            comparators: vec![rhs],
                        },
                        span,
                    ),
                    open: Some(Chain::Compare),
                })
            }

            _ => {
                let op = if op.as_rule() == Rule::pow_op {
                    BinOp::Pow
                } else {
                    self.bin_op(op)?
                };
                Ok(Operand::closed(node(
                    Expr::BinOp {
                        left: Box::new(left),
                        op,
                        right: Box::new(rhs),
                    },
                    span,
                )))
            }
        }
    }

    /// Comma-separated items, and whether a trailing comma followed them.
    fn items<'i>(
        &self,
        pairs: impl Iterator<Item = Pair<'i, Rule>>,
    ) -> Result<(Vec<ExprNode>, bool), EditorError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        for p in pairs {
            if p.as_rule() == Rule::trailing_comma {
                trailing_comma = true;
            } else {
                items.push(self.expr(p)?);
            }
        }
        Ok((items, trailing_comma))
    }

    fn paren(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let mut inner = pair.into_inner().peekable();
        let Some(first) = inner.next() else {
            return Ok(node(Expr::Tuple(Vec::new()), span));
        };
        if is_comprehension(&mut inner) {
            return self.comprehension(first, inner, ComprehensionKind::Generator, span);
        }

        let first = self.expr(first)?;
        let (rest, trailing_comma) = self.items(inner)?;
        if rest.is_empty() && !trailing_comma {
            return Ok(first);
        }
        let mut items = vec![first];
        items.extend(rest);
        Ok(node(Expr::Tuple(items), span))
    }

    fn list_display(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let mut inner = pair.into_inner().peekable();
        let Some(first) = inner.next() else {
            return Ok(node(Expr::List(Vec::new()), span));
        };
        if is_comprehension(&mut inner) {
            return self.comprehension(first, inner, ComprehensionKind::List, span);
        }
        let mut items = vec![self.expr(first)?];
        items.extend(self.items(inner)?.0);
        Ok(node(Expr::List(items), span))
    }

    fn brace_display(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let mut inner = pair.into_inner().peekable();
        let Some(first) = inner.next() else {
            return Ok(node(Expr::Dict(Vec::new()), span));
        };
        if is_comprehension(&mut inner) {
            return self.comprehension(first, inner, ComprehensionKind::Set, span);
        }

        let first = self.expr(first)?;
        let tail = match inner.peek() {
            Some(p) if p.as_rule() == Rule::dict_tail => inner.next(),
            _ => None,
        };
        let Some(tail) = tail else {
            let mut items = vec![first];
            items.extend(self.items(inner)?.0);
            return Ok(node(Expr::Set(items), span));
        };

        let tail_span = self.span(&tail);
        let mut tail = tail.into_inner();
        let value = self.expr(self.next(&mut tail, tail_span, "value")?)?;
        let mut entries = vec![(first, value)];
        for item in tail {
            let item_span = self.span(&item);
            let mut kv = item.into_inner();
            let key = self.expr(self.next(&mut kv, item_span, "key")?)?;
            let value = self.expr(self.next(&mut kv, item_span, "value")?)?;
            entries.push((key, value));
        }
        Ok(node(Expr::Dict(entries), span))
    }

    fn lambda(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let mut params = Vec::new();
        let mut body = None;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::kw_lambda => {}
                Rule::lambda_params => params = param_names(part),
                _ => body = Some(self.expr(part)?),
            }
        }
        let body = body.ok_or_else(|| self.ctx.malformed("lambda", to_source_span(span)))?;
        Ok(node(
            Expr::Lambda {
                params,
                body: Box::new(body),
            },
            span,
        ))
    }

    fn yield_expr(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let mut inner = pair.into_inner();
        inner.next(); // yield
        let expr = match inner.next() {
            None => Expr::Yield(None),
            Some(p) if p.as_rule() == Rule::kw_from => {
                let iterable = self.expr(self.next(&mut inner, span, "iterable")?)?;
                Expr::YieldFrom(Box::new(iterable))
            }
            Some(p) => Expr::Yield(Some(Box::new(self.expr(p)?))),
        };
        Ok(node(expr, span))
    }

    fn number(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let text = pair.as_str().replace('_', "");
        let constant = match pair.as_rule() {
            Rule::imaginary => {
                let digits = text.trim_end_matches(['j', 'J']);
                Constant::Imaginary(
                    digits
                        .parse::<f64>()
                        .map_err(|_| self.invalid_literal("imaginary", pair.as_str(), span))?,
                )
            }
            Rule::float => Constant::Float(
                text.parse::<f64>()
                    .map_err(|_| self.invalid_literal("float", pair.as_str(), span))?,
            ),
            _ => {
                let (digits, radix) = match text.get(..2) {
                    Some("0x") | Some("0X") => (&text[2..], 16),
                    Some("0o") | Some("0O") => (&text[2..], 8),
                    Some("0b") | Some("0B") => (&text[2..], 2),
                    _ => (text.as_str(), 10),
                };
                match i64::from_str_radix(digits, radix) {
                    Ok(value) => Constant::Int(value),
                    Err(_) if radix == 10 => Constant::Float(
                        digits
                            .parse::<f64>()
                            .map_err(|_| self.invalid_literal("integer", pair.as_str(), span))?,
                    ),
                    Err(_) => return Err(self.invalid_literal("integer", pair.as_str(), span)),
                }
            }
        };
        Ok(node(Expr::Constant(constant), span))
    }

    fn trailer(&self, value: ExprNode, pair: Pair<Rule>) -> Result<ExprNode, EditorError> {
        let span = value.span.to(self.span(&pair));
        let expr = match pair.as_rule() {
            Rule::call => {
                let (args, keywords) = match pair.into_inner().next() {
                    Some(args) => self.call_args(args)?,
                    None => (Vec::new(), Vec::new()),
                };
                Expr::Call {
                    func: Box::new(value),
                    args,
                    keywords,
                }
            }
            Rule::attribute => {
                let attr = pair
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                Expr::Attribute {
                    value: Box::new(value),
                    attr,
                }
            }
            Rule::subscript => Expr::Subscript {
                value: Box::new(value),
                index: Box::new(self.subscript(pair, span)?),
            },
            _ => {
                return Err(self
                    .ctx
                    .internal_error("unexpected trailer", to_source_span(span)))
            }
        };
        Ok(node(expr, span))
    }

    /// The index inside `[...]`: a slice, a single expression or a tuple.
    fn subscript(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let mut inner = pair.into_inner().peekable();
        let first = self.next(&mut inner, span, "subscript")?;
        if first.as_rule() == Rule::slice {
            return self.slice(None, first);
        }

        let first = self.expr(first)?;
        if let Some(slice) = inner.next_if(|p| p.as_rule() == Rule::slice) {
            return self.slice(Some(first), slice);
        }
        let (rest, trailing_comma) = self.items(inner)?;
        if rest.is_empty() && !trailing_comma {
            return Ok(first);
        }
        let tuple_span = rest.last().map_or(first.span, |last| first.span.to(last.span));
        let mut items = vec![first];
        items.extend(rest);
        Ok(node(Expr::Tuple(items), tuple_span))
    }

    fn slice(&self, lower: Option<ExprNode>, pair: Pair<Rule>) -> Result<ExprNode, EditorError> {
        let span = match &lower {
            Some(lower) => lower.span.to(self.span(&pair)),
            None => self.span(&pair),
        };
        let mut upper = None;
        let mut step = None;
        for part in pair.into_inner() {
            let rule = part.as_rule();
            let value = part
                .into_inner()
                .next()
                .map(|p| self.expr(p))
                .transpose()?
                .map(Box::new);
            match rule {
                Rule::slice_upper => upper = value,
                _ => step = value,
            }
        }
        Ok(node(
            Expr::Slice {
                lower: lower.map(Box::new),
                upper,
                step,
            },
            span,
        ))
    }

    fn call_args(&self, pair: Pair<Rule>) -> Result<(Vec<ExprNode>, Vec<Keyword>), EditorError> {
        let args_span = self.span(&pair);
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        let mut inner = pair.into_inner().peekable();

        while let Some(arg) = inner.next() {
            let span = self.span(&arg);
            if is_comprehension(&mut inner) {
                if arg.as_rule() != Rule::expression {
                    return Err(self.ctx.malformed("generator argument", to_source_span(span)));
                }
                args.push(self.comprehension(
                    arg,
                    &mut inner,
                    ComprehensionKind::Generator,
                    args_span,
                )?);
                break;
            }
            match arg.as_rule() {
                Rule::keyword_arg => {
                    let mut inner = arg.into_inner();
                    let name = self.next(&mut inner, span, "keyword")?.as_str().to_string();
                    let value = self.expr(self.next(&mut inner, span, "keyword value")?)?;
                    keywords.push(Keyword {
                        arg: Some(name),
                        value,
                    });
                }
                Rule::double_star_arg => {
                    let mut inner = arg.into_inner();
                    let value = self.expr(self.next(&mut inner, span, "mapping")?)?;
                    keywords.push(Keyword { arg: None, value });
                }
                Rule::star_arg => {
                    let mut inner = arg.into_inner();
                    let value = self.expr(self.next(&mut inner, span, "iterable")?)?;
                    args.push(node(Expr::Starred(Box::new(value)), span));
                }
                _ => args.push(self.expr(arg)?),
            }
        }
        Ok((args, keywords))
    }

    fn comprehension<'i>(
        &self,
        element: Pair<'i, Rule>,
        clauses: impl Iterator<Item = Pair<'i, Rule>>,
        kind: ComprehensionKind,
        span: Span,
    ) -> Result<ExprNode, EditorError> {
        let element = self.expr(element)?;
        let clauses = clauses
            .map(|comp_for| {
                let for_span = self.span(&comp_for);
                let mut parts = comp_for.into_inner();
                let target = self.expr(self.next_operand(&mut parts, for_span)?)?;
                self.check_target(&target)?;
                let iter = self.expr(self.next_operand(&mut parts, for_span)?)?;
                let conditions = parts
                    .filter_map(|comp_if| comp_if.into_inner().nth(1))
                    .map(|p| self.expr(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ComprehensionClause {
                    target,
                    iter,
                    conditions,
                })
            })
            .collect::<Result<Vec<_>, EditorError>>()?;
        Ok(node(
            Expr::Comprehension {
                kind,
                element: Box::new(element),
                clauses,
            },
            span,
        ))
    }

    fn strings(&self, pair: Pair<Rule>, span: Span) -> Result<ExprNode, EditorError> {
        let mut text = String::new();
        let mut bytes = false;
        let mut formatted = false;

        for piece in pair.into_inner() {
            let raw = piece.as_str();
            let quote_at = raw.find(['"', '\'']).unwrap_or(0);
            let prefix = raw[..quote_at].to_ascii_lowercase();
            let quoted = &raw[quote_at..];
            let quote_len = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
                3
            } else {
                1
            };
            let body = quoted
                .get(quote_len..quoted.len().saturating_sub(quote_len))
                .unwrap_or_default();

            bytes |= prefix.contains('b');
            formatted |= prefix.contains('f');
            if prefix.contains('r') {
                text.push_str(body);
            } else {
                text.push_str(&unescape_string(body));
            }
        }

        let expr = if formatted {
            Expr::FormattedString(text)
        } else if bytes {
            Expr::Constant(Constant::Bytes(text.into_bytes()))
        } else {
            Expr::Constant(Constant::Str(text))
        };
        Ok(node(expr, span))
    }

    fn cmp_op(&self, pair: Pair<Rule>) -> Result<CmpOp, EditorError> {
        let span = self.span(&pair);
        let op = self.next(&mut pair.into_inner(), span, "comparison operator")?;
        Ok(match op.as_rule() {
            Rule::op_eq => CmpOp::Eq,
            Rule::op_ne => CmpOp::NotEq,
            Rule::op_le => CmpOp::LtE,
            Rule::op_ge => CmpOp::GtE,
            Rule::op_lt => CmpOp::Lt,
            Rule::op_gt => CmpOp::Gt,
            Rule::op_not_in => CmpOp::NotIn,
            Rule::op_is_not => CmpOp::IsNot,
            Rule::op_in => CmpOp::In,
            _ => CmpOp::Is,
        })
    }

    fn bin_op(&self, pair: Pair<Rule>) -> Result<BinOp, EditorError> {
        let span = self.span(&pair);
        let op = self.next(&mut pair.into_inner(), span, "operator")?;
        Ok(match op.as_rule() {
            Rule::op_add => BinOp::Add,
            Rule::op_sub => BinOp::Sub,
            Rule::op_mul => BinOp::Mul,
            Rule::op_div => BinOp::Div,
            Rule::op_floordiv => BinOp::FloorDiv,
            _ => BinOp::Mod,
        })
    }

    fn invalid_literal(&self, literal_type: &str, value: &str, span: Span) -> EditorError {
        self.ctx.report(
            ErrorKind::InvalidLiteral {
                literal_type: literal_type.into(),
                value: value.into(),
            },
            to_source_span(span),
        )
    }
}

// ============================================================================
// BLOCK ASSEMBLY
// ============================================================================

/// Nests compound headers and their indented bodies.
struct Assembler<'a> {
    lines: Vec<ParsedLine>,
    pos: usize,
    ctx: &'a DiagnosticContext,
}

impl<'a> Assembler<'a> {
    fn peek(&self) -> Option<&ParsedLine> {
        self.lines.get(self.pos)
    }

    /// Statements at exactly `level`, stopping at the first dedent.
    fn block(&mut self, level: usize) -> Result<Vec<StmtNode>, EditorError> {
        let mut body = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent < level {
                break;
            }
            if line.indent > level {
                return Err(self
                    .ctx
                    .report(ErrorKind::UnexpectedIndent, to_source_span(line.span)));
            }
            self.statement(level, &mut body)?;
        }
        Ok(body)
    }

    fn statement(&mut self, level: usize, body: &mut Vec<StmtNode>) -> Result<(), EditorError> {
        let Some(line) = self.lines.get_mut(self.pos) else {
            return Ok(());
        };
        let header_span = line.span;
        let kind = std::mem::replace(&mut line.kind, LineKind::Simple(Vec::new()));
        self.pos += 1;

        let (clause, inline) = match kind {
            LineKind::Simple(stmts) => {
                body.extend(stmts);
                return Ok(());
            }
            LineKind::Decorator(decorator) => {
                return self.decorated(level, decorator, header_span, body);
            }
            LineKind::Header { clause, inline } => (clause, inline),
        };

        let keyword = clause.keyword();
        let stmt = match clause {
            Clause::If(test) => {
                let if_body = self.suite(level, inline, keyword, header_span)?;
                let orelse = self.else_chain(level)?;
                Stmt::If {
                    test,
                    body: if_body,
                    orelse,
                }
            }
            Clause::While(test) => {
                let loop_body = self.suite(level, inline, keyword, header_span)?;
                let orelse = self.optional_else(level)?;
                Stmt::While {
                    test,
                    body: loop_body,
                    orelse,
                }
            }
            Clause::For {
                target,
                iter,
                is_async,
            } => {
                let loop_body = self.suite(level, inline, keyword, header_span)?;
                let orelse = self.optional_else(level)?;
                Stmt::For {
                    target,
                    iter,
                    body: loop_body,
                    orelse,
                    is_async,
                }
            }
            Clause::Def {
                name,
                params,
                is_async,
            } => Stmt::FunctionDef {
                name,
                params,
                body: self.suite(level, inline, keyword, header_span)?,
                decorators: Vec::new(),
                is_async,
            },
            Clause::Class { name, bases } => Stmt::ClassDef {
                name,
                bases,
                body: self.suite(level, inline, keyword, header_span)?,
                decorators: Vec::new(),
            },
            Clause::With { items, is_async } => Stmt::With {
                items,
                body: self.suite(level, inline, keyword, header_span)?,
                is_async,
            },
            Clause::Try => self.try_statement(level, inline, header_span)?,
            Clause::Elif(_) | Clause::Else | Clause::Except { .. } | Clause::Finally => {
                let expected = match keyword {
                    "except" | "finally" => "try",
                    _ => "if",
                };
                return Err(self.ctx.report(
                    ErrorKind::DanglingClause {
                        clause: keyword.to_string(),
                        expected: expected.to_string(),
                    },
                    to_source_span(header_span),
                ));
            }
        };

        let span = Span::new(header_span.start, self.last_end(header_span));
        body.push(Spanned { value: stmt, span });
        Ok(())
    }

    /// Decorator lines and the `def` or `class` they apply to.
    fn decorated(
        &mut self,
        level: usize,
        first: ExprNode,
        start: Span,
        body: &mut Vec<StmtNode>,
    ) -> Result<(), EditorError> {
        let mut decorators = vec![first];
        loop {
            match self.lines.get_mut(self.pos) {
                Some(line) if line.indent == level && matches!(line.kind, LineKind::Decorator(_)) => {
                    let kind = std::mem::replace(&mut line.kind, LineKind::Simple(Vec::new()));
                    self.pos += 1;
                    if let LineKind::Decorator(decorator) = kind {
                        decorators.push(decorator);
                    }
                }
                Some(line)
                    if line.indent == level
                        && matches!(
                            &line.kind,
                            LineKind::Header {
                                clause: Clause::Def { .. } | Clause::Class { .. },
                                ..
                            }
                        ) =>
                {
                    break
                }
                _ => {
                    return Err(self
                        .ctx
                        .malformed("decorator", to_source_span(start))
                        .with_help("a decorator must be followed by 'def' or 'class'"))
                }
            }
        }

        self.statement(level, body)?;
        if let Some(stmt) = body.last_mut() {
            if let Stmt::FunctionDef {
                decorators: slot, ..
            }
            | Stmt::ClassDef {
                decorators: slot, ..
            } = &mut stmt.value
            {
                *slot = decorators;
            }
            stmt.span = start.to(stmt.span);
        }
        Ok(())
    }

    /// The body of a clause: its inline statements or the indented block below it.
    fn suite(
        &mut self,
        level: usize,
        inline: Option<Vec<StmtNode>>,
        header: &str,
        header_span: Span,
    ) -> Result<Vec<StmtNode>, EditorError> {
        if let Some(stmts) = inline {
            return Ok(stmts);
        }

        let body_level = match self.peek() {
            Some(next) if next.indent > level => next.indent,
            _ => {
                return Err(self.ctx.report(
                    ErrorKind::ExpectedBlock {
                        header: header.to_string(),
                    },
                    to_source_span(header_span),
                ))
            }
        };

        let body = self.block(body_level)?;
        if let Some(next) = self.peek() {
            if next.indent > level {
                return Err(self
                    .ctx
                    .report(ErrorKind::InconsistentDedent, to_source_span(next.span)));
            }
        }
        Ok(body)
    }

    /// Continuation clause at the same level, consumed only if `accept` holds for it.
    fn take_clause(
        &mut self,
        level: usize,
        accept: fn(&Clause) -> bool,
    ) -> Option<(Clause, Option<Vec<StmtNode>>, Span)> {
        let line = self.lines.get_mut(self.pos)?;
        if line.indent != level {
            return None;
        }
        let accepted = matches!(&line.kind, LineKind::Header { clause, .. } if accept(clause));
        if !accepted {
            return None;
        }
        let span = line.span;
        let kind = std::mem::replace(&mut line.kind, LineKind::Simple(Vec::new()));
        self.pos += 1;
        match kind {
            LineKind::Header { clause, inline } => Some((clause, inline, span)),
            _ => None,
        }
    }

    fn else_chain(&mut self, level: usize) -> Result<Vec<StmtNode>, EditorError> {
        let Some((clause, inline, span)) =
            self.take_clause(level, |c| matches!(c, Clause::Elif(_) | Clause::Else))
        else {
            return Ok(Vec::new());
        };

        match clause {
            Clause::Elif(test) => {
                let body = self.suite(level, inline, "elif", span)?;
                let orelse = self.else_chain(level)?;
                let end = self.last_end(span);
                Ok(vec![Spanned {
                    value: Stmt::If { test, body, orelse },
                    span: Span::new(span.start, end),
                }])
            }
            _ => self.suite(level, inline, "else", span),
        }
    }

    fn optional_else(&mut self, level: usize) -> Result<Vec<StmtNode>, EditorError> {
        match self.take_clause(level, |c| matches!(c, Clause::Else)) {
            Some((_, inline, span)) => self.suite(level, inline, "else", span),
            None => Ok(Vec::new()),
        }
    }

    fn try_statement(
        &mut self,
        level: usize,
        inline: Option<Vec<StmtNode>>,
        header_span: Span,
    ) -> Result<Stmt, EditorError> {
        let body = self.suite(level, inline, "try", header_span)?;

        let mut handlers = Vec::new();
        while let Some((clause, inline, span)) =
            self.take_clause(level, |c| matches!(c, Clause::Except { .. }))
        {
            let Clause::Except { kind, name } = clause else {
                break;
            };
            let body = self.suite(level, inline, "except", span)?;
            handlers.push(ExceptHandler {
                kind,
                name,
                body,
                span: Span::new(span.start, self.last_end(span)),
            });
        }

        let orelse = if handlers.is_empty() {
            Vec::new()
        } else {
            self.optional_else(level)?
        };

        let finalbody = match self.take_clause(level, |c| matches!(c, Clause::Finally)) {
            Some((_, inline, span)) => self.suite(level, inline, "finally", span)?,
            None => Vec::new(),
        };

        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self
                .ctx
                .malformed("try statement without except or finally", to_source_span(header_span)));
        }

        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    /// End of the most recently consumed line, or `fallback` if nothing was consumed.
    fn last_end(&self, fallback: Span) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(|line| line.span.end.max(fallback.end))
            .unwrap_or(fallback.end)
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn node(expr: Expr, span: Span) -> ExprNode {
    Spanned { value: expr, span }
}

/// An operand while an operation is folded. `open` marks an unparenthesised
/// `and`/`or` or comparison chain that the next operator of the same kind
/// extends instead of nesting.
struct Operand {
    node: ExprNode,
    open: Option<Chain>,
}

impl Operand {
    fn closed(node: ExprNode) -> Self {
        Self { node, open: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chain {
    Bool(BoolOp),
    Compare,
}

/// Left and right binding power of an infix operator.
fn infix_power(rule: Rule) -> Option<(u8, u8)> {
    let power = match rule {
        Rule::kw_or => (2, 3),
        Rule::kw_and => (4, 5),
        Rule::comp_op => (8, 9),
        Rule::sum_op => (10, 11),
        Rule::term_op => (12, 13),
        Rule::pow_op => (16, 16),
        _ => return None,
    };
    Some(power)
}

/// Binding power a prefix operator parses its operand with.
fn prefix_power(rule: Rule) -> Option<u8> {
    match rule {
        Rule::kw_not => Some(6),
        Rule::unary_op => Some(14),
        Rule::kw_await => Some(18),
        _ => None,
    }
}

fn is_comprehension(pairs: &mut Peekable<Pairs<Rule>>) -> bool {
    pairs.peek().map_or(false, |p| p.as_rule() == Rule::comp_for)
}

/// Parameter names of a `def` or `lambda`, keeping `*`/`**` prefixes and
/// skipping the bare `*` and `/` markers.
fn param_names(params: Pair<Rule>) -> Vec<String> {
    params
        .into_inner()
        .filter_map(|param| {
            let text = param.as_str().split([':', '=']).next()?;
            let text = text.split_whitespace().collect::<String>();
            (!text.is_empty() && text != "*" && text != "/").then_some(text)
        })
        .collect()
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_and
            | Rule::kw_as
            | Rule::kw_async
            | Rule::kw_else
            | Rule::kw_for
            | Rule::kw_from
            | Rule::kw_if
            | Rule::kw_in
            | Rule::kw_not
            | Rule::kw_or
            | Rule::kw_def
            | Rule::kw_class
            | Rule::kw_elif
            | Rule::kw_while
            | Rule::kw_except
            | Rule::kw_with
    )
}

fn aug_op(text: &str) -> BinOp {
    match text.trim_end_matches('=') {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "**" => BinOp::Pow,
        "*" => BinOp::Mul,
        "//" => BinOp::FloorDiv,
        "/" => BinOp::Div,
        _ => BinOp::Mod,
    }
}

/// Decode backslash escapes the way Python does for non-raw literals.
fn unescape_string(body: &str) -> String {
    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('a') => result.push('\u{07}'),
            Some('b') => result.push('\u{08}'),
            Some('f') => result.push('\u{0C}'),
            Some('v') => result.push('\u{0B}'),
            Some('\\') => result.push('\\'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('\n') => {}
            Some('x') => push_code_point(&mut result, &mut chars, 2, 'x'),
            Some('u') => push_code_point(&mut result, &mut chars, 4, 'u'),
            Some('U') => push_code_point(&mut result, &mut chars, 8, 'U'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

fn push_code_point(
    result: &mut String,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    width: usize,
    marker: char,
) {
    let mut digits = String::with_capacity(width);
    while digits.len() < width {
        match chars.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                digits.push(*c);
                chars.next();
            }
            _ => break,
        }
    }
    match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
        Some(c) if digits.len() == width => result.push(c),
        _ => {
            result.push('\\');
            result.push(marker);
            result.push_str(&digits);
        }
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn convert_parse_error(
    error: pest::error::Error<Rule>,
    offset: usize,
    ctx: &DiagnosticContext,
) -> EditorError {
    let (start, end) = match error.location {
        pest::error::InputLocation::Pos(pos) => (pos, pos),
        pest::error::InputLocation::Span((start, end)) => (start, end),
    };
    let construct = match &error.variant {
        pest::error::ErrorVariant::ParsingError { positives, .. }
            if positives.contains(&Rule::expression) || positives.contains(&Rule::star_expressions) =>
        {
            "expression"
        }
        _ => "statement",
    };
    ctx.malformed(construct, (offset + start..offset + end).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCategory;

    fn parse_ok(source: &str) -> Module {
        parse_str(source).expect("source should parse")
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_ok("").body.is_empty());
        assert!(parse_ok("   \n\t\n").body.is_empty());
    }

    #[test]
    fn test_print_call() {
        let module = parse_ok("print(\"hi\")");
        assert_eq!(module.body.len(), 1);
        let Stmt::Expr(call) = &module.body[0].value else {
            panic!("expected expression statement");
        };
        let Expr::Call { func, args, keywords } = &call.value else {
            panic!("expected call");
        };
        assert_eq!(func.value.as_name(), Some("print"));
        assert_eq!(args.len(), 1);
        assert!(keywords.is_empty());
        assert_eq!(args[0].value, Expr::Constant(Constant::Str("hi".into())));
    }

    #[test]
    fn test_unmatched_paren() {
        let err = parse_str("print((1)").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Parse);
    }

    #[test]
    fn test_operator_precedence() {
        let module = parse_ok("x = 1 + 2 * 3");
        let Stmt::Assign { value, .. } = &module.body[0].value else {
            panic!("expected assignment");
        };
        let Expr::BinOp { op, right, .. } = &value.value else {
            panic!("expected binary op");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(right.value, Expr::BinOp { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_spans_point_into_source() {
        let source = "x = 1\nprint(x)\n";
        let module = parse_ok(source);
        let span = module.body[1].span;
        assert_eq!(&source[span.start..span.end], "print(x)");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_string(r"a\nb\t\\\'"), "a\nb\t\\'");
        assert_eq!(unescape_string(r"\x41é"), "Aé");
        assert_eq!(unescape_string(r"\q"), "\\q");
    }
}
