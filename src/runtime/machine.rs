//! The interpreter's execution machine.
//!
//! Runs a compiled [`Program`] one instruction at a time against a single
//! global namespace. The async driver checks the cancellation token before
//! every instruction and yields to the event loop every `yield_interval`
//! instructions, so a non-terminating program never starves the caller.

use std::cmp::Ordering;
use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::errors::{to_source_span, DiagnosticContext, EditorError, ErrorKind, ErrorReporting};
use crate::runtime::compile::{Instr, Program};
use crate::runtime::output::SharedOutput;
use crate::runtime::value::{range_item, range_len, Builtin, Value};
use crate::runtime::RunSummary;
use crate::syntax::{BinOp, BoolOp, CmpOp, Constant, Expr, ExprNode, Keyword, Span, UnaryOp};

type EvalResult = Result<Value, EditorError>;

enum Iter {
    Items { items: Vec<Value>, next: usize },
    Range { next: i64, step: i64, remaining: i128 },
}

impl Iterator for Iter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            Iter::Items { items, next } => {
                let item = items.get(*next).cloned();
                *next += 1;
                item
            }
            Iter::Range {
                next,
                step,
                remaining,
            } => {
                if *remaining <= 0 {
                    return None;
                }
                let item = Value::Int(*next);
                // Wraps only past the last element.
                *next = next.wrapping_add(*step);
                *remaining -= 1;
                Some(item)
            }
        }
    }
}

pub struct Machine {
    globals: HashMap<String, Value>,
    iterators: Vec<Iter>,
    output: SharedOutput,
    ctx: DiagnosticContext,
}

impl Machine {
    pub fn new(output: SharedOutput, ctx: DiagnosticContext) -> Self {
        Self {
            globals: HashMap::new(),
            iterators: Vec::new(),
            output,
            ctx,
        }
    }

    /// Run `program` to completion, cancellation, or the first error.
    pub async fn run(
        &mut self,
        program: &Program,
        cancel: &CancellationToken,
        yield_interval: usize,
    ) -> Result<RunSummary, EditorError> {
        let yield_interval = yield_interval.max(1) as u64;
        let mut pc = 0;
        let mut executed: u64 = 0;

        while let Some(instr) = program.instrs.get(pc) {
            if cancel.is_cancelled() {
                return Err(self.error(ErrorKind::Cancelled, instr.span()));
            }
            pc = self.step(instr, pc)?;
            executed += 1;
            if executed % yield_interval == 0 {
                tokio::task::yield_now().await;
            }
        }

        Ok(RunSummary {
            instructions: executed,
        })
    }

    /// Execute one instruction and return the next program counter.
    fn step(&mut self, instr: &Instr, pc: usize) -> Result<usize, EditorError> {
        match instr {
            Instr::Exec(expr) => {
                self.eval(expr)?;
            }
            Instr::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
            }
            Instr::AugAssign {
                target,
                op,
                value,
                span,
            } => {
                let current = self.eval(target)?;
                let rhs = self.eval(value)?;
                let result = self.binary(*op, current, rhs, *span)?;
                self.assign(target, result)?;
            }
            Instr::Delete(targets) => {
                for target in targets {
                    self.delete(target)?;
                }
            }
            Instr::JumpIfFalse { test, target } => {
                if !self.eval(test)?.is_truthy() {
                    return Ok(*target);
                }
            }
            Instr::Jump(target) => return Ok(*target),
            Instr::IterInit(expr) => {
                let iterable = self.eval(expr)?;
                let iter = self.iterate(iterable, expr.span)?;
                self.iterators.push(iter);
            }
            Instr::IterNext { target, exit } => {
                let next = self.iterators.last_mut().and_then(|iter| iter.next());
                match next {
                    Some(item) => self.assign(target, item)?,
                    None => {
                        self.iterators.pop();
                        return Ok(*exit);
                    }
                }
            }
            Instr::IterPop => {
                self.iterators.pop();
            }
            Instr::Assert { test, msg, span } => {
                if !self.eval(test)?.is_truthy() {
                    let message = match msg {
                        Some(msg) => self.eval(msg)?.to_string(),
                        None => String::new(),
                    };
                    return Err(self.error(ErrorKind::AssertionFailed { message }, *span));
                }
            }
            Instr::Unsupported { construct, span } => {
                return Err(self.ctx.unsupported(construct, to_source_span(*span)));
            }
        }
        Ok(pc + 1)
    }

    fn error(&self, kind: ErrorKind, span: Span) -> EditorError {
        self.ctx.report(kind, to_source_span(span))
    }

    fn type_error(&self, message: String, span: Span) -> EditorError {
        self.ctx.type_mismatch(message, to_source_span(span))
    }

    fn value_error(&self, message: impl Into<String>, span: Span) -> EditorError {
        self.error(
            ErrorKind::InvalidValue {
                message: message.into(),
            },
            span,
        )
    }

    // ------------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------------

    fn assign(&mut self, target: &ExprNode, value: Value) -> Result<(), EditorError> {
        match &target.value {
            Expr::Name(name) => {
                self.globals.insert(name.clone(), value);
                Ok(())
            }
            Expr::Tuple(targets) | Expr::List(targets) => {
                let mut items = self.iterate(value, target.span)?.collect::<Vec<_>>();
                let starred = targets
                    .iter()
                    .position(|t| matches!(t.value, Expr::Starred(_)));
                let fixed = targets.len() - usize::from(starred.is_some());
                let count_ok = match starred {
                    Some(_) => items.len() >= fixed,
                    None => items.len() == fixed,
                };
                if !count_ok {
                    let message = match starred {
                        Some(_) => format!(
                            "not enough values to unpack (expected at least {}, got {})",
                            fixed,
                            items.len()
                        ),
                        None if items.len() < fixed => format!(
                            "not enough values to unpack (expected {}, got {})",
                            fixed,
                            items.len()
                        ),
                        None => format!("too many values to unpack (expected {})", fixed),
                    };
                    return Err(self.value_error(message, target.span));
                }
                if let Some(at) = starred {
                    // The starred target takes the middle run as a list.
                    let tail = items.split_off(items.len() - (fixed - at));
                    let middle = items.split_off(at);
                    items.push(Value::List(middle));
                    items.extend(tail);
                }
                targets
                    .iter()
                    .zip(items)
                    .try_for_each(|(target, item)| match &target.value {
                        Expr::Starred(inner) => self.assign(inner, item),
                        _ => self.assign(target, item),
                    })
            }
            Expr::Subscript { .. } => {
                let (slot, _) = self.element_mut(target)?;
                *slot = value;
                Ok(())
            }
            _ => Err(self
                .ctx
                .unsupported(target.value.form_name(), to_source_span(target.span))),
        }
    }

    fn delete(&mut self, target: &ExprNode) -> Result<(), EditorError> {
        match &target.value {
            Expr::Name(name) => match self.globals.remove(name) {
                Some(_) => Ok(()),
                None => Err(self.error(ErrorKind::UndefinedName { name: name.clone() }, target.span)),
            },
            Expr::Subscript { value, index } => {
                let index = self.eval(index)?;
                let ctx = self.ctx.clone();
                let (container, _) = self.place_mut(value)?;
                match container {
                    Value::List(items) => {
                        let at = normalise_index(&index, items.len())
                            .ok_or_else(|| ctx.report(list_index_error(&index), to_source_span(target.span)))?;
                        items.remove(at);
                        Ok(())
                    }
                    other => Err(ctx.type_mismatch(
                        format!("'{}' object doesn't support item deletion", other.type_name()),
                        to_source_span(target.span),
                    )),
                }
            }
            Expr::Tuple(targets) | Expr::List(targets) => {
                targets.iter().try_for_each(|target| self.delete(target))
            }
            _ => Err(self
                .ctx
                .unsupported(target.value.form_name(), to_source_span(target.span))),
        }
    }

    /// Mutable slot for a subscript target `base[index]`.
    fn element_mut(&mut self, target: &ExprNode) -> Result<(&mut Value, Span), EditorError> {
        let Expr::Subscript { value, index } = &target.value else {
            return self.place_mut(target);
        };
        let index = self.eval(index)?;
        let ctx = self.ctx.clone();
        let (container, _) = self.place_mut(value)?;
        match container {
            Value::List(items) => {
                let at = normalise_index(&index, items.len())
                    .ok_or_else(|| ctx.report(list_index_error(&index), to_source_span(target.span)))?;
                Ok((&mut items[at], target.span))
            }
            other => Err(ctx.type_mismatch(
                format!(
                    "'{}' object does not support item assignment",
                    other.type_name()
                ),
                to_source_span(target.span),
            )),
        }
    }

    /// Mutable storage behind a name or nested subscript.
    fn place_mut(&mut self, expr: &ExprNode) -> Result<(&mut Value, Span), EditorError> {
        match &expr.value {
            Expr::Name(name) => match self.globals.get_mut(name) {
                Some(value) => Ok((value, expr.span)),
                None => Err(self
                    .ctx
                    .report(ErrorKind::UndefinedName { name: name.clone() }, to_source_span(expr.span))),
            },
            Expr::Subscript { .. } => self.element_mut(expr),
            _ => Err(self
                .ctx
                .unsupported(expr.value.form_name(), to_source_span(expr.span))),
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn eval(&mut self, expr: &ExprNode) -> EvalResult {
        let span = expr.span;
        match &expr.value {
            Expr::Constant(constant) => match constant {
                Constant::Int(n) => Ok(Value::Int(*n)),
                Constant::Float(f) => Ok(Value::Float(*f)),
                Constant::Str(s) => Ok(Value::Str(s.clone())),
                Constant::Bool(b) => Ok(Value::Bool(*b)),
                Constant::None => Ok(Value::None),
                Constant::Bytes(_) => Err(self.ctx.unsupported("bytes", to_source_span(span))),
                Constant::Ellipsis => Err(self.ctx.unsupported("Ellipsis", to_source_span(span))),
                Constant::Imaginary(_) => Err(self.ctx.unsupported("complex", to_source_span(span))),
            },

            Expr::Name(name) => match self.globals.get(name) {
                Some(value) => Ok(value.clone()),
                None => match Builtin::lookup(name) {
                    Some(builtin) => Ok(Value::Builtin(builtin)),
                    None => Err(self.error(ErrorKind::UndefinedName { name: name.clone() }, span)),
                },
            },

            Expr::BinOp { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, left, right, span)
            }

            Expr::UnaryOp { op, operand } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(f)),
                    (op, value) => match value.as_int() {
                        Some(n) if *op == UnaryOp::Neg => n
                            .checked_neg()
                            .map(Value::Int)
                            .ok_or_else(|| self.error(ErrorKind::Overflow, span)),
                        Some(n) => Ok(Value::Int(n)),
                        None => Err(self.type_error(
                            format!(
                                "bad operand type for unary {}: '{}'",
                                if *op == UnaryOp::Neg { "-" } else { "+" },
                                value.type_name()
                            ),
                            span,
                        )),
                    },
                }
            }

            Expr::BoolOp { op, values } => {
                let mut result = Value::None;
                for value in values {
                    result = self.eval(value)?;
                    let decided = match op {
                        BoolOp::And => !result.is_truthy(),
                        BoolOp::Or => result.is_truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(result)
            }

            Expr::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut current = self.eval(left)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    let next = self.eval(comparator)?;
                    if !self.compare(*op, &current, &next, span)? {
                        return Ok(Value::Bool(false));
                    }
                    current = next;
                }
                Ok(Value::Bool(true))
            }

            Expr::IfExp { test, body, orelse } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }

            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.eval(func)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match &arg.value {
                        Expr::Starred(inner) => {
                            let iterable = self.eval(inner)?;
                            values.extend(self.iterate(iterable, inner.span)?);
                        }
                        _ => values.push(self.eval(arg)?),
                    }
                }
                match callee {
                    Value::Builtin(builtin) => self.call_builtin(builtin, values, keywords, span),
                    other => Err(self.type_error(
                        format!("'{}' object is not callable", other.type_name()),
                        span,
                    )),
                }
            }

            Expr::Subscript { value, index } => {
                let container = self.eval(value)?;
                match &index.value {
                    Expr::Slice { lower, upper, step } => {
                        let lower = self.optional_int(lower.as_deref())?;
                        let upper = self.optional_int(upper.as_deref())?;
                        let step = self.optional_int(step.as_deref())?;
                        self.slice(container, lower, upper, step, span)
                    }
                    _ => {
                        let index = self.eval(index)?;
                        self.index(container, index, span)
                    }
                }
            }

            Expr::Tuple(items) => Ok(Value::Tuple(self.eval_items(items)?)),
            Expr::List(items) => Ok(Value::List(self.eval_items(items)?)),

            other => Err(self.ctx.unsupported(other.form_name(), to_source_span(span))),
        }
    }

    fn eval_items(&mut self, items: &[ExprNode]) -> Result<Vec<Value>, EditorError> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match &item.value {
                Expr::Starred(inner) => {
                    let iterable = self.eval(inner)?;
                    values.extend(self.iterate(iterable, inner.span)?);
                }
                _ => values.push(self.eval(item)?),
            }
        }
        Ok(values)
    }

    fn optional_int(&mut self, expr: Option<&ExprNode>) -> Result<Option<i64>, EditorError> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr)? {
            Value::None => Ok(None),
            value => match value.as_int() {
                Some(n) => Ok(Some(n)),
                None => Err(self.type_error(
                    "slice indices must be integers or None".to_string(),
                    expr.span,
                )),
            },
        }
    }

    fn iterate(&self, value: Value, span: Span) -> Result<Iter, EditorError> {
        match value {
            Value::List(items) | Value::Tuple(items) => Ok(Iter::Items { items, next: 0 }),
            Value::Str(s) => Ok(Iter::Items {
                items: s.chars().map(|c| Value::Str(c.to_string())).collect(),
                next: 0,
            }),
            Value::Range { start, step, .. } => Ok(Iter::Range {
                next: start,
                step,
                remaining: range_len(&value),
            }),
            other => Err(self.type_error(
                format!("'{}' object is not iterable", other.type_name()),
                span,
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------------

    fn binary(&self, op: BinOp, left: Value, right: Value, span: Span) -> EvalResult {
        if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
            return self.int_binary(op, a, b, span);
        }
        if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
            return self.float_binary(op, a, b, span);
        }

        match (op, left, right) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (BinOp::Add, Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (BinOp::Add, Value::Tuple(mut a), Value::Tuple(b)) => {
                a.extend(b);
                Ok(Value::Tuple(a))
            }
            (BinOp::Mul, seq, count) | (BinOp::Mul, count, seq)
                if count.as_int().is_some()
                    && matches!(seq, Value::Str(_) | Value::List(_) | Value::Tuple(_)) =>
            {
                let times = count.as_int().unwrap_or(0).max(0) as usize;
                Ok(match seq {
                    Value::Str(s) => Value::Str(s.repeat(times)),
                    Value::List(items) => Value::List(repeat_items(&items, times)),
                    Value::Tuple(items) => Value::Tuple(repeat_items(&items, times)),
                    other => other,
                })
            }
            (op, left, right) => Err(self.type_error(
                format!(
                    "unsupported operand type(s) for {}: '{}' and '{}'",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ),
                span,
            )),
        }
    }

    fn int_binary(&self, op: BinOp, a: i64, b: i64, span: Span) -> EvalResult {
        let overflow = || self.error(ErrorKind::Overflow, span);
        match op {
            BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Div => self.float_binary(op, a as f64, b as f64, span),
            BinOp::FloorDiv | BinOp::Mod if b == 0 => Err(self.error(
                ErrorKind::ZeroDivision {
                    message: "integer division or modulo by zero".into(),
                },
                span,
            )),
            BinOp::FloorDiv => {
                let q = a.checked_div(b).ok_or_else(overflow)?;
                Ok(Value::Int(if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q }))
            }
            BinOp::Mod => {
                let r = a.checked_rem(b).ok_or_else(overflow)?;
                Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
            }
            BinOp::Pow if b < 0 => self.float_binary(op, a as f64, b as f64, span),
            BinOp::Pow => u32::try_from(b)
                .ok()
                .and_then(|exp| a.checked_pow(exp))
                .map(Value::Int)
                .ok_or_else(overflow),
        }
    }

    fn float_binary(&self, op: BinOp, a: f64, b: f64, span: Span) -> EvalResult {
        let zero_division = |message: &str| {
            self.error(
                ErrorKind::ZeroDivision {
                    message: message.into(),
                },
                span,
            )
        };
        let result = match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div if b == 0.0 => return Err(zero_division("division by zero")),
            BinOp::Div => a / b,
            BinOp::FloorDiv if b == 0.0 => return Err(zero_division("float floor division by zero")),
            BinOp::FloorDiv => (a / b).floor(),
            BinOp::Mod if b == 0.0 => return Err(zero_division("float modulo")),
            BinOp::Mod => {
                let r = a % b;
                if r != 0.0 && (r < 0.0) != (b < 0.0) {
                    r + b
                } else {
                    r
                }
            }
            BinOp::Pow if a == 0.0 && b < 0.0 => {
                return Err(zero_division("0.0 cannot be raised to a negative power"))
            }
            BinOp::Pow => a.powf(b),
        };
        Ok(Value::Float(result))
    }

    fn compare(&self, op: CmpOp, left: &Value, right: &Value, span: Span) -> Result<bool, EditorError> {
        let ordered = |expect: fn(Ordering) -> bool, symbol: &str| match left.py_cmp(right) {
            Some(ordering) => Ok(expect(ordering)),
            None if left.is_numeric() && right.is_numeric() => Ok(false),
            None => Err(self.type_error(
                format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    symbol,
                    left.type_name(),
                    right.type_name()
                ),
                span,
            )),
        };

        match op {
            CmpOp::Eq => Ok(left.py_eq(right)),
            CmpOp::NotEq => Ok(!left.py_eq(right)),
            CmpOp::Lt => ordered(|o| o == Ordering::Less, "<"),
            CmpOp::LtE => ordered(|o| o != Ordering::Greater, "<="),
            CmpOp::Gt => ordered(|o| o == Ordering::Greater, ">"),
            CmpOp::GtE => ordered(|o| o != Ordering::Less, ">="),
            CmpOp::In => self.contains(right, left, span),
            CmpOp::NotIn => self.contains(right, left, span).map(|found| !found),
            CmpOp::Is => Ok(identical(left, right)),
            CmpOp::IsNot => Ok(!identical(left, right)),
        }
    }

    fn contains(&self, container: &Value, item: &Value, span: Span) -> Result<bool, EditorError> {
        match (container, item) {
            (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
            (Value::Str(_), other) => Err(self.type_error(
                format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ),
                span,
            )),
            (Value::List(items) | Value::Tuple(items), _) => {
                Ok(items.iter().any(|candidate| candidate.py_eq(item)))
            }
            (Value::Range { start, step, .. }, _) => Ok(item.as_int().is_some_and(|n| {
                let offset = i128::from(n) - i128::from(*start);
                let step = i128::from(*step);
                offset % step == 0 && (0..range_len(container)).contains(&(offset / step))
            })),
            (other, _) => Err(self.type_error(
                format!("argument of type '{}' is not iterable", other.type_name()),
                span,
            )),
        }
    }

    fn index(&self, container: Value, index: Value, span: Span) -> EvalResult {
        if index.as_int().is_none() {
            return Err(self.type_error(
                format!(
                    "{} indices must be integers, not {}",
                    container.type_name(),
                    index.type_name()
                ),
                span,
            ));
        }
        let out_of_range = |what: &str| {
            self.error(
                ErrorKind::IndexOutOfRange {
                    message: format!("{} index out of range", what),
                },
                span,
            )
        };
        match container {
            Value::List(items) => normalise_index(&index, items.len())
                .and_then(|at| items.into_iter().nth(at))
                .ok_or_else(|| out_of_range("list")),
            Value::Tuple(items) => normalise_index(&index, items.len())
                .and_then(|at| items.into_iter().nth(at))
                .ok_or_else(|| out_of_range("tuple")),
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                normalise_index(&index, chars.len())
                    .map(|at| Value::Str(chars[at].to_string()))
                    .ok_or_else(|| out_of_range("string"))
            }
            Value::Range { .. } => {
                let len = range_len(&container);
                index
                    .as_int()
                    .map(|n| if n < 0 { i128::from(n) + len } else { i128::from(n) })
                    .filter(|at| (0..len).contains(at))
                    .map(|at| Value::Int(range_item(&container, at)))
                    .ok_or_else(|| out_of_range("range object"))
            }
            other => Err(self.type_error(
                format!("'{}' object is not subscriptable", other.type_name()),
                span,
            )),
        }
    }

    fn slice(
        &self,
        container: Value,
        lower: Option<i64>,
        upper: Option<i64>,
        step: Option<i64>,
        span: Span,
    ) -> EvalResult {
        let step = step.unwrap_or(1);
        if step == 0 {
            return Err(self.value_error("slice step cannot be zero", span));
        }
        let pick = |len: usize| slice_indices(len, lower, upper, step);
        match container {
            Value::List(items) => Ok(Value::List(
                pick(items.len()).into_iter().map(|i| items[i].clone()).collect(),
            )),
            Value::Tuple(items) => Ok(Value::Tuple(
                pick(items.len()).into_iter().map(|i| items[i].clone()).collect(),
            )),
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Value::Str(pick(chars.len()).into_iter().map(|i| chars[i]).collect()))
            }
            other => Err(self.type_error(
                format!("'{}' object is not subscriptable", other.type_name()),
                span,
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Builtins
    // ------------------------------------------------------------------------

    fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Value>,
        keywords: &[Keyword],
        span: Span,
    ) -> EvalResult {
        if builtin == Builtin::Print {
            return self.print(args, keywords, span);
        }
        if let Some(keyword) = keywords.first() {
            let name = keyword.arg.as_deref().unwrap_or("**");
            return Err(self.type_error(
                format!("{}() takes no keyword argument '{}'", builtin.name(), name),
                span,
            ));
        }

        let arity = |min: usize, max: usize| -> Result<(), EditorError> {
            if args.len() < min || args.len() > max {
                let expected = if min == max {
                    format!("exactly {}", min)
                } else {
                    format!("from {} to {}", min, max)
                };
                return Err(self.type_error(
                    format!(
                        "{}() takes {} arguments ({} given)",
                        builtin.name(),
                        expected,
                        args.len()
                    ),
                    span,
                ));
            }
            Ok(())
        };

        match builtin {
            Builtin::Print => Ok(Value::None),
            Builtin::Range => {
                arity(1, 3)?;
                let mut bounds = Vec::with_capacity(3);
                for arg in &args {
                    match arg.as_int() {
                        Some(n) => bounds.push(n),
                        None => {
                            return Err(self.type_error(
                                format!(
                                    "'{}' object cannot be interpreted as an integer",
                                    arg.type_name()
                                ),
                                span,
                            ))
                        }
                    }
                }
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => (0, 0, 1),
                };
                if step == 0 {
                    return Err(self.value_error("range() arg 3 must not be zero", span));
                }
                Ok(Value::Range { start, stop, step })
            }
            Builtin::Len => {
                arity(1, 1)?;
                let len = match &args[0] {
                    Value::Str(s) => s.chars().count() as i64,
                    Value::List(items) | Value::Tuple(items) => items.len() as i64,
                    range @ Value::Range { .. } => i64::try_from(range_len(range))
                        .map_err(|_| self.error(ErrorKind::Overflow, span))?,
                    other => {
                        return Err(self.type_error(
                            format!("object of type '{}' has no len()", other.type_name()),
                            span,
                        ))
                    }
                };
                Ok(Value::Int(len))
            }
            Builtin::Str => {
                arity(0, 1)?;
                Ok(Value::Str(args.first().map(Value::to_string).unwrap_or_default()))
            }
            Builtin::Bool => {
                arity(0, 1)?;
                Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
            }
            Builtin::Int => {
                arity(0, 1)?;
                match args.into_iter().next() {
                    None => Ok(Value::Int(0)),
                    Some(Value::Float(f)) if f.is_nan() => {
                        Err(self.value_error("cannot convert float NaN to integer", span))
                    }
                    Some(Value::Float(f)) if f.is_infinite() => {
                        Err(self.error(ErrorKind::Overflow, span))
                    }
                    Some(Value::Float(f)) => Ok(Value::Int(f.trunc() as i64)),
                    Some(Value::Str(s)) => s
                        .trim()
                        .replace('_', "")
                        .parse::<i64>()
                        .map(Value::Int)
                        .map_err(|_| {
                            self.value_error(
                                format!("invalid literal for int() with base 10: {}", Value::Str(s.clone()).repr()),
                                span,
                            )
                        }),
                    Some(value) => match value.as_int() {
                        Some(n) => Ok(Value::Int(n)),
                        None => Err(self.type_error(
                            format!(
                                "int() argument must be a string or a number, not '{}'",
                                value.type_name()
                            ),
                            span,
                        )),
                    },
                }
            }
            Builtin::Float => {
                arity(0, 1)?;
                match args.into_iter().next() {
                    None => Ok(Value::Float(0.0)),
                    Some(Value::Str(s)) => parse_float(&s).map(Value::Float).ok_or_else(|| {
                        self.value_error(
                            format!(
                                "could not convert string to float: {}",
                                Value::Str(s.clone()).repr()
                            ),
                            span,
                        )
                    }),
                    Some(value) => match value.as_float() {
                        Some(f) => Ok(Value::Float(f)),
                        None => Err(self.type_error(
                            format!(
                                "float() argument must be a string or a number, not '{}'",
                                value.type_name()
                            ),
                            span,
                        )),
                    },
                }
            }
            Builtin::Abs => {
                arity(1, 1)?;
                match &args[0] {
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    value => match value.as_int() {
                        Some(n) => n
                            .checked_abs()
                            .map(Value::Int)
                            .ok_or_else(|| self.error(ErrorKind::Overflow, span)),
                        None => Err(self.type_error(
                            format!("bad operand type for abs(): '{}'", value.type_name()),
                            span,
                        )),
                    },
                }
            }
            Builtin::Min | Builtin::Max => {
                let candidates = match args.len() {
                    0 => {
                        return Err(self.type_error(
                            format!("{} expected at least 1 argument, got 0", builtin.name()),
                            span,
                        ))
                    }
                    1 => {
                        let iterable = args.into_iter().next().unwrap_or_default();
                        self.iterate(iterable, span)?.collect::<Vec<_>>()
                    }
                    _ => args,
                };
                let want = if builtin == Builtin::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut best: Option<Value> = None;
                for candidate in candidates {
                    best = Some(match best {
                        None => candidate,
                        Some(current) => {
                            if self.compare_for(&candidate, &current, span)? == want {
                                candidate
                            } else {
                                current
                            }
                        }
                    });
                }
                best.ok_or_else(|| {
                    self.value_error(format!("{}() arg is an empty sequence", builtin.name()), span)
                })
            }
        }
    }

    fn compare_for(&self, a: &Value, b: &Value, span: Span) -> Result<Ordering, EditorError> {
        a.py_cmp(b).ok_or_else(|| {
            self.type_error(
                format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    a.type_name(),
                    b.type_name()
                ),
                span,
            )
        })
    }

    fn print(&mut self, args: Vec<Value>, keywords: &[Keyword], span: Span) -> EvalResult {
        let mut sep = " ".to_string();
        let mut end = "\n".to_string();
        for keyword in keywords {
            let value = self.eval(&keyword.value)?;
            let slot = match keyword.arg.as_deref() {
                Some("sep") => &mut sep,
                Some("end") => &mut end,
                Some(other) => {
                    return Err(self.type_error(
                        format!("'{}' is an invalid keyword argument for print()", other),
                        span,
                    ))
                }
                None => return Err(self.ctx.unsupported("**kwargs", to_source_span(span))),
            };
            match value {
                Value::None => {}
                Value::Str(s) => *slot = s,
                other => {
                    return Err(self.type_error(
                        format!(
                            "{} must be None or a string, not {}",
                            keyword.arg.as_deref().unwrap_or_default(),
                            other.type_name()
                        ),
                        span,
                    ))
                }
            }
        }

        let mut text = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(&sep);
        text.push_str(&end);
        self.output.emit(&text);
        Ok(Value::None)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Python index with negative wrap-around; `None` when out of range.
fn normalise_index(index: &Value, len: usize) -> Option<usize> {
    let n = index.as_int()?;
    let len = len as i64;
    let at = if n < 0 { n + len } else { n };
    (0..len).contains(&at).then_some(at as usize)
}

fn list_index_error(index: &Value) -> ErrorKind {
    match index.as_int() {
        Some(_) => ErrorKind::IndexOutOfRange {
            message: "list assignment index out of range".into(),
        },
        None => ErrorKind::TypeMismatch {
            message: format!("list indices must be integers, not {}", index.type_name()),
        },
    }
}

/// Positions selected by `[lower:upper:step]` on a sequence of `len` items.
/// Bounds are clamped into the sequence, and the walk runs in `i128` so a
/// huge step cannot wrap.
fn slice_indices(len: usize, lower: Option<i64>, upper: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i128;
    let step = i128::from(step);
    let clamp = |bound: i64, low: i128, high: i128| {
        let bound = i128::from(bound);
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };
    let mut positions = Vec::new();
    if step > 0 {
        let start = lower.map(|b| clamp(b, 0, len)).unwrap_or(0);
        let stop = upper.map(|b| clamp(b, 0, len)).unwrap_or(len);
        let mut i = start;
        while i < stop {
            positions.push(i as usize);
            i += step;
        }
    } else {
        let start = lower.map(|b| clamp(b, -1, len - 1)).unwrap_or(len - 1);
        let stop = upper.map(|b| clamp(b, -1, len - 1)).unwrap_or(-1);
        let mut i = start;
        while i > stop {
            positions.push(i as usize);
            i += step;
        }
    }
    positions
}

fn repeat_items(items: &[Value], times: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    out
}

fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim().replace('_', "");
    match text.to_ascii_lowercase().trim_start_matches(['+', '-']) {
        "inf" | "infinity" | "nan" => {
            let magnitude = if text.to_ascii_lowercase().ends_with("nan") {
                f64::NAN
            } else {
                f64::INFINITY
            };
            Some(if text.starts_with('-') { -magnitude } else { magnitude })
        }
        _ => text.parse::<f64>().ok(),
    }
}

/// Approximates `is` for immutable values.
fn identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_follow_python_rules() {
        assert_eq!(slice_indices(5, Some(1), Some(3), 1), vec![1, 2]);
        assert_eq!(slice_indices(5, None, None, -1), vec![4, 3, 2, 1, 0]);
        assert_eq!(slice_indices(5, Some(-2), None, 1), vec![3, 4]);
        assert_eq!(slice_indices(3, Some(10), None, 1), Vec::<usize>::new());
    }

    #[test]
    fn extreme_slice_bounds_do_not_wrap() {
        assert_eq!(slice_indices(3, Some(2), None, i64::MAX), vec![2]);
        assert_eq!(slice_indices(3, None, None, i64::MIN), vec![2]);
        assert_eq!(slice_indices(3, Some(i64::MIN), Some(i64::MAX), 1), vec![0, 1, 2]);
        assert_eq!(slice_indices(3, Some(i64::MAX), Some(i64::MIN), -1), vec![2, 1, 0]);
    }

    #[test]
    fn negative_indices_wrap() {
        assert_eq!(normalise_index(&Value::Int(-1), 3), Some(2));
        assert_eq!(normalise_index(&Value::Int(3), 3), None);
        assert_eq!(normalise_index(&Value::Int(-4), 3), None);
    }

    #[test]
    fn float_parsing_accepts_specials() {
        assert_eq!(parse_float(" 2.5 "), Some(2.5));
        assert_eq!(parse_float("-inf"), Some(f64::NEG_INFINITY));
        assert!(parse_float("nan").is_some_and(f64::is_nan));
        assert_eq!(parse_float("abc"), None);
    }
}
