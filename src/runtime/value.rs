//! Runtime values for the interpreter.
//!
//! Lists have value semantics: assignment copies, and the only in-place
//! mutation is subscript assignment through a variable.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Range,
    Len,
    Str,
    Int,
    Float,
    Bool,
    Abs,
    Min,
    Max,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        Some(match name {
            "print" => Builtin::Print,
            "range" => Builtin::Range,
            "len" => Builtin::Len,
            "str" => Builtin::Str,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "bool" => Builtin::Bool,
            "abs" => Builtin::Abs,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Range => "range",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Range { start: i64, stop: i64, step: i64 },
    Builtin(Builtin),
}

impl Value {
    /// Python's `type(x).__name__`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Range { .. } => "range",
            Value::Builtin(_) => "builtin_function_or_method",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Range { .. } => range_len(self) > 0,
            Value::Builtin(_) => true,
        }
    }

    /// Integer view of `int` and `bool`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Float view of any numeric value.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => self.as_int().map(|n| n as f64),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }

    /// Python's `repr(x)`.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => repr_str(s),
            Value::List(items) => format!("[{}]", join_repr(items)),
            Value::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Value::Tuple(items) => format!("({})", join_repr(items)),
            _ => self.to_string(),
        }
    }

    /// Python equality; numbers compare across int, float and bool.
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_float() == b.as_float(),
            },
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
            }
            (Value::Range { step: a, .. }, Value::Range { step: b, .. }) => {
                let len = range_len(self);
                len == range_len(other)
                    && (len == 0 || range_item(self, 0) == range_item(other, 0))
                    && (len <= 1 || a == b)
            }
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`; `None` when the types are unorderable.
    pub fn py_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_float()?.partial_cmp(&b.as_float()?),
            },
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.py_eq(y) {
                        return x.py_cmp(y);
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Python's `str(x)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(_) | Value::Tuple(_) => write!(f, "{}", self.repr()),
            Value::Range { start, stop, step } if *step == 1 => {
                write!(f, "range({}, {})", start, stop)
            }
            Value::Range { start, stop, step } => write!(f, "range({}, {}, {})", start, stop, step),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
        }
    }
}

fn join_repr(items: &[Value]) -> String {
    items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
}

/// Float formatting matching Python's shortest round-trip repr.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", x);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => formatted,
        };
    }
    if x.fract() == 0.0 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Number of elements in a `range` value; zero for anything else. Computed
/// in `i128` so that any pair of `i64` bounds fits.
pub fn range_len(value: &Value) -> i128 {
    let Value::Range { start, stop, step } = *value else {
        return 0;
    };
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    if step > 0 && start < stop {
        (stop - start + step - 1) / step
    } else if step < 0 && start > stop {
        (start - stop - step - 1) / -step
    } else {
        0
    }
}

/// Element `at` of a `range` value. Every in-range element lies between the
/// bounds, so it fits in `i64`.
pub fn range_item(value: &Value, at: i128) -> i64 {
    match *value {
        Value::Range { start, step, .. } => {
            (i128::from(start) + at * i128::from(step)) as i64
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_items(value: &Value) -> Vec<i64> {
        (0..range_len(value)).map(|i| range_item(value, i)).collect()
    }

    #[test]
    fn float_formatting_matches_python() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(-0.0), "-0.0");
    }

    #[test]
    fn repr_picks_quotes() {
        assert_eq!(Value::Str("a".into()).repr(), "'a'");
        assert_eq!(Value::Str("it's".into()).repr(), "\"it's\"");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Str("x".into())]).repr(),
            "[1, 'x']"
        );
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).repr(), "(1,)");
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).py_eq(&Value::Int(1)));
        assert!(!Value::Str("1".into()).py_eq(&Value::Int(1)));
    }

    #[test]
    fn range_length() {
        let r = |start, stop, step| Value::Range { start, stop, step };
        assert_eq!(range_len(&r(0, 5, 1)), 5);
        assert_eq!(range_len(&r(0, 5, 2)), 3);
        assert_eq!(range_len(&r(5, 0, -2)), 3);
        assert_eq!(range_len(&r(5, 0, 1)), 0);
        assert_eq!(range_items(&r(5, 0, -2)), vec![5, 3, 1]);
    }

    #[test]
    fn range_length_spans_the_whole_i64_domain() {
        let r = |start, stop, step| Value::Range { start, stop, step };
        assert_eq!(range_len(&r(i64::MIN, i64::MAX, 1)), i128::from(u64::MAX));
        assert_eq!(range_len(&r(i64::MAX, i64::MIN, -1)), i128::from(u64::MAX));
        assert_eq!(range_len(&r(0, i64::MAX, i64::MAX)), 1);
        let wide = r(i64::MIN, i64::MAX, i64::MAX);
        assert_eq!(range_items(&wide), vec![i64::MIN, -1, i64::MAX - 1]);
        assert!(!wide.py_eq(&r(i64::MIN, i64::MAX - 1, i64::MAX)));
        assert!(r(0, 3, 5).py_eq(&r(0, 1, 7)));
        assert!(r(4, 0, 1).py_eq(&r(9, 2, 3)));
    }
}
