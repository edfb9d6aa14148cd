//! Layout pass: splits source text into logical lines.
//!
//! A logical line is one statement line with its indentation measured and
//! its physical continuation lines (inside brackets, or after a trailing
//! backslash) folded in. Comments, joined newlines and carriage returns are
//! blanked with spaces of the same byte length, so an offset into
//! [`LogicalLine::text`] plus [`LogicalLine::start`] is an offset into the
//! original source.

use crate::errors::{DiagnosticContext, EditorError, ErrorKind, ErrorReporting};

const TAB_WIDTH: usize = 8;

/// Deepest bracket nesting a logical line may reach.
pub const MAX_NESTING_DEPTH: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    /// Indentation column of the first physical line
    pub indent: usize,
    /// Byte offset of the first non-blank character
    pub start: usize,
    pub text: String,
}

impl LogicalLine {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// Split `source` into logical lines, skipping blank and comment-only lines.
pub fn logical_lines(
    source: &str,
    ctx: &DiagnosticContext,
) -> Result<Vec<LogicalLine>, EditorError> {
    Scanner {
        source,
        pos: 0,
        ctx,
    }
    .lines()
}

struct Scanner<'a> {
    source: &'a str,
    pos: usize,
    ctx: &'a DiagnosticContext,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, kind: ErrorKind, start: usize, end: usize) -> EditorError {
        self.ctx.report(kind, (start..end).into())
    }

    fn lines(mut self) -> Result<Vec<LogicalLine>, EditorError> {
        let mut lines = Vec::new();
        while self.pos < self.source.len() {
            let indent = self.measure_indent();
            match self.peek() {
                None => break,
                Some('\n') | Some('\r') => {
                    self.bump();
                }
                Some('#') => self.skip_comment(),
                Some(_) => lines.push(self.logical_line(indent)?),
            }
        }
        Ok(lines)
    }

    fn measure_indent(&mut self) -> usize {
        let mut column = 0;
        loop {
            match self.peek() {
                Some(' ') => column += 1,
                Some('\t') => column = (column / TAB_WIDTH + 1) * TAB_WIDTH,
                Some('\u{0C}') => column = 0,
                _ => return column,
            }
            self.bump();
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn logical_line(&mut self, indent: usize) -> Result<LogicalLine, EditorError> {
        let start = self.pos;
        let mut text = String::new();
        let mut brackets: Vec<(char, usize)> = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    self.bump();
                    if brackets.is_empty() {
                        break;
                    }
                    text.push(' ');
                }
                '\r' => {
                    self.bump();
                    text.push(' ');
                }
                '#' => {
                    let from = self.pos;
                    self.skip_comment();
                    blank(&mut text, self.pos - from);
                }
                '\\' if self.rest().starts_with("\\\n") || self.rest().starts_with("\\\r\n") => {
                    let width = if self.rest().starts_with("\\\n") { 2 } else { 3 };
                    self.pos += width;
                    blank(&mut text, width);
                }
                '"' | '\'' => self.string_literal(c, &mut text)?,
                '(' | '[' | '{' => {
                    if brackets.len() == MAX_NESTING_DEPTH {
                        return Err(self.error(
                            ErrorKind::NestingTooDeep {
                                limit: MAX_NESTING_DEPTH,
                            },
                            self.pos,
                            self.pos + 1,
                        ));
                    }
                    brackets.push((c, self.pos));
                    self.bump();
                    text.push(c);
                }
                ')' | ']' | '}' => {
                    match brackets.pop() {
                        Some((open, _)) if closer(open) == c => {}
                        Some((open, _)) => {
                            return Err(self.error(
                                ErrorKind::MismatchedBracket {
                                    expected: closer(open),
                                    found: c,
                                },
                                self.pos,
                                self.pos + 1,
                            ))
                        }
                        None => {
                            return Err(self.error(
                                ErrorKind::UnmatchedBracket { bracket: c },
                                self.pos,
                                self.pos + 1,
                            ))
                        }
                    }
                    self.bump();
                    text.push(c);
                }
                _ => {
                    self.bump();
                    text.push(c);
                }
            }
        }

        if let Some(&(open, at)) = brackets.last() {
            return Err(self.error(ErrorKind::UnclosedBracket { bracket: open }, at, at + 1));
        }

        // Trailing newline, if any, is excluded from the line text.
        while text.ends_with(' ') {
            text.pop();
        }

        Ok(LogicalLine {
            indent,
            start,
            text,
        })
    }

    fn string_literal(&mut self, quote: char, text: &mut String) -> Result<(), EditorError> {
        let at = self.pos;
        let triple: &str = if quote == '"' { "\"\"\"" } else { "'''" };

        if self.rest().starts_with(triple) {
            self.pos += 3;
            text.push_str(triple);
            loop {
                match self.bump() {
                    None => {
                        return Err(self.error(ErrorKind::UnterminatedString, at, at + 3));
                    }
                    Some('\\') => {
                        text.push('\\');
                        if let Some(escaped) = self.bump() {
                            text.push(escaped);
                        }
                    }
                    Some(c) if c == quote && self.rest().starts_with(&triple[1..]) => {
                        self.pos += 2;
                        text.push_str(triple);
                        return Ok(());
                    }
                    Some(c) => text.push(c),
                }
            }
        }

        self.bump();
        text.push(quote);
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(self.error(ErrorKind::UnterminatedString, at, at + 1));
                }
                Some('\\') => {
                    self.bump();
                    text.push('\\');
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                }
                Some(c) => {
                    self.bump();
                    text.push(c);
                    if c == quote {
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn closer(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn blank(text: &mut String, width: usize) {
    text.extend(std::iter::repeat(' ').take(width));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, SourceContext};

    fn lines(source: &str) -> Result<Vec<LogicalLine>, EditorError> {
        let ctx = DiagnosticContext::new(SourceContext::from_file("test.py", source), "parse");
        logical_lines(source, &ctx)
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let result = lines("\n# header\nx = 1\n\n   \nprint(x)  # trailing\n").unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "x = 1");
        assert_eq!(result[1].text, "print(x)");
    }

    #[test]
    fn measures_indentation() {
        let result = lines("if x:\n    print(1)\n\tprint(2)\n").unwrap();
        assert_eq!(result[0].indent, 0);
        assert_eq!(result[1].indent, 4);
        assert_eq!(result[2].indent, 8);
    }

    #[test]
    fn joins_lines_inside_brackets() {
        let source = "print(1,\n      2)\nx = 3\n";
        let result = lines(source).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text.len(), result[0].end() - result[0].start);
        assert_eq!(&source[result[1].start..result[1].end()], "x = 3");
    }

    #[test]
    fn keeps_hash_inside_strings() {
        let result = lines("print('# not a comment')").unwrap();
        assert_eq!(result[0].text, "print('# not a comment')");
    }

    #[test]
    fn unclosed_bracket_is_reported_at_opener() {
        let err = lines("print((1)\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnclosedBracket { bracket: '(' });
        assert_eq!(err.source_info.primary_span.offset(), 5);
    }

    #[test]
    fn mismatched_and_unmatched_brackets() {
        let err = lines("print(1]").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::MismatchedBracket {
                expected: ')',
                found: ']'
            }
        );
        let err = lines("x = 1)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnmatchedBracket { bracket: ')' });
    }

    #[test]
    fn unterminated_strings() {
        assert_eq!(
            lines("print('abc)\n").unwrap_err().kind,
            ErrorKind::UnterminatedString
        );
        assert_eq!(
            lines("x = \"\"\"never closed\n").unwrap_err().kind,
            ErrorKind::UnterminatedString
        );
    }

    #[test]
    fn triple_quoted_strings_span_lines() {
        let result = lines("x = '''a\nb'''\ny = 2\n").unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "x = '''a\nb'''");
    }

    #[test]
    fn backslash_continuation() {
        let result = lines("x = 1 + \\\n    2\n").unwrap();
        assert_eq!(result.len(), 1);
        assert!(result[0].text.starts_with("x = 1 + "));
        assert!(result[0].text.ends_with('2'));
    }

    #[test]
    fn bracket_nesting_is_limited() {
        let deep = format!("x = {}1{}", "(".repeat(MAX_NESTING_DEPTH), ")".repeat(MAX_NESTING_DEPTH));
        assert_eq!(lines(&deep).unwrap().len(), 1);

        let too_deep = format!("x = {}1{}", "[".repeat(MAX_NESTING_DEPTH + 1), "]".repeat(MAX_NESTING_DEPTH + 1));
        let err = lines(&too_deep).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::NestingTooDeep {
                limit: MAX_NESTING_DEPTH
            }
        );
        assert_eq!(err.source_info.primary_span.offset(), 4 + MAX_NESTING_DEPTH);
    }
}
