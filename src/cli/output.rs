//! User-facing output for the CLI: dropped-statement warnings, round-trip
//! diffs and the registry listing, coloured with `termcolor`.

use std::io::Write;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::blocks::{BlockRegistry, BlockShape};
use crate::errors::SourceContext;
use crate::translate::DroppedStatement;

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Warn on stderr about every statement that has no block equivalent.
pub fn print_dropped(source: &SourceContext, dropped: &[DroppedStatement]) {
    if dropped.is_empty() {
        return;
    }
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    for statement in dropped {
        let (line, column) = line_column(&source.content, statement.span.start);
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = write!(stderr, "dropped");
        let _ = stderr.reset();
        let _ = writeln!(
            stderr,
            " {}:{}:{}: `{}`: {}",
            source.name, line, column, statement.form, statement.reason
        );
    }
}

/// Line diff of the original program against the code regenerated from its
/// blocks.
pub fn print_diff(original: &str, generated: &str) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let changeset = Changeset::new(original.trim_end(), generated.trim_end(), "\n");
    if changeset.distance == 0 {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = writeln!(stdout, "round-trip is lossless");
        let _ = stdout.reset();
        return;
    }
    write_diff(&mut stdout, &changeset.diffs);
}

pub fn print_registry(registry: &BlockRegistry) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for schema in registry.iter() {
        let _ = stdout.set_color(ColorSpec::new().set_bold(true));
        let _ = write!(stdout, "  {:<18}", schema.id);
        let _ = stdout.reset();
        let shape = match schema.shape {
            BlockShape::Statement => "statement",
            BlockShape::Output => "output",
        };
        let _ = writeln!(stdout, " {:<10} {}", shape, schema.label);
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn write_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(ref x) => {
                let _ = stdout.reset();
                for line in x.lines() {
                    let _ = writeln!(stdout, " {}", line);
                }
            }
            Difference::Add(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "+{}", line);
                }
            }
            Difference::Rem(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "-{}", line);
                }
            }
        }
    }
    let _ = stdout.reset();
}

/// One-based line and column of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset.min(text.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}
