//! Runtime module: the Execution Engine.
//!
//! An [`ExecutionEngine`] takes source text and runs it, writing program
//! output to a [`SharedOutput`] and stopping early when its
//! [`CancellationToken`] fires. The bundled [`Interpreter`] parses the
//! source, lowers it to a flat instruction list and runs that on an async
//! machine that cooperatively yields to the event loop.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::{DiagnosticContext, EditorError, SourceContext};
use crate::syntax;

pub mod compile;
pub mod machine;
pub mod output;
pub mod value;

pub use compile::{compile, Instr, Program};
pub use machine::Machine;
pub use output::{CapturedOutput, NullSink, OutputBuffer, OutputSink, SharedOutput, StdoutSink};
pub use value::Value;

/// Instructions between two cooperative yields.
pub const DEFAULT_YIELD_INTERVAL: usize = 256;

/// Statistics of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub instructions: u64,
}

/// Runs source text. Engines are single-threaded: the future is not `Send`
/// because output flows through an `Rc`-based sink.
#[async_trait(?Send)]
pub trait ExecutionEngine {
    async fn run(
        &self,
        source: &SourceContext,
        output: SharedOutput,
        cancel: CancellationToken,
    ) -> Result<RunSummary, EditorError>;
}

/// The built-in interpreter for the editor's Python subset.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter {
    yield_interval: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            yield_interval: DEFAULT_YIELD_INTERVAL,
        }
    }

    pub fn with_yield_interval(yield_interval: usize) -> Self {
        Self {
            yield_interval: yield_interval.max(1),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl ExecutionEngine for Interpreter {
    async fn run(
        &self,
        source: &SourceContext,
        output: SharedOutput,
        cancel: CancellationToken,
    ) -> Result<RunSummary, EditorError> {
        let module = syntax::parse(source)?;
        let ctx = DiagnosticContext::new(source.clone(), "runtime");
        let program = compile(&module, &ctx)?;
        log::debug!("run: {} compiled to {} instructions", source.name, program.len());

        let mut machine = Machine::new(output, ctx);
        let summary = machine.run(&program, &cancel, self.yield_interval).await?;
        log::debug!("run: {} finished after {} instructions", source.name, summary.instructions);
        Ok(summary)
    }
}

/// Run `source` to completion with no cancellation, capturing its output.
pub async fn run_to_string(source: &str) -> Result<String, EditorError> {
    let captured = CapturedOutput::new();
    Interpreter::new()
        .run(
            &SourceContext::from_file("<stdin>", source),
            captured.shared(),
            CancellationToken::new(),
        )
        .await?;
    Ok(captured.contents())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[tokio::test]
    async fn runs_loops_and_prints() {
        let out = run_to_string("total = 0\nfor i in range(4):\n    total += i\nprint(total)\n")
            .await
            .unwrap();
        assert_eq!(out, "6\n");
    }

    #[tokio::test]
    async fn undefined_name_is_a_runtime_error() {
        let err = run_to_string("print(y)").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedName { name: "y".into() });
    }
}
