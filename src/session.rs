//! Synchronization Glue
//!
//! [`EditorSession`] owns the visual surface, the text surface and the shared
//! `code` register. Both surfaces report edits through
//! [`EditorSession::on_visual_change`] and [`EditorSession::on_text_change`];
//! every register update is pushed back into the text surface. Nothing flows
//! from the register into the block document except the explicit
//! [`EditorSession::parse_to_blocks`] action.
//!
//! Handlers run to completion on one thread, so the session needs no locks.
//! The only asynchronous operation is a program run, which is handed out as
//! a [`RunTask`] future; a busy flag rejects a second run while one is live.

use std::cell::Cell;
use std::rc::Rc;

use tokio_util::sync::CancellationToken;

use crate::errors::{unspanned, DiagnosticContext, EditorError, ErrorKind, ErrorReporting, SourceContext};
use crate::runtime::{
    ExecutionEngine, Interpreter, RunSummary, SharedOutput, DEFAULT_YIELD_INTERVAL,
};
use crate::surface::{TextSurface, VisualSurface};
use crate::translate::{translate_source, Translation};

/// Program shown when a session starts.
pub const DEFAULT_INITIAL_CODE: &str = "print(\"Hello Ace!\")\n";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub initial_code: String,
    /// Name given to the program in diagnostics
    pub source_name: String,
    pub yield_interval: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_code: DEFAULT_INITIAL_CODE.to_string(),
            source_name: "<stdin>".to_string(),
            yield_interval: DEFAULT_YIELD_INTERVAL,
        }
    }
}

pub struct EditorSession<V: VisualSurface, T: TextSurface> {
    visual: V,
    text: T,
    code: String,
    config: SessionConfig,
    engine: Rc<dyn ExecutionEngine>,
    running: Rc<Cell<bool>>,
}

impl<V: VisualSurface, T: TextSurface> EditorSession<V, T> {
    /// Start a session showing `config.initial_code` in the text surface.
    /// The block document is left as given.
    pub fn new(visual: V, text: T, config: SessionConfig) -> Self {
        let engine = Rc::new(Interpreter::with_yield_interval(config.yield_interval));
        let mut session = Self {
            visual,
            text,
            code: config.initial_code.clone(),
            config,
            engine,
            running: Rc::new(Cell::new(false)),
        };
        session.resync_text();
        session
    }

    /// Replace the execution engine.
    pub fn with_engine(mut self, engine: impl ExecutionEngine + 'static) -> Self {
        self.engine = Rc::new(engine);
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn visual(&self) -> &V {
        &self.visual
    }

    pub fn text(&self) -> &T {
        &self.text
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Change events
    // ------------------------------------------------------------------------

    /// The block document changed: regenerate code from it.
    pub fn on_visual_change(&mut self) {
        let code = self.visual.generate_code();
        log::debug!("sync: visual change, {} bytes of code", code.len());
        self.set_code(code);
    }

    /// The text changed: take it as the new code.
    pub fn on_text_change(&mut self) {
        let code = self.text.text().to_string();
        log::debug!("sync: text change, {} bytes", code.len());
        self.set_code(code);
    }

    /// Apply a user edit to the block document, then fire the visual change event.
    pub fn edit_blocks<R>(&mut self, edit: impl FnOnce(&mut V) -> R) -> R {
        let result = edit(&mut self.visual);
        self.on_visual_change();
        result
    }

    /// Apply a user edit to the text, then fire the text change event.
    pub fn edit_text<R>(&mut self, edit: impl FnOnce(&mut T) -> R) -> R {
        let result = edit(&mut self.text);
        self.on_text_change();
        result
    }

    fn set_code(&mut self, code: String) {
        self.code = code;
        self.resync_text();
    }

    fn resync_text(&mut self) {
        if self.text.text() != self.code {
            log::debug!("sync: overwriting text surface");
            self.text.set_text(&self.code);
        }
    }

    // ------------------------------------------------------------------------
    // Explicit actions
    // ------------------------------------------------------------------------

    /// Rebuild the block document from the current code.
    ///
    /// On a parse error the document is left as it was. A programmatic load
    /// does not fire [`Self::on_visual_change`], so statements the translator
    /// dropped stay in the text.
    pub fn parse_to_blocks(&mut self) -> Result<Translation, EditorError> {
        let source = SourceContext::from_file(self.config.source_name.clone(), self.code.clone());
        let translation = translate_source(&source)?;
        match &translation {
            Translation::Empty => self.visual.clear(),
            Translation::Document(report) => self.visual.load_document(report.document.clone())?,
        }
        Ok(translation)
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Prepare a run of the current code. The session stays busy until the
    /// returned task completes or is dropped.
    pub fn start_run(&self, output: SharedOutput) -> Result<RunTask, EditorError> {
        let source = SourceContext::from_file(self.config.source_name.clone(), self.code.clone());
        if self.running.get() {
            let ctx = DiagnosticContext::new(source, "session");
            return Err(ctx
                .report(ErrorKind::RunInProgress, unspanned())
                .with_help("wait for the current run to finish or cancel it"));
        }

        self.running.set(true);
        Ok(RunTask {
            engine: self.engine.clone(),
            source,
            output,
            cancel: CancellationToken::new(),
            _guard: RunGuard(self.running.clone()),
        })
    }
}

// ============================================================================
// RUNS
// ============================================================================

/// Clears the session's busy flag when dropped.
struct RunGuard(Rc<Cell<bool>>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Cancels a run from outside its future.
#[derive(Clone)]
pub struct RunHandle {
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A pending run over a snapshot of the session's code.
pub struct RunTask {
    engine: Rc<dyn ExecutionEngine>,
    source: SourceContext,
    output: SharedOutput,
    cancel: CancellationToken,
    _guard: RunGuard,
}

impl RunTask {
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// The code this task will run.
    pub fn source(&self) -> &str {
        &self.source.content
    }

    pub async fn execute(self) -> Result<RunSummary, EditorError> {
        let RunTask {
            engine,
            source,
            output,
            cancel,
            _guard,
        } = self;
        let result = engine.run(&source, output, cancel).await;
        if let Err(err) = &result {
            log::error!("RuntimeError in {}: {}", source.name, err);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{BlockWorkspace, TextBuffer};

    fn session() -> EditorSession<BlockWorkspace, TextBuffer> {
        EditorSession::new(
            BlockWorkspace::default(),
            TextBuffer::default(),
            SessionConfig::default(),
        )
    }

    #[test]
    fn starts_with_initial_code_in_text() {
        let session = session();
        assert_eq!(session.code(), DEFAULT_INITIAL_CODE);
        assert_eq!(session.text().text(), DEFAULT_INITIAL_CODE);
        assert_eq!(session.text().cursor(), 0);
    }

    #[test]
    fn busy_flag_clears_when_task_dropped() {
        let session = session();
        let task = session.start_run(SharedOutput::new(crate::runtime::NullSink)).unwrap();
        assert!(session.is_running());
        assert_eq!(
            session
                .start_run(SharedOutput::new(crate::runtime::NullSink))
                .err()
                .map(|e| e.kind),
            Some(ErrorKind::RunInProgress)
        );
        drop(task);
        assert!(!session.is_running());
    }
}
