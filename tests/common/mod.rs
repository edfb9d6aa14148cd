//! Shared helpers for the integration tests.
#![allow(dead_code)]

use pyblocks::errors::EditorError;
use pyblocks::runtime::{CapturedOutput, ExecutionEngine, Interpreter};
use pyblocks::translate::{translate, Translation, TranslationReport};
use pyblocks::{BlockWorkspace, EditorSession, SessionConfig, SourceContext, TextBuffer};
use tokio_util::sync::CancellationToken;

pub type Session = EditorSession<BlockWorkspace, TextBuffer>;

/// A session over the in-memory surfaces with the default configuration.
pub fn session() -> Session {
    session_with_code(&SessionConfig::default().initial_code)
}

pub fn session_with_code(code: &str) -> Session {
    let config = SessionConfig {
        initial_code: code.to_string(),
        ..SessionConfig::default()
    };
    EditorSession::new(BlockWorkspace::default(), TextBuffer::default(), config)
}

/// Translate `source`, panicking unless it yields a document.
pub fn report(source: &str) -> TranslationReport {
    match translate(source).expect("source should parse") {
        Translation::Document(report) => report,
        Translation::Empty => panic!("expected a document for {:?}", source),
    }
}

/// Run `source` to completion, returning the output produced and the result.
pub async fn run_captured(source: &str) -> (String, Result<(), EditorError>) {
    let captured = CapturedOutput::new();
    let result = Interpreter::new()
        .run(
            &SourceContext::from_file("test.py", source),
            captured.shared(),
            CancellationToken::new(),
        )
        .await
        .map(|_| ());
    (captured.contents(), result)
}

/// Run `source`, which must succeed, and return its output.
pub async fn output_of(source: &str) -> String {
    let (output, result) = run_captured(source).await;
    if let Err(e) = result {
        panic!("run of {:?} failed: {}", source, e);
    }
    output
}
