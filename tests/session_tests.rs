// tests/session_tests.rs

mod common;

use common::{session, session_with_code};
use pyblocks::blocks::{slots, Block, BlockDocument, ASSIGN_STATEMENT, PRINT_STATEMENT};
use pyblocks::errors::{ErrorCategory, ErrorKind};
use pyblocks::runtime::{CapturedOutput, NullSink, SharedOutput};
use pyblocks::translate::{DropReason, Translation};
use pyblocks::{TextSurface, VisualSurface};

// ---
// Text edits
// ---

#[test]
fn test_text_edit_updates_code_only() {
    let mut session = session_with_code("");
    let revision = session.visual().revision();

    session.edit_text(|text| text.insert("x = 1\n"));

    assert_eq!(session.code(), "x = 1\n");
    assert_eq!(session.visual().revision(), revision);
    assert!(session.visual().document().is_empty());
}

#[test]
fn test_typing_keeps_the_cursor() {
    let mut session = session_with_code("");
    session.edit_text(|text| text.insert("pri"));
    session.edit_text(|text| text.insert("nt(1)"));
    assert_eq!(session.text().text(), "print(1)");
    assert_eq!(session.text().cursor(), "print(1)".len());
}

// ---
// Visual edits
// ---

#[test]
fn test_block_edit_regenerates_code_and_resets_cursor() {
    let mut session = session();
    session.edit_text(|text| text.insert("# scratch\n"));
    assert_ne!(session.text().cursor(), 0);

    session.edit_blocks(|workspace| {
        workspace
            .document_mut()
            .blocks
            .push(Block::new(PRINT_STATEMENT).with_value(slots::TEXT, Some(Block::number(7.0))));
    });

    assert_eq!(session.code(), "print(7)\n");
    assert_eq!(session.text().text(), "print(7)\n");
    assert_eq!(session.text().cursor(), 0);
}

#[test]
fn test_unchanged_text_is_not_rewritten() {
    let mut session = session_with_code("print(7)\n");
    session.edit_blocks(|workspace| {
        workspace
            .document_mut()
            .blocks
            .push(Block::new(PRINT_STATEMENT).with_value(slots::TEXT, Some(Block::number(7.0))));
    });
    let revision = session.text().revision();

    session.on_visual_change();

    assert_eq!(session.text().revision(), revision);
}

// ---
// Parse to blocks
// ---

#[test]
fn test_parse_to_blocks_loads_document_without_touching_text() {
    let mut session = session_with_code("x = 5\nimport os\n");
    let text_revision = session.text().revision();

    let translation = session.parse_to_blocks().unwrap();

    assert_eq!(translation.dropped()[0].reason, DropReason::UnsupportedForm);
    assert_eq!(
        session.visual().document().blocks,
        vec![Block::new(ASSIGN_STATEMENT)
            .with_field(slots::VAR, pyblocks::FieldValue::Text("x".into()))
            .with_value(slots::VALUE, Some(Block::number(5.0)))]
    );
    // The dropped import stays in the text
    assert_eq!(session.code(), "x = 5\nimport os\n");
    assert_eq!(session.text().revision(), text_revision);
}

#[test]
fn test_parse_error_leaves_blocks_unchanged() {
    let mut session = session_with_code("print('a')\n");
    session.parse_to_blocks().unwrap();
    let before: BlockDocument = session.visual().document().clone();
    let revision = session.visual().revision();

    session.edit_text(|text| text.insert("print((1)\n"));
    let err = session.parse_to_blocks().unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Parse);
    assert_eq!(session.visual().document(), &before);
    assert_eq!(session.visual().revision(), revision);
}

#[test]
fn test_empty_code_clears_blocks() {
    let mut session = session_with_code("print(1)\n");
    session.parse_to_blocks().unwrap();
    assert!(!session.visual().document().is_empty());

    session.edit_text(|text| text.set_text("   \n"));
    let translation = session.parse_to_blocks().unwrap();

    assert_eq!(translation, Translation::Empty);
    assert!(session.visual().document().is_empty());
}

// ---
// Runs
// ---

#[tokio::test]
async fn test_run_uses_snapshot_of_code() {
    let mut session = session_with_code("print('first')\n");
    let captured = CapturedOutput::new();
    let task = session.start_run(captured.shared()).unwrap();

    session.edit_text(|text| text.set_text("print('second')\n"));
    assert_eq!(task.source(), "print('first')\n");

    task.execute().await.unwrap();
    assert_eq!(captured.contents(), "first\n");
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_overlapping_run_is_rejected() {
    let session = session();
    let task = session.start_run(SharedOutput::new(NullSink)).unwrap();

    let err = session.start_run(SharedOutput::new(NullSink)).err().unwrap();
    assert_eq!(err.kind, ErrorKind::RunInProgress);
    assert_eq!(err.category(), ErrorCategory::Session);

    task.execute().await.unwrap();
    assert!(session.start_run(SharedOutput::new(NullSink)).is_ok());
}

#[tokio::test]
async fn test_runtime_error_leaves_editor_state_alone() {
    let mut session = session_with_code("print(1)\nprint(missing)\n");
    session.parse_to_blocks().unwrap();
    let document = session.visual().document().clone();
    let captured = CapturedOutput::new();

    let err = session
        .start_run(captured.shared())
        .unwrap()
        .execute()
        .await
        .unwrap_err();

    assert_eq!(
        err.kind,
        ErrorKind::UndefinedName {
            name: "missing".into()
        }
    );
    assert_eq!(captured.contents(), "1\n");
    assert_eq!(session.visual().document(), &document);
    assert_eq!(session.code(), "print(1)\nprint(missing)\n");
}
