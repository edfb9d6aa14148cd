// tests/translate_tests.rs

mod common;

use common::report;
use pyblocks::blocks::{slots, Block, FieldValue, FOR_STATEMENT, IF_STATEMENT, PRINT_STATEMENT};
use pyblocks::errors::{ErrorCategory, ErrorKind};
use pyblocks::syntax::layout::MAX_NESTING_DEPTH;
use pyblocks::translate::{translate, DropReason, Translation};
use pyblocks::{build_default_block_registry, generate_code};

// ---
// Contract examples
// ---

#[test]
fn test_empty_source_is_not_an_error() {
    assert_eq!(translate("").unwrap(), Translation::Empty);
    assert_eq!(translate("\n   \n").unwrap(), Translation::Empty);
}

#[test]
fn test_only_unsupported_forms_gives_empty_document() {
    let report = report("def greet():\n    print('hi')\n");
    assert!(report.document.is_empty());
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].form, "def");
    assert_eq!(report.dropped[0].reason, DropReason::UnsupportedForm);
}

#[test]
fn test_counted_loop_over_range() {
    let report = report("for i in range(3): print(i)");
    assert_eq!(
        report.document.blocks,
        vec![Block::new(FOR_STATEMENT)
            .with_field(slots::VAR, FieldValue::Text("i".into()))
            .with_field(slots::RANGE, FieldValue::Number(3.0))
            .with_statements(
                slots::DO,
                vec![Block::new(PRINT_STATEMENT).with_value(slots::TEXT, Some(Block::text("i")))]
            )]
    );
}

#[test]
fn test_condition_name_becomes_text_literal() {
    let report = report("if x: print(\"hello\")");
    let block = &report.document.blocks[0];
    assert_eq!(block.kind, IF_STATEMENT);
    assert_eq!(block.value(slots::COND), Some(&Block::text("x")));
    assert_eq!(
        block.statements(slots::DO),
        &[Block::new(PRINT_STATEMENT).with_value(slots::TEXT, Some(Block::text("hello")))]
    );
}

#[test]
fn test_malformed_program_is_a_parse_error() {
    let err = translate("print((1)").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Parse);
}

// ---
// Round trips over the supported subset
// ---

fn assert_idempotent(source: &str) {
    let first = report(source).document;
    let regenerated = generate_code(&first);
    let second = report(&regenerated).document;
    assert_eq!(first, second, "{:?} regenerated as {:?}", source, regenerated);
}

#[test]
fn test_single_statement_round_trips() {
    for source in [
        "print(1)",
        "print('hello')",
        "print(\"it's\")",
        "print(2.5)",
        "x = 5",
        "name = 'Ada'",
        "x = -3",
        "y = value",
        "z = 1e400",
    ] {
        assert_idempotent(source);
    }
}

#[test]
fn test_nested_program_round_trips() {
    assert_idempotent(
        "n = 4\nfor i in range(10):\n    if flag:\n        print('tick')\n    x = 0\nif done:\n    pass\n",
    );
}

#[test]
fn test_generated_code_shape() {
    let document = report("for i in range(2):\n    print(i)\nx = 'a'\nif y:\n    pass\n").document;
    assert_eq!(
        generate_code(&document),
        "for i in range(2):\n  print('i')\nx = 'a'\nif 'y':\n  pass\n"
    );
}

#[test]
fn test_translated_documents_validate() {
    let registry = build_default_block_registry();
    let document = report("x = 1\nfor i in range(5):\n    if x:\n        print(x)\nprint(z + 1)\n").document;
    registry.validate(&document).unwrap();
}

// ---
// Dropped statements are observable
// ---

#[test]
fn test_drops_keep_source_order_and_spans() {
    let source = "import os\nprint(1)\nwhile x:\n    pass\n";
    let report = report(source);
    assert_eq!(report.document.blocks.len(), 1);
    let spans: Vec<_> = report
        .dropped
        .iter()
        .map(|d| &source[d.span.start..d.span.end])
        .collect();
    assert_eq!(spans, vec!["import os", "while x:\n    pass"]);
}

#[test]
fn test_for_else_is_reported() {
    let report = report("for i in range(2):\n    print(i)\nelse:\n    print('done')\n");
    // for, print and the text literal inside it
    assert_eq!(report.document.block_count(), 3);
    assert_eq!(report.dropped[0].reason, DropReason::IgnoredElse);
    assert_eq!(report.dropped[0].form, "for");
}

#[test]
fn test_literal_bools_and_none_leave_slots_empty() {
    let report = report("flag = True\nprint(None)\n");
    assert!(report.document.blocks[0].value(slots::VALUE).is_none());
    assert!(report.document.blocks[1].value(slots::TEXT).is_none());
}

#[test]
fn test_decorated_definition_is_dropped() {
    let source = "@dec\ndef f(): pass\nprint(1)\n";
    let translated = report(source);
    assert_eq!(
        translated.document.blocks,
        vec![Block::new(PRINT_STATEMENT).with_value(slots::TEXT, Some(Block::number(1.0)))]
    );
    assert_eq!(translated.dropped.len(), 1);
    let span = translated.dropped[0].span;
    assert_eq!(&source[span.start..span.end], "@dec\ndef f(): pass");
    assert_eq!(translated.dropped[0].reason, DropReason::UnsupportedForm);
}

#[test]
fn test_unsupported_expressions_leave_slots_empty() {
    for source in ["f = lambda a: a", "x = 3j", "y = (n := 10)", "z = 1e400", "w = -1e400"] {
        let translated = report(source);
        assert!(translated.dropped.is_empty(), "{:?}", source);
        assert_eq!(translated.document.blocks.len(), 1, "{:?}", source);
        assert!(
            translated.document.blocks[0].value(slots::VALUE).is_none(),
            "{:?}",
            source
        );
    }
}

#[test]
fn test_unsupported_statement_forms_are_dropped() {
    for (source, form, reason) in [
        ("a, *b = c", "assignment", DropReason::ComplexTarget),
        ("async def f(): pass", "async def", DropReason::UnsupportedForm),
        ("async for i in g(): pass", "async for", DropReason::UnsupportedForm),
        ("def g():\n    yield 1", "def", DropReason::UnsupportedForm),
    ] {
        let translated = report(&format!("{}\nprint('kept')\n", source));
        assert_eq!(translated.document.blocks.len(), 1, "{:?}", source);
        assert_eq!(translated.dropped[0].form, form);
        assert_eq!(translated.dropped[0].reason, reason);
    }
}

#[test]
fn test_deeply_nested_expression_translates() {
    let depth = 40;
    let source = format!("print({}1{})\n", "(".repeat(depth), ")".repeat(depth));
    let translated = std::thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .spawn(move || report(&source))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(
        translated.document.blocks,
        vec![Block::new(PRINT_STATEMENT).with_value(slots::TEXT, Some(Block::number(1.0)))]
    );
}

#[test]
fn test_nesting_limit_is_a_parse_error() {
    let depth = MAX_NESTING_DEPTH + 1;
    let err = translate(&format!("print({}1{})\n", "[".repeat(depth), "]".repeat(depth))).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Parse);
    assert_eq!(
        err.kind,
        ErrorKind::NestingTooDeep {
            limit: MAX_NESTING_DEPTH
        }
    );
}

#[test]
fn test_json_export_uses_type_key() {
    let document = report("print(1)").document;
    let json = document.to_json().unwrap();
    assert!(json.contains("\"type\": \"print-statement\""), "{}", json);
}

#[test]
fn test_xml_export_chains_siblings() {
    let xml = report("x = 1\nprint(x)\n").document.to_xml();
    assert!(xml.starts_with("<xml"));
    assert!(xml.contains("<block type=\"assign-statement\">"), "{}", xml);
    assert!(xml.contains("<next>"), "{}", xml);
}
