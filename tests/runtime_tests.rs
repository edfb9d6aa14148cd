// tests/runtime_tests.rs

mod common;

use common::{output_of, run_captured, session_with_code};
use pyblocks::errors::{ErrorCategory, ErrorKind};
use pyblocks::runtime::{CapturedOutput, ExecutionEngine, Interpreter};
use pyblocks::SourceContext;
use tokio_util::sync::CancellationToken;

async fn error_of(source: &str) -> ErrorKind {
    let (_, result) = run_captured(source).await;
    match result {
        Ok(()) => panic!("{:?} should fail", source),
        Err(e) => e.kind,
    }
}

// ---
// Output
// ---

#[tokio::test]
async fn test_hello() {
    assert_eq!(output_of("print(\"Hello Ace!\")").await, "Hello Ace!\n");
}

#[tokio::test]
async fn test_print_formats_like_python() {
    let source = "print(1, 2.0, 'a', True, None, [1, 'b'], (3,))\nprint(7 / 2, 7 // 2, -7 % 3, 2 ** 10)\n";
    assert_eq!(
        output_of(source).await,
        "1 2.0 a True None [1, 'b'] (3,)\n3.5 3 2 1024\n"
    );
}

#[tokio::test]
async fn test_print_sep_and_end() {
    assert_eq!(
        output_of("print(1, 2, sep='-', end='!')\nprint()\n").await,
        "1-2!\n"
    );
}

// ---
// Control flow
// ---

#[tokio::test]
async fn test_loops_and_branches() {
    let source = "\
total = 0
for i in range(10):
    if i % 2 == 0:
        continue
    if i > 7:
        break
    total += i
print(total)
n = 3
while n:
    n -= 1
else:
    print('done', n)
";
    assert_eq!(output_of(source).await, "16\ndone 0\n");
}

#[tokio::test]
async fn test_for_over_strings_and_lists() {
    let source = "for c in 'ab':\n    print(c)\nfor x, y in [(1, 2), (3, 4)]:\n    print(x + y)\n";
    assert_eq!(output_of(source).await, "a\nb\n3\n7\n");
}

#[tokio::test]
async fn test_elif_chain() {
    let source = "x = 5\nif x < 3:\n    print('low')\nelif x < 10:\n    print('mid')\nelse:\n    print('high')\n";
    assert_eq!(output_of(source).await, "mid\n");
}

#[tokio::test]
async fn test_lists_have_value_semantics() {
    let source = "a = [1, 2]\nb = a\nb[0] = 9\nprint(a, b, len(b))\n";
    assert_eq!(output_of(source).await, "[1, 2] [9, 2] 2\n");
}

#[tokio::test]
async fn test_builtins() {
    let source = "print(str(3) + '!', int('42'), abs(-2), min(3, 1, 2), max([4, 8]), float(1))\n";
    assert_eq!(output_of(source).await, "3! 42 2 1 8 1.0\n");
}

#[tokio::test]
async fn test_starred_unpacking() {
    let source = "\
a, *b = [1, 2, 3]
print(a, b)
*init, last = 'xyz'
print(init, last)
first, *mid, end = range(2)
print(first, mid, end)
for head, *rest in [(1, 2, 3), (4,)]:
    print(head, rest)
";
    assert_eq!(
        output_of(source).await,
        "1 [2, 3]\n['x', 'y'] z\n0 [] 1\n1 [2, 3]\n4 []\n"
    );
}

#[tokio::test]
async fn test_extreme_integers_in_ranges_and_slices() {
    let source = "\
print([1, 2, 3][2::9223372036854775807])
print([1, 2, 3][::-9223372036854775807])
print(9223372036854775807 in range(-5, 5))
print(-9223372036854775807 - 1 in range(-5, 5))
r = range(-9223372036854775807, 9223372036854775807, 9223372036854775807)
print(len(r), r[1], r[-2])
for i in range(9223372036854775806, 9223372036854775807, 10):
    print(i)
print(len(range(0, 9223372036854775807)))
";
    assert_eq!(
        output_of(source).await,
        "[3]\n[3]\nFalse\nFalse\n2 0 -9223372036854775807\n9223372036854775806\n9223372036854775807\n"
    );
}

// ---
// Errors
// ---

#[tokio::test]
async fn test_runtime_errors() {
    assert_eq!(
        error_of("print(y)").await,
        ErrorKind::UndefinedName { name: "y".into() }
    );
    assert!(matches!(error_of("1 / 0").await, ErrorKind::ZeroDivision { .. }));
    assert!(matches!(error_of("'a' + 1").await, ErrorKind::TypeMismatch { .. }));
    assert!(matches!(error_of("[1][3]").await, ErrorKind::IndexOutOfRange { .. }));
    assert!(matches!(error_of("int('x')").await, ErrorKind::InvalidValue { .. }));
    assert!(matches!(error_of("assert 1 == 2, 'no'").await, ErrorKind::AssertionFailed { .. }));
    assert_eq!(error_of("2 ** 64").await, ErrorKind::Overflow);
    assert_eq!(
        error_of("len(range(-9223372036854775807, 9223372036854775807))").await,
        ErrorKind::Overflow
    );
    assert!(matches!(
        error_of("a, *b, c = [1]").await,
        ErrorKind::InvalidValue { message } if message.contains("expected at least 2, got 1")
    ));
    assert_eq!(
        error_of("x = 3j").await,
        ErrorKind::Unsupported {
            construct: "complex".into()
        }
    );
}

#[tokio::test]
async fn test_async_forms_are_unsupported() {
    let (output, result) = run_captured("print(0)\nasync def f():\n    pass\n").await;
    assert_eq!(output, "0\n");
    assert_eq!(
        result.unwrap_err().kind,
        ErrorKind::Unsupported {
            construct: "async def".into()
        }
    );
    assert_eq!(
        error_of("async for i in g():\n    pass\n").await,
        ErrorKind::Unsupported {
            construct: "async for".into()
        }
    );
}

#[tokio::test]
async fn test_unsupported_statement_runs_after_earlier_output() {
    let (output, result) = run_captured("print('before')\ndef f():\n    pass\nprint('after')\n").await;
    assert_eq!(output, "before\n");
    let err = result.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Runtime);
    assert_eq!(
        err.kind,
        ErrorKind::Unsupported {
            construct: "def".into()
        }
    );
}

#[tokio::test]
async fn test_parse_errors_surface_before_running() {
    let (output, result) = run_captured("print(1)\nprint((\n").await;
    assert_eq!(output, "");
    assert_eq!(result.unwrap_err().category(), ErrorCategory::Parse);
}

// ---
// Cancellation
// ---

#[tokio::test]
async fn test_cancel_stops_infinite_loop() {
    let captured = CapturedOutput::new();
    let cancel = CancellationToken::new();
    let engine = Interpreter::with_yield_interval(8);
    let source = SourceContext::from_file("spin.py", "print('started')\nwhile True:\n    pass\n");

    let (result, ()) = tokio::join!(
        engine.run(&source, captured.shared(), cancel.clone()),
        async {
            tokio::task::yield_now().await;
            cancel.cancel();
        }
    );

    assert_eq!(result.unwrap_err().kind, ErrorKind::Cancelled);
    assert_eq!(captured.contents(), "started\n");
}

#[tokio::test]
async fn test_session_run_handle_cancels() {
    let session = session_with_code("while True:\n    x = 1\n");
    let task = session.start_run(CapturedOutput::new().shared()).unwrap();
    let handle = task.handle();

    let (result, ()) = tokio::join!(task.execute(), async {
        tokio::task::yield_now().await;
        handle.cancel();
    });

    assert_eq!(result.unwrap_err().kind, ErrorKind::Cancelled);
    assert!(handle.is_cancelled());
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_cancelled_before_start_produces_no_output() {
    let captured = CapturedOutput::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = Interpreter::new()
        .run(
            &SourceContext::from_file("t.py", "print(1)"),
            captured.shared(),
            cancel,
        )
        .await;
    assert_eq!(result.unwrap_err().kind, ErrorKind::Cancelled);
    assert_eq!(captured.contents(), "");
}
