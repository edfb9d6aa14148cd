//! Output sinks for program output.
//!
//! Interpreted programs never write to stdout directly; `print` goes through
//! a [`SharedOutput`], so the CLI can stream to the terminal and tests can
//! capture into an [`OutputBuffer`].

use std::{cell::RefCell, io::Write, rc::Rc};

/// Receives program output as raw text chunks, line endings included.
pub trait OutputSink {
    fn emit(&mut self, text: &str);
}

/// Discards everything.
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _text: &str) {}
}

/// Shared, mutable handle to an output sink.
#[derive(Clone)]
pub struct SharedOutput(pub Rc<RefCell<dyn OutputSink>>);

impl SharedOutput {
    pub fn new<T: OutputSink + 'static>(sink: T) -> Self {
        SharedOutput(Rc::new(RefCell::new(sink)))
    }

    pub fn emit(&self, text: &str) {
        self.0.borrow_mut().emit(text);
    }
}

/// OutputBuffer: collects output into a String for testing or programmatic capture.
#[derive(Debug, Default, Clone)]
pub struct OutputBuffer {
    pub buffer: String,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

impl OutputSink for OutputBuffer {
    fn emit(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

/// An [`OutputBuffer`] that stays readable after being handed to a run.
#[derive(Clone, Default)]
pub struct CapturedOutput(Rc<RefCell<OutputBuffer>>);

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> SharedOutput {
        SharedOutput(self.0.clone())
    }

    pub fn contents(&self) -> String {
        self.0.borrow().buffer.clone()
    }
}

/// StdoutSink: writes output to stdout for CLI use.
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_output_sees_emitted_text() {
        let captured = CapturedOutput::new();
        let shared = captured.shared();
        shared.emit("a\n");
        shared.clone().emit("b");
        assert_eq!(captured.contents(), "a\nb");
    }
}
