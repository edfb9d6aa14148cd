//! Editing surfaces
//!
//! The session talks to the two editors through narrow traits: the visual
//! surface holds a block document and can regenerate code from it, the text
//! surface holds a string and a cursor. [`BlockWorkspace`] and [`TextBuffer`]
//! are the in-memory implementations used by the CLI and the tests.

use crate::blocks::{build_default_block_registry, generate_code, BlockDocument, BlockRegistry};
use crate::errors::EditorError;

/// A block editor.
pub trait VisualSurface {
    /// Replace the whole document. A rejected document leaves the current
    /// content untouched.
    fn load_document(&mut self, document: BlockDocument) -> Result<(), EditorError>;

    fn clear(&mut self);

    fn document(&self) -> &BlockDocument;

    /// Python source for the current document.
    fn generate_code(&self) -> String {
        generate_code(self.document())
    }
}

/// A plain text editor.
pub trait TextSurface {
    fn text(&self) -> &str;

    /// Overwrite the content and move the cursor to the start.
    fn set_text(&mut self, text: &str);

    /// Cursor position as a byte offset into [`TextSurface::text`].
    fn cursor(&self) -> usize;
}

// ============================================================================
// IN-MEMORY VISUAL SURFACE
// ============================================================================

/// Block workspace validated against a registry. `revision` increments on
/// every mutation, which lets callers observe that nothing changed.
#[derive(Debug, Clone)]
pub struct BlockWorkspace {
    registry: BlockRegistry,
    document: BlockDocument,
    revision: u64,
}

impl BlockWorkspace {
    pub fn new(registry: BlockRegistry) -> Self {
        Self {
            registry,
            document: BlockDocument::default(),
            revision: 0,
        }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Direct access for user edits. Counts as a mutation.
    pub fn document_mut(&mut self) -> &mut BlockDocument {
        self.revision += 1;
        &mut self.document
    }
}

impl Default for BlockWorkspace {
    fn default() -> Self {
        Self::new(build_default_block_registry())
    }
}

impl VisualSurface for BlockWorkspace {
    fn load_document(&mut self, document: BlockDocument) -> Result<(), EditorError> {
        self.registry.validate(&document)?;
        self.document = document;
        self.revision += 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.document.blocks.clear();
        self.revision += 1;
    }

    fn document(&self) -> &BlockDocument {
        &self.document
    }
}

// ============================================================================
// IN-MEMORY TEXT SURFACE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBuffer {
    text: String,
    cursor: usize,
    revision: u64,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.len();
        Self {
            text,
            cursor,
            revision: 0,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Move the cursor, clamped to the text and snapped back to a char boundary.
    pub fn set_cursor(&mut self, position: usize) {
        let mut position = position.min(self.text.len());
        while !self.text.is_char_boundary(position) {
            position -= 1;
        }
        self.cursor = position;
    }

    /// Type `input` at the cursor.
    pub fn insert(&mut self, input: &str) {
        self.text.insert_str(self.cursor, input);
        self.cursor += input.len();
        self.revision += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        let Some(c) = self.text[..self.cursor].chars().next_back() else {
            return;
        };
        self.cursor -= c.len_utf8();
        self.text.remove(self.cursor);
        self.revision += 1;
    }
}

impl TextSurface for TextBuffer {
    fn text(&self) -> &str {
        &self.text
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = 0;
        self.revision += 1;
    }

    fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{slots, Block, PRINT_STATEMENT};

    #[test]
    fn rejected_document_leaves_workspace_untouched() {
        let mut workspace = BlockWorkspace::default();
        let good = BlockDocument::new(vec![
            Block::new(PRINT_STATEMENT).with_value(slots::TEXT, Some(Block::text("a")))
        ]);
        workspace.load_document(good.clone()).unwrap();
        let revision = workspace.revision();

        let bad = BlockDocument::new(vec![Block::new("nope")]);
        assert!(workspace.load_document(bad).is_err());
        assert_eq!(workspace.document(), &good);
        assert_eq!(workspace.revision(), revision);
        assert_eq!(workspace.generate_code(), "print('a')\n");
    }

    #[test]
    fn text_buffer_editing() {
        let mut buffer = TextBuffer::new("x = 1");
        buffer.insert("0");
        assert_eq!(buffer.text(), "x = 10");
        buffer.backspace();
        buffer.backspace();
        assert_eq!(buffer.text(), "x = ");
        buffer.set_text("y");
        assert_eq!(buffer.cursor(), 0);
    }

    #[test]
    fn cursor_snaps_to_char_boundary() {
        let mut buffer = TextBuffer::new("é");
        buffer.set_cursor(1);
        assert_eq!(buffer.cursor(), 0);
        buffer.set_cursor(99);
        assert_eq!(buffer.cursor(), 2);
    }
}
