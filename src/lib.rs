//! pyblocks: the core of a dual-surface Python editor.
//!
//! A block editor and a text editor show the same program. Block edits
//! regenerate the code; the text is the source of truth for runs; an explicit
//! action translates the code back into blocks, dropping whatever has no
//! block equivalent.
//!
//! ```
//! use pyblocks::{translate, generate_code};
//!
//! let translation = translate("x = 5\nprint(x)\n").unwrap();
//! let code = generate_code(translation.document().unwrap());
//! assert_eq!(code, "x = 5\nprint('x')\n");
//! ```

pub use crate::blocks::{
    build_default_block_registry, generate_code, Block, BlockDocument, BlockRegistry, FieldValue,
};
pub use crate::errors::{EditorError, ErrorCategory, ErrorKind, SourceContext};
pub use crate::runtime::{ExecutionEngine, Interpreter, OutputSink, SharedOutput};
pub use crate::session::{EditorSession, RunHandle, RunTask, SessionConfig};
pub use crate::surface::{BlockWorkspace, TextBuffer, TextSurface, VisualSurface};
pub use crate::translate::{translate, translate_source, DropReason, Translation};

pub mod blocks;
pub mod cli;
pub mod errors;
pub mod runtime;
pub mod session;
pub mod surface;
pub mod syntax;
pub mod translate;
