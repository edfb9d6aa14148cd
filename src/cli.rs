//! Command-line front end for the `pyblocks` binary.
//!
//! Each subcommand drives one library surface directly: the translator, the
//! code generator, the interpreter, the parser or the block registry.

use std::{fs, path::Path, path::PathBuf, process};

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use crate::{
    blocks::{generate_code, BlockDocument, DEFAULT_BLOCK_REGISTRY},
    errors::{print_error, unspanned, DiagnosticContext, EditorError, ErrorKind, ErrorReporting, SourceContext},
    runtime::{ExecutionEngine, Interpreter, SharedOutput, StdoutSink},
    syntax,
    translate::{translate_source, Translation, TranslationReport},
};

pub mod output;

// ============================================================================
// CLI ARGUMENTS
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "pyblocks",
    version,
    about = "Translate Python to blocks, blocks to Python, and run the result."
)]
pub struct PyblocksArgs {
    #[command(subcommand)]
    pub command: ArgsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ArgsCommand {
    /// Translate a Python file into a block document.
    Translate {
        #[arg(required = true)]
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = DocumentFormat::Json)]
        format: DocumentFormat,
    },
    /// Generate Python from a JSON block document.
    Codegen {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Translate a Python file, regenerate it from blocks and diff the two.
    Roundtrip {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Run a Python file with the built-in interpreter.
    Run {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Show the syntax tree for a Python file as JSON.
    Ast {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// List the registered block types.
    Blocks {
        /// Print full schemas as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocumentFormat {
    Json,
    Xml,
}

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

pub fn run() {
    let args = PyblocksArgs::parse();

    match args.command {
        ArgsCommand::Translate { file, format } => {
            let source = read_source_or_exit(&file);
            let translation = or_exit(translate_source(&source));
            output::print_dropped(&source, translation.dropped());
            let rendered = match (&translation, format) {
                (Translation::Document(report), DocumentFormat::Json) => {
                    or_exit(to_json(&source, report))
                }
                (translation, DocumentFormat::Xml) => translation
                    .document()
                    .map(BlockDocument::to_xml)
                    .unwrap_or_else(|| BlockDocument::default().to_xml()),
                (Translation::Empty, DocumentFormat::Json) => {
                    or_exit(to_json(&source, &TranslationReport::default()))
                }
            };
            println!("{}", rendered);
        }

        ArgsCommand::Codegen { file } => {
            let source = read_source_or_exit(&file);
            let document = or_exit(load_document(&source));
            print!("{}", generate_code(&document));
        }

        ArgsCommand::Roundtrip { file } => {
            let source = read_source_or_exit(&file);
            let translation = or_exit(translate_source(&source));
            output::print_dropped(&source, translation.dropped());
            let generated = generate_code(&translation.into_document());
            output::print_diff(&source.content, &generated);
        }

        ArgsCommand::Run { file } => {
            let source = read_source_or_exit(&file);
            or_exit(run_source(&source));
        }

        ArgsCommand::Ast { file } => {
            let source = read_source_or_exit(&file);
            let module = or_exit(syntax::parse(&source));
            println!("{}", or_exit(to_json(&source, &module)));
        }

        ArgsCommand::Blocks { json } => {
            let registry = &*DEFAULT_BLOCK_REGISTRY;
            if json {
                let json = registry.to_json().map_err(|e| {
                    DiagnosticContext::new(SourceContext::fallback("block registry"), "session")
                        .internal_error(&format!("serialisation failed: {}", e), unspanned())
                });
                println!("{}", or_exit(json));
            } else {
                output::print_registry(registry);
            }
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn or_exit<T>(result: Result<T, EditorError>) -> T {
    result.unwrap_or_else(|e| {
        print_error(e);
        process::exit(1);
    })
}

fn read_source_or_exit(path: &Path) -> SourceContext {
    or_exit(read_source(path))
}

/// Read a file into a named source for diagnostics.
pub fn read_source(path: &Path) -> Result<SourceContext, EditorError> {
    let name = path.display().to_string();
    fs::read_to_string(path)
        .map(|content| SourceContext::from_file(name.clone(), content))
        .map_err(|e| {
            DiagnosticContext::new(SourceContext::fallback("file system"), "session").report(
                ErrorKind::FileRead {
                    path: name,
                    message: e.to_string(),
                },
                unspanned(),
            )
        })
}

/// Parse and validate a JSON block document against the default registry.
pub fn load_document(source: &SourceContext) -> Result<BlockDocument, EditorError> {
    let document = BlockDocument::from_json(&source.content).map_err(|e| {
        DiagnosticContext::new(source.clone(), "session").report(
            ErrorKind::InvalidDocument {
                message: e.to_string(),
            },
            unspanned(),
        )
    })?;
    DEFAULT_BLOCK_REGISTRY.validate(&document)?;
    Ok(document)
}

fn to_json(source: &SourceContext, value: &impl serde::Serialize) -> Result<String, EditorError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        DiagnosticContext::new(source.clone(), "session")
            .internal_error(&format!("serialisation failed: {}", e), unspanned())
    })
}

fn run_source(source: &SourceContext) -> Result<(), EditorError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| {
            DiagnosticContext::new(source.clone(), "runtime")
                .internal_error(&format!("cannot start the async runtime: {}", e), unspanned())
        })?;
    let output = SharedOutput::new(StdoutSink);
    let summary = runtime.block_on(Interpreter::new().run(source, output, CancellationToken::new()))?;
    log::info!("run: {} instructions", summary.instructions);
    Ok(())
}
