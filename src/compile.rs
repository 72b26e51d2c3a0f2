//! Top-level pipeline orchestration (spec §2): preprocessor through bash
//! text optimizer, wired behind one entry point.
use std::path::Path;

use log::info;

use crate::ast::parse_program;
use crate::bash_text_optimizer::{self, BashOptimizationOptions};
use crate::codegen::{self, GeneratedScript};
use crate::diagnostics::DiagnosticSink;
use crate::loader::{FileReader, ModuleLoader, OsFileReader, StdLibLocator};
use crate::optimizer::{self, AstOptimizationOptions};
use crate::preprocessor::preprocess;
use crate::semantic::SemanticAnalyzer;

/// Bundles both optimizer option structs plus an optional standard-library
/// resolver, so a driver has one knob to configure per compilation.
pub struct CompileOptions<'a> {
    pub ast_optimization: AstOptimizationOptions,
    pub bash_optimization: BashOptimizationOptions,
    pub std_lib: Option<&'a dyn StdLibLocator>,
}

impl<'a> Default for CompileOptions<'a> {
    fn default() -> Self {
        CompileOptions {
            ast_optimization: AstOptimizationOptions::default(),
            bash_optimization: BashOptimizationOptions::default(),
            std_lib: None,
        }
    }
}

/// Outcome of a compilation attempt: diagnostics always present, emitted
/// script and codegen warnings only when the pipeline reached codegen.
pub struct CompileResult {
    pub sink: DiagnosticSink,
    pub script: Option<String>,
    pub codegen_warnings: Vec<String>,
}

impl CompileResult {
    pub fn succeeded(&self) -> bool {
        !self.sink.has_errors() && self.script.is_some()
    }
}

/// Runs the full pipeline for a single entry file, using the OS filesystem.
pub fn compile_file(entry_path: &Path, options: &CompileOptions) -> CompileResult {
    compile_with_reader(entry_path, &OsFileReader, options)
}

/// Runs the full pipeline with a caller-supplied [`FileReader`], so tests
/// can compile from an in-memory filesystem.
pub fn compile_with_reader(entry_path: &Path, reader: &dyn FileReader, options: &CompileOptions) -> CompileResult {
    let mut sink = DiagnosticSink::for_file(entry_path.to_string_lossy().to_string());

    let loader = ModuleLoader::new(reader, options.std_lib);
    let Some(mut program) = loader.load(entry_path, &mut sink) else {
        return CompileResult { sink, script: None, codegen_warnings: vec![] };
    };

    if sink.has_errors() {
        return CompileResult { sink, script: None, codegen_warnings: vec![] };
    }

    let mut analyzer = SemanticAnalyzer::new();
    analyzer.analyze(&mut program, &mut sink);

    if sink.has_errors() {
        return CompileResult { sink, script: None, codegen_warnings: vec![] };
    }

    optimizer::optimize(&mut program, &options.ast_optimization);

    info!("generating shell script for '{}'", entry_path.display());
    let GeneratedScript { script, warnings } = codegen::generate(&program);
    let optimized = bash_text_optimizer::optimize(&script, &options.bash_optimization);

    CompileResult { sink, script: Some(optimized), codegen_warnings: warnings }
}

/// Parses and typechecks a single source string with no module loading;
/// used by the `--print-ast`/`--print-typed-ast` debug paths and by tests
/// that don't need multi-file resolution.
pub fn parse_and_check(source: &str, file_path: &str) -> (Option<crate::ast::Program>, DiagnosticSink) {
    let mut sink = DiagnosticSink::for_file(file_path.to_string());
    let preprocessed = preprocess(source, &mut sink);
    let Some(mut program) = parse_program(&preprocessed.text, &mut sink) else {
        return (None, sink);
    };
    let mut analyzer = SemanticAnalyzer::new();
    analyzer.analyze(&mut program, &mut sink);
    (Some(program), sink)
}
