//! `brash`: a small imperative, statically-typed scripting language that
//! compiles to POSIX shell / bash scripts.
#[macro_use]
extern crate pest_derive;

pub mod ast;
pub mod bash_text_optimizer;
pub mod codegen;
pub mod compile;
pub mod diagnostics;
pub mod loader;
pub mod optimizer;
pub mod preprocessor;
pub mod semantic;

pub use compile::{compile_file, compile_with_reader, CompileOptions, CompileResult};
