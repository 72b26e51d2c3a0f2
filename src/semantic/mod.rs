//! Semantic analysis (spec §4.4): symbol table plus the analyzer that
//! populates and validates against it.
pub mod analyzer;
pub mod symbol;

pub use analyzer::SemanticAnalyzer;
pub use symbol::{FunctionSymbol, MethodSymbol, SymbolTable, TypeSymbol, VariableSymbol};
