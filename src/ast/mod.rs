//! Abstract syntax tree: closed-variant node types plus the grammar-driven
//! parser that builds them (spec §3, §4.2).
pub mod expression;
pub mod parser;
pub mod position;
pub mod statement;
pub mod types;

pub use expression::{BinaryOp, CommandKind, Expression, MapEntry, StructLiteralField, UnaryOp};
pub use parser::parse_program;
pub use position::{Position, NO_POSITION};
pub use statement::{
    DeclarationKind, EnumDeclaration, ImplBlock, ImportStatement, MethodDeclaration, Param, Program,
    Statement, StructDeclaration, TupleElementBinding,
};
pub use types::{PrimitiveKind, Type};
