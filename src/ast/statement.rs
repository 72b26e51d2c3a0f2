//! Statement nodes (spec §3, "AST (closed variants)" — statements).
use super::expression::Expression;
use super::position::Position;
use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Mut,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_annotation: Type,
    pub is_mutable: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleElementBinding {
    pub name: String,
    pub is_mutable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDeclaration {
    pub name: String,
    /// Ordered, like the spec's `fields: ordered mapping field→Type`.
    pub fields: Vec<(String, Type)>,
    pub is_public: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDeclaration {
    pub name: String,
    pub variants: Vec<String>,
    pub is_public: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    pub name: String,
    pub is_static: bool,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub body: Vec<Statement>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImplBlock {
    pub type_name: String,
    pub methods: Vec<MethodDeclaration>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportStatement {
    /// `import "module"` form: brings every public declaration.
    pub module: Option<String>,
    /// `import { a, b } from "module"` / `import Name from "module"` form.
    pub from_module: Option<String>,
    pub items: Vec<String>,
    pub position: Position,
}

/// A statement node. Produced by the parser; mutated only by the optimizer
/// (which replaces whole nodes, e.g. collapsing an `if` into its taken
/// branch) and never by the semantic analyzer, which only annotates
/// expressions reachable from a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    VariableDeclaration {
        kind: DeclarationKind,
        name: String,
        type_annotation: Option<Type>,
        value: Expression,
        is_public: bool,
        position: Position,
    },
    TupleVariableDeclaration {
        elements: Vec<TupleElementBinding>,
        value: Expression,
        position: Position,
    },
    Assignment {
        target: Expression,
        value: Expression,
        position: Position,
    },
    FunctionDeclaration {
        name: String,
        params: Vec<Param>,
        return_type: Option<Type>,
        body: Vec<Statement>,
        is_async: bool,
        is_public: bool,
        position: Position,
    },
    StructDeclaration(StructDeclaration),
    EnumDeclaration(EnumDeclaration),
    ImplBlock(ImplBlock),
    IfStatement {
        condition: Expression,
        then_block: Vec<Statement>,
        elif_blocks: Vec<(Expression, Vec<Statement>)>,
        else_block: Option<Vec<Statement>>,
        position: Position,
    },
    ForLoop {
        variable: String,
        iterable: Expression,
        body: Vec<Statement>,
        position: Position,
    },
    WhileLoop {
        condition: Expression,
        body: Vec<Statement>,
        position: Position,
    },
    TryStatement {
        error_var: String,
        try_block: Vec<Statement>,
        catch_block: Vec<Statement>,
        position: Position,
    },
    ThrowStatement {
        value: Expression,
        position: Position,
    },
    ImportStatement(ImportStatement),
    ReturnStatement {
        value: Option<Expression>,
        position: Position,
    },
    BreakStatement {
        position: Position,
    },
    ContinueStatement {
        position: Position,
    },
    ShStatement {
        script: String,
        position: Position,
    },
    ExpressionStatement {
        expression: Expression,
        position: Position,
    },
}

impl Statement {
    pub fn position(&self) -> Position {
        match self {
            Statement::VariableDeclaration { position, .. }
            | Statement::TupleVariableDeclaration { position, .. }
            | Statement::Assignment { position, .. }
            | Statement::FunctionDeclaration { position, .. }
            | Statement::IfStatement { position, .. }
            | Statement::ForLoop { position, .. }
            | Statement::WhileLoop { position, .. }
            | Statement::TryStatement { position, .. }
            | Statement::ThrowStatement { position, .. }
            | Statement::ReturnStatement { position, .. }
            | Statement::BreakStatement { position }
            | Statement::ContinueStatement { position }
            | Statement::ShStatement { position, .. }
            | Statement::ExpressionStatement { position, .. } => *position,
            Statement::StructDeclaration(decl) => decl.position,
            Statement::EnumDeclaration(decl) => decl.position,
            Statement::ImplBlock(block) => block.position,
            Statement::ImportStatement(import) => import.position,
        }
    }

    /// Whether this top-level statement can be `pub`-exported to importers,
    /// per the module loader's visibility contract (spec §4.3).
    pub fn is_exportable_kind(&self) -> bool {
        matches!(
            self,
            Statement::FunctionDeclaration { .. }
                | Statement::StructDeclaration(_)
                | Statement::EnumDeclaration(_)
        ) || matches!(
            self,
            Statement::VariableDeclaration {
                kind: DeclarationKind::Const,
                ..
            }
        )
    }

    pub fn is_public(&self) -> bool {
        match self {
            Statement::VariableDeclaration { is_public, .. } => *is_public,
            Statement::FunctionDeclaration { is_public, .. } => *is_public,
            Statement::StructDeclaration(decl) => decl.is_public,
            Statement::EnumDeclaration(decl) => decl.is_public,
            _ => false,
        }
    }

    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Statement::VariableDeclaration { name, .. } => Some(name),
            Statement::FunctionDeclaration { name, .. } => Some(name),
            Statement::StructDeclaration(decl) => Some(&decl.name),
            Statement::EnumDeclaration(decl) => Some(&decl.name),
            _ => None,
        }
    }
}

/// The merged/whole program: statements plus any preprocessor directive
/// trivia retained for tooling (spec §3, `ProgramNode{statements, directives}`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}
