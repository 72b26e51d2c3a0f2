//! Expression nodes (spec §3, "AST (closed variants)" — expressions).
use super::position::Position;
use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Cmd,
    Exec,
    Spawn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructLiteralField {
    pub name: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: Expression,
    pub value: Expression,
}

/// An expression node. Mutated in place during semantic resolution
/// (`MethodCall::is_static_dispatch`/`static_type_name`, literal type
/// annotations) and during AST optimization (constant folding/propagation
/// substitute nodes wholesale, never mutate through a shared reference).
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    IntLiteral {
        value: i64,
        position: Position,
    },
    FloatLiteral {
        value: f64,
        position: Position,
    },
    StringLiteral {
        value: String,
        is_interpolated: bool,
        is_multiline: bool,
        position: Position,
    },
    CharLiteral {
        value: char,
        position: Position,
    },
    BoolLiteral {
        value: bool,
        position: Position,
    },
    NullLiteral {
        position: Position,
    },
    Identifier {
        name: String,
        position: Position,
    },
    SelfExpr {
        position: Position,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        position: Position,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
        position: Position,
    },
    Cast {
        value: Box<Expression>,
        target_type: Type,
        position: Position,
    },
    FunctionCall {
        callee: String,
        args: Vec<Expression>,
        position: Position,
    },
    MethodCall {
        object: Box<Expression>,
        name: String,
        args: Vec<Expression>,
        is_static_dispatch: bool,
        static_type_name: Option<String>,
        position: Position,
    },
    MemberAccess {
        object: Box<Expression>,
        member: String,
        position: Position,
    },
    SafeNavigation {
        object: Box<Expression>,
        member: String,
        position: Position,
    },
    IndexAccess {
        object: Box<Expression>,
        index: Box<Expression>,
        position: Position,
    },
    ArrayLiteral {
        elements: Vec<Expression>,
        position: Position,
    },
    MapLiteral {
        entries: Vec<MapEntry>,
        position: Position,
    },
    StructLiteral {
        type_name: String,
        fields: Vec<StructLiteralField>,
        position: Position,
    },
    TupleExpression {
        elements: Vec<Expression>,
        position: Position,
    },
    Pipe {
        left: Box<Expression>,
        right: Box<Expression>,
        position: Position,
    },
    NullCoalesce {
        left: Box<Expression>,
        right: Box<Expression>,
        position: Position,
    },
    Range {
        start: Box<Expression>,
        end: Box<Expression>,
        position: Position,
    },
    Command {
        kind: CommandKind,
        is_async: bool,
        args: Vec<Expression>,
        position: Position,
    },
    Await {
        value: Box<Expression>,
        position: Position,
    },
    EnumLiteral {
        enum_name: String,
        variant: String,
        position: Position,
    },
}

impl Expression {
    pub fn position(&self) -> Position {
        match self {
            Expression::IntLiteral { position, .. }
            | Expression::FloatLiteral { position, .. }
            | Expression::StringLiteral { position, .. }
            | Expression::CharLiteral { position, .. }
            | Expression::BoolLiteral { position, .. }
            | Expression::NullLiteral { position }
            | Expression::Identifier { position, .. }
            | Expression::SelfExpr { position }
            | Expression::Binary { position, .. }
            | Expression::Unary { position, .. }
            | Expression::Cast { position, .. }
            | Expression::FunctionCall { position, .. }
            | Expression::MethodCall { position, .. }
            | Expression::MemberAccess { position, .. }
            | Expression::SafeNavigation { position, .. }
            | Expression::IndexAccess { position, .. }
            | Expression::ArrayLiteral { position, .. }
            | Expression::MapLiteral { position, .. }
            | Expression::StructLiteral { position, .. }
            | Expression::TupleExpression { position, .. }
            | Expression::Pipe { position, .. }
            | Expression::NullCoalesce { position, .. }
            | Expression::Range { position, .. }
            | Expression::Command { position, .. }
            | Expression::Await { position, .. }
            | Expression::EnumLiteral { position, .. } => *position,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expression::IntLiteral { .. }
                | Expression::FloatLiteral { .. }
                | Expression::StringLiteral { .. }
                | Expression::CharLiteral { .. }
                | Expression::BoolLiteral { .. }
                | Expression::NullLiteral { .. }
        )
    }

    /// Structural purity used by dead-local elimination: no side effects,
    /// so evaluating (or eliding) it changes nothing observable.
    pub fn is_pure(&self) -> bool {
        match self {
            Expression::IntLiteral { .. }
            | Expression::FloatLiteral { .. }
            | Expression::StringLiteral { .. }
            | Expression::CharLiteral { .. }
            | Expression::BoolLiteral { .. }
            | Expression::NullLiteral { .. }
            | Expression::Identifier { .. }
            | Expression::SelfExpr { .. } => true,
            Expression::Binary { left, right, .. } => left.is_pure() && right.is_pure(),
            Expression::Unary { operand, .. } => operand.is_pure(),
            Expression::Cast { value, .. } => value.is_pure(),
            Expression::MemberAccess { object, .. } => object.is_pure(),
            Expression::SafeNavigation { object, .. } => object.is_pure(),
            Expression::IndexAccess { object, index, .. } => object.is_pure() && index.is_pure(),
            Expression::ArrayLiteral { elements, .. } => elements.iter().all(Expression::is_pure),
            Expression::MapLiteral { entries, .. } => entries
                .iter()
                .all(|entry| entry.key.is_pure() && entry.value.is_pure()),
            Expression::StructLiteral { fields, .. } => {
                fields.iter().all(|field| field.value.is_pure())
            }
            Expression::TupleExpression { elements, .. } => elements.iter().all(Expression::is_pure),
            Expression::NullCoalesce { left, right, .. } => left.is_pure() && right.is_pure(),
            Expression::Range { start, end, .. } => start.is_pure() && end.is_pure(),
            Expression::EnumLiteral { .. } => true,
            // Calls, method calls, commands, pipes, and await are impure.
            Expression::FunctionCall { .. }
            | Expression::MethodCall { .. }
            | Expression::Pipe { .. }
            | Expression::Command { .. }
            | Expression::Await { .. } => false,
        }
    }
}
