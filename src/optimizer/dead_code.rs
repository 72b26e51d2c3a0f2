//! Dead-local elimination: a reverse scan collecting a live set
//! (spec §4.5, "Dead-local elimination").
use std::collections::HashSet;

use crate::ast::{Expression, Statement};

pub(super) fn eliminate_block(statements: &mut Vec<Statement>) {
    let mut live: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(statements.len());
    for statement in std::mem::take(statements).into_iter().rev() {
        if is_elidable(&statement, &live) {
            continue;
        }
        mark_live(&statement, &mut live);
        kept.push(statement);
    }
    kept.reverse();
    *statements = kept;
}

fn is_elidable(statement: &Statement, live: &HashSet<String>) -> bool {
    match statement {
        Statement::VariableDeclaration { name, value, is_public, .. } => {
            value.is_pure() && !live.contains(name) && !is_public
        }
        Statement::TupleVariableDeclaration { elements, value, .. } => {
            value.is_pure() && elements.iter().all(|element| !live.contains(&element.name))
        }
        Statement::Assignment { target, value, .. } => match target {
            Expression::Identifier { name, .. } => value.is_pure() && !live.contains(name),
            _ => false,
        },
        Statement::ExpressionStatement { expression, .. } => expression.is_pure(),
        _ => false,
    }
}

fn mark_live(statement: &Statement, live: &mut HashSet<String>) {
    match statement {
        Statement::VariableDeclaration { value, .. } | Statement::TupleVariableDeclaration { value, .. } => {
            mark_expr(value, live)
        }
        Statement::Assignment { target, value, .. } => {
            mark_expr(value, live);
            if !matches!(target, Expression::Identifier { .. }) {
                mark_expr(target, live);
            }
        }
        Statement::FunctionDeclaration { .. }
        | Statement::StructDeclaration(_)
        | Statement::EnumDeclaration(_)
        | Statement::ImplBlock(_)
        | Statement::ImportStatement(_)
        | Statement::BreakStatement { .. }
        | Statement::ContinueStatement { .. }
        | Statement::ShStatement { .. } => {}
        Statement::IfStatement { condition, then_block, elif_blocks, else_block, .. } => {
            mark_expr(condition, live);
            for inner in then_block {
                mark_live(inner, live);
            }
            for (elif_condition, elif_body) in elif_blocks {
                mark_expr(elif_condition, live);
                for inner in elif_body {
                    mark_live(inner, live);
                }
            }
            if let Some(body) = else_block {
                for inner in body {
                    mark_live(inner, live);
                }
            }
        }
        Statement::ForLoop { iterable, body, .. } => {
            mark_expr(iterable, live);
            for inner in body {
                mark_live(inner, live);
            }
        }
        Statement::WhileLoop { condition, body, .. } => {
            mark_expr(condition, live);
            for inner in body {
                mark_live(inner, live);
            }
        }
        Statement::TryStatement { try_block, catch_block, .. } => {
            for inner in try_block {
                mark_live(inner, live);
            }
            for inner in catch_block {
                mark_live(inner, live);
            }
        }
        Statement::ThrowStatement { value, .. } => mark_expr(value, live),
        Statement::ReturnStatement { value, .. } => {
            if let Some(inner) = value {
                mark_expr(inner, live);
            }
        }
        Statement::ExpressionStatement { expression, .. } => mark_expr(expression, live),
    }
}

fn mark_expr(expr: &Expression, live: &mut HashSet<String>) {
    match expr {
        Expression::Identifier { name, .. } => {
            live.insert(name.clone());
        }
        Expression::Binary { left, right, .. }
        | Expression::Pipe { left, right, .. }
        | Expression::NullCoalesce { left, right, .. } => {
            mark_expr(left, live);
            mark_expr(right, live);
        }
        Expression::Unary { operand, .. } => mark_expr(operand, live),
        Expression::Cast { value, .. } => mark_expr(value, live),
        Expression::FunctionCall { args, .. } => {
            for arg in args {
                mark_expr(arg, live);
            }
        }
        Expression::MethodCall { object, args, .. } => {
            mark_expr(object, live);
            for arg in args {
                mark_expr(arg, live);
            }
        }
        Expression::MemberAccess { object, .. } | Expression::SafeNavigation { object, .. } => mark_expr(object, live),
        Expression::IndexAccess { object, index, .. } => {
            mark_expr(object, live);
            mark_expr(index, live);
        }
        Expression::ArrayLiteral { elements, .. } | Expression::TupleExpression { elements, .. } => {
            for element in elements {
                mark_expr(element, live);
            }
        }
        Expression::MapLiteral { entries, .. } => {
            for entry in entries {
                mark_expr(&entry.key, live);
                mark_expr(&entry.value, live);
            }
        }
        Expression::StructLiteral { fields, .. } => {
            for field in fields {
                mark_expr(&field.value, live);
            }
        }
        Expression::Range { start, end, .. } => {
            mark_expr(start, live);
            mark_expr(end, live);
        }
        Expression::Command { args, .. } => {
            for arg in args {
                mark_expr(arg, live);
            }
        }
        Expression::Await { value, .. } => mark_expr(value, live),
        _ => {}
    }
}
