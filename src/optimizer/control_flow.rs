//! Control-flow simplification over already-folded conditions
//! (spec §4.5, "Control-flow simplification").
use crate::ast::{Expression, Statement};

fn literal_bool(expr: &Expression) -> Option<bool> {
    match expr {
        Expression::BoolLiteral { value, .. } => Some(*value),
        _ => None,
    }
}

/// Collapses `if`s whose condition is a literal bool into whichever branch
/// is statically taken, and drops `while false { ... }` entirely.
pub(super) fn simplify_block(statements: &mut Vec<Statement>) {
    let old = std::mem::take(statements);
    let mut result = Vec::with_capacity(old.len());
    for statement in old {
        match statement {
            Statement::IfStatement { condition, then_block, elif_blocks, else_block, position } => {
                result.extend(resolve_if(condition, then_block, elif_blocks, else_block, position));
            }
            Statement::WhileLoop { condition, body, position } => {
                if literal_bool(&condition) != Some(false) {
                    result.push(Statement::WhileLoop { condition, body, position });
                }
            }
            other => result.push(other),
        }
    }
    *statements = result;
}

fn resolve_if(
    condition: Expression,
    then_block: Vec<Statement>,
    elif_blocks: Vec<(Expression, Vec<Statement>)>,
    else_block: Option<Vec<Statement>>,
    position: crate::ast::Position,
) -> Vec<Statement> {
    match literal_bool(&condition) {
        Some(true) => then_block,
        Some(false) => {
            let mut index = 0;
            while index < elif_blocks.len() {
                match literal_bool(&elif_blocks[index].0) {
                    Some(true) => return elif_blocks[index].1.clone(),
                    Some(false) => index += 1,
                    None => {
                        let remaining = elif_blocks[index..].to_vec();
                        let (first_cond, first_body) = remaining[0].clone();
                        return vec![Statement::IfStatement {
                            condition: first_cond,
                            then_block: first_body,
                            elif_blocks: remaining[1..].to_vec(),
                            else_block,
                            position,
                        }];
                    }
                }
            }
            else_block.unwrap_or_default()
        }
        None => vec![Statement::IfStatement { condition, then_block, elif_blocks, else_block, position }],
    }
}
