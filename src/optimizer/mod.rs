//! AST optimizer (spec §4.5): constant propagation, constant folding,
//! control-flow simplification, and dead-local elimination, each
//! independently toggleable and run to a fixed point per block.
mod constant_folding;
mod control_flow;
mod dead_code;

use std::collections::HashMap;

use crate::ast::{Expression, Program, Statement};

/// Toggles for each optimization pass. All default to enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstOptimizationOptions {
    pub enabled: bool,
    pub constant_propagation: bool,
    pub constant_folding: bool,
    pub control_flow_simplification: bool,
    pub dead_local_elimination: bool,
}

impl Default for AstOptimizationOptions {
    fn default() -> Self {
        AstOptimizationOptions {
            enabled: true,
            constant_propagation: true,
            constant_folding: true,
            control_flow_simplification: true,
            dead_local_elimination: true,
        }
    }
}

type ConstEnv = HashMap<String, Expression>;

/// Runs the optimizer over a whole program in place.
pub fn optimize(program: &mut Program, options: &AstOptimizationOptions) {
    if !options.enabled {
        return;
    }
    let mut env = ConstEnv::new();
    optimize_block(&mut program.statements, &mut env, options);
}

fn optimize_block(statements: &mut Vec<Statement>, env: &mut ConstEnv, options: &AstOptimizationOptions) {
    for statement in statements.iter_mut() {
        optimize_statement(statement, env, options);
    }
    if options.control_flow_simplification {
        control_flow::simplify_block(statements);
    }
    if options.dead_local_elimination {
        dead_code::eliminate_block(statements);
    }
}

/// Runs a nested block (if/while/for/try body, function/method body) with
/// its own scoped view of `env`. Per spec, writes inside the block never
/// escape: the parent's constant-propagation state is cleared once the
/// construct is done, rather than tracking precisely which names the body
/// touched.
fn optimize_nested(body: &mut Vec<Statement>, env: &mut ConstEnv, options: &AstOptimizationOptions) {
    let mut inner = env.clone();
    optimize_block(body, &mut inner, options);
}

fn optimize_statement(statement: &mut Statement, env: &mut ConstEnv, options: &AstOptimizationOptions) {
    match statement {
        Statement::VariableDeclaration { kind, name, value, .. } => {
            simplify_expr(value, env, options);
            if options.constant_propagation {
                if matches!(kind, crate::ast::DeclarationKind::Mut) {
                    env.remove(name);
                } else if value.is_literal() {
                    env.insert(name.clone(), value.clone());
                } else {
                    env.remove(name);
                }
            }
        }
        Statement::TupleVariableDeclaration { elements, value, .. } => {
            simplify_expr(value, env, options);
            if options.constant_propagation {
                for element in elements {
                    env.remove(&element.name);
                }
            }
        }
        Statement::Assignment { target, value, .. } => {
            simplify_expr(value, env, options);
            simplify_expr(target, env, options);
            if options.constant_propagation {
                if let Expression::Identifier { name, .. } = target {
                    env.remove(name);
                }
            }
        }
        Statement::FunctionDeclaration { body, .. } => {
            let mut fresh = ConstEnv::new();
            optimize_block(body, &mut fresh, options);
        }
        Statement::StructDeclaration(_) | Statement::EnumDeclaration(_) | Statement::ImportStatement(_) => {}
        Statement::ImplBlock(block) => {
            for method in &mut block.methods {
                let mut fresh = ConstEnv::new();
                optimize_block(&mut method.body, &mut fresh, options);
            }
        }
        Statement::IfStatement { condition, then_block, elif_blocks, else_block, .. } => {
            simplify_expr(condition, env, options);
            optimize_nested(then_block, env, options);
            for (elif_condition, elif_body) in elif_blocks.iter_mut() {
                simplify_expr(elif_condition, env, options);
                optimize_nested(elif_body, env, options);
            }
            if let Some(body) = else_block {
                optimize_nested(body, env, options);
            }
            if options.constant_propagation {
                env.clear();
            }
        }
        Statement::ForLoop { iterable, body, .. } => {
            simplify_expr(iterable, env, options);
            optimize_nested(body, env, options);
            if options.constant_propagation {
                env.clear();
            }
        }
        Statement::WhileLoop { condition, body, .. } => {
            simplify_expr(condition, env, options);
            optimize_nested(body, env, options);
            if options.constant_propagation {
                env.clear();
            }
        }
        Statement::TryStatement { try_block, catch_block, .. } => {
            optimize_nested(try_block, env, options);
            optimize_nested(catch_block, env, options);
            if options.constant_propagation {
                env.clear();
            }
        }
        Statement::ThrowStatement { value, .. } => simplify_expr(value, env, options),
        Statement::ReturnStatement { value: Some(value), .. } => simplify_expr(value, env, options),
        Statement::ReturnStatement { value: None, .. } => {}
        Statement::BreakStatement { .. } | Statement::ContinueStatement { .. } | Statement::ShStatement { .. } => {}
        Statement::ExpressionStatement { expression, .. } => simplify_expr(expression, env, options),
    }
}

/// Recurses into an expression's children, substitutes known-constant
/// identifiers, then folds the (now possibly-literal) node itself.
fn simplify_expr(expr: &mut Expression, env: &ConstEnv, options: &AstOptimizationOptions) {
    if options.constant_propagation {
        if let Expression::Identifier { name, .. } = expr {
            if let Some(literal) = env.get(name) {
                *expr = literal.clone();
                return;
            }
        }
    }
    match expr {
        Expression::Binary { left, right, .. } | Expression::Pipe { left, right, .. } | Expression::NullCoalesce { left, right, .. } => {
            simplify_expr(left, env, options);
            simplify_expr(right, env, options);
        }
        Expression::Unary { operand, .. } => simplify_expr(operand, env, options),
        Expression::Cast { value, .. } => simplify_expr(value, env, options),
        Expression::FunctionCall { args, .. } => {
            for arg in args {
                simplify_expr(arg, env, options);
            }
        }
        Expression::MethodCall { object, args, .. } => {
            simplify_expr(object, env, options);
            for arg in args {
                simplify_expr(arg, env, options);
            }
        }
        Expression::MemberAccess { object, .. } | Expression::SafeNavigation { object, .. } => {
            simplify_expr(object, env, options);
        }
        Expression::IndexAccess { object, index, .. } => {
            simplify_expr(object, env, options);
            simplify_expr(index, env, options);
        }
        Expression::ArrayLiteral { elements, .. } | Expression::TupleExpression { elements, .. } => {
            for element in elements {
                simplify_expr(element, env, options);
            }
        }
        Expression::MapLiteral { entries, .. } => {
            for entry in entries {
                simplify_expr(&mut entry.key, env, options);
                simplify_expr(&mut entry.value, env, options);
            }
        }
        Expression::StructLiteral { fields, .. } => {
            for field in fields {
                simplify_expr(&mut field.value, env, options);
            }
        }
        Expression::Range { start, end, .. } => {
            simplify_expr(start, env, options);
            simplify_expr(end, env, options);
        }
        Expression::Command { args, .. } => {
            for arg in args {
                simplify_expr(arg, env, options);
            }
        }
        Expression::Await { value, .. } => simplify_expr(value, env, options),
        _ => {}
    }
    if options.constant_folding {
        constant_folding::fold_expr(expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeclarationKind, Position};

    fn pos() -> Position {
        (1, 1)
    }

    #[test]
    fn folds_arithmetic() {
        let mut expr = Expression::Binary {
            op: crate::ast::BinaryOp::Add,
            left: Box::new(Expression::IntLiteral { value: 2, position: pos() }),
            right: Box::new(Expression::IntLiteral { value: 3, position: pos() }),
            position: pos(),
        };
        let options = AstOptimizationOptions::default();
        let env = ConstEnv::new();
        simplify_expr(&mut expr, &env, &options);
        assert_eq!(expr, Expression::IntLiteral { value: 5, position: pos() });
    }

    #[test]
    fn propagates_constants_into_uses() {
        let mut statements = vec![
            Statement::VariableDeclaration {
                kind: DeclarationKind::Let,
                name: "x".into(),
                type_annotation: None,
                value: Expression::IntLiteral { value: 7, position: pos() },
                is_public: false,
                position: pos(),
            },
            Statement::ExpressionStatement {
                expression: Expression::Identifier { name: "x".into(), position: pos() },
                position: pos(),
            },
        ];
        let mut env = ConstEnv::new();
        let options = AstOptimizationOptions::default();
        optimize_block(&mut statements, &mut env, &options);
        // The expression-statement wrapping a now-pure literal is dead and elided.
        assert!(statements.iter().all(|s| !matches!(s, Statement::ExpressionStatement { .. })));
    }

    #[test]
    fn drops_while_false() {
        let mut statements = vec![Statement::WhileLoop {
            condition: Expression::BoolLiteral { value: false, position: pos() },
            body: vec![],
            position: pos(),
        }];
        let mut env = ConstEnv::new();
        let options = AstOptimizationOptions::default();
        optimize_block(&mut statements, &mut env, &options);
        assert!(statements.is_empty());
    }
}
