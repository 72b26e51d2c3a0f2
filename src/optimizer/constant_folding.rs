//! Bottom-up constant folding over already-simplified expression trees
//! (spec §4.5, "Constant folding").
use crate::ast::{BinaryOp, Expression, PrimitiveKind, Type, UnaryOp};
use crate::ast::Position;

pub(super) fn fold_expr(expr: &mut Expression) {
    let folded = match expr {
        Expression::Unary { op, operand, position } => fold_unary(*op, operand, *position),
        Expression::Binary { op, left, right, position } => fold_binary(*op, left, right, *position),
        Expression::Cast { value, target_type, position } => fold_cast(value, target_type, *position),
        Expression::NullCoalesce { left, right, .. } => fold_coalesce(left, right),
        _ => None,
    };
    if let Some(new_expr) = folded {
        *expr = new_expr;
    }
}

fn fold_unary(op: UnaryOp, operand: &Expression, position: Position) -> Option<Expression> {
    match (op, operand) {
        (UnaryOp::Neg, Expression::IntLiteral { value, .. }) => Some(Expression::IntLiteral { value: -value, position }),
        (UnaryOp::Neg, Expression::FloatLiteral { value, .. }) => {
            Some(Expression::FloatLiteral { value: -value, position })
        }
        (UnaryOp::Not, Expression::BoolLiteral { value, .. }) => Some(Expression::BoolLiteral { value: !value, position }),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, left: &Expression, right: &Expression, position: Position) -> Option<Expression> {
    use Expression::*;
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => match (left, right) {
            (IntLiteral { value: a, .. }, IntLiteral { value: b, .. }) => {
                apply_int_op(op, *a, *b).map(|value| IntLiteral { value, position })
            }
            (FloatLiteral { value: a, .. }, FloatLiteral { value: b, .. }) => {
                apply_float_op(op, *a, *b).map(|value| FloatLiteral { value, position })
            }
            (IntLiteral { value: a, .. }, FloatLiteral { value: b, .. }) => {
                apply_float_op(op, *a as f64, *b).map(|value| FloatLiteral { value, position })
            }
            (FloatLiteral { value: a, .. }, IntLiteral { value: b, .. }) => {
                apply_float_op(op, *a, *b as f64).map(|value| FloatLiteral { value, position })
            }
            _ if op == BinaryOp::Add => fold_concat(left, right, position),
            _ => None,
        },
        BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Lte | BinaryOp::Gte => {
            fold_compare(op, left, right, position)
        }
        BinaryOp::And | BinaryOp::Or => match (left, right) {
            (BoolLiteral { value: a, .. }, BoolLiteral { value: b, .. }) => Some(BoolLiteral {
                value: if op == BinaryOp::And { *a && *b } else { *a || *b },
                position,
            }),
            _ => None,
        },
    }
}

fn apply_int_op(op: BinaryOp, a: i64, b: i64) -> Option<i64> {
    match op {
        BinaryOp::Add => Some(a.wrapping_add(b)),
        BinaryOp::Sub => Some(a.wrapping_sub(b)),
        BinaryOp::Mul => Some(a.wrapping_mul(b)),
        BinaryOp::Div if b != 0 => Some(a / b),
        BinaryOp::Mod if b != 0 => Some(a % b),
        _ => None,
    }
}

fn apply_float_op(op: BinaryOp, a: f64, b: f64) -> Option<f64> {
    match op {
        BinaryOp::Add => Some(a + b),
        BinaryOp::Sub => Some(a - b),
        BinaryOp::Mul => Some(a * b),
        BinaryOp::Div if b != 0.0 => Some(a / b),
        BinaryOp::Mod if b != 0.0 => Some(a % b),
        _ => None,
    }
}

fn literal_to_string(expr: &Expression) -> Option<String> {
    match expr {
        Expression::StringLiteral { value, .. } => Some(value.clone()),
        Expression::CharLiteral { value, .. } => Some(value.to_string()),
        Expression::IntLiteral { value, .. } => Some(value.to_string()),
        Expression::FloatLiteral { value, .. } => Some(value.to_string()),
        Expression::BoolLiteral { value, .. } => Some(if *value { "true" } else { "false" }.to_string()),
        _ => None,
    }
}

fn fold_concat(left: &Expression, right: &Expression, position: Position) -> Option<Expression> {
    let is_text = |e: &Expression| matches!(e, Expression::StringLiteral { .. } | Expression::CharLiteral { .. });
    if !is_text(left) && !is_text(right) {
        return None;
    }
    let a = literal_to_string(left)?;
    let b = literal_to_string(right)?;
    Some(Expression::StringLiteral { value: a + &b, is_interpolated: false, is_multiline: false, position })
}

fn literal_ordering(left: &Expression, right: &Expression) -> Option<std::cmp::Ordering> {
    use Expression::*;
    match (left, right) {
        (IntLiteral { value: a, .. }, IntLiteral { value: b, .. }) => a.partial_cmp(b),
        (FloatLiteral { value: a, .. }, FloatLiteral { value: b, .. }) => a.partial_cmp(b),
        (IntLiteral { value: a, .. }, FloatLiteral { value: b, .. }) => (*a as f64).partial_cmp(b),
        (FloatLiteral { value: a, .. }, IntLiteral { value: b, .. }) => a.partial_cmp(&(*b as f64)),
        (StringLiteral { value: a, .. }, StringLiteral { value: b, .. }) => a.partial_cmp(b),
        (CharLiteral { value: a, .. }, CharLiteral { value: b, .. }) => a.partial_cmp(b),
        (BoolLiteral { value: a, .. }, BoolLiteral { value: b, .. }) => a.partial_cmp(b),
        _ => None,
    }
}

fn fold_compare(op: BinaryOp, left: &Expression, right: &Expression, position: Position) -> Option<Expression> {
    let ordering = literal_ordering(left, right)?;
    let value = match op {
        BinaryOp::Eq => ordering == std::cmp::Ordering::Equal,
        BinaryOp::Neq => ordering != std::cmp::Ordering::Equal,
        BinaryOp::Lt => ordering == std::cmp::Ordering::Less,
        BinaryOp::Gt => ordering == std::cmp::Ordering::Greater,
        BinaryOp::Lte => ordering != std::cmp::Ordering::Greater,
        BinaryOp::Gte => ordering != std::cmp::Ordering::Less,
        _ => return None,
    };
    Some(Expression::BoolLiteral { value, position })
}

fn fold_cast(value: &Expression, target_type: &Type, position: Position) -> Option<Expression> {
    use Expression::*;
    match (value, target_type) {
        (_, Type::Primitive(PrimitiveKind::String)) => literal_to_string(value)
            .map(|value| StringLiteral { value, is_interpolated: false, is_multiline: false, position }),
        (IntLiteral { value, .. }, Type::Primitive(PrimitiveKind::Float)) => {
            Some(FloatLiteral { value: *value as f64, position })
        }
        (FloatLiteral { value, .. }, Type::Primitive(PrimitiveKind::Int)) => {
            Some(IntLiteral { value: *value as i64, position })
        }
        (IntLiteral { value, .. }, Type::Primitive(PrimitiveKind::Bool)) => {
            Some(BoolLiteral { value: *value != 0, position })
        }
        (BoolLiteral { value, .. }, Type::Primitive(PrimitiveKind::Int)) => {
            Some(IntLiteral { value: if *value { 1 } else { 0 }, position })
        }
        _ => None,
    }
}

fn fold_coalesce(left: &Expression, right: &Expression) -> Option<Expression> {
    match left {
        Expression::NullLiteral { .. } => Some(right.clone()),
        _ if left.is_literal() => Some(left.clone()),
        _ => None,
    }
}
