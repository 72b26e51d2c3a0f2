//! Expression lowering (spec §4.6, "Expression lowering").
use crate::ast::{BinaryOp, CommandKind, Expression, UnaryOp};

use super::helpers::is_flat_base;
use super::Generator;

fn escape_double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Flattens a statically-resolvable member-access chain (`a.b.c`) to the
/// `a_b_c` shell variable name it was bound under.
pub(super) fn flat_path(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier { name, .. } => Some(name.clone()),
        Expression::SelfExpr { .. } => Some("__self".to_string()),
        Expression::MemberAccess { object, member, .. } => {
            flat_path(object).map(|base| format!("{base}_{member}"))
        }
        _ => None,
    }
}

fn comparison_symbol(op: BinaryOp) -> Option<&'static str> {
    match op {
        BinaryOp::Eq => Some("=="),
        BinaryOp::Neq => Some("!="),
        BinaryOp::Lt => Some("<"),
        BinaryOp::Gt => Some(">"),
        BinaryOp::Lte => Some("<="),
        BinaryOp::Gte => Some(">="),
        _ => None,
    }
}

/// Bare arithmetic text suitable inside a `$(( ))`/`(( ))` context: no
/// surrounding substitution syntax of its own.
pub(super) fn lower_arith(expr: &Expression, gen: &mut Generator) -> String {
    match expr {
        Expression::IntLiteral { value, .. } => value.to_string(),
        Expression::FloatLiteral { value, .. } => value.to_string(),
        Expression::Identifier { name, .. } => format!("${{{name}}}"),
        Expression::SelfExpr { .. } => "${__self}".to_string(),
        Expression::Unary { op: UnaryOp::Neg, operand, .. } => format!("(-{})", lower_arith(operand, gen)),
        Expression::Unary { op: UnaryOp::Not, operand, .. } => format!("(!{})", lower_arith(operand, gen)),
        Expression::Binary { op, left, right, .. } if comparison_symbol(*op).is_some() => {
            format!("({} {} {})", lower_arith(left, gen), comparison_symbol(*op).unwrap(), lower_arith(right, gen))
        }
        Expression::Binary { op: BinaryOp::And, left, right, .. } => {
            format!("({} && {})", lower_arith(left, gen), lower_arith(right, gen))
        }
        Expression::Binary { op: BinaryOp::Or, left, right, .. } => {
            format!("({} || {})", lower_arith(left, gen), lower_arith(right, gen))
        }
        Expression::Binary { op, left, right, .. } => {
            let symbol = match op {
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "/",
                BinaryOp::Mod => "%",
                _ => unreachable!("non-arithmetic op handled above"),
            };
            format!("({} {} {})", lower_arith(left, gen), symbol, lower_arith(right, gen))
        }
        _ => format!("$({})", lower_value(expr, gen)),
    }
}

/// Condition text for `if`/`elif`/`while`: a direct comparison when the
/// expression is itself one, else an integer-truthiness test.
pub(super) fn lower_condition(expr: &Expression, gen: &mut Generator) -> String {
    if let Expression::Binary { op, left, right, .. } = expr {
        if let Some(symbol) = comparison_symbol(*op) {
            return format!("(( {} {} {} ))", lower_arith(left, gen), symbol, lower_arith(right, gen));
        }
    }
    format!("[ {} -ne 0 ]", lower_value(expr, gen))
}

/// General value lowering: the shell text that, substituted on an
/// assignment RHS, yields this expression's value.
pub(super) fn lower_value(expr: &Expression, gen: &mut Generator) -> String {
    match expr {
        Expression::IntLiteral { value, .. } => value.to_string(),
        Expression::FloatLiteral { value, .. } => value.to_string(),
        Expression::BoolLiteral { value, .. } => if *value { "1" } else { "0" }.to_string(),
        Expression::CharLiteral { value, .. } => format!("\"{}\"", escape_double_quoted(&value.to_string())),
        Expression::NullLiteral { .. } => String::new(),
        Expression::StringLiteral { value, .. } => format!("\"{}\"", escape_double_quoted(value)),
        Expression::Identifier { name, .. } => format!("\"${{{name}}}\""),
        Expression::SelfExpr { .. } => "\"${__self}\"".to_string(),
        Expression::Unary { op: UnaryOp::Not, operand, .. } => {
            format!("$(if {}; then echo 0; else echo 1; fi)", lower_condition(operand, gen))
        }
        Expression::Unary { op: UnaryOp::Neg, operand, .. } => format!("$(( -{} ))", lower_arith(operand, gen)),
        Expression::Binary { op, .. } if comparison_symbol(*op).is_some() => {
            format!("$(if {}; then echo 1; else echo 0; fi)", lower_condition(expr, gen))
        }
        Expression::Binary { op: BinaryOp::Add, left, right, .. }
            if is_textual(left) || is_textual(right) =>
        {
            format!("$(printf '%s%s' {} {})", lower_value(left, gen), lower_value(right, gen))
        }
        Expression::Binary { op: BinaryOp::And, left, right, .. } => {
            format!("$(if {} && {}; then echo 1; else echo 0; fi)", lower_condition(left, gen), lower_condition(right, gen))
        }
        Expression::Binary { op: BinaryOp::Or, left, right, .. } => {
            format!("$(if {} || {}; then echo 1; else echo 0; fi)", lower_condition(left, gen), lower_condition(right, gen))
        }
        Expression::Binary { .. } => format!("$(( {} ))", lower_arith(expr, gen)),
        Expression::Cast { value, .. } => lower_value(value, gen),
        Expression::FunctionCall { callee, args, .. } if callee == "print" => format!("$({})", lower_print(args, gen)),
        Expression::FunctionCall { callee, args, .. } if callee == "bash" => format!("$({})", lower_bash(args, gen)),
        Expression::FunctionCall { callee, args, .. } if callee == "panic" => format!("$({})", lower_panic(args, gen)),
        Expression::FunctionCall { callee, args, .. } => {
            let rendered: Vec<String> = args.iter().map(|arg| lower_value(arg, gen)).collect();
            format!("$({} {})", callee, rendered.join(" "))
        }
        Expression::MethodCall { object, name, args, is_static_dispatch, static_type_name, .. } => {
            let rendered: Vec<String> = args.iter().map(|arg| lower_value(arg, gen)).collect();
            if *is_static_dispatch {
                let type_name = static_type_name.clone().unwrap_or_default();
                format!("$({}__{} {})", type_name, name, rendered.join(" "))
            } else if name == "to_string" {
                lower_value(object, gen)
            } else {
                let receiver = lower_value(object, gen);
                format!("$(brash_call_method {} \"{}\" {})", receiver, name, rendered.join(" "))
            }
        }
        Expression::MemberAccess { object, member, .. } | Expression::SafeNavigation { object, member, .. } => {
            if let Some(path) = flat_path(object) {
                format!("\"${{{path}_{member}}}\"", path = path, member = member)
            } else {
                let receiver = lower_value(object, gen);
                format!("$(brash_get_field {} \"{}\")", receiver, member)
            }
        }
        Expression::IndexAccess { object, index, .. } => {
            let base = flat_path(object).unwrap_or_else(|| lower_value(object, gen));
            format!("$(brash_index_get {} {})", base, lower_value(index, gen))
        }
        Expression::ArrayLiteral { elements, .. } => {
            let rendered: Vec<String> = elements.iter().map(|element| lower_value(element, gen)).collect();
            format!("({})", rendered.join(" "))
        }
        Expression::MapLiteral { entries, .. } => {
            let mut parts = Vec::with_capacity(entries.len() * 2);
            for entry in entries {
                parts.push(lower_value(&entry.key, gen));
                parts.push(lower_value(&entry.value, gen));
            }
            format!("$(brash_map_literal {})", parts.join(" "))
        }
        Expression::TupleExpression { elements, .. } => {
            let rendered: Vec<String> = elements.iter().map(|element| lower_value(element, gen)).collect();
            format!("({})", rendered.join(" "))
        }
        Expression::StructLiteral { type_name, .. } => format!("\"{type_name}\""),
        Expression::Pipe { left, right, .. } => lower_pipe(left, right, gen),
        Expression::NullCoalesce { left, right, .. } => {
            let left_text = lower_value(left, gen);
            let right_text = lower_value(right, gen);
            format!("$({{ [ -n {left_text} ] && printf '%s' {left_text}; }} 2>/dev/null || printf '%s' {right_text})")
        }
        Expression::Range { .. } => {
            gen.warn("range-as-value");
            "\"\"".to_string()
        }
        Expression::Command { kind, is_async, args, .. } => lower_command(*kind, *is_async, args, gen),
        Expression::Await { value, .. } => format!("$(brash_await {})", lower_value(value, gen)),
        Expression::EnumLiteral { enum_name, variant, .. } => format!("\"{enum_name}_{variant}\""),
    }
}

fn is_textual(expr: &Expression) -> bool {
    matches!(expr, Expression::StringLiteral { .. } | Expression::CharLiteral { .. })
}

fn lower_print(args: &[Expression], gen: &mut Generator) -> String {
    if args.is_empty() {
        return "printf '\\n'".to_string();
    }
    let rendered: Vec<String> = args.iter().map(|arg| lower_value(arg, gen)).collect();
    format!("echo {}", rendered.join(" "))
}

fn lower_bash(args: &[Expression], gen: &mut Generator) -> String {
    let script = args.first().map(|arg| lower_value(arg, gen)).unwrap_or_else(|| "\"\"".to_string());
    format!("eval {script}")
}

fn lower_panic(args: &[Expression], gen: &mut Generator) -> String {
    let message = args.first().map(|arg| lower_value(arg, gen)).unwrap_or_else(|| "\"\"".to_string());
    format!("brash_panic {message}")
}

/// Bare, uncaptured call/pipe text suitable for statement position: the
/// command runs directly so its stdout reaches the script's own stdout,
/// instead of being captured by `$( )` and then executed as a command word.
pub(super) fn lower_statement_expr(expr: &Expression, gen: &mut Generator) -> String {
    match expr {
        Expression::Command { kind, is_async, args, .. } => lower_command_call(*kind, *is_async, args, gen),
        Expression::FunctionCall { callee, args, .. } if callee == "print" => lower_print(args, gen),
        Expression::FunctionCall { callee, args, .. } if callee == "bash" => lower_bash(args, gen),
        Expression::FunctionCall { callee, args, .. } if callee == "panic" => lower_panic(args, gen),
        Expression::FunctionCall { callee, args, .. } => {
            let rendered: Vec<String> = args.iter().map(|arg| lower_value(arg, gen)).collect();
            format!("{callee} {}", rendered.join(" "))
        }
        Expression::MethodCall { object, name, args, is_static_dispatch, static_type_name, .. } => {
            let rendered: Vec<String> = args.iter().map(|arg| lower_value(arg, gen)).collect();
            if *is_static_dispatch {
                let type_name = static_type_name.clone().unwrap_or_default();
                format!("{type_name}__{name} {}", rendered.join(" "))
            } else if name == "to_string" {
                format!(": {}", lower_value(object, gen))
            } else {
                let receiver = lower_value(object, gen);
                format!("brash_call_method {receiver} \"{name}\" {}", rendered.join(" "))
            }
        }
        Expression::Pipe { left, right, .. } => lower_pipe_call(left, right, gen),
        Expression::Await { value, .. } => format!("brash_await {} >/dev/null", lower_value(value, gen)),
        _ => format!(": {}", lower_value(expr, gen)),
    }
}

fn lower_pipe_call(left: &Expression, right: &Expression, gen: &mut Generator) -> String {
    if matches!(left, Expression::Command { .. }) && matches!(right, Expression::Command { .. }) {
        return format!("brash_pipe_cmd {} {}", lower_value(left, gen), lower_value(right, gen));
    }
    // Value pipe: the right-hand call receives `left` as its implicit first argument.
    match right {
        Expression::FunctionCall { callee, args, .. } => {
            let mut rendered = vec![lower_value(left, gen)];
            rendered.extend(args.iter().map(|arg| lower_value(arg, gen)));
            format!("{callee} {}", rendered.join(" "))
        }
        Expression::MethodCall { object, name, args, is_static_dispatch, static_type_name, .. } => {
            let piped = lower_value(left, gen);
            let mut rendered = vec![piped];
            rendered.extend(args.iter().map(|arg| lower_value(arg, gen)));
            if *is_static_dispatch {
                let type_name = static_type_name.clone().unwrap_or_default();
                format!("{type_name}__{name} {}", rendered.join(" "))
            } else {
                let receiver = lower_value(object, gen);
                format!("brash_call_method {receiver} \"{name}\" {}", rendered.join(" "))
            }
        }
        _ => {
            gen.warn("non-call-pipe-target");
            ": \"\"".to_string()
        }
    }
}

fn lower_pipe(left: &Expression, right: &Expression, gen: &mut Generator) -> String {
    format!("$({})", lower_pipe_call(left, right, gen))
}

/// A single shell word holding the command line: either the lone argument's
/// own (already-quoted) value, or the `%q`-quoted result of `brash_build_cmd`
/// kept as one word so the callee's `$1` receives the whole command line.
fn command_text(args: &[Expression], gen: &mut Generator) -> String {
    if args.len() == 1 {
        lower_value(&args[0], gen)
    } else {
        let rendered: Vec<String> = args.iter().map(|arg| lower_value(arg, gen)).collect();
        format!("\"$(brash_build_cmd {})\"", rendered.join(" "))
    }
}

/// Bare command-dispatch text (no surrounding capture) — see
/// `lower_statement_expr`.
pub(super) fn lower_command_call(kind: CommandKind, is_async: bool, args: &[Expression], gen: &mut Generator) -> String {
    let text = command_text(args, gen);
    match (kind, is_async) {
        (CommandKind::Cmd, _) => text,
        (CommandKind::Exec, false) => format!("brash_exec_cmd {text}"),
        (CommandKind::Spawn, false) => format!("brash_spawn_cmd {text}"),
        (CommandKind::Exec, true) => format!("brash_async_exec_cmd {text}"),
        (CommandKind::Spawn, true) => format!("brash_async_spawn_cmd {text}"),
    }
}

fn lower_command(kind: CommandKind, is_async: bool, args: &[Expression], gen: &mut Generator) -> String {
    match kind {
        CommandKind::Cmd => lower_command_call(kind, is_async, args, gen),
        _ => format!("$({})", lower_command_call(kind, is_async, args, gen)),
    }
}
