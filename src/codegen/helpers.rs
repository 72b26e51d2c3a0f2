//! Runtime helper-usage analysis and the helper shell-function bodies
//! themselves (spec §4.6, "Helper-usage analysis" / "Runtime helpers").
use crate::ast::{CommandKind, Expression, Program, Statement};

/// Which runtime helpers the program actually needs. Set by a read-only
/// walk before emission so the prologue only carries what's used.
#[derive(Debug, Default, Clone, Copy)]
pub struct HelperUsage {
    pub field_get: bool,
    pub field_set: bool,
    pub method_dispatch: bool,
    pub build_cmd: bool,
    pub pipe_cmd: bool,
    pub exec: bool,
    pub spawn: bool,
    pub async_exec: bool,
    pub async_spawn: bool,
    pub await_process: bool,
    pub throw: bool,
    pub panic: bool,
    pub map: bool,
    pub index: bool,
}

pub fn analyze(program: &Program) -> HelperUsage {
    let mut usage = HelperUsage::default();
    for statement in &program.statements {
        scan_statement(statement, &mut usage);
    }
    usage
}

fn scan_statement(statement: &Statement, usage: &mut HelperUsage) {
    match statement {
        Statement::VariableDeclaration { value, .. } => scan_expr(value, usage),
        Statement::TupleVariableDeclaration { value, .. } => scan_expr(value, usage),
        Statement::Assignment { target, value, .. } => {
            scan_assignment_target(target, usage);
            scan_expr(value, usage);
        }
        Statement::FunctionDeclaration { body, .. } => scan_block(body, usage),
        Statement::StructDeclaration(_) | Statement::EnumDeclaration(_) | Statement::ImportStatement(_) => {}
        Statement::ImplBlock(block) => {
            for method in &block.methods {
                scan_block(&method.body, usage);
            }
        }
        Statement::IfStatement { condition, then_block, elif_blocks, else_block, .. } => {
            scan_expr(condition, usage);
            scan_block(then_block, usage);
            for (elif_condition, elif_body) in elif_blocks {
                scan_expr(elif_condition, usage);
                scan_block(elif_body, usage);
            }
            if let Some(body) = else_block {
                scan_block(body, usage);
            }
        }
        Statement::ForLoop { iterable, body, .. } => {
            scan_expr(iterable, usage);
            scan_block(body, usage);
        }
        Statement::WhileLoop { condition, body, .. } => {
            scan_expr(condition, usage);
            scan_block(body, usage);
        }
        Statement::TryStatement { try_block, catch_block, .. } => {
            scan_block(try_block, usage);
            scan_block(catch_block, usage);
        }
        Statement::ThrowStatement { value, .. } => {
            usage.throw = true;
            scan_expr(value, usage);
        }
        Statement::ReturnStatement { value: Some(value), .. } => scan_expr(value, usage),
        Statement::ReturnStatement { value: None, .. } => {}
        Statement::BreakStatement { .. } | Statement::ContinueStatement { .. } | Statement::ShStatement { .. } => {}
        Statement::ExpressionStatement { expression, .. } => scan_expr(expression, usage),
    }
}

fn scan_block(body: &[Statement], usage: &mut HelperUsage) {
    for statement in body {
        scan_statement(statement, usage);
    }
}

fn scan_assignment_target(target: &Expression, usage: &mut HelperUsage) {
    match target {
        Expression::MemberAccess { object, .. } => {
            if !is_flat_base(object) {
                usage.field_set = true;
            }
            scan_expr(object, usage);
        }
        Expression::IndexAccess { object, index, .. } => {
            usage.index = true;
            scan_expr(object, usage);
            scan_expr(index, usage);
        }
        _ => {}
    }
}

/// A member-access chain is "flat" (resolvable to a single shell variable
/// name at emission time) when it bottoms out in a bare identifier or
/// `self`; anything else (a call result, an index, ...) is an opaque
/// handle that needs the runtime field helpers.
pub(super) fn is_flat_base(expr: &Expression) -> bool {
    match expr {
        Expression::Identifier { .. } | Expression::SelfExpr { .. } => true,
        Expression::MemberAccess { object, .. } => is_flat_base(object),
        _ => false,
    }
}

fn scan_expr(expr: &Expression, usage: &mut HelperUsage) {
    match expr {
        Expression::Binary { left, right, .. } | Expression::NullCoalesce { left, right, .. } => {
            scan_expr(left, usage);
            scan_expr(right, usage);
        }
        Expression::Unary { operand, .. } => scan_expr(operand, usage),
        Expression::Cast { value, .. } => scan_expr(value, usage),
        Expression::FunctionCall { callee, args, .. } => {
            if callee == "panic" {
                usage.panic = true;
            }
            for arg in args {
                scan_expr(arg, usage);
            }
        }
        Expression::MethodCall { object, args, is_static_dispatch, .. } => {
            if !is_static_dispatch {
                usage.method_dispatch = true;
            }
            scan_expr(object, usage);
            for arg in args {
                scan_expr(arg, usage);
            }
        }
        Expression::MemberAccess { object, .. } | Expression::SafeNavigation { object, .. } => {
            if !is_flat_base(object) {
                usage.field_get = true;
            }
            scan_expr(object, usage);
        }
        Expression::IndexAccess { object, index, .. } => {
            usage.index = true;
            scan_expr(object, usage);
            scan_expr(index, usage);
        }
        Expression::ArrayLiteral { elements, .. } | Expression::TupleExpression { elements, .. } => {
            for element in elements {
                scan_expr(element, usage);
            }
        }
        Expression::MapLiteral { entries, .. } => {
            usage.map = true;
            for entry in entries {
                scan_expr(&entry.key, usage);
                scan_expr(&entry.value, usage);
            }
        }
        Expression::StructLiteral { fields, .. } => {
            for field in fields {
                scan_expr(&field.value, usage);
            }
        }
        Expression::Range { start, end, .. } => {
            scan_expr(start, usage);
            scan_expr(end, usage);
        }
        Expression::Pipe { left, right, .. } => {
            usage.pipe_cmd = true;
            scan_expr(left, usage);
            scan_expr(right, usage);
        }
        Expression::Command { kind, is_async, args, .. } => {
            if matches!(kind, CommandKind::Cmd) && args.len() > 1 {
                usage.build_cmd = true;
            }
            match (kind, is_async) {
                (CommandKind::Exec, false) => usage.exec = true,
                (CommandKind::Spawn, false) => usage.spawn = true,
                (CommandKind::Exec, true) => usage.async_exec = true,
                (CommandKind::Spawn, true) => usage.async_spawn = true,
                _ => {}
            }
            for arg in args {
                scan_expr(arg, usage);
            }
        }
        Expression::Await { value, .. } => {
            usage.await_process = true;
            scan_expr(value, usage);
        }
        _ => {}
    }
}

/// Shell text for each helper, keyed by the `HelperUsage` flag that gates it.
/// Emitted verbatim into the script prologue when flagged.
pub fn helper_bodies(usage: &HelperUsage) -> Vec<&'static str> {
    let mut bodies = Vec::new();
    if usage.field_get || usage.method_dispatch {
        bodies.push(BRASH_GET_FIELD);
    }
    if usage.field_set {
        bodies.push(BRASH_SET_FIELD);
    }
    if usage.method_dispatch {
        bodies.push(BRASH_CALL_METHOD);
    }
    if usage.build_cmd {
        bodies.push(BRASH_BUILD_CMD);
    }
    if usage.pipe_cmd {
        bodies.push(BRASH_PIPE_CMD);
    }
    if usage.exec {
        bodies.push(BRASH_EXEC_CMD);
    }
    if usage.spawn {
        bodies.push(BRASH_SPAWN_CMD);
    }
    if usage.async_exec {
        bodies.push(BRASH_ASYNC_EXEC_CMD);
    }
    if usage.async_spawn {
        bodies.push(BRASH_ASYNC_SPAWN_CMD);
    }
    if usage.await_process {
        bodies.push(BRASH_AWAIT);
    }
    if usage.throw {
        bodies.push(BRASH_THROW);
    }
    if usage.panic {
        bodies.push(BRASH_PANIC);
    }
    if usage.map {
        bodies.push(BRASH_MAP);
    }
    if usage.index {
        bodies.push(BRASH_INDEX);
    }
    bodies
}

const BRASH_GET_FIELD: &str = r#"brash_get_field() {
    local __h="$1" __f="$2"
    eval "printf '%s' \"\${${__h}_${__f}}\""
}"#;

const BRASH_SET_FIELD: &str = r#"brash_set_field() {
    local __h="$1" __f="$2" __v="$3"
    printf -v "${__h}_${__f}" '%s' "${__v}"
}"#;

const BRASH_CALL_METHOD: &str = r#"brash_call_method() {
    local __h="$1" __m="$2"
    shift 2
    local __t
    eval "__t=\"\${${__h}__type}\""
    "${__t}__${__m}" "${__h}" "$@"
}"#;

const BRASH_BUILD_CMD: &str = r#"brash_build_cmd() {
    local __out=""
    for __a in "$@"; do
        __out="${__out}$(printf '%q ' "${__a}")"
    done
    printf '%s' "${__out% }"
}"#;

const BRASH_PIPE_CMD: &str = r#"brash_pipe_cmd() {
    eval "$1 | $2"
}"#;

const BRASH_EXEC_CMD: &str = r#"brash_exec_cmd() {
    eval "$1"
}"#;

const BRASH_SPAWN_CMD: &str = r#"brash_spawn_cmd() {
    eval "$1" &
    wait "$!"
}"#;

const BRASH_ASYNC_EXEC_CMD: &str = r#"brash_async_exec_cmd() {
    local __out __err __status
    __out="$(mktemp)"; __err="$(mktemp)"; __status="$(mktemp)"
    ( eval "$1" >"${__out}" 2>"${__err}"; echo "$?" >"${__status}" ) &
    printf '%s:%s:%s:%s' "$!" "${__out}" "${__err}" "${__status}"
}"#;

const BRASH_ASYNC_SPAWN_CMD: &str = r#"brash_async_spawn_cmd() {
    local __out __err __status
    __out="$(mktemp)"; __err="$(mktemp)"; __status="$(mktemp)"
    ( eval "$1" >"${__out}" 2>"${__err}" &
      wait "$!"; echo "$?" >"${__status}" ) &
    printf '%s:%s:%s:%s' "$!" "${__out}" "${__err}" "${__status}"
}"#;

const BRASH_AWAIT: &str = r#"brash_await() {
    IFS=':' read -r __pid __out __err __status <<<"$1"
    while kill -0 "${__pid}" 2>/dev/null; do
        sleep 0.02
    done
    cat "${__out}"
    cat "${__err}" >&2
    cat "${__status}" 2>/dev/null || echo 0
}"#;

const BRASH_THROW: &str = r#"brash_throw() {
    printf '%s\n' "$1" >&2
    return 1
}"#;

const BRASH_PANIC: &str = r#"brash_panic() {
    printf '%s\n' "$1" >&2
    exit 1
}"#;

const BRASH_MAP: &str = r#"brash_map_literal() {
    local __f
    __f="$(mktemp)"
    while [ "$#" -gt 0 ]; do
        printf '%s\t%s\n' "$1" "$2" >>"${__f}"
        shift 2
    done
    printf '%s' "${__f}"
}

brash_map_get() {
    awk -F'\t' -v k="$2" '$1==k { print $2; found=1 } END { if (!found) exit 1 }' "$1"
}

brash_map_set() {
    local __f="$1" __k="$2" __v="$3" __tmp
    __tmp="$(mktemp)"
    awk -F'\t' -v k="${__k}" '$1!=k' "${__f}" > "${__tmp}"
    printf '%s\t%s\n' "${__k}" "${__v}" >> "${__tmp}"
    mv "${__tmp}" "${__f}"
}"#;

const BRASH_INDEX: &str = r#"brash_index_get() {
    local -n __arr="$1"
    printf '%s' "${__arr[$2]}"
}

brash_index_set() {
    local -n __arr="$1"
    __arr[$2]="$3"
}"#;
