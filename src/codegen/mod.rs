//! Shell code generator (spec §4.6): lowers a semantically-valid,
//! optionally-optimized program to a single POSIX shell script.
mod expr;
mod helpers;

use std::collections::BTreeSet;

use crate::ast::{DeclarationKind, Expression, Program, Statement};

use expr::{flat_path, lower_arith, lower_condition, lower_statement_expr, lower_value};
use helpers::{analyze, helper_bodies};

const SHEBANG: &str = "#!/usr/bin/env bash";
const STRICT_MODE: &str = "set -euo pipefail";

/// Accumulates emitted lines and the set of unsupported-construct warnings
/// encountered while lowering. One `Generator` per compilation.
pub struct Generator {
    warnings: BTreeSet<String>,
    has_main: bool,
    main_returns_int: bool,
    in_main: bool,
}

/// The generated script text plus any unsupported-feature warnings
/// (deduplicated by feature name, per spec §4.6).
pub struct GeneratedScript {
    pub script: String,
    pub warnings: Vec<String>,
}

pub fn generate(program: &Program) -> GeneratedScript {
    let usage = analyze(program);
    let mut generator = Generator {
        warnings: BTreeSet::new(),
        has_main: program_has_main(program),
        main_returns_int: main_returns_int(program),
        in_main: false,
    };

    let mut lines = Vec::new();
    lines.push(SHEBANG.to_string());
    lines.push(STRICT_MODE.to_string());
    lines.push(String::new());

    for body in helper_bodies(&usage) {
        lines.push(body.to_string());
        lines.push(String::new());
    }

    for statement in &program.statements {
        generator.lower_statement(statement, 0, &mut lines);
    }

    if generator.has_main {
        lines.push(String::new());
        lines.push("main \"$@\"".to_string());
    }

    GeneratedScript {
        script: lines.join("\n") + "\n",
        warnings: generator.warnings.into_iter().collect(),
    }
}

fn program_has_main(program: &Program) -> bool {
    program
        .statements
        .iter()
        .any(|statement| matches!(statement, Statement::FunctionDeclaration { name, .. } if name == "main"))
}

fn main_returns_int(program: &Program) -> bool {
    program.statements.iter().any(|statement| {
        matches!(
            statement,
            Statement::FunctionDeclaration { name, return_type: Some(t), .. }
                if name == "main" && matches!(t, crate::ast::Type::Primitive(crate::ast::PrimitiveKind::Int))
        )
    })
}

impl Generator {
    pub(crate) fn warn(&mut self, feature: &str) {
        self.warnings.insert(feature.to_string());
    }

    fn lower_statement(&mut self, statement: &Statement, indent: usize, out: &mut Vec<String>) {
        let pad = "    ".repeat(indent);
        match statement {
            Statement::VariableDeclaration { kind, name, value, .. } => {
                self.lower_variable_decl(*kind, name, value, indent, out);
            }
            Statement::TupleVariableDeclaration { elements, value, .. } => {
                let rendered = lower_value(value, self);
                out.push(format!("{pad}read -r {} <<<{}", elements.iter().map(|e| e.name.clone()).collect::<Vec<_>>().join(" "), rendered));
            }
            Statement::Assignment { target, value, .. } => self.lower_assignment(target, value, indent, out),
            Statement::FunctionDeclaration { name, params, return_type, body, .. } => {
                out.push(format!("{pad}{name}() {{"));
                let was_main = self.in_main;
                self.in_main = name == "main";
                if name == "main" && params.iter().any(|p| p.name == "args") {
                    out.push(format!("{pad}    local -a args=(\"$@\")"));
                } else {
                    for (index, param) in params.iter().enumerate() {
                        out.push(format!("{pad}    local {}=\"${{{}}}\"", param.name, index + 1));
                    }
                }
                let _ = return_type;
                for inner in body {
                    self.lower_statement(inner, indent + 1, out);
                }
                self.in_main = was_main;
                out.push(format!("{pad}}}"));
            }
            Statement::StructDeclaration(_) | Statement::ImportStatement(_) => {}
            Statement::EnumDeclaration(decl) => {
                for variant in &decl.variants {
                    out.push(format!("{pad}readonly {}_{}=\"{}\"", decl.name, variant, variant));
                }
            }
            Statement::ImplBlock(block) => {
                for method in &block.methods {
                    out.push(format!("{pad}{}__{}() {{", block.type_name, method.name));
                    let mut index = 1;
                    if !method.is_static {
                        out.push(format!("{pad}    local __self=\"$1\""));
                        out.push(format!("{pad}    shift"));
                    } else {
                        index = 0;
                    }
                    for param in &method.params {
                        out.push(format!("{pad}    local {}=\"${{{}}}\"", param.name, index + 1));
                        index += 1;
                    }
                    for inner in &method.body {
                        self.lower_statement(inner, indent + 1, out);
                    }
                    out.push(format!("{pad}}}"));
                }
            }
            Statement::IfStatement { condition, then_block, elif_blocks, else_block, .. } => {
                let cond = lower_condition(condition, self);
                out.push(format!("{pad}if {cond}; then"));
                for inner in then_block {
                    self.lower_statement(inner, indent + 1, out);
                }
                for (elif_condition, elif_body) in elif_blocks {
                    let elif_cond = lower_condition(elif_condition, self);
                    out.push(format!("{pad}elif {elif_cond}; then"));
                    for inner in elif_body {
                        self.lower_statement(inner, indent + 1, out);
                    }
                }
                if let Some(body) = else_block {
                    out.push(format!("{pad}else"));
                    for inner in body {
                        self.lower_statement(inner, indent + 1, out);
                    }
                }
                out.push(format!("{pad}fi"));
            }
            Statement::ForLoop { variable, iterable, body, .. } => {
                self.lower_for(variable, iterable, body, indent, out);
            }
            Statement::WhileLoop { condition, body, .. } => {
                let cond = lower_condition(condition, self);
                out.push(format!("{pad}while {cond}; do"));
                for inner in body {
                    self.lower_statement(inner, indent + 1, out);
                }
                out.push(format!("{pad}done"));
            }
            Statement::TryStatement { error_var, try_block, catch_block, .. } => {
                out.push(format!("{pad}__err_file=\"$(mktemp)\""));
                out.push(format!("{pad}if ! {{"));
                for inner in try_block {
                    self.lower_statement(inner, indent + 1, out);
                }
                out.push(format!("{pad}}} 2>\"${{__err_file}}\"; then"));
                out.push(format!("{pad}    local {error_var}"));
                out.push(format!("{pad}    {error_var}=\"$(cat \"${{__err_file}}\")\""));
                for inner in catch_block {
                    self.lower_statement(inner, indent + 1, out);
                }
                out.push(format!("{pad}fi"));
                out.push(format!("{pad}rm -f \"${{__err_file}}\""));
            }
            Statement::ThrowStatement { value, .. } => {
                out.push(format!("{pad}brash_throw {}", lower_value(value, self)));
            }
            Statement::ReturnStatement { value, .. } => self.lower_return(value.as_ref(), indent, out),
            Statement::BreakStatement { .. } => out.push(format!("{pad}break")),
            Statement::ContinueStatement { .. } => out.push(format!("{pad}continue")),
            Statement::ShStatement { script, .. } => {
                for line in script.lines() {
                    out.push(format!("{pad}{line}"));
                }
            }
            Statement::ExpressionStatement { expression, .. } => {
                out.push(format!("{pad}{}", lower_statement_expr(expression, self)));
            }
        }
    }

    fn lower_variable_decl(&mut self, kind: DeclarationKind, name: &str, value: &Expression, indent: usize, out: &mut Vec<String>) {
        let pad = "    ".repeat(indent);
        if let Expression::StructLiteral { type_name, fields, .. } = value {
            out.push(format!("{pad}{name}=\"{name}\""));
            out.push(format!("{pad}{name}__type=\"{type_name}\""));
            for field in fields {
                self.lower_struct_field(name, &field.name, &field.value, indent, out);
            }
            return;
        }
        let rendered = lower_value(value, self);
        let prefix = if matches!(kind, DeclarationKind::Const) { "readonly " } else { "" };
        out.push(format!("{pad}{prefix}{name}={rendered}"));
    }

    fn lower_struct_field(&mut self, base: &str, field: &str, value: &Expression, indent: usize, out: &mut Vec<String>) {
        let pad = "    ".repeat(indent);
        let path = format!("{base}_{field}");
        if let Expression::StructLiteral { type_name, fields, .. } = value {
            out.push(format!("{pad}{path}=\"{path}\""));
            out.push(format!("{pad}{path}__type=\"{type_name}\""));
            for nested in fields {
                self.lower_struct_field(&path, &nested.name, &nested.value, indent, out);
            }
        } else {
            let rendered = lower_value(value, self);
            out.push(format!("{pad}{path}={rendered}"));
        }
    }

    fn lower_assignment(&mut self, target: &Expression, value: &Expression, indent: usize, out: &mut Vec<String>) {
        let pad = "    ".repeat(indent);
        match target {
            Expression::Identifier { name, .. } => {
                let rendered = lower_value(value, self);
                out.push(format!("{pad}{name}={rendered}"));
            }
            Expression::MemberAccess { object, member, .. } => {
                let rendered = lower_value(value, self);
                if let Some(path) = flat_path(object) {
                    out.push(format!("{pad}{path}_{member}={rendered}"));
                } else {
                    let receiver = lower_value(object, self);
                    out.push(format!("{pad}brash_set_field {receiver} \"{member}\" {rendered}"));
                }
            }
            Expression::IndexAccess { object, index, .. } => {
                let rendered = lower_value(value, self);
                let base = flat_path(object).unwrap_or_else(|| lower_value(object, self));
                let index_text = lower_value(index, self);
                out.push(format!("{pad}brash_index_set {base} {index_text} {rendered}"));
            }
            _ => {
                self.warn("unsupported-assignment-target");
            }
        }
    }

    fn lower_for(&mut self, variable: &str, iterable: &Expression, body: &[Statement], indent: usize, out: &mut Vec<String>) {
        let pad = "    ".repeat(indent);
        match iterable {
            Expression::Range { start, end, .. } => {
                let start_text = lower_value(start, self);
                let end_text = lower_value(end, self);
                out.push(format!("{pad}for {variable} in $(seq {start_text} {end_text}); do"));
            }
            _ => {
                let base = flat_path(iterable).unwrap_or_else(|| lower_value(iterable, self));
                out.push(format!("{pad}for {variable} in \"${{{base}[@]}}\"; do", base = base.trim_matches('"')));
            }
        }
        for inner in body {
            self.lower_statement(inner, indent + 1, out);
        }
        out.push(format!("{pad}done"));
    }

    fn lower_return(&mut self, value: Option<&Expression>, indent: usize, out: &mut Vec<String>) {
        let pad = "    ".repeat(indent);
        match value {
            None => out.push(format!("{pad}return 0")),
            Some(expr) if self.in_main && self.main_returns_int => {
                out.push(format!("{pad}return $(( {} ))", lower_arith(expr, self)));
            }
            Some(expr) => {
                let rendered = lower_value(expr, self);
                out.push(format!("{pad}echo {rendered}"));
                out.push(format!("{pad}return 0"));
            }
        }
    }
}
