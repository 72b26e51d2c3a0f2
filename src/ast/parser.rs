//! Parser and AST builder (spec §4.2).
//!
//! Tokenizing and parsing is grammar-driven via `pest` (`src/brash.pest`),
//! following the teacher's `ast::parser::YParser` convention of deriving a
//! `pest::Parser` and walking its `Pairs` into hand-written node
//! constructors. Unlike the teacher's `from_pair` functions (which
//! `.unwrap()`/`panic!` on malformed input), every constructor here pushes
//! to the shared [`DiagnosticSink`] and substitutes [`Type::Unknown`] or a
//! best-effort placeholder so the rest of the pipeline can still run.
use pest::iterators::Pair;
use pest::Parser;

use crate::diagnostics::{codes, DiagnosticSink};

use super::expression::{BinaryOp, CommandKind, Expression, MapEntry, StructLiteralField, UnaryOp};
use super::position::Position;
use super::statement::{
    DeclarationKind, EnumDeclaration, ImplBlock, ImportStatement, MethodDeclaration, Param, Program,
    Statement, StructDeclaration, TupleElementBinding,
};
use super::types::Type;

#[derive(pest_derive::Parser)]
#[grammar = "brash.pest"]
pub struct BrashParser;

/// Rule names that belong to lexical (token-level) grammar productions.
/// Used to classify a pest parse failure as lex (`E000`) vs. parse (`E001`),
/// per spec §4.2's "Errors" contract.
const LEXICAL_RULES: &[Rule] = &[
    Rule::ident,
    Rule::intLit,
    Rule::floatLit,
    Rule::charLit,
    Rule::boolLit,
    Rule::nullLit,
    Rule::stringLit,
    Rule::plainString,
    Rule::interpolatedString,
    Rule::multilineString,
];

/// Parse `source` (already preprocessed) into a [`Program`].
///
/// Returns `None` only when the grammar itself rejects the input; lexical
/// and semantic problems found while walking the resulting parse tree are
/// reported to `sink` but do not themselves abort tree construction, so
/// later errors in the same file can still surface.
pub fn parse_program(source: &str, sink: &mut DiagnosticSink) -> Option<Program> {
    let mut pairs = match BrashParser::parse(Rule::program, source) {
        Ok(pairs) => pairs,
        Err(err) => {
            let (line, column) = line_col(&err);
            let code = if is_lexical_failure(&err) {
                codes::LEX_ERROR
            } else {
                codes::PARSE_ERROR
            };
            sink.error(code, err.variant.message().to_string(), line, column);
            return None;
        }
    };

    let program_pair = pairs.next()?;
    let mut statements = vec![];
    for pair in program_pair.into_inner() {
        if pair.as_rule() == Rule::EOI {
            continue;
        }
        if let Some(statement) = build_statement(pair, sink) {
            statements.push(statement);
        }
    }

    Some(Program { statements })
}

fn line_col(err: &pest::error::Error<Rule>) -> (usize, usize) {
    match err.line_col {
        pest::error::LineColLocation::Pos((line, col)) => (line, col),
        pest::error::LineColLocation::Span((line, col), _) => (line, col),
    }
}

fn is_lexical_failure(err: &pest::error::Error<Rule>) -> bool {
    if let pest::error::ErrorVariant::ParsingError { positives, negatives } = &err.variant {
        let all: Vec<&Rule> = positives.iter().chain(negatives.iter()).collect();
        !all.is_empty() && all.iter().all(|rule| LEXICAL_RULES.contains(rule))
    } else {
        false
    }
}

fn pos(pair: &Pair<Rule>) -> Position {
    pair.line_col()
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

fn build_statement(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    match pair.as_rule() {
        Rule::varDecl => build_var_decl(pair, sink),
        Rule::tupleDecl => build_tuple_decl(pair, sink),
        Rule::assignment => build_assignment(pair, sink),
        Rule::fnDecl => build_fn_decl(pair, sink),
        Rule::structDecl => build_struct_decl(pair, sink),
        Rule::enumDecl => build_enum_decl(pair, sink),
        Rule::implBlock => build_impl_block(pair, sink),
        Rule::ifStmt => build_if_stmt(pair, sink),
        Rule::forLoop => build_for_loop(pair, sink),
        Rule::whileLoop => build_while_loop(pair, sink),
        Rule::tryStmt => build_try_stmt(pair, sink),
        Rule::throwStmt => {
            let value = build_expression(inner_one(pair, Rule::throwStmt), sink);
            Some(Statement::ThrowStatement { value, position })
        }
        Rule::returnStmt => {
            let value = pair
                .into_inner()
                .next()
                .map(|expr_pair| build_expression(expr_pair, sink));
            Some(Statement::ReturnStatement { value, position })
        }
        Rule::breakStmt => Some(Statement::BreakStatement { position }),
        Rule::continueStmt => Some(Statement::ContinueStatement { position }),
        Rule::shStmt => {
            let script_pair = pair.into_inner().next()?;
            let script = strip_multiline(script_pair.as_str());
            Some(Statement::ShStatement { script, position })
        }
        Rule::importStmt => build_import_stmt(pair, sink),
        Rule::exprStmt => {
            let expression = build_expression(pair.into_inner().next()?, sink);
            Some(Statement::ExpressionStatement { expression, position })
        }
        other => {
            sink.error(
                codes::PARSE_ERROR,
                format!("unexpected top-level construct '{other:?}'"),
                position.0,
                position.1,
            );
            None
        }
    }
}

fn inner_one(pair: Pair<Rule>, _expected: Rule) -> Pair<Rule> {
    pair.into_inner().next().expect("grammar guarantees one child")
}

fn build_block(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Vec<Statement> {
    pair.into_inner()
        .filter_map(|stmt_pair| build_statement(stmt_pair, sink))
        .collect()
}

fn build_var_decl(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let mut is_public = false;
    let mut kind = DeclarationKind::Let;
    let mut name = String::new();
    let mut type_annotation = None;
    let mut value = None;

    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::pubKw => is_public = true,
            Rule::varDeclKind => {
                kind = match child.as_str() {
                    "const" => DeclarationKind::Const,
                    text if text.contains("mut") => DeclarationKind::Mut,
                    _ => DeclarationKind::Let,
                };
            }
            Rule::ident => name = child.as_str().to_string(),
            Rule::typeName => type_annotation = Some(build_type(child, sink)),
            Rule::expression => value = Some(build_expression(child, sink)),
            _ => {}
        }
    }

    let value = value?;
    Some(Statement::VariableDeclaration {
        kind,
        name,
        type_annotation,
        value,
        is_public,
        position,
    })
}

fn build_tuple_decl(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let mut elements = vec![];
    let mut value = None;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::tupleBinding => {
                let text = child.as_str();
                let is_mutable = text.trim_start().starts_with("mut");
                let name = child
                    .into_inner()
                    .next()
                    .map(|ident| ident.as_str().to_string())
                    .unwrap_or_default();
                elements.push(TupleElementBinding { name, is_mutable });
            }
            Rule::expression => value = Some(build_expression(child, sink)),
            _ => {}
        }
    }
    Some(Statement::TupleVariableDeclaration {
        elements,
        value: value?,
        position,
    })
}

fn build_assignment(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let mut inner = pair.into_inner();
    let target_pair = inner.next()?;
    let target = build_expression(target_pair.into_inner().next()?, sink);
    let value = build_expression(inner.next()?, sink);
    Some(Statement::Assignment { target, value, position })
}

fn build_params(pair_iter: impl Iterator<Item = Pair<Rule>>, sink: &mut DiagnosticSink) -> Vec<Param> {
    pair_iter
        .filter(|p| p.as_rule() == Rule::param)
        .map(|param_pair| {
            let position = pos(&param_pair);
            let text = param_pair.as_str();
            let is_mutable = text.trim_start().starts_with("mut");
            let mut name = String::new();
            let mut type_annotation = Type::Unknown;
            for child in param_pair.into_inner() {
                match child.as_rule() {
                    Rule::ident => name = child.as_str().to_string(),
                    Rule::typeName => type_annotation = build_type(child, sink),
                    _ => {}
                }
            }
            Param {
                name,
                type_annotation,
                is_mutable,
                position,
            }
        })
        .collect()
}

fn build_fn_decl(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let full_text = pair.as_str();
    let is_public = full_text.trim_start().starts_with("pub");
    let is_async = full_text.contains("async");

    let mut name = String::new();
    let mut params = vec![];
    let mut return_type = None;
    let mut body = vec![];

    let children: Vec<Pair<Rule>> = pair.into_inner().collect();
    let mut seen_ident = false;
    for child in children {
        match child.as_rule() {
            Rule::ident if !seen_ident => {
                name = child.as_str().to_string();
                seen_ident = true;
            }
            Rule::param => params.push(build_params(std::iter::once(child), sink).remove(0)),
            Rule::typeName => return_type = Some(build_type(child, sink)),
            Rule::block => body = build_block(child, sink),
            _ => {}
        }
    }

    Some(Statement::FunctionDeclaration {
        name,
        params,
        return_type,
        body,
        is_async,
        is_public,
        position,
    })
}

fn build_struct_decl(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let is_public = pair.as_str().trim_start().starts_with("pub");
    let mut name = String::new();
    let mut fields = vec![];
    let mut seen_ident = false;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::ident if !seen_ident => {
                name = child.as_str().to_string();
                seen_ident = true;
            }
            Rule::structField => {
                let mut inner = child.into_inner();
                let field_name = inner.next()?.as_str().to_string();
                let field_type = build_type(inner.next()?, sink);
                fields.push((field_name, field_type));
            }
            _ => {}
        }
    }
    Some(Statement::StructDeclaration(StructDeclaration {
        name,
        fields,
        is_public,
        position,
    }))
}

fn build_enum_decl(pair: Pair<Rule>, _sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let is_public = pair.as_str().trim_start().starts_with("pub");
    let mut idents = pair.into_inner().filter(|p| p.as_rule() == Rule::ident);
    let name = idents.next()?.as_str().to_string();
    let variants = idents.map(|p| p.as_str().to_string()).collect();
    Some(Statement::EnumDeclaration(EnumDeclaration {
        name,
        variants,
        is_public,
        position,
    }))
}

fn build_impl_block(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let mut inner = pair.into_inner();
    let type_name = inner.next()?.as_str().to_string();
    let mut methods = vec![];
    for child in inner {
        if child.as_rule() != Rule::methodDecl {
            continue;
        }
        let method_position = pos(&child);
        let is_static = child.as_str().trim_start().starts_with("static");
        let mut name = String::new();
        let mut params = vec![];
        let mut return_type = None;
        let mut body = vec![];
        let mut seen_ident = false;
        for grandchild in child.into_inner() {
            match grandchild.as_rule() {
                Rule::ident if !seen_ident => {
                    name = grandchild.as_str().to_string();
                    seen_ident = true;
                }
                Rule::param => params.push(build_params(std::iter::once(grandchild), sink).remove(0)),
                Rule::typeName => return_type = Some(build_type(grandchild, sink)),
                Rule::block => body = build_block(grandchild, sink),
                _ => {}
            }
        }
        methods.push(MethodDeclaration {
            name,
            is_static,
            params,
            return_type,
            body,
            position: method_position,
        });
    }
    Some(Statement::ImplBlock(ImplBlock {
        type_name,
        methods,
        position,
    }))
}

fn build_if_stmt(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let mut inner = pair.into_inner();
    let condition = build_expression(inner.next()?, sink);
    let then_pair = inner.next()?;
    let then_block = build_block(then_pair, sink);

    let mut elif_blocks = vec![];
    let mut else_block = None;
    for child in inner {
        match child.as_rule() {
            Rule::elifClause => {
                let mut elif_inner = child.into_inner();
                let elif_cond = build_expression(elif_inner.next()?, sink);
                let elif_body = build_block(elif_inner.next()?, sink);
                elif_blocks.push((elif_cond, elif_body));
            }
            Rule::elseClause => {
                let mut else_inner = child.into_inner();
                else_block = Some(build_block(else_inner.next()?, sink));
            }
            _ => {}
        }
    }

    Some(Statement::IfStatement {
        condition,
        then_block,
        elif_blocks,
        else_block,
        position,
    })
}

fn build_for_loop(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let mut inner = pair.into_inner();
    let variable = inner.next()?.as_str().to_string();
    let iterable = build_expression(inner.next()?, sink);
    let body = build_block(inner.next()?, sink);
    Some(Statement::ForLoop {
        variable,
        iterable,
        body,
        position,
    })
}

fn build_while_loop(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let mut inner = pair.into_inner();
    let condition = build_expression(inner.next()?, sink);
    let body = build_block(inner.next()?, sink);
    Some(Statement::WhileLoop {
        condition,
        body,
        position,
    })
}

fn build_try_stmt(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let mut inner = pair.into_inner();
    let try_block = build_block(inner.next()?, sink);
    let error_var = inner.next()?.as_str().to_string();
    let catch_block = build_block(inner.next()?, sink);
    Some(Statement::TryStatement {
        error_var,
        try_block,
        catch_block,
        position,
    })
}

fn build_import_stmt(pair: Pair<Rule>, _sink: &mut DiagnosticSink) -> Option<Statement> {
    let position = pos(&pair);
    let mut idents = vec![];
    let mut module_string = None;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::ident => idents.push(child.as_str().to_string()),
            Rule::stringLit => module_string = Some(strip_quotes(child.as_str())),
            _ => {}
        }
    }

    let import = if idents.is_empty() {
        ImportStatement {
            module: module_string,
            from_module: None,
            items: vec![],
            position,
        }
    } else {
        ImportStatement {
            module: None,
            from_module: module_string,
            items: idents,
            position,
        }
    };
    Some(Statement::ImportStatement(import))
}

// ---------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------

fn build_type(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Type {
    match pair.as_rule() {
        Rule::typeName => build_type(inner_one(pair, Rule::typeName), sink),
        Rule::nullableType => {
            let text = pair.as_str().to_string();
            let is_nullable = text.trim_end().ends_with('?');
            let base = build_type(inner_one(pair, Rule::nullableType), sink);
            if is_nullable {
                base.nullable()
            } else {
                base
            }
        }
        Rule::arrayOrBaseType => {
            let text = pair.as_str();
            let depth = text.matches("[]").count();
            let base = build_type(inner_one(pair, Rule::arrayOrBaseType), sink);
            (0..depth).fold(base, |acc, _| Type::Array(Box::new(acc)))
        }
        Rule::baseType => build_type(inner_one(pair, Rule::baseType), sink),
        Rule::mapType => {
            let mut inner = pair.into_inner();
            let key = build_type(inner.next().expect("mapType key"), sink);
            let value = build_type(inner.next().expect("mapType value"), sink);
            Type::Map(Box::new(key), Box::new(value))
        }
        Rule::tupleType => {
            let elements = pair.into_inner().map(|p| build_type(p, sink)).collect();
            Type::Tuple(elements)
        }
        Rule::ident => named_or_primitive(pair.as_str()),
        other => {
            let (line, col) = pair.line_col();
            sink.error(codes::PARSE_ERROR, format!("malformed type '{other:?}'"), line, col);
            Type::Unknown
        }
    }
}

fn named_or_primitive(name: &str) -> Type {
    use super::types::PrimitiveKind;
    match name {
        "int" => Type::Primitive(PrimitiveKind::Int),
        "float" => Type::Primitive(PrimitiveKind::Float),
        "string" => Type::Primitive(PrimitiveKind::String),
        "bool" => Type::Primitive(PrimitiveKind::Bool),
        "char" => Type::Primitive(PrimitiveKind::Char),
        "void" => Type::Primitive(PrimitiveKind::Void),
        "any" => Type::Primitive(PrimitiveKind::Any),
        other => Type::named(other),
    }
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

fn build_expression(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    match pair.as_rule() {
        Rule::expression => build_expression(inner_one(pair, Rule::expression), sink),
        Rule::pipeExpr => build_left_assoc_pipe(pair, sink),
        Rule::coalesceExpr => build_left_assoc_coalesce(pair, sink),
        Rule::orExpr => build_simple_binary_chain(pair, sink, BinaryOp::Or),
        Rule::andExpr => build_simple_binary_chain(pair, sink, BinaryOp::And),
        Rule::cmpExpr => build_cmp_chain(pair, sink),
        Rule::castExpr => build_cast_chain(pair, sink),
        Rule::rangeExpr => build_range(pair, sink),
        Rule::additiveExpr => build_op_rule_chain(pair, sink, Rule::addOp, |token| {
            if token == "+" {
                BinaryOp::Add
            } else {
                BinaryOp::Sub
            }
        }),
        Rule::multiplicativeExpr => build_op_rule_chain(pair, sink, Rule::mulOp, |token| match token {
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            _ => BinaryOp::Mod,
        }),
        Rule::unaryExpr => build_unary(pair, sink),
        Rule::postfix => build_postfix(pair, sink),
        Rule::primary => build_primary(pair, sink),
        other => {
            let (line, col) = pair.line_col();
            sink.error(
                codes::PARSE_ERROR,
                format!("unexpected expression construct '{other:?}'"),
                line,
                col,
            );
            Expression::NullLiteral { position: (line, col) }
        }
    }
}

fn build_left_assoc_pipe(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let mut operands = pair.into_inner();
    let mut left = build_expression(operands.next().expect("pipeExpr has >=1 operand"), sink);
    for right_pair in operands {
        let right = build_expression(right_pair, sink);
        left = Expression::Pipe {
            left: Box::new(left),
            right: Box::new(right),
            position,
        };
    }
    left
}

fn build_left_assoc_coalesce(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let mut operands = pair.into_inner();
    let mut left = build_expression(operands.next().expect("coalesceExpr has >=1 operand"), sink);
    for right_pair in operands {
        let right = build_expression(right_pair, sink);
        left = Expression::NullCoalesce {
            left: Box::new(left),
            right: Box::new(right),
            position,
        };
    }
    left
}

/// `orExpr`/`andExpr`: the operator itself isn't captured as a named rule
/// (just an inline literal), so every child of the pair is an operand.
fn build_simple_binary_chain(pair: Pair<Rule>, sink: &mut DiagnosticSink, op: BinaryOp) -> Expression {
    let position = pos(&pair);
    let mut operands = pair.into_inner();
    let mut left = build_expression(operands.next().expect("chain has >=1 operand"), sink);
    for right_pair in operands {
        let right = build_expression(right_pair, sink);
        left = Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            position,
        };
    }
    left
}

/// `additiveExpr`/`multiplicativeExpr`: the operator is captured as its own
/// named rule (`addOp`/`mulOp`) interleaved with operand pairs.
fn build_op_rule_chain(
    pair: Pair<Rule>,
    sink: &mut DiagnosticSink,
    op_rule: Rule,
    map_op: impl Fn(&str) -> BinaryOp,
) -> Expression {
    let position = pos(&pair);
    let mut operands = vec![];
    let mut ops = vec![];
    for child in pair.into_inner() {
        if child.as_rule() == op_rule {
            ops.push(child.as_str().to_string());
        } else {
            operands.push(child);
        }
    }
    let mut operand_iter = operands.into_iter();
    let mut left = build_expression(operand_iter.next().expect("chain has >=1 operand"), sink);
    for (token, rhs_pair) in ops.into_iter().zip(operand_iter) {
        let op = map_op(&token);
        let right = build_expression(rhs_pair, sink);
        left = Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            position,
        };
    }
    left
}

fn build_cmp_chain(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let mut operands = vec![];
    let mut op_tokens = vec![];
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::cmpOp => op_tokens.push(child.as_str().to_string()),
            _ => operands.push(child),
        }
    }
    let mut operand_iter = operands.into_iter();
    let mut left = build_expression(operand_iter.next().expect("cmpExpr has >=1 operand"), sink);
    for (token, rhs_pair) in op_tokens.into_iter().zip(operand_iter) {
        let op = match token.as_str() {
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Neq,
            "<=" => BinaryOp::Lte,
            ">=" => BinaryOp::Gte,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            _ => BinaryOp::Eq,
        };
        let right = build_expression(rhs_pair, sink);
        left = Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            position,
        };
    }
    left
}

fn build_cast_chain(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let mut value = None;
    let mut casts = vec![];
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::typeName => casts.push(build_type(child, sink)),
            other_rule => {
                let _ = other_rule;
                value = Some(build_expression(child, sink));
            }
        }
    }
    let mut expr = value.expect("castExpr has a base operand");
    for target_type in casts {
        expr = Expression::Cast {
            value: Box::new(expr),
            target_type,
            position,
        };
    }
    expr
}

fn build_range(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let mut operands = pair.into_inner();
    let start = build_expression(operands.next().expect("rangeExpr has a start operand"), sink);
    match operands.next() {
        Some(end_pair) => {
            let end = build_expression(end_pair, sink);
            Expression::Range {
                start: Box::new(start),
                end: Box::new(end),
                position,
            }
        }
        None => start,
    }
}

fn build_unary(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let mut ops = vec![];
    let mut operand = None;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::unaryOp => ops.push(if child.as_str() == "!" { UnaryOp::Not } else { UnaryOp::Neg }),
            _ => operand = Some(build_expression(child, sink)),
        }
    }
    let mut expr = operand.expect("unaryExpr has an operand");
    for op in ops.into_iter().rev() {
        expr = Expression::Unary {
            op,
            operand: Box::new(expr),
            position,
        };
    }
    expr
}

fn build_postfix(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let mut children = pair.into_inner();
    let first = children.next().expect("postfix has a base");
    if first.as_rule() == Rule::awaitExpr {
        let inner = inner_one(first, Rule::awaitExpr);
        let value = build_postfix(inner, sink);
        return Expression::Await {
            value: Box::new(value),
            position,
        };
    }

    let mut expr = build_primary(first, sink);
    for op_pair in children {
        expr = apply_postfix_op(expr, op_pair, sink, position);
    }
    expr
}

fn apply_postfix_op(base: Expression, op_pair: Pair<Rule>, sink: &mut DiagnosticSink, position: Position) -> Expression {
    let text = op_pair.as_str();
    let mut inner = op_pair.into_inner();

    if text.starts_with("?.") {
        let member = inner.next().expect("safe nav has a member name").as_str().to_string();
        return Expression::SafeNavigation {
            object: Box::new(base),
            member,
            position,
        };
    }

    if text.starts_with('[') {
        let index = build_expression(inner.next().expect("index access has an index"), sink);
        return Expression::IndexAccess {
            object: Box::new(base),
            index: Box::new(index),
            position,
        };
    }

    if text.starts_with('(') {
        let args = inner.filter(|p| p.as_rule() == Rule::args).flat_map(|args_pair| args_pair.into_inner());
        let args: Vec<Expression> = args.map(|p| build_expression(p, sink)).collect();
        return match base {
            Expression::Identifier { name, .. } => Expression::FunctionCall { callee: name, args, position },
            Expression::MemberAccess { object, member, .. } => Expression::MethodCall {
                object,
                name: member,
                args,
                is_static_dispatch: false,
                static_type_name: None,
                position,
            },
            other => other,
        };
    }

    // `.member` or `.member(args)` — the grammar bundles the call parens
    // into the same postfixOp as the dot, so both forms land here.
    let member = inner.next().expect("member access has a name").as_str().to_string();
    if text.contains('(') {
        let args = inner
            .filter(|p| p.as_rule() == Rule::args)
            .flat_map(|args_pair| args_pair.into_inner())
            .map(|p| build_expression(p, sink))
            .collect();
        return Expression::MethodCall {
            object: Box::new(base),
            name: member,
            args,
            is_static_dispatch: false,
            static_type_name: None,
            position,
        };
    }
    Expression::MemberAccess {
        object: Box::new(base),
        member,
        position,
    }
}

fn build_primary(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    match pair.as_rule() {
        Rule::primary => build_primary(inner_one(pair, Rule::primary), sink),
        Rule::commandExpr => build_command(pair, sink),
        Rule::structLiteral => build_struct_literal(pair, sink),
        Rule::mapLiteral => build_map_literal(pair, sink),
        Rule::arrayLiteral => {
            let elements = pair.into_inner().map(|p| build_expression(p, sink)).collect();
            Expression::ArrayLiteral { elements, position }
        }
        Rule::tupleExpr => {
            let elements = pair.into_inner().map(|p| build_expression(p, sink)).collect();
            Expression::TupleExpression { elements, position }
        }
        Rule::floatLit => {
            let value = pair.as_str().parse().unwrap_or_else(|_| {
                sink.error(codes::LEX_ERROR, format!("invalid float literal '{}'", pair.as_str()), position.0, position.1);
                0.0
            });
            Expression::FloatLiteral { value, position }
        }
        Rule::intLit => {
            let value = pair.as_str().parse().unwrap_or_else(|_| {
                sink.error(
                    codes::LEX_ERROR,
                    format!("integer literal '{}' out of range", pair.as_str()),
                    position.0,
                    position.1,
                );
                0
            });
            Expression::IntLiteral { value, position }
        }
        Rule::charLit => {
            let text = pair.as_str();
            let inner = &text[1..text.len() - 1];
            let unescaped = unescape::unescape(inner).unwrap_or_else(|| inner.to_string());
            Expression::CharLiteral {
                value: unescaped.chars().next().unwrap_or('\0'),
                position,
            }
        }
        Rule::boolLit => Expression::BoolLiteral {
            value: pair.as_str() == "true",
            position,
        },
        Rule::nullLit => Expression::NullLiteral { position },
        Rule::selfExpr => Expression::SelfExpr { position },
        Rule::ident => Expression::Identifier {
            name: pair.as_str().to_string(),
            position,
        },
        Rule::expression => build_expression(pair, sink),
        Rule::stringLit => build_string_literal(pair, position),
        other => {
            sink.error(
                codes::PARSE_ERROR,
                format!("unexpected primary expression '{other:?}'"),
                position.0,
                position.1,
            );
            Expression::NullLiteral { position }
        }
    }
}

fn build_command(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let text = pair.as_str();
    let is_async = text.trim_start().starts_with("async");
    let kind = if text.contains("spawn") {
        CommandKind::Spawn
    } else if text.contains("exec") {
        CommandKind::Exec
    } else {
        CommandKind::Cmd
    };
    let args = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::args)
        .flat_map(|args_pair| args_pair.into_inner())
        .map(|p| build_expression(p, sink))
        .collect();
    Expression::Command {
        kind,
        is_async,
        args,
        position,
    }
}

fn build_struct_literal(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let mut inner = pair.into_inner();
    let type_name = inner.next().expect("structLiteral has a type name").as_str().to_string();
    let fields = inner
        .filter(|p| p.as_rule() == Rule::structLiteralField)
        .map(|field_pair| {
            let mut field_inner = field_pair.into_inner();
            let name = field_inner.next().expect("field has a name").as_str().to_string();
            let value = build_expression(field_inner.next().expect("field has a value"), sink);
            StructLiteralField { name, value }
        })
        .collect();
    Expression::StructLiteral {
        type_name,
        fields,
        position,
    }
}

fn build_map_literal(pair: Pair<Rule>, sink: &mut DiagnosticSink) -> Expression {
    let position = pos(&pair);
    let entries = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::mapEntry)
        .map(|entry_pair| {
            let mut entry_inner = entry_pair.into_inner();
            let key = build_expression(entry_inner.next().expect("map entry key"), sink);
            let value = build_expression(entry_inner.next().expect("map entry value"), sink);
            MapEntry { key, value }
        })
        .collect();
    Expression::MapLiteral { entries, position }
}

fn build_string_literal(pair: Pair<Rule>, position: Position) -> Expression {
    let text = pair.as_str();
    if let Some(multiline) = text.strip_prefix("[[") {
        let content = multiline.strip_suffix("]]").unwrap_or(multiline);
        return Expression::StringLiteral {
            value: content.to_string(),
            is_interpolated: false,
            is_multiline: true,
            position,
        };
    }
    if let Some(interpolated) = text.strip_prefix("$\"") {
        let content = interpolated.strip_suffix('"').unwrap_or(interpolated);
        return Expression::StringLiteral {
            value: content.to_string(),
            is_interpolated: true,
            is_multiline: false,
            position,
        };
    }
    let content = strip_quotes(text);
    let unescaped = unescape::unescape(&content).unwrap_or(content);
    Expression::StringLiteral {
        value: unescaped,
        is_interpolated: false,
        is_multiline: false,
        position,
    }
}

fn strip_quotes(text: &str) -> String {
    text.trim_start_matches('"').trim_end_matches('"').to_string()
}

fn strip_multiline(text: &str) -> String {
    text.trim_start_matches("[[").trim_end_matches("]]").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (Option<Program>, DiagnosticSink) {
        let mut sink = DiagnosticSink::new();
        let program = parse_program(src, &mut sink);
        (program, sink)
    }

    #[test]
    fn parses_function_and_call() {
        let src = "fn inc(x: int): int\n    return x + 1\nend\nlet value = inc(41)\n";
        let (program, sink) = parse(src);
        assert!(!sink.has_errors(), "{:?}", sink.diagnostics());
        let program = program.unwrap();
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn parses_pipe_and_cmd() {
        let src = "exec(cmd(\"printf\", \"abc\") | cmd(\"tr\", \"a-z\", \"A-Z\"))\n";
        let (program, sink) = parse(src);
        assert!(!sink.has_errors(), "{:?}", sink.diagnostics());
        assert_eq!(program.unwrap().statements.len(), 1);
    }

    #[test]
    fn parses_struct_and_enum_and_impl() {
        let src = "struct Person {\n    age: int,\n    level: JobLevel\n}\nenum JobLevel {\n    Junior,\n    Senior\n}\nimpl Person\n    fn age_plus(self, delta: int): int\n        return self.age + delta\n    end\nend\n";
        let (program, sink) = parse(src);
        assert!(!sink.has_errors(), "{:?}", sink.diagnostics());
        assert_eq!(program.unwrap().statements.len(), 3);
    }

    #[test]
    fn parses_try_catch_throw() {
        let src = "try\n    throw \"boom\"\ncatch err\n    exec(\"printf\", \"caught:%s\\n\", err)\nend\n";
        let (program, sink) = parse(src);
        assert!(!sink.has_errors(), "{:?}", sink.diagnostics());
        assert_eq!(program.unwrap().statements.len(), 1);
    }

    #[test]
    fn reports_parse_error_on_garbage() {
        let src = "let = = =\n";
        let (_, sink) = parse(src);
        assert!(sink.has_errors());
    }
}
