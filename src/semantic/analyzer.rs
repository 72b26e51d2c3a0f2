//! Semantic analyzer (spec §4.4): declaration pass, validation pass, and
//! the transpilation-readiness gate.
use std::collections::HashSet;

use crate::ast::{
    BinaryOp, CommandKind, DeclarationKind, Expression, ImplBlock, PrimitiveKind, Program, Statement,
    Type, UnaryOp,
};
use crate::diagnostics::{codes, DiagnosticSink};

use super::symbol::{FunctionSymbol, MethodSymbol, SymbolTable, TypeSymbol};

type Position = (usize, usize);

/// Walks a merged [`Program`], populating the symbol table and annotating
/// dispatch metadata the code generator relies on (`MethodCall` static
/// dispatch, `EnumName.Variant` resolution).
pub struct SemanticAnalyzer {
    symbols: SymbolTable,
    loop_depth: usize,
    current_self_type: Option<String>,
    current_method_is_static: bool,
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            loop_depth: 0,
            current_self_type: None,
            current_method_is_static: false,
        }
    }

    pub fn analyze(&mut self, program: &mut Program, sink: &mut DiagnosticSink) {
        self.declare_pass(&program.statements, sink);
        for statement in &mut program.statements {
            self.check_statement(statement, sink);
        }
        if !sink.has_errors() {
            self.readiness_pass(&program.statements, sink);
        }
    }

    // -----------------------------------------------------------------
    // Declaration pass
    // -----------------------------------------------------------------

    fn declare_pass(&mut self, statements: &[Statement], sink: &mut DiagnosticSink) {
        for statement in statements {
            match statement {
                Statement::StructDeclaration(decl) => {
                    if self.symbols.types.contains_key(&decl.name) {
                        sink.error(
                            codes::DUPLICATE_DECLARATION,
                            format!("duplicate type '{}'", decl.name),
                            decl.position.0,
                            decl.position.1,
                        );
                    } else {
                        self.symbols.types.insert(decl.name.clone(), TypeSymbol::Struct(decl.clone()));
                    }
                }
                Statement::EnumDeclaration(decl) => {
                    if self.symbols.types.contains_key(&decl.name) {
                        sink.error(
                            codes::DUPLICATE_DECLARATION,
                            format!("duplicate type '{}'", decl.name),
                            decl.position.0,
                            decl.position.1,
                        );
                    } else {
                        let mut seen = HashSet::new();
                        for variant in &decl.variants {
                            if !seen.insert(variant) {
                                sink.error(
                                    codes::DUPLICATE_DECLARATION,
                                    format!("duplicate variant '{variant}' in enum '{}'", decl.name),
                                    decl.position.0,
                                    decl.position.1,
                                );
                            }
                        }
                        self.symbols.types.insert(decl.name.clone(), TypeSymbol::Enum(decl.clone()));
                    }
                }
                Statement::FunctionDeclaration {
                    name,
                    params,
                    return_type,
                    is_async,
                    position,
                    ..
                } => {
                    let is_builtin_redefinition =
                        self.symbols.functions.get(name).map(|f| f.is_builtin).unwrap_or(false);
                    if self.symbols.functions.contains_key(name) {
                        let message = if is_builtin_redefinition {
                            format!("'{name}' redefines a built-in function")
                        } else {
                            format!("duplicate function '{name}'")
                        };
                        sink.error(codes::DUPLICATE_DECLARATION, message, position.0, position.1);
                    } else {
                        self.symbols.functions.insert(
                            name.clone(),
                            FunctionSymbol {
                                param_types: params.iter().map(|p| p.type_annotation.clone()).collect(),
                                return_type: return_type.clone().unwrap_or_else(Type::void),
                                is_async: *is_async,
                                is_builtin: false,
                                is_variadic: false,
                            },
                        );
                    }
                }
                Statement::VariableDeclaration {
                    kind,
                    name,
                    is_public,
                    position,
                    ..
                } => {
                    if *is_public && !matches!(kind, DeclarationKind::Const) {
                        sink.error(
                            codes::PUBLIC_NON_CONST,
                            format!("'{name}' is 'pub' but not 'const'"),
                            position.0,
                            position.1,
                        );
                    }
                }
                Statement::ImplBlock(ImplBlock { type_name, methods, .. }) => {
                    for method in methods {
                        self.symbols.methods.insert(
                            (type_name.clone(), method.name.clone()),
                            MethodSymbol {
                                param_types: method.params.iter().map(|p| p.type_annotation.clone()).collect(),
                                return_type: method.return_type.clone().unwrap_or_else(Type::void),
                                is_static: method.is_static,
                            },
                        );
                    }
                }
                _ => {}
            }
        }
    }

    // -----------------------------------------------------------------
    // Validation pass
    // -----------------------------------------------------------------

    fn check_statement(&mut self, statement: &mut Statement, sink: &mut DiagnosticSink) {
        match statement {
            Statement::VariableDeclaration {
                kind,
                name,
                type_annotation,
                value,
                position,
                ..
            } => {
                let value_type = self.infer_type(value, sink);
                let declared_type = match type_annotation {
                    Some(annotated) => {
                        if !self.types_compatible(annotated, &value_type) {
                            sink.error(
                                codes::TYPE_MISMATCH,
                                format!("cannot assign '{value_type}' to '{name}: {annotated}'"),
                                position.0,
                                position.1,
                            );
                        }
                        annotated.clone()
                    }
                    None => value_type,
                };
                let is_mutable = matches!(kind, DeclarationKind::Mut);
                if !self.symbols.declare_variable(name, declared_type, is_mutable) {
                    sink.error(
                        codes::DUPLICATE_DECLARATION,
                        format!("redeclaration of '{name}' in this scope"),
                        position.0,
                        position.1,
                    );
                }
            }
            Statement::TupleVariableDeclaration { elements, value, position } => {
                let value_type = self.infer_type(value, sink);
                match value_type {
                    Type::Tuple(types) if types.len() == elements.len() => {
                        for (element, element_type) in elements.iter().zip(types) {
                            self.symbols.declare_variable(&element.name, element_type, element.is_mutable);
                        }
                    }
                    Type::Tuple(_) => {
                        sink.error(codes::TYPE_MISMATCH, "tuple arity mismatch".to_string(), position.0, position.1);
                    }
                    other => {
                        sink.error(
                            codes::TYPE_MISMATCH,
                            format!("expected a tuple value, found '{other}'"),
                            position.0,
                            position.1,
                        );
                    }
                }
            }
            Statement::Assignment { target, value, position } => {
                let value_type = self.infer_type(value, sink);
                self.check_assignment_target(target, &value_type, *position, sink);
            }
            Statement::FunctionDeclaration {
                name,
                params,
                return_type,
                body,
                position,
                ..
            } => {
                if name == "main" {
                    self.validate_main_signature(params, return_type, *position, sink);
                }
                self.symbols.push_scope();
                for param in params.iter() {
                    self.symbols
                        .declare_variable(&param.name, param.type_annotation.clone(), param.is_mutable);
                }
                for inner in body.iter_mut() {
                    self.check_statement(inner, sink);
                }
                self.symbols.pop_scope();
            }
            Statement::StructDeclaration(_) | Statement::EnumDeclaration(_) => {}
            Statement::ImplBlock(ImplBlock { type_name, methods, .. }) => {
                for method in methods.iter_mut() {
                    self.symbols.push_scope();
                    let saved_self_type = self.current_self_type.replace(type_name.clone());
                    let saved_static = self.current_method_is_static;
                    self.current_method_is_static = method.is_static;
                    if !method.is_static {
                        self.symbols
                            .declare_variable("self", Type::named(type_name.clone()), false);
                    }
                    for param in &method.params {
                        self.symbols
                            .declare_variable(&param.name, param.type_annotation.clone(), param.is_mutable);
                    }
                    for inner in method.body.iter_mut() {
                        self.check_statement(inner, sink);
                    }
                    self.current_self_type = saved_self_type.clone();
                    self.current_method_is_static = saved_static;
                    self.symbols.pop_scope();
                }
            }
            Statement::IfStatement {
                condition,
                then_block,
                elif_blocks,
                else_block,
                position,
            } => {
                self.check_condition(condition, *position, sink);
                let guard = narrow_guard(condition);

                self.symbols.push_scope();
                if let Some((name, narrows_in_then)) = &guard {
                    if *narrows_in_then {
                        self.apply_narrowing(name);
                    }
                }
                for inner in then_block.iter_mut() {
                    self.check_statement(inner, sink);
                }
                self.symbols.pop_scope();

                for (elif_condition, elif_body) in elif_blocks.iter_mut() {
                    self.check_condition(elif_condition, *position, sink);
                    self.symbols.push_scope();
                    for inner in elif_body.iter_mut() {
                        self.check_statement(inner, sink);
                    }
                    self.symbols.pop_scope();
                }

                if let Some(else_body) = else_block {
                    self.symbols.push_scope();
                    if let Some((name, narrows_in_then)) = &guard {
                        if !*narrows_in_then {
                            self.apply_narrowing(name);
                        }
                    }
                    for inner in else_body.iter_mut() {
                        self.check_statement(inner, sink);
                    }
                    self.symbols.pop_scope();
                }
            }
            Statement::ForLoop { variable, iterable, body, position } => {
                let element_type = match iterable {
                    Expression::Range { start, end, .. } => {
                        let start_type = self.infer_type(start, sink);
                        let end_type = self.infer_type(end, sink);
                        if !start_type.is_numeric() || !end_type.is_numeric() {
                            sink.error(
                                codes::TYPE_MISMATCH,
                                "range bounds must be numeric".to_string(),
                                position.0,
                                position.1,
                            );
                        }
                        Type::int()
                    }
                    other => match self.infer_type(other, sink) {
                        Type::Array(element) => *element,
                        Type::Unknown => Type::Unknown,
                        found => {
                            sink.error(
                                codes::TYPE_MISMATCH,
                                format!("'for' iterable must be an array or range, found '{found}'"),
                                position.0,
                                position.1,
                            );
                            Type::Unknown
                        }
                    },
                };
                self.loop_depth += 1;
                self.symbols.push_scope();
                self.symbols.declare_variable(variable, element_type, false);
                for inner in body.iter_mut() {
                    self.check_statement(inner, sink);
                }
                self.symbols.pop_scope();
                self.loop_depth -= 1;
            }
            Statement::WhileLoop { condition, body, position } => {
                self.check_condition(condition, *position, sink);
                self.loop_depth += 1;
                self.symbols.push_scope();
                for inner in body.iter_mut() {
                    self.check_statement(inner, sink);
                }
                self.symbols.pop_scope();
                self.loop_depth -= 1;
            }
            Statement::TryStatement { error_var, try_block, catch_block, .. } => {
                self.symbols.push_scope();
                for inner in try_block.iter_mut() {
                    self.check_statement(inner, sink);
                }
                self.symbols.pop_scope();

                self.symbols.push_scope();
                self.symbols.declare_variable(error_var, Type::string(), false);
                for inner in catch_block.iter_mut() {
                    self.check_statement(inner, sink);
                }
                self.symbols.pop_scope();
            }
            Statement::ThrowStatement { value, .. } => {
                self.infer_type(value, sink);
            }
            Statement::ImportStatement(_) => {}
            Statement::ReturnStatement { value, .. } => {
                if let Some(inner) = value {
                    self.infer_type(inner, sink);
                }
            }
            Statement::BreakStatement { position } | Statement::ContinueStatement { position } => {
                if self.loop_depth == 0 {
                    sink.error(
                        codes::BREAK_CONTINUE_OUTSIDE_LOOP,
                        "'break'/'continue' used outside a loop".to_string(),
                        position.0,
                        position.1,
                    );
                }
            }
            Statement::ShStatement { script, position } => {
                check_suspicious_interpolation(script, *position, sink);
            }
            Statement::ExpressionStatement { expression, .. } => {
                self.infer_type(expression, sink);
            }
        }
    }

    fn check_condition(&mut self, condition: &mut Expression, position: Position, sink: &mut DiagnosticSink) {
        let condition_type = self.infer_type(condition, sink);
        if !matches!(condition_type, Type::Primitive(PrimitiveKind::Bool)) {
            sink.warning(
                codes::CONDITION_NOT_BOOL,
                format!("condition has type '{condition_type}', expected 'bool'"),
                position.0,
                position.1,
            );
        }
    }

    fn apply_narrowing(&mut self, name: &str) {
        if let Some(symbol) = self.symbols.lookup_variable(name) {
            let narrowed = symbol.type_.non_null();
            self.symbols.narrow_variable(name, narrowed);
        }
    }

    fn validate_main_signature(
        &self,
        params: &[crate::ast::Param],
        return_type: &Option<Type>,
        position: Position,
        sink: &mut DiagnosticSink,
    ) {
        let return_ok = match return_type {
            None => true,
            Some(Type::Primitive(PrimitiveKind::Void)) | Some(Type::Primitive(PrimitiveKind::Int)) => true,
            Some(_) => false,
        };
        let params_ok = params.is_empty()
            || (params.len() == 1
                && params[0].name == "args"
                && params[0].type_annotation == Type::Array(Box::new(Type::string())));
        if !return_ok || !params_ok {
            sink.error(
                codes::INVALID_MAIN_SIGNATURE,
                "'main' must be '() -> void|int' or '(args: string[]) -> void|int'".to_string(),
                position.0,
                position.1,
            );
        }
    }

    fn check_assignment_target(
        &mut self,
        target: &mut Expression,
        value_type: &Type,
        position: Position,
        sink: &mut DiagnosticSink,
    ) {
        match target {
            Expression::Identifier { name, .. } => match self.symbols.lookup_variable(name) {
                Some(symbol) if symbol.is_mutable => {
                    if !self.types_compatible(&symbol.type_, value_type) {
                        sink.error(
                            codes::TYPE_MISMATCH,
                            format!("cannot assign '{value_type}' to '{name}'"),
                            position.0,
                            position.1,
                        );
                    }
                }
                Some(_) => sink.error(
                    codes::IMMUTABLE_ASSIGNMENT,
                    format!("cannot assign to immutable variable '{name}'"),
                    position.0,
                    position.1,
                ),
                None => sink.error(
                    codes::UNKNOWN_IDENTIFIER,
                    format!("assignment to unknown identifier '{name}'"),
                    position.0,
                    position.1,
                ),
            },
            Expression::MemberAccess { object, .. } => {
                if matches!(object.as_ref(), Expression::SelfExpr { .. }) && self.current_self_type.is_none() {
                    sink.error(
                        codes::IMMUTABLE_ASSIGNMENT,
                        "cannot assign to 'self.field' outside an instance method".to_string(),
                        position.0,
                        position.1,
                    );
                }
                self.infer_type(target, sink);
            }
            Expression::IndexAccess { .. } => {
                self.infer_type(target, sink);
            }
            _ => sink.error(
                codes::TYPE_MISMATCH,
                "invalid assignment target".to_string(),
                position.0,
                position.1,
            ),
        }
    }

    // -----------------------------------------------------------------
    // Expression typing
    // -----------------------------------------------------------------

    fn infer_type(&mut self, expr: &mut Expression, sink: &mut DiagnosticSink) -> Type {
        match expr {
            Expression::IntLiteral { .. } => Type::int(),
            Expression::FloatLiteral { .. } => Type::float(),
            Expression::StringLiteral { .. } => Type::string(),
            Expression::CharLiteral { .. } => Type::char(),
            Expression::BoolLiteral { .. } => Type::bool(),
            Expression::NullLiteral { .. } => Type::null_literal(),
            Expression::SelfExpr { position } => {
                if self.current_method_is_static {
                    sink.error(
                        codes::INVALID_DISPATCH,
                        "'self' used inside a static method".to_string(),
                        position.0,
                        position.1,
                    );
                    Type::Unknown
                } else {
                    match &self.current_self_type {
                        Some(type_name) => Type::named(type_name.clone()),
                        None => {
                            sink.error(
                                codes::INVALID_DISPATCH,
                                "'self' used outside a method".to_string(),
                                position.0,
                                position.1,
                            );
                            Type::Unknown
                        }
                    }
                }
            }
            Expression::Identifier { name, position } => match self.symbols.lookup_variable(name) {
                Some(symbol) => symbol.type_.clone(),
                None => {
                    sink.error(
                        codes::UNKNOWN_IDENTIFIER,
                        format!("unknown identifier '{name}'"),
                        position.0,
                        position.1,
                    );
                    Type::Unknown
                }
            },
            Expression::Binary { op, left, right, position } => {
                let position = *position;
                let left_type = self.infer_type(left, sink);
                let right_type = self.infer_type(right, sink);
                self.infer_binary(*op, &left_type, &right_type, position, sink)
            }
            Expression::Unary { op, operand, position } => {
                let position = *position;
                let operand_type = self.infer_type(operand, sink);
                match op {
                    UnaryOp::Neg => {
                        if operand_type.is_numeric() {
                            operand_type
                        } else {
                            sink.error(
                                codes::TYPE_MISMATCH,
                                format!("unary '-' requires a numeric operand, found '{operand_type}'"),
                                position.0,
                                position.1,
                            );
                            Type::Unknown
                        }
                    }
                    UnaryOp::Not => {
                        if !matches!(operand_type, Type::Primitive(PrimitiveKind::Bool)) {
                            sink.warning(
                                codes::CONDITION_NOT_BOOL,
                                "'!' applied to a non-bool operand".to_string(),
                                position.0,
                                position.1,
                            );
                        }
                        Type::bool()
                    }
                }
            }
            Expression::Cast { value, target_type, position } => {
                let position = *position;
                let value_type = self.infer_type(value, sink);
                if !can_cast(&value_type, target_type) {
                    sink.error(
                        codes::INVALID_CAST,
                        format!("cannot cast '{value_type}' to '{target_type}'"),
                        position.0,
                        position.1,
                    );
                }
                target_type.clone()
            }
            Expression::FunctionCall { callee, args, position } => {
                let position = *position;
                let arg_types: Vec<Type> = args.iter_mut().map(|arg| self.infer_type(arg, sink)).collect();
                match self.symbols.functions.get(callee).cloned() {
                    Some(function) => {
                        if !function.is_variadic {
                            if arg_types.len() != function.param_types.len() {
                                sink.error(
                                    codes::TYPE_MISMATCH,
                                    format!(
                                        "'{callee}' expects {} argument(s), found {}",
                                        function.param_types.len(),
                                        arg_types.len()
                                    ),
                                    position.0,
                                    position.1,
                                );
                            } else {
                                for (expected, actual) in function.param_types.iter().zip(&arg_types) {
                                    if !self.types_compatible(expected, actual) {
                                        sink.error(
                                            codes::TYPE_MISMATCH,
                                            format!("argument type mismatch calling '{callee}'"),
                                            position.0,
                                            position.1,
                                        );
                                    }
                                }
                            }
                        }
                        function.return_type
                    }
                    None => {
                        sink.error(
                            codes::UNDEFINED_FUNCTION,
                            format!("call to undefined function '{callee}'"),
                            position.0,
                            position.1,
                        );
                        Type::Unknown
                    }
                }
            }
            Expression::MethodCall {
                object,
                name,
                args,
                is_static_dispatch,
                static_type_name,
                position,
            } => {
                let position = *position;
                self.infer_method_call(object, name, args, is_static_dispatch, static_type_name, position, sink)
            }
            Expression::MemberAccess { object, member, position } => {
                let position = *position;
                if let Some(enum_name) = self.enum_receiver_name(object) {
                    let is_valid = matches!(
                        self.symbols.types.get(&enum_name),
                        Some(TypeSymbol::Enum(decl)) if decl.variants.contains(member)
                    );
                    if !is_valid {
                        sink.error(
                            codes::UNKNOWN_VARIANT,
                            format!("enum '{enum_name}' has no variant '{member}'"),
                            position.0,
                            position.1,
                        );
                    }
                    let variant = member.clone();
                    *expr = Expression::EnumLiteral { enum_name: enum_name.clone(), variant, position };
                    return Type::named(enum_name);
                }

                let object_type = self.infer_type(object, sink);
                if object_type.is_nullable() {
                    sink.warning(
                        codes::NULLABILITY_WARNING,
                        format!("'{member}' accessed on a possibly-null value without '?.'"),
                        position.0,
                        position.1,
                    );
                }
                self.resolve_field(&object_type.non_null(), member, position, sink)
            }
            Expression::SafeNavigation { object, member, position } => {
                let position = *position;
                let object_type = self.infer_type(object, sink);
                let field_type = self.resolve_field(&object_type.non_null(), member, position, sink);
                Type::Nullable(Box::new(field_type))
            }
            Expression::IndexAccess { object, index, position } => {
                let position = *position;
                let object_type = self.infer_type(object, sink);
                let index_type = self.infer_type(index, sink);
                if object_type.is_nullable() {
                    sink.warning(
                        codes::NULLABILITY_WARNING,
                        "index access on a possibly-null value".to_string(),
                        position.0,
                        position.1,
                    );
                }
                match object_type.non_null() {
                    Type::Array(element) => {
                        if !index_type.is_numeric() {
                            sink.error(
                                codes::TYPE_MISMATCH,
                                "array index must be numeric".to_string(),
                                position.0,
                                position.1,
                            );
                        }
                        *element
                    }
                    Type::Map(key_type, value_type) => {
                        if !self.types_compatible(&key_type, &index_type) {
                            sink.error(
                                codes::TYPE_MISMATCH,
                                "map index type does not match the key type".to_string(),
                                position.0,
                                position.1,
                            );
                        }
                        *value_type
                    }
                    other => {
                        sink.error(
                            codes::TYPE_MISMATCH,
                            format!("cannot index into '{other}'"),
                            position.0,
                            position.1,
                        );
                        Type::Unknown
                    }
                }
            }
            Expression::ArrayLiteral { elements, .. } => {
                let mut element_type = Type::any();
                for (index, element) in elements.iter_mut().enumerate() {
                    let element_ty = self.infer_type(element, sink);
                    if index == 0 {
                        element_type = element_ty;
                    }
                }
                Type::Array(Box::new(element_type))
            }
            Expression::MapLiteral { entries, .. } => {
                let mut key_type = Type::any();
                let mut value_type = Type::any();
                for (index, entry) in entries.iter_mut().enumerate() {
                    let k = self.infer_type(&mut entry.key, sink);
                    let v = self.infer_type(&mut entry.value, sink);
                    if index == 0 {
                        key_type = k;
                        value_type = v;
                    }
                }
                Type::Map(Box::new(key_type), Box::new(value_type))
            }
            Expression::StructLiteral { type_name, fields, position } => {
                let position = *position;
                self.check_struct_literal(type_name, fields, position, sink)
            }
            Expression::TupleExpression { elements, .. } => {
                let types = elements.iter_mut().map(|e| self.infer_type(e, sink)).collect();
                Type::Tuple(types)
            }
            Expression::Pipe { left, right, position } => {
                let position = *position;
                self.infer_pipe(left, right, position, sink)
            }
            Expression::NullCoalesce { left, right, position } => {
                let position = *position;
                let left_type = self.infer_type(left, sink);
                let right_type = self.infer_type(right, sink);
                if !left_type.is_nullable() {
                    sink.warning(
                        codes::REDUNDANT_COALESCE,
                        "left side of '??' is never null".to_string(),
                        position.0,
                        position.1,
                    );
                    right_type
                } else {
                    left_type.non_null()
                }
            }
            Expression::Range { .. } => Type::named("__Range"),
            Expression::Command { kind, is_async, args, position } => {
                let position = *position;
                let arg_types: Vec<Type> = args.iter_mut().map(|arg| self.infer_type(arg, sink)).collect();
                let command_args = arg_types.iter().filter(|t| **t == Type::command()).count();
                if command_args > 0 && args.len() > 1 {
                    sink.error(
                        codes::TYPE_MISMATCH,
                        "cannot mix a Command value with positional arguments".to_string(),
                        position.0,
                        position.1,
                    );
                }
                match kind {
                    CommandKind::Cmd => Type::command(),
                    CommandKind::Exec => {
                        if *is_async {
                            Type::void()
                        } else {
                            Type::string()
                        }
                    }
                    CommandKind::Spawn => Type::process(),
                }
            }
            Expression::Await { value, position } => {
                let position = *position;
                let value_type = self.infer_type(value, sink);
                if value_type != Type::process() {
                    sink.error(
                        codes::TYPE_MISMATCH,
                        "'await' requires a 'Process' value".to_string(),
                        position.0,
                        position.1,
                    );
                }
                Type::string()
            }
            Expression::EnumLiteral { enum_name, variant, position } => {
                let position = *position;
                let is_valid = matches!(
                    self.symbols.types.get(enum_name),
                    Some(TypeSymbol::Enum(decl)) if decl.variants.contains(variant)
                );
                if !is_valid {
                    sink.error(
                        codes::UNKNOWN_VARIANT,
                        format!("enum '{enum_name}' has no variant '{variant}'"),
                        position.0,
                        position.1,
                    );
                }
                Type::named(enum_name.clone())
            }
        }
    }

    fn infer_binary(
        &self,
        op: BinaryOp,
        left: &Type,
        right: &Type,
        position: Position,
        sink: &mut DiagnosticSink,
    ) -> Type {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                if left.is_numeric() && right.is_numeric() {
                    if left == right {
                        left.clone()
                    } else {
                        Type::float()
                    }
                } else if op == BinaryOp::Add
                    && matches!(left, Type::Primitive(PrimitiveKind::String) | Type::Primitive(PrimitiveKind::Char))
                    && matches!(right, Type::Primitive(PrimitiveKind::String) | Type::Primitive(PrimitiveKind::Char))
                {
                    Type::string()
                } else {
                    sink.error(
                        codes::TYPE_MISMATCH,
                        format!("operator requires numeric operands, found '{left}' and '{right}'"),
                        position.0,
                        position.1,
                    );
                    Type::Unknown
                }
            }
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Lte | BinaryOp::Gte => {
                if !self.types_compatible(left, right) && !self.types_compatible(right, left) {
                    sink.error(
                        codes::TYPE_MISMATCH,
                        format!("cannot compare '{left}' and '{right}'"),
                        position.0,
                        position.1,
                    );
                }
                Type::bool()
            }
            BinaryOp::And | BinaryOp::Or => {
                if !matches!(left, Type::Primitive(PrimitiveKind::Bool))
                    || !matches!(right, Type::Primitive(PrimitiveKind::Bool))
                {
                    sink.warning(
                        codes::CONDITION_NOT_BOOL,
                        "logical operator applied to a non-bool operand".to_string(),
                        position.0,
                        position.1,
                    );
                }
                Type::bool()
            }
        }
    }

    /// `object` names a declared enum (not shadowed by a variable).
    fn enum_receiver_name(&self, object: &Expression) -> Option<String> {
        if let Expression::Identifier { name, .. } = object {
            if self.symbols.lookup_variable(name).is_none() {
                if let Some(TypeSymbol::Enum(_)) = self.symbols.types.get(name) {
                    return Some(name.clone());
                }
            }
        }
        None
    }

    fn resolve_field(&self, base: &Type, member: &str, position: Position, sink: &mut DiagnosticSink) -> Type {
        match base {
            Type::Named(type_name) => match self.symbols.types.get(type_name) {
                Some(TypeSymbol::Struct(decl)) => match decl.fields.iter().find(|(name, _)| name == member) {
                    Some((_, field_type)) => field_type.clone(),
                    None => {
                        sink.error(
                            codes::UNKNOWN_FIELD,
                            format!("unknown field '{member}' on '{type_name}'"),
                            position.0,
                            position.1,
                        );
                        Type::Unknown
                    }
                },
                _ => {
                    sink.error(
                        codes::TYPE_MISMATCH,
                        format!("'{type_name}' has no fields"),
                        position.0,
                        position.1,
                    );
                    Type::Unknown
                }
            },
            Type::Unknown => Type::Unknown,
            other => {
                sink.error(
                    codes::TYPE_MISMATCH,
                    format!("member access requires a struct value, found '{other}'"),
                    position.0,
                    position.1,
                );
                Type::Unknown
            }
        }
    }

    fn infer_method_call(
        &mut self,
        object: &mut Expression,
        name: &str,
        args: &mut [Expression],
        is_static_dispatch: &mut bool,
        static_type_name: &mut Option<String>,
        position: Position,
        sink: &mut DiagnosticSink,
    ) -> Type {
        let arg_types: Vec<Type> = args.iter_mut().map(|arg| self.infer_type(arg, sink)).collect();

        if let Some(type_name) = self.static_receiver_name(object) {
            return match self.symbols.methods.get(&(type_name.clone(), name.to_string())).cloned() {
                Some(method) if method.is_static => {
                    *is_static_dispatch = true;
                    *static_type_name = Some(type_name.clone());
                    self.check_call_args(name, &method.param_types, &arg_types, position, sink);
                    method.return_type
                }
                Some(_) => {
                    sink.error(
                        codes::INVALID_DISPATCH,
                        format!("'{name}' is an instance method of '{type_name}', not static"),
                        position.0,
                        position.1,
                    );
                    Type::Unknown
                }
                None => {
                    sink.error(
                        codes::UNKNOWN_IDENTIFIER,
                        format!("unknown method '{name}' on type '{type_name}'"),
                        position.0,
                        position.1,
                    );
                    Type::Unknown
                }
            };
        }

        let object_type = self.infer_type(object, sink);
        if name == "to_string" && args.is_empty() {
            return Type::string();
        }
        if matches!(object_type, Type::Primitive(PrimitiveKind::String)) {
            if let Some(result) = self.check_string_builtin(name, &arg_types, position, sink) {
                return result;
            }
        }

        match &object_type {
            Type::Named(type_name) => {
                match self.symbols.methods.get(&(type_name.clone(), name.to_string())).cloned() {
                    Some(method) if !method.is_static => {
                        self.check_call_args(name, &method.param_types, &arg_types, position, sink);
                        method.return_type
                    }
                    Some(_) => {
                        sink.error(
                            codes::INVALID_DISPATCH,
                            format!("'{name}' is static on '{type_name}'; call it as '{type_name}.{name}()'"),
                            position.0,
                            position.1,
                        );
                        Type::Unknown
                    }
                    None => {
                        sink.error(
                            codes::UNKNOWN_IDENTIFIER,
                            format!("unknown method '{name}' on '{type_name}'"),
                            position.0,
                            position.1,
                        );
                        Type::Unknown
                    }
                }
            }
            Type::Unknown => Type::Unknown,
            other => {
                sink.error(
                    codes::UNKNOWN_IDENTIFIER,
                    format!("unknown method '{name}' on '{other}'"),
                    position.0,
                    position.1,
                );
                Type::Unknown
            }
        }
    }

    /// `object` is a bare identifier naming a declared type (not a
    /// variable) — the receiver of a static method call.
    fn static_receiver_name(&self, object: &Expression) -> Option<String> {
        if let Expression::Identifier { name, .. } = object {
            if self.symbols.lookup_variable(name).is_none() && self.symbols.types.contains_key(name) {
                return Some(name.clone());
            }
        }
        None
    }

    fn check_call_args(
        &self,
        name: &str,
        expected: &[Type],
        actual: &[Type],
        position: Position,
        sink: &mut DiagnosticSink,
    ) {
        if expected.len() != actual.len() {
            sink.error(
                codes::TYPE_MISMATCH,
                format!("'{name}' expects {} argument(s), found {}", expected.len(), actual.len()),
                position.0,
                position.1,
            );
            return;
        }
        for (expected_type, actual_type) in expected.iter().zip(actual) {
            if !self.types_compatible(expected_type, actual_type) {
                sink.error(
                    codes::TYPE_MISMATCH,
                    format!("argument type mismatch calling '{name}'"),
                    position.0,
                    position.1,
                );
            }
        }
    }

    fn check_string_builtin(
        &self,
        name: &str,
        args: &[Type],
        position: Position,
        sink: &mut DiagnosticSink,
    ) -> Option<Type> {
        match name {
            "length" if args.is_empty() => Some(Type::int()),
            "contains" if args.len() == 1 && matches!(args[0], Type::Primitive(PrimitiveKind::String)) => {
                Some(Type::bool())
            }
            "split" if args.len() == 1 && matches!(args[0], Type::Primitive(PrimitiveKind::String)) => {
                Some(Type::Array(Box::new(Type::string())))
            }
            "substring" if args.len() == 2 && args.iter().all(Type::is_numeric) => Some(Type::string()),
            "length" | "contains" | "split" | "substring" => {
                sink.error(
                    codes::TYPE_MISMATCH,
                    format!("wrong argument(s) for built-in string method '{name}'"),
                    position.0,
                    position.1,
                );
                Some(Type::Unknown)
            }
            _ => None,
        }
    }

    fn infer_pipe(
        &mut self,
        left: &mut Expression,
        right: &mut Expression,
        position: Position,
        sink: &mut DiagnosticSink,
    ) -> Type {
        let left_type = self.infer_type(left, sink);
        if left_type == Type::command() {
            let right_type = self.infer_type(right, sink);
            if right_type != Type::command() {
                sink.error(
                    codes::INVALID_PIPE,
                    "right side of a command pipe must also be a command".to_string(),
                    position.0,
                    position.1,
                );
            }
            return Type::command();
        }

        if !matches!(right, Expression::FunctionCall { .. } | Expression::MethodCall { .. }) {
            sink.error(
                codes::INVALID_PIPE,
                "right side of a value pipe must be a function or method call".to_string(),
                position.0,
                position.1,
            );
            return Type::Unknown;
        }

        let right_type = self.infer_type(right, sink);
        if !self.types_compatible(&right_type, &left_type) && !self.types_compatible(&left_type, &right_type) {
            sink.error(
                codes::INVALID_PIPE,
                format!("pipe stage's return type '{right_type}' is incompatible with input type '{left_type}'"),
                position.0,
                position.1,
            );
        }
        right_type
    }

    fn check_struct_literal(
        &mut self,
        type_name: &str,
        fields: &mut [crate::ast::StructLiteralField],
        position: Position,
        sink: &mut DiagnosticSink,
    ) -> Type {
        let Some(TypeSymbol::Struct(decl)) = self.symbols.types.get(type_name).cloned() else {
            sink.error(
                codes::UNKNOWN_IDENTIFIER,
                format!("unknown struct type '{type_name}'"),
                position.0,
                position.1,
            );
            for field in fields.iter_mut() {
                self.infer_type(&mut field.value, sink);
            }
            return Type::Unknown;
        };

        let mut provided = HashSet::new();
        for field in fields.iter_mut() {
            provided.insert(field.name.clone());
            let value_type = self.infer_type(&mut field.value, sink);
            match decl.fields.iter().find(|(name, _)| name == &field.name) {
                Some((_, declared_type)) => {
                    if !self.types_compatible(declared_type, &value_type) {
                        sink.error(
                            codes::TYPE_MISMATCH,
                            format!("field '{}' expects '{declared_type}', found '{value_type}'", field.name),
                            position.0,
                            position.1,
                        );
                    }
                }
                None => sink.error(
                    codes::UNKNOWN_FIELD,
                    format!("unknown field '{}' on '{type_name}'", field.name),
                    position.0,
                    position.1,
                ),
            }
        }
        for (field_name, _) in &decl.fields {
            if !provided.contains(field_name) {
                sink.error(
                    codes::MISSING_FIELD,
                    format!("missing field '{field_name}' in literal for '{type_name}'"),
                    position.0,
                    position.1,
                );
            }
        }
        Type::named(type_name.to_string())
    }

    fn types_compatible(&self, declared: &Type, actual: &Type) -> bool {
        if declared.is_unknown() || actual.is_unknown() || declared.is_any() {
            return true;
        }
        if declared == actual {
            return true;
        }
        match (declared, actual) {
            (Type::Nullable(inner), Type::Nullable(other)) => self.types_compatible(inner, other),
            (Type::Nullable(inner), other) => self.types_compatible(inner, other),
            (Type::Array(a), Type::Array(b)) => self.types_compatible(a, b),
            (Type::Map(ak, av), Type::Map(bk, bv)) => self.types_compatible(ak, bk) && self.types_compatible(av, bv),
            (Type::Tuple(a), Type::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.types_compatible(x, y))
            }
            _ => false,
        }
    }

    // -----------------------------------------------------------------
    // Transpilation readiness gate
    // -----------------------------------------------------------------

    fn readiness_pass(&self, statements: &[Statement], sink: &mut DiagnosticSink) {
        for statement in statements {
            self.readiness_statement(statement, sink);
        }
    }

    fn readiness_statement(&self, statement: &Statement, sink: &mut DiagnosticSink) {
        match statement {
            Statement::VariableDeclaration { value, .. } | Statement::ExpressionStatement { expression: value, .. } => {
                self.readiness_expr(value, false, sink)
            }
            Statement::TupleVariableDeclaration { value, .. } => self.readiness_expr(value, false, sink),
            Statement::Assignment { target, value, .. } => {
                self.readiness_expr(target, false, sink);
                self.readiness_expr(value, false, sink);
            }
            Statement::FunctionDeclaration { body, .. } => self.readiness_pass(body, sink),
            Statement::ImplBlock(block) => {
                for method in &block.methods {
                    self.readiness_pass(&method.body, sink);
                }
            }
            Statement::IfStatement { condition, then_block, elif_blocks, else_block, .. } => {
                self.readiness_expr(condition, false, sink);
                self.readiness_pass(then_block, sink);
                for (elif_condition, elif_body) in elif_blocks {
                    self.readiness_expr(elif_condition, false, sink);
                    self.readiness_pass(elif_body, sink);
                }
                if let Some(else_body) = else_block {
                    self.readiness_pass(else_body, sink);
                }
            }
            Statement::ForLoop { iterable, body, .. } => {
                self.readiness_expr(iterable, true, sink);
                self.readiness_pass(body, sink);
            }
            Statement::WhileLoop { condition, body, .. } => {
                self.readiness_expr(condition, false, sink);
                self.readiness_pass(body, sink);
            }
            Statement::TryStatement { try_block, catch_block, .. } => {
                self.readiness_pass(try_block, sink);
                self.readiness_pass(catch_block, sink);
            }
            Statement::ThrowStatement { value, .. } => self.readiness_expr(value, false, sink),
            Statement::ImportStatement(import) => sink.error(
                codes::UNSUPPORTED_CONSTRUCT,
                "import survived past the module loader".to_string(),
                import.position.0,
                import.position.1,
            ),
            Statement::ReturnStatement { value, .. } => {
                if let Some(inner) = value {
                    self.readiness_expr(inner, false, sink);
                }
            }
            Statement::ShStatement { .. }
            | Statement::StructDeclaration(_)
            | Statement::EnumDeclaration(_)
            | Statement::BreakStatement { .. }
            | Statement::ContinueStatement { .. } => {}
        }
    }

    fn readiness_expr(&self, expr: &Expression, allow_range: bool, sink: &mut DiagnosticSink) {
        match expr {
            Expression::Range { start, end, position } => {
                if !allow_range {
                    sink.error(
                        codes::UNSUPPORTED_CONSTRUCT,
                        "range expression used outside a 'for' iterable slot".to_string(),
                        position.0,
                        position.1,
                    );
                }
                self.readiness_expr(start, false, sink);
                self.readiness_expr(end, false, sink);
            }
            Expression::MapLiteral { entries, position } => {
                sink.error(
                    codes::UNSUPPORTED_CONSTRUCT,
                    "map literal used as a value is not supported by codegen".to_string(),
                    position.0,
                    position.1,
                );
                for entry in entries {
                    self.readiness_expr(&entry.key, false, sink);
                    self.readiness_expr(&entry.value, false, sink);
                }
            }
            Expression::Await { value, position } => {
                sink.error(
                    codes::UNSUPPORTED_CONSTRUCT,
                    "'await' is not supported by codegen".to_string(),
                    position.0,
                    position.1,
                );
                self.readiness_expr(value, false, sink);
            }
            Expression::Command { kind, is_async, args, position } => {
                if *is_async && !matches!(kind, CommandKind::Exec | CommandKind::Spawn) {
                    sink.error(
                        codes::UNSUPPORTED_CONSTRUCT,
                        "async command kind must be 'exec' or 'spawn'".to_string(),
                        position.0,
                        position.1,
                    );
                }
                for arg in args {
                    self.readiness_expr(arg, false, sink);
                }
            }
            Expression::Binary { left, right, .. } | Expression::Pipe { left, right, .. } | Expression::NullCoalesce { left, right, .. } => {
                self.readiness_expr(left, false, sink);
                self.readiness_expr(right, false, sink);
            }
            Expression::Unary { operand, .. } => self.readiness_expr(operand, false, sink),
            Expression::Cast { value, .. } => self.readiness_expr(value, false, sink),
            Expression::FunctionCall { args, .. } => {
                for arg in args {
                    self.readiness_expr(arg, false, sink);
                }
            }
            Expression::MethodCall { object, args, .. } => {
                self.readiness_expr(object, false, sink);
                for arg in args {
                    self.readiness_expr(arg, false, sink);
                }
            }
            Expression::MemberAccess { object, .. } | Expression::SafeNavigation { object, .. } => {
                self.readiness_expr(object, false, sink)
            }
            Expression::IndexAccess { object, index, .. } => {
                self.readiness_expr(object, false, sink);
                self.readiness_expr(index, false, sink);
            }
            Expression::ArrayLiteral { elements, .. } | Expression::TupleExpression { elements, .. } => {
                for element in elements {
                    self.readiness_expr(element, false, sink);
                }
            }
            Expression::StructLiteral { fields, .. } => {
                for field in fields {
                    self.readiness_expr(&field.value, false, sink);
                }
            }
            _ => {}
        }
    }
}

/// Allowed casts (spec §4.4, "Cast"): same type; primitive↔primitive except
/// `Void`; non-`Unknown`→`String`; `Any`→any non-`Void` primitive;
/// named→`String`.
fn can_cast(from: &Type, to: &Type) -> bool {
    if from == to {
        return true;
    }
    let from_primitive_non_void = matches!(from, Type::Primitive(kind) if *kind != PrimitiveKind::Void);
    let to_primitive_non_void = matches!(to, Type::Primitive(kind) if *kind != PrimitiveKind::Void);
    if from_primitive_non_void && to_primitive_non_void {
        return true;
    }
    if !from.is_unknown() && matches!(to, Type::Primitive(PrimitiveKind::String)) {
        return true;
    }
    if from.is_any() && to_primitive_non_void {
        return true;
    }
    false
}

/// Detects an `x != null` / `x == null` (or reversed) guard. Returns the
/// narrowed variable name and whether the *then* branch is the narrowed one.
fn narrow_guard(condition: &Expression) -> Option<(String, bool)> {
    let Expression::Binary { op, left, right, .. } = condition else {
        return None;
    };
    if !matches!(op, BinaryOp::Eq | BinaryOp::Neq) {
        return None;
    }
    let ident = |e: &Expression| match e {
        Expression::Identifier { name, .. } => Some(name.clone()),
        _ => None,
    };
    let is_null = |e: &Expression| matches!(e, Expression::NullLiteral { .. });

    if let Some(name) = ident(left) {
        if is_null(right) {
            return Some((name, *op == BinaryOp::Neq));
        }
    }
    if let Some(name) = ident(right) {
        if is_null(left) {
            return Some((name, *op == BinaryOp::Neq));
        }
    }
    None
}

/// Flags `${a.b}`-style interpolation inside a raw `sh` block: it looks
/// like it should reach into a brash value but `sh` text is passed through
/// verbatim to the shell, so it never will.
fn check_suspicious_interpolation(script: &str, position: Position, sink: &mut DiagnosticSink) {
    let bytes = script.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            if let Some(end) = script[i + 2..].find('}') {
                let inner = &script[i + 2..i + 2 + end];
                if inner.contains('.') {
                    sink.warning(
                        codes::SUSPICIOUS_SH_INTERPOLATION,
                        format!("'${{{inner}}}' looks like field access inside a raw 'sh' block"),
                        position.0,
                        position.1,
                    );
                }
                i += 2 + end;
                continue;
            }
        }
        i += 1;
    }
}
