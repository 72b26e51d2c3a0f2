//! Symbol table (spec §4.4, "Symbol table"): a stack of lexical scopes for
//! variables, flat namespaces for functions, types, and methods-per-type.
use std::collections::HashMap;

use crate::ast::{EnumDeclaration, StructDeclaration, Type};

#[derive(Debug, Clone)]
pub struct VariableSymbol {
    pub type_: Type,
    pub is_mutable: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub param_types: Vec<Type>,
    pub return_type: Type,
    pub is_async: bool,
    pub is_builtin: bool,
    /// `print` is the only variadic builtin; arity isn't checked for it.
    pub is_variadic: bool,
}

#[derive(Debug, Clone)]
pub enum TypeSymbol {
    Struct(StructDeclaration),
    Enum(EnumDeclaration),
}

#[derive(Debug, Clone)]
pub struct MethodSymbol {
    pub param_types: Vec<Type>,
    pub return_type: Type,
    pub is_static: bool,
}

/// Lexical variable scopes plus the flat function/type/method namespaces.
/// Re-created once per compilation (spec §9, "Global state").
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, VariableSymbol>>,
    pub functions: HashMap<String, FunctionSymbol>,
    pub types: HashMap<String, TypeSymbol>,
    pub methods: HashMap<(String, String), MethodSymbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            scopes: vec![HashMap::new()],
            ..Default::default()
        };
        table.register_builtins();
        table
    }

    fn register_builtins(&mut self) {
        self.functions.insert(
            "panic".to_string(),
            FunctionSymbol {
                param_types: vec![Type::string()],
                return_type: Type::void(),
                is_async: false,
                is_builtin: true,
                is_variadic: false,
            },
        );
        self.functions.insert(
            "bash".to_string(),
            FunctionSymbol {
                param_types: vec![Type::string()],
                return_type: Type::void(),
                is_async: false,
                is_builtin: true,
                is_variadic: false,
            },
        );
        self.functions.insert(
            "print".to_string(),
            FunctionSymbol {
                param_types: vec![],
                return_type: Type::void(),
                is_async: false,
                is_builtin: true,
                is_variadic: true,
            },
        );
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Returns `false` if `name` is already declared in the innermost scope.
    pub fn declare_variable(&mut self, name: &str, type_: Type, is_mutable: bool) -> bool {
        let scope = self.scopes.last_mut().expect("at least one scope is always active");
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), VariableSymbol { type_, is_mutable });
        true
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&VariableSymbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Widen/narrow a variable's recorded type within the current (and
    /// enclosing) scopes — used by the nullability tracker after a
    /// null-check guard.
    pub fn narrow_variable(&mut self, name: &str, type_: Type) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(symbol) = scope.get_mut(name) {
                symbol.type_ = type_;
                return;
            }
        }
    }
}
