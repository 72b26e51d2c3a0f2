//! The closed type-variant set (spec §3, "Type system").
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveKind {
    Int,
    Float,
    String,
    Bool,
    Char,
    Void,
    Any,
}

impl Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::String => "string",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Void => "void",
            PrimitiveKind::Any => "any",
        })
    }
}

/// A type in the source language. Equality is structural, matching spec's
/// invariant that two types are equal iff their shapes match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveKind),
    Nullable(Box<Type>),
    Array(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Tuple(Vec<Type>),
    /// References a user struct/enum, or the built-in pseudo-types `Command`/`Process`.
    Named(String),
    /// Sentinel used to suppress cascading errors after a resolution failure.
    Unknown,
}

impl Type {
    pub fn int() -> Self {
        Type::Primitive(PrimitiveKind::Int)
    }
    pub fn float() -> Self {
        Type::Primitive(PrimitiveKind::Float)
    }
    pub fn string() -> Self {
        Type::Primitive(PrimitiveKind::String)
    }
    pub fn bool() -> Self {
        Type::Primitive(PrimitiveKind::Bool)
    }
    pub fn char() -> Self {
        Type::Primitive(PrimitiveKind::Char)
    }
    pub fn void() -> Self {
        Type::Primitive(PrimitiveKind::Void)
    }
    pub fn any() -> Self {
        Type::Primitive(PrimitiveKind::Any)
    }
    pub fn command() -> Self {
        Type::Named("Command".to_string())
    }
    pub fn process() -> Self {
        Type::Named("Process".to_string())
    }
    /// The type of the `null` literal: `NullableType(PrimitiveType(Void))`.
    pub fn null_literal() -> Self {
        Type::Nullable(Box::new(Type::void()))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveKind::Void))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveKind::Any))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Primitive(PrimitiveKind::Int) | Type::Primitive(PrimitiveKind::Float)
        )
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// Strip one level of nullability, if present.
    pub fn non_null(&self) -> Type {
        match self {
            Type::Nullable(inner) => (**inner).clone(),
            other => other.clone(),
        }
    }

    pub fn nullable(self) -> Type {
        match self {
            Type::Nullable(_) => self,
            other => Type::Nullable(Box::new(other)),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Type::Named(name.into())
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Primitive(kind) => write!(f, "{kind}"),
            Type::Nullable(inner) => write!(f, "{inner}?"),
            Type::Array(inner) => write!(f, "{inner}[]"),
            Type::Map(key, value) => write!(f, "map<{key},{value}>"),
            Type::Tuple(elements) => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, ")")
            }
            Type::Named(name) => write!(f, "{name}"),
            Type::Unknown => write!(f, "<unknown>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        assert_eq!(Type::Array(Box::new(Type::int())), Type::Array(Box::new(Type::int())));
        assert_ne!(Type::Array(Box::new(Type::int())), Type::Array(Box::new(Type::float())));
    }

    #[test]
    fn null_literal_is_nullable_void() {
        assert_eq!(Type::null_literal(), Type::Nullable(Box::new(Type::void())));
    }

    #[test]
    fn non_null_strips_one_level() {
        let nullable = Type::Nullable(Box::new(Type::string()));
        assert_eq!(nullable.non_null(), Type::string());
        assert_eq!(Type::string().non_null(), Type::string());
    }
}
