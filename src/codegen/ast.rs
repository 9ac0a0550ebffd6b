//! Target AST
//!
//! Pure data model of the emitted Go source: packages, named
//! declarations, structural types and field constraints. References
//! between declarations go through [`GoType::Named`] handles resolved
//! against the owning [`Package`]'s name table, never through parent
//! pointers, so recursive schemas cannot create ownership cycles.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde_json::Value;

/// Go primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Bytes,
}

impl Primitive {
    pub fn go_name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Bytes => "[]byte",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int
                | Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
        )
    }

    pub fn is_number(&self) -> bool {
        self.is_integer() || matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Structural type of a field or element
#[derive(Debug, Clone, PartialEq)]
pub enum GoType {
    /// Handle into the package name table
    Named(String),
    Primitive(Primitive),
    Array(Box<GoType>),
    Map(Box<GoType>, Box<GoType>),
    Pointer(Box<GoType>),
    /// `interface{}`
    Any,
    /// `time.Duration`
    Duration,
    /// `time.Time`, RFC 3339 date-time
    DateTime,
    /// `time.Time`, date portion only
    Date,
    /// `time.Time`, time-of-day portion only
    Time,
    /// `struct{}`, matches nothing
    Empty,
}

impl GoType {
    pub fn pointer(inner: GoType) -> GoType {
        match inner {
            already @ GoType::Pointer(_) => already,
            other => GoType::Pointer(Box::new(other)),
        }
    }

    pub fn array(elem: GoType) -> GoType {
        GoType::Array(Box::new(elem))
    }

    pub fn string_map(value: GoType) -> GoType {
        GoType::Map(Box::new(GoType::Primitive(Primitive::String)), Box::new(value))
    }

    /// Go source spelling of the type
    pub fn go_string(&self) -> String {
        match self {
            GoType::Named(name) => name.clone(),
            GoType::Primitive(p) => p.go_name().to_string(),
            GoType::Array(elem) => format!("[]{}", elem.go_string()),
            GoType::Map(key, value) => {
                format!("map[{}]{}", key.go_string(), value.go_string())
            }
            GoType::Pointer(elem) => format!("*{}", elem.go_string()),
            GoType::Any => "interface{}".to_string(),
            GoType::Duration => "time.Duration".to_string(),
            GoType::DateTime | GoType::Date | GoType::Time => "time.Time".to_string(),
            GoType::Empty => "struct{}".to_string(),
        }
    }

    /// Record the stdlib imports this type's spelling requires
    pub fn collect_imports(&self, out: &mut BTreeSet<String>) {
        match self {
            GoType::Duration | GoType::DateTime | GoType::Date | GoType::Time => {
                out.insert("time".to_string());
            }
            GoType::Array(elem) | GoType::Pointer(elem) => elem.collect_imports(out),
            GoType::Map(key, value) => {
                key.collect_imports(out);
                value.collect_imports(out);
            }
            _ => {}
        }
    }

    /// The zero-value expression decoders reset to
    pub fn zero_expr(&self) -> String {
        match self {
            GoType::Named(name) => format!("{name}{{}}"),
            GoType::Primitive(Primitive::Bool) => "false".to_string(),
            GoType::Primitive(Primitive::String) => "\"\"".to_string(),
            GoType::Primitive(p) if p.is_number() => "0".to_string(),
            GoType::Primitive(Primitive::Bytes) => "nil".to_string(),
            GoType::Primitive(_) => "0".to_string(),
            GoType::Array(_) | GoType::Map(_, _) | GoType::Pointer(_) | GoType::Any => {
                "nil".to_string()
            }
            GoType::Duration => "0".to_string(),
            GoType::DateTime | GoType::Date | GoType::Time => "time.Time{}".to_string(),
            GoType::Empty => "struct{}{}".to_string(),
        }
    }

    /// Maps, arrays and interfaces already have a usable absent state and
    /// are never wrapped in a pointer for optionality.
    pub fn has_zero_absent_state(&self) -> bool {
        matches!(
            self,
            GoType::Array(_) | GoType::Map(_, _) | GoType::Pointer(_) | GoType::Any | GoType::Empty
        )
    }
}

/// Validation constraints attached to a field or alias
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Constraints {
    pub pattern: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub const_value: Option<Value>,
    pub format: Option<String>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.minimum.is_none()
            && self.maximum.is_none()
            && self.exclusive_minimum.is_none()
            && self.exclusive_maximum.is_none()
            && self.min_items.is_none()
            && self.max_items.is_none()
            && self.const_value.is_none()
    }
}

/// One struct field
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    /// Go field name, unique within the struct
    pub name: String,
    /// Property name in the wire format
    pub json_name: String,
    pub ty: GoType,
    pub required: bool,
    pub default: Option<Value>,
    pub comment: Option<String>,
    pub constraints: Constraints,
    /// The additional-properties catch-all; at most one per struct
    pub catch_all: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructType {
    pub fields: Vec<StructField>,
    /// Set when `additionalProperties: false`; unknown keys fail decoding
    pub strict_additional: bool,
}

impl StructType {
    pub fn catch_all(&self) -> Option<&StructField> {
        self.fields.iter().find(|f| f.catch_all)
    }

    /// True when additional properties must be rejected on decode
    pub fn deny_additional(&self) -> bool {
        self.catch_all().is_none() && self.strict_additional
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub base: GoType,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionVariant {
    /// Go field name holding this variant
    pub name: String,
    pub ty: GoType,
    /// Discriminator constant selecting this variant, when discriminated
    pub tag: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    pub variants: Vec<UnionVariant>,
    /// Property name decoding dispatches on, when discriminated
    pub discriminator: Option<String>,
}

/// Body of a named declaration
#[derive(Debug, Clone, PartialEq)]
pub enum TypeBody {
    Struct(StructType),
    Alias(GoType, Constraints),
    Enum(EnumType),
    Union(UnionType),
    /// Forward declaration inserted while the node is being synthesized.
    /// Must be replaced before emission; one surviving is a generator bug.
    Placeholder,
}

/// A top-level named declaration
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub comment: Option<String>,
    pub body: TypeBody,
}

/// A named output unit: one emitted file
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub file: PathBuf,
    decls: Vec<TypeDecl>,
}

impl Package {
    pub fn new(name: impl Into<String>, file: PathBuf) -> Self {
        Self {
            name: name.into(),
            file,
            decls: Vec::new(),
        }
    }

    /// Append a declaration; insertion order is emission order.
    pub fn push(&mut self, decl: TypeDecl) {
        self.decls.push(decl);
    }

    /// Replace the body of a forward declaration in place.
    pub fn complete(&mut self, name: &str, comment: Option<String>, body: TypeBody) -> bool {
        for decl in &mut self.decls {
            if decl.name == name {
                decl.body = body;
                decl.comment = comment;
                return true;
            }
        }
        false
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.decls.iter().find(|d| d.name == name)
    }

    pub fn decls(&self) -> &[TypeDecl] {
        &self.decls
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Names of declarations still in placeholder state
    pub fn incomplete(&self) -> Vec<&str> {
        self.decls
            .iter()
            .filter(|d| matches!(d.body, TypeBody::Placeholder))
            .map(|d| d.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_type_spelling() {
        let ty = GoType::array(GoType::pointer(GoType::Named("Node".to_string())));
        assert_eq!(ty.go_string(), "[]*Node");

        let map = GoType::string_map(GoType::Any);
        assert_eq!(map.go_string(), "map[string]interface{}");
    }

    #[test]
    fn pointer_never_double_wraps() {
        let once = GoType::pointer(GoType::Primitive(Primitive::Int));
        let twice = GoType::pointer(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn time_types_need_the_time_import() {
        let mut imports = BTreeSet::new();
        GoType::array(GoType::DateTime).collect_imports(&mut imports);
        assert!(imports.contains("time"));
    }

    #[test]
    fn package_completes_placeholders_in_place() {
        let mut pkg = Package::new("models", PathBuf::from("models.go"));
        pkg.push(TypeDecl {
            name: "Node".to_string(),
            comment: None,
            body: TypeBody::Placeholder,
        });
        assert_eq!(pkg.incomplete(), vec!["Node"]);
        assert!(pkg.complete("Node", None, TypeBody::Struct(StructType::default())));
        assert!(pkg.incomplete().is_empty());
    }
}
