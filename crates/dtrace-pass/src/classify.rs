//! Structural type classification.
//!
//! Maps a static IR type to the tag used in declaration and trace files.
//! Only a closed set of tags is instrumentable; the rest are named so they
//! can be reported, then skipped.

use std::fmt;

use dtrace_ir::{Function, Type};

/// Semantic type tag of a traced value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Int,
    Float,
    Double,
    Char,
    CharPtr,
    IntArray,
    /// `float*`. Named differently from `double[]` on purpose; consumers
    /// match on the exact strings.
    FloatPtr,
    DoubleArray,
    IntPtrPtr,
    FloatPtrPtr,
    DoublePtrPtr,
    StructPtr,
    StructPtrPtr,
    /// Any other pointer.
    Pointer,
    Array,
    Struct,
    Vector,
    Unknown,
}

impl SemanticType {
    /// Tag string written to declaration and trace files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
            Self::CharPtr => "char*",
            Self::IntArray => "int[]",
            Self::FloatPtr => "float*",
            Self::DoubleArray => "double[]",
            Self::IntPtrPtr => "int**",
            Self::FloatPtrPtr => "float**",
            Self::DoublePtrPtr => "double**",
            Self::StructPtr => "struct*",
            Self::StructPtrPtr => "struct**",
            Self::Pointer => "pointer",
            Self::Array => "array",
            Self::Struct => "struct",
            Self::Vector => "vector",
            Self::Unknown => "unknown",
        }
    }

    /// Check if values of this type are traced.
    ///
    /// `char`, `char*`, the double-pointer and struct tags are classified
    /// but never instrumented.
    pub const fn is_instrumentable(self) -> bool {
        matches!(
            self,
            Self::Int | Self::Float | Self::Double | Self::IntArray | Self::DoubleArray
        )
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

const fn is_wide_int(bits: u32) -> bool {
    bits == 32 || bits == 64
}

/// Classify a static type by its shape.
pub fn classify(ty: &Type) -> SemanticType {
    match ty {
        Type::Int(8) => SemanticType::Char,
        // Every other integer width reads as a plain int.
        Type::Int(_) => SemanticType::Int,
        Type::Float => SemanticType::Float,
        Type::Double => SemanticType::Double,
        Type::Ptr(pointee) => classify_pointer(pointee),
        Type::Array(..) => SemanticType::Array,
        Type::Struct(_) => SemanticType::Struct,
        Type::Vector(..) => SemanticType::Vector,
        Type::Void => SemanticType::Unknown,
    }
}

fn classify_pointer(pointee: &Type) -> SemanticType {
    match pointee {
        Type::Int(bits) if is_wide_int(*bits) => SemanticType::IntArray,
        Type::Int(8) => SemanticType::CharPtr,
        Type::Float => SemanticType::FloatPtr,
        Type::Double => SemanticType::DoubleArray,
        Type::Struct(_) => SemanticType::StructPtr,
        Type::Ptr(inner) => match inner.as_ref() {
            Type::Int(bits) if is_wide_int(*bits) => SemanticType::IntPtrPtr,
            Type::Float => SemanticType::FloatPtrPtr,
            Type::Double => SemanticType::DoublePtrPtr,
            Type::Struct(_) => SemanticType::StructPtrPtr,
            _ => SemanticType::Pointer,
        },
        _ => SemanticType::Pointer,
    }
}

/// A function parameter or return value with its semantic type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracedVariable {
    pub name: String,
    pub ty: SemanticType,
}

/// Instrumentable parameters of `func`, in declaration order.
pub fn traced_params(func: &Function) -> Vec<TracedVariable> {
    func.params
        .iter()
        .map(|p| TracedVariable {
            name: p.name.trim().to_string(),
            ty: classify(&p.ty),
        })
        .filter(|v| v.ty.is_instrumentable())
        .collect()
}

/// Semantic type of the return value, if it is instrumentable.
pub fn traced_return(func: &Function) -> Option<SemanticType> {
    Some(classify(&func.ret)).filter(|ty| ty.is_instrumentable())
}
