//! Static types.

use std::fmt;

/// Static type of an IR value.
///
/// Pointers are typed: the pointee shape is part of the type, which is
/// what lets consumers classify `i32*` differently from `double*`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value (function results only).
    Void,
    /// Integer of the given bit width (`i1`, `i8`, `i32`, ...).
    Int(u32),
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// Pointer to a value of the inner type.
    Ptr(Box<Type>),
    /// Fixed-length array `[N x T]`.
    Array(u64, Box<Type>),
    /// SIMD vector `<N x T>`.
    Vector(u32, Box<Type>),
    /// Literal struct `{ T, ... }`.
    Struct(Vec<Type>),
}

impl Type {
    /// `i1`, the result type of comparisons.
    pub const I1: Self = Self::Int(1);
    /// `i8`.
    pub const I8: Self = Self::Int(8);
    /// `i32`.
    pub const I32: Self = Self::Int(32);
    /// `i64`.
    pub const I64: Self = Self::Int(64);

    /// Pointer to `self`.
    #[must_use]
    pub fn ptr_to(self) -> Self {
        Self::Ptr(Box::new(self))
    }

    /// `i8*`, the type of string literal operands.
    #[must_use]
    pub fn c_str() -> Self {
        Self::I8.ptr_to()
    }

    /// Pointee type, if this is a pointer.
    pub fn pointee(&self) -> Option<&Self> {
        match self {
            Self::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    /// Integer bit width, if this is an integer.
    pub const fn int_width(&self) -> Option<u32> {
        match self {
            Self::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    pub const fn is_ptr(&self) -> bool {
        matches!(self, Self::Ptr(_))
    }

    pub const fn is_struct(&self) -> bool {
        matches!(self, Self::Struct(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Int(bits) => write!(f, "i{bits}"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Ptr(inner) => write!(f, "{inner}*"),
            Self::Array(len, elem) => write!(f, "[{len} x {elem}]"),
            Self::Vector(len, elem) => write!(f, "<{len} x {elem}>"),
            Self::Struct(fields) => {
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, " }}")
            }
        }
    }
}
