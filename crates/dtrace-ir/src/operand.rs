//! Instruction operands.

use std::fmt;

use crate::types::Type;

/// An operand referenced by an instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Function parameter or instruction result (`%name`).
    Local(String),
    /// Module-level global (`@name`).
    Global(String),
    /// Integer constant.
    ConstInt(i64),
    /// Floating-point constant.
    ConstFloat(f64),
}

impl Operand {
    pub fn local(name: impl Into<String>) -> Self {
        Self::Local(name.into())
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self::Global(name.into())
    }

    /// Name of the local this operand refers to, if any.
    pub fn as_local(&self) -> Option<&str> {
        match self {
            Self::Local(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(name) => write!(f, "%{name}"),
            Self::Global(name) => write!(f, "@{name}"),
            Self::ConstInt(value) => write!(f, "{value}"),
            Self::ConstFloat(value) => {
                if value.is_nan() {
                    write!(f, "nan")
                } else if value.is_infinite() {
                    write!(f, "{}", if *value > 0.0 { "inf" } else { "-inf" })
                } else {
                    // Keep a decimal point so the reader sees a float.
                    write!(f, "{value:?}")
                }
            }
        }
    }
}

/// Operand paired with its static type, as it appears in call arguments,
/// stores and returns.
#[derive(Clone, Debug, PartialEq)]
pub struct Typed {
    pub ty: Type,
    pub value: Operand,
}

impl Typed {
    pub const fn new(ty: Type, value: Operand) -> Self {
        Self { ty, value }
    }

    /// `i32 <value>`.
    pub const fn i32(value: i64) -> Self {
        Self::new(Type::I32, Operand::ConstInt(value))
    }
}

impl fmt::Display for Typed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.value)
    }
}
