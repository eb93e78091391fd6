//! Block terminator IR.

use std::fmt;

use crate::operand::{Operand, Typed};

/// Block terminator - controls where execution goes next.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Terminator {
    /// Return from the function, optionally with a value.
    Ret { value: Option<Typed> },
    /// Unconditional branch.
    Br { target: String },
    /// Conditional branch on an `i1` operand.
    CondBr {
        cond: Operand,
        then_label: String,
        else_label: String,
    },
    /// Control never reaches the end of the block.
    #[default]
    Unreachable,
}

impl Terminator {
    /// Create a `ret void` terminator.
    pub const fn ret_void() -> Self {
        Self::Ret { value: None }
    }

    /// Create a value-returning terminator.
    pub const fn ret(value: Typed) -> Self {
        Self::Ret { value: Some(value) }
    }

    /// Create an unconditional branch.
    pub fn br(target: impl Into<String>) -> Self {
        Self::Br {
            target: target.into(),
        }
    }

    /// Create a conditional branch.
    pub fn cond_br(cond: Operand, then_label: impl Into<String>, else_label: impl Into<String>) -> Self {
        Self::CondBr {
            cond,
            then_label: then_label.into(),
            else_label: else_label.into(),
        }
    }

    /// Check if this terminator returns from the function.
    pub const fn is_ret(&self) -> bool {
        matches!(self, Self::Ret { .. })
    }

    /// Returned operand, if this is a value-returning `ret`.
    pub const fn ret_value(&self) -> Option<&Typed> {
        match self {
            Self::Ret { value } => value.as_ref(),
            _ => None,
        }
    }

    /// Successor block labels.
    pub fn successors(&self) -> Vec<&str> {
        match self {
            Self::Br { target } => vec![target.as_str()],
            Self::CondBr {
                then_label,
                else_label,
                ..
            } => vec![then_label.as_str(), else_label.as_str()],
            Self::Ret { .. } | Self::Unreachable => Vec::new(),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ret { value: None } => write!(f, "ret void"),
            Self::Ret { value: Some(value) } => write!(f, "ret {value}"),
            Self::Br { target } => write!(f, "br label %{target}"),
            Self::CondBr {
                cond,
                then_label,
                else_label,
            } => write!(f, "br i1 {cond}, label %{then_label}, label %{else_label}"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}
