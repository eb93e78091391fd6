//! Non-terminator instructions.

use std::fmt;

use crate::operand::{Operand, Typed};
use crate::types::Type;

/// Binary arithmetic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinaryOp {
    pub const ALL: [Self; 9] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::SDiv,
        Self::SRem,
        Self::FAdd,
        Self::FSub,
        Self::FMul,
        Self::FDiv,
    ];

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::SDiv => "sdiv",
            Self::SRem => "srem",
            Self::FAdd => "fadd",
            Self::FSub => "fsub",
            Self::FMul => "fmul",
            Self::FDiv => "fdiv",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }

    /// Check if this operator works on floating-point operands.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::FAdd | Self::FSub | Self::FMul | Self::FDiv)
    }
}

/// Integer comparison predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CmpPred {
    pub const ALL: [Self; 6] = [
        Self::Eq,
        Self::Ne,
        Self::Slt,
        Self::Sle,
        Self::Sgt,
        Self::Sge,
    ];

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Slt => "slt",
            Self::Sle => "sle",
            Self::Sgt => "sgt",
            Self::Sge => "sge",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.mnemonic() == s)
    }

    /// Evaluate the predicate on two signed integers.
    pub const fn eval(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Slt => lhs < rhs,
            Self::Sle => lhs <= rhs,
            Self::Sgt => lhs > rhs,
            Self::Sge => lhs >= rhs,
        }
    }
}

/// Widening conversions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastOp {
    /// Sign-extend an integer to a wider integer.
    SExt,
    /// Extend `float` to `double`.
    FPExt,
}

impl CastOp {
    pub const ALL: [Self; 2] = [Self::SExt, Self::FPExt];

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::SExt => "sext",
            Self::FPExt => "fpext",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }
}

/// Instruction kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum InstrKind {
    /// Stack slot allocation (local storage).
    Alloca { ty: Type },
    /// Load from a pointer.
    Load { ty: Type, ptr: Typed },
    /// Store to a pointer.
    Store { value: Typed, ptr: Typed },
    /// Binary arithmetic.
    Binary {
        op: BinaryOp,
        ty: Type,
        lhs: Operand,
        rhs: Operand,
    },
    /// Integer comparison producing `i1`.
    ICmp {
        pred: CmpPred,
        ty: Type,
        lhs: Operand,
        rhs: Operand,
    },
    /// Conversion of `value` to type `to`.
    Cast { op: CastOp, value: Typed, to: Type },
    /// Direct call.
    Call {
        callee: String,
        ret: Type,
        args: Vec<Typed>,
    },
}

/// A single instruction, optionally producing a named result.
#[derive(Clone, Debug, PartialEq)]
pub struct Instr {
    /// Result name (without the `%` sigil).
    pub result: Option<String>,
    pub kind: InstrKind,
}

impl Instr {
    /// Create an instruction with no result.
    pub const fn new(kind: InstrKind) -> Self {
        Self { result: None, kind }
    }

    /// Create an instruction that defines `%result`.
    pub fn with_result(result: impl Into<String>, kind: InstrKind) -> Self {
        Self {
            result: Some(result.into()),
            kind,
        }
    }

    /// Create a call instruction with no result.
    pub fn call(callee: impl Into<String>, ret: Type, args: Vec<Typed>) -> Self {
        Self::new(InstrKind::Call {
            callee: callee.into(),
            ret,
            args,
        })
    }

    /// Check if this is a local-storage declaration.
    pub const fn is_alloca(&self) -> bool {
        matches!(self.kind, InstrKind::Alloca { .. })
    }

    /// Callee name if this is a call.
    pub fn callee(&self) -> Option<&str> {
        match &self.kind {
            InstrKind::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }

    /// Static type of the produced value.
    pub fn result_type(&self) -> Type {
        match &self.kind {
            InstrKind::Alloca { ty } => ty.clone().ptr_to(),
            InstrKind::Load { ty, .. } | InstrKind::Binary { ty, .. } => ty.clone(),
            InstrKind::Store { .. } => Type::Void,
            InstrKind::ICmp { .. } => Type::I1,
            InstrKind::Cast { to, .. } => to.clone(),
            InstrKind::Call { ret, .. } => ret.clone(),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = &self.result {
            write!(f, "%{result} = ")?;
        }
        match &self.kind {
            InstrKind::Alloca { ty } => write!(f, "alloca {ty}"),
            InstrKind::Load { ty, ptr } => write!(f, "load {ty}, {ptr}"),
            InstrKind::Store { value, ptr } => write!(f, "store {value}, {ptr}"),
            InstrKind::Binary { op, ty, lhs, rhs } => {
                write!(f, "{} {ty} {lhs}, {rhs}", op.mnemonic())
            }
            InstrKind::ICmp { pred, ty, lhs, rhs } => {
                write!(f, "icmp {} {ty} {lhs}, {rhs}", pred.mnemonic())
            }
            InstrKind::Cast { op, value, to } => write!(f, "{} {value} to {to}", op.mnemonic()),
            InstrKind::Call { callee, ret, args } => {
                write!(f, "call {ret} @{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
