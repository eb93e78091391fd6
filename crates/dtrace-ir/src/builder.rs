//! Function builder fluent API.

use crate::block::Block;
use crate::instr::{BinaryOp, CastOp, CmpPred, Instr, InstrKind};
use crate::module::{Function, Param};
use crate::operand::{Operand, Typed};
use crate::terminator::Terminator;
use crate::types::Type;

/// Builder for function IR.
///
/// Instructions are appended to the most recently opened block.
pub struct FunctionBuilder {
    name: String,
    ret: Type,
    params: Vec<Param>,
    variadic: bool,
    blocks: Vec<Block>,
}

impl FunctionBuilder {
    /// Create a new builder for `ret @name(...)`.
    pub fn new(name: impl Into<String>, ret: Type) -> Self {
        Self {
            name: name.into(),
            ret,
            params: Vec::new(),
            variadic: false,
            blocks: Vec::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn param(mut self, name: &str, ty: Type) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    /// Mark the function variadic.
    #[must_use]
    pub const fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Open a new block; following instructions go into it.
    #[must_use]
    pub fn block(mut self, label: &str) -> Self {
        self.blocks.push(Block::new(label));
        self
    }

    /// Append an arbitrary instruction.
    #[must_use]
    pub fn instr(mut self, instr: Instr) -> Self {
        self.current().push(instr);
        self
    }

    /// `%result = alloca ty`.
    #[must_use]
    pub fn alloca(self, result: &str, ty: Type) -> Self {
        self.instr(Instr::with_result(result, InstrKind::Alloca { ty }))
    }

    /// `store ty value, ty* ptr`.
    #[must_use]
    pub fn store(self, ty: Type, value: Operand, ptr: &str) -> Self {
        let ptr = Typed::new(ty.clone().ptr_to(), Operand::local(ptr));
        self.instr(Instr::new(InstrKind::Store {
            value: Typed::new(ty, value),
            ptr,
        }))
    }

    /// `%result = load ty, ty* ptr`.
    #[must_use]
    pub fn load(self, result: &str, ty: Type, ptr: &str) -> Self {
        let ptr = Typed::new(ty.clone().ptr_to(), Operand::local(ptr));
        self.instr(Instr::with_result(result, InstrKind::Load { ty, ptr }))
    }

    /// `%result = op ty lhs, rhs`.
    #[must_use]
    pub fn binary(self, result: &str, op: BinaryOp, ty: Type, lhs: Operand, rhs: Operand) -> Self {
        self.instr(Instr::with_result(
            result,
            InstrKind::Binary { op, ty, lhs, rhs },
        ))
    }

    /// `%result = icmp pred ty lhs, rhs`.
    #[must_use]
    pub fn icmp(self, result: &str, pred: CmpPred, ty: Type, lhs: Operand, rhs: Operand) -> Self {
        self.instr(Instr::with_result(
            result,
            InstrKind::ICmp { pred, ty, lhs, rhs },
        ))
    }

    /// `%result = op value to ty`.
    #[must_use]
    pub fn cast(self, result: &str, op: CastOp, value: Typed, to: Type) -> Self {
        self.instr(Instr::with_result(result, InstrKind::Cast { op, value, to }))
    }

    /// `[%result =] call ret @callee(args)`.
    #[must_use]
    pub fn call(self, result: Option<&str>, callee: &str, ret: Type, args: Vec<Typed>) -> Self {
        let kind = InstrKind::Call {
            callee: callee.to_string(),
            ret,
            args,
        };
        let instr = match result {
            Some(result) => Instr::with_result(result, kind),
            None => Instr::new(kind),
        };
        self.instr(instr)
    }

    /// Terminate the current block.
    #[must_use]
    pub fn terminate(mut self, terminator: Terminator) -> Self {
        self.current().terminator = terminator;
        self
    }

    /// `ret ty value`.
    #[must_use]
    pub fn ret(self, ty: Type, value: Operand) -> Self {
        self.terminate(Terminator::ret(Typed::new(ty, value)))
    }

    /// `ret void`.
    #[must_use]
    pub fn ret_void(self) -> Self {
        self.terminate(Terminator::ret_void())
    }

    /// Build the function.
    pub fn build(self) -> Function {
        Function {
            name: self.name,
            ret: self.ret,
            params: self.params,
            variadic: self.variadic,
            blocks: self.blocks,
        }
    }

    fn current(&mut self) -> &mut Block {
        if self.blocks.is_empty() {
            self.blocks.push(Block::new("entry"));
        }
        let last = self.blocks.len() - 1;
        &mut self.blocks[last]
    }
}
