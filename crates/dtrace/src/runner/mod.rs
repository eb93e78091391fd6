//! IR interpreter.
//!
//! Executes functions of a module directly. Calls to the entry/exit hooks
//! are decoded and written through a `TraceWriter`, so an instrumented
//! module produces the same trace a natively compiled one would.

mod hooks;
mod value;

use std::cell::Cell;

use dtrace_ir::{
    BinaryOp, CastOp, Constant, Function, Instr, InstrKind, Module, Operand, Terminator, Type,
    Typed,
};
use dtrace_rt::TraceWriter;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

pub use hooks::{HookCall, HookNames, decode as decode_hook};
pub use value::RtValue;

use value::{mismatch, round_f32, truncate};

use crate::{Error, Result};

/// Interpreter limits and hook symbols.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub hooks: HookNames,
    /// Maximum nested call depth.
    pub max_depth: usize,
    /// Maximum executed instructions per `call`, terminators included.
    pub max_steps: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            hooks: HookNames::default(),
            max_depth: 512,
            max_steps: 10_000_000,
        }
    }
}

/// Locals and stack slots of one activation.
#[derive(Default)]
struct Frame {
    locals: FxHashMap<String, RtValue>,
    slots: Vec<RtValue>,
}

impl Frame {
    fn slot_mut(&mut self, idx: usize) -> Result<&mut RtValue> {
        self.slots
            .get_mut(idx)
            .ok_or_else(|| Error::UnknownValue(format!("slot#{idx}")))
    }
}

/// Interpreter over one module.
pub struct Runner<'a> {
    module: &'a Module,
    writer: &'a TraceWriter,
    config: RunConfig,
    steps: Cell<u64>,
}

impl<'a> Runner<'a> {
    pub fn new(module: &'a Module, writer: &'a TraceWriter) -> Self {
        Self::with_config(module, writer, RunConfig::default())
    }

    pub fn with_config(module: &'a Module, writer: &'a TraceWriter, config: RunConfig) -> Self {
        Self {
            module,
            writer,
            config,
            steps: Cell::new(0),
        }
    }

    /// Instructions executed by the last `call`.
    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    /// Call a defined function with already-typed arguments.
    pub fn call(&self, name: &str, args: Vec<RtValue>) -> Result<RtValue> {
        self.steps.set(0);
        let func = self.defined(name)?;
        debug!(function = name, args = args.len(), "interpreting");
        self.exec(func, args, 0)
    }

    /// Call a defined function, parsing each argument from text according to
    /// the declared parameter type.
    pub fn call_with_literals(&self, name: &str, literals: &[String]) -> Result<RtValue> {
        let func = self.defined(name)?;
        check_arity(func, literals.len())?;
        let args = func
            .params
            .iter()
            .zip(literals)
            .map(|(param, text)| RtValue::parse(text, &param.ty))
            .collect::<Result<Vec<_>>>()?;
        self.call(name, args)
    }

    fn defined(&self, name: &str) -> Result<&'a Function> {
        match self.module.function(name) {
            Some(func) if !func.is_declaration() => Ok(func),
            Some(_) => Err(Error::UnsupportedExtern(name.to_string())),
            None => Err(Error::UnknownFunction(name.to_string())),
        }
    }

    fn tick(&self) -> Result<()> {
        let steps = self.steps.get() + 1;
        if steps > self.config.max_steps {
            return Err(Error::StepLimit(self.config.max_steps));
        }
        self.steps.set(steps);
        Ok(())
    }

    fn exec(&self, func: &'a Function, args: Vec<RtValue>, depth: usize) -> Result<RtValue> {
        if depth >= self.config.max_depth {
            return Err(Error::StackOverflow(self.config.max_depth));
        }
        check_arity(func, args.len())?;

        let mut frame = Frame::default();
        for (param, arg) in func.params.iter().zip(args) {
            frame.locals.insert(param.name.clone(), arg);
        }

        let mut block = func
            .blocks
            .first()
            .ok_or_else(|| Error::UnsupportedExtern(func.name.clone()))?;
        loop {
            for instr in &block.instructions {
                self.tick()?;
                self.step(&mut frame, instr, depth)?;
            }
            self.tick()?;
            let target = match &block.terminator {
                Terminator::Ret { value } => {
                    return value
                        .as_ref()
                        .map_or(Ok(RtValue::Void), |v| self.eval_typed(&frame, v));
                }
                Terminator::Br { target } => target,
                Terminator::CondBr {
                    cond,
                    then_label,
                    else_label,
                } => {
                    if self.eval(&frame, cond, &Type::I1)?.as_int()? != 0 {
                        then_label
                    } else {
                        else_label
                    }
                }
                Terminator::Unreachable => return Err(Error::Unreachable(func.name.clone())),
            };
            block = func.block(target).ok_or_else(|| Error::UnknownBlock {
                function: func.name.clone(),
                label: target.clone(),
            })?;
        }
    }

    fn step(&self, frame: &mut Frame, instr: &Instr, depth: usize) -> Result<()> {
        let result = match &instr.kind {
            InstrKind::Alloca { ty } => {
                frame.slots.push(RtValue::zero(ty));
                RtValue::Slot(frame.slots.len() - 1)
            }
            InstrKind::Load { ptr, .. } => {
                let idx = self.eval_typed(frame, ptr)?.as_slot()?;
                frame.slot_mut(idx)?.clone()
            }
            InstrKind::Store { value, ptr } => {
                let value = self.eval_typed(frame, value)?;
                let idx = self.eval_typed(frame, ptr)?.as_slot()?;
                *frame.slot_mut(idx)? = value;
                RtValue::Void
            }
            InstrKind::Binary { op, ty, lhs, rhs } => {
                let lhs = self.eval(frame, lhs, ty)?;
                let rhs = self.eval(frame, rhs, ty)?;
                binary(*op, ty, &lhs, &rhs)?
            }
            InstrKind::ICmp { pred, ty, lhs, rhs } => {
                let lhs = self.eval(frame, lhs, ty)?.as_int()?;
                let rhs = self.eval(frame, rhs, ty)?.as_int()?;
                RtValue::Int(i64::from(pred.eval(lhs, rhs)))
            }
            InstrKind::Cast { op, value, to } => {
                let value = self.eval_typed(frame, value)?;
                match (op, to) {
                    (CastOp::SExt, Type::Int(bits)) => RtValue::Int(truncate(value.as_int()?, *bits)),
                    (CastOp::FPExt, Type::Double) => RtValue::Double(value.as_real()?),
                    _ => {
                        return Err(Error::TypeMismatch {
                            expected: op.mnemonic(),
                            found: to.to_string(),
                        });
                    }
                }
            }
            InstrKind::Call { callee, args, .. } => {
                let args = args
                    .iter()
                    .map(|a| self.eval_typed(frame, a))
                    .collect::<Result<Vec<_>>>()?;
                self.call_inner(callee, args, depth)?
            }
        };
        if let Some(name) = &instr.result {
            frame.locals.insert(name.clone(), result);
        }
        Ok(())
    }

    fn call_inner(&self, callee: &str, args: Vec<RtValue>, depth: usize) -> Result<RtValue> {
        let names = &self.config.hooks;
        if callee == names.entry || callee == names.exit {
            let call = hooks::decode(callee, &args)?;
            trace!(record = call.record, vars = call.vars.len(), "hook");
            if callee == names.entry {
                self.writer.on_entry(call.record, &call.vars);
            } else {
                self.writer.on_exit(call.record, &call.vars);
            }
            return Ok(RtValue::Void);
        }
        if callee == names.fault {
            self.writer.on_fault_injection();
            return Ok(RtValue::Void);
        }
        let func = self.defined(callee)?;
        self.exec(func, args, depth + 1)
    }

    fn eval_typed(&self, frame: &Frame, typed: &Typed) -> Result<RtValue> {
        self.eval(frame, &typed.value, &typed.ty)
    }

    fn eval(&self, frame: &Frame, operand: &Operand, ty: &Type) -> Result<RtValue> {
        match operand {
            Operand::Local(name) => frame
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnknownValue(format!("%{name}"))),
            Operand::Global(name) => {
                let global = self
                    .module
                    .global(name)
                    .ok_or_else(|| Error::UnknownValue(format!("@{name}")))?;
                Ok(match &global.init {
                    Constant::CString(s) => RtValue::Str(s.clone()),
                    Constant::Int(_, v) => RtValue::Int(*v),
                })
            }
            Operand::ConstInt(v) => Ok(match ty {
                Type::Float => RtValue::Float(round_f32(int_to_real(*v))),
                Type::Double => RtValue::Double(int_to_real(*v)),
                Type::Int(bits) => RtValue::Int(truncate(*v, *bits)),
                _ => RtValue::Int(*v),
            }),
            Operand::ConstFloat(v) => match ty {
                Type::Float => Ok(RtValue::Float(round_f32(*v))),
                Type::Double => Ok(RtValue::Double(*v)),
                other => Err(Error::TypeMismatch {
                    expected: "float or double",
                    found: other.to_string(),
                }),
            },
        }
    }
}

fn check_arity(func: &Function, actual: usize) -> Result<()> {
    if actual == func.params.len() {
        return Ok(());
    }
    Err(Error::ArgumentCount {
        function: func.name.clone(),
        expected: func.params.len(),
        actual,
    })
}

#[allow(clippy::cast_precision_loss)]
const fn int_to_real(v: i64) -> f64 {
    v as f64
}

fn binary(op: BinaryOp, ty: &Type, lhs: &RtValue, rhs: &RtValue) -> Result<RtValue> {
    if op.is_float() {
        let (a, b) = (lhs.as_real()?, rhs.as_real()?);
        let v = match op {
            BinaryOp::FAdd => a + b,
            BinaryOp::FSub => a - b,
            BinaryOp::FMul => a * b,
            _ => a / b,
        };
        return match ty {
            Type::Float => Ok(RtValue::Float(round_f32(v))),
            Type::Double => Ok(RtValue::Double(v)),
            _ => Err(mismatch("float or double", lhs)),
        };
    }

    let bits = ty.int_width().ok_or_else(|| mismatch("int", lhs))?;
    let (a, b) = (lhs.as_int()?, rhs.as_int()?);
    let v = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::SDiv if b == 0 => return Err(Error::DivisionByZero),
        BinaryOp::SDiv => a.wrapping_div(b),
        BinaryOp::SRem if b == 0 => return Err(Error::DivisionByZero),
        _ => a.wrapping_rem(b),
    };
    Ok(RtValue::Int(truncate(v, bits)))
}

#[cfg(test)]
mod tests;
