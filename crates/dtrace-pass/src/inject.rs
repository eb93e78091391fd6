//! Hook call injection.
//!
//! Entry and exit hooks take the same variadic argument list:
//!
//! ```text
//! i32 count, i8* "<record name>", (i8* "<var>", i8* "<tag>", <ty> value) x count
//! ```
//!
//! Values are passed at C default-promotion widths: integers are
//! sign-extended to `i64` and `float` is extended to `double`, so the
//! runtime can read every triple from a `va_list` by tag alone. Record
//! names and variable names are interned as internal constant string
//! globals of the module being instrumented.

use dtrace_ir::{CastOp, Function, Instr, InstrKind, Module, Operand, Param, Type, Typed};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::classify::classify;
use crate::filter::TraceFilter;
use crate::naming::{entry_point_name, exit_point_name};

/// Default entry hook symbol.
pub const ENTRY_HOOK: &str = "dtrace_hook_func_begin";
/// Default exit hook symbol.
pub const EXIT_HOOK: &str = "dtrace_hook_func_end";

/// Name of the extra exit-record variable holding the return value.
pub const RETURN_VAR: &str = "return";

/// Prefix of locals holding promoted hook arguments.
const PROMOTED_PREFIX: &str = "dtrace.arg";

/// Inserts entry and exit hook calls into functions.
#[derive(Clone, Debug)]
pub struct Injector {
    entry_hook: String,
    exit_hook: String,
}

impl Default for Injector {
    fn default() -> Self {
        Self::new(ENTRY_HOOK, EXIT_HOOK)
    }
}

/// One (name, tag, value) triple before interning.
#[derive(Clone)]
struct HookVar {
    name: String,
    tag: &'static str,
    value: Typed,
}

/// Fresh local names for one function.
struct Locals {
    used: FxHashSet<String>,
    next: usize,
}

impl Locals {
    fn of(func: &Function) -> Self {
        Self {
            used: func.local_names().map(str::to_string).collect(),
            next: 0,
        }
    }

    fn fresh(&mut self) -> String {
        loop {
            let name = format!("{PROMOTED_PREFIX}{}", self.next);
            self.next += 1;
            if self.used.insert(name.clone()) {
                return name;
            }
        }
    }
}

impl Injector {
    pub fn new(entry_hook: impl Into<String>, exit_hook: impl Into<String>) -> Self {
        Self {
            entry_hook: entry_hook.into(),
            exit_hook: exit_hook.into(),
        }
    }

    /// Check if `func` gets hooks at all.
    pub fn accepts(func: &Function, filter: &dyn TraceFilter) -> bool {
        !func.is_declaration() && filter.should_trace(&func.name)
    }

    /// Insert the entry hook call before the first non-`alloca` instruction
    /// of the entry block.
    ///
    /// Returns `false` if the function was skipped.
    pub fn inject_entry(&self, module: &mut Module, func_index: usize, filter: &dyn TraceFilter) -> bool {
        let Some(func) = module.functions.get(func_index) else {
            return false;
        };
        if !Self::accepts(func, filter) {
            return false;
        }

        let record = entry_point_name(&func.name);
        let vars = param_vars(func);
        let mut locals = Locals::of(func);
        let call = self.build_call(module, &mut locals, &self.entry_hook, &record, &vars);

        let entry = &mut module.functions[func_index].blocks[0];
        let at = entry.first_non_alloca().unwrap_or(entry.instructions.len());
        entry.instructions.splice(at..at, call);
        trace!(record, at, vars = vars.len(), "inserted entry hook");
        true
    }

    /// Insert the exit hook call before every `ret`.
    ///
    /// Whether a `return` variable is appended, and its tag, is decided by
    /// the first `ret` in block order. A site returning nothing reuses the
    /// first site's operand. Returns the number of sites instrumented.
    pub fn inject_exit(&self, module: &mut Module, func_index: usize, filter: &dyn TraceFilter) -> usize {
        let Some(func) = module.functions.get(func_index) else {
            return 0;
        };
        if !Self::accepts(func, filter) {
            return 0;
        }

        let record = exit_point_name(&func.name);
        let params = param_vars(func);
        let mut locals = Locals::of(func);
        let first_ret = func
            .first_return()
            .and_then(|t| t.ret_value())
            .filter(|v| classify(&v.ty).is_instrumentable())
            .cloned();
        let sites: Vec<(usize, Option<Typed>)> = func
            .return_blocks()
            .into_iter()
            .map(|idx| {
                let site = first_ret.as_ref().map(|first| {
                    func.blocks[idx]
                        .terminator
                        .ret_value()
                        .unwrap_or(first)
                        .clone()
                });
                (idx, site)
            })
            .collect();

        for (idx, ret) in &sites {
            let mut vars = params.clone();
            if let Some(value) = ret {
                vars.push(HookVar {
                    name: RETURN_VAR.to_string(),
                    tag: classify(&value.ty).as_str(),
                    value: value.clone(),
                });
            }
            let call = self.build_call(module, &mut locals, &self.exit_hook, &record, &vars);
            let block = &mut module.functions[func_index].blocks[*idx];
            for instr in call {
                block.insert_before_terminator(instr);
            }
        }
        trace!(record, sites = sites.len(), "inserted exit hooks");
        sites.len()
    }

    /// Promotion casts followed by the hook call.
    fn build_call(
        &self,
        module: &mut Module,
        locals: &mut Locals,
        hook: &str,
        record: &str,
        vars: &[HookVar],
    ) -> Vec<Instr> {
        declare_hook(module, hook);

        let count = i64::try_from(vars.len()).unwrap_or(i64::MAX);
        let mut casts = Vec::new();
        let mut args = Vec::with_capacity(2 + vars.len() * 3);
        args.push(Typed::i32(count));
        args.push(string_arg(module, record));
        for var in vars {
            args.push(string_arg(module, &var.name));
            args.push(string_arg(module, var.tag));
            args.push(promote(&var.value, locals, &mut casts));
        }
        casts.push(Instr::call(hook, Type::Void, args));
        casts
    }
}

/// Widen `value` to its C default-promotion type.
///
/// Constants are retyped in place; locals get a cast pushed to `casts`.
fn promote(value: &Typed, locals: &mut Locals, casts: &mut Vec<Instr>) -> Typed {
    let (op, to) = match value.ty {
        Type::Int(bits) if bits < 64 => {
            if let Operand::ConstInt(v) = value.value {
                let shift = 64 - bits;
                return Typed::new(Type::I64, Operand::ConstInt((v << shift) >> shift));
            }
            (CastOp::SExt, Type::I64)
        }
        Type::Float => {
            if let Operand::ConstFloat(_) | Operand::ConstInt(_) = value.value {
                return Typed::new(Type::Double, value.value.clone());
            }
            (CastOp::FPExt, Type::Double)
        }
        _ => return value.clone(),
    };
    let name = locals.fresh();
    casts.push(Instr::with_result(
        name.clone(),
        InstrKind::Cast {
            op,
            value: value.clone(),
            to: to.clone(),
        },
    ));
    Typed::new(to, Operand::local(name))
}

fn param_vars(func: &Function) -> Vec<HookVar> {
    func.params
        .iter()
        .filter_map(|p| {
            let ty = classify(&p.ty);
            ty.is_instrumentable().then(|| HookVar {
                name: p.name.trim().to_string(),
                tag: ty.as_str(),
                value: Typed::new(p.ty.clone(), Operand::local(p.name.clone())),
            })
        })
        .collect()
}

/// `declare void @hook(i32, ...)` unless the symbol already exists.
fn declare_hook(module: &mut Module, hook: &str) {
    module.get_or_insert_declaration(hook, Type::Void, vec![Param::new("", Type::I32)], true);
}

fn string_arg(module: &mut Module, value: &str) -> Typed {
    let global = module.intern_c_string(value);
    Typed::new(Type::c_str(), Operand::global(global))
}
