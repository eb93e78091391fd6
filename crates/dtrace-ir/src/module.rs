//! Functions, globals and modules.

use std::fmt;

use crate::block::Block;
use crate::terminator::Terminator;
use crate::types::Type;

/// A named, typed function parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// Parameter name (without the `%` sigil). May be empty.
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A function definition or declaration.
///
/// A function with no blocks is a declaration (external symbol).
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    /// Symbol name, possibly mangled.
    pub name: String,
    pub ret: Type,
    pub params: Vec<Param>,
    /// Accepts extra arguments after `params`.
    pub variadic: bool,
    pub blocks: Vec<Block>,
}

impl Function {
    /// Create a declaration with the given signature.
    pub fn declare(name: impl Into<String>, ret: Type, params: Vec<Param>, variadic: bool) -> Self {
        Self {
            name: name.into(),
            ret,
            params,
            variadic,
            blocks: Vec::new(),
        }
    }

    /// Check if this function has no body.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Look up a block by label.
    pub fn block(&self, label: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.label == label)
    }

    /// Indices of blocks ending in `ret`, in block order.
    pub fn return_blocks(&self) -> Vec<usize> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.terminator.is_ret())
            .map(|(i, _)| i)
            .collect()
    }

    /// First `ret` terminator in block order.
    pub fn first_return(&self) -> Option<&Terminator> {
        self.blocks
            .iter()
            .map(|b| &b.terminator)
            .find(|t| t.is_ret())
    }

    /// Names of all locals: parameters, then instruction results.
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        let results = self
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter_map(|i| i.result.as_deref());
        self.params.iter().map(|p| p.name.as_str()).chain(results)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_declaration() { "declare" } else { "define" };
        write!(f, "{keyword} {} @{}(", self.ret, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param.ty)?;
            if !param.name.is_empty() {
                write!(f, " %{}", param.name)?;
            }
        }
        if self.variadic {
            if !self.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...")?;
        }
        write!(f, ")")?;
        if self.is_declaration() {
            return writeln!(f);
        }
        writeln!(f, " {{")?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}

/// Symbol visibility of a global.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Linkage {
    #[default]
    External,
    Internal,
}

/// Initializer of a global.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    /// Null-terminated byte string (`c"..."`), stored without the terminator.
    CString(String),
    /// Integer of the given type.
    Int(Type, i64),
}

impl Constant {
    /// Static type of the initializer.
    pub fn ty(&self) -> Type {
        match self {
            Self::CString(s) => Type::Array(s.len() as u64 + 1, Box::new(Type::I8)),
            Self::Int(ty, _) => ty.clone(),
        }
    }
}

/// Module-level global variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    pub name: String,
    pub linkage: Linkage,
    /// Read-only data.
    pub constant: bool,
    pub init: Constant,
}

impl Global {
    /// String literal payload, if this global holds one.
    pub fn as_c_string(&self) -> Option<&str> {
        match &self.init {
            Constant::CString(s) => Some(s),
            Constant::Int(..) => None,
        }
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} = ", self.name)?;
        if self.linkage == Linkage::Internal {
            write!(f, "internal ")?;
        }
        write!(f, "{} ", if self.constant { "constant" } else { "global" })?;
        match &self.init {
            Constant::CString(s) => {
                write!(f, "c\"")?;
                for b in s.bytes() {
                    if b == b'"' || b == b'\\' || !(0x20..0x7f).contains(&b) {
                        write!(f, "\\{b:02X}")?;
                    } else {
                        write!(f, "{}", b as char)?;
                    }
                }
                writeln!(f, "\"")
            }
            Constant::Int(ty, value) => writeln!(f, "{ty} {value}"),
        }
    }
}

/// A translation unit: globals plus functions, in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    /// Module identifier (usually the source file name).
    pub name: String,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    /// Create an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Look up a function by symbol name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Position of a function by symbol name.
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name == name)
    }

    /// Functions that have a body, in module order.
    pub fn defined_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_declaration())
    }

    /// Look up a global by name.
    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Add a function, replacing a declaration of the same name.
    pub fn add_function(&mut self, function: Function) {
        match self.function_index(&function.name) {
            Some(idx) => self.functions[idx] = function,
            None => self.functions.push(function),
        }
    }

    /// Declare an external function unless a symbol with that name exists.
    pub fn get_or_insert_declaration(
        &mut self,
        name: &str,
        ret: Type,
        params: Vec<Param>,
        variadic: bool,
    ) -> &Function {
        let idx = match self.function_index(name) {
            Some(idx) => idx,
            None => {
                self.functions
                    .push(Function::declare(name, ret, params, variadic));
                self.functions.len() - 1
            }
        };
        &self.functions[idx]
    }

    /// Materialize a string literal as internal read-only data.
    ///
    /// Identical literals share one global. Returns the global's name.
    pub fn intern_c_string(&mut self, value: &str) -> String {
        if let Some(existing) = self
            .globals
            .iter()
            .find(|g| g.constant && g.linkage == Linkage::Internal && g.as_c_string() == Some(value))
        {
            return existing.name.clone();
        }

        let mut name = ".str".to_string();
        let mut n = 0usize;
        while self.global(&name).is_some() {
            n += 1;
            name = format!(".str.{n}");
        }
        self.globals.push(Global {
            name: name.clone(),
            linkage: Linkage::Internal,
            constant: true,
            init: Constant::CString(value.to_string()),
        });
        name
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module \"{}\"", self.name)?;
        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            write!(f, "{global}")?;
        }
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
