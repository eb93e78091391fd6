//! Basic block IR.

use std::fmt;

use crate::instr::Instr;
use crate::terminator::Terminator;

/// IR for a basic block (straight-line instructions plus a terminator).
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Block label (without the `%` sigil).
    pub label: String,
    /// Instructions in the block.
    pub instructions: Vec<Instr>,
    /// Control flow at the end of the block.
    pub terminator: Terminator,
}

impl Block {
    /// Create an empty block ending in `unreachable`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: Vec::new(),
            terminator: Terminator::default(),
        }
    }

    /// Add an instruction to the block.
    pub fn push(&mut self, instr: Instr) {
        self.instructions.push(instr);
    }

    /// Insert an instruction immediately before the terminator.
    pub fn insert_before_terminator(&mut self, instr: Instr) {
        self.instructions.push(instr);
    }

    /// Position of the first instruction that is not an `alloca`.
    ///
    /// `None` means every instruction is an `alloca`, in which case the
    /// terminator is the first non-storage instruction of the block.
    pub fn first_non_alloca(&self) -> Option<usize> {
        self.instructions.iter().position(|i| !i.is_alloca())
    }

    /// Get number of instructions (terminator excluded).
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check if block has no instructions besides its terminator.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for instr in &self.instructions {
            writeln!(f, "  {instr}")?;
        }
        writeln!(f, "  {}", self.terminator)
    }
}
