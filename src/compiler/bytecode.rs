//! The instructions lowering produces. Mnemonics follow WebAssembly's `i64`
//! instructions, which is what backends are expected to map them onto.
use core::fmt;

use arbitrary::Arbitrary;

use crate::backend::Backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Signed division, truncating toward zero
    DivS,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "i64.add",
            BinaryOp::Sub => "i64.sub",
            BinaryOp::Mul => "i64.mul",
            BinaryOp::DivS => "i64.div_s",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum Instruction {
    /// Push a constant
    Const(i64),
    /// Pop the right then the left operand, push the result
    Binary(BinaryOp),
    /// Discard the top of the stack
    Drop,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Const(value) => write!(f, "i64.const {value}"),
            Instruction::Binary(op) => write!(f, "{op}"),
            Instruction::Drop => write!(f, "drop"),
        }
    }
}

/// One straight-line block of instructions. Its value is whatever the last
/// instruction leaves on top of the stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstructionSequence {
    instructions: Vec<Instruction>,
}

impl InstructionSequence {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Feeds every instruction, in order, to `backend` and asks it to expose
    /// the result under `entry_point`.
    pub fn emit<B: Backend>(&self, mut backend: B, entry_point: &str) -> Result<B::Output, B::Error> {
        for instruction in &self.instructions {
            match *instruction {
                Instruction::Const(value) => backend.i64_const(value),
                Instruction::Binary(op) => backend.binary(op),
                Instruction::Drop => backend.drop_value(),
            }
        }
        backend.finish(entry_point)
    }
}

impl From<Vec<Instruction>> for InstructionSequence {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }
}

impl FromIterator<Instruction> for InstructionSequence {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        Self {
            instructions: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a InstructionSequence {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

/// One instruction per line
impl fmt::Display for InstructionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, instruction) in self.instructions.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BinaryOp, Instruction, InstructionSequence};
    use assert2::check;

    #[test]
    fn listing() {
        let sequence: InstructionSequence = [
            Instruction::Const(20),
            Instruction::Const(-2),
            Instruction::Binary(BinaryOp::DivS),
            Instruction::Drop,
            Instruction::Const(1),
        ]
        .into_iter()
        .collect();

        check!(sequence.len() == 5);
        check!(sequence.to_string() == "i64.const 20\ni64.const -2\ni64.div_s\ndrop\ni64.const 1");
        check!(InstructionSequence::default().to_string() == "");
    }
}
