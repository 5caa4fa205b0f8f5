//! The boundary between lowering and code generation.
//!
//! A [`Backend`] is driven one instruction at a time by
//! [`InstructionSequence::emit`](crate::InstructionSequence::emit) and turns
//! the block into whatever it produces: a module, a listing, or a value.
//! Every backend exposes the block as a zero-argument entry point returning a
//! single `i64`.
use core::fmt::Write as _;

use crate::BinaryOp;

/// Name of the exported entry point when a caller has no preference
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// Instruction-construction interface for code generators.
pub trait Backend {
    type Output;
    type Error;

    fn i64_const(&mut self, value: i64);

    fn binary(&mut self, op: BinaryOp);

    fn drop_value(&mut self);

    /// Closes the block and exposes it under `entry_point`.
    fn finish(self, entry_point: &str) -> Result<Self::Output, Self::Error>;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("instruction {index} (`{instruction}`) pops from an empty stack")]
    StackUnderflow { index: usize, instruction: String },
    #[error("entry point must leave exactly one i64 on the stack, found {depth}")]
    UnbalancedStack { depth: usize },
    #[error("invalid entry point name {0:?}")]
    InvalidEntryPoint(Box<str>),
}

/// Renders a WebAssembly text module with a single exported function.
///
/// Like a real module validator, it checks that no instruction pops from an
/// empty stack and that exactly one value is left for the function result.
#[derive(Debug, Default)]
pub struct WatBackend {
    body: Vec<String>,
    height: usize,
    error: Option<ValidationError>,
}

impl WatBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, line: String, pops: usize, pushes: usize) {
        if self.error.is_none() {
            match self.height.checked_sub(pops) {
                Some(height) => self.height = height + pushes,
                None => {
                    self.error = Some(ValidationError::StackUnderflow {
                        index: self.body.len(),
                        instruction: line.clone(),
                    })
                }
            }
        }
        self.body.push(line);
    }
}

impl Backend for WatBackend {
    type Output = String;
    type Error = ValidationError;

    fn i64_const(&mut self, value: i64) {
        self.push(format!("i64.const {value}"), 0, 1);
    }

    fn binary(&mut self, op: BinaryOp) {
        self.push(op.mnemonic().to_string(), 2, 1);
    }

    fn drop_value(&mut self) {
        self.push("drop".to_string(), 1, 0);
    }

    fn finish(self, entry_point: &str) -> Result<String, ValidationError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.height != 1 {
            return Err(ValidationError::UnbalancedStack { depth: self.height });
        }
        let valid_name = !entry_point.is_empty()
            && entry_point
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(ValidationError::InvalidEntryPoint(Box::from(entry_point)));
        }

        let mut module = String::new();
        // writing into a String cannot fail
        let _ = writeln!(module, "(module");
        let _ = write!(
            module,
            "  (func ${entry_point} (export \"{entry_point}\") (result i64)"
        );
        for line in &self.body {
            let _ = write!(module, "\n    {line}");
        }
        module.push_str("))");
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::{ValidationError, WatBackend, DEFAULT_ENTRY_POINT};
    use crate::{compile, parse, BinaryOp, Instruction, InstructionSequence};
    use assert2::{check, let_assert};

    #[test]
    fn renders_a_module() {
        let_assert!(Ok(program) = parse("(+ 1 2)"));
        let_assert!(Ok(sequence) = compile(&program));
        let_assert!(Ok(module) = sequence.emit(WatBackend::new(), DEFAULT_ENTRY_POINT));
        check!(
            module
                == "(module\n  (func $main (export \"main\") (result i64)\n    i64.const 1\n    i64.const 2\n    i64.add))"
        );
    }

    #[test]
    fn renders_dropped_values() {
        let_assert!(Ok(program) = parse("(/ 5 0) (* 3 4)"));
        let_assert!(Ok(sequence) = compile(&program));
        let_assert!(Ok(module) = sequence.emit(WatBackend::new(), "run"));
        check!(module.starts_with("(module\n  (func $run (export \"run\") (result i64)"));
        check!(module.contains("\n    i64.div_s\n    drop\n"));
        check!(module.ends_with("i64.mul))"));
    }

    #[test]
    fn rejects_malformed_blocks() {
        let underflow: InstructionSequence =
            [Instruction::Const(1), Instruction::Binary(BinaryOp::Add)].into_iter().collect();
        check!(
            underflow.emit(WatBackend::new(), DEFAULT_ENTRY_POINT)
                == Err(ValidationError::StackUnderflow {
                    index: 1,
                    instruction: "i64.add".to_string(),
                })
        );

        let leftover: InstructionSequence =
            [Instruction::Const(1), Instruction::Const(2)].into_iter().collect();
        check!(
            leftover.emit(WatBackend::new(), DEFAULT_ENTRY_POINT)
                == Err(ValidationError::UnbalancedStack { depth: 2 })
        );

        check!(
            InstructionSequence::default().emit(WatBackend::new(), DEFAULT_ENTRY_POINT)
                == Err(ValidationError::UnbalancedStack { depth: 0 })
        );
    }

    #[test]
    fn rejects_bad_entry_point_names() {
        let sequence: InstructionSequence = [Instruction::Const(1)].into_iter().collect();
        let_assert!(Err(ValidationError::InvalidEntryPoint(_)) = sequence.emit(WatBackend::new(), ""));
        let_assert!(
            Err(ValidationError::InvalidEntryPoint(_)) = sequence.emit(WatBackend::new(), "a\"b")
        );
    }
}
