//! A reference stack machine that runs lowered code with WebAssembly's `i64`
//! semantics: addition, subtraction and multiplication wrap, while signed
//! division traps on a zero divisor and on `i64::MIN / -1`.
use crate::{backend::DEFAULT_ENTRY_POINT, Backend, BinaryOp, InstructionSequence};

/// Conditions that abort execution.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trap {
    #[error("integer divide by zero")]
    DivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("instruction {index} pops from an empty stack")]
    StackUnderflow { index: usize },
    #[error("block left {depth} values on the stack instead of 1")]
    UnbalancedStack { depth: usize },
}

/// Evaluates instructions as they are emitted.
///
/// After the first trap every further instruction is ignored, and
/// [`finish`](Backend::finish) reports the trap.
#[derive(Debug, Default)]
pub struct Machine {
    stack: Vec<i64>,
    executed: usize,
    trap: Option<Trap>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current operand stack, bottom first
    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    pub fn trap(&self) -> Option<Trap> {
        self.trap
    }

    fn step(&mut self, run: impl FnOnce(&mut Vec<i64>) -> Result<(), Trap>) {
        if self.trap.is_some() {
            return;
        }
        if let Err(trap) = run(&mut self.stack) {
            self.trap = Some(match trap {
                Trap::StackUnderflow { .. } => Trap::StackUnderflow {
                    index: self.executed,
                },
                trap => trap,
            });
        }
        self.executed += 1;
    }
}

fn pop(stack: &mut Vec<i64>) -> Result<i64, Trap> {
    stack.pop().ok_or(Trap::StackUnderflow { index: 0 })
}

fn apply(op: BinaryOp, lhs: i64, rhs: i64) -> Result<i64, Trap> {
    match op {
        BinaryOp::Add => Ok(lhs.wrapping_add(rhs)),
        BinaryOp::Sub => Ok(lhs.wrapping_sub(rhs)),
        BinaryOp::Mul => Ok(lhs.wrapping_mul(rhs)),
        BinaryOp::DivS if rhs == 0 => Err(Trap::DivideByZero),
        BinaryOp::DivS => lhs.checked_div(rhs).ok_or(Trap::IntegerOverflow),
    }
}

impl Backend for Machine {
    type Output = i64;
    type Error = Trap;

    fn i64_const(&mut self, value: i64) {
        self.step(|stack| {
            stack.push(value);
            Ok(())
        });
    }

    fn binary(&mut self, op: BinaryOp) {
        self.step(|stack| {
            let rhs = pop(stack)?;
            let lhs = pop(stack)?;
            stack.push(apply(op, lhs, rhs)?);
            Ok(())
        });
    }

    fn drop_value(&mut self) {
        self.step(|stack| pop(stack).map(drop));
    }

    fn finish(self, _entry_point: &str) -> Result<i64, Trap> {
        if let Some(trap) = self.trap {
            return Err(trap);
        }
        match *self.stack.as_slice() {
            [value] => Ok(value),
            _ => Err(Trap::UnbalancedStack {
                depth: self.stack.len(),
            }),
        }
    }
}

/// Runs a block and returns the value it leaves on the stack.
pub fn execute(sequence: &InstructionSequence) -> Result<i64, Trap> {
    let result = sequence.emit(Machine::new(), DEFAULT_ENTRY_POINT);
    match &result {
        Ok(value) => tracing::trace!(value, "block returned"),
        Err(trap) => tracing::trace!(%trap, "block trapped"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::{execute, Machine, Trap};
    use crate::{Backend, BinaryOp, Instruction, InstructionSequence};
    use arbtest::arbtest;
    use assert2::{check, let_assert};

    fn run(instructions: impl IntoIterator<Item = Instruction>) -> Result<i64, Trap> {
        execute(&instructions.into_iter().collect())
    }

    #[test]
    fn arithmetic() {
        use Instruction::{Binary, Const};

        check!(run([Const(7), Const(5), Binary(BinaryOp::Sub)]) == Ok(2));
        check!(run([Const(-7), Const(2), Binary(BinaryOp::DivS)]) == Ok(-3));
        check!(run([Const(i64::MAX), Const(1), Binary(BinaryOp::Add)]) == Ok(i64::MIN));
        check!(run([Const(i64::MIN), Const(-1), Binary(BinaryOp::Mul)]) == Ok(i64::MIN));
    }

    #[test]
    fn division_traps() {
        use Instruction::{Binary, Const};

        check!(run([Const(1), Const(0), Binary(BinaryOp::DivS)]) == Err(Trap::DivideByZero));
        check!(
            run([Const(i64::MIN), Const(-1), Binary(BinaryOp::DivS)]) == Err(Trap::IntegerOverflow)
        );
    }

    #[test]
    fn first_trap_wins() {
        use Instruction::{Binary, Const, Drop};

        let result = run([
            Const(1),
            Const(0),
            Binary(BinaryOp::DivS),
            Drop,
            Drop,
            Const(i64::MIN),
            Const(-1),
            Binary(BinaryOp::DivS),
        ]);
        check!(result == Err(Trap::DivideByZero));
    }

    #[test]
    fn malformed_blocks() {
        use Instruction::{Binary, Const, Drop};

        check!(run([Const(1), Binary(BinaryOp::Add)]) == Err(Trap::StackUnderflow { index: 1 }));
        check!(run([Drop]) == Err(Trap::StackUnderflow { index: 0 }));
        check!(run([Const(1), Const(2)]) == Err(Trap::UnbalancedStack { depth: 2 }));
        check!(execute(&InstructionSequence::default()) == Err(Trap::UnbalancedStack { depth: 0 }));
    }

    #[test]
    fn machine_state_is_observable() {
        let mut machine = Machine::new();
        machine.i64_const(4);
        machine.i64_const(0);
        check!(machine.stack() == [4, 0]);
        machine.binary(BinaryOp::DivS);
        check!(machine.trap() == Some(Trap::DivideByZero));
        let_assert!(Err(Trap::DivideByZero) = machine.finish("main"));
    }

    #[test]
    fn never_panics() {
        arbtest(|u| {
            let instructions: Vec<Instruction> = u.arbitrary()?;
            let sequence = InstructionSequence::from(instructions);
            _ = execute(&sequence);
            Ok(())
        });
    }
}
