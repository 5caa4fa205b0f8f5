//! Lower parsed expressions into a straight-line stack program.
//!
//! For example:
//!
//! (+ (* 2 3) 4 5)
//!
//! lowers to
//!
//! i64.const 2
//! i64.const 3
//! i64.mul
//! i64.const 4
//! i64.add
//! i64.const 5
//! i64.add
//!
//! and a program of several top-level expressions keeps only the value of the
//! last one, dropping the others:
//!
//! (+ 1 2) (* 3 4)
//!
//! i64.const 1
//! i64.const 2
//! i64.add
//! drop
//! i64.const 3
//! i64.const 4
//! i64.mul

pub mod bytecode;
pub mod operators;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{Expression, DEFAULT_MAX_DEPTH};

use bytecode::{Instruction, InstructionSequence};
use operators::{OperatorTable, BUILTIN_OPERATORS};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("program contains no expressions")]
    EmptyProgram,
    /// `within` is the application the empty list is an operand of, if any.
    #[error("the empty list `()` has no value{}", context(.within))]
    EmptyList { within: Option<Expression> },
    #[error("`{expr}` is not callable: a list must start with an operator")]
    NotCallable { expr: Expression },
    #[error("unknown operator `{name}` in `{expr}`")]
    UnknownOperator { name: Box<str>, expr: Expression },
    #[error("`{operator}` expects at least {expected} operands, found {found} in `{expr}`")]
    ArityError {
        operator: Box<str>,
        expected: usize,
        found: usize,
        expr: Expression,
    },
    #[error("{} `{expr}` cannot be used as a value", .expr.kind_name())]
    UnsupportedExpression { expr: Expression },
    #[error("integer literal {value} does not fit in a signed 64-bit integer")]
    IntegerOverflow { value: BigInt },
    #[error("`{expr}` is nested deeper than the limit of {limit} lists")]
    TooDeep { limit: usize, expr: Expression },
}

fn context(within: &Option<Expression>) -> String {
    within
        .as_ref()
        .map(|expr| format!(" in `{expr}`"))
        .unwrap_or_default()
}

/// Turns expression trees into an [`InstructionSequence`].
///
/// A compiler only holds configuration, so one value can compile any number
/// of programs, from any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'ops> {
    operators: &'ops OperatorTable,
    max_depth: usize,
}

impl Default for Compiler<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler<'static> {
    /// A compiler for the built-in operators
    pub fn new() -> Self {
        Self {
            operators: &BUILTIN_OPERATORS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl<'ops> Compiler<'ops> {
    pub fn with_operators<'a>(self, operators: &'a OperatorTable) -> Compiler<'a> {
        Compiler {
            operators,
            max_depth: self.max_depth,
        }
    }

    /// Limits how many lists may be nested inside each other.
    pub fn with_max_depth(self, max_depth: usize) -> Self {
        Self { max_depth, ..self }
    }

    pub fn operators(&self) -> &'ops OperatorTable {
        self.operators
    }

    /// Lowers a whole program. The result is the value of the last expression;
    /// the values of the others are dropped.
    pub fn compile(&self, program: &[Expression]) -> Result<InstructionSequence, CompileError> {
        let Some((last, init)) = program.split_last() else {
            return Err(CompileError::EmptyProgram);
        };

        let mut instructions = vec![];
        for expr in init {
            self.lower(expr, None, 0, &mut instructions)?;
            instructions.push(Instruction::Drop);
        }
        self.lower(last, None, 0, &mut instructions)?;

        tracing::debug!(
            expressions = program.len(),
            instructions = instructions.len(),
            "compiled program"
        );
        Ok(InstructionSequence::from(instructions))
    }

    fn lower(
        &self,
        expr: &Expression,
        parent: Option<&Expression>,
        depth: usize,
        out: &mut Vec<Instruction>,
    ) -> Result<(), CompileError> {
        match expr {
            Expression::Integer(value) => {
                // TODO: widen to 128 bits once backends can take i128 constants
                let narrowed = value
                    .to_i64()
                    .ok_or_else(|| CompileError::IntegerOverflow {
                        value: value.clone(),
                    })?;
                out.push(Instruction::Const(narrowed));
                Ok(())
            }
            Expression::List(values) => {
                self.lower_application(expr, values, parent, depth + 1, out)
            }
            // reserved for variable and literal bindings
            Expression::Atom(_) | Expression::String(_) => {
                Err(CompileError::UnsupportedExpression { expr: expr.clone() })
            }
        }
    }

    fn lower_application(
        &self,
        expr: &Expression,
        values: &[Expression],
        parent: Option<&Expression>,
        depth: usize,
        out: &mut Vec<Instruction>,
    ) -> Result<(), CompileError> {
        if depth > self.max_depth {
            return Err(CompileError::TooDeep {
                limit: self.max_depth,
                expr: expr.clone(),
            });
        }

        let Some((head, operands)) = values.split_first() else {
            return Err(CompileError::EmptyList {
                within: parent.cloned(),
            });
        };
        let Expression::Atom(name) = head else {
            return Err(CompileError::NotCallable { expr: expr.clone() });
        };
        let Some(operator) = self.operators.get(name) else {
            return Err(CompileError::UnknownOperator {
                name: name.clone(),
                expr: expr.clone(),
            });
        };

        // arity is checked before any operand is lowered
        let (first, rest) = match operands.split_first() {
            Some(split) if operands.len() >= operator.min_operands() => split,
            _ => {
                return Err(CompileError::ArityError {
                    operator: name.clone(),
                    expected: operator.min_operands(),
                    found: operands.len(),
                    expr: expr.clone(),
                })
            }
        };

        tracing::trace!(%expr, operator = %name, "lowering application");
        self.lower(first, Some(expr), depth, out)?;
        for operand in rest {
            self.lower(operand, Some(expr), depth, out)?;
            out.push(Instruction::Binary(operator.op()));
        }
        Ok(())
    }
}
