//! Claret compiles a small s-expression arithmetic language into straight-line
//! `i64` stack code.
//!
//! The pipeline is [`Tokenizer`] → [`Parser`] → [`Compiler`] →
//! [`InstructionSequence`], which any [`Backend`] can consume.
pub mod backend;
pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod runtime;

pub use backend::{Backend, ValidationError, WatBackend, DEFAULT_ENTRY_POINT};
pub use compiler::{
    bytecode::{BinaryOp, Instruction, InstructionSequence},
    operators::{Operator, OperatorTable},
    CompileError, Compiler,
};
pub use lexer::{LexError, LexerError, Span, Token, TokenKind, Tokenizer};
pub use parser::{ast::Expression, ParseError, Parser};
pub use runtime::{execute, Machine, Trap};

/// How many lists may be nested inside each other, for both parsing and
/// compiling, unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Parses a whole program with the default tokenizer and depth limit.
pub fn parse(source: &str) -> Result<Vec<Expression>, ParseError> {
    Parser::new(&Tokenizer::new(), source).parse_program()
}

/// Compiles a parsed program against the built-in operators.
pub fn compile(program: &[Expression]) -> Result<InstructionSequence, CompileError> {
    Compiler::new().compile(program)
}
