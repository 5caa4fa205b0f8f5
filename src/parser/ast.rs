//! The abstract syntax tree handed from the parser to the compiler.
use core::fmt;

use arbitrary::{Arbitrary, Unstructured};
use num_bigint::{BigInt, BigUint};

use crate::lexer::escape_string;

/// A parsed s-expression.
///
/// Trees are built once by the parser and never mutated afterwards; literal
/// payloads are already decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// An identifier or operator symbol, like `+` or `foo`
    Atom(Box<str>),
    /// A non-negative decimal literal of any size
    Integer(BigInt),
    /// A string literal with its escapes resolved
    String(Box<str>),
    /// A parenthesized sequence, possibly empty
    List(Vec<Expression>),
}

impl Expression {
    pub fn atom(name: impl AsRef<str>) -> Self {
        Self::Atom(Box::from(name.as_ref()))
    }

    pub fn integer(value: impl Into<BigInt>) -> Self {
        Self::Integer(value.into())
    }

    pub fn string(value: impl AsRef<str>) -> Self {
        Self::String(Box::from(value.as_ref()))
    }

    pub fn list(values: impl IntoIterator<Item = Expression>) -> Self {
        Self::List(values.into_iter().collect())
    }

    /// Short name of the variant, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Atom(_) => "atom",
            Self::Integer(_) => "integer",
            Self::String(_) => "string",
            Self::List(_) => "list",
        }
    }

    /// Number of nested lists, counting this one. Leaves have depth 0.
    pub fn depth(&self) -> usize {
        match self {
            Self::List(values) => 1 + values.iter().map(Self::depth).max().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Renders the expression back into source text that parses to an equal tree.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(name) => f.write_str(name),
            Self::Integer(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(&escape_string(value)),
            Self::List(values) => {
                f.write_str("(")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
        }
    }
}

const ATOM_START: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ+-*/_";
const ATOM_CONTINUE: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+-*/_?";
const ARBITRARY_MAX_DEPTH: usize = 6;

// Only generates trees the lexer can reproduce: atoms follow the atom rule,
// integers are non-negative and strings are printable ASCII.
impl<'a> Arbitrary<'a> for Expression {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        arbitrary_expression(u, 0)
    }
}

fn arbitrary_expression(u: &mut Unstructured<'_>, depth: usize) -> arbitrary::Result<Expression> {
    let max_choice: u8 = if depth >= ARBITRARY_MAX_DEPTH { 2 } else { 3 };
    Ok(match u.int_in_range(0..=max_choice)? {
        0 => {
            let mut name = String::new();
            name.push(char::from(*u.choose(ATOM_START)?));
            for _ in 0..u.int_in_range(0..=8usize)? {
                name.push(char::from(*u.choose(ATOM_CONTINUE)?));
            }
            Expression::atom(name)
        }
        1 => {
            let len = u.int_in_range(0..=24usize)?;
            let magnitude = BigUint::from_bytes_le(u.bytes(len)?);
            Expression::Integer(BigInt::from(magnitude))
        }
        2 => {
            let mut value = String::new();
            for _ in 0..u.int_in_range(0..=12usize)? {
                value.push(char::from(u.int_in_range(0x20u8..=0x7e)?));
            }
            Expression::string(value)
        }
        _ => {
            let len = u.int_in_range(0..=4usize)?;
            let mut values = Vec::with_capacity(len);
            for _ in 0..len {
                values.push(arbitrary_expression(u, depth + 1)?);
            }
            Expression::List(values)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::Expression;
    use assert2::check;

    #[test]
    fn rendering() {
        let expr = Expression::list([
            Expression::atom("concat"),
            Expression::string("say \"hi\""),
            Expression::list([]),
            Expression::list([Expression::atom("+"), Expression::integer(1), Expression::integer(2)]),
        ]);
        check!(expr.to_string() == r#"(concat "say \"hi\"" () (+ 1 2))"#);
        check!(Expression::string(r"a\b").to_string() == r#""a\\b""#);
    }

    #[test]
    fn depth() {
        check!(Expression::integer(1).depth() == 0);
        check!(Expression::list([]).depth() == 1);
        let nested = Expression::list([
            Expression::atom("+"),
            Expression::list([Expression::atom("*"), Expression::list([])]),
            Expression::integer(4),
        ]);
        check!(nested.depth() == 3);
    }
}
