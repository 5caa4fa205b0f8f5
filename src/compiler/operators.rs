use std::{collections::HashMap, sync::LazyLock};

use super::bytecode::BinaryOp;

/// How a named operator lowers: the instruction combining two values, and how
/// many operands an application needs.
///
/// Applications are always folded from the left, so `(op a b c)` lowers as
/// `op(op(a, b), c)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operator {
    op: BinaryOp,
    min_operands: usize,
}

impl Operator {
    /// A variadic operator that needs at least two operands.
    pub fn left_fold(op: BinaryOp) -> Self {
        Self {
            op,
            min_operands: 2,
        }
    }

    /// Changes the operand minimum. A fold needs at least one operand to
    /// produce a value, so anything lower is raised to one.
    pub fn with_min_operands(self, min_operands: usize) -> Self {
        Self {
            min_operands: min_operands.max(1),
            ..self
        }
    }

    pub fn op(&self) -> BinaryOp {
        self.op
    }

    pub fn min_operands(&self) -> usize {
        self.min_operands
    }
}

/// Name-keyed registry of the operators a list may be headed by
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorTable {
    operators: HashMap<Box<str>, Operator>,
}

impl OperatorTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// `+`, `-`, `*` and `/`
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.insert("+", Operator::left_fold(BinaryOp::Add));
        table.insert("-", Operator::left_fold(BinaryOp::Sub));
        table.insert("*", Operator::left_fold(BinaryOp::Mul));
        table.insert("/", Operator::left_fold(BinaryOp::DivS));
        table
    }

    /// Registers `operator` under `name`, returning what it replaced.
    pub fn insert(&mut self, name: impl AsRef<str>, operator: Operator) -> Option<Operator> {
        self.operators.insert(Box::from(name.as_ref()), operator)
    }

    pub fn get(&self, name: impl AsRef<str>) -> Option<Operator> {
        self.operators.get(name.as_ref()).copied()
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.operators.contains_key(name.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(AsRef::as_ref)
    }
}

// Never mutated after initialization
pub(crate) static BUILTIN_OPERATORS: LazyLock<OperatorTable> = LazyLock::new(OperatorTable::builtin);

#[cfg(test)]
mod tests {
    use super::{Operator, OperatorTable, BUILTIN_OPERATORS};
    use crate::BinaryOp;
    use assert2::check;

    #[test]
    fn builtins() {
        let mut names = BUILTIN_OPERATORS.names().collect::<Vec<_>>();
        names.sort_unstable();
        check!(names == ["*", "+", "-", "/"]);
        check!(BUILTIN_OPERATORS.get("/") == Some(Operator::left_fold(BinaryOp::DivS)));
        check!(BUILTIN_OPERATORS.get("mod").is_none());
        check!(*BUILTIN_OPERATORS == OperatorTable::builtin());
    }

    #[test]
    fn insert_replaces() {
        let mut table = OperatorTable::new();
        check!(!table.contains("add"));
        check!(table.insert("add", Operator::left_fold(BinaryOp::Add)).is_none());
        let previous = table.insert("add", Operator::left_fold(BinaryOp::Sub));
        check!(previous == Some(Operator::left_fold(BinaryOp::Add)));
        check!(table.get("add").map(|op| op.op()) == Some(BinaryOp::Sub));
    }

    #[test]
    fn operand_minimum_is_at_least_one() {
        let op = Operator::left_fold(BinaryOp::Add);
        check!(op.min_operands() == 2);
        check!(op.with_min_operands(3).min_operands() == 3);
        check!(op.with_min_operands(0).min_operands() == 1);
    }
}
