//! Operator and function tables consumed by the parser.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// Whether an operator compares operands or combines boolean expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Comparison,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub token: &'static str,
    pub kind: OperatorKind,
    pub operand_count: usize,
    pub associativity: Associativity,
    pub precedence: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub token: &'static str,
    pub param_count: usize,
}

/// Immutable operator/function registry. Build once, share by reference.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    operators: HashMap<&'static str, Operator>,
    functions: HashMap<&'static str, Function>,
}

impl Grammar {
    /// The operators and functions understood by `$filter`.
    pub fn odata() -> Self {
        Self::default()
            .with_operator("or", OperatorKind::Boolean, 2, Associativity::Left, 1)
            .with_operator("and", OperatorKind::Boolean, 2, Associativity::Left, 2)
            .with_operator("eq", OperatorKind::Comparison, 2, Associativity::Left, 3)
            .with_operator("ne", OperatorKind::Comparison, 2, Associativity::Left, 3)
            .with_operator("gt", OperatorKind::Comparison, 2, Associativity::Left, 4)
            .with_operator("ge", OperatorKind::Comparison, 2, Associativity::Left, 4)
            .with_operator("lt", OperatorKind::Comparison, 2, Associativity::Left, 4)
            .with_operator("le", OperatorKind::Comparison, 2, Associativity::Left, 4)
            .with_function("contains", 2)
            .with_function("endswith", 2)
            .with_function("startswith", 2)
    }

    pub fn with_operator(
        mut self,
        token: &'static str,
        kind: OperatorKind,
        operand_count: usize,
        associativity: Associativity,
        precedence: u8,
    ) -> Self {
        self.operators.insert(
            token,
            Operator {
                token,
                kind,
                operand_count,
                associativity,
                precedence,
            },
        );
        self
    }

    pub fn with_function(mut self, token: &'static str, param_count: usize) -> Self {
        self.functions.insert(token, Function { token, param_count });
        self
    }

    pub fn operator(&self, token: &str) -> Option<&Operator> {
        self.operators.get(token)
    }

    pub fn function(&self, token: &str) -> Option<&Function> {
        self.functions.get(token)
    }

    /// Declared arity of an operator or function, if `token` names one.
    pub fn arity(&self, token: &str) -> Option<usize> {
        self.operator(token)
            .map(|op| op.operand_count)
            .or_else(|| self.function(token).map(|f| f.param_count))
    }
}
