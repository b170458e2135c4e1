//! The restricted expression language's abstract syntax tree.
//!
//! The grammar is intentionally small: arithmetic, boolean logic, member
//! and index access, function calls into the builtin table, array/object
//! literals, and a conditional operator. There is no way to express a loop,
//! a statement, or a reference to anything outside the evaluation context —
//! the surface is closed by construction, not by a runtime blocklist alone.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A dotted-path variable reference, e.g. `node.fetchUser.data`.
    /// The first segment is resolved through the context; remaining
    /// segments are property accesses.
    Variable(Vec<String>),
    Negate(Box<Expr>),
    Not(Box<Expr>),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    PropertyAccess {
        object: Box<Expr>,
        property: String,
    },
    IndexAccess {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
}
