//! Predicate expressions carried as filter operands.
//!
//! Supports arithmetic operations, comparisons, logical operations, and
//! column references. The optimizer only inspects expressions structurally
//! (which columns they touch, how they combine); evaluation against data is
//! the executor's concern and does not live in this workspace.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Literal values appearing in predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
}

/// Binary operators for expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Comparison operators
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical operators
    And,
    Or,
    // Arithmetic operators
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    /// Parse a binary operator from a string.
    pub fn parse(op: &str) -> Result<Self, String> {
        match op {
            "==" | "=" => Ok(BinOp::Eq),
            "!=" | "<>" => Ok(BinOp::Ne),
            "<" => Ok(BinOp::Lt),
            "<=" => Ok(BinOp::Le),
            ">" => Ok(BinOp::Gt),
            ">=" => Ok(BinOp::Ge),
            "AND" | "and" | "&&" => Ok(BinOp::And),
            "OR" | "or" | "||" => Ok(BinOp::Or),
            "+" => Ok(BinOp::Add),
            "-" => Ok(BinOp::Sub),
            "*" => Ok(BinOp::Mul),
            "/" => Ok(BinOp::Div),
            _ => Err(format!("unknown binary operator: {}", op)),
        }
    }
}

/// Unary operators for expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    IsNull,
    IsNotNull,
}

impl UnaryOp {
    /// Parse a unary operator from a string.
    pub fn parse(op: &str) -> Result<Self, String> {
        match op.to_uppercase().as_str() {
            "NOT" | "!" => Ok(UnaryOp::Not),
            "ISNULL" | "IS NULL" => Ok(UnaryOp::IsNull),
            "ISNOTNULL" | "IS NOT NULL" => Ok(UnaryOp::IsNotNull),
            _ => Err(format!("unknown unary operator: {}", op)),
        }
    }
}

/// Expression AST for SQL-like predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column reference: "column_name"
    Column(String),
    /// Literal value: 42, "hello", true, etc.
    Literal(Scalar),
    /// Binary operation: left OP right
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation: OP arg
    UnaryOp { op: UnaryOp, arg: Box<Expr> },
}

impl Expr {
    /// Parse a simple expression string into an Expr AST.
    ///
    /// Supports simple predicates like "col OP literal" or "col1 OP col2".
    pub fn parse(expr_str: &str) -> Result<Self, String> {
        let expr_str = expr_str.trim();

        let ops = ["==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "AND", "OR"];

        for op_str in &ops {
            if let Some(pos) = expr_str.find(op_str) {
                let left_str = expr_str[..pos].trim();
                let right_str = expr_str[pos + op_str.len()..].trim();

                if !left_str.is_empty() && !right_str.is_empty() {
                    let op = BinOp::parse(op_str)?;
                    let left = Self::parse_atom(left_str)?;
                    let right = Self::parse_atom(right_str)?;
                    return Ok(Expr::BinaryOp {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    });
                }
            }
        }

        // Single atom (column or literal)
        Self::parse_atom(expr_str)
    }

    /// Parse an atomic expression (column or literal).
    fn parse_atom(atom_str: &str) -> Result<Self, String> {
        let atom_str = atom_str.trim();

        if let Ok(scalar) = parse_literal(atom_str) {
            return Ok(Expr::Literal(scalar));
        }

        Ok(Expr::Column(atom_str.to_string()))
    }

    /// Columns referenced anywhere in the expression. Drives pushdown
    /// legality: a predicate may only move below a projection that still
    /// produces every column it touches.
    pub fn columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Column(name) => {
                out.insert(name.clone());
            }
            Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::UnaryOp { arg, .. } => {
                arg.collect_columns(out);
            }
        }
    }

    /// Conjoin two predicates. Used when stacked filters collapse into one.
    pub fn and(self, other: Expr) -> Expr {
        Expr::BinaryOp {
            op: BinOp::And,
            left: Box::new(self),
            right: Box::new(other),
        }
    }
}

/// Parse a literal string into a Scalar value.
fn parse_literal(literal: &str) -> Result<Scalar, String> {
    let trimmed = literal.trim();

    if let Ok(b) = trimmed.parse::<bool>() {
        return Ok(Scalar::Bool(b));
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Scalar::I64(i));
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Ok(Scalar::F64(f));
    }
    if (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
    {
        let unquoted = &trimmed[1..trimmed.len() - 1];
        return Ok(Scalar::Str(unquoted.to_string()));
    }

    Err(format!("cannot parse '{}' as literal", literal))
}
