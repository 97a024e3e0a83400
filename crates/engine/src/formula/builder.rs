//! The parser-facing builder interface and its tree-building implementation.
//!
//! The formula parser never returns an AST; it drives an [`ExprSink`] with a
//! postfix sequence of callbacks (operands first, operator after). The
//! engine's sink is [`TreeBuilder`], which folds that sequence into a single
//! [`Expr`] on an operand stack.

use thiserror::Error;

use super::tree::{BinOp, Expr};
use crate::pos::{Pos, PosError};
use crate::value::Value;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid cell reference")]
    BadReference(#[from] PosError),
    #[error("operator applied to too few operands")]
    Underflow,
    #[error("expression did not reduce to a single tree")]
    Incomplete,
}

/// Callback interface a formula parser drives in postfix order.
///
/// `val_range` and `func_call` are part of the wire protocol but carry no
/// tree in this engine; the default bodies accept and discard them. A
/// formula that actually needs their result ends up with an operand-count
/// mismatch at [`TreeBuilder::finish`].
pub trait ExprSink {
    fn val_number(&mut self, value: f64) -> Result<(), BuildError>;
    fn val_string(&mut self, value: &str) -> Result<(), BuildError>;
    fn val_reference(&mut self, text: &str) -> Result<(), BuildError>;

    fn val_range(&mut self, _text: &str) -> Result<(), BuildError> {
        Ok(())
    }

    fn func_call(&mut self, _name: &str, _args: usize) -> Result<(), BuildError> {
        Ok(())
    }

    fn op_add(&mut self) -> Result<(), BuildError>;
    fn op_sub(&mut self) -> Result<(), BuildError>;
    fn op_mul(&mut self) -> Result<(), BuildError>;
    fn op_div(&mut self) -> Result<(), BuildError>;
    fn op_pow(&mut self) -> Result<(), BuildError>;
    fn op_neg(&mut self) -> Result<(), BuildError>;
    fn op_eq(&mut self) -> Result<(), BuildError>;
    fn op_ne(&mut self) -> Result<(), BuildError>;
    fn op_lt(&mut self) -> Result<(), BuildError>;
    fn op_le(&mut self) -> Result<(), BuildError>;
    fn op_gt(&mut self) -> Result<(), BuildError>;
    fn op_ge(&mut self) -> Result<(), BuildError>;
}

/// Double-quote a string literal for serialization: wrap in `"` and double
/// every embedded `"`.
fn double_quote(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for ch in raw.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Operand-stack sink: one parse run per instance.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    stack: Vec<Expr>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit: the parse must have reduced to exactly one tree.
    pub fn finish(mut self) -> Result<Expr, BuildError> {
        let root = self.stack.pop().ok_or(BuildError::Incomplete)?;
        if self.stack.is_empty() {
            Ok(root)
        } else {
            Err(BuildError::Incomplete)
        }
    }

    fn push_binary(&mut self, op: BinOp) -> Result<(), BuildError> {
        // Right operand was pushed last.
        let rhs = self.stack.pop().ok_or(BuildError::Underflow)?;
        let lhs = self.stack.pop().ok_or(BuildError::Underflow)?;
        self.stack.push(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        });
        Ok(())
    }
}

impl ExprSink for TreeBuilder {
    fn val_number(&mut self, value: f64) -> Result<(), BuildError> {
        self.stack.push(Expr::number(value));
        Ok(())
    }

    fn val_string(&mut self, value: &str) -> Result<(), BuildError> {
        self.stack.push(Expr::Literal {
            value: Value::Text(value.to_string()),
            quoted: Some(double_quote(value)),
        });
        Ok(())
    }

    fn val_reference(&mut self, text: &str) -> Result<(), BuildError> {
        let pos: Pos = text.parse()?;
        self.stack.push(Expr::Ref(pos));
        Ok(())
    }

    fn op_add(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Add)
    }

    fn op_sub(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Sub)
    }

    fn op_mul(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Mul)
    }

    fn op_div(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Div)
    }

    fn op_pow(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Pow)
    }

    fn op_neg(&mut self) -> Result<(), BuildError> {
        let operand = self.stack.pop().ok_or(BuildError::Underflow)?;
        self.stack.push(Expr::Neg(Box::new(operand)));
        Ok(())
    }

    fn op_eq(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Eq)
    }

    fn op_ne(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Ne)
    }

    fn op_lt(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Lt)
    }

    fn op_le(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Le)
    }

    fn op_gt(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Gt)
    }

    fn op_ge(&mut self) -> Result<(), BuildError> {
        self.push_binary(BinOp::Ge)
    }
}
