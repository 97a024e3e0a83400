//! Expression trees.
//!
//! A committed cell holds the root of one of these trees. Nodes own their
//! children exclusively; a `Ref` holds only the target's address and resolves
//! through whatever cell table is handed to [`Expr::eval`], so a cloned sheet
//! reads its own table without any rebinding step.

use rustc_hash::FxHashSet;

use crate::pos::Pos;
use crate::sheet::CellMap;
use crate::value::{canonical, Value};

/// Binary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    /// Operator spelling used by the expression serialization (and accepted
    /// back by the formula parser).
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }

    fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    /// Apply the operator to two already-evaluated operands.
    ///
    /// Any combination not covered by a typed case yields `Empty`, which is
    /// how one bad cell taints its dependents without halting evaluation.
    pub fn apply(self, lhs: Value, rhs: Value) -> Value {
        if self == BinOp::Add {
            return add(lhs, rhs);
        }
        if self.is_comparison() {
            return compare(self, lhs, rhs);
        }
        let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
            return Value::Empty;
        };
        match self {
            BinOp::Sub => Value::Number(a - b),
            BinOp::Mul => Value::Number(a * b),
            BinOp::Div => {
                if b == 0.0 {
                    Value::Empty
                } else {
                    Value::Number(a / b)
                }
            }
            BinOp::Pow => Value::Number(a.powf(b)),
            _ => unreachable!("handled above"),
        }
    }
}

/// `+` is the one operator with a text case: text concatenates, and a number
/// mixed with text coerces via the canonical decimal form, in operand order.
fn add(lhs: Value, rhs: Value) -> Value {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
        (Value::Text(a), Value::Text(b)) => Value::Text(a + &b),
        (Value::Number(a), Value::Text(b)) => Value::Text(canonical(a) + &b),
        (Value::Text(a), Value::Number(b)) => Value::Text(a + &canonical(b)),
        _ => Value::Empty,
    }
}

/// Comparisons produce `1.0`/`0.0`, never a boolean. Numbers compare with
/// numbers, text with text (code-point order); a mixed pair is `Empty`.
fn compare(op: BinOp, lhs: Value, rhs: Value) -> Value {
    fn flag(hit: bool) -> Value {
        Value::Number(if hit { 1.0 } else { 0.0 })
    }

    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => flag(match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => unreachable!("not a comparison"),
        }),
        (Value::Text(a), Value::Text(b)) => flag(match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => unreachable!("not a comparison"),
        }),
        _ => Value::Empty,
    }
}

/// One node of an expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Constant. `quoted` is the precomputed double-quoted source form,
    /// present exactly when the literal came out of a formula string; it is
    /// what the serialization emits so the literal re-parses as a string.
    Literal {
        value: Value,
        quoted: Option<String>,
    },
    /// Indirection to another cell, resolved by key at evaluation time.
    Ref(Pos),
    /// Numeric negation.
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn number(n: f64) -> Self {
        Expr::Literal {
            value: Value::Number(n),
            quoted: None,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Expr::Literal {
            value: Value::Text(s.into()),
            quoted: None,
        }
    }

    /// Evaluate against `cells`. `visited` is the cycle guard: a `Ref` whose
    /// target is already on the evaluation path collapses to `Empty` instead
    /// of recursing forever.
    pub fn eval(&self, cells: &CellMap, visited: &mut FxHashSet<Pos>) -> Value {
        match self {
            Expr::Literal { value, .. } => value.clone(),
            Expr::Ref(pos) => {
                if visited.contains(pos) {
                    return Value::Empty;
                }
                let Some(cell) = cells.get(pos) else {
                    return Value::Empty;
                };
                visited.insert(*pos);
                let result = cell.expr().eval(cells, visited);
                visited.remove(pos);
                result
            }
            Expr::Neg(operand) => match operand.eval(cells, visited) {
                Value::Number(n) => Value::Number(-n),
                _ => Value::Empty,
            },
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(cells, visited);
                let r = rhs.eval(cells, visited);
                op.apply(l, r)
            }
        }
    }

    /// Translate every reference in the tree by `(dc, dr)`, honoring the
    /// per-axis absolute flags.
    pub fn shift_refs(&mut self, dc: i64, dr: i64) {
        match self {
            Expr::Literal { .. } => {}
            Expr::Ref(pos) => pos.shift(dc, dr),
            Expr::Neg(operand) => operand.shift_refs(dc, dr),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.shift_refs(dc, dr);
                rhs.shift_refs(dc, dr);
            }
        }
    }

    /// Append the expression text: fully parenthesized infix, numbers in
    /// canonical form, formula-origin text literals in their quoted form.
    pub fn write_expr(&self, out: &mut String) {
        match self {
            Expr::Literal { value, quoted } => match value {
                Value::Number(n) => out.push_str(&canonical(*n)),
                Value::Text(raw) => out.push_str(quoted.as_deref().unwrap_or(raw)),
                Value::Empty => {}
            },
            Expr::Ref(pos) => out.push_str(&pos.to_string()),
            Expr::Neg(operand) => {
                out.push_str("(-");
                operand.write_expr(out);
                out.push(')');
            }
            Expr::Binary { op, lhs, rhs } => {
                out.push('(');
                lhs.write_expr(out);
                out.push_str(op.symbol());
                rhs.write_expr(out);
                out.push(')');
            }
        }
    }
}
