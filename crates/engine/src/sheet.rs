//! The sheet façade: a keyed table of committed expression roots.
//!
//! The table is the single owner of roots. References resolve through it by
//! key at evaluation time, so an edit to a cell is immediately visible to
//! every formula that mentions it, and cloning the sheet redirects every
//! reference to the clone for free.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::formula::builder::TreeBuilder;
use crate::formula::parser::parse_formula;
use crate::formula::tree::Expr;
use crate::pos::Pos;
use crate::value::Value;

/// Cell table. `BTreeMap` keeps cells in `(col, row)` order, which the
/// record-stream serialization relies on.
pub type CellMap = BTreeMap<Pos, Cell>;

/// A committed table slot: one expression root plus the flag recording
/// whether it arrived as a formula (and re-serializes behind a leading `=`).
#[derive(Debug, Clone)]
pub struct Cell {
    expr: Expr,
    formula: bool,
}

impl Cell {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn is_formula(&self) -> bool {
        self.formula
    }

    /// Expression text of the root (no leading `=`).
    pub fn expr_text(&self) -> String {
        let mut text = String::new();
        self.expr.write_expr(&mut text);
        text
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    cells: CellMap,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell from raw contents.
    ///
    /// Contents starting with `=` go through the formula parser; a rejected
    /// formula returns `false` and leaves the cell untouched. Anything else
    /// is a literal: a number if the whole string parses as one, verbatim
    /// text otherwise.
    pub fn set_cell(&mut self, pos: Pos, contents: &str) -> bool {
        if contents.starts_with('=') {
            let mut builder = TreeBuilder::new();
            if parse_formula(contents, &mut builder).is_err() {
                return false;
            }
            let Ok(root) = builder.finish() else {
                return false;
            };
            self.cells.insert(
                pos,
                Cell {
                    expr: root,
                    formula: true,
                },
            );
        } else {
            let expr = match contents.parse::<f64>() {
                Ok(n) => Expr::number(n),
                Err(_) => Expr::text(contents),
            };
            self.cells.insert(
                pos,
                Cell {
                    expr,
                    formula: false,
                },
            );
        }
        true
    }

    /// Evaluate a cell. Absent cells are `Empty`; the cell's own address
    /// seeds the cycle guard, so a self-referencing root is `Empty` too.
    pub fn get_value(&self, pos: Pos) -> Value {
        let Some(cell) = self.cells.get(&pos) else {
            return Value::Empty;
        };
        let mut visited = FxHashSet::default();
        visited.insert(pos);
        cell.expr.eval(&self.cells, &mut visited)
    }

    pub fn has(&self, pos: Pos) -> bool {
        self.cells.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in `(col, row)` order.
    pub fn cells(&self) -> impl Iterator<Item = (&Pos, &Cell)> {
        self.cells.iter()
    }

    /// `(max_col, max_row)` over occupied cells; `None` when the sheet is
    /// empty. The two maxima may come from different cells.
    pub fn extent(&self) -> Option<(i64, i64)> {
        let mut extent = None;
        for pos in self.cells.keys() {
            let (c, r) = extent.get_or_insert((pos.col, pos.row));
            *c = (*c).max(pos.col);
            *r = (*r).max(pos.row);
        }
        extent
    }

    pub(crate) fn cells_map(&self) -> &CellMap {
        &self.cells
    }

    /// Copy the `w × h` rectangle rooted at `src` to `dst`, rewriting every
    /// relative reference by the rectangle offset. Source holes leave the
    /// matching destination cell untouched.
    ///
    /// The whole source rectangle is cloned before the first write; an
    /// overlapping destination therefore copies the pre-copy contents.
    pub fn copy_rect(&mut self, dst: Pos, src: Pos, w: i64, h: i64) {
        let (dc, dr) = (dst.col - src.col, dst.row - src.row);

        let mut staged = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let from = Pos::new(src.col + x, src.row + y);
                if let Some(cell) = self.cells.get(&from) {
                    staged.push((x, y, cell.clone()));
                }
            }
        }

        for (x, y, mut cell) in staged {
            cell.expr.shift_refs(dc, dr);
            self.cells.insert(Pos::new(dst.col + x, dst.row + y), cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(s: &str) -> Pos {
        s.parse().unwrap()
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_literal_number_forms() {
        let mut sheet = Sheet::new();
        assert!(sheet.set_cell(pos("A1"), "10"));
        assert!(sheet.set_cell(pos("A2"), "20.5"));
        assert!(sheet.set_cell(pos("A3"), "3e1"));
        assert!(sheet.set_cell(pos("A4"), "-27"));

        assert_eq!(sheet.get_value(pos("A1")), num(10.0));
        assert_eq!(sheet.get_value(pos("A2")), num(20.5));
        assert_eq!(sheet.get_value(pos("A3")), num(30.0));
        assert_eq!(sheet.get_value(pos("A4")), num(-27.0));
        assert!(!sheet.cells.get(&pos("A1")).unwrap().is_formula());
    }

    #[test]
    fn test_literal_text_is_verbatim() {
        let mut sheet = Sheet::new();
        let raw = "raw text with any characters, including a quote \" or a newline\n";
        assert!(sheet.set_cell(pos("A6"), raw));
        assert_eq!(sheet.get_value(pos("A6")), Value::Text(raw.into()));

        // Not a full number parse, so these stay text.
        assert!(sheet.set_cell(pos("B1"), " 10"));
        assert_eq!(sheet.get_value(pos("B1")), Value::Text(" 10".into()));
        assert!(sheet.set_cell(pos("B2"), "10abc"));
        assert_eq!(sheet.get_value(pos("B2")), Value::Text("10abc".into()));
        assert!(sheet.set_cell(pos("B3"), ""));
        assert_eq!(sheet.get_value(pos("B3")), Value::Text("".into()));
    }

    #[test]
    fn test_formula_commit_and_flag() {
        let mut sheet = Sheet::new();
        assert!(sheet.set_cell(pos("A4"), "=40"));
        assert!(sheet.set_cell(pos("A5"), "=5e+1"));

        assert_eq!(sheet.get_value(pos("A4")), num(40.0));
        assert_eq!(sheet.get_value(pos("A5")), num(50.0));
        assert!(sheet.cells.get(&pos("A4")).unwrap().is_formula());
    }

    #[test]
    fn test_rejected_formula_leaves_cell_unchanged() {
        let mut sheet = Sheet::new();
        assert!(sheet.set_cell(pos("A1"), "7"));

        assert!(!sheet.set_cell(pos("A1"), "=1+"));
        assert!(!sheet.set_cell(pos("A1"), "=A1:B2"));
        assert!(!sheet.set_cell(pos("A1"), "=SUM(A2,A3)"));

        assert_eq!(sheet.get_value(pos("A1")), num(7.0));
        assert!(!sheet.cells.get(&pos("A1")).unwrap().is_formula());
    }

    #[test]
    fn test_absent_cell_is_empty() {
        let sheet = Sheet::new();
        assert_eq!(sheet.get_value(pos("A8")), Value::Empty);
        assert_eq!(sheet.get_value(pos("AAAA9999")), Value::Empty);
        assert!(!sheet.has(pos("A8")));
    }

    #[test]
    fn test_edits_are_visible_to_dependents() {
        let mut sheet = Sheet::new();
        assert!(sheet.set_cell(pos("A1"), "2"));
        assert!(sheet.set_cell(pos("B1"), "=A1*10"));
        assert_eq!(sheet.get_value(pos("B1")), num(20.0));

        assert!(sheet.set_cell(pos("A1"), "3"));
        assert_eq!(sheet.get_value(pos("B1")), num(30.0));
    }

    #[test]
    fn test_self_reference_is_empty() {
        let mut sheet = Sheet::new();
        assert!(sheet.set_cell(pos("A1"), "=A1+1"));
        assert_eq!(sheet.get_value(pos("A1")), Value::Empty);
    }

    #[test]
    fn test_position_identity_ignores_flags_on_write() {
        let mut sheet = Sheet::new();
        assert!(sheet.set_cell(pos("A1"), "20"));
        assert!(sheet.set_cell(pos("A$1"), "10"));

        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.get_value(pos("A1")), num(10.0));
    }

    #[test]
    fn test_copy_rect_rewrites_relative_refs_only() {
        let mut sheet = Sheet::new();
        assert!(sheet.set_cell(pos("D1"), "7"));
        assert!(sheet.set_cell(pos("D2"), "1"));
        assert!(sheet.set_cell(pos("E1"), "3"));
        assert!(sheet.set_cell(pos("E2"), "11"));
        assert!(sheet.set_cell(pos("F1"), "=D1+$D1+D$1+$D$1"));
        assert_eq!(sheet.get_value(pos("F1")), num(28.0));

        sheet.copy_rect(pos("G2"), pos("F1"), 1, 1);

        // Relative axes move by (1, 1); absolute axes hold.
        assert_eq!(
            sheet.cells.get(&pos("G2")).unwrap().expr_text(),
            "(((E2+$D2)+E$1)+$D$1)"
        );
        assert_eq!(sheet.get_value(pos("G2")), num(11.0 + 1.0 + 3.0 + 7.0));
    }

    #[test]
    fn test_copy_rect_skips_source_holes() {
        let mut sheet = Sheet::new();
        assert!(sheet.set_cell(pos("A1"), "1"));
        assert!(sheet.set_cell(pos("B2"), "2"));

        // Source A1:B2 has holes at A2 and B1.
        sheet.copy_rect(pos("C3"), pos("A1"), 2, 2);

        assert_eq!(sheet.get_value(pos("C3")), num(1.0));
        assert_eq!(sheet.get_value(pos("D4")), num(2.0));
        assert!(!sheet.has(pos("D3")));
        assert!(!sheet.has(pos("C4")));
    }

    #[test]
    fn test_copy_rect_backwards_offset() {
        let mut sheet = Sheet::new();
        assert!(sheet.set_cell(pos("C3"), "=B2"));
        assert!(sheet.set_cell(pos("B2"), "5"));

        sheet.copy_rect(pos("B1"), pos("C3"), 1, 1);
        assert_eq!(sheet.cells.get(&pos("B1")).unwrap().expr_text(), "A0");
    }

    #[test]
    fn test_extent() {
        let mut sheet = Sheet::new();
        assert_eq!(sheet.extent(), None);

        assert!(sheet.set_cell(pos("B7"), "1"));
        assert!(sheet.set_cell(pos("D2"), "1"));
        assert_eq!(sheet.extent(), Some((4, 7)));
    }
}
