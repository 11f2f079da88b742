use std::rc::Rc;

/// Exclusive upper bound on the 0-based column domain (`spec.md` §6).
pub const MAX_COL: i64 = 475_254;
/// Exclusive upper bound on the 0-based row domain (`spec.md` §6).
pub const MAX_ROW: i64 = 1_000_000_000_000;

/// One axis (column or row) of a cell reference: either an absolute 0-based
/// index, or a signed offset relative to the evaluating cell. Arithmetic on
/// the relative form wraps modulo `domain` (`spec.md` §3, §8 law 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AxisRef {
    pub absolute: bool,
    pub value: i64,
}

impl AxisRef {
    pub fn absolute(index: i64) -> Self {
        AxisRef { absolute: true, value: index }
    }

    pub fn relative(offset: i64) -> Self {
        AxisRef { absolute: false, value: offset }
    }

    /// Resolves this axis against `base` (the evaluating cell's coordinate
    /// on this axis) using wrap-modulo arithmetic in `domain`. An absolute
    /// axis ignores `base` entirely: `spec.md` §3 "A CellRef with both
    /// components absolute is position-invariant".
    pub fn resolve(self, base: i64, domain: i64) -> i64 {
        if self.absolute {
            self.value
        } else {
            wrap(base + self.value, domain)
        }
    }
}

/// `((b + delta) mod domain + domain) mod domain` — double-mod makes this
/// correct for negative intermediate sums without relying on Rust's
/// truncating `%` having a particular sign (`spec.md` §8 law 5).
pub fn wrap(value: i64, domain: i64) -> i64 {
    ((value % domain) + domain) % domain
}

/// A reference to one cell, absolute or relative per axis, with an optional
/// cross-sheet name (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CellRef {
    pub col: AxisRef,
    pub row: AxisRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<Rc<str>>,
}

impl CellRef {
    pub fn new(col: AxisRef, row: AxisRef, sheet: Option<Rc<str>>) -> Self {
        CellRef { col, row, sheet }
    }

    /// Renders `[$]col[$]row[!sheet]` text, resolving relative axes against
    /// `(base_col, base_row)` (`spec.md` §6).
    pub fn render(&self, base_col: i64, base_row: i64) -> String {
        let (resolved_col, resolved_row) = self.resolve(base_col, base_row);
        sheet_format::format_cell_ref(&sheet_format::CellRefParts {
            col_absolute: self.col.absolute,
            col_literal: self.col.value,
            row_absolute: self.row.absolute,
            row_literal: self.row.value,
            resolved_col,
            resolved_row,
            sheet: self.sheet.as_ref().map(|s| s.to_string()),
        })
    }

    /// Resolves both axes against the evaluating cell's `(col, row)`.
    pub fn resolve(&self, base_col: i64, base_row: i64) -> (i64, i64) {
        (
            self.col.resolve(base_col, MAX_COL),
            self.row.resolve(base_row, MAX_ROW),
        )
    }

    pub fn is_fully_absolute(&self) -> bool {
        self.col.absolute && self.row.absolute
    }
}

/// A rectangular span between two cell references (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CellRange {
    pub top_left: CellRef,
    pub bottom_right: CellRef,
}

impl CellRange {
    pub fn new(top_left: CellRef, bottom_right: CellRef) -> Self {
        CellRange { top_left, bottom_right }
    }

    /// Resolves both corners against the evaluating cell, returning
    /// `(min_col, min_row, max_col, max_row)` so callers don't need to sort
    /// a possibly-inverted rectangle themselves.
    pub fn resolve_bounds(&self, base_col: i64, base_row: i64) -> (i64, i64, i64, i64) {
        let (c1, r1) = self.top_left.resolve(base_col, base_row);
        let (c2, r2) = self.bottom_right.resolve(base_col, base_row);
        (c1.min(c2), r1.min(r2), c1.max(c2), r1.max(r2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn absolute_axis_is_position_invariant() {
        let axis = AxisRef::absolute(10);
        assert_eq!(axis.resolve(0, MAX_COL), 10);
        assert_eq!(axis.resolve(99999, MAX_COL), 10);
    }

    #[test]
    fn relative_axis_wraps_negative_offsets() {
        let axis = AxisRef::relative(-1);
        assert_eq!(axis.resolve(0, MAX_COL), MAX_COL - 1);
    }

    #[test]
    fn relative_axis_wraps_overflow() {
        let axis = AxisRef::relative(1);
        assert_eq!(axis.resolve(MAX_COL - 1, MAX_COL), 0);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn wrap_arithmetic_matches_spec_law(base in 0i64..MAX_COL, delta in -1_000_000i64..1_000_000) {
            let axis = AxisRef::relative(delta);
            let resolved = axis.resolve(base, MAX_COL);
            let expected = ((base + delta).rem_euclid(MAX_COL) + MAX_COL) % MAX_COL;
            prop_assert_eq!(resolved, expected);
            prop_assert!((0..MAX_COL).contains(&resolved));
        }
    }
}
