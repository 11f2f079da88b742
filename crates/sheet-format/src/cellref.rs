use crate::column::column_to_string;

/// Primitive, already-resolved pieces of a cell reference, ready to render.
/// `col`/`row` are the 0-based *resolved* coordinates (base position plus
/// offset, already wrapped); `col_literal`/`row_literal` are the raw stored
/// integers (absolute index, or signed relative offset) used only when the
/// corresponding axis is absolute, since an absolute axis is
/// position-invariant and must print its stored value, not a resolution
/// against some base (`spec.md` §3, `CellRefValue::toString`).
pub struct CellRefParts {
    pub col_absolute: bool,
    pub col_literal: i64,
    pub row_absolute: bool,
    pub row_literal: i64,
    pub resolved_col: i64,
    pub resolved_row: i64,
    pub sheet: Option<String>,
}

/// Renders a cell reference as `[$]col[$]row[!sheet]`. Row text is 1-based
/// (internal storage is 0-based throughout; this is the one place that
/// converts back — see DESIGN.md "Open Question decision").
pub fn format_cell_ref(parts: &CellRefParts) -> String {
    let col_text = if parts.col_absolute {
        column_to_string(parts.col_literal)
    } else {
        column_to_string(parts.resolved_col)
    };
    let row_text = if parts.row_absolute {
        (parts.row_literal + 1).to_string()
    } else {
        (parts.resolved_row + 1).to_string()
    };
    let mut out = String::new();
    if parts.col_absolute {
        out.push('$');
    }
    out.push_str(&col_text);
    if parts.row_absolute {
        out.push('$');
    }
    out.push_str(&row_text);
    if let Some(sheet) = &parts.sheet {
        out.push('!');
        out.push_str(sheet);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parts(col_abs: bool, col: i64, row_abs: bool, row: i64, resolved_col: i64, resolved_row: i64) -> CellRefParts {
        CellRefParts {
            col_absolute: col_abs,
            col_literal: col,
            row_absolute: row_abs,
            row_literal: row,
            resolved_col,
            resolved_row,
            sheet: None,
        }
    }

    #[test]
    fn fully_absolute_prints_stored_integers() {
        let p = parts(true, 0, true, 0, 99, 99);
        assert_eq!(format_cell_ref(&p), "$A$1");
    }

    #[test]
    fn fully_relative_prints_resolved_position() {
        let p = parts(false, 1, false, 1, 2, 4);
        assert_eq!(format_cell_ref(&p), "C5");
    }

    #[test]
    fn sheet_suffix_is_appended() {
        let mut p = parts(true, 0, true, 0, 0, 0);
        p.sheet = Some("Sheet2".to_string());
        assert_eq!(format_cell_ref(&p), "$A$1!Sheet2");
    }
}
