/// Exclusive upper bound on the 0-based column domain (`spec.md` §6).
pub const MAX_COL: i64 = 475_254;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnParseError {
    #[error("empty column letters")]
    Empty,
    #[error("column letters out of range: {0}")]
    OutOfRange(String),
    #[error("not a letter run: {0}")]
    NotLetters(String),
}

/// Renders a 0-based column index as bijective base-26 letters: `0 -> "A"`,
/// `25 -> "Z"`, `26 -> "AA"`, `701 -> "ZZ"`, `702 -> "AAA"`.
pub fn column_to_string(column: i64) -> String {
    let mut n = column + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Inverse of [`column_to_string`]. Case-insensitive; rejects anything that
/// isn't 1-4 ASCII letters or that overflows the column domain.
pub fn string_to_column(letters: &str) -> Result<i64, ColumnParseError> {
    if letters.is_empty() {
        return Err(ColumnParseError::Empty);
    }
    if !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ColumnParseError::NotLetters(letters.to_string()));
    }
    let mut value: i64 = 0;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A' + 1) as i64;
        value = value * 26 + digit;
    }
    let column = value - 1;
    if column < 0 || column >= MAX_COL {
        return Err(ColumnParseError::OutOfRange(letters.to_string()));
    }
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn column_coding_matches_spec_table() {
        assert_eq!(column_to_string(0), "A");
        assert_eq!(column_to_string(25), "Z");
        assert_eq!(column_to_string(26), "AA");
        assert_eq!(column_to_string(701), "ZZ");
        assert_eq!(column_to_string(702), "AAA");
    }

    #[test]
    fn string_to_column_is_the_inverse() {
        for s in ["A", "Z", "AA", "AZ", "ZZ", "AAA", "XFD"] {
            let n = string_to_column(s).unwrap();
            assert_eq!(column_to_string(n), s);
        }
    }

    #[test]
    fn rejects_non_letters_and_empty() {
        assert_eq!(string_to_column(""), Err(ColumnParseError::Empty));
        assert!(string_to_column("1A").is_err());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn bijection_round_trips(n in 0i64..MAX_COL) {
            let s = column_to_string(n);
            prop_assert_eq!(string_to_column(&s).unwrap(), n);
        }
    }
}
