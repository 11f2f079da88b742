//! The Forwards lexer (`spec.md` §4.1): no comments, adds cell-reference
//! tokens (`[$]letters[$]digits[!sheet]`), row literals are 1-based in
//! text and converted to 0-based here at scan time.

use rust_decimal::Decimal;

use sheet_format::string_to_column;
use sheet_model::token::{Lexeme, Span, Token};

use crate::errors::Position;
use crate::input::BufferedInput;
use crate::lexer::shared::{
    advance, is_ident_start, scan_identifier, scan_number, scan_string_body, skip_whitespace,
    NumberLiteral, Punct, StringLiteral,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CellRefLiteral {
    pub col_absolute: bool,
    pub col: i64,
    pub row_absolute: bool,
    /// Already converted to 0-based (`spec.md` §4.1).
    pub row: i64,
    pub sheet: Option<String>,
}

#[derive(Clone, PartialEq)]
pub enum ForwardsLexemeKind {
    Identifier(String),
    Integer(i64),
    Decimal(Decimal),
    Str(String),
    Punct(Punct),
    CellRef(CellRefLiteral),
    Error(String),
    Eof,
}

impl Lexeme for ForwardsLexemeKind {
    fn is_eof(&self) -> bool {
        matches!(self, ForwardsLexemeKind::Eof)
    }
    fn is_error(&self) -> bool {
        matches!(self, ForwardsLexemeKind::Error(_))
    }
}

pub type ForwardsToken = Token<ForwardsLexemeKind>;

pub struct ForwardsLexer<'a> {
    input: BufferedInput<'a>,
    pos: Position,
    source_name: String,
    lookahead: Option<ForwardsToken>,
}

impl<'a> ForwardsLexer<'a> {
    pub fn new(source: &'a str, source_name: impl Into<String>) -> Self {
        ForwardsLexer {
            input: BufferedInput::new(source),
            pos: Position { line: 1, column: 1 },
            source_name: source_name.into(),
            lookahead: None,
        }
    }

    pub fn peek_next_token(&mut self) -> &ForwardsToken {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.scan());
        }
        self.lookahead.as_ref().unwrap()
    }

    pub fn get_next_token(&mut self) -> ForwardsToken {
        if let Some(token) = self.lookahead.take() {
            return token;
        }
        self.scan()
    }

    fn peek_char(&mut self, lookahead: usize) -> Option<char> {
        self.input.peek(lookahead).map(|b| b as char)
    }

    /// `[$]letters[$]digits[!sheetName]` starting at a letter or `$`
    /// (`spec.md` §4.1). `start` is whichever of those triggered the call;
    /// it has not been consumed yet.
    fn try_scan_cell_ref(&mut self) -> Option<ForwardsLexemeKind> {
        let mut lookahead = 0usize;
        let mut col_absolute = false;
        if self.peek_char(lookahead) == Some('$') {
            col_absolute = true;
            lookahead += 1;
        }
        let letters_start = lookahead;
        while self.peek_char(lookahead).is_some_and(|c| c.is_ascii_alphabetic()) {
            lookahead += 1;
        }
        if lookahead == letters_start {
            return None;
        }
        let mut row_absolute = false;
        let mut probe = lookahead;
        if self.peek_char(probe) == Some('$') {
            row_absolute = true;
            probe += 1;
        }
        let digits_start = probe;
        while self.peek_char(probe).is_some_and(|c| c.is_ascii_digit()) {
            probe += 1;
        }
        if probe == digits_start {
            return None;
        }

        let mut letters = String::new();
        let mut digits = String::new();
        for _ in 0..(if col_absolute { 1 } else { 0 }) {
            advance(&mut self.input, &mut self.pos);
        }
        while self.peek_char(0).is_some_and(|c| c.is_ascii_alphabetic()) {
            letters.push(self.peek_char(0).unwrap());
            advance(&mut self.input, &mut self.pos);
        }
        if row_absolute {
            advance(&mut self.input, &mut self.pos);
        }
        while self.peek_char(0).is_some_and(|c| c.is_ascii_digit()) {
            digits.push(self.peek_char(0).unwrap());
            advance(&mut self.input, &mut self.pos);
        }

        let col = match string_to_column(&letters) {
            Ok(c) => c,
            Err(e) => return Some(ForwardsLexemeKind::Error(e.to_string())),
        };
        let row_one_based: i64 = match digits.parse() {
            Ok(n) => n,
            Err(_) => return Some(ForwardsLexemeKind::Error(format!("row literal '{digits}' out of range"))),
        };
        if row_one_based < 1 {
            return Some(ForwardsLexemeKind::Error("row literals are 1-based and must be positive".into()));
        }
        let row = row_one_based - 1;

        let sheet = if self.peek_char(0) == Some('!') {
            advance(&mut self.input, &mut self.pos);
            let name = scan_identifier(&mut self.input, &mut self.pos);
            if name.is_empty() {
                return Some(ForwardsLexemeKind::Error("expected sheet name after '!'".into()));
            }
            Some(name)
        } else {
            None
        };

        Some(ForwardsLexemeKind::CellRef(CellRefLiteral { col_absolute, col, row_absolute, row, sheet }))
    }

    fn scan(&mut self) -> ForwardsToken {
        // Forwards has no comments, only whitespace to strip (`spec.md` §4.1).
        skip_whitespace(&mut self.input, &mut self.pos);
        let start_pos = self.pos;

        let (kind, text) = match self.peek_char(0) {
            None => (ForwardsLexemeKind::Eof, String::new()),
            Some(c) => {
                if c == '$' || c.is_ascii_alphabetic() {
                    // `try_scan_cell_ref` only commits (advances the input)
                    // once its lookahead probe has confirmed the full
                    // `letters digits` shape, so a `None` here is guaranteed
                    // to have consumed nothing and falling through to plain
                    // identifier scanning is safe.
                    if let Some(cell_ref) = self.try_scan_cell_ref() {
                        (cell_ref, String::new())
                    } else if is_ident_start(c) {
                        let text = scan_identifier(&mut self.input, &mut self.pos);
                        (ForwardsLexemeKind::Identifier(text.clone()), text)
                    } else {
                        (self.scan_punct(c), String::new())
                    }
                } else if c.is_ascii_digit() {
                    let kind = match scan_number(&mut self.input, &mut self.pos) {
                        NumberLiteral::Integer(n) => ForwardsLexemeKind::Integer(n),
                        NumberLiteral::Decimal(d) => ForwardsLexemeKind::Decimal(d),
                        NumberLiteral::Malformed(msg) => ForwardsLexemeKind::Error(msg),
                    };
                    (kind, String::new())
                } else if c == '"' {
                    advance(&mut self.input, &mut self.pos);
                    let kind = match scan_string_body(&mut self.input, &mut self.pos) {
                        StringLiteral::Ok(s) => ForwardsLexemeKind::Str(s),
                        StringLiteral::Unterminated => ForwardsLexemeKind::Error("unterminated string literal".into()),
                    };
                    (kind, String::new())
                } else if is_ident_start(c) {
                    let text = scan_identifier(&mut self.input, &mut self.pos);
                    (ForwardsLexemeKind::Identifier(text.clone()), text)
                } else {
                    (self.scan_punct(c), String::new())
                }
            }
        };

        ForwardsToken {
            kind,
            text,
            source_name: self.source_name.clone(),
            line: start_pos.line,
            column: start_pos.column,
            span: Span { start: 0, end: 0 },
        }
    }

    fn scan_punct(&mut self, c: char) -> ForwardsLexemeKind {
        advance(&mut self.input, &mut self.pos);
        let punct = match c {
            '+' => Punct::Plus,
            '-' => Punct::Minus,
            '*' => Punct::Star,
            '/' => Punct::Slash,
            '%' => Punct::Percent,
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            ',' => Punct::Comma,
            '=' => Punct::Eq,
            '<' => {
                if self.peek_char(0) == Some('>') {
                    advance(&mut self.input, &mut self.pos);
                    Punct::Ne
                } else if self.peek_char(0) == Some('=') {
                    advance(&mut self.input, &mut self.pos);
                    Punct::Le
                } else {
                    Punct::Lt
                }
            }
            '>' => {
                if self.peek_char(0) == Some('=') {
                    advance(&mut self.input, &mut self.pos);
                    Punct::Ge
                } else {
                    Punct::Gt
                }
            }
            ':' => Punct::Colon,
            other => return ForwardsLexemeKind::Error(format!("illegal character '{other}'")),
        };
        ForwardsLexemeKind::Punct(punct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_cell_reference_is_relative_and_zero_based() {
        let mut lexer = ForwardsLexer::new("A1", "test");
        let token = lexer.get_next_token();
        match token.kind {
            ForwardsLexemeKind::CellRef(r) => {
                assert_eq!(r.col, 0);
                assert_eq!(r.row, 0);
                assert!(!r.col_absolute && !r.row_absolute);
            }
            other => panic!("expected CellRef, got {other:?}"),
        }
    }

    #[test]
    fn absolute_cell_reference_with_sheet_suffix() {
        let mut lexer = ForwardsLexer::new("$B$2!Sheet2", "test");
        let token = lexer.get_next_token();
        match token.kind {
            ForwardsLexemeKind::CellRef(r) => {
                assert_eq!(r.col, 1);
                assert_eq!(r.row, 1);
                assert!(r.col_absolute && r.row_absolute);
                assert_eq!(r.sheet.as_deref(), Some("Sheet2"));
            }
            other => panic!("expected CellRef, got {other:?}"),
        }
    }

    #[test]
    fn bare_function_name_is_not_mistaken_for_a_cell_reference() {
        let mut lexer = ForwardsLexer::new("Sqr(4)", "test");
        let token = lexer.get_next_token();
        assert!(matches!(token.kind, ForwardsLexemeKind::Identifier(ref s) if s == "Sqr"));
    }

    #[test]
    fn column_coding_is_bijective_base_26() {
        let mut lexer = ForwardsLexer::new("AA1", "test");
        match lexer.get_next_token().kind {
            ForwardsLexemeKind::CellRef(r) => assert_eq!(r.col, 26),
            other => panic!("expected CellRef, got {other:?}"),
        }
    }

    #[test]
    fn forwards_has_no_comments() {
        let mut lexer = ForwardsLexer::new("#notacomment", "test");
        let token = lexer.get_next_token();
        assert!(matches!(token.kind, ForwardsLexemeKind::Error(_)));
    }
}

impl std::fmt::Debug for ForwardsLexemeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardsLexemeKind::Identifier(s) => write!(f, "Identifier({s})"),
            ForwardsLexemeKind::Integer(n) => write!(f, "Integer({n})"),
            ForwardsLexemeKind::Decimal(d) => write!(f, "Decimal({d})"),
            ForwardsLexemeKind::Str(s) => write!(f, "Str({s:?})"),
            ForwardsLexemeKind::Punct(p) => write!(f, "Punct({p:?})"),
            ForwardsLexemeKind::CellRef(r) => write!(f, "CellRef({r:?})"),
            ForwardsLexemeKind::Error(m) => write!(f, "Error({m})"),
            ForwardsLexemeKind::Eof => write!(f, "Eof"),
        }
    }
}
