//! Scanning primitives shared by the Backwards and Forwards lexers
//! (`spec.md` §4.1: identifiers, numeric and string literals, and the
//! punctuation/operator set are a shared concern; comments and
//! cell-reference tokens are not).

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::Position;
use crate::input::BufferedInput;

/// Operators and punctuation used by both grammars. Each language's parser
/// only ever matches a subset of these (`spec.md` §4.2's `+ - * / %` for
/// Forwards vs. the fuller Backwards set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Bang,
    Dollar,
}

pub fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

pub fn is_ident_continue(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_continue(c)
}

fn peek_char(input: &mut BufferedInput, lookahead: usize) -> Option<char> {
    input.peek(lookahead).map(|b| b as char)
}

pub fn skip_whitespace(input: &mut BufferedInput, pos: &mut Position) {
    while let Some(c) = peek_char(input, 0) {
        if c.is_whitespace() {
            advance(input, pos);
        } else {
            break;
        }
    }
}

/// Consumes one byte, updating `(line, column)` — a newline resets column
/// to 1 and advances the line (`spec.md` §3 "Token: ... line, column").
pub fn advance(input: &mut BufferedInput, pos: &mut Position) -> Option<u8> {
    let byte = input.consume();
    if byte == Some(b'\n') {
        pos.line += 1;
        pos.column = 1;
    } else if byte.is_some() {
        pos.column += 1;
    }
    byte
}

pub fn scan_identifier(input: &mut BufferedInput, pos: &mut Position) -> String {
    let mut text = String::new();
    while let Some(c) = peek_char(input, 0) {
        if is_ident_continue(c) {
            text.push(c);
            advance(input, pos);
        } else {
            break;
        }
    }
    text
}

pub enum NumberLiteral {
    Integer(i64),
    Decimal(Decimal),
    Malformed(String),
}

/// Scans a run of digits, an optional `.digits` fraction, and an optional
/// `[eE][+-]digits` exponent (`spec.md` §4.1 "numeric literal with
/// malformed exponent" is a lex error, not a parse error).
pub fn scan_number(input: &mut BufferedInput, pos: &mut Position) -> NumberLiteral {
    let mut text = String::new();
    let mut is_decimal = false;

    while let Some(c) = peek_char(input, 0) {
        if c.is_ascii_digit() {
            text.push(c);
            advance(input, pos);
        } else {
            break;
        }
    }

    if peek_char(input, 0) == Some('.') && peek_char(input, 1).is_some_and(|c| c.is_ascii_digit()) {
        is_decimal = true;
        text.push('.');
        advance(input, pos);
        while let Some(c) = peek_char(input, 0) {
            if c.is_ascii_digit() {
                text.push(c);
                advance(input, pos);
            } else {
                break;
            }
        }
    }

    if matches!(peek_char(input, 0), Some('e') | Some('E')) {
        let mut exponent = String::new();
        exponent.push(peek_char(input, 0).unwrap());
        let mut lookahead = 1;
        if matches!(peek_char(input, lookahead), Some('+') | Some('-')) {
            exponent.push(peek_char(input, lookahead).unwrap());
            lookahead += 1;
        }
        let digits_start = lookahead;
        while peek_char(input, lookahead).is_some_and(|c| c.is_ascii_digit()) {
            exponent.push(peek_char(input, lookahead).unwrap());
            lookahead += 1;
        }
        if lookahead == digits_start {
            for _ in 0..lookahead {
                advance(input, pos);
            }
            return NumberLiteral::Malformed(format!("malformed exponent in numeric literal '{text}{exponent}'"));
        }
        for _ in 0..lookahead {
            advance(input, pos);
        }
        is_decimal = true;
        text.push_str(&exponent);
    }

    if is_decimal {
        match Decimal::from_scientific(&text).or_else(|_| Decimal::from_str(&text)) {
            Ok(d) => NumberLiteral::Decimal(d),
            Err(_) => NumberLiteral::Malformed(format!("invalid decimal literal '{text}'")),
        }
    } else {
        match text.parse::<i64>() {
            Ok(n) => NumberLiteral::Integer(n),
            Err(_) => NumberLiteral::Malformed(format!("integer literal '{text}' out of range")),
        }
    }
}

pub enum StringLiteral {
    Ok(String),
    Unterminated,
}

/// Scans a double-quoted string with `\\ \" \n \t` escapes (`spec.md`
/// §4.1). The opening quote has already been consumed by the caller.
pub fn scan_string_body(input: &mut BufferedInput, pos: &mut Position) -> StringLiteral {
    let mut text = String::new();
    loop {
        match peek_char(input, 0) {
            None => return StringLiteral::Unterminated,
            Some('"') => {
                advance(input, pos);
                return StringLiteral::Ok(text);
            }
            Some('\\') => {
                advance(input, pos);
                match peek_char(input, 0) {
                    Some('\\') => { text.push('\\'); advance(input, pos); }
                    Some('"') => { text.push('"'); advance(input, pos); }
                    Some('n') => { text.push('\n'); advance(input, pos); }
                    Some('t') => { text.push('\t'); advance(input, pos); }
                    Some(other) => { text.push('\\'); text.push(other); advance(input, pos); }
                    None => return StringLiteral::Unterminated,
                }
            }
            Some(c) => {
                text.push(c);
                advance(input, pos);
            }
        }
    }
}
