//! The Forwards parser (`spec.md` §4.2): a single expression per cell, with
//! cell-reference primaries, `+ - * / %`, unary `-`, comparison, and
//! function calls — no statements, no assignment, no flow control.

use rust_decimal::Decimal;

use sheet_model::cellref::{AxisRef, CellRange, CellRef};

use crate::ast::{BinaryOp, Expression, UnaryOp};
use crate::errors::{ParseError, Position};
use crate::lexer::forwards::{CellRefLiteral, ForwardsLexemeKind, ForwardsLexer, ForwardsToken};
use crate::lexer::Punct;
use crate::symtab::SymbolTable;
use crate::value::{Number, Value};
use sheet_model::Lexeme;

pub struct ForwardsParser<'a> {
    lexer: ForwardsLexer<'a>,
    current: ForwardsToken,
    symtab: SymbolTable,
    errors: Vec<ParseError>,
}

impl<'a> ForwardsParser<'a> {
    pub fn new(source: &'a str, source_name: impl Into<String>, symtab: SymbolTable) -> Self {
        let mut lexer = ForwardsLexer::new(source, source_name);
        let current = lexer.get_next_token();
        ForwardsParser { lexer, current, symtab, errors: Vec::new() }
    }

    /// Parses the cell's expression. Panic-mode recovery here just means
    /// "skip to end of input" (`spec.md` §4.2) — there's no second
    /// statement to resynchronize onto in a single-expression grammar.
    pub fn parse_cell(mut self) -> (Expression, Vec<ParseError>) {
        let expr = self.parse_expression();
        if !self.at_eof() {
            self.error("unexpected trailing tokens after cell expression".to_string());
            while !self.at_eof() {
                self.advance();
            }
        }
        (expr, self.errors)
    }

    fn position(&self) -> Position {
        Position { line: self.current.line, column: self.current.column }
    }

    fn advance(&mut self) -> ForwardsToken {
        let next = self.lexer.get_next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn at_eof(&self) -> bool {
        self.current.kind.is_eof()
    }

    fn at_punct(&self, p: Punct) -> bool {
        matches!(&self.current.kind, ForwardsLexemeKind::Punct(actual) if *actual == p)
    }

    fn eat_punct(&mut self, p: Punct, context: &str) -> bool {
        if self.at_punct(p) {
            self.advance();
            true
        } else {
            self.error(format!("expected '{p:?}' {context}"));
            false
        }
    }

    fn error(&mut self, message: String) {
        self.errors.push(ParseError { message, position: self.position() });
    }

    fn parse_expression(&mut self) -> Expression {
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Expression {
        let left = self.parse_relation();
        let op = match &self.current.kind {
            ForwardsLexemeKind::Punct(Punct::Lt) => Some(BinaryOp::Lt),
            ForwardsLexemeKind::Punct(Punct::Le) => Some(BinaryOp::Le),
            ForwardsLexemeKind::Punct(Punct::Eq) => Some(BinaryOp::Eq),
            ForwardsLexemeKind::Punct(Punct::Ne) => Some(BinaryOp::Ne),
            ForwardsLexemeKind::Punct(Punct::Gt) => Some(BinaryOp::Gt),
            ForwardsLexemeKind::Punct(Punct::Ge) => Some(BinaryOp::Ge),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let right = self.parse_relation();
                Expression::Binary(op, Box::new(left), Box::new(right))
            }
            None => left,
        }
    }

    fn parse_relation(&mut self) -> Expression {
        let mut left = self.parse_simple();
        loop {
            let op = match &self.current.kind {
                ForwardsLexemeKind::Punct(Punct::Plus) => BinaryOp::Add,
                ForwardsLexemeKind::Punct(Punct::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_simple();
            left = Expression::Binary(op, Box::new(left), Box::new(right));
        }
        left
    }

    fn parse_simple(&mut self) -> Expression {
        let mut left = self.parse_unary();
        loop {
            let op = match &self.current.kind {
                ForwardsLexemeKind::Punct(Punct::Star) => BinaryOp::Mul,
                ForwardsLexemeKind::Punct(Punct::Slash) => BinaryOp::Div,
                ForwardsLexemeKind::Punct(Punct::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary();
            left = Expression::Binary(op, Box::new(left), Box::new(right));
        }
        left
    }

    fn parse_unary(&mut self) -> Expression {
        if self.at_punct(Punct::Minus) {
            self.advance();
            Expression::Unary(UnaryOp::Neg, Box::new(self.parse_unary()))
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Expression {
        let mut expr = self.parse_primary();
        loop {
            if self.at_punct(Punct::LParen) {
                let args = self.parse_call_args();
                expr = Expression::FunctionCall(Box::new(expr), args);
            } else {
                break;
            }
        }
        expr
    }

    fn parse_call_args(&mut self) -> Vec<Expression> {
        self.advance(); // `(`
        let mut args = Vec::new();
        if !self.at_punct(Punct::RParen) {
            loop {
                args.push(self.parse_expression());
                if self.at_punct(Punct::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat_punct(Punct::RParen, "to close call arguments");
        args
    }

    fn cell_ref_literal_to_axis(lit: &CellRefLiteral) -> (AxisRef, AxisRef) {
        let col = if lit.col_absolute { AxisRef::absolute(lit.col) } else { AxisRef::relative(lit.col) };
        let row = if lit.row_absolute { AxisRef::absolute(lit.row) } else { AxisRef::relative(lit.row) };
        (col, row)
    }

    /// A `CellRef` primary may be the top-left of a `:`-joined range
    /// literal (`spec.md` §3 `CellRange`); both corners must come from the
    /// lexer's cell-reference recognition, not arbitrary expressions.
    fn parse_primary(&mut self) -> Expression {
        match self.current.kind.clone() {
            ForwardsLexemeKind::Integer(n) => {
                self.advance();
                Expression::Constant(Value::float(Number::Finite(Decimal::from(n))))
            }
            ForwardsLexemeKind::Decimal(d) => {
                self.advance();
                Expression::Constant(Value::float(Number::Finite(d)))
            }
            ForwardsLexemeKind::Str(s) => {
                self.advance();
                Expression::Constant(Value::Str(s))
            }
            ForwardsLexemeKind::CellRef(lit) => {
                self.advance();
                let (col, row) = Self::cell_ref_literal_to_axis(&lit);
                let sheet = lit.sheet.map(|s| s.into());
                let top_left = CellRef::new(col, row, sheet);
                if self.at_punct(Punct::Colon) {
                    self.advance();
                    match self.current.kind.clone() {
                        ForwardsLexemeKind::CellRef(end_lit) => {
                            self.advance();
                            let (end_col, end_row) = Self::cell_ref_literal_to_axis(&end_lit);
                            let end_sheet = end_lit.sheet.map(|s| s.into());
                            let bottom_right = CellRef::new(end_col, end_row, end_sheet);
                            Expression::CellRangeLiteral(CellRange::new(top_left, bottom_right))
                        }
                        _ => {
                            self.error("expected a cell reference after ':'".to_string());
                            Expression::CellReference(top_left)
                        }
                    }
                } else {
                    Expression::CellReference(top_left)
                }
            }
            ForwardsLexemeKind::Identifier(name) => {
                let pos = self.position();
                self.advance();
                match self.symtab.resolve_read(&name, pos) {
                    Ok(expr) => expr,
                    Err(e) => {
                        self.errors.push(ParseError { message: e.message, position: e.position });
                        Expression::Constant(Value::Nil)
                    }
                }
            }
            ForwardsLexemeKind::Punct(Punct::LParen) => {
                self.advance();
                let inner = self.parse_expression();
                self.eat_punct(Punct::RParen, "to close parenthesized expression");
                inner
            }
            _ => {
                self.error("expected an expression".to_string());
                Expression::Constant(Value::Nil)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Expression, Vec<ParseError>) {
        let symtab = SymbolTable::with_builtins(crate::stdlib::builtin_names());
        ForwardsParser::new(source, "test", symtab).parse_cell()
    }

    #[test]
    fn arithmetic_precedence_matches_the_grammar() {
        let (expr, errors) = parse("1 + 2 * 3");
        assert!(errors.is_empty());
        match expr {
            Expression::Binary(BinaryOp::Add, _, rhs) => {
                assert!(matches!(*rhs, Expression::Binary(BinaryOp::Mul, ..)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn cell_reference_parses_to_a_relative_cell_ref() {
        let (expr, errors) = parse("A1 + 1");
        assert!(errors.is_empty());
        assert!(matches!(expr, Expression::Binary(BinaryOp::Add, ref lhs, _) if matches!(**lhs, Expression::CellReference(_))));
    }

    #[test]
    fn colon_joined_cell_refs_form_a_range_literal() {
        let (expr, errors) = parse("ExpandRange(B1:B3)");
        assert!(errors.is_empty());
        match expr {
            Expression::FunctionCall(_, args) => {
                assert_eq!(args.len(), 1);
                assert!(matches!(args[0], Expression::CellRangeLiteral(_)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn forwards_has_no_statements() {
        let (_, errors) = parse("x := 1");
        assert!(!errors.is_empty());
    }
}
