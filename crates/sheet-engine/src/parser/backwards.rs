//! The Backwards recursive-descent parser (`spec.md` §4.2): statements and
//! expressions, Pascal-flavored keywords, panic-mode recovery that
//! resynchronizes on the next top-level statement starter or `function`.

use std::rc::Rc;
use rust_decimal::Decimal;

use crate::ast::{BinaryOp, Expression, Lvalue, Statement, TernaryOp, UnaryOp};
use crate::errors::{ParseError, Position};
use crate::lexer::backwards::{BackwardsLexemeKind, BackwardsLexer, BackwardsToken, Keyword};
use crate::lexer::Punct;
use crate::symtab::SymbolTable;
use crate::value::{Number, Value};
use sheet_model::Lexeme;

pub struct BackwardsParser<'a> {
    lexer: BackwardsLexer<'a>,
    current: BackwardsToken,
    symtab: SymbolTable,
    errors: Vec<ParseError>,
}

/// Keywords that end the current statement sequence; also the recovery
/// targets panic-mode synchronization looks for.
const BLOCK_ENDERS: &[Keyword] = &[Keyword::End, Keyword::Else, Keyword::ElseIf];

impl<'a> BackwardsParser<'a> {
    pub fn new(source: &'a str, source_name: impl Into<String>) -> Self {
        Self::with_symtab(source, source_name, SymbolTable::new())
    }

    /// Used when the standard library's names must already be resolvable
    /// (e.g. compiling a real program against the engine's builtin table);
    /// see `SymbolTable::with_builtins`.
    pub fn with_symtab(source: &'a str, source_name: impl Into<String>, symtab: SymbolTable) -> Self {
        let mut lexer = BackwardsLexer::new(source, source_name);
        let current = lexer.get_next_token();
        BackwardsParser { lexer, current, symtab, errors: Vec::new() }
    }

    /// Returns the parsed program, any recovered errors, and the total
    /// number of global slots now in use (builtins plus any new top-level
    /// declarations) so the caller can size its global value array.
    pub fn parse_program(mut self) -> (Rc<Statement>, Vec<ParseError>, usize) {
        let statements = self.parse_statement_seq(&[]);
        let global_count = self.symtab.global_slot_count();
        (Rc::new(Statement::Block(statements)), self.errors, global_count)
    }

    // --- token cursor -----------------------------------------------

    fn position(&self) -> Position {
        Position { line: self.current.line, column: self.current.column }
    }

    fn advance(&mut self) -> BackwardsToken {
        let next = self.lexer.get_next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn at_eof(&self) -> bool {
        self.current.kind.is_eof()
    }

    fn at_punct(&self, p: Punct) -> bool {
        matches!(&self.current.kind, BackwardsLexemeKind::Punct(actual) if *actual == p)
    }

    fn at_keyword(&self, k: Keyword) -> bool {
        matches!(&self.current.kind, BackwardsLexemeKind::Keyword(actual) if *actual == k)
    }

    fn at_any_keyword(&self, ks: &[Keyword]) -> bool {
        ks.iter().any(|k| self.at_keyword(*k))
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

    fn eat_keyword(&mut self, k: Keyword, context: &str) -> bool {
        if self.at_keyword(k) {
            self.advance();
            true
        } else {
            self.error(format!("expected '{k:?}' {context}"));
            false
        }
    }

    fn error(&mut self, message: String) {
        self.errors.push(ParseError { message, position: self.position() });
    }

    /// Skips tokens until a statement-sequence terminator, `function`, or
    /// end of input (`spec.md` §4.2 panic-mode recovery).
    fn synchronize(&mut self) {
        while !self.at_eof() && !self.at_any_keyword(BLOCK_ENDERS) && !self.at_keyword(Keyword::Function) {
            self.advance();
        }
    }

    // --- declarations & statements ------------------------------------

    /// Declares `name` into whichever scope the declaration appears in: a
    /// unique global at top level (duplicate top-level names are rejected,
    /// matching the original grammar's `functionDecl*` uniqueness), or an
    /// ordinary fresh local when nested inside another function — the same
    /// auto-declare rule any other new local name gets.
    fn parse_function_decl(&mut self) -> Rc<Statement> {
        let pos = self.position();
        self.advance(); // `function`
        let name = self.expect_identifier("after 'function'");
        let target = if self.symtab.in_function() {
            self.symtab.resolve_write(&name)
        } else {
            match self.symtab.declare_unique_global(&name, pos) {
                Ok(slot) => Lvalue::Global(slot),
                Err(e) => {
                    self.errors.push(ParseError { message: e.message, position: e.position });
                    Lvalue::Global(0)
                }
            }
        };
        self.eat_punct(Punct::LParen, "after function name");
        let mut params = Vec::new();
        if !self.at_punct(Punct::RParen) {
            loop {
                params.push(self.expect_identifier("in parameter list"));
                if self.at_punct(Punct::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat_punct(Punct::RParen, "after parameter list");
        self.eat_keyword(Keyword::Is, "after parameter list");
        if let Err(e) = self.symtab.enter_function(&params, pos) {
            self.errors.push(ParseError { message: e.message, position: e.position });
        }
        let body = Rc::new(Statement::Block(self.parse_statement_seq(&[Keyword::End])));
        let slot_count = self.symtab.exit_function();
        self.eat_keyword(Keyword::End, "to close function body");
        Rc::new(Statement::FunctionDecl { name, target, params, body, slot_count })
    }

    fn expect_identifier(&mut self, context: &str) -> String {
        if let BackwardsLexemeKind::Identifier(name) = self.current.kind.clone() {
            self.advance();
            name
        } else {
            self.error(format!("expected identifier {context}"));
            String::new()
        }
    }

    fn parse_statement_seq(&mut self, enders: &[Keyword]) -> Vec<(Position, Rc<Statement>)> {
        let mut statements = Vec::new();
        loop {
            if self.at_eof() || self.at_any_keyword(enders) {
                break;
            }
            let pos = self.position();
            statements.push((pos, self.parse_statement()));
        }
        statements
    }

    fn parse_statement(&mut self) -> Rc<Statement> {
        let stmt = match &self.current.kind {
            BackwardsLexemeKind::Keyword(Keyword::Function) => return self.parse_function_decl(),
            BackwardsLexemeKind::Keyword(Keyword::If) => self.parse_if(),
            BackwardsLexemeKind::Keyword(Keyword::While) => self.parse_while(),
            BackwardsLexemeKind::Keyword(Keyword::For) => self.parse_for(),
            BackwardsLexemeKind::Keyword(Keyword::Return) => self.parse_return(),
            BackwardsLexemeKind::Keyword(Keyword::Break) => {
                self.advance();
                Statement::Break
            }
            BackwardsLexemeKind::Keyword(Keyword::Continue) => {
                self.advance();
                Statement::Continue
            }
            BackwardsLexemeKind::Identifier(_) => self.parse_assignment_or_call(),
            _ => {
                self.error("expected a statement".to_string());
                self.synchronize();
                Statement::Empty
            }
        };
        Rc::new(stmt)
    }

    fn parse_if(&mut self) -> Statement {
        self.advance(); // `if`
        let cond = self.parse_expression();
        self.eat_keyword(Keyword::Then, "after if condition");
        let then_branch = Rc::new(Statement::Block(self.parse_statement_seq(BLOCK_ENDERS)));
        let mut else_ifs = Vec::new();
        while self.at_keyword(Keyword::ElseIf) {
            self.advance();
            let cond2 = self.parse_expression();
            self.eat_keyword(Keyword::Then, "after elseif condition");
            let body2 = Rc::new(Statement::Block(self.parse_statement_seq(BLOCK_ENDERS)));
            else_ifs.push((cond2, body2));
        }
        let else_branch = if self.at_keyword(Keyword::Else) {
            self.advance();
            Some(Rc::new(Statement::Block(self.parse_statement_seq(&[Keyword::End]))))
        } else {
            None
        };
        self.eat_keyword(Keyword::End, "to close if statement");
        Statement::If { cond, then_branch, else_ifs, else_branch }
    }

    fn parse_while(&mut self) -> Statement {
        self.advance(); // `while`
        let cond = self.parse_expression();
        self.eat_keyword(Keyword::Do, "after while condition");
        let body = Rc::new(Statement::Block(self.parse_statement_seq(&[Keyword::End])));
        self.eat_keyword(Keyword::End, "to close while statement");
        Statement::While { cond, body }
    }

    fn parse_for(&mut self) -> Statement {
        self.advance(); // `for`
        let name = self.expect_identifier("after 'for'");
        let slot = self.symtab.resolve_write(&name);
        self.eat_punct(Punct::Assign, "after for-loop variable");
        let from = self.parse_expression();
        self.eat_keyword(Keyword::To, "in for-loop range");
        let to = self.parse_expression();
        let step = if self.at_keyword(Keyword::Step) {
            self.advance();
            Some(self.parse_expression())
        } else {
            None
        };
        self.eat_keyword(Keyword::Do, "before for-loop body");
        let body = Rc::new(Statement::Block(self.parse_statement_seq(&[Keyword::End])));
        self.eat_keyword(Keyword::End, "to close for statement");
        Statement::For { slot, from, to, step, body }
    }

    fn parse_return(&mut self) -> Statement {
        self.advance(); // `return`
        if self.at_eof() || self.at_any_keyword(&[Keyword::End, Keyword::Else, Keyword::ElseIf]) {
            Statement::Return(None)
        } else {
            Statement::Return(Some(self.parse_expression()))
        }
    }

    /// `IDENT := expr` (possibly through an index chain, lowered to
    /// `Ternary::SetIndex`) or a bare call/expression statement — both
    /// start by resolving a name, so they share this entry point
    /// (`spec.md` §4.2 grammar's `statement := assignment | ... | call`).
    fn parse_assignment_or_call(&mut self) -> Statement {
        let pos = self.position();
        let name = self.expect_identifier("at start of statement");

        // Plain `name := expr` with no indexing resolves (and may declare)
        // a local/global slot directly, rather than going through a read.
        if self.at_punct(Punct::Assign) {
            let lvalue = self.symtab.resolve_write(&name);
            self.advance();
            let value = self.parse_expression();
            return Statement::Assign(lvalue, value);
        }

        let base = match self.symtab.resolve_read(&name, pos) {
            Ok(expr) => expr,
            Err(e) => {
                self.errors.push(ParseError { message: e.message, position: e.position });
                Expression::Constant(Value::Nil)
            }
        };
        let expr = self.parse_postfix(base);

        if self.at_punct(Punct::Assign) {
            self.advance();
            let value = self.parse_expression();
            if let Expression::Binary(BinaryOp::Index, container, index) = expr {
                Statement::Call(Expression::Ternary(TernaryOp::SetIndex, container, index, Box::new(value)))
            } else {
                self.error("left-hand side of ':=' is not assignable".to_string());
                Statement::Empty
            }
        } else {
            Statement::Call(expr)
        }
    }

    // --- expressions ---------------------------------------------------

    fn parse_expression(&mut self) -> Expression {
        let mut left = self.parse_predicate();
        loop {
            if self.at_keyword(Keyword::And) {
                self.advance();
                let right = self.parse_predicate();
                left = Expression::Binary(BinaryOp::And, Box::new(left), Box::new(right));
            } else if self.at_keyword(Keyword::Or) {
                self.advance();
                let right = self.parse_predicate();
                left = Expression::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        left
    }

    fn parse_predicate(&mut self) -> Expression {
        let left = self.parse_relation();
        if let Some(op) = self.match_comparison() {
            let right = self.parse_relation();
            Expression::Binary(op, Box::new(left), Box::new(right))
        } else {
            left
        }
    }

    fn match_comparison(&mut self) -> Option<BinaryOp> {
        let op = match &self.current.kind {
            BackwardsLexemeKind::Punct(Punct::Lt) => BinaryOp::Lt,
            BackwardsLexemeKind::Punct(Punct::Le) => BinaryOp::Le,
            BackwardsLexemeKind::Punct(Punct::Eq) => BinaryOp::Eq,
            BackwardsLexemeKind::Punct(Punct::Ne) => BinaryOp::Ne,
            BackwardsLexemeKind::Punct(Punct::Gt) => BinaryOp::Gt,
            BackwardsLexemeKind::Punct(Punct::Ge) => BinaryOp::Ge,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_relation(&mut self) -> Expression {
        let mut left = self.parse_simple();
        loop {
            let op = match &self.current.kind {
                BackwardsLexemeKind::Punct(Punct::Plus) => BinaryOp::Add,
                BackwardsLexemeKind::Punct(Punct::Minus) => BinaryOp::Sub,
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
                BackwardsLexemeKind::Punct(Punct::Star) => BinaryOp::Mul,
                BackwardsLexemeKind::Punct(Punct::Slash) => BinaryOp::Div,
                BackwardsLexemeKind::Punct(Punct::Percent) => BinaryOp::Mod,
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
        } else if self.at_keyword(Keyword::Not) {
            self.advance();
            Expression::Unary(UnaryOp::Not, Box::new(self.parse_unary()))
        } else {
            self.parse_referent()
        }
    }

    fn parse_referent(&mut self) -> Expression {
        if self.at_punct(Punct::LBracket) {
            let array = self.parse_array_builder();
            self.parse_postfix(array)
        } else if self.at_punct(Punct::LBrace) {
            let dict = self.parse_dict_builder();
            self.parse_postfix(dict)
        } else {
            let primary = self.parse_primary();
            self.parse_postfix(primary)
        }
    }

    fn parse_array_builder(&mut self) -> Expression {
        self.advance(); // `[`
        let mut items = Vec::new();
        if !self.at_punct(Punct::RBracket) {
            loop {
                items.push(self.parse_expression());
                if self.at_punct(Punct::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat_punct(Punct::RBracket, "to close array literal");
        Expression::BuildArray(items)
    }

    fn parse_dict_builder(&mut self) -> Expression {
        self.advance(); // `{`
        let mut entries = Vec::new();
        if !self.at_punct(Punct::RBrace) {
            loop {
                let key = self.parse_expression();
                self.eat_punct(Punct::Colon, "between dictionary key and value");
                let value = self.parse_expression();
                entries.push((key, value));
                if self.at_punct(Punct::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat_punct(Punct::RBrace, "to close dictionary literal");
        Expression::BuildDictionary(entries)
    }

    fn parse_postfix(&mut self, mut expr: Expression) -> Expression {
        loop {
            if self.at_punct(Punct::LParen) {
                let args = self.parse_call_args();
                expr = Expression::FunctionCall(Box::new(expr), args);
            } else if self.at_punct(Punct::LBracket) {
                self.advance();
                let index = self.parse_expression();
                self.eat_punct(Punct::RBracket, "to close index expression");
                expr = Expression::Binary(BinaryOp::Index, Box::new(expr), Box::new(index));
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

    fn parse_primary(&mut self) -> Expression {
        match self.current.kind.clone() {
            BackwardsLexemeKind::Integer(n) => {
                self.advance();
                Expression::Constant(Value::float(Number::Finite(Decimal::from(n))))
            }
            BackwardsLexemeKind::Decimal(d) => {
                self.advance();
                Expression::Constant(Value::float(Number::Finite(d)))
            }
            BackwardsLexemeKind::Str(s) => {
                self.advance();
                Expression::Constant(Value::Str(s))
            }
            BackwardsLexemeKind::Keyword(Keyword::True) => {
                self.advance();
                Expression::Constant(Value::float(Number::Finite(Decimal::ONE)))
            }
            BackwardsLexemeKind::Keyword(Keyword::False) => {
                self.advance();
                Expression::Constant(Value::float(Number::Finite(Decimal::ZERO)))
            }
            BackwardsLexemeKind::Identifier(name) => {
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
            BackwardsLexemeKind::Punct(Punct::LParen) => {
                self.advance();
                let inner = self.parse_expression();
                self.eat_punct(Punct::RParen, "to close parenthesized expression");
                inner
            }
            _ => {
                self.error("expected an expression".to_string());
                self.synchronize();
                Expression::Constant(Value::Nil)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Rc<Statement>, Vec<ParseError>) {
        let (program, errors, _) = BackwardsParser::new(source, "test").parse_program();
        (program, errors)
    }

    #[test]
    fn simple_assignment_declares_a_global() {
        let (program, errors) = parse("x := 1 + 2");
        assert!(errors.is_empty(), "{errors:?}");
        match &*program {
            Statement::Block(stmts) => {
                assert_eq!(stmts.len(), 1);
                assert!(matches!(&*stmts[0].1, Statement::Assign(Lvalue::Global(0), _)));
            }
            _ => panic!("expected a block"),
        }
    }

    #[test]
    fn function_declaration_with_recursive_call_resolves() {
        let (program, errors) = parse(
            "function fact(n) is\n\
             if n <= 1 then\n\
               return 1\n\
             end\n\
             return n * fact(n - 1)\n\
             end\n\
             result := fact(5)",
        );
        assert!(errors.is_empty(), "{errors:?}");
        match &*program {
            Statement::Block(stmts) => assert_eq!(stmts.len(), 2),
            _ => panic!("expected a block"),
        }
    }

    #[test]
    fn undefined_name_is_a_symbol_error_not_a_panic() {
        let (_, errors) = parse("x := y + 1");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn indexed_assignment_lowers_to_set_index() {
        let (program, errors) = parse("a := [1, 2, 3]\na[0] := 5");
        assert!(errors.is_empty(), "{errors:?}");
        match &*program {
            Statement::Block(stmts) => {
                assert!(matches!(&*stmts[1].1, Statement::Call(Expression::Ternary(TernaryOp::SetIndex, ..))));
            }
            _ => panic!("expected a block"),
        }
    }
}
