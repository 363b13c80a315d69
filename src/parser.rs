//! Recursive-descent parser: token stream to `Program`.
//!
//! Expression precedence (lowest to highest): `or`, `and`, `not`,
//! equality/relational, additive, multiplicative, cast, unary, primary.
//! Statement recognition is keyword-driven. Indexed assignment
//! (`order[i] is of ...`) is rejected here, at parse time, with a
//! diagnostic containing "Immutable rite" — mutation of collections is
//! only reachable through the rite statements.

use crate::ast::*;
use crate::token::{Token, TokenKind};
use crate::types::Type;

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

type PResult<T> = Result<T, String>;

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(format!(
                "Unexpected token or missing {} at line {} (found {:?})",
                what,
                self.line(),
                self.peek_kind()
            ))
        }
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            self.advance();
            Ok(name)
        } else {
            Err(format!("Unexpected token or missing identifier at line {}", self.line()))
        }
    }

    // ─── Program / Prologue ────────────────────────────────────────────

    pub fn parse_program(&mut self) -> PResult<Program> {
        let prologue = self.parse_prologue()?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::End) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { prologue, statements })
    }

    /// Optional header `key: value` pairs before the first statement.
    fn parse_prologue(&mut self) -> PResult<Option<ScrollPrologue>> {
        let mut prologue = ScrollPrologue::default();
        let mut saw_any = false;
        loop {
            let checkpoint = self.pos;
            if let TokenKind::Identifier(key) = self.peek_kind().clone() {
                let next_is_colon = matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Colon));
                if !next_is_colon {
                    break;
                }
                self.advance(); // key
                self.advance(); // colon
                let value = if let TokenKind::Str(s) = self.peek_kind().clone() {
                    self.advance();
                    s
                } else if let TokenKind::Identifier(s) = self.peek_kind().clone() {
                    self.advance();
                    s
                } else {
                    self.pos = checkpoint;
                    break;
                };
                match key.to_ascii_lowercase().as_str() {
                    "title" => prologue.title = Some(value),
                    "version" => prologue.version = Some(value),
                    "author" => prologue.author = Some(value),
                    _ => prologue.extras.push((key, value)),
                }
                saw_any = true;
            } else {
                break;
            }
        }
        Ok(if saw_any { Some(prologue) } else { None })
    }

    // ─── Statements ─────────────────────────────────────────────────────

    fn parse_block(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.expect(&TokenKind::LBrace, "block")?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::End) {
                return Err(format!("Unexpected token or missing block at line {}", self.line()));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance(); // }
        Ok(Stmt::new(line, StmtKind::Block(statements)))
    }

    /// A single statement, or `{ ... }`, used where the grammar allows a
    /// bare statement as a loop/if body.
    fn parse_stmt_or_block(&mut self) -> PResult<Stmt> {
        if self.check(&TokenKind::LBrace) {
            self.parse_block()
        } else {
            self.parse_statement()
        }
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        let line = self.line();
        match self.peek_kind().clone() {
            TokenKind::Proclaim => {
                self.advance();
                let e = self.parse_expression()?;
                Ok(Stmt::new(line, StmtKind::Print(e)))
            }
            TokenKind::Return => {
                self.advance();
                if self.starts_expression() {
                    let e = self.parse_expression()?;
                    Ok(Stmt::new(line, StmtKind::Return(Some(e))))
                } else {
                    Ok(Stmt::new(line, StmtKind::Return(None)))
                }
            }
            TokenKind::Become => {
                self.advance();
                Ok(Stmt::new(line, StmtKind::Become))
            }
            TokenKind::Cease => {
                self.advance();
                Ok(Stmt::new(line, StmtKind::Cease))
            }
            TokenKind::LetItBeKnown => {
                self.advance();
                self.parse_variable_declaration(line, None)
            }
            TokenKind::Whole | TokenKind::Truth | TokenKind::PhraseType if self.looks_like_typed_decl() => {
                let declared = self.parse_rune_token()?;
                self.parse_variable_declaration(line, Some(declared))
            }
            TokenKind::If => {
                self.advance();
                self.parse_if(line)
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expression()?;
                let body = self.parse_stmt_or_block()?;
                Ok(Stmt::new(line, StmtKind::WhileLoop { condition: cond, body: Box::new(body) }))
            }
            TokenKind::For => {
                self.advance();
                self.parse_for(line)
            }
            TokenKind::Do => {
                self.advance();
                let body = self.parse_stmt_or_block()?;
                self.expect(&TokenKind::Until, "'Until' clause")?;
                let cond = self.parse_expression()?;
                Ok(Stmt::new(line, StmtKind::DoWhileLoop { body: Box::new(body), until_condition: cond }))
            }
            TokenKind::Spell => {
                self.advance();
                self.parse_spell_def(line)
            }
            TokenKind::Try => {
                self.advance();
                self.parse_try(line)
            }
            TokenKind::FromTheScrollOf => {
                self.advance();
                self.parse_import(line)
            }
            TokenKind::UnfurlTheScroll => {
                self.advance();
                let path = self.expect_string("scroll path")?;
                Ok(Stmt::new(line, StmtKind::UnfurlInclude { path }))
            }
            TokenKind::LBrace => self.parse_block(),
            _ => self.parse_expr_or_assignment_statement(line),
        }
    }

    fn expect_string(&mut self, what: &str) -> PResult<String> {
        if let TokenKind::Str(s) = self.peek_kind().clone() {
            self.advance();
            Ok(s)
        } else {
            Err(format!("Unexpected token or missing {} at line {}", what, self.line()))
        }
    }

    fn looks_like_typed_decl(&self) -> bool {
        // `whole NAME is of ...` style declaration: rune keyword followed by identifier.
        matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Identifier(_)))
    }

    fn parse_rune_token(&mut self) -> PResult<Type> {
        let kw = match self.peek_kind() {
            TokenKind::Whole => "whole",
            TokenKind::Truth => "truth",
            TokenKind::PhraseType => "phrase",
            TokenKind::Void => "void",
            TokenKind::Any => "any",
            TokenKind::OrderType => "order",
            TokenKind::TomeType => "tome",
            _ => return Err(format!("Unexpected token or missing type rune at line {}", self.line())),
        };
        self.advance();
        let mut rune = kw.to_string();
        if self.matches(&TokenKind::LBracket) {
            rune.push('[');
            let inner = self.parse_rune_contents()?;
            rune.push_str(&inner);
            self.expect(&TokenKind::RBracket, "']'")?;
            rune.push(']');
        }
        Type::parse_rune(&rune).ok_or_else(|| format!("Unrecognized type rune '{}' at line {}", rune, self.line()))
    }

    /// Type parameters inside `order[...]`/`tome[...]` are written wordlessly
    /// next to each other (commas are lexer trivia), so the list ends where
    /// the next token stops looking like a type rune, not at a separator.
    fn parse_rune_contents(&mut self) -> PResult<String> {
        let mut parts = vec![self.parse_rune_token_as_string()?];
        while self.starts_rune_token() {
            parts.push(self.parse_rune_token_as_string()?);
        }
        Ok(parts.join(","))
    }

    fn starts_rune_token(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Whole
                | TokenKind::Truth
                | TokenKind::PhraseType
                | TokenKind::Void
                | TokenKind::Any
                | TokenKind::OrderType
                | TokenKind::TomeType
        )
    }

    fn parse_rune_token_as_string(&mut self) -> PResult<String> {
        let ty = self.parse_rune_token()?;
        Ok(ty.to_string())
    }

    fn parse_variable_declaration(&mut self, line: usize, implied: Option<Type>) -> PResult<Stmt> {
        let name = self.expect_identifier()?;
        let mut declared_type = implied;
        if self.matches(&TokenKind::Colon) {
            declared_type = Some(self.parse_rune_token()?);
        }
        self.expect(&TokenKind::IsOf, "'is of'")?;
        let init = self.parse_expression()?;
        Ok(Stmt::new(
            line,
            StmtKind::VariableDeclaration { name, declared_type, init, mutable: true },
        ))
    }

    /// Handles plain assignment (`NAME is of EXPR`), indexed-assignment
    /// rejection, collection rites, and bare expression statements.
    fn parse_expr_or_assignment_statement(&mut self, line: usize) -> PResult<Stmt> {
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            let save = self.pos;
            self.advance();

            if self.check(&TokenKind::LBracket) {
                self.advance();
                let _index = self.parse_expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                if self.check(&TokenKind::IsOf) {
                    return Err(format!(
                        "Immutable rite: one may not assign into an order or tome (line {})",
                        line
                    ));
                }
                self.pos = save;
            } else if self.check(&TokenKind::IsOf) {
                self.advance();
                let value = self.parse_expression()?;
                return Ok(Stmt::new(line, StmtKind::Assign { name, value }));
            } else if self.check(&TokenKind::ExpandWith) {
                self.advance();
                let value = self.parse_expression()?;
                return Ok(Stmt::new(
                    line,
                    StmtKind::CollectionRite { kind: RiteKind::ArrayAppend, target: name, key: None, value: Some(value) },
                ));
            } else if self.check(&TokenKind::Remove) {
                self.advance();
                let value = self.parse_expression()?;
                return Ok(Stmt::new(
                    line,
                    StmtKind::CollectionRite { kind: RiteKind::ArrayRemove, target: name, key: None, value: Some(value) },
                ));
            } else if self.check(&TokenKind::Amend) {
                self.advance();
                let key = self.parse_expression()?;
                self.expect(&TokenKind::To, "'to'")?;
                let value = self.parse_expression()?;
                return Ok(Stmt::new(
                    line,
                    StmtKind::CollectionRite {
                        kind: RiteKind::MapAssign,
                        target: name,
                        key: Some(key),
                        value: Some(value),
                    },
                ));
            } else if self.check(&TokenKind::Erase) {
                self.advance();
                let key = self.parse_expression()?;
                return Ok(Stmt::new(
                    line,
                    StmtKind::CollectionRite { kind: RiteKind::MapErase, target: name, key: Some(key), value: None },
                ));
            } else {
                self.pos = save;
            }
        }
        let e = self.parse_expression()?;
        Ok(Stmt::new(line, StmtKind::ExprStmt(e)))
    }

    fn parse_if(&mut self, line: usize) -> PResult<Stmt> {
        let cond = self.parse_expression()?;
        self.matches(&TokenKind::Then);
        let then_branch = Box::new(self.parse_stmt_or_block()?);
        let else_branch = if self.matches(&TokenKind::Else) {
            Some(Box::new(self.parse_stmt_or_block()?))
        } else {
            None
        };
        Ok(Stmt::new(line, StmtKind::If { condition: cond, then_branch, else_branch }))
    }

    fn parse_for(&mut self, line: usize) -> PResult<Stmt> {
        let var = self.expect_identifier()?;
        self.expect(&TokenKind::From, "'from'")?;
        let init = self.parse_expression()?;
        let mut limit = None;
        if self.matches(&TokenKind::To) {
            limit = Some(self.parse_expression()?);
        }
        let mut step = Expr::new(line, ExprKind::Number(1));
        if self.matches(&TokenKind::By) {
            step = self.parse_expression()?;
        }
        let ascend = if self.matches(&TokenKind::Ascend) {
            true
        } else if self.matches(&TokenKind::Descend) {
            false
        } else {
            true
        };
        let mut explicit_condition = None;
        if self.matches(&TokenKind::While) {
            explicit_condition = Some(self.parse_expression()?);
        }
        let body = Box::new(self.parse_stmt_or_block()?);
        Ok(Stmt::new(
            line,
            StmtKind::ForLoop { var, init, limit, step, ascend, explicit_condition, body },
        ))
    }

    fn parse_spell_def(&mut self, line: usize) -> PResult<Stmt> {
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let pname = self.expect_identifier()?;
            let mut declared_type = None;
            if self.matches(&TokenKind::Colon) {
                declared_type = Some(self.parse_rune_token()?);
            }
            params.push(Param { name: pname, declared_type });
        }
        self.expect(&TokenKind::RParen, "')'")?;
        let mut return_type = None;
        if self.matches(&TokenKind::Returning) {
            return_type = Some(self.parse_rune_token()?);
        }
        let body = Box::new(self.parse_block()?);
        Ok(Stmt::new(line, StmtKind::SpellStatement { name, params, return_type, body }))
    }

    fn parse_try(&mut self, line: usize) -> PResult<Stmt> {
        self.matches(&TokenKind::Colon);
        let try_block = Box::new(self.parse_block()?);
        let mut catch_var = None;
        let mut catch_block = None;
        if self.matches(&TokenKind::CatchAs) {
            catch_var = Some(self.expect_identifier()?);
            self.matches(&TokenKind::Colon);
            catch_block = Some(Box::new(self.parse_block()?));
        } else if self.matches(&TokenKind::Catch) {
            catch_var = Some(self.expect_identifier()?);
            self.matches(&TokenKind::Colon);
            catch_block = Some(Box::new(self.parse_block()?));
        }
        let mut finally_block = None;
        if self.matches(&TokenKind::Finally) {
            self.matches(&TokenKind::Colon);
            finally_block = Some(Box::new(self.parse_block()?));
        }
        if catch_block.is_none() && finally_block.is_none() {
            return Err(format!(
                "Unexpected token or missing 'Catch'/'Finally:' clause for Try at line {}",
                line
            ));
        }
        Ok(Stmt::new(line, StmtKind::TryCatch { try_block, catch_var, catch_block, finally_block }))
    }

    fn parse_import(&mut self, line: usize) -> PResult<Stmt> {
        let path = self.expect_string("scroll path")?;
        if self.matches(&TokenKind::DrawAllKnowledge) {
            let alias = if self.matches(&TokenKind::As) { Some(self.expect_identifier()?) } else { None };
            Ok(Stmt::new(line, StmtKind::ImportAll { path, alias }))
        } else if self.matches(&TokenKind::TakeTheSpells) {
            let mut names = vec![self.expect_identifier()?];
            while matches!(self.peek_kind(), TokenKind::Identifier(_)) {
                names.push(self.expect_identifier()?);
            }
            Ok(Stmt::new(line, StmtKind::ImportSelective { path, names }))
        } else {
            Err(format!("Unexpected token or missing 'draw all knowledge'/'take the spells' at line {}", line))
        }
    }

    // ─── Expressions (Pratt-style precedence climbing) ─────────────────

    fn starts_expression(&self) -> bool {
        !matches!(
            self.peek_kind(),
            TokenKind::End | TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket
        )
    }

    pub fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.matches(&TokenKind::Or) {
            let line = left.line;
            let right = self.parse_and()?;
            left = Expr::new(line, ExprKind::Binary { op: BinOp::Or, left: Box::new(left), right: Box::new(right) });
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_not()?;
        while self.matches(&TokenKind::And) {
            let line = left.line;
            let right = self.parse_not()?;
            left = Expr::new(line, ExprKind::Binary { op: BinOp::And, left: Box::new(left), right: Box::new(right) });
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Not) {
            let line = self.line();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::new(line, ExprKind::Unary { op: UnOp::Not, operand: Box::new(operand) }));
        }
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::IsEqualTo => BinOp::Eq,
                TokenKind::IsNot => BinOp::Ne,
                _ => break,
            };
            let line = left.line;
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::new(line, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) });
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::IsGreaterThan | TokenKind::RemainethAbove => BinOp::Gt,
                TokenKind::IsLesserThan | TokenKind::RemainethBelow => BinOp::Lt,
                _ => break,
            };
            let line = left.line;
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::new(line, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) });
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = left.line;
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::new(line, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) });
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_cast()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let line = left.line;
            self.advance();
            let right = self.parse_cast()?;
            left = Expr::new(line, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) });
        }
        Ok(left)
    }

    fn parse_cast(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Cast) {
            let line = self.line();
            self.advance();
            let operand = self.parse_unary()?;
            self.expect(&TokenKind::CastAs, "'as'")?;
            let target = match self.peek_kind() {
                TokenKind::Whole => CastTarget::Number,
                TokenKind::PhraseType => CastTarget::Phrase,
                TokenKind::Truth => CastTarget::Truth,
                _ => return Err(format!("Unexpected token or missing cast target at line {}", self.line())),
            };
            self.advance();
            return Ok(Expr::new(line, ExprKind::Cast { operand: Box::new(operand), target }));
        }
        self.parse_unary()
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Minus) {
            let line = self.line();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(line, ExprKind::Unary { op: UnOp::Neg, operand: Box::new(operand) }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::LBracket) {
                let line = expr.line;
                self.advance();
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::new(line, ExprKind::Index { target: Box::new(expr), index: Box::new(index) });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let line = self.line();
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::new(line, ExprKind::Number(n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::new(line, ExprKind::Str(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(line, ExprKind::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(line, ExprKind::Bool(false)))
            }
            TokenKind::InvokeTheSpiritOf => {
                self.advance();
                let name = self.expect_dotted_name()?;
                self.expect(&TokenKind::Upon, "'upon'")?;
                let args = self.parse_arg_list()?;
                Ok(Expr::new(line, ExprKind::NativeInvocation { name, args }))
            }
            TokenKind::Invoke => {
                self.advance();
                let name = self.expect_identifier()?;
                self.expect(&TokenKind::Upon, "'upon'")?;
                let args = self.parse_arg_list()?;
                Ok(Expr::new(line, ExprKind::SpellInvocation { name, args }))
            }
            TokenKind::LBracket => {
                self.advance();
                // Elements sit side by side (commas are lexer trivia); each
                // `parse_expression` stops on its own at the next element or
                // the closing bracket, so no separator token is needed here.
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    elements.push(self.parse_expression()?);
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                Ok(Expr::new(line, ExprKind::ArrayLiteral(elements)))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    // A bare identifier in key position is accepted directly
                    // as a string key; the lexer does no map-key tracking of
                    // its own, so recognizing this shape lives entirely here.
                    let key = match self.peek_kind().clone() {
                        TokenKind::Str(s) => {
                            self.advance();
                            s
                        }
                        TokenKind::Identifier(s) => {
                            self.advance();
                            s
                        }
                        _ => return Err(format!("Unexpected token or missing map key at line {}", self.line())),
                    };
                    self.expect(&TokenKind::Colon, "':'")?;
                    let value = self.parse_expression()?;
                    entries.push((key, value));
                }
                self.expect(&TokenKind::RBrace, "'}'")?;
                Ok(Expr::new(line, ExprKind::MapLiteral(entries)))
            }
            TokenKind::LParen => {
                self.advance();
                let first = self.parse_expression()?;
                // Juxtaposition call: `(name arg1 arg2 ...)`.
                if let ExprKind::Identifier(name) = &first.kind {
                    if self.starts_expression() && !self.check(&TokenKind::RParen) {
                        let name = name.clone();
                        let mut args = Vec::new();
                        while !self.check(&TokenKind::RParen) {
                            args.push(self.parse_expression()?);
                        }
                        self.expect(&TokenKind::RParen, "')'")?;
                        return Ok(Expr::new(line, ExprKind::SpellInvocation { name, args }));
                    }
                }
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(first)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::new(line, ExprKind::Identifier(name)))
            }
            _ => Err(format!(
                "Unexpected token or missing expression at line {} (found {:?})",
                line,
                self.peek_kind()
            )),
        }
    }

    /// `math.divide` style names: the `.` is lexer trivia like `,`, so the
    /// parts arrive as consecutive bare identifiers and are rejoined here.
    fn expect_dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect_identifier()?;
        while matches!(self.peek_kind(), TokenKind::Identifier(_)) {
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        Ok(name)
    }

    /// Arguments sit side by side (commas are lexer trivia); stop once the
    /// next token can't start another one.
    fn parse_arg_list(&mut self) -> PResult<Vec<Expr>> {
        let mut args = vec![self.parse_expression()?];
        while self.starts_primary() {
            args.push(self.parse_expression()?);
        }
        Ok(args)
    }

    fn starts_primary(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Number(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::InvokeTheSpiritOf
                | TokenKind::Invoke
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::LParen
                | TokenKind::Identifier(_)
                | TokenKind::Minus
                | TokenKind::Not
                | TokenKind::Cast
        )
    }
}

pub fn parse(tokens: &[Token]) -> PResult<Program> {
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn parse_src(src: &str) -> Program {
        let toks = tokenize(src);
        parse(&toks).expect("parse should succeed")
    }

    #[test]
    fn parses_print_with_concatenation() {
        let prog = parse_src("proclaim \"Age: \" + 25");
        assert_eq!(prog.statements.len(), 1);
        assert!(matches!(prog.statements[0].kind, StmtKind::Print(_)));
    }

    #[test]
    fn rejects_indexed_assignment_as_immutable_rite() {
        let toks = tokenize("heroes[1] is of \"Faramir\"");
        let err = Parser::new(&toks).parse_program().unwrap_err();
        assert!(err.contains("Immutable rite"));
    }

    #[test]
    fn parses_array_literal_and_negative_index() {
        let prog = parse_src("heroes = [\"Aragorn\", \"Legolas\", \"Gimli\"]\nproclaim heroes[-1]");
        assert_eq!(prog.statements.len(), 2);
        match &prog.statements[0].kind {
            StmtKind::Assign { value, .. } => {
                assert!(matches!(&value.kind, ExprKind::ArrayLiteral(elements) if elements.len() == 3));
            }
            other => panic!("expected Assign, got {:?}", other),
        }
    }

    #[test]
    fn parses_dotted_native_invocation_with_multiple_arguments() {
        let prog = parse_src("proclaim Invoke the spirit of math.divide upon 10, 0");
        match &prog.statements[0].kind {
            StmtKind::Print(e) => match &e.kind {
                ExprKind::NativeInvocation { name, args } => {
                    assert_eq!(name, "math.divide");
                    assert_eq!(args.len(), 2);
                }
                other => panic!("expected NativeInvocation, got {:?}", other),
            },
            other => panic!("expected Print, got {:?}", other),
        }
    }

    #[test]
    fn parses_spell_with_return_and_invocation() {
        let prog = parse_src(
            "spell bless(name) { proclaim \"Blessing \" + name\nreturn \"Blessed \" + name }\nproclaim (bless \"Boromir\")",
        );
        assert_eq!(prog.statements.len(), 2);
        assert!(matches!(prog.statements[0].kind, StmtKind::SpellStatement { .. }));
    }

    #[test]
    fn parses_try_catch() {
        let prog = parse_src(
            "Try:\nInvoke the spirit of math.divide upon 10, 0\nCatch the curse as omen:\nproclaim \"Error was \" + omen",
        );
        assert_eq!(prog.statements.len(), 1);
        assert!(matches!(prog.statements[0].kind, StmtKind::TryCatch { .. }));
    }

    #[test]
    fn parses_for_descend_with_explicit_while() {
        let prog = parse_src("for count from 6 by 1 descend while count remaineth below 3 { count }");
        match &prog.statements[0].kind {
            StmtKind::ForLoop { ascend, explicit_condition, .. } => {
                assert!(!ascend);
                assert!(explicit_condition.is_some());
            }
            other => panic!("expected ForLoop, got {:?}", other),
        }
    }
}
