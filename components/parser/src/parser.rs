//! Parser - builds the AST from tokens
//!
//! Recursive descent, one method per grammar level. Every method returns the
//! first error it meets, positioned at the offending token.

use crate::ast::*;
use crate::error::{unexpected_token, wrong_end_suffix};
use crate::lexer::{Keyword, Lexer, Punctuator, Token};
use core_types::{CompileResult, SourcePosition};
use log::debug;

/// Parser for source code
///
/// # Examples
///
/// ```
/// use parser::{Parser, StmtKind};
///
/// let mut parser = Parser::new("var x := 1 + 2;");
/// let program = parser.parse_program().unwrap();
/// assert!(matches!(program[0].kind, StmtKind::Var { .. }));
/// ```
pub struct Parser {
    lexer: Lexer,
}

/// Parse a standalone type expression such as `[char]` or `{x integer}`
pub fn parse_type_str(text: &str) -> CompileResult<TypeExpr> {
    let mut parser = Parser::new(text);
    let ty = parser.parse_type()?;
    let token = parser.lexer.next_token()?;
    if token != Token::EOF {
        return Err(unexpected_token(&token, "end of file", parser.lexer.token_position()));
    }
    Ok(ty)
}

impl Parser {
    /// Create a new parser for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            lexer: Lexer::new(source),
        }
    }

    /// Whether every statement has been read
    pub fn is_at_end(&mut self) -> CompileResult<bool> {
        Ok(*self.lexer.peek_token()? == Token::EOF)
    }

    /// Parse statements until the end of the source
    pub fn parse_program(&mut self) -> CompileResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.is_at_end()? {
            statements.push(self.parse_statement()?);
        }
        debug!("parsed {} top-level statements", statements.len());
        Ok(statements)
    }

    /// Parse one statement including its terminating `;`
    pub fn parse_statement(&mut self) -> CompileResult<Stmt> {
        let stmt = match self.lexer.peek_token()? {
            Token::Keyword(Keyword::Var) | Token::Keyword(Keyword::Const) => {
                self.parse_variable_declaration()?
            }
            Token::Keyword(Keyword::If) => self.parse_if(Keyword::If)?,
            Token::Keyword(Keyword::Kindof) => self.parse_kindof_statement()?,
            Token::Keyword(Keyword::While) => self.parse_while()?,
            Token::Keyword(Keyword::Function) | Token::Keyword(Keyword::Generator) => {
                self.parse_function_declaration()?
            }
            Token::Keyword(Keyword::Procedure) => self.parse_procedure_declaration()?,
            Token::Keyword(Keyword::Type) => self.parse_type_declaration()?,
            Token::Keyword(Keyword::Exit) => self.parse_exit()?,
            Token::Keyword(Keyword::Return) => self.parse_return()?,
            Token::Keyword(Keyword::Yield) => {
                let position = self.expect_keyword(Keyword::Yield)?;
                Stmt::new(StmtKind::Yield(self.parse_expression()?), position)
            }
            Token::Keyword(Keyword::Raise) => {
                let position = self.expect_keyword(Keyword::Raise)?;
                Stmt::new(StmtKind::Raise(self.parse_expression()?), position)
            }
            Token::Keyword(Keyword::For) => self.parse_for()?,
            Token::Keyword(Keyword::Begin) => {
                let block = self.parse_block(None)?;
                let position = block.position;
                Stmt::new(StmtKind::Block(block), position)
            }
            Token::Directive(_) => {
                let token = self.lexer.next_token()?;
                let position = self.lexer.token_position();
                match token {
                    Token::Directive(name) => Stmt::new(StmtKind::Directive(name), position),
                    other => return Err(unexpected_token(&other, "directive", position)),
                }
            }
            _ => self.parse_assign()?,
        };
        self.expect_punctuator(Punctuator::Semicolon)?;
        Ok(stmt)
    }

    fn parse_assign(&mut self) -> CompileResult<Stmt> {
        let target = self.parse_expression()?;
        if !self.check_punctuator(Punctuator::Assign)? {
            if let ExprKind::Call { name, args } = target.kind {
                return Ok(Stmt::new(StmtKind::ProcedureCall { name, args }, target.position));
            }
        }
        let position = self.expect_punctuator(Punctuator::Assign)?;
        let value = self.parse_expression()?;
        Ok(Stmt::new(StmtKind::Assign { target, value }, position))
    }

    fn parse_variable_declaration(&mut self) -> CompileResult<Stmt> {
        let token = self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let is_const = match token {
            Token::Keyword(Keyword::Const) => true,
            Token::Keyword(Keyword::Var) => false,
            other => return Err(unexpected_token(&other, "var or const", position)),
        };
        let mut names = Vec::new();
        if self.check_punctuator(Punctuator::LParen)? {
            self.lexer.next_token()?;
            names.push(self.expect_identifier()?);
            while self.check_punctuator(Punctuator::Comma)? {
                self.lexer.next_token()?;
                names.push(self.expect_identifier()?);
            }
            self.expect_punctuator(Punctuator::RParen)?;
        } else {
            names.push(self.expect_identifier()?);
        }
        self.expect_punctuator(Punctuator::Assign)?;
        let value = self.parse_expression()?;
        Ok(Stmt::new(
            StmtKind::Var {
                names,
                value,
                is_const,
            },
            position,
        ))
    }

    fn parse_type_declaration(&mut self) -> CompileResult<Stmt> {
        let position = self.expect_keyword(Keyword::Type)?;
        let name = self.expect_identifier()?;
        let ty = self.parse_type()?;
        Ok(Stmt::new(StmtKind::TypeDecl { name, ty }, position))
    }

    fn parse_if(&mut self, opening: Keyword) -> CompileResult<Stmt> {
        let position = self.expect_keyword(opening)?;
        let condition = self.parse_expression()?;
        let then_branch =
            self.parse_block_until(Keyword::Then, &[Keyword::End, Keyword::Else, Keyword::Elsif])?;
        if self.check_keyword(Keyword::Elsif)? {
            let elsif = self.parse_if(Keyword::Elsif)?;
            return Ok(Stmt::new(
                StmtKind::If {
                    condition,
                    then_branch,
                    else_branch: Some(Box::new(elsif)),
                },
                position,
            ));
        }
        let mut else_branch = None;
        if self.check_keyword(Keyword::Else)? {
            let block = self.parse_block_until(Keyword::Else, &[Keyword::End])?;
            let block_position = block.position;
            else_branch = Some(Box::new(Stmt::new(StmtKind::Block(block), block_position)));
        }
        self.expect_keyword(Keyword::End)?;
        self.expect_keyword(Keyword::If)?;
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            position,
        ))
    }

    fn parse_while(&mut self) -> CompileResult<Stmt> {
        let position = self.expect_keyword(Keyword::While)?;
        let condition = self.parse_expression()?;
        let body = self.parse_loop_block()?;
        Ok(Stmt::new(StmtKind::While { condition, body }, position))
    }

    fn parse_for(&mut self) -> CompileResult<Stmt> {
        let position = self.expect_keyword(Keyword::For)?;
        let index = self.expect_identifier()?;
        self.expect_keyword(Keyword::In)?;
        let reverse = if self.check_keyword(Keyword::Reverse)? {
            self.lexer.next_token()?;
            true
        } else {
            false
        };
        let sequence = self.parse_expression()?;
        let sequence_to = if self.check_punctuator(Punctuator::DotDot)? {
            self.lexer.next_token()?;
            Some(self.parse_expression()?)
        } else {
            None
        };
        let body = self.parse_loop_block()?;
        Ok(Stmt::new(
            StmtKind::For {
                index,
                reverse,
                sequence,
                sequence_to,
                body,
            },
            position,
        ))
    }

    fn parse_loop_block(&mut self) -> CompileResult<Block> {
        let block = self.parse_block_until(Keyword::Loop, &[Keyword::End])?;
        self.expect_keyword(Keyword::End)?;
        self.expect_keyword(Keyword::Loop)?;
        Ok(block)
    }

    fn parse_exit(&mut self) -> CompileResult<Stmt> {
        let position = self.expect_keyword(Keyword::Exit)?;
        let condition = if self.check_keyword(Keyword::When)? {
            self.lexer.next_token()?;
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt::new(StmtKind::Exit { condition }, position))
    }

    fn parse_return(&mut self) -> CompileResult<Stmt> {
        let position = self.expect_keyword(Keyword::Return)?;
        let value = if self.check_punctuator(Punctuator::Semicolon)? {
            None
        } else {
            Some(self.parse_expression()?)
        };
        Ok(Stmt::new(StmtKind::Return(value), position))
    }

    fn parse_kindof_statement(&mut self) -> CompileResult<Stmt> {
        let position = self.expect_keyword(Keyword::Kindof)?;
        let case = self.parse_expression()?;
        let mut whens = Vec::new();
        while self.check_keyword(Keyword::When)? {
            let when_position = self.expect_keyword(Keyword::When)?;
            let ty = self.parse_type()?;
            let var = self.expect_identifier()?;
            let body =
                self.parse_block_until(Keyword::Then, &[Keyword::When, Keyword::Else, Keyword::End])?;
            whens.push(KindofBranch {
                ty,
                var,
                body,
                position: when_position,
            });
        }
        let otherwise = if self.check_keyword(Keyword::Else)? {
            Some(self.parse_block_until(Keyword::Else, &[Keyword::End])?)
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;
        if self.check_keyword(Keyword::Kindof)? {
            self.lexer.next_token()?;
        }
        Ok(Stmt::new(
            StmtKind::Kindof {
                case,
                whens,
                otherwise,
            },
            position,
        ))
    }

    fn parse_function_declaration(&mut self) -> CompileResult<Stmt> {
        let token = self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let is_generator = match token {
            Token::Keyword(Keyword::Generator) => true,
            Token::Keyword(Keyword::Function) => false,
            other => return Err(unexpected_token(&other, "function or generator", position)),
        };
        let name = self.expect_identifier()?;
        let params = self.parse_parameter_list()?;
        let return_type = self.parse_type()?;
        let body = self.parse_block(Some(&name))?;
        Ok(Stmt::new(
            StmtKind::Function(FunctionDecl {
                name,
                params,
                return_type,
                body,
                is_generator,
                position,
            }),
            position,
        ))
    }

    fn parse_procedure_declaration(&mut self) -> CompileResult<Stmt> {
        let position = self.expect_keyword(Keyword::Procedure)?;
        let name = self.expect_identifier()?;
        let params = self.parse_parameter_list()?;
        let body = self.parse_block(Some(&name))?;
        Ok(Stmt::new(
            StmtKind::Procedure(ProcedureDecl {
                name,
                params,
                body,
                position,
            }),
            position,
        ))
    }

    fn parse_parameter_list(&mut self) -> CompileResult<Vec<Param>> {
        self.expect_punctuator(Punctuator::LParen)?;
        let mut params = Vec::new();
        while !self.check_punctuator(Punctuator::RParen)? {
            if !params.is_empty() {
                self.expect_punctuator(Punctuator::Comma)?;
            }
            let name = self.expect_identifier()?;
            let position = self.lexer.token_position();
            let ty = self.parse_type()?;
            params.push(Param { name, ty, position });
        }
        self.lexer.next_token()?;
        Ok(params)
    }

    /// `begin ... [exception ...] end [name]`
    fn parse_block(&mut self, name: Option<&str>) -> CompileResult<Block> {
        let mut block = self.parse_block_until(Keyword::Begin, &[Keyword::End, Keyword::Exception])?;
        if self.check_keyword(Keyword::Exception)? {
            block.exception = Some(Box::new(self.parse_exception()?));
        }
        self.expect_keyword(Keyword::End)?;
        if let Some(expected) = name {
            let suffix = self.expect_identifier()?;
            if suffix != expected {
                return Err(wrong_end_suffix(&suffix, expected, self.lexer.token_position()));
            }
        }
        Ok(block)
    }

    fn parse_exception(&mut self) -> CompileResult<ExceptionClause> {
        self.expect_keyword(Keyword::Exception)?;
        let mut whens = Vec::new();
        while self.check_keyword(Keyword::When)? {
            self.expect_keyword(Keyword::When)?;
            let value = self.parse_expression()?;
            let body =
                self.parse_block_until(Keyword::Then, &[Keyword::End, Keyword::When, Keyword::Else])?;
            whens.push(ExceptionWhen { value, body });
        }
        let otherwise = if self.check_keyword(Keyword::Else)? {
            Some(self.parse_block_until(Keyword::Else, &[Keyword::End])?)
        } else {
            None
        };
        Ok(ExceptionClause { whens, otherwise })
    }

    /// Read `opening` then statements until one of `stops` is next
    fn parse_block_until(&mut self, opening: Keyword, stops: &[Keyword]) -> CompileResult<Block> {
        let position = self.expect_keyword(opening)?;
        let mut statements = Vec::new();
        loop {
            match self.lexer.peek_token()? {
                Token::Keyword(k) if stops.contains(k) => break,
                Token::EOF => {
                    let expected = stops
                        .iter()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>()
                        .join(" or ");
                    let position = self.lexer.peek_position()?;
                    return Err(unexpected_token(&Token::EOF, &expected, position));
                }
                _ => statements.push(self.parse_statement()?),
            }
        }
        Ok(Block::new(statements, position))
    }

    // ---- types ----

    /// Parse a type expression, including `T | U` variants
    pub fn parse_type(&mut self) -> CompileResult<TypeExpr> {
        let first = self.parse_type_no_variant()?;
        if !self.check_punctuator(Punctuator::Pipe)? {
            return Ok(first);
        }
        let position = first.position;
        let mut members = vec![first];
        while self.check_punctuator(Punctuator::Pipe)? {
            self.lexer.next_token()?;
            members.push(self.parse_type_no_variant()?);
        }
        Ok(TypeExpr::new(TypeExprKind::Variant(members), position))
    }

    fn parse_type_no_variant(&mut self) -> CompileResult<TypeExpr> {
        let token = self.lexer.next_token()?;
        let position = self.lexer.token_position();
        match token {
            Token::Keyword(Keyword::Sequence) => {
                self.expect_punctuator(Punctuator::LParen)?;
                let item = self.parse_type()?;
                self.expect_punctuator(Punctuator::RParen)?;
                Ok(TypeExpr::new(TypeExprKind::Sequence(Box::new(item)), position))
            }
            Token::Punctuator(Punctuator::LBrace) => {
                let mut fields = Vec::new();
                while !self.check_punctuator(Punctuator::RBrace)? {
                    if !fields.is_empty() {
                        self.expect_punctuator(Punctuator::Comma)?;
                    }
                    let name = self.expect_identifier()?;
                    let field_position = self.lexer.token_position();
                    let ty = self.parse_type()?;
                    fields.push(FieldType {
                        name,
                        ty,
                        position: field_position,
                    });
                }
                self.lexer.next_token()?;
                Ok(TypeExpr::new(TypeExprKind::Record(fields), position))
            }
            Token::Punctuator(Punctuator::LBracket) => {
                let item = self.parse_type()?;
                self.expect_punctuator(Punctuator::RBracket)?;
                Ok(TypeExpr::new(TypeExprKind::Array(Box::new(item)), position))
            }
            Token::Punctuator(Punctuator::LParen) => {
                let mut items = Vec::new();
                while items.len() < 2 || !self.check_punctuator(Punctuator::RParen)? {
                    if !items.is_empty() {
                        self.expect_punctuator(Punctuator::Comma)?;
                    }
                    self.expect_identifier()?;
                    items.push(self.parse_type()?);
                }
                self.lexer.next_token()?;
                Ok(TypeExpr::new(TypeExprKind::Tuple(items), position))
            }
            Token::Keyword(Keyword::Null) => Ok(TypeExpr::new(TypeExprKind::Null, position)),
            Token::Identifier(name) => Ok(TypeExpr::named(name, position)),
            other => Err(unexpected_token(
                &other,
                "null, identifier, [, { or sequence",
                position,
            )),
        }
    }

    // ---- expressions ----

    /// Parse an expression
    pub fn parse_expression(&mut self) -> CompileResult<Expr> {
        self.parse_or()
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr, position: SourcePosition) -> Expr {
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            position,
        )
    }

    fn parse_or(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check_keyword(Keyword::Or)? {
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_and()?;
            left = Self::binary(BinaryOp::Or, left, right, position);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.check_keyword(Keyword::And)? {
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_comparison()?;
            left = Self::binary(BinaryOp::And, left, right, position);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> CompileResult<Expr> {
        let left = self.parse_concat()?;
        let op = match self.lexer.peek_token()? {
            Token::Punctuator(Punctuator::Eq) => BinaryOp::Eq,
            Token::Punctuator(Punctuator::NotEq) => BinaryOp::Ne,
            Token::Punctuator(Punctuator::Lt) => BinaryOp::Lt,
            Token::Punctuator(Punctuator::Gt) => BinaryOp::Gt,
            Token::Punctuator(Punctuator::LtEq) => BinaryOp::Lte,
            Token::Punctuator(Punctuator::GtEq) => BinaryOp::Gte,
            Token::Keyword(Keyword::In) => BinaryOp::In,
            _ => return Ok(left),
        };
        self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let right = self.parse_concat()?;
        Ok(Self::binary(op, left, right, position))
    }

    fn parse_concat(&mut self) -> CompileResult<Expr> {
        let first = self.parse_additive()?;
        if !self.check_punctuator(Punctuator::Concat)? {
            return Ok(first);
        }
        self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let mut items = vec![first, self.parse_additive()?];
        while self.check_punctuator(Punctuator::Concat)? {
            self.lexer.next_token()?;
            items.push(self.parse_additive()?);
        }
        Ok(Expr::new(ExprKind::Concat(items), position))
    }

    fn parse_additive(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.lexer.peek_token()? {
                Token::Punctuator(Punctuator::Plus) => BinaryOp::Add,
                Token::Punctuator(Punctuator::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right, position);
        }
    }

    fn parse_multiplicative(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_repeat()?;
        loop {
            let op = match self.lexer.peek_token()? {
                Token::Punctuator(Punctuator::Star) => BinaryOp::Mul,
                Token::Punctuator(Punctuator::Slash) => BinaryOp::Div,
                Token::Punctuator(Punctuator::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_repeat()?;
            left = Self::binary(op, left, right, position);
        }
    }

    fn parse_repeat(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_postfix()?;
        while self.check_punctuator(Punctuator::StarStar)? {
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_postfix()?;
            left = Self::binary(BinaryOp::Repeat, left, right, position);
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> CompileResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check_punctuator(Punctuator::LBracket)? {
                self.lexer.next_token()?;
                let position = self.lexer.token_position();
                let index = self.parse_expression()?;
                let index_to = if self.check_punctuator(Punctuator::DotDot)? {
                    self.lexer.next_token()?;
                    Some(Box::new(self.parse_expression()?))
                } else {
                    None
                };
                self.expect_punctuator(Punctuator::RBracket)?;
                expr = Expr::new(
                    ExprKind::Index {
                        indexed: Box::new(expr),
                        index: Box::new(index),
                        index_to,
                    },
                    position,
                );
            } else if self.check_punctuator(Punctuator::Dot)? {
                self.lexer.next_token()?;
                let position = self.lexer.token_position();
                let field = self.expect_identifier()?;
                expr = Expr::new(
                    ExprKind::Field {
                        record: Box::new(expr),
                        field,
                    },
                    position,
                );
            } else {
                break;
            }
        }
        while self.check_keyword(Keyword::As)? {
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let ty = self.parse_type()?;
            expr = Expr::new(
                ExprKind::As {
                    expr: Box::new(expr),
                    ty,
                },
                position,
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        match self.lexer.peek_token()? {
            Token::Punctuator(Punctuator::LParen) => return self.parse_group(),
            Token::Punctuator(Punctuator::LBracket) => return self.parse_array(),
            Token::Punctuator(Punctuator::LBrace) => return self.parse_record(),
            Token::Keyword(Keyword::Case) => return self.parse_case(),
            Token::Keyword(Keyword::Kindof) => return self.parse_kindof(),
            _ => {}
        }
        let token = self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let kind = match token {
            Token::Punctuator(Punctuator::Minus) => self.parse_unary(UnaryOp::Neg)?,
            Token::Keyword(Keyword::Not) => self.parse_unary(UnaryOp::Not)?,
            Token::Keyword(Keyword::True) => ExprKind::Boolean(true),
            Token::Keyword(Keyword::False) => ExprKind::Boolean(false),
            Token::Keyword(Keyword::Null) => ExprKind::Null,
            Token::Integer(i) => ExprKind::Integer(i),
            Token::Real(r) => ExprKind::Real(r),
            Token::Text(t) => ExprKind::Text(t),
            Token::Identifier(name) => {
                if self.check_punctuator(Punctuator::LParen)? {
                    let args = self.parse_argument_list()?;
                    ExprKind::Call { name, args }
                } else {
                    ExprKind::Variable(name)
                }
            }
            other => {
                return Err(unexpected_token(
                    &other,
                    "identifier, literal, -, not, (, [, {, case or kindof",
                    position,
                ))
            }
        };
        Ok(Expr::new(kind, position))
    }

    fn parse_unary(&mut self, op: UnaryOp) -> CompileResult<ExprKind> {
        let operand = self.parse_postfix()?;
        Ok(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_argument_list(&mut self) -> CompileResult<Vec<Expr>> {
        self.expect_punctuator(Punctuator::LParen)?;
        let mut args = Vec::new();
        while !self.check_punctuator(Punctuator::RParen)? {
            if !args.is_empty() {
                self.expect_punctuator(Punctuator::Comma)?;
            }
            args.push(self.parse_expression()?);
        }
        self.lexer.next_token()?;
        Ok(args)
    }

    fn parse_group(&mut self) -> CompileResult<Expr> {
        let position = self.expect_punctuator(Punctuator::LParen)?;
        let first = self.parse_expression()?;
        if !self.check_punctuator(Punctuator::Comma)? {
            self.expect_punctuator(Punctuator::RParen)?;
            return Ok(first);
        }
        let mut items = vec![first];
        while self.check_punctuator(Punctuator::Comma)? {
            self.lexer.next_token()?;
            items.push(self.parse_expression()?);
        }
        self.expect_punctuator(Punctuator::RParen)?;
        Ok(Expr::new(ExprKind::Tuple(items), position))
    }

    fn parse_array(&mut self) -> CompileResult<Expr> {
        let position = self.expect_punctuator(Punctuator::LBracket)?;
        let mut items = Vec::new();
        while !self.check_punctuator(Punctuator::RBracket)? {
            items.push(self.parse_expression()?);
            if self.check_punctuator(Punctuator::RBracket)? {
                break;
            }
            self.expect_punctuator(Punctuator::Comma)?;
        }
        self.lexer.next_token()?;
        Ok(Expr::new(ExprKind::Array(items), position))
    }

    fn parse_record(&mut self) -> CompileResult<Expr> {
        let position = self.expect_punctuator(Punctuator::LBrace)?;
        let mut fields = Vec::new();
        while !self.check_punctuator(Punctuator::RBrace)? {
            let name = self.expect_identifier()?;
            let field_position = self.lexer.token_position();
            self.expect_punctuator(Punctuator::Colon)?;
            let value = self.parse_expression()?;
            fields.push(RecordField {
                name,
                value,
                position: field_position,
            });
            if self.check_punctuator(Punctuator::RBrace)? {
                break;
            }
            self.expect_punctuator(Punctuator::Comma)?;
        }
        self.lexer.next_token()?;
        Ok(Expr::new(ExprKind::Record(fields), position))
    }

    fn parse_case(&mut self) -> CompileResult<Expr> {
        let position = self.expect_keyword(Keyword::Case)?;
        let case = if self.check_keyword(Keyword::When)? {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        let mut whens = Vec::new();
        while self.check_keyword(Keyword::When)? {
            self.lexer.next_token()?;
            let when = self.parse_expression()?;
            self.expect_keyword(Keyword::Then)?;
            let then = self.parse_expression()?;
            whens.push(CaseArm { when, then });
        }
        self.expect_keyword(Keyword::Else)?;
        let otherwise = Box::new(self.parse_expression()?);
        self.expect_keyword(Keyword::End)?;
        Ok(Expr::new(
            ExprKind::Case {
                case,
                whens,
                otherwise,
            },
            position,
        ))
    }

    fn parse_kindof(&mut self) -> CompileResult<Expr> {
        let position = self.expect_keyword(Keyword::Kindof)?;
        let case = Box::new(self.parse_expression()?);
        let mut whens = Vec::new();
        while self.check_keyword(Keyword::When)? {
            let when_position = self.expect_keyword(Keyword::When)?;
            let ty = self.parse_type()?;
            let var = self.expect_identifier()?;
            self.expect_keyword(Keyword::Then)?;
            let then = self.parse_expression()?;
            whens.push(KindofArm {
                ty,
                var,
                then,
                position: when_position,
            });
        }
        let otherwise = if self.check_keyword(Keyword::Else)? {
            self.lexer.next_token()?;
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;
        Ok(Expr::new(
            ExprKind::Kindof {
                case,
                whens,
                otherwise,
            },
            position,
        ))
    }

    // ---- token helpers ----

    fn check_punctuator(&mut self, p: Punctuator) -> CompileResult<bool> {
        Ok(matches!(self.lexer.peek_token()?, Token::Punctuator(q) if *q == p))
    }

    fn check_keyword(&mut self, k: Keyword) -> CompileResult<bool> {
        Ok(matches!(self.lexer.peek_token()?, Token::Keyword(q) if *q == k))
    }

    fn expect_punctuator(&mut self, p: Punctuator) -> CompileResult<SourcePosition> {
        let token = self.lexer.next_token()?;
        let position = self.lexer.token_position();
        if token == Token::Punctuator(p) {
            Ok(position)
        } else {
            Err(unexpected_token(&token, p.as_str(), position))
        }
    }

    fn expect_keyword(&mut self, k: Keyword) -> CompileResult<SourcePosition> {
        let token = self.lexer.next_token()?;
        let position = self.lexer.token_position();
        if token == Token::Keyword(k) {
            Ok(position)
        } else {
            Err(unexpected_token(&token, k.as_str(), position))
        }
    }

    fn expect_identifier(&mut self) -> CompileResult<String> {
        let token = self.lexer.next_token()?;
        match token {
            Token::Identifier(name) => Ok(name),
            other => Err(unexpected_token(
                &other,
                "identifier",
                self.lexer.token_position(),
            )),
        }
    }
}
