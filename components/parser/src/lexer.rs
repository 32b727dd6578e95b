//! Lexer - tokenizes source code into tokens

use core_types::{CompileError, CompileResult, ErrorKind, SourcePosition};
use std::fmt;

/// Reserved words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// var keyword
    Var,
    /// const keyword
    Const,
    /// as keyword
    As,
    /// type keyword
    Type,
    /// if keyword
    If,
    /// then keyword
    Then,
    /// elsif keyword
    Elsif,
    /// else keyword
    Else,
    /// begin keyword
    Begin,
    /// end keyword
    End,
    /// exception keyword
    Exception,
    /// raise keyword
    Raise,
    /// case keyword
    Case,
    /// when keyword
    When,
    /// while keyword
    While,
    /// loop keyword
    Loop,
    /// exit keyword
    Exit,
    /// for keyword
    For,
    /// in keyword
    In,
    /// reverse keyword
    Reverse,
    /// function keyword
    Function,
    /// generator keyword
    Generator,
    /// procedure keyword
    Procedure,
    /// return keyword
    Return,
    /// yield keyword
    Yield,
    /// and keyword
    And,
    /// or keyword
    Or,
    /// not keyword
    Not,
    /// true keyword
    True,
    /// null keyword
    Null,
    /// false keyword
    False,
    /// sequence keyword
    Sequence,
    /// kindof keyword
    Kindof,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("var", Keyword::Var),
    ("const", Keyword::Const),
    ("as", Keyword::As),
    ("type", Keyword::Type),
    ("if", Keyword::If),
    ("then", Keyword::Then),
    ("elsif", Keyword::Elsif),
    ("else", Keyword::Else),
    ("begin", Keyword::Begin),
    ("end", Keyword::End),
    ("exception", Keyword::Exception),
    ("raise", Keyword::Raise),
    ("case", Keyword::Case),
    ("when", Keyword::When),
    ("while", Keyword::While),
    ("loop", Keyword::Loop),
    ("exit", Keyword::Exit),
    ("for", Keyword::For),
    ("in", Keyword::In),
    ("reverse", Keyword::Reverse),
    ("function", Keyword::Function),
    ("generator", Keyword::Generator),
    ("procedure", Keyword::Procedure),
    ("return", Keyword::Return),
    ("yield", Keyword::Yield),
    ("and", Keyword::And),
    ("or", Keyword::Or),
    ("not", Keyword::Not),
    ("true", Keyword::True),
    ("null", Keyword::Null),
    ("false", Keyword::False),
    ("sequence", Keyword::Sequence),
    ("kindof", Keyword::Kindof),
];

impl Keyword {
    /// Look up a reserved word
    pub fn from_word(word: &str) -> Option<Self> {
        KEYWORDS.iter().find(|(w, _)| *w == word).map(|(_, k)| *k)
    }

    /// Source text of the keyword
    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, k)| *k == self)
            .map(|(w, _)| *w)
            .unwrap_or("?")
    }
}

/// Operators and separators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuator {
    /// :=
    Assign,
    /// <=
    LtEq,
    /// >=
    GtEq,
    /// <>
    NotEq,
    /// ..
    DotDot,
    /// ||
    Concat,
    /// **
    StarStar,
    /// +
    Plus,
    /// -
    Minus,
    /// /
    Slash,
    /// %
    Percent,
    /// *
    Star,
    /// <
    Lt,
    /// >
    Gt,
    /// =
    Eq,
    /// (
    LParen,
    /// )
    RParen,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// {
    LBrace,
    /// }
    RBrace,
    /// .
    Dot,
    /// ,
    Comma,
    /// :
    Colon,
    /// ;
    Semicolon,
    /// |
    Pipe,
}

impl Punctuator {
    /// Source text of the punctuator
    pub fn as_str(self) -> &'static str {
        match self {
            Punctuator::Assign => ":=",
            Punctuator::LtEq => "<=",
            Punctuator::GtEq => ">=",
            Punctuator::NotEq => "<>",
            Punctuator::DotDot => "..",
            Punctuator::Concat => "||",
            Punctuator::StarStar => "**",
            Punctuator::Plus => "+",
            Punctuator::Minus => "-",
            Punctuator::Slash => "/",
            Punctuator::Percent => "%",
            Punctuator::Star => "*",
            Punctuator::Lt => "<",
            Punctuator::Gt => ">",
            Punctuator::Eq => "=",
            Punctuator::LParen => "(",
            Punctuator::RParen => ")",
            Punctuator::LBracket => "[",
            Punctuator::RBracket => "]",
            Punctuator::LBrace => "{",
            Punctuator::RBrace => "}",
            Punctuator::Dot => ".",
            Punctuator::Comma => ",",
            Punctuator::Colon => ":",
            Punctuator::Semicolon => ";",
            Punctuator::Pipe => "|",
        }
    }

    fn two_char(c: char, next: char) -> Option<Self> {
        match (c, next) {
            (':', '=') => Some(Punctuator::Assign),
            ('<', '=') => Some(Punctuator::LtEq),
            ('>', '=') => Some(Punctuator::GtEq),
            ('<', '>') => Some(Punctuator::NotEq),
            ('.', '.') => Some(Punctuator::DotDot),
            ('|', '|') => Some(Punctuator::Concat),
            ('*', '*') => Some(Punctuator::StarStar),
            _ => None,
        }
    }

    fn one_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Punctuator::Plus),
            '-' => Some(Punctuator::Minus),
            '/' => Some(Punctuator::Slash),
            '%' => Some(Punctuator::Percent),
            '*' => Some(Punctuator::Star),
            '<' => Some(Punctuator::Lt),
            '>' => Some(Punctuator::Gt),
            '=' => Some(Punctuator::Eq),
            '(' => Some(Punctuator::LParen),
            ')' => Some(Punctuator::RParen),
            '[' => Some(Punctuator::LBracket),
            ']' => Some(Punctuator::RBracket),
            '{' => Some(Punctuator::LBrace),
            '}' => Some(Punctuator::RBrace),
            '.' => Some(Punctuator::Dot),
            ',' => Some(Punctuator::Comma),
            ':' => Some(Punctuator::Colon),
            ';' => Some(Punctuator::Semicolon),
            '|' => Some(Punctuator::Pipe),
            _ => None,
        }
    }
}

/// Token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier (variable, type or callable name)
    Identifier(String),
    /// Integer literal
    Integer(i64),
    /// Real literal
    Real(f64),
    /// Text literal with `''` already unescaped
    Text(String),
    /// `@name@` directive
    Directive(String),
    /// Keyword
    Keyword(Keyword),
    /// Punctuator/operator
    Punctuator(Punctuator),
    /// End of file
    EOF,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Real(r) => write!(f, "{}", r),
            Token::Text(t) => write!(f, "'{}'", t.replace('\'', "''")),
            Token::Directive(d) => write!(f, "@{}@", d),
            Token::Keyword(k) => write!(f, "{}", k.as_str()),
            Token::Punctuator(p) => write!(f, "{}", p.as_str()),
            Token::EOF => write!(f, "end of file"),
        }
    }
}

/// Lexer for source code
///
/// # Examples
///
/// ```
/// use parser::{Keyword, Lexer, Token};
///
/// let mut lexer = Lexer::new("var x := -1;");
/// assert_eq!(lexer.next_token().unwrap(), Token::Keyword(Keyword::Var));
/// assert_eq!(lexer.next_token().unwrap(), Token::Identifier("x".to_string()));
/// lexer.next_token().unwrap();
/// assert_eq!(lexer.next_token().unwrap(), Token::Integer(-1));
/// ```
pub struct Lexer {
    chars: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
    current_token: Option<(Token, SourcePosition)>,
    token_position: SourcePosition,
    /// A `-` directly followed by a digit is a signed literal
    allow_signed: bool,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            current_token: None,
            token_position: SourcePosition::new(1, 1),
            allow_signed: true,
        }
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> CompileResult<Token> {
        let (token, position) = match self.current_token.take() {
            Some(pair) => pair,
            None => self.scan_token()?,
        };
        self.token_position = position;
        Ok(token)
    }

    /// Peek at the next token without consuming it
    pub fn peek_token(&mut self) -> CompileResult<&Token> {
        if self.current_token.is_none() {
            self.current_token = Some(self.scan_token()?);
        }
        match &self.current_token {
            Some((token, _)) => Ok(token),
            None => Ok(&Token::EOF),
        }
    }

    /// Position of the next token
    pub fn peek_position(&mut self) -> CompileResult<SourcePosition> {
        self.peek_token()?;
        Ok(self
            .current_token
            .as_ref()
            .map_or(self.token_position, |(_, p)| *p))
    }

    /// Position of the token last returned by [`Lexer::next_token`]
    pub fn token_position(&self) -> SourcePosition {
        self.token_position
    }

    fn scan_token(&mut self) -> CompileResult<(Token, SourcePosition)> {
        self.skip_whitespace_and_comments();
        let start = self.current_position();
        if self.is_at_end() {
            return Ok((Token::EOF, start));
        }
        let c = self.peek();

        if c.is_ascii_alphabetic() {
            self.allow_signed = false;
            return Ok((self.scan_identifier(), start));
        }
        if c.is_ascii_digit() {
            self.allow_signed = false;
            return Ok((self.scan_number(start)?, start));
        }
        if c == '\'' {
            self.allow_signed = false;
            return Ok((self.scan_text(start)?, start));
        }
        if c == '@' {
            return Ok((self.scan_directive(start)?, start));
        }
        if c == '-' && self.allow_signed && self.peek_next().map_or(false, |n| n.is_ascii_digit()) {
            self.allow_signed = false;
            return Ok((self.scan_number(start)?, start));
        }

        if let Some(p) = self.peek_next().and_then(|n| Punctuator::two_char(c, n)) {
            self.advance();
            self.advance();
            self.allow_signed = true;
            return Ok((Token::Punctuator(p), start));
        }
        match Punctuator::one_char(c) {
            Some(p) => {
                self.advance();
                self.allow_signed = !matches!(p, Punctuator::RParen | Punctuator::RBracket);
                Ok((Token::Punctuator(p), start))
            }
            None => Err(CompileError::new(
                ErrorKind::UnknownToken(c.to_string()),
                start,
            )),
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let mut word = String::new();
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            word.push(self.advance());
        }
        match Keyword::from_word(&word) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Identifier(word),
        }
    }

    fn scan_number(&mut self, start: SourcePosition) -> CompileResult<Token> {
        let mut text = String::new();
        if self.peek() == '-' {
            text.push(self.advance());
        }
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            text.push(self.advance());
        }
        let is_real = self.peek() == '.' && self.peek_next().map_or(false, |n| n.is_ascii_digit());
        if is_real {
            text.push(self.advance());
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                text.push(self.advance());
            }
            return text
                .parse()
                .map(Token::Real)
                .map_err(|_| CompileError::new(ErrorKind::UnknownToken(text.clone()), start));
        }
        text.parse()
            .map(Token::Integer)
            .map_err(|_| CompileError::new(ErrorKind::UnknownToken(text.clone()), start))
    }

    fn scan_text(&mut self, start: SourcePosition) -> CompileResult<Token> {
        self.advance();
        let mut value = String::new();
        loop {
            if self.is_at_end() {
                return Err(CompileError::new(
                    ErrorKind::UnexpectedToken {
                        found: Token::EOF.to_string(),
                        expected: "'".to_string(),
                    },
                    start,
                ));
            }
            let c = self.advance_tracking_lines();
            if c == '\'' {
                if self.match_char('\'') {
                    value.push('\'');
                } else {
                    return Ok(Token::Text(value));
                }
            } else {
                value.push(c);
            }
        }
    }

    fn scan_directive(&mut self, start: SourcePosition) -> CompileResult<Token> {
        self.advance();
        let mut name = String::new();
        while !self.is_at_end() && self.peek() != '@' {
            name.push(self.advance_tracking_lines());
        }
        if !self.match_char('@') {
            return Err(CompileError::new(
                ErrorKind::UnexpectedToken {
                    found: Token::EOF.to_string(),
                    expected: "@".to_string(),
                },
                start,
            ));
        }
        Ok(Token::Directive(name))
    }

    fn skip_whitespace_and_comments(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.advance_tracking_lines();
                }
                '#' => {
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.chars.len()
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.chars[self.position]
        }
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.position];
        self.position += 1;
        self.column += 1;
        ch
    }

    fn advance_tracking_lines(&mut self) -> char {
        let ch = self.advance();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        }
        ch
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.chars[self.position] != expected {
            false
        } else {
            self.position += 1;
            self.column += 1;
            true
        }
    }

    fn current_position(&self) -> SourcePosition {
        SourcePosition {
            line: self.line,
            column: self.column,
            offset: self.position,
        }
    }
}
