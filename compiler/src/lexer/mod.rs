use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest identifier the scanner accepts.
pub const MAX_IDENTIFIER_LENGTH: usize = 12;

/// Longest digit run the scanner accepts for a number literal.
pub const MAX_NUMBER_DIGITS: usize = 5;

/// The 33 token kinds, numbered the way the object tooling expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenKind {
    Null = 1,
    Identifier = 2,
    Number = 3,
    Plus = 4,
    Minus = 5,
    Multiply = 6,
    Slash = 7,
    Odd = 8,
    Equal = 9,
    NotEqual = 10,
    Less = 11,
    LessEqual = 12,
    Greater = 13,
    GreaterEqual = 14,
    LeftParen = 15,
    RightParen = 16,
    Comma = 17,
    Semicolon = 18,
    Period = 19,
    Becomes = 20,
    Begin = 21,
    End = 22,
    If = 23,
    Then = 24,
    While = 25,
    Do = 26,
    Call = 27,
    Const = 28,
    Var = 29,
    Procedure = 30,
    Write = 31,
    Read = 32,
    Else = 33,
}

impl TokenKind {
    pub fn id(self) -> u8 {
        self as u8
    }

    fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "procedure" => TokenKind::Procedure,
            "call" => TokenKind::Call,
            "begin" => TokenKind::Begin,
            "end" => TokenKind::End,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "read" => TokenKind::Read,
            "write" => TokenKind::Write,
            "odd" => TokenKind::Odd,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Null => "end of input",
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Multiply => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Odd => "'odd'",
            TokenKind::Equal => "'='",
            TokenKind::NotEqual => "'<>'",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Period => "'.'",
            TokenKind::Becomes => "':='",
            TokenKind::Begin => "'begin'",
            TokenKind::End => "'end'",
            TokenKind::If => "'if'",
            TokenKind::Then => "'then'",
            TokenKind::While => "'while'",
            TokenKind::Do => "'do'",
            TokenKind::Call => "'call'",
            TokenKind::Const => "'const'",
            TokenKind::Var => "'var'",
            TokenKind::Procedure => "'procedure'",
            TokenKind::Write => "'write'",
            TokenKind::Read => "'read'",
            TokenKind::Else => "'else'",
        };
        f.write_str(text)
    }
}

/// A scanned token. Identifiers carry their lexeme, numbers their value,
/// everything else carries neither.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    lexeme: Option<String>,
    value: Option<i32>,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn symbol(kind: TokenKind, line: usize, column: usize) -> Self {
        debug_assert!(!matches!(kind, TokenKind::Identifier | TokenKind::Number));
        Self {
            kind,
            lexeme: None,
            value: None,
            line,
            column,
        }
    }

    pub fn identifier(name: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind: TokenKind::Identifier,
            lexeme: Some(name.into()),
            value: None,
            line,
            column,
        }
    }

    pub fn number(value: i32, line: usize, column: usize) -> Self {
        Self {
            kind: TokenKind::Number,
            lexeme: None,
            value: Some(value),
            line,
            column,
        }
    }

    pub fn lexeme(&self) -> Option<&str> {
        self.lexeme.as_deref()
    }

    pub fn value(&self) -> Option<i32> {
        self.value
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lexeme, self.value) {
            (Some(name), _) => write!(f, "{:>2} {} {}", self.kind.id(), self.kind, name),
            (None, Some(value)) => write!(f, "{:>2} {} {}", self.kind.id(), self.kind, value),
            (None, None) => write!(f, "{:>2} {}", self.kind.id(), self.kind),
        }
    }
}

/// Anything the parser can pull tokens from, one at a time.
pub trait TokenSource {
    fn next_token(&mut self) -> Result<Token, LexerError>;
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Scan the whole input. The returned list always ends with a `Null` token.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Null;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace()?;

        let start_line = self.line;
        let start_column = self.column;

        if self.is_at_end() {
            return Ok(Token::symbol(TokenKind::Null, start_line, start_column));
        }

        let ch = self.advance();

        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Multiply,
            '/' => TokenKind::Slash,
            '=' => TokenKind::Equal,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Period,
            '<' => match self.peek() {
                '>' => {
                    self.advance();
                    TokenKind::NotEqual
                }
                '=' => {
                    self.advance();
                    TokenKind::LessEqual
                }
                _ => TokenKind::Less,
            },
            '>' => {
                if self.peek() == '=' {
                    self.advance();
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            ':' => {
                if self.peek() == '=' {
                    self.advance();
                    TokenKind::Becomes
                } else {
                    return Err(LexerError::UnexpectedCharacter(ch, start_line, start_column));
                }
            }
            _ if ch.is_ascii_digit() => {
                self.position -= 1;
                self.column -= 1;
                return self.number(start_line, start_column);
            }
            _ if ch.is_ascii_alphabetic() => {
                self.position -= 1;
                self.column -= 1;
                return self.identifier_or_keyword(start_line, start_column);
            }
            _ => return Err(LexerError::UnexpectedCharacter(ch, start_line, start_column)),
        };

        Ok(Token::symbol(kind, start_line, start_column))
    }

    fn number(&mut self, line: usize, column: usize) -> Result<Token, LexerError> {
        let mut digits = String::new();

        while !self.is_at_end() && self.peek().is_ascii_digit() {
            digits.push(self.advance());
        }

        if !self.is_at_end() && self.peek().is_ascii_alphabetic() {
            while !self.is_at_end() && self.peek().is_ascii_alphanumeric() {
                digits.push(self.advance());
            }
            return Err(LexerError::InvalidIdentifier(digits, line, column));
        }

        if digits.len() > MAX_NUMBER_DIGITS {
            return Err(LexerError::NumberTooLong(digits, line, column));
        }

        // At most five digits, so this always fits.
        let value = digits
            .parse::<i32>()
            .map_err(|_| LexerError::NumberTooLong(digits.clone(), line, column))?;
        Ok(Token::number(value, line, column))
    }

    fn identifier_or_keyword(&mut self, line: usize, column: usize) -> Result<Token, LexerError> {
        let mut word = String::new();

        while !self.is_at_end() && self.peek().is_ascii_alphanumeric() {
            word.push(self.advance());
        }

        if let Some(kind) = TokenKind::keyword(&word) {
            return Ok(Token::symbol(kind, line, column));
        }

        if word.len() > MAX_IDENTIFIER_LENGTH {
            return Err(LexerError::NameTooLong(word, line, column));
        }

        Ok(Token::identifier(word, line, column))
    }

    fn skip_whitespace(&mut self) -> Result<(), LexerError> {
        while !self.is_at_end() {
            match self.peek() {
                ' ' | '\r' | '\t' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                '/' if self.peek_next() == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            return Err(LexerError::UnterminatedComment(line, column));
                        }
                        if self.peek() == '*' && self.peek_next() == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.advance() == '\n' {
                            self.line += 1;
                            self.column = 1;
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn advance(&mut self) -> char {
        let ch = self.input[self.position];
        self.position += 1;
        self.column += 1;
        ch
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

impl TokenSource for Lexer {
    fn next_token(&mut self) -> Result<Token, LexerError> {
        Lexer::next_token(self)
    }
}

/// Replays a pre-scanned token list, then reports end of input forever.
impl TokenSource for std::vec::IntoIter<Token> {
    fn next_token(&mut self) -> Result<Token, LexerError> {
        Ok(self
            .next()
            .unwrap_or_else(|| Token::symbol(TokenKind::Null, 0, 0)))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at line {1}, column {2}")]
    UnexpectedCharacter(char, usize, usize),

    #[error("Identifier '{0}' is longer than 12 characters at line {1}, column {2}")]
    NameTooLong(String, usize, usize),

    #[error("Number '{0}' is longer than 5 digits at line {1}, column {2}")]
    NumberTooLong(String, usize, usize),

    #[error("Identifier '{0}' starts with a digit at line {1}, column {2}")]
    InvalidIdentifier(String, usize, usize),

    #[error("Unterminated comment starting at line {0}, column {1}")]
    UnterminatedComment(usize, usize),
}
