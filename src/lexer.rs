//! Assembly text to tokens.
//!
//! ```text
//! :loop               ; label definition
//! MOV   $2, 8h        ; register, hex integer
//! DATA  20Ah, 10010000n, 17o
//! JMP   :loop
//! ```

use std::num::IntErrorKind;

use tracing::debug;

use crate::decoder::Mnemonic;
use crate::token::{Token, TokenKind};

const COMMENT: char = ';';
const LABEL: char = ':';
const REGISTER: char = '$';
const HEX_RADIX: char = 'h';
const OCT_RADIX: char = 'o';
const BIN_RADIX: char = 'n';

/// Characters either side of the failure point shown in diagnostics.
const CONTEXT_WIDTH: usize = 5;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("line {line}, col {column}: invalid instruction `{name}` near `{context}`")]
    InvalidInstruction {
        name: String,
        line: usize,
        column: usize,
        context: String,
    },
    #[error("line {line}, col {column}: empty label near `{context}`")]
    EmptyLabel {
        line: usize,
        column: usize,
        context: String,
    },
    #[error("line {line}, col {column}: register without a number near `{context}`")]
    EmptyRegister {
        line: usize,
        column: usize,
        context: String,
    },
    #[error("line {line}, col {column}: integer `{literal}` is too large near `{context}`")]
    IntegerOverflow {
        literal: String,
        line: usize,
        column: usize,
        context: String,
    },
    #[error("line {line}, col {column}: unexpected symbol `{symbol}` near `{context}`")]
    UnexpectedSymbol {
        symbol: char,
        line: usize,
        column: usize,
        context: String,
    },
}

impl LexError {
    pub fn position(&self) -> (usize, usize) {
        match self {
            LexError::InvalidInstruction { line, column, .. }
            | LexError::EmptyLabel { line, column, .. }
            | LexError::EmptyRegister { line, column, .. }
            | LexError::IntegerOverflow { line, column, .. }
            | LexError::UnexpectedSymbol { line, column, .. } => (*line, *column),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    pos: usize,
    line: usize,
    column: usize,
}

#[derive(Debug, Clone)]
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

fn is_space(c: char) -> bool {
    c.is_whitespace() || c == ','
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Consumes the whole input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        debug!(tokens = tokens.len(), lines = self.line, "tokenized");
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn is(&self, pred: impl Fn(char) -> bool) -> bool {
        self.peek().is_some_and(pred)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn rewind(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.line = mark.line;
        self.column = mark.column;
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek().filter(|c| pred(*c)) {
            s.push(c);
            self.advance();
        }
        s
    }

    /// `pre > cur < post` around the current position.
    fn context(&self) -> String {
        let start = self.pos.saturating_sub(CONTEXT_WIDTH);
        let end = (self.pos + 1 + CONTEXT_WIDTH).min(self.chars.len());
        let pre: String = self.chars[start..self.pos.min(self.chars.len())].iter().collect();
        let cur = self.peek().map(String::from).unwrap_or_default();
        let post: String = self.chars.get(self.pos + 1..end).unwrap_or(&[]).iter().collect();
        format!("{pre} > {cur} < {post}").replace('\n', "\\n")
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.is(is_space) {
                self.advance();
            }
            if !self.is(|c| c == COMMENT) {
                break;
            }
            while self.is(|c| c != '\n') {
                self.advance();
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let Mark { line, column, .. } = self.mark();

        // Mnemonics are hex-digit shaped too (ADD, BCD), so digits only win
        // when the run actually parses as a number.
        if self.is(|c| c.is_ascii_hexdigit()) {
            if let Some(v) = self.integer()? {
                return Ok(Token::new(TokenKind::Integer(v), line, column));
            }
        }

        let kind = match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => self.instruction(line, column)?,
            Some(LABEL) => self.label()?,
            Some(REGISTER) => self.register()?,
            None => TokenKind::Eof,
            Some(symbol) => {
                return Err(LexError::UnexpectedSymbol {
                    symbol,
                    line,
                    column,
                    context: self.context(),
                })
            }
        };
        Ok(Token::new(kind, line, column))
    }

    /// Hex-shaped run with an optional radix marker. Rewinds and returns
    /// `None` when the run is not a number in that radix.
    fn integer(&mut self) -> Result<Option<u32>, LexError> {
        let start = self.mark();
        let digits = self.take_while(|c| c.is_ascii_hexdigit());
        let radix = match self.peek() {
            Some(HEX_RADIX) => 16,
            Some(OCT_RADIX) => 8,
            Some(BIN_RADIX) => 2,
            _ => 10,
        };
        if radix != 10 {
            self.advance();
        }
        match u32::from_str_radix(&digits, radix) {
            Ok(v) => Ok(Some(v)),
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
                let end = self.mark();
                self.rewind(start);
                let err = LexError::IntegerOverflow {
                    literal: self.chars[start.pos..end.pos].iter().collect(),
                    line: start.line,
                    column: start.column,
                    context: self.context(),
                };
                Err(err)
            }
            Err(_) => {
                self.rewind(start);
                Ok(None)
            }
        }
    }

    fn instruction(&mut self, line: usize, column: usize) -> Result<TokenKind, LexError> {
        let name = self.take_while(|c| c.is_ascii_alphabetic()).to_ascii_uppercase();
        match name.parse::<Mnemonic>() {
            Ok(Mnemonic::Data) => Ok(TokenKind::Data),
            Ok(m) => Ok(TokenKind::Instruction(m)),
            Err(()) => Err(LexError::InvalidInstruction {
                name,
                line,
                column,
                context: self.context(),
            }),
        }
    }

    fn label(&mut self) -> Result<TokenKind, LexError> {
        self.advance();
        let name = self.take_while(|c| !is_space(c));
        if name.is_empty() {
            return Err(LexError::EmptyLabel {
                line: self.line,
                column: self.column,
                context: self.context(),
            });
        }
        Ok(TokenKind::Label(name))
    }

    fn register(&mut self) -> Result<TokenKind, LexError> {
        let start = self.mark();
        self.advance();
        let digits = self.take_while(|c| c.is_ascii_hexdigit());
        if digits.is_empty() {
            return Err(LexError::EmptyRegister {
                line: self.line,
                column: self.column,
                context: self.context(),
            });
        }
        u32::from_str_radix(&digits, 16)
            .map(TokenKind::Register)
            .map_err(|_| LexError::IntegerOverflow {
                literal: format!("{REGISTER}{digits}"),
                line: start.line,
                column: start.column,
                context: self.context(),
            })
    }
}

/// Shorthand for `Lexer::new(src).tokenize()`.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(src).tokenize()
}
