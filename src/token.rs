use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decoder::Mnemonic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Instruction(Mnemonic),
    /// The `DATA` pseudo-instruction.
    Data,
    Integer(u32),
    Register(u32),
    Label(String),
    Eof,
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Instruction(_) => "INSTRUCTION",
            TokenKind::Data => "DATA",
            TokenKind::Integer(_) => "INTEGER",
            TokenKind::Register(_) => "REGISTER",
            TokenKind::Label(_) => "LABEL",
            TokenKind::Eof => "EOF",
        }
    }

    pub fn is_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Integer(_) | TokenKind::Register(_) | TokenKind::Label(_)
        )
    }
}

/// Renders in the notation the lexer reads back.
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Instruction(m) => write!(f, "{m}"),
            TokenKind::Data => f.write_str("DATA"),
            TokenKind::Integer(v) => write!(f, "{v:X}h"),
            TokenKind::Register(r) => write!(f, "${r:X}"),
            TokenKind::Label(name) => write!(f, ":{name}"),
            TokenKind::Eof => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }

    /// A token with no source position, used for synthesized operands.
    pub fn detached(kind: TokenKind) -> Self {
        Self::new(kind, 0, 0)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_assembly_notation() {
        assert_eq!(TokenKind::Register(0xA).to_string(), "$A");
        assert_eq!(TokenKind::Integer(0x20B).to_string(), "20Bh");
        assert_eq!(TokenKind::Integer(0).to_string(), "0h");
        assert_eq!(TokenKind::Label("endloop".into()).to_string(), ":endloop");
        assert_eq!(TokenKind::Instruction(Mnemonic::Draw).to_string(), "DRAW");
        assert_eq!(TokenKind::Eof.to_string(), "");
    }
}
