use crate::assembler::AsmError;
use crate::decoder::Mnemonic;
use crate::instructions::{shapes_of, Shape};
use crate::isa::chip8::compose;
use crate::token::{Token, TokenKind};

/// Picks the operand shape for a mnemonic. `second` is the token after the
/// first operand; for mnemonics written both ways (`MOV $1, $2` /
/// `MOV $1, 2h`) a register there selects the register-register form.
pub fn select_shape(mnemonic: Mnemonic, second: Option<&Token>) -> Option<Shape> {
    let mut shapes = shapes_of(mnemonic);
    let first = shapes.next()?;
    if shapes.next().is_none() {
        return Some(first);
    }
    match second.map(|t| &t.kind) {
        Some(TokenKind::Register(_)) => Some(Shape::RegisterRegister),
        _ => Some(Shape::RegisterByte),
    }
}

/// One instruction being assembled. Operands are appended in source order
/// and label operands are swapped for addresses before `encode`.
#[derive(Debug, Clone)]
pub struct Encoder {
    origin: Token,
    mnemonic: Mnemonic,
    shape: Shape,
    operands: Vec<Token>,
}

impl Encoder {
    pub fn new(origin: Token, mnemonic: Mnemonic, shape: Shape) -> Self {
        Self {
            origin,
            mnemonic,
            shape,
            operands: Vec::with_capacity(shape.arity()),
        }
    }

    pub fn mnemonic(&self) -> Mnemonic {
        self.mnemonic
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn origin(&self) -> &Token {
        &self.origin
    }

    pub fn operands(&self) -> &[Token] {
        &self.operands
    }

    pub fn add_operand(&mut self, token: Token) -> Result<(), AsmError> {
        if !token.kind.is_operand() {
            return Err(AsmError::InvalidOperand {
                token: token.kind.name().to_string(),
                expected: "an operand",
                line: token.line,
                column: token.column,
            });
        }
        self.operands.push(token);
        Ok(())
    }

    pub fn resolve_label(&mut self, index: usize, name: &str, address: u32) -> Result<(), AsmError> {
        let not_found = || AsmError::LabelNotFound {
            name: name.to_string(),
            index,
        };
        let token = self.operands.get_mut(index).ok_or_else(not_found)?;
        let TokenKind::Label(found) = &token.kind else {
            return Err(not_found());
        };
        if found != name {
            return Err(AsmError::LabelMismatch {
                expected: name.to_string(),
                found: found.clone(),
            });
        }
        token.kind = TokenKind::Integer(address);
        Ok(())
    }

    pub fn encode(&self) -> Result<u16, AsmError> {
        let Token { line, column, .. } = self.origin;
        if self.operands.len() != self.shape.arity() {
            return Err(AsmError::OperandCount {
                mnemonic: self.mnemonic,
                expected: self.shape.arity(),
                found: self.operands.len(),
                line,
                column,
            });
        }

        let mut values = Vec::with_capacity(self.operands.len());
        for (slot, token) in self.shape.slots().iter().zip(&self.operands) {
            let value = match (&token.kind, slot.is_register()) {
                (TokenKind::Register(v), true) | (TokenKind::Integer(v), false) => *v,
                (TokenKind::Label(name), false) => {
                    return Err(AsmError::UnresolvedLabel {
                        names: vec![name.clone()],
                    })
                }
                (kind, register) => {
                    return Err(AsmError::InvalidOperand {
                        token: kind.to_string(),
                        expected: if register { "a register" } else { "an integer or label" },
                        line: token.line,
                        column: token.column,
                    })
                }
            };
            if value > slot.max() {
                return Err(AsmError::OperandOutOfRange {
                    mnemonic: self.mnemonic,
                    value,
                    max: slot.max(),
                    line: token.line,
                    column: token.column,
                });
            }
            values.push(value as u16);
        }

        compose(self.mnemonic, self.shape, &values).ok_or(AsmError::UnsupportedShape {
            mnemonic: self.mnemonic,
            shape: self.shape,
            line,
            column,
        })
    }
}
