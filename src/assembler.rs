//! Two-pass assembler.
//!
//! Pass one walks the token stream, building an [`Encoder`] per instruction,
//! collecting DATA bytes at their declared addresses and recording where each
//! label is defined and referenced. Pass two lays instructions out around the
//! data, patches label operands with their final addresses and emits the
//! image.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, trace};

use crate::decoder::Mnemonic;
use crate::encoder::{select_shape, Encoder};
use crate::instructions::Shape;
use crate::memory::{Layout, INSTRUCTION_WIDTH, MEMORY_SIZE, PROGRAM_OFFSET};
use crate::token::{Token, TokenKind};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}, col {column}: label `{name}` is already defined")]
    DuplicateLabel {
        name: String,
        line: usize,
        column: usize,
    },
    #[error("unresolved label(s): {}", .names.join(", "))]
    UnresolvedLabel { names: Vec<String> },
    #[error("line {line}, col {column}: {mnemonic} takes {expected} operand(s), found {found}")]
    OperandCount {
        mnemonic: Mnemonic,
        expected: usize,
        found: usize,
        line: usize,
        column: usize,
    },
    #[error("line {line}, col {column}: expected {expected}, found `{token}`")]
    InvalidOperand {
        token: String,
        expected: &'static str,
        line: usize,
        column: usize,
    },
    #[error("line {line}, col {column}: {mnemonic} operand {value:#X} exceeds {max:#X}")]
    OperandOutOfRange {
        mnemonic: Mnemonic,
        value: u32,
        max: u32,
        line: usize,
        column: usize,
    },
    #[error("line {line}, col {column}: {mnemonic} at {address:#05X} overlaps data at {:#05X}", .address + 1)]
    Collision {
        mnemonic: Mnemonic,
        address: u32,
        line: usize,
        column: usize,
    },
    #[error("line {line}, col {column}: data address {address:#05X} is already in use")]
    DataOverlap {
        address: u32,
        line: usize,
        column: usize,
    },
    #[error("line {line}, col {column}: data address {address:#05X} is below the load address")]
    DataBelowLoadAddress {
        address: u32,
        line: usize,
        column: usize,
    },
    #[error("line {line}, col {column}: data byte {value:#X} exceeds 0xFF")]
    DataOutOfRange {
        value: u32,
        line: usize,
        column: usize,
    },
    #[error("line {line}, col {column}: DATA at {address:#05X} has no bytes")]
    EmptyData {
        address: u32,
        line: usize,
        column: usize,
    },
    #[error("line {line}, col {column}: DATA must start with an address, found `{token}`")]
    ExpectedDataAddress {
        token: String,
        line: usize,
        column: usize,
    },
    #[error("program is {size:#X} bytes, at most {limit:#X} fit in memory")]
    ProgramTooLarge { size: u32, limit: u32 },
    #[error("line {line}, col {column}: unexpected {kind} token `{token}`")]
    UnexpectedToken {
        kind: &'static str,
        token: String,
        line: usize,
        column: usize,
    },
    #[error("token stream ended without EOF")]
    UnexpectedEnd,
    #[error("operand {index} is not a reference to `{name}`")]
    LabelNotFound { name: String, index: usize },
    #[error("expected reference to `{expected}`, found `{found}`")]
    LabelMismatch { expected: String, found: String },
    #[error("line {line}, col {column}: {mnemonic} has no {shape:?} form")]
    UnsupportedShape {
        mnemonic: Mnemonic,
        shape: Shape,
        line: usize,
        column: usize,
    },
}

/// A label operand waiting for its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelReference {
    pub instruction: usize,
    pub operand: usize,
}

/// Assembled image plus the final address of every label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Program {
    pub bytes: Vec<u8>,
    pub symbols: BTreeMap<String, u32>,
}

#[derive(Debug)]
pub struct Assembler<'t> {
    tokens: &'t [Token],
    cursor: usize,
    encoders: Vec<Encoder>,
    /// Instruction index -> labels defined right before it.
    sites: BTreeMap<usize, Vec<String>>,
    references: HashMap<String, Vec<LabelReference>>,
    symbols: BTreeMap<String, u32>,
    data: BTreeMap<u32, u8>,
}

impl<'t> Assembler<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            cursor: 0,
            encoders: Vec::new(),
            sites: BTreeMap::new(),
            references: HashMap::new(),
            symbols: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn assemble(mut self) -> Result<Program, AsmError> {
        self.parse()?;
        debug!(
            instructions = self.encoders.len(),
            data = self.data.len(),
            labels = self.sites.values().map(Vec::len).sum::<usize>(),
            "parsed"
        );
        let layout = self.layout()?;
        let bytes = layout.emit(&self.encoders)?;
        debug!(size = bytes.len(), "assembled");
        Ok(Program {
            bytes,
            symbols: self.symbols,
        })
    }

    fn next(&mut self) -> Result<&'t Token, AsmError> {
        let tokens = self.tokens;
        let token = tokens.get(self.cursor).ok_or(AsmError::UnexpectedEnd)?;
        self.cursor += 1;
        Ok(token)
    }

    fn peek(&self) -> Option<&'t Token> {
        let tokens = self.tokens;
        tokens.get(self.cursor)
    }

    fn parse(&mut self) -> Result<(), AsmError> {
        loop {
            let token = self.next()?;
            match &token.kind {
                TokenKind::Instruction(m) => self.instruction(token, *m)?,
                TokenKind::Label(name) => self.define(token, name)?,
                TokenKind::Data => self.data_block(token)?,
                TokenKind::Eof => return Ok(()),
                other => {
                    return Err(AsmError::UnexpectedToken {
                        kind: other.name(),
                        token: other.to_string(),
                        line: token.line,
                        column: token.column,
                    })
                }
            }
        }
    }

    fn instruction(&mut self, origin: &Token, mnemonic: Mnemonic) -> Result<(), AsmError> {
        let second = self.tokens.get(self.cursor + 1);
        let shape = select_shape(mnemonic, second).ok_or(AsmError::UnexpectedToken {
            kind: origin.kind.name(),
            token: origin.kind.to_string(),
            line: origin.line,
            column: origin.column,
        })?;

        let index = self.encoders.len();
        let mut encoder = Encoder::new(origin.clone(), mnemonic, shape);
        for operand in 0..shape.arity() {
            let token = self.next()?;
            if !token.kind.is_operand() {
                return Err(AsmError::OperandCount {
                    mnemonic,
                    expected: shape.arity(),
                    found: operand,
                    line: origin.line,
                    column: origin.column,
                });
            }
            encoder.add_operand(token.clone())?;
            if let TokenKind::Label(name) = &token.kind {
                self.references
                    .entry(name.clone())
                    .or_default()
                    .push(LabelReference {
                        instruction: index,
                        operand,
                    });
            }
        }
        self.encoders.push(encoder);
        Ok(())
    }

    fn define(&mut self, token: &Token, name: &str) -> Result<(), AsmError> {
        let defined = self.sites.values().flatten().any(|n| n == name);
        if defined {
            return Err(AsmError::DuplicateLabel {
                name: name.to_string(),
                line: token.line,
                column: token.column,
            });
        }
        self.sites
            .entry(self.encoders.len())
            .or_default()
            .push(name.to_string());
        Ok(())
    }

    /// `DATA <address> <byte>...`: bytes land at consecutive addresses.
    fn data_block(&mut self, origin: &Token) -> Result<(), AsmError> {
        let token = self.next()?;
        let TokenKind::Integer(start) = token.kind else {
            return Err(AsmError::ExpectedDataAddress {
                token: token.kind.to_string(),
                line: token.line,
                column: token.column,
            });
        };
        if start < PROGRAM_OFFSET {
            return Err(AsmError::DataBelowLoadAddress {
                address: start,
                line: token.line,
                column: token.column,
            });
        }

        let mut address = start;
        while let Some(Token {
            kind: TokenKind::Integer(value),
            line,
            column,
        }) = self.peek()
        {
            self.cursor += 1;
            let (value, line, column) = (*value, *line, *column);
            let byte = u8::try_from(value).map_err(|_| AsmError::DataOutOfRange {
                value,
                line,
                column,
            })?;
            if self.data.insert(address, byte).is_some() {
                return Err(AsmError::DataOverlap {
                    address,
                    line,
                    column,
                });
            }
            address = address.checked_add(1).ok_or(AsmError::ProgramTooLarge {
                size: u32::MAX,
                limit: MEMORY_SIZE - PROGRAM_OFFSET,
            })?;
        }

        if address == start {
            return Err(AsmError::EmptyData {
                address: start,
                line: origin.line,
                column: origin.column,
            });
        }
        trace!(start, len = address - start, "data");
        Ok(())
    }

    /// Pass two: place instructions and bind labels to addresses.
    fn layout(&mut self) -> Result<Layout, AsmError> {
        let mut layout = Layout::new(std::mem::take(&mut self.data));
        let mut address = PROGRAM_OFFSET;

        for index in 0..self.encoders.len() {
            address = layout.next_free(address);
            self.bind(index, address)?;
            if layout.collides(address) {
                let origin = self.encoders[index].origin();
                return Err(AsmError::Collision {
                    mnemonic: self.encoders[index].mnemonic(),
                    address,
                    line: origin.line,
                    column: origin.column,
                });
            }
            trace!(index, address, "place");
            layout.place(address, index);
            address += INSTRUCTION_WIDTH;
        }
        // labels after the last instruction
        self.bind(self.encoders.len(), layout.next_free(address))?;

        if !self.references.is_empty() {
            let mut names: Vec<String> = self.references.keys().cloned().collect();
            names.sort();
            return Err(AsmError::UnresolvedLabel { names });
        }
        Ok(layout)
    }

    fn bind(&mut self, index: usize, address: u32) -> Result<(), AsmError> {
        let Some(names) = self.sites.remove(&index) else {
            return Ok(());
        };
        for name in names {
            for r in self.references.remove(&name).unwrap_or_default() {
                trace!(label = %name, address, instruction = r.instruction, "resolve");
                self.encoders[r.instruction].resolve_label(r.operand, &name, address)?;
            }
            self.symbols.insert(name, address);
        }
        Ok(())
    }
}

/// Assembles a token stream produced by the lexer.
pub fn assemble(tokens: &[Token]) -> Result<Program, AsmError> {
    Assembler::new(tokens).assemble()
}
