pub mod analyze;
pub mod assembler;
pub mod decoder;
pub mod disasm;
pub mod encoder;
pub mod instructions;
pub mod lexer;
pub mod memory;
pub mod token;

pub mod isa {
    pub mod chip8;
}

pub use analyze::{DisasmConfig, DisasmError, Disassembler, Disassembly};
pub use assembler::{AsmError, Assembler, Program};
pub use decoder::{DecodeError, Decoded, Decoder, Fields, Mnemonic};
pub use disasm::{fmt_decoded, raw_dump, scan, Listing};
pub use isa::chip8::Chip8Decoder;
pub use lexer::{LexError, Lexer};
pub use memory::{MEMORY_SIZE, PROGRAM_OFFSET, STACK_DEPTH};
pub use token::{Token, TokenKind};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Asm(#[from] AsmError),
    #[error(transparent)]
    Disasm(#[from] DisasmError),
}

/// Source text to program bytes.
pub fn assemble(source: &str) -> Result<Vec<u8>, Error> {
    let tokens = lexer::tokenize(source)?;
    Ok(assembler::assemble(&tokens)?.bytes)
}

/// Program bytes to assembly text, one line per entry.
pub fn disassemble(bytes: &[u8], cfg: &DisasmConfig) -> Result<Vec<String>, Error> {
    let dis = Disassembler::new(*cfg).run(bytes)?;
    Ok(Listing::new(&dis, cfg).lines())
}
