use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::assembler::AsmError;
use crate::encoder::Encoder;

/// Programs are loaded at this address; everything below belongs to the
/// interpreter.
pub const PROGRAM_OFFSET: u32 = 0x200;
/// Size of the addressable space.
pub const MEMORY_SIZE: u32 = 0x1000;
/// Call stack depth of the machine.
pub const STACK_DEPTH: usize = 16;
/// Bytes per instruction word.
pub const INSTRUCTION_WIDTH: u32 = 2;

/// Read-only view of a program image as it sits in memory: `bytes[0]` is at
/// `base`. Words are big-endian.
#[derive(Debug, Clone, Copy)]
pub struct Rom<'a> {
    pub bytes: &'a [u8],
    pub base: u32,
}

impl<'a> Rom<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            base: PROGRAM_OFFSET,
        }
    }

    /// One past the last loaded address.
    pub fn end(&self) -> u32 {
        self.base + self.bytes.len() as u32
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.end()
    }

    pub fn read_u8(&self, addr: u32) -> Option<u8> {
        let off = addr.checked_sub(self.base)? as usize;
        self.bytes.get(off).copied()
    }

    pub fn read_u16(&self, addr: u32) -> Option<u16> {
        Some(u16::from_be_bytes([self.read_u8(addr)?, self.read_u8(addr + 1)?]))
    }
}

/// Final placement of an assembled program: data bytes at their declared
/// addresses and instructions packed around them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Start address -> instruction index.
    pub instructions: BTreeMap<u32, usize>,
    pub data: BTreeMap<u32, u8>,
}

impl Layout {
    pub fn new(data: BTreeMap<u32, u8>) -> Self {
        Self {
            instructions: BTreeMap::new(),
            data,
        }
    }

    pub fn is_data(&self, addr: u32) -> bool {
        self.data.contains_key(&addr)
    }

    /// First address at or after `addr` not claimed by data.
    pub fn next_free(&self, mut addr: u32) -> u32 {
        while self.is_data(addr) {
            addr += 1;
        }
        addr
    }

    /// An instruction at `addr` would have its low byte on top of data.
    pub fn collides(&self, addr: u32) -> bool {
        self.is_data(addr + 1)
    }

    pub fn place(&mut self, addr: u32, index: usize) {
        self.instructions.insert(addr, index);
    }

    /// One past the highest data address, or the load address without data.
    pub fn data_end(&self) -> u32 {
        self.data
            .last_key_value()
            .map_or(PROGRAM_OFFSET, |(addr, _)| addr + 1)
    }

    /// Image length in bytes. Data may sit past the packed instructions,
    /// leaving a zero-filled gap.
    pub fn size(&self) -> u32 {
        let packed = self.instructions.len() as u32 * INSTRUCTION_WIDTH + self.data.len() as u32;
        (self.data_end() - PROGRAM_OFFSET).max(packed)
    }

    /// Writes the image, encoding each placed instruction high byte first.
    pub fn emit(&self, encoders: &[Encoder]) -> Result<Vec<u8>, AsmError> {
        let size = self.size();
        if size + PROGRAM_OFFSET > MEMORY_SIZE {
            return Err(AsmError::ProgramTooLarge {
                size,
                limit: MEMORY_SIZE - PROGRAM_OFFSET,
            });
        }

        let mut image = vec![0u8; size as usize];
        for (&addr, &byte) in &self.data {
            image[(addr - PROGRAM_OFFSET) as usize] = byte;
        }
        for (&addr, &index) in &self.instructions {
            let Some(encoder) = encoders.get(index) else {
                continue;
            };
            let off = (addr - PROGRAM_OFFSET) as usize;
            image[off..off + 2].copy_from_slice(&encoder.encode()?.to_be_bytes());
        }
        Ok(image)
    }
}
