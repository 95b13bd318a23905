use std::collections::BTreeMap;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::decoder::{Decoded, Decoder, Mnemonic};
use crate::isa::chip8::Chip8Decoder;
use crate::memory::{Rom, INSTRUCTION_WIDTH, MEMORY_SIZE, PROGRAM_OFFSET, STACK_DEPTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisasmConfig {
    /// Append `; addr : ...; opcode : ...` to instruction lines.
    pub comments: bool,
    /// Worklist length past which exploration gives up.
    pub max_branches: usize,
}

impl Default for DisasmConfig {
    fn default() -> Self {
        Self {
            comments: true,
            max_branches: STACK_DEPTH * 3,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DisasmError {
    #[error("opcode {opcode:#06X} at {address:#05X} continues at {target:#06X}, outside memory")]
    AddressOutOfRange { address: u32, opcode: u16, target: u32 },
    #[error("opcode {opcode:#06X} at {address:#05X} left {pending} branches pending (limit {limit})")]
    RunawayBranching {
        address: u32,
        opcode: u16,
        pending: usize,
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
    Fallthrough,
    Jump,
    Call,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: u32,
    pub to: u32,
    pub kind: EdgeKind,
}

/// One unit of the address-ordered listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'a> {
    Instruction(u32, &'a Decoded),
    Data(u32, u8),
}

impl Item<'_> {
    pub fn address(&self) -> u32 {
        match self {
            Item::Instruction(addr, _) | Item::Data(addr, _) => *addr,
        }
    }
}

/// Result of exploring a program image.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Disassembly {
    pub bytes: Vec<u8>,
    /// Reachable instruction starts.
    pub instructions: BTreeMap<u32, Decoded>,
    /// Jump and call targets.
    pub labels: BTreeMap<u32, String>,
    pub edges: Vec<Edge>,
}

impl Disassembly {
    pub fn end(&self) -> u32 {
        PROGRAM_OFFSET + self.bytes.len() as u32
    }

    /// Walks the image in address order: an explored address yields its
    /// instruction and skips a word, anything else is a single data byte.
    pub fn items(&self) -> Vec<Item<'_>> {
        let rom = Rom::new(&self.bytes);
        let mut items = Vec::new();
        let mut addr = PROGRAM_OFFSET;
        while addr < self.end() {
            match (self.instructions.get(&addr), rom.read_u8(addr)) {
                (Some(d), _) => {
                    items.push(Item::Instruction(addr, d));
                    addr += INSTRUCTION_WIDTH;
                }
                (None, Some(byte)) => {
                    items.push(Item::Data(addr, byte));
                    addr += 1;
                }
                (None, None) => break,
            }
        }
        items
    }

    /// Instruction starts as they appear in `items`. Explored addresses that
    /// fall inside another listed instruction are not starts.
    pub fn starts(&self) -> BitVec {
        let mut starts = bitvec![0; self.bytes.len()];
        for item in self.items() {
            if let Item::Instruction(addr, _) = item {
                starts.set((addr - PROGRAM_OFFSET) as usize, true);
            }
        }
        starts
    }

    /// Contiguous `[start, end)` runs of addresses not covered by listed
    /// instructions.
    pub fn data_ranges(&self) -> Vec<(u32, u32)> {
        let mut ranges: Vec<(u32, u32)> = Vec::new();
        for item in self.items() {
            let Item::Data(addr, _) = item else { continue };
            match ranges.last_mut() {
                Some((_, end)) if *end == addr => *end += 1,
                _ => ranges.push((addr, addr + 1)),
            }
        }
        ranges
    }
}

/// Control-flow directed disassembler. Exploration starts at the load
/// address; every branch target and skip fall-through joins a worklist.
#[derive(Debug, Clone)]
pub struct Disassembler {
    cfg: DisasmConfig,
    decoder: Chip8Decoder,
}

impl Disassembler {
    pub fn new(cfg: DisasmConfig) -> Self {
        Self {
            cfg,
            decoder: Chip8Decoder::lenient(),
        }
    }

    pub fn config(&self) -> &DisasmConfig {
        &self.cfg
    }

    pub fn run(&self, bytes: &[u8]) -> Result<Disassembly, DisasmError> {
        let mut out = Disassembly {
            bytes: bytes.to_vec(),
            ..Default::default()
        };
        let rom = Rom::new(bytes);
        let mut worklist = vec![PROGRAM_OFFSET];
        while let Some(addr) = worklist.pop() {
            self.walk(rom, addr, &mut worklist, &mut out)?;
        }
        debug!(
            explored = out.instructions.len(),
            labels = out.labels.len(),
            size = bytes.len(),
            "disassembled"
        );
        Ok(out)
    }

    /// Follows one thread of control until it returns, runs into explored
    /// code or leaves the image.
    fn walk(
        &self,
        rom: Rom<'_>,
        mut addr: u32,
        worklist: &mut Vec<u32>,
        out: &mut Disassembly,
    ) -> Result<(), DisasmError> {
        // the last byte alone is not an instruction
        let limit = rom.end().saturating_sub(1);
        while addr < limit && !out.instructions.contains_key(&addr) {
            let Some(raw) = rom.read_u16(addr) else { break };
            let d = match self.decoder.decode(raw) {
                Ok(d) => d,
                Err(_) => break,
            };
            let mnemonic = d.mnemonic;
            let target = d.fields.nnn as u32;
            let label = d.label.clone();
            out.instructions.insert(addr, d);
            trace!(addr, raw, %mnemonic, "explore");

            if mnemonic == Mnemonic::Ret {
                break;
            }

            let fallthrough = addr + INSTRUCTION_WIDTH;
            let next = match mnemonic {
                Mnemonic::Jmp => {
                    out.edges.push(Edge { from: addr, to: target, kind: EdgeKind::Jump });
                    if let Some(label) = label {
                        out.labels.insert(target, label);
                    }
                    target
                }
                Mnemonic::Jsr => {
                    worklist.push(fallthrough);
                    out.edges.push(Edge { from: addr, to: target, kind: EdgeKind::Call });
                    if let Some(label) = label {
                        out.labels.insert(target, label);
                    }
                    target
                }
                m if m.is_skip() => {
                    worklist.push(fallthrough);
                    let skipped = fallthrough + INSTRUCTION_WIDTH;
                    out.edges.push(Edge { from: addr, to: fallthrough, kind: EdgeKind::Fallthrough });
                    out.edges.push(Edge { from: addr, to: skipped, kind: EdgeKind::Skip });
                    skipped
                }
                _ => {
                    out.edges.push(Edge { from: addr, to: fallthrough, kind: EdgeKind::Fallthrough });
                    fallthrough
                }
            };

            if next >= MEMORY_SIZE {
                return Err(DisasmError::AddressOutOfRange {
                    address: addr,
                    opcode: raw,
                    target: next,
                });
            }
            if worklist.len() > self.cfg.max_branches {
                return Err(DisasmError::RunawayBranching {
                    address: addr,
                    opcode: raw,
                    pending: worklist.len(),
                    limit: self.cfg.max_branches,
                });
            }
            addr = next;
        }
        Ok(())
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new(DisasmConfig::default())
    }
}

/// Explores `bytes` with the default configuration.
pub fn analyze(bytes: &[u8]) -> Result<Disassembly, DisasmError> {
    Disassembler::default().run(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[u16]) -> Vec<u8> {
        ws.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn call_explores_target_and_return_site() {
        let d = analyze(&words(&[0x2206, 0xD123, 0x8084, 0x8180, 0x00EE])).unwrap();
        let explored: Vec<u32> = d.instructions.keys().copied().collect();
        assert_eq!(explored, vec![0x200, 0x202, 0x204, 0x206, 0x208]);
        assert_eq!(d.labels.get(&0x206).map(String::as_str), Some("label-0x0206"));
        assert!(d.edges.contains(&Edge { from: 0x200, to: 0x206, kind: EdgeKind::Call }));
    }

    #[test]
    fn jump_leaves_gap_as_data() {
        let d = analyze(&words(&[0x1206, 0x0000, 0x0000, 0x8180, 0x00E0])).unwrap();
        assert!(!d.instructions.contains_key(&0x202));
        assert_eq!(d.data_ranges(), vec![(0x202, 0x206)]);
        let starts = d.starts();
        assert!(starts[0]);
        assert!(!starts[2]);
        assert!(starts[6]);
    }

    #[test]
    fn skip_explores_both_paths() {
        let d = analyze(&words(&[0x3000, 0x4000, 0xE09E, 0xE0A1])).unwrap();
        assert_eq!(d.instructions.len(), 4);
        assert!(d.data_ranges().is_empty());
    }

    #[test]
    fn odd_trailing_byte_is_data() {
        let d = analyze(&[0x00, 0xE0, 0x42]).unwrap();
        assert_eq!(d.instructions.len(), 1);
        assert_eq!(d.items().last(), Some(&Item::Data(0x202, 0x42)));
    }

    #[test]
    fn tiny_branch_limit_trips() {
        let cfg = DisasmConfig { max_branches: 2, ..Default::default() };
        let err = Disassembler::new(cfg).run(&words(&[0x3000; 8])).unwrap_err();
        assert!(matches!(err, DisasmError::RunawayBranching { pending: 3, limit: 2, .. }));
    }
}
