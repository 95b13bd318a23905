use serde::Serialize;

use chip8_asm::analyze::{Edge, Item};
use chip8_asm::disasm::fmt_decoded;
use chip8_asm::{Disassembly, PROGRAM_OFFSET};

#[derive(Debug, Clone, Serialize)]
pub struct InsnOut {
    pub addr: u32,
    pub raw: u16,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelKV {
    pub addr: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeOut {
    pub start: u32,
    pub end: u32,
}

/// JSON shape of a disassembly.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub entry: u32,
    pub size: usize,
    pub code: Vec<InsnOut>,
    pub labels: Vec<LabelKV>,
    pub data: Vec<RangeOut>,
    pub edges: Vec<Edge>,
}

impl Report {
    pub fn new(dis: &Disassembly) -> Self {
        let code = dis
            .items()
            .into_iter()
            .filter_map(|item| match item {
                Item::Instruction(addr, d) => Some(InsnOut {
                    addr,
                    raw: d.raw,
                    text: fmt_decoded(d),
                }),
                Item::Data(..) => None,
            })
            .collect();
        let labels = dis
            .labels
            .iter()
            .map(|(&addr, name)| LabelKV {
                addr,
                name: name.clone(),
            })
            .collect();
        let data = dis
            .data_ranges()
            .into_iter()
            .map(|(start, end)| RangeOut { start, end })
            .collect();
        Self {
            entry: PROGRAM_OFFSET,
            size: dis.bytes.len(),
            code,
            labels,
            data,
            edges: dis.edges.clone(),
        }
    }
}
