use std::fmt::{self, Write as _};

use bitvec::prelude::*;

use crate::analyze::{DisasmConfig, Disassembly, Item};
use crate::decoder::{Decoded, Decoder, Mnemonic};
use crate::isa::chip8::{reencode, Chip8Decoder};
use crate::memory::PROGRAM_OFFSET;
use crate::token::TokenKind;

const MNEMONIC_WIDTH: usize = 6;
const OPERANDS_WIDTH: usize = 20;
const DUMP_COLUMNS: usize = 16;

/// Mnemonic and operand text. Words whose fields do not survive re-encoding
/// (unused bits set) come out as `NOOP`, which keeps the text reassemblable.
fn parts(d: &Decoded, label: Option<&str>) -> (String, String) {
    if reencode(d) != Some(d.raw) {
        return (Mnemonic::Noop.to_string(), TokenKind::Integer(d.raw as u32).to_string());
    }
    let operands = match label {
        Some(name) => TokenKind::Label(name.to_string()).to_string(),
        None => d
            .operands
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    };
    (d.mnemonic.to_string(), operands)
}

/// `MOV $1, $8` with no padding or annotation.
pub fn fmt_decoded(d: &Decoded) -> String {
    let (mnemonic, operands) = parts(d, None);
    if operands.is_empty() {
        mnemonic
    } else {
        format!("{mnemonic} {operands}")
    }
}

/// Column-aligned instruction line, optionally annotated with its address
/// and raw word.
pub fn fmt_instruction(addr: u32, d: &Decoded, label: Option<&str>, comments: bool) -> String {
    let (mnemonic, operands) = parts(d, label);
    let mut line = format!("{mnemonic:<MNEMONIC_WIDTH$}{operands:<OPERANDS_WIDTH$}");
    if comments {
        let _ = write!(line, "; addr : {addr:X}; opcode : 0x{:04X}", d.raw);
    }
    line
}

pub fn fmt_data(addr: u32, byte: u8) -> String {
    format!(
        "{}\t{}, {}",
        TokenKind::Data,
        TokenKind::Integer(addr),
        TokenKind::Integer(byte as u32)
    )
}

pub fn fmt_label(name: &str) -> String {
    TokenKind::Label(name.to_string()).to_string()
}

/// Address-ordered assembly text for a [`Disassembly`].
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a> {
    disassembly: &'a Disassembly,
    comments: bool,
}

impl<'a> Listing<'a> {
    pub fn new(disassembly: &'a Disassembly, cfg: &DisasmConfig) -> Self {
        Self {
            disassembly,
            comments: cfg.comments,
        }
    }

    /// A jump operand is written as its label only when that label lands
    /// on a listed instruction; otherwise the raw target is used.
    fn label_for(&self, d: &Decoded, starts: &BitSlice) -> Option<&'a str> {
        if !d.mnemonic.is_branch() {
            return None;
        }
        let target = d.fields.nnn as u32;
        let listed = target
            .checked_sub(PROGRAM_OFFSET)
            .and_then(|off| starts.get(off as usize).map(|b| *b))
            .unwrap_or(false);
        if listed {
            self.disassembly.labels.get(&target).map(String::as_str)
        } else {
            None
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let starts = self.disassembly.starts();
        let mut lines = Vec::new();
        for item in self.disassembly.items() {
            if let Some(name) = self.disassembly.labels.get(&item.address()) {
                lines.push(fmt_label(name));
            }
            lines.push(match item {
                Item::Instruction(addr, d) => {
                    fmt_instruction(addr, d, self.label_for(d, &starts), self.comments)
                }
                Item::Data(addr, byte) => fmt_data(addr, byte),
            });
        }
        lines
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// Uppercase hex bytes, sixteen to a line.
pub fn raw_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(DUMP_COLUMNS)
        .map(|row| {
            row.iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decodes every word of `bytes[start..stop]` in place, without following
/// control flow. A trailing odd byte is ignored.
pub fn scan(bytes: &[u8], start: usize, stop: Option<usize>) -> Vec<String> {
    let stop = stop.unwrap_or(bytes.len()).min(bytes.len());
    let Some(window) = bytes.get(start..stop) else {
        return Vec::new();
    };
    let decoder = Chip8Decoder::lenient();
    window
        .chunks_exact(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let raw = u16::from_be_bytes([pair[0], pair[1]]);
            let d = decoder.decode(raw).ok()?;
            let addr = PROGRAM_OFFSET + (start + i * 2) as u32;
            Some(format!("{} - 0x{raw:04X} ADDR: {addr:X}", fmt_decoded(&d)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::Disassembler;

    fn decode(raw: u16) -> Decoded {
        Chip8Decoder::strict().decode(raw).unwrap()
    }

    #[test]
    fn operand_rendering() {
        assert_eq!(fmt_decoded(&decode(0x8180)), "MOV $1, $8");
        assert_eq!(fmt_decoded(&decode(0x6208)), "MOV $2, 8h");
        assert_eq!(fmt_decoded(&decode(0xA20B)), "MVI 20Bh");
        assert_eq!(fmt_decoded(&decode(0xD123)), "DRAW $1, $2, 3h");
        assert_eq!(fmt_decoded(&decode(0x00E0)), "CLS");
        assert_eq!(fmt_decoded(&decode(0xF355)), "STR $3");
    }

    #[test]
    fn unused_bits_fall_back_to_noop() {
        // SHR ignores y; a set y nibble would be lost on reassembly
        assert_eq!(fmt_decoded(&decode(0x8126)), "NOOP 8126h");
        assert_eq!(fmt_decoded(&decode(0x8106)), "SHR $1");
    }

    #[test]
    fn instruction_line_layout() {
        let d = decode(0x1206);
        assert_eq!(
            fmt_instruction(0x200, &d, Some("label-0x0206"), true),
            "JMP   :label-0x0206       ; addr : 200; opcode : 0x1206"
        );
        assert_eq!(fmt_instruction(0x200, &d, None, false), format!("JMP   {:<20}", "206h"));
        assert_eq!(fmt_data(0x202, 0x45), "DATA\t202h, 45h");
    }

    #[test]
    fn listing_interleaves_labels_and_data() {
        let bytes = [0x12, 0x06, 0x45, 0x67, 0xAB, 0xCD, 0x81, 0x80, 0x00, 0xE0];
        let dis = Disassembler::default().run(&bytes).unwrap();
        let cfg = DisasmConfig { comments: false, ..Default::default() };
        let lines: Vec<String> = Listing::new(&dis, &cfg)
            .lines()
            .into_iter()
            .map(|l| l.trim_end().to_string())
            .collect();
        assert_eq!(
            lines,
            vec![
                "JMP   :label-0x0206",
                "DATA\t202h, 45h",
                "DATA\t203h, 67h",
                "DATA\t204h, ABh",
                "DATA\t205h, CDh",
                ":label-0x0206",
                "MOV   $1, $8",
                "CLS",
            ]
        );
    }

    #[test]
    fn dump_wraps_at_sixteen() {
        let bytes: Vec<u8> = (0u8..18).collect();
        let dump = raw_dump(&bytes);
        let rows: Vec<&str> = dump.lines().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F");
        assert_eq!(rows[1], "10 11");
    }

    #[test]
    fn scan_reports_load_addresses() {
        let bytes = [0x00, 0xE0, 0x12, 0x00, 0x01];
        assert_eq!(
            scan(&bytes, 0, None),
            vec!["CLS - 0x00E0 ADDR: 200", "JMP 200h - 0x1200 ADDR: 202"]
        );
        assert_eq!(scan(&bytes, 2, Some(4)), vec!["JMP 200h - 0x1200 ADDR: 202"]);
        assert!(scan(&bytes, 9, None).is_empty());
    }
}
