use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::instructions::Shape;
use crate::token::TokenKind;

/// The six canonical views of a 16-bit instruction word.
///
/// ```text
/// 0xF133  msb=F  x=1  y=3  lsb=3  kk=33  nnn=133
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fields {
    pub msb: u8,
    pub lsb: u8,
    pub x: u8,
    pub y: u8,
    pub kk: u8,
    pub nnn: u16,
}

bitflags! {
/// Selects which fields take part in packing a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMask: u8 {
const MSB = 1 << 0; // bits 12..15
const LSB = 1 << 1; // bits 0..3
const X = 1 << 2;   // bits 8..11
const Y = 1 << 3;   // bits 4..7
const KK = 1 << 4;  // bits 0..7
const NNN = 1 << 5; // bits 0..11
}
}

impl Fields {
    pub const fn decompose(word: u16) -> Self {
        Self {
            msb: ((word & 0xF000) >> 12) as u8,
            lsb: (word & 0x000F) as u8,
            x: ((word & 0x0F00) >> 8) as u8,
            y: ((word & 0x00F0) >> 4) as u8,
            kk: (word & 0x00FF) as u8,
            nnn: word & 0x0FFF,
        }
    }

    /// Packs the fields selected by `mask` back into a word. Every field is
    /// clipped to its bit width first.
    pub fn compose(&self, mask: FieldMask) -> u16 {
        let mut word = 0u16;
        if mask.contains(FieldMask::MSB) {
            word |= ((self.msb & 0xF) as u16) << 12;
        }
        if mask.contains(FieldMask::X) {
            word |= ((self.x & 0xF) as u16) << 8;
        }
        if mask.contains(FieldMask::Y) {
            word |= ((self.y & 0xF) as u16) << 4;
        }
        if mask.contains(FieldMask::LSB) {
            word |= (self.lsb & 0xF) as u16;
        }
        if mask.contains(FieldMask::KK) {
            word |= self.kk as u16;
        }
        if mask.contains(FieldMask::NNN) {
            word |= self.nnn & 0x0FFF;
        }
        word
    }
}

macro_rules! mnemonics {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Every instruction name the toolchain understands.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Mnemonic {
            $($variant),+
        }

        impl Mnemonic {
            pub const ALL: &'static [Mnemonic] = &[$(Mnemonic::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Mnemonic::$variant => $name),+
                }
            }
        }

        impl FromStr for Mnemonic {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Mnemonic::$variant),)+
                    _ => Err(()),
                }
            }
        }
    };
}

mnemonics! {
    // flow
    Cls => "CLS",
    Ret => "RET",
    Jmp => "JMP",
    Jsr => "JSR",
    Jmi => "JMI",
    Skeq => "SKEQ",
    Skne => "SKNE",
    // register transfer and arithmetic
    Mov => "MOV",
    Add => "ADD",
    Or => "OR",
    And => "AND",
    Xor => "XOR",
    Sub => "SUB",
    Shr => "SHR",
    Rsb => "RSB",
    Shl => "SHL",
    Rand => "RAND",
    // memory
    Mvi => "MVI",
    Adi => "ADI",
    Font => "FONT",
    Bcd => "BCD",
    Str => "STR",
    Ldr => "LDR",
    // timers
    Gdel => "GDEL",
    Sdel => "SDEL",
    Ssnd => "SSND",
    // keys
    Skpr => "SKPR",
    Skup => "SKUP",
    Key => "KEY",
    // display
    Draw => "DRAW",
    // assembler only
    Data => "DATA",
    Noop => "NOOP",
}

impl Mnemonic {
    /// Jump and call targets get a synthesized label when decoded.
    pub fn is_branch(self) -> bool {
        matches!(self, Mnemonic::Jmp | Mnemonic::Jsr)
    }

    /// Instructions that skip the next word when their condition holds.
    pub fn is_skip(self) -> bool {
        matches!(
            self,
            Mnemonic::Skeq | Mnemonic::Skne | Mnemonic::Skpr | Mnemonic::Skup
        )
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label name derived from a jump/call target, e.g. `label-0x0206`.
pub fn label_for(address: u16) -> String {
    format!("label-0x{:04X}", address)
}

/// One decoded instruction word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub raw: u16,
    pub mnemonic: Mnemonic,
    pub shape: Shape,
    pub fields: Fields,
    pub operands: Vec<TokenKind>,
    /// Set for branch-class instructions: the label naming the target.
    pub label: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Opcode has no valid instruction: {raw:#06x}")]
    UnknownOpcode { raw: u16 },
}

pub trait Decoder {
    fn decode(&self, raw: u16) -> Result<Decoded, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_names_every_field() {
        let f = Fields::decompose(0xF133);
        assert_eq!(f.msb, 0xF);
        assert_eq!(f.x, 0x1);
        assert_eq!(f.y, 0x3);
        assert_eq!(f.lsb, 0x3);
        assert_eq!(f.kk, 0x33);
        assert_eq!(f.nnn, 0x133);
    }

    #[test]
    fn compose_ignores_unselected_fields() {
        let f = Fields::decompose(0xD123);
        assert_eq!(f.compose(FieldMask::MSB | FieldMask::NNN), 0xD123);
        assert_eq!(f.compose(FieldMask::MSB | FieldMask::X), 0xD100);
        assert_eq!(f.compose(FieldMask::empty()), 0);
    }

    #[test]
    fn mnemonic_names_round_trip() {
        for m in Mnemonic::ALL {
            assert_eq!(m.as_str().parse::<Mnemonic>(), Ok(*m));
        }
        assert!("PINECONE".parse::<Mnemonic>().is_err());
        assert!("mov".parse::<Mnemonic>().is_err());
    }

    #[test]
    fn label_names_pad_to_four_digits() {
        assert_eq!(label_for(0x206), "label-0x0206");
        assert_eq!(label_for(0xABC), "label-0x0ABC");
    }
}
