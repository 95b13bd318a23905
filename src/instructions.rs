use serde::{Deserialize, Serialize};

use crate::decoder::{FieldMask, Fields, Mnemonic};

/// Operand shape of an instruction: how many operands it takes and which
/// word fields they fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    NoOperand,
    Address,
    RegisterByte,
    RegisterRegister,
    RegisterRegisterNibble,
    Register,
    /// Raw word, only produced by lenient decoding.
    Opaque,
}

/// Where one operand lands in the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    RegX,
    RegY,
    Byte,
    Addr,
    Nibble,
    Word,
}

impl Slot {
    pub fn is_register(self) -> bool {
        matches!(self, Slot::RegX | Slot::RegY)
    }

    /// Largest value the slot can hold.
    pub fn max(self) -> u32 {
        match self {
            Slot::RegX | Slot::RegY | Slot::Nibble => 0xF,
            Slot::Byte => 0xFF,
            Slot::Addr => 0xFFF,
            Slot::Word => 0xFFFF,
        }
    }

    pub fn read(self, word: u16, fields: &Fields) -> u16 {
        match self {
            Slot::RegX => fields.x as u16,
            Slot::RegY => fields.y as u16,
            Slot::Byte => fields.kk as u16,
            Slot::Addr => fields.nnn,
            Slot::Nibble => fields.lsb as u16,
            Slot::Word => word,
        }
    }

    /// Stores an already range-checked value.
    pub fn write(self, fields: &mut Fields, value: u16) {
        match self {
            Slot::RegX => fields.x = value as u8,
            Slot::RegY => fields.y = value as u8,
            Slot::Byte => fields.kk = value as u8,
            Slot::Addr => fields.nnn = value,
            Slot::Nibble => fields.lsb = value as u8,
            Slot::Word => {
                fields.msb = ((value & 0xF000) >> 12) as u8;
                fields.nnn = value & 0x0FFF;
            }
        }
    }
}

impl Shape {
    pub fn slots(self) -> &'static [Slot] {
        match self {
            Shape::NoOperand => &[],
            Shape::Address => &[Slot::Addr],
            Shape::RegisterByte => &[Slot::RegX, Slot::Byte],
            Shape::RegisterRegister => &[Slot::RegX, Slot::RegY],
            Shape::RegisterRegisterNibble => &[Slot::RegX, Slot::RegY, Slot::Nibble],
            Shape::Register => &[Slot::RegX],
            Shape::Opaque => &[Slot::Word],
        }
    }

    pub fn arity(self) -> usize {
        self.slots().len()
    }

    /// Fields packed into the final word.
    pub fn mask(self) -> FieldMask {
        match self {
            Shape::NoOperand | Shape::RegisterByte => FieldMask::MSB | FieldMask::X | FieldMask::KK,
            Shape::Address | Shape::Opaque => FieldMask::MSB | FieldMask::NNN,
            Shape::RegisterRegister | Shape::RegisterRegisterNibble | Shape::Register => {
                FieldMask::MSB | FieldMask::X | FieldMask::Y | FieldMask::LSB
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub mnemonic: Mnemonic,
    pub shape: Shape,
    /// Fixed bits of the word; operand slots are zero.
    pub template: u16,
}

impl InstrDesc {
    pub fn fixed_fields(&self) -> Fields {
        Fields::decompose(self.template)
    }
}

const fn desc(mnemonic: Mnemonic, shape: Shape, template: u16) -> InstrDesc {
    InstrDesc { mnemonic, shape, template }
}

pub const TABLE: &[InstrDesc] = &[
    desc(Mnemonic::Cls, Shape::NoOperand, 0x00E0),
    desc(Mnemonic::Ret, Shape::NoOperand, 0x00EE),
    desc(Mnemonic::Jmp, Shape::Address, 0x1000),
    desc(Mnemonic::Jsr, Shape::Address, 0x2000),
    desc(Mnemonic::Skeq, Shape::RegisterByte, 0x3000),
    desc(Mnemonic::Skne, Shape::RegisterByte, 0x4000),
    desc(Mnemonic::Skeq, Shape::RegisterRegister, 0x5000),
    desc(Mnemonic::Mov, Shape::RegisterByte, 0x6000),
    desc(Mnemonic::Add, Shape::RegisterByte, 0x7000),
    desc(Mnemonic::Mov, Shape::RegisterRegister, 0x8000),
    desc(Mnemonic::Or, Shape::RegisterRegister, 0x8001),
    desc(Mnemonic::And, Shape::RegisterRegister, 0x8002),
    desc(Mnemonic::Xor, Shape::RegisterRegister, 0x8003),
    desc(Mnemonic::Add, Shape::RegisterRegister, 0x8004),
    desc(Mnemonic::Sub, Shape::RegisterRegister, 0x8005),
    desc(Mnemonic::Shr, Shape::Register, 0x8006),
    desc(Mnemonic::Rsb, Shape::RegisterRegister, 0x8007),
    desc(Mnemonic::Shl, Shape::Register, 0x800E),
    desc(Mnemonic::Skne, Shape::RegisterRegister, 0x9000),
    desc(Mnemonic::Mvi, Shape::Address, 0xA000),
    desc(Mnemonic::Jmi, Shape::Address, 0xB000),
    desc(Mnemonic::Rand, Shape::RegisterByte, 0xC000),
    desc(Mnemonic::Draw, Shape::RegisterRegisterNibble, 0xD000),
    desc(Mnemonic::Skpr, Shape::Register, 0xE09E),
    desc(Mnemonic::Skup, Shape::Register, 0xE0A1),
    desc(Mnemonic::Gdel, Shape::Register, 0xF007),
    desc(Mnemonic::Key, Shape::Register, 0xF00A),
    desc(Mnemonic::Sdel, Shape::Register, 0xF015),
    desc(Mnemonic::Ssnd, Shape::Register, 0xF018),
    desc(Mnemonic::Adi, Shape::Register, 0xF01E),
    desc(Mnemonic::Font, Shape::Register, 0xF029),
    desc(Mnemonic::Bcd, Shape::Register, 0xF033),
    desc(Mnemonic::Str, Shape::Register, 0xF055),
    desc(Mnemonic::Ldr, Shape::Register, 0xF065),
    desc(Mnemonic::Noop, Shape::Opaque, 0x0000),
];

pub fn lookup(mnemonic: Mnemonic, shape: Shape) -> Option<&'static InstrDesc> {
    TABLE.iter().find(|d| d.mnemonic == mnemonic && d.shape == shape)
}

/// All shapes a mnemonic can be written in, in table order.
pub fn shapes_of(mnemonic: Mnemonic) -> impl Iterator<Item = Shape> {
    TABLE
        .iter()
        .filter(move |d| d.mnemonic == mnemonic)
        .map(|d| d.shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_leave_operand_slots_clear() {
        for d in TABLE {
            let fixed = d.fixed_fields();
            for slot in d.shape.slots() {
                if *slot != Slot::Word {
                    assert_eq!(slot.read(d.template, &fixed), 0, "{:?}", d.mnemonic);
                }
            }
            assert_eq!(fixed.compose(d.shape.mask()), d.template, "{:?}", d.mnemonic);
        }
    }

    #[test]
    fn every_machine_mnemonic_has_a_shape() {
        for m in Mnemonic::ALL {
            let n = shapes_of(*m).count();
            if *m == Mnemonic::Data {
                assert_eq!(n, 0);
            } else {
                assert!(n >= 1, "{m} missing from table");
            }
        }
        assert_eq!(shapes_of(Mnemonic::Mov).count(), 2);
        assert_eq!(shapes_of(Mnemonic::Or).count(), 1);
    }
}
