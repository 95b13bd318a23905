use crate::decoder::{label_for, DecodeError, Decoded, Decoder, Fields, Mnemonic};
use crate::instructions::{lookup, InstrDesc, Shape, TABLE};
use crate::token::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Unknown words are an error.
    #[default]
    Strict,
    /// Unknown words decode to `NOOP <word>`.
    Lenient,
}

/// CHIP-8 decoder over the canonical opcode table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chip8Decoder {
    mode: DecodeMode,
}

impl Chip8Decoder {
    pub fn new(mode: DecodeMode) -> Self {
        Self { mode }
    }

    pub fn strict() -> Self {
        Self::new(DecodeMode::Strict)
    }

    pub fn lenient() -> Self {
        Self::new(DecodeMode::Lenient)
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    pub fn classify(&self, raw: u16) -> Result<Mnemonic, DecodeError> {
        match (classify(&Fields::decompose(raw)), self.mode) {
            (Some(m), _) => Ok(m),
            (None, DecodeMode::Lenient) => Ok(Mnemonic::Noop),
            (None, DecodeMode::Strict) => Err(DecodeError::UnknownOpcode { raw }),
        }
    }
}

impl Decoder for Chip8Decoder {
    fn decode(&self, raw: u16) -> Result<Decoded, DecodeError> {
        let fields = Fields::decompose(raw);
        let mnemonic = self.classify(raw)?;
        let desc = describe(mnemonic, &fields).ok_or(DecodeError::UnknownOpcode { raw })?;
        let (operands, label) = operands_of(desc, raw);
        Ok(Decoded {
            raw,
            mnemonic,
            shape: desc.shape,
            fields,
            operands,
            label,
        })
    }
}

/// Nested dispatch on the high nibble, then the low nibble or low byte.
pub fn classify(f: &Fields) -> Option<Mnemonic> {
    use Mnemonic::*;
    let m = match f.msb {
        0x0 => match f.kk {
            0xE0 => Cls,
            0xEE => Ret,
            _ => return None,
        },
        0x1 => Jmp,
        0x2 => Jsr,
        0x3 | 0x5 => Skeq,
        0x4 | 0x9 => Skne,
        0x6 => Mov,
        0x7 => Add,
        0x8 => match f.lsb {
            0x0 => Mov,
            0x1 => Or,
            0x2 => And,
            0x3 => Xor,
            0x4 => Add,
            0x5 => Sub,
            0x6 => Shr,
            0x7 => Rsb,
            0xE => Shl,
            _ => return None,
        },
        0xA => Mvi,
        0xB => Jmi,
        0xC => Rand,
        0xD => Draw,
        0xE => match f.kk {
            0x9E => Skpr,
            0xA1 => Skup,
            _ => return None,
        },
        0xF => match f.kk {
            0x07 => Gdel,
            0x0A => Key,
            0x15 => Sdel,
            0x18 => Ssnd,
            0x1E => Adi,
            0x29 => Font,
            0x33 => Bcd,
            0x55 => Str,
            0x65 => Ldr,
            _ => return None,
        },
        _ => return None,
    };
    Some(m)
}

/// Table entry for a classified word. Overloaded mnemonics (`MOV`, `ADD`,
/// `SKEQ`, `SKNE`) are told apart by the high nibble.
pub fn describe(mnemonic: Mnemonic, f: &Fields) -> Option<&'static InstrDesc> {
    if mnemonic == Mnemonic::Noop {
        return lookup(Mnemonic::Noop, Shape::Opaque);
    }
    TABLE
        .iter()
        .find(|d| d.mnemonic == mnemonic && (d.template >> 12) as u8 == f.msb)
}

/// Operand list for a decoded word, plus the synthesized label for jump and
/// call targets.
pub fn operands_of(desc: &InstrDesc, raw: u16) -> (Vec<TokenKind>, Option<String>) {
    let fields = Fields::decompose(raw);
    let operands = desc
        .shape
        .slots()
        .iter()
        .map(|slot| {
            let v = slot.read(raw, &fields) as u32;
            if slot.is_register() {
                TokenKind::Register(v)
            } else {
                TokenKind::Integer(v)
            }
        })
        .collect();
    let label = desc.mnemonic.is_branch().then(|| label_for(fields.nnn));
    (operands, label)
}

/// Packs operand values into a word. `None` when the mnemonic has no such
/// shape or the operand count is wrong; values wider than their slot are
/// masked to the slot width.
pub fn compose(mnemonic: Mnemonic, shape: Shape, values: &[u16]) -> Option<u16> {
    let desc = lookup(mnemonic, shape)?;
    let slots = shape.slots();
    if slots.len() != values.len() {
        return None;
    }
    let mut fields = desc.fixed_fields();
    for (slot, v) in slots.iter().zip(values) {
        slot.write(&mut fields, (*v as u32 & slot.max()) as u16);
    }
    Some(fields.compose(shape.mask()))
}

/// Encodes a decoded instruction again from its mnemonic and operands.
pub fn reencode(d: &Decoded) -> Option<u16> {
    let values: Vec<u16> = d
        .operands
        .iter()
        .map(|op| match op {
            TokenKind::Integer(v) | TokenKind::Register(v) => Some(*v as u16),
            _ => None,
        })
        .collect::<Option<_>>()?;
    compose(d.mnemonic, d.shape, &values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_rejects_unknown_words() {
        let dec = Chip8Decoder::strict();
        assert_eq!(
            dec.decode(0x0000).unwrap_err(),
            DecodeError::UnknownOpcode { raw: 0x0000 }
        );
        assert!(dec.decode(0x8008).is_err());
        assert!(dec.decode(0xE000).is_err());
        assert!(dec.decode(0xF0FF).is_err());
    }

    #[test]
    fn lenient_wraps_unknown_words() {
        let d = Chip8Decoder::lenient().decode(0x0123).unwrap();
        assert_eq!(d.mnemonic, Mnemonic::Noop);
        assert_eq!(d.shape, Shape::Opaque);
        assert_eq!(d.operands, vec![TokenKind::Integer(0x0123)]);
        assert_eq!(reencode(&d), Some(0x0123));
    }

    #[test]
    fn overloaded_mnemonics_pick_shape_by_high_nibble() {
        let dec = Chip8Decoder::strict();
        assert_eq!(dec.decode(0x6208).unwrap().shape, Shape::RegisterByte);
        assert_eq!(dec.decode(0x8180).unwrap().shape, Shape::RegisterRegister);
        assert_eq!(dec.decode(0x3123).unwrap().shape, Shape::RegisterByte);
        assert_eq!(dec.decode(0x5450).unwrap().shape, Shape::RegisterRegister);
        assert_eq!(dec.decode(0x9010).unwrap().mnemonic, Mnemonic::Skne);
    }

    #[test]
    fn only_jumps_and_calls_get_labels() {
        let dec = Chip8Decoder::strict();
        assert_eq!(dec.decode(0x1234).unwrap().label.as_deref(), Some("label-0x0234"));
        assert_eq!(dec.decode(0x2345).unwrap().label.as_deref(), Some("label-0x0345"));
        assert_eq!(dec.decode(0xA234).unwrap().label, None);
        assert_eq!(dec.decode(0xB234).unwrap().label, None);
    }

    #[test]
    fn compose_rejects_wrong_shape_or_arity() {
        assert_eq!(compose(Mnemonic::Or, Shape::RegisterByte, &[1, 2]), None);
        assert_eq!(compose(Mnemonic::Mov, Shape::RegisterByte, &[1]), None);
        assert_eq!(compose(Mnemonic::Mov, Shape::RegisterByte, &[2, 8]), Some(0x6208));
        assert_eq!(compose(Mnemonic::Skpr, Shape::Register, &[4]), Some(0xE49E));
    }
}
