use chip8_asm::decoder::{DecodeError, Decoder, Fields, FieldMask, Mnemonic};
use chip8_asm::instructions::{Shape, TABLE};
use chip8_asm::isa::chip8::{compose, reencode, Chip8Decoder};
use chip8_asm::token::TokenKind;
use pretty_assertions::assert_eq;

#[test]
fn fields_are_a_bijection_over_msb_and_nnn() {
    for word in 0..=u16::MAX {
        let f = Fields::decompose(word);
        assert_eq!(f.compose(FieldMask::MSB | FieldMask::NNN), word);
        assert_eq!(f.compose(FieldMask::MSB | FieldMask::X | FieldMask::KK), word);
        assert_eq!(
            f.compose(FieldMask::MSB | FieldMask::X | FieldMask::Y | FieldMask::LSB),
            word
        );
    }
}

#[test]
fn canonical_table_decodes_to_itself() {
    let dec = Chip8Decoder::strict();
    for desc in TABLE.iter().filter(|d| d.mnemonic != Mnemonic::Noop) {
        let d = dec.decode(desc.template).unwrap();
        assert_eq!((d.mnemonic, d.shape), (desc.mnemonic, desc.shape), "{:#06X}", desc.template);
        assert_eq!(reencode(&d), Some(desc.template));
    }
}

#[test]
fn operand_values_land_in_their_fields() {
    assert_eq!(compose(Mnemonic::Jsr, Shape::Address, &[0x208]), Some(0x2208));
    assert_eq!(compose(Mnemonic::Skeq, Shape::RegisterRegister, &[0xA, 0xB]), Some(0x5AB0));
    assert_eq!(compose(Mnemonic::Rand, Shape::RegisterByte, &[0x3, 0x7F]), Some(0xC37F));
    assert_eq!(compose(Mnemonic::Shl, Shape::Register, &[0x5]), Some(0x850E));
    assert_eq!(compose(Mnemonic::Bcd, Shape::Register, &[0xE]), Some(0xFE33));
    assert_eq!(compose(Mnemonic::Jmi, Shape::Address, &[0x300]), Some(0xB300));
}

#[test]
fn strict_and_lenient_disagree_only_on_unknown_words() {
    let strict = Chip8Decoder::strict();
    let lenient = Chip8Decoder::lenient();
    let mut unknown = 0;
    for word in 0..=u16::MAX {
        let l = lenient.decode(word).unwrap();
        match strict.decode(word) {
            Ok(s) => assert_eq!(s, l),
            Err(DecodeError::UnknownOpcode { raw }) => {
                assert_eq!(raw, word);
                assert_eq!(l.mnemonic, Mnemonic::Noop);
                assert_eq!(l.operands, vec![TokenKind::Integer(word as u32)]);
                unknown += 1;
            }
        }
    }
    assert!(unknown > 0);
}

#[test]
fn every_word_survives_text_and_back() {
    let dec = Chip8Decoder::lenient();
    for word in 0..=u16::MAX {
        let text = chip8_asm::fmt_decoded(&dec.decode(word).unwrap());
        let bytes = chip8_asm::assemble(&text).unwrap_or_else(|e| panic!("{text}: {e}"));
        assert_eq!(bytes, word.to_be_bytes().to_vec(), "{text}");
    }
}
