use chip8_asm::analyze::{DisasmConfig, DisasmError, Disassembler};
use chip8_asm::disasm::Listing;
use chip8_asm::disassemble;
use pretty_assertions::assert_eq;

fn words(ws: &[u16]) -> Vec<u8> {
    ws.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn plain() -> DisasmConfig {
    DisasmConfig {
        comments: false,
        ..Default::default()
    }
}

fn listing(ws: &[u16]) -> Vec<String> {
    disassemble(&words(ws), &plain())
        .unwrap()
        .into_iter()
        .map(|l| l.trim_end().to_string())
        .collect()
}

#[test]
fn register_move() {
    assert_eq!(listing(&[0x8180]), vec!["MOV   $1, $8"]);
}

#[test]
fn straight_line_code() {
    assert_eq!(
        listing(&[0x8180, 0x8280, 0x8004, 0x00E0]),
        vec!["MOV   $1, $8", "MOV   $2, $8", "ADD   $0, $0", "CLS"]
    );
}

#[test]
fn jump_over_filler_words() {
    let lines = listing(&[0x1206, 0x0000, 0x0000, 0x8180, 0x00E0]);
    let code: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|l| !l.starts_with("DATA"))
        .collect();
    assert_eq!(code, vec!["JMP   :label-0x0206", ":label-0x0206", "MOV   $1, $8", "CLS"]);
    assert_eq!(lines.iter().filter(|l| l.starts_with("DATA")).count(), 4);
}

#[test]
fn filler_bytes_render_in_address_order() {
    assert_eq!(
        listing(&[0x1206, 0x4567, 0xABCD, 0x8180, 0x00E0]),
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
fn subroutine_body_follows_call_site() {
    assert_eq!(
        listing(&[0x2206, 0xD123, 0x8084, 0x8180, 0x00EE]),
        vec![
            "JSR   :label-0x0206",
            "DRAW  $1, $2, 3h",
            "ADD   $0, $8",
            ":label-0x0206",
            "MOV   $1, $8",
            "RET",
        ]
    );
}

#[test]
fn skips_explore_both_successors() {
    assert_eq!(
        listing(&[0x3000, 0x4000, 0xE09E, 0xE0A1]),
        vec!["SKEQ  $0, 0h", "SKNE  $0, 0h", "SKPR  $0", "SKUP  $0"]
    );
}

#[test]
fn comments_annotate_address_and_word() {
    let lines = disassemble(&words(&[0x6208]), &DisasmConfig::default()).unwrap();
    assert_eq!(
        lines,
        vec![format!("MOV   {:<20}; addr : 200; opcode : 0x6208", "$2, 8h")]
    );
}

#[test]
fn walking_past_memory_is_an_error() {
    let mut bytes = vec![0u8; 0xE02];
    bytes[0] = 0x1F;
    bytes[1] = 0xFF;
    let err = Disassembler::default().run(&bytes).unwrap_err();
    assert_eq!(
        err,
        DisasmError::AddressOutOfRange {
            address: 0xFFF,
            opcode: 0x0000,
            target: 0x1001,
        }
    );
}

#[test]
fn jump_target_outside_the_image_is_not_explored() {
    let lines = listing(&[0x1FFF]);
    assert_eq!(lines, vec!["JMP   FFFh"]);
}

#[test]
fn runaway_branching_is_an_error() {
    let err = Disassembler::default().run(&words(&[0x3000; 120])).unwrap_err();
    assert!(matches!(
        err,
        DisasmError::RunawayBranching { pending: 49, limit: 48, .. }
    ));
}

#[test]
fn listing_display_joins_lines() {
    let dis = Disassembler::new(plain()).run(&words(&[0x00E0, 0x00EE])).unwrap();
    let text = Listing::new(&dis, &plain()).to_string();
    assert_eq!(text.lines().count(), 2);
    assert!(text.starts_with("CLS"));
}
