use anyhow::Result;
use std::path::Path;

use chip8_asm::{MEMORY_SIZE, PROGRAM_OFFSET};

/// Reads a ROM file, dropping `skip` leading bytes and keeping at most `len`
/// of the rest.
pub fn load_rom(path: &Path, skip: usize, len: Option<usize>) -> Result<Vec<u8>> {
    let file = std::fs::read(path)?;
    anyhow::ensure!(skip <= file.len(), "--skip exceeds file size");
    let mut payload = &file[skip..];
    if let Some(lim) = len {
        anyhow::ensure!(lim <= payload.len(), "--len exceeds remaining file size after skip");
        payload = &payload[..lim];
    }
    if payload.len() > (MEMORY_SIZE - PROGRAM_OFFSET) as usize {
        tracing::warn!(size = payload.len(), "ROM is larger than program memory");
    }
    Ok(payload.to_vec())
}

/// Hex (`0x` prefix or `h` suffix) or decimal.
pub fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else if let Some(hex) = s.strip_suffix('h') {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}
