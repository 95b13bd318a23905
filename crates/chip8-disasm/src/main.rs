use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use std::path::{Path, PathBuf};

use chip8_asm::decoder::Decoder;
use chip8_asm::disasm::{fmt_decoded, raw_dump, scan, Listing};
use chip8_asm::isa::chip8::Chip8Decoder;
use chip8_asm::{DisasmConfig, Disassembler, STACK_DEPTH};

use chip8_disasm::{load_rom, parse_u32, Report};

#[derive(Parser, Debug)]
#[command(author, version, about = "CHIP-8 disassembler CLI", long_about = None)]
struct Cli {
    /// Skip N bytes at start of file before loading
    #[arg(long, global = true, default_value_t = 0usize)]
    skip: usize,
    /// Limit bytes loaded (default: to EOF after --skip)
    #[arg(long, global = true)]
    len: Option<usize>,
    /// Subcommand
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Disassemble a ROM by following control flow from the load address
    Disasm {
        #[arg(value_name = "ROMFILE")]
        input: PathBuf,
        /// Leave out the address/opcode annotation
        #[arg(long)]
        no_comments: bool,
        /// Pending-branch limit before giving up
        #[arg(long, default_value_t = STACK_DEPTH * 3)]
        max_branches: usize,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Decode every word of a byte range [start, stop) without control flow
    Scan {
        #[arg(value_name = "ROMFILE")]
        input: PathBuf,
        /// First byte offset (hex or dec)
        start: Option<String>,
        /// End byte offset, exclusive (hex or dec)
        stop: Option<String>,
    },
    /// Hex dump of the loaded bytes
    Dump {
        #[arg(value_name = "ROMFILE")]
        input: PathBuf,
    },
    /// Decode a single opcode word (hex or dec)
    Opcode { word: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn emit(text: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Disasm { input, no_comments, max_branches, format, out } => {
            let bytes = load_rom(&input, cli.skip, cli.len)?;
            let cfg = DisasmConfig { comments: !no_comments, max_branches };
            let dis = Disassembler::new(cfg).run(&bytes)?;
            let text = match format {
                OutputFormat::Text => Listing::new(&dis, &cfg).to_string(),
                OutputFormat::Json => serde_json::to_string_pretty(&Report::new(&dis))?,
            };
            emit(&text, out.as_deref())?;
        }
        Command::Scan { input, start, stop } => {
            let bytes = load_rom(&input, cli.skip, cli.len)?;
            let start = start.as_deref().map(parse_u32).transpose()?.unwrap_or(0) as usize;
            let stop = stop.as_deref().map(parse_u32).transpose()?.map(|s| s as usize);
            if let Some(stop) = stop {
                anyhow::ensure!(stop >= start, "stop must be >= start");
            }
            for line in scan(&bytes, start, stop) {
                println!("{line}");
            }
        }
        Command::Dump { input } => {
            let bytes = load_rom(&input, cli.skip, cli.len)?;
            println!("{}", raw_dump(&bytes));
        }
        Command::Opcode { word } => {
            let word = parse_u32(&word)?;
            anyhow::ensure!(word <= 0xFFFF, "opcode {word:#x} is wider than 16 bits");
            let d = Chip8Decoder::strict().decode(word as u16)?;
            println!("{}", fmt_decoded(&d));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_disasm_flags() {
        let cli = Cli::parse_from([
            "chip8-disasm", "disasm", "rom.ch8", "--no-comments", "--format", "json", "--skip", "2",
        ]);
        assert_eq!(cli.skip, 2);
        match cli.cmd {
            Command::Disasm { no_comments, max_branches, format, .. } => {
                assert!(no_comments);
                assert_eq!(max_branches, 48);
                assert!(matches!(format, OutputFormat::Json));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn opcode_word_decodes_strictly() {
        let d = Chip8Decoder::strict().decode(parse_u32("0x8180").unwrap() as u16).unwrap();
        assert_eq!(fmt_decoded(&d), "MOV $1, $8");
        assert!(Chip8Decoder::strict().decode(0x0123).is_err());
    }
}
