use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chip8_asm::assembler::assemble;
use chip8_asm::disasm::raw_dump;
use chip8_asm::lexer::tokenize;

#[derive(Parser, Debug)]
#[command(author, version, about = "CHIP-8 assembler")]
struct Opts {
    /// Input assembly file
    #[arg(short, long)]
    input: PathBuf,
    /// Output ROM file (big-endian words, loaded at 0x200)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print the address of every label
    #[arg(long)]
    symbols: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let text = fs::read_to_string(&opts.input)
        .with_context(|| format!("reading {}", opts.input.display()))?;
    let tokens = tokenize(&text)?;
    let program = assemble(&tokens)?;

    println!("{}", raw_dump(&program.bytes));
    if opts.symbols {
        for (name, addr) in &program.symbols {
            println!("{addr:#05X} {name}");
        }
    }
    if let Some(path) = &opts.output {
        fs::write(path, &program.bytes).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
