use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use inkdecomp::from_json::strip_bom;
use inkdecomp::{dump_tokens, DecompileError, Driver};

#[derive(Parser)]
#[command(name = "inkdecomp")]
#[command(about = "Turn compiled ink story JSON back into ink script", long_about = None)]
struct Cli {
    /// Compiled story (.ink.json). Reads stdin when absent or `-`.
    input: Option<PathBuf>,

    /// Write the script here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the token stream instead of decompiling
    #[arg(long)]
    tokens: bool,
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        _ => {
            let mut input = Vec::new();
            io::stdin()
                .read_to_end(&mut input)
                .context("failed to read stdin")?;
            Ok(input)
        }
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
        }
        None => io::stdout()
            .write_all(text.as_bytes())
            .context("failed to write stdout"),
    }
}

/// Show the offending line with a caret under the error column.
fn report(input: &[u8], err: &DecompileError) {
    eprintln!("error: {}", err);
    let Some(position) = err.position() else {
        return;
    };
    let text = String::from_utf8_lossy(strip_bom(input));
    let line_text = text.lines().nth(position.line).unwrap_or("");
    eprintln!("{}", line_text);
    eprintln!("{}^", " ".repeat(position.column));
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let input = read_input(cli.input.as_deref())?;

    if cli.tokens {
        let mut listing = String::new();
        let ok = dump_tokens(&input, &mut listing);
        write_output(cli.output.as_deref(), &listing)?;
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    match Driver::new().decompile(&input) {
        Ok(script) => write_output(cli.output.as_deref(), &script),
        Err(err) => {
            report(&input, &err);
            std::process::exit(1);
        }
    }
}
