use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use tealc::{CompileOptions, ast::Node, compile};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut options = CompileOptions::default();
    let mut input_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--max-scratch" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing value after {arg}"))?;
                options.max_scratch = value
                    .parse()
                    .with_context(|| format!("Invalid scratch index '{value}'"))?;
            }
            _ => {
                input_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one input file is supported");
                }
                break;
            }
        }
    }

    let source = if let Some(path) = input_path {
        fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let mut program: Node = serde_json::from_str(&source).context("Parsing AST input")?;
    let output = compile(&mut program, &options)?;
    println!("{output}");
    Ok(())
}
