//! Inspect BR Codes from the command line.
//!
//! Decodes a BR Code payload and prints either the raw tag mapping or the
//! validated, classified code as JSON.

use std::io::Read;
use std::process::ExitCode;

use clap::Parser;
use pix_brcode::{decode, decode_to, BrCode, DecodeOptions};

/// Decode a BR Code and print it as JSON
#[derive(Parser)]
#[command(name = "brcode-inspect")]
#[command(about = "Decode a BR Code (PIX QR payload) and print it as JSON")]
struct Cli {
    /// The BR Code contents; read from stdin when omitted
    brcode: Option<String>,

    /// Skip unknown tags instead of failing on them
    #[arg(short, long)]
    strict: bool,

    /// Print the raw tag mapping without schema validation
    #[arg(short, long)]
    raw: bool,

    /// Pretty-print the JSON output
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let contents = match cli.brcode {
        Some(contents) => contents,
        None => {
            let mut buffer = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buffer) {
                eprintln!("error: cannot read stdin: {e}");
                return ExitCode::FAILURE;
            }
            buffer
        }
    };
    let contents = contents.trim();

    let options = DecodeOptions::new().with_strict_validation(cli.strict);

    let value = if cli.raw {
        match decode(contents, options) {
            Ok(fields) => serde_json::Value::Object(fields),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        match decode_to::<BrCode>(contents, options) {
            Ok(brcode) => match serde_json::to_value(&brcode) {
                Ok(value) => value,
                Err(e) => {
                    eprintln!("error: {e}");
                    return ExitCode::FAILURE;
                }
            },
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    match rendered {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
