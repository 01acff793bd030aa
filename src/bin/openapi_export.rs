use clap::Parser;
use std::{fs, path::PathBuf};
use tesorito_pos::openapi::ApiDocV1;
use utoipa::OpenApi;

/// Writes the OpenAPI document for client generation
#[derive(Debug, Parser)]
#[command(name = "openapi-export", version)]
struct Args {
    /// Destination file
    #[arg(short, long, default_value = "openapi/tesorito-pos.v1.json")]
    output: PathBuf,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let openapi = ApiDocV1::openapi();
    let json = if args.compact {
        serde_json::to_string(&openapi)?
    } else {
        serde_json::to_string_pretty(&openapi)?
    };

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(&args.output, json)?;

    println!("OpenAPI document written to {}", args.output.display());
    Ok(())
}
