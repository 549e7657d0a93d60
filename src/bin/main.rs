//! Command-line front end: stream XLSX files to CSV from any source.

use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use sheetstream::XlsxReader;

/// Stream XLSX files to CSV format from any source.
///
/// Sources: local paths (/path/to/file.xlsx), S3 URIs (s3://bucket/key),
/// and HTTP(S) URLs.
#[derive(Parser)]
#[command(name = "sheetstream", version)]
struct Cli {
    /// Data source: s3://bucket/key, https://url, or /path/to/file.xlsx
    source: String,

    /// Sheet name to read (default: first sheet)
    #[arg(long)]
    sheet_name: Option<String>,

    /// Output CSV file path (default: stdout)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if cli.verbose {
                let mut cause = e.source();
                while let Some(inner) = cause {
                    eprintln!("  caused by: {inner}");
                    cause = inner.source();
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let reader = XlsxReader::open(&cli.source, cli.sheet_name.as_deref())?;

    match &cli.output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            reader.to_csv(&mut out)?;
            out.flush()?;
            eprintln!("CSV written to: {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            reader.to_csv(&mut lock)?;
        }
    }

    Ok(())
}
