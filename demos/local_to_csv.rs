//! Convert a local XLSX file to CSV on stdout.
//!
//! Usage: cargo run --example local_to_csv -- data.xlsx [sheet-name]

use std::io::{self, Write};

use sheetstream::XlsxReader;

fn main() -> sheetstream::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "data.xlsx".to_string());
    let sheet = args.next();

    let reader = XlsxReader::open(&path, sheet.as_deref())?;
    let info = reader.metadata();
    eprintln!("source: {} ({} bytes)", info.origin, info.size.unwrap_or(0));

    let stdout = io::stdout();
    let mut lock = stdout.lock();
    let rows = reader.to_csv(&mut lock)?;
    lock.flush()?;

    eprintln!("wrote {rows} rows");
    Ok(())
}
