//! Stream an XLSX object from S3 straight to a local CSV file.
//!
//! Usage: cargo run --example s3_to_csv --features s3 -- s3://bucket/key.xlsx out.csv
//!
//! Credentials come from the standard AWS provider chain (environment,
//! profile, instance role).

use std::fs::File;
use std::io::BufWriter;

use sheetstream::XlsxReader;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let uri = args.next().ok_or("usage: s3_to_csv <s3://bucket/key> <out.csv>")?;
    let out_path = args.next().unwrap_or_else(|| "out.csv".to_string());

    let reader = XlsxReader::open(&uri, None)?;
    let mut out = BufWriter::new(File::create(&out_path)?);
    let rows = reader.to_csv(&mut out)?;

    eprintln!("{uri} -> {out_path} ({rows} rows)");
    Ok(())
}
