//! Iterate rows with their decoded types instead of converting to CSV.
//!
//! Usage: cargo run --example stream_rows -- data.xlsx

use sheetstream::{CellValue, XlsxReader};

fn main() -> sheetstream::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data.xlsx".to_string());

    let reader = XlsxReader::open(&path, None)?;

    let mut numeric_cells = 0usize;
    for (i, row) in reader.stream_rows()?.enumerate() {
        let row = row?;
        numeric_cells += row
            .iter()
            .filter(|c| matches!(c, CellValue::Int(_) | CellValue::Float(_)))
            .count();
        if i < 5 {
            println!("row {}: {:?}", i + 1, row);
        }
    }
    println!("numeric cells: {numeric_cells}");
    Ok(())
}
