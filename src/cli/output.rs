//! Result rendering for the command-line interface.

use crate::models::{DataTable, Value};
use std::io::{self, Write};
use std::str::FromStr;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table (default).
    #[default]
    Table,
    /// JSON: an array of objects keyed by column name.
    Json,
    /// CSV with a header row.
    Csv,
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "csv" => Self::Csv,
            _ => Self::Table,
        })
    }
}

/// Writes `table` in `format`.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_data_table<W: Write>(
    writer: &mut W,
    table: &DataTable,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Table => {
            write_table(writer, table)?;
            Ok(())
        },
        OutputFormat::Json => write_json(writer, table),
        OutputFormat::Csv => write_csv(writer, table),
    }
}

/// Writes a single value in `format`.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_value<W: Write>(
    writer: &mut W,
    value: &Value,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => writeln!(writer, "{}", serde_json::to_string(value)?)?,
        OutputFormat::Table | OutputFormat::Csv => writeln!(writer, "{value}")?,
    }
    Ok(())
}

/// Writes `table` as aligned columns.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_table<W: Write>(writer: &mut W, table: &DataTable) -> io::Result<()> {
    let header = table.column_names();
    let cells: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.values().iter().map(ToString::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_line(writer, header.iter().copied(), &widths)?;
    write_line(writer, widths.iter().map(|w| "-".repeat(*w)), &widths)?;
    for row in &cells {
        write_line(writer, row.iter().map(String::as_str), &widths)?;
    }
    writeln!(writer, "({} rows)", table.row_count())
}

fn write_line<W: Write, S: AsRef<str>>(
    writer: &mut W,
    cells: impl Iterator<Item = S>,
    widths: &[usize],
) -> io::Result<()> {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell.as_ref()))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(writer, "{}", line.trim_end())
}

/// Writes `table` as a JSON array of row objects.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(
    writer: &mut W,
    table: &DataTable,
) -> Result<(), Box<dyn std::error::Error>> {
    let names = table.column_names();
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = table
        .rows()
        .iter()
        .map(|row| {
            names
                .iter()
                .zip(row.values())
                .map(|(name, value)| {
                    serde_json::to_value(value).map(|json| ((*name).to_string(), json))
                })
                .collect::<Result<_, serde_json::Error>>()
        })
        .collect::<Result<_, _>>()?;
    let json = serde_json::to_string_pretty(&rows)?;
    writeln!(writer, "{json}")?;
    Ok(())
}

/// Writes `table` as CSV with a header row. `NULL` is written as an empty
/// field.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_csv<W: Write>(
    writer: &mut W,
    table: &DataTable,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.column_names())?;
    for row in table.rows() {
        csv_writer.write_record(row.values().iter().map(|value| match value {
            Value::Null => String::new(),
            other => other.to_string(),
        }))?;
    }
    csv_writer.flush()?;
    Ok(())
}
