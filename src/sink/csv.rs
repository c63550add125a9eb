//! Flat encoding: header row once, then one line per record.
//!
//! Control characters inside a cell are escaped (`\n`, `\r`, `\t`, `\u{..}`)
//! so that every record occupies exactly one physical line. Cells containing a
//! comma or a quote are quoted with doubled inner quotes.

use super::{io_error, SinkError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Write the header if the stream is missing or empty, and terminate a line
/// left unfinished by an interrupted write.
pub fn initialize(path: &Path, header: &[&str]) -> Result<(), SinkError> {
    let needs_header = match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    };
    if !needs_header {
        return terminate_last_line(path);
    }

    let cells: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    write_line(path, &cells)
}

/// Append one row and sync it to disk.
pub fn append_row(path: &Path, cells: &[String]) -> Result<(), SinkError> {
    write_line(path, cells)
}

fn write_line(path: &Path, cells: &[String]) -> Result<(), SinkError> {
    let mut line = encode_row(cells);
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| io_error(path, e))?;
    file.sync_data().map_err(|e| io_error(path, e))
}

fn terminate_last_line(path: &Path) -> Result<(), SinkError> {
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .and_then(|_| file.read_exact(&mut last))
        .map_err(|e| io_error(path, e))?;
    if last[0] == b'\n' {
        return Ok(());
    }

    tracing::warn!(path = %path.display(), "stream ends mid-line; terminating it");
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, e))?;
    file.write_all(b"\n").map_err(|e| io_error(path, e))?;
    file.sync_data().map_err(|e| io_error(path, e))
}

/// Encode cells as a single CSV line (without the terminator).
pub fn encode_row(cells: &[String]) -> String {
    cells
        .iter()
        .map(|cell| quote_cell(&escape_control(cell)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Escape control characters so the value fits on one line.
pub fn escape_control(value: &str) -> String {
    if !value.chars().any(char::is_control) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.extend(c.escape_unicode()),
            c => out.push(c),
        }
    }
    out
}

fn quote_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Read every data row (header excluded).
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, SinkError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    Ok(content
        .lines()
        .skip(1)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect())
}

/// Split one encoded line back into cells. Escaped control characters stay escaped.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if current.is_empty() => in_quotes = true,
            (',', false) => cells.push(std::mem::take(&mut current)),
            (c, _) => current.push(c),
        }
    }
    cells.push(current);
    cells
}
