//! Output formatters for the record window.
//!
//! Supports a human-readable table (with the highlighted row emphasized),
//! JSON, and NDJSON formats.

use std::io::{self, Write};

use crate::models::{OutputRecord, SeismicRecord};
use crate::sync::DashboardSnapshot;
use crate::window::RecordWindow;

// ANSI codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const HIGHLIGHT: &str = "\x1b[42;97m"; // white on green
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const YELLOW: &str = "\x1b[93m";
const RED: &str = "\x1b[91m";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal table (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

/// One table row, columns as the dashboard shows them.
fn format_row(record: &SeismicRecord) -> String {
    format!(
        "{:<19} │ {:>10.5} │ {:>11.5} │ {:>10.5} │ {:>8.5} │ {}",
        record.local_time().format("%Y-%m-%d %H:%M:%S"),
        record.latitude,
        record.longitude,
        record.depth_km(),
        record.magnitude,
        record.place(),
    )
}

/// Write the window as a table, emphasizing the row at `highlight`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(
    writer: &mut W,
    window: &RecordWindow,
    highlight: Option<usize>,
) -> io::Result<()> {
    writeln!(
        writer,
        "{BOLD}{:<19} │ {:>10} │ {:>11} │ {:>10} │ {:>8} │ Place{RESET}",
        "DateTime", "Latitude", "Longitude", "Depth", "Mag"
    )?;

    if window.is_empty() {
        writeln!(writer, "{DIM}(no records){RESET}")?;
        return Ok(());
    }

    for (index, record) in window.iter().enumerate() {
        let row = format_row(record);
        if highlight == Some(index) {
            writeln!(writer, "{HIGHLIGHT}{row}{RESET}")?;
        } else {
            writeln!(writer, "{row}")?;
        }
    }
    Ok(())
}

/// Write the window as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(
    writer: &mut W,
    window: &RecordWindow,
    highlight: Option<usize>,
) -> io::Result<()> {
    let output = output_records(window, highlight);
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write the window as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(
    writer: &mut W,
    window: &RecordWindow,
    highlight: Option<usize>,
) -> io::Result<()> {
    for record in output_records(window, highlight) {
        let json = serde_json::to_string(&record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write the window in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_window<W: Write>(
    writer: &mut W,
    window: &RecordWindow,
    highlight: Option<usize>,
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, window, highlight),
        Format::Json => write_json(writer, window, highlight),
        Format::Ndjson => write_ndjson(writer, window, highlight),
    }
}

/// Redraw a full snapshot for the `watch` command.
///
/// Machine formats emit the window only when it changes, so piped
/// consumers see one batch per fetch.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_snapshot<W: Write>(
    writer: &mut W,
    snapshot: &DashboardSnapshot,
    last_generation: Option<u64>,
    format: Format,
) -> io::Result<()> {
    if format != Format::Human {
        if last_generation == Some(snapshot.generation) || snapshot.generation == 0 {
            return Ok(());
        }
        return write_window(writer, &snapshot.window, Some(snapshot.cursor), format);
    }

    write!(writer, "{CLEAR_SCREEN}")?;
    writeln!(
        writer,
        "{BOLD}🌍 QuakeBoard{RESET} {DIM}│ {}{} │ window #{} │ row {}/{} │ {}{RESET}",
        snapshot.state,
        if snapshot.state.is_fetching() { " ⟳" } else { "" },
        snapshot.generation,
        if snapshot.window.is_empty() { 0 } else { snapshot.cursor + 1 },
        snapshot.window.len(),
        snapshot.updated_at.with_timezone(&chrono::Local).format("%H:%M:%S"),
    )?;
    if let Some(error) = &snapshot.last_error {
        let color = if snapshot.window.is_empty() { RED } else { YELLOW };
        writeln!(writer, "{color}⚠ {error}{RESET}")?;
    }
    writeln!(
        writer,
        "{DIM}─────────────────────────────────────────────────────────────────────{RESET}"
    )?;
    write_human(writer, &snapshot.window, Some(snapshot.cursor))
}

fn output_records(window: &RecordWindow, highlight: Option<usize>) -> Vec<OutputRecord> {
    window
        .iter()
        .enumerate()
        .map(|(i, r)| OutputRecord::new(i, r, highlight == Some(i)))
        .collect()
}
