//! Recipient list reading from CSV files and Excel workbooks.

use std::convert::Infallible;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use calamine::{Reader, open_workbook_auto};

/// Extensions read as workbooks; everything else is CSV.
const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Worksheet to read from a workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRef {
    /// Sheet with this exact name.
    Name(String),
    /// Sheet at this 0-based position.
    Index(usize),
}

impl FromStr for SheetRef {
    type Err = Infallible;

    /// All digits select by position, anything else by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse().map_or_else(|_| Self::Name(s.to_string()), Self::Index))
    }
}

impl std::fmt::Display for SheetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "'{name}'"),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// Reads every row of a recipient list as raw fields.
///
/// Workbooks are recognised by extension and read from `sheet`, or the first
/// sheet when none is given. Headers are not interpreted here; the validator
/// decides whether the first row is one. Rows may have differing field
/// counts.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, a CSV record is malformed,
/// or the requested sheet does not exist.
pub fn read_rows(path: &Path, sheet: Option<&SheetRef>) -> anyhow::Result<Vec<Vec<String>>> {
    let rows = if is_workbook(path) {
        read_workbook(path, sheet)?
    } else {
        if let Some(sheet) = sheet {
            tracing::warn!(%sheet, path = %path.display(), "Sheet ignored for CSV input");
        }
        read_csv(path)?
    };
    tracing::debug!(rows = rows.len(), path = %path.display(), "Read recipient list");
    Ok(rows)
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| WORKBOOK_EXTENSIONS.contains(&e.as_str()))
}

fn read_csv(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open recipient list {}", path.display()))?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("Malformed CSV record {} in {}", index + 1, path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Reads one worksheet with cells at their sheet positions, so column `A`
/// is always field 0.
///
/// Blank rows are dropped and trailing blank cells trimmed, matching what
/// the CSV reader yields for the same list saved as CSV. Whole-number cells
/// come out without a decimal part.
fn read_workbook(path: &Path, sheet: Option<&SheetRef>) -> anyhow::Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;

    let names = workbook.sheet_names();
    let name = match sheet {
        None => names.first(),
        Some(SheetRef::Name(wanted)) => names.iter().find(|name| *name == wanted),
        Some(SheetRef::Index(index)) => names.get(*index),
    }
    .cloned()
    .with_context(|| match sheet {
        Some(sheet) => format!(
            "No sheet {sheet} in {} (sheets: {})",
            path.display(),
            names.join(", ")
        ),
        None => format!("Workbook {} has no sheets", path.display()),
    })?;

    let range = workbook
        .worksheet_range(&name)
        .with_context(|| format!("Failed to read sheet '{name}' of {}", path.display()))?;
    let leading = range
        .start()
        .map_or(0, |(_, column)| usize::try_from(column).unwrap_or(0));

    let rows = range
        .rows()
        .filter_map(|cells| {
            let mut fields: Vec<String> = std::iter::repeat_n(String::new(), leading)
                .chain(cells.iter().map(ToString::to_string))
                .collect();
            while fields.last().is_some_and(String::is_empty) {
                fields.pop();
            }
            (!fields.is_empty()).then_some(fields)
        })
        .collect();
    tracing::debug!(sheet = %name, "Read worksheet");
    Ok(rows)
}
