// Dataset Loader
//
// Dispatches on file extension to turn an uploaded file into one or more Tables.
// SQL dumps go through the dialect translator and a throwaway in-memory SQLite
// connection that lives only for the duration of a single load.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::api::middleware::AppError;
use crate::models::{Table, Value};
use crate::services::dialect::{DialectTranslator, MySqlToSqliteTranslator};

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Comma-delimited with header row
    Csv,
    /// First sheet of an .xlsx/.xls workbook
    Spreadsheet,
    /// Tab-delimited text with header row
    Tsv,
    /// MySQL-style dump, possibly holding several tables
    Sql,
}

impl FileKind {
    pub const EXTENSIONS: [&'static str; 5] = [".csv", ".xlsx", ".xls", ".txt", ".sql"];

    /// Resolve the format from a file name (case-insensitive)
    pub fn from_file_name(file_name: &str) -> Result<Self, AppError> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".csv") {
            Ok(FileKind::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Ok(FileKind::Spreadsheet)
        } else if lower.ends_with(".txt") {
            Ok(FileKind::Tsv)
        } else if lower.ends_with(".sql") {
            Ok(FileKind::Sql)
        } else {
            Err(AppError::UnsupportedFileType(file_name.to_string()))
        }
    }
}

/// Result of loading one file
#[derive(Debug, Clone)]
pub enum LoadedDataset {
    Single(Table),
    Many(Vec<Table>),
}

impl LoadedDataset {
    pub fn into_tables(self) -> Vec<Table> {
        match self {
            LoadedDataset::Single(table) => vec![table],
            LoadedDataset::Many(tables) => tables,
        }
    }
}

pub struct DatasetLoader {
    translator: Box<dyn DialectTranslator>,
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            translator: Box::new(MySqlToSqliteTranslator::new()),
        }
    }

    /// Load an uploaded file given its name and raw bytes
    pub fn load(&self, file_name: &str, bytes: &[u8]) -> Result<LoadedDataset, AppError> {
        let kind = FileKind::from_file_name(file_name)?;
        tracing::info!("Loading {} ({:?}, {} bytes)", file_name, kind, bytes.len());

        let loaded = match kind {
            FileKind::Csv => LoadedDataset::Single(Self::load_delimited(file_name, bytes, b',')?),
            FileKind::Tsv => LoadedDataset::Single(Self::load_delimited(file_name, bytes, b'\t')?),
            FileKind::Spreadsheet => LoadedDataset::Single(Self::load_spreadsheet(file_name, bytes)?),
            FileKind::Sql => LoadedDataset::Many(self.load_sql(bytes)?),
        };

        if let LoadedDataset::Single(table) = &loaded {
            if table.is_empty() {
                return Err(AppError::Load(format!("{} contains no data rows", file_name)));
            }
        }
        Ok(loaded)
    }

    /// Load a file from disk
    pub fn load_path(&self, path: &Path) -> Result<LoadedDataset, AppError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(path)
            .map_err(|e| AppError::Load(format!("Failed to read {}: {}", path.display(), e)))?;
        self.load(&file_name, &bytes)
    }

    /// Parse a delimited file with a header row
    fn load_delimited(name: &str, bytes: &[u8], delimiter: u8) -> Result<Table, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect();

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|cell| String::from_utf8_lossy(cell).into_owned())
                    .collect::<Vec<_>>(),
            );
        }

        tracing::debug!("Parsed {} columns x {} rows from {}", headers.len(), rows.len(), name);
        Ok(Table::from_text_rows(name, headers, rows))
    }

    /// Parse the first worksheet, treating its first row as the header
    fn load_spreadsheet(name: &str, bytes: &[u8]) -> Result<Table, AppError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AppError::Load(format!("{} has no worksheets", name)))??;

        let mut rows_iter = range.rows();
        let headers: Vec<String> = match rows_iter.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect(),
            None => return Err(AppError::Load(format!("{} has an empty first sheet", name))),
        };

        let rows: Vec<Vec<Value>> = rows_iter
            .map(|row| row.iter().map(spreadsheet_value).collect())
            .collect();

        Ok(Table::from_rows(name, headers, rows))
    }

    /// Translate a MySQL dump, run it in a fresh in-memory SQLite and read back every table
    pub fn load_sql(&self, bytes: &[u8]) -> Result<Vec<Table>, AppError> {
        let sql_text = String::from_utf8_lossy(bytes);
        let translated = self.translator.translate(&sql_text);
        tracing::debug!("Translated SQL dump with {}", self.translator.dialect_name());

        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&translated)?;

        let table_names: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            )?;
            let names = stmt.query_map([], |row| row.get(0))?;
            names.collect::<Result<Vec<String>, _>>()?
        };

        if table_names.is_empty() {
            tracing::warn!("SQL dump produced no tables");
            return Err(AppError::NoTablesFound);
        }

        let mut tables = Vec::with_capacity(table_names.len());
        for name in &table_names {
            let table = Self::read_table(&conn, name)?;
            tracing::info!("Loaded table '{}' with {} rows", name, table.row_count());
            tables.push(table);
        }
        Ok(tables)
    }

    fn read_table(conn: &Connection, name: &str) -> Result<Table, AppError> {
        let sql = format!("SELECT * FROM \"{}\"", name.replace('"', "\"\""));
        let mut stmt = conn.prepare(&sql)?;
        let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = headers.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|idx| row.get_ref(idx).map(sqlite_value))
                    .collect::<Result<Vec<Value>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Table::from_rows(name, headers, rows))
    }
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn sqlite_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Text(format!("<{} bytes>", b.len())),
    }
}

fn spreadsheet_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(v) => Value::Int(*v),
        // Whole-number floats are how spreadsheets store integers
        Data::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Value::Int(*v as i64),
        Data::Float(v) => Value::Float(*v),
        Data::Bool(v) => Value::Bool(*v),
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}
