use csv::{ReaderBuilder, WriterBuilder};
use std::io::{Read, Write};
use std::path::Path;

use crate::types::{LabelColumns, Row};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("file '{path}' not found")]
    NotFound { path: String },

    #[error("column '{column}' not found, available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("expected {expected} values for column '{column}', got {actual}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A CSV file held in memory as strings, header first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl Table {
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        if !path.is_file() {
            return Err(DatasetError::NotFound {
                path: path.display().to_string(),
            });
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, records })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    fn column_index(&self, column: &str) -> Result<usize, DatasetError> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| DatasetError::MissingColumn {
                column: column.to_string(),
                available: self.headers.clone(),
            })
    }

    /// Keeps the first `rows` records.
    pub fn truncate(&mut self, rows: usize) {
        self.records.truncate(rows);
    }

    /// Reads `column` as classifier input. Empty or missing cells become
    /// `None`.
    pub fn rows(&self, column: &str) -> Result<Vec<Row>, DatasetError> {
        let at = self.column_index(column)?;
        Ok(self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| Row {
                index,
                text: record.get(at).filter(|cell| !cell.is_empty()).cloned(),
            })
            .collect())
    }

    #[cfg(test)]
    pub fn column(&self, column: &str) -> Result<Vec<&str>, DatasetError> {
        let at = self.column_index(column)?;
        Ok(self
            .records
            .iter()
            .map(|record| record.get(at).map(String::as_str).unwrap_or_default())
            .collect())
    }

    /// Overwrites `column` in place, or appends it when absent.
    pub fn set_column(&mut self, column: &str, values: Vec<String>) -> Result<(), DatasetError> {
        if values.len() != self.records.len() {
            return Err(DatasetError::LengthMismatch {
                column: column.to_string(),
                expected: self.records.len(),
                actual: values.len(),
            });
        }

        let at = match self.column_index(column) {
            Ok(at) => at,
            Err(_) => {
                self.headers.push(column.to_string());
                self.headers.len() - 1
            }
        };
        let width = self.headers.len();
        for (record, value) in self.records.iter_mut().zip(values) {
            if record.len() < width {
                record.resize(width, String::new());
            }
            record[at] = value;
        }
        Ok(())
    }

    /// Writes one column per label field, in the label's column order.
    pub fn set_labels<L: LabelColumns>(&mut self, labels: &[L]) -> Result<(), DatasetError> {
        let cells: Vec<Vec<String>> = labels.iter().map(L::cells).collect();
        for (i, column) in L::columns().into_iter().enumerate() {
            let values = cells.iter().map(|row| row[i].clone()).collect();
            self.set_column(column, values)?;
        }
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), DatasetError> {
        let mut writer = WriterBuilder::new().from_writer(writer);
        writer.write_record(&self.headers)?;
        let width = self.headers.len();
        for record in &self.records {
            let mut padded = record.clone();
            padded.resize(width, String::new());
            writer.write_record(&padded)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)
    }
}
