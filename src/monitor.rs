//! Column-oriented diagnostic reports.
//!
//! A [`Monitor`] owns an output file and an ordered list of named columns.
//! Each column is an accessor evaluated against a source `S` at write time,
//! so a record always reflects the source's live values.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::MonitorError;

const COLUMN_WIDTH: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorValue {
    Int(i64),
    Float(f64),
}

impl From<usize> for MonitorValue {
    fn from(v: usize) -> Self {
        MonitorValue::Int(v as i64)
    }
}

impl From<f64> for MonitorValue {
    fn from(v: f64) -> Self {
        MonitorValue::Float(v)
    }
}

impl fmt::Display for MonitorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorValue::Int(v) => write!(f, "{:>width$}", v, width = COLUMN_WIDTH),
            MonitorValue::Float(v) => write!(f, "{:>width$.6e}", v, width = COLUMN_WIDTH),
        }
    }
}

type Accessor<S> = Box<dyn Fn(&S) -> MonitorValue>;

pub struct Monitor<S> {
    path: PathBuf,
    writer: BufWriter<File>,
    columns: Vec<(String, Accessor<S>)>,
    header_written: bool,
    records: usize,
    last_record: Vec<MonitorValue>,
}

impl<S> fmt::Debug for Monitor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("path", &self.path)
            .field("columns", &self.column_names())
            .field("records", &self.records)
            .finish()
    }
}

impl<S> Monitor<S> {
    /// Opens the report file, truncating it unless `append` is set. With
    /// `append` the header is assumed to be present already.
    pub fn create<P: AsRef<Path>>(path: P, append: bool) -> Result<Self, MonitorError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)?;
        let header_written = append && file.metadata()?.len() > 0;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            columns: Vec::new(),
            header_written,
            records: 0,
            last_record: Vec::new(),
        })
    }

    pub fn add_column<F>(&mut self, name: &str, accessor: F) -> Result<(), MonitorError>
    where
        F: Fn(&S) -> MonitorValue + 'static,
    {
        if self.records > 0 {
            return Err(MonitorError::ColumnsFrozen(name.to_string()));
        }
        if self.columns.iter().any(|(n, _)| n == name) {
            return Err(MonitorError::DuplicateColumn(name.to_string()));
        }
        self.columns.push((name.to_string(), Box::new(accessor)));
        Ok(())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Evaluates every column against `source` and appends one record.
    pub fn write(&mut self, source: &S) -> Result<(), MonitorError> {
        if !self.header_written {
            let header: Vec<String> =
                self.columns.iter().map(|(n, _)| format!("{:>width$}", n, width = COLUMN_WIDTH)).collect();
            writeln!(self.writer, "{}", header.join(" "))?;
            self.header_written = true;
        }
        self.last_record = self.columns.iter().map(|(_, accessor)| accessor(source)).collect();
        let row: Vec<String> = self.last_record.iter().map(|v| v.to_string()).collect();
        writeln!(self.writer, "{}", row.join(" "))?;
        self.writer.flush()?;
        self.records += 1;
        debug!(path = %self.path.display(), "Monitor record written");
        Ok(())
    }

    /// Value of `name` in the last record, if both exist.
    pub fn last_value(&self, name: &str) -> Option<MonitorValue> {
        let idx = self.columns.iter().position(|(n, _)| n == name)?;
        self.last_record.get(idx).copied()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
