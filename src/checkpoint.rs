//! Restart container: named scalars and named arrays persisted as one JSON
//! document. Declaration order is kept on disk.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::grid3d::Partition;
use crate::error::CheckpointError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct NamedValue {
    name: String,
    value: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct NamedVariable {
    name: String,
    shape: [usize; 3],
    /// Row-major, empty until set.
    data: Vec<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CheckpointContainer {
    name: String,
    partition: [usize; 3],
    values: Vec<NamedValue>,
    variables: Vec<NamedVariable>,
}

impl CheckpointContainer {
    pub fn create(name: &str, partition: Partition) -> Self {
        Self {
            name: name.to_string(),
            partition: partition.as_array(),
            values: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Reads a container and checks it was written for `partition`.
    pub fn open<P: AsRef<Path>>(path: P, partition: Partition) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let container: Self = serde_json::from_reader(reader)?;
        if container.partition != partition.as_array() {
            return Err(CheckpointError::PartitionMismatch {
                expected: partition.as_array(),
                found: container.partition,
            });
        }
        info!(path = %path.display(), name = %container.name, "Opened restart container");
        Ok(container)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!(path = %path.display(), "Checkpoint written");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declare_value(&mut self, name: &str) -> Result<(), CheckpointError> {
        if self.values.iter().any(|v| v.name == name) {
            return Err(CheckpointError::DuplicateName(name.to_string()));
        }
        self.values.push(NamedValue { name: name.to_string(), value: None });
        Ok(())
    }

    pub fn declare_variable(&mut self, name: &str, shape: [usize; 3]) -> Result<(), CheckpointError> {
        if self.variables.iter().any(|v| v.name == name) {
            return Err(CheckpointError::DuplicateName(name.to_string()));
        }
        self.variables.push(NamedVariable { name: name.to_string(), shape, data: Vec::new() });
        Ok(())
    }

    pub fn set_value(&mut self, name: &str, value: f64) -> Result<(), CheckpointError> {
        let entry = self
            .values
            .iter_mut()
            .find(|v| v.name == name)
            .ok_or_else(|| CheckpointError::UnknownName(name.to_string()))?;
        entry.value = Some(value);
        Ok(())
    }

    pub fn pull_value(&self, name: &str) -> Result<f64, CheckpointError> {
        self.values
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| CheckpointError::UnknownName(name.to_string()))?
            .value
            .ok_or_else(|| CheckpointError::Unset(name.to_string()))
    }

    pub fn set_variable(&mut self, name: &str, field: &Array3<f64>) -> Result<(), CheckpointError> {
        let entry = self
            .variables
            .iter_mut()
            .find(|v| v.name == name)
            .ok_or_else(|| CheckpointError::UnknownName(name.to_string()))?;
        let (a, b, c) = field.dim();
        if entry.shape != [a, b, c] {
            return Err(CheckpointError::ShapeMismatch {
                name: name.to_string(),
                expected: entry.shape,
                found: [a, b, c],
            });
        }
        // `iter` walks in logical (row-major) order regardless of memory layout.
        entry.data = field.iter().copied().collect();
        Ok(())
    }

    /// Copies a stored array into `target`, whose extent must match exactly.
    pub fn pull_variable(&self, name: &str, target: &mut Array3<f64>) -> Result<(), CheckpointError> {
        let entry = self
            .variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| CheckpointError::UnknownName(name.to_string()))?;
        let (a, b, c) = target.dim();
        if entry.shape != [a, b, c] {
            return Err(CheckpointError::ShapeMismatch {
                name: name.to_string(),
                expected: [a, b, c],
                found: entry.shape,
            });
        }
        if entry.data.len() != a * b * c {
            return Err(CheckpointError::Unset(name.to_string()));
        }
        for (dst, &src) in target.iter_mut().zip(entry.data.iter()) {
            *dst = src;
        }
        Ok(())
    }
}
