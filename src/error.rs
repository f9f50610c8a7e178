#![allow(dead_code)]
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Invalid grid size: {0}")]
    InvalidGridSize(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid domain length: {0}")]
    InvalidLength(String),

    #[error("Invalid partition: {0}")]
    InvalidPartition(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Signed distance is not finite at cell ({0}, {1}, {2})")]
    NonFiniteDistance(usize, usize, usize),
}

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Invalid grid dimensions: {0}")]
    InvalidGridDimensions(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Solver setup order violated: {0}")]
    SetupOrder(String),

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Spectral solver failed: {0}")]
    PoissonError(String),

    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed checkpoint: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Name {0:?} is already declared")]
    DuplicateName(String),

    #[error("Name {0:?} is not declared")]
    UnknownName(String),

    #[error("Entry {0:?} was declared but never set")]
    Unset(String),

    #[error("Variable {name:?} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("Checkpoint is bound to partition {found:?}, expected {expected:?}")]
    PartitionMismatch { expected: [usize; 3], found: [usize; 3] },
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Column {0:?} already exists")]
    DuplicateColumn(String),

    #[error("Cannot add column {0:?} after the first record was written")]
    ColumnsFrozen(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse parameter file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid parameter: {0}")]
    InvalidValue(String),
}

#[derive(Error, Debug)]
pub enum CaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
