use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::boundary::immersed::VolumeFractionMethod;
use crate::domain::grid3d::{GridDimensions3D, Partition};
use crate::error::ConfigError;
use crate::solver::sgs::DEFAULT_SMAGORINSKY_CONSTANT;

/// Parameters of the pipe flow case. Every key of the JSON parameter file is
/// optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub name: String,
    pub length: f64,
    pub cells: [usize; 3],
    pub partition: [usize; 3],
    pub reynolds: f64,
    pub use_implicit_solver: bool,
    pub use_sgs_model: bool,
    pub dt_max: f64,
    pub end_time: f64,
    pub cfl_max: f64,
    pub velocity_fluctuation: f64,
    pub checkpoint_period: usize,
    /// Empty for a fresh start.
    pub restart_file: String,
    pub bulk_velocity: f64,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub volume_fraction: VolumeFractionMethod,
    pub smagorinsky_constant: f64,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            name: "pipe".to_string(),
            length: 6.0,
            cells: [32, 16, 16],
            partition: Partition::serial().as_array(),
            reynolds: 1000.0,
            use_implicit_solver: false,
            use_sgs_model: false,
            dt_max: 0.01,
            end_time: 100.0,
            cfl_max: 0.8,
            velocity_fluctuation: 0.2,
            checkpoint_period: 1000,
            restart_file: String::new(),
            bulk_velocity: 1.0,
            seed: 42,
            output_dir: PathBuf::from("."),
            volume_fraction: VolumeFractionMethod::Linear,
            smagorinsky_constant: DEFAULT_SMAGORINSKY_CONSTANT,
        }
    }
}

impl CaseConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would otherwise surface as confusing failures deep
    /// in setup. Grid sizes and partitions are checked by the grid builder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() || self.name.contains(|c: char| c == '/' || c == '\\') {
            return Err(ConfigError::InvalidValue(format!("case name {:?} is not a plain file stem", self.name)));
        }
        if !(self.reynolds > 0.0) || !self.reynolds.is_finite() {
            return Err(ConfigError::InvalidValue(format!("reynolds must be positive, got {}", self.reynolds)));
        }
        if !(self.bulk_velocity > 0.0) || !self.bulk_velocity.is_finite() {
            return Err(ConfigError::InvalidValue(format!(
                "bulk_velocity must be positive, got {}",
                self.bulk_velocity
            )));
        }
        if !(self.velocity_fluctuation >= 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "velocity_fluctuation must be non-negative, got {}",
                self.velocity_fluctuation
            )));
        }
        Ok(())
    }

    pub fn dimensions(&self) -> GridDimensions3D {
        GridDimensions3D(self.cells[0], self.cells[1], self.cells[2])
    }

    pub fn partition(&self) -> Partition {
        Partition::from(self.partition)
    }

    pub fn viscosity(&self) -> f64 {
        1.0 / self.reynolds
    }

    pub fn restart_path(&self) -> Option<&Path> {
        if self.restart_file.is_empty() {
            None
        } else {
            Some(Path::new(&self.restart_file))
        }
    }

    pub fn restart_dir(&self) -> PathBuf {
        self.output_dir.join("restart")
    }

    pub fn checkpoint_path(&self, step: usize) -> PathBuf {
        self.restart_dir().join(format!("{}_{}.json", self.name, step))
    }

    pub fn monitor_path(&self, report: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}.log", self.name, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let cfg = CaseConfig::default();
        assert_eq!(cfg.name, "pipe");
        assert_eq!(cfg.length, 6.0);
        assert_eq!(cfg.cells, [32, 16, 16]);
        assert_eq!(cfg.partition, [1, 1, 1]);
        assert_eq!(cfg.reynolds, 1000.0);
        assert!(!cfg.use_implicit_solver);
        assert!(!cfg.use_sgs_model);
        assert_eq!(cfg.dt_max, 0.01);
        assert_eq!(cfg.end_time, 100.0);
        assert_eq!(cfg.cfl_max, 0.8);
        assert_eq!(cfg.velocity_fluctuation, 0.2);
        assert_eq!(cfg.checkpoint_period, 1000);
        assert!(cfg.restart_path().is_none());
        assert_eq!(cfg.volume_fraction, VolumeFractionMethod::Linear);
        assert_eq!(cfg.viscosity(), 1e-3);
    }

    #[test]
    fn test_partial_json() {
        let cfg = CaseConfig::from_json(r#"{"reynolds": 5300, "cells": [64, 32, 32], "volume_fraction": "cosine"}"#)
            .unwrap();
        assert_eq!(cfg.reynolds, 5300.0);
        assert_eq!(cfg.cells, [64, 32, 32]);
        assert_eq!(cfg.volume_fraction, VolumeFractionMethod::Cosine);
        assert_eq!(cfg.length, 6.0);
        assert_eq!(cfg.dimensions(), GridDimensions3D(64, 32, 32));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(CaseConfig::from_json(r#"{"reynolds": 0}"#), Err(ConfigError::InvalidValue(_))));
        assert!(matches!(CaseConfig::from_json(r#"{"name": "a/b"}"#), Err(ConfigError::InvalidValue(_))));
        assert!(matches!(CaseConfig::from_json(r#"{"cells": "many"}"#), Err(ConfigError::Parse(_))));
        assert!(matches!(
            CaseConfig::from_json(r#"{"volume_fraction": "cubic"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipe.json");
        std::fs::write(&path, r#"{"name": "run1", "restart_file": "restart/run1_1000.json"}"#).unwrap();
        let cfg = CaseConfig::load(&path).unwrap();
        assert_eq!(cfg.name, "run1");
        assert_eq!(cfg.restart_path(), Some(Path::new("restart/run1_1000.json")));
        assert!(matches!(CaseConfig::load(dir.path().join("missing.json")), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_output_paths() {
        let cfg = CaseConfig { output_dir: PathBuf::from("out"), ..CaseConfig::default() };
        assert_eq!(cfg.checkpoint_path(2000), PathBuf::from("out/restart/pipe_2000.json"));
        assert_eq!(cfg.monitor_path("sim"), PathBuf::from("out/pipe.sim.log"));
    }
}
