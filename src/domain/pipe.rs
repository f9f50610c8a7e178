//! Periodic pipe geometry: a streamwise-periodic box whose cross-section
//! holds a circular bore of unit diameter.

use tracing::debug;
use crate::domain::grid3d::{Grid3D, GridDimensions3D, Partition};
use crate::error::GridError;

/// Nominal pipe diameter.
pub const PIPE_DIAMETER: f64 = 1.0;

/// Cells reserved outside the wall on each side of a cross-stream axis.
pub const DEAD_CELLS: usize = 2;

/// Cross-stream box extent for `n` cells so that the bore keeps its nominal
/// diameter and `DEAD_CELLS` cells of wall remain on either side.
/// A single-cell axis is not resolved and gets the streamwise spacing `dx`.
pub fn cross_stream_extent(n: usize, dx: f64) -> Result<f64, GridError> {
    match n {
        0 => Err(GridError::InvalidGridSize("cross-stream cell count must be at least 1".to_string())),
        1 => Ok(dx),
        n if n <= 2 * DEAD_CELLS => Err(GridError::InvalidGridSize(format!(
            "a resolved cross-stream axis needs more than {} cells, got {}",
            2 * DEAD_CELLS,
            n
        ))),
        n => {
            let no = DEAD_CELLS as f64;
            Ok(PIPE_DIAMETER + 2.0 * no * PIPE_DIAMETER / (n as f64 - 2.0 * no))
        }
    }
}

/// Builds the triply periodic grid for a pipe of the given length. The
/// streamwise axis spans `[0, length]`; the cross-stream axes are centred on
/// the pipe axis.
pub fn pipe_grid(length: f64, dimensions: GridDimensions3D, partition: Partition) -> Result<Grid3D, GridError> {
    let GridDimensions3D(nx, ny, nz) = dimensions;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(GridError::InvalidGridSize(format!(
            "cell counts ({}, {}, {}) must be at least 1 on every axis",
            nx, ny, nz
        )));
    }
    if !(length > 0.0) || !length.is_finite() {
        return Err(GridError::InvalidLength(format!(
            "pipe length must be positive and finite, got {}",
            length
        )));
    }

    let dx = length / nx as f64;
    let ly = cross_stream_extent(ny, dx)?;
    let lz = cross_stream_extent(nz, dx)?;
    debug!(length, ly, lz, "Pipe box extents");

    Grid3D::uniform(
        dimensions,
        [0.0, -0.5 * ly, -0.5 * lz],
        [length, ly, lz],
        [true; 3],
        partition,
    )
}

/// Signed distance to the pipe wall: negative in the bore (fluid), positive
/// in the wall (solid).
pub fn pipe_signed_distance(_x: f64, y: f64, z: f64) -> f64 {
    (y * y + z * z).sqrt() - 0.5 * PIPE_DIAMETER
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_recovered_diameter_matches_nominal() {
        for n in [5usize, 6, 8, 16, 33, 64, 128] {
            let extent = cross_stream_extent(n, 0.1).unwrap();
            let h = extent / n as f64;
            assert_relative_eq!(extent - 2.0 * DEAD_CELLS as f64 * h, PIPE_DIAMETER, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_faces_strictly_increasing() {
        for (nx, ny, nz) in [(1, 1, 1), (32, 16, 16), (7, 1, 9), (3, 5, 1)] {
            let grid = pipe_grid(6.0, GridDimensions3D(nx, ny, nz), Partition::serial()).unwrap();
            for axis in 0..3 {
                assert!(grid.faces[axis].windows(2).all(|w| w[1] > w[0]));
            }
        }
    }

    #[test]
    fn test_cross_section_centred() {
        let grid = pipe_grid(6.0, GridDimensions3D(32, 16, 16), Partition::serial()).unwrap();
        assert_relative_eq!(grid.faces[0][0], 0.0);
        assert_relative_eq!(grid.length(0), 6.0, epsilon = 1e-12);
        for axis in 1..3 {
            let f = &grid.faces[axis];
            assert_relative_eq!(f[0], -f[f.len() - 1], epsilon = 1e-12);
            assert_relative_eq!(grid.length(axis), 1.0 + 4.0 / 12.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_unresolved_axis_uses_streamwise_spacing() {
        let grid = pipe_grid(6.0, GridDimensions3D(32, 16, 1), Partition::serial()).unwrap();
        assert_relative_eq!(grid.length(2), 6.0 / 32.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        let p = Partition::serial();
        assert!(pipe_grid(6.0, GridDimensions3D(0, 16, 16), p).is_err());
        assert!(pipe_grid(6.0, GridDimensions3D(32, 0, 16), p).is_err());
        assert!(pipe_grid(0.0, GridDimensions3D(32, 16, 16), p).is_err());
        assert!(pipe_grid(-1.0, GridDimensions3D(32, 16, 16), p).is_err());
        assert!(pipe_grid(f64::NAN, GridDimensions3D(32, 16, 16), p).is_err());
        assert!(pipe_grid(6.0, GridDimensions3D(32, 4, 16), p).is_err());
        assert!(pipe_grid(6.0, GridDimensions3D(32, 16, 16), Partition(3, 1, 1)).is_err());
    }

    #[test]
    fn test_signed_distance_sign() {
        assert!(pipe_signed_distance(0.0, 0.0, 0.0) < 0.0);
        assert_relative_eq!(pipe_signed_distance(1.0, 0.5, 0.0), 0.0);
        assert!(pipe_signed_distance(0.0, 0.4, 0.4) > 0.0);
    }
}
