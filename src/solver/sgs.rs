//! Smagorinsky subgrid-scale model.
//!
//! The eddy viscosity is
//! ```text
//! nu_t = (C_s * Delta)^2 * |S|,   |S| = sqrt(2 S_ij S_ij)
//! ```
//! with `Delta = (dx dy dz)^(1/3)`. Velocities are masked by the face
//! validity masks of the flow solver before differentiation, so faces buried
//! in the wall do not feed spurious strain into the fluid.

use std::sync::Arc;

use ndarray::Array3;
use tracing::debug;

use crate::domain::grid3d::Grid3D;
use crate::error::SolverError;
use crate::numerical::interpolate::face_to_center;
use crate::numerical::max_abs;
use crate::solver::FlowState;

pub const DEFAULT_SMAGORINSKY_CONSTANT: f64 = 0.17;

#[derive(Debug, Clone)]
pub struct Smagorinsky {
    grid: Arc<Grid3D>,
    pub cs: f64,
    pub delta: f64,
    spacing: [f64; 3],
    face_masks: [Array3<f64>; 3],
    pub eddy_viscosity: Array3<f64>,
}

impl Smagorinsky {
    pub fn new(grid: Arc<Grid3D>, face_masks: [Array3<f64>; 3], cs: f64) -> Result<Self, SolverError> {
        if !(cs > 0.0) {
            return Err(SolverError::InvalidParameter(format!("Smagorinsky constant must be positive, got {}", cs)));
        }
        if face_masks.iter().any(|m| m.dim() != grid.shape()) {
            return Err(SolverError::GridMismatch("face masks do not cover the grid".to_string()));
        }
        let spacing = [grid.uniform_spacing(0)?, grid.uniform_spacing(1)?, grid.uniform_spacing(2)?];
        let delta = (spacing[0] * spacing[1] * spacing[2]).cbrt();
        let eddy_viscosity = grid.zeros();
        Ok(Self { grid, cs, delta, spacing, face_masks, eddy_viscosity })
    }

    /// Recomputes the cell-centred eddy viscosity from the face velocities.
    pub fn calculate_eddy_viscosity(&mut self, state: &FlowState) {
        let masked = [
            &state.u * &self.face_masks[0],
            &state.v * &self.face_masks[1],
            &state.w * &self.face_masks[2],
        ];
        let mut centred = [
            face_to_center(&masked[0], 0),
            face_to_center(&masked[1], 1),
            face_to_center(&masked[2], 2),
        ];
        for c in centred.iter_mut() {
            self.grid.exchange_ghosts(c);
        }

        let mut strain = self.grid.zeros();
        for i in self.grid.interior_range(0) {
            for j in self.grid.interior_range(1) {
                for k in self.grid.interior_range(2) {
                    let mut grad = [[0.0; 3]; 3];
                    for a in 0..3 {
                        for b in 0..3 {
                            grad[a][b] = if a == b {
                                let mut upper = [i, j, k];
                                upper[a] += 1;
                                (masked[a][upper] - masked[a][[i, j, k]]) / self.spacing[a]
                            } else {
                                let mut plus = [i, j, k];
                                let mut minus = [i, j, k];
                                plus[b] += 1;
                                minus[b] -= 1;
                                (centred[a][plus] - centred[a][minus]) / (2.0 * self.spacing[b])
                            };
                        }
                    }
                    let mut sij_sij = 0.0;
                    for a in 0..3 {
                        for b in 0..3 {
                            let s = 0.5 * (grad[a][b] + grad[b][a]);
                            sij_sij += s * s;
                        }
                    }
                    strain[[i, j, k]] = (2.0 * sij_sij).sqrt();
                }
            }
        }

        // Cells whose streamwise faces are both invalid lie in the wall.
        let cell_mask = face_to_center(&self.face_masks[0], 0);
        let scale = (self.cs * self.delta).powi(2);
        self.eddy_viscosity = strain * &cell_mask * scale;
        self.grid.exchange_ghosts(&mut self.eddy_viscosity);
        debug!(nu_t_max = self.max_eddy_viscosity(), "Eddy viscosity updated");
    }

    pub fn max_eddy_viscosity(&self) -> f64 {
        max_abs(self.grid.interior(&self.eddy_viscosity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid3d::{GridDimensions3D, Partition, NGHOST};
    use approx::assert_relative_eq;

    fn box_grid() -> Arc<Grid3D> {
        Arc::new(
            Grid3D::uniform(GridDimensions3D(8, 8, 8), [0.0; 3], [1.0; 3], [true; 3], Partition::serial()).unwrap(),
        )
    }

    fn open_masks(grid: &Grid3D) -> [Array3<f64>; 3] {
        [0, 1, 2].map(|_| Array3::from_elem(grid.shape(), 1.0))
    }

    #[test]
    fn test_uniform_flow_has_no_eddy_viscosity() {
        let grid = box_grid();
        let mut sgs = Smagorinsky::new(grid.clone(), open_masks(&grid), DEFAULT_SMAGORINSKY_CONSTANT).unwrap();
        let mut state = FlowState::new(&grid);
        state.u.fill(1.0);
        sgs.calculate_eddy_viscosity(&state);
        assert_relative_eq!(sgs.max_eddy_viscosity(), 0.0);
    }

    #[test]
    fn test_pure_shear_strain_rate() {
        // u = y (periodic wrap aside): |S| = |du/dy| = 1 away from the seam.
        let grid = box_grid();
        let mut sgs = Smagorinsky::new(grid.clone(), open_masks(&grid), 0.2).unwrap();
        let mut state = FlowState::new(&grid);
        for j in 0..grid.shape().1 {
            let y = grid.center(1, j);
            state.u.slice_mut(ndarray::s![.., j, ..]).fill(y);
        }
        sgs.calculate_eddy_viscosity(&state);
        let expected = (0.2 * sgs.delta).powi(2);
        let mid = NGHOST + 4;
        assert_relative_eq!(sgs.eddy_viscosity[[mid, mid, mid]], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_masked_cells_have_no_eddy_viscosity() {
        let grid = box_grid();
        let mut masks = open_masks(&grid);
        let mid = NGHOST + 4;
        masks[0][[mid, mid, mid]] = 0.0;
        masks[0][[mid + 1, mid, mid]] = 0.0;
        let mut sgs = Smagorinsky::new(grid.clone(), masks, 0.2).unwrap();
        let mut state = FlowState::new(&grid);
        for j in 0..grid.shape().1 {
            state.u.slice_mut(ndarray::s![.., j, ..]).fill(grid.center(1, j));
        }
        sgs.calculate_eddy_viscosity(&state);
        assert_eq!(sgs.eddy_viscosity[[mid, mid, mid]], 0.0);
        assert!(sgs.eddy_viscosity[[mid, mid + 2, mid]] > 0.0);
    }

    #[test]
    fn test_invalid_construction() {
        let grid = box_grid();
        assert!(Smagorinsky::new(grid.clone(), open_masks(&grid), 0.0).is_err());
        let bad = [0, 1, 2].map(|_| Array3::<f64>::zeros((2, 2, 2)));
        assert!(matches!(Smagorinsky::new(grid, bad, 0.1), Err(SolverError::GridMismatch(_))));
    }
}
