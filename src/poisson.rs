//! Spectral solver for periodic problems discretised with the seven-point
//! stencil. The discrete Laplacian is diagonal in the Fourier basis, with
//! eigenvalue `(2 cos(2 pi k / n) - 2) / h^2` per axis, so both the pressure
//! Poisson equation and the implicit-diffusion Helmholtz equation are solved
//! directly: forward transform, divide, inverse transform.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use ndarray::{Array3, Axis};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner, Length};
use tracing::debug;

use crate::domain::grid3d::{Grid3D, NGHOST};
use crate::error::SolverError;
use crate::numerical::derive::laplacian;
use crate::numerical::max_abs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stencil {
    SevenPoint,
}

impl Stencil {
    /// Cells reached on each side of the centre.
    pub fn width(self) -> usize {
        match self {
            Stencil::SevenPoint => 1,
        }
    }
}

/// Operator inverted by a `SpectralSolver`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpectralOperator {
    /// `lap(x) = b`, solution defined up to a constant which is fixed to zero mean.
    Poisson,
    /// `alpha x - beta lap(x) = b`.
    Helmholtz { alpha: f64, beta: f64 },
}

#[derive(Debug, Clone)]
pub struct SpectralSolver {
    grid: Arc<Grid3D>,
    pub stencil: Stencil,
    pub operator: SpectralOperator,
    spacing: [f64; 3],
    eigenvalues: [Vec<f64>; 3],
    plans: AxisPlans,
    iterations: usize,
    residual: f64,
}

impl SpectralSolver {
    fn new(grid: Arc<Grid3D>, stencil: Stencil, operator: SpectralOperator) -> Result<Self, SolverError> {
        if stencil.width() > NGHOST {
            return Err(SolverError::InvalidGridDimensions(format!(
                "stencil width {} exceeds the {} ghost layers",
                stencil.width(),
                NGHOST
            )));
        }
        let mut spacing = [0.0; 3];
        for axis in 0..3 {
            if !grid.periodic[axis] {
                return Err(SolverError::InvalidGridDimensions(format!(
                    "spectral solver needs a periodic grid, axis {} is not",
                    axis
                )));
            }
            spacing[axis] = grid.uniform_spacing(axis)?;
        }
        let eigenvalues = [0, 1, 2].map(|axis| {
            let n = grid.n(axis);
            let h2 = spacing[axis] * spacing[axis];
            (0..n)
                .map(|k| (2.0 * (2.0 * PI * k as f64 / n as f64).cos() - 2.0) / h2)
                .collect::<Vec<f64>>()
        });
        let plans = AxisPlans::new(grid.dimensions.as_array());
        Ok(Self {
            grid,
            stencil,
            operator,
            spacing,
            eigenvalues,
            plans,
            iterations: 0,
            residual: 0.0,
        })
    }

    /// Solver for the pressure Poisson equation.
    pub fn pressure(grid: Arc<Grid3D>, stencil: Stencil) -> Result<Self, SolverError> {
        Self::new(grid, stencil, SpectralOperator::Poisson)
    }

    /// Solver for implicit diffusion, `(1 - nu dt lap) u = b`. The
    /// coefficients start as the identity and are set per solve with
    /// [`set_helmholtz`](Self::set_helmholtz).
    pub fn implicit_diffusion(grid: Arc<Grid3D>, stencil: Stencil) -> Result<Self, SolverError> {
        Self::new(grid, stencil, SpectralOperator::Helmholtz { alpha: 1.0, beta: 0.0 })
    }

    pub fn set_helmholtz(&mut self, alpha: f64, beta: f64) -> Result<(), SolverError> {
        if !(alpha > 0.0) || !(beta >= 0.0) {
            return Err(SolverError::InvalidParameter(format!(
                "Helmholtz coefficients need alpha > 0 and beta >= 0, got {} and {}",
                alpha, beta
            )));
        }
        match self.operator {
            SpectralOperator::Helmholtz { .. } => {
                self.operator = SpectralOperator::Helmholtz { alpha, beta };
                Ok(())
            }
            SpectralOperator::Poisson => Err(SolverError::InvalidParameter(
                "cannot set Helmholtz coefficients on a Poisson solver".to_string(),
            )),
        }
    }

    pub fn grid(&self) -> &Grid3D {
        &self.grid
    }

    /// Transforms performed by the last solve (the solve is direct).
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Max-norm residual of the last solve.
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Solves for the interior of `rhs`. The returned array has the grid's
    /// full extent with ghosts filled.
    pub fn solve(&mut self, rhs: &Array3<f64>) -> Result<Array3<f64>, SolverError> {
        if rhs.dim() != self.grid.shape() {
            return Err(SolverError::GridMismatch(format!(
                "right-hand side has extent {:?}, grid needs {:?}",
                rhs.dim(),
                self.grid.shape()
            )));
        }

        let mut b = self.grid.interior(rhs).to_owned();
        if let SpectralOperator::Poisson = self.operator {
            // The constant mode is in the null space; only the zero-mean part is solvable.
            let mean = b.mean().unwrap_or(0.0);
            b.mapv_inplace(|v| v - mean);
        }

        let mut spectrum = b.mapv(|v| Complex::new(v, 0.0));
        for axis in 0..3 {
            transform_axis(&mut spectrum, axis, self.plans.forward[axis].as_ref());
        }

        for ((i, j, k), value) in spectrum.indexed_iter_mut() {
            let lambda = self.eigenvalues[0][i] + self.eigenvalues[1][j] + self.eigenvalues[2][k];
            let denominator = match self.operator {
                SpectralOperator::Poisson => lambda,
                SpectralOperator::Helmholtz { alpha, beta } => alpha - beta * lambda,
            };
            *value = if denominator == 0.0 { Complex::new(0.0, 0.0) } else { *value / denominator };
        }

        for axis in 0..3 {
            transform_axis(&mut spectrum, axis, self.plans.inverse[axis].as_ref());
        }
        let total = spectrum.len() as f64;

        let mut solution = self.grid.zeros();
        self.grid
            .interior_mut(&mut solution)
            .assign(&spectrum.mapv(|c| c.re / total));
        self.grid.exchange_ghosts(&mut solution);

        let applied = self.apply(&solution);
        self.residual = max_abs((&self.grid.interior(&applied) - &b).view());
        self.iterations = 1;
        debug!(residual = self.residual, "Spectral solve finished");

        if !self.residual.is_finite() {
            return Err(SolverError::PoissonError("solution is not finite".to_string()));
        }
        Ok(solution)
    }

    /// Applies the discrete operator to a field with filled ghosts.
    fn apply(&self, x: &Array3<f64>) -> Array3<f64> {
        let lap = laplacian(x, self.spacing);
        match self.operator {
            SpectralOperator::Poisson => lap,
            SpectralOperator::Helmholtz { alpha, beta } => x * alpha - lap * beta,
        }
    }
}

/// Forward and inverse plans, one per axis, shared by every lane.
#[derive(Clone)]
struct AxisPlans {
    forward: [Arc<dyn Fft<f64>>; 3],
    inverse: [Arc<dyn Fft<f64>>; 3],
}

impl AxisPlans {
    fn new(lengths: [usize; 3]) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            forward: lengths.map(|n| planner.plan_fft_forward(n)),
            inverse: lengths.map(|n| planner.plan_fft_inverse(n)),
        }
    }
}

impl fmt::Debug for AxisPlans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisPlans").field("lengths", &self.forward.each_ref().map(|p| p.len())).finish()
    }
}

/// Runs `plan` over every lane along `axis`. The inverse is unnormalised.
fn transform_axis(data: &mut Array3<Complex<f64>>, axis: usize, plan: &dyn Fft<f64>) {
    let n = data.len_of(Axis(axis));
    if n < 2 {
        return;
    }
    let mut buffer = vec![Complex::new(0.0, 0.0); n];
    let mut scratch = vec![Complex::new(0.0, 0.0); plan.get_inplace_scratch_len()];
    for mut lane in data.lanes_mut(Axis(axis)) {
        for (dst, src) in buffer.iter_mut().zip(lane.iter()) {
            *dst = *src;
        }
        plan.process_with_scratch(&mut buffer, &mut scratch);
        for (dst, src) in lane.iter_mut().zip(buffer.iter()) {
            *dst = *src;
        }
    }
}
