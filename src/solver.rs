pub mod sgs;
pub mod time;

use std::sync::Arc;

use ndarray::Array3;
use tracing::{debug, info, info_span};

use crate::boundary::immersed::ImmersedBoundary;
use crate::domain::grid3d::Grid3D;
use crate::error::SolverError;
use crate::numerical::derive::center_difference;
use crate::numerical::{calculate_divergence, interpolate_velocity_to_centers, max_abs};
use crate::poisson::SpectralSolver;

/// Flow variables on the staggered grid. Every array has the grid's full
/// extent; `u`, `v`, `w` live on x, y and z faces, the rest at cell centres.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowState {
    pub u: Array3<f64>,
    pub v: Array3<f64>,
    pub w: Array3<f64>,
    pub p: Array3<f64>,
    pub uc: Array3<f64>,
    pub vc: Array3<f64>,
    pub wc: Array3<f64>,
    pub div: Array3<f64>,
}

impl FlowState {
    pub fn new(grid: &Grid3D) -> Self {
        Self {
            u: grid.zeros(),
            v: grid.zeros(),
            w: grid.zeros(),
            p: grid.zeros(),
            uc: grid.zeros(),
            vc: grid.zeros(),
            wc: grid.zeros(),
            div: grid.zeros(),
        }
    }

    pub fn velocity(&self, axis: usize) -> &Array3<f64> {
        match axis {
            0 => &self.u,
            1 => &self.v,
            _ => &self.w,
        }
    }

    pub fn velocity_mut(&mut self, axis: usize) -> &mut Array3<f64> {
        match axis {
            0 => &mut self.u,
            1 => &mut self.v,
            _ => &mut self.w,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CflReport {
    /// Largest `dt (|uc|/dx + |vc|/dy + |wc|/dz)` over the interior.
    pub cfl: f64,
    pub convective: [f64; 3],
    pub viscous: [f64; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldStats {
    pub u_max: f64,
    pub v_max: f64,
    pub w_max: f64,
    pub p_max: f64,
    pub div_max: f64,
}

/// Incompressible flow solver bound to one masked grid.
///
/// Setup is two-phase: construct, configure fluid properties, then hand over
/// the dependent solvers with a single [`finalize_setup`](Self::finalize_setup).
/// Kernels that need the pressure solver refuse to run before that.
#[derive(Debug)]
pub struct IncompressibleSolver {
    grid: Arc<Grid3D>,
    ib: Arc<ImmersedBoundary>,
    spacing: [f64; 3],
    density: f64,
    viscosity: f64,
    pressure_solver: Option<SpectralSolver>,
    implicit_solver: Option<SpectralSolver>,
    finalized: bool,
    pub cfl: CflReport,
    pub stats: FieldStats,
}

impl IncompressibleSolver {
    pub fn new(grid: Arc<Grid3D>, ib: Arc<ImmersedBoundary>) -> Result<Self, SolverError> {
        if ib.volume_fraction.dim() != grid.shape() {
            return Err(SolverError::GridMismatch(format!(
                "immersed boundary has extent {:?}, grid needs {:?}",
                ib.volume_fraction.dim(),
                grid.shape()
            )));
        }
        let spacing = [grid.uniform_spacing(0)?, grid.uniform_spacing(1)?, grid.uniform_spacing(2)?];
        Ok(Self {
            grid,
            ib,
            spacing,
            density: 1.0,
            viscosity: 0.0,
            pressure_solver: None,
            implicit_solver: None,
            finalized: false,
            cfl: CflReport::default(),
            stats: FieldStats::default(),
        })
    }

    pub fn set_density(&mut self, density: f64) -> Result<(), SolverError> {
        if !(density > 0.0) || !density.is_finite() {
            return Err(SolverError::InvalidParameter(format!("density must be positive, got {}", density)));
        }
        self.density = density;
        Ok(())
    }

    pub fn set_viscosity(&mut self, viscosity: f64) -> Result<(), SolverError> {
        if !(viscosity >= 0.0) || !viscosity.is_finite() {
            return Err(SolverError::InvalidParameter(format!("viscosity must be non-negative, got {}", viscosity)));
        }
        self.viscosity = viscosity;
        Ok(())
    }

    /// Binds the pressure solver and, optionally, the implicit diffusion
    /// solver. Allowed exactly once; both must agree with this solver's grid.
    pub fn finalize_setup(
        &mut self,
        pressure: SpectralSolver,
        implicit: Option<SpectralSolver>,
    ) -> Result<(), SolverError> {
        if self.finalized {
            return Err(SolverError::SetupOrder("solver setup was already finalized".to_string()));
        }
        if pressure.grid() != self.grid.as_ref() {
            return Err(SolverError::GridMismatch("pressure solver is bound to a different grid".to_string()));
        }
        if let Some(implicit) = &implicit {
            if implicit.grid() != self.grid.as_ref() {
                return Err(SolverError::GridMismatch("implicit solver is bound to a different grid".to_string()));
            }
            if implicit.stencil != pressure.stencil {
                return Err(SolverError::GridMismatch(
                    "implicit and pressure solvers use different stencils".to_string(),
                ));
            }
        }
        info!(implicit = implicit.is_some(), "Flow solver setup finalized");
        self.pressure_solver = Some(pressure);
        self.implicit_solver = implicit;
        self.finalized = true;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.finalized
    }

    fn require_ready(&self, operation: &str) -> Result<(), SolverError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(SolverError::SetupOrder(format!("{} called before finalize_setup", operation)))
        }
    }

    pub fn pressure_iterations(&self) -> usize {
        self.pressure_solver.as_ref().map_or(0, |s| s.iterations())
    }

    pub fn pressure_residual(&self) -> f64 {
        self.pressure_solver.as_ref().map_or(0.0, |s| s.residual())
    }

    /// 1 on faces touching any fluid, 0 on faces buried in the wall.
    pub fn face_masks(&self) -> [Array3<f64>; 3] {
        [0, 1, 2].map(|axis| self.ib.face_fraction(axis).mapv(|vf| if vf > 0.0 { 1.0 } else { 0.0 }))
    }

    pub fn exchange_ghosts(&self, state: &mut FlowState) {
        for field in [&mut state.u, &mut state.v, &mut state.w, &mut state.p] {
            self.grid.exchange_ghosts(field);
        }
    }

    pub fn interpolate_to_centers(&self, state: &mut FlowState) {
        let (uc, vc, wc) = interpolate_velocity_to_centers(&state.u, &state.v, &state.w);
        state.uc = uc;
        state.vc = vc;
        state.wc = wc;
        for field in [&mut state.uc, &mut state.vc, &mut state.wc] {
            self.grid.exchange_ghosts(field);
        }
    }

    pub fn calculate_divergence(&self, state: &mut FlowState) {
        state.div = calculate_divergence(&state.u, &state.v, &state.w, self.spacing);
        self.grid.exchange_ghosts(&mut state.div);
    }

    /// Convective and viscous CFL numbers for step `dt`. `eddy_viscosity` is
    /// the largest subgrid viscosity, 0 without a turbulence model. Expects
    /// cell-centred velocities to be current.
    pub fn calculate_cfl(&mut self, state: &FlowState, dt: f64, eddy_viscosity: f64) -> CflReport {
        let [dx, dy, dz] = self.spacing;
        let uc = self.grid.interior(&state.uc);
        let vc = self.grid.interior(&state.vc);
        let wc = self.grid.interior(&state.wc);

        let mut cfl = 0.0_f64;
        ndarray::Zip::from(&uc).and(&vc).and(&wc).for_each(|&u, &v, &w| {
            cfl = cfl.max(dt * (u.abs() / dx + v.abs() / dy + w.abs() / dz));
        });

        let nu = self.viscosity + eddy_viscosity;
        let report = CflReport {
            cfl,
            convective: [
                dt * max_abs(uc.view()) / dx,
                dt * max_abs(vc.view()) / dy,
                dt * max_abs(wc.view()) / dz,
            ],
            viscous: [dt * nu / (dx * dx), dt * nu / (dy * dy), dt * nu / (dz * dz)],
        };
        self.cfl = report;
        report
    }

    /// Interior maxima of the velocity components, pressure and divergence.
    pub fn calculate_stats(&mut self, state: &FlowState) -> FieldStats {
        let stats = FieldStats {
            u_max: max_abs(self.grid.interior(&state.u)),
            v_max: max_abs(self.grid.interior(&state.v)),
            w_max: max_abs(self.grid.interior(&state.w)),
            p_max: max_abs(self.grid.interior(&state.p)),
            div_max: max_abs(self.grid.interior(&state.div)),
        };
        self.stats = stats;
        stats
    }

    /// Pressure projection: solves `lap(phi) = div(u) / dt`, subtracts
    /// `dt grad(phi)` from the face velocities and stores `rho phi` as pressure.
    /// Expects velocity ghosts to be current.
    pub fn project(&mut self, state: &mut FlowState, dt: f64) -> Result<(), SolverError> {
        self.require_ready("project")?;
        if !(dt > 0.0) {
            return Err(SolverError::InvalidParameter(format!("time step must be positive, got {}", dt)));
        }
        let _span = info_span!("pressure_projection", dt).entered();

        let rhs = calculate_divergence(&state.u, &state.v, &state.w, self.spacing) / dt;
        let phi = match self.pressure_solver.as_mut() {
            Some(solver) => solver.solve(&rhs)?,
            None => return Err(SolverError::SetupOrder("no pressure solver bound".to_string())),
        };

        for axis in 0..3 {
            let correction = center_difference(&phi, axis, self.spacing[axis]) * dt;
            let mut component = self.grid.interior_mut(state.velocity_mut(axis));
            component -= &self.grid.interior(&correction);
        }
        state.p = phi * self.density;
        self.exchange_ghosts(state);
        self.calculate_divergence(state);
        debug!(
            iterations = self.pressure_iterations(),
            residual = self.pressure_residual(),
            "Projection finished"
        );
        Ok(())
    }

    /// Implicit viscous step `(1 - nu dt lap) u_new = u` on every velocity
    /// component. Returns `false` without touching the state when no
    /// implicit solver is bound.
    pub fn diffuse(&mut self, state: &mut FlowState, dt: f64) -> Result<bool, SolverError> {
        self.require_ready("diffuse")?;
        let viscosity = self.viscosity;
        let Some(implicit) = self.implicit_solver.as_mut() else {
            return Ok(false);
        };
        implicit.set_helmholtz(1.0, viscosity * dt)?;
        for axis in 0..3 {
            let diffused = implicit.solve(state.velocity(axis))?;
            *state.velocity_mut(axis) = diffused;
        }
        Ok(true)
    }
}
