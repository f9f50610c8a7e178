//! Periodic pipe flow case: builds the grid and geometry, composes the
//! solvers, seeds or restores the flow state and wires the diagnostic
//! reports.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, info_span, warn};

use crate::boundary::immersed::ImmersedBoundary;
use crate::checkpoint::CheckpointContainer;
use crate::config::CaseConfig;
use crate::domain::grid3d::{Grid3D, Location};
use crate::domain::pipe::{pipe_grid, pipe_signed_distance};
use crate::error::CaseError;
use crate::monitor::Monitor;
use crate::poisson::{SpectralSolver, Stencil};
use crate::solver::sgs::Smagorinsky;
use crate::solver::time::TimeTracker;
use crate::solver::{FlowState, IncompressibleSolver};

/// Streamwise periods of the initial velocity modulation.
const MODULATION_PERIODS: f64 = 8.0;

/// Restart variables, in declaration order.
const CHECKPOINT_VARIABLES: [&str; 4] = ["U", "V", "W", "P"];

/// Everything a time step touches. Monitors read from it.
#[derive(Debug)]
pub struct Simulation {
    pub grid: Arc<Grid3D>,
    pub ib: Arc<ImmersedBoundary>,
    pub solver: IncompressibleSolver,
    pub sgs: Option<Smagorinsky>,
    pub state: FlowState,
    pub time: TimeTracker,
    /// Target bulk velocity the forcing maintains.
    pub u_bulk: f64,
    pub body_force: f64,
}

impl Simulation {
    /// Volumetric flux through the streamwise faces divided by their open area.
    pub fn measured_bulk_velocity(&self) -> f64 {
        let open = self.ib.face_fraction(0);
        let area = self.grid.interior(&open).sum();
        if area > 0.0 {
            self.grid.interior(&self.state.u).sum() / area
        } else {
            0.0
        }
    }

    /// Base flow `u = u_bulk` plus seeded uniform noise in
    /// `[-amplitude/2, amplitude/2] u_bulk` and a streamwise cosine
    /// modulation, masked by the face volume fractions.
    pub fn initialize_state(&mut self, amplitude: f64, seed: u64) {
        let grid = self.grid.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        let ub = self.u_bulk;
        let wavenumber = MODULATION_PERIODS * 2.0 * PI / grid.length(0);
        let fraction = [0, 1, 2].map(|axis| self.ib.face_fraction(axis));

        let state = &mut self.state;
        state.p.fill(0.0);
        for i in grid.interior_range(0) {
            // Streamwise position of each component: u sits on the x face, v and w at the centre.
            let x = [0, 1, 2].map(|axis| grid.coordinate(0, i, Location::face(axis)));
            for j in grid.interior_range(1) {
                for k in grid.interior_range(2) {
                    let idx = [i, j, k];
                    let mut noise = || amplitude * ub * rng.gen_range(-0.5..0.5);
                    let u = ub + noise() + amplitude * ub * (wavenumber * x[0]).cos();
                    let v = noise() + amplitude * ub * (wavenumber * x[1]).sin();
                    let w = noise() + amplitude * ub * (wavenumber * x[2]).cos();
                    state.u[idx] = u * fraction[0][idx];
                    state.v[idx] = v * fraction[1][idx];
                    state.w[idx] = w * fraction[2][idx];
                }
            }
        }

        self.solver.exchange_ghosts(&mut self.state);
        self.solver.interpolate_to_centers(&mut self.state);
        self.solver.calculate_divergence(&mut self.state);
    }

    /// Recomputes the derived fields, CFL numbers and field statistics the
    /// monitors report.
    pub fn update_diagnostics(&mut self) {
        self.solver.interpolate_to_centers(&mut self.state);
        self.solver.calculate_divergence(&mut self.state);
        let eddy_viscosity = match self.sgs.as_mut() {
            Some(sgs) => {
                sgs.calculate_eddy_viscosity(&self.state);
                sgs.max_eddy_viscosity()
            }
            None => 0.0,
        };
        self.solver.calculate_cfl(&self.state, self.time.dt, eddy_viscosity);
        self.solver.calculate_stats(&self.state);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartMode {
    Fresh,
    Restored(PathBuf),
}

#[derive(Debug)]
pub struct PipeCase {
    pub config: CaseConfig,
    pub sim: Simulation,
    checkpoint: CheckpointContainer,
    start: StartMode,
    sim_monitor: Monitor<Simulation>,
    cfl_monitor: Monitor<Simulation>,
}

impl PipeCase {
    /// Builds the case up to its initial diagnostics record.
    pub fn setup(config: CaseConfig) -> Result<Self, CaseError> {
        let _span = info_span!("case_setup", name = %config.name).entered();
        config.validate()?;
        fs::create_dir_all(&config.output_dir)?;

        let grid = Arc::new(pipe_grid(config.length, config.dimensions(), config.partition())?);
        let lengths = [grid.length(0), grid.length(1), grid.length(2)];
        info!(dimensions = ?grid.dimensions, lengths = ?lengths, "Grid built");

        let ib = Arc::new(ImmersedBoundary::from_sdf(&grid, config.volume_fraction, pipe_signed_distance)?);

        let mut solver = IncompressibleSolver::new(grid.clone(), ib.clone())?;
        solver.set_density(1.0)?;
        solver.set_viscosity(config.viscosity())?;
        let pressure = SpectralSolver::pressure(grid.clone(), Stencil::SevenPoint)?;
        let implicit = if config.use_implicit_solver {
            Some(SpectralSolver::implicit_diffusion(grid.clone(), Stencil::SevenPoint)?)
        } else {
            None
        };
        solver.finalize_setup(pressure, implicit)?;

        let sgs = if config.use_sgs_model {
            Some(Smagorinsky::new(grid.clone(), solver.face_masks(), config.smagorinsky_constant)?)
        } else {
            None
        };

        let time = TimeTracker::new(config.dt_max, config.end_time, config.cfl_max)?;
        let state = FlowState::new(&grid);
        let mut sim = Simulation {
            grid,
            ib,
            solver,
            sgs,
            state,
            time,
            u_bulk: config.bulk_velocity,
            body_force: 0.0,
        };
        sim.initialize_state(config.velocity_fluctuation, config.seed);

        let (start, checkpoint) = match config.restart_path() {
            Some(path) => (StartMode::Restored(path.to_path_buf()), restore(&mut sim, &config, path)?),
            None => (StartMode::Fresh, provision(&sim, &config)?),
        };

        let append = matches!(start, StartMode::Restored(_));
        let sim_monitor = simulation_report(&config.monitor_path("sim"), append)?;
        let cfl_monitor = cfl_report(&config.monitor_path("cfl"), append)?;

        if sim.time.is_finished() {
            warn!(time = sim.time.time, end_time = sim.time.end_time, "Start time is already past the end time");
        }

        let mut case = Self { config, sim, checkpoint, start, sim_monitor, cfl_monitor };
        case.update_diagnostics();
        case.write_monitors()?;
        info!(
            start = ?case.start,
            time = case.sim.time.time,
            u_bulk = case.sim.measured_bulk_velocity(),
            checkpoint_period = case.config.checkpoint_period,
            "Case ready"
        );
        Ok(case)
    }

    pub fn start_mode(&self) -> &StartMode {
        &self.start
    }

    pub fn update_diagnostics(&mut self) {
        self.sim.update_diagnostics();
    }

    pub fn write_monitors(&mut self) -> Result<(), CaseError> {
        self.sim_monitor.write(&self.sim)?;
        self.cfl_monitor.write(&self.sim)?;
        Ok(())
    }

    pub fn sim_monitor(&self) -> &Monitor<Simulation> {
        &self.sim_monitor
    }

    pub fn cfl_monitor(&self) -> &Monitor<Simulation> {
        &self.cfl_monitor
    }

    /// Writes the live state to `restart/<name>_<step>.json` and returns the path.
    pub fn write_checkpoint(&mut self) -> Result<PathBuf, CaseError> {
        let sim = &self.sim;
        self.checkpoint.set_value("dt", sim.time.dt)?;
        self.checkpoint.set_value("t", sim.time.time)?;
        let fields = [&sim.state.u, &sim.state.v, &sim.state.w, &sim.state.p];
        for (name, field) in CHECKPOINT_VARIABLES.iter().zip(fields) {
            self.checkpoint.set_variable(name, field)?;
        }
        let path = self.config.checkpoint_path(sim.time.step);
        self.checkpoint.save(&path)?;
        Ok(path)
    }
}

/// Fresh start: makes sure the restart directory exists and declares the
/// entries future checkpoints carry.
fn provision(sim: &Simulation, config: &CaseConfig) -> Result<CheckpointContainer, CaseError> {
    fs::create_dir_all(config.restart_dir())?;
    let mut container = CheckpointContainer::create(&config.name, sim.grid.partition);
    container.declare_value("dt")?;
    container.declare_value("t")?;
    let (a, b, c) = sim.grid.shape();
    for name in CHECKPOINT_VARIABLES {
        container.declare_variable(name, [a, b, c])?;
    }
    info!(dir = %config.restart_dir().display(), "Fresh start");
    Ok(container)
}

fn restore(sim: &mut Simulation, config: &CaseConfig, path: &Path) -> Result<CheckpointContainer, CaseError> {
    let _span = info_span!("restore", path = %path.display()).entered();
    let container = CheckpointContainer::open(path, sim.grid.partition)?;
    if container.name() != config.name {
        warn!(found = container.name(), expected = %config.name, "Checkpoint was written by another case");
    }
    {
        let state = &mut sim.state;
        let fields = [&mut state.u, &mut state.v, &mut state.w, &mut state.p];
        for (name, field) in CHECKPOINT_VARIABLES.iter().zip(fields) {
            container.pull_variable(name, field)?;
        }
    }
    sim.solver.exchange_ghosts(&mut sim.state);
    sim.solver.interpolate_to_centers(&mut sim.state);
    sim.solver.calculate_divergence(&mut sim.state);

    let t = container.pull_value("t")?;
    let dt = container.pull_value("dt")?;
    sim.time.restore(t, dt)?;
    fs::create_dir_all(config.restart_dir())?;
    info!(time = t, dt, "Restored from checkpoint");
    Ok(container)
}

fn simulation_report(path: &Path, append: bool) -> Result<Monitor<Simulation>, CaseError> {
    let mut m = Monitor::create(path, append)?;
    m.add_column("step", |s: &Simulation| s.time.step.into())?;
    m.add_column("time", |s: &Simulation| s.time.time.into())?;
    m.add_column("dt", |s: &Simulation| s.time.dt.into())?;
    m.add_column("cfl", |s: &Simulation| s.solver.cfl.cfl.into())?;
    m.add_column("u_bulk", |s: &Simulation| s.u_bulk.into())?;
    m.add_column("body_force", |s: &Simulation| s.body_force.into())?;
    m.add_column("u_max", |s: &Simulation| s.solver.stats.u_max.into())?;
    m.add_column("v_max", |s: &Simulation| s.solver.stats.v_max.into())?;
    m.add_column("w_max", |s: &Simulation| s.solver.stats.w_max.into())?;
    m.add_column("p_max", |s: &Simulation| s.solver.stats.p_max.into())?;
    m.add_column("div_max", |s: &Simulation| s.solver.stats.div_max.into())?;
    m.add_column("p_iter", |s: &Simulation| s.solver.pressure_iterations().into())?;
    m.add_column("p_resid", |s: &Simulation| s.solver.pressure_residual().into())?;
    Ok(m)
}

fn cfl_report(path: &Path, append: bool) -> Result<Monitor<Simulation>, CaseError> {
    let mut m = Monitor::create(path, append)?;
    for (axis, suffix) in ["x", "y", "z"].into_iter().enumerate() {
        m.add_column(&format!("cfl_conv_{}", suffix), move |s: &Simulation| s.solver.cfl.convective[axis].into())?;
    }
    for (axis, suffix) in ["x", "y", "z"].into_iter().enumerate() {
        m.add_column(&format!("cfl_visc_{}", suffix), move |s: &Simulation| s.solver.cfl.viscous[axis].into())?;
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid3d::NGHOST;
    use crate::error::CheckpointError;
    use crate::monitor::MonitorValue;
    use crate::numerical::max_abs;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> CaseConfig {
        CaseConfig { output_dir: dir.to_path_buf(), ..CaseConfig::default() }
    }

    fn float(m: &Monitor<Simulation>, name: &str) -> f64 {
        match m.last_value(name) {
            Some(MonitorValue::Float(v)) => v,
            other => panic!("column {} holds {:?}", name, other),
        }
    }

    #[test]
    fn test_fresh_start_initial_record() {
        let dir = tempdir().unwrap();
        let mut case = PipeCase::setup(config_in(dir.path())).unwrap();

        assert_eq!(case.start_mode(), &StartMode::Fresh);
        assert!(dir.path().join("restart").is_dir());
        assert!(case.sim.solver.is_ready());
        assert!(case.sim.sgs.is_none());
        let sim = &mut case.sim;
        assert!(!sim.solver.diffuse(&mut sim.state, 0.01).unwrap());

        let sim_log = case.sim_monitor();
        assert_eq!(sim_log.last_value("step"), Some(MonitorValue::Int(0)));
        assert_eq!(float(sim_log, "time"), 0.0);
        assert_relative_eq!(float(sim_log, "u_bulk"), 1.0);
        assert_eq!(float(sim_log, "body_force"), 0.0);
        assert!(float(sim_log, "div_max").is_finite());
        assert!(float(sim_log, "cfl") > 0.0);
        assert_eq!(sim_log.last_value("p_iter"), Some(MonitorValue::Int(0)));
        assert_eq!(
            sim_log.column_names(),
            vec![
                "step", "time", "dt", "cfl", "u_bulk", "body_force", "u_max", "v_max", "w_max", "p_max", "div_max",
                "p_iter", "p_resid"
            ]
        );
        assert_eq!(case.cfl_monitor().column_names().len(), 6);
        assert_relative_eq!(
            float(case.cfl_monitor(), "cfl_visc_x"),
            0.01 * 1e-3 / (6.0f64 / 32.0).powi(2),
            max_relative = 1e-12
        );

        let text = fs::read_to_string(dir.path().join("pipe.sim.log")).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(dir.path().join("pipe.cfl.log").is_file());
    }

    #[test]
    fn test_initial_bulk_velocity_matches_target() {
        let dir = tempdir().unwrap();
        let case = PipeCase::setup(config_in(dir.path())).unwrap();
        let sim = &case.sim;
        assert_relative_eq!(sim.measured_bulk_velocity(), 1.0, epsilon = 1e-2);

        // Mean over the faces that lie wholly in the bore.
        let open = sim.ib.face_fraction(0);
        let (mut sum, mut count) = (0.0, 0usize);
        for (&u, &vf) in sim.grid.interior(&sim.state.u).iter().zip(sim.grid.interior(&open).iter()) {
            if vf == 1.0 {
                sum += u;
                count += 1;
            }
        }
        assert!(count > 0);
        assert_relative_eq!(sum / count as f64, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_wall_faces_start_at_rest() {
        let dir = tempdir().unwrap();
        let case = PipeCase::setup(config_in(dir.path())).unwrap();
        let sim = &case.sim;
        // Corner of the cross-section is deep in the wall.
        let g = NGHOST;
        for axis in 0..3 {
            assert_eq!(sim.state.velocity(axis)[[g + 3, g, g]], 0.0);
        }
    }

    #[test]
    fn test_initialization_is_reproducible() {
        let dir = tempdir().unwrap();
        let a = PipeCase::setup(config_in(dir.path())).unwrap();
        let b = PipeCase::setup(config_in(dir.path())).unwrap();
        assert_eq!(a.sim.state.u, b.sim.state.u);
        let other_seed = PipeCase::setup(CaseConfig { seed: 7, ..config_in(dir.path()) }).unwrap();
        assert_ne!(a.sim.state.v, other_seed.sim.state.v);
    }

    #[test]
    fn test_restart_restores_clock_and_fields() {
        let dir = tempdir().unwrap();
        let mut first = PipeCase::setup(config_in(dir.path())).unwrap();
        first.sim.time.restore(5.0, 0.01).unwrap();
        first.sim.time.step = 500;
        // Give the pressure a non-trivial field so it is covered by the round trip.
        let sim = &mut first.sim;
        sim.solver.project(&mut sim.state, 0.01).unwrap();
        assert!(max_abs(sim.grid.interior(&sim.state.p)) > 0.0);
        let path = first.write_checkpoint().unwrap();
        assert_eq!(path, dir.path().join("restart").join("pipe_500.json"));

        let config = CaseConfig {
            restart_file: path.to_string_lossy().into_owned(),
            seed: 99,
            ..config_in(dir.path())
        };
        let restored = PipeCase::setup(config).unwrap();
        assert_eq!(restored.start_mode(), &StartMode::Restored(path.clone()));
        assert_eq!(restored.sim.time.time, 5.0);
        assert_relative_eq!(restored.sim.time.time_prev, 4.99, epsilon = 1e-12);
        assert_eq!(restored.sim.time.dt.to_bits(), first.sim.time.dt.to_bits());
        assert_eq!(restored.sim.state.u, first.sim.state.u);
        assert_eq!(restored.sim.state.v, first.sim.state.v);
        assert_eq!(restored.sim.state.w, first.sim.state.w);
        assert_eq!(restored.sim.state.p, first.sim.state.p);
        assert_eq!(float(restored.sim_monitor(), "time"), 5.0);

        // The restored run appends to the existing report.
        let text = fs::read_to_string(dir.path().join("pipe.sim.log")).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_restart_keeps_step_above_new_maximum() {
        let dir = tempdir().unwrap();
        let mut first = PipeCase::setup(CaseConfig { dt_max: 0.05, ..config_in(dir.path()) }).unwrap();
        first.sim.time.restore(5.0, 0.02).unwrap();
        let path = first.write_checkpoint().unwrap();

        let config = CaseConfig {
            restart_file: path.to_string_lossy().into_owned(),
            ..config_in(dir.path())
        };
        let restored = PipeCase::setup(config).unwrap();
        let time = &restored.sim.time;
        assert_eq!(time.dt_max, 0.01);
        assert_eq!(time.dt, 0.02);
        assert_eq!(time.time, 5.0);
        assert_eq!(time.time_prev, 5.0 - 0.02);
        assert_eq!(float(restored.sim_monitor(), "dt"), 0.02);
    }

    #[test]
    fn test_restart_past_end_time_still_sets_up() {
        let dir = tempdir().unwrap();
        let mut first = PipeCase::setup(config_in(dir.path())).unwrap();
        first.sim.time.restore(150.0, 0.01).unwrap();
        let path = first.write_checkpoint().unwrap();

        let config = CaseConfig {
            restart_file: path.to_string_lossy().into_owned(),
            ..config_in(dir.path())
        };
        let restored = PipeCase::setup(config).unwrap();
        assert!(restored.sim.time.is_finished());
        assert_eq!(float(restored.sim_monitor(), "time"), 150.0);
    }

    #[test]
    fn test_restart_with_different_grid_fails() {
        let dir = tempdir().unwrap();
        let mut first = PipeCase::setup(config_in(dir.path())).unwrap();
        let path = first.write_checkpoint().unwrap();

        let config = CaseConfig {
            cells: [16, 16, 16],
            restart_file: path.to_string_lossy().into_owned(),
            ..config_in(dir.path())
        };
        let err = PipeCase::setup(config).unwrap_err();
        assert!(matches!(err, CaseError::Checkpoint(CheckpointError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_missing_restart_file_fails() {
        let dir = tempdir().unwrap();
        let config = CaseConfig {
            restart_file: dir.path().join("nope.json").to_string_lossy().into_owned(),
            ..config_in(dir.path())
        };
        assert!(matches!(PipeCase::setup(config), Err(CaseError::Checkpoint(CheckpointError::Io(_)))));
    }

    #[test]
    fn test_optional_subsystems() {
        let dir = tempdir().unwrap();
        let config = CaseConfig {
            cells: [16, 8, 8],
            use_implicit_solver: true,
            use_sgs_model: true,
            ..config_in(dir.path())
        };
        let mut case = PipeCase::setup(config).unwrap();
        let sgs = case.sim.sgs.as_ref().unwrap();
        assert!(sgs.max_eddy_viscosity() > 0.0);
        let dy = case.sim.grid.length(1) / 8.0;
        let molecular = case.sim.time.dt * case.config.viscosity() / (dy * dy);
        assert!(float(case.cfl_monitor(), "cfl_visc_y") > molecular);

        let sim = &mut case.sim;
        let dt = sim.time.dt;
        assert!(sim.solver.diffuse(&mut sim.state, dt).unwrap());
        sim.solver.project(&mut sim.state, dt).unwrap();
        case.update_diagnostics();
        assert!(case.sim.solver.stats.div_max < 1e-8);
        assert_eq!(case.sim.solver.pressure_iterations(), 1);
    }

    #[test]
    fn test_invalid_grid_is_fatal() {
        let dir = tempdir().unwrap();
        let config = CaseConfig { cells: [32, 4, 16], ..config_in(dir.path()) };
        assert!(matches!(PipeCase::setup(config), Err(CaseError::Grid(_))));
        let config = CaseConfig { partition: [3, 1, 1], ..config_in(dir.path()) };
        assert!(matches!(PipeCase::setup(config), Err(CaseError::Grid(_))));
    }
}
