use nalgebra::Vector3;
use ndarray::Array3;
use serde::Deserialize;
use tracing::debug;

use crate::domain::grid3d::Grid3D;
use crate::error::GeometryError;
use crate::numerical::interpolate::center_to_face;

/// Maps a cell's signed distance to its fluid volume fraction.
///
/// Every method ramps from 1 at `d = -r` to 0 at `d = r`, where `r` is the
/// half diagonal of the cell, and is strictly positive for `d < r`. A cell
/// whose centre is at least `r` from the surface on the wall side cannot
/// touch the bore, so a zero fraction only ever marks a cell lying wholly in
/// the wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeFractionMethod {
    #[default]
    Linear,
    Cosine,
}

impl VolumeFractionMethod {
    pub fn fraction(self, distance: f64, half_width: f64) -> f64 {
        if distance <= -half_width {
            return 1.0;
        }
        if distance >= half_width {
            return 0.0;
        }
        let s = distance / half_width; // in (-1, 1)
        match self {
            VolumeFractionMethod::Linear => 0.5 * (1.0 - s),
            VolumeFractionMethod::Cosine => 0.5 * (1.0 + (0.5 * std::f64::consts::PI * (s + 1.0)).cos()),
        }
    }
}

/// Immersed-boundary fields for every cell of the grid, ghosts included.
#[derive(Debug, Clone)]
pub struct ImmersedBoundary {
    pub method: VolumeFractionMethod,
    /// Signed distance to the surface, negative in the fluid.
    pub distance: Array3<f64>,
    /// Unit surface normal components, pointing from fluid into solid.
    pub normal: [Array3<f64>; 3],
    /// Fluid volume fraction, 1 in the fluid and 0 in the solid.
    pub volume_fraction: Array3<f64>,
}

impl ImmersedBoundary {
    /// Evaluates `sdf(x, y, z)` at every cell centre of `grid`, including the
    /// ghost layers, and derives normals and volume fractions from it.
    pub fn from_sdf<F>(grid: &Grid3D, method: VolumeFractionMethod, sdf: F) -> Result<Self, GeometryError>
    where
        F: Fn(f64, f64, f64) -> f64,
    {
        let shape = grid.shape();
        let mut distance = Array3::<f64>::zeros(shape);
        let mut normal = [Array3::<f64>::zeros(shape), Array3::<f64>::zeros(shape), Array3::<f64>::zeros(shape)];
        let mut volume_fraction = Array3::<f64>::zeros(shape);

        for i in 0..shape.0 {
            let x = grid.center(0, i);
            let dx = grid.cell_size(0, i);
            for j in 0..shape.1 {
                let y = grid.center(1, j);
                let dy = grid.cell_size(1, j);
                for k in 0..shape.2 {
                    let z = grid.center(2, k);
                    let dz = grid.cell_size(2, k);

                    let d = sdf(x, y, z);
                    if !d.is_finite() {
                        return Err(GeometryError::NonFiniteDistance(i, j, k));
                    }
                    distance[[i, j, k]] = d;

                    let n = surface_normal(&sdf, x, y, z, 1e-6 * dx.min(dy).min(dz));
                    for axis in 0..3 {
                        normal[axis][[i, j, k]] = n[axis];
                    }

                    let half_width = 0.5 * (dx * dx + dy * dy + dz * dz).sqrt();
                    volume_fraction[[i, j, k]] = method.fraction(d, half_width);
                }
            }
        }

        let ib = Self { method, distance, normal, volume_fraction };
        debug!(
            fluid = ib.count(|vf| vf >= 1.0),
            interface = ib.count(|vf| vf > 0.0 && vf < 1.0),
            solid = ib.count(|vf| vf <= 0.0),
            "Immersed boundary evaluated"
        );
        Ok(ib)
    }

    fn count(&self, pred: impl Fn(f64) -> bool) -> usize {
        self.volume_fraction.iter().filter(|&&vf| pred(vf)).count()
    }

    /// Volume fraction on the lower faces along `axis`: the mean of the two
    /// cells sharing the face.
    pub fn face_fraction(&self, axis: usize) -> Array3<f64> {
        center_to_face(&self.volume_fraction, axis)
    }
}

/// Normalised central-difference gradient of `sdf`; the zero vector where the
/// gradient vanishes (e.g. on a symmetry axis).
fn surface_normal<F>(sdf: &F, x: f64, y: f64, z: f64, h: f64) -> Vector3<f64>
where
    F: Fn(f64, f64, f64) -> f64,
{
    let gradient = Vector3::new(
        sdf(x + h, y, z) - sdf(x - h, y, z),
        sdf(x, y + h, z) - sdf(x, y - h, z),
        sdf(x, y, z + h) - sdf(x, y, z - h),
    ) / (2.0 * h);
    gradient.try_normalize(1e-8).unwrap_or_else(Vector3::zeros)
}
