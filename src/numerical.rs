//! Staggered-grid operators shared by the solvers. Face variable `u[i]` sits
//! on the lower face of cell `i` along its own axis; everything else is cell
//! centred. Operators act on full arrays and are meaningful in the interior
//! once ghosts are filled.

pub mod derive;
pub mod interpolate;

use ndarray::{Array3, ArrayView3};

use self::derive::face_difference;
use self::interpolate::face_to_center;

/// Cell-centred velocity components from the three face components.
pub fn interpolate_velocity_to_centers(
    u: &Array3<f64>,
    v: &Array3<f64>,
    w: &Array3<f64>,
) -> (Array3<f64>, Array3<f64>, Array3<f64>) {
    (face_to_center(u, 0), face_to_center(v, 1), face_to_center(w, 2))
}

/// Discrete divergence `du/dx + dv/dy + dw/dz` at cell centres.
///
/// Each component is differenced across the cell from its lower face to the
/// next one, so the last plane along each axis stays zero.
///
/// # Arguments
/// - `u`, `v`, `w`: Face velocities, full extent including ghosts.
/// - `spacing`: Uniform spacing `[dx, dy, dz]`.
///
/// # Panics
/// Panics if the three components do not share one extent.
///
/// # Example
/// ```
/// use ndarray::Array3;
/// use pipeflow::numerical::calculate_divergence;
///
/// // u = x, v = w = 0 on a unit grid: the divergence is 1 everywhere it is defined.
/// let u = Array3::from_shape_fn((4, 2, 2), |(i, _, _)| i as f64);
/// let zero = Array3::zeros((4, 2, 2));
/// let div = calculate_divergence(&u, &zero, &zero, [1.0, 1.0, 1.0]);
/// assert_eq!(div[[1, 0, 0]], 1.0);
/// ```
pub fn calculate_divergence(
    u: &Array3<f64>,
    v: &Array3<f64>,
    w: &Array3<f64>,
    spacing: [f64; 3],
) -> Array3<f64> {
    assert_eq!(u.dim(), v.dim(), "u and v extents differ");
    assert_eq!(u.dim(), w.dim(), "u and w extents differ");
    face_difference(u, 0, spacing[0]) + face_difference(v, 1, spacing[1]) + face_difference(w, 2, spacing[2])
}

/// Largest magnitude in a view; 0 for an empty view.
pub fn max_abs(field: ArrayView3<f64>) -> f64 {
    field.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()))
}
