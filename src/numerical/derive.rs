use ndarray::{Array3, Axis, Slice};

/// Difference of a face-staggered field across each cell along `axis`:
/// `(f[i + 1] - f[i]) / h`, stored at the centre of cell `i`.
///
/// The last plane along `axis` has no upper face and stays zero.
pub fn face_difference(field: &Array3<f64>, axis: usize, h: f64) -> Array3<f64> {
    let n = field.len_of(Axis(axis));
    let mut out = Array3::<f64>::zeros(field.raw_dim());
    if n < 2 {
        return out;
    }
    let lower = field.slice_axis(Axis(axis), Slice::from(..n - 1));
    let upper = field.slice_axis(Axis(axis), Slice::from(1..));
    out.slice_axis_mut(Axis(axis), Slice::from(..n - 1))
        .assign(&((&upper - &lower) / h));
    out
}

/// Difference of a cell-centred field across each lower face along `axis`:
/// `(c[i] - c[i - 1]) / h`, stored on face `i`. The first plane stays zero.
///
/// This is the pressure gradient the projection subtracts from the face
/// velocities.
///
/// # Arguments
/// - `field`: Cell-centred values, full extent including ghosts.
/// - `axis`: Direction of the difference (0, 1 or 2).
/// - `h`: Uniform spacing along `axis`.
///
/// # Panics
/// Panics if `axis` is not 0, 1 or 2.
///
/// # Example
/// ```
/// use ndarray::Array3;
/// use pipeflow::numerical::derive::center_difference;
///
/// // p = 2 x on a unit-spaced line of four cells.
/// let p = Array3::from_shape_fn((4, 1, 1), |(i, _, _)| 2.0 * i as f64);
/// let dpdx = center_difference(&p, 0, 1.0);
/// // Every face with a lower neighbour sees the slope 2.0.
/// assert_eq!(dpdx[[3, 0, 0]], 2.0);
/// assert_eq!(dpdx[[0, 0, 0]], 0.0);
/// ```
pub fn center_difference(field: &Array3<f64>, axis: usize, h: f64) -> Array3<f64> {
    let n = field.len_of(Axis(axis));
    let mut out = Array3::<f64>::zeros(field.raw_dim());
    if n < 2 {
        return out;
    }
    let lower = field.slice_axis(Axis(axis), Slice::from(..n - 1));
    let upper = field.slice_axis(Axis(axis), Slice::from(1..));
    out.slice_axis_mut(Axis(axis), Slice::from(1..))
        .assign(&((&upper - &lower) / h));
    out
}

/// Second-order central derivative along `axis`, `(f[i-1] - 2 f[i] + f[i+1]) / h^2`.
/// Both boundary planes stay zero.
pub fn second_difference(field: &Array3<f64>, axis: usize, h: f64) -> Array3<f64> {
    let n = field.len_of(Axis(axis));
    let mut out = Array3::<f64>::zeros(field.raw_dim());
    if n < 3 {
        return out;
    }
    let left = field.slice_axis(Axis(axis), Slice::from(..n - 2));
    let center = field.slice_axis(Axis(axis), Slice::from(1..n - 1));
    let right = field.slice_axis(Axis(axis), Slice::from(2..));
    out.slice_axis_mut(Axis(axis), Slice::from(1..n - 1))
        .assign(&((&left + &right - &center * 2.0) / (h * h)));
    out
}

/// Seven-point Laplacian of a cell-centred field:
///
/// \[
/// \nabla^2 f_{ijk} = \frac{f_{i-1} - 2f_i + f_{i+1}}{dx^2} + \frac{f_{j-1} - 2f_j + f_{j+1}}{dy^2}
///   + \frac{f_{k-1} - 2f_k + f_{k+1}}{dz^2}
/// \]
///
/// Only values at least one plane away from the array edges are meaningful,
/// so ghosts must be filled beforehand. Axes shorter than three planes
/// contribute nothing.
///
/// # Arguments
/// - `field`: Cell-centred values, full extent including ghosts.
/// - `spacing`: Uniform spacing `[dx, dy, dz]`.
///
/// # Example
/// ```
/// use ndarray::Array3;
/// use pipeflow::numerical::derive::laplacian;
///
/// // f = x^2 + y^2 + z^2 has a constant Laplacian of 6.
/// let f = Array3::from_shape_fn((5, 5, 5), |(i, j, k)| (i * i + j * j + k * k) as f64);
/// let lap = laplacian(&f, [1.0, 1.0, 1.0]);
/// assert_eq!(lap[[2, 2, 2]], 6.0);
/// ```
pub fn laplacian(field: &Array3<f64>, spacing: [f64; 3]) -> Array3<f64> {
    second_difference(field, 0, spacing[0])
        + second_difference(field, 1, spacing[1])
        + second_difference(field, 2, spacing[2])
}
