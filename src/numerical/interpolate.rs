use ndarray::{Array3, Axis, Slice};

/// Averages a face-staggered field onto cell centres along `axis`.
///
/// The centre of cell `i` sits midway between its lower face `i` and upper
/// face `i + 1`, so each output value is the arithmetic mean of the two. The
/// output has the input's extent; the last plane along `axis` has no upper
/// face and is left at zero for the ghost exchange to fill.
///
/// # Example
/// ```text
/// faces:   1.0   3.0   5.0   7.0
/// centres:    2.0   4.0   6.0   0.0
/// ```
pub fn face_to_center(field: &Array3<f64>, axis: usize) -> Array3<f64> {
    let n = field.len_of(Axis(axis));
    let mut out = Array3::<f64>::zeros(field.raw_dim());
    if n < 2 {
        return out;
    }
    let lower = field.slice_axis(Axis(axis), Slice::from(..n - 1));
    let upper = field.slice_axis(Axis(axis), Slice::from(1..));
    out.slice_axis_mut(Axis(axis), Slice::from(..n - 1))
        .assign(&((&lower + &upper) * 0.5));
    out
}

/// Averages a cell-centred field onto the lower faces along `axis`.
///
/// Face `i` lies between cells `i - 1` and `i`. The first plane has no lower
/// neighbour and takes the value of cell 0.
pub fn center_to_face(field: &Array3<f64>, axis: usize) -> Array3<f64> {
    let n = field.len_of(Axis(axis));
    let mut out = field.clone();
    if n < 2 {
        return out;
    }
    let lower = field.slice_axis(Axis(axis), Slice::from(..n - 1));
    let upper = field.slice_axis(Axis(axis), Slice::from(1..));
    out.slice_axis_mut(Axis(axis), Slice::from(1..))
        .assign(&((&lower + &upper) * 0.5));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn ramp(axis: usize) -> Array3<f64> {
        Array3::from_shape_fn((4, 3, 2), |(i, j, k)| [i, j, k][axis] as f64 * 2.0 + 1.0)
    }

    #[test]
    fn test_face_to_center_along_x() {
        let faces = ramp(0);
        let centres = face_to_center(&faces, 0);
        assert_eq!(centres.dim(), (4, 3, 2));
        assert_eq!(centres[[0, 1, 1]], 2.0);
        assert_eq!(centres[[2, 0, 0]], 6.0);
        assert_eq!(centres[[3, 2, 1]], 0.0);
    }

    #[test]
    fn test_face_to_center_along_z() {
        let faces = ramp(2);
        let centres = face_to_center(&faces, 2);
        assert_eq!(centres[[1, 1, 0]], 2.0);
        assert_eq!(centres[[1, 1, 1]], 0.0);
    }

    #[test]
    fn test_center_to_face_along_y() {
        let centres = ramp(1);
        let faces = center_to_face(&centres, 1);
        assert_eq!(faces[[0, 0, 0]], 1.0);
        assert_eq!(faces[[0, 1, 0]], 2.0);
        assert_eq!(faces[[3, 2, 1]], 4.0);
    }

    #[test]
    fn test_constant_field_is_preserved() {
        let field = Array3::<f64>::from_elem((5, 5, 5), 0.75);
        let faces = center_to_face(&field, 0);
        assert!(faces.iter().all(|&v| v == 0.75));
    }
}
