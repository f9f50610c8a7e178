use ndarray::{s, Array3, ArrayView3, ArrayViewMut3, Axis};
use crate::error::GridError;

/// Ghost layers carried on every side of every axis.
pub const NGHOST: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDimensions3D(pub usize, pub usize, pub usize); // nx, ny, nz (interior cells)

impl GridDimensions3D {
    pub fn as_array(&self) -> [usize; 3] {
        [self.0, self.1, self.2]
    }
}

/// Process layout `[npx, npy, npz]` the grid is decomposed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition(pub usize, pub usize, pub usize);

impl Partition {
    pub fn serial() -> Self {
        Self(1, 1, 1)
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.0, self.1, self.2]
    }
}

impl From<[usize; 3]> for Partition {
    fn from(p: [usize; 3]) -> Self {
        Self(p[0], p[1], p[2])
    }
}

/// Where a variable lives inside a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Center,
    FaceX,
    FaceY,
    FaceZ,
}

impl Location {
    /// Velocity component `axis` lives on the lower face normal to that axis.
    pub fn face(axis: usize) -> Self {
        match axis {
            0 => Location::FaceX,
            1 => Location::FaceY,
            _ => Location::FaceZ,
        }
    }

    pub fn staggered_axis(self) -> Option<usize> {
        match self {
            Location::Center => None,
            Location::FaceX => Some(0),
            Location::FaceY => Some(1),
            Location::FaceZ => Some(2),
        }
    }
}

/// Rectilinear grid. Every field defined on it, cell centred or staggered, is
/// stored with the same extent `(nx + 2g, ny + 2g, nz + 2g)`; a face variable
/// at array index `i` along its own axis sits on the lower face of cell `i`.
///
/// ```text
///  ghost | ghost |   0   |   1   | ... |  n-1  | ghost | ghost
///        |       |       |       |     |       |       |
///  i=0     i=1     i=g     i=g+1         i=g+n-1  i=g+n   i=g+n+1
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Grid3D {
    pub dimensions: GridDimensions3D,
    /// Interior face coordinates per axis, `n + 1` values each.
    pub faces: [Vec<f64>; 3],
    pub periodic: [bool; 3],
    pub partition: Partition,
}

impl Grid3D {
    pub fn new(faces: [Vec<f64>; 3], periodic: [bool; 3], partition: Partition) -> Result<Self, GridError> {
        let mut n = [0usize; 3];
        for (axis, coords) in faces.iter().enumerate() {
            if coords.len() < 2 {
                return Err(GridError::InvalidGridSize(format!(
                    "axis {} needs at least one cell (got {} face coordinates)",
                    axis,
                    coords.len()
                )));
            }
            if coords.iter().any(|c| !c.is_finite()) {
                return Err(GridError::InvalidCoordinates(format!(
                    "axis {} contains non-finite face coordinates",
                    axis
                )));
            }
            if coords.windows(2).any(|w| w[1] <= w[0]) {
                return Err(GridError::InvalidCoordinates(format!(
                    "face coordinates along axis {} must be strictly increasing",
                    axis
                )));
            }
            n[axis] = coords.len() - 1;
        }

        let parts = partition.as_array();
        for axis in 0..3 {
            if parts[axis] == 0 {
                return Err(GridError::InvalidPartition(format!(
                    "partition entry along axis {} must be at least 1",
                    axis
                )));
            }
            if n[axis] % parts[axis] != 0 {
                return Err(GridError::InvalidPartition(format!(
                    "{} processes do not divide {} cells along axis {}",
                    parts[axis], n[axis], axis
                )));
            }
        }

        Ok(Self {
            dimensions: GridDimensions3D(n[0], n[1], n[2]),
            faces,
            periodic,
            partition,
        })
    }

    /// Uniform grid spanning `[origin, origin + lengths]`.
    pub fn uniform(
        dimensions: GridDimensions3D,
        origin: [f64; 3],
        lengths: [f64; 3],
        periodic: [bool; 3],
        partition: Partition,
    ) -> Result<Self, GridError> {
        let n = dimensions.as_array();
        if n.iter().any(|&c| c == 0) {
            return Err(GridError::InvalidGridSize(format!(
                "cell counts {:?} must be at least 1 on every axis",
                n
            )));
        }
        for axis in 0..3 {
            if !(lengths[axis] > 0.0) || !lengths[axis].is_finite() {
                return Err(GridError::InvalidLength(format!(
                    "length along axis {} must be positive and finite, got {}",
                    axis, lengths[axis]
                )));
            }
        }
        let faces = [0, 1, 2].map(|axis| {
            let h = lengths[axis] / n[axis] as f64;
            (0..=n[axis]).map(|i| origin[axis] + i as f64 * h).collect::<Vec<f64>>()
        });
        Self::new(faces, periodic, partition)
    }

    pub fn n(&self, axis: usize) -> usize {
        self.faces[axis].len() - 1
    }

    pub fn length(&self, axis: usize) -> f64 {
        let f = &self.faces[axis];
        f[f.len() - 1] - f[0]
    }

    /// Per-cell spacings of the interior cells.
    pub fn spacing(&self, axis: usize) -> Vec<f64> {
        self.faces[axis].windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// The single spacing of a uniform axis.
    pub fn uniform_spacing(&self, axis: usize) -> Result<f64, GridError> {
        let h = self.length(axis) / self.n(axis) as f64;
        let tol = 1e-10 * h.max(1.0);
        if self.spacing(axis).iter().any(|d| (d - h).abs() > tol) {
            return Err(GridError::InvalidCoordinates(format!(
                "axis {} is not uniformly spaced",
                axis
            )));
        }
        Ok(h)
    }

    /// Full array extent including ghost layers.
    pub fn shape(&self) -> (usize, usize, usize) {
        let GridDimensions3D(nx, ny, nz) = self.dimensions;
        (nx + 2 * NGHOST, ny + 2 * NGHOST, nz + 2 * NGHOST)
    }

    pub fn zeros(&self) -> Array3<f64> {
        Array3::zeros(self.shape())
    }

    /// Size of the cell at array index `idx`; ghosts repeat the nearest interior spacing.
    pub fn cell_size(&self, axis: usize, idx: usize) -> f64 {
        let f = &self.faces[axis];
        let n = self.n(axis);
        let cell = idx.saturating_sub(NGHOST).min(n - 1);
        f[cell + 1] - f[cell]
    }

    /// Coordinate of the lower face of the cell at array index `idx`.
    pub fn face(&self, axis: usize, idx: usize) -> f64 {
        let f = &self.faces[axis];
        let n = self.n(axis);
        if idx < NGHOST {
            f[0] - (NGHOST - idx) as f64 * (f[1] - f[0])
        } else if idx <= NGHOST + n {
            f[idx - NGHOST]
        } else {
            f[n] + (idx - NGHOST - n) as f64 * (f[n] - f[n - 1])
        }
    }

    pub fn center(&self, axis: usize, idx: usize) -> f64 {
        self.face(axis, idx) + 0.5 * self.cell_size(axis, idx)
    }

    /// Coordinate along `axis` of a variable stored at `location`.
    pub fn coordinate(&self, axis: usize, idx: usize, location: Location) -> f64 {
        if location.staggered_axis() == Some(axis) {
            self.face(axis, idx)
        } else {
            self.center(axis, idx)
        }
    }

    pub fn interior<'a>(&self, field: &'a Array3<f64>) -> ArrayView3<'a, f64> {
        let GridDimensions3D(nx, ny, nz) = self.dimensions;
        let g = NGHOST;
        field.slice(s![g..g + nx, g..g + ny, g..g + nz])
    }

    pub fn interior_mut<'a>(&self, field: &'a mut Array3<f64>) -> ArrayViewMut3<'a, f64> {
        let GridDimensions3D(nx, ny, nz) = self.dimensions;
        let g = NGHOST;
        field.slice_mut(s![g..g + nx, g..g + ny, g..g + nz])
    }

    /// Interior index range along `axis`.
    pub fn interior_range(&self, axis: usize) -> std::ops::Range<usize> {
        NGHOST..NGHOST + self.n(axis)
    }

    /// Array index whose data a ghost plane mirrors.
    fn ghost_source(&self, axis: usize, idx: usize) -> usize {
        let n = self.n(axis) as isize;
        let g = NGHOST as isize;
        let i = idx as isize;
        if self.periodic[axis] {
            (g + (i - g).rem_euclid(n)) as usize
        } else {
            i.clamp(g, g + n - 1) as usize
        }
    }

    /// Refreshes every ghost layer of `field` from the interior: periodic axes
    /// wrap around, the others copy the nearest interior plane. Axes are
    /// processed in order so edge and corner ghosts are filled as well.
    pub fn exchange_ghosts(&self, field: &mut Array3<f64>) {
        debug_assert_eq!(field.dim(), self.shape(), "field does not cover the grid");
        for axis in 0..3 {
            let n = self.n(axis);
            let ghosts = (0..NGHOST).chain(NGHOST + n..n + 2 * NGHOST);
            for idx in ghosts {
                let src = self.ghost_source(axis, idx);
                let plane = field.index_axis(Axis(axis), src).to_owned();
                field.index_axis_mut(Axis(axis), idx).assign(&plane);
            }
        }
    }
}
