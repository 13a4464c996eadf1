use std::f64::consts::FRAC_PI_2;

use nalgebra::{Matrix3, Vector2, Vector3};
use ndarray::{Array, Axis, Dimension};

/// Physical position (in μm) of a panorama or acquisition on the slide
///
/// `x` and `y` are the top-left corner of the axis-aligned bounding box, `rotation` (in radians) is
/// applied about that corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Minimum x coordinate (μm)
    pub x: f64,
    /// Minimum y coordinate (μm)
    pub y: f64,
    /// Physical width (μm)
    pub width: f64,
    /// Physical height (μm)
    pub height: f64,
    /// Rotation (radians) about (`x`, `y`)
    pub rotation: f64,
}

/// Axes along which decoded pixel data has to be mirrored so that row 0 and column 0 line up with
/// the minimum physical coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Orientation {
    /// Mirror columns
    pub flip_x: bool,
    /// Mirror rows
    pub flip_y: bool,
}

impl Placement {
    /// Placement with the given bounding box and no rotation
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Placement {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }

    /// Computes the placement from the stored corner coordinates, where the first entry of each
    /// slice is the corner at which pixel (0, 0) was recorded.
    ///
    /// The origin is the component-wise minimum and the size is the span of the coordinates. If
    /// the first corner is not the minimum along an axis, the data along that axis is stored
    /// mirrored and the returned [`Orientation`] says so.
    ///
    /// Returns `None` if either slice is empty or contains a non-finite value.
    pub fn from_corners(xs: &[f64], ys: &[f64]) -> Option<(Placement, Orientation)> {
        let (min_x, max_x) = extent(xs)?;
        let (min_y, max_y) = extent(ys)?;

        let placement = Placement::new(min_x, min_y, max_x - min_x, max_y - min_y);
        let orientation = Orientation {
            flip_x: xs[0] != min_x,
            flip_y: ys[0] != min_y,
        };

        Some((placement, orientation))
    }

    /// Returns a copy with the rotation replaced
    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Per-axis scale (μm per pixel) as (y, x) for an image of `rows` x `cols` pixels
    pub fn scale(&self, rows: usize, cols: usize) -> (f64, f64) {
        let scale_y = if rows == 0 {
            1.0
        } else {
            self.height / rows as f64
        };
        let scale_x = if cols == 0 {
            1.0
        } else {
            self.width / cols as f64
        };

        (scale_y, scale_x)
    }

    /// Translation as (y, x)
    pub fn translate(&self) -> (f64, f64) {
        (self.y, self.x)
    }

    /// Affine transform that maps pixel coordinates (column, row) of an image of `rows` x `cols`
    /// pixels to physical slide coordinates (x, y)
    pub fn pixel_to_physical(&self, rows: usize, cols: usize) -> Matrix3<f64> {
        let (scale_y, scale_x) = self.scale(rows, cols);
        let (sin, cos) = self.rotation.sin_cos();

        #[rustfmt::skip]
        let transform = Matrix3::new(
            scale_x * cos, -scale_y * sin, self.x,
            scale_x * sin,  scale_y * cos, self.y,
            0.0,            0.0,           1.0,
        );

        transform
    }

    /// Maps a single pixel coordinate to the slide
    pub fn to_physical(&self, rows: usize, cols: usize, column: f64, row: f64) -> Vector2<f64> {
        let point = self.pixel_to_physical(rows, cols) * Vector3::new(column, row, 1.0);

        Vector2::new(point.x, point.y)
    }
}

impl Orientation {
    /// True if no mirroring is required
    pub fn is_identity(&self) -> bool {
        !self.flip_x && !self.flip_y
    }

    /// Mirrors `array` so that it is stored in ascending physical coordinate order. Axis 0 is
    /// treated as y (rows) and axis 1 as x (columns); any further axes (e.g. colour) are untouched.
    pub fn apply<A: Clone, D: Dimension>(&self, mut array: Array<A, D>) -> Array<A, D> {
        if self.is_identity() || array.ndim() < 2 {
            return array;
        }

        if self.flip_y {
            array.invert_axis(Axis(0));
        }
        if self.flip_x {
            array.invert_axis(Axis(1));
        }

        array.as_standard_layout().into_owned()
    }
}

/// Rotation (radians) of the edge running from `from` to `to`, folded onto the nearest axis so that
/// mirrored or transposed corner orderings do not produce quarter turns.
///
/// The result is always within [-π/4, π/4]; an edge along y gives 0, not π/2.
pub fn edge_rotation(from: Vector2<f64>, to: Vector2<f64>) -> f64 {
    let edge = to - from;
    if edge.norm() == 0.0 || !edge.x.is_finite() || !edge.y.is_finite() {
        return 0.0;
    }

    let angle = edge.y.atan2(edge.x);

    angle - (angle / FRAC_PI_2).round() * FRAC_PI_2
}

fn extent(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() || values.iter().any(|value| !value.is_finite()) {
        return None;
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some((min, max))
}
