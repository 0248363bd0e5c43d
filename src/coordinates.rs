use derive_new::new;
use itertools::Itertools;
use itertools::MinMaxResult;
use serde::Deserialize;
use serde::Serialize;

use crate::schema::DataPoint;
use crate::schema::DisplayPoint;
use crate::schema::DisplaySize;

/// Fraction of the data span added on each side by [`AxisPolicy::FitData`].
pub const FIT_MARGIN: f64 = 0.1;

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize, new)]
pub struct CoordinateRange {
    pub min: f64,
    pub max: f64,
}

impl Default for CoordinateRange {
    fn default() -> Self {
        Self::new(-5.0, 5.0)
    }
}

impl CoordinateRange {
    /// Width of the range. A degenerate range counts as 1 so that mapping never divides by zero.
    pub fn span(&self) -> f64 {
        non_degenerate(self.max - self.min)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Extent of `values` widened by [`FIT_MARGIN`] of `max(span, 1)` on each side.
    /// Falls back to the default range when there are no values.
    pub fn fit(values: impl IntoIterator<Item = f64>) -> Self {
        let (min, max) = match values.into_iter().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => return Self::default(),
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        let margin = (max - min).max(1.0) * FIT_MARGIN;
        Self::new(min - margin, max + margin)
    }
}

fn non_degenerate(length: f64) -> f64 {
    if length.is_finite() && length.abs() > f64::EPSILON {
        length
    } else {
        1.0
    }
}

/// How the logical range shown on the surface is chosen.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum AxisPolicy {
    /// The same fixed range on both axes.
    Fixed(CoordinateRange),
    /// Each axis follows the current data extent.
    FitData,
}

impl Default for AxisPolicy {
    fn default() -> Self {
        AxisPolicy::Fixed(CoordinateRange::default())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct GridLine {
    pub orientation: Orientation,
    pub from: DisplayPoint,
    pub to: DisplayPoint,
}

/// Affine map between data space and the padded drawable rectangle of a surface.
///
/// The mapper is a value: rebuild it whenever the surface or the ranges change.
#[derive(Clone, Copy, PartialEq, Debug, new)]
pub struct CoordinateMapper {
    size: DisplaySize,
    padding: f64,
    x_range: CoordinateRange,
    y_range: CoordinateRange,
}

impl CoordinateMapper {
    pub fn uniform(size: DisplaySize, padding: f64, range: CoordinateRange) -> Self {
        Self::new(size, padding, range, range)
    }

    pub fn for_points<'a>(
        size: DisplaySize,
        padding: f64,
        policy: &AxisPolicy,
        points: impl IntoIterator<Item = &'a DataPoint> + Clone,
    ) -> Self {
        match policy {
            AxisPolicy::Fixed(range) => Self::uniform(size, padding, *range),
            AxisPolicy::FitData => Self::new(
                size,
                padding,
                CoordinateRange::fit(points.clone().into_iter().map(|p| p.x)),
                CoordinateRange::fit(points.into_iter().map(|p| p.y)),
            ),
        }
    }

    pub fn size(&self) -> DisplaySize {
        self.size
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    pub fn x_range(&self) -> CoordinateRange {
        self.x_range
    }

    pub fn y_range(&self) -> CoordinateRange {
        self.y_range
    }

    fn drawable_width(&self) -> f64 {
        non_degenerate(self.size.width - 2.0 * self.padding)
    }

    fn drawable_height(&self) -> f64 {
        non_degenerate(self.size.height - 2.0 * self.padding)
    }

    pub fn to_display(&self, point: &DataPoint) -> DisplayPoint {
        let x = (point.x - self.x_range.min) / self.x_range.span() * self.drawable_width()
            + self.padding;
        // Display y grows downward, data y grows upward.
        let y = (self.y_range.max - point.y) / self.y_range.span() * self.drawable_height()
            + self.padding;
        DisplayPoint::new(x, y)
    }

    pub fn to_data(&self, display: &DisplayPoint) -> DataPoint {
        let x = (display.x - self.padding) / self.drawable_width() * self.x_range.span()
            + self.x_range.min;
        let y = self.y_range.max
            - (display.y - self.padding) / self.drawable_height() * self.y_range.span();
        DataPoint::new(x, y)
    }

    pub fn is_inside_drawable_area(&self, display: &DisplayPoint) -> bool {
        let DisplaySize { width, height } = self.size;
        (self.padding..=width - self.padding).contains(&display.x)
            && (self.padding..=height - self.padding).contains(&display.y)
    }

    /// Evenly spaced grid lines across the drawable area, `divisions + 1` per orientation.
    pub fn grid_lines(&self, divisions: usize) -> Vec<GridLine> {
        if divisions == 0 {
            return Vec::new();
        }
        let (left, top) = (self.padding, self.padding);
        let right = self.size.width - self.padding;
        let bottom = self.size.height - self.padding;
        let (w, h) = (right - left, bottom - top);
        (0..=divisions)
            .flat_map(|i| {
                let t = i as f64 / divisions as f64;
                let (x, y) = (left + w * t, top + h * t);
                [
                    GridLine {
                        orientation: Orientation::Horizontal,
                        from: DisplayPoint::new(left, y),
                        to: DisplayPoint::new(right, y),
                    },
                    GridLine {
                        orientation: Orientation::Vertical,
                        from: DisplayPoint::new(x, top),
                        to: DisplayPoint::new(x, bottom),
                    },
                ]
            })
            .collect()
    }
}
