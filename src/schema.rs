use derive_more::Display;
use derive_more::From;
use derive_new::new;
use serde::Deserialize;
use serde::Serialize;

/// A point in data space.
#[derive(Clone, Copy, PartialEq, Debug, Default, From, Display, Serialize, Deserialize, new)]
#[display(fmt = "({}, {})", x, y)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

/// A point on the rendering surface, in display units. The y axis grows downward.
#[derive(Clone, Copy, PartialEq, Debug, Default, From, Display, new)]
#[display(fmt = "[{}, {}]", x, y)]
pub struct DisplayPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize, new)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl Default for DisplaySize {
    fn default() -> Self {
        Self::new(360.0, 300.0)
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Default, Display, new)]
#[display(fmt = "y = {} * x + {}", slope, intercept)]
pub struct Weights {
    pub slope: f64,
    pub intercept: f64,
}

impl Weights {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// The fitted line drawn across the horizontal extent of the data.
#[derive(Clone, Copy, PartialEq, Debug, new)]
pub struct PredictionLine {
    pub start: DataPoint,
    pub end: DataPoint,
}

impl PredictionLine {
    pub fn across(x_min: f64, x_max: f64, weights: &Weights) -> Self {
        Self {
            start: DataPoint::new(x_min, weights.predict(x_min)),
            end: DataPoint::new(x_max, weights.predict(x_max)),
        }
    }

    pub fn endpoints(&self) -> [DataPoint; 2] {
        [self.start, self.end]
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct FitState {
    pub is_playing: bool,
    pub current_step: usize,
    pub total_steps: usize,
    pub speed_multiplier: f64,
}

#[cfg(test)]
mod test {
    use super::DataPoint;
    use super::PredictionLine;
    use super::Weights;

    #[test]
    fn prediction_line_follows_weights() {
        let weights = Weights::new(2.0, -1.0);
        let line = PredictionLine::across(-1.0, 3.0, &weights);
        assert_eq!(
            line.endpoints(),
            [DataPoint::new(-1.0, -3.0), DataPoint::new(3.0, 5.0)]
        );
    }

    #[test]
    fn display_formats() {
        assert_eq!(DataPoint::new(1.5, -2.0).to_string(), "(1.5, -2)");
        assert_eq!(Weights::new(0.5, 1.0).to_string(), "y = 0.5 * x + 1");
    }
}
