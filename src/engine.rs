//! The gradient-descent state machine behind one regression visualization.
//!
//! The engine owns its data points, weights and playback state but not a timer:
//! whoever drives it calls [`RegressionEngine::step`] at
//! [`RegressionEngine::tick_period`] while that returns `Some`.

use std::time::Duration;
use std::time::Instant;

use derive_getters::Getters;
use im::Vector;
use itertools::Itertools;
use itertools::MinMaxResult;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::coordinates::CoordinateRange;
use crate::error::ParameterError;
use crate::linest::Linest;
use crate::linest::LinestResult;
use crate::parameters::AlgorithmConfig;
use crate::parameters::ParameterId;
use crate::parameters::ParameterValue;
use crate::parameters::Parameters;
use crate::parameters::DEFAULT_NOISE_MAX;
use crate::parameters::LINEAR_REGRESSION;
use crate::schema::DataPoint;
use crate::schema::FitState;
use crate::schema::PredictionLine;
use crate::schema::Weights;
use crate::throttle::Throttle;
use crate::throttle::DEFAULT_THROTTLE_INTERVAL;

pub const BASE_TICK_HZ: f64 = 30.0;
pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;
pub const SPEED_INCREMENT: f64 = 0.5;
/// Bounds on the automatic step interval, whatever the configured tick rate.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);
pub const MAX_TICK_PERIOD: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub throttle_interval: Duration,
    pub base_tick_hz: f64,
    pub noise_max: f64,
    /// Points outside this range (after noise) are discarded.
    pub data_range: CoordinateRange,
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
            base_tick_hz: BASE_TICK_HZ,
            noise_max: DEFAULT_NOISE_MAX,
            data_range: CoordinateRange::default(),
            seed: None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepOutcome {
    Advanced,
    /// The iteration cap was reached; playback stopped and the weights were left alone.
    Finished,
    NoData,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum AddPointOutcome {
    Added(DataPoint),
    Throttled,
    OutOfRange(DataPoint),
}

/// Sum of squared-error gradients, averaged: `(d/dslope, d/dintercept)`.
pub fn mse_gradient<'a>(
    points: impl IntoIterator<Item = &'a DataPoint>,
    weights: &Weights,
) -> Option<(f64, f64)> {
    let (n, m_grad, b_grad) = points.into_iter().fold((0usize, 0.0, 0.0), |(n, m, b), p| {
        let error = weights.predict(p.x) - p.y;
        (n + 1, m + error * p.x, b + error)
    });
    (n > 0).then(|| {
        let scale = 2.0 / n as f64;
        (scale * m_grad, scale * b_grad)
    })
}

pub fn mean_squared_error<'a>(
    points: impl IntoIterator<Item = &'a DataPoint>,
    weights: &Weights,
) -> Option<f64> {
    let (n, sum) = points.into_iter().fold((0usize, 0.0), |(n, sum), p| {
        let error = weights.predict(p.x) - p.y;
        (n + 1, sum + error * error)
    });
    (n > 0).then(|| sum / n as f64)
}

/// Nearest multiple of [`SPEED_INCREMENT`] within `[MIN_SPEED, MAX_SPEED]`.
pub fn clamp_speed(multiplier: f64) -> f64 {
    ((multiplier / SPEED_INCREMENT).round() * SPEED_INCREMENT).clamp(MIN_SPEED, MAX_SPEED)
}

/// `1 / rate_hz`, clamped to `[MIN_TICK_PERIOD, MAX_TICK_PERIOD]`.
fn tick_period_at(rate_hz: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .unwrap_or(MAX_TICK_PERIOD)
        .clamp(MIN_TICK_PERIOD, MAX_TICK_PERIOD)
}

pub struct RegressionEngine {
    points: Vector<DataPoint>,
    weights: Weights,
    playing: bool,
    current_step: usize,
    speed: f64,
    parameters: Parameters,
    loss_history: Vector<f64>,
    linest: Linest,
    throttle: Throttle,
    data_range: CoordinateRange,
    base_tick_hz: f64,
    rng: StdRng,
}

impl Default for RegressionEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl RegressionEngine {
    pub fn new(settings: EngineSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let base_tick_hz = if settings.base_tick_hz.is_finite() && settings.base_tick_hz > 0.0 {
            settings.base_tick_hz
        } else {
            log::warn!(
                "Ignoring tick rate {}, using {} Hz",
                settings.base_tick_hz,
                BASE_TICK_HZ
            );
            BASE_TICK_HZ
        };
        if tick_period_at(base_tick_hz * MIN_SPEED) == MAX_TICK_PERIOD
            || tick_period_at(base_tick_hz * MAX_SPEED) == MIN_TICK_PERIOD
        {
            log::warn!(
                "Tick rate {} Hz will be limited to one step per {:?}..{:?}",
                base_tick_hz,
                MIN_TICK_PERIOD,
                MAX_TICK_PERIOD
            );
        }
        RegressionEngine {
            points: Vector::new(),
            weights: Weights::zero(),
            playing: false,
            current_step: 0,
            speed: 1.0,
            parameters: Parameters::linear_regression(settings.noise_max),
            loss_history: Vector::new(),
            linest: Linest::default(),
            throttle: Throttle::new(settings.throttle_interval),
            data_range: settings.data_range,
            base_tick_hz,
            rng,
        }
    }

    pub fn points(&self) -> &Vector<DataPoint> {
        &self.points
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn play(&mut self) {
        if !self.playing {
            log::debug!("Playing from step {}", self.current_step);
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        if self.playing {
            log::debug!("Paused at step {}", self.current_step);
            self.playing = false;
        }
    }

    /// Stops playback and forgets the fit. Data points are kept.
    pub fn reset(&mut self) {
        self.playing = false;
        self.clear_fit();
    }

    fn clear_fit(&mut self) {
        self.weights = Weights::zero();
        self.current_step = 0;
        self.loss_history.clear();
    }

    /// One batch gradient-descent update over all points.
    pub fn step(&mut self) -> StepOutcome {
        let Some((m_grad, b_grad)) = mse_gradient(&self.points, &self.weights) else {
            return StepOutcome::NoData;
        };
        if self.current_step >= self.parameters.max_iterations() {
            if self.playing {
                log::info!("Reached {} iterations with {}", self.current_step, self.weights);
                self.playing = false;
            }
            return StepOutcome::Finished;
        }

        let learning_rate = self.parameters.learning_rate();
        self.weights = Weights::new(
            self.weights.slope - learning_rate * m_grad,
            self.weights.intercept - learning_rate * b_grad,
        );
        self.current_step += 1;
        if let Some(loss) = mean_squared_error(&self.points, &self.weights) {
            self.loss_history.push_back(loss);
        }
        log::trace!("Step {}: {}", self.current_step, self.weights);
        StepOutcome::Advanced
    }

    pub fn set_speed(&mut self, multiplier: f64) {
        if multiplier.is_nan() {
            log::warn!("Ignoring NaN speed");
            return;
        }
        self.speed = clamp_speed(multiplier);
    }

    /// Updates a parameter, then resets the fit and stops playback.
    pub fn set_parameter(
        &mut self,
        id: ParameterId,
        value: ParameterValue,
    ) -> Result<(), ParameterError> {
        let res = self.parameters.set(id, value);
        // Reset even when the value was rejected.
        self.reset();
        res
    }

    /// Stores a point after throttling and perturbing it with the configured noise.
    ///
    /// A point added while playing restarts the fit without stopping playback.
    pub fn add_point(&mut self, point: DataPoint, now: Instant) -> AddPointOutcome {
        if !self.throttle.is_open(now) {
            log::trace!("Throttled point {}", point);
            return AddPointOutcome::Throttled;
        }
        let noise = self.parameters.point_noise();
        let point = if noise > 0.0 {
            DataPoint::new(point.x, point.y + (self.rng.gen::<f64>() - 0.5) * noise)
        } else {
            point
        };
        if !(self.data_range.contains(point.x) && self.data_range.contains(point.y)) {
            log::debug!("Discarded point {} outside the data range", point);
            return AddPointOutcome::OutOfRange(point);
        }

        self.throttle.mark(now);
        self.points.push_back(point);
        self.linest.push(&point);
        if self.playing {
            self.clear_fit();
        }
        AddPointOutcome::Added(point)
    }

    pub fn prediction_line(&self) -> Option<PredictionLine> {
        match self.points.iter().map(|p| p.x).minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(x) => Some(PredictionLine::across(x, x, &self.weights)),
            MinMaxResult::MinMax(min, max) => {
                Some(PredictionLine::across(min, max, &self.weights))
            }
        }
    }

    pub fn least_squares(&self) -> Option<LinestResult> {
        self.linest.estimate()
    }

    pub fn fit_state(&self) -> FitState {
        FitState {
            is_playing: self.playing,
            current_step: self.current_step,
            total_steps: self.parameters.max_iterations(),
            speed_multiplier: self.speed,
        }
    }

    /// Interval between automatic steps, or `None` when nothing should be scheduled.
    pub fn tick_period(&self) -> Option<Duration> {
        (self.playing && !self.points.is_empty())
            .then(|| tick_period_at(self.base_tick_hz * self.speed))
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            algorithm: LINEAR_REGRESSION,
            points: self.points.clone(),
            weights: self.weights,
            prediction_line: self.prediction_line(),
            fit_state: self.fit_state(),
            parameters: self.parameters.clone(),
            loss_history: self.loss_history.clone(),
            least_squares: self.least_squares(),
        }
    }
}

/// Everything a renderer needs, detached from the engine.
#[derive(Clone, Debug, Getters)]
pub struct EngineSnapshot {
    algorithm: AlgorithmConfig,
    points: Vector<DataPoint>,
    weights: Weights,
    prediction_line: Option<PredictionLine>,
    fit_state: FitState,
    parameters: Parameters,
    loss_history: Vector<f64>,
    least_squares: Option<LinestResult>,
}
