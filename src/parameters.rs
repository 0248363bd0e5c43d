use std::str::FromStr;

use derive_more::Display;
use derive_more::From;

use crate::error::ParameterError;

pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_POINT_NOISE: f64 = 0.5;
pub const DEFAULT_NOISE_MAX: f64 = 2.0;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum ParameterId {
    #[display(fmt = "learningRate")]
    LearningRate,
    #[display(fmt = "iterations")]
    MaxIterations,
    #[display(fmt = "noise")]
    PointNoise,
}

impl FromStr for ParameterId {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learningRate" => Ok(ParameterId::LearningRate),
            "iterations" | "maxIterations" => Ok(ParameterId::MaxIterations),
            "noise" | "pointNoise" => Ok(ParameterId::PointNoise),
            _ => Err(ParameterError::UnknownId(s.to_owned())),
        }
    }
}

/// Widget hint for the controls layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum ParameterKind {
    #[display(fmt = "number")]
    Number,
    #[display(fmt = "range")]
    Range,
    #[display(fmt = "select")]
    Select,
    #[display(fmt = "checkbox")]
    Checkbox,
}

#[derive(Clone, PartialEq, Debug, From)]
pub enum ParameterValue {
    Number(f64),
    Flag(bool),
    Choice(String),
}

impl ParameterValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<usize> for ParameterValue {
    fn from(v: usize) -> Self {
        ParameterValue::Number(v as f64)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Parameter {
    pub id: ParameterId,
    pub name: &'static str,
    pub kind: ParameterKind,
    pub value: ParameterValue,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub integer: bool,
    pub options: Vec<SelectOption>,
}

impl Parameter {
    fn numeric(
        id: ParameterId,
        name: &'static str,
        kind: ParameterKind,
        value: f64,
        (min, max, step): (f64, f64, f64),
    ) -> Self {
        Self {
            id,
            name,
            kind,
            value: ParameterValue::Number(value),
            min: Some(min),
            max: Some(max),
            step: Some(step),
            integer: false,
            options: Vec::new(),
        }
    }

    /// Stores `value`, clamping numbers into `[min, max]`.
    pub fn set(&mut self, value: ParameterValue) -> Result<(), ParameterError> {
        use ParameterKind::*;
        let value = match (self.kind, value) {
            (Number | Range, ParameterValue::Number(v)) => {
                if v.is_nan() {
                    return Err(ParameterError::NotANumber(self.id));
                }
                let mut v = v.clamp(
                    self.min.unwrap_or(f64::NEG_INFINITY),
                    self.max.unwrap_or(f64::INFINITY),
                );
                if self.integer {
                    v = v.round();
                }
                ParameterValue::Number(v)
            }
            (Checkbox, value @ ParameterValue::Flag(_)) => value,
            (Select, ParameterValue::Choice(choice)) => {
                if !self.options.iter().any(|o| o.value == choice) {
                    return Err(ParameterError::UnknownOption(self.id, choice));
                }
                ParameterValue::Choice(choice)
            }
            _ => {
                return Err(ParameterError::TypeMismatch {
                    id: self.id,
                    expected: self.kind,
                })
            }
        };
        self.value = value;
        Ok(())
    }
}

/// The tunable parameters of one regression session.
#[derive(Clone, PartialEq, Debug)]
pub struct Parameters(Vec<Parameter>);

impl Parameters {
    pub fn linear_regression(noise_max: f64) -> Self {
        let mut iterations = Parameter::numeric(
            ParameterId::MaxIterations,
            "Max Iterations",
            ParameterKind::Number,
            DEFAULT_MAX_ITERATIONS as f64,
            (10.0, 1000.0, 10.0),
        );
        iterations.integer = true;
        let noise_max = noise_max.max(0.0);
        Self(vec![
            Parameter::numeric(
                ParameterId::LearningRate,
                "Learning Rate",
                ParameterKind::Range,
                DEFAULT_LEARNING_RATE,
                (0.001, 0.1, 0.001),
            ),
            iterations,
            Parameter::numeric(
                ParameterId::PointNoise,
                "Point Noise",
                ParameterKind::Range,
                DEFAULT_POINT_NOISE.min(noise_max),
                (0.0, noise_max, 0.1),
            ),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.0.iter()
    }

    pub fn get(&self, id: ParameterId) -> Option<&Parameter> {
        self.0.iter().find(|p| p.id == id)
    }

    pub fn set(&mut self, id: ParameterId, value: ParameterValue) -> Result<(), ParameterError> {
        self.0
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ParameterError::UnknownId(id.to_string()))?
            .set(value)
    }

    fn number(&self, id: ParameterId) -> Option<f64> {
        self.get(id).and_then(|p| p.value.as_number())
    }

    pub fn learning_rate(&self) -> f64 {
        self.number(ParameterId::LearningRate)
            .unwrap_or(DEFAULT_LEARNING_RATE)
    }

    pub fn max_iterations(&self) -> usize {
        self.number(ParameterId::MaxIterations)
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_ITERATIONS)
    }

    pub fn point_noise(&self) -> f64 {
        self.number(ParameterId::PointNoise)
            .unwrap_or(DEFAULT_POINT_NOISE)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::linear_regression(DEFAULT_NOISE_MAX)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum AlgorithmCategory {
    #[display(fmt = "regression")]
    Regression,
    #[display(fmt = "classification")]
    Classification,
    #[display(fmt = "clustering")]
    Clustering,
}

/// Static description of a visualized algorithm.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AlgorithmConfig {
    pub id: &'static str,
    pub name: &'static str,
    pub category: AlgorithmCategory,
    pub description: &'static str,
}

pub const LINEAR_REGRESSION: AlgorithmConfig = AlgorithmConfig {
    id: "linear-regression",
    name: "Linear Regression",
    category: AlgorithmCategory::Regression,
    description: "Find the best fitting line through data points using gradient descent",
};
