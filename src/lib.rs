//! Gradient-descent linear regression for interactive plots.
//!
//! [`engine::RegressionEngine`] fits a line to points one batch step at a time,
//! [`coordinates::CoordinateMapper`] translates between the plot surface and data
//! space, and [`session::Session`] runs an engine on a tokio task that auto-steps
//! while playing.

pub mod config;
pub mod coordinates;
pub mod engine;
pub mod error;
pub mod linest;
pub mod parameters;
pub mod schema;
pub mod session;
pub mod throttle;
