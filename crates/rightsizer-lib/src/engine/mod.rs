//! Scaling decision engine
//!
//! Turns per-container usage samples into bounded, hysteresis-safe
//! CPU and memory decisions:
//! - threshold classification with strict-direction targets
//! - clamping to policy bounds
//! - per-(container, dimension) cooldown

mod cooldown;
mod decision;


pub use cooldown::CooldownTracker;
pub use decision::{classify_dimension, DecisionEngine};
