//! Right-sizer operator: configuration and the health/metrics HTTP surface

pub mod api;
pub mod config;
