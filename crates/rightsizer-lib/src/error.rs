//! Error types for the right-sizer

use crate::models::ResourceDimension;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration, rejected once at load time
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("upper threshold ({upper}%) must be greater than lower threshold ({lower}%)")]
    ThresholdOrder { upper: f64, lower: f64 },

    #[error("threshold {0}% is out of range")]
    ThresholdRange(f64),

    #[error("{dimension} minimum ({min}) exceeds maximum ({max})")]
    Bounds {
        dimension: ResourceDimension,
        min: u64,
        max: u64,
    },

    #[error("step multiplier must be positive, got {0}")]
    StepMultiplier(f64),

    #[error("{0} must be at least 1")]
    ZeroSize(&'static str),

    #[error("apply timeout must be non-zero")]
    ZeroTimeout,
}

/// Unparseable Kubernetes resource quantity
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QuantityError {
    #[error("Unable to parse the quantity: {0}")]
    QuantityParsing(String),

    #[error("Unknown quantity suffix '{0}'")]
    UnknownSuffix(String),

    #[error("Quantity {0} is out of range")]
    OutOfRange(String),
}

/// Failure reported by the workload runtime for one apply attempt
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    /// The runtime structurally refuses the listed dimensions (e.g. an
    /// in-place decrease); the remaining dimensions may be retried alone.
    #[error("rejected {dimensions:?}: {reason}")]
    Rejected {
        dimensions: Vec<ResourceDimension>,
        reason: String,
    },

    #[error("apply failed: {0}")]
    Failed(String),

    #[error("apply timed out after {0:?}")]
    Timeout(Duration),
}

/// Cycle-level failure, reported upward only when a whole cycle is unusable
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("could not list target containers: {0}")]
    TargetsUnavailable(String),

    #[error("no usage samples obtained for any of {targets} tracked containers")]
    NoSamples { targets: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::ThresholdOrder {
            upper: 30.0,
            lower: 80.0,
        };
        assert!(err.to_string().contains("must be greater than"));

        let err = RuntimeError::Rejected {
            dimensions: vec![ResourceDimension::Memory],
            reason: "memory cannot be decreased".to_string(),
        };
        assert!(err.to_string().contains("Memory"));

        let err = CycleError::NoSamples { targets: 4 };
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn test_timeout_display() {
        let err = RuntimeError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "apply timed out after 5s");
    }
}
