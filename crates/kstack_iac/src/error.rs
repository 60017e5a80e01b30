//! Error types for resource composition.

use kstack_config::{ConfigError, Environment, Vendor};
use thiserror::Error;

/// Result type alias for composition operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors raised while deriving resources from a configuration.
///
/// None of these are retryable: the caller fixes the input and rebuilds.
#[derive(Error, Debug)]
pub enum IacError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    TagResolution(String),

    #[error("EksNodeGroup: {field} is required")]
    NodeGroupArgument { field: &'static str },

    #[error("Invalid scaling for node group {name}: min {min} <= desired {desired} <= max {max} does not hold")]
    InvalidScaling {
        name: String,
        desired: u32,
        max: u32,
        min: u32,
    },

    #[error("Unsupported vendor: {0}. Only AWS is supported.")]
    UnsupportedVendor(Vendor),

    #[error("Unsupported environment for stack composition: {0}")]
    UnsupportedEnvironment(Environment),

    #[error("Unknown subnet: {0}")]
    UnknownSubnet(String),

    #[error("Node group subnets must share one tier, found both public and private")]
    MixedSubnetTiers,

    #[error("Node pool requested for the {0} tier but the network has no {0} subnets")]
    MissingSubnetTier(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
