//! # kstack_config
//!
//! Configuration model, validation and naming utilities for kstack.
//!
//! A [`Config`] describes one environment: its identity (name, stage, region,
//! vendor), remote state coordinates, feature flags, network shape and
//! compute shape. Every resource kstack derives is a pure function of it.
//!
//! ## Example
//!
//! ```rust
//! use kstack_config::{ConfigBuilder, ConfigValidator, Environment, Region, Vendor};
//!
//! let config = ConfigBuilder::new()
//!     .with_name("test-vpc")
//!     .with_resource_type("vpc")
//!     .with_environment(Environment::Development)
//!     .with_region(Region::AustraliaEast)
//!     .with_vendor(Vendor::Aws)
//!     .with_terraform_config("test-workspace", "test-org", None)
//!     .build()
//!     .unwrap();
//!
//! ConfigValidator::validate(&config).unwrap();
//! ```

pub mod builder;
pub mod constants;
pub mod enums;
pub mod error;
pub mod loader;
pub mod models;
pub mod naming;
pub mod validator;

pub use builder::ConfigBuilder;
pub use enums::*;
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader};
pub use models::{AwsConfig, Config, KubernetesConfig, NodeSettings, ScalingConfig, Tags};
pub use naming::{
    clean_environment, clean_environment_str, clean_region, clean_region_str, clean_string,
    resource_name,
};
pub use validator::{is_ipv4_cidr, ConfigValidator};
