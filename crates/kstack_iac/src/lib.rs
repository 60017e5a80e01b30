//! # kstack_iac
//!
//! Resource graph composition for kstack.
//!
//! Given a validated [`kstack_config::Config`], this crate derives every
//! resource of an environment as a [`ResourceDescriptor`] with a stable
//! logical id and a fully resolved tag set. Nothing is provisioned here; a
//! backend consumes the resulting [`StackManifest`].
//!
//! ## Features
//!
//! - Layered tag resolution with a computed `Name` tag
//! - Network topology driven by subnet CIDR lists and the NAT flag
//! - KMS, Secrets Manager and IAM role descriptors
//! - EKS cluster and node groups with derived labels, taints and placement
//! - Per-environment stack composition
//!
//! ## Example
//!
//! ```rust
//! use kstack_config::{ConfigBuilder, Environment, Region, Vendor};
//! use kstack_iac::{compose, StackManifest, StackSpec};
//!
//! let config = ConfigBuilder::new()
//!     .with_name("movies")
//!     .with_resource_type("stack")
//!     .with_environment(Environment::Development)
//!     .with_region(Region::AustraliaEast)
//!     .with_vendor(Vendor::Aws)
//!     .with_terraform_config("movies-development", "acme", None)
//!     .with_public_subnet_cidr_blocks(["10.0.101.0/24"])
//!     .build()
//!     .unwrap();
//!
//! let spec = StackSpec::for_environment(config.environment).unwrap();
//! let stack = compose(&spec, &config, "movies-development").unwrap();
//! let manifest = StackManifest::from_stack(&stack);
//! println!("{}", manifest.to_json().unwrap());
//! ```

pub mod cluster;
pub mod error;
pub mod manifest;
pub mod network;
pub mod nodegroup;
pub mod resource;
pub mod security;
pub mod stack;
pub mod tagging;
pub mod vendor;

pub use cluster::{EksCluster, EksClusterBuilder};
pub use error::{IacError, IacResult};
pub use manifest::{ManifestFormat, RemoteBackend, StackManifest};
pub use network::{NetworkBuilder, NetworkTopology, Subnet, SubnetTier};
pub use nodegroup::{
    provision, NodeAttributes, NodeGroup, NodeGroupOptions, NodeGroupPlan, NodeGroupRequest,
    ScalingOverrides, Taint, COMPONENT_DEFAULT_SCALING, DEFAULT_NODE_GROUP_SCALING,
};
pub use resource::{OutputDescriptor, ResourceDescriptor, ResourceKind, ResourceRef, TagSet};
pub use security::{IamRole, IamRoleBuilder, KmsBuilder, KmsKey, SecretSpec, Secrets, SecretsBuilder};
pub use stack::{compose, Compute, SecretsProvider, Stack, StackKind, StackSpec};
pub use tagging::{tags, TagResolver, BASE_TAG_KEYS};
pub use vendor::{availability_zone, aws_region};
