//! Configuration data model.
//!
//! [`Config`] is the single source of truth for a build. It is never mutated by
//! the resource builders; when a builder needs a variant (a renamed role, a
//! different tagging layer) it takes a shallow copy with one field overridden.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::DEFAULT_VPC_CIDR_BLOCK;
use crate::enums::{Environment, NodeInstanceFamily, NodeInstanceSize, Region, Vendor};

/// A flat string-to-string tag mapping.
pub type Tags = BTreeMap<String, String>;

/// Environment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub name: String,
    pub resource_type: String,
    pub environment: Environment,
    pub region: Region,
    pub vendor: Vendor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,

    pub terraform_organisation: String,
    pub terraform_workspace: String,
    pub terraform_hostname: String,

    pub enable_encryption: bool,
    pub enable_secrets_manager: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_nat_gateway: Option<bool>,

    #[serde(rename = "vpcCIDRBlock", default, skip_serializing_if = "Option::is_none")]
    pub vpc_cidr_block: Option<String>,
    #[serde(
        rename = "publicSubnetCIDRBlocks",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_subnet_cidr_blocks: Option<Vec<String>>,
    #[serde(
        rename = "privateSubnetCIDRBlocks",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub private_subnet_cidr_blocks: Option<Vec<String>>,

    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Tags>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_config: Option<AwsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesConfig>,
}

impl Config {
    pub fn builder() -> crate::builder::ConfigBuilder {
        crate::builder::ConfigBuilder::new()
    }

    /// Copy of this configuration with `name` replaced.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy of this configuration with `layer` replaced.
    pub fn with_layer(&self, layer: impl Into<String>) -> Self {
        Self {
            layer: Some(layer.into()),
            ..self.clone()
        }
    }

    pub fn vpc_cidr_block_or_default(&self) -> &str {
        self.vpc_cidr_block.as_deref().unwrap_or(DEFAULT_VPC_CIDR_BLOCK)
    }

    pub fn public_subnets(&self) -> &[String] {
        self.public_subnet_cidr_blocks.as_deref().unwrap_or(&[])
    }

    pub fn private_subnets(&self) -> &[String] {
        self.private_subnet_cidr_blocks.as_deref().unwrap_or(&[])
    }

    /// NAT is on unless explicitly switched off.
    pub fn nat_gateway_enabled(&self) -> bool {
        self.enable_nat_gateway != Some(false)
    }

    pub fn aws_account_id(&self) -> Option<&str> {
        self.aws_config.as_ref().map(|c| c.aws_account_id.as_str())
    }

    /// Scalar properties rendered as strings, keyed by their document name.
    ///
    /// Used by the tagging engine, which only keeps the keys it knows about.
    pub fn scalar_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = vec![
            ("name", self.name.clone()),
            ("resourceType", self.resource_type.clone()),
            ("environment", self.environment.as_str().to_string()),
            ("region", self.region.as_str().to_string()),
            ("vendor", self.vendor.as_str().to_string()),
            ("terraformOrganisation", self.terraform_organisation.clone()),
            ("terraformWorkspace", self.terraform_workspace.clone()),
            ("terraformHostname", self.terraform_hostname.clone()),
            ("enableEncryption", self.enable_encryption.to_string()),
            ("enableSecretsManager", self.enable_secrets_manager.to_string()),
        ];
        if let Some(layer) = &self.layer {
            props.push(("layer", layer.clone()));
        }
        if let Some(nat) = self.enable_nat_gateway {
            props.push(("enableNatGateway", nat.to_string()));
        }
        if let Some(cidr) = &self.vpc_cidr_block {
            props.push(("vpcCIDRBlock", cidr.clone()));
        }
        props
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsConfig {
    pub aws_account_id: String,
}

/// Compute shape: the managed cluster and its node pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks_endpoint_public_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks_control_plane_log_types: Option<Vec<String>>,
    /// Add-on name to version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks_add_ons: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub nodes: NodeSettings,
}

/// Per-tier node pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSettings {
    #[serde(default = "default_true")]
    pub enable_private_nodes: bool,
    #[serde(default)]
    pub enable_public_nodes: bool,
    /// Add a spot pool next to the on-demand pool in every enabled tier.
    #[serde(default)]
    pub enable_spot_nodes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_max_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_family: Option<NodeInstanceFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_size: Option<NodeInstanceSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ScalingConfig>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            enable_private_nodes: true,
            enable_public_nodes: false,
            enable_spot_nodes: false,
            spot_max_price: None,
            instance_types: None,
            instance_family: None,
            instance_size: None,
            scaling: None,
        }
    }
}

/// Node group scaling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingConfig {
    pub desired_size: u32,
    pub max_size: u32,
    pub min_size: u32,
}

impl ScalingConfig {
    pub const fn new(desired_size: u32, max_size: u32, min_size: u32) -> Self {
        Self {
            desired_size,
            max_size,
            min_size,
        }
    }

    /// `min <= desired <= max`.
    pub fn is_ordered(&self) -> bool {
        self.min_size <= self.desired_size && self.desired_size <= self.max_size
    }
}

fn default_true() -> bool {
    true
}

/// Accepts a string-keyed mapping of scalars. `null` values are dropped and
/// numbers or booleans are stringified; arrays and objects are rejected.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Option<Tags>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    let mut tags = Tags::new();
    for (key, value) in raw {
        match value {
            Value::Null => continue,
            Value::String(s) => {
                tags.insert(key, s);
            }
            Value::Bool(b) => {
                tags.insert(key, b.to_string());
            }
            Value::Number(n) => {
                tags.insert(key, n.to_string());
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(D::Error::custom(format!(
                    "tags must be an object with string values if provided (key '{}')",
                    key
                )));
            }
        }
    }
    Ok(Some(tags))
}
