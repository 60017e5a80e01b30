//! Fluent construction of a [`Config`].

use std::collections::BTreeMap;

use crate::constants::{DEFAULT_TERRAFORM_HOSTNAME, DEFAULT_VPC_CIDR_BLOCK};
use crate::enums::{Environment, Region, Vendor};
use crate::error::{ConfigError, ConfigResult};
use crate::models::{AwsConfig, Config, KubernetesConfig, NodeSettings, Tags};

/// Builder for [`Config`].
///
/// Fields that are not set fall back to the service defaults. Only the
/// terraform workspace and organisation are mandatory at build time; the rest
/// is checked by [`crate::ConfigValidator`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    name: Option<String>,
    resource_type: Option<String>,
    environment: Option<Environment>,
    region: Option<Region>,
    vendor: Option<Vendor>,
    layer: Option<String>,
    terraform_organisation: Option<String>,
    terraform_workspace: Option<String>,
    terraform_hostname: Option<String>,
    enable_encryption: Option<bool>,
    enable_secrets_manager: Option<bool>,
    enable_nat_gateway: Option<bool>,
    vpc_cidr_block: Option<String>,
    public_subnet_cidr_blocks: Option<Vec<String>>,
    private_subnet_cidr_blocks: Option<Vec<String>>,
    tags: Option<Tags>,
    aws_account_id: Option<String>,
    kubernetes: Option<KubernetesConfig>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = Some(vendor);
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Set the remote state coordinates. A missing hostname falls back to
    /// [`DEFAULT_TERRAFORM_HOSTNAME`].
    pub fn with_terraform_config(
        mut self,
        workspace: impl Into<String>,
        organisation: impl Into<String>,
        hostname: Option<String>,
    ) -> Self {
        self.terraform_workspace = Some(workspace.into());
        self.terraform_organisation = Some(organisation.into());
        self.terraform_hostname = hostname;
        self
    }

    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.enable_encryption = Some(enabled);
        self
    }

    pub fn with_secrets_manager(mut self, enabled: bool) -> Self {
        self.enable_secrets_manager = Some(enabled);
        self
    }

    pub fn with_nat_gateway(mut self, enabled: bool) -> Self {
        self.enable_nat_gateway = Some(enabled);
        self
    }

    pub fn with_cidr_block(mut self, cidr: impl Into<String>) -> Self {
        self.vpc_cidr_block = Some(cidr.into());
        self
    }

    pub fn with_public_subnet_cidr_blocks<I, S>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_subnet_cidr_blocks = Some(blocks.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_private_subnet_cidr_blocks<I, S>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.private_subnet_cidr_blocks = Some(blocks.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_aws_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.aws_account_id = Some(account_id.into());
        self
    }

    pub fn with_kubernetes(mut self, kubernetes: KubernetesConfig) -> Self {
        self.kubernetes = Some(kubernetes);
        self
    }

    pub fn with_node_settings(mut self, nodes: NodeSettings) -> Self {
        self.kubernetes.get_or_insert_with(KubernetesConfig::default).nodes = nodes;
        self
    }

    pub fn with_eks_version(mut self, version: impl Into<String>) -> Self {
        self.kubernetes
            .get_or_insert_with(KubernetesConfig::default)
            .eks_version = Some(version.into());
        self
    }

    pub fn with_eks_endpoint_public_access(mut self, public: bool) -> Self {
        self.kubernetes
            .get_or_insert_with(KubernetesConfig::default)
            .eks_endpoint_public_access = Some(public);
        self
    }

    pub fn with_eks_control_plane_log_types(mut self, log_types: Vec<String>) -> Self {
        self.kubernetes
            .get_or_insert_with(KubernetesConfig::default)
            .eks_control_plane_log_types = Some(log_types);
        self
    }

    pub fn with_eks_add_ons(mut self, add_ons: BTreeMap<String, String>) -> Self {
        self.kubernetes
            .get_or_insert_with(KubernetesConfig::default)
            .eks_add_ons = Some(add_ons);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ConfigResult<Config> {
        let (Some(workspace), Some(organisation)) =
            (self.terraform_workspace, self.terraform_organisation)
        else {
            return Err(ConfigError::MissingTerraformCoordinates);
        };
        if workspace.is_empty() || organisation.is_empty() {
            return Err(ConfigError::MissingTerraformCoordinates);
        }

        Ok(Config {
            name: self.name.unwrap_or_default(),
            resource_type: self.resource_type.unwrap_or_default(),
            environment: self.environment.unwrap_or_default(),
            region: self.region.unwrap_or_default(),
            vendor: self.vendor.unwrap_or_default(),
            layer: self.layer,
            terraform_organisation: organisation,
            terraform_workspace: workspace,
            terraform_hostname: self
                .terraform_hostname
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEFAULT_TERRAFORM_HOSTNAME.to_string()),
            enable_encryption: self.enable_encryption.unwrap_or(true),
            enable_secrets_manager: self.enable_secrets_manager.unwrap_or(true),
            enable_nat_gateway: Some(self.enable_nat_gateway.unwrap_or(false)),
            vpc_cidr_block: Some(
                self.vpc_cidr_block
                    .unwrap_or_else(|| DEFAULT_VPC_CIDR_BLOCK.to_string()),
            ),
            public_subnet_cidr_blocks: self.public_subnet_cidr_blocks,
            private_subnet_cidr_blocks: self.private_subnet_cidr_blocks,
            tags: self.tags,
            aws_config: self
                .aws_account_id
                .map(|aws_account_id| AwsConfig { aws_account_id }),
            kubernetes: self.kubernetes,
        })
    }
}
