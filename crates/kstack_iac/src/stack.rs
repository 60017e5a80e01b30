//! Stack composition.
//!
//! [`compose`] runs the build steps in a fixed order: provider, network,
//! security, compute, outputs. What differs between environments is carried
//! by a [`StackSpec`] value rather than by separate stack types.

use std::fmt;

use kstack_config::{Config, ConfigValidator, Environment, NodeCapacityType, NodeNetwork, Tags};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::cluster::{EksCluster, EksClusterBuilder};
use crate::error::{IacError, IacResult};
use crate::network::{NetworkBuilder, NetworkTopology, SubnetTier};
use crate::nodegroup::{
    NodeAttributes, NodeGroup, NodeGroupOptions, NodeGroupPlan, NodeGroupRequest,
    DEFAULT_NODE_GROUP_SCALING,
};
use crate::resource::{OutputDescriptor, ResourceDescriptor, ResourceKind};
use crate::security::{
    assume_role_policy, IamRole, IamRoleBuilder, KmsBuilder, KmsKey, SecretSpec, Secrets,
    SecretsBuilder, EKS_CLUSTER_POLICY_ARNS, EKS_NODE_POLICY_ARNS,
};
use crate::tagging::TagResolver;
use crate::vendor::aws_region;

/// Supplies the secrets a stack stores.
pub type SecretsProvider = fn(&Config) -> Vec<SecretSpec>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackKind {
    Development,
    Production,
}

impl StackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackKind::Development => "development",
            StackKind::Production => "production",
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const MOVIE_SERVICE_SECRETS: &str = "movie-service-secrets";
const MOVIE_SERVICE_API_KEY: &str = "abcd-efgh-1234-5678";

fn movie_service_secret(description: &str) -> SecretSpec {
    SecretSpec::new(MOVIE_SERVICE_SECRETS)
        .with_description(description)
        .with_secret_string(json!({ "apiKey": MOVIE_SERVICE_API_KEY }).to_string())
}

fn development_secrets(_config: &Config) -> Vec<SecretSpec> {
    vec![movie_service_secret("API key for movie API services (development)")]
}

fn production_secrets(_config: &Config) -> Vec<SecretSpec> {
    vec![movie_service_secret("API key for movie API services (production)")]
}

/// Per-environment composition strategy.
#[derive(Clone)]
pub struct StackSpec {
    pub kind: StackKind,
    pub description: String,
    pub secrets: SecretsProvider,
}

impl fmt::Debug for StackSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackSpec")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl StackSpec {
    pub fn development() -> Self {
        Self {
            kind: StackKind::Development,
            description: "Development infrastructure stack".to_string(),
            secrets: development_secrets,
        }
    }

    pub fn production() -> Self {
        Self {
            kind: StackKind::Production,
            description: "Production infrastructure stack".to_string(),
            secrets: production_secrets,
        }
    }

    /// Strategy for `environment`. Only development and production stacks
    /// exist.
    pub fn for_environment(environment: Environment) -> IacResult<Self> {
        match environment {
            Environment::Development => Ok(Self::development()),
            Environment::Production => Ok(Self::production()),
            other => Err(IacError::UnsupportedEnvironment(other)),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_secrets(mut self, secrets: SecretsProvider) -> Self {
        self.secrets = secrets;
        self
    }
}

/// Cluster, roles and node groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compute {
    pub cluster_role: IamRole,
    pub node_role: IamRole,
    pub cluster: EksCluster,
    pub node_groups: Vec<NodeGroup>,
}

impl Compute {
    pub fn resources(&self) -> Vec<&ResourceDescriptor> {
        let mut resources = vec![&self.cluster_role.descriptor, &self.node_role.descriptor];
        resources.extend(self.cluster.resources());
        for group in &self.node_groups {
            resources.extend(group.resources());
        }
        resources
    }
}

/// A composed stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    pub kind: StackKind,
    pub description: String,
    pub config: Config,
    pub provider: ResourceDescriptor,
    pub network: NetworkTopology,
    pub kms: Option<KmsKey>,
    pub secrets: Option<Secrets>,
    pub compute: Option<Compute>,
    pub outputs: Vec<OutputDescriptor>,
}

impl Stack {
    pub fn vpc(&self) -> &ResourceDescriptor {
        &self.network.vpc
    }

    pub fn kms(&self) -> Option<&KmsKey> {
        self.kms.as_ref()
    }

    pub fn secrets(&self) -> Option<&Secrets> {
        self.secrets.as_ref()
    }

    pub fn cluster(&self) -> Option<&EksCluster> {
        self.compute.as_ref().map(|c| &c.cluster)
    }

    pub fn node_groups(&self) -> &[NodeGroup] {
        self.compute
            .as_ref()
            .map(|c| c.node_groups.as_slice())
            .unwrap_or(&[])
    }

    pub fn output(&self, name: &str) -> Option<&OutputDescriptor> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Every descriptor in build order.
    pub fn resources(&self) -> Vec<&ResourceDescriptor> {
        let mut resources = vec![&self.provider];
        resources.extend(self.network.resources());
        if let Some(kms) = &self.kms {
            resources.push(&kms.key);
            resources.push(&kms.alias);
        }
        if let Some(secrets) = &self.secrets {
            resources.extend(secrets.resources());
        }
        if let Some(compute) = &self.compute {
            resources.extend(compute.resources());
        }
        resources
    }
}

/// Compose the stack described by `spec` for `config`.
pub fn compose(spec: &StackSpec, config: &Config, stack_name: &str) -> IacResult<Stack> {
    ConfigValidator::validate(config)?;
    info!("Composing {} stack {}", spec.kind, stack_name);

    let provider = build_provider(config)?;

    info!("Step: network");
    let network = NetworkBuilder::new(config).build()?;

    info!("Step: security");
    let kms = if config.enable_encryption {
        Some(
            KmsBuilder::new(config)
                .with_description(format!("KMS key for encryption in {}", config.environment))
                .build()?,
        )
    } else {
        None
    };
    let secrets = if config.enable_secrets_manager {
        let specs = (spec.secrets)(config);
        Some(
            SecretsBuilder::new(config, specs)
                .with_kms_key_id(kms.as_ref().map(KmsKey::id))
                .build()?,
        )
    } else {
        None
    };

    let compute = if config.kubernetes.is_some() {
        info!("Step: compute");
        Some(build_compute(config, &network)?)
    } else {
        None
    };

    info!("Step: outputs");
    let outputs = build_outputs(stack_name, config, &network, kms.as_ref(), secrets.as_ref(), compute.as_ref());

    let stack = Stack {
        name: stack_name.to_string(),
        kind: spec.kind,
        description: spec.description.clone(),
        config: config.clone(),
        provider,
        network,
        kms,
        secrets,
        compute,
        outputs,
    };
    info!("Stack {} composed: {} resources", stack_name, stack.resources().len());
    Ok(stack)
}

fn build_provider(config: &Config) -> IacResult<ResourceDescriptor> {
    let region = aws_region(config.vendor, config.region)?;
    let default_tags = TagResolver::for_config(config.clone()).resolve(&Tags::new())?;

    Ok(ResourceDescriptor::new(ResourceKind::Provider, "aws")
        .attr("region", region)
        .attr(
            "default_tags",
            json!([{ "tags": serde_json::to_value(&default_tags)? }]),
        ))
}

fn build_compute(config: &Config, network: &NetworkTopology) -> IacResult<Compute> {
    let kubernetes = config.kubernetes.clone().unwrap_or_default();
    let nodes = &kubernetes.nodes;

    let cluster_role = IamRoleBuilder::new(
        &config.with_name(format!("{}-cluster", config.name)),
        "cluster-role",
        assume_role_policy("eks.amazonaws.com"),
    )
    .with_managed_policy_arns(EKS_CLUSTER_POLICY_ARNS)
    .build()?;
    let node_role = IamRoleBuilder::new(
        &config.with_name(format!("{}-node", config.name)),
        "node-role",
        assume_role_policy("ec2.amazonaws.com"),
    )
    .with_managed_policy_arns(EKS_NODE_POLICY_ARNS)
    .build()?;

    let cluster_tier = if network.private_subnets.is_empty() {
        SubnetTier::Public
    } else {
        SubnetTier::Private
    };
    let cluster = EksClusterBuilder::new(config, network.vpc.id())
        .with_subnet_ids(network.subnet_ids(cluster_tier))
        .with_role_arn(cluster_role.arn())
        .build()?;

    let mut tiers = Vec::new();
    if nodes.enable_private_nodes {
        tiers.push(SubnetTier::Private);
    }
    if nodes.enable_public_nodes {
        tiers.push(SubnetTier::Public);
    }
    let mut capacities = vec![NodeCapacityType::OnDemand];
    if nodes.enable_spot_nodes {
        capacities.push(NodeCapacityType::Spot);
    }
    if tiers.is_empty() {
        warn!("Kubernetes is configured but no node tier is enabled");
    }

    let scaling = nodes.scaling.unwrap_or(DEFAULT_NODE_GROUP_SCALING);
    let mut plan = NodeGroupPlan::new();
    for tier in tiers {
        let subnet_ids = network.subnet_ids(tier);
        if subnet_ids.is_empty() {
            return Err(IacError::MissingSubnetTier(tier.as_str()));
        }
        let request = NodeGroupRequest {
            cluster_name: cluster.name(),
            cluster_arn: cluster.arn(),
            node_role_arn: node_role.arn(),
            subnet_ids,
        };
        let (network_attr, tier_config) = match tier {
            SubnetTier::Private => (NodeNetwork::Private, config.clone()),
            SubnetTier::Public => (NodeNetwork::Public, config.with_name(format!("{}-pub", config.name))),
        };

        for capacity in &capacities {
            let attributes = NodeAttributes {
                network: Some(network_attr),
                capacity_type: Some(*capacity),
                instance_family: nodes.instance_family,
                instance_size: nodes.instance_size,
            };
            let mut options = NodeGroupOptions::from_attributes(attributes).with_scaling(scaling);
            if let Some(types) = &nodes.instance_types {
                options = options.with_instance_types(types.clone());
            }
            if *capacity == NodeCapacityType::Spot {
                options = options.with_max_price(nodes.spot_max_price.clone());
            }
            plan = plan.add(&tier_config, network, &request, &options)?;
        }
    }

    Ok(Compute {
        cluster_role,
        node_role,
        cluster,
        node_groups: plan.into_node_groups(),
    })
}

fn build_outputs(
    stack_name: &str,
    config: &Config,
    network: &NetworkTopology,
    kms: Option<&KmsKey>,
    secrets: Option<&Secrets>,
    compute: Option<&Compute>,
) -> Vec<OutputDescriptor> {
    let mut outputs = vec![
        OutputDescriptor::new("stack_name", stack_name, "Name of the Terraform stack"),
        OutputDescriptor::new("environment", config.environment.as_str(), "Deployment environment"),
    ];
    outputs.extend(network.outputs.iter().cloned());

    if let Some(kms) = kms {
        outputs.push(OutputDescriptor::new(
            "secrets_kms_key_arn",
            kms.arn(),
            "ARN of the KMS key used for secrets encryption",
        ));
    }
    if let Some(secrets) = secrets {
        outputs.push(OutputDescriptor::new(
            "secrets_arns",
            secrets.arns(),
            "ARNs of the created secrets",
        ));
    }
    if let Some(compute) = compute {
        outputs.push(OutputDescriptor::new("cluster_name", compute.cluster.name(), "Name of the EKS cluster"));
        outputs.push(OutputDescriptor::new("cluster_arn", compute.cluster.arn(), "ARN of the EKS cluster"));
        outputs.push(OutputDescriptor::new(
            "cluster_endpoint",
            compute.cluster.endpoint(),
            "Endpoint of the EKS cluster",
        ));
        outputs.push(OutputDescriptor::new(
            "node_group_arns",
            compute.node_groups.iter().map(NodeGroup::arn).collect::<Vec<_>>(),
            "ARNs of the EKS node groups",
        ));
    }
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstack_config::constants::{
        DEFAULT_VPC_PRIVATE_SUBNET_CIDR_BLOCKS, DEFAULT_VPC_PUBLIC_SUBNET_CIDR_BLOCKS,
    };
    use crate::nodegroup::{LABEL_CAPACITY_TYPE, TAINT_EFFECT};
    use kstack_config::{
        ConfigBuilder, NodeInstanceFamily, NodeInstanceSize, NodeSettings, Region, ScalingConfig,
        Vendor,
    };

    fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
            .with_name("movies")
            .with_resource_type("stack")
            .with_environment(Environment::Development)
            .with_region(Region::AustraliaEast)
            .with_vendor(Vendor::Aws)
            .with_terraform_config("movies-development", "org", None)
            .with_aws_account_id("123456789012")
            .with_public_subnet_cidr_blocks(DEFAULT_VPC_PUBLIC_SUBNET_CIDR_BLOCKS)
            .with_private_subnet_cidr_blocks(DEFAULT_VPC_PRIVATE_SUBNET_CIDR_BLOCKS)
    }

    #[test]
    fn test_spec_selection() {
        assert_eq!(StackSpec::for_environment(Environment::Development).unwrap().kind, StackKind::Development);
        assert_eq!(StackSpec::for_environment(Environment::Production).unwrap().kind, StackKind::Production);
        assert!(matches!(
            StackSpec::for_environment(Environment::Staging),
            Err(IacError::UnsupportedEnvironment(Environment::Staging))
        ));
    }

    #[test]
    fn test_secrets_come_from_spec() {
        let config = builder().build().unwrap();
        let dev = (StackSpec::development().secrets)(&config);
        let prod = (StackSpec::production().secrets)(&config);
        assert_eq!(dev[0].name, MOVIE_SERVICE_SECRETS);
        assert!(dev[0].description.as_deref().unwrap().contains("development"));
        assert!(prod[0].description.as_deref().unwrap().contains("production"));

        fn no_secrets(_: &Config) -> Vec<SecretSpec> {
            Vec::new()
        }
        let stack = compose(&StackSpec::development().with_secrets(no_secrets), &config, "movies").unwrap();
        assert!(stack.secrets().unwrap().is_empty());
    }

    #[test]
    fn test_compose_without_kubernetes() {
        let config = builder().build().unwrap();
        let stack = compose(&StackSpec::development(), &config, "movies-development").unwrap();

        assert!(stack.compute.is_none());
        assert!(stack.kms().is_some());
        assert_eq!(stack.secrets().unwrap().len(), 1);
        assert_eq!(
            *stack.secrets().unwrap().secrets[0].attribute("kms_key_id").unwrap(),
            "${aws_kms_key.kms-key.id}"
        );
        assert_eq!(*stack.provider.attribute("region").unwrap(), "ap-southeast-2");
        assert!(stack.output("secrets_kms_key_arn").is_some());
        assert!(stack.output("cluster_name").is_none());
        assert_eq!(stack.output("stack_name").unwrap().value, "movies-development");
    }

    #[test]
    fn test_flags_disable_security_primitives() {
        let config = builder()
            .with_encryption(false)
            .with_secrets_manager(false)
            .build()
            .unwrap();
        let stack = compose(&StackSpec::development(), &config, "movies").unwrap();
        assert!(stack.kms().is_none());
        assert!(stack.secrets().is_none());
        assert!(stack.output("secrets_arns").is_none());
    }

    #[test]
    fn test_orchestrator_default_scaling() {
        let config = builder().with_node_settings(NodeSettings::default()).build().unwrap();
        let stack = compose(&StackSpec::development(), &config, "movies").unwrap();

        let groups = stack.node_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].scaling, ScalingConfig::new(1, 2, 1));
        assert_eq!(groups[0].logical_id(), "movies-ON_DEMAND-nodegroup-0");
        assert_eq!(
            groups[0].availability_zones,
            vec!["ap-southeast-2a", "ap-southeast-2b", "ap-southeast-2c"]
        );
        assert_eq!(groups[0].tier, SubnetTier::Private);
        // network and capacity type
        assert_eq!(groups[0].labels.len(), 2);
        assert_eq!(groups[0].taints.len(), 2);
    }

    #[test]
    fn test_spot_and_public_node_groups() {
        let nodes = NodeSettings {
            enable_public_nodes: true,
            enable_spot_nodes: true,
            spot_max_price: Some("0.05".to_string()),
            ..NodeSettings::default()
        };
        let config = builder().with_node_settings(nodes).build().unwrap();
        let stack = compose(&StackSpec::development(), &config, "movies").unwrap();

        let ids: Vec<&str> = stack.node_groups().iter().map(NodeGroup::logical_id).collect();
        assert_eq!(
            ids,
            vec![
                "movies-ON_DEMAND-nodegroup-0",
                "movies-SPOT-nodegroup-1",
                "movies-pub-ON_DEMAND-nodegroup-2",
                "movies-pub-SPOT-nodegroup-3",
            ]
        );
        let spot = &stack.node_groups()[1];
        assert_eq!(*spot.node_group.attribute("max_price").unwrap(), "0.05");
        assert!(stack.node_groups()[0].node_group.attribute("max_price").is_none());
        assert_eq!(stack.node_groups()[2].tier, SubnetTier::Public);

        let names: Vec<&str> = stack
            .node_groups()
            .iter()
            .filter_map(NodeGroup::node_group_name)
            .collect();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_labels_and_taints_follow_the_same_attributes() {
        let nodes = NodeSettings {
            enable_spot_nodes: true,
            instance_family: Some(NodeInstanceFamily::Cpu),
            instance_size: Some(NodeInstanceSize::Large),
            ..NodeSettings::default()
        };
        let config = builder().with_node_settings(nodes).build().unwrap();
        let stack = compose(&StackSpec::development(), &config, "movies").unwrap();

        let groups = stack.node_groups();
        assert_eq!(groups.len(), 2);
        for group in groups {
            assert_eq!(group.labels.len(), 4);
            assert_eq!(group.taints.len(), 4);
            for taint in &group.taints {
                assert_eq!(taint.effect, TAINT_EFFECT);
                assert_eq!(group.labels.get(&taint.key), Some(&taint.value));
            }
        }
        assert_eq!(groups[0].labels.get(LABEL_CAPACITY_TYPE).map(String::as_str), Some("ON_DEMAND"));
        assert_eq!(groups[1].labels.get(LABEL_CAPACITY_TYPE).map(String::as_str), Some("SPOT"));
    }

    #[test]
    fn test_missing_node_tier() {
        let config = builder()
            .with_public_subnet_cidr_blocks(Vec::<String>::new())
            .with_node_settings(NodeSettings {
                enable_public_nodes: true,
                ..NodeSettings::default()
            })
            .build()
            .unwrap();
        let err = compose(&StackSpec::development(), &config, "movies").unwrap_err();
        assert!(matches!(err, IacError::MissingSubnetTier("public")));
    }

    #[test]
    fn test_resource_addresses_unique() {
        let nodes = NodeSettings {
            enable_public_nodes: true,
            enable_spot_nodes: true,
            ..NodeSettings::default()
        };
        let config = builder().with_node_settings(nodes).with_nat_gateway(true).build().unwrap();
        let stack = compose(&StackSpec::production(), &config, "movies").unwrap();

        let mut addresses: Vec<String> = stack.resources().iter().map(|r| r.address()).collect();
        let total = addresses.len();
        addresses.sort();
        addresses.dedup();
        assert_eq!(addresses.len(), total);
    }
}
