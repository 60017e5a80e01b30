//! Managed Kubernetes cluster.

use std::collections::BTreeMap;

use kstack_config::constants::{
    DEFAULT_EKS_CONTROL_PLANE_LOG_TYPES, DEFAULT_EKS_CORE_ADD_ONS, DEFAULT_EKS_VERSION,
};
use kstack_config::{clean_string, resource_name, Config, KubernetesConfig, Tags};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::IacResult;
use crate::resource::{ResourceDescriptor, ResourceKind};
use crate::tagging::TagResolver;

/// Core add-ons overlaid with `extra`; entries in `extra` win.
pub fn merged_add_ons(extra: Option<&BTreeMap<String, String>>) -> BTreeMap<String, String> {
    let mut add_ons: BTreeMap<String, String> = DEFAULT_EKS_CORE_ADD_ONS
        .iter()
        .map(|(name, version)| (name.to_string(), version.to_string()))
        .collect();
    if let Some(extra) = extra {
        add_ons.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    add_ons
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EksCluster {
    pub cluster: ResourceDescriptor,
    pub security_group: ResourceDescriptor,
    pub add_ons: Vec<ResourceDescriptor>,
}

impl EksCluster {
    /// Cluster name interpolation, usable before the cluster exists.
    pub fn name(&self) -> String {
        self.cluster.reference().attr("name")
    }

    /// The name the cluster is created with.
    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster.attribute("name").and_then(Value::as_str)
    }

    pub fn arn(&self) -> String {
        self.cluster.arn()
    }

    pub fn endpoint(&self) -> String {
        self.cluster.reference().attr("endpoint")
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        std::iter::once(&self.security_group)
            .chain(std::iter::once(&self.cluster))
            .chain(self.add_ons.iter())
    }
}

#[derive(Debug, Clone)]
pub struct EksClusterBuilder {
    config: Config,
    vpc_id: String,
    subnet_ids: Vec<String>,
    role_arn: String,
    add_ons: BTreeMap<String, String>,
}

impl EksClusterBuilder {
    pub fn new(config: &Config, vpc_id: impl Into<String>) -> Self {
        Self {
            config: config.clone(),
            vpc_id: vpc_id.into(),
            subnet_ids: Vec::new(),
            role_arn: String::new(),
            add_ons: BTreeMap::new(),
        }
    }

    pub fn with_subnet_ids(mut self, subnet_ids: Vec<String>) -> Self {
        self.subnet_ids = subnet_ids;
        self
    }

    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = role_arn.into();
        self
    }

    /// Add-ons layered over the core set and `kubernetes.eksAddOns`.
    pub fn with_add_ons(mut self, add_ons: BTreeMap<String, String>) -> Self {
        self.add_ons = add_ons;
        self
    }

    pub fn build(&self) -> IacResult<EksCluster> {
        let config = &self.config;
        let defaults = KubernetesConfig::default();
        let kubernetes = config.kubernetes.as_ref().unwrap_or(&defaults);

        let mut construct_tags = Tags::new();
        construct_tags.insert("layer".to_string(), "compute".to_string());
        let resolver = TagResolver::new(config.clone(), construct_tags);

        let cluster_name = resource_name(&config.name, config.environment, "cluster", config.region);
        let version = kubernetes
            .eks_version
            .clone()
            .unwrap_or_else(|| DEFAULT_EKS_VERSION.to_string());
        let public_access = kubernetes.eks_endpoint_public_access.unwrap_or(false);
        let log_types: Vec<String> = kubernetes
            .eks_control_plane_log_types
            .clone()
            .unwrap_or_else(|| {
                DEFAULT_EKS_CONTROL_PLANE_LOG_TYPES
                    .iter()
                    .map(|t| t.to_string())
                    .collect()
            });

        info!("Building EKS cluster {} (version {})", cluster_name, version);

        let security_group = ResourceDescriptor::new(ResourceKind::SecurityGroup, "eks-cluster-security-group")
            .attr(
                "name",
                resource_name(&config.name, config.environment, "sg", config.region),
            )
            .attr("description", "EKS cluster security group")
            .attr("vpc_id", self.vpc_id.as_str())
            .tags(resolver.resolve_with([("resourceType", "sg")])?);
        let security_group_ref = security_group.reference();

        let cluster = ResourceDescriptor::new(ResourceKind::EksCluster, "eks-cluster")
            .attr("name", cluster_name.as_str())
            .attr("role_arn", self.role_arn.as_str())
            .attr("version", version)
            .attr(
                "vpc_config",
                serde_json::json!({
                    "subnet_ids": self.subnet_ids,
                    "security_group_ids": [security_group_ref.id()],
                    "endpoint_private_access": !public_access,
                    "endpoint_public_access": public_access,
                }),
            )
            .attr("enabled_cluster_log_types", log_types)
            .depends_on(&security_group_ref)
            .tags(resolver.resolve_with([("resourceType", "cluster")])?);
        let cluster_ref = cluster.reference();

        let mut add_ons = merged_add_ons(kubernetes.eks_add_ons.as_ref());
        add_ons.extend(self.add_ons.iter().map(|(k, v)| (k.clone(), v.clone())));
        let add_ons = add_ons
            .into_iter()
            .map(|(name, version)| {
                debug!("EKS add-on {} {}", name, version);
                ResourceDescriptor::new(
                    ResourceKind::EksAddon,
                    format!("eks-addon-{}", clean_string(&name)),
                )
                .attr("cluster_name", cluster_ref.attr("name"))
                .attr("addon_name", name)
                .attr("addon_version", version)
                .attr("resolve_conflicts_on_update", "PRESERVE")
                .depends_on(&cluster_ref)
            })
            .collect();

        Ok(EksCluster {
            cluster,
            security_group,
            add_ons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstack_config::{ConfigBuilder, Environment, Region, Vendor};

    fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
            .with_name("movies")
            .with_resource_type("stack")
            .with_environment(Environment::Development)
            .with_region(Region::AustraliaEast)
            .with_vendor(Vendor::Aws)
            .with_terraform_config("ws", "org", None)
    }

    #[test]
    fn test_cluster_defaults() {
        let config = builder().build().unwrap();
        let eks = EksClusterBuilder::new(&config, "${aws_vpc.vpc.id}")
            .with_subnet_ids(vec!["${aws_subnet.private-subnet-1.id}".to_string()])
            .with_role_arn("${aws_iam_role.cluster-role.arn}")
            .build()
            .unwrap();

        assert_eq!(eks.cluster_name(), Some("movies-dev-cluster-aue"));
        assert_eq!(*eks.cluster.attribute("version").unwrap(), DEFAULT_EKS_VERSION);
        assert_eq!(
            eks.cluster.attribute("enabled_cluster_log_types").unwrap().as_array().unwrap().len(),
            5
        );
        let vpc_config = eks.cluster.attribute("vpc_config").unwrap();
        assert_eq!(vpc_config["endpoint_private_access"], true);
        assert_eq!(vpc_config["endpoint_public_access"], false);
        assert_eq!(
            *eks.security_group.attribute("name").unwrap(),
            "movies-dev-sg-aue"
        );
        assert_eq!(eks.cluster.tags.get("layer"), Some("compute"));
        assert_eq!(eks.add_ons.len(), DEFAULT_EKS_CORE_ADD_ONS.len());
    }

    #[test]
    fn test_caller_add_ons_win() {
        let mut configured = BTreeMap::new();
        configured.insert("coredns".to_string(), "v9.9.9".to_string());
        let config = builder()
            .with_eks_add_ons(configured)
            .with_eks_endpoint_public_access(true)
            .build()
            .unwrap();

        let mut extra = BTreeMap::new();
        extra.insert("aws-ebs-csi-driver".to_string(), "v1.0.0".to_string());
        let eks = EksClusterBuilder::new(&config, "vpc")
            .with_add_ons(extra)
            .build()
            .unwrap();

        let coredns = eks
            .add_ons
            .iter()
            .find(|a| a.logical_id == "eks-addon-coredns")
            .unwrap();
        assert_eq!(*coredns.attribute("addon_version").unwrap(), "v9.9.9");
        assert!(eks.add_ons.iter().any(|a| a.logical_id == "eks-addon-awsebscsidriver"));
        assert_eq!(eks.add_ons.len(), DEFAULT_EKS_CORE_ADD_ONS.len() + 1);
        assert_eq!(eks.cluster.attribute("vpc_config").unwrap()["endpoint_private_access"], false);
    }
}
