//! Node group provisioning.
//!
//! Node groups are derived from a small attribute vocabulary: network
//! placement, capacity type, instance family and instance size. The same
//! attributes produce both Kubernetes labels and taints.
//!
//! [`NodeGroupPlan`] numbers node groups as they are added. It is threaded by
//! value, so the counter and the list are outputs rather than shared state.

use std::collections::BTreeMap;

use kstack_config::constants::{DEFAULT_EKS_NODEGROUP_IMAGE_ID, DEFAULT_EKS_NODEGROUP_INSTANCE_TYPES};
use kstack_config::{
    resource_name, Config, NodeCapacityType, NodeInstanceFamily, NodeInstanceSize, NodeNetwork,
    ScalingConfig, Tags,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{IacError, IacResult};
use crate::network::{NetworkTopology, SubnetTier};
use crate::resource::{ResourceDescriptor, ResourceKind};
use crate::tagging::TagResolver;

/// Fallback when a caller does not supply all three scaling bounds.
pub const COMPONENT_DEFAULT_SCALING: ScalingConfig = ScalingConfig::new(1, 1, 1);

/// Scaling used by stack composition when the configuration has none.
pub const DEFAULT_NODE_GROUP_SCALING: ScalingConfig = ScalingConfig::new(1, 2, 1);

pub const LABEL_NETWORK: &str = "node.kubernetes.io/network";
pub const LABEL_CAPACITY_TYPE: &str = "node.kubernetes.io/capacity-type";
pub const LABEL_INSTANCE_FAMILY: &str = "node.kubernetes.io/instance-family";
pub const LABEL_INSTANCE_SIZE: &str = "node.kubernetes.io/instance-size";

pub const TAINT_EFFECT: &str = "NO_SCHEDULE";

/// Kubernetes taint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

/// Attributes a node group's labels and taints are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NodeNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_type: Option<NodeCapacityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_family: Option<NodeInstanceFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_size: Option<NodeInstanceSize>,
}

impl NodeAttributes {
    /// Present attributes keyed by their label key.
    fn standard_fields(&self) -> BTreeMap<String, String> {
        [
            (LABEL_NETWORK, self.network.map(|v| v.as_str())),
            (LABEL_CAPACITY_TYPE, self.capacity_type.map(|v| v.as_str())),
            (LABEL_INSTANCE_FAMILY, self.instance_family.map(|v| v.as_str())),
            (LABEL_INSTANCE_SIZE, self.instance_size.map(|v| v.as_str())),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v.to_string())))
        .collect()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.standard_fields()
    }

    /// One `NO_SCHEDULE` taint per present attribute.
    pub fn taints(&self) -> Vec<Taint> {
        self.standard_fields()
            .into_iter()
            .map(|(key, value)| Taint {
                key,
                value,
                effect: TAINT_EFFECT.to_string(),
            })
            .collect()
    }
}

/// Scaling bounds as supplied by a caller; any of them may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingOverrides {
    pub desired_size: Option<u32>,
    pub max_size: Option<u32>,
    pub min_size: Option<u32>,
}

impl ScalingOverrides {
    /// All three bounds verbatim, or [`COMPONENT_DEFAULT_SCALING`].
    pub fn resolve(&self) -> ScalingConfig {
        match (self.desired_size, self.max_size, self.min_size) {
            (Some(desired), Some(max), Some(min)) => ScalingConfig::new(desired, max, min),
            _ => COMPONENT_DEFAULT_SCALING,
        }
    }
}

impl From<ScalingConfig> for ScalingOverrides {
    fn from(scaling: ScalingConfig) -> Self {
        Self {
            desired_size: Some(scaling.desired_size),
            max_size: Some(scaling.max_size),
            min_size: Some(scaling.min_size),
        }
    }
}

/// Where a node group attaches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeGroupRequest {
    pub cluster_name: String,
    pub cluster_arn: String,
    pub node_role_arn: String,
    pub subnet_ids: Vec<String>,
}

impl NodeGroupRequest {
    /// Required fields, checked in a fixed order.
    pub fn validate(&self) -> IacResult<()> {
        let missing = if self.cluster_name.trim().is_empty() {
            Some("clusterName")
        } else if self.cluster_arn.trim().is_empty() {
            Some("clusterArn")
        } else if self.node_role_arn.trim().is_empty() {
            Some("nodeRoleArn")
        } else if self.subnet_ids.is_empty() {
            Some("subnetIds")
        } else {
            None
        };
        match missing {
            Some(field) => Err(IacError::NodeGroupArgument { field }),
            None => Ok(()),
        }
    }
}

/// Caller choices for one node group.
///
/// Labels and taints are not set here directly; both are derived from
/// `attributes`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeGroupOptions {
    pub attributes: NodeAttributes,
    pub instance_types: Option<Vec<String>>,
    pub scaling: ScalingOverrides,
    pub max_price: Option<String>,
}

impl NodeGroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: NodeAttributes) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    pub fn capacity_type(&self) -> Option<NodeCapacityType> {
        self.attributes.capacity_type
    }

    pub fn with_capacity_type(mut self, capacity_type: NodeCapacityType) -> Self {
        self.attributes.capacity_type = Some(capacity_type);
        self
    }

    pub fn with_instance_types(mut self, instance_types: Vec<String>) -> Self {
        self.instance_types = Some(instance_types);
        self
    }

    pub fn with_scaling(mut self, scaling: impl Into<ScalingOverrides>) -> Self {
        self.scaling = scaling.into();
        self
    }

    pub fn with_max_price(mut self, max_price: Option<String>) -> Self {
        self.max_price = max_price;
        self
    }
}

/// A node group with its launch template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub launch_template: ResourceDescriptor,
    pub node_group: ResourceDescriptor,
    pub scaling: ScalingConfig,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    pub tier: SubnetTier,
    pub availability_zones: Vec<String>,
}

impl NodeGroup {
    pub fn logical_id(&self) -> &str {
        &self.node_group.logical_id
    }

    pub fn node_group_name(&self) -> Option<&str> {
        self.node_group.attribute("node_group_name").and_then(Value::as_str)
    }

    pub fn arn(&self) -> String {
        self.node_group.arn()
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        [&self.launch_template, &self.node_group].into_iter()
    }
}

/// Provision one node group.
///
/// `config.name` is expected to already carry the capacity suffix. Required
/// request fields are checked before anything is derived. The subnets must
/// all belong to `network` and share one tier; availability zones come from
/// those subnets.
pub fn provision(
    config: &Config,
    logical_id: &str,
    network: &NetworkTopology,
    request: &NodeGroupRequest,
    options: &NodeGroupOptions,
) -> IacResult<NodeGroup> {
    request.validate()?;
    let tier = network.tier_of(&request.subnet_ids)?;
    let availability_zones = network.availability_zones_for(&request.subnet_ids)?;

    let scaling = options.scaling.resolve();
    if !scaling.is_ordered() {
        return Err(IacError::InvalidScaling {
            name: logical_id.to_string(),
            desired: scaling.desired_size,
            max: scaling.max_size,
            min: scaling.min_size,
        });
    }

    let node_group_name = resource_name(&config.name, config.environment, "ng", config.region);
    let zones = availability_zones.join(",");
    let labels = options.attributes.labels();
    let taints = options.attributes.taints();

    let mut construct_tags = Tags::new();
    construct_tags.insert("availabilityZone".to_string(), zones.clone());
    construct_tags.insert("layer".to_string(), "compute".to_string());
    let resolver = TagResolver::new(config.clone(), construct_tags);

    let instance_tags = resolver
        .resolve_with([("resourceType", "ec2")])?
        .with("availabilityZone", zones.as_str());
    let volume_tags = resolver.resolve_with([("resourceType", "ebs")])?;

    let instance_type = options
        .instance_types
        .as_ref()
        .and_then(|types| types.first().cloned())
        .unwrap_or_else(|| DEFAULT_EKS_NODEGROUP_INSTANCE_TYPES[0].to_string());

    let launch_template = ResourceDescriptor::new(
        ResourceKind::LaunchTemplate,
        format!("{}-launch-template", logical_id),
    )
    .attr(
        "name",
        resource_name(&config.name, config.environment, "lt", config.region),
    )
    .attr("image_id", DEFAULT_EKS_NODEGROUP_IMAGE_ID)
    .attr("instance_type", instance_type)
    .attr("vpc_security_group_ids", Vec::<String>::new())
    .attr(
        "tag_specifications",
        json!([
            { "resource_type": "instance", "tags": serde_json::to_value(&instance_tags)? },
            { "resource_type": "volume", "tags": serde_json::to_value(&volume_tags)? },
        ]),
    )
    .tags(resolver.resolve_with([("resourceType", "lt")])?);
    let template_ref = launch_template.reference();

    let mut node_group = ResourceDescriptor::new(ResourceKind::EksNodeGroup, logical_id)
        .attr("cluster_name", request.cluster_name.as_str())
        .attr("node_group_name", node_group_name.as_str())
        .attr("node_role_arn", request.node_role_arn.as_str())
        .attr("subnet_ids", request.subnet_ids.clone())
        .attr(
            "scaling_config",
            json!({
                "desired_size": scaling.desired_size,
                "max_size": scaling.max_size,
                "min_size": scaling.min_size,
            }),
        )
        .attr(
            "launch_template",
            json!({ "id": template_ref.id(), "version": template_ref.attr("latest_version") }),
        )
        .depends_on(&template_ref)
        .tags(resolver.resolve_with([("resourceType", "ng")])?);

    if let Some(types) = &options.instance_types {
        node_group = node_group.attr("instance_types", types.clone());
    }
    if let Some(capacity) = options.capacity_type() {
        node_group = node_group.attr("capacity_type", capacity.as_str());
    }
    if !labels.is_empty() {
        node_group = node_group.attr("labels", serde_json::to_value(&labels)?);
    }
    if !taints.is_empty() {
        node_group = node_group.attr("taint", serde_json::to_value(&taints)?);
    }
    if let Some(max_price) = &options.max_price {
        node_group = node_group.attr("max_price", max_price.as_str());
    }

    debug!(
        "Node group {} ({}) in {} subnets [{}]: desired {}, max {}, min {}",
        node_group_name,
        logical_id,
        tier,
        zones,
        scaling.desired_size,
        scaling.max_size,
        scaling.min_size
    );

    Ok(NodeGroup {
        launch_template,
        node_group,
        scaling,
        labels,
        taints,
        tier,
        availability_zones,
    })
}

/// Accumulates numbered node groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeGroupPlan {
    counter: usize,
    node_groups: Vec<NodeGroup>,
}

impl NodeGroupPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of node groups added so far.
    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn node_groups(&self) -> &[NodeGroup] {
        &self.node_groups
    }

    pub fn into_node_groups(self) -> Vec<NodeGroup> {
        self.node_groups
    }

    /// Provision the next node group and return the extended plan.
    ///
    /// The node group's base name is `<config.name>-<capacity>` and its
    /// logical id is `<base name>-nodegroup-<counter>`.
    pub fn add(
        self,
        config: &Config,
        network: &NetworkTopology,
        request: &NodeGroupRequest,
        options: &NodeGroupOptions,
    ) -> IacResult<Self> {
        let capacity = options.capacity_type().unwrap_or_default();
        let base = config.with_name(format!("{}-{}", config.name, capacity.as_str()));
        let logical_id = format!("{}-nodegroup-{}", base.name, self.counter);

        let group = provision(&base, &logical_id, network, request, options)?;
        info!("Planned node group {}", logical_id);

        let mut node_groups = self.node_groups;
        node_groups.push(group);
        Ok(Self {
            counter: self.counter + 1,
            node_groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkBuilder;
    use kstack_config::constants::{
        DEFAULT_VPC_PRIVATE_SUBNET_CIDR_BLOCKS, DEFAULT_VPC_PUBLIC_SUBNET_CIDR_BLOCKS,
    };
    use kstack_config::{ConfigBuilder, Environment, Region, Vendor};

    fn test_config() -> Config {
        ConfigBuilder::new()
            .with_name("movies")
            .with_resource_type("stack")
            .with_environment(Environment::Staging)
            .with_region(Region::AsiaSoutheast)
            .with_vendor(Vendor::Aws)
            .with_terraform_config("ws", "org", None)
            .with_public_subnet_cidr_blocks(DEFAULT_VPC_PUBLIC_SUBNET_CIDR_BLOCKS)
            .with_private_subnet_cidr_blocks(DEFAULT_VPC_PRIVATE_SUBNET_CIDR_BLOCKS)
            .build()
            .unwrap()
    }

    fn topology() -> NetworkTopology {
        NetworkBuilder::new(&test_config()).build().unwrap()
    }

    fn request() -> NodeGroupRequest {
        NodeGroupRequest {
            cluster_name: "${aws_eks_cluster.eks-cluster.name}".to_string(),
            cluster_arn: "${aws_eks_cluster.eks-cluster.arn}".to_string(),
            node_role_arn: "${aws_iam_role.node-role.arn}".to_string(),
            subnet_ids: vec!["${aws_subnet.private-subnet-1.id}".to_string()],
        }
    }

    fn provision_with(request: &NodeGroupRequest, options: &NodeGroupOptions) -> IacResult<NodeGroup> {
        provision(&test_config(), "ng", &topology(), request, options)
    }

    #[test]
    fn test_component_default_scaling() {
        let group = provision_with(&request(), &NodeGroupOptions::new()).unwrap();
        assert_eq!(group.scaling, ScalingConfig::new(1, 1, 1));

        let partial = NodeGroupOptions {
            scaling: ScalingOverrides {
                desired_size: Some(3),
                max_size: Some(5),
                min_size: None,
            },
            ..NodeGroupOptions::default()
        };
        let group = provision_with(&request(), &partial).unwrap();
        assert_eq!(group.scaling, COMPONENT_DEFAULT_SCALING);
    }

    #[test]
    fn test_explicit_scaling_is_verbatim() {
        let options = NodeGroupOptions::new().with_scaling(ScalingConfig::new(3, 6, 2));
        let group = provision_with(&request(), &options).unwrap();
        assert_eq!(group.scaling, ScalingConfig::new(3, 6, 2));
        assert_eq!(
            group.node_group.attribute("scaling_config").unwrap(),
            &json!({ "desired_size": 3, "max_size": 6, "min_size": 2 })
        );
    }

    #[test]
    fn test_unordered_scaling_rejected() {
        let options = NodeGroupOptions::new().with_scaling(ScalingConfig::new(5, 2, 1));
        let err = provision_with(&request(), &options).unwrap_err();
        assert!(matches!(err, IacError::InvalidScaling { desired: 5, max: 2, min: 1, .. }));
    }

    #[test]
    fn test_required_arguments_in_order() {
        let empty = NodeGroupRequest::default();
        let err = provision_with(&empty, &NodeGroupOptions::new()).unwrap_err();
        assert_eq!(err.to_string(), "EksNodeGroup: clusterName is required");

        let no_role = NodeGroupRequest {
            node_role_arn: String::new(),
            subnet_ids: Vec::new(),
            ..request()
        };
        let err = provision_with(&no_role, &NodeGroupOptions::new()).unwrap_err();
        assert_eq!(err.to_string(), "EksNodeGroup: nodeRoleArn is required");

        let no_subnets = NodeGroupRequest {
            subnet_ids: Vec::new(),
            ..request()
        };
        let err = provision_with(&no_subnets, &NodeGroupOptions::new()).unwrap_err();
        assert!(matches!(err, IacError::NodeGroupArgument { field: "subnetIds" }));
    }

    #[test]
    fn test_mixed_tier_subnets_rejected() {
        let mixed = NodeGroupRequest {
            subnet_ids: vec![
                "${aws_subnet.public-subnet-1.id}".to_string(),
                "${aws_subnet.private-subnet-2.id}".to_string(),
            ],
            ..request()
        };
        let err = provision_with(&mixed, &NodeGroupOptions::new()).unwrap_err();
        assert!(matches!(err, IacError::MixedSubnetTiers));
    }

    #[test]
    fn test_unknown_subnet_rejected() {
        let unknown = NodeGroupRequest {
            subnet_ids: vec![
                "${aws_subnet.private-subnet-1.id}".to_string(),
                "subnet-bogus".to_string(),
            ],
            ..request()
        };
        let err = provision_with(&unknown, &NodeGroupOptions::new()).unwrap_err();
        match err {
            IacError::UnknownSubnet(id) => assert_eq!(id, "subnet-bogus"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_labels_and_taints_share_vocabulary() {
        let attributes = NodeAttributes {
            network: Some(NodeNetwork::Private),
            capacity_type: Some(NodeCapacityType::Spot),
            instance_family: None,
            instance_size: Some(NodeInstanceSize::Large),
        };

        let labels = attributes.labels();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(LABEL_NETWORK).map(String::as_str), Some("private"));
        assert_eq!(labels.get(LABEL_CAPACITY_TYPE).map(String::as_str), Some("SPOT"));
        assert!(!labels.contains_key(LABEL_INSTANCE_FAMILY));

        let taints = attributes.taints();
        assert_eq!(taints.len(), 3);
        assert!(taints.iter().all(|t| t.effect == TAINT_EFFECT));
        assert!(taints.iter().all(|t| labels.get(&t.key) == Some(&t.value)));

        assert!(NodeAttributes::default().labels().is_empty());
    }

    #[test]
    fn test_node_group_labels_and_taints_from_attributes() {
        let attributes = NodeAttributes {
            network: Some(NodeNetwork::Private),
            capacity_type: Some(NodeCapacityType::OnDemand),
            instance_family: Some(NodeInstanceFamily::Cpu),
            instance_size: None,
        };
        let group = provision_with(&request(), &NodeGroupOptions::from_attributes(attributes)).unwrap();

        assert_eq!(group.labels, attributes.labels());
        assert_eq!(group.taints, attributes.taints());
        assert_eq!(group.taints.len(), 3);
        assert_eq!(*group.node_group.attribute("capacity_type").unwrap(), "ON_DEMAND");
        assert_eq!(group.node_group.attribute("taint").unwrap().as_array().unwrap().len(), 3);

        let bare = provision_with(&request(), &NodeGroupOptions::new()).unwrap();
        assert!(bare.node_group.attribute("labels").is_none());
        assert!(bare.node_group.attribute("taint").is_none());
    }

    #[test]
    fn test_launch_template_tags() {
        let spread = NodeGroupRequest {
            subnet_ids: vec![
                "${aws_subnet.private-subnet-1.id}".to_string(),
                "${aws_subnet.private-subnet-2.id}".to_string(),
            ],
            ..request()
        };
        let options = NodeGroupOptions::new().with_instance_types(vec!["m5.large".to_string()]);
        let group = provision_with(&spread, &options).unwrap();

        assert_eq!(group.tier, SubnetTier::Private);
        assert_eq!(group.availability_zones, vec!["ap-southeast-1a", "ap-southeast-1b"]);
        let template = &group.launch_template;
        assert_eq!(*template.attribute("instance_type").unwrap(), "m5.large");
        assert_eq!(*template.attribute("name").unwrap(), "movies-stg-lt-ase");
        let specs = template.attribute("tag_specifications").unwrap();
        assert_eq!(specs[0]["resource_type"], "instance");
        assert_eq!(specs[0]["tags"]["availabilityZone"], "ap-southeast-1a,ap-southeast-1b");
        assert_eq!(specs[0]["tags"]["Name"], "movies-stg-ec2-ase");
        assert_eq!(specs[1]["resource_type"], "volume");
        assert_eq!(specs[1]["tags"]["Name"], "movies-stg-ebs-ase");

        assert_eq!(group.node_group.name(), "movies-stg-ng-ase");
        assert_eq!(group.node_group.tags.get("layer"), Some("compute"));
        assert_eq!(
            group.node_group.tags.get("availabilityZone"),
            Some("ap-southeast-1a,ap-southeast-1b")
        );
        assert_eq!(group.node_group_name(), Some("movies-stg-ng-ase"));
    }

    #[test]
    fn test_default_instance_type() {
        let group = provision_with(&request(), &NodeGroupOptions::new()).unwrap();
        assert_eq!(
            *group.launch_template.attribute("instance_type").unwrap(),
            DEFAULT_EKS_NODEGROUP_INSTANCE_TYPES[0]
        );
        assert!(group.node_group.attribute("instance_types").is_none());
    }

    #[test]
    fn test_plan_threads_counter() {
        let config = test_config();
        let network = topology();
        let plan = NodeGroupPlan::new()
            .add(
                &config,
                &network,
                &request(),
                &NodeGroupOptions::new().with_capacity_type(NodeCapacityType::OnDemand),
            )
            .unwrap();
        let plan = plan
            .add(
                &config,
                &network,
                &request(),
                &NodeGroupOptions::new().with_capacity_type(NodeCapacityType::Spot),
            )
            .unwrap();

        assert_eq!(plan.counter(), 2);
        let ids: Vec<&str> = plan.node_groups().iter().map(NodeGroup::logical_id).collect();
        assert_eq!(ids, vec!["movies-ON_DEMAND-nodegroup-0", "movies-SPOT-nodegroup-1"]);
        let names: Vec<&str> = plan
            .node_groups()
            .iter()
            .filter_map(NodeGroup::node_group_name)
            .collect();
        assert_eq!(names, vec!["moviesondemand-stg-ng-ase", "moviesspot-stg-ng-ase"]);
    }

    #[test]
    fn test_add_propagates_argument_error() {
        let empty = NodeGroupRequest::default();
        let err = NodeGroupPlan::new()
            .add(&test_config(), &topology(), &empty, &NodeGroupOptions::new())
            .unwrap_err();
        assert!(matches!(err, IacError::NodeGroupArgument { field: "clusterName" }));
    }
}
