//! Resource descriptors handed to the provisioning backend.
//!
//! Every derived resource is described by its kind, a logical id that is
//! unique within a stack, its resolved tags, backend attributes and the
//! addresses of the resources it depends on. References between resources
//! are interpolation strings (`${aws_vpc.vpc.id}`) so the backend can resolve
//! them once the real identifiers exist.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of resources the composition engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Provider,
    Vpc,
    DefaultRouteTable,
    Subnet,
    InternetGateway,
    RouteTable,
    Route,
    RouteTableAssociation,
    Eip,
    NatGateway,
    SecurityGroup,
    SecurityGroupRule,
    KmsKey,
    KmsAlias,
    SecretsManagerSecret,
    SecretsManagerSecretVersion,
    IamRole,
    EksCluster,
    EksAddon,
    LaunchTemplate,
    EksNodeGroup,
}

impl ResourceKind {
    /// Backend resource type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Provider => "provider",
            ResourceKind::Vpc => "aws_vpc",
            ResourceKind::DefaultRouteTable => "aws_default_route_table",
            ResourceKind::Subnet => "aws_subnet",
            ResourceKind::InternetGateway => "aws_internet_gateway",
            ResourceKind::RouteTable => "aws_route_table",
            ResourceKind::Route => "aws_route",
            ResourceKind::RouteTableAssociation => "aws_route_table_association",
            ResourceKind::Eip => "aws_eip",
            ResourceKind::NatGateway => "aws_nat_gateway",
            ResourceKind::SecurityGroup => "aws_security_group",
            ResourceKind::SecurityGroupRule => "aws_security_group_rule",
            ResourceKind::KmsKey => "aws_kms_key",
            ResourceKind::KmsAlias => "aws_kms_alias",
            ResourceKind::SecretsManagerSecret => "aws_secretsmanager_secret",
            ResourceKind::SecretsManagerSecretVersion => "aws_secretsmanager_secret_version",
            ResourceKind::IamRole => "aws_iam_role",
            ResourceKind::EksCluster => "aws_eks_cluster",
            ResourceKind::EksAddon => "aws_eks_addon",
            ResourceKind::LaunchTemplate => "aws_launch_template",
            ResourceKind::EksNodeGroup => "aws_eks_node_group",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A resolved, key-sorted tag set.
///
/// Backed by a `BTreeMap`, so iteration and serialization order is the byte
/// order of the keys regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub const NAME_KEY: &'static str = "Name";

    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical `Name` tag, or an empty string for an empty set.
    pub fn name(&self) -> &str {
        self.get(Self::NAME_KEY).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Copy with one extra entry, used for per-resource-kind annotations
    /// such as the availability zone list on instance tags.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut tags = self.0.clone();
        tags.insert(key.into(), value.into());
        Self(tags)
    }
}

impl From<BTreeMap<String, String>> for TagSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<TagSet> for BTreeMap<String, String> {
    fn from(tags: TagSet) -> Self {
        tags.0
    }
}

/// Stable handle to a resource that may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub logical_id: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, logical_id: impl Into<String>) -> Self {
        Self {
            kind,
            logical_id: logical_id.into(),
        }
    }

    /// `<type>.<logical_id>`
    pub fn address(&self) -> String {
        format!("{}.{}", self.kind.type_name(), self.logical_id)
    }

    /// Interpolation for an attribute of the provisioned resource.
    pub fn attr(&self, attribute: &str) -> String {
        format!("${{{}.{}}}", self.address(), attribute)
    }

    pub fn id(&self) -> String {
        self.attr("id")
    }

    pub fn arn(&self) -> String {
        self.attr("arn")
    }
}

/// One resource to be materialized by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub logical_id: String,
    #[serde(default, skip_serializing_if = "TagSet::is_empty")]
    pub tags: TagSet,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, logical_id: impl Into<String>) -> Self {
        Self {
            kind,
            logical_id: logical_id.into(),
            tags: TagSet::new(),
            attributes: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Record a dependency. Duplicate dependencies are ignored.
    pub fn depends_on(mut self, dependency: &ResourceRef) -> Self {
        let address = dependency.address();
        if !self.depends_on.contains(&address) {
            self.depends_on.push(address);
        }
        self
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(self.kind, self.logical_id.clone())
    }

    pub fn address(&self) -> String {
        self.reference().address()
    }

    pub fn id(&self) -> String {
        self.reference().id()
    }

    pub fn arn(&self) -> String {
        self.reference().arn()
    }

    /// Display name from the `Name` tag.
    pub fn name(&self) -> &str {
        self.tags.name()
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// A published identifier for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub name: String,
    pub value: Value,
    pub description: String,
}

impl OutputDescriptor {
    pub fn new(name: impl Into<String>, value: impl Into<Value>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: description.into(),
        }
    }
}
