//! Security primitives: KMS key, Secrets Manager secrets and IAM roles.

use kstack_config::{clean_environment, clean_string, resource_name, Config, Tags};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::IacResult;
use crate::resource::{ResourceDescriptor, ResourceKind};
use crate::tagging::TagResolver;

/// Prepended to every role's managed policy list.
pub const DEFAULT_IAM_ROLE_MANAGED_POLICY_ARNS: [&str; 1] =
    ["arn:aws:iam::aws:policy/CloudWatchAgentServerPolicy"];

pub const EKS_CLUSTER_POLICY_ARNS: [&str; 1] = ["arn:aws:iam::aws:policy/AmazonEKSClusterPolicy"];

pub const EKS_NODE_POLICY_ARNS: [&str; 3] = [
    "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy",
    "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy",
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
];

/// Account id placeholder used when the configuration carries none.
const CALLER_ACCOUNT_ID: &str = "${data.aws_caller_identity.current.account_id}";

fn security_tags() -> Tags {
    let mut tags = Tags::new();
    tags.insert("layer".to_string(), "security".to_string());
    tags
}

/// Trust policy letting `service` assume a role.
pub fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole",
        }],
    })
}

/// KMS key with its alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KmsKey {
    pub key: ResourceDescriptor,
    pub alias: ResourceDescriptor,
}

impl KmsKey {
    pub fn id(&self) -> String {
        self.key.id()
    }

    pub fn arn(&self) -> String {
        self.key.arn()
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.attribute("name").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct KmsBuilder {
    config: Config,
    description: Option<String>,
}

impl KmsBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build(&self) -> IacResult<KmsKey> {
        let config = &self.config;
        let resolver = TagResolver::new(config.clone(), security_tags());
        let account_id = config.aws_account_id().unwrap_or(CALLER_ACCOUNT_ID);

        let description = self
            .description
            .clone()
            .unwrap_or_else(|| format!("KMS key for encryption in {}", config.environment));
        let alias = format!(
            "{}-{}-kmskey",
            clean_string(&config.name),
            clean_environment(config.environment)
        );

        let policy = json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Sid": "Enable IAM User Permissions",
                    "Effect": "Allow",
                    "Principal": { "AWS": format!("arn:aws:iam::{}:root", account_id) },
                    "Action": "kms:*",
                    "Resource": "*",
                },
                {
                    "Sid": "Allow Secrets Manager to use the key",
                    "Effect": "Allow",
                    "Principal": { "Service": "secretsmanager.amazonaws.com" },
                    "Action": ["kms:Decrypt", "kms:GenerateDataKey"],
                    "Resource": "*",
                },
            ],
        });

        let key = ResourceDescriptor::new(ResourceKind::KmsKey, "kms-key")
            .attr("description", description)
            .attr("policy", policy.to_string())
            .tags(resolver.resolve_with([("resourceType", "kmskey")])?);
        let key_ref = key.reference();
        let alias = ResourceDescriptor::new(ResourceKind::KmsAlias, "kms-alias")
            .attr("name", format!("alias/{}", alias))
            .attr("target_key_id", key_ref.id())
            .depends_on(&key_ref);
        debug!("KMS key {} ({})", key.name(), alias.logical_id);

        Ok(KmsKey { key, alias })
    }
}

/// One secret to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecretSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_string: Option<String>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl SecretSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_secret_string(mut self, secret: impl Into<String>) -> Self {
        self.secret_string = Some(secret.into());
        self
    }
}

/// Secrets and the versions holding their initial values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Secrets {
    pub secrets: Vec<ResourceDescriptor>,
    pub versions: Vec<ResourceDescriptor>,
}

impl Secrets {
    pub fn arns(&self) -> Vec<String> {
        self.secrets.iter().map(ResourceDescriptor::arn).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.secrets
            .iter()
            .filter_map(|s| s.attribute("name").and_then(Value::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.secrets.iter().chain(self.versions.iter())
    }
}

#[derive(Debug, Clone)]
pub struct SecretsBuilder {
    config: Config,
    secrets: Vec<SecretSpec>,
    kms_key_id: Option<String>,
}

impl SecretsBuilder {
    pub fn new(config: &Config, secrets: Vec<SecretSpec>) -> Self {
        Self {
            config: config.clone(),
            secrets,
            kms_key_id: None,
        }
    }

    pub fn with_kms_key_id(mut self, key_id: Option<String>) -> Self {
        self.kms_key_id = key_id;
        self
    }

    pub fn build(&self) -> IacResult<Secrets> {
        let config = &self.config;
        let resolver = TagResolver::new(config.clone(), security_tags());
        let prefix = format!(
            "{}/{}",
            clean_string(&config.name),
            clean_environment(config.environment)
        );

        let mut built = Secrets::default();
        for (index, spec) in self.secrets.iter().enumerate() {
            let mut call_site = spec.tags.clone();
            call_site.insert("resourceType".to_string(), "secret".to_string());

            let mut secret = ResourceDescriptor::new(
                ResourceKind::SecretsManagerSecret,
                format!("secret-{}", index),
            )
            .attr("name", format!("{}/{}", prefix, spec.name))
            .tags(resolver.resolve(&call_site)?);
            if let Some(description) = &spec.description {
                secret = secret.attr("description", description.as_str());
            }
            if let Some(key_id) = &self.kms_key_id {
                secret = secret.attr("kms_key_id", key_id.as_str());
            }

            if let Some(secret_string) = &spec.secret_string {
                let secret_ref = secret.reference();
                built.versions.push(
                    ResourceDescriptor::new(
                        ResourceKind::SecretsManagerSecretVersion,
                        format!("secret-version-{}", index),
                    )
                    .attr("secret_id", secret_ref.id())
                    .attr("secret_string", secret_string.as_str())
                    .depends_on(&secret_ref),
                );
            }
            debug!("Secret {}/{}", prefix, spec.name);
            built.secrets.push(secret);
        }

        info!("Built {} secret(s)", built.len());
        Ok(built)
    }
}

/// IAM role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IamRole {
    pub descriptor: ResourceDescriptor,
}

impl IamRole {
    pub fn arn(&self) -> String {
        self.descriptor.arn()
    }

    pub fn name(&self) -> Option<&str> {
        self.descriptor.attribute("name").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct IamRoleBuilder {
    config: Config,
    logical_id: String,
    assume_role_policy: Value,
    managed_policy_arns: Vec<String>,
}

impl IamRoleBuilder {
    pub fn new(config: &Config, logical_id: impl Into<String>, assume_role_policy: Value) -> Self {
        Self {
            config: config.clone(),
            logical_id: logical_id.into(),
            assume_role_policy,
            managed_policy_arns: Vec::new(),
        }
    }

    pub fn with_managed_policy_arns<I, S>(mut self, arns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.managed_policy_arns = arns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(&self) -> IacResult<IamRole> {
        let config = &self.config;
        let resolver = TagResolver::new(config.clone(), security_tags());
        let role_name = resource_name(&config.name, config.environment, "role", config.region);

        let managed: Vec<String> = DEFAULT_IAM_ROLE_MANAGED_POLICY_ARNS
            .iter()
            .map(|arn| arn.to_string())
            .chain(self.managed_policy_arns.iter().cloned())
            .collect();

        let descriptor = ResourceDescriptor::new(ResourceKind::IamRole, self.logical_id.as_str())
            .attr("name", role_name.as_str())
            .attr("assume_role_policy", self.assume_role_policy.to_string())
            .attr("managed_policy_arns", managed)
            .tags(resolver.resolve_with([("resourceType", "role")])?);
        debug!("IAM role {}", role_name);

        Ok(IamRole { descriptor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstack_config::{ConfigBuilder, Environment, Region, Vendor};

    fn test_config() -> Config {
        ConfigBuilder::new()
            .with_name("Movie Service")
            .with_resource_type("stack")
            .with_environment(Environment::Production)
            .with_region(Region::EuropeWest)
            .with_vendor(Vendor::Aws)
            .with_terraform_config("ws", "org", None)
            .with_aws_account_id("123456789012")
            .build()
            .unwrap()
    }

    #[test]
    fn test_kms_alias_and_policy() {
        let kms = KmsBuilder::new(&test_config()).build().unwrap();

        assert_eq!(kms.alias_name(), Some("alias/movieservice-prod-kmskey"));
        assert_eq!(kms.key.name(), "movieservice-prod-kmskey-euw");
        assert_eq!(kms.key.tags.get("layer"), Some("security"));
        let policy = kms.key.attribute("policy").and_then(Value::as_str).unwrap();
        assert!(policy.contains("arn:aws:iam::123456789012:root"));
        assert!(policy.contains("secretsmanager.amazonaws.com"));
        assert_eq!(kms.alias.depends_on, vec!["aws_kms_key.kms-key".to_string()]);
    }

    #[test]
    fn test_secret_names_and_versions() {
        let secrets = SecretsBuilder::new(
            &test_config(),
            vec![
                SecretSpec::new("api").with_secret_string("{}"),
                SecretSpec::new("empty").with_description("no value"),
            ],
        )
        .with_kms_key_id(Some("${aws_kms_key.kms-key.id}".to_string()))
        .build()
        .unwrap();

        assert_eq!(secrets.names(), vec!["movieservice/prod/api", "movieservice/prod/empty"]);
        assert_eq!(secrets.versions.len(), 1);
        assert_eq!(secrets.versions[0].logical_id, "secret-version-0");
        assert!(secrets.secrets.iter().all(|s| s.attribute("kms_key_id").is_some()));
        assert_eq!(secrets.secrets[0].tags.get("resourceType"), Some("secret"));
    }

    #[test]
    fn test_secret_without_kms_key() {
        let secrets = SecretsBuilder::new(&test_config(), vec![SecretSpec::new("api")])
            .build()
            .unwrap();
        assert!(secrets.secrets[0].attribute("kms_key_id").is_none());
        assert!(secrets.versions.is_empty());
    }

    #[test]
    fn test_role_name_and_policies() {
        let config = test_config();
        let role = IamRoleBuilder::new(
            &config.with_name(format!("{}-cluster", config.name)),
            "cluster-role",
            assume_role_policy("eks.amazonaws.com"),
        )
        .with_managed_policy_arns(EKS_CLUSTER_POLICY_ARNS)
        .build()
        .unwrap();

        assert_eq!(role.name(), Some("movieservicecluster-prod-role-euw"));
        let managed = role.descriptor.attribute("managed_policy_arns").unwrap();
        assert_eq!(managed[0], DEFAULT_IAM_ROLE_MANAGED_POLICY_ARNS[0]);
        assert_eq!(managed[1], EKS_CLUSTER_POLICY_ARNS[0]);
    }
}
