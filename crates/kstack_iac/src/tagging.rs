//! Tag resolution.
//!
//! A [`TagResolver`] merges four layers of tags, each filtered before the
//! next is applied on top:
//!
//! 1. service-wide base defaults,
//! 2. configuration properties whose key is a base key, then `config.tags`,
//! 3. tags fixed when the resolver was constructed,
//! 4. call-site tags passed to [`TagResolver::resolve`].
//!
//! Later layers win on key collision. The reserved `Name` tag is always
//! computed from the merged set and is never taken from any layer.

use kstack_config::constants::{DEFAULT_SERVICE_LAYER, DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_VERSION};
use kstack_config::{
    clean_environment_str, clean_region, clean_string, Config, ConfigValidator, Confidentiality,
    Criticality, Region, Tags, Vendor,
};
use tracing::debug;

use crate::error::{IacError, IacResult};
use crate::resource::TagSet;

const NAME: &str = "name";
const NAME_SUFFIX: &str = "nameSuffix";
const RESOURCE_TYPE: &str = "resourceType";
const ENVIRONMENT: &str = "environment";

const EMPTY_NAME: &str = "Name cannot be empty. Please provide a valid name for the resource.";
const EMPTY_RESOURCE_TYPE: &str =
    "Resource type cannot be empty. Please provide a valid resource type for the resource.";

/// Keys of the base layer. Configuration properties outside this list never
/// become tags.
pub const BASE_TAG_KEYS: [&str; 15] = [
    "name",
    "environment",
    "version",
    "layer",
    "vendor",
    "region",
    "confidentiality",
    "criticality",
    "owner",
    "project",
    "costCenter",
    "compliance",
    "customer",
    "runningSchedule",
    "backupSchedule",
];

/// Build a tag map from literal pairs.
pub fn tags<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Tags
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A value survives a layer boundary only if it is non-empty after trimming.
fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

fn merge_valid<'a>(target: &mut Tags, layer: impl IntoIterator<Item = (&'a str, &'a str)>) {
    for (key, value) in layer {
        if is_valid_value(value) {
            target.insert(key.to_string(), value.to_string());
        }
    }
}

/// Resolves the tag set of one construct.
#[derive(Debug, Clone)]
pub struct TagResolver {
    config: Config,
    construct_tags: Tags,
}

impl TagResolver {
    pub fn new(config: Config, construct_tags: Tags) -> Self {
        Self {
            config,
            construct_tags,
        }
    }

    /// Resolver without construct-level tags.
    pub fn for_config(config: Config) -> Self {
        Self::new(config, Tags::new())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn construct_tags(&self) -> &Tags {
        &self.construct_tags
    }

    /// Layer 1: fixed defaults, rendered as strings.
    pub fn base_tags(&self) -> Tags {
        tags([
            (NAME, DEFAULT_SERVICE_NAME),
            (ENVIRONMENT, self.config.environment.as_str()),
            ("version", DEFAULT_SERVICE_VERSION),
            ("layer", DEFAULT_SERVICE_LAYER),
            ("vendor", Vendor::Others.as_str()),
            ("region", Region::Others.as_str()),
            ("confidentiality", Confidentiality::Internal.as_str()),
            ("criticality", Criticality::Medium.as_str()),
            ("owner", ""),
            ("project", ""),
            ("costCenter", ""),
            ("compliance", ""),
            ("customer", "internal"),
            ("runningSchedule", "all the time"),
            ("backupSchedule", ""),
        ])
    }

    /// Layer 2: allow-listed configuration properties, then `config.tags`.
    pub fn config_tags(&self) -> Tags {
        let mut layer = Tags::new();
        let properties = self.config.scalar_properties();
        merge_valid(
            &mut layer,
            properties
                .iter()
                .filter(|(key, _)| BASE_TAG_KEYS.contains(key))
                .map(|(key, value)| (*key, value.as_str())),
        );
        if let Some(config_tags) = &self.config.tags {
            merge_valid(
                &mut layer,
                config_tags.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }
        layer
    }

    /// Merge all layers under `call_site` and compute the `Name` tag.
    ///
    /// Fails if the configuration is invalid, or if the effective name or
    /// resource type is empty.
    pub fn resolve(&self, call_site: &Tags) -> IacResult<TagSet> {
        ConfigValidator::validate(&self.config)?;
        self.check_identity(call_site)?;

        let mut merged = Tags::new();
        for layer in [
            self.base_tags(),
            self.config_tags(),
            self.construct_tags.clone(),
            call_site.clone(),
        ] {
            merge_valid(&mut merged, layer.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let mut name = merged
            .remove(NAME)
            .unwrap_or_else(|| self.config.name.clone());
        if let Some(suffix) = merged.remove(NAME_SUFFIX) {
            name = format!("{}-{}", name, suffix);
        }

        let env_code = merged
            .get(ENVIRONMENT)
            .map(|env| clean_environment_str(env))
            .unwrap_or("dev");
        let resource_type = self.effective_resource_type(call_site);

        let resource_name = format!(
            "{}-{}-{}-{}",
            clean_string(&name),
            env_code,
            clean_string(resource_type),
            clean_region(self.config.region)
        );
        debug!("Resolved tags for {}", resource_name);
        merged.insert(TagSet::NAME_KEY.to_string(), resource_name);

        Ok(TagSet::from(merged))
    }

    /// Resolve with literal call-site pairs.
    pub fn resolve_with<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> IacResult<TagSet>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.resolve(&tags(pairs))
    }

    fn effective_resource_type<'a>(&'a self, call_site: &'a Tags) -> &'a str {
        call_site
            .get(RESOURCE_TYPE)
            .map(String::as_str)
            .unwrap_or(self.config.resource_type.as_str())
    }

    fn check_identity(&self, call_site: &Tags) -> IacResult<()> {
        let name = call_site
            .get(NAME)
            .map(String::as_str)
            .unwrap_or(self.config.name.as_str());
        if !is_valid_value(name) {
            return Err(IacError::TagResolution(EMPTY_NAME.to_string()));
        }
        if !is_valid_value(self.effective_resource_type(call_site)) {
            return Err(IacError::TagResolution(EMPTY_RESOURCE_TYPE.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstack_config::{ConfigBuilder, ConfigError, Environment, Region, Vendor};

    fn test_config() -> Config {
        ConfigBuilder::new()
            .with_name("test-vpc")
            .with_resource_type("vpc")
            .with_environment(Environment::Development)
            .with_region(Region::AustraliaEast)
            .with_vendor(Vendor::Aws)
            .with_terraform_config("test-workspace", "test-org", None)
            .build()
            .unwrap()
    }

    #[test]
    fn test_name_tag_from_config() {
        let resolved = TagResolver::for_config(test_config()).resolve(&Tags::new()).unwrap();
        assert_eq!(resolved.name(), "testvpc-dev-vpc-aue");
    }

    #[test]
    fn test_base_and_config_layers() {
        let resolved = TagResolver::for_config(test_config()).resolve(&Tags::new()).unwrap();

        assert_eq!(resolved.get("environment"), Some("development"));
        assert_eq!(resolved.get("vendor"), Some("AWS"));
        assert_eq!(resolved.get("region"), Some("AUSTRALIA_EAST"));
        assert_eq!(resolved.get("confidentiality"), Some("INTERNAL"));
        assert_eq!(resolved.get("criticality"), Some("MEDIUM"));
        assert_eq!(resolved.get("customer"), Some("internal"));
        assert_eq!(resolved.get("runningSchedule"), Some("all the time"));
        assert_eq!(resolved.get("layer"), Some(DEFAULT_SERVICE_LAYER));
        // empty defaults and non-allow-listed properties are absent
        assert!(!resolved.contains_key("owner"));
        assert!(!resolved.contains_key("backupSchedule"));
        assert!(!resolved.contains_key("terraformWorkspace"));
        assert!(!resolved.contains_key("resourceType"));
        // name inputs never leak into the output
        assert!(!resolved.contains_key("name"));
    }

    #[test]
    fn test_name_suffix_and_resource_type_override() {
        let resolver = TagResolver::for_config(test_config());
        let resolved = resolver
            .resolve_with([("nameSuffix", "pub"), ("resourceType", "subnet")])
            .unwrap();

        assert_eq!(resolved.name(), "testvpcpub-dev-subnet-aue");
        assert!(!resolved.contains_key("nameSuffix"));
        assert_eq!(resolved.get("resourceType"), Some("subnet"));
    }

    #[test]
    fn test_precedence() {
        let config = ConfigBuilder::new()
            .with_name("svc")
            .with_resource_type("stack")
            .with_environment(Environment::Production)
            .with_region(Region::UsEast)
            .with_vendor(Vendor::Aws)
            .with_terraform_config("ws", "org", None)
            .with_tag("owner", "config-owner")
            .with_tag("project", "config-project")
            .with_tag("team", "config-team")
            .build()
            .unwrap();
        let resolver = TagResolver::new(config, tags([("project", "construct"), ("team", "construct")]));
        let resolved = resolver.resolve_with([("team", "call-site")]).unwrap();

        assert_eq!(resolved.get("owner"), Some("config-owner"));
        assert_eq!(resolved.get("project"), Some("construct"));
        assert_eq!(resolved.get("team"), Some("call-site"));
        assert_eq!(resolved.name(), "svc-prod-stack-use");
    }

    #[test]
    fn test_blank_values_do_not_override() {
        let resolver = TagResolver::new(test_config(), tags([("customer", "   ")]));
        let resolved = resolver.resolve_with([("layer", "")]).unwrap();

        assert_eq!(resolved.get("customer"), Some("internal"));
        assert_eq!(resolved.get("layer"), Some(DEFAULT_SERVICE_LAYER));
    }

    #[test]
    fn test_environment_override_changes_only_env_code() {
        let resolver = TagResolver::for_config(test_config());
        let resolved = resolver.resolve_with([("environment", "production")]).unwrap();
        assert_eq!(resolved.name(), "testvpc-prod-vpc-aue");

        let unknown = resolver.resolve_with([("environment", "qa")]).unwrap();
        assert_eq!(unknown.name(), "testvpc-dev-vpc-aue");
    }

    #[test]
    fn test_empty_call_site_name_is_rejected() {
        let resolver = TagResolver::for_config(test_config());
        let err = resolver.resolve_with([("name", "  ")]).unwrap_err();
        assert_eq!(err.to_string(), EMPTY_NAME);
    }

    #[test]
    fn test_empty_resource_type_is_rejected() {
        let resolver = TagResolver::for_config(test_config());
        let err = resolver.resolve_with([("resourceType", "")]).unwrap_err();
        assert!(err.to_string().starts_with("Resource type cannot be empty"));
    }

    #[test]
    fn test_invalid_config_fails_first() {
        let mut config = test_config();
        config.terraform_workspace = String::new();
        let err = TagResolver::for_config(config)
            .resolve_with([("name", "")])
            .unwrap_err();
        assert!(matches!(
            err,
            IacError::Config(ConfigError::Validation { ref field, .. }) if field == "terraformWorkspace"
        ));
    }
}
