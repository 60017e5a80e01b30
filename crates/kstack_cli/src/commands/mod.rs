//! CLI command definitions.
//!
//! Every command starts from a [`ConfigArgs`]: either a configuration file or
//! flags and environment variables describing one environment.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use kstack_config::constants::{
    DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_RESOURCE_TYPE, DEFAULT_VPC_CIDR_BLOCK,
    DEFAULT_VPC_PRIVATE_SUBNET_CIDR_BLOCKS, DEFAULT_VPC_PUBLIC_SUBNET_CIDR_BLOCKS,
};
use kstack_config::{
    Config, ConfigBuilder, ConfigLoader, ConfigValidator, Environment, NodeSettings, Region, Vendor,
};
use kstack_iac::ManifestFormat;

pub mod synth;
pub mod tags;
pub mod validate;

/// kstack - declarative infrastructure composition
#[derive(Parser)]
#[command(name = "kstack")]
#[command(version, about = "kstack - declarative infrastructure composition")]
#[command(long_about = r#"
kstack derives a dependency-ordered graph of infrastructure resources
(network, security primitives, Kubernetes cluster and node groups) from one
environment configuration, each with a stable name and resolved tags.

COMMANDS:
  validate  → Validate a configuration
  tags      → Resolve the tag set of one resource
  synth     → Compose the stack and print its manifest

CONFIGURATION:
  Pass --config <file> (.yaml, .yml, .json, .toml), or describe the
  environment with flags. ENVIRONMENT, REGION, VENDOR,
  TERRAFORM_ORGANISATION, TERRAFORM_WORKSPACE, TERRAFORM_HOSTNAME and
  AWS_ACCOUNT_ID are read from the environment.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  5 - IaC error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an environment configuration
    Validate(validate::ValidateArgs),

    /// Resolve the tags of a resource
    Tags(tags::TagsArgs),

    /// Compose the stack and emit its manifest
    Synth(synth::SynthArgs),
}

/// Where the configuration comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Configuration file; flags below are ignored when set
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Service name
    #[arg(long, default_value = DEFAULT_SERVICE_NAME)]
    pub name: String,

    /// Resource type of the stack
    #[arg(long, default_value = DEFAULT_SERVICE_RESOURCE_TYPE)]
    pub resource_type: String,

    /// Deployment environment (development, production, ...)
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Region (AUSTRALIA_EAST, US_EAST, ASIA_SOUTHEAST, EUROPE_WEST, OTHERS)
    #[arg(long, env = "REGION")]
    pub region: Option<String>,

    /// Vendor (AWS, AZURE, GCP, ON_PREMISES, OTHERS)
    #[arg(long, env = "VENDOR")]
    pub vendor: Option<String>,

    #[arg(long, env = "TERRAFORM_ORGANISATION")]
    pub terraform_organisation: Option<String>,

    /// Defaults to <name>-<environment>
    #[arg(long, env = "TERRAFORM_WORKSPACE")]
    pub terraform_workspace: Option<String>,

    #[arg(long, env = "TERRAFORM_HOSTNAME")]
    pub terraform_hostname: Option<String>,

    #[arg(long, env = "AWS_ACCOUNT_ID")]
    pub aws_account_id: Option<String>,

    /// Add a Kubernetes cluster with a private on-demand node group
    #[arg(long)]
    pub kubernetes: bool,

    /// Add spot node groups next to the on-demand ones
    #[arg(long, requires = "kubernetes")]
    pub spot: bool,
}

impl ConfigArgs {
    /// Load or assemble the configuration and validate it.
    pub fn load(&self) -> Result<Config> {
        if let Some(path) = &self.config {
            info!("Loading configuration from {:?}", path);
            return ConfigLoader::from_path(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()));
        }

        let config = self.assemble()?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Build a configuration from flags. Development stacks get a public
    /// subnet tier; every stack gets the default private tier.
    fn assemble(&self) -> Result<Config> {
        let environment = parse_enum(&self.environment, "environment", Environment::from_str)?;
        let region = parse_enum(required(&self.region, "REGION")?, "region", Region::from_str)?;
        let vendor = parse_enum(required(&self.vendor, "VENDOR")?, "vendor", Vendor::from_str)?;
        let organisation = required(&self.terraform_organisation, "TERRAFORM_ORGANISATION")?;
        let workspace = self
            .terraform_workspace
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.name, environment));

        let mut builder = ConfigBuilder::new()
            .with_name(self.name.as_str())
            .with_resource_type(self.resource_type.as_str())
            .with_environment(environment)
            .with_region(region)
            .with_vendor(vendor)
            .with_cidr_block(DEFAULT_VPC_CIDR_BLOCK)
            .with_private_subnet_cidr_blocks(DEFAULT_VPC_PRIVATE_SUBNET_CIDR_BLOCKS)
            .with_terraform_config(workspace, organisation, self.terraform_hostname.clone());

        if environment == Environment::Development {
            builder = builder
                .with_public_subnet_cidr_blocks(DEFAULT_VPC_PUBLIC_SUBNET_CIDR_BLOCKS)
                .with_nat_gateway(true);
        }

        if vendor == Vendor::Aws {
            let account_id = required(&self.aws_account_id, "AWS_ACCOUNT_ID")?;
            builder = builder.with_aws_account_id(account_id);
        }

        if self.kubernetes {
            builder = builder.with_node_settings(NodeSettings {
                enable_spot_nodes: self.spot,
                ..NodeSettings::default()
            });
        }

        debug!("Assembled configuration for {} ({})", self.name, environment);
        Ok(builder.build()?)
    }
}

fn required<'a>(value: &'a Option<String>, variable: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("Missing required argument: {} is not set", variable))
}

fn parse_enum<T>(value: &str, what: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| anyhow!("Invalid argument: unknown {} '{}'", what, value))
}

/// Parse a `key=value` pair.
pub fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

pub fn parse_format(s: &str) -> std::result::Result<ManifestFormat, String> {
    ManifestFormat::from_str(s).ok_or_else(|| format!("unsupported format '{}', use json or yaml", s))
}

pub(crate) fn ensure_parent(path: &std::path::Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            bail!("Output directory not found: {}", parent.display())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn flags() -> ConfigArgs {
        ConfigArgs {
            name: "movies".to_string(),
            resource_type: "stack".to_string(),
            environment: "development".to_string(),
            region: Some("AUSTRALIA_EAST".to_string()),
            vendor: Some("AWS".to_string()),
            terraform_organisation: Some("acme".to_string()),
            aws_account_id: Some("123456789012".to_string()),
            ..ConfigArgs::default()
        }
    }

    #[test]
    fn test_assemble_development() {
        let config = flags().load().unwrap();
        assert_eq!(config.terraform_workspace, "movies-development");
        assert_eq!(config.public_subnets().len(), 3);
        assert_eq!(config.private_subnets().len(), 3);
        assert_eq!(config.aws_account_id(), Some("123456789012"));
        assert!(config.kubernetes.is_none());
    }

    #[test]
    fn test_assemble_production_has_no_public_tier() {
        let args = ConfigArgs {
            environment: "production".to_string(),
            kubernetes: true,
            ..flags()
        };
        let config = args.load().unwrap();
        assert!(config.public_subnets().is_empty());
        assert!(config.kubernetes.is_some());
    }

    #[test]
    fn test_missing_region_is_argument_error() {
        let args = ConfigArgs {
            region: None,
            ..flags()
        };
        let err = args.load().unwrap_err();
        assert!(err.to_string().contains("REGION"));
    }

    #[test]
    fn test_unknown_vendor_rejected() {
        let args = ConfigArgs {
            vendor: Some("IBM".to_string()),
            ..flags()
        };
        assert!(args.load().unwrap_err().to_string().contains("unknown vendor"));
    }

    #[test]
    fn test_aws_requires_account_id() {
        let args = ConfigArgs {
            aws_account_id: None,
            ..flags()
        };
        assert!(args.load().unwrap_err().to_string().contains("AWS_ACCOUNT_ID"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env.yaml");
        fs::write(
            &path,
            r#"
name: movies
resourceType: stack
environment: production
region: US_EAST
vendor: AWS
terraformOrganisation: acme
terraformWorkspace: movies-production
terraformHostname: app.terraform.io
enableEncryption: true
enableSecretsManager: false
"#,
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(path),
            ..ConfigArgs::default()
        };
        let config = args.load().unwrap();
        assert_eq!(config.region, Region::UsEast);
        assert!(!config.enable_secrets_manager);
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("owner=platform").unwrap(),
            ("owner".to_string(), "platform".to_string())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("owner").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
