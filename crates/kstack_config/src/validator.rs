//! Configuration validation.
//!
//! Checks run in a fixed order and stop at the first violation, so a
//! configuration with several problems always reports the same one.

use std::net::Ipv4Addr;

use serde_json::Value;
use tracing::debug;

use crate::enums::{Environment, Region, Vendor};
use crate::error::{ConfigError, ConfigResult};
use crate::models::Config;

const REQUIRED_NON_EMPTY: &str = "is required and cannot be empty.";
const REQUIRED: &str = "is required.";
const REQUIRED_BOOLEAN: &str = "is required and must be a boolean.";
const TAGS_MAPPING: &str = "must be an object with string values if provided.";
const VALID_CIDR: &str = "must be a valid IPv4 CIDR block.";
const VALID_ENVIRONMENT: &str = "must be one of: others, development, staging, production.";
const VALID_REGION: &str =
    "must be one of: OTHERS, AUSTRALIA_EAST, US_EAST, ASIA_SOUTHEAST, EUROPE_WEST.";
const VALID_VENDOR: &str = "must be one of: OTHERS, ON_PREMISES, AWS, AZURE, GCP.";

/// Validator for [`Config`] values and raw configuration documents.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a typed configuration.
    ///
    /// Enum, boolean and tag-shape requirements are already guaranteed by the
    /// type; [`ConfigValidator::validate_document`] covers them for untyped
    /// input.
    pub fn validate(config: &Config) -> ConfigResult<()> {
        require_non_empty("name", &config.name)?;
        require_non_empty("resourceType", &config.resource_type)?;
        require_non_empty("terraformOrganisation", &config.terraform_organisation)?;
        require_non_empty("terraformWorkspace", &config.terraform_workspace)?;
        require_non_empty("terraformHostname", &config.terraform_hostname)?;

        Self::validate_network(config)?;

        debug!("Config '{}' passed validation", config.name);
        Ok(())
    }

    /// Validate an untyped configuration document before deserialization.
    pub fn validate_document(doc: &Value) -> ConfigResult<()> {
        let Some(obj) = doc.as_object() else {
            return Err(ConfigError::validation("config", "must be an object."));
        };

        for field in ["name", "resourceType"] {
            require_non_empty_value(field, obj.get(field))?;
        }

        require_enum(obj.get("environment"), "environment", VALID_ENVIRONMENT, |s| {
            Environment::all().iter().any(|v| v.as_str() == s)
        })?;
        require_enum(obj.get("region"), "region", VALID_REGION, |s| {
            Region::all().iter().any(|v| v.as_str() == s)
        })?;
        require_enum(obj.get("vendor"), "vendor", VALID_VENDOR, |s| {
            Vendor::all().iter().any(|v| v.as_str() == s)
        })?;

        for field in [
            "terraformOrganisation",
            "terraformWorkspace",
            "terraformHostname",
        ] {
            require_non_empty_value(field, obj.get(field))?;
        }

        for field in ["enableEncryption", "enableSecretsManager"] {
            if !matches!(obj.get(field), Some(Value::Bool(_))) {
                return Err(ConfigError::validation(field, REQUIRED_BOOLEAN));
            }
        }

        if let Some(tags) = obj.get("tags") {
            let is_mapping = tags
                .as_object()
                .is_some_and(|map| map.values().all(|v| !v.is_array() && !v.is_object()));
            if !is_mapping {
                return Err(ConfigError::validation("tags", TAGS_MAPPING));
            }
        }

        Ok(())
    }

    fn validate_network(config: &Config) -> ConfigResult<()> {
        if let Some(cidr) = &config.vpc_cidr_block {
            require_cidr("vpcCIDRBlock".to_string(), cidr)?;
        }
        for (i, cidr) in config.public_subnets().iter().enumerate() {
            require_cidr(format!("publicSubnetCIDRBlocks[{}]", i), cidr)?;
        }
        for (i, cidr) in config.private_subnets().iter().enumerate() {
            require_cidr(format!("privateSubnetCIDRBlocks[{}]", i), cidr)?;
        }
        Ok(())
    }
}

/// Whether `cidr` is an IPv4 address with a prefix length of 0 to 32.
pub fn is_ipv4_cidr(cidr: &str) -> bool {
    let Some((addr, prefix)) = cidr.trim().split_once('/') else {
        return false;
    };
    addr.parse::<Ipv4Addr>().is_ok() && prefix.parse::<u8>().is_ok_and(|p| p <= 32)
}

fn require_non_empty(field: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::validation(field, REQUIRED_NON_EMPTY));
    }
    Ok(())
}

fn require_non_empty_value(field: &str, value: Option<&Value>) -> ConfigResult<()> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::validation(field, REQUIRED_NON_EMPTY)),
    }
}

/// `value` must be one of the exact serialized spellings accepted by `known`.
fn require_enum(
    value: Option<&Value>,
    field: &str,
    allowed: &'static str,
    known: impl Fn(&str) -> bool,
) -> ConfigResult<()> {
    match value {
        None | Some(Value::Null) => Err(ConfigError::validation(field, REQUIRED)),
        Some(Value::String(s)) if known(s) => Ok(()),
        Some(_) => Err(ConfigError::validation(field, allowed)),
    }
}

fn require_cidr(field: String, cidr: &str) -> ConfigResult<()> {
    if !is_ipv4_cidr(cidr) {
        return Err(ConfigError::validation(field, VALID_CIDR));
    }
    Ok(())
}
