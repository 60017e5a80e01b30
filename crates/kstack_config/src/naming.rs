//! Identifier cleaning and short codes used in generated resource names.

use tracing::warn;

use crate::enums::{Environment, Region};

/// Keep only ASCII letters and digits, lower-cased.
pub fn clean_string(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn clean_environment(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev",
        Environment::Staging => "stg",
        Environment::Production => "prod",
        Environment::Others => "o",
    }
}

/// Short code for an environment given as free text (for example a tag
/// override). Unknown values fall back to `dev` with a warning.
pub fn clean_environment_str(env: &str) -> &'static str {
    match Environment::from_str(env) {
        Some(env) => clean_environment(env),
        None => {
            warn!("Unknown environment '{}', falling back to 'dev'", env);
            "dev"
        }
    }
}

pub fn clean_region(region: Region) -> &'static str {
    match region {
        Region::AustraliaEast => "aue",
        Region::UsEast => "use",
        Region::AsiaSoutheast => "ase",
        Region::EuropeWest => "euw",
        Region::Others => "o",
    }
}

/// Short code for a region given as free text. Unknown values fall back to
/// `o` with a warning.
pub fn clean_region_str(region: &str) -> &'static str {
    match Region::from_str(region) {
        Some(region) => clean_region(region),
        None => {
            warn!("Unknown region '{}', falling back to 'o'", region);
            "o"
        }
    }
}

/// `clean(name)-<env>-<kind>-<region>`, the naming scheme shared by clusters,
/// roles, security groups and node groups.
pub fn resource_name(name: &str, env: Environment, kind: &str, region: Region) -> String {
    format!(
        "{}-{}-{}-{}",
        clean_string(name),
        clean_environment(env),
        kind,
        clean_region(region)
    )
}
