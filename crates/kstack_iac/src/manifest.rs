//! Stack manifest handed to the provisioning backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IacResult;
use crate::resource::{OutputDescriptor, ResourceDescriptor};
use crate::stack::{Stack, StackKind};

/// Manifest rendering format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestFormat {
    #[default]
    Json,
    Yaml,
}

impl ManifestFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ManifestFormat::Json),
            "yaml" | "yml" => Some(ManifestFormat::Yaml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestFormat::Json => "json",
            ManifestFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Remote state coordinates. Carried through, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBackend {
    pub hostname: String,
    pub organization: String,
    pub workspace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackManifest {
    pub name: String,
    pub kind: StackKind,
    pub description: String,
    pub backend: RemoteBackend,
    pub resources: Vec<ResourceDescriptor>,
    pub outputs: Vec<OutputDescriptor>,
}

impl StackManifest {
    pub fn from_stack(stack: &Stack) -> Self {
        let config = &stack.config;
        Self {
            name: stack.name.clone(),
            kind: stack.kind,
            description: stack.description.clone(),
            backend: RemoteBackend {
                hostname: config.terraform_hostname.clone(),
                organization: config.terraform_organisation.clone(),
                workspace: config.terraform_workspace.clone(),
            },
            resources: stack.resources().into_iter().cloned().collect(),
            outputs: stack.outputs.clone(),
        }
    }

    pub fn resource(&self, address: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.address() == address)
    }

    pub fn to_json(&self) -> IacResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> IacResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn render(&self, format: ManifestFormat) -> IacResult<String> {
        match format {
            ManifestFormat::Json => self.to_json(),
            ManifestFormat::Yaml => self.to_yaml(),
        }
    }
}
