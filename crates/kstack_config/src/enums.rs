//! Enumerated configuration vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Deployment stage of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Others,
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Others => "others",
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "others" => Some(Environment::Others),
            "development" => Some(Environment::Development),
            "staging" => Some(Environment::Staging),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Environment::Others,
            Environment::Development,
            Environment::Staging,
            Environment::Production,
        ]
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Geographic region, independent of any vendor's own region naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    #[default]
    Others,
    AustraliaEast,
    UsEast,
    AsiaSoutheast,
    EuropeWest,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Others => "OTHERS",
            Region::AustraliaEast => "AUSTRALIA_EAST",
            Region::UsEast => "US_EAST",
            Region::AsiaSoutheast => "ASIA_SOUTHEAST",
            Region::EuropeWest => "EUROPE_WEST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OTHERS" => Some(Region::Others),
            "AUSTRALIA_EAST" => Some(Region::AustraliaEast),
            "US_EAST" => Some(Region::UsEast),
            "ASIA_SOUTHEAST" => Some(Region::AsiaSoutheast),
            "EUROPE_WEST" => Some(Region::EuropeWest),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Region::Others,
            Region::AustraliaEast,
            Region::UsEast,
            Region::AsiaSoutheast,
            Region::EuropeWest,
        ]
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Infrastructure vendor. Only [`Vendor::Aws`] is supported by the resource builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Vendor {
    #[default]
    Others,
    OnPremises,
    Aws,
    Azure,
    Gcp,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Others => "OTHERS",
            Vendor::OnPremises => "ON_PREMISES",
            Vendor::Aws => "AWS",
            Vendor::Azure => "AZURE",
            Vendor::Gcp => "GCP",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OTHERS" => Some(Vendor::Others),
            "ON_PREMISES" => Some(Vendor::OnPremises),
            "AWS" => Some(Vendor::Aws),
            "AZURE" => Some(Vendor::Azure),
            "GCP" => Some(Vendor::Gcp),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Vendor::Others,
            Vendor::OnPremises,
            Vendor::Aws,
            Vendor::Azure,
            Vendor::Gcp,
        ]
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Data confidentiality classification carried as a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidentiality {
    Public,
    Internal,
    Confidential,
    Restricted,
    HighlyRestricted,
    TopSecret,
}

impl Confidentiality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidentiality::Public => "PUBLIC",
            Confidentiality::Internal => "INTERNAL",
            Confidentiality::Confidential => "CONFIDENTIAL",
            Confidentiality::Restricted => "RESTRICTED",
            Confidentiality::HighlyRestricted => "HIGHLY_RESTRICTED",
            Confidentiality::TopSecret => "TOP_SECRET",
        }
    }
}

/// Business criticality carried as a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criticality {
    None,
    Low,
    Medium,
    High,
    Critical,
    MissionCritical,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::None => "NONE",
            Criticality::Low => "LOW",
            Criticality::Medium => "MEDIUM",
            Criticality::High => "HIGH",
            Criticality::Critical => "CRITICAL",
            Criticality::MissionCritical => "MISSION_CRITICAL",
        }
    }
}

/// Network tier a node group is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeNetwork {
    Private,
    Public,
}

impl NodeNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeNetwork::Private => "private",
            NodeNetwork::Public => "public",
        }
    }
}

impl fmt::Display for NodeNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compute purchasing model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeCapacityType {
    Spot,
    #[default]
    OnDemand,
}

impl NodeCapacityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeCapacityType::Spot => "SPOT",
            NodeCapacityType::OnDemand => "ON_DEMAND",
        }
    }
}

impl fmt::Display for NodeCapacityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeInstanceFamily {
    Cpu,
    Gpu,
}

impl NodeInstanceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeInstanceFamily::Cpu => "cpu",
            NodeInstanceFamily::Gpu => "gpu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeInstanceSize {
    Small,
    Medium,
    Large,
}

impl NodeInstanceSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeInstanceSize::Small => "small",
            NodeInstanceSize::Medium => "medium",
            NodeInstanceSize::Large => "large",
        }
    }
}
