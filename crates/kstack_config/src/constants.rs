//! Service-wide defaults.

pub const DEFAULT_SERVICE_NAME: &str = "case-studies-kubernetes";
pub const DEFAULT_SERVICE_VERSION: &str = "0.0.1";
pub const DEFAULT_SERVICE_LAYER: &str = "infrastructure";
pub const DEFAULT_SERVICE_RESOURCE_TYPE: &str = "stack";

pub const DEFAULT_TERRAFORM_HOSTNAME: &str = "app.terraform.io";

pub const DEFAULT_VPC_CIDR_BLOCK: &str = "10.0.0.0/16";
pub const DEFAULT_VPC_PUBLIC_SUBNET_CIDR_BLOCKS: [&str; 3] =
    ["10.0.101.0/24", "10.0.102.0/24", "10.0.103.0/24"];
pub const DEFAULT_VPC_PRIVATE_SUBNET_CIDR_BLOCKS: [&str; 3] =
    ["10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"];

pub const DEFAULT_EKS_VERSION: &str = "1.31";
pub const DEFAULT_EKS_CONTROL_PLANE_LOG_TYPES: [&str; 5] = [
    "api",
    "audit",
    "authenticator",
    "controllerManager",
    "scheduler",
];
/// Core add-ons installed on every cluster, as (name, version).
pub const DEFAULT_EKS_CORE_ADD_ONS: [(&str, &str); 4] = [
    ("coredns", "v1.11.3-eksbuild.2"),
    ("eks-pod-identity-agent", "v1.3.4-eksbuild.1"),
    ("kube-proxy", "v1.31.2-eksbuild.3"),
    ("vpc-cni", "v1.19.0-eksbuild.1"),
];

pub const DEFAULT_EKS_NODEGROUP_INSTANCE_TYPES: [&str; 2] = ["t3.medium", "t3.large"];
pub const DEFAULT_EKS_NODEGROUP_IMAGE_ID: &str = "ami-0e4e4b2b7e3a1f2a9";
