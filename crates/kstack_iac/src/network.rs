//! Network topology.
//!
//! [`NetworkBuilder`] derives the VPC and everything around it from the
//! configuration. The shape of the result depends only on whether the public
//! and private CIDR lists are non-empty and on the NAT flag.

use std::fmt;

use kstack_config::{Config, Tags};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{IacError, IacResult};
use crate::resource::{OutputDescriptor, ResourceDescriptor, ResourceKind, ResourceRef};
use crate::tagging::TagResolver;
use crate::vendor::{availability_zone, aws_region};

const ANY_IPV4: &str = "0.0.0.0/0";

/// Public or private subnet classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetTier {
    Public,
    Private,
}

impl SubnetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetTier::Public => "public",
            SubnetTier::Private => "private",
        }
    }

    fn name_suffix(&self) -> &'static str {
        match self {
            SubnetTier::Public => "pub",
            SubnetTier::Private => "priv",
        }
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subnet with its placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub descriptor: ResourceDescriptor,
    pub tier: SubnetTier,
    pub cidr_block: String,
    pub availability_zone: String,
}

impl Subnet {
    pub fn logical_id(&self) -> &str {
        &self.descriptor.logical_id
    }

    pub fn id(&self) -> String {
        self.descriptor.id()
    }

    /// A subnet answers to its logical id and to its id interpolation.
    fn matches(&self, id: &str) -> bool {
        self.descriptor.logical_id == id || self.descriptor.id() == id
    }
}

/// Everything the network step produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTopology {
    pub vpc: ResourceDescriptor,
    pub default_route_table: ResourceDescriptor,
    pub public_subnets: Vec<Subnet>,
    pub private_subnets: Vec<Subnet>,
    pub internet_gateway: Option<ResourceDescriptor>,
    pub public_route_table: Option<ResourceDescriptor>,
    pub private_route_table: Option<ResourceDescriptor>,
    pub nat_elastic_ips: Vec<ResourceDescriptor>,
    pub nat_gateways: Vec<ResourceDescriptor>,
    pub routes: Vec<ResourceDescriptor>,
    pub route_table_associations: Vec<ResourceDescriptor>,
    pub security_groups: Vec<ResourceDescriptor>,
    pub security_group_rules: Vec<ResourceDescriptor>,
    pub outputs: Vec<OutputDescriptor>,
}

impl NetworkTopology {
    pub fn subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.public_subnets.iter().chain(self.private_subnets.iter())
    }

    pub fn subnets_in(&self, tier: SubnetTier) -> &[Subnet] {
        match tier {
            SubnetTier::Public => &self.public_subnets,
            SubnetTier::Private => &self.private_subnets,
        }
    }

    /// Id interpolations of every subnet in `tier`.
    pub fn subnet_ids(&self, tier: SubnetTier) -> Vec<String> {
        self.subnets_in(tier).iter().map(Subnet::id).collect()
    }

    /// Find a subnet by logical id or id interpolation.
    pub fn subnet(&self, id: &str) -> Option<&Subnet> {
        self.subnets().find(|s| s.matches(id))
    }

    /// The single tier shared by `subnet_ids`.
    pub fn tier_of(&self, subnet_ids: &[String]) -> IacResult<SubnetTier> {
        let mut tier = None;
        for id in subnet_ids {
            let subnet = self
                .subnet(id)
                .ok_or_else(|| IacError::UnknownSubnet(id.clone()))?;
            match tier {
                None => tier = Some(subnet.tier),
                Some(t) if t != subnet.tier => return Err(IacError::MixedSubnetTiers),
                Some(_) => {}
            }
        }
        tier.ok_or(IacError::NodeGroupArgument { field: "subnetIds" })
    }

    /// Deduplicated availability zones of `subnet_ids`, in first-seen order.
    pub fn availability_zones_for(&self, subnet_ids: &[String]) -> IacResult<Vec<String>> {
        let mut zones: Vec<String> = Vec::new();
        for id in subnet_ids {
            let subnet = self
                .subnet(id)
                .ok_or_else(|| IacError::UnknownSubnet(id.clone()))?;
            if !zones.contains(&subnet.availability_zone) {
                zones.push(subnet.availability_zone.clone());
            }
        }
        Ok(zones)
    }

    /// All descriptors, each after the resources it depends on.
    pub fn resources(&self) -> Vec<&ResourceDescriptor> {
        let mut resources = vec![&self.vpc, &self.default_route_table];
        resources.extend(self.public_subnets.iter().map(|s| &s.descriptor));
        resources.extend(self.internet_gateway.iter());
        resources.extend(self.public_route_table.iter());
        resources.extend(self.private_subnets.iter().map(|s| &s.descriptor));
        resources.extend(self.private_route_table.iter());
        resources.extend(self.nat_elastic_ips.iter());
        resources.extend(self.nat_gateways.iter());
        resources.extend(self.routes.iter());
        resources.extend(self.route_table_associations.iter());
        resources.extend(self.security_groups.iter());
        resources.extend(self.security_group_rules.iter());
        resources
    }
}

/// Builds a [`NetworkTopology`] from a configuration.
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    config: Config,
}

impl NetworkBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn build(&self) -> IacResult<NetworkTopology> {
        let config = &self.config;
        let region = aws_region(config.vendor, config.region)?;
        let vpc_cidr = config.vpc_cidr_block_or_default().to_string();
        let public_blocks = config.public_subnets();
        let private_blocks = config.private_subnets();

        info!(
            "Building network: {} public, {} private subnets in {}",
            public_blocks.len(),
            private_blocks.len(),
            region
        );

        let vpc_suffix = if public_blocks.is_empty() { "-priv" } else { "-pub" };
        let resolver = TagResolver::new(
            config
                .with_name(format!("{}{}", config.name, vpc_suffix))
                .with_layer("network"),
            Tags::new(),
        );

        let vpc = ResourceDescriptor::new(ResourceKind::Vpc, "vpc")
            .attr("cidr_block", vpc_cidr.as_str())
            .attr("enable_dns_hostnames", true)
            .attr("enable_dns_support", true)
            .tags(resolver.resolve_with([("resourceType", "vpc")])?);
        let vpc_ref = vpc.reference();
        debug!("VPC {}", vpc.name());

        let default_route_table = ResourceDescriptor::new(ResourceKind::DefaultRouteTable, "default-route-table")
            .attr("default_route_table_id", vpc_ref.attr("default_route_table_id"))
            .depends_on(&vpc_ref)
            .tags(resolver.resolve_with([("resourceType", "defaultrt")])?);

        let mut topology = NetworkTopology {
            vpc,
            default_route_table,
            public_subnets: Vec::new(),
            private_subnets: Vec::new(),
            internet_gateway: None,
            public_route_table: None,
            private_route_table: None,
            nat_elastic_ips: Vec::new(),
            nat_gateways: Vec::new(),
            routes: Vec::new(),
            route_table_associations: Vec::new(),
            security_groups: Vec::new(),
            security_group_rules: Vec::new(),
            outputs: Vec::new(),
        };

        if !public_blocks.is_empty() {
            self.build_public_tier(&mut topology, &resolver, public_blocks, region)?;
        }
        if !private_blocks.is_empty() {
            self.build_private_tier(&mut topology, &resolver, private_blocks, region)?;
        }
        Self::build_security_groups(&mut topology, &resolver, &vpc_cidr)?;
        topology.outputs = Self::outputs(&topology);

        info!(
            "Network ready: {} resources, {} NAT gateway(s)",
            topology.resources().len(),
            topology.nat_gateways.len()
        );
        Ok(topology)
    }

    fn build_subnets(
        vpc_ref: &ResourceRef,
        resolver: &TagResolver,
        tier: SubnetTier,
        blocks: &[String],
        region: &str,
    ) -> IacResult<Vec<Subnet>> {
        let tags = resolver.resolve_with([
            ("nameSuffix", tier.name_suffix()),
            ("resourceType", "subnet"),
        ])?;

        blocks
            .iter()
            .enumerate()
            .map(|(index, cidr)| {
                let zone = availability_zone(region, index);
                let descriptor = ResourceDescriptor::new(
                    ResourceKind::Subnet,
                    format!("{}-subnet-{}", tier.as_str(), index + 1),
                )
                .attr("vpc_id", vpc_ref.id())
                .attr("cidr_block", cidr.as_str())
                .attr("availability_zone", zone.as_str())
                .attr("map_public_ip_on_launch", tier == SubnetTier::Public)
                .depends_on(vpc_ref)
                .tags(tags.clone());
                debug!("Subnet {} ({}) in {}", descriptor.logical_id, cidr, zone);

                Ok(Subnet {
                    descriptor,
                    tier,
                    cidr_block: cidr.clone(),
                    availability_zone: zone,
                })
            })
            .collect()
    }

    fn associations(
        tier: SubnetTier,
        subnets: &[Subnet],
        route_table: &ResourceDescriptor,
    ) -> Vec<ResourceDescriptor> {
        let table_ref = route_table.reference();
        subnets
            .iter()
            .enumerate()
            .map(|(index, subnet)| {
                ResourceDescriptor::new(
                    ResourceKind::RouteTableAssociation,
                    format!("{}-subnet-{}-association", tier.as_str(), index + 1),
                )
                .attr("route_table_id", table_ref.id())
                .attr("subnet_id", subnet.id())
                .depends_on(&table_ref)
                .depends_on(&subnet.descriptor.reference())
            })
            .collect()
    }

    fn build_public_tier(
        &self,
        topology: &mut NetworkTopology,
        resolver: &TagResolver,
        blocks: &[String],
        region: &str,
    ) -> IacResult<()> {
        let vpc_ref = topology.vpc.reference();
        topology.public_subnets =
            Self::build_subnets(&vpc_ref, resolver, SubnetTier::Public, blocks, region)?;

        let gateway = ResourceDescriptor::new(ResourceKind::InternetGateway, "internet-gateway")
            .attr("vpc_id", vpc_ref.id())
            .depends_on(&vpc_ref)
            .tags(resolver.resolve_with([("nameSuffix", "pub"), ("resourceType", "ig")])?);
        let route_table = ResourceDescriptor::new(ResourceKind::RouteTable, "public-route-table")
            .attr("vpc_id", vpc_ref.id())
            .depends_on(&vpc_ref)
            .tags(resolver.resolve_with([("nameSuffix", "public"), ("resourceType", "rt")])?);

        let gateway_ref = gateway.reference();
        let table_ref = route_table.reference();
        topology.routes.push(
            ResourceDescriptor::new(ResourceKind::Route, "public-internet-gateway-route")
                .attr("route_table_id", table_ref.id())
                .attr("destination_cidr_block", ANY_IPV4)
                .attr("gateway_id", gateway_ref.id())
                .depends_on(&table_ref)
                .depends_on(&gateway_ref),
        );
        topology.route_table_associations.extend(Self::associations(
            SubnetTier::Public,
            &topology.public_subnets,
            &route_table,
        ));

        topology.internet_gateway = Some(gateway);
        topology.public_route_table = Some(route_table);
        Ok(())
    }

    fn build_private_tier(
        &self,
        topology: &mut NetworkTopology,
        resolver: &TagResolver,
        blocks: &[String],
        region: &str,
    ) -> IacResult<()> {
        let vpc_ref = topology.vpc.reference();
        topology.private_subnets =
            Self::build_subnets(&vpc_ref, resolver, SubnetTier::Private, blocks, region)?;

        let route_table = ResourceDescriptor::new(ResourceKind::RouteTable, "private-route-table")
            .attr("vpc_id", vpc_ref.id())
            .depends_on(&vpc_ref)
            .tags(resolver.resolve_with([("nameSuffix", "priv"), ("resourceType", "rt")])?);

        if !topology.public_subnets.is_empty() && self.config.nat_gateway_enabled() {
            Self::build_nat_gateway(topology, resolver, &route_table)?;
        }

        topology.route_table_associations.extend(Self::associations(
            SubnetTier::Private,
            &topology.private_subnets,
            &route_table,
        ));
        topology.private_route_table = Some(route_table);
        Ok(())
    }

    /// One NAT gateway in the first public subnet, routed from the private
    /// route table.
    fn build_nat_gateway(
        topology: &mut NetworkTopology,
        resolver: &TagResolver,
        private_route_table: &ResourceDescriptor,
    ) -> IacResult<()> {
        let Some(anchor) = topology.public_subnets.first() else {
            return Ok(());
        };
        let anchor_ref = anchor.descriptor.reference();

        let eip = ResourceDescriptor::new(ResourceKind::Eip, "nat-elastic-ip")
            .attr("domain", "vpc")
            .tags(resolver.resolve_with([("nameSuffix", "nat"), ("resourceType", "eip")])?);
        let eip_ref = eip.reference();

        let nat = ResourceDescriptor::new(ResourceKind::NatGateway, "nat-gateway")
            .attr("allocation_id", eip_ref.id())
            .attr("subnet_id", anchor_ref.id())
            .depends_on(&eip_ref)
            .depends_on(&anchor_ref)
            .tags(resolver.resolve_with([("resourceType", "nat")])?);
        let nat_ref = nat.reference();
        debug!("NAT gateway {} in {}", nat.name(), anchor.logical_id());

        let table_ref = private_route_table.reference();
        topology.routes.push(
            ResourceDescriptor::new(ResourceKind::Route, "private-nat-gateway-route")
                .attr("route_table_id", table_ref.id())
                .attr("destination_cidr_block", ANY_IPV4)
                .attr("nat_gateway_id", nat_ref.id())
                .depends_on(&table_ref)
                .depends_on(&nat_ref),
        );
        topology.nat_elastic_ips.push(eip);
        topology.nat_gateways.push(nat);
        Ok(())
    }

    fn build_security_groups(
        topology: &mut NetworkTopology,
        resolver: &TagResolver,
        vpc_cidr: &str,
    ) -> IacResult<()> {
        let vpc_ref = topology.vpc.reference();
        let group = ResourceDescriptor::new(ResourceKind::SecurityGroup, "default-security-group")
            .attr("description", "Default security group for VPC")
            .attr("vpc_id", vpc_ref.id())
            .depends_on(&vpc_ref)
            .tags(resolver.resolve_with([("resourceType", "sg")])?);
        let group_ref = group.reference();

        let rule = |logical_id: &str, direction: &str, cidr: &str, description: &str| {
            ResourceDescriptor::new(ResourceKind::SecurityGroupRule, logical_id)
                .attr("security_group_id", group_ref.id())
                .attr("type", direction)
                .attr("from_port", 0)
                .attr("to_port", 0)
                .attr("protocol", "-1")
                .attr("cidr_blocks", json!([cidr]))
                .attr("description", description)
                .depends_on(&group_ref)
        };
        topology.security_group_rules.push(rule(
            "default-internal-allow",
            "ingress",
            vpc_cidr,
            "Allow all internal traffic within VPC",
        ));
        topology.security_group_rules.push(rule(
            "default-outbound-allow",
            "egress",
            ANY_IPV4,
            "Allow all outbound traffic",
        ));
        topology.security_groups.push(group);
        Ok(())
    }

    fn outputs(topology: &NetworkTopology) -> Vec<OutputDescriptor> {
        let vpc_ref = topology.vpc.reference();
        let mut outputs = vec![
            OutputDescriptor::new("vpc_id", vpc_ref.id(), "ID of the VPC"),
            OutputDescriptor::new("vpc_cidr", vpc_ref.attr("cidr_block"), "CIDR block of the VPC"),
        ];
        if !topology.private_subnets.is_empty() {
            outputs.push(OutputDescriptor::new(
                "private_subnet_ids",
                topology.subnet_ids(SubnetTier::Private),
                "IDs of the private subnets",
            ));
        }
        if !topology.public_subnets.is_empty() {
            outputs.push(OutputDescriptor::new(
                "public_subnet_ids",
                topology.subnet_ids(SubnetTier::Public),
                "IDs of the public subnets",
            ));
        }
        outputs.push(OutputDescriptor::new(
            "security_group_ids",
            topology.security_groups.iter().map(|sg| sg.id()).collect::<Vec<_>>(),
            "IDs of the security groups",
        ));
        if let Some(gateway) = &topology.internet_gateway {
            outputs.push(OutputDescriptor::new(
                "internet_gateway_id",
                gateway.id(),
                "ID of the Internet Gateway",
            ));
        }
        if !topology.nat_gateways.is_empty() {
            outputs.push(OutputDescriptor::new(
                "nat_gateway_ids",
                topology.nat_gateways.iter().map(|nat| nat.id()).collect::<Vec<_>>(),
                "IDs of the NAT Gateways",
            ));
        }
        outputs
    }
}
