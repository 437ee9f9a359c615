use serde::Serialize;

use crate::error::{AssemblyError, AssemblyResult};
use crate::topology::{ResourceKind, Topology};

/// Availability domains required in every environment.
pub const REQUIRED_ZONES: usize = 2;

/// The target region and the availability zones it supplies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub zones: Vec<String>,
}

impl Region {
    #[must_use]
    pub fn new(name: &str, zones: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            zones: zones.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new("eu-west-2", &["eu-west-2a", "eu-west-2b", "eu-west-2c"])
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct NetworkConfig {
    name: String,
    cidr: &'static str,
    region: String,
    max_availability_zones: usize,
    nat_gateways: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct SubnetConfig {
    network: String,
    availability_zone: String,
    cidr: String,
    tier: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct NatConfig {
    subnet: String,
}

/// The isolated address space every other resource attaches to:
/// one network split across two availability zones, with a
/// public and a private subnet tier and a single NAT egress path
/// for the private tier. Private subnets have no inbound route
/// from the public internet.
#[derive(Debug, Clone)]
pub struct Network {
    pub vpc: String,
    pub public_subnets: Vec<String>,
    pub private_subnets: Vec<String>,
    pub nat: String,
}

impl Network {
    pub fn build(topology: &mut Topology, region: &Region) -> AssemblyResult<Self> {
        if region.zones.len() < REQUIRED_ZONES {
            return Err(AssemblyError::AvailabilityZones {
                region: region.name.clone(),
                needed: REQUIRED_ZONES,
                found: region.zones.len(),
            });
        }

        let vpc = topology.resource_id("vpc");
        topology.add(
            &vpc,
            ResourceKind::Network,
            &NetworkConfig {
                name: vpc.clone(),
                cidr: "10.0.0.0/16",
                region: region.name.clone(),
                max_availability_zones: REQUIRED_ZONES,
                nat_gateways: 1,
            },
        )?;

        let mut public_subnets = Vec::new();
        let mut private_subnets = Vec::new();
        for (index, zone) in region.zones.iter().take(REQUIRED_ZONES).enumerate() {
            public_subnets.push(Self::subnet(topology, &vpc, zone, index, "public")?);
            private_subnets.push(Self::subnet(topology, &vpc, zone, index, "private")?);
        }

        let nat = topology.resource_id("nat-gateway");
        topology.add(
            &nat,
            ResourceKind::NatGateway,
            &NatConfig {
                subnet: public_subnets[0].clone(),
            },
        )?;
        topology.depend(&nat, &public_subnets[0]);

        Ok(Self {
            vpc,
            public_subnets,
            private_subnets,
            nat,
        })
    }

    fn subnet(
        topology: &mut Topology,
        vpc: &str,
        zone: &str,
        index: usize,
        tier: &'static str,
    ) -> AssemblyResult<String> {
        let id = topology.resource_id(&format!("{tier}-subnet-{}", index + 1));
        let offset = if tier == "public" { 0 } else { REQUIRED_ZONES };
        topology.add(
            &id,
            ResourceKind::Subnet,
            &SubnetConfig {
                network: vpc.to_string(),
                availability_zone: zone.to_string(),
                cidr: format!("10.0.{}.0/24", offset + index),
                tier,
            },
        )?;
        topology.depend(&id, vpc);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_zones_two_tiers_one_nat() {
        let mut topology = Topology::new("app-staging");
        let network = Network::build(&mut topology, &Region::default()).unwrap();

        assert_eq!(network.public_subnets.len(), 2);
        assert_eq!(network.private_subnets.len(), 2);
        assert!(topology.contains(&network.vpc));
        assert!(topology.contains(&network.nat));

        let nat = topology.node(&network.nat).unwrap();
        assert_eq!(nat.config["subnet"], network.public_subnets[0]);
    }

    #[test]
    fn subnet_cidrs_do_not_overlap() {
        let mut topology = Topology::new("env");
        let network = Network::build(&mut topology, &Region::default()).unwrap();

        let mut cidrs: Vec<String> = network
            .public_subnets
            .iter()
            .chain(&network.private_subnets)
            .map(|id| topology.node(id).unwrap().config["cidr"].as_str().unwrap().to_string())
            .collect();
        cidrs.sort();
        cidrs.dedup();
        assert_eq!(cidrs.len(), 4);
    }

    #[test]
    fn fails_below_two_zones() {
        let mut topology = Topology::new("env");
        let region = Region::new("local-1", &["local-1a"]);

        let err = Network::build(&mut topology, &region).unwrap_err();
        assert_eq!(
            err.to_string(),
            "region 'local-1' supplies 1 availability zones, 2 required"
        );
    }

    #[test]
    fn extra_zones_are_ignored() {
        let mut topology = Topology::new("env");
        let region = Region::default();
        assert_eq!(region.zones.len(), 3);

        let network = Network::build(&mut topology, &region).unwrap();
        assert_eq!(network.public_subnets.len(), REQUIRED_ZONES);
    }
}
