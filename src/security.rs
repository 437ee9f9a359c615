use serde::{Serialize, Serializer};

use crate::error::AssemblyResult;
use crate::network::Network;
use crate::topology::{Attr, ResourceKind, Topology};

/// The administrative port left open for operator access.
pub const OPERATOR_PORT: u16 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// A rule port: either a literal, or a value resolved from
/// another resource's runtime attribute once it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PortSpec {
    Literal(u16),
    Resolved(Attr),
}

/// Where traffic is allowed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    AnyIpv4,
    Group(String),
}

impl RuleSource {
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::AnyIpv4)
    }
}

impl Serialize for RuleSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::AnyIpv4 => serializer.serialize_str("0.0.0.0/0"),
            Self::Group(id) => serializer.serialize_str(id),
        }
    }
}

/// One ingress rule inside a traffic-control group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct IngressRule {
    pub protocol: Protocol,
    pub port: PortSpec,
    pub source: RuleSource,
    pub description: String,
}

impl IngressRule {
    #[must_use]
    pub fn tcp(port: PortSpec, source: RuleSource, description: &str) -> Self {
        Self {
            protocol: Protocol::Tcp,
            port,
            source,
            description: description.to_string(),
        }
    }
}

/// A handle on a traffic-control group, used to authorize flows
/// between resource pairs without hardcoding ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connections {
    group: String,
    default_port: Option<PortSpec>,
}

impl Connections {
    #[must_use]
    pub fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            default_port: None,
        }
    }

    #[must_use]
    pub fn default_port(&self) -> Option<&PortSpec> {
        self.default_port.as_ref()
    }

    #[must_use]
    pub fn with_default_port(mut self, port: PortSpec) -> Self {
        self.default_port = Some(port);
        self
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct SecurityGroupConfig {
    name: String,
    network: String,
    allow_all_outbound: bool,
}

/// The three traffic-control groups every environment carries:
/// database, cache, and service. All start deny-all except the
/// declared operator rule on the database group.
#[derive(Debug, Clone)]
pub struct Perimeter {
    pub db_group: String,
    pub cache_group: String,
    pub service_group: String,
}

impl Perimeter {
    pub fn build(topology: &mut Topology, network: &Network) -> AssemblyResult<Self> {
        let db_group = Self::security_group(topology, network, "db-security-group", false)?;
        let cache_group = Self::security_group(topology, network, "redis-security-group", true)?;
        let service_group =
            Self::security_group(topology, network, "service-security-group", true)?;

        // Broad on purpose: narrowing the operator path is a
        // deployment policy decision, not a mechanism here.
        topology.add_rule(
            &db_group,
            IngressRule::tcp(
                PortSpec::Literal(OPERATOR_PORT),
                RuleSource::AnyIpv4,
                "allow operator access from anywhere",
            ),
        )?;

        Ok(Self {
            db_group,
            cache_group,
            service_group,
        })
    }

    fn security_group(
        topology: &mut Topology,
        network: &Network,
        suffix: &str,
        allow_all_outbound: bool,
    ) -> AssemblyResult<String> {
        let id = topology.resource_id(suffix);
        topology.add(
            &id,
            ResourceKind::SecurityGroup,
            &SecurityGroupConfig {
                name: id.clone(),
                network: network.vpc.clone(),
                allow_all_outbound,
            },
        )?;
        topology.depend(&id, &network.vpc);
        topology.group(&id)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Region;

    fn built() -> (Topology, Perimeter) {
        let mut topology = Topology::new("app-staging");
        let network = Network::build(&mut topology, &Region::default()).unwrap();
        let perimeter = Perimeter::build(&mut topology, &network).unwrap();
        (topology, perimeter)
    }

    #[test]
    fn creates_three_groups() {
        let (topology, perimeter) = built();

        for id in [
            &perimeter.db_group,
            &perimeter.cache_group,
            &perimeter.service_group,
        ] {
            assert!(topology.contains(id));
            assert!(topology.rules(id).is_some());
        }
    }

    #[test]
    fn only_declared_rule_is_operator_access() {
        let (topology, perimeter) = built();

        let db_rules = topology.rules(&perimeter.db_group).unwrap();
        assert_eq!(db_rules.len(), 1);
        assert_eq!(db_rules[0].port, PortSpec::Literal(OPERATOR_PORT));
        assert!(db_rules[0].source.is_any());

        assert!(topology.rules(&perimeter.cache_group).unwrap().is_empty());
        assert!(topology.rules(&perimeter.service_group).unwrap().is_empty());
    }

    #[test]
    fn groups_are_not_created_twice() {
        let (mut topology, _) = built();

        let err = topology.group(&topology.resource_id("db-security-group"));
        assert!(err.is_err());
    }

    #[test]
    fn connection_grant_inserts_one_rule() {
        let (mut topology, perimeter) = built();

        let from = Connections::new(&perimeter.service_group);
        let to = Connections::new(&perimeter.cache_group)
            .with_default_port(PortSpec::Literal(6379));
        topology.allow_to(&from, &to, "service to cache").unwrap();

        let rules = topology.rules(&perimeter.cache_group).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].source,
            RuleSource::Group(perimeter.service_group.clone())
        );
        assert_eq!(rules[0].port, PortSpec::Literal(6379));
    }

    #[test]
    fn grant_without_default_port_rejected() {
        let (mut topology, perimeter) = built();

        let from = Connections::new(&perimeter.service_group);
        let to = Connections::new(&perimeter.cache_group);

        assert!(topology.allow_to(&from, &to, "service to cache").is_err());
    }
}
