use serde::Serialize;

use crate::error::{AssemblyError, AssemblyResult};
use crate::network::Network;
use crate::profile::{CapacityRange, Profile};
use crate::security::{Connections, Perimeter, PortSpec};
use crate::topology::{Attr, ResourceKind, Topology};

/// Fixed database identity; the password is generated and only
/// ever referenced through the credential secret.
pub const DB_USERNAME: &str = "dbusername";
pub const DB_NAME: &str = "dbname";
pub const DB_PORT: u16 = 3306;
pub const DB_ENGINE: &str = "aurora-mysql";
pub const DB_ENGINE_VERSION: &str = "8.0.mysql_aurora.3.02.1";
pub const CACHE_ENGINE: &str = "redis";
pub const CACHE_ENGINE_VERSION: &str = "6.x";

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct SubnetGroupConfig {
    name: String,
    description: &'static str,
    subnets: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct CredentialSecretConfig {
    name: String,
    username: &'static str,
    generate_password: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ParameterGroupConfig {
    engine: &'static str,
    engine_version: &'static str,
    parameters: ParameterValues,
}

#[derive(Serialize)]
struct ParameterValues {
    innodb_lock_wait_timeout: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct DatabaseConfig {
    name: String,
    engine: &'static str,
    engine_version: &'static str,
    parameter_group: String,
    instances: u32,
    instance_class: &'static str,
    credentials: String,
    default_database: &'static str,
    subnet_group: String,
    security_groups: Vec<String>,
    publicly_accessible: bool,
    auto_minor_version_upgrade: bool,
    deletion_protection: bool,
    port: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ServerlessScaling {
    min_capacity: f64,
    max_capacity: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct CacheConfig {
    name: String,
    engine: &'static str,
    engine_version: &'static str,
    node_type: String,
    num_nodes: u32,
    subnet_group: String,
    security_groups: Vec<String>,
}

/// The relational database cluster and the cache cluster, each
/// inside the network and guarded by its own traffic-control
/// group. Exposes endpoints and the credential reference; never
/// the password itself.
#[derive(Debug, Clone)]
pub struct DataTier {
    pub db_cluster: String,
    pub db_secret: String,
    pub db_host: Attr,
    pub db_port: Attr,
    pub db_connections: Connections,
    pub cache_cluster: String,
    pub cache_host: Attr,
    pub cache_connections: Connections,
}

impl DataTier {
    pub fn build(
        topology: &mut Topology,
        profile: &Profile,
        network: &Network,
        perimeter: &Perimeter,
    ) -> AssemblyResult<Self> {
        let db_subnet_group = topology.resource_id("db-subnet");
        topology.add(
            &db_subnet_group,
            ResourceKind::SubnetGroup,
            &SubnetGroupConfig {
                name: db_subnet_group.clone(),
                description: "subnet group to access database",
                subnets: network.public_subnets.clone(),
            },
        )?;
        for subnet in &network.public_subnets {
            topology.depend(&db_subnet_group, subnet);
        }

        let db_secret = topology.resource_id("db-secret");
        topology.add(
            &db_secret,
            ResourceKind::Secret,
            &CredentialSecretConfig {
                name: db_secret.clone(),
                username: DB_USERNAME,
                generate_password: true,
            },
        )?;

        let parameter_group = topology.resource_id("dbparam-group");
        topology.add(
            &parameter_group,
            ResourceKind::ParameterGroup,
            &ParameterGroupConfig {
                engine: DB_ENGINE,
                engine_version: DB_ENGINE_VERSION,
                parameters: ParameterValues {
                    innodb_lock_wait_timeout: "120",
                },
            },
        )?;

        let db_cluster = topology.resource_id("db");
        topology.add(
            &db_cluster,
            ResourceKind::DatabaseCluster,
            &DatabaseConfig {
                name: db_cluster.clone(),
                engine: DB_ENGINE,
                engine_version: DB_ENGINE_VERSION,
                parameter_group: parameter_group.clone(),
                instances: 1,
                instance_class: "serverless",
                credentials: db_secret.clone(),
                default_database: DB_NAME,
                subnet_group: db_subnet_group.clone(),
                security_groups: vec![perimeter.db_group.clone()],
                publicly_accessible: true,
                auto_minor_version_upgrade: true,
                deletion_protection: false,
                port: DB_PORT,
            },
        )?;
        for dependency in [&db_subnet_group, &db_secret, &parameter_group, &perimeter.db_group] {
            topology.depend(&db_cluster, dependency);
        }

        Self::set_capacity(topology, &db_cluster, profile.resources.db_capacity)?;

        let cache_subnet_group = topology.resource_id("redis-subnet-group");
        topology.add(
            &cache_subnet_group,
            ResourceKind::SubnetGroup,
            &SubnetGroupConfig {
                name: cache_subnet_group.clone(),
                description: "subnet group for redis",
                subnets: network.private_subnets.clone(),
            },
        )?;
        for subnet in &network.private_subnets {
            topology.depend(&cache_subnet_group, subnet);
        }

        let cache_cluster = topology.resource_id("redis-cluster");
        topology.add(
            &cache_cluster,
            ResourceKind::CacheCluster,
            &CacheConfig {
                name: cache_cluster.clone(),
                engine: CACHE_ENGINE,
                engine_version: CACHE_ENGINE_VERSION,
                node_type: profile.resources.cache_node_type.clone(),
                num_nodes: 1,
                subnet_group: cache_subnet_group.clone(),
                security_groups: vec![perimeter.cache_group.clone()],
            },
        )?;
        topology.depend(&cache_cluster, &cache_subnet_group);
        topology.depend(&cache_cluster, &perimeter.cache_group);

        let db_host = topology.attr(&db_cluster, "endpoint.hostname");
        let db_port = topology.attr(&db_cluster, "endpoint.port");
        let cache_host = topology.attr(&cache_cluster, "endpoint.address");
        let cache_port = topology.attr(&cache_cluster, "endpoint.port");

        let db_connections = Connections::new(&perimeter.db_group)
            .with_default_port(PortSpec::Resolved(db_port.clone()));
        let cache_connections = Connections::new(&perimeter.cache_group)
            .with_default_port(PortSpec::Resolved(cache_port));

        Ok(Self {
            db_cluster,
            db_secret,
            db_host,
            db_port,
            db_connections,
            cache_cluster,
            cache_host,
            cache_connections,
        })
    }

    /// Layer the environment's elastic capacity bounds onto the
    /// cluster after construction. This is the one sanctioned
    /// per-environment override on an otherwise
    /// environment-agnostic definition, typed to exactly the
    /// scaling fields.
    fn set_capacity(
        topology: &mut Topology,
        db_cluster: &str,
        capacity: CapacityRange,
    ) -> AssemblyResult<()> {
        if capacity.max < capacity.min {
            return Err(AssemblyError::CapacityRange {
                min: capacity.min,
                max: capacity.max,
            });
        }
        topology.patch(
            db_cluster,
            "serverless-scaling",
            serde_json::to_value(ServerlessScaling {
                min_capacity: capacity.min,
                max_capacity: capacity.max,
            })?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Region;
    use serde_json::json;

    fn built(profile: &Profile) -> (Topology, DataTier) {
        let mut topology = Topology::new(&profile.name);
        let network = Network::build(&mut topology, &Region::default()).unwrap();
        let perimeter = Perimeter::build(&mut topology, &network).unwrap();
        let data = DataTier::build(&mut topology, profile, &network, &perimeter).unwrap();
        (topology, data)
    }

    fn profile() -> Profile {
        Profile::new("app-staging")
            .domain("staging.example.com")
            .env_secret("arn:secret:staging")
    }

    #[test]
    fn capacity_patch_is_verbatim() {
        let (topology, data) = built(&profile().db_capacity(0.5, 3.0));

        let node = topology.node(&data.db_cluster).unwrap();
        assert_eq!(
            node.config["serverless-scaling"],
            json!({ "min-capacity": 0.5, "max-capacity": 3.0 })
        );
    }

    #[test]
    fn database_is_public_cache_is_private() {
        let (topology, data) = built(&profile());

        let db = topology.node(&data.db_cluster).unwrap();
        assert_eq!(db.config["publicly-accessible"], json!(true));
        assert_eq!(db.config["subnet-group"], json!("app-staging-db-subnet"));

        let db_subnets = &topology.node("app-staging-db-subnet").unwrap().config["subnets"];
        assert!(db_subnets[0].as_str().unwrap().contains("public"));

        let cache_subnets =
            &topology.node("app-staging-redis-subnet-group").unwrap().config["subnets"];
        assert!(cache_subnets[0].as_str().unwrap().contains("private"));
    }

    #[test]
    fn credentials_never_embed_a_password() {
        let (topology, data) = built(&profile());

        let secret = topology.node(&data.db_secret).unwrap();
        assert_eq!(secret.config["username"], json!(DB_USERNAME));
        assert_eq!(secret.config["generate-password"], json!(true));
        assert!(secret.config.get("password").is_none());
    }

    #[test]
    fn endpoints_are_deferred_tokens() {
        let (_, data) = built(&profile());

        assert_eq!(data.db_port.to_string(), "${app-staging-db:endpoint.port}");
        assert_eq!(
            data.cache_host.to_string(),
            "${app-staging-redis-cluster:endpoint.address}"
        );
    }

    #[test]
    fn cache_node_type_propagates() {
        let (topology, data) = built(&profile().cache_node_type("cache.t3.medium"));

        let cache = topology.node(&data.cache_cluster).unwrap();
        assert_eq!(cache.config["node-type"], json!("cache.t3.medium"));
        assert_eq!(cache.config["num-nodes"], json!(1));
    }
}
