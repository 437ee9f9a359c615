use serde::Serialize;

use crate::compute::{Delivery, SECRET_ENV_KEYS};
use crate::data::DataTier;
use crate::error::AssemblyResult;
use crate::security::Connections;
use crate::topology::Topology;

/// Managed platform policies attached to the task identity.
/// Deliberately broad (a known over-privilege pattern in the
/// source design); override them on the assembler rather than
/// narrowing here.
pub const DEFAULT_TASK_POLICIES: &[&str] = &[
    "AmazonSSMManagedInstanceCore",
    "AmazonSESFullAccess",
    "AmazonS3FullAccess",
    "AmazonElasticFileSystemFullAccess",
];

pub const DEFAULT_EXECUTION_POLICIES: &[&str] = &["AmazonS3FullAccess"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    Read,
    ReadWrite,
    ManagedPolicy,
}

/// An IAM-style permission grant, distinct from a Connection
/// Grant: it attaches an access level to an execution identity
/// instead of inserting a traffic rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Grant {
    pub principal: String,
    pub access: AccessLevel,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Grant {
    #[must_use]
    pub fn read(principal: &str, target: &str) -> Self {
        Self {
            principal: principal.to_string(),
            access: AccessLevel::Read,
            target: target.to_string(),
            key: None,
        }
    }

    #[must_use]
    pub fn read_key(principal: &str, target: &str, key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::read(principal, target)
        }
    }

    #[must_use]
    pub fn read_write(principal: &str, target: &str) -> Self {
        Self {
            principal: principal.to_string(),
            access: AccessLevel::ReadWrite,
            target: target.to_string(),
            key: None,
        }
    }

    #[must_use]
    pub fn managed(principal: &str, policy: &str) -> Self {
        Self {
            principal: principal.to_string(),
            access: AccessLevel::ManagedPolicy,
            target: policy.to_string(),
            key: None,
        }
    }
}

/// Authorize the traffic flows and permission scopes that cross
/// component boundaries, then publish the environment outputs.
///
/// Creates no resources of its own; runs strictly after every
/// identity and port it references exists.
pub fn wire(
    topology: &mut Topology,
    data: &DataTier,
    delivery: &Delivery,
    task_policies: &[String],
    execution_policies: &[String],
) -> AssemblyResult<()> {
    topology.allow_to(
        &delivery.service_connections,
        &data.db_connections,
        "service to database",
    )?;
    topology.allow_to(
        &delivery.service_connections,
        &data.cache_connections,
        "service to cache",
    )?;

    // The jump host sits inside the database group; the grant is
    // scoped there, not to the service's group.
    let operator = Connections::new(data.db_connections.group());
    topology.allow_to(&operator, &data.db_connections, "operator jump host to database")?;

    topology.grant(Grant::read(&delivery.task_role, &delivery.env_secret));
    for key in SECRET_ENV_KEYS {
        topology.grant(Grant::read_key(&delivery.task_role, &delivery.env_secret, key));
    }
    topology.grant(Grant::read_write(&delivery.task_role, &delivery.public_bucket));
    topology.grant(Grant::read_write(&delivery.task_role, &delivery.private_bucket));
    for policy in task_policies {
        topology.grant(Grant::managed(&delivery.task_role, policy));
    }
    for policy in execution_policies {
        topology.grant(Grant::managed(&delivery.execution_role, policy));
    }

    topology.output("load-balancer-domain", delivery.lb_dns.clone());
    topology.output("ecr-repo-url", delivery.repository_uri.clone());

    Ok(())
}
