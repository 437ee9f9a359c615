use std::fmt;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{AssemblyError, AssemblyResult};
use crate::security::{Connections, IngressRule, PortSpec, RuleSource};
use crate::wiring::{AccessLevel, Grant};

/// A value that may only be known once the apply engine has
/// resolved another node. Rendered as a `${node:attr}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attr {
    Literal(String),
    Ref { node: String, attr: String },
}

impl Attr {
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::Ref { node, attr } => write!(f, "${{{node}:{attr}}}"),
        }
    }
}

impl Serialize for Attr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Kind tag for a provisioned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    Subnet,
    NatGateway,
    EncryptionKey,
    LogGroup,
    Bucket,
    Distribution,
    SubnetGroup,
    SecurityGroup,
    Secret,
    ParameterGroup,
    DatabaseCluster,
    CacheCluster,
    HostedZone,
    DnsRecord,
    Certificate,
    Repository,
    Cluster,
    Role,
    Service,
    LoadBalancer,
    TargetGroup,
    Listener,
    ScalingTarget,
    ScalingPolicy,
    Instance,
}

/// One provisioned entity: deterministic identifier, kind tag,
/// and kind-specific configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceNode {
    pub id: String,
    pub kind: ResourceKind,
    pub config: Value,
}

#[derive(Debug, Serialize)]
struct EdgeEntry<'a> {
    from: &'a str,
    to: &'a str,
}

/// Serializable view of an assembled topology.
#[derive(Debug, Serialize)]
pub struct Description<'a> {
    environment: &'a str,
    nodes: Vec<&'a ResourceNode>,
    edges: Vec<EdgeEntry<'a>>,
    rules: &'a IndexMap<String, Vec<IngressRule>>,
    grants: &'a [Grant],
    outputs: &'a IndexMap<String, Attr>,
}

/// The assembled resource graph for one environment.
///
/// Nodes, edges, traffic rules, grants, and outputs are recorded
/// in a fixed order, so the same profile always renders the same
/// description byte for byte. Construction is pure and performs
/// no I/O; the external apply engine consumes the rendered
/// description and owns all convergence behavior.
#[derive(Debug, Clone)]
pub struct Topology {
    env_id: String,
    nodes: IndexMap<String, ResourceNode>,
    edges: Vec<(String, String)>,
    groups: IndexMap<String, Vec<IngressRule>>,
    grants: Vec<Grant>,
    outputs: IndexMap<String, Attr>,
}

impl Topology {
    #[must_use]
    pub fn new(env_id: &str) -> Self {
        Self {
            env_id: env_id.to_lowercase(),
            nodes: IndexMap::new(),
            edges: Vec::new(),
            groups: IndexMap::new(),
            grants: Vec::new(),
            outputs: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn env_id(&self) -> &str {
        &self.env_id
    }

    /// Build the deterministic identifier for a resource role
    /// within this environment.
    #[must_use]
    pub fn resource_id(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.env_id)
    }

    /// Add a node. Any `${node:attr}` token found in the
    /// serialized config is recorded as a dependency edge; the
    /// referenced node may be added later, since references are
    /// checked by [`Topology::validate`].
    pub fn add(
        &mut self,
        id: &str,
        kind: ResourceKind,
        config: &impl Serialize,
    ) -> AssemblyResult<String> {
        if self.nodes.contains_key(id) {
            return Err(AssemblyError::DuplicateResource(id.to_string()));
        }

        let config = serde_json::to_value(config)?;
        let mut refs = Vec::new();
        collect_refs(&config, &mut refs);
        for node in refs {
            if node != id {
                self.edge(id, &node);
            }
        }

        self.nodes.insert(
            id.to_string(),
            ResourceNode {
                id: id.to_string(),
                kind,
                config,
            },
        );
        Ok(id.to_string())
    }

    /// Overwrite one config field on an existing node. Only the
    /// owning component's typed override functions call this.
    pub(crate) fn patch(&mut self, id: &str, key: &str, value: Value) -> AssemblyResult<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| AssemblyError::UnresolvedReference {
                from: "patch".to_string(),
                node: id.to_string(),
            })?;
        match &mut node.config {
            Value::Object(map) => {
                map.insert(key.to_string(), value);
                Ok(())
            }
            _ => Err(AssemblyError::InvalidField {
                field: "config",
                value: id.to_string(),
                reason: "patch target config is not an object",
            }),
        }
    }

    /// Record a structural "must exist first" relation.
    pub fn depend(&mut self, from: &str, to: &str) {
        if from != to {
            self.edge(from, to);
        }
    }

    fn edge(&mut self, from: &str, to: &str) {
        let edge = (from.to_string(), to.to_string());
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// A handle on another node's runtime attribute.
    #[must_use]
    pub fn attr(&self, node: &str, attr: &str) -> Attr {
        Attr::Ref {
            node: node.to_string(),
            attr: attr.to_string(),
        }
    }

    /// Register an empty traffic-control group for the security
    /// group node `id`. A group is never created twice for the
    /// same role within one environment.
    pub fn group(&mut self, id: &str) -> AssemblyResult<()> {
        if self.groups.contains_key(id) {
            return Err(AssemblyError::DuplicateGroup(id.to_string()));
        }
        self.groups.insert(id.to_string(), Vec::new());
        Ok(())
    }

    /// Insert one ingress rule into a group. Rules live in a
    /// mutable side table, not in any node's config: the apply
    /// engine applies them after every node they reference has
    /// resolved, so a resolved port never creates a node edge
    /// (the guarded resource already depends on its group).
    /// Referenced nodes are still existence-checked by
    /// [`Topology::validate`].
    pub fn add_rule(&mut self, group: &str, rule: IngressRule) -> AssemblyResult<()> {
        self.groups
            .get_mut(group)
            .ok_or_else(|| AssemblyError::UnknownGroup(group.to_string()))?
            .push(rule);
        Ok(())
    }

    /// Apply a Connection Grant: authorize traffic from one
    /// group to another on the target's default port, inserting
    /// exactly one ingress rule into the target's group.
    pub fn allow_to(
        &mut self,
        from: &Connections,
        to: &Connections,
        description: &str,
    ) -> AssemblyResult<()> {
        let port = to
            .default_port()
            .cloned()
            .ok_or_else(|| AssemblyError::InvalidField {
                field: "default-port",
                value: to.group().to_string(),
                reason: "connection target declares no default port",
            })?;

        self.add_rule(
            to.group(),
            IngressRule::tcp(port, RuleSource::Group(from.group().to_string()), description),
        )
    }

    /// Record a permission grant on an execution identity.
    pub fn grant(&mut self, grant: Grant) {
        self.grants.push(grant);
    }

    /// Publish a named output value.
    pub fn output(&mut self, name: &str, value: Attr) {
        self.outputs.insert(name.to_string(), value);
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    #[must_use]
    pub fn rules(&self, group: &str) -> Option<&[IngressRule]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[IngressRule])> {
        self.groups.iter().map(|(id, rules)| (id.as_str(), rules.as_slice()))
    }

    #[must_use]
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    #[must_use]
    pub const fn outputs(&self) -> &IndexMap<String, Attr> {
        &self.outputs
    }

    /// Reject dangling references and dependency cycles before
    /// the description is rendered or handed to an apply engine.
    pub fn validate(&self) -> AssemblyResult<()> {
        for (from, to) in &self.edges {
            for id in [from, to] {
                if !self.nodes.contains_key(id) {
                    return Err(AssemblyError::UnresolvedReference {
                        from: from.clone(),
                        node: id.clone(),
                    });
                }
            }
        }

        for value in self.outputs.values() {
            if let Attr::Ref { node, .. } = value {
                if !self.nodes.contains_key(node) {
                    return Err(AssemblyError::UnresolvedReference {
                        from: "outputs".to_string(),
                        node: node.clone(),
                    });
                }
            }
        }

        for (group, rules) in &self.groups {
            for rule in rules {
                if let PortSpec::Resolved(Attr::Ref { node, .. }) = &rule.port {
                    if !self.nodes.contains_key(node) {
                        return Err(AssemblyError::UnresolvedReference {
                            from: group.clone(),
                            node: node.clone(),
                        });
                    }
                }
                if let RuleSource::Group(source) = &rule.source {
                    if !self.groups.contains_key(source) {
                        return Err(AssemblyError::UnknownGroup(source.clone()));
                    }
                }
            }
        }

        for grant in &self.grants {
            if !self.nodes.contains_key(&grant.principal) {
                return Err(AssemblyError::UnresolvedReference {
                    from: "grants".to_string(),
                    node: grant.principal.clone(),
                });
            }
            if grant.access != AccessLevel::ManagedPolicy && !self.nodes.contains_key(&grant.target)
            {
                return Err(AssemblyError::UnresolvedReference {
                    from: grant.principal.clone(),
                    node: grant.target.clone(),
                });
            }
        }

        let mut graph = DiGraph::<&str, ()>::new();
        let mut indices = IndexMap::new();
        for id in self.nodes.keys() {
            indices.insert(id.as_str(), graph.add_node(id.as_str()));
        }
        for (from, to) in &self.edges {
            graph.add_edge(indices[from.as_str()], indices[to.as_str()], ());
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(AssemblyError::DependencyCycle(
                graph[cycle.node_id()].to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn description(&self) -> Description<'_> {
        Description {
            environment: &self.env_id,
            nodes: self.nodes.values().collect(),
            edges: self
                .edges
                .iter()
                .map(|(from, to)| EdgeEntry { from, to })
                .collect(),
            rules: &self.groups,
            grants: &self.grants,
            outputs: &self.outputs,
        }
    }

    pub fn to_yaml(&self) -> AssemblyResult<String> {
        Ok(serde_yaml::to_string(&self.description())?)
    }

    pub fn to_json(&self) -> AssemblyResult<String> {
        Ok(serde_json::to_string_pretty(&self.description())?)
    }
}

/// Collect the node part of every `${node:attr}` token in a
/// config tree.
fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            let mut rest = text.as_str();
            while let Some(start) = rest.find("${") {
                let Some(len) = rest[start..].find('}') else {
                    break;
                };
                let token = &rest[start + 2..start + len];
                if let Some((node, _)) = token.split_once(':') {
                    out.push(node.to_string());
                }
                rest = &rest[start + len + 1..];
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_refs(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attr_tokens() {
        let topology = Topology::new("app-staging");
        let attr = topology.attr("app-staging-db", "endpoint.port");

        assert_eq!(attr.to_string(), "${app-staging-db:endpoint.port}");
        assert_eq!(Attr::literal("plain").to_string(), "plain");
    }

    #[test]
    fn resource_ids_are_lowercased() {
        let topology = Topology::new("App-Staging");

        assert_eq!(topology.env_id(), "app-staging");
        assert_eq!(topology.resource_id("vpc"), "app-staging-vpc");
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut topology = Topology::new("env");
        topology
            .add("env-bucket", ResourceKind::Bucket, &json!({}))
            .unwrap();

        let err = topology
            .add("env-bucket", ResourceKind::Bucket, &json!({}))
            .unwrap_err();
        assert_eq!(err.to_string(), "duplicate resource id: env-bucket");
    }

    #[test]
    fn config_tokens_become_edges() {
        let mut topology = Topology::new("env");
        topology
            .add("env-db", ResourceKind::DatabaseCluster, &json!({}))
            .unwrap();
        let port = topology.attr("env-db", "endpoint.port");
        topology
            .add(
                "env-service",
                ResourceKind::Service,
                &json!({ "env": { "DB_PORT": port } }),
            )
            .unwrap();

        assert_eq!(
            topology.edges(),
            &[("env-service".to_string(), "env-db".to_string())]
        );
        assert!(topology.validate().is_ok());
    }

    #[test]
    fn forward_references_resolve_at_validation() {
        let mut topology = Topology::new("env");
        let origin = topology.attr("env-bucket", "regional-domain-name");
        topology
            .add(
                "env-cdn",
                ResourceKind::Distribution,
                &json!({ "origin": origin }),
            )
            .unwrap();

        let err = topology.validate().unwrap_err();
        assert!(matches!(err, AssemblyError::UnresolvedReference { .. }));

        topology
            .add("env-bucket", ResourceKind::Bucket, &json!({}))
            .unwrap();
        assert!(topology.validate().is_ok());
    }

    #[test]
    fn cycles_rejected() {
        let mut topology = Topology::new("env");
        let b_attr = topology.attr("env-b", "id");
        topology
            .add("env-a", ResourceKind::Bucket, &json!({ "peer": b_attr }))
            .unwrap();
        let a_attr = topology.attr("env-a", "id");
        topology
            .add("env-b", ResourceKind::Bucket, &json!({ "peer": a_attr }))
            .unwrap();

        let err = topology.validate().unwrap_err();
        assert!(matches!(err, AssemblyError::DependencyCycle(_)));
    }

    #[test]
    fn duplicate_group_rejected() {
        let mut topology = Topology::new("env");
        topology.group("env-db-security-group").unwrap();

        let err = topology.group("env-db-security-group").unwrap_err();
        assert_eq!(
            err.to_string(),
            "duplicate traffic group: env-db-security-group"
        );
    }

    #[test]
    fn rule_into_unknown_group_rejected() {
        let mut topology = Topology::new("env");
        let rule = IngressRule::tcp(
            PortSpec::Literal(22),
            RuleSource::AnyIpv4,
            "operator access",
        );

        let err = topology.add_rule("env-missing", rule).unwrap_err();
        assert_eq!(err.to_string(), "unknown traffic group: env-missing");
    }
}
