use indexmap::IndexMap;
use serde::Serialize;

use crate::data::{DB_NAME, DataTier};
use crate::edge::EdgeStack;
use crate::error::AssemblyResult;
use crate::network::{Network, Region};
use crate::profile::Profile;
use crate::security::{Connections, Perimeter};
use crate::topology::{Attr, ResourceKind, Topology};

/// Health checking trades fast failure detection for slow-boot
/// tolerance.
pub const HEALTH_CHECK_PATH: &str = "/api/health-check";
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 120;
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 40;
pub const HEALTH_CHECK_UNHEALTHY_THRESHOLD: u32 = 5;

pub const SCALING_MIN_TASKS: u32 = 1;
pub const SCALING_MAX_TASKS: u32 = 4;
pub const SCALING_TARGET_PERCENT: u32 = 60;

pub const HTTPS_PORT: u16 = 443;
pub const EXEC_AUDIT_PREFIX: &str = "exec-command-output";

/// Named keys imported from the environment secret as extra
/// secret-backed variables. Empty by default; each declared key
/// is individually granted to the execution identity.
pub const SECRET_ENV_KEYS: &[&str] = &[];

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct KeyConfig {
    removal_policy: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct LogGroupConfig {
    encryption_key: String,
    removal_policy: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct BucketConfig {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    encryption_key: Option<String>,
    public_read: bool,
    auto_delete_objects: bool,
    removal_policy: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterConfig {
    name: String,
    network: String,
    execute_command: ExecuteCommandConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ExecuteCommandConfig {
    encryption_key: String,
    log_group: String,
    audit_bucket: String,
    bucket_prefix: &'static str,
    logging: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct RepositoryConfig {
    name: String,
    external: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ExternalSecretConfig {
    reference: String,
    external: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct RoleConfig {
    assumed_by: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct LoadBalancerConfig {
    name: String,
    network: String,
    subnets: Vec<String>,
    public: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct TargetGroupConfig {
    network: String,
    protocol: &'static str,
    health_check: HealthCheckConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct HealthCheckConfig {
    path: &'static str,
    interval_secs: u64,
    timeout_secs: u64,
    unhealthy_threshold: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct SecretRef {
    pub secret: String,
    pub key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ServiceConfig {
    name: String,
    cluster: String,
    cpu: u32,
    memory_mib: u32,
    desired_count: u32,
    image: String,
    environment: IndexMap<&'static str, String>,
    secrets: IndexMap<String, SecretRef>,
    task_role: String,
    execution_role: String,
    security_groups: Vec<String>,
    target_group: String,
    enable_execute_command: bool,
    logging: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ListenerConfig {
    load_balancer: String,
    port: u16,
    protocol: &'static str,
    ssl_policy: &'static str,
    certificate: String,
    default_target_group: String,
    open: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ScalingTargetConfig {
    service: String,
    min_tasks: u32,
    max_tasks: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ScalingPolicyConfig {
    target: String,
    metric: &'static str,
    target_percent: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct InstanceConfig {
    name: String,
    subnet: String,
    security_group: String,
    instance_type: &'static str,
    machine_image: &'static str,
    key_pair: String,
}

/// The compute cluster, the load-balanced service, and everything
/// the service is wired to: audit logging, asset stores, HTTPS
/// listener, autoscaling, and the operator jump host.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub cluster: String,
    pub service: String,
    pub load_balancer: String,
    pub target_group: String,
    pub task_role: String,
    pub execution_role: String,
    pub public_bucket: String,
    pub private_bucket: String,
    pub env_secret: String,
    pub repository: String,
    pub repository_uri: Attr,
    pub lb_dns: Attr,
    pub service_connections: Connections,
}

impl Delivery {
    #[allow(clippy::too_many_lines)]
    pub fn build(
        topology: &mut Topology,
        profile: &Profile,
        region: &Region,
        network: &Network,
        perimeter: &Perimeter,
        data: &DataTier,
        edge: &EdgeStack,
    ) -> AssemblyResult<Self> {
        let key = topology.resource_id("kms-key");
        topology.add(
            &key,
            ResourceKind::EncryptionKey,
            &KeyConfig {
                removal_policy: "destroy",
            },
        )?;

        let log_group = topology.resource_id("log-group");
        topology.add(
            &log_group,
            ResourceKind::LogGroup,
            &LogGroupConfig {
                encryption_key: key.clone(),
                removal_policy: "destroy",
            },
        )?;
        topology.depend(&log_group, &key);

        let exec_bucket = topology.resource_id("ecs-exec-bucket");
        topology.add(
            &exec_bucket,
            ResourceKind::Bucket,
            &BucketConfig {
                name: exec_bucket.clone(),
                encryption_key: Some(key.clone()),
                public_read: false,
                auto_delete_objects: false,
                removal_policy: "destroy",
            },
        )?;
        topology.depend(&exec_bucket, &key);

        let cluster = topology.resource_id("cluster");
        topology.add(
            &cluster,
            ResourceKind::Cluster,
            &ClusterConfig {
                name: cluster.clone(),
                network: network.vpc.clone(),
                execute_command: ExecuteCommandConfig {
                    encryption_key: key.clone(),
                    log_group: log_group.clone(),
                    audit_bucket: exec_bucket.clone(),
                    bucket_prefix: EXEC_AUDIT_PREFIX,
                    logging: "override",
                },
            },
        )?;
        for dependency in [&network.vpc, &key, &log_group, &exec_bucket] {
            topology.depend(&cluster, dependency);
        }

        // Referenced by fixed naming convention; created by the
        // registry owner, never by this assembly.
        let repository = topology.resource_id("ecr-repository");
        topology.add(
            &repository,
            ResourceKind::Repository,
            &RepositoryConfig {
                name: repository.clone(),
                external: true,
            },
        )?;
        let repository_uri = topology.attr(&repository, "repository-uri");

        let public_bucket = topology.resource_id("bucket");
        topology.add(
            &public_bucket,
            ResourceKind::Bucket,
            &BucketConfig {
                name: public_bucket.clone(),
                encryption_key: None,
                public_read: true,
                auto_delete_objects: true,
                removal_policy: "destroy",
            },
        )?;

        let private_bucket = topology.resource_id("private-bucket");
        topology.add(
            &private_bucket,
            ResourceKind::Bucket,
            &BucketConfig {
                name: private_bucket.clone(),
                encryption_key: None,
                public_read: false,
                auto_delete_objects: true,
                removal_policy: "destroy",
            },
        )?;

        let env_secret = topology.resource_id("web-secret");
        topology.add(
            &env_secret,
            ResourceKind::Secret,
            &ExternalSecretConfig {
                reference: profile.env_secret.clone(),
                external: true,
            },
        )?;

        let task_role = topology.resource_id("task-role");
        topology.add(
            &task_role,
            ResourceKind::Role,
            &RoleConfig {
                assumed_by: "ecs-tasks",
            },
        )?;
        let execution_role = topology.resource_id("execution-role");
        topology.add(
            &execution_role,
            ResourceKind::Role,
            &RoleConfig {
                assumed_by: "ecs-tasks",
            },
        )?;

        let load_balancer = topology.resource_id("load-balancer");
        topology.add(
            &load_balancer,
            ResourceKind::LoadBalancer,
            &LoadBalancerConfig {
                name: load_balancer.clone(),
                network: network.vpc.clone(),
                subnets: network.public_subnets.clone(),
                public: true,
            },
        )?;
        topology.depend(&load_balancer, &network.vpc);
        for subnet in &network.public_subnets {
            topology.depend(&load_balancer, subnet);
        }

        let target_group = topology.resource_id("target-group");
        topology.add(
            &target_group,
            ResourceKind::TargetGroup,
            &TargetGroupConfig {
                network: network.vpc.clone(),
                protocol: "http",
                health_check: HealthCheckConfig {
                    path: HEALTH_CHECK_PATH,
                    interval_secs: HEALTH_CHECK_INTERVAL_SECS,
                    timeout_secs: HEALTH_CHECK_TIMEOUT_SECS,
                    unhealthy_threshold: HEALTH_CHECK_UNHEALTHY_THRESHOLD,
                },
            },
        )?;
        topology.depend(&target_group, &network.vpc);

        let service = topology.resource_id("fargate");
        let environment = Self::environment(profile, region, &cluster, &service, data, edge, &public_bucket, &private_bucket);

        let mut secrets = IndexMap::new();
        secrets.insert(
            "DB_USERNAME".to_string(),
            SecretRef {
                secret: data.db_secret.clone(),
                key: "username".to_string(),
            },
        );
        secrets.insert(
            "DB_PASSWORD".to_string(),
            SecretRef {
                secret: data.db_secret.clone(),
                key: "password".to_string(),
            },
        );
        for key_name in SECRET_ENV_KEYS {
            secrets.insert(
                (*key_name).to_string(),
                SecretRef {
                    secret: env_secret.clone(),
                    key: (*key_name).to_string(),
                },
            );
        }

        topology.add(
            &service,
            ResourceKind::Service,
            &ServiceConfig {
                name: service.clone(),
                cluster: cluster.clone(),
                cpu: profile.resources.container_cpu,
                memory_mib: profile.resources.container_memory_mib,
                desired_count: 1,
                image: format!("{repository_uri}:latest"),
                environment,
                secrets,
                task_role: task_role.clone(),
                execution_role: execution_role.clone(),
                security_groups: vec![perimeter.service_group.clone()],
                target_group: target_group.clone(),
                enable_execute_command: true,
                logging: true,
            },
        )?;
        for dependency in [
            &cluster,
            &task_role,
            &execution_role,
            &target_group,
            &perimeter.service_group,
            &data.db_secret,
            &env_secret,
            &public_bucket,
            &private_bucket,
        ] {
            topology.depend(&service, dependency);
        }

        let listener = topology.resource_id("https-listener");
        topology.add(
            &listener,
            ResourceKind::Listener,
            &ListenerConfig {
                load_balancer: load_balancer.clone(),
                port: HTTPS_PORT,
                protocol: "https",
                ssl_policy: "recommended",
                certificate: edge.certificate.clone(),
                default_target_group: target_group.clone(),
                open: true,
            },
        )?;
        for dependency in [&load_balancer, &edge.certificate, &target_group] {
            topology.depend(&listener, dependency);
        }

        let scaling_target = topology.resource_id("scaling-target");
        topology.add(
            &scaling_target,
            ResourceKind::ScalingTarget,
            &ScalingTargetConfig {
                service: service.clone(),
                min_tasks: SCALING_MIN_TASKS,
                max_tasks: SCALING_MAX_TASKS,
            },
        )?;
        topology.depend(&scaling_target, &service);

        // Independent policies; effective capacity follows
        // whichever is more aggressive at any instant.
        for (suffix, metric) in [
            ("fargate-cpu-scaling", "cpu-utilization"),
            ("fargate-memory-scaling", "memory-utilization"),
        ] {
            let policy = topology.resource_id(suffix);
            topology.add(
                &policy,
                ResourceKind::ScalingPolicy,
                &ScalingPolicyConfig {
                    target: scaling_target.clone(),
                    metric,
                    target_percent: SCALING_TARGET_PERCENT,
                },
            )?;
            topology.depend(&policy, &scaling_target);
        }

        let jump_host = topology.resource_id("jump-host");
        topology.add(
            &jump_host,
            ResourceKind::Instance,
            &InstanceConfig {
                name: jump_host.clone(),
                subnet: network.public_subnets[0].clone(),
                security_group: perimeter.db_group.clone(),
                instance_type: "t2.nano",
                machine_image: "amazon-linux-2",
                key_pair: topology.resource_id("operator-key"),
            },
        )?;
        topology.depend(&jump_host, &network.public_subnets[0]);
        topology.depend(&jump_host, &perimeter.db_group);

        let lb_dns = topology.attr(&load_balancer, "dns-name");

        Ok(Self {
            cluster,
            service,
            load_balancer,
            target_group,
            task_role,
            execution_role,
            public_bucket,
            private_bucket,
            env_secret,
            repository,
            repository_uri,
            lb_dns,
            service_connections: Connections::new(&perimeter.service_group),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn environment(
        profile: &Profile,
        region: &Region,
        cluster: &str,
        service: &str,
        data: &DataTier,
        edge: &EdgeStack,
        public_bucket: &str,
        private_bucket: &str,
    ) -> IndexMap<&'static str, String> {
        let mut environment = IndexMap::new();
        environment.insert("APP_DOMAIN", profile.domain.clone());
        environment.insert("BASE_DOMAIN", edge.apex.clone());
        environment.insert("AWS_BUCKET", public_bucket.to_string());
        environment.insert("AWS_PRIVATE_BUCKET", private_bucket.to_string());
        environment.insert("DB_CONNECTION", "mysql".to_string());
        environment.insert("DB_HOST", data.db_host.to_string());
        environment.insert("DB_PORT", data.db_port.to_string());
        environment.insert("DB_DATABASE", DB_NAME.to_string());
        environment.insert("AWS_DEFAULT_REGION", region.name.clone());
        environment.insert("REDIS_HOST", data.cache_host.to_string());
        environment.insert("AWS_URL", format!("https://{}", edge.cdn_domain));
        environment.insert("AWS_ECS_CLUSTER", cluster.to_string());
        environment.insert("AWS_ECS_SERVICE", service.to_string());
        environment
    }
}
