use armature::{Assembler, Profile};
use serde_json::Value;

fn staging() -> Profile {
    Profile::new("app-staging")
        .domain("staging.domain.com")
        .env_secret("arn:aws:secretsmanager:eu-west-2:111111111111:secret:staging-env")
}

#[test]
fn yaml_description_has_every_section() {
    let topology = Assembler::new().assemble(&staging()).unwrap();
    let yaml = topology.to_yaml().unwrap();

    assert!(yaml.contains("environment: app-staging"));
    assert!(yaml.contains("nodes:"));
    assert!(yaml.contains("edges:"));
    assert!(yaml.contains("rules:"));
    assert!(yaml.contains("grants:"));
    assert!(yaml.contains("outputs:"));
}

#[test]
fn json_description_round_trips() {
    let topology = Assembler::new().assemble(&staging()).unwrap();
    let parsed: Value = serde_json::from_str(&topology.to_json().unwrap()).unwrap();

    assert_eq!(parsed["environment"], "app-staging");
    assert!(parsed["nodes"].as_array().unwrap().len() > 20);

    let ids: Vec<&str> = parsed["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"app-staging-vpc"));
    assert!(ids.contains(&"app-staging-db"));
    assert!(ids.contains(&"app-staging-fargate"));
    assert!(ids.contains(&"app-staging-jump-host"));
    assert!(ids.iter().all(|id| id.starts_with("app-staging-")));
}

#[test]
fn kind_tags_are_kebab_case() {
    let topology = Assembler::new().assemble(&staging()).unwrap();
    let yaml = topology.to_yaml().unwrap();

    assert!(yaml.contains("kind: database-cluster"));
    assert!(yaml.contains("kind: cache-cluster"));
    assert!(yaml.contains("kind: security-group"));
    assert!(yaml.contains("kind: load-balancer"));
}

#[test]
fn deferred_tokens_survive_rendering() {
    let topology = Assembler::new().assemble(&staging()).unwrap();
    let yaml = topology.to_yaml().unwrap();

    assert!(yaml.contains("${app-staging-db:endpoint.port}"));
    assert!(yaml.contains("${app-staging-load-balancer:dns-name}"));
    assert!(yaml.contains("${app-staging-ecr-repository:repository-uri}"));
}

#[test]
fn edges_reference_only_known_nodes() {
    let topology = Assembler::new().assemble(&staging()).unwrap();

    for (from, to) in topology.edges() {
        assert!(topology.contains(from), "dangling edge source {from}");
        assert!(topology.contains(to), "dangling edge target {to}");
    }
}

#[test]
fn later_stages_depend_on_earlier_ones() {
    let topology = Assembler::new().assemble(&staging()).unwrap();
    let edges = topology.edges();

    let has = |from: &str, to: &str| {
        edges
            .iter()
            .any(|(f, t)| f == from && t == to)
    };

    assert!(has("app-staging-db", "app-staging-db-subnet"));
    assert!(has("app-staging-db", "app-staging-db-security-group"));
    assert!(has("app-staging-fargate", "app-staging-cluster"));
    assert!(has("app-staging-fargate", "app-staging-db"));
    assert!(has("app-staging-https-listener", "app-staging-cert"));
    assert!(has("app-staging-cloudfront", "app-staging-bucket"));
    assert!(has("app-staging-dns-a-record", "app-staging-hosted-zone"));
}

#[test]
fn credentials_are_referenced_never_embedded() {
    let topology = Assembler::new().assemble(&staging()).unwrap();

    let secret = topology.node("app-staging-db-secret").unwrap();
    assert_eq!(secret.config["generate-password"], Value::Bool(true));
    assert!(secret.config.get("password").is_none());

    let secrets = &topology.node("app-staging-fargate").unwrap().config["secrets"];
    assert_eq!(secrets["DB_PASSWORD"]["secret"], "app-staging-db-secret");
    assert_eq!(secrets["DB_PASSWORD"]["key"], "password");
}
