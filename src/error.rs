pub type AssemblyResult<T> = Result<T, AssemblyError>;

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("invalid capacity range: max {max} is below min {min}")]
    CapacityRange { min: f64, max: f64 },

    #[error("invalid value for '{field}': '{value}' ({reason})")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("malformed domain: '{0}'")]
    MalformedDomain(String),

    #[error("region '{region}' supplies {found} availability zones, {needed} required")]
    AvailabilityZones {
        region: String,
        needed: usize,
        found: usize,
    },

    #[error("duplicate resource id: {0}")]
    DuplicateResource(String),

    #[error("duplicate traffic group: {0}")]
    DuplicateGroup(String),

    #[error("unknown traffic group: {0}")]
    UnknownGroup(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("unresolved reference from '{from}' to '{node}'")]
    UnresolvedReference { from: String, node: String },

    #[error("dependency cycle through '{0}'")]
    DependencyCycle(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
