use serde::Serialize;

use crate::error::{AssemblyError, AssemblyResult};

/// Elastic capacity bounds for serverless-style database sizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CapacityRange {
    pub min: f64,
    pub max: f64,
}

impl CapacityRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Per-environment sizing knobs. Everything else in the topology
/// is environment-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Resources {
    pub db_capacity: CapacityRange,
    pub container_cpu: u32,
    pub container_memory_mib: u32,
    pub cache_node_type: String,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            db_capacity: CapacityRange::new(0.5, 1.0),
            container_cpu: 512,
            container_memory_mib: 1024,
            cache_node_type: "cache.t2.micro".to_string(),
        }
    }
}

/// Defines one deployment environment: naming prefix, public
/// domain, secret reference, and sizing parameters.
///
/// One profile assembles into exactly one topology. Re-assembling
/// the same profile yields the same resource identifiers.
///
/// # Example
///
/// ```
/// use armature::Profile;
///
/// let staging = Profile::new("app-staging")
///     .domain("staging.example.com")
///     .env_secret("arn:aws:secretsmanager:eu-west-2:123456789012:secret:staging-env")
///     .container_cpu(512)
///     .container_memory_mib(1024);
///
/// assert_eq!(staging.name, "app-staging");
/// assert!(staging.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub domain: String,
    pub env_secret: String,
    pub resources: Resources,
}

impl Profile {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            domain: String::new(),
            env_secret: String::new(),
            resources: Resources::default(),
        }
    }

    #[must_use]
    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    #[must_use]
    pub fn env_secret(mut self, reference: &str) -> Self {
        self.env_secret = reference.to_string();
        self
    }

    #[must_use]
    pub const fn db_capacity(mut self, min: f64, max: f64) -> Self {
        self.resources.db_capacity = CapacityRange::new(min, max);
        self
    }

    #[must_use]
    pub const fn container_cpu(mut self, units: u32) -> Self {
        self.resources.container_cpu = units;
        self
    }

    #[must_use]
    pub const fn container_memory_mib(mut self, mib: u32) -> Self {
        self.resources.container_memory_mib = mib;
        self
    }

    #[must_use]
    pub fn cache_node_type(mut self, node_type: &str) -> Self {
        self.resources.cache_node_type = node_type.to_string();
        self
    }

    /// The apex domain: the configured domain with any `www.`
    /// prefix stripped.
    #[must_use]
    pub fn apex(&self) -> &str {
        self.domain.strip_prefix("www.").unwrap_or(&self.domain)
    }

    /// Whether the configured domain carries a `www.` prefix.
    #[must_use]
    pub fn has_www(&self) -> bool {
        self.domain.starts_with("www.")
    }

    /// Check every profile field before any resource is described.
    ///
    /// All failures here are configuration errors: fatal for this
    /// environment, reported with the offending field and value.
    pub fn validate(&self) -> AssemblyResult<()> {
        if self.name.is_empty() {
            return Err(AssemblyError::InvalidField {
                field: "name",
                value: self.name.clone(),
                reason: "environment name must not be empty",
            });
        }

        validate_domain(&self.domain)?;

        if self.env_secret.is_empty() {
            return Err(AssemblyError::InvalidField {
                field: "env-secret",
                value: self.env_secret.clone(),
                reason: "secret reference must not be empty",
            });
        }

        let capacity = self.resources.db_capacity;
        if !capacity.min.is_finite() || !capacity.max.is_finite() || capacity.min <= 0.0 {
            return Err(AssemblyError::InvalidField {
                field: "db-capacity",
                value: format!("[{}, {}]", capacity.min, capacity.max),
                reason: "capacity bounds must be finite and positive",
            });
        }
        if capacity.max < capacity.min {
            return Err(AssemblyError::CapacityRange {
                min: capacity.min,
                max: capacity.max,
            });
        }

        if self.resources.container_cpu == 0 {
            return Err(AssemblyError::InvalidField {
                field: "container-cpu",
                value: self.resources.container_cpu.to_string(),
                reason: "CPU units must be positive",
            });
        }
        if self.resources.container_memory_mib == 0 {
            return Err(AssemblyError::InvalidField {
                field: "container-memory-mib",
                value: self.resources.container_memory_mib.to_string(),
                reason: "memory must be positive",
            });
        }
        if self.resources.cache_node_type.is_empty() {
            return Err(AssemblyError::InvalidField {
                field: "cache-node-type",
                value: self.resources.cache_node_type.clone(),
                reason: "cache node type must not be empty",
            });
        }

        Ok(())
    }
}

fn validate_domain(domain: &str) -> AssemblyResult<()> {
    let malformed = domain.is_empty()
        || domain.contains(char::is_whitespace)
        || domain.contains("://")
        || domain.contains('/')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.');

    if malformed {
        return Err(AssemblyError::MalformedDomain(domain.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let profile = Profile::new("app-staging");

        assert_eq!(profile.name, "app-staging");
        assert!(profile.domain.is_empty());
        assert!(profile.env_secret.is_empty());
        assert_eq!(profile.resources.db_capacity, CapacityRange::new(0.5, 1.0));
        assert_eq!(profile.resources.container_cpu, 512);
        assert_eq!(profile.resources.container_memory_mib, 1024);
        assert_eq!(profile.resources.cache_node_type, "cache.t2.micro");
    }

    #[test]
    fn builder_chain() {
        let profile = Profile::new("app-prod")
            .domain("www.example.com")
            .env_secret("arn:secret:prod")
            .db_capacity(0.5, 3.0)
            .container_cpu(2048)
            .container_memory_mib(4096)
            .cache_node_type("cache.t3.medium");

        assert_eq!(profile.domain, "www.example.com");
        assert_eq!(profile.env_secret, "arn:secret:prod");
        assert_eq!(profile.resources.db_capacity, CapacityRange::new(0.5, 3.0));
        assert_eq!(profile.resources.container_cpu, 2048);
        assert_eq!(profile.resources.container_memory_mib, 4096);
        assert_eq!(profile.resources.cache_node_type, "cache.t3.medium");
    }

    #[test]
    fn apex_strips_www_prefix_only() {
        assert_eq!(Profile::new("x").domain("www.example.com").apex(), "example.com");
        assert_eq!(Profile::new("x").domain("staging.example.com").apex(), "staging.example.com");
        // "www." in the middle is part of the name, not a prefix
        assert_eq!(Profile::new("x").domain("app.www.example.com").apex(), "app.www.example.com");
    }

    #[test]
    fn rejects_inverted_capacity_range() {
        let profile = Profile::new("x")
            .domain("example.com")
            .env_secret("arn:secret")
            .db_capacity(3.0, 0.5);

        let err = profile.validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid capacity range: max 0.5 is below min 3");
    }

    #[test]
    fn rejects_non_positive_capacity() {
        let profile = Profile::new("x")
            .domain("example.com")
            .env_secret("arn:secret")
            .db_capacity(0.0, 1.0);

        assert!(profile.validate().is_err());
    }

    #[test]
    fn rejects_malformed_domains() {
        for domain in ["", "no-dot", "https://example.com", ".example.com", "example.com.", "exa mple.com"] {
            let profile = Profile::new("x").domain(domain).env_secret("arn:secret");
            assert!(profile.validate().is_err(), "accepted {domain:?}");
        }
    }

    #[test]
    fn rejects_zero_sizing() {
        let base = Profile::new("x").domain("example.com").env_secret("arn:secret");

        assert!(base.clone().container_cpu(0).validate().is_err());
        assert!(base.clone().container_memory_mib(0).validate().is_err());
        assert!(base.cache_node_type("").validate().is_err());
    }

    #[test]
    fn rejects_missing_secret_reference() {
        let profile = Profile::new("x").domain("example.com");

        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("env-secret"));
    }
}
