use serde::Serialize;

use crate::error::AssemblyResult;
use crate::profile::Profile;
use crate::topology::{Attr, ResourceKind, Topology};

pub const RECORD_TTL_SECS: u64 = 60;

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ZoneConfig {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct DnsRecordConfig {
    zone: String,
    record_type: &'static str,
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alias_target: Option<Attr>,
    ttl_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct CertificateConfig {
    name: String,
    domain_name: String,
    subject_alternative_names: Vec<String>,
    validation: &'static str,
    zone: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct DistributionConfig {
    origin_bucket: String,
    origin_domain: Attr,
    default_behavior: &'static str,
}

/// Public edge of the environment: hosted zone, abuse-prevention
/// record, DNS-validated certificate, and a content-distribution
/// front over the public asset bucket.
///
/// Certificate validation completes asynchronously on the
/// provider side; only the zone dependency is declared here, the
/// apply engine owns the wait.
#[derive(Debug, Clone)]
pub struct EdgeStack {
    pub zone: String,
    pub apex: String,
    pub certificate: String,
    pub distribution: String,
    pub cdn_domain: Attr,
}

impl EdgeStack {
    pub fn build(topology: &mut Topology, profile: &Profile) -> AssemblyResult<Self> {
        let apex = profile.apex().to_string();

        let zone = topology.resource_id("hosted-zone");
        topology.add(&zone, ResourceKind::HostedZone, &ZoneConfig { name: apex.clone() })?;

        let caa = topology.resource_id("dns-caa-record");
        topology.add(
            &caa,
            ResourceKind::DnsRecord,
            &DnsRecordConfig {
                zone: zone.clone(),
                record_type: "CAA",
                name: apex.clone(),
                values: vec!["0 issue \"amazon.com\"".to_string()],
                alias_target: None,
                ttl_secs: RECORD_TTL_SECS,
            },
        )?;
        topology.depend(&caa, &zone);

        // A www-prefixed domain keeps the full name as the
        // certificate subject and covers the apex as a SAN.
        let subject_alternative_names = if profile.has_www() {
            vec![apex.clone()]
        } else {
            Vec::new()
        };
        let certificate = topology.resource_id("cert");
        topology.add(
            &certificate,
            ResourceKind::Certificate,
            &CertificateConfig {
                name: certificate.clone(),
                domain_name: profile.domain.clone(),
                subject_alternative_names,
                validation: "dns",
                zone: zone.clone(),
            },
        )?;
        topology.depend(&certificate, &zone);

        // The asset bucket is owned by the delivery stage and
        // added later; the token reference resolves during
        // validation.
        let bucket = topology.resource_id("bucket");
        let distribution = topology.resource_id("cloudfront");
        let origin_domain = topology.attr(&bucket, "regional-domain-name");
        topology.add(
            &distribution,
            ResourceKind::Distribution,
            &DistributionConfig {
                origin_bucket: bucket,
                origin_domain,
                default_behavior: "redirect-to-https",
            },
        )?;
        let cdn_domain = topology.attr(&distribution, "domain-name");

        Ok(Self {
            zone,
            apex,
            certificate,
            distribution,
            cdn_domain,
        })
    }

    /// Point the configured domain at the load balancer; a
    /// www-prefixed domain gets a second record for the apex.
    /// Runs after the delivery stage so the target exists.
    pub fn alias_records(
        &self,
        topology: &mut Topology,
        profile: &Profile,
        lb_dns: &Attr,
    ) -> AssemblyResult<()> {
        let record = topology.resource_id("dns-a-record");
        topology.add(
            &record,
            ResourceKind::DnsRecord,
            &DnsRecordConfig {
                zone: self.zone.clone(),
                record_type: "A",
                name: profile.domain.clone(),
                values: Vec::new(),
                alias_target: Some(lb_dns.clone()),
                ttl_secs: RECORD_TTL_SECS,
            },
        )?;
        topology.depend(&record, &self.zone);

        if profile.has_www() {
            let apex_record = topology.resource_id("dns-apex-record");
            topology.add(
                &apex_record,
                ResourceKind::DnsRecord,
                &DnsRecordConfig {
                    zone: self.zone.clone(),
                    record_type: "A",
                    name: self.apex.clone(),
                    values: Vec::new(),
                    alias_target: Some(lb_dns.clone()),
                    ttl_secs: RECORD_TTL_SECS,
                },
            )?;
            topology.depend(&apex_record, &self.zone);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn built(domain: &str) -> (Topology, EdgeStack) {
        let profile = Profile::new("app-staging")
            .domain(domain)
            .env_secret("arn:secret:staging");
        let mut topology = Topology::new(&profile.name);
        let edge = EdgeStack::build(&mut topology, &profile).unwrap();
        (topology, edge)
    }

    #[test]
    fn zone_uses_the_apex() {
        let (topology, edge) = built("www.example.com");

        assert_eq!(edge.apex, "example.com");
        let zone = topology.node(&edge.zone).unwrap();
        assert_eq!(zone.config["name"], json!("example.com"));
    }

    #[test]
    fn bare_domain_has_no_alternative_names() {
        let (topology, edge) = built("example.com");

        let cert = topology.node(&edge.certificate).unwrap();
        assert_eq!(cert.config["domain-name"], json!("example.com"));
        assert_eq!(cert.config["subject-alternative-names"], json!([]));
    }

    #[test]
    fn www_domain_covers_the_apex() {
        let (topology, edge) = built("www.example.com");

        let cert = topology.node(&edge.certificate).unwrap();
        assert_eq!(cert.config["domain-name"], json!("www.example.com"));
        assert_eq!(
            cert.config["subject-alternative-names"],
            json!(["example.com"])
        );
    }

    #[test]
    fn distribution_references_the_asset_bucket() {
        let (topology, edge) = built("example.com");

        let distribution = topology.node(&edge.distribution).unwrap();
        assert_eq!(
            distribution.config["origin-domain"],
            json!("${app-staging-bucket:regional-domain-name}")
        );
        // forward reference: the bucket does not exist yet
        assert!(topology.validate().is_err());
    }

    #[test]
    fn caa_record_is_always_present() {
        let (topology, _) = built("example.com");

        let caa = topology.node("app-staging-dns-caa-record").unwrap();
        assert_eq!(caa.config["record-type"], json!("CAA"));
        assert_eq!(caa.config["ttl-secs"], json!(60));
    }
}
