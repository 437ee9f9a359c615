//! Declarative cloud topology DSL for Rust.
//!
//! [Repository](https://github.com/LeakIX/armature) |
//! [Online docs](https://leakix.github.io/armature/armature/) |
//! [crates.io](https://crates.io/crates/armature)
//!
//! Armature turns a small environment profile - a domain, a
//! secret reference, and a handful of sizing parameters - into a
//! fully wired description of the cloud resources the
//! environment needs: network, database, cache, edge (DNS, TLS,
//! CDN), and a load-balanced compute service. No YAML templates,
//! no copy-pasted per-environment stacks.
//!
//! The name comes from sculpture: the *armature* is the internal
//! frame everything else is wired onto.
//!
//! # Overview
//!
//! An environment is defined by a [`Profile`] and assembled by an
//! [`Assembler`] into a [`Topology`]:
//!
//! - **Network** - address space over two availability zones,
//!   public and private subnet tiers, one NAT egress path
//! - **Security perimeter** - deny-all traffic-control groups for
//!   database, cache, and service
//! - **Data tier** - serverless database cluster and cache
//!   cluster, each guarded by its own group
//! - **Edge** - hosted zone, DNS-validated certificate, CDN over
//!   the public asset bucket
//! - **Compute** - audit-logged cluster, load-balanced service,
//!   HTTPS listener, health checks, autoscaling, jump host
//! - **Wiring** - connection grants, permission grants, published
//!   outputs
//!
//! Assembly is pure and deterministic: the same profile always
//! produces the same identifiers, edges, and rules, so an
//! external apply engine can converge repeatedly without
//! duplicating resources. Cross-resource values that only exist
//! at apply time (endpoint ports, hostnames) are carried as
//! `${node:attr}` tokens, and every token becomes a dependency
//! edge in a DAG that is validated - dangling references and
//! cycles rejected - before anything is rendered.
//!
//! # Examples
//!
//! ## Assemble one environment
//!
//! ```
//! use armature::{Assembler, Profile};
//!
//! let staging = Profile::new("app-staging")
//!     .domain("staging.example.com")
//!     .env_secret("arn:aws:secretsmanager:eu-west-2:123456789012:secret:staging-env");
//!
//! let topology = Assembler::new().assemble(&staging)?;
//!
//! assert!(topology.outputs().contains_key("load-balancer-domain"));
//! assert!(topology.contains("app-staging-db"));
//! # Ok::<(), armature::AssemblyError>(())
//! ```
//!
//! ## Two environments from one definition
//!
//! Create an `xtask/src/main.rs` in your project:
//!
//! ```rust,no_run
//! use armature::{Assembler, Profile};
//!
//! fn main() -> anyhow::Result<()> {
//!     let staging = Profile::new("app-staging")
//!         .domain("staging.example.com")
//!         .env_secret("arn:aws:secretsmanager:eu-west-2:111111111111:secret:staging-env");
//!
//!     let production = Profile::new("app-prod")
//!         .domain("www.example.com")
//!         .env_secret("arn:aws:secretsmanager:eu-west-2:111111111111:secret:prod-env")
//!         .db_capacity(0.5, 3.0)
//!         .container_cpu(2048)
//!         .container_memory_mib(4096)
//!         .cache_node_type("cache.t3.medium");
//!
//!     let assembler = Assembler::new().profile(staging).profile(production);
//!     assembler.run()?;
//!     Ok(())
//! }
//! ```
//!
//! Then use `cargo xtask` subcommands:
//!
//! ```sh
//! # Show the configured environments
//! cargo xtask list
//!
//! # Render one environment to stdout
//! cargo xtask synth app-staging
//!
//! # Render everything as JSON into a directory
//! cargo xtask synth --format json --out build/
//! ```
//!
//! The rendered description (nodes, edges, rules, grants,
//! outputs) is the contract with the apply engine; armature never
//! talks to a cloud provider itself.

// Allow noisy pedantic lints that don't add value for a
// topology-description crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod assembler;
pub mod compute;
pub mod data;
pub mod edge;
pub mod error;
pub mod network;
pub mod profile;
pub mod security;
pub mod topology;
pub mod wiring;

pub use assembler::Assembler;
pub use error::AssemblyError;
pub use error::AssemblyResult;
pub use network::Region;
pub use profile::CapacityRange;
pub use profile::Profile;
pub use profile::Resources;
pub use security::Connections;
pub use security::IngressRule;
pub use security::PortSpec;
pub use security::Protocol;
pub use security::RuleSource;
pub use topology::Attr;
pub use topology::ResourceKind;
pub use topology::ResourceNode;
pub use topology::Topology;
pub use wiring::AccessLevel;
pub use wiring::Grant;
