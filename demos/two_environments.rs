//! Staging and production from one parameterized definition.
//!
//! Run with:
//!
//! ```sh
//! cargo run --example two_environments -- list
//! cargo run --example two_environments -- synth app-staging
//! ```

use armature::{Assembler, Profile};

fn main() -> anyhow::Result<()> {
    let staging = Profile::new("app-staging")
        .domain("staging.example.com")
        .env_secret("arn:aws:secretsmanager:eu-west-2:111111111111:secret:staging-env");

    // Production overrides sizing upward; everything else is the
    // same assembly logic.
    let production = Profile::new("app-prod")
        .domain("www.example.com")
        .env_secret("arn:aws:secretsmanager:eu-west-2:111111111111:secret:prod-env")
        .db_capacity(0.5, 3.0)
        .container_cpu(2048)
        .container_memory_mib(4096)
        .cache_node_type("cache.t3.medium");

    let assembler = Assembler::new().profile(staging).profile(production);
    assembler.run()?;
    Ok(())
}
