//! Narrow the managed policy set attached to the task identity.
//!
//! The default set is deliberately broad; deployments that know
//! exactly which platform capabilities the workload needs can
//! override it without touching the assembly logic.

use armature::{Assembler, Profile};

fn main() -> anyhow::Result<()> {
    let staging = Profile::new("app-staging")
        .domain("staging.example.com")
        .env_secret("arn:aws:secretsmanager:eu-west-2:111111111111:secret:staging-env");

    let assembler = Assembler::new()
        .profile(staging)
        .task_policies(&["AmazonSSMManagedInstanceCore", "AmazonSESFullAccess"])
        .execution_policies(&[]);

    assembler.run()?;
    Ok(())
}
