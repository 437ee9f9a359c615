use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use crate::compute::Delivery;
use crate::data::DataTier;
use crate::edge::EdgeStack;
use crate::error::{AssemblyError, AssemblyResult};
use crate::network::{Network, Region};
use crate::profile::Profile;
use crate::security::Perimeter;
use crate::topology::Topology;
use crate::wiring::{self, DEFAULT_EXECUTION_POLICIES, DEFAULT_TASK_POLICIES};

/// Assembles environment profiles into topology descriptions.
///
/// Assembly is a pure function from profile to description: no
/// I/O, no suspension, and each environment is fully independent
/// of the others.
pub struct Assembler {
    profiles: Vec<Profile>,
    region: Region,
    task_policies: Vec<String>,
    execution_policies: Vec<String>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            profiles: Vec::new(),
            region: Region::default(),
            task_policies: DEFAULT_TASK_POLICIES.iter().map(ToString::to_string).collect(),
            execution_policies: DEFAULT_EXECUTION_POLICIES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    #[must_use]
    pub fn profile(mut self, profile: Profile) -> Self {
        self.profiles.push(profile);
        self
    }

    #[must_use]
    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Replace the managed policy set attached to the task
    /// identity.
    #[must_use]
    pub fn task_policies(mut self, policies: &[&str]) -> Self {
        self.task_policies = policies.iter().map(ToString::to_string).collect();
        self
    }

    /// Replace the managed policy set attached to the execution
    /// identity.
    #[must_use]
    pub fn execution_policies(mut self, policies: &[&str]) -> Self {
        self.execution_policies = policies.iter().map(ToString::to_string).collect();
        self
    }

    /// Assemble one environment: validate the profile, run the
    /// stage pipeline, then validate the resulting graph.
    pub fn assemble(&self, profile: &Profile) -> AssemblyResult<Topology> {
        profile.validate()?;

        let mut topology = Topology::new(&profile.name);
        let network = Network::build(&mut topology, &self.region)?;
        let perimeter = Perimeter::build(&mut topology, &network)?;
        let data = DataTier::build(&mut topology, profile, &network, &perimeter)?;
        let edge = EdgeStack::build(&mut topology, profile)?;
        let delivery = Delivery::build(
            &mut topology,
            profile,
            &self.region,
            &network,
            &perimeter,
            &data,
            &edge,
        )?;
        edge.alias_records(&mut topology, profile, &delivery.lb_dns)?;
        wiring::wire(
            &mut topology,
            &data,
            &delivery,
            &self.task_policies,
            &self.execution_policies,
        )?;

        topology.validate()?;
        Ok(topology)
    }

    /// Assemble every configured environment. One environment's
    /// configuration error never affects another's result.
    #[must_use]
    pub fn assemble_all(&self) -> Vec<(String, AssemblyResult<Topology>)> {
        self.profiles
            .iter()
            .map(|profile| (profile.name.clone(), self.assemble(profile)))
            .collect()
    }

    /// Parse CLI arguments and dispatch the appropriate command.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatched command fails.
    pub fn run(&self) -> AssemblyResult<()> {
        let cli = Cli::parse();

        match &cli.command {
            Command::List => {
                self.cmd_list();
                Ok(())
            }
            Command::Synth {
                environment,
                format,
                out,
            } => self.cmd_synth(environment.as_deref(), *format, out.as_deref()),
        }
    }

    fn cmd_list(&self) {
        for profile in &self.profiles {
            println!("{}", profile.name);
        }
    }

    fn cmd_synth(
        &self,
        environment: Option<&str>,
        format: Format,
        out: Option<&Path>,
    ) -> AssemblyResult<()> {
        let selected: Vec<&Profile> = match environment {
            Some(name) => vec![self.find(name)?],
            None => self.profiles.iter().collect(),
        };

        let mut first_error = None;
        for profile in selected {
            match self.assemble(profile) {
                Ok(topology) => {
                    let rendered = match format {
                        Format::Yaml => topology.to_yaml()?,
                        Format::Json => topology.to_json()?,
                    };
                    if let Some(dir) = out {
                        let path = dir.join(format!("{}.{}", profile.name, format.extension()));
                        std::fs::write(&path, &rendered)?;
                        eprintln!("wrote {}", path.display());
                    } else {
                        println!("{rendered}");
                    }
                }
                Err(error) => {
                    eprintln!("{}: {error}", profile.name);
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn find(&self, name: &str) -> AssemblyResult<&Profile> {
        self.profiles
            .iter()
            .find(|profile| profile.name == name)
            .ok_or_else(|| AssemblyError::UnknownEnvironment(name.to_string()))
    }
}

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Topology assembly")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List configured environments
    List,

    /// Render the assembled topology description
    Synth {
        /// Environment name; all environments when omitted
        environment: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: Format,

        /// Write descriptions to this directory instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    const fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}
