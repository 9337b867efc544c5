use crate::config::Config;
use crate::dryrun::DryRun;
use crate::error::Error;
use clap::{Parser, Subcommand};
use eyre::WrapErr;
use landzone_synth::{compute, topology, Engine, Graph, Outcome};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    arg_required_else_help = true,
    name = "landzone",
    version,
    about = "Provision a cloud network landing zone and its compute tier",
    long_about = "Synthesizes a complete landing zone resource graph (VPC, subnet tiers, \
                  internet and NAT egress, compute fleet) from landzone.toml and hands it \
                  to a reconciliation engine."
)]
pub struct Cli {
    /// Path to the landing zone config
    #[arg(short, long, value_name = "PATH", default_value = "landzone.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize the network and compute graphs and print them as JSON
    Synth {
        /// Write the output to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Walk both graphs in creation order without touching the cloud
    Apply {},

    /// Walk both graphs in reverse creation order without touching the cloud
    Destroy {},
}

impl Cli {
    pub async fn run(self) -> eyre::Result<()> {
        if !self.config.exists() {
            return Err(eyre::Report::new(Error::new(
                &format!("Config file not found: {}", self.config.display()),
                Some("Create landzone.toml or point at one with --config"),
            )));
        }

        let config = Config::from_path(&self.config)?;
        let (network, compute) = synthesize(&config)?;

        match self.command {
            Commands::Synth { output } => {
                let json = serde_json::to_string_pretty(&serde_json::json!({
                    "network": network,
                    "compute": compute,
                }))?;

                match output {
                    Some(path) => std::fs::write(&path, json)
                        .wrap_err(format!("Failed to write {path:?}"))?,
                    None => println!("{json}"),
                }
            }

            Commands::Apply {} => {
                report(&network, &DryRun.apply(&network).await?);
                report(&compute, &DryRun.apply(&compute).await?);
            }

            // The compute tier is parented under the network's identifiers,
            // so it goes down first
            Commands::Destroy {} => {
                report(&compute, &DryRun.destroy(&compute).await?);
                report(&network, &DryRun.destroy(&network).await?);
            }
        }

        Ok(())
    }
}

/// Network graph first, then the compute graph parented under its identifiers
fn synthesize(config: &Config) -> eyre::Result<(Graph, Graph)> {
    let network = topology::synthesize(&config.topology_params()?)
        .wrap_err("Failed to synthesize the network graph")?;

    let compute = compute::synthesize(&config.compute_params(&network)?)
        .wrap_err("Failed to synthesize the compute graph")?;

    Ok((network, compute))
}

fn report(graph: &Graph, outcomes: &[(String, Outcome)]) {
    for (id, outcome) in outcomes {
        let kind = graph
            .get(id)
            .map(|node| format!("{:?}", node.kind))
            .unwrap_or_default();

        let action = match outcome {
            Outcome::Created => console::style("create").green(),
            Outcome::Updated => console::style("update").yellow(),
            Outcome::Deleted => console::style("delete").red(),
            Outcome::Unchanged => console::style("no-op").dim(),
            Outcome::Failed => console::style("failed").red().bold(),
        };

        println!("{action:>8}  {kind} {id}");
    }
}
