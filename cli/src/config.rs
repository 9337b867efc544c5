use eyre::{ContextCompat, WrapErr};
use landzone_synth::{
    ComputeMode, ComputeParams, Graph, NatScope, ResourceKind, RouteTableScope, Tags,
    TopologyParams,
};
use serde::Deserialize;
use std::path::Path;

/// The landing zone description loaded from landzone.toml
///
/// Environment overrides: LANDZONE_INSTANCE_COUNT and LANDZONE_MONTHLY_BUDGET
/// take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project name, used as a prefix for all resources
    pub name: String,

    pub network: NetworkSection,
    pub compute: ComputeSection,
    pub tags: Tags,
}

/// FileConfig is the structure of landzone.toml
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    /// [project]
    /// name = "some-project"
    #[serde(default)]
    project: ProjectSection,

    #[serde(default)]
    network: NetworkSection,

    #[serde(default)]
    compute: ComputeSection,

    #[serde(default)]
    tags: Tags,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProjectSection {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkSection {
    #[serde(default)]
    pub cidr_block: String,

    #[serde(default)]
    pub public_subnet_cidrs: Vec<String>,

    #[serde(default)]
    pub private_subnet_cidrs: Vec<String>,

    #[serde(default)]
    pub availability_zones: Vec<String>,

    #[serde(default)]
    pub route_table_scope: RouteTableScope,

    #[serde(default)]
    pub nat_scope: NatScope,

    pub monthly_budget: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComputeSection {
    #[serde(default)]
    pub mode: ComputeMode,

    pub instance_count: Option<u32>,

    #[serde(default)]
    pub image_id: String,

    pub instance_type: Option<String>,
}

impl Config {
    pub fn from_path(path: &Path) -> eyre::Result<Self> {
        let toml_string = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read config: {path:?}"))?;

        // Fallback project name is the directory the CLI runs in
        let current_dir = std::env::current_dir().wrap_err("Failed to get current dir")?;
        let fallback = current_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("landzone");

        Self::from_toml(&toml_string, fallback)
    }

    fn from_toml(toml_string: &str, fallback_name: &str) -> eyre::Result<Self> {
        let config: FileConfig =
            toml::from_str(toml_string).wrap_err("Failed to parse landzone.toml")?;

        let name = if config.project.name.is_empty() {
            fallback_name.to_string()
        } else {
            config.project.name
        };

        Ok(Config {
            name,
            network: config.network,
            compute: config.compute,
            tags: config.tags,
        })
    }

    pub fn topology_params(&self) -> eyre::Result<TopologyParams> {
        let monthly_budget = match env_var("LANDZONE_MONTHLY_BUDGET")? {
            Some(value) => Some(value),
            None => self.network.monthly_budget.clone(),
        };

        Ok(TopologyParams {
            name: self.name.clone(),
            cidr_block: self.network.cidr_block.clone(),
            public_subnet_cidrs: self.network.public_subnet_cidrs.clone(),
            private_subnet_cidrs: self.network.private_subnet_cidrs.clone(),
            availability_zones: self.network.availability_zones.clone(),
            tags: self.tags.clone(),
            monthly_budget,
            route_table_scope: self.network.route_table_scope,
            nat_scope: self.network.nat_scope,
        })
    }

    /// Compute parameters parented under the identifiers of an already
    /// synthesized network graph
    pub fn compute_params(&self, network: &Graph) -> eyre::Result<ComputeParams> {
        let vpc = network
            .nodes_of_kind(ResourceKind::Vpc)
            .into_iter()
            .next()
            .wrap_err("Network graph contains no VPC")?;

        let vpc_cidr_block = vpc
            .property("cidr_block")
            .and_then(|v| v.as_str())
            .wrap_err("VPC node carries no CIDR block")?
            .to_string();

        // The compute tier goes into the public subnets
        let subnet_ids: Vec<String> = network
            .nodes_of_kind(ResourceKind::Subnet)
            .into_iter()
            .filter(|s| {
                s.property("map_public_ip_on_launch").and_then(|v| v.as_bool()) == Some(true)
            })
            .map(|s| s.stable_id.clone())
            .collect();

        let instance_count = match env_var("LANDZONE_INSTANCE_COUNT")? {
            Some(value) => value
                .parse()
                .wrap_err(format!("LANDZONE_INSTANCE_COUNT is not a number: {value:?}"))?,
            None => self.compute.instance_count.unwrap_or(1),
        };

        Ok(ComputeParams {
            name: self.name.clone(),
            vpc_id: vpc.stable_id.clone(),
            vpc_cidr_block,
            subnet_ids,
            instance_count,
            image_id: self.compute.image_id.clone(),
            instance_type: self.compute.instance_type.clone(),
            tags: self.tags.clone(),
            mode: self.compute.mode,
        })
    }
}

fn env_var(name: &str) -> eyre::Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).wrap_err(format!("Failed to read {name}")),
    }
}
