use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use common::config::{RunConfig, DEFAULT_CONFIG_DIR, DEFAULT_IMAGE, DEFAULT_K8S_VERSION};
use patch_engine::node_patch::NodeRole;

#[derive(Debug, Parser)]
#[command(name = "talostpl")]
#[command(author, version, about = "Generates Talos machine config patches for static-address clusters", long_about = None)]
pub struct Cli {
    /// Verbose logging, and talosctl output is shown as it runs
    #[arg(long, short, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Directory generated files are written to
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Installer image used when the cluster file does not set one
    #[arg(long, global = true, default_value = DEFAULT_IMAGE)]
    pub image: String,

    /// Kubernetes version used when the cluster file does not set one
    #[arg(long, global = true, default_value = DEFAULT_K8S_VERSION)]
    pub k8s_version: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            config_dir: self.config_dir.clone(),
            image: self.image.clone(),
            k8s_version: self.k8s_version.clone(),
            verbose: self.verbose,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate patches and machine configs for a new cluster
    Generate(GenerateArgs),
    /// Add a node to an already generated cluster
    Add(AddArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Cluster file, YAML or TOML
    #[arg(long, short, visible_alias = "from-file", default_value = "cluster.yaml")]
    pub file: PathBuf,

    /// Clear a non-empty config directory instead of refusing
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("role").required(true).args(["cp", "worker"])))]
pub struct AddArgs {
    /// Number of the new control plane node
    #[arg(long, value_name = "N")]
    pub cp: Option<usize>,

    /// Number of the new worker node
    #[arg(long, value_name = "N")]
    pub worker: Option<usize>,

    /// Address of the new node, without a mask
    #[arg(long, short)]
    pub address: String,

    /// Apply the merged config to the node right away
    #[arg(long, action = ArgAction::SetTrue)]
    pub auto_apply: bool,
}

impl AddArgs {
    pub fn role_and_index(&self) -> (NodeRole, usize) {
        match (self.cp, self.worker) {
            (Some(index), _) => (NodeRole::ControlPlane, index),
            (None, Some(index)) => (NodeRole::Worker, index),
            // clap requires one of the two
            (None, None) => (NodeRole::Worker, 0),
        }
    }
}
