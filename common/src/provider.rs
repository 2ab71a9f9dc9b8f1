use std::path::Path;

use anyhow::Result;

use crate::command::command_line;

pub const TALOSCTL: &str = "talosctl";

/// One invocation of the provisioning tool. File arguments are relative to
/// the config directory the step runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStep {
    GenSecrets {
        output: String,
    },
    GenConfig {
        cluster_name: String,
        endpoint: String,
        k8s_version: String,
        secrets: String,
        patch: String,
    },
    PatchConfig {
        base: String,
        patch: String,
        output: String,
    },
    ApplyConfig {
        node: String,
        file: String,
    },
    Bootstrap {
        node: String,
        talosconfig: String,
    },
    Kubeconfig {
        path: String,
        node: String,
        talosconfig: String,
    },
}

impl ToolStep {
    pub fn args(&self) -> Vec<String> {
        match self {
            ToolStep::GenSecrets { output } => owned(&["gen", "secrets", "-o", output]),
            ToolStep::GenConfig {
                cluster_name,
                endpoint,
                k8s_version,
                secrets,
                patch,
            } => owned(&[
                "gen",
                "config",
                "--kubernetes-version",
                k8s_version,
                "--with-secrets",
                secrets,
                cluster_name,
                &format!("https://{endpoint}:6443"),
                "--config-patch",
                &format!("@{patch}"),
            ]),
            ToolStep::PatchConfig {
                base,
                patch,
                output,
            } => owned(&[
                "machineconfig",
                "patch",
                base,
                "--patch",
                &format!("@{patch}"),
                "--output",
                output,
            ]),
            ToolStep::ApplyConfig { node, file } => {
                owned(&["apply-config", "--insecure", "-n", node, "--file", file])
            }
            ToolStep::Bootstrap { node, talosconfig } => owned(&[
                "bootstrap",
                "--nodes",
                node,
                "--endpoints",
                node,
                "--talosconfig",
                talosconfig,
            ]),
            ToolStep::Kubeconfig {
                path,
                node,
                talosconfig,
            } => owned(&[
                "kubeconfig",
                path,
                "--nodes",
                node,
                "--endpoints",
                node,
                "--talosconfig",
                talosconfig,
            ]),
        }
    }

    pub fn command_line(&self) -> String {
        command_line(TALOSCTL, &self.args())
    }

    /// Ongoing, failure and success messages for progress output.
    pub fn messages(&self) -> [String; 3] {
        match self {
            ToolStep::GenSecrets { output } => [
                format!("Generating secrets into {output}"),
                format!("Could not generate {output}"),
                format!("Created {output}"),
            ],
            ToolStep::GenConfig { cluster_name, .. } => [
                format!("Generating machine configs for {cluster_name}"),
                format!("Could not generate machine configs for {cluster_name}"),
                format!("Generated machine configs for {cluster_name}"),
            ],
            ToolStep::PatchConfig { output, .. } => [
                format!("Patching {output}"),
                format!("Could not patch {output}"),
                format!("Created {output}"),
            ],
            ToolStep::ApplyConfig { node, file } => [
                format!("Applying {file} to {node}"),
                format!("Could not apply {file} to {node}"),
                format!("Applied {file} to {node}"),
            ],
            ToolStep::Bootstrap { node, .. } => [
                format!("Bootstrapping {node}"),
                format!("Could not bootstrap {node}"),
                format!("Bootstrapped {node}"),
            ],
            ToolStep::Kubeconfig { path, .. } => [
                format!("Exporting kubeconfig to {path}"),
                format!("Could not export kubeconfig to {path}"),
                format!("Exported kubeconfig to {path}"),
            ],
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|x| (*x).to_owned()).collect()
}

/// The external node-provisioning tool. The engine describes what to run,
/// implementations decide how.
#[async_trait::async_trait]
pub trait Provisioner: Send + Sync {
    async fn run(&self, step: &ToolStep, dir: &Path) -> Result<()>;
    fn name(&self) -> String;
}
