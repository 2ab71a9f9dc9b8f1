use std::{fs, path::PathBuf};

use common::{
    config::{ClusterFile, ParameterSet, RunConfig},
    provider::{Provisioner, ToolStep},
};
use tracing::{info, warn};

use crate::{
    base_patch::build_base_patch,
    endpoints::{collect_endpoints, patch_credentials_file, EndpointOutcome},
    error::Result,
    layout::{node_config_name, node_patch_name, ConfigDir, BASE_PATCH, COMMANDS, SECRETS, TALOSCONFIG},
    node_patch::{build_node_patch, NodeRecord, NodeRole},
    registry::{self, ClaimRejection},
    transcript::{run_or_transcribe, ManualTranscript},
    version::{resolve_schema, SchemaMode},
};

#[derive(Debug)]
pub struct GenerationReport {
    pub mode: SchemaMode,
    /// Patch files written, base patch first.
    pub written: Vec<PathBuf>,
    pub endpoints: Vec<String>,
    pub endpoint_outcome: EndpointOutcome,
    /// Address problems in the cluster file. These only warn.
    pub address_conflicts: Vec<ClaimRejection>,
    /// Cluster init commands, also saved as `commands.md`.
    pub transcript: ManualTranscript,
}

fn host(address: &str) -> &str {
    address.split_once('/').map_or(address, |(host, _)| host).trim()
}

/// Address the cluster API is reached at: the VIP when one is configured,
/// otherwise the first control plane.
pub fn cluster_endpoint(params: &ParameterSet, cp_ips: &[String]) -> String {
    params
        .vip()
        .or_else(|| cp_ips.first().map(String::as_str))
        .map(host)
        .unwrap_or_default()
        .to_owned()
}

fn nodes(cluster: &ClusterFile) -> impl Iterator<Item = NodeRecord> + '_ {
    let cps = cluster.cp_ips.iter().enumerate().map(|(i, ip)| {
        NodeRecord::new(NodeRole::ControlPlane, i + 1, ip.trim())
    });
    let workers = cluster
        .worker_ips
        .iter()
        .enumerate()
        .map(|(i, ip)| NodeRecord::new(NodeRole::Worker, i + 1, ip.trim()));
    cps.chain(workers)
}

/// Writes `patch.yaml` and one patch per node.
pub fn write_patches(dir: &ConfigDir, cluster: &ClusterFile, mode: SchemaMode) -> Result<Vec<PathBuf>> {
    let base = build_base_patch(&cluster.params)?;
    let base_path = dir.base_patch();
    fs::write(&base_path, base.to_yaml()?)?;
    info!("Created {}", base_path.display());
    let mut written = vec![base_path];

    for record in nodes(cluster) {
        let patch = build_node_patch(&cluster.params, &record, mode)?;
        let path = dir.node_patch(record.role, record.index);
        fs::write(&path, patch.render()?)?;
        info!("Created {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// `talosctl` invocations that turn the patches into per node configs.
pub fn provisioning_steps(cluster: &ClusterFile) -> Vec<ToolStep> {
    let params = &cluster.params;
    let mut steps = vec![
        ToolStep::GenSecrets {
            output: SECRETS.to_owned(),
        },
        ToolStep::GenConfig {
            cluster_name: params.cluster_name.clone(),
            endpoint: cluster_endpoint(params, &cluster.cp_ips),
            k8s_version: params.k8s_version.clone(),
            secrets: SECRETS.to_owned(),
            patch: BASE_PATCH.to_owned(),
        },
    ];
    steps.extend(nodes(cluster).map(|record| ToolStep::PatchConfig {
        base: record.role.template_config().to_owned(),
        patch: node_patch_name(record.role, record.index),
        output: node_config_name(record.role, record.index),
    }));
    steps
}

/// What the operator runs to bring the cluster up. Init is never run
/// automatically: the first control plane has to reboot between apply and
/// bootstrap.
pub fn init_transcript(cluster: &ClusterFile) -> ManualTranscript {
    let mut t = ManualTranscript::new("Manual cluster initialization commands");
    let mut records = nodes(cluster);
    let Some(first) = records.next() else {
        return t;
    };
    let first_host = host(&first.address).to_owned();

    t.step(ToolStep::ApplyConfig {
        node: first_host.clone(),
        file: node_config_name(first.role, first.index),
    })
    .note("Wait for the first control plane to install and reboot before going on")
    .step(ToolStep::Bootstrap {
        node: first_host,
        talosconfig: TALOSCONFIG.to_owned(),
    })
    .note("Wait for the bootstrap to finish before applying the other nodes");

    for record in records {
        t.step(ToolStep::ApplyConfig {
            node: host(&record.address).to_owned(),
            file: node_config_name(record.role, record.index),
        });
    }

    t.step(ToolStep::Kubeconfig {
        path: format!("~/.kube/{}.yaml", cluster.params.cluster_name),
        node: cluster_endpoint(&cluster.params, &cluster.cp_ips),
        talosconfig: TALOSCONFIG.to_owned(),
    });
    t
}

/// Builds a fresh config directory for `cluster`: patches, secrets, role
/// configs, per node configs and an endpoint-patched `talosconfig`.
pub async fn generate(
    run: &RunConfig,
    cluster: &ClusterFile,
    force: bool,
    provisioner: &dyn Provisioner,
) -> Result<GenerationReport> {
    let mut cluster = cluster.clone();
    cluster.params.fill_defaults(run);
    cluster.validate()?;

    let dir = ConfigDir::new(&run.config_dir);
    dir.prepare(force)?;

    let addresses = cluster.cp_ips.iter().chain(&cluster.worker_ips);
    let address_conflicts = registry::audit(&cluster.params.gateway, addresses.map(|x| host(x)));
    for rejection in &address_conflicts {
        warn!("Cluster file address check: {rejection}");
    }

    let mode = resolve_schema(&cluster.params.image);
    let written = write_patches(&dir, &cluster, mode)?;

    let transcript = init_transcript(&cluster);
    run_or_transcribe(provisioner, dir.root(), &provisioning_steps(&cluster), &transcript).await?;

    let endpoints = collect_endpoints(&cluster.params, &cluster.cp_ips);
    let endpoint_outcome = patch_credentials_file(&dir.talosconfig(), &endpoints)?;

    transcript.persist(&dir.path(COMMANDS))?;

    Ok(GenerationReport {
        mode,
        written,
        endpoints,
        endpoint_outcome,
        address_conflicts,
        transcript,
    })
}
