use std::{fs, path::PathBuf};

use common::{config::RunConfig, provider::{Provisioner, ToolStep}};
use tracing::{info, warn};

use crate::{
    document::Document,
    error::{PatchError, Result},
    layout::{node_config_name, node_patch_name, ConfigDir},
    node_patch::{NodePatch, NodeRecord, NodeRole, INTERFACE_PATH},
    registry::AddressRegistry,
    transcript::{run_or_transcribe, ManualTranscript},
    version::{resolve_schema, SchemaMode},
};

const INTERFACES_PATH: &str = "machine.network.interfaces";
const FIRST_ADDRESS_PATH: &str = "machine.network.interfaces.0.addresses.0";
const GATEWAY_PATH: &str = "machine.network.interfaces.0.routes.0.gateway";
const INSTALL_IMAGE_PATH: &str = "machine.install.image";

#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub role: NodeRole,
    pub index: usize,
    pub address: String,
    pub auto_apply: bool,
}

#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub mode: SchemaMode,
    pub patch_file: PathBuf,
    pub config_file: PathBuf,
    pub applied: bool,
    /// What to run by hand when the config was not applied.
    pub apply_step: ToolStep,
}

/// Splits `address/mask`; anything else is `None`.
fn split_mask(address: &str) -> Option<(&str, &str)> {
    let mut parts = address.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(host), Some(mask), None) => Some((host, mask)),
        _ => None,
    }
}

/// Turns the first node's patch into the patch for `record`: same
/// interface and extras, new address with the baseline's mask, new
/// hostname placed for `mode`.
pub fn derive_node_patch(baseline: Document, record: &NodeRecord, mode: SchemaMode) -> Result<NodePatch> {
    let mut machine = baseline;
    if machine.sequence(INTERFACES_PATH)?.is_empty() {
        return Err(PatchError::mismatch(INTERFACES_PATH, "at least one interface"));
    }
    if !machine.value(INTERFACE_PATH)?.is_mapping() {
        return Err(PatchError::mismatch(INTERFACE_PATH, "mapping"));
    }

    let current = machine.str_at(FIRST_ADDRESS_PATH)?;
    let (_, mask) = split_mask(current)
        .ok_or_else(|| PatchError::mismatch(FIRST_ADDRESS_PATH, "an address/mask pair"))?;
    let address = format!("{}/{}", record.address, mask);
    machine.set(FIRST_ADDRESS_PATH, address)?;

    NodePatch::place_hostname(machine, &record.hostname(), mode)
}

/// Schema of an existing cluster, read back from the image in `patch.yaml`.
/// Falls back to legacy when the file or field cannot be read.
pub fn baseline_schema(dir: &ConfigDir) -> SchemaMode {
    let path = dir.base_patch();
    let image = fs::read_to_string(&path)
        .map_err(PatchError::from)
        .and_then(|text| Document::parse(&text))
        .and_then(|doc| doc.str_at(INSTALL_IMAGE_PATH).map(|x| x.to_owned()));
    match image {
        Ok(image) => resolve_schema(&image),
        Err(err) => {
            warn!(
                "Could not read install image from {} ({err}), assuming legacy hostname format",
                path.display()
            );
            SchemaMode::Legacy
        }
    }
}

/// Addresses already handed out in `dir`, with the baseline's gateway.
fn existing_registry(dir: &ConfigDir, baseline: &Document) -> Result<AddressRegistry> {
    let gateway = baseline
        .get(GATEWAY_PATH)
        .and_then(|x| x.as_str())
        .unwrap_or_default();

    let mut addresses = Vec::new();
    for (role, index, path) in dir.existing_node_patches()? {
        let address = fs::read_to_string(&path)
            .map_err(PatchError::from)
            .and_then(|text| Document::parse(&text))
            .and_then(|doc| doc.str_at(FIRST_ADDRESS_PATH).map(|x| x.to_owned()));
        match address {
            Ok(address) => {
                let host = split_mask(&address).map_or(address.as_str(), |(host, _)| host);
                addresses.push(host.to_owned());
            }
            Err(err) => warn!("Skipping {role} {index} address ({}): {err}", path.display()),
        }
    }
    Ok(AddressRegistry::with_existing(
        gateway,
        addresses.iter().map(String::as_str),
    ))
}

fn require(path: PathBuf, what: &str) -> Result<()> {
    if !path.exists() {
        return Err(PatchError::Precondition(format!(
            "Error: {what} {} does not exist",
            path.display()
        )));
    }
    Ok(())
}

fn refuse_existing(path: PathBuf, what: &str) -> Result<()> {
    if path.exists() {
        return Err(PatchError::Precondition(format!(
            "Error: {what} {} already exists",
            path.display()
        )));
    }
    Ok(())
}

/// Adds one node to an existing config directory and merges its patch into
/// the role config with the provisioning tool.
pub async fn append_node(
    run: &RunConfig,
    request: &AppendRequest,
    provisioner: &dyn Provisioner,
) -> Result<AppendOutcome> {
    let dir = ConfigDir::new(&run.config_dir);
    // the mask always comes from the baseline
    let address = request.address.trim();
    let address = split_mask(address).map_or(address, |(host, _)| host);
    let record = NodeRecord::new(request.role, request.index, address);
    if record.index == 0 {
        return Err(PatchError::InvalidInput(
            "node number must be 1 or greater".to_owned(),
        ));
    }
    if record.address.is_empty() {
        return Err(PatchError::InvalidInput("--address is required".to_owned()));
    }

    require(dir.template_config(record.role), "base file")?;
    require(dir.talosconfig(), "talosconfig")?;
    let baseline_path = dir.node_patch(record.role, 1);
    require(baseline_path.clone(), "base patch file")?;
    let patch_file = dir.node_patch(record.role, record.index);
    let config_file = dir.node_config(record.role, record.index);
    refuse_existing(patch_file.clone(), "patch file")?;
    refuse_existing(config_file.clone(), "config file")?;

    let mode = baseline_schema(&dir);
    let baseline = Document::parse(&fs::read_to_string(&baseline_path)?)?;

    let mut registry = existing_registry(&dir, &baseline)?;
    registry.claim(&record.address)?;

    let patch = derive_node_patch(baseline, &record, mode)?;
    fs::write(&patch_file, patch.render()?)?;
    info!("Created patch file: {}", patch_file.display());

    let merge = ToolStep::PatchConfig {
        base: record.role.template_config().to_owned(),
        patch: node_patch_name(record.role, record.index),
        output: node_config_name(record.role, record.index),
    };
    let apply_step = ToolStep::ApplyConfig {
        node: record.address.clone(),
        file: node_config_name(record.role, record.index),
    };

    let mut then = ManualTranscript::default();
    if request.auto_apply {
        then.step(apply_step.clone());
    }
    run_or_transcribe(provisioner, dir.root(), &[merge], &then).await?;
    info!("Created config file: {}", config_file.display());

    if request.auto_apply {
        run_or_transcribe(
            provisioner,
            dir.root(),
            std::slice::from_ref(&apply_step),
            &ManualTranscript::default(),
        )
        .await?;
        info!("Configuration applied successfully to {}", record.address);
    }

    Ok(AppendOutcome {
        mode,
        patch_file,
        config_file,
        applied: request.auto_apply,
        apply_step,
    })
}
