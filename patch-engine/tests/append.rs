mod support;

use std::fs;

use common::{config::RunConfig, provider::ToolStep};
use patch_engine::{
    appender::{append_node, AppendRequest},
    document::Document,
    generate::generate,
    node_patch::NodeRole,
    version::SchemaMode,
    PatchError,
};
use support::{cluster, run_config, RecordingProvisioner};

async fn generated(image: &str) -> (tempfile::TempDir, RunConfig) {
    let tmp = tempfile::tempdir().unwrap();
    let run = run_config(tmp.path());
    generate(&run, &cluster(image), false, &RecordingProvisioner::new())
        .await
        .unwrap();
    (tmp, run)
}

fn request(role: NodeRole, index: usize, address: &str) -> AppendRequest {
    AppendRequest {
        role,
        index,
        address: address.to_owned(),
        auto_apply: false,
    }
}

#[tokio::test]
async fn appends_a_control_plane_from_the_first_one() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.12.0").await;
    let talosctl = RecordingProvisioner::new();

    let outcome = append_node(&run, &request(NodeRole::ControlPlane, 3, "10.0.0.13"), &talosctl)
        .await
        .unwrap();

    assert_eq!(outcome.mode, SchemaMode::Modern);
    assert!(!outcome.applied);
    assert_eq!(
        outcome.apply_step.command_line(),
        "talosctl apply-config --insecure -n 10.0.0.13 --file cp3.yaml"
    );
    assert_eq!(
        talosctl.recorded(),
        vec![ToolStep::PatchConfig {
            base: "controlplane.yaml".into(),
            patch: "cp3.patch".into(),
            output: "cp3.yaml".into(),
        }]
    );

    let text = fs::read_to_string(&outcome.patch_file).unwrap();
    let machine = Document::parse(&text).unwrap();
    assert_eq!(
        machine.str_at("machine.network.interfaces.0.addresses.0").unwrap(),
        "10.0.0.13/24"
    );
    assert!(!machine.contains("machine.network.hostname"));
    // copied from cp1
    assert_eq!(
        machine.str_at("machine.network.interfaces.0.vip.ip").unwrap(),
        "10.0.0.50"
    );
    assert_eq!(
        machine.str_at("machine.network.interfaces.0.interface").unwrap(),
        "ens18"
    );

    let hostname = text.split("---\n").nth(1).unwrap();
    assert_eq!(
        Document::parse(hostname).unwrap(),
        Document::from_value(serde_yaml::from_str("{apiVersion: v1alpha1, kind: HostnameConfig, hostname: cp-3}").unwrap())
    );
    assert!(outcome.config_file.exists());
}

#[tokio::test]
async fn legacy_cluster_keeps_hostname_inline() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.9.4").await;
    let outcome = append_node(
        &run,
        &request(NodeRole::Worker, 2, "10.0.0.22"),
        &RecordingProvisioner::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.mode, SchemaMode::Legacy);
    let text = fs::read_to_string(&outcome.patch_file).unwrap();
    assert!(!text.contains("HostnameConfig"));
    let machine = Document::parse(&text).unwrap();
    assert_eq!(machine.str_at("machine.network.hostname").unwrap(), "worker-2");
    assert_eq!(
        machine.get("machine.network.interfaces.0.deviceSelector.physical"),
        Some(&serde_yaml::Value::Bool(true))
    );
    assert_eq!(machine.str_at("machine.kernel.modules.0.name").unwrap(), "drbd");
}

#[tokio::test]
async fn a_mask_on_the_new_address_is_ignored() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.12.0").await;
    let outcome = append_node(
        &run,
        &request(NodeRole::Worker, 2, "10.0.0.22/16"),
        &RecordingProvisioner::new(),
    )
    .await
    .unwrap();
    let machine = Document::parse(&fs::read_to_string(&outcome.patch_file).unwrap()).unwrap();
    assert_eq!(
        machine.str_at("machine.network.interfaces.0.addresses.0").unwrap(),
        "10.0.0.22/24"
    );
}

#[tokio::test]
async fn taken_addresses_are_rejected() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.12.0").await;
    for address in ["10.0.0.11", "10.0.0.21", "10.0.0.1", "  "] {
        let talosctl = RecordingProvisioner::new();
        let err = append_node(&run, &request(NodeRole::Worker, 2, address), &talosctl)
            .await
            .unwrap_err();
        assert!(matches!(err, PatchError::InvalidInput(_)), "{address}: {err:?}");
        assert!(talosctl.recorded().is_empty());
        assert!(!run.config_dir.join("worker2.patch").exists());
    }
}

#[tokio::test]
async fn existing_and_missing_files_are_preconditions() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.12.0").await;
    let talosctl = RecordingProvisioner::new();

    // worker1 is already there
    let err = append_node(&run, &request(NodeRole::Worker, 1, "10.0.0.30"), &talosctl)
        .await
        .unwrap_err();
    assert!(matches!(err, PatchError::Precondition(_)), "{err:?}");

    fs::remove_file(run.config_dir.join("talosconfig")).unwrap();
    let err = append_node(&run, &request(NodeRole::Worker, 2, "10.0.0.30"), &talosctl)
        .await
        .unwrap_err();
    assert!(matches!(err, PatchError::Precondition(_)), "{err:?}");
    assert!(talosctl.recorded().is_empty());
}

#[tokio::test]
async fn node_numbers_start_at_one() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.12.0").await;
    let err = append_node(
        &run,
        &request(NodeRole::ControlPlane, 0, "10.0.0.40"),
        &RecordingProvisioner::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PatchError::InvalidInput(_)));
}

#[tokio::test]
async fn failed_apply_hands_back_the_manual_command() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.12.0").await;
    let talosctl =
        RecordingProvisioner::failing(|step| matches!(step, ToolStep::ApplyConfig { .. }));
    let mut req = request(NodeRole::Worker, 2, "10.0.0.22");
    req.auto_apply = true;

    let err = append_node(&run, &req, &talosctl).await.unwrap_err();
    let transcript = err.transcript().expect("tool failures carry a transcript");
    let steps: Vec<String> = transcript.steps().map(ToolStep::command_line).collect();
    assert_eq!(
        steps,
        vec!["talosctl apply-config --insecure -n 10.0.0.22 --file worker2.yaml"]
    );
    // the merge went through before the apply failed
    assert!(run.config_dir.join("worker2.yaml").exists());
    assert_eq!(talosctl.recorded().len(), 2);
}

#[tokio::test]
async fn auto_apply_runs_after_the_merge() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.12.0").await;
    let talosctl = RecordingProvisioner::new();
    let mut req = request(NodeRole::ControlPlane, 3, "10.0.0.13");
    req.auto_apply = true;

    let outcome = append_node(&run, &req, &talosctl).await.unwrap();
    assert!(outcome.applied);
    let recorded = talosctl.recorded();
    assert!(matches!(recorded[0], ToolStep::PatchConfig { .. }));
    assert_eq!(recorded[1], outcome.apply_step);
}

#[tokio::test]
async fn schema_follows_the_image_in_patch_yaml() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.11.5").await;
    let base_path = run.config_dir.join("patch.yaml");
    let mut base = Document::parse(&fs::read_to_string(&base_path).unwrap()).unwrap();
    base.set("machine.install.image", "factory.talos.dev/installer/abc:v1.12.0")
        .unwrap();
    fs::write(&base_path, base.to_yaml().unwrap()).unwrap();

    // cp1.patch still carries the hostname inline from the legacy run
    let cp1 = Document::parse(&fs::read_to_string(run.config_dir.join("cp1.patch")).unwrap()).unwrap();
    assert!(cp1.contains("machine.network.hostname"));

    let outcome = append_node(
        &run,
        &request(NodeRole::ControlPlane, 3, "10.0.0.13"),
        &RecordingProvisioner::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.mode, SchemaMode::Modern);
    let text = fs::read_to_string(&outcome.patch_file).unwrap();
    let machine = Document::parse(&text).unwrap();
    assert!(!machine.contains("machine.network.hostname"));
    let hostname = text.split("---\n").nth(1).unwrap();
    assert_eq!(
        Document::parse(hostname).unwrap(),
        Document::from_value(serde_yaml::from_str("{apiVersion: v1alpha1, kind: HostnameConfig, hostname: cp-3}").unwrap())
    );
}

#[tokio::test]
async fn missing_patch_yaml_falls_back_to_legacy() {
    let (_tmp, run) = generated("factory.talos.dev/installer/abc:v1.12.0").await;
    fs::remove_file(run.config_dir.join("patch.yaml")).unwrap();

    let outcome = append_node(
        &run,
        &request(NodeRole::Worker, 2, "10.0.0.22"),
        &RecordingProvisioner::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.mode, SchemaMode::Legacy);
    let text = fs::read_to_string(&outcome.patch_file).unwrap();
    assert!(!text.contains("HostnameConfig"));
    let machine = Document::parse(&text).unwrap();
    assert_eq!(machine.str_at("machine.network.hostname").unwrap(), "worker-2");
}
