#![allow(dead_code)]

use std::{fs, path::Path, sync::Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use common::{
    config::{ClusterFile, RunConfig},
    provider::{Provisioner, ToolStep},
};

/// Stands in for `talosctl`: records every step and writes the files the
/// real tool would, with placeholder contents.
pub struct RecordingProvisioner {
    pub steps: Mutex<Vec<ToolStep>>,
    fail_when: Option<fn(&ToolStep) -> bool>,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            fail_when: None,
        }
    }

    pub fn failing(fail_when: fn(&ToolStep) -> bool) -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            fail_when: Some(fail_when),
        }
    }

    pub fn recorded(&self) -> Vec<ToolStep> {
        self.steps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn run(&self, step: &ToolStep, dir: &Path) -> Result<()> {
        self.steps.lock().unwrap().push(step.clone());
        if self.fail_when.is_some_and(|f| f(step)) {
            bail!("exit status: 1");
        }

        match step {
            ToolStep::GenSecrets { output } => fs::write(dir.join(output), "secrets: {}\n")?,
            ToolStep::GenConfig { cluster_name, .. } => {
                fs::write(dir.join("controlplane.yaml"), "machine:\n  type: controlplane\n")?;
                fs::write(dir.join("worker.yaml"), "machine:\n  type: worker\n")?;
                fs::write(
                    dir.join("talosconfig"),
                    format!(
                        "context: {cluster_name}\ncontexts:\n    {cluster_name}:\n        endpoints: []\n        ca: abc\n"
                    ),
                )?;
            }
            ToolStep::PatchConfig {
                base,
                patch,
                output,
            } => {
                let merged = fs::read_to_string(dir.join(base))? + &fs::read_to_string(dir.join(patch))?;
                fs::write(dir.join(output), merged)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> String {
        "fake talosctl".to_owned()
    }
}

pub fn run_config(root: &Path) -> RunConfig {
    RunConfig {
        config_dir: root.join("config"),
        ..RunConfig::default()
    }
}

/// One control plane behind a VIP and one worker, on the modern schema.
pub fn cluster(image: &str) -> ClusterFile {
    serde_yaml::from_str(&format!(
        r#"
clusterName: lab
image: {image}
gateway: 10.0.0.1
cpCount: 1
workerCount: 1
useVIP: true
vipIP: 10.0.0.50
useDRBD: true
cpIPs: [10.0.0.11]
workerIPs: [10.0.0.21]
"#
    ))
    .unwrap()
}
